//! Call watchdog
//!
//! Polled by the call actor while the call is up. Ends calls that run past
//! the maximum duration or that have gone quiet: no caller speech and no
//! playback for the inactivity limit.

use std::time::Duration;

use aibridge_media_core::Activity;
use tokio::time::Instant;

use crate::types::EndReason;

#[derive(Debug, Clone)]
pub struct Watchdog {
    max_duration: Option<Duration>,
    inactivity: Option<Duration>,
    started: Instant,
    activity: Activity,
}

impl Watchdog {
    pub fn new(
        max_duration: Option<Duration>,
        inactivity: Option<Duration>,
        activity: Activity,
    ) -> Self {
        Self {
            max_duration,
            inactivity,
            started: Instant::now(),
            activity,
        }
    }

    /// Reason to end the call now, if any
    pub fn check(&self) -> Option<EndReason> {
        if let Some(limit) = self.max_duration {
            if self.started.elapsed() >= limit {
                return Some(EndReason::MaxDuration);
            }
        }
        if let Some(limit) = self.inactivity {
            if self.activity.idle_for() >= limit {
                return Some(EndReason::Inactivity);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_inactivity_expires_unless_touched() {
        let activity = Activity::new();
        let watchdog = Watchdog::new(None, Some(Duration::from_secs(45)), activity.clone());
        assert_eq!(watchdog.check(), None);

        tokio::time::advance(Duration::from_secs(30)).await;
        activity.touch();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(watchdog.check(), None);

        tokio::time::advance(Duration::from_secs(16)).await;
        assert_eq!(watchdog.check(), Some(EndReason::Inactivity));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_duration_wins_over_activity() {
        let activity = Activity::new();
        let watchdog = Watchdog::new(Some(Duration::from_secs(60)), None, activity.clone());
        tokio::time::advance(Duration::from_secs(59)).await;
        activity.touch();
        assert_eq!(watchdog.check(), None);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(watchdog.check(), Some(EndReason::MaxDuration));
    }
}
