use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Steady packet clock for outbound media
///
/// Ticks every `interval` (20ms for G.711 at 8kHz). A late tick pushes the
/// schedule back instead of firing the missed ticks back to back, so packets
/// are never sent in bursts.
#[derive(Debug)]
pub struct PacketClock {
    interval: Interval,
    period: Duration,
    ticks: u64,
    started: Instant,
}

impl PacketClock {
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            period,
            ticks: 0,
            started: Instant::now(),
        }
    }

    /// Wait for the next send slot
    pub async fn tick(&mut self) {
        self.interval.tick().await;
        self.ticks += 1;
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// How far behind the nominal schedule the clock is running
    pub fn drift(&self) -> Duration {
        let nominal = self.period * self.ticks.saturating_sub(1) as u32;
        self.started.elapsed().saturating_sub(nominal)
    }
}
