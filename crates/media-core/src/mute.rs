//! Feedback-prevention gate
//!
//! The gate is the only per-call state touched from two tasks: the playback
//! side closes it while audio goes out and the receive loop checks it for
//! every frame. Reopening bumps an epoch so the receive loop knows to throw
//! away whatever partial utterance it was holding before the gate closed.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct GateState {
    /// Closed by [`MuteGate::mute`] until [`MuteGate::unmute`]
    muted: bool,
    /// Outstanding [`MuteGuard`]s
    holds: usize,
    epoch: u64,
    recalibrate: bool,
}

impl GateState {
    fn is_closed(&self) -> bool {
        self.muted || self.holds > 0
    }
}

/// What the receive loop may do with a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Discard the frame
    Muted,
    /// Feed the frame to the VAD
    Open,
    /// Gate reopened since the last frame: reset (or recalibrate) first
    Reopened { recalibrate: bool },
}

/// Shared mute flag for one call
#[derive(Debug, Clone, Default)]
pub struct MuteGate {
    state: Arc<Mutex<GateState>>,
}

impl MuteGate {
    /// A gate that starts closed
    pub fn muted() -> Self {
        let gate = Self::default();
        gate.state.lock().muted = true;
        gate
    }

    /// A gate that starts open
    pub fn open() -> Self {
        Self::default()
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().is_closed()
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    pub fn mute(&self) {
        self.state.lock().muted = true;
    }

    pub fn unmute(&self) {
        let mut state = self.state.lock();
        state.muted = false;
        Self::maybe_reopen(&mut state);
    }

    /// Open the gate and have the VAD measure the line again
    pub fn unmute_and_recalibrate(&self) {
        let mut state = self.state.lock();
        state.muted = false;
        state.recalibrate = true;
        Self::maybe_reopen(&mut state);
    }

    /// Close the gate until the guard is dropped
    pub fn hold(&self) -> MuteGuard {
        self.state.lock().holds += 1;
        MuteGuard { gate: self.clone() }
    }

    /// Check a frame against the gate. `seen_epoch` is the receive loop's
    /// copy of the epoch and is updated when a reopening is reported.
    pub fn admit(&self, seen_epoch: &mut u64) -> Admission {
        let mut state = self.state.lock();
        if state.is_closed() {
            return Admission::Muted;
        }
        if *seen_epoch == state.epoch {
            return Admission::Open;
        }
        *seen_epoch = state.epoch;
        Admission::Reopened {
            recalibrate: std::mem::take(&mut state.recalibrate),
        }
    }

    fn maybe_reopen(state: &mut GateState) {
        if !state.is_closed() {
            state.epoch += 1;
            debug!(epoch = state.epoch, "Mute gate opened");
        }
    }
}

/// Keeps a [`MuteGate`] closed while alive
#[derive(Debug)]
pub struct MuteGuard {
    gate: MuteGate,
}

impl Drop for MuteGuard {
    fn drop(&mut self) {
        let mut state = self.gate.state.lock();
        state.holds = state.holds.saturating_sub(1);
        MuteGate::maybe_reopen(&mut state);
    }
}
