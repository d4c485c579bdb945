//! Call state machine
//!
//! ```text
//! Idle --INVITE--> Ringing --answer--> Answering --ACK--> Active
//!                     |                    |                 |
//!                     +---CANCEL/BYE/timeout---+---BYE/watchdog--+
//!                                          v
//!                                     Terminating --media stopped--> Ended
//! ```
//!
//! [`transition`] is a pure function from the current state and an event to
//! the next state plus the side effects the call actor has to carry out, in
//! order. It never touches a socket.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SessionError};
use crate::types::{CallState, EndReason};

/// Input to the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalingEvent {
    /// INVITE accepted for this call
    Invite,
    /// The same INVITE again (our provisional or final response was lost)
    InviteRetransmission,
    /// Send the final answer; follows Ringing without waiting for the peer
    Answer,
    Ack,
    Bye,
    Cancel,
    /// A local timer or shutdown ends the call
    Expired(EndReason),
    /// Media engine and pipeline have shut down
    MediaStopped,
}

/// Side effect requested by a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    SendTrying,
    SendRinging,
    /// 200 OK with our SDP answer
    SendAnswer,
    /// 200 OK to a BYE
    AcknowledgeBye,
    /// 200 OK to a CANCEL
    AcknowledgeCancel,
    /// 487 for the INVITE a CANCEL killed
    SendRequestTerminated,
    /// Our own BYE
    SendBye,
    NotifyRinging,
    NotifyConnected,
    StartMedia,
    PlayWelcome,
    StopMedia,
    NotifyEnded,
    /// Emit "idle" after a short delay
    ScheduleIdle,
}

/// Result of applying an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: CallState,
    pub actions: Vec<Action>,
    /// Set when the call starts tearing down
    pub end_reason: Option<EndReason>,
}

impl Transition {
    fn to(next: CallState, actions: Vec<Action>) -> Self {
        Self {
            next,
            actions,
            end_reason: None,
        }
    }

    fn ending(reason: EndReason, actions: Vec<Action>) -> Self {
        Self {
            next: CallState::Terminating,
            actions,
            end_reason: Some(reason),
        }
    }
}

/// Apply `event` to a call in `state`
pub fn transition(state: CallState, event: SignalingEvent) -> Result<Transition> {
    use Action::*;
    use CallState::*;
    use SignalingEvent as E;

    let t = match (state, event) {
        (Idle, E::Invite) => Transition::to(Ringing, vec![SendTrying, SendRinging, NotifyRinging]),
        (Ringing, E::Answer) => Transition::to(Answering, vec![SendAnswer]),

        (Ringing, E::InviteRetransmission) => Transition::to(Ringing, vec![SendRinging]),
        (Answering, E::InviteRetransmission) => {
            Transition::to(Answering, vec![SendRinging, SendAnswer])
        }
        (Active, E::InviteRetransmission) => Transition::to(Active, vec![SendAnswer]),

        (Answering, E::Ack) => Transition::to(
            Active,
            vec![StartMedia, NotifyConnected, PlayWelcome],
        ),
        // Retransmitted ACK for a call already up
        (Active, E::Ack) => Transition::to(Active, vec![]),

        (Ringing | Answering, E::Cancel) => Transition::ending(
            EndReason::Cancelled,
            vec![AcknowledgeCancel, SendRequestTerminated, StopMedia],
        ),
        // Too late to cancel; the CANCEL itself still gets a 200
        (Active | Terminating, E::Cancel) => Transition::to(state, vec![AcknowledgeCancel]),

        (Ringing | Answering | Active, E::Bye) => {
            Transition::ending(EndReason::RemoteHangup, vec![AcknowledgeBye, StopMedia])
        }
        (Terminating, E::Bye) => Transition::to(Terminating, vec![AcknowledgeBye]),

        (Active, E::Expired(reason)) => Transition::ending(reason, vec![SendBye, StopMedia]),
        (Ringing | Answering, E::Expired(reason)) => Transition::ending(reason, vec![StopMedia]),
        (Terminating, E::Expired(_)) => Transition::to(Terminating, vec![]),

        (Terminating, E::MediaStopped) => Transition::to(
            Ended,
            vec![NotifyEnded, ScheduleIdle],
        ),

        (state, event) => return Err(SessionError::InvalidTransition { state, event }),
    };
    Ok(t)
}
