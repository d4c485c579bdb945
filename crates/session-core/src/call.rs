//! Call actor
//!
//! Every accepted INVITE gets one actor task. The actor owns the
//! [`CallSession`], the call's media engine and its conversation pipeline.
//! It feeds SIP requests and timer expiries through [`transition`] and
//! carries out the resulting actions in order. The listener only knows the
//! actor's mailbox.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use aibridge_media_core::{MediaEngine, Utterance};
use aibridge_rtp_core::PortAllocator;
use aibridge_sip_core::prelude::*;
use aibridge_sip_core::types::caller::{header_uri, with_tag};
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::events::{CallEvent, EventBus};
use crate::orchestrator::CallOrchestrator;
use crate::services::Services;
use crate::state::{Action, SignalingEvent, transition};
use crate::transport::SipTransport;
use crate::types::{CallId, CallSession, EndReason};
use crate::watchdog::Watchdog;

/// Message for a call actor
#[derive(Debug)]
pub enum CallCommand {
    /// In-dialog request routed by Call-ID
    Request {
        message: SipMessage,
        source: SocketAddr,
    },
    /// End the call because the gateway is stopping
    Shutdown,
}

/// Listener's view of a running call
#[derive(Debug, Clone)]
pub struct CallHandle {
    mailbox: mpsc::UnboundedSender<CallCommand>,
    pub caller: String,
}

impl CallHandle {
    /// Returns false when the actor has already gone
    pub fn send(&self, command: CallCommand) -> bool {
        self.mailbox.send(command).is_ok()
    }
}

/// Calls in progress, keyed by Call-ID
///
/// Only the listener inserts and removes entries.
#[derive(Debug, Clone, Default)]
pub struct CallRegistry {
    calls: Arc<DashMap<CallId, CallHandle>>,
}

impl CallRegistry {
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn contains(&self, call_id: &CallId) -> bool {
        self.calls.contains_key(call_id)
    }

    pub fn ids(&self) -> Vec<CallId> {
        self.calls.iter().map(|entry| entry.key().clone()).collect()
    }

    pub(crate) fn get(&self, call_id: &CallId) -> Option<CallHandle> {
        self.calls.get(call_id).map(|entry| entry.value().clone())
    }

    pub(crate) fn insert(&self, call_id: CallId, handle: CallHandle) {
        self.calls.insert(call_id, handle);
    }

    pub(crate) fn remove(&self, call_id: &CallId) -> Option<CallHandle> {
        self.calls.remove(call_id).map(|(_, handle)| handle)
    }

    pub(crate) fn handles(&self) -> Vec<CallHandle> {
        self.calls.iter().map(|entry| entry.value().clone()).collect()
    }
}

/// What every call shares with the listener
#[derive(Clone)]
pub(crate) struct CallContext {
    pub config: Arc<SessionConfig>,
    pub services: Services,
    pub events: EventBus,
    pub transport: SipTransport,
    pub allocator: Arc<PortAllocator>,
    /// Call-IDs whose actor finished
    pub removals: mpsc::UnboundedSender<CallId>,
}

/// INVITE the listener has already validated
pub(crate) struct AcceptedInvite {
    pub message: SipMessage,
    pub source: SocketAddr,
    pub remote_media: SocketAddr,
    pub advertised_ip: IpAddr,
    pub engine: MediaEngine,
}

struct Pipeline {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub(crate) struct CallActor {
    ctx: CallContext,
    session: CallSession,
    invite: SipMessage,
    /// Where the INVITE came from; our responses and BYE go here
    peer: SocketAddr,
    local_tag: String,
    contact: String,
    sdp: String,
    engine: Arc<MediaEngine>,
    utterances: Option<mpsc::UnboundedReceiver<Utterance>>,
    pipeline: Option<Pipeline>,
    watchdog: Option<Watchdog>,
    ack_deadline: Option<Instant>,
    mailbox: mpsc::UnboundedReceiver<CallCommand>,
}

impl CallActor {
    pub(crate) fn new(
        ctx: CallContext,
        session: CallSession,
        accepted: AcceptedInvite,
    ) -> (Self, CallHandle) {
        let (tx, mailbox) = mpsc::unbounded_channel();
        let handle = CallHandle {
            mailbox: tx,
            caller: session.caller.clone(),
        };

        let AcceptedInvite {
            message,
            source,
            remote_media,
            advertised_ip,
            engine,
        } = accepted;

        let config = &ctx.config;
        let contact = format!(
            "sip:{}@{}",
            config.username,
            SocketAddr::new(advertised_ip, ctx.transport.local_addr().port())
        );
        let sdp = SdpAnswer::new(advertised_ip, engine.local_port())
            .with_username(config.username.clone())
            .to_string();

        let mut session = session;
        session.remote_media = Some(remote_media);
        session.local_media_port = Some(engine.local_port());
        session.mute = engine.gate().clone();

        let actor = Self {
            ctx,
            session,
            invite: message,
            peer: source,
            local_tag: generate_tag(),
            contact,
            sdp,
            engine: Arc::new(engine),
            utterances: None,
            pipeline: None,
            watchdog: None,
            ack_deadline: None,
            mailbox,
        };
        (actor, handle)
    }

    pub(crate) async fn run(mut self) {
        let call_id = self.session.call_id.clone();
        info!(call_id = %call_id, caller = %self.session.caller, "Incoming call");

        self.apply(SignalingEvent::Invite, None).await;
        self.apply(SignalingEvent::Answer, None).await;

        let mut watchdog_tick = tokio::time::interval(self.ctx.config.watchdog_interval);
        watchdog_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        while !self.session.state.is_final() {
            let ack_deadline = self.ack_deadline;
            tokio::select! {
                command = self.mailbox.recv() => match command {
                    Some(CallCommand::Request { message, source }) => {
                        self.on_request(message, source).await;
                    }
                    Some(CallCommand::Shutdown) | None => {
                        self.apply(SignalingEvent::Expired(EndReason::Shutdown), None).await;
                    }
                },
                _ = sleep_until(ack_deadline), if ack_deadline.is_some() => {
                    warn!(call_id = %call_id, "No ACK for our answer");
                    self.ack_deadline = None;
                    self.apply(SignalingEvent::Expired(EndReason::AckTimeout), None).await;
                }
                _ = watchdog_tick.tick(), if self.session.state.is_active() => {
                    let expired = self.watchdog.as_ref().and_then(Watchdog::check);
                    if let Some(reason) = expired {
                        info!(call_id = %call_id, "Watchdog ending call: {}", reason);
                        self.apply(SignalingEvent::Expired(reason), None).await;
                    }
                }
            }
        }

        if self.ctx.removals.send(call_id.clone()).is_err() {
            debug!(call_id = %call_id, "Listener gone before call removal");
        }
    }

    async fn on_request(&mut self, message: SipMessage, source: SocketAddr) {
        let event = match message.method() {
            Some(Method::Invite) => SignalingEvent::InviteRetransmission,
            Some(Method::Ack) => SignalingEvent::Ack,
            Some(Method::Bye) => SignalingEvent::Bye,
            Some(Method::Cancel) => SignalingEvent::Cancel,
            _ => {
                self.respond(&message, StatusCode::NotImplemented, source).await;
                return;
            }
        };
        self.apply(event, Some((&message, source))).await;
    }

    /// Run `event` and whatever it triggers through the state machine
    async fn apply(&mut self, event: SignalingEvent, request: Option<(&SipMessage, SocketAddr)>) {
        let mut pending = Some(event);
        while let Some(event) = pending.take() {
            let step = match transition(self.session.state, event) {
                Ok(step) => step,
                Err(e) => {
                    debug!(call_id = %self.session.call_id, "Ignored: {}", e);
                    return;
                }
            };

            let previous = self.session.state;
            self.session.state = step.next;
            if previous != step.next {
                debug!(call_id = %self.session.call_id, "{} -> {}", previous, step.next);
            }
            if let Some(reason) = step.end_reason {
                self.session.mark_ended(reason);
            }

            for action in step.actions {
                self.execute(action, request).await;
                if action == Action::StopMedia {
                    pending = Some(SignalingEvent::MediaStopped);
                }
            }
        }
    }

    async fn execute(&mut self, action: Action, request: Option<(&SipMessage, SocketAddr)>) {
        let call_id = self.session.call_id.clone();
        // Responses answer the triggering request; the INVITE otherwise
        let (current, source) = match request {
            Some((message, source)) => (message.clone(), source),
            None => (self.invite.clone(), self.peer),
        };

        match action {
            Action::SendTrying => {
                let trying = ResponseBuilder::for_request(&self.invite, StatusCode::Trying).build();
                self.ctx.transport.send(&trying, self.peer).await;
            }
            Action::SendRinging => {
                let ringing = self.dialog_response(&current, StatusCode::Ringing).build();
                self.ctx.transport.send(&ringing, source).await;
            }
            Action::SendAnswer => {
                let ok = self
                    .dialog_response(&current, StatusCode::Ok)
                    .header(HeaderName::Allow, "INVITE, ACK, BYE, CANCEL, OPTIONS")
                    .sdp(self.sdp.clone())
                    .build();
                self.ctx.transport.send(&ok, source).await;
                if self.session.answered_at.is_none() && self.ack_deadline.is_none() {
                    self.ack_deadline = Some(Instant::now() + self.ctx.config.ack_timeout);
                }
            }
            Action::AcknowledgeBye | Action::AcknowledgeCancel => {
                self.respond(&current, StatusCode::Ok, source).await;
            }
            Action::SendRequestTerminated => {
                let terminated = self
                    .dialog_response(&self.invite, StatusCode::RequestTerminated)
                    .build();
                self.ctx.transport.send(&terminated, self.peer).await;
            }
            Action::SendBye => {
                let bye = self.bye();
                self.ctx.transport.send(&bye, self.peer).await;
            }
            Action::NotifyRinging => {
                self.ctx.events.publish(CallEvent::Ringing {
                    call_id: call_id.clone(),
                    caller: self.session.caller.clone(),
                });
                if let Err(e) = self.ctx.services.recorder.call_started(&self.session).await {
                    warn!(call_id = %call_id, "Failed to record call start: {}", e);
                }
            }
            Action::NotifyConnected => {
                info!(call_id = %call_id, caller = %self.session.caller, "Call connected");
                self.ctx.events.publish(CallEvent::Connected {
                    call_id: call_id.clone(),
                    caller: self.session.caller.clone(),
                });
                if let Err(e) = self.ctx.services.recorder.call_answered(&self.session).await {
                    warn!(call_id = %call_id, "Failed to record answer: {}", e);
                }
            }
            Action::StartMedia => {
                self.ack_deadline = None;
                self.session.mark_answered();
                let Some(remote) = self.session.remote_media else {
                    warn!(call_id = %call_id, "No remote media address");
                    return;
                };
                match self.engine.start(remote) {
                    Ok(utterances) => self.utterances = Some(utterances),
                    Err(e) => warn!(call_id = %call_id, "Media engine failed to start: {}", e),
                }
                self.watchdog = Some(Watchdog::new(
                    self.ctx.config.max_call_duration,
                    self.ctx.config.inactivity_timeout,
                    self.engine.activity(),
                ));
            }
            Action::PlayWelcome => {
                let Some(utterances) = self.utterances.take() else {
                    return;
                };
                let orchestrator = CallOrchestrator::new(
                    self.session.clone(),
                    self.engine.clone(),
                    self.ctx.services.clone(),
                    self.ctx.config.pipeline.clone(),
                    self.ctx.events.clone(),
                );
                let cancel = CancellationToken::new();
                let task = tokio::spawn(orchestrator.run(utterances, cancel.clone()));
                self.pipeline = Some(Pipeline { cancel, task });
            }
            Action::StopMedia => {
                self.ack_deadline = None;
                self.watchdog = None;
                if let Some(pipeline) = self.pipeline.take() {
                    pipeline.cancel.cancel();
                    if let Err(e) = pipeline.task.await {
                        warn!(call_id = %call_id, "Pipeline task failed: {}", e);
                    }
                }
                self.engine.stop().await;
            }
            Action::NotifyEnded => {
                let duration = self.session.duration().unwrap_or_default();
                let reason = self.session.end_reason.unwrap_or(EndReason::RemoteHangup);
                info!(
                    call_id = %call_id,
                    caller = %self.session.caller,
                    duration_secs = duration.as_secs_f64(),
                    "Call ended: {}",
                    reason
                );
                self.ctx.events.publish(CallEvent::Ended {
                    call_id: call_id.clone(),
                    caller: self.session.caller.clone(),
                    duration_secs: duration.as_secs_f64(),
                    reason,
                });
                if let Err(e) = self.ctx.services.recorder.call_ended(&self.session).await {
                    warn!(call_id = %call_id, "Failed to record call end: {}", e);
                }
            }
            Action::ScheduleIdle => {
                let events = self.ctx.events.clone();
                let delay = self.ctx.config.idle_notice_delay;
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    events.publish(CallEvent::Idle);
                });
            }
        }
    }

    /// Response carrying our dialog tag and Contact
    fn dialog_response(&self, request: &SipMessage, status: StatusCode) -> ResponseBuilder {
        ResponseBuilder::for_request(request, status)
            .to_tag(&self.local_tag)
            .contact(&self.contact)
            .header(HeaderName::UserAgent, self.ctx.config.user_agent.clone())
    }

    async fn respond(&self, request: &SipMessage, status: StatusCode, destination: SocketAddr) {
        let response = ResponseBuilder::for_request(request, status)
            .to_tag(&self.local_tag)
            .header(HeaderName::UserAgent, self.ctx.config.user_agent.clone())
            .build();
        self.ctx.transport.send(&response, destination).await;
    }

    /// BYE for the dialog the INVITE established
    fn bye(&self) -> SipMessage {
        let their_from = self.invite.from_header().unwrap_or_default();
        let our_to = self.invite.to_header().unwrap_or_default();
        let target = self
            .invite
            .header(&HeaderName::Contact)
            .map(header_uri)
            .filter(|uri| !uri.is_empty())
            .unwrap_or_else(|| header_uri(their_from))
            .to_string();
        let sent_by = self.contact.rsplit('@').next().unwrap_or_default().to_string();

        RequestBuilder::new(Method::Bye, target)
            .via(&sent_by, &generate_branch())
            .from(with_tag(our_to, &self.local_tag))
            .to(their_from.to_string())
            .call_id(self.session.call_id.as_str())
            .cseq(1)
            .header(HeaderName::UserAgent, self.ctx.config.user_agent.clone())
            .build()
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
