//! SIP listener
//!
//! One task owns the receive side of the SIP socket. New INVITEs are
//! validated here and handed to a freshly spawned [`CallActor`]; every
//! other request is routed to the owning actor by Call-ID. Requests that
//! belong to no call are answered or dropped without touching existing
//! calls.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use aibridge_media_core::MediaEngine;
use aibridge_rtp_core::PortAllocator;
use aibridge_sip_core::prelude::*;
use aibridge_sip_core::types::caller::{UNKNOWN_CALLER, header_uri, uri_host};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::call::{AcceptedInvite, CallActor, CallCommand, CallContext, CallRegistry};
use crate::config::SessionConfig;
use crate::errors::Result;
use crate::events::{CallEvent, EventBus};
use crate::services::Services;
use crate::transport::{Inbound, SipTransport, local_ip_towards};
use crate::types::{CallId, CallSession};

/// How long shutdown waits for calls to hang up
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const ALLOWED_METHODS: &str = "INVITE, ACK, BYE, CANCEL, OPTIONS";

/// The gateway's signaling side
pub struct SignalingEngine {
    ctx: CallContext,
    registry: CallRegistry,
    removals: mpsc::UnboundedReceiver<CallId>,
}

impl SignalingEngine {
    /// Bind the SIP socket described by `config`
    pub async fn bind(config: SessionConfig, services: Services, events: EventBus) -> Result<Self> {
        let transport = SipTransport::bind(config.bind_addr).await?;
        let allocator = PortAllocator::new(config.rtp_port_min, config.rtp_port_max);
        let (removals_tx, removals) = mpsc::unbounded_channel();

        info!(
            extension = %config.extension,
            rtp_min = config.rtp_port_min,
            rtp_max = config.rtp_port_max,
            "Signaling engine ready on {}",
            transport.local_addr()
        );

        Ok(Self {
            ctx: CallContext {
                config: Arc::new(config),
                services,
                events,
                transport,
                allocator: Arc::new(allocator),
                removals: removals_tx,
            },
            registry: CallRegistry::default(),
            removals,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.ctx.transport.local_addr()
    }

    /// Live view of the calls in progress
    pub fn registry(&self) -> CallRegistry {
        self.registry.clone()
    }

    pub fn events(&self) -> EventBus {
        self.ctx.events.clone()
    }

    /// Serve until `shutdown` fires, then hang up every call
    pub async fn run(mut self, shutdown: CancellationToken) -> Result<()> {
        let mut buf = SipTransport::buffer();
        self.ctx.events.publish(CallEvent::ServerStatus {
            status: format!("listening on {}", self.local_addr()),
        });

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(call_id) = self.removals.recv() => {
                    self.registry.remove(&call_id);
                    debug!(call_id = %call_id, active = self.registry.len(), "Call removed");
                }
                received = self.ctx.transport.receive(&mut buf) => match received {
                    Ok(Inbound::Message { message, source }) => self.route(message, source).await,
                    Ok(Inbound::Garbage { source, error }) => {
                        debug!("Dropping unparseable datagram from {}: {}", source, error);
                    }
                    Err(e) => warn!("SIP receive error: {}", e),
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn shutdown(&mut self) {
        info!(active = self.registry.len(), "Signaling engine shutting down");
        for handle in self.registry.handles() {
            handle.send(CallCommand::Shutdown);
        }

        let registry = self.registry.clone();
        let removals = &mut self.removals;
        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async move {
            while !registry.is_empty() {
                match removals.recv().await {
                    Some(call_id) => {
                        registry.remove(&call_id);
                    }
                    None => break,
                }
            }
        })
        .await;
        if drained.is_err() {
            warn!(remaining = self.registry.len(), "Calls still active after shutdown grace period");
        }

        self.ctx.events.publish(CallEvent::ServerStatus {
            status: "stopped".to_string(),
        });
    }

    async fn route(&mut self, message: SipMessage, source: SocketAddr) {
        let Some(method) = message.method().cloned() else {
            trace!("Ignoring response from {}", source);
            return;
        };
        let Some(call_id) = message.call_id().map(CallId::from) else {
            debug!("{} without Call-ID from {} dropped", method, source);
            return;
        };

        match method {
            Method::Options => {
                let response = ResponseBuilder::for_request(&message, StatusCode::Ok)
                    .header(HeaderName::Allow, ALLOWED_METHODS)
                    .header(HeaderName::UserAgent, self.ctx.config.user_agent.clone())
                    .build();
                self.ctx.transport.send(&response, source).await;
            }
            Method::Invite | Method::Ack | Method::Bye | Method::Cancel => {
                if let Some(handle) = self.registry.get(&call_id) {
                    if !handle.send(CallCommand::Request { message, source }) {
                        debug!(call_id = %call_id, "{} for a call that is ending", method);
                    }
                    return;
                }
                match method {
                    Method::Invite => self.accept_invite(call_id, message, source).await,
                    Method::Bye | Method::Cancel => {
                        debug!(call_id = %call_id, "{} for unknown call", method);
                        self.reject(&message, StatusCode::CallOrTransactionDoesNotExist, source)
                            .await;
                    }
                    _ => trace!(call_id = %call_id, "Stray ACK dropped"),
                }
            }
            other => {
                debug!(call_id = %call_id, "Unsupported method {}", other);
                self.reject(&message, StatusCode::NotImplemented, source).await;
            }
        }
    }

    async fn accept_invite(&mut self, call_id: CallId, message: SipMessage, source: SocketAddr) {
        let config = self.ctx.config.clone();

        if !addressed_to(&message, &config.extension) {
            info!(
                call_id = %call_id,
                uri = message.request_uri().unwrap_or_default(),
                "INVITE for another extension"
            );
            self.reject(&message, StatusCode::NotFound, source).await;
            return;
        }

        let offer = match negotiate_offer(message.body_str().unwrap_or_default()) {
            Ok(offer) => offer,
            Err(e @ aibridge_sip_core::Error::UnsupportedMedia(_)) => {
                warn!(call_id = %call_id, "Cannot accept offer: {}", e);
                self.reject(&message, StatusCode::NotAcceptableHere, source).await;
                return;
            }
            Err(e) => {
                warn!(call_id = %call_id, "Bad SDP offer: {}", e);
                self.reject(&message, StatusCode::BadRequest, source).await;
                return;
            }
        };

        let engine = match MediaEngine::bind(call_id.as_str(), &self.ctx.allocator, config.media.clone()) {
            Ok(engine) => engine,
            Err(e) => {
                warn!(call_id = %call_id, "No media port for call: {}", e);
                self.reject(&message, StatusCode::ServerInternalError, source).await;
                return;
            }
        };

        let caller = message
            .from_header()
            .map(caller_id)
            .unwrap_or_else(|| UNKNOWN_CALLER.to_string());
        let advertised_ip = self.advertised_ip(&message, source);
        let session = CallSession::new(call_id.clone(), caller);

        let (actor, handle) = CallActor::new(
            self.ctx.clone(),
            session,
            AcceptedInvite {
                message,
                source,
                remote_media: SocketAddr::new(offer.address, offer.port),
                advertised_ip,
                engine,
            },
        );
        self.registry.insert(call_id, handle);
        tokio::spawn(actor.run());
    }

    /// Configured address, else the host the caller dialed, else the
    /// interface that routes to the caller
    fn advertised_ip(&self, message: &SipMessage, source: SocketAddr) -> IpAddr {
        if let Some(ip) = self.ctx.config.advertised_ip {
            return ip;
        }
        message
            .request_uri()
            .and_then(uri_host)
            .and_then(|host| host.parse::<IpAddr>().ok())
            .filter(|ip| !ip.is_unspecified())
            .or_else(|| local_ip_towards(source))
            .unwrap_or_else(|| self.local_addr().ip())
    }

    async fn reject(&self, request: &SipMessage, status: StatusCode, destination: SocketAddr) {
        let response = ResponseBuilder::for_request(request, status)
            .to_tag(&generate_tag())
            .header(HeaderName::UserAgent, self.ctx.config.user_agent.clone())
            .build();
        self.ctx.transport.send(&response, destination).await;
    }
}

/// Whether an INVITE is for `extension`. A request-URI without a user part
/// reaches the default extension.
fn addressed_to(message: &SipMessage, extension: &str) -> bool {
    let uri_target = message.request_uri().map(uri_user);
    let to_target = message.to_header().map(header_uri).and_then(uri_user);
    match uri_target {
        Some(Some(user)) if user == extension => true,
        Some(None) | None => true,
        Some(Some(_)) => to_target == Some(extension),
    }
}
