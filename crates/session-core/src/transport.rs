//! SIP over UDP
//!
//! One socket per gateway. The listener owns the receive side; call actors
//! hold clones for sending.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use aibridge_sip_core::prelude::*;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use crate::errors::Result;

const MAX_DATAGRAM: usize = 65_535;

/// Something arrived on the SIP socket
#[derive(Debug)]
pub enum Inbound {
    Message { message: SipMessage, source: SocketAddr },
    /// Datagram that is not SIP we understand
    Garbage { source: SocketAddr, error: String },
}

/// Shared SIP socket
#[derive(Debug, Clone)]
pub struct SipTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl SipTransport {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;
        info!("SIP UDP transport bound to {}", local_addr);
        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the next datagram and parse it
    pub async fn receive(&self, buf: &mut [u8]) -> Result<Inbound> {
        let (len, source) = self.socket.recv_from(buf).await?;
        trace!("Received {} bytes from {}", len, source);
        Ok(match parse_message(&buf[..len]) {
            Ok(message) => Inbound::Message { message, source },
            Err(e) => Inbound::Garbage {
                source,
                error: e.to_string(),
            },
        })
    }

    /// Send a message; failures are logged, never returned
    pub async fn send(&self, message: &SipMessage, destination: SocketAddr) {
        let data = message.to_bytes();
        match self.socket.send_to(&data, destination).await {
            Ok(_) => debug!(
                "Sent {} to {}",
                describe(message),
                destination
            ),
            Err(e) => warn!("Failed to send {} to {}: {}", describe(message), destination, e),
        }
    }

    pub(crate) fn buffer() -> Vec<u8> {
        vec![0u8; MAX_DATAGRAM]
    }
}

fn describe(message: &SipMessage) -> String {
    match (message.method(), message.status()) {
        (Some(method), _) => method.as_str().to_string(),
        (None, Some(status)) => status.to_string(),
        _ => "message".to_string(),
    }
}

/// Local interface address the OS would use to reach `peer`
pub fn local_ip_towards(peer: SocketAddr) -> Option<IpAddr> {
    let bind: SocketAddr = if peer.is_ipv4() {
        "0.0.0.0:0".parse().ok()?
    } else {
        "[::]:0".parse().ok()?
    };
    let socket = std::net::UdpSocket::bind(bind).ok()?;
    socket.connect(peer).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    (!ip.is_unspecified()).then_some(ip)
}
