//! Media port allocation
//!
//! Every call binds its own UDP socket. Ports come from a configured range
//! shared by all calls; a lease returns its port to the pool when dropped.
//! When the range is exhausted the allocator falls back to an OS-assigned
//! port.

use std::collections::BTreeSet;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::Result;
use crate::error::Error;

#[derive(Debug)]
struct AllocatorState {
    min: u16,
    max: u16,
    in_use: BTreeSet<u16>,
    cursor: u16,
}

/// Shared allocator for per-call media ports
#[derive(Debug, Clone)]
pub struct PortAllocator {
    state: Arc<Mutex<AllocatorState>>,
    fallback_to_ephemeral: bool,
}

/// A socket bound on an allocated port together with its lease
#[derive(Debug)]
pub struct BoundPort {
    pub socket: UdpSocket,
    pub lease: PortLease,
}

impl BoundPort {
    pub fn port(&self) -> u16 {
        self.lease.port()
    }
}

/// Reservation of one port; released on drop
#[derive(Debug)]
pub struct PortLease {
    port: u16,
    slot: u16,
    pooled: bool,
    state: Arc<Mutex<AllocatorState>>,
}

impl PortLease {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether the port came from the configured range
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }
}

impl Drop for PortLease {
    fn drop(&mut self) {
        if self.pooled {
            self.state.lock().in_use.remove(&self.slot);
            debug!("Released media port {}", self.port);
        }
    }
}

impl PortAllocator {
    /// Create an allocator for the inclusive range `min..=max`
    pub fn new(min: u16, max: u16) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            state: Arc::new(Mutex::new(AllocatorState {
                min,
                max,
                in_use: BTreeSet::new(),
                cursor: min,
            })),
            fallback_to_ephemeral: true,
        }
    }

    /// Disable the OS-assigned port fallback
    pub fn without_fallback(mut self) -> Self {
        self.fallback_to_ephemeral = false;
        self
    }

    pub fn range(&self) -> (u16, u16) {
        let state = self.state.lock();
        (state.min, state.max)
    }

    /// Ports currently leased from the range
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use.len()
    }

    /// Bind a non-blocking UDP socket on the next free port.
    ///
    /// Selection and binding happen under the allocator lock so two calls
    /// can never be handed the same port.
    pub fn allocate(&self, bind_ip: IpAddr) -> Result<BoundPort> {
        let mut state = self.state.lock();
        let span = u32::from(state.max - state.min) + 1;
        let mut last_err: Option<std::io::Error> = None;

        for _ in 0..span {
            let candidate = state.cursor;
            state.cursor = if candidate >= state.max {
                state.min
            } else {
                candidate + 1
            };
            if state.in_use.contains(&candidate) {
                continue;
            }

            match bind(bind_ip, candidate) {
                Ok(socket) => {
                    let port = socket.local_addr()?.port();
                    state.in_use.insert(candidate);
                    debug!("Allocated media port {}", port);
                    return Ok(BoundPort {
                        socket,
                        lease: PortLease {
                            port,
                            slot: candidate,
                            pooled: true,
                            state: self.state.clone(),
                        },
                    });
                }
                Err(e) => {
                    debug!("Media port {} unavailable: {}", candidate, e);
                    last_err = Some(e);
                }
            }
        }

        let (min, max) = (state.min, state.max);
        drop(state);

        if !self.fallback_to_ephemeral {
            return Err(Error::PortExhausted {
                min,
                max,
                reason: last_err.map_or_else(|| "all ports leased".to_string(), |e| e.to_string()),
            });
        }

        warn!(
            "No free media port in {}-{}, falling back to an OS-assigned port",
            min, max
        );
        let socket = bind(bind_ip, 0).map_err(|e| Error::PortExhausted {
            min,
            max,
            reason: format!("ephemeral fallback failed: {e}"),
        })?;
        let port = socket.local_addr()?.port();
        Ok(BoundPort {
            socket,
            lease: PortLease {
                port,
                slot: 0,
                pooled: false,
                state: self.state.clone(),
            },
        })
    }
}

fn bind(ip: IpAddr, port: u16) -> std::io::Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddr::new(ip, port))?;
    socket.set_nonblocking(true)?;
    Ok(socket)
}
