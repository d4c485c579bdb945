//! # SIP-Core: the SIP subset a directly-routed voice gateway needs
//!
//! This crate understands just enough SIP (RFC 3261) and SDP (RFC 4566) to
//! accept inbound calls routed straight to the gateway:
//!
//! - Parsing requests and responses received over UDP ([`parser`])
//! - Building responses that echo the dialog headers verbatim ([`builder`])
//! - Extracting the caller identity and dialog tags ([`types::caller`])
//! - Negotiating a single narrowband audio stream ([`sdp`])
//!
//! Registration, proxying, authentication and transfers are not supported.
//!
//! ## Example
//!
//! ```rust
//! use aibridge_sip_core::prelude::*;
//!
//! let raw = b"OPTIONS sip:5000@10.0.0.5 SIP/2.0\r\n\
//! Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK1\r\n\
//! From: <sip:pbx@10.0.0.1>;tag=a\r\n\
//! To: <sip:5000@10.0.0.5>\r\n\
//! Call-ID: ping-1\r\n\
//! CSeq: 1 OPTIONS\r\n\
//! Content-Length: 0\r\n\r\n";
//!
//! let request = parse_message(raw).unwrap();
//! assert_eq!(request.method(), Some(&Method::Options));
//!
//! let response = ResponseBuilder::for_request(&request, StatusCode::Ok).build();
//! assert_eq!(response.call_id(), Some("ping-1"));
//! ```

pub mod builder;
pub mod error;
pub mod parser;
pub mod sdp;
pub mod types;

pub use error::{Error, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::builder::{RequestBuilder, ResponseBuilder, generate_branch, generate_tag};
    pub use crate::error::Error;
    pub use crate::parser::parse_message;
    pub use crate::sdp::{MediaOffer, SdpAnswer, negotiate_offer};
    pub use crate::types::caller::{caller_id, header_tag, uri_user};
    pub use crate::types::{Header, HeaderName, Method, SipMessage, StartLine, StatusCode};
}
