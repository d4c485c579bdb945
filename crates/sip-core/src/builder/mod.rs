//! Message builders
//!
//! [`ResponseBuilder`] copies the dialog-identifying headers of a request
//! verbatim (every Via in order, From, To, Call-ID, CSeq) so that the peer
//! can match the response to its transaction. [`RequestBuilder`] assembles
//! in-dialog requests such as a gateway-initiated BYE.

use bytes::Bytes;

use crate::types::caller::with_tag;
use crate::types::{HeaderName, Method, SipMessage, StatusCode};

/// Magic cookie that marks RFC 3261 branch parameters
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// Random dialog tag
pub fn generate_tag() -> String {
    format!("{:08x}", rand::random::<u32>())
}

/// Random Via branch parameter
pub fn generate_branch() -> String {
    format!("{BRANCH_MAGIC_COOKIE}{:016x}", rand::random::<u64>())
}

/// Builder for a response to a received request
#[derive(Debug, Clone)]
pub struct ResponseBuilder {
    message: SipMessage,
}

impl ResponseBuilder {
    /// Start a response echoing the request's Via, From, To, Call-ID and CSeq
    pub fn for_request(request: &SipMessage, status: StatusCode) -> Self {
        let mut message = SipMessage::response(status);
        for name in [
            HeaderName::Via,
            HeaderName::From,
            HeaderName::To,
            HeaderName::CallId,
            HeaderName::CSeq,
        ] {
            for value in request.headers_named(&name) {
                message.add_header(name.clone(), value);
            }
        }
        Self { message }
    }

    /// Add our tag to the To header unless the request already carries one
    pub fn to_tag(mut self, tag: &str) -> Self {
        if let Some(header) = self
            .message
            .headers
            .iter_mut()
            .find(|h| h.name == HeaderName::To)
        {
            header.value = with_tag(&header.value, tag);
        }
        self
    }

    pub fn contact(mut self, uri: &str) -> Self {
        self.message.add_header(HeaderName::Contact, format!("<{uri}>"));
        self
    }

    pub fn header(mut self, name: impl Into<HeaderName>, value: impl Into<String>) -> Self {
        self.message.add_header(name, value);
        self
    }

    /// Attach an SDP body
    pub fn sdp(mut self, body: impl Into<Bytes>) -> Self {
        self.message
            .set_header(HeaderName::ContentType, "application/sdp");
        self.message.body = body.into();
        self
    }

    pub fn build(self) -> SipMessage {
        self.message
    }
}

/// Builder for an outgoing request
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    message: SipMessage,
}

impl RequestBuilder {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        let mut message = SipMessage::request(method, uri);
        message.add_header(HeaderName::MaxForwards, "70");
        Self { message }
    }

    /// Top Via for a UDP request sent from `sent_by` (host:port)
    pub fn via(mut self, sent_by: &str, branch: &str) -> Self {
        self.message.add_header(
            HeaderName::Via,
            format!("SIP/2.0/UDP {sent_by};branch={branch};rport"),
        );
        self
    }

    pub fn from(mut self, value: impl Into<String>) -> Self {
        self.message.add_header(HeaderName::From, value);
        self
    }

    pub fn to(mut self, value: impl Into<String>) -> Self {
        self.message.add_header(HeaderName::To, value);
        self
    }

    pub fn call_id(mut self, call_id: impl Into<String>) -> Self {
        self.message.add_header(HeaderName::CallId, call_id);
        self
    }

    pub fn cseq(mut self, number: u32) -> Self {
        let method = self
            .message
            .method()
            .map(|m| m.to_string())
            .unwrap_or_default();
        self.message
            .add_header(HeaderName::CSeq, format!("{number} {method}"));
        self
    }

    pub fn header(mut self, name: impl Into<HeaderName>, value: impl Into<String>) -> Self {
        self.message.add_header(name, value);
        self
    }

    pub fn build(self) -> SipMessage {
        self.message
    }
}
