use std::fmt::Write as _;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use super::header::{Header, HeaderName};
use super::method::Method;
use super::status::StatusCode;

/// First line of a SIP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartLine {
    Request { method: Method, uri: String },
    Response { status: u16, reason: String },
}

/// A parsed or built SIP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SipMessage {
    pub start_line: StartLine,
    pub headers: Vec<Header>,
    pub body: Bytes,
}

impl SipMessage {
    pub fn request(method: Method, uri: impl Into<String>) -> Self {
        Self {
            start_line: StartLine::Request {
                method,
                uri: uri.into(),
            },
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn response(status: StatusCode) -> Self {
        Self {
            start_line: StartLine::Response {
                status: status.as_u16(),
                reason: status.reason_phrase().to_string(),
            },
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.start_line, StartLine::Request { .. })
    }

    /// Request method, `None` for responses
    pub fn method(&self) -> Option<&Method> {
        match &self.start_line {
            StartLine::Request { method, .. } => Some(method),
            StartLine::Response { .. } => None,
        }
    }

    /// Request-URI, `None` for responses
    pub fn request_uri(&self) -> Option<&str> {
        match &self.start_line {
            StartLine::Request { uri, .. } => Some(uri),
            StartLine::Response { .. } => None,
        }
    }

    /// Status code, `None` for requests
    pub fn status(&self) -> Option<u16> {
        match &self.start_line {
            StartLine::Response { status, .. } => Some(*status),
            StartLine::Request { .. } => None,
        }
    }

    /// First value of a header
    pub fn header(&self, name: &HeaderName) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| &h.name == name)
            .map(|h| h.value.as_str())
    }

    /// All values of a header in message order
    pub fn headers_named<'a>(&'a self, name: &'a HeaderName) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| &h.name == name)
            .map(|h| h.value.as_str())
    }

    pub fn add_header(&mut self, name: impl Into<HeaderName>, value: impl Into<String>) {
        self.headers.push(Header::new(name, value));
    }

    /// Replace every occurrence of a header with a single value
    pub fn set_header(&mut self, name: HeaderName, value: impl Into<String>) {
        self.headers.retain(|h| h.name != name);
        self.headers.push(Header {
            name,
            value: value.into(),
        });
    }

    pub fn call_id(&self) -> Option<&str> {
        self.header(&HeaderName::CallId).map(str::trim)
    }

    pub fn from_header(&self) -> Option<&str> {
        self.header(&HeaderName::From)
    }

    pub fn to_header(&self) -> Option<&str> {
        self.header(&HeaderName::To)
    }

    /// CSeq number and method
    pub fn cseq(&self) -> Option<(u32, Method)> {
        let value = self.header(&HeaderName::CSeq)?;
        let mut parts = value.split_whitespace();
        let number = parts.next()?.parse().ok()?;
        let method = Method::from_str(parts.next()?).ok()?;
        Some((number, method))
    }

    /// Body as text if it is valid UTF-8
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    /// Serialize for the wire
    ///
    /// Content-Length is always written last and always matches the body;
    /// any Content-Length header stored on the message is ignored.
    pub fn to_bytes(&self) -> Bytes {
        let mut head = String::with_capacity(512);
        match &self.start_line {
            StartLine::Request { method, uri } => {
                let _ = write!(head, "{method} {uri} SIP/2.0\r\n");
            }
            StartLine::Response { status, reason } => {
                let _ = write!(head, "SIP/2.0 {status} {reason}\r\n");
            }
        }
        for header in self
            .headers
            .iter()
            .filter(|h| h.name != HeaderName::ContentLength)
        {
            let _ = write!(head, "{}: {}\r\n", header.name, header.value);
        }
        let _ = write!(head, "Content-Length: {}\r\n\r\n", self.body.len());

        let mut buf = BytesMut::with_capacity(head.len() + self.body.len());
        buf.put_slice(head.as_bytes());
        buf.put_slice(&self.body);
        buf.freeze()
    }
}
