//! SIP message model

pub mod caller;
mod header;
mod message;
mod method;
mod status;

pub use header::{Header, HeaderName};
pub use message::{SipMessage, StartLine};
pub use method::Method;
pub use status::StatusCode;
