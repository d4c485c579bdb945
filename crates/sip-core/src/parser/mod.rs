//! SIP message parser
//!
//! ```text
//! generic-message  =  start-line *message-header CRLF [ message-body ]
//! start-line       =  Request-Line / Status-Line
//! Request-Line     =  Method SP Request-URI SP SIP-Version CRLF
//! Status-Line      =  SIP-Version SP Status-Code SP Reason-Phrase CRLF
//! ```
//!
//! Bare LF line endings and folded header lines are accepted. The body is cut
//! to Content-Length when the header is present.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{tag, take_till1, take_while_m_n, take_while1},
    character::complete::{char, space0, space1},
    combinator::{all_consuming, map, map_res, rest},
    sequence::{preceded, terminated, tuple},
};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::types::{Header, HeaderName, Method, SipMessage, StartLine};

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-.!%*_+`'~".contains(c)
}

fn sip_version(input: &str) -> IResult<&str, &str> {
    tag("SIP/2.0")(input)
}

fn request_line(input: &str) -> IResult<&str, StartLine> {
    map(
        tuple((
            take_while1(is_token_char),
            space1,
            take_till1(|c: char| c == ' ' || c == '\t'),
            space1,
            sip_version,
            space0,
        )),
        |(method, _, uri, _, _, _): (&str, _, &str, _, _, _)| StartLine::Request {
            method: Method::from(method),
            uri: uri.to_string(),
        },
    )(input)
}

fn status_line(input: &str) -> IResult<&str, StartLine> {
    let (input, _) = terminated(sip_version, space1)(input)?;
    let (input, status) = map_res(
        take_while_m_n(3, 3, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u16>(),
    )(input)?;
    let (input, reason) = preceded(space0, rest)(input)?;
    Ok((
        input,
        StartLine::Response {
            status,
            reason: reason.trim().to_string(),
        },
    ))
}

fn start_line(input: &str) -> IResult<&str, StartLine> {
    all_consuming(alt((status_line, request_line)))(input)
}

fn header_line(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, name) = take_while1(is_token_char)(input)?;
    let (input, _) = tuple((space0, char(':'), space0))(input)?;
    let (input, value) = rest(input)?;
    Ok((input, (name, value.trim())))
}

fn split_head_body(data: &[u8]) -> (&[u8], &[u8]) {
    if let Some(pos) = find(data, b"\r\n\r\n") {
        return (&data[..pos], &data[pos + 4..]);
    }
    if let Some(pos) = find(data, b"\n\n") {
        return (&data[..pos], &data[pos + 2..]);
    }
    (data, &[])
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Parse one SIP message from a datagram
pub fn parse_message(data: &[u8]) -> Result<SipMessage> {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .ok_or_else(|| Error::ParseError("empty message".to_string()))?;
    let (head, body) = split_head_body(&data[start..]);
    let head = std::str::from_utf8(head)?;

    let mut lines = head.split('\n').map(|l| l.trim_end_matches('\r'));
    let first = lines
        .next()
        .ok_or_else(|| Error::ParseError("missing start line".to_string()))?;
    let (_, start_line) =
        start_line(first).map_err(|e| Error::ParseError(format!("bad start line {first:?}: {e}")))?;

    if let StartLine::Response { status, .. } = &start_line {
        if !(100..=699).contains(status) {
            return Err(Error::InvalidStatusCode(*status));
        }
    }

    let mut headers: Vec<Header> = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            let last = headers
                .last_mut()
                .ok_or_else(|| Error::ParseError("continuation before first header".to_string()))?;
            last.value.push(' ');
            last.value.push_str(line.trim());
            continue;
        }
        let (_, (name, value)) = header_line(line)
            .map_err(|e| Error::ParseError(format!("bad header line {line:?}: {e}")))?;
        headers.push(Header {
            name: HeaderName::from_wire(name),
            value: value.to_string(),
        });
    }

    let declared = headers
        .iter()
        .find(|h| h.name == HeaderName::ContentLength)
        .map(|h| {
            h.value
                .parse::<usize>()
                .map_err(|_| Error::ParseError(format!("bad Content-Length {:?}", h.value)))
        })
        .transpose()?;

    let body = match declared {
        Some(len) if len > body.len() => {
            return Err(Error::ParseError(format!(
                "Content-Length {len} exceeds {} received body bytes",
                body.len()
            )));
        }
        Some(len) => Bytes::copy_from_slice(&body[..len]),
        None => Bytes::copy_from_slice(body),
    };

    Ok(SipMessage {
        start_line,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INVITE: &str = "INVITE sip:5000@10.0.0.56:5060 SIP/2.0\r\n\
Via: SIP/2.0/UDP 10.0.0.1:5060;branch=z9hG4bK776asdhds\r\n\
Via: SIP/2.0/UDP 10.0.0.2:5060;branch=z9hG4bKnashds8\r\n\
Max-Forwards: 70\r\n\
From: \"Jane Doe\" <sip:jane@10.0.0.1>;tag=1928301774\r\n\
To: <sip:5000@10.0.0.56>\r\n\
Call-ID: a84b4c76e66710@pc33\r\n\
CSeq: 314159 INVITE\r\n\
Content-Type: application/sdp\r\n\
Content-Length: 4\r\n\
\r\n\
v=0\nEXTRA";

    #[test]
    fn test_parse_invite() {
        let msg = parse_message(INVITE.as_bytes()).unwrap();
        assert_eq!(msg.method(), Some(&Method::Invite));
        assert_eq!(msg.request_uri(), Some("sip:5000@10.0.0.56:5060"));
        assert_eq!(msg.headers_named(&HeaderName::Via).count(), 2);
        assert_eq!(msg.call_id(), Some("a84b4c76e66710@pc33"));
        assert_eq!(msg.cseq(), Some((314159, Method::Invite)));
        assert_eq!(msg.body.as_ref(), b"v=0\n");
    }

    #[test]
    fn test_parse_response_and_compact_headers() {
        let raw = "SIP/2.0 180 Ringing\r\ni: xyz\r\nl: 0\r\n\r\n";
        let msg = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(msg.status(), Some(180));
        assert_eq!(msg.call_id(), Some("xyz"));
        assert!(msg.body.is_empty());
    }

    #[test]
    fn test_bare_lf_and_folding() {
        let raw = "BYE sip:a@b SIP/2.0\nCall-ID: one\nSubject: first\n  second\n\n";
        let msg = parse_message(raw.as_bytes()).unwrap();
        assert_eq!(msg.method(), Some(&Method::Bye));
        assert_eq!(msg.header(&HeaderName::Subject), Some("first second"));
    }

    #[test]
    fn test_leading_keepalive_crlf_is_skipped() {
        let raw = "\r\n\r\nOPTIONS sip:x@y SIP/2.0\r\nCall-ID: k\r\n\r\n";
        assert_eq!(parse_message(raw.as_bytes()).unwrap().call_id(), Some("k"));
    }

    #[test]
    fn test_malformed_messages() {
        assert!(parse_message(b"").is_err());
        assert!(parse_message(b"\r\n\r\n").is_err());
        assert!(parse_message(b"hello world\r\n\r\n").is_err());
        assert!(parse_message(b"INVITE sip:a@b HTTP/1.1\r\n\r\n").is_err());
        assert!(parse_message(b"SIP/2.0 999 Nope\r\n\r\n").is_err());
        assert!(parse_message(b"BYE sip:a@b SIP/2.0\r\nno colon here\r\n\r\n").is_err());
        assert!(parse_message(b"BYE sip:a@b SIP/2.0\r\nContent-Length: 10\r\n\r\nshort").is_err());
        assert!(parse_message(&[0xFF, 0xFE, b'\r', b'\n']).is_err());
    }
}
