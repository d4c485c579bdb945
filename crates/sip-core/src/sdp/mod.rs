//! SDP offer/answer for a single PCMU audio stream
//!
//! The gateway answers every call with G.711 μ-law at 8kHz in 20ms packets
//! and advertises RFC 4733 telephone events so DTMF arrives on its own
//! payload type instead of as in-band tones.

use std::fmt;
use std::net::IpAddr;

use nom::{
    IResult,
    bytes::complete::{tag, take_while1},
    character::complete::{digit1, space1},
    combinator::{map_res, opt},
    multi::many0,
    sequence::preceded,
};
use tracing::debug;

use crate::error::{Error, Result};

/// Static payload type for PCMU
pub const PCMU: u8 = 0;

/// Payload type we advertise for telephone events
pub const TELEPHONE_EVENT: u8 = 101;

/// Stream direction attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::SendRecv => "sendrecv",
            Direction::SendOnly => "sendonly",
            Direction::RecvOnly => "recvonly",
            Direction::Inactive => "inactive",
        })
    }
}

/// Audio stream offered by the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaOffer {
    /// Where the caller expects to receive RTP
    pub address: IpAddr,
    pub port: u16,
    /// Offered payload types in preference order
    pub payload_types: Vec<u8>,
    /// Payload type the caller uses for telephone events, if any
    pub telephone_event: Option<u8>,
    pub ptime: Option<u32>,
    pub direction: Direction,
}

struct MediaLine<'a> {
    media: &'a str,
    port: u16,
    formats: Vec<u8>,
}

fn media_line(input: &str) -> IResult<&str, MediaLine<'_>> {
    let (input, _) = tag("m=")(input)?;
    let (input, media) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;
    let (input, port) = preceded(space1, map_res(digit1, str::parse::<u16>))(input)?;
    // Optional "/<count>" port range
    let (input, _) = opt(preceded(tag("/"), digit1))(input)?;
    let (input, _) = preceded(space1, take_while1(|c: char| !c.is_whitespace()))(input)?;
    let (input, formats) = many0(preceded(space1, map_res(digit1, str::parse::<u8>)))(input)?;
    Ok((
        input,
        MediaLine {
            media,
            port,
            formats,
        },
    ))
}

fn connection_line(input: &str) -> IResult<&str, IpAddr> {
    let (input, _) = tag("c=IN")(input)?;
    let (input, _) = preceded(space1, take_while1(|c: char| c.is_ascii_alphanumeric()))(input)?;
    // Multicast TTL suffixes ("/127") are cut off before parsing
    preceded(
        space1,
        map_res(take_while1(|c: char| !c.is_whitespace() && c != '/'), str::parse::<IpAddr>),
    )(input)
}

fn rtpmap(value: &str) -> Option<(u8, &str)> {
    let (pt, encoding) = value.split_once(' ')?;
    Some((pt.trim().parse().ok()?, encoding.trim()))
}

/// Extract the audio stream from an SDP offer and check that PCMU is on it.
///
/// Returns [`Error::InvalidSdp`] when the body cannot be understood and
/// [`Error::UnsupportedMedia`] when it is well formed but has no usable
/// PCMU audio stream.
pub fn negotiate_offer(body: &str) -> Result<MediaOffer> {
    if body.trim().is_empty() {
        return Err(Error::InvalidSdp("empty body".to_string()));
    }

    let mut session_address: Option<IpAddr> = None;
    let mut audio: Option<(MediaLine<'_>, Option<IpAddr>)> = None;
    let mut in_audio = false;
    let mut seen_media = false;
    let mut telephone_event = None;
    let mut ptime = None;
    let mut direction = Direction::SendRecv;
    let mut saw_version = false;

    for line in body.lines().map(str::trim) {
        if line.starts_with("v=") {
            saw_version = true;
        } else if line.starts_with("m=") {
            let (_, media) = media_line(line)
                .map_err(|e| Error::InvalidSdp(format!("bad media line {line:?}: {e}")))?;
            seen_media = true;
            in_audio = media.media == "audio" && audio.is_none();
            if in_audio {
                audio = Some((media, None));
            }
        } else if line.starts_with("c=") {
            let (_, addr) = connection_line(line)
                .map_err(|e| Error::InvalidSdp(format!("bad connection line {line:?}: {e}")))?;
            if !seen_media {
                session_address = Some(addr);
            } else if let Some((_, media_addr)) = audio.as_mut().filter(|_| in_audio) {
                *media_addr = Some(addr);
            }
        } else if let Some(attr) = line.strip_prefix("a=") {
            if seen_media && !in_audio {
                continue;
            }
            if let Some(value) = attr.strip_prefix("rtpmap:") {
                if let Some((pt, encoding)) = rtpmap(value) {
                    if encoding.to_ascii_lowercase().starts_with("telephone-event/") {
                        telephone_event = Some(pt);
                    }
                }
            } else if let Some(value) = attr.strip_prefix("ptime:") {
                ptime = value.trim().parse().ok();
            } else {
                match attr {
                    "sendrecv" => direction = Direction::SendRecv,
                    "sendonly" => direction = Direction::SendOnly,
                    "recvonly" => direction = Direction::RecvOnly,
                    "inactive" => direction = Direction::Inactive,
                    _ => {}
                }
            }
        }
    }

    if !saw_version {
        return Err(Error::InvalidSdp("missing v= line".to_string()));
    }
    let (media, media_address) =
        audio.ok_or_else(|| Error::UnsupportedMedia("no audio stream offered".to_string()))?;
    let address = media_address
        .or(session_address)
        .ok_or_else(|| Error::InvalidSdp("no connection address".to_string()))?;

    if media.port == 0 {
        return Err(Error::UnsupportedMedia("audio stream disabled (port 0)".to_string()));
    }
    if !media.formats.contains(&PCMU) {
        return Err(Error::UnsupportedMedia(format!(
            "PCMU not offered (payload types {:?})",
            media.formats
        )));
    }

    debug!(
        "SDP offer: audio at {}:{} formats {:?} ptime {:?}",
        address, media.port, media.formats, ptime
    );

    Ok(MediaOffer {
        address,
        port: media.port,
        payload_types: media.formats,
        telephone_event,
        ptime,
        direction,
    })
}

/// Local SDP answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdpAnswer {
    pub username: String,
    pub session_id: u64,
    pub address: IpAddr,
    pub port: u16,
}

impl SdpAnswer {
    pub fn new(address: IpAddr, port: u16) -> Self {
        Self {
            username: "aibridge".to_string(),
            session_id: u64::from(rand::random::<u32>()),
            address,
            port,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    fn addr_type(&self) -> &'static str {
        if self.address.is_ipv6() { "IP6" } else { "IP4" }
    }
}

impl fmt::Display for SdpAnswer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let at = self.addr_type();
        write!(
            f,
            "v=0\r\n\
             o={user} {id} {id} IN {at} {addr}\r\n\
             s=aibridge\r\n\
             c=IN {at} {addr}\r\n\
             t=0 0\r\n\
             m=audio {port} RTP/AVP {pcmu} {te}\r\n\
             a=rtpmap:{pcmu} PCMU/8000\r\n\
             a=rtpmap:{te} telephone-event/8000\r\n\
             a=fmtp:{te} 0-15\r\n\
             a=ptime:20\r\n\
             a=sendrecv\r\n",
            user = self.username,
            id = self.session_id,
            at = at,
            addr = self.address,
            port = self.port,
            pcmu = PCMU,
            te = TELEPHONE_EVENT,
        )
    }
}
