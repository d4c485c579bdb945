//! RTP packet (RFC 3550)

mod header;

pub use header::{RtpHeader, RtpHeaderExtension};

use bytes::{Buf, Bytes, BytesMut};

use crate::error::Error;
use crate::{Result, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP packet: header plus payload (padding stripped)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpPacket {
    pub header: RtpHeader,
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a packet from a header and payload
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a packet with a fresh fixed header
    pub fn new_with_payload(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
        payload: Bytes,
    ) -> Self {
        Self::new(
            RtpHeader::new(payload_type, sequence_number, timestamp, ssrc),
            payload,
        )
    }

    /// Encoded size in bytes
    pub fn size(&self) -> usize {
        self.header.size() + self.payload.len()
    }

    /// Parse a datagram
    ///
    /// When the padding bit is set the last octet holds the padding count and
    /// is removed together with the padding from the payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let header = RtpHeader::parse(&mut buf)?;

        let mut payload_len = buf.remaining();
        if header.padding {
            let pad = data.last().copied().map(usize::from).unwrap_or(0);
            if pad == 0 || pad > payload_len {
                return Err(Error::InvalidPacket(format!(
                    "invalid padding length {pad} for {payload_len} payload bytes"
                )));
            }
            payload_len -= pad;
        }

        let payload = Bytes::copy_from_slice(&buf[..payload_len]);
        Ok(Self { header, payload })
    }

    /// Serialize to a contiguous buffer
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.size());
        let mut header = self.header.clone();
        // Padding is stripped on parse and never re-emitted
        header.padding = false;
        header.serialize(&mut buf)?;
        buf.extend_from_slice(&self.payload);
        Ok(buf.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_header_layout() {
        let packet = RtpPacket::new_with_payload(0, 0x1234, 0xDEADBEEF, 0x01020304, Bytes::from_static(&[0xFF; 160]));
        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes.len(), 172);
        assert_eq!(bytes[0], 0x80);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(&bytes[2..4], &[0x12, 0x34]);
        assert_eq!(&bytes[4..8], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(&bytes[8..12], &[0x01, 0x02, 0x03, 0x04]);

        let parsed = RtpPacket::parse(&bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_marker_and_payload_type() {
        let mut packet = RtpPacket::new_with_payload(101, 1, 2, 3, Bytes::from_static(&[1, 2, 3, 4]));
        packet.header.marker = true;
        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes[1], 0x80 | 101);
        let parsed = RtpPacket::parse(&bytes).unwrap();
        assert!(parsed.header.marker);
        assert_eq!(parsed.header.payload_type, 101);
    }

    #[test]
    fn test_csrc_and_extension_are_skipped_to_payload() {
        let mut header = RtpHeader::new(0, 7, 160, 42);
        header.csrc = vec![1, 2];
        header.extensions = Some(RtpHeaderExtension {
            profile: 0xBEDE,
            data: Bytes::from_static(&[9, 9, 9, 9]),
        });
        let packet = RtpPacket::new(header, Bytes::from_static(b"audio"));
        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes.len(), 12 + 8 + 8 + 5);

        let parsed = RtpPacket::parse(&bytes).unwrap();
        assert_eq!(parsed.header.cc, 2);
        assert_eq!(parsed.header.csrc, vec![1, 2]);
        assert_eq!(parsed.payload, Bytes::from_static(b"audio"));
    }

    #[test]
    fn test_padding_is_stripped() {
        let mut raw = RtpPacket::new_with_payload(0, 1, 1, 1, Bytes::from_static(&[5, 6]))
            .serialize()
            .unwrap()
            .to_vec();
        raw[0] |= 0x20;
        raw.extend_from_slice(&[0, 0, 3]);
        let parsed = RtpPacket::parse(&raw).unwrap();
        assert_eq!(parsed.payload.as_ref(), &[5, 6]);
    }

    #[test]
    fn test_malformed_datagrams_are_rejected() {
        assert!(matches!(
            RtpPacket::parse(&[0x80, 0, 0]),
            Err(Error::BufferTooSmall { required: 12, available: 3 })
        ));

        let mut v1 = vec![0u8; 12];
        v1[0] = 0x40;
        assert!(matches!(RtpPacket::parse(&v1), Err(Error::InvalidPacket(_))));

        let mut short_csrc = vec![0u8; 12];
        short_csrc[0] = 0x82;
        assert!(matches!(
            RtpPacket::parse(&short_csrc),
            Err(Error::BufferTooSmall { required: 8, .. })
        ));

        let mut bad_pad = vec![0u8; 13];
        bad_pad[0] = 0xA0;
        bad_pad[12] = 9;
        assert!(RtpPacket::parse(&bad_pad).is_err());
    }
}
