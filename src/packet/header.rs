// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Long/short packet headers (§4.1).
//!
//! Wire layout is identical across all three packet types in this subset: a 1-byte type
//! tag, a 1-byte DCID length, the DCID, a 1-byte SCID length, and the SCID.

use crate::{cid::ConnectionId, error::CodecError};

/// The three packet types this subset recognizes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketType {
    Initial,
    Handshake,
    Short,
}

impl PacketType {
    const fn tag(self) -> u8 {
        match self {
            PacketType::Initial => 0x00,
            PacketType::Handshake => 0x02,
            PacketType::Short => 0x40,
        }
    }

    fn from_tag(tag: u8) -> Result<Self, CodecError> {
        match tag {
            0x00 => Ok(PacketType::Initial),
            0x02 => Ok(PacketType::Handshake),
            0x40 => Ok(PacketType::Short),
            _ => Err(CodecError::MalformedHeader {
                reason: "unrecognized packet type tag",
            }),
        }
    }
}

/// A packet header: a type tag plus the destination and source connection IDs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub packet_type: PacketType,
    pub destination_cid: ConnectionId,
    pub source_cid: ConnectionId,
}

impl Header {
    pub fn new(
        packet_type: PacketType,
        destination_cid: ConnectionId,
        source_cid: ConnectionId,
    ) -> Self {
        Self {
            packet_type,
            destination_cid,
            source_cid,
        }
    }

    /// Encodes this header, appending to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.packet_type.tag());
        out.push(self.destination_cid.len() as u8);
        out.extend_from_slice(self.destination_cid.as_bytes());
        out.push(self.source_cid.len() as u8);
        out.extend_from_slice(self.source_cid.as_bytes());
    }

    /// Decodes a header from the front of `data`, returning the header and the
    /// number of bytes consumed.
    ///
    /// Fails with [`CodecError::MalformedHeader`] if the buffer is shorter than 2
    /// bytes, if either length field overruns the remaining buffer, or if an
    /// Initial packet carries a zero-length destination connection ID.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), CodecError> {
        if data.len() < 2 {
            return Err(CodecError::MalformedHeader {
                reason: "buffer shorter than the minimum 2-byte header prefix",
            });
        }

        let packet_type = PacketType::from_tag(data[0])?;
        let mut pos = 1;

        let dcid_len = data[pos] as usize;
        pos += 1;
        if dcid_len > crate::cid::MAX_LEN || pos + dcid_len > data.len() {
            return Err(CodecError::MalformedHeader {
                reason: "destination connection id length overruns buffer",
            });
        }
        let destination_cid = ConnectionId::from_bytes(&data[pos..pos + dcid_len])?;
        pos += dcid_len;

        if pos >= data.len() {
            return Err(CodecError::MalformedHeader {
                reason: "buffer too short for source connection id length",
            });
        }
        let scid_len = data[pos] as usize;
        pos += 1;
        if scid_len > crate::cid::MAX_LEN || pos + scid_len > data.len() {
            return Err(CodecError::MalformedHeader {
                reason: "source connection id length overruns buffer",
            });
        }
        let source_cid = ConnectionId::from_bytes(&data[pos..pos + scid_len])?;
        pos += scid_len;

        if packet_type == PacketType::Initial && destination_cid.is_empty() {
            return Err(CodecError::MalformedHeader {
                reason: "Initial packet must carry a non-empty destination connection id",
            });
        }

        Ok((
            Header {
                packet_type,
                destination_cid,
                source_cid,
            },
            pos,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn sample_header(packet_type: PacketType) -> Header {
        let mut rng = OsRng;
        Header::new(
            packet_type,
            ConnectionId::generate(&mut rng),
            ConnectionId::generate(&mut rng),
        )
    }

    #[test]
    fn round_trips_each_packet_type() {
        for packet_type in [PacketType::Initial, PacketType::Handshake, PacketType::Short] {
            let header = sample_header(packet_type);
            let mut buf = Vec::new();
            header.encode(&mut buf);
            let (decoded, consumed) = Header::decode(&buf).unwrap();
            assert_eq!(decoded, header);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn rejects_short_buffers() {
        assert!(matches!(
            Header::decode(&[0x00]),
            Err(CodecError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn rejects_overrunning_length_field() {
        // type=Initial, dcid_len=10 but only one more byte follows
        let buf = [0x00, 10, 1];
        assert!(matches!(
            Header::decode(&buf),
            Err(CodecError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn rejects_zero_length_dcid_on_initial() {
        let header = Header::new(
            PacketType::Initial,
            ConnectionId::EMPTY,
            ConnectionId::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
        );
        let mut buf = Vec::new();
        header.encode(&mut buf);
        assert!(matches!(
            Header::decode(&buf),
            Err(CodecError::MalformedHeader { .. })
        ));
    }
}
