// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Combines a header with a sequence of frames into a datagram, and the
//! reverse (§4.3).

use crate::{
    error::CodecError,
    frame::{self, Frame},
    packet::header::Header,
};

/// Emits `header bytes ‖ 2-byte big-endian frame-region length ‖ frame bytes`.
pub fn create_packet(header: &Header, frames: &[Frame]) -> Vec<u8> {
    let mut body = Vec::new();
    for frame in frames {
        frame.encode(&mut body);
    }

    let mut out = Vec::with_capacity(header_len_estimate() + 2 + body.len());
    header.encode(&mut out);
    out.extend_from_slice(&(body.len() as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out
}

fn header_len_estimate() -> usize {
    // type byte + two length bytes + two full-length CIDs, a reasonable capacity hint.
    1 + 2 + 2 * crate::cid::MAX_LEN
}

/// Reads the header, reads the 2-byte frame-region length, slices exactly that
/// many bytes, and parses the frame stream from that slice. Bytes beyond the
/// frame region are ignored (reserved for a future AEAD tag).
pub fn parse_packet(data: &[u8]) -> Result<(Header, Vec<Frame>), CodecError> {
    let (header, consumed) = Header::decode(data)?;
    let rest = &data[consumed..];

    if rest.len() < 2 {
        return Err(CodecError::TruncatedPacket {
            declared: 0,
            available: rest.len(),
        });
    }
    let frame_region_len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
    let frame_region = &rest[2..];
    if frame_region_len > frame_region.len() {
        return Err(CodecError::TruncatedPacket {
            declared: frame_region_len,
            available: frame_region.len(),
        });
    }

    let frames = frame::parse_frames(&frame_region[..frame_region_len])?;
    Ok((header, frames))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cid::ConnectionId, packet::header::PacketType};

    fn sample_header() -> Header {
        Header::new(
            PacketType::Short,
            ConnectionId::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap(),
            ConnectionId::from_bytes(&[8, 7, 6, 5, 4, 3, 2, 1]).unwrap(),
        )
    }

    #[test]
    fn round_trips_header_and_frames() {
        let header = sample_header();
        let frames = vec![
            Frame::PathChallenge(frame::PathChallenge {
                data: [1; 8],
            }),
            Frame::FileRequest(frame::FileRequest {
                name: "test.bin".to_owned(),
            }),
        ];
        let packet = create_packet(&header, &frames);
        let (decoded_header, decoded_frames) = parse_packet(&packet).unwrap();
        assert_eq!(decoded_header, header);
        assert_eq!(decoded_frames, frames);
    }

    #[test]
    fn round_trips_with_no_frames() {
        let header = sample_header();
        let packet = create_packet(&header, &[]);
        let (decoded_header, decoded_frames) = parse_packet(&packet).unwrap();
        assert_eq!(decoded_header, header);
        assert!(decoded_frames.is_empty());
    }

    #[test]
    fn trailing_bytes_beyond_frame_region_are_ignored() {
        let header = sample_header();
        let mut packet = create_packet(&header, &[]);
        packet.extend_from_slice(&[0xde, 0xad, 0xbe, 0xef]); // reserved for a future AEAD tag
        let (decoded_header, decoded_frames) = parse_packet(&packet).unwrap();
        assert_eq!(decoded_header, header);
        assert!(decoded_frames.is_empty());
    }

    #[test]
    fn overrunning_length_prefix_is_truncated_packet() {
        let header = sample_header();
        let mut packet = create_packet(&header, &[]);
        // Rewrite the frame-region length to claim more bytes than exist.
        let header_len = {
            let (_h, consumed) = Header::decode(&packet).unwrap();
            consumed
        };
        packet[header_len] = 0xff;
        packet[header_len + 1] = 0xff;
        assert!(matches!(
            parse_packet(&packet),
            Err(CodecError::TruncatedPacket { .. })
        ));
    }
}
