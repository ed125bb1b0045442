// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! The frame codec (§4.2): a tagged union discriminated on the wire tag in the
//! first byte of each frame, replacing the source's `isinstance` dispatch
//! (§9 "Tagged-union frames") with a single `match`.

pub mod file_data;
pub mod file_request;
pub mod file_response;
pub mod key_share;
pub mod new_connection_id;
pub mod padding;
pub mod path_challenge;
pub mod path_response;

use crate::error::CodecError;

pub use file_data::FileData;
pub use file_request::FileRequest;
pub use file_response::FileResponse;
pub use key_share::KeyShare;
pub use new_connection_id::NewConnectionId;
pub use padding::Padding;
pub use path_challenge::PathChallenge;
pub use path_response::PathResponse;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Padding(Padding),
    KeyShare(KeyShare),
    NewConnectionId(NewConnectionId),
    PathChallenge(PathChallenge),
    PathResponse(PathResponse),
    FileRequest(FileRequest),
    FileResponse(FileResponse),
    FileData(FileData),
}

impl Frame {
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Frame::Padding(f) => f.encode(out),
            Frame::KeyShare(f) => f.encode(out),
            Frame::NewConnectionId(f) => f.encode(out),
            Frame::PathChallenge(f) => f.encode(out),
            Frame::PathResponse(f) => f.encode(out),
            Frame::FileRequest(f) => f.encode(out),
            Frame::FileResponse(f) => f.encode(out),
            Frame::FileData(f) => f.encode(out),
        }
    }

    /// Decodes a single frame from the front of `data`, returning the frame
    /// and the total number of bytes consumed (including the tag byte).
    fn decode(data: &[u8]) -> Result<(Self, usize), CodecError> {
        let tag = *data
            .first()
            .ok_or(CodecError::ShortFrame { needed: 1, available: 0 })?;
        let body = &data[1..];

        match tag {
            padding::TAG => Ok((Frame::Padding(Padding), 1)),
            key_share::TAG => {
                let (frame, consumed) = KeyShare::decode(body)?;
                Ok((Frame::KeyShare(frame), consumed + 1))
            }
            new_connection_id::TAG => {
                let (frame, consumed) = NewConnectionId::decode(body)?;
                Ok((Frame::NewConnectionId(frame), consumed + 1))
            }
            path_challenge::TAG => {
                let (frame, consumed) = PathChallenge::decode(body)?;
                Ok((Frame::PathChallenge(frame), consumed + 1))
            }
            path_response::TAG => {
                let (frame, consumed) = PathResponse::decode(body)?;
                Ok((Frame::PathResponse(frame), consumed + 1))
            }
            file_request::TAG => {
                let (frame, consumed) = FileRequest::decode(body)?;
                Ok((Frame::FileRequest(frame), consumed + 1))
            }
            file_response::TAG => {
                let (frame, consumed) = FileResponse::decode(body)?;
                Ok((Frame::FileResponse(frame), consumed + 1))
            }
            file_data::TAG => {
                let (frame, consumed) = FileData::decode(body)?;
                Ok((Frame::FileData(frame), consumed + 1))
            }
            other => Err(CodecError::UnknownFrame { tag: other }),
        }
    }
}

/// Decodes frames contiguously until `data` is exhausted (§4.2). A non-empty
/// trailing remainder that cannot form a complete frame is an error.
pub fn parse_frames(data: &[u8]) -> Result<Vec<Frame>, CodecError> {
    let mut frames = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (frame, consumed) = Frame::decode(&data[pos..])?;
        pos += consumed;
        frames.push(frame);
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_sample_frames() -> Vec<Frame> {
        vec![
            Frame::Padding(Padding),
            Frame::KeyShare(KeyShare {
                public_key: [3u8; key_share::KEY_LEN],
            }),
            Frame::NewConnectionId(NewConnectionId {
                sequence_number: 7,
                connection_id: crate::cid::ConnectionId::from_bytes(&[9, 9, 9, 9, 9, 9, 9, 9])
                    .unwrap(),
            }),
            Frame::PathChallenge(PathChallenge {
                data: [1, 2, 3, 4, 5, 6, 7, 8],
            }),
            Frame::PathResponse(PathResponse {
                data: [1, 2, 3, 4, 5, 6, 7, 8],
            }),
            Frame::FileRequest(FileRequest {
                name: "movie.mp4".to_owned(),
            }),
            Frame::FileResponse(FileResponse {
                file_size: 102400,
                chunk_size: 8192,
            }),
            Frame::FileData(FileData {
                chunk_id: 3,
                data: bytes::Bytes::from_static(b"hello world"),
            }),
        ]
    }

    #[test]
    fn every_frame_round_trips() {
        for frame in all_sample_frames() {
            let mut buf = Vec::new();
            frame.encode(&mut buf);
            let (decoded, consumed) = Frame::decode(&buf).unwrap();
            assert_eq!(decoded, frame);
            assert_eq!(consumed, buf.len());
        }
    }

    #[test]
    fn parse_frames_decodes_a_contiguous_stream() {
        let frames = all_sample_frames();
        let mut buf = Vec::new();
        for frame in &frames {
            frame.encode(&mut buf);
        }
        let parsed = parse_frames(&buf).unwrap();
        assert_eq!(parsed, frames);
    }

    #[test]
    fn unknown_tag_is_an_error() {
        assert!(matches!(
            Frame::decode(&[0xff]),
            Err(CodecError::UnknownFrame { tag: 0xff })
        ));
    }

    #[test]
    fn short_path_challenge_is_an_error() {
        assert!(matches!(
            Frame::decode(&[path_challenge::TAG, 1, 2, 3]),
            Err(CodecError::ShortFrame { .. })
        ));
    }

    #[test]
    fn parse_frames_rejects_trailing_partial_frame() {
        // A lone PATH_CHALLENGE tag with no data is a short frame, not silently dropped.
        let buf = [path_challenge::TAG];
        assert!(parse_frames(&buf).is_err());
    }
}
