// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! FILE_REQUEST frame (§3): a UTF-8 file name, length-prefixed.

use crate::error::CodecError;

pub const TAG: u8 = 0x1c;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRequest {
    pub name: String,
}

impl FileRequest {
    pub fn encode(&self, out: &mut Vec<u8>) {
        let name_bytes = self.name.as_bytes();
        out.push(TAG);
        out.extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
        out.extend_from_slice(name_bytes);
    }

    pub fn decode(body: &[u8]) -> Result<(Self, usize), CodecError> {
        if body.len() < 2 {
            return Err(CodecError::ShortFrame {
                needed: 2,
                available: body.len(),
            });
        }
        let name_len = u16::from_be_bytes([body[0], body[1]]) as usize;
        if 2 + name_len > body.len() {
            return Err(CodecError::ShortFrame {
                needed: 2 + name_len,
                available: body.len(),
            });
        }
        let name = std::str::from_utf8(&body[2..2 + name_len])
            .map_err(|_| CodecError::InvalidFrameBody {
                reason: "FILE_REQUEST name is not valid UTF-8",
            })?
            .to_owned();
        Ok((FileRequest { name }, 2 + name_len))
    }
}
