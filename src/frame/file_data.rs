// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! FILE_DATA frame (§3): one chunk of a file transfer, identified by a
//! monotonic `chunk_id` the client assembles in order (§9 open question: no
//! gap detection or retransmission).

use crate::error::CodecError;
use bytes::Bytes;

pub const TAG: u8 = 0x1e;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileData {
    pub chunk_id: u32,
    pub data: Bytes,
}

impl FileData {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG);
        out.extend_from_slice(&self.chunk_id.to_be_bytes());
        out.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.data);
    }

    pub fn decode(body: &[u8]) -> Result<(Self, usize), CodecError> {
        if body.len() < 8 {
            return Err(CodecError::ShortFrame {
                needed: 8,
                available: body.len(),
            });
        }
        let chunk_id = u32::from_be_bytes(body[0..4].try_into().unwrap());
        let data_len = u32::from_be_bytes(body[4..8].try_into().unwrap()) as usize;
        if 8 + data_len > body.len() {
            return Err(CodecError::ShortFrame {
                needed: 8 + data_len,
                available: body.len(),
            });
        }
        let data = Bytes::copy_from_slice(&body[8..8 + data_len]);
        Ok((FileData { chunk_id, data }, 8 + data_len))
    }
}
