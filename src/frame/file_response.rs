// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! FILE_RESPONSE frame (§3): total file size and the chunk size the sender
//! will use for the subsequent FILE_DATA frames.

use crate::error::CodecError;

pub const TAG: u8 = 0x1d;

/// The chunk size the original source used unless a response specifies otherwise.
pub const DEFAULT_CHUNK_SIZE: u32 = 8192;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FileResponse {
    pub file_size: u64,
    pub chunk_size: u32,
}

impl FileResponse {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG);
        out.extend_from_slice(&self.file_size.to_be_bytes());
        out.extend_from_slice(&self.chunk_size.to_be_bytes());
    }

    pub fn decode(body: &[u8]) -> Result<(Self, usize), CodecError> {
        const LEN: usize = 12;
        if body.len() < LEN {
            return Err(CodecError::ShortFrame {
                needed: LEN,
                available: body.len(),
            });
        }
        let file_size = u64::from_be_bytes(body[0..8].try_into().unwrap());
        let chunk_size = u32::from_be_bytes(body[8..12].try_into().unwrap());
        Ok((
            FileResponse {
                file_size,
                chunk_size,
            },
            LEN,
        ))
    }
}
