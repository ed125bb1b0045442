// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! PATH_RESPONSE frame (§3, §4.6): echoes the 8 bytes from a PATH_CHALLENGE.

use crate::error::CodecError;
use crate::frame::path_challenge::{Data, DATA_LEN};

pub const TAG: u8 = 0x1b;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PathResponse {
    pub data: Data,
}

impl PathResponse {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG);
        out.extend_from_slice(&self.data);
    }

    pub fn decode(body: &[u8]) -> Result<(Self, usize), CodecError> {
        if body.len() < DATA_LEN {
            return Err(CodecError::ShortFrame {
                needed: DATA_LEN,
                available: body.len(),
            });
        }
        let mut data = [0u8; DATA_LEN];
        data.copy_from_slice(&body[..DATA_LEN]);
        Ok((PathResponse { data }, DATA_LEN))
    }
}
