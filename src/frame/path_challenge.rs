// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! PATH_CHALLENGE frame (§3, §4.6): 8 bytes of arbitrary data a peer must echo
//! back in a PATH_RESPONSE to prove reachability at a claimed address.

use crate::error::CodecError;

pub const TAG: u8 = 0x1a;
pub const DATA_LEN: usize = 8;

pub type Data = [u8; DATA_LEN];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PathChallenge {
    pub data: Data,
}

impl PathChallenge {
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
        Ok((PathChallenge { data }, DATA_LEN))
    }
}
