// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! NEW_CONNECTION_ID frame (§3): advertises a connection ID a peer may switch
//! to. Not emitted by the default server configuration (§9 open question on
//! CID adoption), but decodable, and reserved for a future issuer of fresh
//! server-chosen CIDs.

use crate::{cid::ConnectionId, error::CodecError};

pub const TAG: u8 = 0x18;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewConnectionId {
    pub sequence_number: u16,
    pub connection_id: ConnectionId,
}

impl NewConnectionId {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG);
        out.extend_from_slice(&self.sequence_number.to_be_bytes());
        out.push(self.connection_id.len() as u8);
        out.extend_from_slice(self.connection_id.as_bytes());
    }

    pub fn decode(body: &[u8]) -> Result<(Self, usize), CodecError> {
        if body.len() < 3 {
            return Err(CodecError::ShortFrame {
                needed: 3,
                available: body.len(),
            });
        }
        let sequence_number = u16::from_be_bytes([body[0], body[1]]);
        let cid_len = body[2] as usize;
        let mut pos = 3;
        if pos + cid_len > body.len() {
            return Err(CodecError::ShortFrame {
                needed: pos + cid_len,
                available: body.len(),
            });
        }
        let connection_id = ConnectionId::from_bytes(&body[pos..pos + cid_len])?;
        pos += cid_len;

        Ok((
            NewConnectionId {
                sequence_number,
                connection_id,
            },
            pos,
        ))
    }
}
