// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! KEY_SHARE frame (§3, §4.4 expansion): carries the sender's X25519 public
//! key. Carried in Initial and Handshake packets so the key-agreement module
//! has a peer public key to compute the shared secret from.

use crate::error::CodecError;

pub const TAG: u8 = 0x10;
pub const KEY_LEN: usize = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyShare {
    pub public_key: [u8; KEY_LEN],
}

impl KeyShare {
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.push(TAG);
        out.extend_from_slice(&self.public_key);
    }

    pub fn decode(body: &[u8]) -> Result<(Self, usize), CodecError> {
        if body.len() < KEY_LEN {
            return Err(CodecError::ShortFrame {
                needed: KEY_LEN,
                available: body.len(),
            });
        }
        let mut public_key = [0u8; KEY_LEN];
        public_key.copy_from_slice(&body[..KEY_LEN]);
        Ok((KeyShare { public_key }, KEY_LEN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let frame = KeyShare { public_key: [7u8; KEY_LEN] };
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        let (decoded, consumed) = KeyShare::decode(&buf[1..]).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(consumed, KEY_LEN);
    }

    #[test]
    fn short_body_is_an_error() {
        assert!(KeyShare::decode(&[1, 2, 3]).is_err());
    }
}
