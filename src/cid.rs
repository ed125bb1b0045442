// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Connection IDs: opaque identifiers that label a [`crate::connection::Connection`]
//! independent of the network addresses it is reachable at (I1).

use crate::error::CodecError;
use rand::RngCore;

/// The maximum length of a connection ID accepted by the header codec (see §4.1).
pub const MAX_LEN: usize = 20;

/// The length newly-generated connection IDs use in this system.
pub const GENERATED_LEN: usize = 8;

/// An opaque connection identifier, 0 to [`MAX_LEN`] bytes.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    bytes: [u8; MAX_LEN],
    len: u8,
}

impl core::fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "ConnectionId({:02x?})", self.as_bytes())
    }
}

impl ConnectionId {
    /// The empty connection ID, used for short-header packets sent prior to a peer
    /// CID being learned (see §9 open question on `peer_connection_id` being absent).
    pub const EMPTY: Self = Self {
        bytes: [0u8; MAX_LEN],
        len: 0,
    };

    /// Generates a new, random [`GENERATED_LEN`]-byte connection ID.
    pub fn generate(rng: &mut impl RngCore) -> Self {
        let mut bytes = [0u8; MAX_LEN];
        rng.fill_bytes(&mut bytes[..GENERATED_LEN]);
        Self {
            bytes,
            len: GENERATED_LEN as u8,
        }
    }

    /// Builds a connection ID from a byte slice, failing if it exceeds [`MAX_LEN`].
    pub fn from_bytes(slice: &[u8]) -> Result<Self, CodecError> {
        if slice.len() > MAX_LEN {
            return Err(CodecError::MalformedHeader {
                reason: "connection id exceeds maximum length",
            });
        }
        let mut bytes = [0u8; MAX_LEN];
        bytes[..slice.len()].copy_from_slice(slice);
        Ok(Self {
            bytes,
            len: slice.len() as u8,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for ConnectionId {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}
