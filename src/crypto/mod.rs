// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Key-agreement module (§4.4): X25519 DH plus HKDF-SHA256 key derivation.
//!
//! AEAD encryption of payloads is specified as a hook but not implemented in
//! this core, matching the original source's scope — implementers may add it
//! without changing the outer wire protocol.

use hkdf::Hkdf;
use rand::rngs::OsRng;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};

const HKDF_INFO: &[u8] = b"quic key";
const TRAFFIC_SECRET_LEN: usize = 32;

/// The three-state lifecycle of a [`KeyAgreement`] context.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HandshakeState {
    Initial,
    WaitHandshake,
    Connected,
}

/// Generates an ephemeral X25519 keypair and derives a shared traffic secret
/// once the peer's public key is known.
pub struct KeyAgreement {
    private_key: StaticSecret,
    public_key: PublicKey,
    state: HandshakeState,
    traffic_secret: Option<[u8; TRAFFIC_SECRET_LEN]>,
}

impl KeyAgreement {
    pub fn new() -> Self {
        let private_key = StaticSecret::random_from_rng(OsRng);
        let public_key = PublicKey::from(&private_key);
        Self {
            private_key,
            public_key,
            state: HandshakeState::Initial,
            traffic_secret: None,
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.public_key.to_bytes()
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn set_state(&mut self, state: HandshakeState) {
        self.state = state;
    }

    /// Performs X25519 DH against `peer_public` and derives a 32-byte traffic
    /// secret via HKDF-SHA256 with an empty salt and `info = "quic key"`.
    pub fn compute_shared(&mut self, peer_public: [u8; 32]) -> [u8; TRAFFIC_SECRET_LEN] {
        let peer_public = PublicKey::from(peer_public);
        let shared = self.private_key.diffie_hellman(&peer_public);

        let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
        let mut secret = [0u8; TRAFFIC_SECRET_LEN];
        hk.expand(HKDF_INFO, &mut secret)
            .expect("32 bytes is a valid HKDF-SHA256 output length");

        self.traffic_secret = Some(secret);
        self.state = HandshakeState::Connected;
        secret
    }

    pub fn traffic_secret(&self) -> Option<&[u8; TRAFFIC_SECRET_LEN]> {
        self.traffic_secret.as_ref()
    }
}

impl Default for KeyAgreement {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for KeyAgreement {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyAgreement")
            .field("public_key", &self.public_key)
            .field("state", &self.state)
            .field("established", &self.traffic_secret.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_sides_derive_the_same_traffic_secret() {
        let mut client = KeyAgreement::new();
        let mut server = KeyAgreement::new();

        let client_secret = client.compute_shared(server.public_key());
        let server_secret = server.compute_shared(client.public_key());

        assert_eq!(client_secret, server_secret);
        assert_eq!(client.state(), HandshakeState::Connected);
    }

    #[test]
    fn starts_in_initial_state_with_no_secret() {
        let ctx = KeyAgreement::new();
        assert_eq!(ctx.state(), HandshakeState::Initial);
        assert!(ctx.traffic_secret().is_none());
    }
}
