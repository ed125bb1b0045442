// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Path manager (§4.6): discovery of new peer addresses, PATH_CHALLENGE /
//! PATH_RESPONSE validation, and atomic switch of the active path with
//! rollback on failure.

use crate::frame::path_challenge::Data as ChallengeData;
use rand::RngCore;
use std::{collections::HashMap, net::SocketAddr};

/// One (local, peer) address pair a connection may send and receive over.
///
/// `is_validated` may only transition false→true (I3), and only on receipt
/// of a matching PATH_RESPONSE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Path {
    pub local_addr: SocketAddr,
    pub peer_addr: SocketAddr,
    is_validated: bool,
}

impl Path {
    pub fn new(local_addr: SocketAddr, peer_addr: SocketAddr, is_validated: bool) -> Self {
        Self {
            local_addr,
            peer_addr,
            is_validated,
        }
    }

    pub fn is_validated(&self) -> bool {
        self.is_validated
    }

    fn validate(&mut self) {
        self.is_validated = true;
    }
}

/// A path awaiting a PATH_RESPONSE, and what to roll back to if validation
/// never completes.
struct PendingChallenge {
    path: Path,
    rollback_to: Option<Path>,
}

/// Owns the set of paths for a single connection: at most one active, the
/// rest either validated-but-inactive or still pending a challenge (I2).
#[derive(Default)]
pub struct PathManager {
    paths: Vec<Path>,
    active: Option<usize>,
    pending_challenges: HashMap<ChallengeData, PendingChallenge>,
}

impl PathManager {
    pub fn new(initial: Path) -> Self {
        Self {
            paths: vec![initial],
            active: Some(0),
            pending_challenges: HashMap::new(),
        }
    }

    pub fn active_path(&self) -> Option<&Path> {
        self.active.map(|i| &self.paths[i])
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    /// `observe(peer_addr)`: if `peer_addr` differs from the active path's
    /// peer, creates an unvalidated candidate and returns the challenge data
    /// the caller should send as a PATH_CHALLENGE. The candidate is not
    /// promoted to active until a matching PATH_RESPONSE arrives.
    pub fn observe(
        &mut self,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        rng: &mut impl RngCore,
    ) -> Option<ChallengeData> {
        if self.active_path().map(|p| p.peer_addr) == Some(peer_addr) {
            return None;
        }

        let candidate = Path::new(local_addr, peer_addr, false);
        let data = self.send_path_challenge(candidate, None, rng);
        Some(data)
    }

    /// Client-initiated migration (§4.6): optimistically promotes a new path
    /// from `local_addr` to active, remembering the previous active path so
    /// [`PathManager::rollback`] can restore it if validation times out.
    pub fn migrate_to(
        &mut self,
        local_addr: SocketAddr,
        rng: &mut impl RngCore,
    ) -> Option<ChallengeData> {
        let peer_addr = self.active_path()?.peer_addr;
        let previous = *self.active_path()?;
        let candidate = Path::new(local_addr, peer_addr, false);

        self.paths.push(candidate);
        self.active = Some(self.paths.len() - 1);

        Some(self.send_path_challenge(candidate, Some(previous), rng))
    }

    fn send_path_challenge(
        &mut self,
        path: Path,
        rollback_to: Option<Path>,
        rng: &mut impl RngCore,
    ) -> ChallengeData {
        let mut data = [0u8; 8];
        rng.fill_bytes(&mut data);
        self.pending_challenges
            .insert(data, PendingChallenge { path, rollback_to });
        data
    }

    /// `handle_path_response`: if `data` matches a pending challenge and the
    /// response arrived from the expected peer address, validates and
    /// promotes that path to active. If multiple challenges are outstanding
    /// for the same peer, the first matched response wins; a later one for
    /// an already-resolved challenge is silently discarded because its entry
    /// is gone from `pending_challenges`.
    pub fn handle_path_response(&mut self, data: ChallengeData, from_addr: SocketAddr) -> bool {
        let Some(pending) = self.pending_challenges.get(&data) else {
            return false;
        };
        if pending.path.peer_addr != from_addr {
            return false;
        }

        let PendingChallenge { mut path, .. } = self.pending_challenges.remove(&data).unwrap();
        path.validate();

        if let Some(existing) = self.paths.iter_mut().find(|p| p.peer_addr == path.peer_addr) {
            *existing = path;
        } else {
            self.paths.push(path);
        }
        self.active = self.paths.iter().position(|p| p.peer_addr == path.peer_addr);
        true
    }

    /// Rolls back an in-flight migration that never validated: restores the
    /// previous active path and drops its pending challenge.
    pub fn rollback(&mut self, data: ChallengeData) {
        let Some(pending) = self.pending_challenges.remove(&data) else {
            return;
        };
        let Some(previous) = pending.rollback_to else {
            return;
        };
        if let Some(idx) = self.paths.iter().position(|p| p.peer_addr == previous.peer_addr) {
            self.active = Some(idx);
        } else {
            self.paths.push(previous);
            self.active = Some(self.paths.len() - 1);
        }
    }

    pub fn has_pending_challenge(&self, data: &ChallengeData) -> bool {
        self.pending_challenges.contains_key(data)
    }
}
