// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Connection state machine (§4.7): lifecycle, handshake, packet-number
//! bookkeeping, the simplified ACK model, loss detection, and frame dispatch
//! to the path manager and the application layer.

pub mod loss;

use crate::{
    cid::ConnectionId,
    config::{ServerIdentityPolicy, INITIAL_RETRANSMISSIONS, INITIAL_RETRANSMIT_INTERVAL, PATH_VALIDATION_TIMEOUT},
    crypto::KeyAgreement,
    error::ConnectionError,
    frame::{self, path_challenge::Data as ChallengeData, Frame},
    packet::{create_packet, Header, PacketType},
    path::{Path, PathManager},
    recovery::{CongestionStats, CubicCongestionController, RttEstimator},
};
use bytes::Bytes;
use loss::{InFlightEntry, LossDetector, ThresholdLossDetector};
use rand::rngs::OsRng;
use std::{
    collections::{BTreeMap, VecDeque},
    net::SocketAddr,
    time::Instant,
};
use tracing::{debug, info, trace, warn};

/// Which side of the handshake a [`Connection`] is playing.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// The lifecycle states of §4.7.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    InitialSent,
    HandshakeReceived,
    Established,
    Closed,
}

/// Application-layer events a [`Connection`] fires as it processes frames
/// (§9 "Callback hooks across layers"). The transport holds one boxed
/// implementation per role, supplied at construction, instead of attaching
/// callbacks onto a shared object at runtime.
pub trait ConnectionHandler {
    fn on_handshake_complete(&mut self) {}
    fn on_file_request(&mut self, _name: &str) {}
    fn on_file_response(&mut self, _file_size: u64, _chunk_size: u32) {}
    fn on_file_data(&mut self, _chunk_id: u32, _data: Bytes) {}
}

/// A handler that ignores every event; useful in tests and as a default.
pub struct NullHandler;
impl ConnectionHandler for NullHandler {}

/// A datagram this connection wants sent, addressed to a specific peer.
pub type Outbound = (Vec<u8>, SocketAddr);

/// A single endpoint of a connection, identified by CID rather than address
/// (§3). Owns everything needed to drive the handshake, congestion control,
/// path validation, and frame dispatch for one peer.
pub struct Connection {
    role: Role,
    state: ConnectionState,
    own_cid: ConnectionId,
    peer_cid: ConnectionId,
    paths: PathManager,
    key_agreement: KeyAgreement,
    cubic: CubicCongestionController,
    rtt: RttEstimator,
    loss_detector: ThresholdLossDetector,
    next_packet_number: u64,
    /// The highest packet number acknowledged so far (§3 data model); only
    /// ever moves forward, even though the simplified ACK model (§9) may ack
    /// packet numbers out of the order they were sent.
    largest_acked: u64,
    sent_packets: BTreeMap<u64, (Instant, usize)>,
    send_queue: VecDeque<Frame>,
    handler: Box<dyn ConnectionHandler>,

    // Client-side handshake retransmission bookkeeping.
    cached_initial: Option<Vec<u8>>,
    last_initial_sent: Option<Instant>,
    initial_retransmit_count: u32,

    // Migration-in-progress bookkeeping (§4.6).
    pending_migration: Option<(ChallengeData, Instant)>,
}

impl Connection {
    /// Constructs a client-side connection prior to handshake. `own_cid` is
    /// this client's source CID; the destination CID used for the first
    /// Initial is invented fresh in [`Connection::start_handshake`].
    pub fn new_client(
        own_cid: ConnectionId,
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        handler: Box<dyn ConnectionHandler>,
    ) -> Self {
        Self {
            role: Role::Client,
            state: ConnectionState::New,
            own_cid,
            peer_cid: ConnectionId::EMPTY,
            paths: PathManager::new(Path::new(local_addr, peer_addr, true)),
            key_agreement: KeyAgreement::new(),
            cubic: CubicCongestionController::new(),
            rtt: RttEstimator::new(),
            loss_detector: ThresholdLossDetector::default(),
            next_packet_number: 0,
            largest_acked: 0,
            sent_packets: BTreeMap::new(),
            send_queue: VecDeque::new(),
            handler,
            cached_initial: None,
            last_initial_sent: None,
            initial_retransmit_count: 0,
            pending_migration: None,
        }
    }

    /// Constructs a server-side connection from a just-received Initial
    /// packet (§4.7 "Server receives Initial"). Adopts the client's
    /// destination CID as its own when `policy.adopt_client_cid` (the
    /// default), mirroring the source's didactic simplification; peer CID is
    /// set once, here, from the Initial's source CID (I6).
    pub fn new_server_from_initial(
        header: &Header,
        frames: &[Frame],
        local_addr: SocketAddr,
        peer_addr: SocketAddr,
        own_cid: ConnectionId,
        handler: Box<dyn ConnectionHandler>,
    ) -> Self {
        let mut key_agreement = KeyAgreement::new();
        if let Some(public_key) = find_key_share(frames) {
            key_agreement.compute_shared(public_key);
        }

        let mut connection = Self {
            role: Role::Server,
            // The machine's handshake-received state is transient here: the
            // source has no separate client acknowledgement of the Handshake
            // reply, so the server is established the instant it has replied.
            state: ConnectionState::Established,
            own_cid,
            peer_cid: header.source_cid,
            paths: PathManager::new(Path::new(local_addr, peer_addr, true)),
            key_agreement,
            cubic: CubicCongestionController::new(),
            rtt: RttEstimator::new(),
            loss_detector: ThresholdLossDetector::default(),
            next_packet_number: 0,
            largest_acked: 0,
            sent_packets: BTreeMap::new(),
            send_queue: VecDeque::new(),
            handler,
            cached_initial: None,
            last_initial_sent: None,
            initial_retransmit_count: 0,
            pending_migration: None,
        };
        connection.handler.on_handshake_complete();
        connection
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == ConnectionState::Established
    }

    pub fn own_cid(&self) -> ConnectionId {
        self.own_cid
    }

    pub fn peer_cid(&self) -> ConnectionId {
        self.peer_cid
    }

    pub fn congestion_stats(&self) -> CongestionStats {
        self.cubic.stats()
    }

    pub fn active_peer_addr(&self) -> Option<SocketAddr> {
        self.paths.active_path().map(|p| p.peer_addr)
    }

    /// Client: builds and "sends" (returns the bytes for the caller to
    /// deliver) the first Initial packet, carrying a KEY_SHARE frame with
    /// this client's public key. Moves to *initial-sent*. Like every other
    /// outbound packet, the Initial is assigned a packet number, recorded in
    /// `sent_packets`, and passed through the congestion controller (§4.7).
    pub fn start_handshake(&mut self, now: Instant) -> Result<Outbound, ConnectionError> {
        debug_assert_eq!(self.role, Role::Client);
        let Some(peer_addr) = self.active_peer_addr() else {
            return Err(ConnectionError::NoActivePath);
        };

        let provisional_dcid = ConnectionId::generate(&mut OsRng);
        let key_share = Frame::KeyShare(frame::KeyShare {
            public_key: self.key_agreement.public_key(),
        });

        self.state = ConnectionState::InitialSent;
        self.initial_retransmit_count = 0;

        let outbound = self.build_packet(PacketType::Initial, provisional_dcid, &[key_share], peer_addr, now);
        self.cached_initial = Some(outbound.0.clone());
        self.last_initial_sent = Some(now);

        Ok(outbound)
    }

    /// Resends the cached Initial if no response has arrived within
    /// [`INITIAL_RETRANSMIT_INTERVAL`] and fewer than
    /// [`INITIAL_RETRANSMISSIONS`] retries have been made. No exponential
    /// backoff, per §4.7.
    pub fn maybe_retransmit_initial(&mut self, now: Instant) -> Option<Outbound> {
        if self.state != ConnectionState::InitialSent {
            return None;
        }
        let last_sent = self.last_initial_sent?;
        if now.saturating_duration_since(last_sent) < INITIAL_RETRANSMIT_INTERVAL {
            return None;
        }
        if self.initial_retransmit_count >= INITIAL_RETRANSMISSIONS {
            return None;
        }

        self.initial_retransmit_count += 1;
        self.last_initial_sent = Some(now);
        let peer_addr = self.active_peer_addr()?;
        Some((self.cached_initial.clone()?, peer_addr))
    }

    /// Server: builds the Handshake reply carrying this server's public key.
    /// Routed through the same packet-number/congestion-control bookkeeping
    /// as every other outbound packet (§4.7).
    pub fn build_handshake_response(&mut self, now: Instant) -> Result<Outbound, ConnectionError> {
        debug_assert_eq!(self.role, Role::Server);
        let Some(peer_addr) = self.active_peer_addr() else {
            return Err(ConnectionError::NoActivePath);
        };
        let key_share = Frame::KeyShare(frame::KeyShare {
            public_key: self.key_agreement.public_key(),
        });
        Ok(self.build_packet(PacketType::Handshake, self.peer_cid, &[key_share], peer_addr, now))
    }

    /// Dispatches one received packet, returning any datagrams this
    /// connection wants sent in response (PATH_RESPONSE, handshake
    /// completion has none). `local_addr`/`from_addr` let the path manager
    /// notice address changes (§4.8).
    pub fn receive(
        &mut self,
        header: &Header,
        frames: &[Frame],
        local_addr: SocketAddr,
        from_addr: SocketAddr,
        now: Instant,
    ) -> Vec<Outbound> {
        let mut outbound = Vec::new();

        match (self.role, self.state, header.packet_type) {
            (Role::Client, ConnectionState::InitialSent, PacketType::Initial)
            | (Role::Client, ConnectionState::InitialSent, PacketType::Handshake) => {
                self.complete_client_handshake(header, frames);
            }
            (Role::Server, _, PacketType::Initial) => {
                // A retransmitted Initial from the client; resend our reply.
                match self.build_handshake_response(now) {
                    Ok(response) => outbound.push(response),
                    Err(err) => warn!(%err, "dropping retransmitted Initial"),
                }
                return outbound;
            }
            _ => {}
        }

        if self.state != ConnectionState::Established {
            return outbound;
        }

        if let Some(challenge) = self.paths.observe(local_addr, from_addr, &mut OsRng) {
            info!(?from_addr, "observed new peer address, issuing PATH_CHALLENGE");
            outbound.push(self.build_short_packet(&[Frame::PathChallenge(frame::PathChallenge {
                data: challenge,
            })], from_addr, now));
        }

        self.acknowledge_oldest(now);

        for f in frames {
            match f {
                Frame::Padding(_) | Frame::KeyShare(_) => {}
                Frame::NewConnectionId(ncid) => {
                    debug!(sequence = ncid.sequence_number, "received NEW_CONNECTION_ID (unused: CIDs are stable for this connection's lifetime)");
                }
                Frame::PathChallenge(challenge) => {
                    trace!(?from_addr, "answering PATH_CHALLENGE");
                    outbound.push(self.build_short_packet(
                        &[Frame::PathResponse(frame::PathResponse { data: challenge.data })],
                        from_addr,
                        now,
                    ));
                }
                Frame::PathResponse(response) => {
                    if self.paths.handle_path_response(response.data, from_addr) {
                        info!(?from_addr, "path validated and promoted to active");
                        self.pending_migration = None;
                    }
                }
                Frame::FileRequest(req) => self.handler.on_file_request(&req.name),
                Frame::FileResponse(resp) => self.handler.on_file_response(resp.file_size, resp.chunk_size),
                Frame::FileData(data) => self.handler.on_file_data(data.chunk_id, data.data.clone()),
            }
        }

        outbound
    }

    fn complete_client_handshake(&mut self, header: &Header, frames: &[Frame]) {
        if self.peer_cid.is_empty() {
            self.peer_cid = header.source_cid; // I6: set exactly once
        }
        if let Some(public_key) = find_key_share(frames) {
            self.key_agreement.compute_shared(public_key);
        }
        self.state = ConnectionState::Established;
        self.cached_initial = None;
        self.handler.on_handshake_complete();
    }

    /// Client-initiated migration (§4.6): optimistically activates a path
    /// bound at `new_local_addr` and emits a PATH_CHALLENGE over it.
    pub fn migrate_to(&mut self, new_local_addr: SocketAddr, now: Instant) -> Option<Outbound> {
        let data = self.paths.migrate_to(new_local_addr, &mut OsRng)?;
        self.pending_migration = Some((data, now));
        let peer_addr = self.paths.active_path()?.peer_addr;
        Some(self.build_short_packet(&[Frame::PathChallenge(frame::PathChallenge { data })], peer_addr, now))
    }

    /// Rolls back an in-flight migration that has not validated within
    /// [`PATH_VALIDATION_TIMEOUT`]. Returns
    /// `Some(ConnectionError::PathValidationTimeout)` if a rollback happened,
    /// `None` if there was nothing to roll back or the deadline hasn't
    /// passed yet.
    pub fn check_migration_timeout(&mut self, now: Instant) -> Option<ConnectionError> {
        let (data, started_at) = self.pending_migration?;
        if now.saturating_duration_since(started_at) < PATH_VALIDATION_TIMEOUT {
            return None;
        }
        warn!("path validation timed out, rolling back to prior active path");
        self.paths.rollback(data);
        self.pending_migration = None;
        Some(ConnectionError::PathValidationTimeout)
    }

    /// Enqueues an application frame (FILE_REQUEST, FILE_RESPONSE, FILE_DATA)
    /// to be sent the next time [`Connection::flush`] finds room in the
    /// congestion window.
    pub fn enqueue_frame(&mut self, frame: Frame) {
        self.send_queue.push_back(frame);
    }

    pub fn request_file(&mut self, name: impl Into<String>) {
        self.enqueue_frame(Frame::FileRequest(frame::FileRequest { name: name.into() }));
    }

    /// Sends as many queued frames as the CUBIC window (I4) currently
    /// allows, one frame per packet.
    pub fn flush(&mut self, now: Instant) -> Vec<Outbound> {
        let mut sent = Vec::new();
        while self.cubic.can_send() {
            let Some(frame) = self.send_queue.pop_front() else {
                break;
            };
            let Some(peer_addr) = self.active_peer_addr() else {
                self.send_queue.push_front(frame);
                break;
            };
            sent.push(self.build_short_packet(&[frame], peer_addr, now));
        }
        sent
    }

    /// Every outbound packet, regardless of type, goes through here: assigns
    /// the next monotonic packet number, records it in `sent_packets` for
    /// the ACK/loss-detection machinery, and runs it past the congestion
    /// controller (§4.7, unqualified — Initial and Handshake packets
    /// participate exactly like Short packets do).
    fn build_packet(&mut self, packet_type: PacketType, destination_cid: ConnectionId, frames: &[Frame], peer_addr: SocketAddr, now: Instant) -> Outbound {
        let header = Header::new(packet_type, destination_cid, self.own_cid);
        let packet = create_packet(&header, frames);

        let pn = self.next_packet_number;
        self.next_packet_number += 1;
        self.sent_packets.insert(pn, (now, packet.len()));
        self.cubic.on_sent(packet.len());

        (packet, peer_addr)
    }

    fn build_short_packet(&mut self, frames: &[Frame], peer_addr: SocketAddr, now: Instant) -> Outbound {
        self.build_packet(PacketType::Short, self.peer_cid, frames, peer_addr, now)
    }

    /// The simplified ACK model of §4.7: any received packet acknowledges
    /// whichever in-flight packet is oldest, not necessarily the one the
    /// peer actually meant to ack. Preserved as a documented quirk (§9).
    fn acknowledge_oldest(&mut self, now: Instant) {
        let Some((&pn, &(sent_at, size))) = self.sent_packets.iter().next() else {
            return;
        };
        self.sent_packets.remove(&pn);
        self.largest_acked = self.largest_acked.max(pn);

        let sample = now.saturating_duration_since(sent_at);
        self.rtt.update(sample);
        self.cubic.on_acked(size, sample, now);
    }

    /// Runs loss detection (§4.7, §9) and notifies CUBIC for anything
    /// declared lost.
    pub fn detect_losses(&mut self, now: Instant) {
        let in_flight: Vec<InFlightEntry> = self
            .sent_packets
            .iter()
            .map(|(&packet_number, &(sent_at, _))| InFlightEntry { packet_number, sent_at })
            .collect();

        for lost_pn in self.loss_detector.detect(&in_flight, now) {
            if let Some((_, size)) = self.sent_packets.remove(&lost_pn) {
                warn!(packet_number = lost_pn, "packet declared lost");
                self.cubic.on_lost(size, now);
            }
        }
    }
}

/// Decides the server's own CID for a fresh connection (§9 open question):
/// the client-chosen destination CID by default, or a freshly generated one
/// when `policy.adopt_client_cid` is disabled. Exposed standalone so callers
/// that need the CID before constructing the [`Connection`] (to key a
/// handler by it, for instance) can compute the same value the constructor
/// would have.
pub fn resolve_server_own_cid(header: &Header, policy: ServerIdentityPolicy) -> ConnectionId {
    if policy.adopt_client_cid {
        header.destination_cid
    } else {
        ConnectionId::generate(&mut OsRng)
    }
}

fn find_key_share(frames: &[Frame]) -> Option<[u8; 32]> {
    frames.iter().find_map(|f| match f {
        Frame::KeyShare(ks) => Some(ks.public_key),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::parse_packet;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn handshake_happy_path_establishes_both_sides() {
        let now = Instant::now();
        let client_cid = ConnectionId::generate(&mut OsRng);
        let mut client = Connection::new_client(client_cid, addr(1), addr(2), Box::new(NullHandler));

        let (initial_bytes, _) = client.start_handshake(now).unwrap();
        let (header, frames) = parse_packet(&initial_bytes).unwrap();

        let mut server = Connection::new_server_from_initial(
            &header,
            &frames,
            addr(2),
            addr(1),
            resolve_server_own_cid(&header, ServerIdentityPolicy::default()),
            Box::new(NullHandler),
        );
        assert_eq!(server.own_cid(), header.destination_cid);
        assert_eq!(server.peer_cid(), header.source_cid);

        let (handshake_bytes, _) = server.build_handshake_response(now).unwrap();
        let (hs_header, hs_frames) = parse_packet(&handshake_bytes).unwrap();

        let outbound = client.receive(&hs_header, &hs_frames, addr(1), addr(2), now);
        assert!(outbound.is_empty());
        assert!(client.is_established());
        assert_eq!(client.peer_cid(), server.own_cid());
    }

    #[test]
    fn path_challenge_is_answered_immediately() {
        let now = Instant::now();
        let mut conn = established_connection(now);

        let challenge = frame::PathChallenge { data: [9u8; 8] };
        let header = Header::new(PacketType::Short, conn.own_cid(), conn.peer_cid());
        let outbound = conn.receive(&header, &[Frame::PathChallenge(challenge)], addr(1), addr(2), now);

        assert_eq!(outbound.len(), 1);
        let (bytes, to) = &outbound[0];
        assert_eq!(*to, addr(2));
        let (_, frames) = parse_packet(bytes).unwrap();
        assert_eq!(frames, vec![Frame::PathResponse(frame::PathResponse { data: [9u8; 8] })]);
    }

    #[test]
    fn ack_processing_feeds_rtt_and_cubic() {
        let now = Instant::now();
        let mut conn = established_connection(now);
        conn.request_file("test.bin");
        let sent = conn.flush(now);
        assert_eq!(sent.len(), 1);
        assert_eq!(conn.sent_packets.len(), 1);

        let later = now + std::time::Duration::from_millis(40);
        let header = Header::new(PacketType::Short, conn.own_cid(), conn.peer_cid());
        conn.receive(&header, &[Frame::Padding(frame::Padding)], addr(1), addr(2), later);

        assert!(conn.sent_packets.is_empty());
        assert!(conn.rtt.smoothed_rtt().is_some());
    }

    #[test]
    fn file_frames_reach_the_handler() {
        use std::cell::RefCell;
        use std::rc::Rc;

        struct Recorder(Rc<RefCell<Vec<String>>>);
        impl ConnectionHandler for Recorder {
            fn on_file_request(&mut self, name: &str) {
                self.0.borrow_mut().push(format!("request:{name}"));
            }
        }

        let seen = Rc::new(RefCell::new(Vec::new()));
        let now = Instant::now();
        let own = ConnectionId::generate(&mut OsRng);
        let peer = ConnectionId::generate(&mut OsRng);
        let mut conn = Connection {
            role: Role::Server,
            state: ConnectionState::Established,
            own_cid: own,
            peer_cid: peer,
            paths: PathManager::new(Path::new(addr(2), addr(1), true)),
            key_agreement: KeyAgreement::new(),
            cubic: CubicCongestionController::new(),
            rtt: RttEstimator::new(),
            loss_detector: ThresholdLossDetector::default(),
            next_packet_number: 0,
            largest_acked: 0,
            sent_packets: BTreeMap::new(),
            send_queue: VecDeque::new(),
            handler: Box::new(Recorder(seen.clone())),
            cached_initial: None,
            last_initial_sent: None,
            initial_retransmit_count: 0,
            pending_migration: None,
        };

        let header = Header::new(PacketType::Short, own, peer);
        conn.receive(
            &header,
            &[Frame::FileRequest(frame::FileRequest { name: "a.bin".to_owned() })],
            addr(2),
            addr(1),
            now,
        );

        assert_eq!(*seen.borrow(), vec!["request:a.bin".to_owned()]);
    }

    #[test]
    fn migration_rolls_back_after_timeout() {
        let now = Instant::now();
        let mut conn = established_connection(now);
        conn.migrate_to(addr(3), now).unwrap();
        assert_eq!(conn.active_peer_addr(), Some(addr(2)));

        let after_timeout = now + PATH_VALIDATION_TIMEOUT + std::time::Duration::from_millis(1);
        assert!(conn.check_migration_timeout(after_timeout).is_some());
        assert!(conn.pending_migration.is_none());
    }

    fn established_connection(now: Instant) -> Connection {
        let client_cid = ConnectionId::generate(&mut OsRng);
        let mut client = Connection::new_client(client_cid, addr(1), addr(2), Box::new(NullHandler));
        let (initial_bytes, _) = client.start_handshake(now).unwrap();
        let (header, frames) = parse_packet(&initial_bytes).unwrap();
        let mut server = Connection::new_server_from_initial(
            &header,
            &frames,
            addr(2),
            addr(1),
            resolve_server_own_cid(&header, ServerIdentityPolicy::default()),
            Box::new(NullHandler),
        );
        let (handshake_bytes, _) = server.build_handshake_response(now).unwrap();
        let (hs_header, hs_frames) = parse_packet(&handshake_bytes).unwrap();
        client.receive(&hs_header, &hs_frames, addr(1), addr(2), now);
        client
    }
}
