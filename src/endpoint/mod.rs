// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! The UDP endpoint (§4.8): binds a socket, demultiplexes datagrams to
//! connections by destination CID, and creates new server-side connections
//! on unrecognized Initial packets.

use crate::{
    cid::ConnectionId,
    config::ServerIdentityPolicy,
    connection::{resolve_server_own_cid, Connection, ConnectionHandler, Outbound},
    packet::parse_packet,
};
use std::{collections::HashMap, io, net::SocketAddr, time::Instant};
use tokio::net::UdpSocket;
use tracing::warn;

/// Datagrams larger than this are not expected by this protocol subset; used
/// only to size the receive buffer.
const MAX_DATAGRAM_SIZE: usize = 64 * 1024;

/// Owns the socket and the CID-addressed connection table (§3, §4.8). Plain
/// data structure: callers drive it by calling [`Endpoint::recv_datagram`]
/// and [`Endpoint::send_all`] from their own event loop, matching the
/// single-threaded cooperative model of §5.
pub struct Endpoint {
    socket: UdpSocket,
    connections: HashMap<ConnectionId, Connection>,
}

impl Endpoint {
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self {
            socket,
            connections: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Writes directly to the socket without CUBIC gating (§4.8) — gating
    /// happens inside the owning [`Connection`] before a datagram ever
    /// reaches here.
    pub async fn send(&self, datagram: &[u8], to: SocketAddr) -> io::Result<()> {
        self.socket.send_to(datagram, to).await?;
        Ok(())
    }

    pub async fn send_all(&self, outbound: Vec<Outbound>) -> io::Result<()> {
        for (datagram, to) in outbound {
            self.send(&datagram, to).await?;
        }
        Ok(())
    }

    pub fn connection(&self, cid: &ConnectionId) -> Option<&Connection> {
        self.connections.get(cid)
    }

    pub fn connection_mut(&mut self, cid: &ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(cid)
    }

    pub fn insert_connection(&mut self, cid: ConnectionId, connection: Connection) {
        self.connections.insert(cid, connection);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Reads one datagram off the socket.
    pub async fn recv_datagram(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok((buf, from))
    }

    /// Server-side dispatch of one received datagram (§4.8): demultiplexes
    /// by destination CID, creating a new connection on an unrecognized
    /// Initial and dropping anything else with a warning.
    pub fn dispatch_server(
        &mut self,
        data: &[u8],
        from_addr: SocketAddr,
        local_addr: SocketAddr,
        policy: ServerIdentityPolicy,
        now: Instant,
        make_handler: impl FnOnce(ConnectionId) -> Box<dyn ConnectionHandler>,
    ) -> Vec<Outbound> {
        let (header, frames) = match parse_packet(data) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%err, ?from_addr, "dropping malformed datagram");
                return Vec::new();
            }
        };

        if let Some(connection) = self.connections.get_mut(&header.destination_cid) {
            return connection.receive(&header, &frames, local_addr, from_addr, now);
        }

        if header.packet_type != crate::packet::PacketType::Initial {
            warn!(dcid = ?header.destination_cid, "dropping datagram for unknown connection");
            return Vec::new();
        }

        let own_cid = resolve_server_own_cid(&header, policy);
        let mut connection = Connection::new_server_from_initial(
            &header,
            &frames,
            local_addr,
            from_addr,
            own_cid,
            make_handler(own_cid),
        );
        let response = match connection.build_handshake_response(now) {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, ?from_addr, "dropping Initial, could not build handshake response");
                return Vec::new();
            }
        };
        self.connections.insert(connection.own_cid(), connection);
        vec![response]
    }

    /// Runs the periodic housekeeping every connection needs: Initial
    /// retransmission, loss detection, migration-timeout rollback, and
    /// flushing any queued application frames the congestion window now has
    /// room for.
    pub fn tick(&mut self, now: Instant) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        for connection in self.connections.values_mut() {
            if let Some(retransmit) = connection.maybe_retransmit_initial(now) {
                outbound.push(retransmit);
            }
            connection.detect_losses(now);
            if let Some(err) = connection.check_migration_timeout(now) {
                warn!(%err, "migration rolled back");
            }
            outbound.extend(connection.flush(now));
        }
        outbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{cid::ConnectionId, connection::NullHandler};
    use rand::rngs::OsRng;

    #[tokio::test]
    async fn unknown_dcid_on_a_short_packet_is_dropped() {
        let mut endpoint = Endpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let local_addr = endpoint.local_addr().unwrap();

        let header = crate::packet::Header::new(
            crate::packet::PacketType::Short,
            ConnectionId::from_bytes(&[0xde, 0xad, 0xbe, 0xef, 0xde, 0xad, 0xbe, 0xef]).unwrap(),
            ConnectionId::generate(&mut OsRng),
        );
        let packet = crate::packet::create_packet(&header, &[]);

        let outbound = endpoint.dispatch_server(
            &packet,
            "127.0.0.1:9999".parse().unwrap(),
            local_addr,
            ServerIdentityPolicy::default(),
            Instant::now(),
            |_cid| Box::new(NullHandler),
        );

        assert!(outbound.is_empty());
        assert_eq!(endpoint.connection_count(), 0);
    }

    #[tokio::test]
    async fn initial_on_an_unknown_dcid_creates_a_connection() {
        let mut endpoint = Endpoint::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let local_addr = endpoint.local_addr().unwrap();

        let mut client = Connection::new_client(
            ConnectionId::generate(&mut OsRng),
            "127.0.0.1:1".parse().unwrap(),
            local_addr,
            Box::new(NullHandler),
        );
        let (initial_bytes, _) = client.start_handshake(Instant::now()).unwrap();

        let outbound = endpoint.dispatch_server(
            &initial_bytes,
            "127.0.0.1:1".parse().unwrap(),
            local_addr,
            ServerIdentityPolicy::default(),
            Instant::now(),
            |_cid| Box::new(NullHandler),
        );

        assert_eq!(outbound.len(), 1);
        assert_eq!(endpoint.connection_count(), 1);
    }
}
