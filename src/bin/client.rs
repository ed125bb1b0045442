// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! The file-requesting half of the transport (grounded in `client.py`):
//! discovers a local interface, performs the handshake, requests one file,
//! and writes it to disk once fully received. No interactive menu — the
//! original's TUI loop is out of scope.

use clap::Parser;
use pathquic::{
    cid::ConnectionId,
    config::{ClientConfig, FILE_TRANSFER_TIMEOUT, HANDSHAKE_TIMEOUT},
    connection::{Connection, ConnectionHandler},
    endpoint::Endpoint,
    error::ConnectionError,
    file::FileReceiver,
    interfaces::{InterfaceSource, StaticInterfaceSource},
    packet::parse_packet,
};
use rand::rngs::OsRng;
use std::{
    cell::RefCell,
    net::{Ipv4Addr, SocketAddr},
    rc::Rc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

#[derive(Default)]
struct ClientState {
    established: bool,
    receiver: FileReceiver,
}

struct ClientHandler {
    state: Rc<RefCell<ClientState>>,
}

impl ConnectionHandler for ClientHandler {
    fn on_handshake_complete(&mut self) {
        self.state.borrow_mut().established = true;
    }

    fn on_file_response(&mut self, file_size: u64, _chunk_size: u32) {
        self.state.borrow_mut().receiver.on_file_response(file_size);
    }

    fn on_file_data(&mut self, chunk_id: u32, data: bytes::Bytes) {
        self.state.borrow_mut().receiver.on_file_data(chunk_id, data);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ClientConfig::parse();

    // Full interface enumeration is out of scope (§6); bind the one
    // interface this collaborator offers, still honoring the loopback
    // exclusion rule the original applies during discovery.
    let interface = StaticInterfaceSource::new(Ipv4Addr::UNSPECIFIED.into())
        .map_err(|reason| anyhow::anyhow!(reason))?
        .interfaces()
        .into_iter()
        .next()
        .expect("StaticInterfaceSource always yields exactly one interface");

    let endpoint = Endpoint::bind(SocketAddr::new(interface.address, 0)).await?;
    let local_addr = endpoint.local_addr()?;
    let peer_addr = SocketAddr::new(config.server_host, config.server_port);

    let state = Rc::new(RefCell::new(ClientState::default()));
    let own_cid = ConnectionId::generate(&mut OsRng);
    let mut connection = Connection::new_client(
        own_cid,
        local_addr,
        peer_addr,
        Box::new(ClientHandler { state: state.clone() }),
    );

    info!(%local_addr, %peer_addr, "starting handshake");
    let (initial, to) = connection.start_handshake(Instant::now())?;
    endpoint.send(&initial, to).await?;

    let handshake_result = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        loop {
            if state.borrow().established {
                return Ok(());
            }
            tokio::select! {
                datagram = endpoint.recv_datagram() => {
                    let (data, from_addr) = datagram?;
                    match parse_packet(&data) {
                        Ok((header, frames)) => {
                            let outbound = connection.receive(&header, &frames, local_addr, from_addr, Instant::now());
                            for (bytes, to) in outbound {
                                endpoint.send(&bytes, to).await?;
                            }
                        }
                        Err(err) => warn!(%err, "dropping malformed datagram"),
                    }
                }
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    if let Some(retransmit) = connection.maybe_retransmit_initial(Instant::now()) {
                        endpoint.send(&retransmit.0, retransmit.1).await?;
                    }
                }
            }
        }
    })
    .await;

    match handshake_result {
        Ok(Ok(())) => info!("handshake complete"),
        Ok(Err(err)) => {
            error!(%err, "socket error during handshake");
            return Err(err);
        }
        Err(_) => {
            error!("handshake timed out");
            return Err(ConnectionError::HandshakeTimeout.into());
        }
    }

    connection.request_file(config.file.clone());
    for (bytes, to) in connection.flush(Instant::now()) {
        endpoint.send(&bytes, to).await?;
    }

    let transfer_result = tokio::time::timeout(FILE_TRANSFER_TIMEOUT, async {
        loop {
            if state.borrow().receiver.is_complete() {
                return Ok::<_, std::io::Error>(());
            }
            let (data, from_addr) = endpoint.recv_datagram().await?;
            match parse_packet(&data) {
                Ok((header, frames)) => {
                    let outbound = connection.receive(&header, &frames, local_addr, from_addr, Instant::now());
                    for (bytes, to) in outbound {
                        endpoint.send(&bytes, to).await?;
                    }
                }
                Err(err) => warn!(%err, "dropping malformed datagram"),
            }
        }
    })
    .await;

    match transfer_result {
        Ok(Ok(())) => {
            let received = state.borrow().receiver.received_bytes();
            info!(bytes = received, "file transfer complete");
            std::fs::create_dir_all(&config.output_dir)?;
            let path = config.output_dir.join(&config.file);
            state.borrow().receiver.write_to(&path).await?;
            info!(path = %path.display(), "wrote received file");
        }
        Ok(Err(err)) => {
            error!(%err, "socket error during file transfer");
            return Err(err.into());
        }
        Err(_) => {
            error!("file transfer timed out");
            return Err(ConnectionError::FileTransferTimeout.into());
        }
    }

    Ok(())
}
