// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! The file-serving half of the transport (grounded in `server.py`): binds a
//! socket, accepts connections, and answers FILE_REQUEST frames by streaming
//! the requested resource in FILE_DATA frames. No menu loop — the original's
//! TUI is out of scope; this binary simply serves until killed.

use clap::Parser;
use pathquic::{
    cid::ConnectionId,
    config::ServerConfig,
    connection::ConnectionHandler,
    endpoint::Endpoint,
    file::ResourceRoot,
    frame,
};
use std::{
    cell::RefCell,
    collections::VecDeque,
    net::SocketAddr,
    rc::Rc,
    time::{Duration, Instant},
};
use tracing::{error, info, warn};

/// Records FILE_REQUESTs a connection receives; the main loop drains these
/// and performs the actual (async) disk I/O, since a [`ConnectionHandler`]
/// callback is synchronous and has no access to the owning `Connection`.
struct ServerHandler {
    cid: ConnectionId,
    pending: Rc<RefCell<VecDeque<(ConnectionId, String)>>>,
}

impl ConnectionHandler for ServerHandler {
    fn on_file_request(&mut self, name: &str) {
        self.pending.borrow_mut().push_back((self.cid, name.to_owned()));
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::parse();
    let bind_addr = SocketAddr::new(config.bind_host, config.bind_port);
    let mut endpoint = Endpoint::bind(bind_addr).await?;
    let resources = ResourceRoot::new(config.resource_dir);
    let policy = pathquic::config::ServerIdentityPolicy::default();
    let pending_requests = Rc::new(RefCell::new(VecDeque::new()));

    info!(%bind_addr, "server listening");

    let mut tick = tokio::time::interval(Duration::from_millis(100));
    loop {
        tokio::select! {
            datagram = endpoint.recv_datagram() => {
                let (data, from_addr) = match datagram {
                    Ok(d) => d,
                    Err(err) => {
                        error!(%err, "socket error, shutting down");
                        return Err(err.into());
                    }
                };
                let pending = pending_requests.clone();
                let outbound = endpoint.dispatch_server(
                    &data,
                    from_addr,
                    bind_addr,
                    policy,
                    Instant::now(),
                    move |cid| Box::new(ServerHandler { cid, pending }),
                );
                if let Err(err) = endpoint.send_all(outbound).await {
                    warn!(%err, "failed to send datagram");
                }
            }
            _ = tick.tick() => {
                let now = Instant::now();
                serve_pending_requests(&mut endpoint, &resources, &pending_requests).await;
                let outbound = endpoint.tick(now);
                if let Err(err) = endpoint.send_all(outbound).await {
                    warn!(%err, "failed to send datagram");
                }
            }
        }
    }
}

async fn serve_pending_requests(
    endpoint: &mut Endpoint,
    resources: &ResourceRoot,
    pending: &Rc<RefCell<VecDeque<(ConnectionId, String)>>>,
) {
    let requests: Vec<_> = pending.borrow_mut().drain(..).collect();
    for (cid, name) in requests {
        let (mut file, file_size) = match resources.open(&name).await {
            Ok(opened) => opened,
            Err(err) => {
                warn!(%err, name, "rejecting file request");
                continue;
            }
        };

        let Some(connection) = endpoint.connection_mut(&cid) else {
            continue;
        };
        connection.enqueue_frame(frame::Frame::FileResponse(frame::FileResponse {
            file_size,
            chunk_size: resources.chunk_size(),
        }));

        let mut chunk_id = 0u32;
        while let Ok(Some(chunk)) = resources.read_chunk(&mut file).await {
            if let Some(connection) = endpoint.connection_mut(&cid) {
                connection.enqueue_frame(frame::Frame::FileData(frame::FileData { chunk_id, data: chunk }));
            }
            chunk_id += 1;
        }
        info!(name, chunks = chunk_id, "queued file transfer");
    }
}
