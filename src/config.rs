// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration (§6), parsed from the command line by each binary.

use clap::Parser;
use std::{net::IpAddr, path::PathBuf, time::Duration};

pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// How long a client waits for a handshake response before giving up (§5).
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// How long a client waits for a requested file transfer to complete (§5).
pub const FILE_TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);
/// How long a migration waits for a PATH_RESPONSE before rolling back (§4.6).
pub const PATH_VALIDATION_TIMEOUT: Duration = Duration::from_secs(2);
/// How many times an unacknowledged Initial is retransmitted at a fixed interval (§4.7).
pub const INITIAL_RETRANSMISSIONS: u32 = 5;
pub const INITIAL_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(500);

/// Whether the server adopts the client-chosen destination CID as its own
/// (§9 open question), rather than allocating a fresh one and advertising it
/// via NEW_CONNECTION_ID. Kept as the default for faithfulness to the
/// original, exposed here as a configurable choice.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ServerIdentityPolicy {
    pub adopt_client_cid: bool,
}

impl Default for ServerIdentityPolicy {
    fn default() -> Self {
        Self {
            adopt_client_cid: true,
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "pathquic-server", about = "pathquic file-serving endpoint")]
pub struct ServerConfig {
    /// Address to bind the UDP socket to.
    #[arg(long, default_value = DEFAULT_BIND_HOST)]
    pub bind_host: IpAddr,

    /// Port to bind the UDP socket to.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub bind_port: u16,

    /// Root directory files are served from.
    #[arg(long, default_value = "./resources")]
    pub resource_dir: PathBuf,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "pathquic-client", about = "pathquic file-requesting client")]
pub struct ClientConfig {
    /// Server host to connect to.
    #[arg(long)]
    pub server_host: IpAddr,

    /// Server port to connect to.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub server_port: u16,

    /// File to request once the handshake completes.
    #[arg(long)]
    pub file: String,

    /// Where to write the received file.
    #[arg(long, default_value = "./received")]
    pub output_dir: PathBuf,
}
