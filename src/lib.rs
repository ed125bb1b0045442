// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! A simplified QUIC-like secure datagram transport: Connection-ID-addressed
//! endpoints, a binary packet/frame codec, X25519+HKDF key agreement,
//! CUBIC congestion control, connection migration via path validation, and
//! reliable bulk file transfer.

pub mod cid;
pub mod config;
pub mod connection;
pub mod crypto;
pub mod endpoint;
pub mod error;
pub mod file;
pub mod frame;
pub mod interfaces;
pub mod packet;
pub mod path;
pub mod recovery;

pub use cid::ConnectionId;
pub use connection::{Connection, ConnectionHandler};
pub use endpoint::Endpoint;
pub use error::{CodecError, ConnectionError, EndpointError};
