// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy for the wire codec, the connection state machine, and the endpoint.
//!
//! Parsing errors are always local and non-fatal to the owning connection; state-machine
//! violations are fatal to the connection only; socket/OS errors are fatal to the endpoint.

/// Errors raised while decoding a header, a frame, or a packet off the wire.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The buffer was shorter than the minimum header size, or a length field
    /// overran the remaining buffer.
    #[error("malformed header: {reason}")]
    MalformedHeader { reason: &'static str },

    /// The first byte of a frame did not match any known frame tag.
    #[error("unknown frame tag: 0x{tag:02x}")]
    UnknownFrame { tag: u8 },

    /// A frame's declared length exceeds what remains in the buffer.
    #[error("short frame: needed {needed} bytes, had {available}")]
    ShortFrame { needed: usize, available: usize },

    /// A frame's body was the right length but failed a content-level check
    /// (e.g. a FILE_REQUEST name that is not valid UTF-8).
    #[error("invalid frame body: {reason}")]
    InvalidFrameBody { reason: &'static str },

    /// The packet's frame-region length prefix did not match the remaining buffer.
    #[error("truncated packet: frame region length {declared} exceeds buffer of {available}")]
    TruncatedPacket { declared: usize, available: usize },
}

/// Errors that terminate a single [`crate::connection::Connection`] but not the endpoint.
#[derive(thiserror::Error, Debug)]
pub enum ConnectionError {
    /// No path has been established yet; the caller attempted to send before one exists.
    #[error("no active path available")]
    NoActivePath,

    /// The handshake did not complete within the configured timeout.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// A migration's path validation did not complete within the configured timeout;
    /// the connection has rolled back to its prior active path.
    #[error("path validation timed out, rolled back to prior path")]
    PathValidationTimeout,

    /// A file transfer did not complete within the configured timeout.
    #[error("file transfer timed out")]
    FileTransferTimeout,

    /// A datagram referenced a path or CID that is not known to this connection.
    #[error("codec error on an otherwise-established connection: {0}")]
    Codec(#[from] CodecError),
}

/// Errors that are fatal to the owning [`crate::endpoint::Endpoint`].
#[derive(thiserror::Error, Debug)]
pub enum EndpointError {
    /// The underlying UDP socket returned an I/O error.
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),
}
