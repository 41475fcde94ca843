//! Peer layer error types.

use powchain_chain::ChainError;
use thiserror::Error;

/// Errors that can occur talking to peers.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("peer {addr} unreachable: {source}")]
    PeerUnreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("peer {0} timed out")]
    Timeout(String),

    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("connection closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer sent a rejected block: {0}")]
    Chain(#[from] ChainError),
}

pub type Result<T> = std::result::Result<T, NetworkError>;
