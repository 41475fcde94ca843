//! Peer-to-peer layer for powchain.
//!
//! Nodes gossip new blocks and transactions to each other and catch up by
//! comparing heads and fetching block ranges. Frames travel over plain TCP
//! (see [`message`]).

pub mod error;
pub mod message;
pub mod network;
pub mod peer;

pub use error::{NetworkError, Result};
pub use message::{read_frame, write_frame, Message, MAX_FRAME_SIZE};
pub use network::{request, Network, NetworkConfig};
pub use peer::{backoff, FailureOutcome, PeerSet, PeerState, DEFAULT_REDIAL_INTERVAL};
