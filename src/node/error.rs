use thiserror::Error;

use crate::core::errors::StateError;

/// Which kind of link a socket models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Classical,
    Entanglement,
}

impl std::fmt::Display for SocketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketKind::Classical => f.write_str("classical"),
            SocketKind::Entanglement => f.write_str("entanglement"),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum NodeError {
    #[error("{peer} is not a peer of {node} (peers: {peers:?})")]
    UnknownPeer {
        node: String,
        peer: String,
        peers: Vec<String>,
    },

    #[error("{node} has no free qubit slot (capacity {capacity})")]
    NoCapacity { node: String, capacity: usize },

    #[error("{node} has no {kind} socket to {peer}")]
    NoSocket {
        node: String,
        peer: String,
        kind: SocketKind,
    },

    #[error("{kind} channel with {peer} is closed")]
    ChannelClosed { peer: String, kind: SocketKind },

    #[error("Malformed message from {peer}: expected {expected}, got {got:?}")]
    MalformedMessage {
        peer: String,
        expected: &'static str,
        got: String,
    },

    #[error("Quantum state error: {0}")]
    State(#[from] StateError),
}
