//! Quantum-capable network node.
//!
//! A [`Node`] owns a fixed number of qubit slots, one classical and one
//! entanglement socket per provisioned peer, and a handle to the run's shared
//! [`Substrate`]. Every method that touches the network is `async`: awaiting
//! it is a suspension point at which the peer's protocol body gets to run.

pub mod error;
mod qubit;
mod remote;
pub mod sockets;

pub use error::{NodeError, SocketKind};
pub use qubit::Qubit;
pub use sockets::{ClassicalSocket, EprSocket};

use crate::core::Substrate;
use parking_lot::Mutex;
use qubit::{SharedSlots, SlotTable};
use rand::rngs::StdRng;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Resources a role declares before a run so the driver can provision them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramMeta {
    /// Display name, unique within a network.
    pub name: String,
    /// Peers this node needs a classical channel with.
    pub csockets: Vec<String>,
    /// Peers this node needs an entanglement channel with.
    pub epr_sockets: Vec<String>,
    /// Maximum number of qubits held at once.
    pub max_qubits: usize,
}

impl ProgramMeta {
    /// Metadata with both a classical and an entanglement channel to every peer.
    pub fn new(name: impl Into<String>, peers: &[String], max_qubits: usize) -> Self {
        Self {
            name: name.into(),
            csockets: peers.to_vec(),
            epr_sockets: peers.to_vec(),
            max_qubits,
        }
    }

    /// Union of classical and entanglement peers.
    pub fn peers(&self) -> BTreeSet<String> {
        self.csockets
            .iter()
            .chain(&self.epr_sockets)
            .cloned()
            .collect()
    }
}

pub struct Node {
    name: String,
    peers: BTreeSet<String>,
    slots: SharedSlots,
    csockets: HashMap<String, ClassicalSocket>,
    epr_sockets: HashMap<String, EprSocket>,
    substrate: Substrate,
    rng: StdRng,
}

impl Node {
    /// Creates a node without sockets; the driver attaches them afterwards.
    pub fn new(meta: &ProgramMeta, substrate: Substrate, rng: StdRng) -> Self {
        Self {
            name: meta.name.clone(),
            peers: meta.peers(),
            slots: Arc::new(Mutex::new(SlotTable::new(meta.max_qubits))),
            csockets: HashMap::new(),
            epr_sockets: HashMap::new(),
            substrate,
            rng,
        }
    }

    pub fn attach_classical(&mut self, socket: ClassicalSocket) {
        self.csockets.insert(socket.peer().to_string(), socket);
    }

    pub fn attach_epr(&mut self, socket: EprSocket) {
        self.epr_sockets.insert(socket.peer().to_string(), socket);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn peers(&self) -> &BTreeSet<String> {
        &self.peers
    }

    pub fn max_qubits(&self) -> usize {
        self.slots.lock().capacity()
    }

    pub fn free_slots(&self) -> usize {
        self.slots.lock().free()
    }

    pub fn occupied_slots(&self) -> usize {
        self.slots.lock().occupied()
    }

    /// Node-local randomness, seeded by the driver.
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    fn check_peer(&self, peer: &str) -> Result<(), NodeError> {
        if self.peers.contains(peer) {
            Ok(())
        } else {
            Err(NodeError::UnknownPeer {
                node: self.name.clone(),
                peer: peer.to_string(),
                peers: self.peers.iter().cloned().collect(),
            })
        }
    }

    /// A remote operation needs one free slot for its communication qubit.
    fn check_capacity(&self) -> Result<(), NodeError> {
        if self.free_slots() > 0 {
            Ok(())
        } else {
            Err(self.no_capacity())
        }
    }

    fn no_capacity(&self) -> NodeError {
        NodeError::NoCapacity {
            node: self.name.clone(),
            capacity: self.max_qubits(),
        }
    }

    fn csocket(&mut self, peer: &str) -> Result<&mut ClassicalSocket, NodeError> {
        self.check_peer(peer)?;
        self.csockets
            .get_mut(peer)
            .ok_or_else(|| NodeError::NoSocket {
                node: self.name.clone(),
                peer: peer.to_string(),
                kind: SocketKind::Classical,
            })
    }

    fn epr_socket(&mut self, peer: &str) -> Result<&mut EprSocket, NodeError> {
        self.check_peer(peer)?;
        self.epr_sockets
            .get_mut(peer)
            .ok_or_else(|| NodeError::NoSocket {
                node: self.name.clone(),
                peer: peer.to_string(),
                kind: SocketKind::Entanglement,
            })
    }

    /// Allocates a fresh |0> qubit into a free slot.
    pub fn new_qubit(&self) -> Result<Qubit, NodeError> {
        self.check_capacity()?;
        let id = self.substrate.allocate();
        Qubit::adopt(id, &self.slots, &self.substrate).map_err(|id| {
            let _ = self.substrate.discard(id);
            self.no_capacity()
        })
    }

    /// Yields to the scheduler so peers can reach their matching step.
    pub async fn flush(&self) {
        tokio::task::yield_now().await;
    }

    /// Sends `msg` to `peer` over the classical channel.
    pub async fn send(&mut self, peer: &str, msg: &str) -> Result<(), NodeError> {
        debug!(node = %self.name, %peer, %msg, "send");
        self.csocket(peer)?.send(msg)?;
        self.flush().await;
        Ok(())
    }

    /// Blocks until the next message from `peer` arrives.
    pub async fn recv(&mut self, peer: &str) -> Result<String, NodeError> {
        let msg = self.csocket(peer)?.recv().await?;
        debug!(node = %self.name, %peer, %msg, "recv");
        Ok(msg)
    }

    /// Creates an entangled pair with `peer` and keeps the local half.
    pub async fn generate_epr_send(&mut self, peer: &str) -> Result<Qubit, NodeError> {
        self.check_peer(peer)?;
        self.check_capacity()?;
        let substrate = self.substrate.clone();
        let half = self.epr_socket(peer)?.create_keep(&substrate).await?;
        let qubit = half.land(&self.slots).ok_or_else(|| self.no_capacity())?;
        debug!(node = %self.name, %peer, qubit = qubit.id(), "created entangled pair");
        self.flush().await;
        Ok(qubit)
    }

    /// Receives the half of an entangled pair created by `peer`.
    pub async fn generate_epr_recv(&mut self, peer: &str) -> Result<Qubit, NodeError> {
        self.check_peer(peer)?;
        self.check_capacity()?;
        let half = self.epr_socket(peer)?.recv_keep().await?;
        let qubit = half.land(&self.slots).ok_or_else(|| self.no_capacity())?;
        debug!(node = %self.name, %peer, qubit = qubit.id(), "received entangled half");
        Ok(qubit)
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("peers", &self.peers)
            .field("occupied", &self.occupied_slots())
            .field("capacity", &self.max_qubits())
            .finish()
    }
}
