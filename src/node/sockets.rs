//! Point-to-point links between two nodes.
//!
//! Each link direction is a tokio unbounded channel, so a send never blocks
//! and a receive suspends until the peer's matching send. Messages arrive
//! exactly once, in send order.

use crate::core::Substrate;
use crate::node::error::{NodeError, SocketKind};
use crate::node::qubit::InFlightHalf;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;

/// Classical text channel to one peer.
#[derive(Debug)]
pub struct ClassicalSocket {
    peer: String,
    tx: UnboundedSender<String>,
    rx: UnboundedReceiver<String>,
}

impl ClassicalSocket {
    /// Creates the two connected ends of a classical link between `a` and `b`.
    /// The first socket belongs to `a`.
    pub fn pair(a: &str, b: &str) -> (ClassicalSocket, ClassicalSocket) {
        let (a_tx, b_rx) = unbounded_channel();
        let (b_tx, a_rx) = unbounded_channel();
        (
            ClassicalSocket {
                peer: b.to_string(),
                tx: a_tx,
                rx: a_rx,
            },
            ClassicalSocket {
                peer: a.to_string(),
                tx: b_tx,
                rx: b_rx,
            },
        )
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn send(&self, msg: impl Into<String>) -> Result<(), NodeError> {
        self.tx.send(msg.into()).map_err(|_| self.closed())
    }

    pub async fn recv(&mut self) -> Result<String, NodeError> {
        match self.rx.recv().await {
            Some(msg) => Ok(msg),
            None => Err(self.closed()),
        }
    }

    fn closed(&self) -> NodeError {
        NodeError::ChannelClosed {
            peer: self.peer.clone(),
            kind: SocketKind::Classical,
        }
    }
}

/// One half of a fresh pair on its way to the peer, with the handshake the
/// creator waits on.
#[derive(Debug)]
struct Delivery {
    half: InFlightHalf,
    taken: oneshot::Sender<()>,
}

/// Entanglement-generation link to one peer.
///
/// Creation is asymmetric: [`EprSocket::create_keep`] produces a fresh pair,
/// keeps one half and ships the other, which the peer collects with
/// [`EprSocket::recv_keep`]. The creator resumes only once the peer has taken
/// the half, so at most one pair per link is ever in transit.
#[derive(Debug)]
pub struct EprSocket {
    peer: String,
    tx: UnboundedSender<Delivery>,
    rx: UnboundedReceiver<Delivery>,
}

impl EprSocket {
    /// Creates the two connected ends of an entanglement link between `a` and `b`.
    pub fn pair(a: &str, b: &str) -> (EprSocket, EprSocket) {
        let (a_tx, b_rx) = unbounded_channel();
        let (b_tx, a_rx) = unbounded_channel();
        (
            EprSocket {
                peer: b.to_string(),
                tx: a_tx,
                rx: a_rx,
            },
            EprSocket {
                peer: a.to_string(),
                tx: b_tx,
                rx: b_rx,
            },
        )
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Creates a |Φ+> pair in `substrate`, hands one half to the peer and
    /// returns the other once the peer has taken it.
    pub(crate) async fn create_keep(
        &self,
        substrate: &Substrate,
    ) -> Result<InFlightHalf, NodeError> {
        let (local, remote) = substrate.create_pair()?;
        let local = InFlightHalf::new(local, substrate);
        let (taken, handshake) = oneshot::channel();
        self.tx
            .send(Delivery {
                half: InFlightHalf::new(remote, substrate),
                taken,
            })
            .map_err(|_| self.closed())?;
        handshake.await.map_err(|_| self.closed())?;
        Ok(local)
    }

    /// Waits for the half of a pair created by the peer.
    pub(crate) async fn recv_keep(&mut self) -> Result<InFlightHalf, NodeError> {
        match self.rx.recv().await {
            Some(Delivery { half, taken }) => {
                // The creator may have given up already; the half is still ours.
                let _ = taken.send(());
                Ok(half)
            }
            None => Err(self.closed()),
        }
    }

    fn closed(&self) -> NodeError {
        NodeError::ChannelClosed {
            peer: self.peer.clone(),
            kind: SocketKind::Entanglement,
        }
    }
}

/// Parses a correction bit sent as decimal text `"0"` or `"1"`.
pub fn parse_bit(peer: &str, text: &str) -> Result<bool, NodeError> {
    match text {
        "0" => Ok(false),
        "1" => Ok(true),
        other => Err(NodeError::MalformedMessage {
            peer: peer.to_string(),
            expected: "a single bit \"0\" or \"1\"",
            got: other.to_string(),
        }),
    }
}

/// Renders a bit the way [`parse_bit`] reads it.
pub fn format_bit(bit: bool) -> &'static str {
    if bit { "1" } else { "0" }
}

/// Parses the two teleportation correction bits sent as `"r0,r1"`.
pub fn parse_bit_pair(peer: &str, text: &str) -> Result<(bool, bool), NodeError> {
    let malformed = || NodeError::MalformedMessage {
        peer: peer.to_string(),
        expected: "two bits \"r0,r1\"",
        got: text.to_string(),
    };
    let (r0, r1) = text.split_once(',').ok_or_else(malformed)?;
    let r0 = parse_bit(peer, r0).map_err(|_| malformed())?;
    let r1 = parse_bit(peer, r1).map_err(|_| malformed())?;
    Ok((r0, r1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classical_messages_arrive_in_order() {
        let (alice, mut bob) = ClassicalSocket::pair("Alice", "Bob");
        alice.send("1").unwrap();
        alice.send("0,1").unwrap();
        assert_eq!(bob.recv().await.unwrap(), "1");
        assert_eq!(bob.recv().await.unwrap(), "0,1");
        assert_eq!(bob.peer(), "Alice");
    }

    #[tokio::test]
    async fn dropped_peer_closes_the_channel() {
        let (alice, mut bob) = ClassicalSocket::pair("Alice", "Bob");
        drop(alice);
        let err = bob.recv().await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::ChannelClosed { ref peer, kind: SocketKind::Classical } if peer == "Alice"
        ));
    }

    #[tokio::test]
    async fn pair_creation_waits_for_the_peer() {
        let substrate = Substrate::seeded(3);
        let (alice, mut bob) = EprSocket::pair("Alice", "Bob");
        let (local, remote) = tokio::join!(alice.create_keep(&substrate), bob.recv_keep());
        assert!(local.is_ok());
        assert!(remote.is_ok());
        assert_eq!(substrate.live_qubits(), 2);
        drop((local, remote));
        assert_eq!(substrate.live_qubits(), 0);
    }

    #[tokio::test]
    async fn pair_creation_fails_when_the_peer_is_gone() {
        let substrate = Substrate::seeded(3);
        let (alice, bob) = EprSocket::pair("Alice", "Bob");
        drop(bob);
        let err = alice.create_keep(&substrate).await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::ChannelClosed { kind: SocketKind::Entanglement, .. }
        ));
        assert_eq!(substrate.live_qubits(), 0);
    }

    #[test]
    fn bit_parsing_is_strict() {
        assert!(parse_bit("p", "1").unwrap());
        assert!(!parse_bit("p", "0").unwrap());
        assert!(parse_bit("p", "2").is_err());
        assert!(parse_bit("p", " 1").is_err());
        assert_eq!(parse_bit_pair("p", "1,0").unwrap(), (true, false));
        assert!(parse_bit_pair("p", "1").is_err());
        assert!(parse_bit_pair("p", "1,0,1").is_err());
    }
}
