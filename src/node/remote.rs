//! Remote operations built from one entangled pair and two classical bits.

use crate::node::sockets::{format_bit, parse_bit, parse_bit_pair};
use crate::node::{Node, NodeError, Qubit};
use tracing::debug;

impl Node {
    /// Control side of a distributed CNOT: `data` here controls a qubit on `peer`.
    ///
    /// Sends the measured communication bit, then waits for the target's bit
    /// and applies the Z correction to `data`.
    pub async fn distributed_cnot_source(
        &mut self,
        data: &Qubit,
        peer: &str,
    ) -> Result<(), NodeError> {
        self.check_peer(peer)?;
        self.check_capacity()?;

        let comm = self.generate_epr_send(peer).await?;

        data.cnot(&comm)?;
        let local_meas = comm.measure()?;
        self.flush().await;

        self.send(peer, format_bit(local_meas)).await?;

        let reply = self.recv(peer).await?;
        if parse_bit(peer, &reply)? {
            data.z()?;
        }
        self.flush().await;

        debug!(node = %self.name(), %peer, local_meas, "distributed cnot (control) done");
        Ok(())
    }

    /// Target side of a distributed CNOT: `data` here is flipped by a control on `peer`.
    ///
    /// Waits for the control's bit to apply the X correction, then sends back
    /// its own measured bit.
    pub async fn distributed_cnot_target(
        &mut self,
        data: &Qubit,
        peer: &str,
    ) -> Result<(), NodeError> {
        self.check_peer(peer)?;
        self.check_capacity()?;

        let comm = self.generate_epr_recv(peer).await?;

        comm.cnot(data)?;
        comm.h()?;
        let local_meas = comm.measure()?;
        self.flush().await;

        let remote = self.recv(peer).await?;
        if parse_bit(peer, &remote)? {
            data.x()?;
        }
        self.flush().await;

        self.send(peer, format_bit(local_meas)).await?;

        debug!(node = %self.name(), %peer, local_meas, "distributed cnot (target) done");
        Ok(())
    }

    /// Teleports the state of `data` to `peer`, consuming it.
    pub async fn teleport_send(&mut self, data: Qubit, peer: &str) -> Result<(), NodeError> {
        self.check_peer(peer)?;

        let comm = self.generate_epr_send(peer).await?;

        data.cnot(&comm)?;
        data.h()?;

        let r0 = data.measure()?;
        let r1 = comm.measure()?;
        self.flush().await;

        let msg = format!("{},{}", format_bit(r0), format_bit(r1));
        self.send(peer, &msg).await?;

        debug!(node = %self.name(), %peer, r0, r1, "teleport sent");
        Ok(())
    }

    /// Receives a state teleported by `peer` and returns the qubit now holding it.
    pub async fn teleport_recv(&mut self, peer: &str) -> Result<Qubit, NodeError> {
        self.check_peer(peer)?;

        let comm = self.generate_epr_recv(peer).await?;

        let msg = self.recv(peer).await?;
        let (r0, r1) = parse_bit_pair(peer, &msg)?;

        if r1 {
            comm.x()?;
        }
        if r0 {
            comm.z()?;
        }
        self.flush().await;

        debug!(node = %self.name(), %peer, r0, r1, "teleport received");
        Ok(comm)
    }
}
