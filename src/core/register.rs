//! Shared qubit register backing every node of a run.
//!
//! Qubits are addressed through opaque [`QubitId`] handles. The register keeps
//! all live qubits in one [`QuantumState`] so that entanglement between nodes
//! is represented exactly; measured or discarded qubits are traced out so the
//! density matrix only grows with the number of qubits alive at once.

use crate::core::errors::StateError;
use crate::core::{Gate, Measurement, QuantumState};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::trace;

/// Opaque reference to a qubit held in the register.
pub type QubitId = u64;

#[derive(Debug)]
pub struct QuantumRegister {
    state: QuantumState,
    /// `order[p]` is the handle stored at state position `p`
    order: Vec<QubitId>,
    next_id: QubitId,
    rng: StdRng,
}

impl QuantumRegister {
    /// Creates an empty register whose measurement outcomes are drawn from `rng`.
    pub fn new(rng: StdRng) -> Self {
        Self {
            state: QuantumState::new(0),
            order: Vec::new(),
            next_id: 0,
            rng,
        }
    }

    fn position(&self, id: QubitId) -> Result<usize, StateError> {
        self.order
            .iter()
            .position(|&q| q == id)
            .ok_or(StateError::UnknownQubit(id))
    }

    fn positions(&self, ids: &[QubitId]) -> Result<Vec<usize>, StateError> {
        ids.iter().map(|&id| self.position(id)).collect()
    }

    /// Number of qubits currently alive.
    pub fn live_qubits(&self) -> usize {
        self.order.len()
    }

    /// Adds a fresh qubit in |0>.
    pub fn allocate(&mut self) -> QubitId {
        let id = self.next_id;
        self.next_id += 1;
        self.state.push_qubit();
        self.order.push(id);
        trace!(qubit = id, live = self.order.len(), "allocated qubit");
        id
    }

    /// Adds two fresh qubits prepared in the Bell state |Φ+> = (|00> + |11>)/√2.
    pub fn create_pair(&mut self) -> Result<(QubitId, QubitId), StateError> {
        let a = self.allocate();
        let b = self.allocate();
        self.apply(&Gate::h(), &[a])?;
        self.apply(&Gate::cnot(), &[a, b])?;
        Ok((a, b))
    }

    pub fn apply(&mut self, gate: &Gate, targets: &[QubitId]) -> Result<(), StateError> {
        let targets = self.positions(targets)?;
        self.state.apply(gate, &targets)
    }

    pub fn apply_controlled(
        &mut self,
        gate: &Gate,
        targets: &[QubitId],
        controls: &[QubitId],
    ) -> Result<(), StateError> {
        let targets = self.positions(targets)?;
        let controls = self.positions(controls)?;
        self.state.apply_controlled(gate, &targets, Some(&controls))
    }

    /// Measures `id` in the computational basis and removes it from the register.
    pub fn measure(&mut self, id: QubitId) -> Result<bool, StateError> {
        let pos = self.position(id)?;
        let outcome = self
            .state
            .measure(&Measurement::z_basis(), &[pos], &mut self.rng)?;
        self.remove(pos)?;
        trace!(qubit = id, outcome = outcome.bit(), "measured qubit");
        Ok(outcome.bit())
    }

    /// Removes `id` without measuring it. Remaining qubits keep their reduced state.
    pub fn discard(&mut self, id: QubitId) -> Result<(), StateError> {
        let pos = self.position(id)?;
        self.remove(pos)?;
        trace!(qubit = id, "discarded qubit");
        Ok(())
    }

    fn remove(&mut self, pos: usize) -> Result<(), StateError> {
        self.state.trace_out(pos)?;
        self.order.remove(pos);
        Ok(())
    }

    /// Probability of reading 1 when measuring `id`, without disturbing it.
    pub fn probability_of_one(&self, id: QubitId) -> Result<f64, StateError> {
        self.state.probability_of_one(self.position(id)?)
    }
}

/// Cloneable handle to the register shared by all nodes of one run.
#[derive(Clone, Debug)]
pub struct Substrate {
    inner: Arc<Mutex<QuantumRegister>>,
}

impl Substrate {
    /// Register with reproducible measurement outcomes.
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QuantumRegister::new(StdRng::seed_from_u64(seed)))),
        }
    }

    pub fn allocate(&self) -> QubitId {
        self.inner.lock().allocate()
    }

    pub fn create_pair(&self) -> Result<(QubitId, QubitId), StateError> {
        self.inner.lock().create_pair()
    }

    pub fn apply(&self, gate: &Gate, targets: &[QubitId]) -> Result<(), StateError> {
        self.inner.lock().apply(gate, targets)
    }

    pub fn apply_controlled(
        &self,
        gate: &Gate,
        targets: &[QubitId],
        controls: &[QubitId],
    ) -> Result<(), StateError> {
        self.inner.lock().apply_controlled(gate, targets, controls)
    }

    pub fn measure(&self, id: QubitId) -> Result<bool, StateError> {
        self.inner.lock().measure(id)
    }

    pub fn discard(&self, id: QubitId) -> Result<(), StateError> {
        self.inner.lock().discard(id)
    }

    pub fn probability_of_one(&self, id: QubitId) -> Result<f64, StateError> {
        self.inner.lock().probability_of_one(id)
    }

    pub fn live_qubits(&self) -> usize {
        self.inner.lock().live_qubits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bell_pair_halves_always_agree() {
        let substrate = Substrate::seeded(11);
        for _ in 0..50 {
            let (a, b) = substrate.create_pair().unwrap();
            let ra = substrate.measure(a).unwrap();
            let rb = substrate.measure(b).unwrap();
            assert_eq!(ra, rb);
        }
        assert_eq!(substrate.live_qubits(), 0);
    }

    #[test]
    fn measurement_consumes_the_handle() {
        let substrate = Substrate::seeded(3);
        let q = substrate.allocate();
        substrate.apply(&Gate::x(), &[q]).unwrap();
        assert!(substrate.measure(q).unwrap());
        assert!(matches!(
            substrate.measure(q),
            Err(StateError::UnknownQubit(id)) if id == q
        ));
    }

    #[test]
    fn discarding_keeps_other_qubits_addressable() {
        let substrate = Substrate::seeded(5);
        let a = substrate.allocate();
        let b = substrate.allocate();
        let c = substrate.allocate();
        substrate.apply(&Gate::x(), &[c]).unwrap();
        substrate.discard(a).unwrap();
        assert!((substrate.probability_of_one(c).unwrap() - 1.0).abs() < 1e-12);
        assert!(substrate.probability_of_one(b).unwrap().abs() < 1e-12);
        assert_eq!(substrate.live_qubits(), 2);
    }

    #[test]
    fn controlled_gate_uses_handles_not_positions() {
        let substrate = Substrate::seeded(9);
        let control = substrate.allocate();
        let target = substrate.allocate();
        substrate.apply(&Gate::x(), &[control]).unwrap();
        substrate
            .apply_controlled(&Gate::x(), &[target], &[control])
            .unwrap();
        assert!(substrate.measure(target).unwrap());
        assert!(substrate.measure(control).unwrap());
    }
}
