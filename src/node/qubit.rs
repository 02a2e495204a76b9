//! Qubit handles owned by a node slot.

use crate::core::errors::StateError;
use crate::core::{Gate, QubitId, Substrate};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::warn;

/// Fixed-capacity slot array of one node.
#[derive(Debug)]
pub(crate) struct SlotTable {
    slots: Vec<Option<QubitId>>,
}

impl SlotTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub(crate) fn free(&self) -> usize {
        self.capacity() - self.occupied()
    }

    /// Stores `id` in the lowest empty slot.
    fn claim(&mut self, id: QubitId) -> Option<usize> {
        let slot = self.slots.iter().position(Option::is_none)?;
        self.slots[slot] = Some(id);
        Some(slot)
    }

    fn release(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot) {
            *entry = None;
        }
    }
}

pub(crate) type SharedSlots = Arc<Mutex<SlotTable>>;

/// A live qubit held in one of a node's slots.
///
/// Gates mutate the shared state in place. [`Qubit::measure`] consumes the
/// handle; dropping an unmeasured qubit traces it out of the register. Either
/// way the slot becomes free again.
#[derive(Debug)]
pub struct Qubit {
    id: QubitId,
    slot: usize,
    slots: SharedSlots,
    substrate: Substrate,
    consumed: bool,
}

impl Qubit {
    /// Places `id` into a free slot, or hands it back if the table is full.
    pub(crate) fn adopt(
        id: QubitId,
        slots: &SharedSlots,
        substrate: &Substrate,
    ) -> Result<Self, QubitId> {
        let slot = slots.lock().claim(id).ok_or(id)?;
        Ok(Self {
            id,
            slot,
            slots: Arc::clone(slots),
            substrate: substrate.clone(),
            consumed: false,
        })
    }

    pub fn id(&self) -> QubitId {
        self.id
    }

    /// Index of the slot holding this qubit.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn h(&self) -> Result<(), StateError> {
        self.substrate.apply(&Gate::h(), &[self.id])
    }

    pub fn x(&self) -> Result<(), StateError> {
        self.substrate.apply(&Gate::x(), &[self.id])
    }

    pub fn z(&self) -> Result<(), StateError> {
        self.substrate.apply(&Gate::z(), &[self.id])
    }

    pub fn rot_y(&self, theta: f64) -> Result<(), StateError> {
        self.substrate.apply(&Gate::ry(theta), &[self.id])
    }

    /// CNOT with `self` as control and `target` as target.
    pub fn cnot(&self, target: &Qubit) -> Result<(), StateError> {
        self.substrate.apply(&Gate::cnot(), &[self.id, target.id])
    }

    /// Probability of reading 1, without disturbing the state.
    pub fn probability_of_one(&self) -> Result<f64, StateError> {
        self.substrate.probability_of_one(self.id)
    }

    /// Measures in the computational basis, invalidating the handle.
    pub fn measure(mut self) -> Result<bool, StateError> {
        let outcome = self.substrate.measure(self.id)?;
        self.consumed = true;
        Ok(outcome)
    }
}

impl Drop for Qubit {
    fn drop(&mut self) {
        if !self.consumed {
            if let Err(err) = self.substrate.discard(self.id) {
                warn!(qubit = self.id, %err, "failed to discard qubit");
            }
        }
        self.slots.lock().release(self.slot);
    }
}

/// Half of an entangled pair travelling to the node that will keep it.
///
/// Not yet bound to a slot; dropped halves are traced out.
#[derive(Debug)]
pub(crate) struct InFlightHalf {
    id: Option<QubitId>,
    substrate: Substrate,
}

impl InFlightHalf {
    pub(crate) fn new(id: QubitId, substrate: &Substrate) -> Self {
        Self {
            id: Some(id),
            substrate: substrate.clone(),
        }
    }

    /// Binds the half to a slot of the receiving node. `None` if the table is full.
    pub(crate) fn land(mut self, slots: &SharedSlots) -> Option<Qubit> {
        let id = self.id.take()?;
        match Qubit::adopt(id, slots, &self.substrate) {
            Ok(qubit) => Some(qubit),
            Err(id) => {
                self.id = Some(id);
                None
            }
        }
    }
}

impl Drop for InFlightHalf {
    fn drop(&mut self) {
        if let Some(id) = self.id.take() {
            if let Err(err) = self.substrate.discard(id) {
                warn!(qubit = id, %err, "failed to discard entangled half");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(capacity: usize) -> SharedSlots {
        Arc::new(Mutex::new(SlotTable::new(capacity)))
    }

    #[test]
    fn measuring_frees_the_slot() {
        let substrate = Substrate::seeded(1);
        let slots = table(1);
        let q = Qubit::adopt(substrate.allocate(), &slots, &substrate).unwrap();
        assert_eq!(slots.lock().free(), 0);
        q.x().unwrap();
        assert!(q.measure().unwrap());
        assert_eq!(slots.lock().free(), 1);
        assert_eq!(substrate.live_qubits(), 0);
    }

    #[test]
    fn dropping_discards_from_the_register() {
        let substrate = Substrate::seeded(2);
        let slots = table(2);
        let q = Qubit::adopt(substrate.allocate(), &slots, &substrate).unwrap();
        assert_eq!(substrate.live_qubits(), 1);
        drop(q);
        assert_eq!(substrate.live_qubits(), 0);
        assert_eq!(slots.lock().occupied(), 0);
    }

    #[test]
    fn full_table_rejects_landing_and_discards_half() {
        let substrate = Substrate::seeded(3);
        let slots = table(1);
        let (a, b) = substrate.create_pair().unwrap();
        let _kept = Qubit::adopt(a, &slots, &substrate).unwrap();
        let half = InFlightHalf::new(b, &substrate);
        assert!(half.land(&slots).is_none());
        assert_eq!(substrate.live_qubits(), 1);
    }
}
