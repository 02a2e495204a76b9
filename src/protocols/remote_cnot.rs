//! Two-node demonstration of the distributed CNOT.
//!
//! The control node prepares its input, the target node prepares its own, the
//! gate runs across the link and both sides measure. The joint outcomes match
//! those of a local CNOT on the same inputs.

use crate::node::{Node, ProgramMeta};
use crate::role::{AtStep, RoleOutput, StepError};

/// Input state of the control qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlInput {
    Zero,
    One,
    /// (|0> + |1>)/√2, turning the gate into a Bell-pair generator
    Plus,
}

#[derive(Debug, Clone)]
pub struct CnotControl {
    pub name: String,
    pub peer: String,
    pub input: ControlInput,
    pub max_qubits: usize,
}

impl CnotControl {
    pub fn new(name: impl Into<String>, peer: impl Into<String>, input: ControlInput) -> Self {
        Self {
            name: name.into(),
            peer: peer.into(),
            input,
            max_qubits: 2,
        }
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta::new(&self.name, std::slice::from_ref(&self.peer), self.max_qubits)
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let qubit = node.new_qubit().at_step("prepare")?;
        match self.input {
            ControlInput::Zero => {}
            ControlInput::One => qubit.x().at_step("prepare")?,
            ControlInput::Plus => qubit.h().at_step("prepare")?,
        }

        node.distributed_cnot_source(&qubit, &self.peer)
            .await
            .at_step("distributed-cnot")?;

        let result = qubit.measure().at_step("measure")?;
        Ok(RoleOutput::Bit(result))
    }
}

#[derive(Debug, Clone)]
pub struct CnotTarget {
    pub name: String,
    pub peer: String,
    pub input: bool,
    pub max_qubits: usize,
}

impl CnotTarget {
    pub fn new(name: impl Into<String>, peer: impl Into<String>, input: bool) -> Self {
        Self {
            name: name.into(),
            peer: peer.into(),
            input,
            max_qubits: 2,
        }
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta::new(&self.name, std::slice::from_ref(&self.peer), self.max_qubits)
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let qubit = node.new_qubit().at_step("prepare")?;
        if self.input {
            qubit.x().at_step("prepare")?;
        }

        node.distributed_cnot_target(&qubit, &self.peer)
            .await
            .at_step("distributed-cnot")?;

        let result = qubit.measure().at_step("measure")?;
        Ok(RoleOutput::Bit(result))
    }
}
