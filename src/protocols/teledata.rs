//! State transfer between two nodes.
//!
//! The sender prepares a single-qubit state and teleports it; the receiver
//! measures what arrives, optionally in the Hadamard basis.

use crate::node::{Node, ProgramMeta};
use crate::role::{AtStep, RoleOutput, StepError};

/// Single-qubit state built from |0> by X, then `ry(theta)`, then H.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Preparation {
    pub flip: bool,
    pub theta: Option<f64>,
    pub hadamard: bool,
}

impl Preparation {
    pub fn one() -> Self {
        Self {
            flip: true,
            ..Self::default()
        }
    }

    pub fn rotated(theta: f64) -> Self {
        Self {
            theta: Some(theta),
            ..Self::default()
        }
    }

    /// Probability of reading 1 when measuring the prepared state in the
    /// computational basis.
    pub fn probability_of_one(&self) -> f64 {
        if self.hadamard {
            // H maps every real state on the XZ great circle to P(1) = (1 - sin φ)/2
            let phi = self.bloch_angle();
            (1.0 - phi.sin()) / 2.0
        } else {
            (self.bloch_angle() / 2.0).sin().powi(2)
        }
    }

    /// Polar angle on the XZ plane of the Bloch sphere before the Hadamard.
    fn bloch_angle(&self) -> f64 {
        let base = if self.flip { std::f64::consts::PI } else { 0.0 };
        base + self.theta.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct TeleportSender {
    pub name: String,
    pub peer: String,
    pub preparation: Preparation,
    pub max_qubits: usize,
}

impl TeleportSender {
    pub fn new(name: impl Into<String>, peer: impl Into<String>, preparation: Preparation) -> Self {
        Self {
            name: name.into(),
            peer: peer.into(),
            preparation,
            max_qubits: 3,
        }
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta::new(&self.name, std::slice::from_ref(&self.peer), self.max_qubits)
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let step = "prepare";
        let qubit = node.new_qubit().at_step(step)?;
        if self.preparation.flip {
            qubit.x().at_step(step)?;
        }
        if let Some(theta) = self.preparation.theta {
            qubit.rot_y(theta).at_step(step)?;
        }
        if self.preparation.hadamard {
            qubit.h().at_step(step)?;
        }

        node.teleport_send(qubit, &self.peer)
            .await
            .at_step("teleport")?;

        Ok(RoleOutput::None)
    }
}

#[derive(Debug, Clone)]
pub struct TeleportReceiver {
    pub name: String,
    pub peer: String,
    /// Apply H before measuring
    pub hadamard: bool,
    pub max_qubits: usize,
}

impl TeleportReceiver {
    pub fn new(name: impl Into<String>, peer: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            peer: peer.into(),
            hadamard: false,
            max_qubits: 2,
        }
    }

    pub fn with_hadamard(mut self, hadamard: bool) -> Self {
        self.hadamard = hadamard;
        self
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta::new(&self.name, std::slice::from_ref(&self.peer), self.max_qubits)
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let qubit = node.teleport_recv(&self.peer).await.at_step("teleport")?;
        if self.hadamard {
            qubit.h().at_step("measure")?;
        }
        let result = qubit.measure().at_step("measure")?;
        Ok(RoleOutput::Bit(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn expected_probabilities() {
        assert_eq!(Preparation::default().probability_of_one(), 0.0);
        assert!((Preparation::one().probability_of_one() - 1.0).abs() < 1e-12);
        assert!((Preparation::rotated(PI / 2.0).probability_of_one() - 0.5).abs() < 1e-12);

        let plus = Preparation {
            hadamard: true,
            ..Preparation::default()
        };
        assert!((plus.probability_of_one() - 0.5).abs() < 1e-12);
    }
}
