pub mod config;
mod core;
pub mod network;
pub mod node;
pub mod protocols;
mod role;

pub use crate::config::{ConfigError, SimConfig};
pub use crate::core::{
    Gate, Measurement, MeasurementResult, QuantumRegister, QuantumState, QubitId, Substrate,
    errors, utils,
};
pub use crate::network::{NetworkError, NodeOutcome, RunReport, ShotReport, Simulation};
pub use crate::node::{Node, NodeError, ProgramMeta, Qubit};
pub use crate::role::{ProtocolError, Role, RoleOutput, StepError};
