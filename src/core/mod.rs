pub mod errors;
mod gates;
mod measurements;
pub mod register;
mod state;
pub mod utils;

pub use gates::Gate;
pub use measurements::{Measurement, MeasurementResult};
pub use register::{QubitId, QuantumRegister, Substrate};
pub use state::QuantumState;
