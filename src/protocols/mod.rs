//! Protocol programs run by the nodes of a simulated network.
//!
//! Each submodule provides the roles of one protocol. A role declares what it
//! needs from its node through `meta()` and runs its body with `run(node)`.

pub mod ghz;
pub mod payment;
pub mod remote_cnot;
pub mod teledata;

pub use ghz::{GhzFollower, GhzLink, GhzRoot, ghz_roles};
pub use payment::{Bank, Client, Merchant, payment_roles};
pub use remote_cnot::{CnotControl, CnotTarget, ControlInput};
pub use teledata::{Preparation, TeleportReceiver, TeleportSender};
