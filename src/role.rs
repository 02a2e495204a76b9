//! Protocol roles run by the driver, one per node.

use crate::node::{Node, NodeError, ProgramMeta};
use crate::protocols::ghz::{GhzFollower, GhzRoot};
use crate::protocols::payment::basis::to_bit_string;
use crate::protocols::payment::{Bank, Client, Decision, Merchant, PaymentError};
use crate::protocols::remote_cnot::{CnotControl, CnotTarget};
use crate::protocols::teledata::{TeleportReceiver, TeleportSender};
use std::fmt;
use thiserror::Error;

/// Value a role hands back to the driver when its protocol body completes.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleOutput {
    None,
    Bit(bool),
    Bits(Vec<bool>),
    Decision(Decision),
}

impl RoleOutput {
    /// The output rendered as binary digits, if it carries bits.
    pub fn bit_string(&self) -> Option<String> {
        match self {
            RoleOutput::Bit(b) => Some(to_bit_string(&[*b])),
            RoleOutput::Bits(bits) => Some(to_bit_string(bits)),
            RoleOutput::None | RoleOutput::Decision(_) => None,
        }
    }
}

impl fmt::Display for RoleOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleOutput::None => f.write_str("-"),
            RoleOutput::Decision(d) => write!(f, "{d}"),
            other => f.write_str(&other.bit_string().unwrap_or_default()),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl From<crate::core::errors::StateError> for ProtocolError {
    fn from(err: crate::core::errors::StateError) -> Self {
        ProtocolError::Node(NodeError::State(err))
    }
}

/// A failure together with the protocol step it interrupted.
#[derive(Error, Debug, Clone)]
#[error("step `{step}` failed: {source}")]
pub struct StepError {
    pub step: String,
    #[source]
    pub source: ProtocolError,
}

/// Tags a fallible step with its name.
pub(crate) trait AtStep<T> {
    fn at_step(self, step: impl fmt::Display) -> Result<T, StepError>;
}

impl<T, E: Into<ProtocolError>> AtStep<T> for Result<T, E> {
    fn at_step(self, step: impl fmt::Display) -> Result<T, StepError> {
        self.map_err(|err| StepError {
            step: step.to_string(),
            source: err.into(),
        })
    }
}

/// Closed set of protocol roles. Dispatch is by variant.
#[derive(Debug, Clone)]
pub enum Role {
    TeleportSender(TeleportSender),
    TeleportReceiver(TeleportReceiver),
    CnotControl(CnotControl),
    CnotTarget(CnotTarget),
    GhzRoot(GhzRoot),
    GhzFollower(GhzFollower),
    Bank(Bank),
    Client(Client),
    Merchant(Merchant),
}

impl Role {
    pub fn meta(&self) -> ProgramMeta {
        match self {
            Role::TeleportSender(r) => r.meta(),
            Role::TeleportReceiver(r) => r.meta(),
            Role::CnotControl(r) => r.meta(),
            Role::CnotTarget(r) => r.meta(),
            Role::GhzRoot(r) => r.meta(),
            Role::GhzFollower(r) => r.meta(),
            Role::Bank(r) => r.meta(),
            Role::Client(r) => r.meta(),
            Role::Merchant(r) => r.meta(),
        }
    }

    pub fn name(&self) -> String {
        self.meta().name
    }

    /// Runs the role's protocol body on `node` to completion.
    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        match self {
            Role::TeleportSender(r) => r.run(node).await,
            Role::TeleportReceiver(r) => r.run(node).await,
            Role::CnotControl(r) => r.run(node).await,
            Role::CnotTarget(r) => r.run(node).await,
            Role::GhzRoot(r) => r.run(node).await,
            Role::GhzFollower(r) => r.run(node).await,
            Role::Bank(r) => r.run(node).await,
            Role::Client(r) => r.run(node).await,
            Role::Merchant(r) => r.run(node).await,
        }
    }
}

macro_rules! impl_from_role {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Role {
                fn from(role: $variant) -> Self {
                    Role::$variant(role)
                }
            }
        )*
    };
}

impl_from_role!(
    TeleportSender,
    TeleportReceiver,
    CnotControl,
    CnotTarget,
    GhzRoot,
    GhzFollower,
    Bank,
    Client,
    Merchant,
);
