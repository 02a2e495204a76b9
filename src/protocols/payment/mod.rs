//! Three-party quantum payment protocol.
//!
//! The Bank teleports `K` qubits to the Client, each encoding a random value
//! bit in a random basis. The Client measures them in a basis derived from
//! HMAC-SHA256 of its shared secret over the Merchant's public id and reports
//! the results through the Merchant. The Bank re-derives that basis from its
//! own copy of the secret, keeps the positions where it agrees with its
//! preparation basis and accepts when the error rate over those positions is
//! below the configured threshold.

mod bank;
pub mod basis;
mod client;
mod merchant;
pub mod messages;
pub mod verify;

pub use bank::{Bank, BankPhase, Prepared};
pub use basis::{MAX_KEY_LENGTH, derive_basis};
pub use client::Client;
pub use merchant::Merchant;
pub use messages::{ClientMessage, MerchantMessage};
pub use verify::{Transaction, error_rate, sift, verify};

use crate::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub const BANK: &str = "Bank";
pub const CLIENT: &str = "Client";
pub const MERCHANT: &str = "Merchant";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Key length {requested} exceeds the {available} bits of an HMAC-SHA256 digest")]
    KeyTooLong { requested: usize, available: usize },

    #[error("Key length must be at least 1")]
    EmptyKey,

    #[error("Rejection threshold {0} must lie in (0, 1]")]
    InvalidThreshold(f64),

    #[error("No account registered for client {0:?}")]
    UnknownClient(String),

    #[error("Preparation holds {got} positions, expected {expected}")]
    PreparationLength { expected: usize, got: usize },

    #[error("No position where the bank's basis and the verification basis coincide")]
    NoCoincidence,

    #[error("Malformed payment message: expected {expected}, got {got:?}")]
    MalformedMessage { expected: &'static str, got: String },
}

/// Run parameters shared by all three roles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Number of qubits `K` the Bank prepares.
    pub key_length: usize,
    /// The Bank accepts iff the error rate is strictly below this value.
    pub rejection_threshold: f64,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            key_length: 16,
            rejection_threshold: 0.1,
        }
    }
}

impl PaymentConfig {
    /// Checks the parameters before any run starts.
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.key_length == 0 {
            return Err(PaymentError::EmptyKey);
        }
        if self.key_length > MAX_KEY_LENGTH {
            return Err(PaymentError::KeyTooLong {
                requested: self.key_length,
                available: MAX_KEY_LENGTH,
            });
        }
        if !(self.rejection_threshold > 0.0 && self.rejection_threshold <= 1.0) {
            return Err(PaymentError::InvalidThreshold(self.rejection_threshold));
        }
        Ok(())
    }
}

/// Key material fixed by an out-of-band trusted setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustedSetup {
    /// Shared secret of every client, keyed by the client's public id.
    pub accounts: BTreeMap<String, String>,
    /// Public id of the merchant taking part in the run.
    pub merchant_id: String,
}

impl TrustedSetup {
    pub fn new(merchant_id: impl Into<String>) -> Self {
        Self {
            accounts: BTreeMap::new(),
            merchant_id: merchant_id.into(),
        }
    }

    pub fn with_account(mut self, public_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.accounts.insert(public_id.into(), secret.into());
        self
    }

    pub fn secret_of(&self, client_id: &str) -> Result<&str, PaymentError> {
        self.accounts
            .get(client_id)
            .map(String::as_str)
            .ok_or_else(|| PaymentError::UnknownClient(client_id.to_string()))
    }
}

/// What the client itself holds: its public id and its copy of the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub public_id: String,
    pub secret: String,
}

/// The Bank's verdict, sent to the Merchant as `"ACCEPT"` or `"REJECT"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Accept => f.write_str("ACCEPT"),
            Decision::Reject => f.write_str("REJECT"),
        }
    }
}

impl FromStr for Decision {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPT" => Ok(Decision::Accept),
            "REJECT" => Ok(Decision::Reject),
            other => Err(PaymentError::MalformedMessage {
                expected: "\"ACCEPT\" or \"REJECT\"",
                got: other.to_string(),
            }),
        }
    }
}

/// Builds the Bank, Client and Merchant roles of one payment run, rejecting
/// an invalid `config` before anything runs.
pub fn payment_roles(
    setup: TrustedSetup,
    config: PaymentConfig,
    credentials: ClientCredentials,
) -> Result<Vec<Role>, PaymentError> {
    config.validate()?;
    let setup = Arc::new(setup);
    Ok(vec![
        Bank::new(Arc::clone(&setup), config).into(),
        Client::new(credentials, setup.merchant_id.clone(), config).into(),
        Merchant::new(setup.merchant_id.clone(), config).into(),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(PaymentConfig::default().validate().is_ok());
        let too_long = PaymentConfig {
            key_length: 257,
            ..PaymentConfig::default()
        };
        assert_eq!(
            too_long.validate(),
            Err(PaymentError::KeyTooLong {
                requested: 257,
                available: 256
            })
        );
        let empty = PaymentConfig {
            key_length: 0,
            ..PaymentConfig::default()
        };
        assert_eq!(empty.validate(), Err(PaymentError::EmptyKey));
        let bad_threshold = PaymentConfig {
            rejection_threshold: 0.0,
            ..PaymentConfig::default()
        };
        assert!(matches!(
            bad_threshold.validate(),
            Err(PaymentError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn decision_wire_format() {
        assert_eq!(Decision::Accept.to_string(), "ACCEPT");
        assert_eq!("REJECT".parse::<Decision>(), Ok(Decision::Reject));
        assert!("maybe".parse::<Decision>().is_err());
    }

    #[test]
    fn unknown_client_is_reported() {
        let setup = TrustedSetup::new("shop").with_account("alice", "1010");
        assert_eq!(setup.secret_of("alice"), Ok("1010"));
        assert_eq!(
            setup.secret_of("mallory"),
            Err(PaymentError::UnknownClient("mallory".into()))
        );
    }
}
