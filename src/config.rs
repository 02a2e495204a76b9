//! TOML description of a simulation run.
//!
//! ```toml
//! protocol = "ghz"
//! shots = 200
//! seed = 7
//!
//! [ghz]
//! nodes = ["Alice", "Bob", "Charlie"]
//! first_link = "epr"
//! hadamard = ["Bob", "Charlie"]
//! ```

use crate::network::{NetworkError, Simulation};
use crate::protocols::ghz::{GhzLink, ghz_roles};
use crate::protocols::payment::{
    ClientCredentials, PaymentConfig, PaymentError, TrustedSetup, payment_roles,
};
use crate::protocols::remote_cnot::{CnotControl, CnotTarget, ControlInput};
use crate::protocols::teledata::{Preparation, TeleportReceiver, TeleportSender};
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtocolKind {
    Teleport,
    RemoteCnot,
    Ghz,
    Payment,
}

fn default_shots() -> usize {
    100
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub protocol: ProtocolKind,
    #[serde(default = "default_shots")]
    pub shots: usize,
    /// Base seed; unseeded runs draw one from the OS
    pub seed: Option<u64>,
    /// Per-shot limit in milliseconds
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub teleport: TeleportSection,
    #[serde(default)]
    pub remote_cnot: RemoteCnotSection,
    #[serde(default)]
    pub ghz: GhzSection,
    #[serde(default)]
    pub payment: PaymentSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeleportSection {
    pub sender: String,
    pub receiver: String,
    /// Apply X to the prepared qubit
    pub flip: bool,
    /// `ry` angle applied after the optional X
    pub theta: Option<f64>,
    /// Apply H as the last preparation step
    pub hadamard: bool,
    /// Receiver applies H before measuring
    pub measure_hadamard: bool,
}

impl Default for TeleportSection {
    fn default() -> Self {
        Self {
            sender: "Alice".into(),
            receiver: "Bob".into(),
            flip: true,
            theta: None,
            hadamard: false,
            measure_hadamard: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ControlInputSetting {
    Zero,
    One,
    Plus,
}

impl From<ControlInputSetting> for ControlInput {
    fn from(setting: ControlInputSetting) -> Self {
        match setting {
            ControlInputSetting::Zero => ControlInput::Zero,
            ControlInputSetting::One => ControlInput::One,
            ControlInputSetting::Plus => ControlInput::Plus,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteCnotSection {
    pub control: String,
    pub target: String,
    pub control_input: ControlInputSetting,
    pub target_input: bool,
}

impl Default for RemoteCnotSection {
    fn default() -> Self {
        Self {
            control: "Alice".into(),
            target: "Bob".into(),
            control_input: ControlInputSetting::One,
            target_input: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GhzLinkSetting {
    Epr,
    RemoteCnot,
}

impl From<GhzLinkSetting> for GhzLink {
    fn from(setting: GhzLinkSetting) -> Self {
        match setting {
            GhzLinkSetting::Epr => GhzLink::Epr,
            GhzLinkSetting::RemoteCnot => GhzLink::RemoteCnot,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GhzSection {
    /// Root first, then followers
    pub nodes: Vec<String>,
    pub first_link: GhzLinkSetting,
    /// Nodes measuring in the X basis
    pub hadamard: Vec<String>,
}

impl Default for GhzSection {
    fn default() -> Self {
        Self {
            nodes: vec!["Alice".into(), "Bob".into(), "Charlie".into()],
            first_link: GhzLinkSetting::Epr,
            hadamard: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSection {
    pub key_length: usize,
    pub rejection_threshold: f64,
    pub merchant_id: String,
    /// Bank registry: client public id to shared secret
    pub accounts: BTreeMap<String, String>,
    pub client_id: String,
    /// Secret the client actually uses; defaults to its registered one
    pub client_secret: Option<String>,
}

impl Default for PaymentSection {
    fn default() -> Self {
        let defaults = PaymentConfig::default();
        Self {
            key_length: defaults.key_length,
            rejection_threshold: defaults.rejection_threshold,
            merchant_id: "merchant-001".into(),
            accounts: BTreeMap::from([("client-001".to_string(), "s3cr3t".to_string())]),
            client_id: "client-001".into(),
            client_secret: None,
        }
    }
}

impl PaymentSection {
    pub fn config(&self) -> PaymentConfig {
        PaymentConfig {
            key_length: self.key_length,
            rejection_threshold: self.rejection_threshold,
        }
    }

    pub fn setup(&self) -> TrustedSetup {
        TrustedSetup {
            accounts: self.accounts.clone(),
            merchant_id: self.merchant_id.clone(),
        }
    }

    /// The client's own view. An unregistered client with no explicit secret
    /// gets an empty one and is rejected by the bank.
    pub fn credentials(&self) -> ClientCredentials {
        let secret = self
            .client_secret
            .clone()
            .or_else(|| self.accounts.get(&self.client_id).cloned())
            .unwrap_or_default();
        ClientCredentials {
            public_id: self.client_id.clone(),
            secret,
        }
    }
}

impl SimConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parses and validates a configuration.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// A config for `protocol` with every other setting at its default.
    pub fn for_protocol(protocol: ProtocolKind) -> Self {
        Self {
            protocol,
            shots: default_shots(),
            seed: None,
            timeout_ms: None,
            teleport: TeleportSection::default(),
            remote_cnot: RemoteCnotSection::default(),
            ghz: GhzSection::default(),
            payment: PaymentSection::default(),
        }
    }

    /// Checks the section of the selected protocol.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shots == 0 {
            return Err(invalid("shots", "must be at least 1"));
        }
        if self.timeout_ms == Some(0) {
            return Err(invalid("timeout_ms", "must be positive"));
        }

        match self.protocol {
            ProtocolKind::Teleport => {
                let t = &self.teleport;
                distinct("teleport", &[&t.sender, &t.receiver])?;
            }
            ProtocolKind::RemoteCnot => {
                let c = &self.remote_cnot;
                distinct("remote_cnot", &[&c.control, &c.target])?;
            }
            ProtocolKind::Ghz => {
                let g = &self.ghz;
                if g.nodes.len() < 2 {
                    return Err(invalid("ghz.nodes", "need a root and at least one follower"));
                }
                distinct("ghz.nodes", &g.nodes.iter().collect::<Vec<_>>())?;
                if let Some(stray) = g.hadamard.iter().find(|n| !g.nodes.contains(*n)) {
                    return Err(invalid("ghz.hadamard", format!("{stray} is not a GHZ node")));
                }
            }
            ProtocolKind::Payment => {
                self.payment.config().validate()?;
                if self.payment.merchant_id.is_empty() || self.payment.client_id.is_empty() {
                    return Err(invalid("payment", "public ids must not be empty"));
                }
                if [&self.payment.merchant_id, &self.payment.client_id]
                    .iter()
                    .any(|id| id.contains(','))
                {
                    return Err(invalid("payment", "public ids must not contain ','"));
                }
            }
        }
        Ok(())
    }

    /// Roles of the selected protocol.
    pub fn build_roles(&self) -> Result<Vec<Role>, ConfigError> {
        self.validate()?;
        let roles = match self.protocol {
            ProtocolKind::Teleport => {
                let t = &self.teleport;
                let preparation = Preparation {
                    flip: t.flip,
                    theta: t.theta,
                    hadamard: t.hadamard,
                };
                vec![
                    TeleportSender::new(&t.sender, &t.receiver, preparation).into(),
                    TeleportReceiver::new(&t.receiver, &t.sender)
                        .with_hadamard(t.measure_hadamard)
                        .into(),
                ]
            }
            ProtocolKind::RemoteCnot => {
                let c = &self.remote_cnot;
                vec![
                    CnotControl::new(&c.control, &c.target, c.control_input.into()).into(),
                    CnotTarget::new(&c.target, &c.control, c.target_input).into(),
                ]
            }
            ProtocolKind::Ghz => {
                let g = &self.ghz;
                ghz_roles(&g.nodes, g.first_link.into(), &g.hadamard)
            }
            ProtocolKind::Payment => {
                let p = &self.payment;
                payment_roles(p.setup(), p.config(), p.credentials())?
            }
        };
        Ok(roles)
    }

    /// A ready-to-run simulation with the configured seed and timeout.
    pub fn simulation(&self) -> Result<Simulation, ConfigError> {
        let mut sim = Simulation::new(self.build_roles()?)?;
        if let Some(seed) = self.seed {
            sim = sim.with_seed(seed);
        }
        if let Some(ms) = self.timeout_ms {
            sim = sim.with_timeout(Duration::from_millis(ms));
        }
        Ok(sim)
    }
}

fn distinct(field: &'static str, names: &[&String]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if name.is_empty() {
            return Err(invalid(field, "node names must not be empty"));
        }
        if !seen.insert(name.as_str()) {
            return Err(invalid(field, format!("{name} appears more than once")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config = SimConfig::from_toml("protocol = \"teleport\"").unwrap();
        assert_eq!(config.shots, 100);
        assert_eq!(config.teleport, TeleportSection::default());
        assert_eq!(config.build_roles().unwrap().len(), 2);
    }

    #[test]
    fn payment_section_parses() {
        let text = r#"
            protocol = "payment"
            shots = 3
            seed = 11

            [payment]
            key_length = 32
            rejection_threshold = 0.2
            merchant_id = "shop"
            client_id = "alice"
            accounts = { alice = "hunter2" }
        "#;
        let config = SimConfig::from_toml(text).unwrap();
        assert_eq!(config.payment.config().key_length, 32);
        assert_eq!(config.payment.credentials().secret, "hunter2");
        let names: Vec<String> = config
            .build_roles()
            .unwrap()
            .iter()
            .map(Role::name)
            .collect();
        assert_eq!(names, ["Bank", "Client", "Merchant"]);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(matches!(
            SimConfig::from_toml("protocol = \"payment\"\n[payment]\nkey_length = 300"),
            Err(ConfigError::Payment(PaymentError::KeyTooLong { .. }))
        ));
        assert!(matches!(
            SimConfig::from_toml("protocol = \"ghz\"\n[ghz]\nnodes = [\"A\"]"),
            Err(ConfigError::Invalid { field: "ghz.nodes", .. })
        ));
        assert!(matches!(
            SimConfig::from_toml("protocol = \"ghz\"\n[ghz]\nhadamard = [\"Zed\"]"),
            Err(ConfigError::Invalid { field: "ghz.hadamard", .. })
        ));
        assert!(matches!(
            SimConfig::from_toml("protocol = \"teleport\"\nshots = 0"),
            Err(ConfigError::Invalid { field: "shots", .. })
        ));
        assert!(matches!(
            SimConfig::from_toml("protocol = \"quantum-money\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn ghz_links_and_bases_are_configurable() {
        let text = r#"
            protocol = "ghz"
            [ghz]
            nodes = ["R", "F1", "F2", "F3"]
            first_link = "remote-cnot"
            hadamard = ["F2"]
        "#;
        let roles = SimConfig::from_toml(text).unwrap().build_roles().unwrap();
        assert_eq!(roles.len(), 4);
        assert!(matches!(&roles[0], Role::GhzRoot(r) if r.first_link == GhzLink::RemoteCnot));
        assert!(matches!(&roles[2], Role::GhzFollower(f) if f.hadamard));
    }
}
