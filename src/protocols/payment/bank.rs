use super::basis::{derive_basis, to_bit_string};
use super::verify::verify;
use super::{BANK, CLIENT, MERCHANT, MerchantMessage, PaymentConfig, PaymentError, TrustedSetup};
use crate::node::{Node, ProgramMeta};
use crate::role::{AtStep, RoleOutput, StepError};
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress of the Bank through one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankPhase {
    Preparing(usize),
    AwaitingMerchantMsg,
    Verifying,
    Deciding,
    Sending,
    Done,
}

impl fmt::Display for BankPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BankPhase::Preparing(i) => write!(f, "preparing[{i}]"),
            BankPhase::AwaitingMerchantMsg => f.write_str("awaiting-merchant-message"),
            BankPhase::Verifying => f.write_str("verifying"),
            BankPhase::Deciding => f.write_str("deciding"),
            BankPhase::Sending => f.write_str("sending"),
            BankPhase::Done => f.write_str("done"),
        }
    }
}

/// Basis and value bit of every prepared position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    pub basis: Vec<bool>,
    pub values: Vec<bool>,
}

impl Prepared {
    pub fn random<R: Rng + ?Sized>(key_length: usize, rng: &mut R) -> Self {
        let (basis, values) = (0..key_length)
            .map(|_| (rng.random_bool(0.5), rng.random_bool(0.5)))
            .unzip();
        Self { basis, values }
    }

    fn check_length(&self, expected: usize) -> Result<(), PaymentError> {
        for got in [self.basis.len(), self.values.len()] {
            if got != expected {
                return Err(PaymentError::PreparationLength { expected, got });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Bank {
    pub name: String,
    pub client: String,
    pub merchant: String,
    pub setup: Arc<TrustedSetup>,
    pub config: PaymentConfig,
    /// Fixed preparation instead of a random one
    pub preparation: Option<Prepared>,
    pub max_qubits: usize,
}

impl Bank {
    pub fn new(setup: Arc<TrustedSetup>, config: PaymentConfig) -> Self {
        Self {
            name: BANK.to_string(),
            client: CLIENT.to_string(),
            merchant: MERCHANT.to_string(),
            setup,
            config,
            preparation: None,
            max_qubits: 2,
        }
    }

    /// Uses `prepared` instead of drawing random bases and values.
    pub fn with_preparation(mut self, prepared: Prepared) -> Result<Self, PaymentError> {
        prepared.check_length(self.config.key_length)?;
        self.preparation = Some(prepared);
        Ok(self)
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta {
            name: self.name.clone(),
            csockets: vec![self.client.clone(), self.merchant.clone()],
            epr_sockets: vec![self.client.clone()],
            max_qubits: self.max_qubits,
        }
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let k = self.config.key_length;
        self.config.validate().at_step("configuration")?;

        let prepared = match self.preparation.clone() {
            Some(prepared) => {
                prepared.check_length(k).at_step("configuration")?;
                prepared
            }
            None => Prepared::random(k, node.rng()),
        };

        for i in 0..k {
            let phase = BankPhase::Preparing(i);
            let qubit = node.new_qubit().at_step(phase)?;
            if prepared.values[i] {
                qubit.x().at_step(phase)?;
            }
            if prepared.basis[i] {
                qubit.h().at_step(phase)?;
            }
            node.teleport_send(qubit, &self.client).await.at_step(phase)?;
        }
        debug!(
            basis = %to_bit_string(&prepared.basis),
            values = %to_bit_string(&prepared.values),
            "bank prepared all positions"
        );

        let phase = BankPhase::AwaitingMerchantMsg;
        let raw = node.recv(&self.merchant).await.at_step(phase)?;
        let report = MerchantMessage::parse(&raw, k).at_step(phase)?;

        let phase = BankPhase::Verifying;
        let secret = self.setup.secret_of(&report.client_id).at_step(phase)?;
        let verification_basis = derive_basis(secret, &report.merchant_id, k).at_step(phase)?;

        let phase = BankPhase::Deciding;
        let tx = verify(
            &prepared.basis,
            &prepared.values,
            report,
            verification_basis,
            self.config.rejection_threshold,
        );
        debug!(%phase, coincident = tx.coincident.len(), mismatches = tx.mismatches, "sifted");
        match tx.error_rate {
            Some(rate) => info!(
                client = %tx.client_id,
                merchant = %tx.merchant_id,
                error_rate = rate,
                decision = %tx.decision,
                "transaction verified"
            ),
            None => warn!(
                client = %tx.client_id,
                merchant = %tx.merchant_id,
                "no coincident positions, rejecting"
            ),
        }

        let phase = BankPhase::Sending;
        node.send(&self.merchant, &tx.decision.to_string())
            .await
            .at_step(phase)?;

        debug!(phase = %BankPhase::Done, "bank finished");
        Ok(RoleOutput::Decision(tx.decision))
    }
}
