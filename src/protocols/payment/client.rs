use super::basis::derive_basis;
use super::{BANK, CLIENT, ClientCredentials, ClientMessage, MERCHANT, PaymentConfig};
use crate::node::{Node, ProgramMeta};
use crate::role::{AtStep, RoleOutput, StepError};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Client {
    pub name: String,
    pub bank: String,
    pub merchant: String,
    pub credentials: ClientCredentials,
    /// Public id of the merchant being paid
    pub merchant_id: String,
    pub config: PaymentConfig,
    pub max_qubits: usize,
}

impl Client {
    pub fn new(
        credentials: ClientCredentials,
        merchant_id: impl Into<String>,
        config: PaymentConfig,
    ) -> Self {
        Self {
            name: CLIENT.to_string(),
            bank: BANK.to_string(),
            merchant: MERCHANT.to_string(),
            credentials,
            merchant_id: merchant_id.into(),
            config,
            max_qubits: 2,
        }
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta {
            name: self.name.clone(),
            csockets: vec![self.bank.clone(), self.merchant.clone()],
            epr_sockets: vec![self.bank.clone()],
            max_qubits: self.max_qubits,
        }
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let k = self.config.key_length;

        // Independent of the qubits, so each one is measured as soon as it lands
        let basis = derive_basis(&self.credentials.secret, &self.merchant_id, k)
            .at_step("deriving-basis")?;

        let mut bits = Vec::with_capacity(k);
        for (i, &hadamard) in basis.iter().enumerate() {
            let step = format!("receiving[{i}]");
            let qubit = node.teleport_recv(&self.bank).await.at_step(&step)?;
            if hadamard {
                qubit.h().at_step(&step)?;
            }
            bits.push(qubit.measure().at_step(&step)?);
        }

        let msg = ClientMessage {
            client_id: self.credentials.public_id.clone(),
            bits,
        };
        debug!(%msg, "client reporting to merchant");
        node.send(&self.merchant, &msg.to_string())
            .await
            .at_step("reporting")?;

        Ok(RoleOutput::Bits(msg.bits))
    }
}
