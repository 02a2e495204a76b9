use super::{BANK, CLIENT, ClientMessage, Decision, MERCHANT, MerchantMessage, PaymentConfig};
use crate::node::{Node, ProgramMeta};
use crate::role::{AtStep, RoleOutput, StepError};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Merchant {
    pub name: String,
    pub bank: String,
    pub client: String,
    /// Own public id, appended to the client's report
    pub public_id: String,
    pub config: PaymentConfig,
    pub max_qubits: usize,
}

impl Merchant {
    pub fn new(public_id: impl Into<String>, config: PaymentConfig) -> Self {
        Self {
            name: MERCHANT.to_string(),
            bank: BANK.to_string(),
            client: CLIENT.to_string(),
            public_id: public_id.into(),
            config,
            max_qubits: 1,
        }
    }

    pub fn meta(&self) -> ProgramMeta {
        ProgramMeta {
            name: self.name.clone(),
            csockets: vec![self.bank.clone(), self.client.clone()],
            epr_sockets: Vec::new(),
            max_qubits: self.max_qubits,
        }
    }

    pub async fn run(self, node: &mut Node) -> Result<RoleOutput, StepError> {
        let raw = node.recv(&self.client).await.at_step("awaiting-client")?;
        let report =
            ClientMessage::parse(&raw, self.config.key_length).at_step("awaiting-client")?;

        let forward = MerchantMessage::forward(report, &self.public_id);
        node.send(&self.bank, &forward.to_string())
            .await
            .at_step("forwarding")?;

        let reply = node.recv(&self.bank).await.at_step("awaiting-decision")?;
        let decision: Decision = reply.parse().at_step("awaiting-decision")?;
        info!(merchant = %self.public_id, %decision, "payment decided");

        Ok(RoleOutput::Decision(decision))
    }
}
