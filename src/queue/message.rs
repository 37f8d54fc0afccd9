use crate::provisioning::{CustomerRequest, OrderRequest};
use serde::{Deserialize, Serialize};

/// One inbound trigger, tagged by workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisioningMessage {
    Customer(CustomerRequest),
    Order(OrderRequest),
}

impl ProvisioningMessage {
    /// Parses and validates a raw JSON body.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let message: Self = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        message.validate()?;
        Ok(message)
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Customer(request) => request.validate(),
            Self::Order(request) => request.validate(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Customer(_) => "customer",
            Self::Order(_) => "order",
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            Self::Customer(request) => request.external_id.trim(),
            Self::Order(request) => request.no.trim(),
        }
    }
}

/// What is written to `incoming/`: the message plus its delivery identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMessage {
    pub message_id: String,
    pub enqueued_at: i64,
    pub message: ProvisioningMessage,
}

impl QueuedMessage {
    pub fn parse(raw: &str) -> Result<Self, String> {
        let queued: Self = serde_json::from_str(raw).map_err(|err| err.to_string())?;
        if queued.message_id.trim().is_empty() {
            return Err("messageId must be non-empty".to_string());
        }
        queued.message.validate()?;
        Ok(queued)
    }
}
