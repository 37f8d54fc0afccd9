use crate::store::{Customer, Order};
use serde::Serialize;

/// Human-readable `status` values written to records. Operators read these
/// straight from the store, so they never change meaning.
pub mod status {
    pub const CREATED: &str = "Created";
    pub const CUSTOMER_NOT_FOUND: &str = "Customer not found";
    pub const GROUP_NOT_FOUND: &str = "Group not found";
    pub const GROUP_CREATED: &str = "Group created";
    pub const GROUP_FOUND: &str = "Group found";
    pub const DRIVE_NOT_FOUND: &str = "Drive not found";
    pub const DRIVE_FOUND: &str = "Drive found";
    pub const GENERAL_FOLDER_NOT_FOUND: &str = "General folder not found";
    pub const GENERAL_FOLDER_FOUND: &str = "General folder found";
    pub const TEMPLATE_NOT_FOUND: &str = "Template not found";
    pub const ROOT_STRUCTURE_COPIED: &str = "Root structure copied";
    pub const ROOT_STRUCTURE_INCOMPLETE: &str = "Root structure partially copied";
    pub const COLUMNS_CREATED: &str = "Columns created";
    pub const COLUMNS_INCOMPLETE: &str = "Columns partially created";
    pub const TEAM_NOT_FOUND: &str = "Team not found";
    pub const TEAM_CREATED: &str = "Team created";
    pub const APP_INSTALLED: &str = "App installed";
    pub const APP_NOT_INSTALLED: &str = "App could not be installed";
    pub const PARENT_FOLDER_NOT_FOUND: &str = "Parent folder not found";
    pub const ORDER_FOLDER_NOT_FOUND: &str = "Order folder not found";
    pub const ORDER_FOLDER_CREATED: &str = "Order folder created";
    pub const STRUCTURE_CREATED: &str = "Structure created";
    pub const STRUCTURE_INCOMPLETE: &str = "Structure partially created";
    pub const CHANNEL_NOT_CREATED: &str = "Channel could not be created";
    pub const TAB_NOT_CREATED: &str = "Tab could not be created";
    pub const PLAN_NOT_CREATED: &str = "Plan could not be created";
    pub const HANDLED: &str = "Handled";
    pub const HANDLED_TEMPLATE_NOT_FOUND: &str = "Handled; template not found";
    pub const HANDLED_STRUCTURE_INCOMPLETE: &str = "Handled; structure partially created";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    /// The record was already terminal; nothing was done.
    AlreadyHandled,
    /// A dependency is not there yet. Redeliver later.
    Unprocessable { reason: String },
}

impl Outcome {
    pub fn unprocessable(reason: &str) -> Self {
        Self::Unprocessable {
            reason: reason.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed | Self::AlreadyHandled)
    }
}

/// The record as it stood when the workflow returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ProvisionedRecord {
    Customer(Customer),
    Order(Order),
}

impl ProvisionedRecord {
    pub fn id(&self) -> &str {
        match self {
            Self::Customer(customer) => &customer.id,
            Self::Order(order) => &order.id,
        }
    }

    pub fn status(&self) -> &str {
        match self {
            Self::Customer(customer) => &customer.status,
            Self::Order(order) => &order.status,
        }
    }
}

impl From<Customer> for ProvisionedRecord {
    fn from(customer: Customer) -> Self {
        Self::Customer(customer)
    }
}

impl From<Order> for ProvisionedRecord {
    fn from(order: Order) -> Self {
        Self::Order(order)
    }
}

/// What one workflow run did, for the trigger layer and the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowReport {
    pub workflow: &'static str,
    pub external_id: String,
    pub record_id: Option<String>,
    pub status: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<ProvisionedRecord>,
}

impl WorkflowReport {
    pub fn new(workflow: &'static str, external_id: &str) -> Self {
        Self {
            workflow,
            external_id: external_id.trim().to_string(),
            record_id: None,
            status: String::new(),
            outcome: Outcome::Completed,
            record: None,
        }
    }

    /// Closes the report with the record's final state.
    pub fn finish(mut self, record: impl Into<ProvisionedRecord>, outcome: Outcome) -> Self {
        let record = record.into();
        if !record.id().is_empty() {
            self.record_id = Some(record.id().to_string());
        }
        self.status = record.status().to_string();
        self.outcome = outcome;
        self.record = Some(record);
        self
    }

    pub fn rejected(mut self, reason: String) -> Self {
        self.status = reason.clone();
        self.outcome = Outcome::Unprocessable { reason };
        self
    }
}
