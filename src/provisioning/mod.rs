//! The provisioning-state resolver: idempotent workflows that bring a
//! customer's or an order's remote resources in line with its record.
//!
//! Every run starts from the record's ledger flags and re-derives the next
//! step from them. Remote and store failures never escape a workflow; they are
//! logged and end the run with [`Outcome::Unprocessable`] so the trigger layer
//! can redeliver.

pub mod customer;
pub mod naming;
pub mod order;
pub mod outcome;
pub mod request;
pub mod template;

pub use naming::{
    channel_display_name, mail_nickname, normalize_order_external_id, parent_folder_name,
    CustomerType, OrderType, ParentFolder,
};
pub use outcome::{status, Outcome, ProvisionedRecord, WorkflowReport};
pub use request::{CustomerRequest, OrderRequest};
pub use template::{clone_template, TemplateCopy};

use crate::config::{CustomerSettings, Settings, TemplateSettings};
use crate::remote::ResourceClient;
use crate::store::RecordStore;

/// Composes the record store and the remote client into the customer and
/// order workflows.
#[derive(Debug, Clone)]
pub struct Provisioner {
    store: RecordStore,
    client: ResourceClient,
    templates: TemplateSettings,
    customer: CustomerSettings,
}

impl Provisioner {
    pub fn new(store: RecordStore, client: ResourceClient, settings: &Settings) -> Self {
        Self::with_sections(
            store,
            client,
            settings.templates.clone(),
            settings.customer.clone(),
        )
    }

    pub fn with_sections(
        store: RecordStore,
        client: ResourceClient,
        templates: TemplateSettings,
        customer: CustomerSettings,
    ) -> Self {
        Self {
            store,
            client,
            templates,
            customer,
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn client(&self) -> &ResourceClient {
        &self.client
    }
}
