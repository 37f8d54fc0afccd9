use super::record::{
    flag_field, integer_field, optional_text_field, text_field, text_value, FieldKind, FieldSpec,
    Record,
};
use crate::provisioning::naming::{CustomerType, OrderType, ParentFolder};
use crate::shared::ids::new_record_id;
use rusqlite::types::Value;
use serde::Serialize;

pub const ORDERS_TABLE: &str = "Orders";

/// An order, project, quote or purchase and its provisioning ledger.
///
/// `handled` is terminal: once set, no further automatic retry is needed. The
/// other flags are recomputed on every run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub external_id: String,
    pub order_type: OrderType,
    pub customer_id: Option<String>,
    pub customer_no: String,
    pub customer_type: CustomerType,
    pub seller: String,
    pub project_manager: String,
    pub additional_info: String,
    /// Resolved per run, never stored.
    pub drive_id: Option<String>,
    pub folder_id: Option<String>,
    pub channel_id: Option<String>,
    pub plan_id: Option<String>,
    pub group_found: bool,
    pub drive_found: bool,
    pub general_folder_found: bool,
    pub orders_folder_found: bool,
    pub offers_folder_found: bool,
    pub purchase_folder_found: bool,
    pub created_folder: bool,
    pub structure_created: bool,
    pub channel_created: bool,
    pub tab_created: bool,
    pub plan_created: bool,
    pub members_added: bool,
    pub handled: bool,
    pub status: String,
    pub created: i64,
    pub modified: i64,
}

impl Order {
    pub fn new(external_id: &str, order_type: OrderType, now: i64) -> Self {
        Self {
            id: new_record_id(),
            external_id: external_id.to_string(),
            order_type,
            created: now,
            modified: now,
            ..Self::default()
        }
    }

    /// Sets the flag for `parent` and clears the other two; they are mutually exclusive.
    pub fn mark_parent_folder_found(&mut self, parent: ParentFolder) {
        self.orders_folder_found = parent == ParentFolder::Orders;
        self.offers_folder_found = parent == ParentFolder::Offers;
        self.purchase_folder_found = parent == ParentFolder::Purchases;
    }
}

static ORDER_FIELDS: &[FieldSpec<Order>] = &[
    FieldSpec {
        column: "id",
        kind: FieldKind::Text,
        is_key: true,
        persisted: true,
        get: |record| Value::Text(record.id.clone()),
        set: |record, value| record.id = text_value(value),
    },
    text_field!(Order, external_id),
    FieldSpec {
        column: "order_type",
        kind: FieldKind::Text,
        is_key: false,
        persisted: true,
        get: |record| Value::Text(record.order_type.as_str().to_string()),
        set: |record, value| {
            record.order_type = OrderType::parse(&text_value(value)).unwrap_or_default()
        },
    },
    optional_text_field!(Order, customer_id),
    text_field!(Order, customer_no),
    FieldSpec {
        column: "customer_type",
        kind: FieldKind::Text,
        is_key: false,
        persisted: true,
        get: |record| Value::Text(record.customer_type.as_str().to_string()),
        set: |record, value| {
            record.customer_type = CustomerType::parse(&text_value(value)).unwrap_or_default()
        },
    },
    text_field!(Order, seller),
    text_field!(Order, project_manager),
    text_field!(Order, additional_info),
    optional_text_field!(Order, drive_id, persisted = false),
    optional_text_field!(Order, folder_id),
    optional_text_field!(Order, channel_id),
    optional_text_field!(Order, plan_id),
    flag_field!(Order, group_found),
    flag_field!(Order, drive_found),
    flag_field!(Order, general_folder_found),
    flag_field!(Order, orders_folder_found),
    flag_field!(Order, offers_folder_found),
    flag_field!(Order, purchase_folder_found),
    flag_field!(Order, created_folder),
    flag_field!(Order, structure_created),
    flag_field!(Order, channel_created),
    flag_field!(Order, tab_created),
    flag_field!(Order, plan_created),
    flag_field!(Order, members_added),
    flag_field!(Order, handled),
    text_field!(Order, status),
    integer_field!(Order, created),
    integer_field!(Order, modified),
];

impl Record for Order {
    const TABLE: &'static str = ORDERS_TABLE;
    const CREATED_COLUMN: &'static str = "created";

    fn fields() -> &'static [FieldSpec<Self>] {
        ORDER_FIELDS
    }

    fn internal_id(&self) -> &str {
        &self.id
    }

    fn natural_key(&self) -> Vec<(&'static str, Value)> {
        vec![("external_id", Value::Text(self.external_id.clone()))]
    }

    fn set_modified(&mut self, now: i64) {
        self.modified = now;
    }
}
