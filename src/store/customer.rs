use super::record::{
    flag_field, integer_field, optional_text_field, text_field, text_value, FieldKind, FieldSpec,
    Record,
};
use crate::provisioning::naming::CustomerType;
use crate::shared::ids::new_record_id;
use rusqlite::types::Value;
use serde::Serialize;

pub const CUSTOMERS_TABLE: &str = "Customers";

/// A customer or supplier and its provisioning ledger.
///
/// Remote ids start as `None` and are set once. The boolean flags only ever go
/// from `false` to `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub external_id: String,
    pub customer_type: CustomerType,
    pub name: String,
    pub org_no: String,
    pub street: String,
    pub postal_code: String,
    pub city: String,
    pub country: String,
    pub email: String,
    pub phone: String,
    pub web: String,
    pub group_id: Option<String>,
    pub drive_id: Option<String>,
    pub general_folder_id: Option<String>,
    pub team_id: Option<String>,
    pub group_created: bool,
    pub team_created: bool,
    pub general_folder_created: bool,
    pub copied_root_structure: bool,
    pub customer_no_column_created: bool,
    pub customer_name_column_created: bool,
    pub customer_type_column_created: bool,
    pub installed_app: bool,
    pub status: String,
    pub created: i64,
    pub modified: i64,
}

impl Customer {
    pub fn new(external_id: &str, customer_type: CustomerType, name: &str, now: i64) -> Self {
        Self {
            id: new_record_id(),
            external_id: external_id.trim().to_string(),
            customer_type,
            name: name.trim().to_string(),
            created: now,
            modified: now,
            ..Self::default()
        }
    }

    pub fn columns_created(&self) -> bool {
        self.customer_no_column_created
            && self.customer_name_column_created
            && self.customer_type_column_created
    }
}

static CUSTOMER_FIELDS: &[FieldSpec<Customer>] = &[
    FieldSpec {
        column: "id",
        kind: FieldKind::Text,
        is_key: true,
        persisted: true,
        get: |record| Value::Text(record.id.clone()),
        set: |record, value| record.id = text_value(value),
    },
    text_field!(Customer, external_id),
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
    text_field!(Customer, name),
    text_field!(Customer, org_no),
    text_field!(Customer, street),
    text_field!(Customer, postal_code),
    text_field!(Customer, city),
    text_field!(Customer, country),
    text_field!(Customer, email),
    text_field!(Customer, phone),
    text_field!(Customer, web),
    optional_text_field!(Customer, group_id),
    optional_text_field!(Customer, drive_id),
    optional_text_field!(Customer, general_folder_id),
    optional_text_field!(Customer, team_id),
    flag_field!(Customer, group_created),
    flag_field!(Customer, team_created),
    flag_field!(Customer, general_folder_created),
    flag_field!(Customer, copied_root_structure),
    flag_field!(Customer, customer_no_column_created),
    flag_field!(Customer, customer_name_column_created),
    flag_field!(Customer, customer_type_column_created),
    flag_field!(Customer, installed_app),
    text_field!(Customer, status),
    integer_field!(Customer, created),
    integer_field!(Customer, modified),
];

impl Record for Customer {
    const TABLE: &'static str = CUSTOMERS_TABLE;
    const CREATED_COLUMN: &'static str = "created";

    fn fields() -> &'static [FieldSpec<Self>] {
        CUSTOMER_FIELDS
    }

    fn internal_id(&self) -> &str {
        &self.id
    }

    fn natural_key(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("external_id", Value::Text(self.external_id.clone())),
            (
                "customer_type",
                Value::Text(self.customer_type.as_str().to_string()),
            ),
        ]
    }

    fn set_modified(&mut self, now: i64) {
        self.modified = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_id_is_a_key_column() {
        let keys: Vec<_> = Customer::fields()
            .iter()
            .filter(|field| field.is_key)
            .map(|field| field.column)
            .collect();
        assert_eq!(keys, vec!["id"]);
    }

    #[test]
    fn field_table_round_trips_every_column() {
        let mut source = Customer::new("4711", CustomerType::Supplier, "Acme", 100);
        source.group_id = Some("group-1".to_string());
        source.copied_root_structure = true;
        source.status = "Columns created".to_string();

        let mut copy = Customer::default();
        for field in Customer::fields() {
            (field.set)(&mut copy, (field.get)(&source));
        }
        assert_eq!(copy, source);
    }

    #[test]
    fn new_customer_starts_with_empty_ledger() {
        let customer = Customer::new(" 4711 ", CustomerType::Customer, " Acme ", 5);
        assert!(!customer.id.is_empty());
        assert_eq!(customer.external_id, "4711");
        assert_eq!(customer.name, "Acme");
        assert!(customer.group_id.is_none());
        assert!(!customer.group_created);
        assert!(!customer.columns_created());
    }
}
