use super::naming::{CustomerType, OrderType};
use serde::{Deserialize, Serialize};

/// Inbound request to provision a customer or supplier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRequest {
    pub external_id: String,
    #[serde(rename = "type", default)]
    pub customer_type: CustomerType,
    pub name: String,
    #[serde(default)]
    pub org_no: String,
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub web: String,
}

impl CustomerRequest {
    pub fn new(external_id: &str, customer_type: CustomerType, name: &str) -> Self {
        Self {
            external_id: external_id.to_string(),
            customer_type,
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.external_id.trim().is_empty() {
            return Err("customer externalId must be non-empty".to_string());
        }
        if self.name.trim().is_empty() {
            return Err("customer name must be non-empty".to_string());
        }
        Ok(())
    }
}

/// Inbound request to provision the folder (and, for projects, the channel,
/// tab and plan) of one order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    #[serde(alias = "externalId")]
    pub no: String,
    #[serde(rename = "type", default)]
    pub order_type: OrderType,
    pub customer_no: String,
    #[serde(default)]
    pub customer_type: CustomerType,
    #[serde(default)]
    pub seller: String,
    #[serde(default)]
    pub project_manager: String,
    #[serde(default)]
    pub additional_info: String,
}

impl OrderRequest {
    pub fn new(no: &str, order_type: OrderType, customer_no: &str) -> Self {
        Self {
            no: no.to_string(),
            order_type,
            customer_no: customer_no.to_string(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.no.trim().is_empty() {
            return Err("order no must be non-empty".to_string());
        }
        if self.customer_no.trim().is_empty() {
            return Err("order customerNo must be non-empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_accepts_external_id_alias() {
        let request: OrderRequest = serde_json::from_str(
            r#"{"externalId":"A12345-07","type":"quote","customerNo":"4711"}"#,
        )
        .expect("parse order");
        assert_eq!(request.no, "A12345-07");
        assert_eq!(request.order_type, OrderType::Quote);
        assert_eq!(request.customer_type, CustomerType::Customer);
        request.validate().expect("valid");
    }

    #[test]
    fn customer_request_requires_name() {
        let request: CustomerRequest =
            serde_json::from_str(r#"{"externalId":"4711","type":"Supplier","name":"  "}"#)
                .expect("parse customer");
        assert_eq!(request.customer_type, CustomerType::Supplier);
        assert!(request.validate().is_err());
    }

    #[test]
    fn unknown_type_is_rejected_at_parse_time() {
        let err = serde_json::from_str::<CustomerRequest>(
            r#"{"externalId":"4711","type":"Partner","name":"Acme"}"#,
        )
        .expect_err("unknown type");
        assert!(err.to_string().contains("customer type"));
    }
}
