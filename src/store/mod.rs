pub mod customer;
pub mod order;
pub mod record;
pub mod repository;

pub use customer::{Customer, CUSTOMERS_TABLE};
pub use order::{Order, ORDERS_TABLE};
pub use record::{FieldKind, FieldSpec, Record};
pub use repository::RecordStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite open failed at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },
    #[error("failed to create database parent {path}: {source}")]
    CreateParent {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite statement failed on `{table}`: {source}")]
    Sql {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
    #[error("record in `{table}` has no internal id")]
    MissingId { table: &'static str },
    #[error("record in `{table}` has no key to update by")]
    MissingKey { table: &'static str },
}
