use super::record::Record;
use super::{Customer, Order, StoreError};
use crate::provisioning::naming::CustomerType;
use crate::shared::ids::now_secs;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::fs;
use std::path::{Path, PathBuf};

/// Relational store for [`Customer`] and [`Order`] rows.
///
/// The plain operations never fail outward: errors are logged and surface as
/// `false`, `None` or an empty list. The `try_*` forms return the error.
///
/// Updates overwrite the whole row. Every persisted non-key field whose value is
/// not null is written, so a field left empty in memory clears the stored value.
/// Callers must load the record before mutating it.
#[derive(Debug, Clone)]
pub struct RecordStore {
    db_path: PathBuf,
}

impl RecordStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::CreateParent {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let store = Self {
            db_path: db_path.to_path_buf(),
        };

        // Ensure open is valid now to fail fast.
        let _ = store.connect()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn ensure_schema(&self) -> Result<(), StoreError> {
        let connection = self.connect()?;
        connection
            .execute_batch(&create_table_sql::<Customer>())
            .map_err(|source| StoreError::Sql {
                table: Customer::TABLE,
                source,
            })?;
        connection
            .execute_batch(&create_table_sql::<Order>())
            .map_err(|source| StoreError::Sql {
                table: Order::TABLE,
                source,
            })?;
        connection
            .execute_batch(
                "
                CREATE INDEX IF NOT EXISTS idx_customers_external
                    ON \"Customers\"(external_id, customer_type);
                CREATE INDEX IF NOT EXISTS idx_orders_external
                    ON \"Orders\"(external_id);
                ",
            )
            .map_err(|source| StoreError::Sql {
                table: Customer::TABLE,
                source,
            })?;
        Ok(())
    }

    /// Rows matching every `(column, value)` filter, most recently created first.
    pub fn try_find_by<R: Record>(&self, filters: &[(&str, Value)]) -> Result<Vec<R>, StoreError> {
        let connection = self.connect()?;
        let columns: Vec<_> = R::persisted_fields().collect();
        let select_list = columns
            .iter()
            .map(|field| quote(field.column))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {select_list} FROM {}", quote(R::TABLE));
        if !filters.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause(filters.iter().map(|(column, _)| *column), 1));
        }
        sql.push_str(&format!(
            " ORDER BY {} DESC, rowid DESC",
            quote(R::CREATED_COLUMN)
        ));

        let sql_err = |source| StoreError::Sql {
            table: R::TABLE,
            source,
        };
        let mut statement = connection.prepare(&sql).map_err(sql_err)?;
        let rows = statement
            .query_map(
                params_from_iter(filters.iter().map(|(_, value)| value)),
                |row| {
                    let mut record = R::default();
                    for (idx, field) in columns.iter().enumerate() {
                        let value: Value = row.get(idx)?;
                        (field.set)(&mut record, value);
                    }
                    Ok(record)
                },
            )
            .map_err(sql_err)?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(sql_err)?);
        }
        Ok(out)
    }

    pub fn try_insert<R: Record>(&self, record: &R) -> Result<(), StoreError> {
        if record.internal_id().trim().is_empty() {
            return Err(StoreError::MissingId { table: R::TABLE });
        }
        let connection = self.connect()?;
        let columns: Vec<_> = R::persisted_fields().collect();
        let column_list = columns
            .iter()
            .map(|field| quote(field.column))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|idx| format!("?{idx}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
            quote(R::TABLE)
        );
        connection
            .execute(
                &sql,
                params_from_iter(columns.iter().map(|field| (field.get)(record))),
            )
            .map_err(|source| StoreError::Sql {
                table: R::TABLE,
                source,
            })?;
        Ok(())
    }

    /// Stamps `modified` and rewrites the row. Returns the number of rows touched.
    pub fn try_update<R: Record>(&self, record: &mut R, now: i64) -> Result<usize, StoreError> {
        record.set_modified(now);

        let key: Vec<(&str, Value)> = if record.internal_id().trim().is_empty() {
            record.natural_key()
        } else {
            vec![("id", Value::Text(record.internal_id().to_string()))]
        };
        if key.iter().any(|(_, value)| is_blank(value)) {
            return Err(StoreError::MissingKey { table: R::TABLE });
        }

        let assignments: Vec<(&str, Value)> = R::fields()
            .iter()
            .filter(|field| field.is_written_on_update())
            .map(|field| (field.column, (field.get)(record)))
            .filter(|(_, value)| *value != Value::Null)
            .collect();
        if assignments.is_empty() {
            return Ok(0);
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(idx, (column, _))| format!("{} = ?{}", quote(column), idx + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE {} SET {set_clause} WHERE {}",
            quote(R::TABLE),
            where_clause(key.iter().map(|(column, _)| *column), assignments.len() + 1)
        );

        let connection = self.connect()?;
        connection
            .execute(
                &sql,
                params_from_iter(
                    assignments
                        .iter()
                        .map(|(_, value)| value)
                        .chain(key.iter().map(|(_, value)| value)),
                ),
            )
            .map_err(|source| StoreError::Sql {
                table: R::TABLE,
                source,
            })
    }

    pub fn find_by<R: Record>(&self, filters: &[(&str, Value)]) -> Vec<R> {
        match self.try_find_by(filters) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::error!(table = R::TABLE, error = %err, "record lookup failed");
                Vec::new()
            }
        }
    }

    pub fn insert<R: Record>(&self, record: &R) -> bool {
        match self.try_insert(record) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    table = R::TABLE,
                    id = record.internal_id(),
                    error = %err,
                    "record insert failed"
                );
                false
            }
        }
    }

    pub fn update<R: Record>(&self, record: &mut R) -> bool {
        match self.try_update(record, now_secs()) {
            Ok(0) => {
                tracing::warn!(
                    table = R::TABLE,
                    id = record.internal_id(),
                    "record update matched no rows"
                );
                false
            }
            Ok(_) => true,
            Err(err) => {
                tracing::error!(
                    table = R::TABLE,
                    id = record.internal_id(),
                    error = %err,
                    "record update failed"
                );
                false
            }
        }
    }

    /// Every row for `(external_id, type)`, most recently created first.
    pub fn find_customers(&self, external_id: &str, customer_type: CustomerType) -> Vec<Customer> {
        self.find_by(&[
            ("external_id", Value::Text(external_id.trim().to_string())),
            (
                "customer_type",
                Value::Text(customer_type.as_str().to_string()),
            ),
        ])
    }

    /// Picks one customer for `(external_id, type)`. A row whose name matches
    /// `name` wins; otherwise the most recently created row does.
    pub fn find_customer(
        &self,
        external_id: &str,
        customer_type: CustomerType,
        name: Option<&str>,
    ) -> Option<Customer> {
        let rows = self.find_customers(external_id, customer_type);
        if rows.len() > 1 {
            tracing::warn!(
                external_id,
                customer_type = customer_type.as_str(),
                count = rows.len(),
                "duplicate customer rows; picking one deterministically"
            );
        }
        let by_name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .and_then(|name| rows.iter().position(|row| row.name == name));
        let idx = by_name.unwrap_or(0);
        rows.into_iter().nth(idx)
    }

    pub fn find_customer_by_id(&self, id: &str) -> Option<Customer> {
        self.find_by(&[("id", Value::Text(id.to_string()))])
            .into_iter()
            .next()
    }

    pub fn insert_customer(&self, customer: &Customer) -> bool {
        self.insert(customer)
    }

    pub fn update_customer(&self, customer: &mut Customer) -> bool {
        self.update(customer)
    }

    /// Every row for an order number, most recently created first.
    pub fn find_orders(&self, external_id: &str) -> Vec<Order> {
        self.find_by(&[("external_id", Value::Text(external_id.trim().to_string()))])
    }

    pub fn find_order(&self, external_id: &str) -> Option<Order> {
        let rows = self.find_orders(external_id);
        if rows.len() > 1 {
            tracing::warn!(
                external_id,
                count = rows.len(),
                "duplicate order rows; picking the most recent"
            );
        }
        rows.into_iter().next()
    }

    pub fn find_order_by_id(&self, id: &str) -> Option<Order> {
        self.find_by(&[("id", Value::Text(id.to_string()))])
            .into_iter()
            .next()
    }

    pub fn insert_order(&self, order: &Order) -> bool {
        self.insert(order)
    }

    pub fn update_order(&self, order: &mut Order) -> bool {
        self.update(order)
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let connection = Connection::open(&self.db_path).map_err(|source| StoreError::Open {
            path: self.db_path.display().to_string(),
            source,
        })?;
        connection
            .execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")
            .map_err(|source| StoreError::Open {
                path: self.db_path.display().to_string(),
                source,
            })?;
        Ok(connection)
    }
}

pub(crate) fn create_table_sql<R: Record>() -> String {
    let columns = R::persisted_fields()
        .map(|field| {
            if field.is_key {
                format!("{} TEXT PRIMARY KEY NOT NULL", quote(field.column))
            } else {
                format!("{} {}", quote(field.column), field.kind.column_ddl())
            }
        })
        .collect::<Vec<_>>()
        .join(",\n    ");
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {columns}\n);",
        quote(R::TABLE)
    )
}

fn where_clause<'a>(columns: impl Iterator<Item = &'a str>, first_param: usize) -> String {
    columns
        .enumerate()
        .map(|(idx, column)| format!("{} = ?{}", quote(column), first_param + idx))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(text) => text.trim().is_empty(),
        _ => false,
    }
}
