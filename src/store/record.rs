//! Explicit per-record field tables. One generic reader/writer in
//! [`super::RecordStore`] walks these instead of hand-written SQL per type.

use rusqlite::types::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    OptionalText,
    Integer,
    Flag,
}

impl FieldKind {
    pub(crate) fn column_ddl(self) -> &'static str {
        match self {
            Self::Text => "TEXT NOT NULL DEFAULT ''",
            Self::OptionalText => "TEXT",
            Self::Integer | Self::Flag => "INTEGER NOT NULL DEFAULT 0",
        }
    }
}

pub struct FieldSpec<R> {
    pub column: &'static str,
    pub kind: FieldKind,
    /// Key columns never appear in an UPDATE's SET clause.
    pub is_key: bool,
    /// In-memory only; excluded from the schema, INSERT and UPDATE.
    pub persisted: bool,
    pub get: fn(&R) -> Value,
    pub set: fn(&mut R, Value),
}

impl<R> FieldSpec<R> {
    pub fn is_written_on_update(&self) -> bool {
        self.persisted && !self.is_key
    }
}

pub trait Record: Default + Clone + 'static {
    const TABLE: &'static str;
    /// Column used for "most recent first" ordering of duplicates.
    const CREATED_COLUMN: &'static str;

    fn fields() -> &'static [FieldSpec<Self>];

    fn internal_id(&self) -> &str;

    /// Business key used to address the row when no internal id is known.
    fn natural_key(&self) -> Vec<(&'static str, Value)>;

    fn set_modified(&mut self, now: i64);

    fn persisted_fields() -> impl Iterator<Item = &'static FieldSpec<Self>> {
        Self::fields().iter().filter(|field| field.persisted)
    }
}

pub(crate) fn text_value(value: Value) -> String {
    match value {
        Value::Text(text) => text,
        Value::Integer(number) => number.to_string(),
        Value::Real(number) => number.to_string(),
        Value::Null | Value::Blob(_) => String::new(),
    }
}

pub(crate) fn optional_text_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        other => Some(text_value(other)),
    }
}

pub(crate) fn integer_value(value: Value) -> i64 {
    match value {
        Value::Integer(number) => number,
        Value::Text(text) => text.trim().parse().unwrap_or(0),
        Value::Real(number) => number as i64,
        Value::Null | Value::Blob(_) => 0,
    }
}

pub(crate) fn flag_value(value: Value) -> bool {
    integer_value(value) != 0
}

pub(crate) fn optional_text(value: &Option<String>) -> Value {
    match value {
        Some(text) => Value::Text(text.clone()),
        None => Value::Null,
    }
}

pub(crate) fn flag(value: bool) -> Value {
    Value::Integer(i64::from(value))
}

macro_rules! text_field {
    ($record:ty, $field:ident) => {
        $crate::store::record::FieldSpec::<$record> {
            column: stringify!($field),
            kind: $crate::store::record::FieldKind::Text,
            is_key: false,
            persisted: true,
            get: |record| rusqlite::types::Value::Text(record.$field.clone()),
            set: |record, value| record.$field = $crate::store::record::text_value(value),
        }
    };
}

macro_rules! optional_text_field {
    ($record:ty, $field:ident) => {
        optional_text_field!($record, $field, persisted = true)
    };
    ($record:ty, $field:ident, persisted = $persisted:expr) => {
        $crate::store::record::FieldSpec::<$record> {
            column: stringify!($field),
            kind: $crate::store::record::FieldKind::OptionalText,
            is_key: false,
            persisted: $persisted,
            get: |record| $crate::store::record::optional_text(&record.$field),
            set: |record, value| {
                record.$field = $crate::store::record::optional_text_value(value)
            },
        }
    };
}

macro_rules! flag_field {
    ($record:ty, $field:ident) => {
        $crate::store::record::FieldSpec::<$record> {
            column: stringify!($field),
            kind: $crate::store::record::FieldKind::Flag,
            is_key: false,
            persisted: true,
            get: |record| $crate::store::record::flag(record.$field),
            set: |record, value| record.$field = $crate::store::record::flag_value(value),
        }
    };
}

macro_rules! integer_field {
    ($record:ty, $field:ident) => {
        $crate::store::record::FieldSpec::<$record> {
            column: stringify!($field),
            kind: $crate::store::record::FieldKind::Integer,
            is_key: false,
            persisted: true,
            get: |record| rusqlite::types::Value::Integer(record.$field),
            set: |record, value| record.$field = $crate::store::record::integer_value(value),
        }
    };
}

pub(crate) use {flag_field, integer_field, optional_text_field, text_field};
