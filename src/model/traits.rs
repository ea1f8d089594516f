use serde::Serialize;
use std::convert::From;

pub trait StructFieldNames {
    fn field_names() -> &'static [&'static str];
}

/// A table-backed record. Column names are the struct's field names.
pub trait Model: Serialize + Default + From<tokio_postgres::Row> + StructFieldNames {
    fn table_name() -> &'static str;

    fn columns() -> String {
        Self::field_names().join(",")
    }

    /// Column list qualified with a table alias, for joins.
    fn columns_with_alias(alias: &str) -> String {
        Self::field_names()
            .iter()
            .map(|f| format!("{}.{}", alias, f))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn select_sql() -> String {
        format!("SELECT {} FROM \"{}\"", Self::columns(), Self::table_name())
    }
}
