//! Typed column access on query result batches.
use anyhow::{anyhow, Result};
use arrow_array::{Array, RecordBatch};

pub fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| anyhow!("{name} column missing or of unexpected type"))
}

/// Quote a string literal for a lance filter expression.
pub fn sql_literal(value: &str) -> String {
	format!("'{}'", value.replace('\'', "''"))
}

pub fn id_list(ids: &[i64]) -> String {
	ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}
