//! In-memory persistence backend.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::{
	AssociationDescriptor, AssociationKind, BackendKind, ModelAdapter, ModelMeta, PersistedRecord,
	Schema,
};
use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::AttributeSet;

/// In-memory table store backend.
///
/// Rows live in insertion order per table. Integer primary keys are
/// auto-incremented when a fixture does not author one, and not-null
/// columns declared on the model are enforced at save time.
///
/// Row and link snapshots are exposed so tests can assert on the persisted
/// state without a database.
pub struct MemoryAdapter {
	schema: Arc<Schema>,
	state: RwLock<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
	tables: HashMap<String, Vec<AttributeSet>>,
	links: HashMap<String, Vec<(Value, Value)>>,
	sequences: HashMap<String, i64>,
	saves: usize,
}

impl MemoryAdapter {
	/// Creates an empty backend over a schema.
	pub fn new(schema: Arc<Schema>) -> Self {
		Self {
			schema,
			state: RwLock::new(MemoryState::default()),
		}
	}

	/// Total number of save calls, inserts and updates alike.
	pub fn save_count(&self) -> usize {
		self.state.read().saves
	}

	/// Snapshot of a model's rows, in insertion order.
	pub fn rows(&self, model: &str) -> FixtureResult<Vec<PersistedRecord>> {
		let meta = self.schema.model(model)?;
		let state = self.state.read();
		Ok(state
			.tables
			.get(&meta.table)
			.map(|rows| {
				rows.iter()
					.map(|row| PersistedRecord {
						model: model.to_string(),
						values: row.clone(),
					})
					.collect()
			})
			.unwrap_or_default())
	}

	/// Snapshot of a join table's (owner key, target key) pairs.
	pub fn links(&self, table: &str) -> Vec<(Value, Value)> {
		self.state
			.read()
			.links
			.get(table)
			.cloned()
			.unwrap_or_default()
	}

	fn set_column(
		&self,
		meta: &ModelMeta,
		key: &Value,
		column: &str,
		value: Value,
	) -> FixtureResult<()> {
		let mut state = self.state.write();
		let pk = meta.primary_key.as_str();
		let row = state
			.tables
			.get_mut(&meta.table)
			.and_then(|rows| rows.iter_mut().find(|row| row.get(pk) == Some(key)))
			.ok_or_else(|| FixtureError::NotFound {
				model: meta.name.clone(),
				key: key.clone(),
			})?;
		row.insert(column.to_string(), value);
		Ok(())
	}
}

fn check_not_null(meta: &ModelMeta, row: &AttributeSet) -> FixtureResult<()> {
	for column in &meta.not_null {
		if row.get(column).is_none_or(Value::is_null) {
			return Err(FixtureError::Persistence(format!(
				"null value in column '{column}' of '{}' violates not-null constraint",
				meta.table
			)));
		}
	}
	Ok(())
}

impl ModelAdapter for MemoryAdapter {
	fn backend(&self) -> BackendKind {
		BackendKind::Memory
	}

	fn table_name(&self, model: &str) -> FixtureResult<String> {
		Ok(self.schema.model(model)?.table.clone())
	}

	fn primary_key(&self, model: &str) -> FixtureResult<String> {
		Ok(self.schema.model(model)?.primary_key.clone())
	}

	fn find_by_primary_key(
		&self,
		model: &str,
		key: &Value,
	) -> FixtureResult<Option<PersistedRecord>> {
		if key.is_null() {
			return Ok(None);
		}
		let meta = self.schema.model(model)?;
		let state = self.state.read();
		let pk = meta.primary_key.as_str();
		Ok(state
			.tables
			.get(&meta.table)
			.and_then(|rows| rows.iter().find(|row| row.get(pk) == Some(key)))
			.map(|row| PersistedRecord {
				model: model.to_string(),
				values: row.clone(),
			}))
	}

	fn find_associated(&self, model: &str, key: &Value) -> FixtureResult<PersistedRecord> {
		self.find_by_primary_key(model, key)?
			.ok_or_else(|| FixtureError::NotFound {
				model: model.to_string(),
				key: key.clone(),
			})
	}

	fn save(&self, model: &str, values: &AttributeSet) -> FixtureResult<PersistedRecord> {
		let meta = self.schema.model(model)?;
		let mut state = self.state.write();
		state.saves += 1;

		let pk = meta.primary_key.as_str();

		// Re-save path: a known primary key updates the row in place
		if let Some(key) = values.get(pk).filter(|v| !v.is_null()).cloned() {
			if let Some(row) = state
				.tables
				.get_mut(&meta.table)
				.and_then(|rows| rows.iter_mut().find(|row| row.get(pk) == Some(&key)))
			{
				let mut merged = row.clone();
				for (column, value) in values {
					merged.insert(column.clone(), value.clone());
				}
				check_not_null(&meta, &merged)?;
				*row = merged.clone();
				tracing::trace!(model, table = meta.table.as_str(), "updated row");
				return Ok(PersistedRecord {
					model: model.to_string(),
					values: merged,
				});
			}
		}

		let mut row = values.clone();
		if row.get(pk).is_none_or(Value::is_null) {
			let next = state.sequences.entry(meta.table.clone()).or_insert(0);
			*next += 1;
			row.insert(pk.to_string(), Value::from(*next));
		}
		check_not_null(&meta, &row)?;
		state
			.tables
			.entry(meta.table.clone())
			.or_default()
			.push(row.clone());
		tracing::trace!(model, table = meta.table.as_str(), "inserted row");
		Ok(PersistedRecord {
			model: model.to_string(),
			values: row,
		})
	}

	fn association(
		&self,
		model: &str,
		attribute: &str,
	) -> FixtureResult<Option<AssociationDescriptor>> {
		Ok(self.schema.model(model)?.association_for(attribute).cloned())
	}

	fn add_associated(
		&self,
		descriptor: &AssociationDescriptor,
		owner: &PersistedRecord,
		target: &PersistedRecord,
	) -> FixtureResult<()> {
		let owner_meta = self.schema.model(&owner.model)?;
		let target_meta = self.schema.model(&descriptor.target)?;
		let owner_key = owner.get(&owner_meta.primary_key).clone();
		let target_key = target.get(&target_meta.primary_key).clone();

		match descriptor.kind {
			AssociationKind::BelongsTo => {
				self.set_column(&owner_meta, &owner_key, &descriptor.key, target_key)
			}
			AssociationKind::HasOne | AssociationKind::HasMany => {
				// The foreign key lives on the target row
				self.set_column(&target_meta, &target_key, &descriptor.key, owner_key)
			}
			AssociationKind::ManyToMany => {
				let join = descriptor.join_table.as_ref().ok_or_else(|| {
					FixtureError::Persistence(format!(
						"association '{}' has no join table",
						descriptor.name
					))
				})?;
				let mut state = self.state.write();
				let rows = state.links.entry(join.table.clone()).or_default();
				let pair = (owner_key, target_key);
				if !rows.contains(&pair) {
					rows.push(pair);
				}
				Ok(())
			}
		}
	}
}
