//! Raw fixture attribute storage.
//!
//! The attribute store holds the unpersisted attribute sets read from the
//! fixture source, keyed by model and fixture name. Each model is populated
//! at most once; the only later mutation is the primary-key back-fill after
//! a record's first save.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use super::reference::FixtureRef;
use super::source::FixtureSource;
use crate::error::{FixtureError, FixtureResult};

/// Attribute values of one fixture, in definition order.
pub type AttributeSet = IndexMap<String, Value>;

/// Holds raw fixture attribute sets for the lifetime of a loader.
#[derive(Debug, Default)]
pub struct AttributeStore {
	sets: IndexMap<String, IndexMap<String, AttributeSet>>,
	loaded: HashSet<String>,
}

impl AttributeStore {
	/// Creates an empty store.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns true if the model's fixture definitions have been loaded.
	pub fn is_loaded(&self, model: &str) -> bool {
		self.loaded.contains(model)
	}

	/// Populates the model's attribute sets from the fixture source.
	///
	/// The source is consulted once per model; a second call is a no-op.
	/// `table` is the storage identifier the source locates definitions by.
	pub fn ensure_loaded(
		&mut self,
		model: &str,
		table: &str,
		source: &dyn FixtureSource,
	) -> FixtureResult<()> {
		if self.loaded.contains(model) {
			return Ok(());
		}
		tracing::debug!(model, table, "loading fixture definitions");
		let sets = source.load(table)?;
		self.sets.insert(model.to_string(), sets);
		self.loaded.insert(model.to_string());
		Ok(())
	}

	/// Returns the attribute set for a fixture reference.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::UnknownFixture`] if the model was never
	/// loaded or the fixture name is absent.
	pub fn get(&self, fixture: &FixtureRef) -> FixtureResult<&AttributeSet> {
		self.sets
			.get(&fixture.model)
			.and_then(|names| names.get(&fixture.name))
			.ok_or_else(|| FixtureError::UnknownFixture {
				model: fixture.model.clone(),
				name: fixture.name.clone(),
			})
	}

	/// Fixture names defined for a model, in definition order.
	pub fn names(&self, model: &str) -> Vec<String> {
		self.sets
			.get(model)
			.map(|names| names.keys().cloned().collect())
			.unwrap_or_default()
	}

	/// Back-fills the primary key attribute after a record's first save.
	///
	/// An explicitly authored key is left untouched, so fixtures that pin
	/// their own keys keep them.
	pub fn set_key_if_absent(&mut self, fixture: &FixtureRef, key: &str, value: Value) {
		if let Some(attrs) = self
			.sets
			.get_mut(&fixture.model)
			.and_then(|names| names.get_mut(&fixture.name))
		{
			let absent = attrs.get(key).is_none_or(Value::is_null);
			if absent {
				attrs.insert(key.to_string(), value);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use std::cell::Cell;

	struct CountingSource {
		calls: Cell<usize>,
	}

	impl CountingSource {
		fn new() -> Self {
			Self {
				calls: Cell::new(0),
			}
		}
	}

	impl FixtureSource for CountingSource {
		fn load(&self, _table: &str) -> FixtureResult<IndexMap<String, AttributeSet>> {
			self.calls.set(self.calls.get() + 1);
			let mut sets = IndexMap::new();
			let mut jane = AttributeSet::new();
			jane.insert("name".to_string(), json!("Jane"));
			sets.insert("jane".to_string(), jane);
			Ok(sets)
		}
	}

	#[rstest]
	fn test_ensure_loaded_is_idempotent() {
		let source = CountingSource::new();
		let mut store = AttributeStore::new();

		store.ensure_loaded("author", "authors", &source).unwrap();
		store.ensure_loaded("author", "authors", &source).unwrap();

		assert!(store.is_loaded("author"));
		assert_eq!(source.calls.get(), 1);
	}

	#[rstest]
	fn test_get_unknown_fixture() {
		let source = CountingSource::new();
		let mut store = AttributeStore::new();
		store.ensure_loaded("author", "authors", &source).unwrap();

		let missing = store.get(&FixtureRef::new("author", "john"));
		assert!(matches!(
			missing,
			Err(FixtureError::UnknownFixture { .. })
		));

		let unloaded = store.get(&FixtureRef::new("book", "moby"));
		assert!(matches!(
			unloaded,
			Err(FixtureError::UnknownFixture { .. })
		));
	}

	#[rstest]
	fn test_set_key_if_absent_backfills_once() {
		let source = CountingSource::new();
		let mut store = AttributeStore::new();
		store.ensure_loaded("author", "authors", &source).unwrap();
		let jane = FixtureRef::new("author", "jane");

		store.set_key_if_absent(&jane, "id", json!(1));
		assert_eq!(store.get(&jane).unwrap()["id"], json!(1));

		// An already present key is preserved
		store.set_key_if_absent(&jane, "id", json!(2));
		assert_eq!(store.get(&jane).unwrap()["id"], json!(1));
	}

	#[rstest]
	fn test_names_in_definition_order() {
		struct OrderedSource;
		impl FixtureSource for OrderedSource {
			fn load(&self, _table: &str) -> FixtureResult<IndexMap<String, AttributeSet>> {
				let mut sets = IndexMap::new();
				for name in ["zebra", "apple", "mango"] {
					sets.insert(name.to_string(), AttributeSet::new());
				}
				Ok(sets)
			}
		}

		let mut store = AttributeStore::new();
		store.ensure_loaded("fruit", "fruits", &OrderedSource).unwrap();
		assert_eq!(store.names("fruit"), vec!["zebra", "apple", "mango"]);
	}
}
