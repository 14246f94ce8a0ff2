//! Public fixture loading entry points.

use std::path::PathBuf;

use crate::adapter::{AdapterRegistry, PersistedRecord};
use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::{AttributeStore, FixtureRef, FixtureSource, YamlFixtureSource};
use crate::resolver::{LoadingStack, PendingFixups, Resolver};

/// Result of loading one token.
#[derive(Debug, Clone, PartialEq)]
pub enum Loaded {
	/// A `"model__name"` token: the single persisted record.
	Record(PersistedRecord),

	/// A bare model token: every fixture of the model, in definition order.
	Records(Vec<PersistedRecord>),
}

impl Loaded {
	/// Returns the single record, if this token named one fixture.
	pub fn record(&self) -> Option<&PersistedRecord> {
		match self {
			Self::Record(record) => Some(record),
			Self::Records(_) => None,
		}
	}

	/// Returns all records the token loaded.
	pub fn records(&self) -> &[PersistedRecord] {
		match self {
			Self::Record(record) => std::slice::from_ref(record),
			Self::Records(records) => records,
		}
	}
}

/// Loads fixtures and their dependencies into a persistence backend.
///
/// The loader owns all resolution state: the attribute store, the fixture
/// source and the adapter registry. There is no process-wide state;
/// construct one loader per test for isolation. Loading is synchronous and
/// not designed for concurrent invocation; callers serialize access.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use fixture_deps::prelude::*;
///
/// let schema = Arc::new(Schema::new());
/// schema.register(ModelMeta::new("author").table("authors"));
///
/// let registry = AdapterRegistry::new(schema.clone());
/// registry.register_adapter(Arc::new(MemoryAdapter::new(schema)));
///
/// let mut loader = FixtureLoader::with_fixture_path("fixtures", registry)?;
/// let jane = loader.load_fixture("author__jane")?;
/// ```
pub struct FixtureLoader {
	store: AttributeStore,
	source: Box<dyn FixtureSource>,
	registry: AdapterRegistry,
}

impl FixtureLoader {
	/// Creates a loader over an explicit fixture source.
	pub fn new(source: Box<dyn FixtureSource>, registry: AdapterRegistry) -> Self {
		Self {
			store: AttributeStore::new(),
			source,
			registry,
		}
	}

	/// Creates a loader reading YAML fixture files under `root`.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::Configuration`] when `root` is empty.
	pub fn with_fixture_path(
		root: impl Into<PathBuf>,
		registry: AdapterRegistry,
	) -> FixtureResult<Self> {
		let root = root.into();
		if root.as_os_str().is_empty() {
			return Err(FixtureError::Configuration(
				"no fixture path set; pass the directory containing fixture files".to_string(),
			));
		}
		Ok(Self::new(Box::new(YamlFixtureSource::new(root)), registry))
	}

	/// Returns the adapter registry the loader resolves backends through.
	pub fn registry(&self) -> &AdapterRegistry {
		&self.registry
	}

	/// Loads every token, returning one result per token in input order.
	///
	/// A `"model__name"` token loads that single fixture; a bare `"model"`
	/// token loads every fixture defined for the model. No tokens loads
	/// nothing.
	pub fn load(&mut self, tokens: &[&str]) -> FixtureResult<Vec<Loaded>> {
		tokens
			.iter()
			.map(|token| {
				if token.contains("__") {
					Ok(Loaded::Record(self.load_fixture(token)?))
				} else {
					Ok(Loaded::Records(self.load_model(token)?))
				}
			})
			.collect()
	}

	/// Loads a single `"model__name"` fixture and everything it depends on.
	pub fn load_fixture(&mut self, token: &str) -> FixtureResult<PersistedRecord> {
		let fixture: FixtureRef = token.parse()?;
		self.resolve_fresh(&fixture)
	}

	/// Loads every fixture defined for `model`, in definition order.
	pub fn load_model(&mut self, model: &str) -> FixtureResult<Vec<PersistedRecord>> {
		if model.is_empty() {
			return Err(FixtureError::InvalidToken(model.to_string()));
		}
		let adapter = self.registry.adapter_for(model)?;
		let table = adapter.table_name(model)?;
		self.store
			.ensure_loaded(model, &table, self.source.as_ref())?;

		self.store
			.names(model)
			.into_iter()
			.map(|name| self.resolve_fresh(&FixtureRef::new(model, name)))
			.collect()
	}

	// Each top-level resolve gets a fresh stack and fixup scope: cycles
	// only occur within one fixture's own dependency tree.
	fn resolve_fresh(&mut self, fixture: &FixtureRef) -> FixtureResult<PersistedRecord> {
		let mut stack = LoadingStack::new();
		let mut fixups = PendingFixups::new();
		Resolver::new(&mut self.store, self.source.as_ref(), &self.registry)
			.resolve(fixture, &mut stack, &mut fixups)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	use crate::adapter::{AdapterRegistry, MemoryAdapter, ModelMeta, Schema};
	use crate::fixtures::AttributeSet;
	use indexmap::IndexMap;
	use serde_json::json;
	use std::sync::Arc;

	struct OneAuthorSource;

	impl FixtureSource for OneAuthorSource {
		fn load(&self, _table: &str) -> FixtureResult<IndexMap<String, AttributeSet>> {
			let mut sets = IndexMap::new();
			let mut jane = AttributeSet::new();
			jane.insert("name".to_string(), json!("Jane"));
			sets.insert("jane".to_string(), jane);
			Ok(sets)
		}
	}

	fn loader() -> FixtureLoader {
		let schema = Arc::new(Schema::new());
		schema.register(ModelMeta::new("author").table("authors"));
		let registry = AdapterRegistry::new(schema.clone());
		registry.register_adapter(Arc::new(MemoryAdapter::new(schema)));
		FixtureLoader::new(Box::new(OneAuthorSource), registry)
	}

	#[rstest]
	fn test_empty_fixture_path_is_a_configuration_error() {
		let schema = Arc::new(Schema::new());
		let registry = AdapterRegistry::new(schema);
		let result = FixtureLoader::with_fixture_path("", registry);
		assert!(matches!(result, Err(FixtureError::Configuration(_))));
	}

	#[rstest]
	fn test_load_no_tokens_returns_empty() {
		let mut loader = loader();
		assert!(loader.load(&[]).unwrap().is_empty());
	}

	#[rstest]
	fn test_load_mixed_tokens() {
		let mut loader = loader();
		let results = loader.load(&["author__jane", "author"]).unwrap();

		assert_eq!(results.len(), 2);
		assert!(results[0].record().is_some());
		assert_eq!(results[1].records().len(), 1);
	}

	#[rstest]
	fn test_load_fixture_rejects_bare_model_token() {
		let mut loader = loader();
		let result = loader.load_fixture("author");
		assert!(matches!(result, Err(FixtureError::InvalidToken(_))));
	}
}
