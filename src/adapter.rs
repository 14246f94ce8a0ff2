//! Persistence backend adapters.
//!
//! The resolver never talks to a backend directly: every persistence and
//! reflection operation goes through the [`ModelAdapter`] capability
//! interface, one implementation per backend variant. Models declare which
//! backend they are persisted with, and the [`AdapterRegistry`] resolves a
//! model to its adapter once and caches the result.

pub mod memory;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::AttributeSet;

pub use memory::MemoryAdapter;

/// Kinds of association an attribute can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationKind {
	/// Foreign key on the owning record; resolved before the owner saves.
	BelongsTo,

	/// Single associated record, linked after the owner saves.
	HasOne,

	/// Collection of associated records, linked after the owner saves.
	HasMany,

	/// Collection linked through a join table after the owner saves.
	ManyToMany,
}

impl AssociationKind {
	/// True for associations whose foreign key lives on the owning record
	/// and must be satisfied before its first save.
	pub fn is_single(self) -> bool {
		matches!(self, Self::BelongsTo)
	}
}

impl fmt::Display for AssociationKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::BelongsTo => write!(f, "belongs_to"),
			Self::HasOne => write!(f, "has_one"),
			Self::HasMany => write!(f, "has_many"),
			Self::ManyToMany => write!(f, "many_to_many"),
		}
	}
}

/// Join table metadata for many-to-many associations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTable {
	/// Join table name.
	pub table: String,

	/// Column referencing the owning record.
	pub owner_key: String,

	/// Column referencing the target record.
	pub target_key: String,
}

impl JoinTable {
	/// Creates a join table definition.
	pub fn new(
		table: impl Into<String>,
		owner_key: impl Into<String>,
		target_key: impl Into<String>,
	) -> Self {
		Self {
			table: table.into(),
			owner_key: owner_key.into(),
			target_key: target_key.into(),
		}
	}
}

/// Describes one fixture attribute as an association.
///
/// Attributes without a descriptor are plain scalar columns.
#[derive(Debug, Clone)]
pub struct AssociationDescriptor {
	/// Attribute name in the fixture definition.
	pub name: String,

	/// Kind of association.
	pub kind: AssociationKind,

	/// Model the association points at.
	pub target: String,

	/// Foreign key column: on the owner for `BelongsTo`, on the target
	/// for `HasOne` and `HasMany`.
	pub key: String,

	/// Join table, for `ManyToMany` associations.
	pub join_table: Option<JoinTable>,
}

impl AssociationDescriptor {
	/// A belongs-to association: `key` is the foreign key column on the
	/// owning record.
	pub fn belongs_to(
		name: impl Into<String>,
		target: impl Into<String>,
		key: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: AssociationKind::BelongsTo,
			target: target.into(),
			key: key.into(),
			join_table: None,
		}
	}

	/// A has-one association: `key` is the foreign key column on the
	/// target record.
	pub fn has_one(
		name: impl Into<String>,
		target: impl Into<String>,
		key: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: AssociationKind::HasOne,
			target: target.into(),
			key: key.into(),
			join_table: None,
		}
	}

	/// A has-many association: `key` is the foreign key column on the
	/// target records.
	pub fn has_many(
		name: impl Into<String>,
		target: impl Into<String>,
		key: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: AssociationKind::HasMany,
			target: target.into(),
			key: key.into(),
			join_table: None,
		}
	}

	/// A many-to-many association through a join table.
	pub fn many_to_many(
		name: impl Into<String>,
		target: impl Into<String>,
		join_table: JoinTable,
	) -> Self {
		let name = name.into();
		Self {
			key: name.clone(),
			name,
			kind: AssociationKind::ManyToMany,
			target: target.into(),
			join_table: Some(join_table),
		}
	}
}

/// Backend variants a model can be persisted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
	/// In-memory table store, see [`MemoryAdapter`].
	Memory,

	/// External SQL database; the adapter is supplied by the caller.
	Sql,
}

/// Registered metadata for one model.
///
/// # Example
///
/// ```
/// # use fixture_deps::adapter::{AssociationDescriptor, ModelMeta};
/// let book = ModelMeta::new("book")
/// 	.table("books")
/// 	.association(AssociationDescriptor::belongs_to("author", "author", "author_id"));
/// assert_eq!(book.primary_key, "id");
/// ```
#[derive(Debug, Clone)]
pub struct ModelMeta {
	/// Model name used in fixture tokens.
	pub name: String,

	/// Storage identifier the fixture file is named after.
	pub table: String,

	/// Primary key attribute name.
	pub primary_key: String,

	/// Backend the model is persisted with.
	pub backend: BackendKind,

	/// Association descriptors for the model's attributes.
	pub associations: Vec<AssociationDescriptor>,

	/// Columns that must not be null at save time.
	pub not_null: Vec<String>,
}

impl ModelMeta {
	/// Creates metadata with defaults: table named after the model,
	/// primary key `id`, memory backend, no associations.
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			table: name.clone(),
			name,
			primary_key: "id".to_string(),
			backend: BackendKind::Memory,
			associations: Vec::new(),
			not_null: Vec::new(),
		}
	}

	/// Sets the storage identifier.
	pub fn table(mut self, table: impl Into<String>) -> Self {
		self.table = table.into();
		self
	}

	/// Sets the primary key attribute name.
	pub fn primary_key(mut self, key: impl Into<String>) -> Self {
		self.primary_key = key.into();
		self
	}

	/// Sets the backend variant.
	pub fn backend(mut self, backend: BackendKind) -> Self {
		self.backend = backend;
		self
	}

	/// Adds an association descriptor.
	pub fn association(mut self, descriptor: AssociationDescriptor) -> Self {
		self.associations.push(descriptor);
		self
	}

	/// Declares a not-null column.
	pub fn not_null(mut self, column: impl Into<String>) -> Self {
		self.not_null.push(column.into());
		self
	}

	/// Returns the descriptor for an attribute, if it is an association.
	pub fn association_for(&self, attribute: &str) -> Option<&AssociationDescriptor> {
		self.associations.iter().find(|a| a.name == attribute)
	}
}

/// Shared collection of registered model metadata.
#[derive(Debug, Default)]
pub struct Schema {
	models: RwLock<HashMap<String, Arc<ModelMeta>>>,
}

impl Schema {
	/// Creates an empty schema.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a model's metadata, replacing any previous registration.
	pub fn register(&self, meta: ModelMeta) {
		self.models
			.write()
			.insert(meta.name.clone(), Arc::new(meta));
	}

	/// Returns the metadata for a model.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::ModelNotFound`] for unregistered models.
	pub fn model(&self, name: &str) -> FixtureResult<Arc<ModelMeta>> {
		self.models
			.read()
			.get(name)
			.cloned()
			.ok_or_else(|| FixtureError::ModelNotFound(name.to_string()))
	}

	/// Returns the backend variant a model declares.
	pub fn backend(&self, name: &str) -> FixtureResult<BackendKind> {
		Ok(self.model(name)?.backend)
	}
}

/// Snapshot of a persisted record returned by adapter operations.
///
/// The backend owns the authoritative row; this handle is a transient view
/// taken at the time of the operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
	/// Model the record belongs to.
	pub model: String,

	/// Column values, including the primary key.
	pub values: AttributeSet,
}

static NULL: Value = Value::Null;

impl PersistedRecord {
	/// Returns the value of a column, `Null` when absent.
	pub fn get(&self, column: &str) -> &Value {
		self.values.get(column).unwrap_or(&NULL)
	}
}

/// Capability interface over one persistence backend variant.
///
/// All operations take the model name. Implementations surface backend
/// failures uniformly as [`FixtureError::Persistence`]; the resolver never
/// interprets backend-specific error detail.
pub trait ModelAdapter: Send + Sync {
	/// Backend variant this adapter serves.
	fn backend(&self) -> BackendKind;

	/// Storage identifier of the model, used to locate its fixture file.
	fn table_name(&self, model: &str) -> FixtureResult<String>;

	/// Primary key attribute name of the model.
	fn primary_key(&self, model: &str) -> FixtureResult<String>;

	/// Looks a record up by primary key, without side effects.
	///
	/// Returns `None` when the key is null or no record matches.
	fn find_by_primary_key(
		&self,
		model: &str,
		key: &Value,
	) -> FixtureResult<Option<PersistedRecord>>;

	/// Returns the record a resolved dependency persisted.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::NotFound`] when no record matches; the
	/// caller assumed the dependency was already resolved.
	fn find_associated(&self, model: &str, key: &Value) -> FixtureResult<PersistedRecord>;

	/// Persists the attribute values as a record of the model.
	///
	/// Updates the existing record in place when the values carry a
	/// primary key that is already persisted; this is the re-save path
	/// deferred fixups use.
	fn save(&self, model: &str, values: &AttributeSet) -> FixtureResult<PersistedRecord>;

	/// Association metadata for an attribute, `None` for plain columns.
	fn association(
		&self,
		model: &str,
		attribute: &str,
	) -> FixtureResult<Option<AssociationDescriptor>>;

	/// Establishes a multi-valued or self-referential link between two
	/// persisted records.
	///
	/// Must be safe to call once per (owner, target) pair.
	fn add_associated(
		&self,
		descriptor: &AssociationDescriptor,
		owner: &PersistedRecord,
		target: &PersistedRecord,
	) -> FixtureResult<()>;
}

/// Resolves models to backend adapters.
///
/// Detection consults the model's declared [`BackendKind`] once; the
/// resolved adapter is cached for subsequent lookups.
pub struct AdapterRegistry {
	schema: Arc<Schema>,
	adapters: RwLock<HashMap<BackendKind, Arc<dyn ModelAdapter>>>,
	resolved: RwLock<HashMap<String, Arc<dyn ModelAdapter>>>,
}

impl AdapterRegistry {
	/// Creates a registry over a schema.
	pub fn new(schema: Arc<Schema>) -> Self {
		Self {
			schema,
			adapters: RwLock::new(HashMap::new()),
			resolved: RwLock::new(HashMap::new()),
		}
	}

	/// Returns the schema models are registered in.
	pub fn schema(&self) -> &Arc<Schema> {
		&self.schema
	}

	/// Registers an adapter for the backend variant it serves.
	pub fn register_adapter(&self, adapter: Arc<dyn ModelAdapter>) {
		self.adapters.write().insert(adapter.backend(), adapter);
	}

	/// Returns the adapter serving a model's backend.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::ModelNotFound`] for unregistered models and
	/// [`FixtureError::UnsupportedBackend`] when no adapter serves the
	/// model's declared backend.
	pub fn adapter_for(&self, model: &str) -> FixtureResult<Arc<dyn ModelAdapter>> {
		if let Some(adapter) = self.resolved.read().get(model) {
			return Ok(adapter.clone());
		}
		let backend = self.schema.backend(model)?;
		let adapter = self
			.adapters
			.read()
			.get(&backend)
			.cloned()
			.ok_or_else(|| FixtureError::UnsupportedBackend(model.to_string()))?;
		self.resolved
			.write()
			.insert(model.to_string(), adapter.clone());
		Ok(adapter)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_model_meta_defaults() {
		let meta = ModelMeta::new("author");
		assert_eq!(meta.table, "author");
		assert_eq!(meta.primary_key, "id");
		assert_eq!(meta.backend, BackendKind::Memory);
		assert!(meta.associations.is_empty());
	}

	#[rstest]
	fn test_association_lookup() {
		let meta = ModelMeta::new("book")
			.association(AssociationDescriptor::belongs_to(
				"author", "author", "author_id",
			))
			.association(AssociationDescriptor::has_many(
				"chapters", "chapter", "book_id",
			));

		let author = meta.association_for("author").unwrap();
		assert_eq!(author.kind, AssociationKind::BelongsTo);
		assert!(author.kind.is_single());

		let chapters = meta.association_for("chapters").unwrap();
		assert_eq!(chapters.kind, AssociationKind::HasMany);
		assert!(!chapters.kind.is_single());

		assert!(meta.association_for("title").is_none());
	}

	#[rstest]
	fn test_schema_model_not_found() {
		let schema = Schema::new();
		let result = schema.model("ghost");
		assert!(matches!(result, Err(FixtureError::ModelNotFound(_))));
	}

	#[rstest]
	fn test_adapter_registry_unsupported_backend() {
		let schema = Arc::new(Schema::new());
		schema.register(ModelMeta::new("event").backend(BackendKind::Sql));

		let registry = AdapterRegistry::new(schema.clone());
		registry.register_adapter(Arc::new(MemoryAdapter::new(schema)));

		let result = registry.adapter_for("event");
		assert!(matches!(result, Err(FixtureError::UnsupportedBackend(_))));
	}

	#[rstest]
	fn test_adapter_registry_caches_resolution() {
		let schema = Arc::new(Schema::new());
		schema.register(ModelMeta::new("author"));

		let registry = AdapterRegistry::new(schema.clone());
		registry.register_adapter(Arc::new(MemoryAdapter::new(schema)));

		let first = registry.adapter_for("author").unwrap();
		let second = registry.adapter_for("author").unwrap();
		assert!(Arc::ptr_eq(&first, &second));
	}

	#[rstest]
	fn test_persisted_record_get_absent_column() {
		let record = PersistedRecord {
			model: "author".to_string(),
			values: AttributeSet::new(),
		};
		assert!(record.get("id").is_null());
	}
}
