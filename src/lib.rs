//! Test fixture loading with transitive dependency resolution.
//!
//! `fixture_deps` loads named fixtures into a persistence backend, pulling
//! in every record a fixture depends on:
//!
//! - **Belongs-to associations** are resolved and persisted before the
//!   owning record's first save, so its foreign keys are valid on insert.
//! - **Has-many / many-to-many associations** are linked after the owning
//!   record is persisted and has a primary key.
//! - **Self-references and cycles** terminate: a dependency pointing back
//!   at a record still being resolved is deferred and repaired once that
//!   record has been saved.
//! - **Each fixture is persisted at most once**; later references reuse
//!   the existing record.
//!
//! # Quick Start
//!
//! Fixture files are YAML mappings named after the model's table
//! (`fixtures/books.yml`):
//!
//! ```yaml
//! moby:
//!   title: Moby Dick
//!   author: jane
//! ```
//!
//! Association attributes name other fixtures; `author: jane` above points
//! at the `jane` fixture of the `author` model (`fixtures/authors.yml`).
//!
//! ```ignore
//! use std::sync::Arc;
//! use fixture_deps::prelude::*;
//!
//! let schema = Arc::new(Schema::new());
//! schema.register(ModelMeta::new("author").table("authors"));
//! schema.register(
//! 	ModelMeta::new("book")
//! 		.table("books")
//! 		.association(AssociationDescriptor::belongs_to("author", "author", "author_id")),
//! );
//!
//! let registry = AdapterRegistry::new(schema.clone());
//! registry.register_adapter(Arc::new(MemoryAdapter::new(schema)));
//!
//! let mut loader = FixtureLoader::with_fixture_path("fixtures", registry)?;
//! let moby = loader.load_fixture("book__moby")?;   // persists jane, then moby
//! ```
//!
//! # Architecture
//!
//! - [`FixtureLoader`](loader::FixtureLoader) - entry point; owns all
//!   resolution state, one instance per test
//! - [`AttributeStore`](fixtures::AttributeStore) - raw attribute sets read
//!   once per model from a [`FixtureSource`](fixtures::FixtureSource)
//! - [`ModelAdapter`](adapter::ModelAdapter) - capability interface over a
//!   persistence backend; [`MemoryAdapter`](adapter::MemoryAdapter) is the
//!   in-tree implementation
//! - [`resolver`] - the dependency resolution algorithm: recursion over
//!   required associations, loading-stack cycle detection, deferred fixups
//!
//! Diagnostics are emitted through `tracing` at `debug` and `trace` level;
//! install a subscriber to see the resolution order.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod adapter;
pub mod error;
pub mod fixtures;
pub mod loader;
pub mod prelude;
pub mod resolver;

// Re-export commonly used types at crate root
pub use adapter::{
	AdapterRegistry, AssociationDescriptor, AssociationKind, BackendKind, JoinTable,
	MemoryAdapter, ModelAdapter, ModelMeta, PersistedRecord, Schema,
};
pub use error::{FixtureError, FixtureResult};
pub use fixtures::{AttributeSet, AttributeStore, FixtureRef, FixtureSource, YamlFixtureSource};
pub use loader::{FixtureLoader, Loaded};
pub use resolver::LoadingStack;
