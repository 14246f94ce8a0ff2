//! Convenience re-exports for common usage.
//!
//! This module provides a single import for the most commonly used items
//! from the fixture-deps crate.
//!
//! # Example
//!
//! ```ignore
//! use fixture_deps::prelude::*;
//! ```

// Error types
pub use crate::error::{FixtureError, FixtureResult};

// Fixture types
pub use crate::fixtures::{AttributeSet, AttributeStore, FixtureRef, FixtureSource, YamlFixtureSource};

// Adapter types
pub use crate::adapter::{
	AdapterRegistry, AssociationDescriptor, AssociationKind, BackendKind, JoinTable,
	MemoryAdapter, ModelAdapter, ModelMeta, PersistedRecord, Schema,
};

// Loader types
pub use crate::loader::{FixtureLoader, Loaded};
