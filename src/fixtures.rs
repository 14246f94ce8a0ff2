//! Fixture definitions: references, raw attribute storage and sources.

mod reference;
mod source;
mod store;

pub use reference::FixtureRef;
pub use source::{FixtureSource, YamlFixtureSource};
pub use store::{AttributeSet, AttributeStore};
