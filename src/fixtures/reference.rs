//! Fixture references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FixtureError;

/// Identifies a single fixture as a (model, fixture name) pair.
///
/// The token form is `"<model>__<name>"`. The `__` separator is reserved
/// and must not otherwise appear in a model name.
///
/// # Example
///
/// ```
/// # use fixture_deps::fixtures::FixtureRef;
/// let fixture: FixtureRef = "author__jane".parse().unwrap();
/// assert_eq!(fixture.model, "author");
/// assert_eq!(fixture.name, "jane");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixtureRef {
	/// Model the fixture belongs to.
	pub model: String,

	/// Name of the fixture within its model.
	pub name: String,
}

impl FixtureRef {
	/// Creates a reference from its parts.
	pub fn new(model: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			name: name.into(),
		}
	}
}

impl FromStr for FixtureRef {
	type Err = FixtureError;

	fn from_str(token: &str) -> Result<Self, Self::Err> {
		let (model, name) = token
			.split_once("__")
			.ok_or_else(|| FixtureError::InvalidToken(token.to_string()))?;
		if model.is_empty() || name.is_empty() {
			return Err(FixtureError::InvalidToken(token.to_string()));
		}
		Ok(Self::new(model, name))
	}
}

impl fmt::Display for FixtureRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}__{}", self.model, self.name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_parse_token() {
		let fixture: FixtureRef = "author__jane".parse().unwrap();
		assert_eq!(fixture, FixtureRef::new("author", "jane"));
	}

	#[rstest]
	fn test_parse_splits_on_first_separator() {
		// Fixture names may themselves contain the separator
		let fixture: FixtureRef = "author__jane__doe".parse().unwrap();
		assert_eq!(fixture.model, "author");
		assert_eq!(fixture.name, "jane__doe");
	}

	#[rstest]
	#[case("author")]
	#[case("__jane")]
	#[case("author__")]
	#[case("")]
	fn test_parse_rejects_malformed_tokens(#[case] token: &str) {
		let result = token.parse::<FixtureRef>();
		assert!(matches!(result, Err(FixtureError::InvalidToken(_))));
	}

	#[rstest]
	fn test_display_round_trip() {
		let fixture = FixtureRef::new("book", "moby");
		assert_eq!(fixture.to_string(), "book__moby");
		assert_eq!(fixture.to_string().parse::<FixtureRef>().unwrap(), fixture);
	}
}
