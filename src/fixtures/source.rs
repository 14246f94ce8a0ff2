//! Fixture definition sources.
//!
//! A fixture source is the external collaborator that supplies raw fixture
//! definitions for one storage table. The in-tree implementation reads YAML
//! files named after the table, one mapping of fixture names to attribute
//! mappings per file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

use super::store::AttributeSet;
use crate::error::{FixtureError, FixtureResult};

/// Supplies raw fixture definitions for storage tables.
pub trait FixtureSource {
	/// Returns the ordered fixture-name to attribute mapping for `table`.
	///
	/// # Errors
	///
	/// Failure to locate or parse the definitions is fatal for the table's
	/// model.
	fn load(&self, table: &str) -> FixtureResult<IndexMap<String, AttributeSet>>;
}

/// Reads fixture definitions from `<root>/<table>.yml` files.
///
/// # Example
///
/// Given `fixtures/authors.yml`:
///
/// ```yaml
/// jane:
///   name: Jane Austen
/// mark:
///   name: Mark Twain
/// ```
///
/// ```ignore
/// let source = YamlFixtureSource::new("fixtures");
/// let authors = source.load("authors")?;
/// assert_eq!(authors.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct YamlFixtureSource {
	root: PathBuf,
}

impl YamlFixtureSource {
	/// Creates a source rooted at the given directory.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// Returns the directory fixture files are read from.
	pub fn root(&self) -> &Path {
		&self.root
	}

	fn locate(&self, table: &str) -> FixtureResult<PathBuf> {
		for ext in ["yml", "yaml"] {
			let path = self.root.join(format!("{table}.{ext}"));
			if path.is_file() {
				return Ok(path);
			}
		}
		Err(FixtureError::Io(std::io::Error::new(
			std::io::ErrorKind::NotFound,
			format!(
				"no fixture file for table '{table}' under {}",
				self.root.display()
			),
		)))
	}
}

impl FixtureSource for YamlFixtureSource {
	fn load(&self, table: &str) -> FixtureResult<IndexMap<String, AttributeSet>> {
		let path = self.locate(table)?;
		tracing::debug!(path = %path.display(), "reading fixture file");
		let content = std::fs::read_to_string(&path)?;
		parse_document(&content)
			.map_err(|e| annotate(e, &path))
	}
}

/// Parses one fixture document: a mapping of fixture names to attribute
/// mappings, preserving document order.
fn parse_document(content: &str) -> FixtureResult<IndexMap<String, AttributeSet>> {
	let document: serde_yaml::Value = serde_yaml::from_str(content)?;
	let serde_yaml::Value::Mapping(entries) = document else {
		return Err(FixtureError::Parse(
			"expected a mapping of fixture names to attribute mappings".to_string(),
		));
	};

	let mut sets = IndexMap::with_capacity(entries.len());
	for (name, attributes) in entries {
		let name = name
			.as_str()
			.ok_or_else(|| FixtureError::Parse("fixture names must be strings".to_string()))?
			.to_string();
		let serde_yaml::Value::Mapping(fields) = attributes else {
			return Err(FixtureError::Parse(format!(
				"fixture '{name}' must map attribute names to values"
			)));
		};

		let mut set = AttributeSet::with_capacity(fields.len());
		for (attribute, value) in fields {
			let attribute = attribute
				.as_str()
				.ok_or_else(|| {
					FixtureError::Parse(format!(
						"attribute names of fixture '{name}' must be strings"
					))
				})?
				.to_string();
			set.insert(attribute, yaml_to_json(value)?);
		}
		sets.insert(name, set);
	}
	Ok(sets)
}

fn yaml_to_json(value: serde_yaml::Value) -> FixtureResult<Value> {
	Ok(serde_json::to_value(value)?)
}

fn annotate(error: FixtureError, path: &Path) -> FixtureError {
	match error {
		FixtureError::Parse(message) => {
			FixtureError::Parse(format!("{}: {message}", path.display()))
		}
		other => other,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;
	use std::io::Write;
	use tempfile::TempDir;

	fn write_fixture(dir: &TempDir, file: &str, content: &str) {
		let mut f = std::fs::File::create(dir.path().join(file)).unwrap();
		write!(f, "{content}").unwrap();
	}

	#[rstest]
	fn test_load_preserves_document_order() {
		let dir = TempDir::new().unwrap();
		write_fixture(
			&dir,
			"authors.yml",
			"jane:\n  name: Jane Austen\nmark:\n  name: Mark Twain\nleo:\n  name: Leo Tolstoy\n",
		);

		let source = YamlFixtureSource::new(dir.path());
		let authors = source.load("authors").unwrap();

		let names: Vec<&str> = authors.keys().map(String::as_str).collect();
		assert_eq!(names, vec!["jane", "mark", "leo"]);
		assert_eq!(authors["jane"]["name"], json!("Jane Austen"));
	}

	#[rstest]
	fn test_load_scalar_types() {
		let dir = TempDir::new().unwrap();
		write_fixture(
			&dir,
			"books.yml",
			"moby:\n  id: 3\n  title: Moby Dick\n  in_print: true\n  isbn: ~\n",
		);

		let source = YamlFixtureSource::new(dir.path());
		let books = source.load("books").unwrap();
		let moby = &books["moby"];

		assert_eq!(moby["id"], json!(3));
		assert_eq!(moby["title"], json!("Moby Dick"));
		assert_eq!(moby["in_print"], json!(true));
		assert_eq!(moby["isbn"], json!(null));
	}

	#[rstest]
	fn test_load_yaml_extension_fallback() {
		let dir = TempDir::new().unwrap();
		write_fixture(&dir, "authors.yaml", "jane:\n  name: Jane\n");

		let source = YamlFixtureSource::new(dir.path());
		assert_eq!(source.load("authors").unwrap().len(), 1);
	}

	#[rstest]
	fn test_load_missing_file() {
		let dir = TempDir::new().unwrap();
		let source = YamlFixtureSource::new(dir.path());
		let result = source.load("authors");
		assert!(matches!(result, Err(FixtureError::Io(_))));
	}

	#[rstest]
	fn test_load_rejects_non_mapping_document() {
		let dir = TempDir::new().unwrap();
		write_fixture(&dir, "authors.yml", "- jane\n- mark\n");

		let source = YamlFixtureSource::new(dir.path());
		let result = source.load("authors");
		assert!(matches!(result, Err(FixtureError::Parse(_))));
	}

	#[rstest]
	fn test_load_rejects_scalar_fixture_body() {
		let dir = TempDir::new().unwrap();
		write_fixture(&dir, "authors.yml", "jane: just a string\n");

		let source = YamlFixtureSource::new(dir.path());
		let result = source.load("authors");
		assert!(matches!(result, Err(FixtureError::Parse(_))));
	}
}
