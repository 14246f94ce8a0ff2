//! Dependency resolution for fixture loading.
//!
//! Given a fixture reference, the resolver materializes and persists every
//! record the fixture depends on, in dependency order. Single-valued
//! (belongs-to) associations are satisfied before the owning record's first
//! save; multi-valued associations are linked after it. A loading stack of
//! the references currently under resolution detects dependency cycles:
//! a back-edge is never recursed into, the foreign key is left unset and a
//! fixup is queued to repair the link once the ancestor finishes saving.
//!
//! Records that already exist in the backend (matched by the primary key
//! stored in their attribute set) are reused without side effects, which
//! makes resolution idempotent and lets diamond dependencies share one
//! persisted record.

use std::collections::HashMap;

use serde_json::Value;

use crate::adapter::{AdapterRegistry, AssociationDescriptor, PersistedRecord};
use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::{AttributeSet, AttributeStore, FixtureRef, FixtureSource};

/// References currently under resolution, outermost first.
///
/// Membership of a dependency target in the stack is exactly the cycle
/// condition. A reference that was already resolved but is not an ancestor
/// is a diamond dependency, caught by the persisted-record lookup instead.
#[derive(Debug, Default)]
pub struct LoadingStack(Vec<FixtureRef>);

impl LoadingStack {
	/// Creates an empty stack.
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of references currently under resolution.
	pub fn depth(&self) -> usize {
		self.0.len()
	}

	fn push(&mut self, fixture: FixtureRef) {
		self.0.push(fixture);
	}

	fn pop(&mut self) {
		self.0.pop();
	}

	fn contains(&self, fixture: &FixtureRef) -> bool {
		self.0.contains(fixture)
	}
}

/// A deferred link repair, queued when resolution meets a back-edge.
#[derive(Debug)]
pub(crate) struct Fixup {
	owner: FixtureRef,
	action: FixupAction,
}

#[derive(Debug)]
enum FixupAction {
	/// Re-fetch the owner by primary key, set `key` to the target's key
	/// value and save the owner again.
	SetForeignKey { key: String },

	/// Link the owner to the target through the descriptor.
	Link { descriptor: AssociationDescriptor },
}

/// Fixups keyed by the reference whose save unblocks them, flushed in
/// enqueue order once that reference finishes resolving.
pub(crate) type PendingFixups = HashMap<FixtureRef, Vec<Fixup>>;

/// Resolves fixture references into persisted records.
pub(crate) struct Resolver<'a> {
	store: &'a mut AttributeStore,
	source: &'a dyn FixtureSource,
	registry: &'a AdapterRegistry,
}

impl<'a> Resolver<'a> {
	pub(crate) fn new(
		store: &'a mut AttributeStore,
		source: &'a dyn FixtureSource,
		registry: &'a AdapterRegistry,
	) -> Self {
		Self {
			store,
			source,
			registry,
		}
	}

	/// Materializes `fixture` and everything it depends on, returning the
	/// persisted record.
	pub(crate) fn resolve(
		&mut self,
		fixture: &FixtureRef,
		stack: &mut LoadingStack,
		fixups: &mut PendingFixups,
	) -> FixtureResult<PersistedRecord> {
		tracing::debug!(fixture = %fixture, depth = stack.depth(), "resolving fixture");
		stack.push(fixture.clone());

		let adapter = self.registry.adapter_for(&fixture.model)?;
		let table = adapter.table_name(&fixture.model)?;
		self.store.ensure_loaded(&fixture.model, &table, self.source)?;

		let attrs = self.store.get(fixture)?.clone();
		let pk = adapter.primary_key(&fixture.model)?;

		// Reuse a record persisted by an earlier resolution
		if let Some(key) = attrs.get(&pk) {
			if let Some(existing) = adapter.find_by_primary_key(&fixture.model, key)? {
				tracing::trace!(fixture = %fixture, "already persisted, reusing");
				stack.pop();
				return Ok(existing);
			}
		}

		let mut values = AttributeSet::new();
		let mut multi: Vec<(AssociationDescriptor, Vec<String>)> = Vec::new();

		for (attribute, value) in &attrs {
			let Some(descriptor) = adapter.association(&fixture.model, attribute)? else {
				values.insert(attribute.clone(), value.clone());
				continue;
			};

			if !descriptor.kind.is_single() {
				let names = target_names(fixture, &descriptor, value)?;
				multi.push((descriptor, names));
				continue;
			}

			let name = single_target_name(fixture, &descriptor, value)?;
			let target = FixtureRef::new(descriptor.target.clone(), name);
			if target == *fixture {
				// Own foreign key points at our own primary key
				match attrs.get(&pk).filter(|key| !key.is_null()) {
					Some(key) => {
						values.insert(descriptor.key.clone(), key.clone());
					}
					None => {
						// Key is generated at save time; repair right after
						values.insert(descriptor.key.clone(), Value::Null);
						fixups.entry(fixture.clone()).or_default().push(Fixup {
							owner: fixture.clone(),
							action: FixupAction::SetForeignKey {
								key: descriptor.key.clone(),
							},
						});
					}
				}
			} else if stack.contains(&target) {
				tracing::debug!(
					fixture = %fixture,
					target = %target,
					attribute = descriptor.name.as_str(),
					"dependency cycle, deferring foreign key"
				);
				values.insert(descriptor.key.clone(), Value::Null);
				fixups.entry(target).or_default().push(Fixup {
					owner: fixture.clone(),
					action: FixupAction::SetForeignKey {
						key: descriptor.key.clone(),
					},
				});
			} else {
				let resolved = self.resolve(&target, stack, fixups)?;
				let target_pk = self.registry.adapter_for(&target.model)?.primary_key(&target.model)?;
				values.insert(descriptor.key.clone(), resolved.get(&target_pk).clone());
			}
		}

		let record = adapter.save(&fixture.model, &values)?;
		tracing::debug!(fixture = %fixture, "saved");

		// The key may have been generated by the backend
		self.store
			.set_key_if_absent(fixture, &pk, record.get(&pk).clone());

		stack.pop();

		if let Some(queued) = fixups.remove(fixture) {
			for fixup in queued {
				self.apply_fixup(fixup, &record)?;
			}
		}

		for (descriptor, names) in multi {
			for name in names {
				let target = FixtureRef::new(descriptor.target.clone(), name);
				if target == *fixture {
					adapter.add_associated(&descriptor, &record, &record)?;
				} else if stack.contains(&target) {
					tracing::debug!(
						fixture = %fixture,
						target = %target,
						attribute = descriptor.name.as_str(),
						"dependency cycle, deferring link"
					);
					fixups.entry(target).or_default().push(Fixup {
						owner: fixture.clone(),
						action: FixupAction::Link {
							descriptor: descriptor.clone(),
						},
					});
				} else {
					let resolved = self.resolve(&target, stack, fixups)?;
					adapter.add_associated(&descriptor, &record, &resolved)?;
				}
			}
		}

		Ok(record)
	}

	/// Runs one queued repair against the now-persisted target record.
	fn apply_fixup(&mut self, fixup: Fixup, target: &PersistedRecord) -> FixtureResult<()> {
		let adapter = self.registry.adapter_for(&fixup.owner.model)?;
		let pk = adapter.primary_key(&fixup.owner.model)?;
		let owner_key = self
			.store
			.get(&fixup.owner)?
			.get(&pk)
			.cloned()
			.unwrap_or(Value::Null);
		let owner = adapter.find_associated(&fixup.owner.model, &owner_key)?;

		match fixup.action {
			FixupAction::SetForeignKey { key } => {
				let target_adapter = self.registry.adapter_for(&target.model)?;
				let target_pk = target_adapter.primary_key(&target.model)?;
				let mut values = owner.values;
				values.insert(key, target.get(&target_pk).clone());
				adapter.save(&fixup.owner.model, &values)?;
				tracing::debug!(owner = %fixup.owner, "repaired deferred foreign key");
			}
			FixupAction::Link { descriptor } => {
				adapter.add_associated(&descriptor, &owner, target)?;
				tracing::debug!(owner = %fixup.owner, "repaired deferred link");
			}
		}
		Ok(())
	}
}

/// Fixture name a single-valued association attribute points at.
fn single_target_name(
	fixture: &FixtureRef,
	descriptor: &AssociationDescriptor,
	value: &Value,
) -> FixtureResult<String> {
	value
		.as_str()
		.map(str::to_string)
		.ok_or_else(|| invalid_target(fixture, descriptor, value))
}

/// Fixture names a multi-valued association attribute points at: a list,
/// a single name, or nothing.
fn target_names(
	fixture: &FixtureRef,
	descriptor: &AssociationDescriptor,
	value: &Value,
) -> FixtureResult<Vec<String>> {
	match value {
		Value::Null => Ok(Vec::new()),
		Value::String(name) => Ok(vec![name.clone()]),
		Value::Array(items) => items
			.iter()
			.map(|item| {
				item.as_str()
					.map(str::to_string)
					.ok_or_else(|| invalid_target(fixture, descriptor, item))
			})
			.collect(),
		other => Err(invalid_target(fixture, descriptor, other)),
	}
}

fn invalid_target(
	fixture: &FixtureRef,
	descriptor: &AssociationDescriptor,
	value: &Value,
) -> FixtureError {
	FixtureError::Parse(format!(
		"association '{}' of {fixture} expects fixture names, got {value}",
		descriptor.name
	))
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_loading_stack_membership() {
		let mut stack = LoadingStack::new();
		let jane = FixtureRef::new("author", "jane");
		let moby = FixtureRef::new("book", "moby");

		stack.push(jane.clone());
		stack.push(moby.clone());
		assert_eq!(stack.depth(), 2);
		assert!(stack.contains(&jane));

		stack.pop();
		assert!(!stack.contains(&moby));
		assert!(stack.contains(&jane));
	}

	#[rstest]
	fn test_target_names_accepts_list_and_scalar() {
		let fixture = FixtureRef::new("book", "moby");
		let descriptor = AssociationDescriptor::has_many("chapters", "chapter", "book_id");

		assert_eq!(
			target_names(&fixture, &descriptor, &json!(["one", "two"])).unwrap(),
			vec!["one", "two"]
		);
		assert_eq!(
			target_names(&fixture, &descriptor, &json!("one")).unwrap(),
			vec!["one"]
		);
		assert!(target_names(&fixture, &descriptor, &Value::Null)
			.unwrap()
			.is_empty());
	}

	#[rstest]
	fn test_target_names_rejects_non_names() {
		let fixture = FixtureRef::new("book", "moby");
		let descriptor = AssociationDescriptor::has_many("chapters", "chapter", "book_id");

		let result = target_names(&fixture, &descriptor, &json!([1, 2]));
		assert!(matches!(result, Err(FixtureError::Parse(_))));
	}
}
