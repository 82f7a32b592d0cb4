//! The resolved shape of one incoming request.
//!
//! A [`ResolveTree`] is the parsed, field-argument-resolved form of a graph
//! API request, already free of transport concerns. It is produced outside
//! this crate and consumed by the operation-tree factory.

use indexmap::IndexMap;

use crate::val::Value;

/// One resolved field selection with its arguments and child selections.
#[derive(Clone, Debug, Default)]
pub struct ResolveTree {
	/// The requested field name.
	pub name: String,
	/// The response alias, when different from the field name.
	pub alias: Option<String>,
	/// Field arguments, keyed by argument name.
	pub args: IndexMap<String, Value>,
	/// Child selections, grouped by the concrete or abstract type they were
	/// requested on.
	pub fields: FieldsByType,
}

impl ResolveTree {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}

	pub fn arg(mut self, name: impl Into<String>, value: Value) -> Self {
		self.args.insert(name.into(), value);
		self
	}

	pub fn field(mut self, type_name: impl Into<String>, field: ResolveTree) -> Self {
		self.fields.add(type_name, field);
		self
	}

	/// The key this selection is returned under.
	pub fn response_key(&self) -> &str {
		self.alias.as_deref().unwrap_or(&self.name)
	}

	pub fn get_arg(&self, name: &str) -> Option<&Value> {
		self.args.get(name)
	}
}

/// Child selections grouped by type name.
///
/// For a selection on a concrete type there is a single group; selections on
/// a union or interface may carry one group per concrete member.
#[derive(Clone, Debug, Default)]
pub struct FieldsByType(IndexMap<String, IndexMap<String, ResolveTree>>);

impl FieldsByType {
	pub fn add(&mut self, type_name: impl Into<String>, field: ResolveTree) {
		self.0
			.entry(type_name.into())
			.or_default()
			.insert(field.response_key().to_owned(), field);
	}

	pub fn is_empty(&self) -> bool {
		self.0.values().all(|group| group.is_empty())
	}

	/// The selections requested on the given type.
	pub fn on_type(&self, type_name: &str) -> impl Iterator<Item = &ResolveTree> {
		self.0.get(type_name).into_iter().flat_map(|group| group.values())
	}

	/// One named selection on the given type.
	pub fn get(&self, type_name: &str, field: &str) -> Option<&ResolveTree> {
		self.0.get(type_name).and_then(|group| group.get(field))
	}

	/// All selections regardless of the type they were requested on.
	pub fn all(&self) -> impl Iterator<Item = &ResolveTree> {
		self.0.values().flat_map(|group| group.values())
	}

	/// The type names selections were requested on.
	pub fn type_names(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}
}
