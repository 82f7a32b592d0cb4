//! Leaf write-value resolvers.
//!
//! Each input field represents one requested write against one attribute,
//! constructed once per mutation input item and consumed exactly once during
//! lowering. A field contributes guard clauses (runtime assertions which
//! must precede the write) and `SET` items (the write itself).

mod math;
mod param;
mod pop;
mod property;

pub use math::{MathInputField, MathOperation};
pub use param::{FieldCallback, ParamInputField};
pub use pop::PopInputField;
pub use property::PropertyInputField;

use std::fmt::Debug;

use anyhow::Result;

use super::callbacks::CallbackBucket;
use super::context::TranslateContext;
use super::AttachedTo;
use crate::cypher::{Clause, SetClause, SetItem, Var};

/// One requested write against one attribute.
pub trait InputField: Debug {
	/// The attribute this field writes.
	fn attribute(&self) -> &str;

	/// Whether the write targets the node or the relationship binding.
	fn attached_to(&self) -> AttachedTo;

	/// Register any pending computed-value callback this field carries.
	fn register_callbacks(&self, _bucket: &mut CallbackBucket) {}

	/// Runtime assertion clauses which must precede the write.
	fn guard_clauses(&self, _ctx: &TranslateContext) -> Result<Vec<Clause>> {
		Ok(Vec::new())
	}

	/// The write operations this field resolves to. May legitimately be
	/// empty, e.g. for a callback placeholder which resolved to no value.
	fn set_items(&self, ctx: &TranslateContext) -> Result<Vec<SetItem>>;
}

/// The variable a field's write targets under the given context.
pub(super) fn write_target(ctx: &TranslateContext, attached_to: AttachedTo) -> Result<Var> {
	match attached_to {
		AttachedTo::Node => Ok(ctx.target().clone()),
		AttachedTo::Relationship => Ok(ctx.relationship()?.clone()),
	}
}

/// Compile a list of input fields into their guard clauses and a single
/// `SET` clause, preserving field order. Guards always precede the write.
pub(super) fn compile_input_fields(
	fields: &[Box<dyn InputField>],
	ctx: &TranslateContext,
) -> Result<Vec<Clause>> {
	let mut clauses = Vec::new();
	let mut items = Vec::new();
	for field in fields {
		clauses.extend(field.guard_clauses(ctx)?);
		items.extend(field.set_items(ctx)?);
	}
	if !items.is_empty() {
		clauses.push(Clause::Set(SetClause {
			items,
		}));
	}
	Ok(clauses)
}

/// Register the callbacks of every field in the list.
pub(super) fn register_field_callbacks(fields: &[Box<dyn InputField>], bucket: &mut CallbackBucket) {
	for field in fields {
		field.register_callbacks(bucket);
	}
}
