use anyhow::Result;

use super::{write_target, InputField};
use crate::catalog::Attribute;
use crate::cypher::{Expr, Param, SetItem};
use crate::translate::callbacks::{CallbackBucket, CallbackEntry, MutationKind, TypeShape};
use crate::translate::context::TranslateContext;
use crate::translate::AttachedTo;
use crate::val::Value;

/// Writes a supplied value, or an already-bound parameter, into an
/// attribute.
///
/// Temporal and spatial attributes receive a store-side coercion wrapper
/// around the raw parameter; list attributes of those kinds are coerced
/// element-wise through a list comprehension. A backing parameter whose
/// value is still absent after callback resolution contributes no write at
/// all: callback-sourced fields are allowed to resolve to "no write".
#[derive(Debug)]
pub struct ParamInputField {
	attribute: Attribute,
	attached_to: AttachedTo,
	param: Param,
	callback: Option<FieldCallback>,
}

/// A pending computed value for one field.
#[derive(Clone, Debug)]
pub struct FieldCallback {
	pub function: String,
	pub parent: Value,
	pub kind: MutationKind,
}

impl ParamInputField {
	pub fn new(attribute: Attribute, attached_to: AttachedTo, param: Param) -> Self {
		Self {
			attribute,
			attached_to,
			param,
			callback: None,
		}
	}

	/// A field whose value is computed by a user callback at the resolution
	/// barrier.
	pub fn with_callback(
		attribute: Attribute,
		attached_to: AttachedTo,
		param: Param,
		callback: FieldCallback,
	) -> Self {
		Self {
			attribute,
			attached_to,
			param,
			callback: Some(callback),
		}
	}

	pub fn param(&self) -> &Param {
		&self.param
	}

	/// The value expression written into the attribute, with any required
	/// type coercion applied.
	fn value_expr(&self) -> Expr {
		let raw = Expr::param(&self.param);
		match self.attribute.kind.coercion_function() {
			Some(function) => {
				if self.attribute.list {
					let binding = crate::cypher::Var::new("x");
					Expr::ListComprehension {
						binding: binding.clone(),
						list: Box::new(raw),
						expr: Box::new(Expr::func(function, vec![Expr::var(&binding)])),
					}
				} else {
					Expr::func(function, vec![raw])
				}
			}
			None => raw,
		}
	}
}

impl InputField for ParamInputField {
	fn attribute(&self) -> &str {
		&self.attribute.name
	}

	fn attached_to(&self) -> AttachedTo {
		self.attached_to
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		if let Some(ref callback) = self.callback {
			bucket.add(CallbackEntry {
				param: self.param.clone(),
				function: callback.function.clone(),
				parent: callback.parent.clone(),
				declared: TypeShape {
					kind: self.attribute.kind,
					list: self.attribute.list,
				},
				kind: callback.kind,
			});
		}
	}

	fn set_items(&self, ctx: &TranslateContext) -> Result<Vec<SetItem>> {
		if self.param.value().is_none() {
			return Ok(Vec::new());
		}
		let target = write_target(ctx, self.attached_to)?;
		Ok(vec![SetItem {
			place: Expr::prop(&target, self.attribute.name.clone()),
			value: self.value_expr(),
		}])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::ScalarKind;
	use crate::translate::{Env, OperationKind};

	fn ctx() -> TranslateContext {
		TranslateContext::new(Env {
			top_level_operation: OperationKind::Create,
		})
	}

	#[test]
	fn absent_value_contributes_no_write() {
		let field = ParamInputField::new(
			Attribute::new("slug", ScalarKind::String),
			AttachedTo::Node,
			Param::placeholder("param0"),
		);
		assert!(field.set_items(&ctx()).unwrap().is_empty());
	}

	#[test]
	fn explicit_null_is_still_written() {
		let field = ParamInputField::new(
			Attribute::new("slug", ScalarKind::String),
			AttachedTo::Node,
			Param::new("param0", Value::Null),
		);
		assert_eq!(field.set_items(&ctx()).unwrap().len(), 1);
	}

	#[test]
	fn temporal_list_attribute_is_coerced_element_wise() {
		let field = ParamInputField::new(
			Attribute::new("showings", ScalarKind::Datetime).list(),
			AttachedTo::Node,
			Param::new("param0", Value::Array(vec![])),
		);
		let items = field.set_items(&ctx()).unwrap();
		assert_eq!(items[0].value.to_string(), "[x IN $param0 | datetime(x)]");
	}
}
