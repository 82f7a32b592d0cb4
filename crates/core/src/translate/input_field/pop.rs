use anyhow::Result;

use super::{write_target, InputField};
use crate::catalog::Attribute;
use crate::cypher::{Clause, Expr, Param, SetItem, UnaryOp, ValidateClause};
use crate::translate::context::TranslateContext;
use crate::translate::AttachedTo;

/// Removes the last N elements of a list attribute.
///
/// The supplied parameter is the element count; the write slices the list
/// to everything before the last N entries. Popping from a null list is
/// guarded against at execution time.
#[derive(Debug)]
pub struct PopInputField {
	attribute: Attribute,
	attached_to: AttachedTo,
	param: Param,
}

impl PopInputField {
	pub fn new(attribute: Attribute, attached_to: AttachedTo, param: Param) -> Self {
		Self {
			attribute,
			attached_to,
			param,
		}
	}
}

impl InputField for PopInputField {
	fn attribute(&self) -> &str {
		&self.attribute.name
	}

	fn attached_to(&self) -> AttachedTo {
		self.attached_to
	}

	fn guard_clauses(&self, ctx: &TranslateContext) -> Result<Vec<Clause>> {
		let target = write_target(ctx, self.attached_to)?;
		Ok(vec![Clause::Validate(ValidateClause::new(
			Expr::Unary {
				op: UnaryOp::IsNotNull,
				expr: Box::new(Expr::prop(&target, self.attribute.name.clone())),
			},
			format!("Cannot pop from `{}` because it is null", self.attribute.name),
		))])
	}

	fn set_items(&self, ctx: &TranslateContext) -> Result<Vec<SetItem>> {
		let target = write_target(ctx, self.attached_to)?;
		let prop = Expr::prop(&target, self.attribute.name.clone());
		Ok(vec![SetItem {
			place: prop.clone(),
			value: Expr::Slice {
				list: Box::new(prop),
				from: None,
				to: Some(Box::new(Expr::neg(Expr::param(&self.param)))),
			},
		}])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::ScalarKind;
	use crate::translate::{Env, OperationKind};
	use crate::val::Value;

	#[test]
	fn slices_off_the_last_elements() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Update,
		});
		let field = PopInputField::new(
			Attribute::new("tags", ScalarKind::String).list(),
			AttachedTo::Node,
			Param::new("param0", Value::from(2)),
		);
		let items = field.set_items(&ctx).unwrap();
		assert_eq!(items[0].value.to_string(), "this0.tags[..-$param0]");
		let guards = field.guard_clauses(&ctx).unwrap();
		assert!(guards[0].to_string().contains("this0.tags IS NOT NULL"));
	}
}
