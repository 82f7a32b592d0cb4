use std::fmt::{self, Display, Formatter};

use anyhow::Result;

use super::{write_target, InputField};
use crate::catalog::Attribute;
use crate::cypher::{BinaryOp, Clause, Expr, Param, SetItem, UnaryOp, ValidateClause, Var};
use crate::err::Error;
use crate::translate::context::TranslateContext;
use crate::translate::AttachedTo;

/// The arithmetic applied by a [`MathInputField`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MathOperation {
	Increment,
	Decrement,
	Add,
	Subtract,
	Multiply,
	Divide,
}

impl MathOperation {
	fn binary_op(self) -> BinaryOp {
		match self {
			MathOperation::Increment | MathOperation::Add => BinaryOp::Add,
			MathOperation::Decrement | MathOperation::Subtract => BinaryOp::Sub,
			MathOperation::Multiply => BinaryOp::Mul,
			MathOperation::Divide => BinaryOp::Div,
		}
	}

	/// Parse a request input key of the form `name_OPERATION`.
	pub fn parse_key(key: &str) -> Option<(&str, MathOperation)> {
		for (suffix, operation) in [
			("_INCREMENT", MathOperation::Increment),
			("_DECREMENT", MathOperation::Decrement),
			("_ADD", MathOperation::Add),
			("_SUBTRACT", MathOperation::Subtract),
			("_MULTIPLY", MathOperation::Multiply),
			("_DIVIDE", MathOperation::Divide),
		] {
			if let Some(name) = key.strip_suffix(suffix) {
				return Some((name, operation));
			}
		}
		None
	}
}

impl Display for MathOperation {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		let name = match self {
			MathOperation::Increment => "increment",
			MathOperation::Decrement => "decrement",
			MathOperation::Add => "add",
			MathOperation::Subtract => "subtract",
			MathOperation::Multiply => "multiply",
			MathOperation::Divide => "divide",
		};
		f.write_str(name)
	}
}

/// Applies an arithmetic operation to the current value of a numeric
/// attribute.
///
/// A literal zero divisor is a static error, rejected at construction.
/// Everything else is guarded at execution time: the current property value
/// must not be null, and the magnitude of the result must stay within the
/// signed bit width of the attribute's kind. Overflow beyond the 64-bit
/// guard is left to the store's native behavior.
#[derive(Debug)]
pub struct MathInputField {
	attribute: Attribute,
	attached_to: AttachedTo,
	operation: MathOperation,
	param: Param,
}

impl MathInputField {
	pub fn new(
		attribute: Attribute,
		attached_to: AttachedTo,
		operation: MathOperation,
		param: Param,
	) -> Result<Self> {
		if operation == MathOperation::Divide && param.value().is_zero() {
			return Err(Error::DivisionByZero {
				attribute: attribute.name,
			}
			.into());
		}
		Ok(Self {
			attribute,
			attached_to,
			operation,
			param,
		})
	}

	fn result_expr(&self, target: &Var) -> Expr {
		Expr::binary(
			Expr::prop(target, self.attribute.name.clone()),
			self.operation.binary_op(),
			Expr::param(&self.param),
		)
	}
}

impl InputField for MathInputField {
	fn attribute(&self) -> &str {
		&self.attribute.name
	}

	fn attached_to(&self) -> AttachedTo {
		self.attached_to
	}

	fn guard_clauses(&self, ctx: &TranslateContext) -> Result<Vec<Clause>> {
		let target = write_target(ctx, self.attached_to)?;
		let prop = Expr::prop(&target, self.attribute.name.clone());
		let bits = self.attribute.kind.int_bits();
		let bound = if bits == 32 {
			i64::from(i32::MAX)
		} else {
			i64::MAX
		};
		Ok(vec![
			Clause::Validate(ValidateClause::new(
				Expr::Unary {
					op: UnaryOp::IsNotNull,
					expr: Box::new(prop),
				},
				format!("Cannot {} `{}` because it is null", self.operation, self.attribute.name),
			)),
			Clause::Validate(ValidateClause::new(
				Expr::binary(
					Expr::func("abs", vec![self.result_expr(&target)]),
					BinaryOp::Lte,
					Expr::int(bound),
				),
				format!(
					"Value of `{}` would overflow a {bits} bit signed integer",
					self.attribute.name
				),
			)),
		])
	}

	fn set_items(&self, ctx: &TranslateContext) -> Result<Vec<SetItem>> {
		let target = write_target(ctx, self.attached_to)?;
		Ok(vec![SetItem {
			place: Expr::prop(&target, self.attribute.name.clone()),
			value: self.result_expr(&target),
		}])
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::ScalarKind;
	use crate::translate::{Env, OperationKind};
	use crate::val::Value;

	fn ctx() -> TranslateContext {
		TranslateContext::new(Env {
			top_level_operation: OperationKind::Update,
		})
	}

	#[test]
	fn literal_zero_divisor_is_rejected_at_construction() {
		let err = MathInputField::new(
			Attribute::new("ratio", ScalarKind::Float),
			AttachedTo::Node,
			MathOperation::Divide,
			Param::new("param0", Value::from(0)),
		)
		.unwrap_err();
		assert!(matches!(
			err.downcast_ref::<Error>(),
			Some(Error::DivisionByZero { .. })
		));
	}

	#[test]
	fn increment_guard_bounds_a_32_bit_attribute() {
		let field = MathInputField::new(
			Attribute::new("viewCount", ScalarKind::Int),
			AttachedTo::Node,
			MathOperation::Increment,
			Param::new("param0", Value::from(1)),
		)
		.unwrap();
		let guards = field.guard_clauses(&ctx()).unwrap();
		assert_eq!(guards.len(), 2);
		assert!(guards[1].to_string().contains("2147483647"));
	}

	#[test]
	fn add_guard_bounds_a_64_bit_attribute() {
		let field = MathInputField::new(
			Attribute::new("viewCount", ScalarKind::BigInt),
			AttachedTo::Node,
			MathOperation::Add,
			Param::new("param0", Value::from(1)),
		)
		.unwrap();
		let guards = field.guard_clauses(&ctx()).unwrap();
		assert!(guards[1].to_string().contains("9223372036854775807"));
	}

	#[test]
	fn null_property_guard_precedes_the_write() {
		let field = MathInputField::new(
			Attribute::new("viewCount", ScalarKind::Int),
			AttachedTo::Node,
			MathOperation::Multiply,
			Param::new("param0", Value::from(2)),
		)
		.unwrap();
		let guards = field.guard_clauses(&ctx()).unwrap();
		assert!(guards[0].to_string().contains("IS NOT NULL"));
	}
}
