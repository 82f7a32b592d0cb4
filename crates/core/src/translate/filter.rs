use std::fmt::Debug;

use anyhow::Result;

use super::context::TranslateContext;
use super::AttachedTo;
use crate::cypher::{BinaryOp, Clause, Expr};

/// A predicate producer.
///
/// A filter is a capability, not a concrete entity: given a context it
/// yields an optional predicate plus zero or more supporting clauses which
/// must precede the predicate's `WHERE` position.
pub trait Filter: Debug {
	/// The predicate this filter contributes, if any.
	fn predicate(&self, ctx: &TranslateContext) -> Result<Option<Expr>>;

	/// Supporting clauses which must be emitted before the predicate is
	/// referenced.
	fn clauses(&self, _ctx: &TranslateContext) -> Result<Vec<Clause>> {
		Ok(Vec::new())
	}
}

/// Comparison operators usable against a single attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Comparison {
	Eq,
	Neq,
	Lt,
	Lte,
	Gt,
	Gte,
	In,
	Contains,
	StartsWith,
	EndsWith,
}

impl Comparison {
	fn binary_op(self) -> BinaryOp {
		match self {
			Comparison::Eq => BinaryOp::Eq,
			Comparison::Neq => BinaryOp::Neq,
			Comparison::Lt => BinaryOp::Lt,
			Comparison::Lte => BinaryOp::Lte,
			Comparison::Gt => BinaryOp::Gt,
			Comparison::Gte => BinaryOp::Gte,
			Comparison::In => BinaryOp::In,
			Comparison::Contains => BinaryOp::Contains,
			Comparison::StartsWith => BinaryOp::StartsWith,
			Comparison::EndsWith => BinaryOp::EndsWith,
		}
	}

	/// Parse a request filter key of the form `name_SUFFIX` into the
	/// attribute name and its comparison.
	pub fn parse_key(key: &str) -> (&str, Comparison) {
		for (suffix, comparison) in [
			("_NOT", Comparison::Neq),
			("_GTE", Comparison::Gte),
			("_GT", Comparison::Gt),
			("_LTE", Comparison::Lte),
			("_LT", Comparison::Lt),
			("_IN", Comparison::In),
			("_CONTAINS", Comparison::Contains),
			("_STARTS_WITH", Comparison::StartsWith),
			("_ENDS_WITH", Comparison::EndsWith),
		] {
			if let Some(name) = key.strip_suffix(suffix) {
				return (name, comparison);
			}
		}
		(key, Comparison::Eq)
	}
}

/// Compares one attribute of the scoped target or relationship against a
/// value expression.
#[derive(Debug)]
pub struct PropertyFilter {
	pub attribute: String,
	pub attached_to: AttachedTo,
	pub comparison: Comparison,
	pub value: Expr,
}

impl Filter for PropertyFilter {
	fn predicate(&self, ctx: &TranslateContext) -> Result<Option<Expr>> {
		let target = match self.attached_to {
			AttachedTo::Node => ctx.target().clone(),
			AttachedTo::Relationship => ctx.relationship()?.clone(),
		};
		Ok(Some(Expr::binary(
			Expr::prop(&target, self.attribute.clone()),
			self.comparison.binary_op(),
			self.value.clone(),
		)))
	}
}

/// The boolean combinator of a [`LogicalFilter`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LogicalOp {
	And,
	Or,
	Not,
}

/// Combines child filters under a boolean operator.
#[derive(Debug)]
pub struct LogicalFilter {
	pub op: LogicalOp,
	pub children: Vec<Box<dyn Filter>>,
}

impl Filter for LogicalFilter {
	fn predicate(&self, ctx: &TranslateContext) -> Result<Option<Expr>> {
		let mut predicates = Vec::with_capacity(self.children.len());
		for child in &self.children {
			if let Some(predicate) = child.predicate(ctx)? {
				predicates.push(predicate);
			}
		}
		Ok(match self.op {
			LogicalOp::And => Expr::and_all(predicates),
			LogicalOp::Or => Expr::or_all(predicates),
			LogicalOp::Not => Expr::and_all(predicates).map(Expr::not),
		})
	}

	fn clauses(&self, ctx: &TranslateContext) -> Result<Vec<Clause>> {
		let mut clauses = Vec::new();
		for child in &self.children {
			clauses.extend(child.clauses(ctx)?);
		}
		Ok(clauses)
	}
}

/// Combine the predicates and supporting clauses of a filter list into one
/// conjoined `WHERE` input.
pub(super) fn compile_filters(
	filters: &[Box<dyn Filter>],
	ctx: &TranslateContext,
) -> Result<(Vec<Clause>, Option<Expr>)> {
	let mut clauses = Vec::new();
	let mut predicates = Vec::new();
	for filter in filters {
		clauses.extend(filter.clauses(ctx)?);
		if let Some(predicate) = filter.predicate(ctx)? {
			predicates.push(predicate);
		}
	}
	Ok((clauses, Expr::and_all(predicates)))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translate::{Env, OperationKind};

	#[test]
	fn parses_filter_suffixes() {
		assert_eq!(Comparison::parse_key("title"), ("title", Comparison::Eq));
		assert_eq!(Comparison::parse_key("title_NOT"), ("title", Comparison::Neq));
		assert_eq!(Comparison::parse_key("year_GTE"), ("year", Comparison::Gte));
		assert_eq!(Comparison::parse_key("name_STARTS_WITH"), ("name", Comparison::StartsWith));
	}

	#[test]
	fn relationship_filter_needs_relationship_binding() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Read,
		});
		let filter = PropertyFilter {
			attribute: "role".into(),
			attached_to: AttachedTo::Relationship,
			comparison: Comparison::Eq,
			value: Expr::int(1),
		};
		assert!(filter.predicate(&ctx).is_err());
		assert!(filter.predicate(&ctx.push(true)).is_ok());
	}
}
