use std::sync::RwLock;

use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::callbacks::CallbackBucket;
use super::context::TranslateContext;
use super::filter::{compile_filters, Filter};
use super::input_field::{compile_input_fields, register_field_callbacks, InputField};
use super::operation::{MutationOperation, Operation, Transpiled};
use crate::catalog::{Cardinality, Direction};
use crate::cypher::{
	BinaryOp, CallClause, Clause, Expr, Literal, MatchClause, MergeClause, NodePattern,
	PathPattern, Pattern, Projection, RelPattern, ReturnClause, ValidateClause, WithClause,
};
use crate::err::Error;
use crate::translate::OperationKind;

/// Connects the current target to matched endpoint entities by merging a
/// typed relationship.
///
/// Connecting affects both endpoints, so two independently-keyed
/// authorization-filter sets are carried: one checked against the matched
/// endpoint and one against the relationship's source.
#[derive(Debug)]
pub struct ConnectOperation {
	entity: String,
	target_labels: Vec<String>,
	rel_type: String,
	direction: Direction,
	cardinality: Cardinality,
	filters: Vec<Box<dyn Filter>>,
	edge_fields: Vec<Box<dyn InputField>>,
	authorization: AuthorizationFilters,
	source_authorization: AuthorizationFilters,
	contexts: RwLock<Option<(TranslateContext, TranslateContext)>>,
}

impl ConnectOperation {
	pub fn new(
		entity: impl Into<String>,
		target_labels: Vec<String>,
		rel_type: impl Into<String>,
		direction: Direction,
	) -> Self {
		Self {
			entity: entity.into(),
			target_labels,
			rel_type: rel_type.into(),
			direction,
			cardinality: Cardinality::Many,
			filters: Vec::new(),
			edge_fields: Vec::new(),
			authorization: AuthorizationFilters::new(),
			source_authorization: AuthorizationFilters::new(),
			contexts: RwLock::new(None),
		}
	}

	pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
		self.cardinality = cardinality;
		self
	}

	pub fn with_filters(mut self, filters: Vec<Box<dyn Filter>>) -> Self {
		self.filters = filters;
		self
	}

	pub fn with_edge_fields(mut self, fields: Vec<Box<dyn InputField>>) -> Self {
		self.edge_fields = fields;
		self
	}

	pub fn with_authorization(mut self, authorization: AuthorizationFilters) -> Self {
		self.authorization = authorization;
		self
	}

	pub fn with_source_authorization(mut self, authorization: AuthorizationFilters) -> Self {
		self.source_authorization = authorization;
		self
	}

	fn contexts(&self) -> Result<(TranslateContext, TranslateContext)> {
		self.contexts
			.read()
			.expect("scoped context poisoned")
			.clone()
			.ok_or_else(|| Error::MissingNestedContext.into())
	}

	/// The multiplicity guard run after the merge when the relationship is
	/// declared to-one, for create and update statements.
	fn cardinality_guard(&self, ctx: &TranslateContext, scoped: &TranslateContext) -> Clause {
		let rel = scoped.fresh_var("rel");
		let far = scoped.fresh_var("this");
		let count = scoped.fresh_var("c");
		let body = vec![
			Clause::Match(MatchClause::new(Pattern::Path(PathPattern::new(
				NodePattern::bare(ctx.target().clone()),
				RelPattern::new(Some(rel.clone()), self.rel_type.clone(), self.direction),
				NodePattern::new(far, self.target_labels.clone()),
			)))),
			Clause::With(WithClause::new(vec![Projection::aliased(
				Expr::func("count", vec![Expr::Var(rel)]),
				count.clone(),
			)])),
			Clause::Validate(ValidateClause::new(
				Expr::binary(Expr::Var(count.clone()), BinaryOp::Lte, Expr::int(1)),
				format!("Relationship `{}` must have at most one target", self.rel_type),
			)),
			Clause::Return(ReturnClause::new(vec![Projection::aliased(
				Expr::func("collect", vec![Expr::Literal(Literal::Null)]),
				scoped.fresh_var("var"),
			)])),
		];
		Clause::Call(CallClause::new(vec![ctx.target().clone()], body))
	}
}

impl Operation for ConnectOperation {
	fn name(&self) -> &'static str {
		"ConnectOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		register_field_callbacks(&self.edge_fields, bucket);
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let scoped = ctx.push(true);
		*self.contexts.write().expect("scoped context poisoned") =
			Some((scoped.clone(), ctx.clone()));

		let mut clauses = Vec::new();
		let (filter_clauses, filter_pred) = compile_filters(&self.filters, &scoped)?;
		let auth_pred = self.authorization.where_predicate(&scoped)?;
		let cond = Expr::and_all(filter_pred.into_iter().chain(auth_pred));

		clauses.push(Clause::Match(
			MatchClause::new(Pattern::Node(NodePattern::new(
				scoped.target().clone(),
				self.target_labels.clone(),
			)))
			.with_cond(cond),
		));
		clauses.extend(filter_clauses);

		clauses.extend(self.authorization.validation_clauses(&scoped, AuthTiming::Before)?);
		clauses.extend(self.source_authorization.validation_clauses(ctx, AuthTiming::Before)?);

		clauses.push(Clause::Merge(MergeClause {
			pattern: Pattern::Path(PathPattern::new(
				NodePattern::bare(ctx.target().clone()),
				RelPattern::new(
					Some(scoped.relationship()?.clone()),
					self.rel_type.clone(),
					self.direction,
				),
				NodePattern::bare(scoped.target().clone()),
			)),
		}));

		clauses.extend(compile_input_fields(&self.edge_fields, &scoped)?);

		if self.cardinality == Cardinality::One
			&& matches!(
				ctx.env().top_level_operation,
				OperationKind::Create | OperationKind::Update
			) {
			clauses.push(self.cardinality_guard(ctx, &scoped));
		}

		Ok(Transpiled::new(clauses, Expr::Var(scoped.target().clone())))
	}
}

impl MutationOperation for ConnectOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		let (scoped, parent) = self.contexts()?;
		let mut clauses = self.authorization.validation_clauses(&scoped, when)?;
		clauses.extend(self.source_authorization.validation_clauses(&parent, when)?);
		Ok(clauses)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translate::{Env, OperationKind};

	#[test]
	fn connect_matches_then_merges() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Update,
		});
		let op = ConnectOperation::new(
			"Actor",
			vec!["Actor".into()],
			"ACTED_IN",
			Direction::In,
		);
		let transpiled = op.transpile(&ctx).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		let match_at = text.find("MATCH").unwrap();
		let merge_at = text.find("MERGE").unwrap();
		assert!(match_at < merge_at, "{text}");
	}

	#[test]
	fn to_one_relationship_gets_a_cardinality_guard() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Create,
		});
		let op = ConnectOperation::new("Actor", vec!["Actor".into()], "DIRECTED_BY", Direction::Out)
			.with_cardinality(Cardinality::One);
		let transpiled = op.transpile(&ctx).unwrap();
		let text = transpiled
			.clauses
			.last()
			.unwrap()
			.to_string();
		assert!(text.contains("apoc.util.validate"), "{text}");
		assert!(text.contains("count("), "{text}");
	}
}
