use std::sync::RwLock;

use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::callbacks::CallbackBucket;
use super::context::TranslateContext;
use super::filter::{compile_filters, Filter};
use super::input_field::{compile_input_fields, register_field_callbacks, InputField};
use super::operation::{wrap_subquery, MutationOperation, Operation, Transpiled};
use super::selection::SelectionPattern;
use crate::cypher::{Clause, Cond, Expr, MatchClause, WithClause};
use crate::err::Error;

/// Updates matched entity instances.
///
/// The match predicate folds the request filters and the BEFORE-timed
/// authorization predicate into a single `WHERE`; BEFORE guards run against
/// the matched rows before any write. A nested update which resolves to no
/// writes and no subqueries lowers to nothing at all: the parent can still
/// project the matched target.
#[derive(Debug)]
pub struct UpdateOperation {
	entity: String,
	selection: SelectionPattern,
	filters: Vec<Box<dyn Filter>>,
	authorization: AuthorizationFilters,
	input_fields: Vec<Box<dyn InputField>>,
	nested: Vec<Box<dyn MutationOperation>>,
	scoped_ctx: RwLock<Option<TranslateContext>>,
}

impl UpdateOperation {
	pub fn new(entity: impl Into<String>, selection: SelectionPattern) -> Self {
		Self {
			entity: entity.into(),
			selection,
			filters: Vec::new(),
			authorization: AuthorizationFilters::new(),
			input_fields: Vec::new(),
			nested: Vec::new(),
			scoped_ctx: RwLock::new(None),
		}
	}

	pub fn with_filters(mut self, filters: Vec<Box<dyn Filter>>) -> Self {
		self.filters = filters;
		self
	}

	pub fn with_authorization(mut self, authorization: AuthorizationFilters) -> Self {
		self.authorization = authorization;
		self
	}

	pub fn with_input_fields(mut self, fields: Vec<Box<dyn InputField>>) -> Self {
		self.input_fields = fields;
		self
	}

	pub fn with_nested(mut self, nested: Vec<Box<dyn MutationOperation>>) -> Self {
		self.nested = nested;
		self
	}

	fn scoped(&self) -> Result<TranslateContext> {
		self.scoped_ctx
			.read()
			.expect("scoped context poisoned")
			.clone()
			.ok_or_else(|| Error::MissingNestedContext.into())
	}
}

impl Operation for UpdateOperation {
	fn name(&self) -> &'static str {
		"UpdateOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.nested.iter().map(|op| &**op as &dyn Operation).collect()
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		register_field_callbacks(&self.input_fields, bucket);
		for child in &self.nested {
			child.register_callbacks(bucket);
		}
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let (pattern, scoped) = self.selection.apply(ctx)?;
		*self.scoped_ctx.write().expect("scoped context poisoned") = Some(scoped.clone());

		let write_clauses = compile_input_fields(&self.input_fields, &scoped)?;

		let mut subqueries = Vec::new();
		for child in &self.nested {
			let transpiled = child.transpile(&scoped)?;
			if transpiled.clauses.is_empty() {
				continue;
			}
			let mut body = transpiled.clauses;
			body.extend(child.authorization_clauses(AuthTiming::After)?);
			subqueries.push(wrap_subquery(scoped.target(), body, scoped.fresh_var("var")));
		}

		// A nested update with nothing to write and nothing nested below it
		// contributes no clauses; the projection from the matched target
		// still stands.
		if self.selection.is_relationship() && write_clauses.is_empty() && subqueries.is_empty() {
			return Ok(Transpiled::new(Vec::new(), Expr::Var(scoped.target().clone())));
		}

		let mut clauses = Vec::new();
		let (filter_clauses, filter_pred) = compile_filters(&self.filters, &scoped)?;
		let auth_clauses = self.authorization.supporting_clauses(&scoped)?;
		let auth_pred = self.authorization.where_predicate(&scoped)?;
		let cond = Expr::and_all(filter_pred.into_iter().chain(auth_pred));

		if filter_clauses.is_empty() && auth_clauses.is_empty() {
			clauses.push(Clause::Match(MatchClause::new(pattern).with_cond(cond)));
		} else {
			clauses.push(Clause::Match(MatchClause::new(pattern)));
			clauses.extend(filter_clauses);
			clauses.extend(auth_clauses);
			let mut with = WithClause::vars([scoped.target().clone()]);
			with.cond = cond.map(Cond);
			clauses.push(Clause::With(with));
		}

		clauses.extend(self.authorization.validation_clauses(&scoped, AuthTiming::Before)?);
		clauses.extend(write_clauses);
		clauses.extend(subqueries);

		Ok(Transpiled::new(clauses, Expr::Var(scoped.target().clone())))
	}
}

impl MutationOperation for UpdateOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		let scoped = self.scoped()?;
		self.authorization.validation_clauses(&scoped, when)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::{Attribute, Cardinality, Direction, ScalarKind};
	use crate::cypher::Param;
	use crate::translate::{
		AttachedTo, Env, NodeSelection, OperationKind, ParamInputField, RelationshipSelection,
	};
	use crate::val::Value;

	fn ctx() -> TranslateContext {
		TranslateContext::new(Env {
			top_level_operation: OperationKind::Update,
		})
	}

	fn nested_selection() -> SelectionPattern {
		SelectionPattern::Relationship(RelationshipSelection {
			rel_type: "ACTED_IN".into(),
			direction: Direction::In,
			target_labels: vec!["Actor".into()],
			cardinality: Cardinality::Many,
		})
	}

	#[test]
	fn nested_noop_update_emits_no_clauses() {
		let op = UpdateOperation::new("Actor", nested_selection());
		let transpiled = op.transpile(&ctx()).unwrap();
		assert!(transpiled.clauses.is_empty());
		assert!(matches!(transpiled.projection, Expr::Var(_)));
	}

	#[test]
	fn update_folds_filters_into_the_match_predicate() {
		use crate::translate::{Comparison, PropertyFilter};
		let op = UpdateOperation::new(
			"Movie",
			SelectionPattern::Node(NodeSelection::new(vec!["Movie".into()])),
		)
		.with_filters(vec![Box::new(PropertyFilter {
			attribute: "title".into(),
			attached_to: AttachedTo::Node,
			comparison: Comparison::Eq,
			value: Expr::param(&Param::new("param0", Value::from("The Matrix"))),
		})])
		.with_input_fields(vec![Box::new(ParamInputField::new(
			Attribute::new("tagline", ScalarKind::String),
			AttachedTo::Node,
			Param::new("param1", Value::from("Welcome to the Real World")),
		))]);
		let transpiled = op.transpile(&ctx()).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		let match_at = text.find("MATCH").unwrap();
		let where_at = text.find("WHERE").unwrap();
		let set_at = text.find("SET").unwrap();
		assert!(match_at < where_at && where_at < set_at, "{text}");
	}
}
