use std::sync::RwLock;

use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::callbacks::CallbackBucket;
use super::context::TranslateContext;
use super::input_field::{compile_input_fields, register_field_callbacks, InputField};
use super::operation::{wrap_subquery, MutationOperation, Operation, Transpiled};
use crate::catalog::Direction;
use crate::cypher::{
	Clause, CreateClause, Expr, MergeClause, NodePattern, PathPattern, Pattern, RelPattern,
};
use crate::err::Error;

/// The relationship a nested create is merged onto.
///
/// Edge attribute writes travel as relationship-attached input fields of
/// the create itself.
#[derive(Clone, Debug)]
pub struct EdgeTarget {
	pub rel_type: String,
	pub direction: Direction,
}

impl EdgeTarget {
	pub fn new(rel_type: impl Into<String>, direction: Direction) -> Self {
		Self {
			rel_type: rel_type.into(),
			direction,
		}
	}
}

/// Creates one entity instance, optionally as the target of a nested edge.
///
/// A create has no pre-existing state, so it carries AFTER-timed
/// authorization only.
#[derive(Debug)]
pub struct CreateOperation {
	entity: String,
	labels: Vec<String>,
	edge: Option<EdgeTarget>,
	input_fields: Vec<Box<dyn InputField>>,
	nested: Vec<Box<dyn MutationOperation>>,
	authorization: AuthorizationFilters,
	scoped_ctx: RwLock<Option<TranslateContext>>,
}

impl CreateOperation {
	pub fn new(entity: impl Into<String>, labels: Vec<String>) -> Self {
		Self {
			entity: entity.into(),
			labels,
			edge: None,
			input_fields: Vec::new(),
			nested: Vec::new(),
			authorization: AuthorizationFilters::new(),
			scoped_ctx: RwLock::new(None),
		}
	}

	/// Mark this create as the target of a nested edge from its parent.
	pub fn with_edge(mut self, edge: EdgeTarget) -> Self {
		self.edge = Some(edge);
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

	pub fn with_authorization(mut self, authorization: AuthorizationFilters) -> Self {
		self.authorization = authorization;
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

impl Operation for CreateOperation {
	fn name(&self) -> &'static str {
		"CreateOperation"
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
		let scoped = ctx.push(self.edge.is_some());
		*self.scoped_ctx.write().expect("scoped context poisoned") = Some(scoped.clone());

		let mut clauses = vec![Clause::Create(CreateClause {
			pattern: Pattern::Node(NodePattern::new(scoped.target().clone(), self.labels.clone())),
		})];

		if let Some(ref edge) = self.edge {
			let source = scoped.source()?.clone();
			clauses.push(Clause::Merge(MergeClause {
				pattern: Pattern::Path(PathPattern::new(
					NodePattern::bare(source),
					RelPattern::new(
						Some(scoped.relationship()?.clone()),
						edge.rel_type.clone(),
						edge.direction,
					),
					NodePattern::bare(scoped.target().clone()),
				)),
			}));
		}

		clauses.extend(compile_input_fields(&self.input_fields, &scoped)?);

		for child in &self.nested {
			let transpiled = child.transpile(&scoped)?;
			if transpiled.clauses.is_empty() {
				continue;
			}
			let mut body = transpiled.clauses;
			body.extend(child.authorization_clauses(AuthTiming::After)?);
			clauses.push(wrap_subquery(scoped.target(), body, scoped.fresh_var("var")));
		}

		Ok(Transpiled::new(clauses, Expr::Var(scoped.target().clone())))
	}
}

impl MutationOperation for CreateOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		match when {
			// A create has no pre-mutation state to check.
			AuthTiming::Before => Ok(Vec::new()),
			AuthTiming::After => {
				let scoped = self.scoped()?;
				self.authorization.validation_clauses(&scoped, AuthTiming::After)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::{Attribute, ScalarKind};
	use crate::cypher::Param;
	use crate::translate::{AttachedTo, Env, OperationKind, ParamInputField};
	use crate::val::Value;

	fn ctx() -> TranslateContext {
		TranslateContext::new(Env {
			top_level_operation: OperationKind::Create,
		})
	}

	#[test]
	fn create_emits_pattern_then_writes() {
		let op = CreateOperation::new("Movie", vec!["Movie".into()]).with_input_fields(vec![
			Box::new(ParamInputField::new(
				Attribute::new("title", ScalarKind::String),
				AttachedTo::Node,
				Param::new("param0", Value::from("The Matrix")),
			)),
		]);
		let transpiled = op.transpile(&ctx()).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		assert!(text.starts_with("CREATE ("), "{text}");
		assert!(text.contains("SET"), "{text}");
	}

	#[test]
	fn authorization_extraction_requires_transpile() {
		let op = CreateOperation::new("Movie", vec!["Movie".into()]);
		let err = op.authorization_clauses(AuthTiming::After).unwrap_err();
		assert!(matches!(err.downcast_ref::<Error>(), Some(Error::MissingNestedContext)));
		op.transpile(&ctx()).unwrap();
		assert!(op.authorization_clauses(AuthTiming::After).unwrap().is_empty());
	}

	#[test]
	fn nested_edge_target_merges_onto_the_relationship() {
		let op = CreateOperation::new("Actor", vec!["Actor".into()])
			.with_edge(EdgeTarget::new("ACTED_IN", Direction::In));
		let parent = ctx();
		let transpiled = op.transpile(&parent).unwrap();
		let text = transpiled.clauses[1].to_string();
		assert!(text.starts_with("MERGE ("), "{text}");
		assert!(text.contains(":ACTED_IN]"), "{text}");
	}
}
