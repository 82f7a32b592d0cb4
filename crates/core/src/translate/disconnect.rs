use std::sync::RwLock;

use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::callbacks::CallbackBucket;
use super::context::TranslateContext;
use super::filter::{compile_filters, Filter};
use super::operation::{wrap_subquery, MutationOperation, Operation, Transpiled};
use crate::catalog::Direction;
use crate::cypher::{
	Clause, DeleteClause, Expr, MatchClause, NodePattern, PathPattern, Pattern, RelPattern,
};
use crate::err::Error;

/// Disconnects the current target from matched endpoint entities by
/// deleting the relationship between them.
///
/// The path is matched optionally, tolerating an already-missing
/// relationship. Disconnecting affects both endpoints, so authorization is
/// validated for the relationship's target and, independently, for its
/// source, at both timings. The two rule sets are keyed separately so an
/// attribute name shared between node and relationship inputs is never
/// processed twice.
#[derive(Debug)]
pub struct DisconnectOperation {
	entity: String,
	target_labels: Vec<String>,
	rel_type: String,
	direction: Direction,
	filters: Vec<Box<dyn Filter>>,
	authorization: AuthorizationFilters,
	source_authorization: AuthorizationFilters,
	nested: Vec<Box<dyn MutationOperation>>,
	contexts: RwLock<Option<(TranslateContext, TranslateContext)>>,
}

impl DisconnectOperation {
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
			filters: Vec::new(),
			authorization: AuthorizationFilters::new(),
			source_authorization: AuthorizationFilters::new(),
			nested: Vec::new(),
			contexts: RwLock::new(None),
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

	pub fn with_source_authorization(mut self, authorization: AuthorizationFilters) -> Self {
		self.source_authorization = authorization;
		self
	}

	pub fn with_nested(mut self, nested: Vec<Box<dyn MutationOperation>>) -> Self {
		self.nested = nested;
		self
	}

	fn contexts(&self) -> Result<(TranslateContext, TranslateContext)> {
		self.contexts
			.read()
			.expect("scoped context poisoned")
			.clone()
			.ok_or_else(|| Error::MissingNestedContext.into())
	}
}

impl Operation for DisconnectOperation {
	fn name(&self) -> &'static str {
		"DisconnectOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.nested.iter().map(|op| &**op as &dyn Operation).collect()
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		for child in &self.nested {
			child.register_callbacks(bucket);
		}
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
			MatchClause::optional(Pattern::Path(PathPattern::new(
				NodePattern::bare(ctx.target().clone()),
				RelPattern::new(
					Some(scoped.relationship()?.clone()),
					self.rel_type.clone(),
					self.direction,
				),
				NodePattern::new(scoped.target().clone(), self.target_labels.clone()),
			)))
			.with_cond(cond),
		));
		clauses.extend(filter_clauses);

		clauses.extend(self.authorization.validation_clauses(&scoped, AuthTiming::Before)?);
		clauses.extend(self.source_authorization.validation_clauses(ctx, AuthTiming::Before)?);

		clauses.push(Clause::Delete(DeleteClause {
			vars: vec![scoped.relationship()?.clone()],
			detach: false,
		}));

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

impl MutationOperation for DisconnectOperation {
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
	fn disconnect_matches_optionally_then_deletes() {
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Update,
		});
		let op = DisconnectOperation::new("Actor", vec!["Actor".into()], "ACTED_IN", Direction::In);
		let transpiled = op.transpile(&ctx).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		assert!(text.starts_with("OPTIONAL MATCH"), "{text}");
		let delete_at = text.find("\nDELETE").unwrap();
		assert!(delete_at > text.find("MATCH").unwrap(), "{text}");
	}
}
