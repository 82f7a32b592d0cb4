use anyhow::Result;

use super::context::TranslateContext;
use super::filter::Filter;
use crate::cypher::{Clause, Expr, ValidateClause};

/// When an authorization rule is evaluated relative to the data mutation.
///
/// `Before` rules observe pre-mutation state and may restrict the matched
/// rows or deny outright; `After` rules observe post-mutation state and can
/// only deny, since filtering rows that were already written is not
/// meaningful.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AuthTiming {
	Before,
	After,
}

/// The authorization rules applied at one point of the tree.
///
/// Filter rules are permissive: any one of them grants visibility, so their
/// predicates are ORed into the `WHERE` position. Validation rules are
/// hard denials: the operation is rejected when *none* of the permitting
/// rules holds, so their predicates are ORed and the disjunction is
/// asserted by a runtime guard embedded in the program.
#[derive(Debug, Default)]
pub struct AuthorizationFilters {
	filter_rules: Vec<Box<dyn Filter>>,
	validation_rules: Vec<(AuthTiming, Box<dyn Filter>)>,
}

impl AuthorizationFilters {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn is_empty(&self) -> bool {
		self.filter_rules.is_empty() && self.validation_rules.is_empty()
	}

	pub fn add_filter_rule(&mut self, rule: Box<dyn Filter>) {
		self.filter_rules.push(rule);
	}

	pub fn add_validation_rule(&mut self, timing: AuthTiming, rule: Box<dyn Filter>) {
		self.validation_rules.push((timing, rule));
	}

	/// The visibility predicate restricting matched rows, if any rules are
	/// present.
	pub fn where_predicate(&self, ctx: &TranslateContext) -> Result<Option<Expr>> {
		let mut predicates = Vec::with_capacity(self.filter_rules.len());
		for rule in &self.filter_rules {
			if let Some(predicate) = rule.predicate(ctx)? {
				predicates.push(predicate);
			}
		}
		Ok(Expr::or_all(predicates))
	}

	/// Supporting clauses of the visibility rules, emitted ahead of the
	/// `WHERE` position that references their bindings.
	pub fn supporting_clauses(&self, ctx: &TranslateContext) -> Result<Vec<Clause>> {
		let mut clauses = Vec::new();
		for rule in &self.filter_rules {
			clauses.extend(rule.clauses(ctx)?);
		}
		Ok(clauses)
	}

	/// The denial guards of the given timing.
	///
	/// The guard asserts that at least one permitting rule holds. A
	/// violation at execution time is not an error of this crate: it fails
	/// the whole enclosing atomic statement, and the store's transactional
	/// rollback is relied upon to undo writes already performed earlier in
	/// the same statement.
	pub fn validation_clauses(
		&self,
		ctx: &TranslateContext,
		when: AuthTiming,
	) -> Result<Vec<Clause>> {
		let mut clauses = Vec::new();
		let mut predicates = Vec::new();
		for (timing, rule) in &self.validation_rules {
			if *timing != when {
				continue;
			}
			clauses.extend(rule.clauses(ctx)?);
			if let Some(predicate) = rule.predicate(ctx)? {
				predicates.push(predicate);
			}
		}
		if let Some(assert) = Expr::or_all(predicates) {
			clauses.push(Clause::Validate(ValidateClause::new(assert, "Forbidden")));
		}
		Ok(clauses)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cypher::Param;
	use crate::translate::{AttachedTo, Comparison, Env, OperationKind, PropertyFilter};
	use crate::val::Value;

	fn rule(attribute: &str) -> Box<dyn Filter> {
		Box::new(PropertyFilter {
			attribute: attribute.into(),
			attached_to: AttachedTo::Node,
			comparison: Comparison::Eq,
			value: Expr::param(&Param::new("jwt0", Value::from("u1"))),
		})
	}

	fn ctx() -> TranslateContext {
		TranslateContext::new(Env {
			top_level_operation: OperationKind::Update,
		})
	}

	#[test]
	fn filter_rules_are_ored() {
		let mut auth = AuthorizationFilters::new();
		auth.add_filter_rule(rule("ownerId"));
		auth.add_filter_rule(rule("editorId"));
		let predicate = auth.where_predicate(&ctx()).unwrap().unwrap();
		assert!(predicate.to_string().contains(" OR "));
	}

	#[test]
	fn validation_rules_become_a_single_guard() {
		let mut auth = AuthorizationFilters::new();
		auth.add_validation_rule(AuthTiming::Before, rule("ownerId"));
		auth.add_validation_rule(AuthTiming::Before, rule("editorId"));
		let clauses = auth.validation_clauses(&ctx(), AuthTiming::Before).unwrap();
		assert_eq!(clauses.len(), 1);
		let text = clauses[0].to_string();
		assert!(text.starts_with("CALL apoc.util.validate(NOT ("), "{text}");
		assert!(text.contains(" OR "), "{text}");
		assert!(auth.validation_clauses(&ctx(), AuthTiming::After).unwrap().is_empty());
	}
}
