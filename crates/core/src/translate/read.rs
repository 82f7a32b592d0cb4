use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::connection::{Pagination, SortField};
use super::context::TranslateContext;
use super::filter::{compile_filters, Filter};
use super::operation::{Operation, Transpiled};
use super::selection::SelectionPattern;
use super::AttachedTo;
use crate::catalog::Cardinality;
use crate::cypher::{
	CallClause, Clause, Cond, Expr, MatchClause, OrderBy, OrderDirection, Projection, ReturnClause,
	Var, WithClause,
};

/// One projected attribute of a read.
#[derive(Clone, Debug)]
pub struct ProjectionField {
	pub name: String,
	pub alias: String,
}

impl ProjectionField {
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			alias: name.clone(),
			name,
		}
	}

	pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			alias: alias.into(),
		}
	}
}

/// Reads entities through a selection pattern, with filters, authorization,
/// nested relationship reads, sorting and paging.
#[derive(Debug)]
pub struct ReadOperation {
	entity: String,
	response_key: String,
	selection: SelectionPattern,
	filters: Vec<Box<dyn Filter>>,
	authorization: AuthorizationFilters,
	fields: Vec<ProjectionField>,
	nested: Vec<ReadOperation>,
	sort: Vec<SortField>,
	pagination: Pagination,
}

impl ReadOperation {
	pub fn new(entity: impl Into<String>, selection: SelectionPattern) -> Self {
		let entity = entity.into();
		Self {
			response_key: entity.clone(),
			entity,
			selection,
			filters: Vec::new(),
			authorization: AuthorizationFilters::new(),
			fields: Vec::new(),
			nested: Vec::new(),
			sort: Vec::new(),
			pagination: Pagination::default(),
		}
	}

	pub fn with_response_key(mut self, key: impl Into<String>) -> Self {
		self.response_key = key.into();
		self
	}

	pub fn with_filters(mut self, filters: Vec<Box<dyn Filter>>) -> Self {
		self.filters = filters;
		self
	}

	pub fn with_authorization(mut self, authorization: AuthorizationFilters) -> Self {
		self.authorization = authorization;
		self
	}

	pub fn with_fields(mut self, fields: Vec<ProjectionField>) -> Self {
		self.fields = fields;
		self
	}

	pub fn with_nested(mut self, nested: Vec<ReadOperation>) -> Self {
		self.nested = nested;
		self
	}

	pub fn with_sort(mut self, sort: Vec<SortField>) -> Self {
		self.sort = sort;
		self
	}

	pub fn with_pagination(mut self, pagination: Pagination) -> Self {
		self.pagination = pagination;
		self
	}

	pub fn response_key(&self) -> &str {
		&self.response_key
	}

	/// Whether a parent projecting this read should take a single value
	/// instead of a collected list.
	pub fn is_single(&self) -> bool {
		matches!(self.selection.cardinality(), Some(Cardinality::One))
	}

	/// The projection map over the scoped target, including nested
	/// subquery bindings.
	fn projection_expr(&self, scoped: &TranslateContext, nested: &[(String, Var)]) -> Expr {
		let mut entries: Vec<(String, Expr)> = self
			.fields
			.iter()
			.map(|field| (field.alias.clone(), Expr::prop(scoped.target(), field.name.clone())))
			.collect();
		for (key, var) in nested {
			entries.push((key.clone(), Expr::Var(var.clone())));
		}
		if entries.is_empty() {
			Expr::Var(scoped.target().clone())
		} else {
			Expr::Map(entries)
		}
	}
}

impl Operation for ReadOperation {
	fn name(&self) -> &'static str {
		"ReadOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.nested.iter().map(|op| op as &dyn Operation).collect()
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let (pattern, scoped) = self.selection.apply(ctx)?;

		let mut clauses = Vec::new();
		let (filter_clauses, filter_pred) = compile_filters(&self.filters, &scoped)?;
		let auth_clauses = self.authorization.supporting_clauses(&scoped)?;
		let auth_pred = self.authorization.where_predicate(&scoped)?;
		let cond = Expr::and_all(filter_pred.into_iter().chain(auth_pred));

		if filter_clauses.is_empty() && auth_clauses.is_empty() {
			clauses.push(Clause::Match(MatchClause::new(pattern).with_cond(cond)));
		} else {
			// Supporting clauses must precede the predicate that references
			// their bindings, so the predicate moves into a WITH.
			clauses.push(Clause::Match(MatchClause::new(pattern)));
			clauses.extend(filter_clauses);
			clauses.extend(auth_clauses);
			let mut with = WithClause::vars([scoped.target().clone()]);
			with.cond = cond.map(Cond);
			clauses.push(Clause::With(with));
		}

		clauses.extend(self.authorization.validation_clauses(&scoped, AuthTiming::Before)?);

		let mut nested_vars = Vec::with_capacity(self.nested.len());
		for child in &self.nested {
			let transpiled = child.transpile(&scoped)?;
			let child_var = scoped.fresh_var("var");
			let mut collected = Expr::func("collect", vec![transpiled.projection]);
			if child.is_single() {
				collected = Expr::func("head", vec![collected]);
			}
			let mut body = transpiled.clauses;
			body.push(Clause::Return(ReturnClause::new(vec![Projection::aliased(
				collected,
				child_var.clone(),
			)])));
			clauses.push(Clause::Call(CallClause::new(vec![scoped.target().clone()], body)));
			nested_vars.push((child.response_key.clone(), child_var));
		}

		if !self.sort.is_empty() || self.pagination.is_some() {
			let mut items = vec![Projection::new(Expr::Var(scoped.target().clone()))];
			for (_, var) in &nested_vars {
				items.push(Projection::new(Expr::Var(var.clone())));
			}
			let mut with = WithClause::new(items);
			if !self.sort.is_empty() {
				let mut fields: Vec<(Expr, OrderDirection)> = Vec::with_capacity(self.sort.len());
				for field in &self.sort {
					fields.push((field.order_expr(&scoped)?, field.direction));
				}
				with.order = Some(OrderBy {
					fields,
				});
			}
			with.skip = self.pagination.skip.as_ref().map(Expr::param);
			with.limit = self.pagination.limit.as_ref().map(Expr::param);
			clauses.push(Clause::With(with));
		}

		let projection = self.projection_expr(&scoped, &nested_vars);
		Ok(Transpiled::new(clauses, projection))
	}
}

impl SortField {
	/// The ordering expression of this sort field under the given scope.
	fn order_expr(&self, scoped: &TranslateContext) -> Result<Expr> {
		let target = match self.attached_to {
			AttachedTo::Node => scoped.target().clone(),
			AttachedTo::Relationship => scoped.relationship()?.clone(),
		};
		Ok(Expr::prop(&target, self.attribute.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translate::{Env, NodeSelection, OperationKind};

	#[test]
	fn plain_read_lowers_to_match_and_projection() {
		let op = ReadOperation::new(
			"Movie",
			SelectionPattern::Node(NodeSelection::new(vec!["Movie".into()])),
		)
		.with_fields(vec![ProjectionField::new("title")]);
		let ctx = TranslateContext::new(Env {
			top_level_operation: OperationKind::Read,
		});
		let transpiled = op.transpile(&ctx).unwrap();
		assert_eq!(transpiled.clauses.len(), 1);
		assert!(transpiled.clauses[0].to_string().starts_with("MATCH ("));
		assert!(transpiled.projection.to_string().contains("title:"));
	}
}
