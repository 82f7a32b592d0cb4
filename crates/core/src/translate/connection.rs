use anyhow::Result;

use super::authorization::{AuthTiming, AuthorizationFilters};
use super::context::TranslateContext;
use super::filter::{compile_filters, Filter};
use super::operation::{Operation, Transpiled};
use super::read::{ProjectionField, ReadOperation};
use super::selection::SelectionPattern;
use super::AttachedTo;
use crate::cypher::{
	BinaryOp, CallClause, Clause, Cond, Expr, MatchClause, OrderBy, OrderDirection, Param,
	Projection, ReturnClause, UnwindClause, Var, WithClause,
};

/// One requested sort field of a connection, attached to either the node or
/// the edge.
#[derive(Clone, Debug)]
pub struct SortField {
	pub attribute: String,
	pub attached_to: AttachedTo,
	pub direction: OrderDirection,
}

/// Paging bounds applied after sorting.
#[derive(Clone, Debug, Default)]
pub struct Pagination {
	pub skip: Option<Param>,
	pub limit: Option<Param>,
}

impl Pagination {
	pub fn is_some(&self) -> bool {
		self.skip.is_some() || self.limit.is_some()
	}
}

/// One aggregation operator over an attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateOp {
	Min,
	Max,
	Sum,
	Avg,
}

impl AggregateOp {
	fn function(self) -> &'static str {
		match self {
			AggregateOp::Min => "min",
			AggregateOp::Max => "max",
			AggregateOp::Sum => "sum",
			AggregateOp::Avg => "avg",
		}
	}
}

/// The aggregation selections of a connection request.
#[derive(Clone, Debug, Default)]
pub struct AggregationSelection {
	pub count: bool,
	/// `(attribute, operator, response alias)` triples.
	pub fields: Vec<(String, AggregateOp, String)>,
}

impl AggregationSelection {
	pub fn is_empty(&self) -> bool {
		!self.count && self.fields.is_empty()
	}
}

/// Reads a paginated connection of `(node, relationship)` edges.
///
/// The lowering decides its shape in a fixed order: resolve the requested
/// selections; decide whether edges need materializing at all; short-circuit
/// aggregate-only requests past the whole pagination pipeline; otherwise
/// filter, collect, and - only when projecting - unwind, sort, page and
/// re-collect. Aggregation always runs in its own subquery scope so it
/// cannot disturb the per-edge pipeline.
#[derive(Debug)]
pub struct ConnectionReadOperation {
	entity: String,
	response_key: String,
	selection: SelectionPattern,
	filters: Vec<Box<dyn Filter>>,
	authorization: AuthorizationFilters,
	node_fields: Vec<ProjectionField>,
	edge_fields: Vec<ProjectionField>,
	/// Nested node reads projected per edge, after pagination.
	nested: Vec<ReadOperation>,
	/// Computed-field subqueries whose values must exist before the sort
	/// and limit can apply.
	pre_subqueries: Vec<ReadOperation>,
	aggregation: Option<AggregationSelection>,
	sort: Vec<SortField>,
	pagination: Pagination,
	include_total_count: bool,
	include_page_info: bool,
}

impl ConnectionReadOperation {
	pub fn new(entity: impl Into<String>, selection: SelectionPattern) -> Self {
		let entity = entity.into();
		Self {
			response_key: entity.clone(),
			entity,
			selection,
			filters: Vec::new(),
			authorization: AuthorizationFilters::new(),
			node_fields: Vec::new(),
			edge_fields: Vec::new(),
			nested: Vec::new(),
			pre_subqueries: Vec::new(),
			aggregation: None,
			sort: Vec::new(),
			pagination: Pagination::default(),
			include_total_count: false,
			include_page_info: false,
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

	pub fn with_node_fields(mut self, fields: Vec<ProjectionField>) -> Self {
		self.node_fields = fields;
		self
	}

	pub fn with_edge_fields(mut self, fields: Vec<ProjectionField>) -> Self {
		self.edge_fields = fields;
		self
	}

	pub fn with_nested(mut self, nested: Vec<ReadOperation>) -> Self {
		self.nested = nested;
		self
	}

	pub fn with_pre_subqueries(mut self, pre: Vec<ReadOperation>) -> Self {
		self.pre_subqueries = pre;
		self
	}

	pub fn with_aggregation(mut self, aggregation: AggregationSelection) -> Self {
		self.aggregation = Some(aggregation);
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

	pub fn with_total_count(mut self) -> Self {
		self.include_total_count = true;
		self
	}

	pub fn with_page_info(mut self) -> Self {
		self.include_page_info = true;
		self
	}

	pub fn response_key(&self) -> &str {
		&self.response_key
	}

	/// Whether the edges list needs materializing at all. Count- and
	/// aggregate-only requests skip it entirely.
	pub fn should_project_edges(&self) -> bool {
		!self.node_fields.is_empty()
			|| !self.edge_fields.is_empty()
			|| !self.nested.is_empty()
			|| self.include_page_info
	}

	/// Whether the request is aggregate-only and the connection shape can be
	/// bypassed entirely.
	fn skip_connection(&self) -> bool {
		self.aggregation.is_some() && !self.should_project_edges() && !self.include_total_count
	}

	/// The aggregation subquery, isolated in its own scope, plus the
	/// projection entries it binds.
	fn aggregation_subquery(
		&self,
		ctx: &TranslateContext,
		aggregation: &AggregationSelection,
	) -> Result<(Clause, Vec<(String, Expr)>)> {
		let (pattern, scoped) = self.selection.apply(ctx)?;
		let (_, filter_pred) = compile_filters(&self.filters, &scoped)?;
		let auth_pred = self.authorization.where_predicate(&scoped)?;
		let cond = Expr::and_all(filter_pred.into_iter().chain(auth_pred));

		let mut body = vec![Clause::Match(MatchClause::new(pattern).with_cond(cond))];
		let mut items = Vec::new();
		let mut entries = Vec::new();
		if aggregation.count {
			let var = scoped.fresh_var("var");
			items.push(Projection::aliased(
				Expr::func("count", vec![Expr::Var(scoped.target().clone())]),
				var.clone(),
			));
			entries.push(("count".to_owned(), Expr::Var(var)));
		}
		for (attribute, op, alias) in &aggregation.fields {
			let var = scoped.fresh_var("var");
			items.push(Projection::aliased(
				Expr::func(op.function(), vec![Expr::prop(scoped.target(), attribute.clone())]),
				var.clone(),
			));
			entries.push((alias.clone(), Expr::Var(var)));
		}
		body.push(Clause::Return(ReturnClause::new(items)));

		let imports = if self.selection.is_relationship() {
			vec![ctx.target().clone()]
		} else {
			Vec::new()
		};
		Ok((Clause::Call(CallClause::new(imports, body)), entries))
	}

	fn edge_pair_expr(&self, scoped: &TranslateContext) -> Expr {
		let mut entries = vec![("node".to_owned(), Expr::Var(scoped.target().clone()))];
		if let Ok(rel) = scoped.relationship() {
			entries.push(("relationship".to_owned(), Expr::Var(rel.clone())));
		}
		Expr::Map(entries)
	}

	/// The merged sort fields, node-first then edge, as ordering
	/// expressions over the unwound bindings.
	fn order_by(&self, node: &Var, rel: Option<&Var>) -> Result<OrderBy> {
		let mut fields = Vec::with_capacity(self.sort.len());
		for sort in self.sort.iter().filter(|s| s.attached_to == AttachedTo::Node) {
			fields.push((Expr::prop(node, sort.attribute.clone()), sort.direction));
		}
		if let Some(rel) = rel {
			for sort in self.sort.iter().filter(|s| s.attached_to == AttachedTo::Relationship) {
				fields.push((Expr::prop(rel, sort.attribute.clone()), sort.direction));
			}
		}
		Ok(OrderBy {
			fields,
		})
	}
}

impl Operation for ConnectionReadOperation {
	fn name(&self) -> &'static str {
		"ConnectionReadOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.pre_subqueries
			.iter()
			.chain(&self.nested)
			.map(|op| op as &dyn Operation)
			.collect()
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		// Aggregate-only requests bypass the connection shape entirely.
		if self.skip_connection() {
			let aggregation = self.aggregation.as_ref().expect("skip_connection checked");
			let (clause, entries) = self.aggregation_subquery(ctx, aggregation)?;
			return Ok(Transpiled::new(
				vec![clause],
				Expr::Map(vec![("aggregate".to_owned(), Expr::Map(entries))]),
			));
		}

		let (pattern, scoped) = self.selection.apply(ctx)?;
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
			let mut carried = vec![scoped.target().clone()];
			if let Ok(rel) = scoped.relationship() {
				carried.push(rel.clone());
			}
			let mut with = WithClause::vars(carried);
			with.cond = cond.map(Cond);
			clauses.push(Clause::With(with));
		}

		clauses.extend(self.authorization.validation_clauses(&scoped, AuthTiming::Before)?);

		// Collect the matched (node, relationship) pairs.
		let edges = scoped.fresh_var("edges");
		clauses.push(Clause::With(WithClause::new(vec![Projection::aliased(
			Expr::func("collect", vec![self.edge_pair_expr(&scoped)]),
			edges.clone(),
		)])));

		let total = if self.include_total_count || self.include_page_info {
			let total = scoped.fresh_var("total");
			clauses.push(Clause::With(WithClause::new(vec![
				Projection::new(Expr::Var(edges.clone())),
				Projection::aliased(Expr::func("size", vec![Expr::Var(edges.clone())]), total.clone()),
			])));
			Some(total)
		} else {
			None
		};

		let mut projection_entries = Vec::new();

		if self.should_project_edges() {
			let edge = scoped.fresh_var("edge");
			let node = scoped.fresh_var("this");
			let rel = self.selection.is_relationship().then(|| scoped.fresh_var("rel"));

			clauses.push(Clause::Unwind(UnwindClause {
				list: Expr::Var(edges.clone()),
				alias: edge.clone(),
			}));
			let mut rebound = vec![Projection::aliased(Expr::prop(&edge, "node"), node.clone())];
			if let Some(ref rel) = rel {
				rebound.push(Projection::aliased(Expr::prop(&edge, "relationship"), rel.clone()));
			}
			if let Some(ref total) = total {
				rebound.push(Projection::new(Expr::Var(total.clone())));
			}
			clauses.push(Clause::With(WithClause::new(rebound)));

			let node_scope = scoped.rebind(node.clone());

			// Values the sort needs must exist before the limit applies.
			let mut pre_vars = Vec::new();
			for pre in &self.pre_subqueries {
				let transpiled = pre.transpile(&node_scope)?;
				let var = scoped.fresh_var("var");
				let mut body = transpiled.clauses;
				body.push(Clause::Return(ReturnClause::new(vec![Projection::aliased(
					Expr::func("collect", vec![transpiled.projection]),
					var.clone(),
				)])));
				clauses.push(Clause::Call(CallClause::new(vec![node.clone()], body)));
				pre_vars.push((pre.response_key().to_owned(), var));
			}

			if !self.sort.is_empty() || self.pagination.is_some() {
				let mut items = vec![Projection::new(Expr::Var(node.clone()))];
				if let Some(ref rel) = rel {
					items.push(Projection::new(Expr::Var(rel.clone())));
				}
				if let Some(ref total) = total {
					items.push(Projection::new(Expr::Var(total.clone())));
				}
				for (_, var) in &pre_vars {
					items.push(Projection::new(Expr::Var(var.clone())));
				}
				let mut with = WithClause::new(items);
				if !self.sort.is_empty() {
					with.order = Some(self.order_by(&node, rel.as_ref())?);
				}
				with.skip = self.pagination.skip.as_ref().map(Expr::param);
				with.limit = self.pagination.limit.as_ref().map(Expr::param);
				clauses.push(Clause::With(with));
			}

			let mut nested_vars = Vec::new();
			for child in &self.nested {
				let transpiled = child.transpile(&node_scope)?;
				let var = scoped.fresh_var("var");
				let mut collected = Expr::func("collect", vec![transpiled.projection]);
				if child.is_single() {
					collected = Expr::func("head", vec![collected]);
				}
				let mut body = transpiled.clauses;
				body.push(Clause::Return(ReturnClause::new(vec![Projection::aliased(
					collected,
					var.clone(),
				)])));
				clauses.push(Clause::Call(CallClause::new(vec![node.clone()], body)));
				nested_vars.push((child.response_key().to_owned(), var));
			}

			// Re-collect the paged rows into the edge projection.
			let mut node_entries: Vec<(String, Expr)> = self
				.node_fields
				.iter()
				.map(|field| (field.alias.clone(), Expr::prop(&node, field.name.clone())))
				.collect();
			for (key, var) in pre_vars.iter().chain(&nested_vars) {
				node_entries.push((key.clone(), Expr::Var(var.clone())));
			}
			let mut edge_entries = vec![(
				"node".to_owned(),
				if node_entries.is_empty() {
					Expr::Var(node.clone())
				} else {
					Expr::Map(node_entries)
				},
			)];
			if let Some(ref rel) = rel {
				for field in &self.edge_fields {
					edge_entries
						.push((field.alias.clone(), Expr::prop(rel, field.name.clone())));
				}
			}

			let edges_out = scoped.fresh_var("edges");
			let mut recollect = vec![Projection::aliased(
				Expr::func("collect", vec![Expr::Map(edge_entries)]),
				edges_out.clone(),
			)];
			if let Some(ref total) = total {
				recollect.push(Projection::new(Expr::Var(total.clone())));
			}
			clauses.push(Clause::With(WithClause::new(recollect)));

			projection_entries.push(("edges".to_owned(), Expr::Var(edges_out.clone())));
			if self.include_page_info {
				let total = total.clone().expect("page info implies a total");
				let skip = self
					.pagination
					.skip
					.as_ref()
					.map(Expr::param)
					.unwrap_or_else(|| Expr::int(0));
				let has_next = Expr::binary(
					Expr::binary(skip, BinaryOp::Add, Expr::func("size", vec![Expr::Var(edges_out)])),
					BinaryOp::Lt,
					Expr::Var(total),
				);
				projection_entries
					.push(("pageInfo".to_owned(), Expr::Map(vec![("hasNextPage".to_owned(), has_next)])));
			}
		}

		if self.include_total_count {
			let total = total.clone().expect("total count requested");
			projection_entries.push(("totalCount".to_owned(), Expr::Var(total)));
		}

		if let Some(ref aggregation) = self.aggregation {
			let (clause, entries) = self.aggregation_subquery(ctx, aggregation)?;
			clauses.push(clause);
			projection_entries.push(("aggregate".to_owned(), Expr::Map(entries)));
		}

		Ok(Transpiled::new(clauses, Expr::Map(projection_entries)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::translate::{Env, NodeSelection, OperationKind};

	fn ctx() -> TranslateContext {
		TranslateContext::new(Env {
			top_level_operation: OperationKind::Read,
		})
	}

	fn connection() -> ConnectionReadOperation {
		ConnectionReadOperation::new(
			"Movie",
			SelectionPattern::Node(NodeSelection::new(vec!["Movie".into()])),
		)
	}

	#[test]
	fn total_count_only_skips_edge_projection() {
		let op = connection().with_total_count();
		assert!(!op.should_project_edges());
		let transpiled = op.transpile(&ctx()).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		assert!(!text.contains("UNWIND"), "{text}");
		assert!(text.contains("size("), "{text}");
		assert!(transpiled.projection.to_string().contains("totalCount"));
	}

	#[test]
	fn node_fields_force_edge_projection() {
		let op = connection()
			.with_node_fields(vec![ProjectionField::new("title")])
			.with_total_count();
		assert!(op.should_project_edges());
		let transpiled = op.transpile(&ctx()).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		assert!(text.contains("UNWIND"), "{text}");
	}

	#[test]
	fn aggregate_only_request_short_circuits() {
		let op = connection().with_aggregation(AggregationSelection {
			count: true,
			fields: Vec::new(),
		});
		let transpiled = op.transpile(&ctx()).unwrap();
		assert_eq!(transpiled.clauses.len(), 1);
		let text = transpiled.clauses[0].to_string();
		assert!(text.starts_with("CALL {"), "{text}");
		assert!(text.contains("count("), "{text}");
		assert!(!text.contains("UNWIND"), "{text}");
	}

	#[test]
	fn sort_merges_node_fields_before_edge_fields() {
		use crate::catalog::{Cardinality, Direction};
		use crate::translate::RelationshipSelection;
		let op = ConnectionReadOperation::new(
			"Actor",
			SelectionPattern::Relationship(RelationshipSelection {
				rel_type: "ACTED_IN".into(),
				direction: Direction::In,
				target_labels: vec!["Actor".into()],
				cardinality: Cardinality::Many,
			}),
		)
		.with_node_fields(vec![ProjectionField::new("name")])
		.with_sort(vec![
			SortField {
				attribute: "role".into(),
				attached_to: AttachedTo::Relationship,
				direction: OrderDirection::Ascending,
			},
			SortField {
				attribute: "name".into(),
				attached_to: AttachedTo::Node,
				direction: OrderDirection::Descending,
			},
		]);
		let transpiled = op.transpile(&ctx()).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		let order_at = text.find("ORDER BY").unwrap();
		let ordered = &text[order_at..];
		let name_at = ordered.find(".name DESC").unwrap();
		let role_at = ordered.find(".role").unwrap();
		assert!(name_at < role_at, "{ordered}");
	}
}
