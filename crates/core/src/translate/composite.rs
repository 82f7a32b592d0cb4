use anyhow::Result;

use super::authorization::AuthTiming;
use super::callbacks::CallbackBucket;
use super::connect::ConnectOperation;
use super::context::TranslateContext;
use super::disconnect::DisconnectOperation;
use super::operation::{MutationOperation, Operation, Transpiled};
use super::read::ProjectionField;
use crate::cypher::{
	BinaryOp, CallClause, Clause, Expr, Projection, ReturnClause, UnionClause, Var,
};

/// Build the projection expression of a wrapper over one bound variable.
fn projection_over(var: &Var, fields: &[ProjectionField]) -> Expr {
	if fields.is_empty() {
		Expr::Var(var.clone())
	} else {
		Expr::Map(
			fields
				.iter()
				.map(|field| (field.alias.clone(), Expr::prop(var, field.name.clone())))
				.collect(),
		)
	}
}

/// Fans a connect out over the concrete entities of a union or interface
/// target.
///
/// Every partial is transpiled independently against the same incoming
/// context, in the catalog's concrete-entity enumeration order, and the
/// resulting clause sequences concatenate.
#[derive(Debug)]
pub struct CompositeConnectOperation {
	entity: String,
	partials: Vec<ConnectOperation>,
}

impl CompositeConnectOperation {
	pub fn new(entity: impl Into<String>, partials: Vec<ConnectOperation>) -> Self {
		Self {
			entity: entity.into(),
			partials,
		}
	}

	pub fn partials(&self) -> &[ConnectOperation] {
		&self.partials
	}
}

impl Operation for CompositeConnectOperation {
	fn name(&self) -> &'static str {
		"CompositeConnectOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.partials.iter().map(|op| op as &dyn Operation).collect()
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		for partial in &self.partials {
			partial.register_callbacks(bucket);
		}
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let mut clauses = Vec::new();
		let mut projections = Vec::with_capacity(self.partials.len());
		for partial in &self.partials {
			let transpiled = partial.transpile(ctx)?;
			clauses.extend(transpiled.clauses);
			projections.push(transpiled.projection);
		}
		Ok(Transpiled::new(clauses, Expr::List(projections)))
	}
}

impl MutationOperation for CompositeConnectOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		let mut clauses = Vec::new();
		for partial in &self.partials {
			clauses.extend(partial.authorization_clauses(when)?);
		}
		Ok(clauses)
	}
}

/// Fans a disconnect out over the concrete entities of a union or
/// interface target.
#[derive(Debug)]
pub struct CompositeDisconnectOperation {
	entity: String,
	partials: Vec<DisconnectOperation>,
}

impl CompositeDisconnectOperation {
	pub fn new(entity: impl Into<String>, partials: Vec<DisconnectOperation>) -> Self {
		Self {
			entity: entity.into(),
			partials,
		}
	}

	pub fn partials(&self) -> &[DisconnectOperation] {
		&self.partials
	}
}

impl Operation for CompositeDisconnectOperation {
	fn name(&self) -> &'static str {
		"CompositeDisconnectOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.partials.iter().map(|op| op as &dyn Operation).collect()
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let mut clauses = Vec::new();
		let mut projections = Vec::with_capacity(self.partials.len());
		for partial in &self.partials {
			let transpiled = partial.transpile(ctx)?;
			clauses.extend(transpiled.clauses);
			projections.push(transpiled.projection);
		}
		Ok(Transpiled::new(clauses, Expr::List(projections)))
	}
}

impl MutationOperation for CompositeDisconnectOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		let mut clauses = Vec::new();
		for partial in &self.partials {
			clauses.extend(partial.authorization_clauses(when)?);
		}
		Ok(clauses)
	}
}

/// The top-level create statement: one partial per concrete target entity,
/// combined through a union of subqueries under one shared projection.
///
/// Each branch carries its own writes and extracted AFTER guards; the union
/// binds every branch's created instance to one common variable the shared
/// projection reads from.
#[derive(Debug)]
pub struct TopLevelCreateMutationOperation {
	entity: String,
	creates: Vec<Box<dyn MutationOperation>>,
	projection_fields: Vec<ProjectionField>,
}

impl TopLevelCreateMutationOperation {
	pub fn new(entity: impl Into<String>, creates: Vec<Box<dyn MutationOperation>>) -> Self {
		Self {
			entity: entity.into(),
			creates,
			projection_fields: Vec::new(),
		}
	}

	pub fn with_projection_fields(mut self, fields: Vec<ProjectionField>) -> Self {
		self.projection_fields = fields;
		self
	}
}

impl Operation for TopLevelCreateMutationOperation {
	fn name(&self) -> &'static str {
		"TopLevelCreateMutationOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.creates.iter().map(|op| &**op as &dyn Operation).collect()
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		for create in &self.creates {
			create.register_callbacks(bucket);
		}
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let common = ctx.fresh_var("this");
		let mut branches = Vec::with_capacity(self.creates.len());
		for create in &self.creates {
			let transpiled = create.transpile(ctx)?;
			let mut body = transpiled.clauses;
			body.extend(create.authorization_clauses(AuthTiming::After)?);
			body.push(Clause::Return(ReturnClause::new(vec![Projection::aliased(
				transpiled.projection,
				common.clone(),
			)])));
			branches.push(body);
		}
		let clauses = vec![Clause::Union(UnionClause {
			imports: Vec::new(),
			branches,
		})];
		Ok(Transpiled::new(clauses, projection_over(&common, &self.projection_fields)))
	}
}

impl MutationOperation for TopLevelCreateMutationOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		let mut clauses = Vec::new();
		for create in &self.creates {
			clauses.extend(create.authorization_clauses(when)?);
		}
		Ok(clauses)
	}
}

/// The top-level update statement: one partial per concrete target entity,
/// transpiled against the same incoming context and concatenated as
/// subqueries ahead of one shared projection.
#[derive(Debug)]
pub struct TopLevelUpdateMutationOperation {
	entity: String,
	updates: Vec<Box<dyn MutationOperation>>,
	projection_fields: Vec<ProjectionField>,
}

impl TopLevelUpdateMutationOperation {
	pub fn new(entity: impl Into<String>, updates: Vec<Box<dyn MutationOperation>>) -> Self {
		Self {
			entity: entity.into(),
			updates,
			projection_fields: Vec::new(),
		}
	}

	pub fn with_projection_fields(mut self, fields: Vec<ProjectionField>) -> Self {
		self.projection_fields = fields;
		self
	}
}

impl Operation for TopLevelUpdateMutationOperation {
	fn name(&self) -> &'static str {
		"TopLevelUpdateMutationOperation"
	}

	fn entity_name(&self) -> Option<&str> {
		Some(&self.entity)
	}

	fn children(&self) -> Vec<&dyn Operation> {
		self.updates.iter().map(|op| &**op as &dyn Operation).collect()
	}

	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		for update in &self.updates {
			update.register_callbacks(bucket);
		}
	}

	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled> {
		let mut clauses = Vec::new();
		let mut collected = Vec::with_capacity(self.updates.len());
		for update in &self.updates {
			let transpiled = update.transpile(ctx)?;
			let projected = match transpiled.projection {
				Expr::Var(ref var) => projection_over(var, &self.projection_fields),
				other => other,
			};
			let var = ctx.fresh_var("var");
			let mut body = transpiled.clauses;
			body.extend(update.authorization_clauses(AuthTiming::After)?);
			body.push(Clause::Return(ReturnClause::new(vec![Projection::aliased(
				Expr::func("collect", vec![projected]),
				var.clone(),
			)])));
			clauses.push(Clause::Call(CallClause::new(Vec::new(), body)));
			collected.push(Expr::Var(var));
		}
		let projection = collected
			.into_iter()
			.reduce(|acc, list| Expr::binary(acc, BinaryOp::Add, list))
			.unwrap_or(Expr::List(Vec::new()));
		Ok(Transpiled::new(clauses, projection))
	}
}

impl MutationOperation for TopLevelUpdateMutationOperation {
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>> {
		let mut clauses = Vec::new();
		for update in &self.updates {
			clauses.extend(update.authorization_clauses(when)?);
		}
		Ok(clauses)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::Direction;
	use crate::translate::{Env, OperationKind};

	fn ctx() -> TranslateContext {
		TranslateContext::new(Env {
			top_level_operation: OperationKind::Update,
		})
	}

	#[test]
	fn composite_connect_fans_out_in_member_order() {
		let partials = vec![
			ConnectOperation::new("Book", vec!["Book".into()], "AUTHORED", Direction::Out),
			ConnectOperation::new("Film", vec!["Film".into()], "AUTHORED", Direction::Out),
			ConnectOperation::new("Song", vec!["Song".into()], "AUTHORED", Direction::Out),
		];
		let op = CompositeConnectOperation::new("Work", partials);
		let transpiled = op.transpile(&ctx()).unwrap();
		let text = transpiled
			.clauses
			.iter()
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join("\n");
		let book = text.find(":Book)").unwrap();
		let film = text.find(":Film)").unwrap();
		let song = text.find(":Song)").unwrap();
		assert!(book < film && film < song, "{text}");
		// One MATCH + MERGE pair per member, independently transpiled.
		assert_eq!(text.matches("MERGE").count(), 3, "{text}");
		// The authorization lists concatenate in the same order.
		assert!(op.authorization_clauses(AuthTiming::After).unwrap().is_empty());
	}

	#[test]
	fn top_level_create_unions_its_partials() {
		use crate::translate::CreateOperation;
		let creates: Vec<Box<dyn MutationOperation>> = vec![
			Box::new(CreateOperation::new("Movie", vec!["Movie".into()])),
			Box::new(CreateOperation::new("Series", vec!["Series".into()])),
		];
		let op = TopLevelCreateMutationOperation::new("Production", creates);
		let transpiled = op.transpile(&ctx()).unwrap();
		assert_eq!(transpiled.clauses.len(), 1);
		let text = transpiled.clauses[0].to_string();
		assert_eq!(text.matches("UNION").count(), 1, "{text}");
		assert_eq!(text.matches("CREATE").count(), 2, "{text}");
	}
}
