//! The operation-tree model and its lowering algorithm.
//!
//! A request is compiled in two phases with one barrier between them. Phase
//! one is synchronous: the factory builds an operation tree from the resolve
//! tree and the catalog, and the tree is walked once to register computed-
//! value callbacks into a [`CallbackBucket`]. The barrier resolves every
//! registered callback concurrently and writes the coerced results into
//! their reserved parameter placeholders. Phase two is synchronous again:
//! the tree is lowered top-down through [`Operation::transpile`], each node
//! deriving a freshly scoped context for its children, and the resulting
//! clause sequences concatenate in a fixed relative order into a
//! [`Program`].
//!
//! Runtime authorization denials are not errors of this module: they are
//! compiled into the program as assertion clauses. A violated assertion
//! fails the whole atomic statement at execution time, and the store's
//! transactional rollback is relied upon to undo earlier writes, including
//! writes performed in sibling branches of a composite operation.

mod authorization;
mod callbacks;
mod composite;
mod connect;
mod connection;
mod context;
mod create;
mod disconnect;
mod factory;
mod filter;
mod input_field;
mod operation;
mod read;
mod selection;
mod unwind_create;
mod update;

pub use authorization::{AuthTiming, AuthorizationFilters};
pub use callbacks::{
	CallbackBucket, CallbackEntry, CallbackRegistry, MutationKind, TypeShape,
};
pub use composite::{
	CompositeConnectOperation, CompositeDisconnectOperation, TopLevelCreateMutationOperation,
	TopLevelUpdateMutationOperation,
};
pub use connect::ConnectOperation;
pub use connection::{
	AggregateOp, AggregationSelection, ConnectionReadOperation, Pagination, SortField,
};
pub use context::{Env, OperationKind, ParamAllocator, TranslateContext};
pub use create::{CreateOperation, EdgeTarget};
pub use disconnect::DisconnectOperation;
pub use factory::OperationFactory;
pub use filter::{Comparison, Filter, LogicalFilter, LogicalOp, PropertyFilter};
pub use input_field::{
	FieldCallback, InputField, MathInputField, MathOperation, ParamInputField, PopInputField,
	PropertyInputField,
};
pub use operation::{print, MutationOperation, Operation, Transpiled};
pub use read::{ProjectionField, ReadOperation};
pub use selection::{NodeSelection, RelationshipSelection, SelectionPattern};
pub use unwind_create::UnwindCreateOperation;
pub use update::UpdateOperation;

use anyhow::Result;

use crate::cypher::{Clause, Program, Projection, ReturnClause, Var};

/// Which side of a relationship an input or filter is attached to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttachedTo {
	Node,
	Relationship,
}

/// Compile one top-level operation into an executable program.
///
/// This is the full pipeline: callback registration, the asynchronous
/// resolution barrier, and the synchronous lowering pass. The barrier is the
/// only suspension point; lowering never begins before every callback has
/// written its value.
pub async fn translate(
	operation: &dyn Operation,
	kind: OperationKind,
	registry: &CallbackRegistry,
) -> Result<Program> {
	let mut bucket = CallbackBucket::new();
	operation.register_callbacks(&mut bucket);
	debug!("registered {} callbacks for {}", bucket.len(), operation.name());
	bucket.resolve(registry).await?;
	transpile_to_program(operation, kind)
}

/// Lower an operation tree whose callbacks are already resolved.
pub fn transpile_to_program(operation: &dyn Operation, kind: OperationKind) -> Result<Program> {
	let ctx = TranslateContext::new(Env {
		top_level_operation: kind,
	});
	let Transpiled {
		mut clauses,
		projection,
	} = operation.transpile(&ctx)?;
	trace!("lowered {} into {} clauses", operation.name(), clauses.len());
	clauses.push(Clause::Return(ReturnClause::new(vec![Projection::aliased(
		projection,
		Var::new("this"),
	)])));
	Ok(Program::new(clauses))
}
