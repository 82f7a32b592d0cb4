use std::fmt::Debug;
use std::fmt::Write;

use anyhow::Result;

use super::authorization::AuthTiming;
use super::callbacks::CallbackBucket;
use super::context::TranslateContext;
use crate::cypher::{Clause, Expr};

/// The result of lowering one operation node.
#[derive(Clone, Debug)]
pub struct Transpiled {
	/// The clause sequence of this subtree, in emission order.
	pub clauses: Vec<Clause>,
	/// The expression a parent projects this subtree through.
	pub projection: Expr,
}

impl Transpiled {
	pub fn new(clauses: Vec<Clause>, projection: Expr) -> Self {
		Self {
			clauses,
			projection,
		}
	}
}

/// A node of the operation tree.
///
/// Nodes own their children exclusively; the tree is a tree, never a DAG.
/// `transpile` is a pure function of the subtree and the supplied context:
/// it must not observe ancestor state, and repeated calls with equivalent
/// inputs are deterministic. Child scopes are derived exclusively through
/// [`TranslateContext::push`].
pub trait Operation: Debug {
	/// The node's class name, used by [`print`].
	fn name(&self) -> &'static str;

	/// The bound entity's name, for entity-bound operations.
	fn entity_name(&self) -> Option<&str> {
		None
	}

	/// The node's children, for introspection and printing.
	fn children(&self) -> Vec<&dyn Operation> {
		Vec::new()
	}

	/// Walk this subtree once, registering every pending computed-value
	/// callback. Runs before the resolution barrier; nodes carrying input
	/// fields forward the registration to them.
	fn register_callbacks(&self, bucket: &mut CallbackBucket) {
		for child in self.children() {
			child.register_callbacks(bucket);
		}
	}

	/// Lower this subtree against the given context.
	fn transpile(&self, ctx: &TranslateContext) -> Result<Transpiled>;
}

/// A mutation-capable node.
///
/// Mutation operations additionally expose their authorization guards for
/// extraction, so enclosing nodes can place AFTER guards behind the write
/// they follow: a parent emits each child subquery and then the child's
/// AFTER guards, and top-level wrappers emit the concatenated guards of all
/// partials behind the combined writes. Extraction requires the operation to
/// have been transpiled first, since the guards reference the variables its
/// scoped context bound.
pub trait MutationOperation: Operation {
	/// The authorization guard clauses of this operation at the given
	/// timing. Fails structurally when the operation has not been
	/// transpiled yet.
	fn authorization_clauses(&self, when: AuthTiming) -> Result<Vec<Clause>>;
}

/// Wrap the clause sequence of a nested operation into a `CALL` subquery
/// importing the parent's target binding.
///
/// Subqueries must end in a projection, so a unit collection is returned
/// under a fresh binding. The caller is responsible for having appended the
/// child's extracted AFTER guards to `body` first: the guards reference
/// variables bound inside the subquery and are invalid outside it.
pub(super) fn wrap_subquery(
	import: &crate::cypher::Var,
	mut body: Vec<Clause>,
	unit: crate::cypher::Var,
) -> Clause {
	use crate::cypher::{CallClause, Literal, Projection, ReturnClause};
	body.push(Clause::Return(ReturnClause::new(vec![Projection::aliased(
		Expr::func("collect", vec![Expr::Literal(Literal::Null)]),
		unit,
	)])));
	Clause::Call(CallClause::new(vec![import.clone()], body))
}

/// Render an operation tree as an indented, human-readable outline.
///
/// Each node prints its class name plus, for entity-bound operations, the
/// target entity's name.
pub fn print(operation: &dyn Operation) -> String {
	let mut out = String::new();
	print_node(operation, 0, &mut out);
	out
}

fn print_node(operation: &dyn Operation, depth: usize, out: &mut String) {
	for _ in 0..depth {
		out.push_str("  ");
	}
	match operation.entity_name() {
		Some(entity) => {
			let _ = writeln!(out, "{}<{}>", operation.name(), entity);
		}
		None => {
			let _ = writeln!(out, "{}", operation.name());
		}
	}
	for child in operation.children() {
		print_node(child, depth + 1, out);
	}
}
