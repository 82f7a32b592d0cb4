//! The clause and expression construction layer the translation core
//! composes against.
//!
//! This is the target intermediate representation of the compiler: pattern
//! matches, merges, creates, deletes, with/unwind/return clauses, predicates
//! and parameters. The translation core only builds values of these types;
//! rendering them to literal query text is the job of their `Display`
//! implementations, invoked once per request by [`Program::render`].

mod clause;
mod expr;
mod param;
mod pattern;
mod program;

pub use clause::{
	CallClause, Clause, Cond, CreateClause, DeleteClause, MatchClause, MergeClause, OrderBy,
	OrderDirection, Projection, ReturnClause, SetClause, SetItem, UnionClause, UnwindClause,
	ValidateClause, WithClause,
};
pub use expr::{BinaryOp, Expr, Literal, UnaryOp};
pub use param::{Param, Var};
pub use pattern::{NodePattern, Pattern, PathPattern, RelPattern};
pub use program::Program;

/// Visits every parameter reachable from a piece of the IR.
///
/// Used to extract the parameter map of a finished program in first-use
/// order, so rendered query text and parameters stay in lockstep.
pub trait VisitParams {
	fn visit_params<F: FnMut(&Param)>(&self, visitor: &mut F);
}

impl<T: VisitParams> VisitParams for Vec<T> {
	fn visit_params<F: FnMut(&Param)>(&self, visitor: &mut F) {
		for item in self {
			item.visit_params(visitor);
		}
	}
}

impl<T: VisitParams> VisitParams for Option<T> {
	fn visit_params<F: FnMut(&Param)>(&self, visitor: &mut F) {
		if let Some(item) = self {
			item.visit_params(visitor);
		}
	}
}
