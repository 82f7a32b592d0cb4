use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::Result;

use crate::cypher::{Param, Var};
use crate::err::Error;
use crate::val::Value;

/// The kind of the top-level operation being compiled.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OperationKind {
	Read,
	Create,
	Update,
}

impl Display for OperationKind {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			OperationKind::Read => f.write_str("read"),
			OperationKind::Create => f.write_str("create"),
			OperationKind::Update => f.write_str("update"),
		}
	}
}

/// Operation-kind hints copied into every derived context.
///
/// These are plain values, not a shared record: deriving a context copies
/// them, and nothing downstream can mutate an ancestor's environment.
/// Collection decisions deliberately do not live here; whether a subtree's
/// projection is collected is decided by the parent at the point it embeds
/// the subquery.
#[derive(Clone, Copy, Debug)]
pub struct Env {
	/// The top-level operation this subtree is being compiled under.
	pub top_level_operation: OperationKind,
}

/// Allocates fresh pattern variables for one translation.
///
/// The counter is shared across every context derived from the same root,
/// which keeps variable names collision-free across sibling branches and
/// nested relationship hops.
#[derive(Clone, Debug, Default)]
struct VarAllocator(Arc<AtomicU32>);

impl VarAllocator {
	fn next(&self, prefix: &str) -> Var {
		let n = self.0.fetch_add(1, Ordering::Relaxed);
		Var::new(format!("{prefix}{n}"))
	}
}

/// Allocates named parameters during tree construction.
#[derive(Clone, Debug, Default)]
pub struct ParamAllocator(Arc<AtomicU32>);

impl ParamAllocator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Allocate a fresh parameter holding the given value.
	pub fn next(&self, value: Value) -> Param {
		let n = self.0.fetch_add(1, Ordering::Relaxed);
		Param::new(format!("param{n}"), value)
	}

	/// Reserve a fresh parameter with no value yet.
	pub fn placeholder(&self) -> Param {
		let n = self.0.fetch_add(1, Ordering::Relaxed);
		Param::placeholder(format!("param{n}"))
	}
}

/// The scoping value threaded through the whole operation tree.
///
/// A context is cheap, copy-on-derive data. It is created once per top-level
/// request and re-derived, never mutated, at every nesting level: [`push`]
/// is the only way new pattern variables enter scope, and it records the
/// parent's target as the derived context's source. Once derived, a context
/// is read-only, so sharing one across a finished subtree is safe by
/// construction.
///
/// [`push`]: TranslateContext::push
#[derive(Clone, Debug)]
pub struct TranslateContext {
	target: Var,
	relationship: Option<Var>,
	source: Option<Var>,
	ret: Var,
	env: Env,
	vars: VarAllocator,
}

impl TranslateContext {
	/// Create the root context for one request.
	pub fn new(env: Env) -> Self {
		let vars = VarAllocator::default();
		Self {
			target: vars.next("this"),
			relationship: None,
			source: None,
			ret: vars.next("var"),
			env,
			vars,
		}
	}

	/// Derive a child context with a fresh target binding.
	///
	/// The parent's target becomes the child's source. When
	/// `with_relationship` is set a fresh relationship variable is bound as
	/// well.
	pub fn push(&self, with_relationship: bool) -> TranslateContext {
		TranslateContext {
			target: self.vars.next("this"),
			relationship: with_relationship.then(|| self.vars.next("rel")),
			source: Some(self.target.clone()),
			ret: self.vars.next("var"),
			env: self.env,
			vars: self.vars.clone(),
		}
	}

	/// Derive a context rebound to an existing variable.
	///
	/// Used by the bulk create path, where the iteration binding of an
	/// `UNWIND` becomes the source the per-item writes read from.
	pub fn rebind(&self, target: Var) -> TranslateContext {
		TranslateContext {
			target,
			relationship: self.relationship.clone(),
			source: self.source.clone(),
			ret: self.ret.clone(),
			env: self.env,
			vars: self.vars.clone(),
		}
	}

	/// The current entity binding.
	pub fn target(&self) -> &Var {
		&self.target
	}

	/// The relationship binding, failing structurally when absent.
	pub fn relationship(&self) -> Result<&Var> {
		self.relationship.as_ref().ok_or_else(|| Error::MissingRelationship.into())
	}

	/// The previous hop's target, failing structurally when absent.
	pub fn source(&self) -> Result<&Var> {
		self.source.as_ref().ok_or_else(|| Error::MissingSource.into())
	}

	/// The return binding of this scope.
	pub fn ret(&self) -> &Var {
		&self.ret
	}

	pub fn env(&self) -> Env {
		self.env
	}

	/// Allocate a fresh scratch variable in this translation's namespace.
	pub fn fresh_var(&self, prefix: &str) -> Var {
		self.vars.next(prefix)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn env() -> Env {
		Env {
			top_level_operation: OperationKind::Read,
		}
	}

	#[test]
	fn push_derives_without_mutating_parent() {
		let root = TranslateContext::new(env());
		let parent_target = root.target().clone();
		let child = root.push(true);
		assert_eq!(root.target(), &parent_target);
		assert_ne!(child.target(), root.target());
		assert_eq!(child.source().unwrap(), root.target());
		assert!(child.relationship().is_ok());
		assert!(root.relationship().is_err());
	}

	#[test]
	fn sibling_branches_get_distinct_variables() {
		let root = TranslateContext::new(env());
		let a = root.push(false);
		let b = root.push(false);
		assert_ne!(a.target(), b.target());
	}
}
