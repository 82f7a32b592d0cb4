use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, RwLock};

use crate::val::Value;

/// A bound pattern variable.
///
/// Variables are cheap handles; cloning shares the underlying name. Fresh
/// variables only enter scope through the translation context's allocator,
/// which keeps sibling branches collision-free.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Var(Arc<str>);

impl Var {
	pub fn new(name: impl Into<String>) -> Self {
		Self(name.into().into())
	}

	pub fn name(&self) -> &str {
		&self.0
	}
}

impl Display for Var {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// A named query parameter with a shared, late-bound value.
///
/// Most parameters are fully valued at tree-construction time. Callback
/// placeholders are the exception: they are reserved empty and written once
/// by callback resolution, before any clause is lowered. Cloning shares the
/// cell, so the operation tree and the callback bucket observe one value.
#[derive(Clone, Debug)]
pub struct Param(Arc<ParamInner>);

#[derive(Debug)]
struct ParamInner {
	name: String,
	value: RwLock<Value>,
}

impl Param {
	pub fn new(name: impl Into<String>, value: Value) -> Self {
		Self(Arc::new(ParamInner {
			name: name.into(),
			value: RwLock::new(value),
		}))
	}

	/// Reserve a parameter with no value yet.
	pub fn placeholder(name: impl Into<String>) -> Self {
		Self::new(name, Value::None)
	}

	pub fn name(&self) -> &str {
		&self.0.name
	}

	/// The current value of the parameter.
	pub fn value(&self) -> Value {
		self.0.value.read().expect("parameter cell poisoned").clone()
	}

	/// Write the resolved value into the cell.
	pub fn set(&self, value: Value) {
		*self.0.value.write().expect("parameter cell poisoned") = value;
	}
}

impl PartialEq for Param {
	fn eq(&self, other: &Self) -> bool {
		self.0.name == other.0.name
	}
}

impl Display for Param {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "${}", self.0.name)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn late_bound_value_is_shared() {
		let param = Param::placeholder("param0");
		let clone = param.clone();
		param.set(Value::from(5));
		assert_eq!(clone.value(), Value::from(5));
	}
}
