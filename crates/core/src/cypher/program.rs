use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use super::clause::Clause;
use super::VisitParams;
use crate::fmt::Fmt;
use crate::val::Value;

/// A finished query program, ready for execution.
///
/// Rendering produces the literal query text together with its parameter
/// map. Parameters appear in the map in first-use order, which keeps the
/// rendered output deterministic for equivalent inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
	pub clauses: Vec<Clause>,
}

impl Program {
	pub fn new(clauses: Vec<Clause>) -> Self {
		Self {
			clauses,
		}
	}

	/// Render the program to `(query_text, parameters)`.
	pub fn render(&self) -> (String, IndexMap<String, Value>) {
		(self.to_string(), self.params())
	}

	/// The parameter map of this program, in first-use order.
	pub fn params(&self) -> IndexMap<String, Value> {
		let mut params = IndexMap::new();
		self.clauses.visit_params(&mut |param| {
			params.entry(param.name().to_owned()).or_insert_with(|| param.value());
		});
		params
	}
}

impl Display for Program {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "{}", Fmt::one_line_separated(self.clauses.iter()))
	}
}
