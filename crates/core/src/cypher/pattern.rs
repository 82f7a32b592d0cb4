use std::fmt::{self, Display, Formatter};

use super::param::Var;
use super::VisitParams;
use crate::catalog::Direction;
use crate::fmt::{EscapeIdent, Fmt};

/// A graph pattern usable in a match, create or merge position.
#[derive(Clone, Debug, PartialEq)]
pub enum Pattern {
	Node(NodePattern),
	Path(PathPattern),
}

impl VisitParams for Pattern {
	fn visit_params<F: FnMut(&super::Param)>(&self, _visitor: &mut F) {
		// Patterns bind variables and labels only; values stay in SET items.
	}
}

/// A node pattern `(var:Label)`.
#[derive(Clone, Debug, PartialEq)]
pub struct NodePattern {
	pub var: Var,
	pub labels: Vec<String>,
}

impl NodePattern {
	pub fn new(var: Var, labels: Vec<String>) -> Self {
		Self {
			var,
			labels,
		}
	}

	/// A bare reference to an already-bound variable.
	pub fn bare(var: Var) -> Self {
		Self {
			var,
			labels: Vec::new(),
		}
	}
}

impl Display for NodePattern {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		write!(f, "({}", self.var)?;
		for label in &self.labels {
			write!(f, ":{}", EscapeIdent(label))?;
		}
		f.write_str(")")
	}
}

/// A typed relationship segment within a path pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct RelPattern {
	pub var: Option<Var>,
	pub rel_type: String,
	pub direction: Direction,
}

impl RelPattern {
	pub fn new(var: Option<Var>, rel_type: impl Into<String>, direction: Direction) -> Self {
		Self {
			var,
			rel_type: rel_type.into(),
			direction,
		}
	}
}

/// A single-hop path pattern `(start)-[rel:TYPE]->(end)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PathPattern {
	pub start: NodePattern,
	pub rel: RelPattern,
	pub end: NodePattern,
}

impl PathPattern {
	pub fn new(start: NodePattern, rel: RelPattern, end: NodePattern) -> Self {
		Self {
			start,
			rel,
			end,
		}
	}
}

impl Display for PathPattern {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		let rel = Fmt::new(&self.rel, |rel: &RelPattern, f: &mut Formatter| {
			f.write_str("[")?;
			if let Some(ref var) = rel.var {
				Display::fmt(var, f)?;
			}
			write!(f, ":{}]", EscapeIdent(&rel.rel_type))
		});
		match self.rel.direction {
			Direction::Out => write!(f, "{}-{rel}->{}", self.start, self.end),
			Direction::In => write!(f, "{}<-{rel}-{}", self.start, self.end),
		}
	}
}

impl Display for Pattern {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Pattern::Node(node) => Display::fmt(node, f),
			Pattern::Path(path) => Display::fmt(path, f),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn renders_directed_paths() {
		let path = PathPattern::new(
			NodePattern::bare(Var::new("this0")),
			RelPattern::new(Some(Var::new("rel0")), "ACTED_IN", Direction::In),
			NodePattern::new(Var::new("this1"), vec!["Actor".into()]),
		);
		assert_eq!(path.to_string(), "(this0)<-[rel0:ACTED_IN]-(this1:Actor)");
	}
}
