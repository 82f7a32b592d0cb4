use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;

use super::Attribute;

/// The direction of a relationship as declared on its source entity.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Direction {
	#[default]
	Out,
	In,
}

impl Direction {
	pub fn reverse(self) -> Direction {
		match self {
			Direction::Out => Direction::In,
			Direction::In => Direction::Out,
		}
	}
}

impl Display for Direction {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Direction::Out => f.write_str("OUT"),
			Direction::In => f.write_str("IN"),
		}
	}
}

/// Relationship multiplicity on the target side.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Cardinality {
	One,
	#[default]
	Many,
}

/// The attribute set carried by a relationship's edge.
#[derive(Clone, Debug, Default)]
pub struct PropertyType {
	pub name: String,
	pub attributes: IndexMap<String, Attribute>,
}

impl PropertyType {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			attributes: IndexMap::new(),
		}
	}

	pub fn attribute(mut self, attribute: Attribute) -> Self {
		self.attributes.insert(attribute.name.clone(), attribute);
		self
	}
}

/// A typed, directed relationship declared on an entity.
#[derive(Clone, Debug)]
pub struct Relationship {
	/// Field name on the source entity.
	pub name: String,
	/// Edge type in the store.
	pub rel_type: String,
	/// Direction relative to the source entity.
	pub direction: Direction,
	/// Target entity name; may be a union or interface.
	pub target: String,
	/// Name of the edge property type, when the edge carries attributes.
	pub properties: Option<String>,
	/// Multiplicity on the target side.
	pub cardinality: Cardinality,
}

impl Relationship {
	pub fn new(
		name: impl Into<String>,
		rel_type: impl Into<String>,
		direction: Direction,
		target: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			rel_type: rel_type.into(),
			direction,
			target: target.into(),
			properties: None,
			cardinality: Cardinality::Many,
		}
	}

	pub fn with_properties(mut self, properties: impl Into<String>) -> Self {
		self.properties = Some(properties.into());
		self
	}

	pub fn one(mut self) -> Self {
		self.cardinality = Cardinality::One;
		self
	}
}
