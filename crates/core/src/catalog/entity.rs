use anyhow::Result;
use indexmap::IndexMap;

use super::{Attribute, Relationship};
use crate::err::Error;
use crate::val::Value;

/// Authorization rules declared on an entity.
///
/// Each rule is a `where`-shaped object over the entity's attributes, in the
/// same shape as request filters. String leaf values beginning with `$jwt.`
/// are substituted with the matching claim of the authenticated subject at
/// tree-construction time. Filter rules grant visibility when any of them
/// matches; validation rules deny the operation when none of them holds.
#[derive(Clone, Debug, Default)]
pub struct EntityAuthorization {
	/// Visibility rules, ORed together into a `WHERE` predicate.
	pub filter: Vec<Value>,
	/// Hard-denial rules checked against pre-mutation state.
	pub validate_before: Vec<Value>,
	/// Hard-denial rules checked against post-mutation state.
	pub validate_after: Vec<Value>,
}

impl EntityAuthorization {
	pub fn is_empty(&self) -> bool {
		self.filter.is_empty() && self.validate_before.is_empty() && self.validate_after.is_empty()
	}
}

/// A typed node kind in the schema model.
#[derive(Clone, Debug)]
pub struct ConcreteEntity {
	pub name: String,
	/// Node labels in the store; defaults to the entity name.
	pub labels: Vec<String>,
	pub attributes: IndexMap<String, Attribute>,
	pub relationships: IndexMap<String, Relationship>,
	pub authorization: Option<EntityAuthorization>,
}

impl ConcreteEntity {
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			labels: vec![name.clone()],
			name,
			attributes: IndexMap::new(),
			relationships: IndexMap::new(),
			authorization: None,
		}
	}

	pub fn attribute(mut self, attribute: Attribute) -> Self {
		self.attributes.insert(attribute.name.clone(), attribute);
		self
	}

	pub fn relationship(mut self, relationship: Relationship) -> Self {
		self.relationships.insert(relationship.name.clone(), relationship);
		self
	}

	pub fn with_authorization(mut self, authorization: EntityAuthorization) -> Self {
		self.authorization = Some(authorization);
		self
	}

	/// Look up an attribute, failing with a static input error.
	pub fn expect_attribute(&self, name: &str) -> Result<&Attribute> {
		self.attributes.get(name).ok_or_else(|| {
			Error::UnknownAttribute {
				entity: self.name.clone(),
				attribute: name.to_owned(),
			}
			.into()
		})
	}

	/// Look up a relationship field, failing with a static input error.
	pub fn expect_relationship(&self, field: &str) -> Result<&Relationship> {
		self.relationships.get(field).ok_or_else(|| {
			Error::UnknownRelationship {
				entity: self.name.clone(),
				field: field.to_owned(),
			}
			.into()
		})
	}
}

/// Whether a composite entity is a union or an interface.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompositeKind {
	Union,
	Interface,
}

/// A union or interface type resolving to multiple concrete entities.
#[derive(Clone, Debug)]
pub struct CompositeEntity {
	pub name: String,
	pub kind: CompositeKind,
	/// Concrete members in declaration order. This order is load-bearing:
	/// composite operations fan out over it.
	pub members: Vec<String>,
}

impl CompositeEntity {
	pub fn new(name: impl Into<String>, kind: CompositeKind, members: Vec<String>) -> Self {
		Self {
			name: name.into(),
			kind,
			members,
		}
	}
}
