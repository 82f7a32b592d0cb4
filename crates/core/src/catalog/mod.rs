//! Read-only schema metadata describing the entity model.
//!
//! The catalog is consumed by the operation-tree factory and by the lowering
//! passes; nothing in this crate ever mutates it. It is the boundary to
//! whatever schema-building machinery produced it.

mod attribute;
mod entity;
mod relationship;

pub use attribute::{Attribute, AttributeCallback, ScalarKind};
pub use entity::{CompositeEntity, CompositeKind, ConcreteEntity, EntityAuthorization};
pub use relationship::{Cardinality, Direction, PropertyType, Relationship};

use anyhow::Result;
use indexmap::IndexMap;

use crate::err::Error;

/// The full entity model for one schema.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
	entities: IndexMap<String, ConcreteEntity>,
	composites: IndexMap<String, CompositeEntity>,
	property_types: IndexMap<String, PropertyType>,
}

impl Catalog {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add_entity(&mut self, entity: ConcreteEntity) -> &mut Self {
		self.entities.insert(entity.name.clone(), entity);
		self
	}

	pub fn add_composite(&mut self, composite: CompositeEntity) -> &mut Self {
		self.composites.insert(composite.name.clone(), composite);
		self
	}

	pub fn add_property_type(&mut self, properties: PropertyType) -> &mut Self {
		self.property_types.insert(properties.name.clone(), properties);
		self
	}

	/// Look up a concrete entity by name.
	pub fn entity(&self, name: &str) -> Result<&ConcreteEntity> {
		self.entities.get(name).ok_or_else(|| Error::UnknownEntity(name.to_owned()).into())
	}

	/// Look up a union or interface by name.
	pub fn composite(&self, name: &str) -> Option<&CompositeEntity> {
		self.composites.get(name)
	}

	/// Look up a relationship property type by name.
	pub fn property_type(&self, name: &str) -> Option<&PropertyType> {
		self.property_types.get(name)
	}

	/// The concrete entities a target name resolves to.
	///
	/// A concrete entity resolves to itself; a union or interface resolves to
	/// its members in declaration order. That order is the enumeration order
	/// every composite operation fans out in, so it must be deterministic.
	pub fn concrete_targets(&self, name: &str) -> Result<Vec<&ConcreteEntity>> {
		if let Some(composite) = self.composites.get(name) {
			composite.members.iter().map(|m| self.entity(m)).collect()
		} else {
			Ok(vec![self.entity(name)?])
		}
	}
}
