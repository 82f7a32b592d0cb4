use thiserror::Error;

use crate::catalog::ScalarKind;

/// An error raised while building or lowering an operation tree.
///
/// Errors fall into three families. Structural errors indicate a factory or
/// caller contract violation and are fatal. Static input errors reject a
/// request before any query text is produced. Callback errors abort
/// translation during callback resolution, before lowering begins.
/// Authorization denials and arithmetic guards are deliberately *not* part of
/// this enum: they are compiled into the emitted program as runtime
/// assertions enforced by the executing store.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
	/// The engine encountered unreachable logic
	#[error("The engine encountered unreachable logic: {0}")]
	Unreachable(String),

	/// A context without a bound target variable was supplied where one is
	/// required
	#[error("No target variable is bound in the current context")]
	MissingTarget,

	/// A relationship-scoped value was requested from a context without a
	/// relationship variable
	#[error("No relationship variable is bound in the current context")]
	MissingRelationship,

	/// A source-scoped value was requested from a context without a source
	/// variable
	#[error("No source variable is bound in the current context")]
	MissingSource,

	/// A nested context was required before authorization subqueries could be
	/// extracted
	#[error("No nested context is available for authorization subquery extraction")]
	MissingNestedContext,

	/// A math input field was constructed with a literal zero divisor
	#[error("Cannot divide attribute `{attribute}` by zero")]
	DivisionByZero {
		attribute: String,
	},

	/// An attribute name is shared between the node and relationship inputs
	/// of a connect or disconnect operation
	#[error("Attribute `{0}` is ambiguous between node and relationship inputs")]
	AmbiguousAttribute(String),

	/// The requested entity is not present in the catalog
	#[error("Unknown entity `{0}`")]
	UnknownEntity(String),

	/// The requested attribute is not present on the entity
	#[error("Unknown attribute `{attribute}` on entity `{entity}`")]
	UnknownAttribute {
		entity: String,
		attribute: String,
	},

	/// The requested relationship field is not present on the entity
	#[error("Unknown relationship `{field}` on entity `{entity}`")]
	UnknownRelationship {
		entity: String,
		field: String,
	},

	/// No callback function is registered under the requested name
	#[error("No callback registered under the name `{0}`")]
	UnknownCallback(String),

	/// A callback returned a non-list value for a list-typed attribute
	#[error("Callback `{function}` returned a non-list value for a list-typed attribute")]
	CallbackNonList {
		function: String,
	},

	/// A value could not be coerced into the declared scalar kind
	#[error("Could not coerce `{value}` into `{into}`")]
	Coerce {
		into: ScalarKind,
		value: String,
	},

	/// The request exceeded the configured nesting depth
	#[error("Request exceeds the maximum tree depth of {max}")]
	TreeDepthExceeded {
		max: u32,
	},

	/// A composite target fans out to more concrete entities than permitted
	#[error("Composite `{composite}` fans out to {fanout} concrete entities, more than the maximum of {max}")]
	CompositeFanoutExceeded {
		composite: String,
		fanout: usize,
		max: usize,
	},

	/// The request shape was invalid for the requested operation
	#[error("Invalid request input: {0}")]
	InvalidInput(String),
}

impl Error {
	/// Construct an unreachable-logic error from the current file and line.
	pub fn unreachable<T: std::fmt::Display>(message: T) -> Error {
		Error::Unreachable(message.to_string())
	}

	/// Construct a static input rejection.
	pub fn invalid_input<T: std::fmt::Display>(message: T) -> Error {
		Error::InvalidInput(message.to_string())
	}
}
