use std::fmt::{self, Display, Formatter};

/// The scalar kind of an attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum ScalarKind {
	Boolean,
	Int,
	BigInt,
	Float,
	String,
	Id,
	Datetime,
	Date,
	Time,
	LocalDatetime,
	Point,
}

impl ScalarKind {
	/// Whether this kind is one of the temporal kinds.
	pub fn is_temporal(&self) -> bool {
		matches!(
			self,
			ScalarKind::Datetime | ScalarKind::Date | ScalarKind::Time | ScalarKind::LocalDatetime
		)
	}

	/// Whether this kind is a spatial kind.
	pub fn is_spatial(&self) -> bool {
		matches!(self, ScalarKind::Point)
	}

	/// Whether this kind is numeric.
	pub fn is_numeric(&self) -> bool {
		matches!(self, ScalarKind::Int | ScalarKind::BigInt | ScalarKind::Float)
	}

	/// The store-side constructor function wrapped around raw parameter
	/// values of this kind, if one is needed.
	pub fn coercion_function(&self) -> Option<&'static str> {
		match self {
			ScalarKind::Datetime => Some("datetime"),
			ScalarKind::Date => Some("date"),
			ScalarKind::Time => Some("time"),
			ScalarKind::LocalDatetime => Some("localdatetime"),
			ScalarKind::Point => Some("point"),
			_ => None,
		}
	}

	/// The signed bit width used when guarding integer arithmetic on an
	/// attribute of this kind. 32-bit integers get the tighter bound; every
	/// other numeric kind is guarded at 64 bits.
	pub fn int_bits(&self) -> u32 {
		match self {
			ScalarKind::Int => 32,
			_ => 64,
		}
	}
}

impl Display for ScalarKind {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		let name = match self {
			ScalarKind::Boolean => "Boolean",
			ScalarKind::Int => "Int",
			ScalarKind::BigInt => "BigInt",
			ScalarKind::Float => "Float",
			ScalarKind::String => "String",
			ScalarKind::Id => "ID",
			ScalarKind::Datetime => "DateTime",
			ScalarKind::Date => "Date",
			ScalarKind::Time => "Time",
			ScalarKind::LocalDatetime => "LocalDateTime",
			ScalarKind::Point => "Point",
		};
		f.write_str(name)
	}
}

/// A computed-value callback declared on an attribute.
///
/// The named user function is invoked during callback resolution for every
/// mutation of the declared operation kinds which does not supply the
/// attribute explicitly.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeCallback {
	/// Registered callback function name.
	pub function: String,
	/// Populate on create operations.
	pub on_create: bool,
	/// Populate on update operations.
	pub on_update: bool,
}

/// A typed, possibly list-valued, scalar field on an entity.
#[derive(Clone, Debug)]
pub struct Attribute {
	pub name: String,
	pub kind: ScalarKind,
	pub list: bool,
	pub callback: Option<AttributeCallback>,
}

impl Attribute {
	pub fn new(name: impl Into<String>, kind: ScalarKind) -> Self {
		Self {
			name: name.into(),
			kind,
			list: false,
			callback: None,
		}
	}

	pub fn list(mut self) -> Self {
		self.list = true;
		self
	}

	pub fn with_callback(mut self, callback: AttributeCallback) -> Self {
		self.callback = Some(callback);
		self
	}
}
