//! The value model carried by query parameters and callback results.
//!
//! Values enter the engine from resolved request arguments (JSON-shaped) and
//! from user callback results, and leave it inside the parameter map of a
//! rendered program. Scalar kinds mirror the attribute kinds of the catalog,
//! including the temporal and spatial kinds which receive dedicated coercion.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use geo::Point;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::catalog::ScalarKind;
use crate::err::Error;
use crate::fmt::Fmt;

/// A single request-time value.
///
/// `None` and `Null` are distinct: `None` is the absence of a value (an
/// unsupplied argument, or an unresolved callback placeholder), while `Null`
/// is an explicit null supplied by the request. Input fields write explicit
/// nulls but skip absent values entirely.
#[derive(Clone, Debug, Default, PartialEq)]
#[non_exhaustive]
pub enum Value {
	#[default]
	None,
	Null,
	Bool(bool),
	Number(Number),
	Strand(String),
	Datetime(DateTime<Utc>),
	Date(NaiveDate),
	Time(NaiveTime),
	LocalDatetime(NaiveDateTime),
	Point(Point<f64>),
	Array(Vec<Value>),
	Object(BTreeMap<String, Value>),
}

/// A numeric value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Number {
	Int(i64),
	Float(f64),
	Decimal(Decimal),
}

impl Value {
	/// Check whether this value is null.
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Check whether this value is absent.
	pub fn is_none(&self) -> bool {
		matches!(self, Value::None)
	}

	/// Check whether this value is absent or null.
	pub fn is_none_or_null(&self) -> bool {
		matches!(self, Value::None | Value::Null)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Value::Bool(v) => Some(*v),
			_ => None,
		}
	}

	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Value::Number(Number::Int(v)) => Some(*v),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Value::Strand(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_array(&self) -> Option<&[Value]> {
		match self {
			Value::Array(v) => Some(v),
			_ => None,
		}
	}

	pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
		match self {
			Value::Object(v) => Some(v),
			_ => None,
		}
	}

	/// Whether this value is the literal integer zero, in any numeric
	/// representation.
	pub fn is_zero(&self) -> bool {
		match self {
			Value::Number(Number::Int(v)) => *v == 0,
			Value::Number(Number::Float(v)) => *v == 0.0,
			Value::Number(Number::Decimal(v)) => v.is_zero(),
			_ => false,
		}
	}

	/// Convert a JSON value into an engine value.
	///
	/// Temporal and spatial kinds cannot be distinguished in JSON; they stay
	/// strings or objects here and are refined by [`Value::coerce_to`] once a
	/// declared attribute kind is known.
	pub fn from_json(json: serde_json::Value) -> Value {
		match json {
			serde_json::Value::Null => Value::Null,
			serde_json::Value::Bool(v) => Value::Bool(v),
			serde_json::Value::Number(v) => {
				if let Some(i) = v.as_i64() {
					Value::Number(Number::Int(i))
				} else {
					Value::Number(Number::Float(v.as_f64().unwrap_or(f64::NAN)))
				}
			}
			serde_json::Value::String(v) => Value::Strand(v),
			serde_json::Value::Array(v) => {
				Value::Array(v.into_iter().map(Value::from_json).collect())
			}
			serde_json::Value::Object(v) => {
				Value::Object(v.into_iter().map(|(k, v)| (k, Value::from_json(v))).collect())
			}
		}
	}

	/// Convert this value into its JSON parameter representation.
	pub fn into_json(self) -> serde_json::Value {
		match self {
			Value::None | Value::Null => serde_json::Value::Null,
			Value::Bool(v) => serde_json::Value::Bool(v),
			Value::Number(Number::Int(v)) => serde_json::Value::from(v),
			Value::Number(Number::Float(v)) => serde_json::Value::from(v),
			Value::Number(Number::Decimal(v)) => serde_json::Value::String(v.to_string()),
			Value::Strand(v) => serde_json::Value::String(v),
			Value::Datetime(v) => {
				serde_json::Value::String(v.to_rfc3339_opts(SecondsFormat::AutoSi, true))
			}
			Value::Date(v) => serde_json::Value::String(v.format("%Y-%m-%d").to_string()),
			Value::Time(v) => serde_json::Value::String(v.format("%H:%M:%S%.f").to_string()),
			Value::LocalDatetime(v) => {
				serde_json::Value::String(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
			}
			Value::Point(v) => serde_json::json!({
				"longitude": v.x(),
				"latitude": v.y(),
			}),
			Value::Array(v) => {
				serde_json::Value::Array(v.into_iter().map(Value::into_json).collect())
			}
			Value::Object(v) => serde_json::Value::Object(
				v.into_iter().map(|(k, v)| (k, v.into_json())).collect(),
			),
		}
	}

	/// Coerce this value into the given declared scalar kind.
	///
	/// Used by callback resolution, where user functions return loosely typed
	/// values which must match the attribute they were declared for. Null is
	/// preserved as null for every kind; a callback is allowed to resolve to
	/// "no value".
	pub fn coerce_to(self, kind: ScalarKind) -> Result<Value> {
		match (kind, self) {
			(_, Value::None) => Ok(Value::None),
			(_, Value::Null) => Ok(Value::Null),
			(ScalarKind::Boolean, Value::Bool(v)) => Ok(Value::Bool(v)),
			(ScalarKind::Int, Value::Number(Number::Int(v))) => Ok(Value::Number(Number::Int(v))),
			(ScalarKind::Int, Value::Number(Number::Float(v))) if v.fract() == 0.0 => {
				Ok(Value::Number(Number::Int(v as i64)))
			}
			(ScalarKind::BigInt, Value::Number(Number::Int(v))) => {
				Ok(Value::Number(Number::Int(v)))
			}
			(ScalarKind::BigInt, Value::Strand(v)) => match v.parse::<i64>() {
				Ok(i) => Ok(Value::Number(Number::Int(i))),
				Err(_) => Err(Error::Coerce {
					into: ScalarKind::BigInt,
					value: v,
				}
				.into()),
			},
			(ScalarKind::Float, Value::Number(n)) => Ok(Value::Number(Number::Float(match n {
				Number::Int(v) => v as f64,
				Number::Float(v) => v,
				Number::Decimal(v) => v.to_f64().unwrap_or(f64::NAN),
			}))),
			(ScalarKind::String, Value::Strand(v)) => Ok(Value::Strand(v)),
			(ScalarKind::Id, Value::Strand(v)) => Ok(Value::Strand(v)),
			(ScalarKind::Id, Value::Number(Number::Int(v))) => Ok(Value::Strand(v.to_string())),
			(ScalarKind::Datetime, Value::Datetime(v)) => Ok(Value::Datetime(v)),
			(ScalarKind::Datetime, Value::Strand(v)) => {
				match DateTime::parse_from_rfc3339(&v) {
					Ok(dt) => Ok(Value::Datetime(dt.with_timezone(&Utc))),
					Err(_) => Err(Error::Coerce {
						into: ScalarKind::Datetime,
						value: v,
					}
					.into()),
				}
			}
			(ScalarKind::Date, Value::Date(v)) => Ok(Value::Date(v)),
			(ScalarKind::Date, Value::Strand(v)) => {
				match NaiveDate::parse_from_str(&v, "%Y-%m-%d") {
					Ok(d) => Ok(Value::Date(d)),
					Err(_) => Err(Error::Coerce {
						into: ScalarKind::Date,
						value: v,
					}
					.into()),
				}
			}
			(ScalarKind::Time, Value::Time(v)) => Ok(Value::Time(v)),
			(ScalarKind::Time, Value::Strand(v)) => {
				match NaiveTime::parse_from_str(&v, "%H:%M:%S%.f") {
					Ok(t) => Ok(Value::Time(t)),
					Err(_) => Err(Error::Coerce {
						into: ScalarKind::Time,
						value: v,
					}
					.into()),
				}
			}
			(ScalarKind::LocalDatetime, Value::LocalDatetime(v)) => Ok(Value::LocalDatetime(v)),
			(ScalarKind::LocalDatetime, Value::Strand(v)) => {
				match NaiveDateTime::parse_from_str(&v, "%Y-%m-%dT%H:%M:%S%.f") {
					Ok(dt) => Ok(Value::LocalDatetime(dt)),
					Err(_) => Err(Error::Coerce {
						into: ScalarKind::LocalDatetime,
						value: v,
					}
					.into()),
				}
			}
			(ScalarKind::Point, Value::Point(v)) => Ok(Value::Point(v)),
			(ScalarKind::Point, Value::Object(v)) => {
				let lon = v.get("longitude").and_then(Value::as_f64);
				let lat = v.get("latitude").and_then(Value::as_f64);
				match (lon, lat) {
					(Some(lon), Some(lat)) => Ok(Value::Point(Point::new(lon, lat))),
					_ => Err(Error::Coerce {
						into: ScalarKind::Point,
						value: format!("{}", Value::Object(v)),
					}
					.into()),
				}
			}
			(kind, value) => Err(Error::Coerce {
				into: kind,
				value: value.to_string(),
			}
			.into()),
		}
	}

	fn as_f64(&self) -> Option<f64> {
		match self {
			Value::Number(Number::Int(v)) => Some(*v as f64),
			Value::Number(Number::Float(v)) => Some(*v),
			Value::Number(Number::Decimal(v)) => v.to_f64(),
			_ => None,
		}
	}
}

impl serde::Serialize for Value {
	/// Values serialize through their JSON parameter representation, so a
	/// rendered `(query, params)` pair can be handed to a driver directly.
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		self.clone().into_json().serialize(serializer)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Number(Number::Int(v))
	}
}

impl From<f64> for Value {
	fn from(v: f64) -> Self {
		Value::Number(Number::Float(v))
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Bool(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Strand(v.to_owned())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Strand(v)
	}
}

impl From<Vec<Value>> for Value {
	fn from(v: Vec<Value>) -> Self {
		Value::Array(v)
	}
}

impl Display for Value {
	fn fmt(&self, f: &mut Formatter) -> fmt::Result {
		match self {
			Value::None => write!(f, "NONE"),
			Value::Null => write!(f, "NULL"),
			Value::Bool(v) => write!(f, "{v}"),
			Value::Number(Number::Int(v)) => write!(f, "{v}"),
			Value::Number(Number::Float(v)) => write!(f, "{v}"),
			Value::Number(Number::Decimal(v)) => write!(f, "{v}"),
			Value::Strand(v) => write!(f, "{v:?}"),
			Value::Datetime(v) => write!(f, "{:?}", v.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
			Value::Date(v) => write!(f, "\"{}\"", v.format("%Y-%m-%d")),
			Value::Time(v) => write!(f, "\"{}\"", v.format("%H:%M:%S%.f")),
			Value::LocalDatetime(v) => write!(f, "\"{}\"", v.format("%Y-%m-%dT%H:%M:%S%.f")),
			Value::Point(v) => write!(f, "point({{ longitude: {}, latitude: {} }})", v.x(), v.y()),
			Value::Array(v) => write!(f, "[{}]", Fmt::comma_separated(v.iter())),
			Value::Object(v) => write!(
				f,
				"{{ {} }}",
				Fmt::comma_separated(
					v.iter().map(|(k, v)| Fmt::new((k, v), |(k, v), f| write!(f, "{k}: {v}")))
				)
			),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn coerce_datetime_from_string() {
		let v = Value::from("2024-01-01T00:00:00Z").coerce_to(ScalarKind::Datetime).unwrap();
		match v {
			Value::Datetime(dt) => assert_eq!(dt.to_rfc3339_opts(SecondsFormat::Secs, true), "2024-01-01T00:00:00Z"),
			other => panic!("expected datetime, got {other}"),
		}
	}

	#[test]
	fn coerce_rejects_mismatched_kind() {
		let err = Value::from(true).coerce_to(ScalarKind::Int).unwrap_err();
		assert!(err.downcast_ref::<Error>().is_some());
	}

	#[test]
	fn coerce_preserves_null() {
		let v = Value::Null.coerce_to(ScalarKind::Datetime).unwrap();
		assert!(v.is_null());
	}

	#[test]
	fn json_round_trip() {
		let v = Value::from_json(serde_json::json!({"a": [1, 2.5, "x", null]}));
		let json = v.into_json();
		assert_eq!(json, serde_json::json!({"a": [1, 2.5, "x", null]}));
	}

	#[test]
	fn serializes_through_the_json_representation() {
		let v = Value::Array(vec![Value::from(1), Value::from("x")]);
		assert_eq!(serde_json::to_string(&v).unwrap(), "[1,\"x\"]");
	}
}
