//! Typed domain values produced by field conversion
//!
//! `to_internal_value` turns wire primitives into [`FieldValue`]s; validated
//! data is an ordered mapping of field name to `FieldValue`. The reverse
//! direction (`to_value`) renders the natural attribute form used when
//! assigning onto an instance or handing scalars to the model collaborator.

use crate::model::Instance;
use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value};
use uuid::Uuid;

/// Ordered mapping of converted, constraint-checked values.
pub type ValidatedData = IndexMap<String, FieldValue>;

/// A converted domain value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	Decimal(Decimal),
	Str(String),
	Date(NaiveDate),
	DateTime(NaiveDateTime),
	Uuid(Uuid),
	Bytes(Vec<u8>),
	/// Structured document accepted as-is by a JSON field.
	Json(Value),
	/// Heterogeneous sequence produced by a list field.
	List(Vec<FieldValue>),
	/// A resolved reference to one domain object.
	Instance(Instance),
	/// Resolved references of a many-valued relation, in input order.
	Instances(Vec<Instance>),
	/// Validated data of a nested serializer.
	Map(ValidatedData),
}

impl FieldValue {
	/// Render the natural attribute form of this value.
	///
	/// Dates become ISO-8601 strings, UUIDs canonical hyphenated strings,
	/// bytes base64 text, resolved references their full attribute objects.
	///
	/// # Examples
	///
	/// ```
	/// use serde_json::json;
	/// use wireform::FieldValue;
	///
	/// assert_eq!(FieldValue::Int(7).to_value(), json!(7));
	/// assert_eq!(FieldValue::Null.to_value(), json!(null));
	/// ```
	pub fn to_value(&self) -> Value {
		match self {
			FieldValue::Null => Value::Null,
			FieldValue::Bool(b) => Value::Bool(*b),
			FieldValue::Int(i) => Value::Number(Number::from(*i)),
			FieldValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
			FieldValue::Decimal(d) => d
				.to_f64()
				.and_then(Number::from_f64)
				.map(Value::Number)
				.unwrap_or(Value::Null),
			FieldValue::Str(s) => Value::String(s.clone()),
			FieldValue::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
			FieldValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%dT%H:%M:%S").to_string()),
			FieldValue::Uuid(u) => Value::String(u.to_string()),
			FieldValue::Bytes(bytes) => {
				use base64::Engine;
				Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
			}
			FieldValue::Json(value) => value.clone(),
			FieldValue::List(items) => Value::Array(items.iter().map(|v| v.to_value()).collect()),
			FieldValue::Instance(instance) => instance.values(),
			FieldValue::Instances(instances) => {
				Value::Array(instances.iter().map(|i| i.values()).collect())
			}
			FieldValue::Map(map) => Value::Object(
				map.iter()
					.map(|(name, value)| (name.clone(), value.to_value()))
					.collect(),
			),
		}
	}

	/// Whether this value is null.
	pub fn is_null(&self) -> bool {
		matches!(self, FieldValue::Null)
	}
}

/// Render a whole validated mapping into attribute form.
pub fn validated_to_attrs(validated: &ValidatedData) -> serde_json::Map<String, Value> {
	validated
		.iter()
		.map(|(name, value)| (name.clone(), value.to_value()))
		.collect()
}
