//! Typed leaf converters and validators
//!
//! A [`Field`] knows how to turn a wire value into a domain value
//! (`to_internal_value`), back into a wire-safe primitive
//! (`to_representation`), and how to validate presence, type and constraints
//! on the way in. Serializers aggregate fields by name; every live serializer
//! owns an independent copy of its fields so validator state never leaks
//! across instances.

use crate::error::{FieldError, ValidationError};
use crate::model::ModelCollaborator;
use crate::serializer::Blueprint;
use crate::validators::{MaxLengthValidator, MinLengthValidator, Validator};
use crate::value::FieldValue;
use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use uuid::Uuid;

/// Textual input format for date fields.
const DATE_FORMAT: &str = "%Y-%m-%d";
/// Textual input format for date-time fields.
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Initial-value policy of a field: nothing, a static value, or a
/// zero-argument provider invoked on demand.
#[derive(Clone, Default)]
pub enum Initial {
	#[default]
	None,
	Value(Value),
	Provider(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl Initial {
	/// Resolve the initial value, invoking the provider if one is set.
	pub fn resolve(&self) -> Value {
		match self {
			Initial::None => Value::Null,
			Initial::Value(value) => value.clone(),
			Initial::Provider(provider) => provider(),
		}
	}
}

impl std::fmt::Debug for Initial {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Initial::None => write!(f, "None"),
			Initial::Value(value) => write!(f, "Value({value})"),
			Initial::Provider(_) => write!(f, "Provider(..)"),
		}
	}
}

/// The declared domain type of a field, with any per-kind configuration.
#[derive(Clone)]
pub enum FieldKind {
	Integer,
	Float,
	Decimal,
	/// Numeric scalar measured in seconds.
	Time,
	Boolean,
	Char,
	Url,
	/// Base64-encoded octets.
	Binary,
	/// Sequence of loosely-typed elements.
	List,
	/// String restricted to a fixed allowed-value set.
	Choice,
	Date,
	DateTime,
	Uuid,
	/// Nested structured document.
	Json,
	/// Reference to one domain object, resolved by a configured lookup field.
	Model {
		model: Arc<dyn ModelCollaborator>,
		lookup_field: String,
	},
	/// Reference resolved by the related model's primary key.
	PrimaryKey {
		model: Arc<dyn ModelCollaborator>,
		lookup_field: String,
	},
	/// Sequence of references, each resolved by primary key.
	MultiPrimaryKey {
		model: Arc<dyn ModelCollaborator>,
		lookup_field: String,
	},
	/// Child serializer template applied to a sub-mapping.
	Nested(Arc<Blueprint>),
}

impl FieldKind {
	/// Human-readable name of the expected wire type, for error messages.
	fn expected(&self) -> &'static str {
		match self {
			FieldKind::Integer => "integer",
			FieldKind::Float | FieldKind::Decimal | FieldKind::Time => "number",
			FieldKind::Boolean => "boolean",
			FieldKind::Char | FieldKind::Url | FieldKind::Choice => "string",
			FieldKind::Binary => "base64 string",
			FieldKind::List => "array",
			FieldKind::Date => "date string",
			FieldKind::DateTime => "datetime string",
			FieldKind::Uuid => "UUID string",
			FieldKind::Json => "structured document",
			FieldKind::Model { .. } | FieldKind::PrimaryKey { .. } => "lookup value",
			FieldKind::MultiPrimaryKey { .. } => "array of lookup values",
			FieldKind::Nested(_) => "mapping",
		}
	}

	/// Whether a wire value matches this kind's expected shape.
	fn matches(&self, value: &Value) -> bool {
		match self {
			FieldKind::Integer => value.is_i64() || value.is_u64(),
			FieldKind::Float | FieldKind::Decimal | FieldKind::Time => value.is_number(),
			FieldKind::Boolean => value.is_boolean(),
			FieldKind::Char
			| FieldKind::Url
			| FieldKind::Choice
			| FieldKind::Binary
			| FieldKind::Date
			| FieldKind::DateTime
			| FieldKind::Uuid => value.is_string(),
			FieldKind::List => value.is_array(),
			FieldKind::Json => value.is_object() || value.is_array(),
			// Lookup keys are storage-defined scalars; resolution decides.
			FieldKind::Model { .. } | FieldKind::PrimaryKey { .. } => !value.is_array(),
			FieldKind::MultiPrimaryKey { .. } => value.is_array(),
			FieldKind::Nested(_) => value.is_object(),
		}
	}

	fn variant_name(&self) -> &'static str {
		match self {
			FieldKind::Integer => "Integer",
			FieldKind::Float => "Float",
			FieldKind::Decimal => "Decimal",
			FieldKind::Time => "Time",
			FieldKind::Boolean => "Boolean",
			FieldKind::Char => "Char",
			FieldKind::Url => "Url",
			FieldKind::Binary => "Binary",
			FieldKind::List => "List",
			FieldKind::Choice => "Choice",
			FieldKind::Date => "Date",
			FieldKind::DateTime => "DateTime",
			FieldKind::Uuid => "Uuid",
			FieldKind::Json => "Json",
			FieldKind::Model { .. } => "Model",
			FieldKind::PrimaryKey { .. } => "PrimaryKey",
			FieldKind::MultiPrimaryKey { .. } => "MultiPrimaryKey",
			FieldKind::Nested(_) => "Nested",
		}
	}
}

impl std::fmt::Debug for FieldKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			FieldKind::Model { lookup_field, .. }
			| FieldKind::PrimaryKey { lookup_field, .. }
			| FieldKind::MultiPrimaryKey { lookup_field, .. } => f
				.debug_struct(self.variant_name())
				.field("lookup_field", lookup_field)
				.finish(),
			other => write!(f, "{}", other.variant_name()),
		}
	}
}

/// A typed leaf converter/validator for one named attribute.
#[derive(Debug, Clone)]
pub struct Field {
	pub name: String,
	pub kind: FieldKind,
	pub required: bool,
	pub nullable: bool,
	pub read_only: bool,
	pub write_only: bool,
	/// Cardinality: whether the field carries a sequence of values.
	pub many: bool,
	pub min_length: Option<usize>,
	pub max_length: Option<usize>,
	pub choices: Option<Vec<Value>>,
	pub initial: Initial,
	pub validators: Vec<Box<dyn Validator>>,
}

impl Field {
	fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
		Self {
			name: name.into(),
			kind,
			required: true,
			nullable: false,
			read_only: false,
			write_only: false,
			many: false,
			min_length: None,
			max_length: None,
			choices: None,
			initial: Initial::None,
			validators: Vec::new(),
		}
	}

	/// Integer scalar field.
	pub fn integer(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Integer)
	}

	/// Floating-point scalar field.
	pub fn float(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Float)
	}

	/// Fixed-precision decimal field.
	pub fn decimal(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Decimal)
	}

	/// Duration field carried as a numeric scalar.
	pub fn time(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Time)
	}

	/// Boolean field.
	pub fn boolean(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Boolean)
	}

	/// Text field with a default upper length bound.
	///
	/// # Examples
	///
	/// ```
	/// use wireform::Field;
	///
	/// let field = Field::char("name").with_min_length(3);
	/// assert_eq!(field.max_length, Some(255));
	/// assert_eq!(field.min_length, Some(3));
	/// ```
	pub fn char(name: impl Into<String>) -> Self {
		let mut field = Self::with_kind(name, FieldKind::Char);
		field.max_length = Some(255);
		field
	}

	/// URL field; bounded like text, with a minimum plausible length.
	pub fn url(name: impl Into<String>) -> Self {
		let mut field = Self::with_kind(name, FieldKind::Url);
		field.min_length = Some(3);
		field.max_length = Some(255);
		field
	}

	/// Octet field carried as base64 text.
	pub fn binary(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Binary)
	}

	/// Loosely-typed sequence field.
	pub fn list(name: impl Into<String>) -> Self {
		let mut field = Self::with_kind(name, FieldKind::List);
		field.many = true;
		field
	}

	/// String field restricted to the given allowed values.
	///
	/// # Examples
	///
	/// ```
	/// use serde_json::json;
	/// use wireform::Field;
	///
	/// let field = Field::choice("state", vec![json!("new"), json!("done")]);
	/// assert!(field.validate(&json!("new")).is_ok());
	/// assert!(field.validate(&json!("stale")).is_err());
	/// ```
	pub fn choice(name: impl Into<String>, choices: Vec<Value>) -> Self {
		let mut field = Self::with_kind(name, FieldKind::Choice);
		field.choices = Some(choices);
		field
	}

	/// Calendar date field (`YYYY-MM-DD`).
	pub fn date(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Date)
	}

	/// Calendar date-time field (`YYYY-MM-DDTHH:MM:SS`).
	pub fn datetime(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::DateTime)
	}

	/// UUID field in canonical hyphenated form.
	pub fn uuid(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Uuid)
	}

	/// Nested structured document field.
	pub fn json(name: impl Into<String>) -> Self {
		Self::with_kind(name, FieldKind::Json)
	}

	/// Reference field resolved through an arbitrary lookup field.
	pub fn model(
		name: impl Into<String>,
		model: Arc<dyn ModelCollaborator>,
		lookup_field: impl Into<String>,
	) -> Self {
		Self::with_kind(
			name,
			FieldKind::Model {
				model,
				lookup_field: lookup_field.into(),
			},
		)
	}

	/// Reference field resolved by the related model's primary key.
	pub fn primary_key(name: impl Into<String>, model: Arc<dyn ModelCollaborator>) -> Self {
		let lookup_field = model.describe().pk_field.name;
		Self::with_kind(
			name,
			FieldKind::PrimaryKey {
				model,
				lookup_field,
			},
		)
	}

	/// Many-valued reference field, each element resolved by primary key.
	pub fn multi_primary_key(name: impl Into<String>, model: Arc<dyn ModelCollaborator>) -> Self {
		let lookup_field = model.describe().pk_field.name;
		let mut field = Self::with_kind(
			name,
			FieldKind::MultiPrimaryKey {
				model,
				lookup_field,
			},
		);
		field.many = true;
		field
	}

	/// Nested serializer field built from a child template.
	pub fn nested(name: impl Into<String>, blueprint: Arc<Blueprint>) -> Self {
		Self::with_kind(name, FieldKind::Nested(blueprint))
	}

	/// Set whether the field must be present on write.
	pub fn required(mut self, required: bool) -> Self {
		self.required = required;
		self
	}

	/// Accept explicit nulls.
	pub fn nullable(mut self) -> Self {
		self.nullable = true;
		self
	}

	/// Exclude the field from writes. Read-only fields are never required.
	pub fn read_only(mut self) -> Self {
		self.read_only = true;
		self.required = false;
		self
	}

	/// Exclude the field from representations.
	pub fn write_only(mut self) -> Self {
		self.write_only = true;
		self
	}

	/// Mark the field as many-valued.
	pub fn many(mut self) -> Self {
		self.many = true;
		self
	}

	/// Set the minimum length bound.
	pub fn with_min_length(mut self, min_length: usize) -> Self {
		self.min_length = Some(min_length);
		self
	}

	/// Set the maximum length bound.
	pub fn with_max_length(mut self, max_length: usize) -> Self {
		self.max_length = Some(max_length);
		self
	}

	/// Set a static initial value.
	pub fn with_initial(mut self, initial: Value) -> Self {
		self.initial = Initial::Value(initial);
		self
	}

	/// Set a computed initial value.
	pub fn with_initial_provider<F>(mut self, provider: F) -> Self
	where
		F: Fn() -> Value + Send + Sync + 'static,
	{
		self.initial = Initial::Provider(Arc::new(provider));
		self
	}

	/// Attach a validator; validators run in attachment order.
	pub fn with_validator(mut self, validator: Box<dyn Validator>) -> Self {
		self.validators.push(validator);
		self
	}

	/// Return the initial value, invoking the provider if configured.
	pub fn get_initial(&self) -> Value {
		self.initial.resolve()
	}

	/// Whether this field is a nested serializer.
	pub fn is_nested(&self) -> bool {
		matches!(self.kind, FieldKind::Nested(_))
	}

	/// Whether this field resolves references through a model collaborator.
	pub fn is_relation(&self) -> bool {
		matches!(
			self.kind,
			FieldKind::Model { .. } | FieldKind::PrimaryKey { .. } | FieldKind::MultiPrimaryKey { .. }
		)
	}

	/// Validate presence, declared type and constraints of a wire value.
	///
	/// Null is rejected when the field is required and not nullable and
	/// accepted (short-circuiting the remaining checks) otherwise. Attached
	/// validators run in declaration order; the first violation wins.
	pub fn validate(&self, value: &Value) -> Result<(), ValidationError> {
		if value.is_null() {
			if self.required && !self.nullable {
				return Err(ValidationError::new("Must be not null"));
			}
			return Ok(());
		}

		if !self.kind.matches(value) {
			return Err(ValidationError::new(format!(
				"Must be a {}",
				self.kind.expected()
			)));
		}

		if matches!(self.kind, FieldKind::Char | FieldKind::Url) {
			if let Some(max_length) = self.max_length {
				MaxLengthValidator::new(max_length).validate(value)?;
			}
			if let Some(min_length) = self.min_length {
				MinLengthValidator::new(min_length).validate(value)?;
			}
		}

		if matches!(self.kind, FieldKind::Choice) {
			let choices = self.choices.as_deref().unwrap_or_default();
			if !choices.contains(value) {
				return Err(ValidationError::new(format!(
					"Must be one of declared values {}",
					Value::Array(choices.to_vec())
				)));
			}
		}

		for validator in &self.validators {
			validator.validate(value)?;
		}

		Ok(())
	}

	/// Validate and convert a wire value into its domain form.
	///
	/// Lookup failures of reference kinds (`NotFound`, unknown lookup field)
	/// surface as validation errors; storage failures propagate untouched.
	///
	/// # Panics
	///
	/// Panics when called on a nested serializer field; those are converted
	/// by their parent serializer, which builds and validates a child.
	pub async fn to_internal_value(&self, value: &Value) -> Result<FieldValue, FieldError> {
		self.validate(value)?;
		if value.is_null() {
			return Ok(FieldValue::Null);
		}

		match &self.kind {
			FieldKind::Integer => Ok(FieldValue::Int(value.as_i64().unwrap_or_default())),
			FieldKind::Float | FieldKind::Time => {
				Ok(FieldValue::Float(value.as_f64().unwrap_or_default()))
			}
			FieldKind::Decimal => {
				let float = value.as_f64().unwrap_or_default();
				let decimal = Decimal::from_f64(float).ok_or_else(|| {
					ValidationError::new(format!("{float} is not a representable decimal"))
				})?;
				Ok(FieldValue::Decimal(decimal))
			}
			FieldKind::Boolean => Ok(FieldValue::Bool(value.as_bool().unwrap_or_default())),
			FieldKind::Char | FieldKind::Url | FieldKind::Choice => Ok(FieldValue::Str(
				value.as_str().unwrap_or_default().to_string(),
			)),
			FieldKind::Binary => {
				let text = value.as_str().unwrap_or_default();
				let bytes = base64::engine::general_purpose::STANDARD
					.decode(text)
					.map_err(|_| ValidationError::new(format!("{text} is not valid base64 data")))?;
				Ok(FieldValue::Bytes(bytes))
			}
			FieldKind::List => {
				// Falsy elements (null, false, 0, "", empty containers) are
				// dropped before per-element validation.
				let elements = value.as_array().cloned().unwrap_or_default();
				let mut converted = Vec::new();
				for element in elements.into_iter().filter(|el| !is_falsy(el)) {
					for validator in &self.validators {
						validator.validate(&element)?;
					}
					converted.push(FieldValue::Json(element));
				}
				Ok(FieldValue::List(converted))
			}
			FieldKind::Date => {
				let text = value.as_str().unwrap_or_default();
				let date = NaiveDate::parse_from_str(text, DATE_FORMAT)
					.map_err(|_| ValidationError::new(format!("{text} is not a valid date")))?;
				Ok(FieldValue::Date(date))
			}
			FieldKind::DateTime => {
				let text = value.as_str().unwrap_or_default();
				let datetime = NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
					.map_err(|_| ValidationError::new(format!("{text} is not a valid datetime")))?;
				Ok(FieldValue::DateTime(datetime))
			}
			FieldKind::Uuid => {
				let text = value.as_str().unwrap_or_default();
				let uuid = Uuid::parse_str(text).map_err(|_| {
					ValidationError::new(format!(
						"{text} is a badly formed hexadecimal UUID string"
					))
				})?;
				Ok(FieldValue::Uuid(uuid))
			}
			FieldKind::Json => Ok(FieldValue::Json(value.clone())),
			FieldKind::Model {
				model,
				lookup_field,
			}
			| FieldKind::PrimaryKey {
				model,
				lookup_field,
			} => {
				let instance = lookup_instance(model.as_ref(), lookup_field, value).await?;
				Ok(FieldValue::Instance(instance))
			}
			FieldKind::MultiPrimaryKey {
				model,
				lookup_field,
			} => {
				let keys = value.as_array().cloned().unwrap_or_default();
				let mut instances = Vec::new();
				for key in &keys {
					instances.push(lookup_instance(model.as_ref(), lookup_field, key).await?);
				}
				Ok(FieldValue::Instances(instances))
			}
			FieldKind::Nested(_) => {
				panic!(
					"Field '{}' is a nested serializer; it must be converted by its parent serializer.",
					self.name
				)
			}
		}
	}

	/// Convert a domain attribute value into its wire-safe primitive form.
	///
	/// Null policy is per kind: scalar kinds pass null through, list kinds
	/// render an empty array, reference kinds emit null.
	pub fn to_representation(&self, attr: &Value) -> Value {
		match &self.kind {
			FieldKind::Integer => match attr {
				Value::Number(n) => n
					.as_i64()
					.or_else(|| n.as_f64().map(|f| f as i64))
					.map(|i| Value::Number(Number::from(i)))
					.unwrap_or(Value::Null),
				Value::String(s) => s
					.parse::<i64>()
					.map(|i| Value::Number(Number::from(i)))
					.unwrap_or(Value::Null),
				_ => Value::Null,
			},
			FieldKind::Float | FieldKind::Decimal | FieldKind::Time => attr
				.as_f64()
				.and_then(Number::from_f64)
				.map(Value::Number)
				.unwrap_or(Value::Null),
			FieldKind::Boolean => match attr {
				Value::Bool(b) => Value::Bool(*b),
				Value::Null => Value::Null,
				Value::Number(n) => Value::Bool(n.as_f64().unwrap_or_default() != 0.0),
				Value::String(s) => Value::Bool(!s.is_empty()),
				Value::Array(items) => Value::Bool(!items.is_empty()),
				Value::Object(map) => Value::Bool(!map.is_empty()),
			},
			FieldKind::Char | FieldKind::Url | FieldKind::Choice => match attr {
				Value::String(s) => Value::String(s.clone()),
				Value::Null => Value::Null,
				other => Value::String(other.to_string()),
			},
			FieldKind::Binary => match attr {
				Value::String(s) => Value::String(s.clone()),
				_ => Value::Null,
			},
			FieldKind::List => match attr {
				Value::Array(items) => Value::Array(items.clone()),
				_ => Value::Array(Vec::new()),
			},
			FieldKind::Date | FieldKind::DateTime | FieldKind::Uuid => match attr {
				Value::String(s) => Value::String(s.clone()),
				_ => Value::Null,
			},
			FieldKind::Json => match attr {
				// Documents persisted as encoded text are decoded back.
				Value::String(s) => serde_json::from_str(s).unwrap_or(Value::Null),
				other => other.clone(),
			},
			FieldKind::Model { model, .. } | FieldKind::PrimaryKey { model, .. } => {
				let pk_name = model.describe().pk_field.name;
				match attr {
					Value::Object(map) => map.get(&pk_name).cloned().unwrap_or(Value::Null),
					Value::Array(items) => Value::Array(
						items
							.iter()
							.map(|item| match item {
								Value::Object(map) => {
									map.get(&pk_name).cloned().unwrap_or(Value::Null)
								}
								scalar => scalar.clone(),
							})
							.collect(),
					),
					scalar => scalar.clone(),
				}
			}
			FieldKind::MultiPrimaryKey { .. } => match attr {
				// Each referenced object's full value set.
				Value::Array(items) => Value::Array(items.clone()),
				Value::Null => Value::Array(Vec::new()),
				other => Value::Array(vec![other.clone()]),
			},
			FieldKind::Nested(blueprint) => {
				let empty = Map::new();
				let attrs = attr.as_object().unwrap_or(&empty);
				let mut out = Map::new();
				for child in blueprint.fields().iter().filter(|f| !f.write_only) {
					let child_attr = attrs.get(&child.name).cloned().unwrap_or(Value::Null);
					out.insert(child.name.clone(), child.to_representation(&child_attr));
				}
				Value::Object(out)
			}
		}
	}
}

/// Whether a wire value is falsy in the list-field sense.
fn is_falsy(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::Bool(b) => !b,
		Value::Number(n) => n.as_f64().unwrap_or_default() == 0.0,
		Value::String(s) => s.is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::Object(map) => map.is_empty(),
	}
}

async fn lookup_instance(
	model: &dyn ModelCollaborator,
	lookup_field: &str,
	key: &Value,
) -> Result<crate::model::Instance, FieldError> {
	use crate::error::BackendError;

	match model.get(lookup_field, key).await {
		Ok(instance) => Ok(instance),
		Err(BackendError::NotFound(err)) => Err(FieldError::Invalid(ValidationError::new(
			format!("Incorrect lookup value: {err}"),
		))),
		Err(BackendError::UnknownField(err)) => Err(FieldError::Invalid(ValidationError::new(
			format!("Incorrect lookup field: {err}"),
		))),
		Err(other) => Err(FieldError::Backend(other)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[test]
	fn test_required_rejects_null() {
		let field = Field::integer("count");
		let err = field.validate(&Value::Null).unwrap_err();
		assert_eq!(err.to_string(), "Must be not null");
	}

	#[test]
	fn test_nullable_accepts_null() {
		let field = Field::integer("count").nullable();
		assert!(field.validate(&Value::Null).is_ok());
	}

	#[test]
	fn test_optional_accepts_null() {
		let field = Field::integer("count").required(false);
		assert!(field.validate(&Value::Null).is_ok());
	}

	#[rstest]
	#[case(Field::integer("f"), json!("nope"))]
	#[case(Field::boolean("f"), json!(1))]
	#[case(Field::char("f"), json!(10))]
	#[case(Field::list("f"), json!("abc"))]
	#[case(Field::json("f"), json!("text"))]
	fn test_type_mismatch(#[case] field: Field, #[case] value: Value) {
		let err = field.validate(&value).unwrap_err();
		assert!(err.to_string().starts_with("Must be a"));
	}

	#[test]
	fn test_char_length_bounds() {
		let field = Field::char("name").with_min_length(2).with_max_length(4);
		assert!(field.validate(&json!("abc")).is_ok());
		assert!(field.validate(&json!("a")).is_err());
		assert!(field.validate(&json!("abcde")).is_err());
	}

	#[test]
	fn test_choice_rejects_unknown_value() {
		let field = Field::choice("state", vec![json!("new"), json!("done")]);
		let err = field.validate(&json!("stale")).unwrap_err();
		assert!(err.to_string().contains("new"));
		assert!(err.to_string().contains("done"));
	}

	#[test]
	fn test_attached_validators_run_in_order() {
		let field = Field::char("name")
			.with_validator(Box::new(MinLengthValidator::new(3)))
			.with_validator(Box::new(MaxLengthValidator::new(5)));
		let err = field.validate(&json!("ab")).unwrap_err();
		assert!(err.to_string().contains("less than 3"));
	}

	#[tokio::test]
	async fn test_integer_conversion() {
		let field = Field::integer("count");
		let value = field.to_internal_value(&json!(7)).await.unwrap();
		assert_eq!(value, FieldValue::Int(7));
	}

	#[tokio::test]
	async fn test_date_parses_iso() {
		let field = Field::date("created");
		let value = field.to_internal_value(&json!("2023-04-01")).await.unwrap();
		assert_eq!(
			value,
			FieldValue::Date(NaiveDate::from_ymd_opt(2023, 4, 1).unwrap())
		);
	}

	#[tokio::test]
	async fn test_date_rejects_malformed() {
		let field = Field::date("created");
		let err = field
			.to_internal_value(&json!("01.04.2023"))
			.await
			.unwrap_err();
		assert!(matches!(err, FieldError::Invalid(_)));
	}

	#[tokio::test]
	async fn test_datetime_parses_iso() {
		let field = Field::datetime("updated");
		let value = field
			.to_internal_value(&json!("2023-04-01T10:20:30"))
			.await
			.unwrap();
		let expected = NaiveDate::from_ymd_opt(2023, 4, 1)
			.unwrap()
			.and_hms_opt(10, 20, 30)
			.unwrap();
		assert_eq!(value, FieldValue::DateTime(expected));
	}

	#[tokio::test]
	async fn test_uuid_error_is_descriptive() {
		let field = Field::uuid("token");
		let err = field
			.to_internal_value(&json!("not-a-uuid"))
			.await
			.unwrap_err();
		let FieldError::Invalid(err) = err else {
			panic!("expected a validation error");
		};
		assert!(err.to_string().contains("badly formed hexadecimal"));
	}

	#[tokio::test]
	async fn test_list_drops_falsy_elements() {
		let field = Field::list("options");
		let value = field
			.to_internal_value(&json!(["a", "", 0, false, "b", null]))
			.await
			.unwrap();
		assert_eq!(
			value,
			FieldValue::List(vec![
				FieldValue::Json(json!("a")),
				FieldValue::Json(json!("b")),
			])
		);
	}

	#[tokio::test]
	async fn test_binary_roundtrip() {
		let field = Field::binary("payload");
		let value = field.to_internal_value(&json!("c2Nhbg==")).await.unwrap();
		assert_eq!(value, FieldValue::Bytes(b"scan".to_vec()));
		assert_eq!(value.to_value(), json!("c2Nhbg=="));
	}

	#[tokio::test]
	async fn test_binary_rejects_garbage() {
		let field = Field::binary("payload");
		let err = field.to_internal_value(&json!("%%%")).await.unwrap_err();
		assert!(matches!(err, FieldError::Invalid(_)));
	}

	#[test]
	fn test_representation_of_scalars() {
		assert_eq!(
			Field::integer("n").to_representation(&json!(3.9)),
			json!(3)
		);
		assert_eq!(
			Field::char("s").to_representation(&json!("text")),
			json!("text")
		);
		assert_eq!(
			Field::boolean("b").to_representation(&json!(true)),
			json!(true)
		);
	}

	#[test]
	fn test_json_representation_decodes_text() {
		let field = Field::json("options");
		assert_eq!(
			field.to_representation(&json!(r#"{"ports": [80, 443]}"#)),
			json!({"ports": [80, 443]})
		);
	}

	#[test]
	fn test_list_representation_of_non_array_is_empty() {
		let field = Field::list("options");
		assert_eq!(field.to_representation(&json!(null)), json!([]));
	}

	#[test]
	fn test_get_initial_static_and_provider() {
		let field = Field::boolean("enabled").with_initial(json!(true));
		assert_eq!(field.get_initial(), json!(true));

		let field = Field::integer("attempts").with_initial_provider(|| json!(3));
		assert_eq!(field.get_initial(), json!(3));

		let field = Field::integer("attempts");
		assert_eq!(field.get_initial(), Value::Null);
	}

	#[test]
	fn test_read_only_clears_required() {
		let field = Field::integer("id").read_only();
		assert!(field.read_only);
		assert!(!field.required);
	}
}
