//! Composable single-value validation rules
//!
//! A validator is a stateless rule object holding its own limit or pattern.
//! Fields run their attached validators in declaration order and stop at the
//! first violation. New kinds are added by implementing [`Validator`]; there
//! is no registration step.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// A single composable rule applied to one wire value.
pub trait Validator: Send + Sync + std::fmt::Debug {
	/// Check one value, failing with a formatted, human-readable message.
	fn validate(&self, value: &Value) -> Result<(), ValidationError>;

	/// Clone into a box so field registries can be deep-copied.
	fn clone_box(&self) -> Box<dyn Validator>;
}

impl Clone for Box<dyn Validator> {
	fn clone(&self) -> Self {
		self.clone_box()
	}
}

/// Character length of a wire value, for length-bounded rules.
///
/// Strings count characters, arrays count elements; anything else has no
/// length and passes length checks untouched.
fn value_len(value: &Value) -> Option<usize> {
	match value {
		Value::String(s) => Some(s.chars().count()),
		Value::Array(items) => Some(items.len()),
		_ => None,
	}
}

fn value_text(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

/// Fails when a value is longer than the configured limit.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use wireform::{MaxLengthValidator, Validator};
///
/// let validator = MaxLengthValidator::new(5);
/// assert!(validator.validate(&json!("probe")).is_ok());
/// assert!(validator.validate(&json!("too long")).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MaxLengthValidator {
	limit: usize,
}

impl MaxLengthValidator {
	pub fn new(limit: usize) -> Self {
		Self { limit }
	}
}

impl Validator for MaxLengthValidator {
	fn validate(&self, value: &Value) -> Result<(), ValidationError> {
		if let Some(len) = value_len(value)
			&& len > self.limit
		{
			return Err(ValidationError::new(format!(
				"{} len is greater than {}",
				value_text(value),
				self.limit
			)));
		}
		Ok(())
	}

	fn clone_box(&self) -> Box<dyn Validator> {
		Box::new(self.clone())
	}
}

/// Fails when a value is shorter than the configured limit.
#[derive(Debug, Clone)]
pub struct MinLengthValidator {
	limit: usize,
}

impl MinLengthValidator {
	pub fn new(limit: usize) -> Self {
		Self { limit }
	}
}

impl Validator for MinLengthValidator {
	fn validate(&self, value: &Value) -> Result<(), ValidationError> {
		if let Some(len) = value_len(value)
			&& len < self.limit
		{
			return Err(ValidationError::new(format!(
				"{} len is less than {}",
				value_text(value),
				self.limit
			)));
		}
		Ok(())
	}

	fn clone_box(&self) -> Box<dyn Validator> {
		Box::new(self.clone())
	}
}

static EMAIL_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").unwrap());

/// Fails when a value is not a plausible email address.
#[derive(Debug, Clone, Default)]
pub struct EmailValidator;

impl EmailValidator {
	pub fn new() -> Self {
		Self
	}
}

impl Validator for EmailValidator {
	fn validate(&self, value: &Value) -> Result<(), ValidationError> {
		let text = value.as_str().unwrap_or_default();
		if !text.contains('@') || !EMAIL_REGEX.is_match(text) {
			return Err(ValidationError::new(format!(
				"{} is incorrect email address",
				value_text(value)
			)));
		}
		Ok(())
	}

	fn clone_box(&self) -> Box<dyn Validator> {
		Box::new(self.clone())
	}
}

static DATE_REGEX: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"^[0-9]{2}[./-]?[0-9]{2}[./-]?[0-9]{4}$").unwrap());

/// Fails when a value does not look like a day-month-year date.
#[derive(Debug, Clone, Default)]
pub struct DateValidator;

impl DateValidator {
	pub fn new() -> Self {
		Self
	}
}

impl Validator for DateValidator {
	fn validate(&self, value: &Value) -> Result<(), ValidationError> {
		let text = value.as_str().unwrap_or_default();
		if !DATE_REGEX.is_match(text) {
			return Err(ValidationError::new(format!(
				"{} is incorrect date",
				value_text(value)
			)));
		}
		Ok(())
	}

	fn clone_box(&self) -> Box<dyn Validator> {
		Box::new(self.clone())
	}
}
