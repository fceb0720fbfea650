//! Error types for validation and serialization
//!
//! Two disjoint tiers:
//! - Validation errors are expected, per-field and recoverable. They are
//!   collected into an [`ErrorMap`] and handed back to the caller as data.
//! - Contract violations (calling `save()` before `is_valid()`, ambiguous
//!   field configuration, a collaborator returning garbage) are programmer
//!   errors and panic. They are documented under `# Panics` on the methods
//!   that enforce them and are intentionally never caught.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// Ordered mapping of field name to the error(s) recorded for it.
///
/// Iteration order follows field declaration order, which is itself part of
/// the engine contract.
pub type ErrorMap = IndexMap<String, ErrorDetail>;

/// A single entry in an [`ErrorMap`].
///
/// Nested serializer fields record a whole child error mapping under their
/// own name; list serializers record one (optional) entry per input element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorDetail {
	/// Flat, human-readable message for one field.
	Message(String),
	/// Error mapping of a nested serializer, keyed by the child's fields.
	Nested(ErrorMap),
	/// Per-element results of a list serializer; `None` marks a valid element.
	Items(Vec<Option<ErrorDetail>>),
}

impl ErrorDetail {
	/// Flat message, if this entry carries one.
	pub fn message(&self) -> Option<&str> {
		match self {
			ErrorDetail::Message(msg) => Some(msg),
			_ => None,
		}
	}
}

impl From<ValidationError> for ErrorDetail {
	fn from(err: ValidationError) -> Self {
		match err {
			ValidationError::Message(msg) => ErrorDetail::Message(msg),
			ValidationError::Fields(map) => ErrorDetail::Nested(map),
		}
	}
}

/// A recoverable, per-field validation failure.
///
/// Carries either a formatted message or, for nested serializers, a mapping
/// of messages keyed by the child's field names.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
	/// Human-readable description of the violation.
	#[error("{0}")]
	Message(String),
	/// Nested error mapping produced by a child serializer.
	#[error("invalid fields: {}", format_field_names(.0))]
	Fields(ErrorMap),
}

impl ValidationError {
	/// Create a validation error from a message.
	pub fn new(message: impl Into<String>) -> Self {
		ValidationError::Message(message.into())
	}
}

fn format_field_names(map: &ErrorMap) -> String {
	map.keys().cloned().collect::<Vec<_>>().join(", ")
}

/// Failure reported by the model collaborator.
///
/// `NotFound` and `UnknownField` are translated into field-level
/// [`ValidationError`]s by relation fields; `Storage` is an internal failure
/// that aborts the whole request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
	/// No object matched the lookup.
	#[error("object does not exist: {0}")]
	NotFound(String),
	/// The lookup named a field the model does not have.
	#[error("unknown lookup field: {0}")]
	UnknownField(String),
	/// The storage layer failed; not recoverable at this level.
	#[error("storage failure: {0}")]
	Storage(String),
}

/// Error surfaced by serializer entry points.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SerializerError {
	/// Validation failed and the caller opted into raise-on-error.
	#[error("validation failed for fields: {}", format_field_names(.0))]
	Validation(ErrorMap),
	/// The model collaborator failed mid-operation.
	#[error(transparent)]
	Backend(#[from] BackendError),
}

impl SerializerError {
	/// The error mapping, if this is a validation failure.
	pub fn errors(&self) -> Option<&ErrorMap> {
		match self {
			SerializerError::Validation(map) => Some(map),
			SerializerError::Backend(_) => None,
		}
	}

	/// Whether this is a recoverable validation failure.
	pub fn is_validation_error(&self) -> bool {
		matches!(self, SerializerError::Validation(_))
	}
}

/// Outcome of converting one field's wire value.
///
/// `Invalid` is caught and merged into the serializer's error aggregate;
/// `Backend` propagates and aborts the request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
	#[error(transparent)]
	Invalid(#[from] ValidationError),
	#[error(transparent)]
	Backend(#[from] BackendError),
}
