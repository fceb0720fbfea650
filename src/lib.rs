//! Declarative data binding and validation for CRUD APIs
//!
//! wireform converts between wire-format primitives (JSON-like mappings) and
//! domain-model instances: a composable validator/field hierarchy, aggregate
//! serializers with an explicit validation lifecycle, list wrapping, and
//! model serializers that derive their field registry from a persisted
//! model's schema snapshot. Transport and persistence stay outside; the
//! engine only consumes a raw decoded mapping and a narrow model
//! collaborator contract.

pub mod error;
pub mod fields;
pub mod model;
pub mod model_serializer;
pub mod nested;
pub mod serializer;
pub mod validators;
pub mod value;

pub use error::{BackendError, ErrorDetail, ErrorMap, FieldError, SerializerError, ValidationError};
pub use fields::{Field, FieldKind, Initial};
pub use model::{FieldDescriptor, Instance, ModelCollaborator, ModelSchema};
pub use model_serializer::{
	FieldOverrides, FieldSelection, ModelBound, ModelOptions, ModelSerializer, ModelSerializerDef,
};
pub use nested::ListSerializer;
pub use serializer::{
	Binding, Blueprint, BlueprintBuilder, Bound, NON_FIELD_ERRORS, Serializer, SerializerState,
};
pub use validators::{
	DateValidator, EmailValidator, MaxLengthValidator, MinLengthValidator, Validator,
};
pub use value::{FieldValue, ValidatedData, validated_to_attrs};
