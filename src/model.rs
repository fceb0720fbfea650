//! Model collaborator contract
//!
//! The engine never talks to storage directly. Everything it needs from the
//! persistence layer goes through [`ModelCollaborator`]: lookup, creation,
//! mutation, deletion, relation handling and the schema snapshot that drives
//! automatic field generation.

use crate::error::BackendError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A domain object materialized by the model collaborator.
///
/// Attribute access is an explicit name-to-value mapping established when the
/// object is materialized; there is no reflection over arbitrary domain
/// types. A many-valued relation whose attribute is absent (or null) is an
/// unresolved relation handle: the serializer materializes it through the
/// collaborator before producing a representation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
	attrs: Map<String, Value>,
}

impl Instance {
	/// Create an empty instance.
	pub fn new() -> Self {
		Self { attrs: Map::new() }
	}

	/// Wrap an existing attribute mapping.
	pub fn from_attrs(attrs: Map<String, Value>) -> Self {
		Self { attrs }
	}

	/// Current value of a named attribute.
	pub fn attr(&self, name: &str) -> Option<&Value> {
		self.attrs.get(name)
	}

	/// Assign a named attribute.
	pub fn set_attr(&mut self, name: impl Into<String>, value: Value) {
		self.attrs.insert(name.into(), value);
	}

	/// Primary key value under the given pk attribute name.
	pub fn pk(&self, pk_field: &str) -> Option<&Value> {
		self.attrs.get(pk_field)
	}

	/// The full attribute mapping as a wire object.
	pub fn values(&self) -> Value {
		Value::Object(self.attrs.clone())
	}

	/// Borrow the underlying attribute mapping.
	pub fn attrs(&self) -> &Map<String, Value> {
		&self.attrs
	}
}

impl From<Value> for Instance {
	fn from(value: Value) -> Self {
		match value {
			Value::Object(attrs) => Self { attrs },
			_ => Self::new(),
		}
	}
}

/// One entry of a model schema snapshot.
///
/// `storage_type` is the persistence layer's own type name (`"IntField"`,
/// `"CharField"`, `"ManyToManyField"`, ...); the model serializer maps it to
/// a serializer field through a fixed lookup table. Relation descriptors
/// carry the collaborator of the referenced model so generated relation
/// fields know where to resolve lookups.
#[derive(Clone)]
pub struct FieldDescriptor {
	pub name: String,
	pub storage_type: String,
	pub nullable: bool,
	pub unique: bool,
	pub default: Option<Value>,
	pub related: Option<Arc<dyn ModelCollaborator>>,
}

impl FieldDescriptor {
	/// Describe a field by name and storage type name.
	pub fn new(name: impl Into<String>, storage_type: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			storage_type: storage_type.into(),
			nullable: false,
			unique: false,
			default: None,
			related: None,
		}
	}

	/// Mark the field as nullable.
	pub fn nullable(mut self) -> Self {
		self.nullable = true;
		self
	}

	/// Mark the field as unique.
	pub fn unique(mut self) -> Self {
		self.unique = true;
		self
	}

	/// Attach a storage-level default.
	pub fn with_default(mut self, default: Value) -> Self {
		self.default = Some(default);
		self
	}

	/// Attach the collaborator of the referenced model (relations only).
	pub fn with_related(mut self, related: Arc<dyn ModelCollaborator>) -> Self {
		self.related = Some(related);
		self
	}
}

impl std::fmt::Debug for FieldDescriptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FieldDescriptor")
			.field("name", &self.name)
			.field("storage_type", &self.storage_type)
			.field("nullable", &self.nullable)
			.field("unique", &self.unique)
			.field("default", &self.default)
			.field("related", &self.related.as_ref().map(|m| m.describe().name))
			.finish()
	}
}

/// Snapshot of a model's structure, as reported by `describe()`.
///
/// Derived on demand and used only at field-generation time; serializer
/// instances do not retain it.
#[derive(Debug, Clone)]
pub struct ModelSchema {
	pub name: String,
	pub abstract_model: bool,
	pub pk_field: FieldDescriptor,
	pub data_fields: Vec<FieldDescriptor>,
	pub fk_fields: Vec<FieldDescriptor>,
	pub o2o_fields: Vec<FieldDescriptor>,
	pub m2m_fields: Vec<FieldDescriptor>,
}

impl ModelSchema {
	/// Describe a concrete model with the given primary key descriptor.
	///
	/// # Examples
	///
	/// ```
	/// use wireform::{FieldDescriptor, ModelSchema};
	///
	/// let schema = ModelSchema::new("task", FieldDescriptor::new("id", "IntField"))
	/// 	.data_field(FieldDescriptor::new("name", "CharField").nullable());
	/// assert_eq!(schema.iter_all().count(), 2);
	/// ```
	pub fn new(name: impl Into<String>, pk_field: FieldDescriptor) -> Self {
		Self {
			name: name.into(),
			abstract_model: false,
			pk_field,
			data_fields: Vec::new(),
			fk_fields: Vec::new(),
			o2o_fields: Vec::new(),
			m2m_fields: Vec::new(),
		}
	}

	/// Mark the model as abstract (not usable with a model serializer).
	pub fn abstract_model(mut self) -> Self {
		self.abstract_model = true;
		self
	}

	/// Append a plain data field descriptor.
	pub fn data_field(mut self, field: FieldDescriptor) -> Self {
		self.data_fields.push(field);
		self
	}

	/// Append a foreign-key descriptor.
	pub fn fk_field(mut self, field: FieldDescriptor) -> Self {
		self.fk_fields.push(field);
		self
	}

	/// Append a one-to-one descriptor.
	pub fn o2o_field(mut self, field: FieldDescriptor) -> Self {
		self.o2o_fields.push(field);
		self
	}

	/// Append a many-to-many descriptor.
	pub fn m2m_field(mut self, field: FieldDescriptor) -> Self {
		self.m2m_fields.push(field);
		self
	}

	/// All descriptors in schema order: pk, data, fk, o2o, m2m.
	pub fn iter_all(&self) -> impl Iterator<Item = &FieldDescriptor> {
		std::iter::once(&self.pk_field)
			.chain(self.data_fields.iter())
			.chain(self.fk_fields.iter())
			.chain(self.o2o_fields.iter())
			.chain(self.m2m_fields.iter())
	}

	/// Names of the many-to-many fields.
	pub fn m2m_names(&self) -> Vec<String> {
		self.m2m_fields.iter().map(|f| f.name.clone()).collect()
	}
}

/// The persistence abstraction consumed by the engine.
///
/// Every method that touches storage is a suspension point; calls are made
/// sequentially within one logical request, never fanned out across fields.
#[async_trait]
pub trait ModelCollaborator: Send + Sync {
	/// Schema snapshot used at field-generation time.
	fn describe(&self) -> ModelSchema;

	/// Look a single object up by one field.
	///
	/// # Errors
	///
	/// `NotFound` if no object matches, `UnknownField` if `lookup_field` is
	/// not part of the model.
	async fn get(&self, lookup_field: &str, key: &Value) -> Result<Instance, BackendError>;

	/// Construct and persist a new object from scalar attributes.
	async fn create(&self, attrs: Map<String, Value>) -> Result<Instance, BackendError>;

	/// Persist the current attribute state of an existing object.
	async fn save(&self, instance: &Instance) -> Result<(), BackendError>;

	/// Delete an existing object.
	async fn delete(&self, instance: &Instance) -> Result<(), BackendError>;

	/// Materialize a relation handle into a concrete ordered sequence.
	async fn related(&self, instance: &Instance, field: &str)
	-> Result<Vec<Instance>, BackendError>;

	/// Remove every object from a many-valued relation.
	async fn clear_relation(&self, instance: &Instance, field: &str) -> Result<(), BackendError>;

	/// Add one object to a many-valued relation.
	async fn add_to_relation(
		&self,
		instance: &Instance,
		field: &str,
		item: &Instance,
	) -> Result<(), BackendError>;
}
