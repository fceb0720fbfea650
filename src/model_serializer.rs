//! Schema-introspecting serializer
//!
//! A model serializer derives its field registry from a model collaborator's
//! schema snapshot, merging generated fields with explicitly declared ones.
//! Storage type names map to field kinds through a fixed lookup table;
//! configuration mistakes (abstract model, ambiguous field selection,
//! unmappable storage types) are fatal at definition time, not request time.

use crate::error::{BackendError, ErrorMap, SerializerError};
use crate::fields::{Field, Initial};
use crate::model::{FieldDescriptor, Instance, ModelCollaborator};
use crate::nested::ListSerializer;
use crate::serializer::{Binding, Blueprint, Serializer, SerializerState};
use crate::validators::Validator;
use crate::value::{FieldValue, ValidatedData, validated_to_attrs};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Which generated fields a model serializer exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
	/// Every mappable model field.
	All,
	/// An explicit allow-list, used verbatim and in its own order.
	Names(Vec<String>),
}

impl FieldSelection {
	/// Convenience constructor for an explicit allow-list.
	pub fn names<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		FieldSelection::Names(names.into_iter().map(Into::into).collect())
	}
}

/// Per-field overrides merged on top of generated field kwargs.
///
/// Overrides win over descriptor-derived kwargs. A `read_only` override
/// strips the kwargs that are meaningless on a read-only field (required,
/// validators, length bounds, initial).
#[derive(Debug, Clone, Default)]
pub struct FieldOverrides {
	pub read_only: Option<bool>,
	pub write_only: Option<bool>,
	pub required: Option<bool>,
	pub nullable: Option<bool>,
	pub initial: Option<Value>,
	pub min_length: Option<usize>,
	pub max_length: Option<usize>,
	pub validators: Vec<Box<dyn Validator>>,
}

impl FieldOverrides {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn read_only(mut self) -> Self {
		self.read_only = Some(true);
		self
	}

	pub fn write_only(mut self) -> Self {
		self.write_only = Some(true);
		self
	}

	pub fn required(mut self, required: bool) -> Self {
		self.required = Some(required);
		self
	}

	pub fn nullable(mut self) -> Self {
		self.nullable = Some(true);
		self
	}

	pub fn initial(mut self, initial: Value) -> Self {
		self.initial = Some(initial);
		self
	}

	pub fn min_length(mut self, min_length: usize) -> Self {
		self.min_length = Some(min_length);
		self
	}

	pub fn max_length(mut self, max_length: usize) -> Self {
		self.max_length = Some(max_length);
		self
	}

	pub fn validator(mut self, validator: Box<dyn Validator>) -> Self {
		self.validators.push(validator);
		self
	}
}

/// Configuration block of a model serializer definition.
#[derive(Clone)]
pub struct ModelOptions {
	name: String,
	model: Arc<dyn ModelCollaborator>,
	fields: Option<FieldSelection>,
	exclude: Option<Vec<String>>,
	read_only_fields: Vec<String>,
	extra_kwargs: HashMap<String, FieldOverrides>,
}

impl ModelOptions {
	/// Configure a definition by name (used in diagnostics) and model.
	pub fn new(name: impl Into<String>, model: Arc<dyn ModelCollaborator>) -> Self {
		Self {
			name: name.into(),
			model,
			fields: None,
			exclude: None,
			read_only_fields: Vec::new(),
			extra_kwargs: HashMap::new(),
		}
	}

	/// Select the exposed fields. Mutually exclusive with `exclude`.
	pub fn fields(mut self, selection: FieldSelection) -> Self {
		self.fields = Some(selection);
		self
	}

	/// Deny-list applied against the generated default set. Mutually
	/// exclusive with `fields`.
	pub fn exclude<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.exclude = Some(names.into_iter().map(Into::into).collect());
		self
	}

	/// Shorthand marking the named fields read-only; folded into
	/// `extra_kwargs` at synthesis time.
	pub fn read_only_fields<I, S>(mut self, names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.read_only_fields = names.into_iter().map(Into::into).collect();
		self
	}

	/// Per-field kwargs override for a generated field.
	pub fn extra_kwargs(mut self, name: impl Into<String>, overrides: FieldOverrides) -> Self {
		self.extra_kwargs.insert(name.into(), overrides);
		self
	}

	/// The serializer definition name.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// The model collaborator.
	pub fn model(&self) -> &Arc<dyn ModelCollaborator> {
		&self.model
	}
}

impl std::fmt::Debug for ModelOptions {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ModelOptions")
			.field("name", &self.name)
			.field("model", &self.model.describe().name)
			.field("fields", &self.fields)
			.field("exclude", &self.exclude)
			.field("read_only_fields", &self.read_only_fields)
			.finish()
	}
}

/// A model serializer definition: configuration plus the synthesized
/// template. Built once at program start and shared across requests.
#[derive(Debug)]
pub struct ModelSerializerDef {
	options: ModelOptions,
	blueprint: Arc<Blueprint>,
}

impl ModelSerializerDef {
	/// Synthesize the field registry and freeze the template.
	///
	/// # Panics
	///
	/// Panics on configuration errors: an abstract model, neither or both of
	/// `fields`/`exclude`, a declared field missing from an explicit
	/// allow-list, an excluded field that is declared or unknown, a model
	/// without mappable fields, or a storage type with no field mapping.
	pub fn new(options: ModelOptions, declared: Vec<Field>) -> Arc<Self> {
		let fields = synthesize_fields(&options, &declared);
		debug!(
			serializer = %options.name,
			fields = fields.len(),
			"synthesized model serializer fields"
		);
		let mut builder = Blueprint::builder().model(Arc::clone(&options.model));
		for field in fields {
			builder = builder.field(field);
		}
		Arc::new(Self {
			options,
			blueprint: builder.build(),
		})
	}

	/// The synthesized template.
	pub fn blueprint(&self) -> &Arc<Blueprint> {
		&self.blueprint
	}

	/// The configuration block.
	pub fn options(&self) -> &ModelOptions {
		&self.options
	}

	/// Construct a serializer for this definition; a many binding redirects
	/// to a list serializer over the same template.
	pub fn bind(self: &Arc<Self>, binding: Binding) -> ModelBound {
		if binding.many {
			ModelBound::Many(self.blueprint.many(binding))
		} else {
			ModelBound::One(ModelSerializer {
				def: Arc::clone(self),
				inner: Serializer::from_blueprint(&self.blueprint, binding),
			})
		}
	}

	/// Convenience constructor for a single-object serializer.
	pub fn serializer(self: &Arc<Self>, binding: Binding) -> ModelSerializer {
		self.bind(binding).one()
	}
}

/// Result of [`ModelSerializerDef::bind`].
#[derive(Debug)]
pub enum ModelBound {
	One(ModelSerializer),
	Many(ListSerializer),
}

impl ModelBound {
	/// Unwrap the single-object serializer.
	///
	/// # Panics
	///
	/// Panics when the binding produced a list serializer.
	pub fn one(self) -> ModelSerializer {
		match self {
			ModelBound::One(serializer) => serializer,
			ModelBound::Many(_) => panic!("Binding requested `many`; this is a list serializer."),
		}
	}

	/// Unwrap the list serializer.
	///
	/// # Panics
	///
	/// Panics when the binding produced a single-object serializer.
	pub fn many(self) -> ListSerializer {
		match self {
			ModelBound::One(_) => {
				panic!("Binding did not request `many`; this is a single serializer.")
			}
			ModelBound::Many(serializer) => serializer,
		}
	}
}

/// A live model-backed serializer: the generic engine plus persistence
/// hooks delegating to the model collaborator.
#[derive(Debug)]
pub struct ModelSerializer {
	def: Arc<ModelSerializerDef>,
	inner: Serializer,
}

impl ModelSerializer {
	/// The definition this serializer was built from.
	pub fn definition(&self) -> &Arc<ModelSerializerDef> {
		&self.def
	}

	/// The underlying generic serializer.
	pub fn inner(&self) -> &Serializer {
		&self.inner
	}

	/// Mutable access to the underlying generic serializer.
	pub fn inner_mut(&mut self) -> &mut Serializer {
		&mut self.inner
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SerializerState {
		self.inner.state()
	}

	/// See [`Serializer::is_valid`].
	pub async fn is_valid(&mut self) -> Result<bool, SerializerError> {
		self.inner.is_valid().await
	}

	/// See [`Serializer::validate`].
	pub async fn validate(&mut self) -> Result<(), SerializerError> {
		self.inner.validate().await
	}

	/// See [`Serializer::validated_data`].
	pub fn validated_data(&self) -> Option<&ValidatedData> {
		self.inner.validated_data()
	}

	/// See [`Serializer::errors`].
	pub fn errors(&self) -> Option<&ErrorMap> {
		self.inner.errors()
	}

	/// See [`Serializer::data`].
	pub async fn data(&mut self) -> Result<Value, SerializerError> {
		self.inner.data().await
	}

	/// See [`Serializer::get_initial`].
	pub fn get_initial(&self) -> Value {
		self.inner.get_initial()
	}

	/// See [`Serializer::to_representation`].
	pub async fn to_representation(&self, instance: &Instance) -> Result<Value, BackendError> {
		self.inner.to_representation(instance).await
	}

	/// Persist the validated data through the model collaborator.
	///
	/// Bound to an existing instance this delegates to [`Self::update`],
	/// otherwise to [`Self::create`].
	///
	/// # Panics
	///
	/// Panics when called before a successful `is_valid()` or when errors
	/// are present.
	pub async fn save(&mut self) -> Result<Instance, SerializerError> {
		self.inner.assert_saveable();
		let validated = self.inner.take_validated_for_save();
		let saved = if self.inner.has_instance() {
			let bound = self.inner.instance().cloned().unwrap();
			debug!(serializer = %self.def.options.name, "updating bound instance");
			self.update(&bound, validated).await?
		} else {
			debug!(serializer = %self.def.options.name, "creating new instance");
			self.create(validated).await?
		};
		self.inner.mark_saved(saved.clone());
		Ok(saved)
	}

	/// Construct and persist a new object.
	///
	/// Many-to-many values are extracted before the row is constructed (the
	/// relation rows need an existing primary key); only after construction
	/// succeeds are the relations cleared and repopulated.
	pub async fn create(&self, mut validated: ValidatedData) -> Result<Instance, SerializerError> {
		let options = &self.def.options;
		let schema = options.model.describe();

		let mut many_to_many: Vec<(String, Vec<Instance>)> = Vec::new();
		for name in schema.m2m_names() {
			if let Some(value) = validated.shift_remove(&name) {
				many_to_many.push((name, relation_items(value)));
			}
		}

		let attrs = validated_to_attrs(&validated);
		let instance = options.model.create(attrs).await.map_err(|err| {
			BackendError::Storage(format!(
				"Got `{err}` when calling `{model}.create()`. This may be because you have a \
				 writable field on the serializer `{serializer}` that is not a valid argument to \
				 `{model}.create()`. You may need to make the field read-only.",
				model = schema.name,
				serializer = options.name,
			))
		})?;

		for (name, items) in many_to_many {
			options.model.clear_relation(&instance, &name).await?;
			for item in &items {
				options.model.add_to_relation(&instance, &name, item).await?;
			}
		}

		Ok(instance)
	}

	/// Apply validated data onto an existing object and persist it once.
	///
	/// Many-to-many names route to relation clear/repopulate; everything
	/// else is direct attribute assignment. Persistence is committed once
	/// after all assignments.
	pub async fn update(
		&self,
		instance: &Instance,
		validated: ValidatedData,
	) -> Result<Instance, SerializerError> {
		let options = &self.def.options;
		let schema = options.model.describe();
		let m2m_names = schema.m2m_names();

		let mut updated = instance.clone();
		let mut relations: Vec<(String, Vec<Instance>)> = Vec::new();
		for (name, value) in validated {
			if m2m_names.contains(&name) {
				relations.push((name, relation_items(value)));
			} else {
				updated.set_attr(name, value.to_value());
			}
		}

		for (name, items) in &relations {
			options.model.clear_relation(&updated, name).await?;
			for item in items {
				options.model.add_to_relation(&updated, name, item).await?;
			}
		}

		options.model.save(&updated).await?;
		Ok(updated)
	}
}

/// Resolved references carried by a many-valued relation value.
fn relation_items(value: FieldValue) -> Vec<Instance> {
	match value {
		FieldValue::Instances(items) => items,
		FieldValue::Instance(item) => vec![item],
		_ => Vec::new(),
	}
}

/// Build the final field registry for a definition.
fn synthesize_fields(options: &ModelOptions, declared: &[Field]) -> Vec<Field> {
	let schema = options.model.describe();

	assert!(
		!schema.abstract_model,
		"Cannot use a model serializer with the abstract model '{}'.",
		schema.name
	);
	assert!(
		!(options.fields.is_some() && options.exclude.is_some()),
		"Cannot set both 'fields' and 'exclude' options on serializer {}.",
		options.name
	);
	assert!(
		options.fields.is_some() || options.exclude.is_some(),
		"Creating a model serializer without either the 'fields' option or the 'exclude' option \
		 is disallowed. Add an explicit fields = FieldSelection::All to the {} serializer.",
		options.name
	);

	// Generated default set, in schema order: pk, data, fk, o2o, m2m.
	let generated: Vec<&FieldDescriptor> = schema.iter_all().collect();
	assert!(!generated.is_empty(), "Model must have fields");

	let declared_names: Vec<&str> = declared.iter().map(|f| f.name.as_str()).collect();

	let field_names: Vec<String> = match (&options.fields, &options.exclude) {
		(Some(FieldSelection::Names(names)), _) => {
			for declared_name in &declared_names {
				assert!(
					names.iter().any(|n| n == declared_name),
					"The field '{declared_name}' was declared on serializer {}, but has not been \
					 included in the 'fields' option.",
					options.name
				);
			}
			names.clone()
		}
		(Some(FieldSelection::All), _) => generated.iter().map(|d| d.name.clone()).collect(),
		(None, Some(exclude)) => {
			let mut names: Vec<String> = generated.iter().map(|d| d.name.clone()).collect();
			for excluded in exclude {
				assert!(
					!declared_names.contains(&excluded.as_str()),
					"Cannot both declare the field '{excluded}' and include it in the {} \
					 'exclude' option.",
					options.name
				);
				assert!(
					names.iter().any(|n| n == excluded),
					"The field '{excluded}' was included on serializer {} in the 'exclude' \
					 option, but does not match any model field.",
					options.name
				);
				names.retain(|n| n != excluded);
			}
			names
		}
		(None, None) => unreachable!("checked above"),
	};

	// read_only_fields is shorthand for extra_kwargs { read_only: true }.
	let mut extra_kwargs = options.extra_kwargs.clone();
	for name in &options.read_only_fields {
		extra_kwargs.entry(name.clone()).or_default().read_only = Some(true);
	}

	let mut fields = Vec::new();
	for field_name in &field_names {
		if let Some(field) = declared.iter().find(|f| &f.name == field_name) {
			fields.push(field.clone());
			continue;
		}

		let Some(descriptor) = generated.iter().find(|d| &d.name == field_name) else {
			// Allow-list names matching neither a declared field nor a model
			// field produce nothing.
			continue;
		};

		let base = field_for_descriptor(descriptor, &options.name, &schema.name);
		let field = apply_overrides(base, extra_kwargs.get(field_name));
		fields.push(field);
	}

	fields
}

/// Map one schema descriptor to a serializer field via the fixed
/// storage-type lookup table.
///
/// # Panics
///
/// Panics on a storage type with no mapping, or on a relation descriptor
/// that does not carry its related model's collaborator.
fn field_for_descriptor(
	descriptor: &FieldDescriptor,
	serializer_name: &str,
	model_name: &str,
) -> Field {
	let name = descriptor.name.clone();
	let mut field = match descriptor.storage_type.as_str() {
		"IntField" | "BigIntField" | "SmallIntField" => Field::integer(name),
		"CharField" | "TextField" => Field::char(name),
		"BinaryField" => Field::binary(name),
		"BooleanField" => Field::boolean(name),
		"DateField" => Field::date(name),
		"DatetimeField" => Field::datetime(name),
		"DecimalField" => Field::decimal(name),
		"FloatField" => Field::float(name),
		"TimeDeltaField" => Field::time(name),
		"UUIDField" => Field::uuid(name),
		"JSONField" => Field::json(name),
		"ForeignKeyField" | "ForeignKeyFieldInstance" | "OneToOneField"
		| "OneToOneFieldInstance" => Field::primary_key(name, related_model(descriptor)),
		"ManyToManyField" => Field::multi_primary_key(name, related_model(descriptor)),
		other => panic!(
			"Field '{}' of model '{model_name}' on serializer {serializer_name} has storage \
			 type '{other}' with no serializer field mapping.",
			descriptor.name
		),
	};

	if descriptor.nullable {
		field = field.nullable();
	}
	if let Some(default) = &descriptor.default {
		field = field.with_initial(default.clone()).required(false);
	}
	field
}

fn related_model(descriptor: &FieldDescriptor) -> Arc<dyn ModelCollaborator> {
	descriptor.related.clone().unwrap_or_else(|| {
		panic!(
			"Relation field '{}' does not carry its related model's collaborator.",
			descriptor.name
		)
	})
}

/// Merge per-field overrides on top of a generated field; overrides win.
fn apply_overrides(mut field: Field, overrides: Option<&FieldOverrides>) -> Field {
	let Some(overrides) = overrides else {
		return field;
	};

	if overrides.read_only == Some(true) {
		// Required, validators, length bounds and initial are meaningless on
		// a read-only field; strip them before applying the override.
		field.required = false;
		field.validators.clear();
		field.min_length = None;
		field.max_length = None;
		field.initial = Initial::None;
		field.read_only = true;
	}
	if overrides.write_only == Some(true) {
		field.write_only = true;
	}
	if let Some(required) = overrides.required
		&& !field.read_only
	{
		field.required = required;
	}
	if overrides.nullable == Some(true) {
		field.nullable = true;
	}
	if let Some(initial) = &overrides.initial
		&& !field.read_only
	{
		field.initial = Initial::Value(initial.clone());
		field.required = false;
	}
	if !field.read_only {
		if let Some(min_length) = overrides.min_length {
			field.min_length = Some(min_length);
		}
		if let Some(max_length) = overrides.max_length {
			field.max_length = Some(max_length);
		}
		for validator in &overrides.validators {
			field.validators.push(validator.clone());
		}
	}

	field
}
