//! Serializer engine: templates, instances and lifecycle
//!
//! A [`Blueprint`] is the immutable serializer template: an ordered field
//! registry built once through a builder and shared behind an `Arc`. Every
//! live [`Serializer`] clones fresh field and validator objects out of the
//! blueprint, so per-request state never leaks across instances or
//! concurrent requests. The blueprint itself is never mutated after build.

use crate::error::{BackendError, ErrorDetail, ErrorMap, FieldError, SerializerError};
use crate::fields::{Field, FieldKind};
use crate::model::{Instance, ModelCollaborator};
use crate::nested::ListSerializer;
use crate::value::{FieldValue, ValidatedData, validated_to_attrs};
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Key under which non-field validation problems are recorded.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

/// Immutable serializer template: the ordered field registry plus the
/// optional model collaborator used to materialize relation handles.
#[derive(Clone)]
pub struct Blueprint {
	fields: Vec<Field>,
	model: Option<Arc<dyn ModelCollaborator>>,
}

impl Blueprint {
	/// Start building a template.
	///
	/// # Examples
	///
	/// ```
	/// use wireform::{Blueprint, Field};
	///
	/// let blueprint = Blueprint::builder()
	/// 	.field(Field::char("title"))
	/// 	.field(Field::boolean("enabled"))
	/// 	.build();
	/// assert_eq!(blueprint.fields().len(), 2);
	/// ```
	pub fn builder() -> BlueprintBuilder {
		BlueprintBuilder {
			fields: Vec::new(),
			model: None,
		}
	}

	/// Declared fields in declaration order.
	pub fn fields(&self) -> &[Field] {
		&self.fields
	}

	/// The collaborator used to materialize relation handles, if any.
	pub fn model(&self) -> Option<&Arc<dyn ModelCollaborator>> {
		self.model.as_ref()
	}

	/// Construct a serializer for this template.
	///
	/// Construction is polymorphic on [`Binding::many`]: a many binding is
	/// redirected to a [`ListSerializer`] whose child is a normally
	/// constructed serializer of the same template. This check happens before
	/// any other initialization.
	pub fn bind(self: &Arc<Self>, binding: Binding) -> Bound {
		if binding.many {
			Bound::Many(ListSerializer::from_blueprint(self, binding))
		} else {
			Bound::One(Serializer::from_blueprint(self, binding))
		}
	}

	/// Collection factory: a list serializer over this template.
	pub fn many(self: &Arc<Self>, binding: Binding) -> ListSerializer {
		ListSerializer::from_blueprint(self, binding)
	}
}

impl std::fmt::Debug for Blueprint {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Blueprint")
			.field("fields", &self.fields)
			.field("model", &self.model.as_ref().map(|m| m.describe().name))
			.finish()
	}
}

/// Builder assembling a [`Blueprint`]'s field registry.
pub struct BlueprintBuilder {
	fields: Vec<Field>,
	model: Option<Arc<dyn ModelCollaborator>>,
}

impl BlueprintBuilder {
	/// Register a field. Declaration order is preserved and is part of the
	/// engine contract (deterministic error ordering).
	///
	/// # Panics
	///
	/// Panics on a duplicate field name, or when a field is both read-only
	/// and required for write.
	pub fn field(mut self, field: Field) -> Self {
		assert!(
			!self.fields.iter().any(|f| f.name == field.name),
			"Field '{}' is declared twice on the same serializer template.",
			field.name
		);
		assert!(
			!(field.read_only && field.required),
			"Field '{}' cannot be both read-only and required.",
			field.name
		);
		self.fields.push(field);
		self
	}

	/// Attach the model collaborator used to materialize relation handles.
	pub fn model(mut self, model: Arc<dyn ModelCollaborator>) -> Self {
		self.model = Some(model);
		self
	}

	/// Finish the template.
	pub fn build(self) -> Arc<Blueprint> {
		Arc::new(Blueprint {
			fields: self.fields,
			model: self.model,
		})
	}
}

/// Construction arguments for binding a template to request state.
#[derive(Debug, Clone, Default)]
pub struct Binding {
	pub instance: Option<Instance>,
	pub instances: Option<Vec<Instance>>,
	pub data: Option<Value>,
	pub partial: bool,
	pub context: HashMap<String, Value>,
	pub many: bool,
	pub allow_empty: Option<bool>,
}

impl Binding {
	pub fn new() -> Self {
		Self::default()
	}

	/// Bind an existing domain object.
	pub fn instance(mut self, instance: Instance) -> Self {
		self.instance = Some(instance);
		self
	}

	/// Bind a sequence of existing domain objects (many bindings).
	pub fn instances(mut self, instances: Vec<Instance>) -> Self {
		self.instances = Some(instances);
		self
	}

	/// Bind raw decoded input.
	pub fn data(mut self, data: Value) -> Self {
		self.data = Some(data);
		self
	}

	/// Skip absent input fields instead of requiring them.
	pub fn partial(mut self) -> Self {
		self.partial = true;
		self
	}

	/// Request-scoped context propagated to nested serializers.
	pub fn context(mut self, context: HashMap<String, Value>) -> Self {
		self.context = context;
		self
	}

	/// Apply the template homogeneously across a sequence.
	pub fn many(mut self) -> Self {
		self.many = true;
		self
	}

	/// Accept or reject zero-length input sequences (many bindings only).
	pub fn allow_empty(mut self, allow_empty: bool) -> Self {
		self.allow_empty = Some(allow_empty);
		self
	}
}

/// Result of [`Blueprint::bind`].
#[derive(Debug)]
pub enum Bound {
	One(Serializer),
	Many(ListSerializer),
}

impl Bound {
	/// Unwrap the single-object serializer.
	///
	/// # Panics
	///
	/// Panics when the binding produced a list serializer.
	pub fn one(self) -> Serializer {
		match self {
			Bound::One(serializer) => serializer,
			Bound::Many(_) => panic!("Binding requested `many`; this is a list serializer."),
		}
	}

	/// Unwrap the list serializer.
	///
	/// # Panics
	///
	/// Panics when the binding produced a single-object serializer.
	pub fn many(self) -> ListSerializer {
		match self {
			Bound::One(_) => panic!("Binding did not request `many`; this is a single serializer."),
			Bound::Many(serializer) => serializer,
		}
	}
}

/// Lifecycle of a serializer instance.
///
/// `Unbound → Validating → {Valid | Invalid} → Saved`; `Saved` is reachable
/// only from `Valid`. Saving from `Unbound` or `Invalid` is a contract
/// violation, not a recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializerState {
	Unbound,
	Validating,
	Valid,
	Invalid,
	Saved,
}

/// A live validation/representation session over one template.
#[derive(Debug)]
pub struct Serializer {
	blueprint: Arc<Blueprint>,
	/// Independent copy of the template's fields. Mutating these never
	/// affects the blueprint or sibling instances.
	fields: IndexMap<String, Field>,
	instance: Option<Instance>,
	initial_data: Option<Value>,
	partial: bool,
	context: HashMap<String, Value>,
	state: SerializerState,
	validated_data: Option<ValidatedData>,
	errors: Option<ErrorMap>,
	representation: Option<Value>,
}

impl Serializer {
	pub(crate) fn from_blueprint(blueprint: &Arc<Blueprint>, binding: Binding) -> Self {
		let fields = blueprint
			.fields()
			.iter()
			.map(|field| (field.name.clone(), field.clone()))
			.collect();
		Self {
			blueprint: Arc::clone(blueprint),
			fields,
			instance: binding.instance,
			initial_data: binding.data,
			partial: binding.partial,
			context: binding.context,
			state: SerializerState::Unbound,
			validated_data: None,
			errors: None,
			representation: None,
		}
	}

	/// An unbound serializer over the template.
	pub fn new(blueprint: &Arc<Blueprint>) -> Self {
		Self::from_blueprint(blueprint, Binding::new())
	}

	/// The template this serializer was built from.
	pub fn blueprint(&self) -> &Arc<Blueprint> {
		&self.blueprint
	}

	/// The bound domain object, if any.
	pub fn instance(&self) -> Option<&Instance> {
		self.instance.as_ref()
	}

	/// Raw input bound at construction, if any.
	pub fn initial_data(&self) -> Option<&Value> {
		self.initial_data.as_ref()
	}

	/// Request-scoped context.
	pub fn context(&self) -> &HashMap<String, Value> {
		&self.context
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SerializerState {
		self.state
	}

	/// This instance's field registry, in declaration order.
	pub fn fields(&self) -> &IndexMap<String, Field> {
		&self.fields
	}

	/// Mutable access to this instance's field registry. Changes are local
	/// to this instance; the template and sibling instances are unaffected.
	pub fn fields_mut(&mut self) -> &mut IndexMap<String, Field> {
		&mut self.fields
	}

	/// Writable fields (read-only excluded) in declaration order.
	pub fn writable_fields(&self) -> impl Iterator<Item = &Field> {
		self.fields.values().filter(|f| !f.read_only)
	}

	/// Readable fields (write-only excluded) in declaration order.
	pub fn readable_fields(&self) -> impl Iterator<Item = &Field> {
		self.fields.values().filter(|f| !f.write_only)
	}

	/// Validated data recorded by a successful [`Serializer::is_valid`].
	pub fn validated_data(&self) -> Option<&ValidatedData> {
		self.validated_data.as_ref()
	}

	/// Errors recorded by a failed [`Serializer::is_valid`].
	pub fn errors(&self) -> Option<&ErrorMap> {
		self.errors.as_ref()
	}

	/// Validate the bound input, recording either validated data or errors.
	///
	/// Must be called exactly once, before `data()` or `save()`. Returns
	/// `Ok(false)` when field-level errors were recorded and `Err` only when
	/// the model collaborator failed mid-validation.
	///
	/// # Panics
	///
	/// Panics when no input data was bound at construction.
	pub async fn is_valid(&mut self) -> Result<bool, SerializerError> {
		let data = self
			.initial_data
			.clone()
			.expect("Cannot call `.is_valid()` as no `data` was passed when binding the serializer.");

		self.state = SerializerState::Validating;
		let (validated_data, errors) = self.to_internal_value(&data).await?;

		if errors.is_empty() {
			debug!(fields = validated_data.len(), "validation succeeded");
			self.validated_data = Some(validated_data);
			self.state = SerializerState::Valid;
			Ok(true)
		} else {
			debug!(errors = errors.len(), "validation failed");
			self.errors = Some(errors);
			self.state = SerializerState::Invalid;
			Ok(false)
		}
	}

	/// Raise-on-error variant of [`Serializer::is_valid`].
	pub async fn validate(&mut self) -> Result<(), SerializerError> {
		if self.is_valid().await? {
			Ok(())
		} else {
			Err(SerializerError::Validation(
				self.errors.clone().unwrap_or_default(),
			))
		}
	}

	/// Convert a raw mapping into validated data, aggregating errors.
	///
	/// Only writable fields are visited, in declaration order. Under a
	/// partial binding, fields absent from the input are skipped entirely.
	/// Every field is attempted regardless of earlier failures; errors are
	/// aggregated per field name, never short-circuited. Nested serializer
	/// fields build and validate a child serializer, merging its validated
	/// data or its error mapping under the field name.
	pub fn to_internal_value<'a>(
		&'a self,
		data: &'a Value,
	) -> BoxFuture<'a, Result<(ValidatedData, ErrorMap), BackendError>> {
		Box::pin(async move {
			let mut validated = ValidatedData::new();
			let mut errors = ErrorMap::new();

			let Some(mapping) = data.as_object() else {
				errors.insert(
					NON_FIELD_ERRORS.to_string(),
					ErrorDetail::Message("Invalid data. Expected a mapping.".to_string()),
				);
				return Ok((validated, errors));
			};

			for field in self.writable_fields() {
				let raw = mapping.get(&field.name);
				if self.partial && raw.is_none() {
					continue;
				}
				let primitive = raw.cloned().unwrap_or(Value::Null);

				if let Field {
					kind: FieldKind::Nested(child_blueprint),
					..
				} = field
				{
					let child = Serializer::from_blueprint(
						child_blueprint,
						Binding::new().context(self.context.clone()),
					);
					let (child_validated, child_errors) =
						child.to_internal_value(&primitive).await?;
					if child_errors.is_empty() {
						validated.insert(field.name.clone(), FieldValue::Map(child_validated));
					} else {
						errors.insert(field.name.clone(), ErrorDetail::Nested(child_errors));
					}
					continue;
				}

				match field.to_internal_value(&primitive).await {
					Ok(value) => {
						validated.insert(field.name.clone(), value);
					}
					Err(FieldError::Invalid(err)) => {
						errors.insert(field.name.clone(), err.into());
					}
					Err(FieldError::Backend(err)) => return Err(err),
				}
			}

			Ok((validated, errors))
		})
	}

	/// Produce the wire representation of a domain object.
	///
	/// Only readable fields are visited, in declaration order. A many-valued
	/// relation attribute that is absent or null is an unresolved relation
	/// handle and is materialized through the template's model collaborator
	/// before conversion.
	pub async fn to_representation(&self, instance: &Instance) -> Result<Value, BackendError> {
		let mut out = Map::new();
		for field in self.readable_fields() {
			let attr = instance.attr(&field.name).cloned();
			let attr = match attr {
				Some(value) if !value.is_null() => value,
				_ if field.many && field.is_relation() => match self.blueprint.model() {
					Some(model) => {
						let items = model.related(instance, &field.name).await?;
						Value::Array(items.iter().map(|i| i.values()).collect())
					}
					None => Value::Null,
				},
				Some(value) => value,
				None => Value::Null,
			};
			out.insert(field.name.clone(), field.to_representation(&attr));
		}
		Ok(Value::Object(out))
	}

	/// An editable skeleton of the input.
	///
	/// Bound to raw input, returns the writable fields whose values are
	/// absent, echoing back what the caller may still fill in. Unbound,
	/// returns each writable field's own initial value.
	pub fn get_initial(&self) -> Value {
		match &self.initial_data {
			Some(data) => {
				let Some(mapping) = data.as_object() else {
					return Value::Object(Map::new());
				};
				let mut out = Map::new();
				for field in self.writable_fields() {
					let absent = mapping
						.get(&field.name)
						.map(|value| value.is_null())
						.unwrap_or(true);
					if absent {
						out.insert(
							field.name.clone(),
							mapping.get(&field.name).cloned().unwrap_or(Value::Null),
						);
					}
				}
				Value::Object(out)
			}
			None => {
				let mut out = Map::new();
				for field in self.writable_fields() {
					out.insert(field.name.clone(), field.get_initial());
				}
				Value::Object(out)
			}
		}
	}

	/// The memoized wire representation of this serializer.
	///
	/// Bound to a domain instance with no errors, this is the instance's
	/// representation; with validated data and no errors, the validated
	/// data's representation; otherwise the initial skeleton.
	///
	/// # Panics
	///
	/// Panics when the serializer was bound to raw input and `is_valid()`
	/// has not been called yet: accessing the representation of unvalidated
	/// input is a programming error, never a silent empty result.
	pub async fn data(&mut self) -> Result<Value, SerializerError> {
		if self.initial_data.is_some()
			&& matches!(
				self.state,
				SerializerState::Unbound | SerializerState::Validating
			) {
			panic!(
				"When a serializer is bound to input data you must call `.is_valid()` before \
				 attempting to access the serialized `.data` representation."
			);
		}

		if let Some(cached) = &self.representation {
			return Ok(cached.clone());
		}

		let no_errors = self.errors.is_none();
		let representation = if self.instance.is_some() && no_errors {
			let instance = self.instance.clone().unwrap();
			self.to_representation(&instance).await?
		} else if self.validated_data.is_some() && no_errors {
			self.representation_of_validated(self.validated_data.as_ref().unwrap())
		} else {
			warn!("serializer has errors; falling back to the initial skeleton");
			self.get_initial()
		};

		self.representation = Some(representation.clone());
		Ok(representation)
	}

	/// Representation computed from validated data instead of an instance.
	pub(crate) fn representation_of_validated(&self, validated: &ValidatedData) -> Value {
		let attrs = validated_to_attrs(validated);
		let mut out = Map::new();
		for field in self.readable_fields() {
			let attr = attrs.get(&field.name).cloned().unwrap_or(Value::Null);
			out.insert(field.name.clone(), field.to_representation(&attr));
		}
		Value::Object(out)
	}

	/// Persist the validated data.
	///
	/// Delegates to `update` when bound to an existing instance and to
	/// `create` otherwise. Plain serializer templates define neither hook;
	/// persistence belongs to a model-backed serializer.
	///
	/// # Panics
	///
	/// Panics when called before a successful `is_valid()`, when errors are
	/// present, or on a plain serializer with no persistence hooks.
	pub async fn save(&mut self) -> Result<Instance, SerializerError> {
		self.assert_saveable();
		if self.instance.is_some() {
			panic!("`update()` must be implemented.");
		}
		panic!("`create()` must be implemented.");
	}

	/// Enforce the save preconditions shared by every serializer kind.
	pub(crate) fn assert_saveable(&self) {
		assert!(
			self.errors.is_none(),
			"You cannot call `.save()` on a serializer with invalid data."
		);
		assert!(
			self.validated_data.is_some(),
			"You must call `.is_valid()` before calling `.save()`."
		);
	}

	/// Record the outcome of a successful save.
	pub(crate) fn mark_saved(&mut self, instance: Instance) {
		self.instance = Some(instance);
		self.representation = None;
		self.state = SerializerState::Saved;
	}

	/// Whether the bound instance is set (used by model-backed save).
	pub(crate) fn has_instance(&self) -> bool {
		self.instance.is_some()
	}

	/// Take the validated data for persistence.
	pub(crate) fn take_validated_for_save(&self) -> ValidatedData {
		self.validated_data.clone().unwrap_or_default()
	}
}
