//! List serializer: one child template applied across a sequence
//!
//! A [`ListSerializer`] wraps exactly one child serializer and applies it
//! homogeneously over every element of the input (or over every bound
//! instance). It has no fields of its own and is only built through the
//! collection factory on [`Blueprint`](crate::serializer::Blueprint) — the
//! child must be constructed first from the declared template.

use crate::error::{BackendError, ErrorDetail, SerializerError};
use crate::model::Instance;
use crate::serializer::{Binding, Serializer, SerializerState};
use crate::value::ValidatedData;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Applies a single child serializer across a sequence of inputs/instances.
#[derive(Debug)]
pub struct ListSerializer {
	child: Serializer,
	allow_empty: bool,
	instances: Option<Vec<Instance>>,
	initial_data: Option<Value>,
	state: SerializerState,
	validated: Option<Vec<ValidatedData>>,
	errors: Option<ErrorDetail>,
	representation: Option<Value>,
}

impl ListSerializer {
	pub(crate) fn from_blueprint(
		blueprint: &Arc<crate::serializer::Blueprint>,
		binding: Binding,
	) -> Self {
		let allow_empty = binding.allow_empty.unwrap_or(true);
		let child = Serializer::from_blueprint(
			blueprint,
			Binding::new().context(binding.context.clone()),
		);
		Self {
			child,
			allow_empty,
			instances: binding.instances,
			initial_data: binding.data,
			state: SerializerState::Unbound,
			validated: None,
			errors: None,
			representation: None,
		}
	}

	/// The child serializer applied to every element.
	pub fn child(&self) -> &Serializer {
		&self.child
	}

	/// Whether a zero-length input sequence is acceptable.
	pub fn allow_empty(&self) -> bool {
		self.allow_empty
	}

	/// Current lifecycle state.
	pub fn state(&self) -> SerializerState {
		self.state
	}

	/// Per-element validated data recorded by a successful `is_valid()`.
	pub fn validated(&self) -> Option<&Vec<ValidatedData>> {
		self.validated.as_ref()
	}

	/// Errors recorded by a failed `is_valid()`. Element failures are a
	/// parallel sequence (`None` marks a valid element), never a merged map.
	pub fn errors(&self) -> Option<&ErrorDetail> {
		self.errors.as_ref()
	}

	/// Validate every element of the bound input independently.
	///
	/// Elements are converted in input order through the child serializer;
	/// one element's failure does not stop its siblings.
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

		let Some(elements) = data.as_array() else {
			self.errors = Some(ErrorDetail::Message(
				"Invalid data. Expected an array.".to_string(),
			));
			self.state = SerializerState::Invalid;
			return Ok(false);
		};

		if elements.is_empty() && !self.allow_empty {
			self.errors = Some(ErrorDetail::Message(
				"This list may not be empty.".to_string(),
			));
			self.state = SerializerState::Invalid;
			return Ok(false);
		}

		let results = self.to_internal_value(&data).await?;
		let mut validated = Vec::with_capacity(results.len());
		let mut element_errors = Vec::with_capacity(results.len());
		let mut any_error = false;
		for result in results {
			match result {
				Ok(element) => {
					validated.push(element);
					element_errors.push(None);
				}
				Err(detail) => {
					any_error = true;
					element_errors.push(Some(detail));
				}
			}
		}

		if any_error {
			debug!(
				failed = element_errors.iter().filter(|e| e.is_some()).count(),
				"list validation failed"
			);
			self.errors = Some(ErrorDetail::Items(element_errors));
			self.state = SerializerState::Invalid;
			Ok(false)
		} else {
			debug!(elements = validated.len(), "list validation succeeded");
			self.validated = Some(validated);
			self.state = SerializerState::Valid;
			Ok(true)
		}
	}

	/// Map the child's conversion over every element of a sequence.
	///
	/// Produces a parallel sequence of per-element results; failures stay
	/// independent rather than being merged into one error map.
	pub async fn to_internal_value(
		&self,
		data: &Value,
	) -> Result<Vec<Result<ValidatedData, ErrorDetail>>, BackendError> {
		let elements = data.as_array().cloned().unwrap_or_default();
		let mut results = Vec::with_capacity(elements.len());
		for element in &elements {
			let (validated, errors) = self.child.to_internal_value(element).await?;
			if errors.is_empty() {
				results.push(Ok(validated));
			} else {
				results.push(Err(ErrorDetail::Nested(errors)));
			}
		}
		Ok(results)
	}

	/// Map the child's representation over every element.
	pub async fn to_representation(
		&self,
		instances: &[Instance],
	) -> Result<Value, BackendError> {
		let mut out = Vec::with_capacity(instances.len());
		for instance in instances {
			out.push(self.child.to_representation(instance).await?);
		}
		Ok(Value::Array(out))
	}

	/// Skeleton for the bound input: the representation of the raw input
	/// sequence when one is bound, an empty sequence otherwise.
	pub async fn get_initial(&self) -> Result<Value, BackendError> {
		match &self.initial_data {
			Some(Value::Array(elements)) => {
				let instances: Vec<Instance> =
					elements.iter().cloned().map(Instance::from).collect();
				self.to_representation(&instances).await
			}
			_ => Ok(Value::Array(Vec::new())),
		}
	}

	/// The memoized wire representation of this list serializer.
	///
	/// # Panics
	///
	/// Panics when bound to raw input before `is_valid()` was called, like
	/// the single-object serializer.
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
		let representation = if self.instances.is_some() && no_errors {
			let instances = self.instances.clone().unwrap();
			self.to_representation(&instances).await?
		} else if self.validated.is_some() && no_errors {
			let validated = self.validated.clone().unwrap();
			Value::Array(
				validated
					.iter()
					.map(|element| self.child.representation_of_validated(element))
					.collect(),
			)
		} else {
			self.get_initial().await?
		};

		self.representation = Some(representation.clone());
		Ok(representation)
	}

	/// Bulk persistence is a collaborator decision, not a core
	/// responsibility; the hooks are intentionally unimplemented here.
	///
	/// # Panics
	///
	/// Always panics: either on the save preconditions or, once they hold,
	/// on the missing bulk `create`/`update` hook.
	pub async fn save(&mut self) -> Result<Vec<Instance>, SerializerError> {
		assert!(
			self.validated.is_some(),
			"You must call `.is_valid()` before calling `.save()`."
		);
		assert!(
			self.errors.is_none(),
			"You cannot call `.save()` on a serializer with invalid data."
		);
		if self.instances.is_some() {
			panic!("`update()` must be implemented.");
		}
		panic!("`create()` must be implemented.");
	}
}
