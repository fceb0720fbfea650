//! Shared in-memory model collaborator for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use wireform::{BackendError, FieldDescriptor, Instance, ModelCollaborator, ModelSchema};

/// In-memory model backend: rows, many-to-many relation storage and an
/// operation log used to assert persistence ordering.
pub struct MemoryModel {
	schema: ModelSchema,
	rows: Mutex<Vec<Instance>>,
	relations: Mutex<Vec<(String, String, Instance)>>,
	log: Mutex<Vec<String>>,
	next_pk: Mutex<i64>,
	fail_create: AtomicBool,
}

impl MemoryModel {
	pub fn new(schema: ModelSchema) -> Arc<Self> {
		Arc::new(Self {
			schema,
			rows: Mutex::new(Vec::new()),
			relations: Mutex::new(Vec::new()),
			log: Mutex::new(Vec::new()),
			next_pk: Mutex::new(1),
			fail_create: AtomicBool::new(false),
		})
	}

	/// Make every `create` call fail with a storage error.
	pub fn failing_create(self: Arc<Self>) -> Arc<Self> {
		self.fail_create.store(true, Ordering::SeqCst);
		self
	}

	pub fn with_rows(schema: ModelSchema, rows: Vec<Value>) -> Arc<Self> {
		let model = Self::new(schema);
		*model.rows.lock().unwrap() = rows.into_iter().map(Instance::from).collect();
		model
	}

	/// Operation log in execution order.
	pub fn operations(&self) -> Vec<String> {
		self.log.lock().unwrap().clone()
	}

	/// Current rows.
	pub fn rows(&self) -> Vec<Instance> {
		self.rows.lock().unwrap().clone()
	}

	/// Related instances stored for one (pk, field) pair.
	pub fn relation(&self, pk: &Value, field: &str) -> Vec<Instance> {
		let key = pk.to_string();
		self.relations
			.lock()
			.unwrap()
			.iter()
			.filter(|(row_pk, row_field, _)| row_pk == &key && row_field == field)
			.map(|(_, _, item)| item.clone())
			.collect()
	}

	fn pk_name(&self) -> String {
		self.schema.pk_field.name.clone()
	}

	fn knows_field(&self, name: &str) -> bool {
		self.schema.iter_all().any(|d| d.name == name)
	}
}

#[async_trait]
impl ModelCollaborator for MemoryModel {
	fn describe(&self) -> ModelSchema {
		self.schema.clone()
	}

	async fn get(&self, lookup_field: &str, key: &Value) -> Result<Instance, BackendError> {
		if !self.knows_field(lookup_field) {
			return Err(BackendError::UnknownField(format!(
				"'{lookup_field}' is not a field of {}",
				self.schema.name
			)));
		}
		self.rows
			.lock()
			.unwrap()
			.iter()
			.find(|row| row.attr(lookup_field) == Some(key))
			.cloned()
			.ok_or_else(|| {
				BackendError::NotFound(format!(
					"{} with {lookup_field}={key} does not exist",
					self.schema.name
				))
			})
	}

	async fn create(&self, attrs: Map<String, Value>) -> Result<Instance, BackendError> {
		if self.fail_create.load(Ordering::SeqCst) {
			return Err(BackendError::Storage(
				"no usable column mapping".to_string(),
			));
		}
		let mut instance = Instance::from_attrs(attrs);
		let pk_name = self.pk_name();
		if instance.attr(&pk_name).is_none() {
			let mut next_pk = self.next_pk.lock().unwrap();
			instance.set_attr(pk_name, json!(*next_pk));
			*next_pk += 1;
		}
		self.rows.lock().unwrap().push(instance.clone());
		self.log.lock().unwrap().push("create".to_string());
		Ok(instance)
	}

	async fn save(&self, instance: &Instance) -> Result<(), BackendError> {
		let pk_name = self.pk_name();
		let pk = instance.pk(&pk_name).cloned();
		let mut rows = self.rows.lock().unwrap();
		if let Some(row) = rows.iter_mut().find(|row| row.pk(&pk_name) == pk.as_ref()) {
			*row = instance.clone();
		} else {
			rows.push(instance.clone());
		}
		self.log.lock().unwrap().push("save".to_string());
		Ok(())
	}

	async fn delete(&self, instance: &Instance) -> Result<(), BackendError> {
		let pk_name = self.pk_name();
		let pk = instance.pk(&pk_name).cloned();
		self.rows
			.lock()
			.unwrap()
			.retain(|row| row.pk(&pk_name) != pk.as_ref());
		self.log.lock().unwrap().push("delete".to_string());
		Ok(())
	}

	async fn related(
		&self,
		instance: &Instance,
		field: &str,
	) -> Result<Vec<Instance>, BackendError> {
		let pk = instance
			.pk(&self.pk_name())
			.cloned()
			.unwrap_or(Value::Null);
		self.log.lock().unwrap().push(format!("related({field})"));
		Ok(self.relation(&pk, field))
	}

	async fn clear_relation(&self, instance: &Instance, field: &str) -> Result<(), BackendError> {
		let key = instance
			.pk(&self.pk_name())
			.cloned()
			.unwrap_or(Value::Null)
			.to_string();
		self.relations
			.lock()
			.unwrap()
			.retain(|(row_pk, row_field, _)| !(row_pk == &key && row_field == field));
		self.log
			.lock()
			.unwrap()
			.push(format!("clear_relation({field})"));
		Ok(())
	}

	async fn add_to_relation(
		&self,
		instance: &Instance,
		field: &str,
		item: &Instance,
	) -> Result<(), BackendError> {
		let key = instance
			.pk(&self.pk_name())
			.cloned()
			.unwrap_or(Value::Null)
			.to_string();
		self.relations
			.lock()
			.unwrap()
			.push((key, field.to_string(), item.clone()));
		self.log
			.lock()
			.unwrap()
			.push(format!("add_to_relation({field})"));
		Ok(())
	}
}

/// Schema of a scan target: pk plus a couple of scalar columns.
pub fn target_schema() -> ModelSchema {
	ModelSchema::new("target", FieldDescriptor::new("id", "IntField"))
		.data_field(FieldDescriptor::new("address", "CharField"))
		.data_field(FieldDescriptor::new("enabled", "BooleanField").with_default(json!(true)))
}

/// A target backend seeded with a few rows.
pub fn seeded_targets() -> Arc<MemoryModel> {
	MemoryModel::with_rows(
		target_schema(),
		vec![
			json!({"id": 1, "address": "10.0.0.1", "enabled": true}),
			json!({"id": 2, "address": "10.0.0.2", "enabled": false}),
			json!({"id": 3, "address": "10.0.0.3", "enabled": true}),
		],
	)
}

/// Schema of a scan task: scalars, a foreign key to an agent and a
/// many-to-many relation to targets.
pub fn task_schema(
	agents: Arc<dyn ModelCollaborator>,
	targets: Arc<dyn ModelCollaborator>,
) -> ModelSchema {
	ModelSchema::new("task", FieldDescriptor::new("id", "IntField"))
		.data_field(FieldDescriptor::new("name", "CharField"))
		.data_field(FieldDescriptor::new("description", "TextField").nullable())
		.data_field(FieldDescriptor::new("enabled", "BooleanField").with_default(json!(true)))
		.fk_field(FieldDescriptor::new("agent", "ForeignKeyField").with_related(agents))
		.m2m_field(FieldDescriptor::new("targets", "ManyToManyField").with_related(targets))
}

/// Schema of a scan agent.
pub fn agent_schema() -> ModelSchema {
	ModelSchema::new("agent", FieldDescriptor::new("id", "IntField"))
		.data_field(FieldDescriptor::new("hostname", "CharField"))
		.data_field(FieldDescriptor::new("token", "UUIDField"))
}

/// An agent backend seeded with one row.
pub fn seeded_agents() -> Arc<MemoryModel> {
	MemoryModel::with_rows(
		agent_schema(),
		vec![json!({
			"id": 10,
			"hostname": "scanner-1",
			"token": "5f0b3e0e-6de0-4b38-9f3c-6a2b2c1a0d4f"
		})],
	)
}
