//! Integration tests for the serializer engine

mod common;

use assert_json_diff::assert_json_eq;
use common::seeded_targets;
use serde_json::{Value, json};
use std::sync::Arc;
use wireform::{
	Binding, Blueprint, ErrorDetail, Field, MaxLengthValidator, SerializerState,
};

fn scan_blueprint() -> Arc<Blueprint> {
	Blueprint::builder()
		.field(Field::integer("id").read_only())
		.field(Field::char("title").with_max_length(32))
		.field(Field::boolean("enabled"))
		.build()
}

#[tokio::test]
async fn test_valid_input_round_trips() {
	let blueprint = Blueprint::builder()
		.field(Field::char("name"))
		.field(Field::date("scheduled"))
		.field(Field::uuid("token"))
		.field(Field::json("options"))
		.build();

	let mut serializer = blueprint
		.bind(Binding::new().data(json!({
			"name": "nightly sweep",
			"scheduled": "2023-04-01",
			"token": "5f0b3e0e-6de0-4b38-9f3c-6a2b2c1a0d4f",
			"options": {"ports": [80, 443]},
		})))
		.one();

	assert!(serializer.is_valid().await.unwrap());
	assert_eq!(serializer.state(), SerializerState::Valid);

	let data = serializer.data().await.unwrap();
	assert_json_eq!(
		data,
		json!({
			"name": "nightly sweep",
			"scheduled": "2023-04-01",
			"token": "5f0b3e0e-6de0-4b38-9f3c-6a2b2c1a0d4f",
			"options": {"ports": [80, 443]},
		})
	);
}

#[tokio::test]
async fn test_partial_update_skips_absent_fields() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": "x"})).partial())
		.one();

	assert!(serializer.is_valid().await.unwrap());
	let validated = serializer.validated_data().unwrap();
	assert_eq!(validated.len(), 1);
	assert!(validated.contains_key("title"));
	assert!(!validated.contains_key("enabled"));
}

#[tokio::test]
async fn test_missing_required_field_is_an_error() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": "x"})))
		.one();

	assert!(!serializer.is_valid().await.unwrap());
	let errors = serializer.errors().unwrap();
	assert_eq!(
		errors["enabled"],
		ErrorDetail::Message("Must be not null".to_string())
	);
}

#[tokio::test]
async fn test_errors_are_aggregated_across_fields() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": 12, "enabled": "yes"})))
		.one();

	assert!(!serializer.is_valid().await.unwrap());
	assert_eq!(serializer.state(), SerializerState::Invalid);

	let errors = serializer.errors().unwrap();
	let keys: Vec<_> = errors.keys().cloned().collect();
	assert_eq!(keys, vec!["title", "enabled"]);
}

#[tokio::test]
async fn test_non_mapping_input_fails_without_field_errors() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint.bind(Binding::new().data(json!([1, 2]))).one();

	assert!(!serializer.is_valid().await.unwrap());
	let errors = serializer.errors().unwrap();
	assert!(errors.contains_key(wireform::NON_FIELD_ERRORS));
}

#[tokio::test]
async fn test_read_only_fields_are_not_validated() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"id": "garbage", "title": "x", "enabled": true})))
		.one();

	assert!(serializer.is_valid().await.unwrap());
	assert!(!serializer.validated_data().unwrap().contains_key("id"));
}

#[tokio::test]
async fn test_write_only_fields_are_not_represented() {
	let blueprint = Blueprint::builder()
		.field(Field::char("name"))
		.field(Field::char("secret").write_only())
		.build();

	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"name": "probe", "secret": "hunter2"})))
		.one();

	assert!(serializer.is_valid().await.unwrap());
	let data = serializer.data().await.unwrap();
	assert_eq!(data, json!({"name": "probe"}));
}

#[tokio::test]
#[should_panic(expected = "must call `.is_valid()`")]
async fn test_data_before_is_valid_panics() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": "x", "enabled": true})))
		.one();
	let _ = serializer.data().await;
}

#[tokio::test]
#[should_panic(expected = "before calling `.save()`")]
async fn test_save_before_is_valid_panics() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": "x", "enabled": true})))
		.one();
	let _ = serializer.save().await;
}

#[tokio::test]
#[should_panic(expected = "invalid data")]
async fn test_save_with_errors_panics() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": 5, "enabled": true})))
		.one();
	let _ = serializer.is_valid().await;
	let _ = serializer.save().await;
}

#[tokio::test]
#[should_panic(expected = "`create()` must be implemented")]
async fn test_plain_serializer_has_no_create_hook() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": "x", "enabled": true})))
		.one();
	assert!(serializer.is_valid().await.unwrap());
	let _ = serializer.save().await;
}

#[tokio::test]
async fn test_instance_registry_mutation_stays_local() {
	let blueprint = scan_blueprint();

	let mut strict = blueprint
		.bind(Binding::new().data(json!({"title": "long title", "enabled": true})))
		.one();
	strict
		.fields_mut()
		.get_mut("title")
		.unwrap()
		.max_length = Some(3);

	let mut relaxed = blueprint
		.bind(Binding::new().data(json!({"title": "long title", "enabled": true})))
		.one();

	assert!(!strict.is_valid().await.unwrap());
	assert!(relaxed.is_valid().await.unwrap());
}

#[tokio::test]
async fn test_validator_attachment_stays_local() {
	let blueprint = scan_blueprint();

	let mut first = blueprint
		.bind(Binding::new().data(json!({"title": "abcdef", "enabled": true})))
		.one();
	first
		.fields_mut()
		.get_mut("title")
		.unwrap()
		.validators
		.push(Box::new(MaxLengthValidator::new(2)));

	let mut second = blueprint
		.bind(Binding::new().data(json!({"title": "abcdef", "enabled": true})))
		.one();

	assert!(!first.is_valid().await.unwrap());
	assert!(second.is_valid().await.unwrap());
}

#[tokio::test]
async fn test_get_initial_echoes_missing_writable_input() {
	let blueprint = scan_blueprint();
	let serializer = blueprint
		.bind(Binding::new().data(json!({"title": "x"})))
		.one();

	// `enabled` was not provided; the skeleton offers it back. The
	// read-only `id` is not part of the editable surface.
	assert_eq!(serializer.get_initial(), json!({"enabled": null}));
}

#[tokio::test]
async fn test_nested_serializer_merges_validated_data() {
	let child = Blueprint::builder()
		.field(Field::char("hostname"))
		.build();
	let blueprint = Blueprint::builder()
		.field(Field::char("name"))
		.field(Field::nested("agent", child))
		.build();

	let mut serializer = blueprint
		.bind(Binding::new().data(json!({
			"name": "sweep",
			"agent": {"hostname": "scanner-1"},
		})))
		.one();

	assert!(serializer.is_valid().await.unwrap());
	let data = serializer.data().await.unwrap();
	assert_eq!(
		data,
		json!({"name": "sweep", "agent": {"hostname": "scanner-1"}})
	);
}

#[tokio::test]
async fn test_nested_serializer_merges_errors_under_field_name() {
	let child = Blueprint::builder()
		.field(Field::char("hostname"))
		.build();
	let blueprint = Blueprint::builder()
		.field(Field::char("name"))
		.field(Field::nested("agent", child))
		.build();

	let mut serializer = blueprint
		.bind(Binding::new().data(json!({
			"name": "sweep",
			"agent": {"hostname": 42},
		})))
		.one();

	assert!(!serializer.is_valid().await.unwrap());
	let errors = serializer.errors().unwrap();
	let ErrorDetail::Nested(child_errors) = &errors["agent"] else {
		panic!("expected nested errors under the field name");
	};
	assert!(child_errors.contains_key("hostname"));
}

#[tokio::test]
async fn test_relation_lookup_failures_become_validation_errors() {
	let targets = seeded_targets();
	let blueprint = Blueprint::builder()
		.field(Field::char("name"))
		.field(Field::primary_key("target", targets))
		.build();

	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"name": "sweep", "target": 99})))
		.one();

	assert!(!serializer.is_valid().await.unwrap());
	let message = serializer.errors().unwrap()["target"]
		.message()
		.unwrap()
		.to_string();
	assert!(message.contains("Incorrect lookup value"));
}

#[tokio::test]
async fn test_relation_lookup_resolves_and_represents_pk() {
	let targets = seeded_targets();
	let blueprint = Blueprint::builder()
		.field(Field::char("name"))
		.field(Field::primary_key("target", targets))
		.build();

	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"name": "sweep", "target": 2})))
		.one();

	assert!(serializer.is_valid().await.unwrap());
	let data = serializer.data().await.unwrap();
	assert_eq!(data, json!({"name": "sweep", "target": 2}));
}

#[tokio::test]
async fn test_data_is_memoized() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"title": "x", "enabled": true})))
		.one();
	assert!(serializer.is_valid().await.unwrap());

	let first = serializer.data().await.unwrap();
	let second = serializer.data().await.unwrap();
	assert_eq!(first, second);
}

#[tokio::test]
async fn test_list_serializer_validates_each_element() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(
			Binding::new().many().data(json!([
				{"title": "a", "enabled": true},
				{"title": "b", "enabled": false},
			])),
		)
		.many();

	assert!(serializer.is_valid().await.unwrap());
	assert_eq!(serializer.validated().unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_serializer_keeps_element_failures_independent() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(
			Binding::new().many().data(json!([
				{"title": "ok", "enabled": true},
				{"title": 7, "enabled": true},
			])),
		)
		.many();

	assert!(!serializer.is_valid().await.unwrap());
	let Some(ErrorDetail::Items(items)) = serializer.errors() else {
		panic!("expected a parallel sequence of element results");
	};
	assert_eq!(items.len(), 2);
	assert!(items[0].is_none());
	assert!(items[1].is_some());
}

#[tokio::test]
async fn test_list_serializer_rejects_empty_when_configured() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(Binding::new().many().allow_empty(false).data(json!([])))
		.many();

	assert!(!serializer.is_valid().await.unwrap());
	assert_eq!(
		serializer.errors(),
		Some(&ErrorDetail::Message("This list may not be empty.".to_string()))
	);
}

#[tokio::test]
async fn test_list_serializer_accepts_empty_by_default() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint.bind(Binding::new().many().data(json!([]))).many();

	assert!(serializer.is_valid().await.unwrap());
	assert_eq!(serializer.data().await.unwrap(), json!([]));
}

#[tokio::test]
#[should_panic(expected = "`create()` must be implemented")]
async fn test_list_serializer_has_no_bulk_create() {
	let blueprint = scan_blueprint();
	let mut serializer = blueprint
		.bind(
			Binding::new()
				.many()
				.data(json!([{"title": "a", "enabled": true}])),
		)
		.many();
	assert!(serializer.is_valid().await.unwrap());
	let _ = serializer.save().await;
}

#[tokio::test]
async fn test_representation_orders_fields_by_declaration() {
	let blueprint = Blueprint::builder()
		.field(Field::char("zeta"))
		.field(Field::char("alpha"))
		.build();

	let mut serializer = blueprint
		.bind(Binding::new().data(json!({"alpha": "2", "zeta": "1"})))
		.one();
	assert!(serializer.is_valid().await.unwrap());

	let data = serializer.data().await.unwrap();
	let Value::Object(map) = data else {
		panic!("expected an object representation");
	};
	let keys: Vec<_> = map.keys().cloned().collect();
	assert_eq!(keys, vec!["zeta", "alpha"]);
}
