//! End-to-end tests against an in-memory SurrealDB instance.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::io::Write;
use surreal2_sink::Surreal2Sink;
use surreal_cdc_destination::{
    apply_relations, ChangeEvent, Destination, DestinationConfig, Operation, Payload,
    RelationSpec, WriteFailurePolicy,
};
use tempfile::NamedTempFile;

async fn memory_sink() -> Surreal2Sink {
    let client = surrealdb::engine::any::connect("mem://").await.unwrap();
    client.use_ns("cdc").use_db("shop").await.unwrap();
    Surreal2Sink::new(client)
}

fn authored() -> RelationSpec {
    RelationSpec::new("authored", "posts", "author_id", "id", "users", "posts")
}

fn fields(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected object, got {other:?}"),
    }
}

fn event(collection: &str, operation: Operation, key: Value, after: Value) -> ChangeEvent {
    let after = match after {
        Value::Null => Payload::Absent,
        other => Payload::Structured(fields(other)),
    };
    ChangeEvent::new(collection, operation, fields(key), after)
}

async fn names(sink: &Surreal2Sink, table: &str) -> Vec<String> {
    let mut response = sink
        .inner()
        .query(format!("SELECT VALUE name FROM {table} ORDER BY name"))
        .await
        .unwrap();
    response.take(0).unwrap()
}

#[tokio::test]
async fn test_relation_event_materializes_edges() {
    let sink = memory_sink().await;

    let first = apply_relations(&sink, &[authored()]).await;
    assert!(first.is_clean(), "{:?}", first.failures);
    let second = apply_relations(&sink, &[authored()]).await;
    assert!(second.is_clean(), "{:?}", second.failures);

    sink.inner()
        .query("CREATE users:1 SET name = 'Ann'; CREATE posts:10 SET author_id = 1, title = 'Hello'; CREATE posts:11 SET title = 'Orphan';")
        .await
        .unwrap()
        .check()
        .unwrap();

    let mut response = sink
        .inner()
        .query("SELECT VALUE record::id(in) FROM authored; SELECT VALUE record::id(out) FROM authored;")
        .await
        .unwrap();
    let ins: Vec<i64> = response.take(0).unwrap();
    let outs: Vec<i64> = response.take(1).unwrap();
    assert_eq!(ins, vec![1]);
    assert_eq!(outs, vec![10]);
}

#[tokio::test]
async fn test_write_lifecycle() {
    let mut schema = NamedTempFile::new().unwrap();
    schema.write_all(b"relations: []\n").unwrap();

    let options: BTreeMap<String, String> = [
        ("url", "mem://"),
        ("username", "root"),
        ("password", "root"),
        ("namespace", "cdc"),
        ("database", "shop"),
        ("scope", "root"),
        ("delete_old_key", "true"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain([(
        "relations_schema".to_string(),
        schema.path().display().to_string(),
    )])
    .collect();
    let config: DestinationConfig = Destination::configure(&options).unwrap();
    assert_eq!(config.write_failure_policy, WriteFailurePolicy::Skip);

    let destination = Destination::open_with_sink(config, memory_sink().await)
        .await
        .unwrap();

    let report = destination
        .write(&[
            event("users", Operation::Create, json!({"uid": 1}), json!({"uid": 1, "name": "Ann"})),
            event("users", Operation::Create, json!({"uid": 2}), json!({"uid": 2, "name": "Bob"})),
            event("users", Operation::Snapshot, json!({"uid": 3}), json!({"uid": 3, "name": "Cat"})),
        ])
        .await
        .unwrap();
    assert_eq!(report.succeeded, 3);
    assert_eq!(names(destination.sink(), "users").await, vec!["Ann", "Bob", "Cat"]);

    let report = destination
        .write(&[
            event("users", Operation::Update, json!({"uid": 2}), json!({"uid": 2, "name": "Bea"})),
            event("users", Operation::Delete, json!({"uid": 3}), Value::Null),
        ])
        .await
        .unwrap();
    assert_eq!(report.succeeded, 2);
    assert_eq!(names(destination.sink(), "users").await, vec!["Ann", "Bea"]);

    // Re-inserting an existing id fails the whole bulk insert but not the batch
    let report = destination
        .write(&[event(
            "users",
            Operation::Create,
            json!({"uid": 1}),
            json!({"uid": 1, "name": "Dup"}),
        )])
        .await
        .unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(names(destination.sink(), "users").await, vec!["Ann", "Bea"]);

    destination.teardown().await.unwrap();
}

#[tokio::test]
async fn test_delete_then_recreate_same_id() {
    let mut schema = NamedTempFile::new().unwrap();
    schema.write_all(b"relations: []\n").unwrap();
    let options: BTreeMap<String, String> = [
        ("url", "mem://"),
        ("username", "root"),
        ("password", "root"),
        ("namespace", "cdc"),
        ("database", "shop"),
        ("scope", "root"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .chain([(
        "relations_schema".to_string(),
        schema.path().display().to_string(),
    )])
    .collect();

    let sink = memory_sink().await;
    sink.inner()
        .query("CREATE users:1 SET name = 'Ann'")
        .await
        .unwrap()
        .check()
        .unwrap();
    let destination = Destination::open_with_sink(Destination::configure(&options).unwrap(), sink)
        .await
        .unwrap();

    let report = destination
        .write(&[
            event("users", Operation::Delete, json!({"id": 1}), Value::Null),
            event("users", Operation::Create, json!({"id": 1}), json!({"id": 1, "name": "Ann2"})),
        ])
        .await
        .unwrap();

    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 0);
    assert_eq!(names(destination.sink(), "users").await, vec!["Ann2"]);
}
