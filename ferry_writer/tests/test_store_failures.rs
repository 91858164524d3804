use std::{sync::Arc, time::Duration};

use ferry_observability::ErrorKind;
use ferry_schema::Settings;
use ferry_store::InMemorySearchStore;
use ferry_writer::{Job, WriterError};
use serde_json::{Value, json};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

mod common;

use common::{config, prepared_job, receiver, row};

fn people() -> Value {
    json!({
        "index": "people",
        "tryInterval": 1000,
        "trySize": 4,
        "column": [{"name": "id", "type": "id"}, {"name": "age", "type": "integer"}]
    })
}

#[tokio::test(start_paused = true)]
async fn test_transport_failures_are_retried() {
    let (job, store) = prepared_job(people()).await;
    store.fail_next("bulk", 2).await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![Ok(row(["1", "7"]))]).await;
    let start = Instant::now();
    let summary = task.run(&mut rx, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.documents, 1);
    assert_eq!(store.calls("bulk").await, 3);
    assert_eq!(start.elapsed(), Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_fail_the_task() {
    let (job, store) = prepared_job(people()).await;
    store.fail_next("bulk", 10).await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![Ok(row(["1", "7"]))]).await;
    let start = Instant::now();
    let err = task
        .run(&mut rx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WriterError::Store { operation: "bulk", .. }));
    assert_eq!(err.kind(), ErrorKind::Temporary);
    assert_eq!(store.calls("bulk").await, 4);
    assert_eq!(start.elapsed(), Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_failed_items_are_not_retried() {
    let (job, store) = prepared_job(people()).await;
    store.reject_id("2").await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![Ok(row(["1", "7"])), Ok(row(["2", "8"]))]).await;
    let start = Instant::now();
    let err = task
        .run(&mut rx, &CancellationToken::new())
        .await
        .unwrap_err();

    match &err {
        WriterError::PartialFailure {
            failed,
            total,
            reason,
        } => {
            assert_eq!((*failed, *total), (1, 2));
            assert!(reason.contains("mapper_parsing_exception"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(store.calls("bulk").await, 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert!(store.document("people", "1").await.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_stops_a_retrying_task() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "tryInterval": 3_600_000,
        "column": [{"name": "id", "type": "id"}]
    }))
    .await;
    store.fail_next("bulk", 100).await;

    let ct = CancellationToken::new();
    let cancel = ct.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();
    });

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![Ok(row(["1"]))]).await;
    let err = task.run(&mut rx, &ct).await.unwrap_err();

    assert!(matches!(err, WriterError::Cancelled { operation: "bulk" }));
    assert_eq!(store.calls("bulk").await, 1);
}

#[tokio::test]
async fn test_truncate_recreates_index_with_retained_settings() {
    let store = Arc::new(InMemorySearchStore::with_version("6.8.23"));
    let mut existing = Settings::new();
    existing.insert("number_of_shards".to_string(), json!(5));
    existing.insert("number_of_replicas".to_string(), json!(2));
    existing.insert("refresh_interval".to_string(), json!("30s"));
    store
        .insert_index("people", existing, json!({"doc": {"properties": {}}}))
        .await;

    let mut job = Job::new(
        config(json!({
            "index": "people",
            "type": "doc",
            "cleanup": true,
            "settings": {"number_of_replicas": 0},
            "column": [{"name": "id", "type": "id"}, {"name": "age", "type": "integer"}]
        })),
        store.clone(),
    )
    .unwrap();
    let prepared = job.prepare(&CancellationToken::new()).await.unwrap();
    assert!(prepared.created);
    assert_eq!(prepared.major_version, 6);

    let body = store.creation_body("people").await.unwrap();
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({
            "settings": {"number_of_shards": "5", "number_of_replicas": 0},
            "mappings": {"doc": {"properties": {
                "age": {"type": "integer", "doc_values": true, "index": true}
            }}}
        })
    );

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![Ok(row(["1", "3"]))]).await;
    task.run(&mut rx, &CancellationToken::new()).await.unwrap();

    let request = store.bulk_requests().await.remove(0);
    assert_eq!(
        request.operations[0].meta.type_name.as_deref(),
        Some("doc")
    );
}
