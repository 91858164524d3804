use std::sync::Arc;

use ferry_store::{BulkAction, InMemorySearchStore};
use ferry_writer::{ColumnValue, Record, SourceError, WriterError};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

mod common;

use common::{prepared_job, prepared_job_on, receiver, row};

#[tokio::test]
async fn test_id_and_integer_columns() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "column": [{"name": "id", "type": "id"}, {"name": "age", "type": "integer"}]
    }))
    .await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![Ok(row(["42", "7"]))]).await;
    let summary = task.run(&mut rx, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(summary.documents, 1);
    assert_eq!(summary.batches, 1);
    assert_eq!(
        store.document("people", "42").await.unwrap().source,
        json!({"age": 7})
    );
}

#[tokio::test]
async fn test_records_are_written_in_batches() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "batchSize": 2,
        "urlParams": {"refresh": "true"},
        "column": [{"name": "id", "type": "id"}, {"name": "name", "type": "keyword"}]
    }))
    .await;

    let task = job.split(1).unwrap().remove(0);
    let records = (0..5)
        .map(|i| Ok(Record::from_iter([i.to_string(), format!("n{i}")])))
        .collect();
    let mut rx = receiver(records).await;
    let summary = task.run(&mut rx, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.documents, 5);

    let requests = store.bulk_requests().await;
    assert_eq!(
        requests.iter().map(|r| r.len()).collect::<Vec<_>>(),
        vec![2, 2, 1]
    );
    assert!(
        requests
            .iter()
            .all(|r| r.params == vec![("refresh".to_string(), "true".to_string())])
    );
    assert_eq!(store.documents("people").await.len(), 5);
}

#[tokio::test]
async fn test_short_array_and_date_columns() {
    let (job, store) = prepared_job(json!({
        "index": "events",
        "column": [
            {"name": "id", "type": "id"},
            {"name": "slots", "type": "short", "array": true, "dstArray": true},
            {"name": "day", "type": "date", "format": "2006/01/02 15:04:05", "dstFormat": "2006-01-02"}
        ]
    }))
    .await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![Ok(row(["e1", "1-,-2-,-", "2024/01/02 10:00:00"]))]).await;
    task.run(&mut rx, &CancellationToken::new()).await.unwrap();

    assert_eq!(
        store.document("events", "e1").await.unwrap().source,
        json!({"slots": [1, 2], "day": "2024-01-02"})
    );
}

#[tokio::test]
async fn test_delete_by_removes_non_matching_records() {
    let store = Arc::new(InMemorySearchStore::new());
    let (job, store) = prepared_job_on(
        json!({
            "index": "people",
            "deleteBy": [{"status": "deleted"}],
            "column": [{"name": "id", "type": "id"}, {"name": "status", "type": "keyword"}]
        }),
        store,
    )
    .await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![
        Ok(row(["1", "deleted"])),
        Ok(row(["1", "active"])),
    ])
    .await;
    task.run(&mut rx, &CancellationToken::new()).await.unwrap();

    let request = store.bulk_requests().await.remove(0);
    assert_eq!(
        request.operations.iter().map(|op| op.action).collect::<Vec<_>>(),
        vec![BulkAction::Index, BulkAction::Delete]
    );
    assert!(store.document("people", "1").await.is_none());
}

#[tokio::test]
async fn test_update_merges_into_existing_documents() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "actionType": "update",
        "column": [
            {"name": "id", "type": "id"},
            {"name": "name", "type": "keyword"},
            {"name": "age", "type": "integer"}
        ]
    }))
    .await;

    let tasks = job.split(1).unwrap();
    let ct = CancellationToken::new();

    let mut first = receiver(vec![Ok(row(["1", "ada", "36"]))]).await;
    tasks[0].run(&mut first, &ct).await.unwrap();

    let mut second = receiver(vec![Ok(Record::new(vec![
        ColumnValue::from("1"),
        ColumnValue::from("ada"),
        ColumnValue::Int(37),
    ]))])
    .await;
    tasks[0].run(&mut second, &ct).await.unwrap();

    let doc = store.document("people", "1").await.unwrap();
    assert_eq!(doc.source, json!({"name": "ada", "age": 37}));
    assert_eq!(doc.version, 2);
}

#[tokio::test]
async fn test_dirty_records_are_skipped() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "primaryKeyInfo": "{\"column\": [\"a\", \"b\"]}",
        "fieldDelimiter": "|",
        "column": [{"name": "a", "type": "keyword"}, {"name": "b", "type": "keyword"}]
    }))
    .await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![
        Ok(row(["x", "y"])),
        Ok(Record::new(vec![ColumnValue::from("x"), ColumnValue::Null])),
    ])
    .await;
    let summary = task.run(&mut rx, &CancellationToken::new()).await.unwrap();

    assert_eq!(summary.records, 2);
    assert_eq!(summary.dirty, 1);
    assert_eq!(summary.documents, 1);
    assert!(store.document("people", "x|y").await.is_some());
}

#[tokio::test]
async fn test_all_dirty_batch_sends_nothing() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "primaryKeyInfo": {"column": ["a"]},
        "column": [{"name": "a", "type": "keyword"}]
    }))
    .await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![
        Ok(Record::new(vec![ColumnValue::Null])),
        Ok(Record::new(vec![ColumnValue::Null])),
    ])
    .await;
    let err = task
        .run(&mut rx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WriterError::AllDirty { total: 2, .. }));
    assert_eq!(store.calls("bulk").await, 0);
}

#[tokio::test]
async fn test_column_count_is_checked_on_first_record() {
    let columns = json!([{"name": "id", "type": "id"}, {"name": "age", "type": "integer"}]);

    let (strict, _) = prepared_job(json!({"index": "a", "column": columns.clone()})).await;
    let mut rx = receiver(vec![Ok(row(["1", "2", "extra"]))]).await;
    let err = strict.split(1).unwrap()[0]
        .run(&mut rx, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WriterError::ColumnCount {
            expected: 2,
            actual: 3
        }
    ));

    let (lenient, store) = prepared_job(json!({
        "index": "b",
        "enableRedundantColumn": true,
        "column": columns
    }))
    .await;
    let mut rx = receiver(vec![Ok(row(["1", "2", "extra"]))]).await;
    lenient.split(1).unwrap()[0]
        .run(&mut rx, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(store.document("b", "1").await.unwrap().source, json!({"age": 2}));

    let mut short = receiver(vec![Ok(row(["1"]))]).await;
    let err = lenient.split(1).unwrap()[0]
        .run(&mut short, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WriterError::ColumnCount { .. }));
}

#[tokio::test]
async fn test_upstream_error_flushes_pending_records() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "column": [{"name": "id", "type": "id"}, {"name": "age", "type": "integer"}]
    }))
    .await;

    let task = job.split(1).unwrap().remove(0);
    let mut rx = receiver(vec![
        Ok(row(["1", "10"])),
        Err(SourceError::new("reader lost its connection")),
        Ok(row(["2", "20"])),
    ])
    .await;
    let err = task
        .run(&mut rx, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WriterError::Upstream { .. }));
    assert!(store.document("people", "1").await.is_some());
    assert!(store.document("people", "2").await.is_none());
}

#[tokio::test]
async fn test_tasks_write_concurrently_into_one_index() {
    let (job, store) = prepared_job(json!({
        "index": "people",
        "batchSize": 3,
        "column": [{"name": "id", "type": "id"}, {"name": "n", "type": "long"}]
    }))
    .await;

    let ct = CancellationToken::new();
    let handles = job
        .split(4)
        .unwrap()
        .into_iter()
        .map(|task| {
            let ct = ct.clone();
            tokio::spawn(async move {
                let records = (0..10)
                    .map(|i| {
                        let id = format!("{}-{i}", task.id());
                        Ok(Record::from_iter([Value::from(id), Value::from(i)]))
                    })
                    .collect();
                let mut rx = receiver(records).await;
                task.run(&mut rx, &ct).await
            })
        })
        .collect::<Vec<_>>();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().documents, 10);
    }
    assert_eq!(store.documents("people").await.len(), 40);
    assert_eq!(store.calls("create_index").await, 1);
}
