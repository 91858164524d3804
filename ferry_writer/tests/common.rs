#![allow(dead_code)]

use std::sync::Arc;

use ferry_store::InMemorySearchStore;
use ferry_writer::{ChannelReceiver, Job, Record, SourceError, WriterConfig};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub fn config(value: Value) -> WriterConfig {
    serde_json::from_value(value).expect("writer config")
}

pub async fn prepared_job(value: Value) -> (Job, Arc<InMemorySearchStore>) {
    let store = Arc::new(InMemorySearchStore::new());
    prepared_job_on(value, store).await
}

pub async fn prepared_job_on(
    value: Value,
    store: Arc<InMemorySearchStore>,
) -> (Job, Arc<InMemorySearchStore>) {
    let mut job = Job::new(config(value), store.clone()).expect("job init");
    job.prepare(&CancellationToken::new())
        .await
        .expect("job prepare");
    (job, store)
}

/// A receiver yielding `items`, then the end of the stream.
pub async fn receiver(items: Vec<Result<Record, SourceError>>) -> ChannelReceiver {
    let (tx, rx) = ChannelReceiver::channel(items.len().max(1));
    for item in items {
        tx.send(item).await.expect("send record");
    }
    rx
}

pub fn row<const N: usize>(values: [&str; N]) -> Record {
    values.into_iter().collect()
}
