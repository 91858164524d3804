use std::sync::Arc;

use ferry_store::SearchStoreRef;
use snafu::OptionExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::WriterConfig,
    error::{NotPreparedSnafu, Result},
    metrics::WriterMetrics,
    prepare::{PreparedIndex, prepare_index},
    task::Task,
};

/// A write job: one index, one configuration, any number of tasks.
///
/// The job prepares the index once. Tasks created by [`Job::split`] share
/// the prepared column set, so every task converts records the same way.
pub struct Job {
    config: Arc<WriterConfig>,
    store: SearchStoreRef,
    metrics: Arc<WriterMetrics>,
    prepared: Option<Arc<PreparedIndex>>,
}

impl Job {
    /// Validates the configuration and binds it to a store.
    pub fn new(config: WriterConfig, store: SearchStoreRef) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            store,
            metrics: Arc::new(WriterMetrics::default()),
            prepared: None,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn prepared(&self) -> Option<&PreparedIndex> {
        self.prepared.as_deref()
    }

    /// Ensures the index exists. Preparing twice reuses the first result.
    pub async fn prepare(&mut self, ct: &CancellationToken) -> Result<&PreparedIndex> {
        if self.prepared.is_none() {
            let prepared = prepare_index(self.store.as_ref(), &self.config, ct).await?;
            info!(
                index = %prepared.index,
                major_version = prepared.major_version,
                generation = prepared.columns.generation(),
                created = prepared.created,
                "index prepared"
            );
            self.prepared = Some(Arc::new(prepared));
        }

        self.prepared
            .as_deref()
            .context(NotPreparedSnafu)
    }

    /// Creates `count` tasks sharing the prepared index. At least one task
    /// is always created.
    pub fn split(&self, count: usize) -> Result<Vec<Task>> {
        let prepared = self.prepared.clone().context(NotPreparedSnafu)?;

        Ok((0..count.max(1))
            .map(|id| {
                Task::new(
                    id,
                    self.config.clone(),
                    prepared.clone(),
                    self.store.clone(),
                    self.metrics.clone(),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use ferry_store::InMemorySearchStore;
    use serde_json::json;

    use super::*;
    use crate::error::WriterError;

    fn job() -> (Job, Arc<InMemorySearchStore>) {
        let store = Arc::new(InMemorySearchStore::new());
        let config = serde_json::from_value(json!({
            "index": "people",
            "column": [{"name": "id", "type": "id"}, {"name": "age", "type": "integer"}]
        }))
        .unwrap();
        (Job::new(config, store.clone()).unwrap(), store)
    }

    #[test]
    fn test_invalid_config_is_rejected_on_init() {
        let config = serde_json::from_value(json!({"index": "", "column": []})).unwrap();
        let err = Job::new(config, Arc::new(InMemorySearchStore::new()))
            .err()
            .unwrap();
        assert!(matches!(err, WriterError::InvalidConfig { .. }));
    }

    #[test]
    fn test_split_requires_prepare() {
        let (job, _) = job();
        assert!(matches!(
            job.split(2).err().unwrap(),
            WriterError::NotPrepared
        ));
    }

    #[tokio::test]
    async fn test_prepare_runs_once() {
        let (mut job, store) = job();
        let ct = CancellationToken::new();

        let generation = job.prepare(&ct).await.unwrap().columns.generation();
        let again = job.prepare(&ct).await.unwrap().columns.generation();
        assert_eq!(generation, again);
        assert_eq!(store.calls("create_index").await, 1);

        let tasks = job.split(3).unwrap();
        assert_eq!(
            tasks.iter().map(Task::id).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert_eq!(job.split(0).unwrap().len(), 1);
    }
}
