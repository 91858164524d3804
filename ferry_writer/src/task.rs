use std::sync::Arc;

use ferry_store::{BulkRequest, SearchStoreRef};
use snafu::{ResultExt, ensure};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    config::WriterConfig,
    error::{
        CancelledSnafu, ColumnCountSnafu, PartialFailureSnafu, Result, StoreSnafu, UpstreamSnafu,
    },
    metrics::WriterMetrics,
    prepare::PreparedIndex,
    record::{Record, RecordReceiver},
    transform::BatchTransformer,
};

/// Counters of a finished task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskSummary {
    /// Records pulled from the receiver and transformed.
    pub records: usize,
    /// Operations acknowledged by the store.
    pub documents: usize,
    pub dirty: usize,
    pub batches: usize,
}

/// One writer of a job, fed by its own record receiver.
pub struct Task {
    id: usize,
    config: Arc<WriterConfig>,
    prepared: Arc<PreparedIndex>,
    store: SearchStoreRef,
    metrics: Arc<WriterMetrics>,
}

impl Task {
    pub(crate) fn new(
        id: usize,
        config: Arc<WriterConfig>,
        prepared: Arc<PreparedIndex>,
        store: SearchStoreRef,
        metrics: Arc<WriterMetrics>,
    ) -> Self {
        Self {
            id,
            config,
            prepared,
            store,
            metrics,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Pulls records until the stream ends, writing them in batches.
    ///
    /// An upstream error flushes the pending batch before it is returned.
    /// Cancellation abandons the pending batch.
    pub async fn run<R>(&self, receiver: &mut R, ct: &CancellationToken) -> Result<TaskSummary>
    where
        R: RecordReceiver + ?Sized,
    {
        let transformer = BatchTransformer::new(&self.config, &self.prepared)?;
        let batch_size = self.config.batch_size.max(1);
        let mut batch = Vec::with_capacity(batch_size);
        let mut summary = TaskSummary::default();
        let mut checked = false;

        info!(task = self.id, index = %self.prepared.index, batch_size, "task started");

        loop {
            let next = tokio::select! {
                _ = ct.cancelled() => {
                    warn!(task = self.id, pending = batch.len(), "task cancelled");
                    return CancelledSnafu { operation: "receive" }.fail();
                }
                next = receiver.next() => next,
            };

            match next {
                None => break,
                Some(Ok(record)) => {
                    if !checked {
                        self.check_column_count(&record)?;
                        checked = true;
                    }

                    batch.push(record);
                    if batch.len() >= batch_size {
                        self.flush(&transformer, &mut batch, &mut summary, ct).await?;
                    }
                }
                Some(Err(source)) => {
                    self.flush(&transformer, &mut batch, &mut summary, ct).await?;
                    return Err(source).context(UpstreamSnafu);
                }
            }
        }

        self.flush(&transformer, &mut batch, &mut summary, ct).await?;

        info!(
            task = self.id,
            records = summary.records,
            documents = summary.documents,
            dirty = summary.dirty,
            batches = summary.batches,
            "task finished"
        );

        Ok(summary)
    }

    fn check_column_count(&self, record: &Record) -> Result<()> {
        let expected = self.prepared.columns.len();
        let actual = record.len();
        let accepted = if self.config.enable_redundant_column {
            actual >= expected
        } else {
            actual == expected
        };

        ensure!(accepted, ColumnCountSnafu { expected, actual });
        Ok(())
    }

    async fn flush(
        &self,
        transformer: &BatchTransformer,
        batch: &mut Vec<Record>,
        summary: &mut TaskSummary,
        ct: &CancellationToken,
    ) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let records = std::mem::take(batch);
        let transformed = transformer.transform(&records);

        let transformed = match transformed {
            Ok(transformed) => transformed,
            Err(err) => {
                self.metrics.dirty_records.add(records.len() as u64, &[]);
                return Err(err);
            }
        };

        summary.records += records.len();
        summary.dirty += transformed.dirty.len();
        self.metrics
            .dirty_records
            .add(transformed.dirty.len() as u64, &[]);
        for (position, error) in &transformed.dirty {
            warn!(task = self.id, position, %error, "dropping dirty record");
        }

        let request = BulkRequest::new(transformed.operations).with_params(self.config.bulk_params());
        let total = request.len();
        let store = self.store.as_ref();
        let metrics = self.metrics.as_ref();
        let request_ref = &request;

        let response = self
            .config
            .bulk_retry()
            .run(ct, "bulk", move |attempt| async move {
                if attempt > 1 {
                    metrics.bulk_retries.add(1, &[]);
                }
                metrics.bulk_requests.add(1, &[]);

                let response = store
                    .bulk(request_ref)
                    .await
                    .context(StoreSnafu { operation: "bulk" })?;

                // Failed items are final, the batch is never resent.
                let failed = response.failed_count();
                if failed > 0 {
                    let reason = response
                        .failed()
                        .next()
                        .map(|item| item.result().reason())
                        .unwrap_or_default();
                    return PartialFailureSnafu {
                        failed,
                        total,
                        reason,
                    }
                    .fail();
                }

                Ok(response)
            })
            .await?;

        summary.documents += response.items.len();
        summary.batches += 1;
        self.metrics.documents.add(response.items.len() as u64, &[]);

        debug!(
            task = self.id,
            operations = total,
            took = response.took,
            "bulk request acknowledged"
        );

        Ok(())
    }
}
