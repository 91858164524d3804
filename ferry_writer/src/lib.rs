//! The write side of the pipeline.
//!
//! A [`Job`] validates its configuration and prepares the target index once.
//! It is then split into [`Task`]s; each task pulls records from its own
//! [`RecordReceiver`], converts them in batches with a [`BatchTransformer`]
//! and sends them to the store as bulk requests.

pub mod config;
pub mod error;
pub mod job;
pub mod metrics;
pub mod prepare;
pub mod record;
pub mod retry;
pub mod task;
pub mod transform;

pub use config::{PartitionColumn, PrimaryKeyInfo, WriterConfig};
pub use error::{RecordError, Result, SourceError, WriterError};
pub use job::Job;
pub use prepare::{PreparedIndex, prepare_index};
pub use record::{ChannelReceiver, ColumnValue, Record, RecordReceiver, RecordSender};
pub use retry::RetryPolicy;
pub use task::{Task, TaskSummary};
pub use transform::{BatchTransformer, TransformedBatch};
