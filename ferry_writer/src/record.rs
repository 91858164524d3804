//! Records pulled from the upstream source.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::SourceError;

/// A single column value of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Time(DateTime<Utc>),
    Json(Value),
}

impl ColumnValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The textual form of the value. `None` for nulls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(value) => Some(value.to_string()),
            Self::Int(value) => Some(value.to_string()),
            Self::Float(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
            Self::Time(value) => Some(value.to_rfc3339()),
            Self::Json(Value::String(value)) => Some(value.clone()),
            Self::Json(value) => Some(value.to_string()),
        }
    }

    /// The textual form of the value, with nulls read as empty text.
    pub fn text_or_empty(&self) -> String {
        self.as_text().unwrap_or_default()
    }
}

impl From<Value> for ColumnValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Int(value),
                None => number
                    .as_f64()
                    .map(Self::Float)
                    .unwrap_or_else(|| Self::Text(number.to_string())),
            },
            Value::String(value) => Self::Text(value),
            other => Self::Json(other),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ColumnValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ColumnValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for ColumnValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

/// An ordered row of column values.
///
/// Values are positional: the n-th value belongs to the n-th configured column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<ColumnValue>,
}

impl Record {
    pub fn new(values: Vec<ColumnValue>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnValue> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[ColumnValue] {
        &self.values
    }
}

impl<V: Into<ColumnValue>> FromIterator<V> for Record {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

/// The upstream side of a task: a pull-based stream of records.
#[async_trait]
pub trait RecordReceiver: Send {
    /// Waits for the next record. `None` signals the end of the stream.
    async fn next(&mut self) -> Option<Result<Record, SourceError>>;
}

/// A [`RecordReceiver`] fed through a bounded channel.
pub struct ChannelReceiver {
    rx: mpsc::Receiver<Result<Record, SourceError>>,
}

/// Sending half of a [`ChannelReceiver`].
pub type RecordSender = mpsc::Sender<Result<Record, SourceError>>;

impl ChannelReceiver {
    pub fn new(rx: mpsc::Receiver<Result<Record, SourceError>>) -> Self {
        Self { rx }
    }

    /// Creates a channel holding at most `capacity` pending records.
    pub fn channel(capacity: usize) -> (RecordSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl RecordReceiver for ChannelReceiver {
    async fn next(&mut self) -> Option<Result<Record, SourceError>> {
        self.rx.recv().await
    }
}
