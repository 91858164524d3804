//! Newline-delimited JSON record input.
//!
//! Each non-empty line is a record: either an array of column values in
//! column order, or an object keyed by column name. Columns missing from an
//! object are null.

use ferry_writer::{Record, RecordSender};
use serde_json::Value;
use snafu::ResultExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{InvalidRecordSnafu, IoSnafu, RecordParseSnafu, Result};

pub fn parse_line(line_number: usize, line: &str, columns: &[String]) -> Result<Record> {
    let value: Value = serde_json::from_str(line).context(RecordParseSnafu { line: line_number })?;

    match value {
        Value::Array(values) => Ok(values.into_iter().collect()),
        Value::Object(mut fields) => Ok(columns
            .iter()
            .map(|name| fields.remove(name).unwrap_or(Value::Null))
            .collect()),
        other => InvalidRecordSnafu {
            line: line_number,
            message: format!("expected an array or an object, found {other}"),
        }
        .fail(),
    }
}

/// Reads records from `reader` and sends them round-robin to `senders`.
///
/// Stops early when cancelled or when every receiver is gone. Returns the
/// number of records sent.
pub async fn distribute<R>(
    reader: R,
    columns: &[String],
    mut senders: Vec<RecordSender>,
    ct: &CancellationToken,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut next = 0;
    let mut line_number = 0;
    let mut sent = 0;

    while !senders.is_empty() {
        let line = tokio::select! {
            _ = ct.cancelled() => {
                debug!(sent, "input cancelled");
                break;
            }
            line = lines.next_line() => line.context(IoSnafu {})?,
        };

        let Some(line) = line else {
            break;
        };
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }

        let mut record = parse_line(line_number, &line, columns)?;

        // A closed channel means its task has stopped; keep feeding the rest.
        loop {
            next %= senders.len();
            match senders[next].send(Ok(record)).await {
                Ok(()) => {
                    next += 1;
                    sent += 1;
                    break;
                }
                Err(returned) => {
                    warn!(line = line_number, "task stopped receiving records");
                    senders.swap_remove(next);
                    if senders.is_empty() {
                        return Ok(sent);
                    }
                    record = match returned.0 {
                        Ok(record) => record,
                        Err(_) => return Ok(sent),
                    };
                }
            }
        }
    }

    Ok(sent)
}
