//! Bulk request and response model.
//!
//! A bulk request body is newline delimited JSON. Each operation is an
//! action line followed, except for deletes, by a source line:
//!
//! ```text
//! {"index":{"_index":"people","_id":"42"}}
//! {"age":7}
//! {"delete":{"_index":"people","_id":"43"}}
//! ```

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The kind of a bulk operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Index,
    Create,
    Update,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for BulkAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionType {
    Internal,
    External,
    ExternalGte,
}

/// Addressing metadata of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkMeta {
    #[serde(rename = "_index")]
    pub index: String,
    /// Mapping type name, only sent to stores older than v7.
    #[serde(rename = "_type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_type: Option<VersionType>,
}

/// One operation of a bulk request.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOperation {
    pub action: BulkAction,
    pub meta: BulkMeta,
    /// Document source, or the partial update body. `None` for deletes.
    pub source: Option<Value>,
}

impl BulkOperation {
    pub fn new(action: BulkAction, meta: BulkMeta, source: Option<Value>) -> Self {
        Self {
            action,
            meta,
            source,
        }
    }

    pub fn delete(meta: BulkMeta) -> Self {
        Self::new(BulkAction::Delete, meta, None)
    }
}

/// A batch of operations sent in a single bulk call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkRequest {
    pub operations: Vec<BulkOperation>,
    /// Extra query parameters, such as `refresh` or `timeout`.
    pub params: Vec<(String, String)>,
}

impl BulkRequest {
    pub fn new(operations: Vec<BulkOperation>) -> Self {
        Self {
            operations,
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = params;
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Encodes the operations as a bulk body. The body ends with a newline.
    pub fn to_ndjson(&self) -> Result<Bytes, serde_json::Error> {
        let mut body = BytesMut::with_capacity(self.operations.len() * 128).writer();

        for op in &self.operations {
            let mut action = serde_json::Map::with_capacity(1);
            action.insert(op.action.as_str().to_string(), serde_json::to_value(&op.meta)?);
            serde_json::to_writer(&mut body, &action)?;
            body.get_mut().put_u8(b'\n');

            if let Some(source) = &op.source {
                serde_json::to_writer(&mut body, source)?;
                body.get_mut().put_u8(b'\n');
            }
        }

        Ok(body.into_inner().freeze())
    }
}

/// Outcome of one bulk operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "_version", default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl BulkItemResult {
    pub fn is_failed(&self) -> bool {
        !(200..=299).contains(&self.status)
    }

    /// Short description of the failure reported by the store.
    pub fn reason(&self) -> String {
        match &self.error {
            Some(Value::Object(error)) => {
                let kind = error.get("type").and_then(Value::as_str).unwrap_or("error");
                let reason = error.get("reason").and_then(Value::as_str).unwrap_or("");
                format!("{kind}: {reason}")
            }
            Some(other) => other.to_string(),
            None => format!("status {}", self.status),
        }
    }
}

/// One entry of a bulk response, keyed by the operation's action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkItem {
    Index(BulkItemResult),
    Create(BulkItemResult),
    Update(BulkItemResult),
    Delete(BulkItemResult),
}

impl BulkItem {
    pub fn new(action: BulkAction, result: BulkItemResult) -> Self {
        match action {
            BulkAction::Index => Self::Index(result),
            BulkAction::Create => Self::Create(result),
            BulkAction::Update => Self::Update(result),
            BulkAction::Delete => Self::Delete(result),
        }
    }

    pub fn action(&self) -> BulkAction {
        match self {
            Self::Index(_) => BulkAction::Index,
            Self::Create(_) => BulkAction::Create,
            Self::Update(_) => BulkAction::Update,
            Self::Delete(_) => BulkAction::Delete,
        }
    }

    pub fn result(&self) -> &BulkItemResult {
        match self {
            Self::Index(r) | Self::Create(r) | Self::Update(r) | Self::Delete(r) => r,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    #[serde(default)]
    pub errors: bool,
    #[serde(default)]
    pub items: Vec<BulkItem>,
}

impl BulkResponse {
    /// Items the store did not apply.
    pub fn failed(&self) -> impl Iterator<Item = &BulkItem> {
        self.items.iter().filter(|item| item.result().is_failed())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn lines(body: &Bytes) -> Vec<Value> {
        std::str::from_utf8(body)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_ndjson_layout() {
        let request = BulkRequest::new(vec![
            BulkOperation::new(
                BulkAction::Index,
                BulkMeta {
                    index: "people".to_string(),
                    id: Some("42".to_string()),
                    version: Some(3),
                    version_type: Some(VersionType::External),
                    ..Default::default()
                },
                Some(json!({"age": 7})),
            ),
            BulkOperation::delete(BulkMeta {
                index: "people".to_string(),
                type_name: Some("doc".to_string()),
                id: Some("43".to_string()),
                routing: Some("r1".to_string()),
                ..Default::default()
            }),
        ]);

        let body = request.to_ndjson().unwrap();
        assert!(body.ends_with(b"\n"));
        assert_eq!(
            lines(&body),
            vec![
                json!({"index": {"_index": "people", "_id": "42", "version": 3, "version_type": "external"}}),
                json!({"age": 7}),
                json!({"delete": {"_index": "people", "_type": "doc", "_id": "43", "routing": "r1"}}),
            ]
        );
    }

    #[test]
    fn test_empty_request_encodes_to_nothing() {
        assert!(BulkRequest::default().to_ndjson().unwrap().is_empty());
    }

    #[test]
    fn test_response_failed_items() {
        let response: BulkResponse = serde_json::from_value(json!({
            "took": 30,
            "errors": true,
            "items": [
                {"index": {"_index": "people", "_id": "1", "status": 201, "result": "created"}},
                {"create": {"_index": "people", "_id": "2", "status": 409,
                    "error": {"type": "version_conflict_engine_exception", "reason": "document already exists"}}},
                {"delete": {"_index": "people", "_id": "3", "status": 200, "result": "deleted"}}
            ]
        }))
        .unwrap();

        assert_eq!(response.failed_count(), 1);
        let failed = response.failed().next().unwrap();
        assert_eq!(failed.action(), BulkAction::Create);
        assert_eq!(
            failed.result().reason(),
            "version_conflict_engine_exception: document already exists"
        );
    }
}
