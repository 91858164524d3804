//! In-memory implementation of the search store.
//!
//! This implementation keeps indices and documents in memory and is suitable
//! for testing and dry runs. It follows the store's bulk semantics closely
//! enough for the writer: external versions, create conflicts, partial
//! updates with upsert, and per-item failures.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use ferry_schema::{IndexBody, Settings};
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

use crate::{
    IndexAlreadyExistsSnafu, IndexNotFoundSnafu, Result, UnavailableSnafu,
    bulk::{
        BulkAction, BulkItem, BulkItemResult, BulkOperation, BulkRequest, BulkResponse,
        VersionType,
    },
    store::{CreateIndexResponse, SearchStore, StoreVersion},
};

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub source: Value,
    pub version: i64,
    pub routing: Option<String>,
    pub parent: Option<String>,
}

#[derive(Debug, Default)]
struct IndexState {
    body: Option<IndexBody>,
    settings: Settings,
    mappings: Value,
    documents: BTreeMap<String, StoredDocument>,
}

#[derive(Debug)]
struct StoreState {
    indices: BTreeMap<String, IndexState>,
    /// Remaining injected failures per operation name.
    failures: HashMap<&'static str, usize>,
    rejected_ids: HashSet<String>,
    acknowledge_creation: bool,
    bulk_requests: Vec<BulkRequest>,
    deleted_indices: Vec<String>,
    calls: HashMap<&'static str, usize>,
}

/// In-memory implementation of [`SearchStore`].
#[derive(Debug)]
pub struct InMemorySearchStore {
    version: StoreVersion,
    state: RwLock<StoreState>,
}

impl Default for InMemorySearchStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySearchStore {
    /// Create an empty store reporting version `7.17.0`.
    pub fn new() -> Self {
        Self::with_version("7.17.0")
    }

    pub fn with_version(number: impl Into<String>) -> Self {
        Self {
            version: StoreVersion::new(number),
            state: RwLock::new(StoreState {
                indices: BTreeMap::new(),
                failures: HashMap::new(),
                rejected_ids: HashSet::new(),
                acknowledge_creation: true,
                bulk_requests: Vec::new(),
                deleted_indices: Vec::new(),
                calls: HashMap::new(),
            }),
        }
    }

    /// Add an existing index.
    pub async fn insert_index(&self, index: impl Into<String>, settings: Settings, mappings: Value) {
        let mut state = self.state.write().await;
        state.indices.insert(
            index.into(),
            IndexState {
                body: None,
                settings,
                mappings,
                documents: BTreeMap::new(),
            },
        );
    }

    /// Make the next `times` calls of `operation` fail with a temporary error.
    ///
    /// Operation names match the [`SearchStore`] method names.
    pub async fn fail_next(&self, operation: &'static str, times: usize) {
        self.state.write().await.failures.insert(operation, times);
    }

    /// Make bulk items addressing `id` fail with a mapping error.
    pub async fn reject_id(&self, id: impl Into<String>) {
        self.state.write().await.rejected_ids.insert(id.into());
    }

    /// Whether index creation is acknowledged. Defaults to `true`.
    pub async fn set_acknowledge_creation(&self, acknowledge: bool) {
        self.state.write().await.acknowledge_creation = acknowledge;
    }

    /// Number of calls of `operation`, including failed ones.
    pub async fn calls(&self, operation: &'static str) -> usize {
        self.state
            .read()
            .await
            .calls
            .get(operation)
            .copied()
            .unwrap_or_default()
    }

    /// Every bulk request received, in order.
    pub async fn bulk_requests(&self) -> Vec<BulkRequest> {
        self.state.read().await.bulk_requests.clone()
    }

    pub async fn deleted_indices(&self) -> Vec<String> {
        self.state.read().await.deleted_indices.clone()
    }

    /// The body the index was created with, if it was created by this store.
    pub async fn creation_body(&self, index: &str) -> Option<IndexBody> {
        self.state
            .read()
            .await
            .indices
            .get(index)
            .and_then(|state| state.body.clone())
    }

    pub async fn document(&self, index: &str, id: &str) -> Option<StoredDocument> {
        self.state
            .read()
            .await
            .indices
            .get(index)
            .and_then(|state| state.documents.get(id).cloned())
    }

    pub async fn documents(&self, index: &str) -> BTreeMap<String, StoredDocument> {
        self.state
            .read()
            .await
            .indices
            .get(index)
            .map(|state| state.documents.clone())
            .unwrap_or_default()
    }
}

impl StoreState {
    fn enter(&mut self, operation: &'static str) -> Result<()> {
        *self.calls.entry(operation).or_default() += 1;

        match self.failures.get_mut(operation) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                UnavailableSnafu {
                    operation,
                    message: "injected failure",
                }
                .fail()
            }
            _ => Ok(()),
        }
    }

    fn apply(&mut self, op: &BulkOperation) -> BulkItemResult {
        let index = op.meta.index.clone();
        let id = op.meta.id.clone();

        if let Some(id) = id.as_deref().filter(|id| self.rejected_ids.contains(*id)) {
            return failure(
                &index,
                Some(id),
                400,
                "mapper_parsing_exception",
                "failed to parse document",
            );
        }

        let state = self.indices.entry(index.clone()).or_default();

        match op.action {
            BulkAction::Index | BulkAction::Create => {
                let id = id.unwrap_or_else(|| ulid::Ulid::new().to_string());
                let existing = state.documents.get(&id);

                if op.action == BulkAction::Create && existing.is_some() {
                    return failure(
                        &index,
                        Some(&id),
                        409,
                        "version_conflict_engine_exception",
                        "document already exists",
                    );
                }

                let version = match (op.meta.version, op.meta.version_type) {
                    (Some(version), Some(VersionType::External | VersionType::ExternalGte)) => {
                        let current = existing.map(|doc| doc.version);
                        let stale = match op.meta.version_type {
                            Some(VersionType::ExternalGte) => current.is_some_and(|c| version < c),
                            _ => current.is_some_and(|c| version <= c),
                        };
                        if stale {
                            return failure(
                                &index,
                                Some(&id),
                                409,
                                "version_conflict_engine_exception",
                                "version conflict",
                            );
                        }
                        version
                    }
                    _ => existing.map(|doc| doc.version + 1).unwrap_or(1),
                };

                let result = if existing.is_some() {
                    "updated"
                } else {
                    "created"
                };
                let status = if existing.is_some() { 200 } else { 201 };

                state.documents.insert(
                    id.clone(),
                    StoredDocument {
                        source: op.source.clone().unwrap_or(Value::Object(Map::new())),
                        version,
                        routing: op.meta.routing.clone(),
                        parent: op.meta.parent.clone(),
                    },
                );

                success(&index, &id, version, status, result)
            }
            BulkAction::Update => {
                let Some(id) = id else {
                    return failure(
                        &index,
                        None,
                        400,
                        "action_request_validation_exception",
                        "id is missing",
                    );
                };

                let body = op.source.clone().unwrap_or(Value::Null);
                let doc = body.get("doc").cloned().unwrap_or(Value::Object(Map::new()));
                let upsert = body
                    .get("doc_as_upsert")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);

                match state.documents.get_mut(&id) {
                    Some(existing) => {
                        if let (Value::Object(target), Value::Object(patch)) =
                            (&mut existing.source, doc)
                        {
                            target.extend(patch);
                        }
                        existing.version += 1;
                        success(&index, &id, existing.version, 200, "updated")
                    }
                    None if upsert => {
                        state.documents.insert(
                            id.clone(),
                            StoredDocument {
                                source: doc,
                                version: 1,
                                routing: op.meta.routing.clone(),
                                parent: op.meta.parent.clone(),
                            },
                        );
                        success(&index, &id, 1, 201, "created")
                    }
                    None => failure(
                        &index,
                        Some(&id),
                        404,
                        "document_missing_exception",
                        "document missing",
                    ),
                }
            }
            BulkAction::Delete => {
                let Some(id) = id else {
                    return failure(
                        &index,
                        None,
                        400,
                        "action_request_validation_exception",
                        "id is missing",
                    );
                };

                match state.documents.remove(&id) {
                    Some(removed) => success(&index, &id, removed.version + 1, 200, "deleted"),
                    None => BulkItemResult {
                        index,
                        id: Some(id),
                        version: None,
                        status: 404,
                        result: Some("not_found".to_string()),
                        error: None,
                    },
                }
            }
        }
    }
}

fn success(index: &str, id: &str, version: i64, status: u16, result: &str) -> BulkItemResult {
    BulkItemResult {
        index: index.to_string(),
        id: Some(id.to_string()),
        version: Some(version),
        status,
        result: Some(result.to_string()),
        error: None,
    }
}

fn failure(index: &str, id: Option<&str>, status: u16, kind: &str, reason: &str) -> BulkItemResult {
    BulkItemResult {
        index: index.to_string(),
        id: id.map(str::to_string),
        version: None,
        status,
        result: None,
        error: Some(json!({"type": kind, "reason": reason})),
    }
}

/// Settings as the store reports them: nested under `index`, values as strings.
fn reported_settings(settings: &Settings) -> Settings {
    let values = settings
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(_) | Value::Object(_) | Value::Array(_) => value.clone(),
                other => Value::String(other.to_string()),
            };
            (key.clone(), value)
        })
        .collect::<Map<_, _>>();

    let mut reported = Settings::new();
    reported.insert("index".to_string(), Value::Object(values));
    reported
}

#[async_trait]
impl SearchStore for InMemorySearchStore {
    async fn version(&self) -> Result<StoreVersion> {
        self.state.write().await.enter("version")?;
        Ok(self.version.clone())
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        state.enter("index_exists")?;
        Ok(state.indices.contains_key(index))
    }

    async fn get_mapping(&self, index: &str) -> Result<Value> {
        let mut state = self.state.write().await;
        state.enter("get_mapping")?;
        match state.indices.get(index) {
            Some(index_state) => Ok(index_state.mappings.clone()),
            None => IndexNotFoundSnafu { index }.fail(),
        }
    }

    async fn get_settings(&self, index: &str) -> Result<Settings> {
        let mut state = self.state.write().await;
        state.enter("get_settings")?;
        match state.indices.get(index) {
            Some(index_state) => Ok(reported_settings(&index_state.settings)),
            None => IndexNotFoundSnafu { index }.fail(),
        }
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut state = self.state.write().await;
        state.enter("delete_index")?;
        if state.indices.remove(index).is_none() {
            return IndexNotFoundSnafu { index }.fail();
        }
        state.deleted_indices.push(index.to_string());
        Ok(())
    }

    async fn create_index(&self, index: &str, body: &IndexBody) -> Result<CreateIndexResponse> {
        let mut state = self.state.write().await;
        state.enter("create_index")?;
        if state.indices.contains_key(index) {
            return IndexAlreadyExistsSnafu { index }.fail();
        }

        state.indices.insert(
            index.to_string(),
            IndexState {
                body: Some(body.clone()),
                settings: body.settings.clone(),
                mappings: body.mappings.clone().unwrap_or_else(|| json!({})),
                documents: BTreeMap::new(),
            },
        );

        let acknowledged = state.acknowledge_creation;
        Ok(CreateIndexResponse {
            acknowledged,
            shards_acknowledged: acknowledged,
        })
    }

    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse> {
        let mut state = self.state.write().await;
        state.enter("bulk")?;
        state.bulk_requests.push(request.clone());

        let items = request
            .operations
            .iter()
            .map(|op| BulkItem::new(op.action, state.apply(op)))
            .collect::<Vec<_>>();

        Ok(BulkResponse {
            took: 1,
            errors: items.iter().any(|item| item.result().is_failed()),
            items,
        })
    }
}
