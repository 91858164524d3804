use std::sync::Arc;

use async_trait::async_trait;
use ferry_schema::{IndexBody, Settings};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    Result,
    bulk::{BulkRequest, BulkResponse},
};

/// Version information reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreVersion {
    pub number: String,
}

impl StoreVersion {
    pub fn new(number: impl Into<String>) -> Self {
        Self {
            number: number.into(),
        }
    }

    /// The leading component of the version number, `0` if unparsable.
    pub fn major(&self) -> u32 {
        self.number
            .split('.')
            .next()
            .and_then(|major| major.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIndexResponse {
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub shards_acknowledged: bool,
}

/// The remote search index store the writer talks to.
#[async_trait]
pub trait SearchStore: Send + Sync {
    /// Return the version of the store.
    async fn version(&self) -> Result<StoreVersion>;

    /// Check whether the index exists.
    async fn index_exists(&self, index: &str) -> Result<bool>;

    /// Return the mapping of an existing index.
    async fn get_mapping(&self, index: &str) -> Result<Value>;

    /// Return the settings of an existing index, as reported under the index name.
    async fn get_settings(&self, index: &str) -> Result<Settings>;

    /// Delete an index.
    async fn delete_index(&self, index: &str) -> Result<()>;

    /// Create an index with the given settings and mappings.
    async fn create_index(&self, index: &str, body: &IndexBody) -> Result<CreateIndexResponse>;

    /// Execute a bulk request.
    ///
    /// Succeeds when the store accepted the request, even if some items
    /// failed. Callers inspect [`BulkResponse::failed`].
    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse>;
}

pub type SearchStoreRef = Arc<dyn SearchStore>;
