//! The search index store boundary.
//!
//! The writer only needs a handful of store operations: probing the version,
//! managing a single index, and executing bulk requests. [`SearchStore`]
//! captures them; [`HttpSearchStore`] talks to a live cluster and
//! [`InMemorySearchStore`] backs tests and dry runs.

pub mod bulk;
mod error;
mod http;
mod memory;
mod store;

pub use ferry_observability::ErrorKind;

pub use self::bulk::{
    BulkAction, BulkItem, BulkItemResult, BulkMeta, BulkOperation, BulkRequest, BulkResponse,
    VersionType,
};
pub use self::error::*;
pub use self::http::{HttpSearchStore, HttpStoreOptions};
pub use self::memory::{InMemorySearchStore, StoredDocument};
pub use self::store::{CreateIndexResponse, SearchStore, SearchStoreRef, StoreVersion};
