//! Index preparation.
//!
//! Runs once per job, before any task writes. Ensures the target index
//! exists with a mapping synthesized from the configured columns, and
//! carries the shard layout of a truncated index over to its replacement.

use std::sync::LazyLock;

use ferry_observability::ErrorKind;
use ferry_schema::{
    ActionType, ColumnSet, IndexBody, MappingOptions, Settings, merge_settings, retained_settings,
    synthesize,
};
use ferry_store::SearchStore;
use snafu::{ResultExt, ensure};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    config::WriterConfig,
    error::{InvalidConfigSnafu, Result, SchemaSnafu, StoreSnafu},
};

/// Serializes preparations within the process.
///
/// The check-delete-create sequence is not atomic on the store side.
static PREPARE_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

/// The outcome of preparing an index, shared read-only by every task.
#[derive(Debug, Clone)]
pub struct PreparedIndex {
    pub index: String,
    pub type_name: String,
    pub action: ActionType,
    pub major_version: u32,
    pub columns: ColumnSet,
    pub mappings: serde_json::Value,
    /// Settings the index was created with, or would have been.
    pub settings: Settings,
    /// Whether this preparation created the index.
    pub created: bool,
}

impl PreparedIndex {
    pub fn v7_or_above(&self) -> bool {
        self.major_version >= 7
    }
}

/// Prepares the index described by `config`.
pub async fn prepare_index(
    store: &dyn SearchStore,
    config: &WriterConfig,
    ct: &CancellationToken,
) -> Result<PreparedIndex> {
    let _guard = PREPARE_LOCK.lock().await;

    let action = config.action();
    ensure!(
        action != ActionType::Unknown,
        InvalidConfigSnafu {
            message: "unknown actionType"
        }
    );
    ensure!(
        action != ActionType::Update || config.has_id_column() || config.primary_key().is_some(),
        InvalidConfigSnafu {
            message: "update requires an id column or primaryKeyInfo"
        }
    );

    let retry = config.prepare_retry();
    let index = config.index.as_str();

    let major_version = match config.es_version.filter(|version| *version > 0) {
        Some(version) => version,
        None => {
            retry
                .run(ct, "version", move |_| async move {
                    store.version().await.context(StoreSnafu { operation: "version" })
                })
                .await?
                .major()
        }
    };

    let synthesized = synthesize(
        &config.columns,
        &MappingOptions {
            type_name: config.type_name().to_string(),
            v7_or_above: major_version >= 7,
            dst_dynamic: config.dst_dynamic.clone(),
        },
    )
    .context(SchemaSnafu)?;

    let mut exists = retry
        .run(ct, "index_exists", move |_| async move {
            store
                .index_exists(index)
                .await
                .context(StoreSnafu { operation: "index_exists" })
        })
        .await?;

    let mut settings = Settings::new();

    if exists && config.truncate {
        let reported = retry
            .run(ct, "get_settings", move |_| async move {
                store
                    .get_settings(index)
                    .await
                    .context(StoreSnafu { operation: "get_settings" })
            })
            .await?;
        merge_settings(&mut settings, &retained_settings(&reported));

        retry
            .run(ct, "delete_index", move |attempt| async move {
                match store.delete_index(index).await {
                    // An earlier attempt may have deleted it before failing.
                    Err(err) if attempt > 1 && err.kind() == ErrorKind::NotFound => Ok(()),
                    other => other.context(StoreSnafu { operation: "delete_index" }),
                }
            })
            .await?;

        info!(index, retained = ?settings, "deleted index for truncation");
        exists = false;
    } else if exists {
        // Informational only, a failed read does not fail preparation.
        match store.get_mapping(index).await {
            Ok(mapping) => info!(index, %mapping, "index already exists"),
            Err(err) => warn!(index, error = %err, "index already exists, failed to read its mapping"),
        }
    }

    merge_settings(&mut settings, &config.settings);

    let mut created = false;
    if !exists {
        let body = IndexBody::new(
            settings.clone(),
            synthesized.mappings.clone(),
            config.dynamic,
        );

        let body_ref = &body;
        let response = retry
            .run(ct, "create_index", move |attempt| async move {
                match store.create_index(index, body_ref).await {
                    // An earlier attempt may have created it before failing.
                    Err(err) if attempt > 1 && err.kind() == ErrorKind::Conflict => Ok(None),
                    other => other
                        .map(Some)
                        .context(StoreSnafu { operation: "create_index" }),
                }
            })
            .await?;

        match response {
            Some(response) if !response.acknowledged => {
                warn!(index, "index creation was not acknowledged");
            }
            _ => info!(index, settings = ?body.settings, "created index"),
        }

        settings = body.settings;
        created = true;
    }

    Ok(PreparedIndex {
        index: config.index.clone(),
        type_name: config.type_name().to_string(),
        action,
        major_version,
        columns: synthesized.columns,
        mappings: synthesized.mappings,
        settings,
        created,
    })
}
