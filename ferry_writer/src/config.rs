use std::time::Duration;

use ferry_schema::{ActionType, ColumnConfig, FieldType, JsonText, Settings};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::ensure;

use crate::{
    error::{InvalidConfigSnafu, Result},
    retry::RetryPolicy,
};

pub const DEFAULT_SPLITTER: &str = "-,-";

/// Source columns whose joined values form the document id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryKeyInfo {
    #[serde(default)]
    pub column: Vec<String>,
    #[serde(default)]
    pub field_delimiter: Option<String>,
}

/// A column contributing to the routing key.
///
/// Written either as `{"name": "region"}` or as a bare `"region"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartitionColumn {
    Named { name: String },
    Bare(String),
}

impl PartitionColumn {
    pub fn name(&self) -> &str {
        match self {
            Self::Named { name } | Self::Bare(name) => name,
        }
    }
}

/// Configuration of a write job, as found in the job's JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriterConfig {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Request timeout in milliseconds.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub index: String,
    #[serde(default, alias = "type")]
    pub index_type: Option<String>,
    #[serde(default)]
    pub action_type: Option<String>,
    #[serde(default)]
    pub dynamic: bool,
    #[serde(default)]
    pub dst_dynamic: Option<String>,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "column")]
    pub columns: Vec<ColumnConfig>,
    #[serde(default, alias = "cleanup")]
    pub truncate: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_try_size")]
    pub try_size: u32,
    #[serde(default = "default_try_interval")]
    pub try_interval: u64,
    #[serde(default = "default_retry_times")]
    pub retry_times: u32,
    #[serde(default = "default_sleep_time")]
    pub sleep_time_in_milli_second: u64,
    /// Major version of the store; probed from the store when unset or zero.
    #[serde(default)]
    pub es_version: Option<u32>,
    #[serde(default)]
    pub primary_key_info: JsonText<Option<PrimaryKeyInfo>>,
    #[serde(default)]
    pub es_partition_column: JsonText<Vec<PartitionColumn>>,
    #[serde(default)]
    pub delete_by: JsonText<Vec<Map<String, Value>>>,
    #[serde(default = "default_splitter")]
    pub splitter: String,
    #[serde(default = "default_true")]
    pub enable_write_null: bool,
    #[serde(default)]
    pub enable_redundant_column: bool,
    #[serde(default)]
    pub field_delimiter: Option<String>,
    #[serde(default)]
    pub url_params: Map<String, Value>,
    /// Zone date columns are rendered in when they set none.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_batch_size() -> usize {
    1000
}

fn default_try_size() -> u32 {
    30
}

fn default_try_interval() -> u64 {
    60_000
}

fn default_retry_times() -> u32 {
    3
}

fn default_sleep_time() -> u64 {
    10_000
}

fn default_splitter() -> String {
    DEFAULT_SPLITTER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl WriterConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Rejects configurations that cannot produce a valid job.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.index.trim().is_empty(),
            InvalidConfigSnafu {
                message: "index is required"
            }
        );
        ensure!(
            !self.columns.is_empty(),
            InvalidConfigSnafu {
                message: "at least one column is required"
            }
        );
        ensure!(
            self.batch_size > 0,
            InvalidConfigSnafu {
                message: "batchSize must be positive"
            }
        );
        ensure!(
            self.try_size > 0 && self.retry_times > 0,
            InvalidConfigSnafu {
                message: "trySize and retryTimes must be positive"
            }
        );
        ensure!(
            self.action() != ActionType::Unknown,
            InvalidConfigSnafu {
                message: format!(
                    "unknown actionType {}",
                    self.action_type.as_deref().unwrap_or_default()
                )
            }
        );
        ensure!(
            !self.splitter.is_empty(),
            InvalidConfigSnafu {
                message: "splitter must not be empty"
            }
        );
        Ok(())
    }

    pub fn action(&self) -> ActionType {
        ActionType::parse(self.action_type.as_deref())
    }

    /// The mapping type name, falling back to the index name.
    pub fn type_name(&self) -> &str {
        self.index_type
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.index)
    }

    /// Whether any column is declared as an id, including the `pk` shorthand.
    pub fn has_id_column(&self) -> bool {
        self.columns
            .iter()
            .any(|column| column.name == "pk" || FieldType::parse(&column.type_name) == Some(FieldType::Id))
    }

    /// The primary key info, when it names at least one column.
    pub fn primary_key(&self) -> Option<PrimaryKeyInfo> {
        self.primary_key_info
            .as_ref()
            .filter(|info| !info.column.is_empty())
            .map(|info| PrimaryKeyInfo {
                column: info.column.clone(),
                field_delimiter: info
                    .field_delimiter
                    .clone()
                    .or_else(|| self.field_delimiter.clone()),
            })
    }

    pub fn partition_columns(&self) -> Vec<String> {
        self.es_partition_column
            .iter()
            .map(|column| column.name().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    /// Query parameters appended to every bulk request.
    pub fn bulk_params(&self) -> Vec<(String, String)> {
        self.url_params
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Retry policy of index preparation.
    pub fn prepare_retry(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_times,
            Duration::from_millis(self.sleep_time_in_milli_second),
        )
    }

    /// Retry policy of bulk dispatch.
    pub fn bulk_retry(&self) -> RetryPolicy {
        RetryPolicy::new(self.try_size, Duration::from_millis(self.try_interval))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.timeout.filter(|ms| *ms > 0).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn config(value: Value) -> WriterConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = config(json!({
            "index": "people",
            "column": [{"name": "id", "type": "id"}]
        }));

        assert_eq!(config.action(), ActionType::Index);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.try_size, 30);
        assert_eq!(config.try_interval, 60_000);
        assert_eq!(config.retry_times, 3);
        assert_eq!(config.sleep_time_in_milli_second, 10_000);
        assert_eq!(config.splitter, "-,-");
        assert!(config.enable_write_null);
        assert!(!config.enable_redundant_column);
        assert!(!config.truncate);
        assert_eq!(config.type_name(), "people");
        assert_eq!(config.timezone, "UTC");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_legacy_aliases_and_string_encoded_options() {
        let config = config(json!({
            "index": "people",
            "type": "doc",
            "cleanup": true,
            "actionType": "update",
            "fieldDelimiter": "#",
            "primaryKeyInfo": "{\"column\": [\"a\", \"b\"]}",
            "esPartitionColumn": "[{\"name\": \"region\"}, \"zone\"]",
            "deleteBy": "[{\"status\": \"deleted\"}]",
            "urlParams": {"refresh": "wait_for", "timeout": 30},
            "column": [{"name": "a", "type": "keyword"}]
        }));

        assert_eq!(config.type_name(), "doc");
        assert!(config.truncate);
        assert_eq!(config.action(), ActionType::Update);
        assert_eq!(
            config.primary_key(),
            Some(PrimaryKeyInfo {
                column: vec!["a".to_string(), "b".to_string()],
                field_delimiter: Some("#".to_string()),
            })
        );
        assert_eq!(config.partition_columns(), vec!["region", "zone"]);
        assert_eq!(config.delete_by.len(), 1);
        assert_eq!(
            config.bulk_params(),
            vec![
                ("refresh".to_string(), "wait_for".to_string()),
                ("timeout".to_string(), "30".to_string())
            ]
        );
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        let base = json!({"index": "people", "column": [{"name": "a", "type": "keyword"}]});

        let mut missing_index = base.clone();
        missing_index["index"] = json!("");
        assert!(config(missing_index).validate().is_err());

        let mut no_columns = base.clone();
        no_columns["column"] = json!([]);
        assert!(config(no_columns).validate().is_err());

        let mut zero_batch = base.clone();
        zero_batch["batchSize"] = json!(0);
        assert!(config(zero_batch).validate().is_err());

        let mut zero_tries = base.clone();
        zero_tries["trySize"] = json!(0);
        assert!(config(zero_tries).validate().is_err());

        let mut unknown_action = base.clone();
        unknown_action["actionType"] = json!("upsert");
        assert!(config(unknown_action).validate().is_err());
    }

    #[test]
    fn test_has_id_column() {
        let with_pk = config(json!({"index": "i", "column": [{"name": "pk", "type": "keyword"}]}));
        assert!(with_pk.has_id_column());

        let without = config(json!({"index": "i", "column": [{"name": "a", "type": "keyword"}]}));
        assert!(!without.has_id_column());
        assert!(without.primary_key().is_none());
    }
}
