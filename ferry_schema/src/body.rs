use serde::Serialize;
use serde_json::{Map, Value, json};

/// Free-form index settings.
pub type Settings = Map<String, Value>;

/// Settings carried over from an index that is truncated.
pub const RETAINED_SETTING_KEYS: [&str; 2] = ["number_of_shards", "number_of_replicas"];

/// The body of an index creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexBody {
    pub settings: Settings,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mappings: Option<Value>,
}

impl IndexBody {
    /// Builds the creation body.
    ///
    /// Empty settings fall back to a single shard without replicas. With
    /// `dynamic` set the mappings are left out and the store derives them.
    pub fn new(settings: Settings, mappings: Value, dynamic: bool) -> Self {
        let settings = if settings.is_empty() {
            default_settings()
        } else {
            settings
        };

        Self {
            settings,
            mappings: (!dynamic).then_some(mappings),
        }
    }
}

pub fn default_settings() -> Settings {
    let mut settings = Settings::new();
    settings.insert("number_of_shards".to_string(), json!(1));
    settings.insert("number_of_replicas".to_string(), json!(0));
    settings
}

/// Merges `incoming` into `target`. Keys present in both take the incoming
/// value; keys only in `target` are kept.
pub fn merge_settings(target: &mut Settings, incoming: &Settings) {
    for (key, value) in incoming {
        target.insert(key.clone(), value.clone());
    }
}

/// Extracts the retained keys from the settings reported for an index.
///
/// Stores report settings nested under `index` (`{"index": {"number_of_shards": "3"}}`);
/// flat keys are accepted too.
pub fn retained_settings(reported: &Settings) -> Settings {
    let mut retained = Settings::new();
    let nested = reported
        .values()
        .filter_map(Value::as_object)
        .chain(std::iter::once(reported));

    for source in nested {
        for key in RETAINED_SETTING_KEYS {
            if let Some(value) = source.get(key).filter(|v| !v.is_null()) {
                retained.insert(key.to_string(), value.clone());
            }
        }
    }

    retained
}
