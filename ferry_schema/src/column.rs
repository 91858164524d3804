use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{FieldType, json_text::JsonText};

/// Default separator joining the members of a composite identifier.
pub const DEFAULT_COMBINED_SEPARATOR: &str = "-";

/// A column entry as written in the job configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true", rename = "doc_values")]
    pub doc_values: bool,
    #[serde(default = "default_true")]
    pub index: bool,
    #[serde(default, rename = "eager_global_ordinals")]
    pub eager_global_ordinals: bool,
    #[serde(default)]
    pub analyzer: Option<String>,
    #[serde(default)]
    pub norms: bool,
    #[serde(default)]
    pub fields: JsonText<Value>,
    #[serde(default)]
    pub origin: bool,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub dst_format: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub tree: Option<String>,
    #[serde(default)]
    pub precision: Option<String>,
    #[serde(default)]
    pub dynamic: Option<Value>,
    #[serde(default, rename = "other_params")]
    pub other_params: JsonText<Map<String, Value>>,
    #[serde(default)]
    pub array: bool,
    #[serde(default)]
    pub dst_array: bool,
    #[serde(default)]
    pub json_array: bool,
    #[serde(default)]
    pub combine_fields: Vec<String>,
    #[serde(default)]
    pub combine_fields_value_separator: Option<String>,
}

fn default_true() -> bool {
    true
}

impl ColumnConfig {
    /// A column with the given name and type and default options.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            doc_values: true,
            index: true,
            eager_global_ordinals: false,
            analyzer: None,
            norms: false,
            fields: JsonText::default(),
            origin: false,
            format: None,
            dst_format: None,
            timezone: None,
            tree: None,
            precision: None,
            dynamic: None,
            other_params: JsonText::default(),
            array: false,
            dst_array: false,
            json_array: false,
            combine_fields: Vec::new(),
            combine_fields_value_separator: None,
        }
    }
}

/// A resolved column, shared read-only by every task of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_format: Option<String>,
    #[serde(default)]
    pub array: bool,
    #[serde(default)]
    pub target_array: bool,
    #[serde(default)]
    pub json_array: bool,
    #[serde(default)]
    pub origin: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub combined_fields: Vec<String>,
    pub combined_separator: String,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            timezone: None,
            source_format: None,
            target_format: None,
            array: false,
            target_array: false,
            json_array: false,
            origin: false,
            combined_fields: Vec::new(),
            combined_separator: DEFAULT_COMBINED_SEPARATOR.to_string(),
        }
    }

    /// Whether this column defines a composite identifier.
    pub fn is_composite_id(&self) -> bool {
        self.field_type == FieldType::Id && !self.combined_fields.is_empty()
    }
}

/// The ordered column descriptors of one job run, stamped with a generation.
///
/// Cloning is cheap; all clones share the same descriptors.
#[derive(Debug, Clone)]
pub struct ColumnSet {
    generation: i64,
    columns: Arc<[ColumnDescriptor]>,
    composite: Option<usize>,
}

impl ColumnSet {
    pub fn new(generation: i64, columns: Vec<ColumnDescriptor>) -> Self {
        let composite = columns.iter().position(ColumnDescriptor::is_composite_id);
        Self {
            generation,
            columns: columns.into(),
            composite,
        }
    }

    /// Wall-clock seconds at which the set was synthesized.
    pub fn generation(&self) -> i64 {
        self.generation
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.columns.get(index)
    }

    /// The column defining the composite identifier, if any.
    pub fn composite(&self) -> Option<&ColumnDescriptor> {
        self.composite.and_then(|idx| self.columns.get(idx))
    }

    /// Whether `name` is one of the composite identifier's members.
    pub fn is_composite_member(&self, name: &str) -> bool {
        self.composite()
            .is_some_and(|composite| composite.combined_fields.iter().any(|f| f == name))
    }

    /// Whether any column is declared with the `id` type.
    pub fn has_id(&self) -> bool {
        self.columns
            .iter()
            .any(|column| column.field_type == FieldType::Id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_column_config_defaults() {
        let column: ColumnConfig =
            serde_json::from_value(json!({"name": "title", "type": "text"})).unwrap();
        assert!(column.doc_values);
        assert!(column.index);
        assert!(!column.norms);
        assert!(column.fields.is_null());
        assert!(column.other_params.is_empty());
    }

    #[test]
    fn test_column_config_string_encoded_options() {
        let column: ColumnConfig = serde_json::from_value(json!({
            "name": "title",
            "type": "text",
            "dstFormat": "2006-01-02",
            "combineFieldsValueSeparator": "_",
            "other_params": "{\"ignore_above\": 256}",
            "fields": {"raw": {"type": "keyword"}}
        }))
        .unwrap();
        assert_eq!(column.dst_format.as_deref(), Some("2006-01-02"));
        assert_eq!(column.combine_fields_value_separator.as_deref(), Some("_"));
        assert_eq!(column.other_params.get("ignore_above"), Some(&json!(256)));
        assert_eq!(column.fields.0, json!({"raw": {"type": "keyword"}}));
    }

    #[test]
    fn test_column_set_composite_lookup() {
        let mut id = ColumnDescriptor::new("uid", FieldType::Id);
        id.combined_fields = vec!["a".to_string(), "b".to_string()];
        let set = ColumnSet::new(
            7,
            vec![
                id,
                ColumnDescriptor::new("a", FieldType::Keyword),
                ColumnDescriptor::new("b", FieldType::Long),
                ColumnDescriptor::new("c", FieldType::Text),
            ],
        );

        assert_eq!(set.generation(), 7);
        assert_eq!(set.composite().map(|c| c.name.as_str()), Some("uid"));
        assert!(set.is_composite_member("a"));
        assert!(set.is_composite_member("b"));
        assert!(!set.is_composite_member("c"));
        assert!(set.has_id());
    }
}
