//! Builds an index mapping from the configured columns.
//!
//! Stores older than major version 7 nest properties under a type name:
//!
//! ```json
//! { "doc": { "properties": { "title": { "type": "text" } } } }
//! ```
//!
//! Newer stores dropped mapping types, so the properties sit at the top:
//!
//! ```json
//! { "properties": { "title": { "type": "text" } } }
//! ```

use std::collections::HashSet;

use serde_json::{Map, Value, json};
use snafu::ensure;
use tracing::info;

use crate::{
    ColumnConfig, ColumnDescriptor, ColumnSet, FieldType,
    column::DEFAULT_COMBINED_SEPARATOR,
    datetime::{DateLayout, Zone},
    error::{
        EmptyMappingSnafu, InvalidOptionSnafu, MissingNameSnafu, MissingTypeSnafu, Result,
        UnsupportedTypeSnafu,
    },
};

/// Options that shape the synthesized mapping.
#[derive(Debug, Clone, Default)]
pub struct MappingOptions {
    /// Type name properties are nested under for stores older than v7.
    pub type_name: String,
    /// Whether the store's major version is 7 or above.
    pub v7_or_above: bool,
    /// Value of the mapping level `dynamic` flag, if any.
    pub dst_dynamic: Option<String>,
}

/// The output of [`synthesize`].
#[derive(Debug, Clone)]
pub struct SynthesizedMapping {
    /// The mapping document sent on index creation.
    pub mappings: Value,
    /// Every configured column, in order, including identifier columns.
    pub columns: ColumnSet,
}

/// Synthesizes the index mapping and the ordered column descriptors.
///
/// Identifier columns (`id`, `version`, `routing`) and members of a composite
/// identifier are kept in the column set but contribute no property.
pub fn synthesize(columns: &[ColumnConfig], options: &MappingOptions) -> Result<SynthesizedMapping> {
    ensure!(!columns.is_empty(), EmptyMappingSnafu);

    let resolved = columns
        .iter()
        .enumerate()
        .map(|(position, column)| resolve_type(position, column))
        .collect::<Result<Vec<_>>>()?;

    let composite_members = composite_members(columns, &resolved)?;

    let mut properties = Map::new();
    let mut descriptors = Vec::with_capacity(columns.len());

    for (column, field_type) in columns.iter().zip(resolved) {
        let mut descriptor = ColumnDescriptor::new(column.name.clone(), field_type);
        descriptor.combined_separator = column
            .combine_fields_value_separator
            .clone()
            .filter(|sep| !sep.is_empty())
            .unwrap_or_else(|| DEFAULT_COMBINED_SEPARATOR.to_string());
        if field_type == FieldType::Id {
            descriptor.combined_fields = column.combine_fields.clone();
        }

        if !field_type.has_mapping_property() || composite_members.contains(column.name.as_str())
        {
            descriptors.push(descriptor);
            continue;
        }

        descriptor.array = column.array;
        descriptor.target_array = column.dst_array;
        descriptor.json_array = column.json_array;

        let mut field = Map::new();
        field.insert("type".to_string(), json!(field_type.as_str()));
        field.insert("doc_values".to_string(), json!(column.doc_values));
        field.insert("index".to_string(), json!(column.index));

        match field_type {
            FieldType::Keyword => {
                field.insert(
                    "eager_global_ordinals".to_string(),
                    json!(column.eager_global_ordinals),
                );
            }
            FieldType::Text => {
                if let Some(analyzer) = non_empty(&column.analyzer) {
                    field.insert("analyzer".to_string(), json!(analyzer));
                }
                field.insert("norms".to_string(), json!(column.norms));
                if !column.fields.is_null() {
                    field.insert("fields".to_string(), column.fields.0.clone());
                }
            }
            FieldType::Date if column.origin => {
                // The destination format wins over the source format.
                if let Some(format) = non_empty(&column.dst_format).or(non_empty(&column.format)) {
                    field.insert("format".to_string(), json!(format));
                }
                descriptor.origin = true;
            }
            FieldType::Date => {
                validate_date_column(column)?;
                descriptor.timezone = non_empty(&column.timezone).map(str::to_string);
                descriptor.source_format = non_empty(&column.format).map(str::to_string);
                descriptor.target_format = non_empty(&column.dst_format).map(str::to_string);
            }
            FieldType::GeoShape => {
                if let Some(tree) = non_empty(&column.tree) {
                    field.insert("tree".to_string(), json!(tree));
                }
                if let Some(precision) = non_empty(&column.precision) {
                    field.insert("precision".to_string(), json!(precision));
                }
            }
            FieldType::Nested => {
                if let Some(dynamic) = &column.dynamic {
                    field.insert("dynamic".to_string(), dynamic.clone());
                }
            }
            _ => {}
        }

        // User supplied parameters are applied last and may override anything above.
        for (key, value) in column.other_params.iter() {
            field.insert(key.clone(), value.clone());
        }

        properties.insert(column.name.clone(), Value::Object(field));
        descriptors.push(descriptor);
    }

    let generation = chrono::Utc::now().timestamp();
    info!(generation, columns = descriptors.len(), "synthesized column set");

    let mut type_mappings = Map::new();
    type_mappings.insert("properties".to_string(), Value::Object(properties));
    if let Some(dynamic) = options.dst_dynamic.as_deref().filter(|d| !d.is_empty()) {
        type_mappings.insert("dynamic".to_string(), json!(dynamic));
    }

    let mappings = if options.v7_or_above {
        Value::Object(type_mappings)
    } else {
        let mut root = Map::new();
        root.insert(options.type_name.clone(), Value::Object(type_mappings));
        Value::Object(root)
    };

    Ok(SynthesizedMapping {
        mappings,
        columns: ColumnSet::new(generation, descriptors),
    })
}

fn resolve_type(position: usize, column: &ColumnConfig) -> Result<FieldType> {
    ensure!(!column.name.trim().is_empty(), MissingNameSnafu { position });
    ensure!(
        !column.type_name.trim().is_empty(),
        MissingTypeSnafu {
            column: column.name.clone()
        }
    );

    let field_type = FieldType::parse(&column.type_name).ok_or_else(|| {
        UnsupportedTypeSnafu {
            column: column.name.clone(),
            type_name: column.type_name.clone(),
        }
        .build()
    })?;

    // `pk` is an older spelling of an id column.
    if column.name == "pk" {
        return Ok(FieldType::Id);
    }

    Ok(field_type)
}

fn composite_members<'a>(
    columns: &'a [ColumnConfig],
    resolved: &[FieldType],
) -> Result<HashSet<&'a str>> {
    let mut composites = columns
        .iter()
        .zip(resolved)
        .filter(|(column, ty)| **ty == FieldType::Id && !column.combine_fields.is_empty());

    let Some((composite, _)) = composites.next() else {
        return Ok(HashSet::new());
    };

    if let Some((other, _)) = composites.next() {
        return InvalidOptionSnafu {
            column: other.name.clone(),
            option: "combineFields",
            message: format!("composite id is already defined by {}", composite.name),
        }
        .fail();
    }

    let members = composite
        .combine_fields
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>();

    ensure!(
        !members.contains(composite.name.as_str()),
        InvalidOptionSnafu {
            column: composite.name.clone(),
            option: "combineFields",
            message: "a composite id cannot contain itself".to_string(),
        }
    );

    Ok(members)
}

fn validate_date_column(column: &ColumnConfig) -> Result<()> {
    if let Some(format) = non_empty(&column.format) {
        DateLayout::new(format)?;
    }
    if let Some(format) = non_empty(&column.dst_format) {
        DateLayout::new(format)?;
    }
    if let Some(timezone) = non_empty(&column.timezone) {
        Zone::parse(timezone)?;
    }
    Ok(())
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}
