//! Turns batches of records into bulk operations.
//!
//! Every configured column is compiled once into a plan; records
//! are then converted by walking the plans in column order. A record that
//! cannot be converted is dirty: it is reported and left out of the batch.

use std::collections::HashMap;

use ferry_schema::{
    ActionType, ColumnDescriptor, ColumnSet, FieldType,
    datetime::{DateLayout, LEGACY_SOURCE_LAYOUT, TIMESTAMP_LAYOUT, Zone},
};
use ferry_store::{BulkAction, BulkMeta, BulkOperation, VersionType};
use serde_json::{Map, Value, json};
use snafu::{OptionExt, ResultExt, ensure};

use crate::{
    config::{PrimaryKeyInfo, WriterConfig},
    error::{
        AllDirtySnafu, CoerceSnafu, DuplicateFieldSnafu, InvalidConfigSnafu, InvalidDateSnafu,
        InvalidVersionSnafu, MissingFieldSnafu, MissingIdSnafu, RecordError, Result, SchemaSnafu,
        UnsupportedValueTypeSnafu,
    },
    prepare::PreparedIndex,
    record::{ColumnValue, Record},
};

/// How one column's value is extracted from a record.
#[derive(Debug, Clone)]
enum ColumnPlan {
    /// Member of the composite id, only read while deriving the id.
    Skip,
    Identifier(FieldType),
    Array(ArrayElement),
    Date(DatePlan),
    Text,
    Boolean,
    Integer,
    Float,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayElement {
    Text,
    Integer,
    Float,
}

#[derive(Debug, Clone)]
struct DatePlan {
    origin: bool,
    zone: Zone,
    source: Option<DateLayout>,
    target: Option<DateLayout>,
}

#[derive(Debug, Clone, Copy)]
enum Position {
    Unique(usize),
    Duplicate,
}

#[derive(Debug, Default)]
struct Identifiers {
    id: Option<String>,
    parent: Option<String>,
    routing: Option<String>,
    version: Option<String>,
}

impl Identifiers {
    /// Values of the same kind are concatenated in column order.
    fn append(&mut self, kind: FieldType, value: &ColumnValue) {
        let Some(text) = value.as_text().filter(|text| !text.is_empty()) else {
            return;
        };

        let slot = match kind {
            FieldType::Id => &mut self.id,
            FieldType::Parent => &mut self.parent,
            FieldType::Routing => &mut self.routing,
            _ => &mut self.version,
        };

        match slot {
            Some(existing) => existing.push_str(&text),
            None => *slot = Some(text),
        }
    }
}

/// A batch converted into bulk operations.
#[derive(Debug, Default)]
pub struct TransformedBatch {
    pub operations: Vec<BulkOperation>,
    /// Why each dirty record was dropped, with its position in the batch.
    pub dirty: Vec<(usize, RecordError)>,
}

/// Converts records into bulk operations for one task.
#[derive(Debug)]
pub struct BatchTransformer {
    index: String,
    type_name: Option<String>,
    v7_or_above: bool,
    action: BulkAction,
    columns: ColumnSet,
    plans: Vec<ColumnPlan>,
    positions: HashMap<String, Position>,
    primary_key: Option<PrimaryKeyInfo>,
    partition_columns: Vec<String>,
    delete_by: Vec<Map<String, Value>>,
    splitter: String,
    write_null: bool,
    legacy_layout: DateLayout,
    timestamp_layout: DateLayout,
}

impl BatchTransformer {
    pub fn new(config: &WriterConfig, prepared: &PreparedIndex) -> Result<Self> {
        let action = match prepared.action {
            ActionType::Index => BulkAction::Index,
            ActionType::Create => BulkAction::Create,
            ActionType::Update => BulkAction::Update,
            ActionType::Delete => BulkAction::Delete,
            ActionType::Unknown => {
                return InvalidConfigSnafu {
                    message: "unknown actionType",
                }
                .fail();
            }
        };

        let default_zone = Zone::parse(&config.timezone).context(SchemaSnafu)?;
        let columns = prepared.columns.clone();

        let plans = columns
            .columns()
            .iter()
            .map(|column| plan_column(&columns, column, default_zone))
            .collect::<Result<Vec<_>>>()?;

        let mut positions = HashMap::with_capacity(columns.len());
        for (position, column) in columns.columns().iter().enumerate() {
            positions
                .entry(column.name.clone())
                .and_modify(|existing| *existing = Position::Duplicate)
                .or_insert(Position::Unique(position));
        }

        Ok(Self {
            index: prepared.index.clone(),
            type_name: (!prepared.v7_or_above()).then(|| prepared.type_name.clone()),
            v7_or_above: prepared.v7_or_above(),
            action,
            columns,
            plans,
            positions,
            primary_key: config.primary_key(),
            partition_columns: config.partition_columns(),
            delete_by: config.delete_by.0.clone(),
            splitter: config.splitter.clone(),
            write_null: config.enable_write_null,
            legacy_layout: DateLayout::new(LEGACY_SOURCE_LAYOUT).context(SchemaSnafu)?,
            timestamp_layout: DateLayout::new(TIMESTAMP_LAYOUT).context(SchemaSnafu)?,
        })
    }

    /// Converts a batch. Fails only when the batch is non-empty and every
    /// record in it is dirty.
    pub fn transform(&self, records: &[Record]) -> Result<TransformedBatch> {
        let mut batch = TransformedBatch::default();

        for (position, record) in records.iter().enumerate() {
            match self.operation(record) {
                Ok(operation) => batch.operations.push(operation),
                Err(error) => batch.dirty.push((position, error)),
            }
        }

        ensure!(
            records.is_empty() || !batch.operations.is_empty(),
            AllDirtySnafu {
                total: records.len(),
                reason: batch
                    .dirty
                    .first()
                    .map(|(_, error)| error.to_string())
                    .unwrap_or_default(),
            }
        );

        Ok(batch)
    }

    /// Converts a single record.
    pub fn operation(&self, record: &Record) -> Result<BulkOperation, RecordError> {
        let mut document = Map::new();
        let mut ids = Identifiers::default();

        for (position, (column, plan)) in self.columns.columns().iter().zip(&self.plans).enumerate()
        {
            if matches!(plan, ColumnPlan::Skip) {
                continue;
            }
            let value = record.get(position).context(MissingFieldSnafu {
                field: column.name.clone(),
            })?;

            let field = match plan {
                ColumnPlan::Skip => continue,
                ColumnPlan::Identifier(kind) => {
                    ids.append(*kind, value);
                    continue;
                }
                ColumnPlan::Array(element) => self.array_value(column, *element, value)?,
                ColumnPlan::Date(date) => self.date_value(column, date, value)?,
                ColumnPlan::Text => value.as_text().map(Value::String).unwrap_or(Value::Null),
                ColumnPlan::Boolean => bool_value(column, value)?,
                ColumnPlan::Integer => integer_value(column, value)?,
                ColumnPlan::Float => float_value(column, value)?,
                ColumnPlan::Json => json_value(value),
            };

            if field.is_null() && !self.write_null {
                continue;
            }
            document.insert(column.name.clone(), field);
        }

        if let Some(composite) = self.columns.composite() {
            let parts = composite
                .combined_fields
                .iter()
                .map(|field| self.required_text(record, field))
                .collect::<Result<Vec<_>, _>>()?;
            ids.id = Some(parts.join(&composite.combined_separator));
        } else if let Some(key) = &self.primary_key {
            let parts = key
                .column
                .iter()
                .map(|field| self.required_text(record, field))
                .collect::<Result<Vec<_>, _>>()?;
            ids.id = Some(parts.join(key.field_delimiter.as_deref().unwrap_or_default()));
        }

        if ids.routing.is_none() && !self.partition_columns.is_empty() {
            let routing = self
                .partition_columns
                .iter()
                .filter_map(|field| self.value_by_name(record, field).ok())
                .filter_map(ColumnValue::as_text)
                .collect::<String>();
            ids.routing = Some(routing).filter(|routing| !routing.is_empty());
        }

        // Stores from v7 on have no parent field; the parent only routes.
        if self.v7_or_above {
            if let Some(parent) = ids.parent.take() {
                ids.routing.get_or_insert(parent);
            }
        }

        let action = if self.is_delete(record) {
            BulkAction::Delete
        } else {
            self.action
        };

        let mut meta = BulkMeta {
            index: self.index.clone(),
            type_name: self.type_name.clone(),
            id: ids.id.filter(|id| !id.is_empty()),
            routing: ids.routing,
            parent: ids.parent,
            ..Default::default()
        };

        match action {
            BulkAction::Delete => {
                ensure!(meta.id.is_some(), MissingIdSnafu { action: "delete" });
                Ok(BulkOperation::delete(meta))
            }
            BulkAction::Update => {
                ensure!(meta.id.is_some(), MissingIdSnafu { action: "update" });
                let body = json!({"doc": document, "doc_as_upsert": true});
                Ok(BulkOperation::new(BulkAction::Update, meta, Some(body)))
            }
            BulkAction::Index | BulkAction::Create => {
                if let Some(version) = ids.version {
                    let parsed = version
                        .trim()
                        .parse::<i64>()
                        .ok()
                        .context(InvalidVersionSnafu { value: version })?;
                    meta.version = Some(parsed);
                    meta.version_type = Some(VersionType::External);
                }
                Ok(BulkOperation::new(
                    action,
                    meta,
                    Some(Value::Object(document)),
                ))
            }
        }
    }

    /// Whether the record fails to satisfy some configured condition group.
    ///
    /// A condition matches when the column's text equals the configured
    /// value, or is one of the configured values when given a list.
    pub fn is_delete(&self, record: &Record) -> bool {
        self.delete_by.iter().any(|group| {
            !group
                .iter()
                .all(|(field, expected)| self.condition_matches(record, field, expected))
        })
    }

    fn condition_matches(&self, record: &Record, field: &str, expected: &Value) -> bool {
        let Some(actual) = self
            .value_by_name(record, field)
            .ok()
            .and_then(ColumnValue::as_text)
        else {
            return false;
        };

        match expected {
            Value::Array(options) => options.iter().any(|option| value_text(option) == actual),
            other => value_text(other) == actual,
        }
    }

    fn value_by_name<'a>(
        &self,
        record: &'a Record,
        field: &str,
    ) -> Result<&'a ColumnValue, RecordError> {
        match self.positions.get(field) {
            Some(Position::Unique(position)) => record.get(*position).context(MissingFieldSnafu {
                field: field.to_string(),
            }),
            Some(Position::Duplicate) => DuplicateFieldSnafu {
                field: field.to_string(),
            }
            .fail(),
            None => MissingFieldSnafu {
                field: field.to_string(),
            }
            .fail(),
        }
    }

    fn required_text(&self, record: &Record, field: &str) -> Result<String, RecordError> {
        self.value_by_name(record, field)?
            .as_text()
            .context(MissingFieldSnafu {
                field: field.to_string(),
            })
    }

    fn array_value(
        &self,
        column: &ColumnDescriptor,
        element: ArrayElement,
        value: &ColumnValue,
    ) -> Result<Value, RecordError> {
        let Some(text) = value.as_text() else {
            return Ok(Value::Null);
        };
        let parts = text.split(self.splitter.as_str());

        match element {
            ArrayElement::Text => Ok(Value::Array(
                parts.map(|part| Value::String(part.to_string())).collect(),
            )),
            _ if text.trim().is_empty() => Ok(Value::Null),
            ArrayElement::Integer => parts
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<i64>().map(Value::from).ok().context(CoerceSnafu {
                        column: column.name.clone(),
                        expected: "integer",
                        value: part.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            ArrayElement::Float => parts
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<f64>().map(Value::from).ok().context(CoerceSnafu {
                        column: column.name.clone(),
                        expected: "float",
                        value: part.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }

    fn date_value(
        &self,
        column: &ColumnDescriptor,
        plan: &DatePlan,
        value: &ColumnValue,
    ) -> Result<Value, RecordError> {
        if plan.origin {
            return Ok(value.as_text().map(Value::String).unwrap_or(Value::Null));
        }

        let (instant, layout) = match value {
            ColumnValue::Null => return Ok(Value::String(String::new())),
            ColumnValue::Time(instant) => (*instant, &self.timestamp_layout),
            other => {
                let text = other.text_or_empty();
                if text.trim().is_empty() {
                    return Ok(Value::String(String::new()));
                }
                let Some(source) = &plan.source else {
                    return Ok(Value::String(text));
                };

                let instant = source
                    .parse(&text)
                    .or_else(|_| self.legacy_layout.parse(&text))
                    .ok()
                    .context(InvalidDateSnafu {
                        column: column.name.clone(),
                        value: text.clone(),
                    })?;
                (instant, plan.target.as_ref().unwrap_or(source))
            }
        };

        layout
            .format(&instant, plan.zone)
            .map(Value::String)
            .ok()
            .context(InvalidDateSnafu {
                column: column.name.clone(),
                value: instant.to_rfc3339(),
            })
    }
}

fn plan_column(columns: &ColumnSet, column: &ColumnDescriptor, default_zone: Zone) -> Result<ColumnPlan> {
    if columns.is_composite_member(&column.name) {
        return Ok(ColumnPlan::Skip);
    }

    if column.array {
        let element = if !column.target_array {
            ArrayElement::Text
        } else {
            match column.field_type {
                FieldType::Short | FieldType::Integer => ArrayElement::Integer,
                FieldType::Float => ArrayElement::Float,
                _ => ArrayElement::Text,
            }
        };
        return Ok(ColumnPlan::Array(element));
    }

    if column.json_array {
        return Ok(ColumnPlan::Json);
    }

    let plan = match column.field_type {
        kind if kind.is_identifier() => ColumnPlan::Identifier(kind),
        FieldType::Date => {
            let zone = match column.timezone.as_deref() {
                Some(name) => Zone::parse(name).context(SchemaSnafu)?,
                None => default_zone,
            };
            let layout = |format: &Option<String>| {
                format
                    .as_deref()
                    .map(DateLayout::new)
                    .transpose()
                    .context(SchemaSnafu)
            };
            ColumnPlan::Date(DatePlan {
                origin: column.origin,
                zone,
                source: layout(&column.source_format)?,
                target: layout(&column.target_format)?,
            })
        }
        FieldType::Keyword
        | FieldType::String
        | FieldType::Text
        | FieldType::Ip
        | FieldType::GeoPoint
        | FieldType::IpRange
        | FieldType::Byte
        | FieldType::Binary => ColumnPlan::Text,
        FieldType::Boolean => ColumnPlan::Boolean,
        FieldType::Long | FieldType::Integer | FieldType::Short => ColumnPlan::Integer,
        FieldType::Float | FieldType::Double => ColumnPlan::Float,
        FieldType::GeoShape
        | FieldType::IntegerRange
        | FieldType::FloatRange
        | FieldType::LongRange
        | FieldType::DoubleRange
        | FieldType::DateRange
        | FieldType::Nested
        | FieldType::Object => ColumnPlan::Json,
        other => {
            return UnsupportedValueTypeSnafu {
                column: column.name.clone(),
                field_type: other,
            }
            .fail();
        }
    };

    Ok(plan)
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn coerce_error(column: &ColumnDescriptor, expected: &'static str, value: &ColumnValue) -> RecordError {
    RecordError::Coerce {
        column: column.name.clone(),
        expected,
        value: value.text_or_empty(),
    }
}

fn bool_value(column: &ColumnDescriptor, value: &ColumnValue) -> Result<Value, RecordError> {
    let parsed = match value {
        ColumnValue::Null => return Ok(Value::Null),
        ColumnValue::Bool(value) => Some(*value),
        ColumnValue::Int(value) => Some(*value != 0),
        ColumnValue::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "" => return Ok(Value::Null),
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    };

    parsed
        .map(Value::Bool)
        .ok_or_else(|| coerce_error(column, "boolean", value))
}

fn integer_value(column: &ColumnDescriptor, value: &ColumnValue) -> Result<Value, RecordError> {
    let parsed = match value {
        ColumnValue::Null => return Ok(Value::Null),
        ColumnValue::Int(value) => Some(*value),
        ColumnValue::Bool(value) => Some(i64::from(*value)),
        ColumnValue::Float(value) if value.is_finite() => Some(value.trunc() as i64),
        ColumnValue::Text(text) if text.trim().is_empty() => return Ok(Value::Null),
        ColumnValue::Text(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    };

    parsed
        .map(Value::from)
        .ok_or_else(|| coerce_error(column, "integer", value))
}

fn float_value(column: &ColumnDescriptor, value: &ColumnValue) -> Result<Value, RecordError> {
    let parsed = match value {
        ColumnValue::Null => return Ok(Value::Null),
        ColumnValue::Float(value) => Some(*value),
        ColumnValue::Int(value) => Some(*value as f64),
        ColumnValue::Bool(value) => Some(f64::from(u8::from(*value))),
        ColumnValue::Text(text) if text.trim().is_empty() => return Ok(Value::Null),
        ColumnValue::Text(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    // Non-finite floats have no JSON form.
    parsed
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| coerce_error(column, "float", value))
}

/// Structured text is sent as JSON when it parses, else as the text itself
/// (geo shapes may be WKT).
fn json_value(value: &ColumnValue) -> Value {
    match value {
        ColumnValue::Null => Value::String(String::new()),
        ColumnValue::Json(value) => value.clone(),
        ColumnValue::Text(text) if text.trim().is_empty() => Value::String(String::new()),
        ColumnValue::Text(text) => {
            serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        other => other.as_text().map(Value::String).unwrap_or(Value::Null),
    }
}
