//! Field types, column descriptors and index mapping synthesis.

mod body;
mod column;
pub mod datetime;
mod error;
mod field_type;
mod json_text;
mod mapping;

pub use self::body::{
    IndexBody, RETAINED_SETTING_KEYS, Settings, default_settings, merge_settings,
    retained_settings,
};
pub use self::column::{ColumnConfig, ColumnDescriptor, ColumnSet, DEFAULT_COMBINED_SEPARATOR};
pub use self::error::{Result, SchemaError};
pub use self::field_type::{ActionType, FieldType};
pub use self::json_text::JsonText;
pub use self::mapping::{MappingOptions, SynthesizedMapping, synthesize};
