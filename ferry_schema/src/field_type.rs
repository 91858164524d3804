use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{SchemaError, UnsupportedTypeSnafu};

/// The type of a document field, as understood by the search store.
///
/// The first four variants are identifier kinds: their values address the
/// document instead of being stored in its body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Id,
    Parent,
    Routing,
    Version,
    String,
    Text,
    Keyword,
    Long,
    Integer,
    Short,
    Byte,
    Double,
    Float,
    Date,
    Boolean,
    Binary,
    IntegerRange,
    FloatRange,
    LongRange,
    DoubleRange,
    DateRange,
    GeoPoint,
    GeoShape,
    Ip,
    IpRange,
    Completion,
    TokenCount,
    Object,
    Nested,
}

/// The bulk action used for every record of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ActionType {
    Unknown,
    #[default]
    Index,
    Create,
    Delete,
    Update,
}

const ALL_FIELD_TYPES: [FieldType; 29] = [
    FieldType::Id,
    FieldType::Parent,
    FieldType::Routing,
    FieldType::Version,
    FieldType::String,
    FieldType::Text,
    FieldType::Keyword,
    FieldType::Long,
    FieldType::Integer,
    FieldType::Short,
    FieldType::Byte,
    FieldType::Double,
    FieldType::Float,
    FieldType::Date,
    FieldType::Boolean,
    FieldType::Binary,
    FieldType::IntegerRange,
    FieldType::FloatRange,
    FieldType::LongRange,
    FieldType::DoubleRange,
    FieldType::DateRange,
    FieldType::GeoPoint,
    FieldType::GeoShape,
    FieldType::Ip,
    FieldType::IpRange,
    FieldType::Completion,
    FieldType::TokenCount,
    FieldType::Object,
    FieldType::Nested,
];

impl FieldType {
    /// Returns every supported field type.
    pub fn all() -> &'static [FieldType] {
        &ALL_FIELD_TYPES
    }

    /// Parses a field type name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        ALL_FIELD_TYPES
            .iter()
            .copied()
            .find(|ty| ty.as_str().eq_ignore_ascii_case(name))
    }

    /// The store-native name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Parent => "parent",
            Self::Routing => "routing",
            Self::Version => "version",
            Self::String => "string",
            Self::Text => "text",
            Self::Keyword => "keyword",
            Self::Long => "long",
            Self::Integer => "integer",
            Self::Short => "short",
            Self::Byte => "byte",
            Self::Double => "double",
            Self::Float => "float",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Binary => "binary",
            Self::IntegerRange => "integer_range",
            Self::FloatRange => "float_range",
            Self::LongRange => "long_range",
            Self::DoubleRange => "double_range",
            Self::DateRange => "date_range",
            Self::GeoPoint => "geo_point",
            Self::GeoShape => "geo_shape",
            Self::Ip => "ip",
            Self::IpRange => "ip_range",
            Self::Completion => "completion",
            Self::TokenCount => "token_count",
            Self::Object => "object",
            Self::Nested => "nested",
        }
    }

    /// Whether values of this type address the document rather than fill it.
    pub fn is_identifier(&self) -> bool {
        matches!(self, Self::Id | Self::Parent | Self::Routing | Self::Version)
    }

    /// Whether the type contributes a property to the index mapping.
    ///
    /// `parent` is the exception among identifier kinds: legacy stores
    /// declare it in the mapping.
    pub fn has_mapping_property(&self) -> bool {
        !matches!(self, Self::Id | Self::Version | Self::Routing)
    }

    /// Range kinds accept a JSON object with `gte`/`lte` style bounds.
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Self::IntegerRange
                | Self::FloatRange
                | Self::LongRange
                | Self::DoubleRange
                | Self::DateRange
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldType::parse(s).ok_or_else(|| {
            UnsupportedTypeSnafu {
                column: String::new(),
                type_name: s.to_string(),
            }
            .build()
        })
    }
}

impl Serialize for FieldType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        FieldType::parse(&name)
            .ok_or_else(|| serde::de::Error::custom(format!("unsupported field type {name}")))
    }
}

impl ActionType {
    /// Parses the configured action, defaulting to `index` when empty.
    ///
    /// Unrecognized text maps to [`ActionType::Unknown`], which callers must
    /// reject before writing.
    pub fn parse(name: Option<&str>) -> Self {
        let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) else {
            return ActionType::Index;
        };

        match name.to_ascii_lowercase().as_str() {
            "index" => ActionType::Index,
            "create" => ActionType::Create,
            "delete" => ActionType::Delete,
            "update" => ActionType::Update,
            _ => ActionType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Index => "index",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(FieldType::parse("KEYWORD"), Some(FieldType::Keyword));
        assert_eq!(FieldType::parse("Geo_Shape"), Some(FieldType::GeoShape));
        assert_eq!(FieldType::parse(" id "), Some(FieldType::Id));
        assert_eq!(FieldType::parse("varchar"), None);
        assert_eq!(FieldType::parse(""), None);
    }

    #[test]
    fn test_names_round_trip() {
        for ty in FieldType::all() {
            assert_eq!(FieldType::parse(ty.as_str()), Some(*ty));
        }
    }

    #[test]
    fn test_identifier_kinds() {
        let identifiers = FieldType::all()
            .iter()
            .filter(|ty| ty.is_identifier())
            .collect::<Vec<_>>();
        assert_eq!(
            identifiers,
            vec![
                &FieldType::Id,
                &FieldType::Parent,
                &FieldType::Routing,
                &FieldType::Version
            ]
        );
        assert!(FieldType::Parent.has_mapping_property());
        assert!(!FieldType::Routing.has_mapping_property());
    }

    #[test]
    fn test_action_type_parse() {
        assert_eq!(ActionType::parse(None), ActionType::Index);
        assert_eq!(ActionType::parse(Some("")), ActionType::Index);
        assert_eq!(ActionType::parse(Some("UPDATE")), ActionType::Update);
        assert_eq!(ActionType::parse(Some("create")), ActionType::Create);
        assert_eq!(ActionType::parse(Some("upsert")), ActionType::Unknown);
    }
}
