use serde::{Deserialize, Deserializer, Serialize, Serializer, de::DeserializeOwned};

/// A configuration value given either inline or as a string holding JSON.
///
/// Job configurations written for older releases store structured options
/// such as `primaryKeyInfo` as escaped JSON strings. Both spellings
/// deserialize to the same value. An empty string deserializes to `T::default()`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JsonText<T>(pub T);

impl<T> JsonText<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::ops::Deref for JsonText<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de, T> Deserialize<'de> for JsonText<T>
where
    T: DeserializeOwned + Default,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        let value = match raw {
            serde_json::Value::String(text) if text.trim().is_empty() => T::default(),
            serde_json::Value::String(text) => {
                serde_json::from_str(&text).map_err(serde::de::Error::custom)?
            }
            other => serde_json::from_value(other).map_err(serde::de::Error::custom)?,
        };
        Ok(JsonText(value))
    }
}

impl<T: Serialize> Serialize for JsonText<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Key {
        column: Vec<String>,
    }

    #[test]
    fn test_inline_and_string_forms_agree() {
        let inline: JsonText<Key> = serde_json::from_value(json!({"column": ["a", "b"]})).unwrap();
        let text: JsonText<Key> =
            serde_json::from_value(json!(r#"{"column": ["a", "b"]}"#)).unwrap();
        assert_eq!(inline, text);
        assert_eq!(inline.column, vec!["a", "b"]);
    }

    #[test]
    fn test_empty_string_is_default() {
        let value: JsonText<Vec<String>> = serde_json::from_value(json!("")).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_malformed_string_is_rejected() {
        let value = serde_json::from_value::<JsonText<Key>>(json!("{column"));
        assert!(value.is_err());
    }
}
