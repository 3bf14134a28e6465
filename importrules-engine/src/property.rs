use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Value kinds accepted by the host's property-set capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Named enumeration member, written as `{ enum: "TC_Normalmap" }`.
    Enum {
        #[serde(rename = "enum")]
        variant: String,
    },
}

impl PropertyValue {
    pub fn enum_variant(variant: impl Into<String>) -> Self {
        PropertyValue::Enum {
            variant: variant.into(),
        }
    }

    /// Short name of the value kind, used in type-mismatch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Bool(_) => "bool",
            PropertyValue::Int(_) => "int",
            PropertyValue::Float(_) => "float",
            PropertyValue::Text(_) => "text",
            PropertyValue::Enum { .. } => "enum",
        }
    }

    /// Whether a value of this kind may be assigned to a slot currently holding `current`.
    pub fn assignable_to(&self, current: &PropertyValue) -> bool {
        matches!(
            (self, current),
            (PropertyValue::Bool(_), PropertyValue::Bool(_))
                | (PropertyValue::Int(_), PropertyValue::Int(_))
                | (PropertyValue::Int(_), PropertyValue::Float(_))
                | (PropertyValue::Float(_), PropertyValue::Float(_))
                | (PropertyValue::Text(_), PropertyValue::Text(_))
                | (PropertyValue::Enum { .. }, PropertyValue::Enum { .. })
        )
    }

    /// String form stored in metadata tags. Booleans render as `True`/`False`
    /// so they line up with the processed-marker value.
    pub fn to_tag_string(&self) -> String {
        match self {
            PropertyValue::Bool(true) => "True".to_string(),
            PropertyValue::Bool(false) => "False".to_string(),
            PropertyValue::Int(value) => value.to_string(),
            PropertyValue::Float(value) => value.to_string(),
            PropertyValue::Text(value) => value.clone(),
            PropertyValue::Enum { variant } => variant.clone(),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(value) => write!(f, "{:?}", value),
            other => f.write_str(&other.to_tag_string()),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

/// Name to value mapping that keeps declaration order, including through serde.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyMap {
    entries: Vec<(String, PropertyValue)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overrides an entry. An override keeps the original position.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        let name = name.into();
        let value = value.into();
        if let Some(existing) = self.entries.iter_mut().find(|(key, _)| key == &name) {
            existing.1 = value;
        } else {
            self.entries.push((name, value));
        }
    }

    /// Chaining form of [`PropertyMap::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for PropertyMap
where
    K: Into<String>,
    V: Into<PropertyValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (name, value) in iter {
            map.insert(name, value);
        }
        map
    }
}

impl fmt::Display for PropertyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (index, (name, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

impl Serialize for PropertyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

struct PropertyMapVisitor;

impl<'de> Visitor<'de> for PropertyMapVisitor {
    type Value = PropertyMap;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of property names to values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = PropertyMap::new();
        while let Some((name, value)) = access.next_entry::<String, PropertyValue>()? {
            map.insert(name, value);
        }
        Ok(map)
    }
}

impl<'de> Deserialize<'de> for PropertyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PropertyMapVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_declaration_order_from_yaml() {
        let raw = "srgb: false\nlod_bias: 5\ncompression_settings: { enum: TC_Normalmap }\n";
        let map: PropertyMap = serde_yaml::from_str(raw).expect("property map");

        assert_eq!(map.names(), vec!["srgb", "lod_bias", "compression_settings"]);
        assert_eq!(map.get("srgb"), Some(&PropertyValue::Bool(false)));
        assert_eq!(map.get("lod_bias"), Some(&PropertyValue::Int(5)));
        assert_eq!(
            map.get("compression_settings"),
            Some(&PropertyValue::enum_variant("TC_Normalmap"))
        );
    }

    #[test]
    fn override_keeps_position() {
        let map = PropertyMap::new()
            .with("a", 1)
            .with("b", true)
            .with("a", 2.5);
        assert_eq!(map.names(), vec!["a", "b"]);
        assert_eq!(map.get("a"), Some(&PropertyValue::Float(2.5)));
    }

    #[test]
    fn tag_strings_match_marker_convention() {
        assert_eq!(PropertyValue::Bool(true).to_tag_string(), "True");
        assert_eq!(PropertyValue::Int(5).to_tag_string(), "5");
        assert!(PropertyValue::Int(1).assignable_to(&PropertyValue::Float(0.0)));
        assert!(!PropertyValue::Text("x".into()).assignable_to(&PropertyValue::Bool(false)));
    }
}
