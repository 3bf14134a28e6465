//! In-memory host used by the command line tool and the test suites.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HostError;
use crate::host::{ImportContext, ImportEvents, ImportListener, ImportedAsset, SubscriptionId};
use crate::property::{PropertyMap, PropertyValue};

/// Asset description held entirely in memory.
///
/// `properties` doubles as the property schema: writing a name that is not
/// present fails with [`HostError::UnknownProperty`], writing a value of a
/// different kind fails with [`HostError::TypeMismatch`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryAsset {
    pub name: String,
    pub class_chain: Vec<String>,
    #[serde(default)]
    pub source_file: Option<String>,
    pub destination_path: String,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// Tag keys the host refuses to write.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub read_only_tags: BTreeSet<String>,
}

impl MemoryAsset {
    pub fn new(name: impl Into<String>, class_chain: &[&str], destination_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_chain: class_chain.iter().map(|class| class.to_string()).collect(),
            source_file: None,
            destination_path: destination_path.into(),
            properties: BTreeMap::new(),
            tags: BTreeMap::new(),
            read_only_tags: BTreeSet::new(),
        }
    }

    pub fn with_source_file(mut self, path: impl Into<String>) -> Self {
        self.source_file = Some(path.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_read_only_tag(mut self, key: impl Into<String>) -> Self {
        self.read_only_tags.insert(key.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

impl ImportedAsset for MemoryAsset {
    fn full_name(&self) -> String {
        match self.class_chain.first() {
            Some(class) => format!("{} {}", class, self.destination_path),
            None => self.destination_path.clone(),
        }
    }

    fn class_chain(&self) -> &[String] {
        &self.class_chain
    }

    fn source_file(&self) -> Option<String> {
        self.source_file.clone()
    }

    fn destination_path(&self) -> String {
        self.destination_path.clone()
    }

    fn set_properties(&mut self, properties: &PropertyMap) -> Result<(), HostError> {
        for (name, value) in properties.iter() {
            let current = self
                .properties
                .get(name)
                .ok_or_else(|| HostError::UnknownProperty(name.to_string()))?;
            if !value.assignable_to(current) {
                return Err(HostError::TypeMismatch {
                    name: name.to_string(),
                    expected: current.kind().to_string(),
                    actual: value.kind().to_string(),
                });
            }
        }

        for (name, value) in properties.iter() {
            let value = match (value, self.properties.get(name)) {
                (PropertyValue::Int(raw), Some(PropertyValue::Float(_))) => {
                    PropertyValue::Float(*raw as f64)
                }
                _ => value.clone(),
            };
            self.properties.insert(name.to_string(), value);
        }
        Ok(())
    }

    fn metadata_tag(&self, key: &str) -> Option<String> {
        self.tags.get(key).cloned()
    }

    fn set_metadata_tag(&mut self, key: &str, value: &str) -> Result<(), HostError> {
        if self.read_only_tags.contains(key) {
            return Err(HostError::TagRejected {
                key: key.to_string(),
                reason: "tag is read-only".to_string(),
            });
        }
        self.tags.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Event source that fans each import out to its subscribers in subscription order.
#[derive(Default)]
pub struct MemoryEventBus {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn ImportListener>)>>,
    next_id: AtomicU64,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Delivers one "object created" event to every subscriber.
    pub fn emit(&self, ctx: &ImportContext, mut asset: Option<&mut dyn ImportedAsset>) {
        let listeners: Vec<Arc<dyn ImportListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        debug!(listeners = listeners.len(), factory = %ctx.factory, "emitting import event");
        for listener in listeners {
            match asset {
                Some(ref mut asset) => {
                    let asset: &mut dyn ImportedAsset = &mut **asset;
                    listener.on_object_created(ctx, Some(asset));
                }
                None => listener.on_object_created(ctx, None),
            }
        }
    }
}

impl ImportEvents for MemoryEventBus {
    fn subscribe(&self, listener: Arc<dyn ImportListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_property_is_rejected_without_partial_write() {
        let mut asset = MemoryAsset::new("T", &["Texture2D"], "/Game/T.T")
            .with_property("srgb", true)
            .with_property("lod_bias", 0);
        let batch = PropertyMap::new().with("lod_bias", 3).with("srgb", "no");

        let err = asset.set_properties(&batch).unwrap_err();

        assert_eq!(
            err,
            HostError::TypeMismatch {
                name: "srgb".into(),
                expected: "bool".into(),
                actual: "text".into(),
            }
        );
        assert_eq!(asset.property("lod_bias"), Some(&PropertyValue::Int(0)));
    }

    #[test]
    fn integer_widens_into_float_property() {
        let mut asset = MemoryAsset::new("T", &["Texture2D"], "/Game/T.T").with_property("adjust_brightness", 1.0);
        asset
            .set_properties(&PropertyMap::new().with("adjust_brightness", 2))
            .expect("widening write");
        assert_eq!(asset.property("adjust_brightness"), Some(&PropertyValue::Float(2.0)));
    }

    #[test]
    fn loads_from_json_description() {
        let raw = r#"{
            "name": "T_Rock_n",
            "class_chain": ["Texture2D", "Texture", "Object"],
            "source_file": "D:/art/Rock_n.png",
            "destination_path": "/Game/Props/T_Rock_n.T_Rock_n",
            "properties": { "flip_green_channel": true, "srgb": true }
        }"#;
        let asset: MemoryAsset = serde_json::from_str(raw).expect("asset");
        assert_eq!(asset.full_name(), "Texture2D /Game/Props/T_Rock_n.T_Rock_n");
        assert_eq!(asset.metadata_tag("importer_rules_applied"), None);
    }
}
