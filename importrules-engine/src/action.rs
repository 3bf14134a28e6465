use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ActionError, HostError, RuleError};
use crate::host::{ImportContext, ImportedAsset};
use crate::property::PropertyMap;

/// Observable change made by a successful action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionEffect {
    PropertiesSet { names: Vec<String> },
    TagsSet { keys: Vec<String> },
}

/// Side-effecting step run against an object once its rule matched.
pub trait Action: fmt::Debug + Send + Sync {
    fn apply(
        &self,
        ctx: &ImportContext,
        asset: &mut dyn ImportedAsset,
    ) -> Result<ActionEffect, ActionError>;

    fn describe(&self) -> String;
}

/// Assigns a batch of properties through a single host call.
#[derive(Debug, Clone, PartialEq)]
pub struct SetPropertiesAction {
    properties: PropertyMap,
}

impl SetPropertiesAction {
    pub fn new(properties: PropertyMap) -> Self {
        Self { properties }
    }

    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }
}

impl Action for SetPropertiesAction {
    fn apply(
        &self,
        _ctx: &ImportContext,
        asset: &mut dyn ImportedAsset,
    ) -> Result<ActionEffect, ActionError> {
        asset
            .set_properties(&self.properties)
            .map_err(ActionError::Properties)?;

        info!(
            object = %asset.full_name(),
            properties = %self.properties,
            "applied editor properties"
        );
        Ok(ActionEffect::PropertiesSet {
            names: self.properties.names(),
        })
    }

    fn describe(&self) -> String {
        format!("set_properties{}", self.properties)
    }
}

/// Writes metadata tags one key at a time.
///
/// Every key is attempted. Tags written before a failing key stay written.
#[derive(Debug, Clone, PartialEq)]
pub struct SetTagsAction {
    tags: PropertyMap,
}

impl SetTagsAction {
    pub fn new(tags: PropertyMap) -> Self {
        Self { tags }
    }

    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(PropertyMap::new().with(key.into(), value.into()))
    }
}

impl Action for SetTagsAction {
    fn apply(
        &self,
        _ctx: &ImportContext,
        asset: &mut dyn ImportedAsset,
    ) -> Result<ActionEffect, ActionError> {
        let mut written = Vec::new();
        let mut failed: Vec<(String, HostError)> = Vec::new();

        for (key, value) in self.tags.iter() {
            match asset.set_metadata_tag(key, &value.to_tag_string()) {
                Ok(()) => written.push(key.to_string()),
                Err(err) => failed.push((key.to_string(), err)),
            }
        }

        if failed.is_empty() {
            return Ok(ActionEffect::TagsSet { keys: written });
        }

        let object = asset.full_name();
        for (key, err) in failed.iter().skip(1) {
            warn!(object = %object, key = %key, error = %err, "additional tag write failed");
        }
        let keys = failed.iter().map(|(key, _)| key.clone()).collect();
        let (_, source) = failed.swap_remove(0);
        Err(ActionError::Tags {
            keys,
            written,
            source,
        })
    }

    fn describe(&self) -> String {
        format!("set_tags{}", self.tags)
    }
}

/// Serialized action as written in rule modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionConfig {
    SetProperties { properties: PropertyMap },
    #[serde(alias = "set_asset_tags")]
    SetTags { tags: PropertyMap },
}

impl ActionConfig {
    pub fn build(self, rule_label: &str) -> Result<Box<dyn Action>, RuleError> {
        match self {
            ActionConfig::SetProperties { properties } if properties.is_empty() => Err(
                RuleError::invalid_rule(rule_label, "set_properties action lists no properties"),
            ),
            ActionConfig::SetTags { tags } if tags.is_empty() => Err(RuleError::invalid_rule(
                rule_label,
                "set_tags action lists no tags",
            )),
            ActionConfig::SetProperties { properties } => {
                Ok(Box::new(SetPropertiesAction::new(properties)))
            }
            ActionConfig::SetTags { tags } => Ok(Box::new(SetTagsAction::new(tags))),
        }
    }
}
