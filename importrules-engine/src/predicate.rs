use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::host::{ImportContext, ImportedAsset};

/// Side-effect free test over an imported object.
///
/// Missing metadata (no source file, no tag) is a normal "no match".
pub trait Predicate: fmt::Debug + Send + Sync {
    fn evaluate(&self, ctx: &ImportContext, asset: &dyn ImportedAsset) -> bool;

    /// Short human readable form used in logs.
    fn describe(&self) -> String;
}

fn fold(value: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        value.to_string()
    } else {
        value.to_lowercase()
    }
}

fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Splits the last path component into stem and extension (dot included).
/// Leading dots belong to the stem, so `.gitignore` has no extension.
fn split_file_name(path: &str) -> (&str, &str) {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(index) if !name[..index].chars().all(|c| c == '.') => {
            (&name[..index], &name[index..])
        }
        _ => (name, ""),
    }
}

/// Declarative form of [`SourcePathPredicate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcePathConfig {
    #[serde(alias = "file_name_starts_with")]
    pub starts_with: String,
    #[serde(alias = "file_name_ends_with")]
    pub ends_with: String,
    #[serde(alias = "file_name_contains")]
    pub contains: String,
    pub full_path_contains: String,
    pub extensions: Vec<String>,
    #[serde(alias = "requires_all")]
    pub match_all: bool,
    pub case_sensitive: bool,
}

impl SourcePathConfig {
    pub fn starts_with(mut self, value: impl Into<String>) -> Self {
        self.starts_with = value.into();
        self
    }

    pub fn ends_with(mut self, value: impl Into<String>) -> Self {
        self.ends_with = value.into();
        self
    }

    pub fn contains(mut self, value: impl Into<String>) -> Self {
        self.contains = value.into();
        self
    }

    pub fn full_path_contains(mut self, value: impl Into<String>) -> Self {
        self.full_path_contains = value.into();
        self
    }

    pub fn extension(mut self, value: impl Into<String>) -> Self {
        self.extensions.push(value.into());
        self
    }

    pub fn match_all(mut self, match_all: bool) -> Self {
        self.match_all = match_all;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn build(self) -> SourcePathPredicate {
        SourcePathPredicate::from_config(self)
    }
}

/// Tests the file the object was imported from.
///
/// Prefix, suffix and substring conditions look at the file name without its
/// extension; `full_path_contains` looks at the whole normalised path. Only
/// configured conditions take part: with none configured the result is `false`
/// under ANY and `true` under ALL.
#[derive(Debug, Clone, PartialEq)]
pub struct SourcePathPredicate {
    starts_with: String,
    ends_with: String,
    contains: String,
    full_path_contains: String,
    extensions: BTreeSet<String>,
    match_all: bool,
    case_sensitive: bool,
}

impl SourcePathPredicate {
    /// Patterns are folded once here so evaluation only folds the queried path.
    pub fn from_config(config: SourcePathConfig) -> Self {
        let case_sensitive = config.case_sensitive;
        Self {
            starts_with: fold(&config.starts_with, case_sensitive),
            ends_with: fold(&config.ends_with, case_sensitive),
            contains: fold(&config.contains, case_sensitive),
            full_path_contains: fold(&config.full_path_contains.replace('\\', "/"), case_sensitive),
            extensions: config
                .extensions
                .iter()
                .filter(|ext| !ext.trim().is_empty())
                .map(|ext| normalize_extension(ext))
                .collect(),
            match_all: config.match_all,
            case_sensitive,
        }
    }

    pub fn starts_with(value: impl Into<String>) -> Self {
        SourcePathConfig::default().starts_with(value).build()
    }

    pub fn ends_with(value: impl Into<String>) -> Self {
        SourcePathConfig::default().ends_with(value).build()
    }

    pub fn contains(value: impl Into<String>) -> Self {
        SourcePathConfig::default().contains(value).build()
    }

    /// Results of the configured sub-conditions, in declaration order.
    fn condition_results(&self, source_path: &str) -> Vec<bool> {
        let path = fold(&source_path.replace('\\', "/"), self.case_sensitive);
        let (file_name, extension) = split_file_name(&path);

        let mut results = Vec::new();
        if !self.starts_with.is_empty() {
            results.push(file_name.starts_with(&self.starts_with));
        }
        if !self.ends_with.is_empty() {
            results.push(file_name.ends_with(&self.ends_with));
        }
        if !self.contains.is_empty() {
            results.push(file_name.contains(&self.contains));
        }
        if !self.full_path_contains.is_empty() {
            results.push(path.contains(&self.full_path_contains));
        }
        if !self.extensions.is_empty() {
            results.push(self.extensions.contains(&extension.to_lowercase()));
        }
        results
    }
}

impl Predicate for SourcePathPredicate {
    fn evaluate(&self, ctx: &ImportContext, asset: &dyn ImportedAsset) -> bool {
        let source = asset
            .source_file()
            .filter(|path| !path.is_empty())
            .or_else(|| ctx.source_file.clone().filter(|path| !path.is_empty()));
        let Some(source) = source else {
            return false;
        };

        let results = self.condition_results(&source);
        if self.match_all {
            results.into_iter().all(|result| result)
        } else {
            results.into_iter().any(|result| result)
        }
    }

    fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.starts_with.is_empty() {
            parts.push(format!("starts_with={:?}", self.starts_with));
        }
        if !self.ends_with.is_empty() {
            parts.push(format!("ends_with={:?}", self.ends_with));
        }
        if !self.contains.is_empty() {
            parts.push(format!("contains={:?}", self.contains));
        }
        if !self.full_path_contains.is_empty() {
            parts.push(format!("full_path_contains={:?}", self.full_path_contains));
        }
        if !self.extensions.is_empty() {
            parts.push(format!("extensions={:?}", self.extensions));
        }
        let mode = if self.match_all { "all" } else { "any" };
        format!("source_path[{}]({})", mode, parts.join(", "))
    }
}

/// Declarative form of [`DestinationPathPredicate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationPathConfig {
    #[serde(default)]
    pub path_contains: String,
    #[serde(default)]
    pub case_sensitive: bool,
}

/// Tests the location the object was created at. An unset pattern never matches.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationPathPredicate {
    path_contains: String,
    case_sensitive: bool,
}

impl DestinationPathPredicate {
    pub fn new(path_contains: impl Into<String>, case_sensitive: bool) -> Self {
        Self {
            path_contains: fold(&path_contains.into(), case_sensitive),
            case_sensitive,
        }
    }

    pub fn contains(path_contains: impl Into<String>) -> Self {
        Self::new(path_contains, false)
    }
}

impl From<DestinationPathConfig> for DestinationPathPredicate {
    fn from(config: DestinationPathConfig) -> Self {
        Self::new(config.path_contains, config.case_sensitive)
    }
}

impl Predicate for DestinationPathPredicate {
    fn evaluate(&self, _ctx: &ImportContext, asset: &dyn ImportedAsset) -> bool {
        if self.path_contains.is_empty() {
            return false;
        }
        fold(&asset.destination_path(), self.case_sensitive).contains(&self.path_contains)
    }

    fn describe(&self) -> String {
        format!("destination_path(contains={:?})", self.path_contains)
    }
}

/// Declarative form of [`TagPredicate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagConfig {
    pub key: String,
    #[serde(default, alias = "value")]
    pub expected_value: Option<String>,
}

/// Tests a metadata tag on the object: presence, or exact value when one is expected.
#[derive(Debug, Clone, PartialEq)]
pub struct TagPredicate {
    key: String,
    expected_value: Option<String>,
}

impl TagPredicate {
    pub fn present(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expected_value: None,
        }
    }

    pub fn equals(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            expected_value: Some(value.into()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl TryFrom<TagConfig> for TagPredicate {
    type Error = RuleError;

    fn try_from(config: TagConfig) -> Result<Self, Self::Error> {
        if config.key.trim().is_empty() {
            return Err(RuleError::invalid_rule(
                "tag predicate",
                "tag predicate requires a non-empty key",
            ));
        }
        Ok(Self {
            key: config.key,
            expected_value: config.expected_value,
        })
    }
}

impl Predicate for TagPredicate {
    /// An empty value is the host's "never set" sentinel and reads as absent.
    fn evaluate(&self, _ctx: &ImportContext, asset: &dyn ImportedAsset) -> bool {
        let actual = asset.metadata_tag(&self.key).filter(|value| !value.is_empty());
        match (actual, &self.expected_value) {
            (Some(actual), Some(expected)) => &actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn describe(&self) -> String {
        match &self.expected_value {
            Some(expected) => format!("tag({}={:?})", self.key, expected),
            None => format!("tag({})", self.key),
        }
    }
}

/// Serialized predicate as written in rule modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredicateConfig {
    SourcePath(SourcePathConfig),
    DestinationPath(DestinationPathConfig),
    Tag(TagConfig),
}

impl PredicateConfig {
    pub fn build(self) -> Result<Box<dyn Predicate>, RuleError> {
        Ok(match self {
            PredicateConfig::SourcePath(config) => Box::new(config.build()),
            PredicateConfig::DestinationPath(config) => {
                Box::new(DestinationPathPredicate::from(config))
            }
            PredicateConfig::Tag(config) => Box::new(TagPredicate::try_from(config)?),
        })
    }
}
