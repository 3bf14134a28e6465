use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::host::Category;
use crate::rule::{Rule, RuleConfig};

/// Rule module reproducing the stock Texture2D post-import settings.
pub const TEXTURE2D_EXAMPLE: &str = include_str!("../modules/texture2d.yaml");

/// Rules declared for one category inside a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CategoryRules {
    pub category: String,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// One independently loaded configuration unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleModule {
    pub name: String,
    #[serde(default)]
    pub registrations: Vec<CategoryRules>,
}

impl RuleModule {
    /// Parses a module from YAML or JSON text (JSON is valid YAML).
    pub fn parse(raw: &str, fallback_name: &str) -> Result<Self, RuleError> {
        parse_module(raw, Path::new(fallback_name), fallback_name)
    }

    /// Builds every rule, failing on the first malformed one so a module is
    /// registered entirely or not at all.
    pub fn build(self) -> Result<Vec<(Category, Vec<Rule>)>, RuleError> {
        let mut built = Vec::with_capacity(self.registrations.len());
        for registration in self.registrations {
            if registration.category.trim().is_empty() {
                return Err(RuleError::InvalidCategory(registration.category));
            }
            let category = Category::new(registration.category.trim());
            let mut rules = Vec::with_capacity(registration.rules.len());
            for (index, rule) in registration.rules.into_iter().enumerate() {
                rules.push(rule.build(format!("{}#{}", category, index))?);
            }
            built.push((category, rules));
        }
        Ok(built)
    }

    pub fn rule_count(&self) -> usize {
        self.registrations
            .iter()
            .map(|registration| registration.rules.len())
            .sum()
    }
}

/// Outcome of loading one file.
#[derive(Debug)]
pub struct ModuleLoad {
    pub path: PathBuf,
    pub module: Result<RuleModule, RuleError>,
}

/// Loads every module found at `path` (a file, or a directory of
/// `.yaml`/`.yml`/`.json` files in file-name order).
///
/// Only a missing or unreadable location is an error; per-file failures are
/// returned alongside the successful modules.
pub fn load_modules(path: impl AsRef<Path>) -> Result<Vec<ModuleLoad>, RuleError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(RuleError::MissingPath(path.display().to_string()));
    }

    let files = if path.is_dir() {
        module_files(path)?
    } else {
        vec![path.to_path_buf()]
    };

    Ok(files
        .into_iter()
        .map(|file| {
            let module = load_module_file(&file);
            ModuleLoad { path: file, module }
        })
        .collect())
}

fn module_files(path: &Path) -> Result<Vec<PathBuf>, RuleError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(path).map_err(|err| RuleError::from_io(path, err))? {
        let entry = entry.map_err(|err| RuleError::from_io(path, err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| RuleError::from_io(entry.path(), err))?;
        if file_type.is_dir() {
            continue;
        }

        if let Some(ext) = entry.path().extension().and_then(|value| value.to_str()) {
            if matches!(ext, "json" | "yaml" | "yml") {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}

pub fn load_module_file(path: &Path) -> Result<RuleModule, RuleError> {
    let raw = fs::read_to_string(path).map_err(|err| RuleError::from_io(path, err))?;
    let fallback_name = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("module");
    parse_module(&raw, path, fallback_name)
}

fn parse_module(raw: &str, path: &Path, fallback_name: &str) -> Result<RuleModule, RuleError> {
    let mut attempts = Vec::new();

    match serde_yaml::from_str::<RuleModule>(raw) {
        Ok(module) => return Ok(module),
        Err(err) => attempts.push(format!("module document ({})", err)),
    }

    match serde_yaml::from_str::<Vec<CategoryRules>>(raw) {
        Ok(registrations) => {
            return Ok(RuleModule {
                name: fallback_name.to_string(),
                registrations,
            })
        }
        Err(err) => attempts.push(format!("registration list ({})", err)),
    }

    let message = format!("unable to parse rule module, tried {}", attempts.join("; "));
    Err(RuleError::parse_error(path.to_path_buf(), message))
}
