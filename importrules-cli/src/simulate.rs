use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use importrules_core::config::EngineConfig;
use importrules_engine::memory::{MemoryAsset, MemoryEventBus};
use importrules_engine::{
    load_modules, DispatchReport, ImportContext, ImportEvents, ImportListener, ImportedAsset,
    InstallSummary, RuleError, RulesManager,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("no rules location given; pass --rules or set IMPORTRULES_RULES_PATH")]
    NoRulesPath,
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error("failed to read asset description {path}: {source}")]
    AssetIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse asset description {path}: {message}")]
    AssetParse { path: String, message: String },
    #[error("{0} rule module(s) failed to initialize")]
    ModulesFailed(usize),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("output error: {0}")]
    Output(String),
}

impl From<importrules_core::ConfigError> for CliError {
    fn from(value: importrules_core::ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<importrules_core::CoreError> for CliError {
    fn from(value: importrules_core::CoreError) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Output(value.to_string())
    }
}

/// Picks the explicit `--rules` location over the configured one.
pub fn resolve_rules_path(explicit: Option<PathBuf>, config: &EngineConfig) -> Result<PathBuf, CliError> {
    explicit
        .or_else(|| config.rules_path().cloned())
        .ok_or(CliError::NoRulesPath)
}

/// Loads and installs every module under `path`.
pub fn build_manager(path: &Path, config: &EngineConfig) -> Result<(RulesManager, InstallSummary), CliError> {
    info!(path = %path.display(), "loading rule modules");
    let manager = RulesManager::from_config(config);
    let summary = manager.install_modules(load_modules(path)?);
    Ok((manager, summary))
}

pub fn load_asset(path: &Path) -> Result<MemoryAsset, CliError> {
    let raw = fs::read_to_string(path).map_err(|source| CliError::AssetIo {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&raw).map_err(|err| CliError::AssetParse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Forwards events to the manager and keeps every dispatch report.
struct RecordingListener {
    manager: Arc<RulesManager>,
    reports: Mutex<Vec<DispatchReport>>,
}

impl ImportListener for RecordingListener {
    fn on_object_created(&self, ctx: &ImportContext, asset: Option<&mut dyn ImportedAsset>) {
        let report = self.manager.dispatch(ctx, asset);
        self.reports.lock().push(report);
    }
}

/// Everything a simulated run produced.
#[derive(Debug, Serialize)]
pub struct Simulation {
    pub reports: Vec<DispatchReport>,
    pub asset: MemoryAsset,
}

/// Imports `asset` `times` times through an event bus; every event after the
/// first is a re-import of the same object.
pub fn simulate(manager: RulesManager, ctx: &ImportContext, mut asset: MemoryAsset, times: usize) -> Simulation {
    let listener = Arc::new(RecordingListener {
        manager: Arc::new(manager),
        reports: Mutex::new(Vec::new()),
    });
    let bus = MemoryEventBus::new();
    let subscription = bus.subscribe(listener.clone());

    for _ in 0..times {
        bus.emit(ctx, Some(&mut asset));
    }
    bus.unsubscribe(subscription);

    let reports = std::mem::take(&mut *listener.reports.lock());
    Simulation { reports, asset }
}

#[cfg(test)]
mod tests {
    use super::*;
    use importrules_engine::{PropertyValue, TEXTURE2D_EXAMPLE};

    fn rules_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("texture2d.yaml"), TEXTURE2D_EXAMPLE).expect("write module");
        dir
    }

    #[test]
    fn reimport_skips_once_only_rules() {
        let dir = rules_dir();
        let config = EngineConfig::default();
        let (manager, summary) = build_manager(dir.path(), &config).expect("manager");
        assert_eq!(summary.rules_installed(), 4);

        let asset = MemoryAsset::new("T_Wall_n", &["Texture2D", "Texture", "Object"], "/Game/T_Wall_n.T_Wall_n")
            .with_source_file("D:/art/wall_n.tga")
            .with_property("flip_green_channel", true)
            .with_property("srgb", true);

        let run = simulate(manager, &ImportContext::new("TextureFactory"), asset, 2);

        assert_eq!(run.reports.len(), 2);
        assert!(!run.reports[0].is_reprocess);
        assert_eq!(
            run.reports[0].matched_rules(),
            vec!["normal-map-green-channel", "linear-data-maps"]
        );
        assert!(run.reports[1].is_reprocess);
        assert_eq!(run.reports[1].actions_applied(), 0);
        assert_eq!(run.reports[1].skipped.len(), 4);
        assert_eq!(run.asset.property("srgb"), Some(&PropertyValue::Bool(false)));
    }

    #[test]
    fn explicit_rules_path_wins() {
        let config = EngineConfig {
            rules_path: Some(PathBuf::from("/etc/importrules")),
            ..EngineConfig::default()
        };
        let path = resolve_rules_path(Some(PathBuf::from("./rules")), &config).expect("path");
        assert_eq!(path, PathBuf::from("./rules"));

        let err = resolve_rules_path(None, &EngineConfig::default()).unwrap_err();
        assert!(matches!(err, CliError::NoRulesPath));
    }
}
