//! Import rules: declarative post-import processing.
//!
//! The workspace is split into three crates:
//!
//! * `importrules-core`: errors, configuration and logging setup
//! * `importrules-engine`: predicates, actions, rules and the dispatch manager
//! * `importrules-cli`: the `importrules` command line tool
//!
//! This crate re-exports the first two for embedders.

use anyhow::Context;

pub use importrules_engine as engine;

pub use importrules_core::{EngineConfig, Environment};
pub use importrules_engine::memory::{MemoryAsset, MemoryEventBus};
pub use importrules_engine::{
    ImportContext, ImportEvents, ImportListener, ImportedAsset, Rule, RuleModule, RulesManager,
};

/// Builds a manager from the environment and installs every rule module found
/// at the configured location.
///
/// Modules that fail to load or build are logged and skipped; only a missing
/// rules location is an error.
pub fn manager_from_env() -> anyhow::Result<(RulesManager, engine::InstallSummary)> {
    let config = EngineConfig::from_env().context("reading import rules configuration")?;
    let manager = RulesManager::from_config(&config);
    let summary = match config.rules_path() {
        Some(path) => {
            let loads = engine::load_modules(path)
                .with_context(|| format!("loading rule modules from {}", path.display()))?;
            manager.install_modules(loads)
        }
        None => {
            tracing::warn!("IMPORTRULES_RULES_PATH is not set, starting with no rules");
            engine::InstallSummary::default()
        }
    };
    Ok((manager, summary))
}
