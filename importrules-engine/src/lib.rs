//! Post-import rule engine.
//!
//! Each time the host finishes creating or re-importing an object it hands the
//! object to a [`RulesManager`]. The manager looks up the rules registered for
//! the object's class and its supertypes, runs every applicable [`Rule`] in
//! registration order and finally stamps the object with a processed marker,
//! so a later re-import can skip rules that should only run once.
//!
//! A rule is a list of [`Predicate`]s combined with ANY or ALL semantics that
//! guards an ordered list of [`Action`]s. Rules can be built in code with
//! [`Rule::builder`] or declared in YAML/JSON rule modules (see [`loader`]).

mod action;
mod error;
mod host;
pub mod loader;
mod manager;
pub mod memory;
mod outcome;
mod predicate;
mod property;
mod report;
mod rule;

pub use action::{Action, ActionConfig, ActionEffect, SetPropertiesAction, SetTagsAction};
pub use error::{error_chain, ActionError, HostError, RuleError};
pub use host::{
    Category, ImportContext, ImportEvents, ImportListener, ImportedAsset, Subscription,
    SubscriptionId,
};
pub use loader::{load_modules, ModuleLoad, RuleModule, TEXTURE2D_EXAMPLE};
pub use manager::{InstallSummary, ProcessedMarker, RulesManager};
pub use outcome::{ActionFailure, DispatchReport, RuleOutcome, RuleReport};
pub use predicate::{
    DestinationPathConfig, DestinationPathPredicate, Predicate, PredicateConfig,
    SourcePathConfig, SourcePathPredicate, TagConfig, TagPredicate,
};
pub use property::{PropertyMap, PropertyValue};
pub use report::{ErrorReporter, FaultKind, FaultReport, TracingReporter};
pub use rule::{Rule, RuleBuilder, RuleConfig};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryAsset;

    #[test]
    fn normal_map_flips_green_channel() {
        let manager = RulesManager::new();
        manager.register_rule(
            "Texture2D",
            Rule::builder("normals")
                .predicate(SourcePathPredicate::ends_with("_n"))
                .action(SetPropertiesAction::new(
                    PropertyMap::new().with("flip_green_channel", false),
                ))
                .build()
                .expect("rule"),
        );

        let mut asset = MemoryAsset::new("T_Wall_n", &["Texture2D", "Texture"], "/Game/T_Wall_n.T_Wall_n")
            .with_source_file("D:/art/wall_n.tga")
            .with_property("flip_green_channel", true);
        let report = manager.dispatch(&ImportContext::new("TextureFactory"), Some(&mut asset));

        assert_eq!(report.matched_rules(), vec!["normals"]);
        assert_eq!(
            asset.property("flip_green_channel"),
            Some(&PropertyValue::Bool(false))
        );
        assert_eq!(
            asset.metadata_tag("importer_rules_applied").as_deref(),
            Some("True")
        );
    }
}
