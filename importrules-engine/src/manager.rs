use std::sync::Arc;

use importrules_core::config::{EngineConfig, DEFAULT_MARKER_KEY, DEFAULT_MARKER_VALUE};
use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{error_chain, HostError, RuleError};
use crate::host::{
    Category, ImportContext, ImportEvents, ImportListener, ImportedAsset, Subscription,
};
use crate::loader::{ModuleLoad, RuleModule};
use crate::outcome::{DispatchReport, RuleReport};
use crate::predicate::{Predicate, TagPredicate};
use crate::report::{ErrorReporter, TracingReporter};
use crate::rule::Rule;

/// Tag written on every processed object so a later import of the same
/// object is recognised as re-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedMarker {
    check: TagPredicate,
    value: String,
}

impl ProcessedMarker {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            check: TagPredicate::equals(key, value.clone()),
            value,
        }
    }

    pub fn key(&self) -> &str {
        self.check.key()
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Only the exact marker value counts; a present tag with any other
    /// value is treated as first processing.
    pub fn is_set(&self, ctx: &ImportContext, asset: &dyn ImportedAsset) -> bool {
        self.check.evaluate(ctx, asset)
    }

    pub fn stamp(&self, asset: &mut dyn ImportedAsset) -> Result<(), HostError> {
        asset.set_metadata_tag(self.key(), &self.value)
    }
}

impl Default for ProcessedMarker {
    fn default() -> Self {
        Self::new(DEFAULT_MARKER_KEY, DEFAULT_MARKER_VALUE)
    }
}

#[derive(Debug)]
struct Registration {
    category: Category,
    rules: Vec<Arc<Rule>>,
}

/// Summary of installing a batch of rule modules.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InstallSummary {
    /// `(module name, rules registered)` for every module that installed.
    pub installed: Vec<(String, usize)>,
    /// `(module name or path, error chain)` for every module that did not.
    pub failed: Vec<(String, String)>,
}

impl InstallSummary {
    pub fn rules_installed(&self) -> usize {
        self.installed.iter().map(|(_, count)| count).sum()
    }
}

/// Process-wide registry of rules keyed by category, and the dispatcher that
/// runs them for each "object created" event.
///
/// Categories keep their first-registration order and rules keep their
/// registration order within a category. Registration is append-only.
pub struct RulesManager {
    registry: RwLock<Vec<Registration>>,
    marker: ProcessedMarker,
    reporter: Arc<dyn ErrorReporter>,
}

impl std::fmt::Debug for RulesManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulesManager")
            .field("registry", &self.registry)
            .field("marker", &self.marker)
            .finish_non_exhaustive()
    }
}

impl RulesManager {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(Vec::new()),
            marker: ProcessedMarker::default(),
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new().with_marker(ProcessedMarker::new(
            config.marker_key.clone(),
            config.marker_value.clone(),
        ))
    }

    pub fn with_marker(mut self, marker: ProcessedMarker) -> Self {
        self.marker = marker;
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn marker(&self) -> &ProcessedMarker {
        &self.marker
    }

    pub fn register_rule(&self, category: impl Into<Category>, rule: Rule) {
        self.register_rules(category, std::iter::once(rule));
    }

    /// Appends rules to the category's list, creating the list on first use.
    pub fn register_rules(&self, category: impl Into<Category>, rules: impl IntoIterator<Item = Rule>) {
        let category = category.into();
        let rules: Vec<Arc<Rule>> = rules.into_iter().map(Arc::new).collect();
        let count = rules.len();

        let mut registry = self.registry.write();
        match registry
            .iter()
            .position(|registration| registration.category == category)
        {
            Some(index) => registry[index].rules.extend(rules),
            None => registry.push(Registration {
                category: category.clone(),
                rules,
            }),
        }
        debug!(category = %category, added = count, "registered rules");
    }

    /// Builds and registers one module. A module with any malformed rule
    /// registers nothing.
    pub fn install_module(&self, module: RuleModule) -> Result<usize, RuleError> {
        let name = module.name.clone();
        let built = module.build()?;
        let mut count = 0;
        for (category, rules) in built {
            count += rules.len();
            self.register_rules(category, rules);
        }
        info!(module = %name, rules = count, "installed rule module");
        Ok(count)
    }

    /// Installs every successfully loaded module. Failures are logged and
    /// collected; they never stop the remaining modules.
    pub fn install_modules(&self, loads: impl IntoIterator<Item = ModuleLoad>) -> InstallSummary {
        let mut summary = InstallSummary::default();
        for load in loads {
            let origin = load.path.display().to_string();
            let result = load.module.and_then(|module| {
                let name = module.name.clone();
                self.install_module(module).map(|count| (name, count))
            });
            match result {
                Ok(installed) => summary.installed.push(installed),
                Err(err) => {
                    let detail = error_chain(&err);
                    error!(module = %origin, error = %detail, "rule module failed to initialize");
                    summary.failed.push((origin, detail));
                }
            }
        }
        summary
    }

    pub fn categories(&self) -> Vec<Category> {
        self.registry
            .read()
            .iter()
            .map(|registration| registration.category.clone())
            .collect()
    }

    pub fn rules_for(&self, category: &Category) -> Vec<Arc<Rule>> {
        self.registry
            .read()
            .iter()
            .find(|registration| &registration.category == category)
            .map(|registration| registration.rules.clone())
            .unwrap_or_default()
    }

    pub fn rule_count(&self) -> usize {
        self.registry
            .read()
            .iter()
            .map(|registration| registration.rules.len())
            .sum()
    }

    /// Every `(category, rule)` pair the object's class chain admits, in
    /// registry order. Taken as a snapshot so no lock is held while actions run.
    fn applicable(&self, asset: &dyn ImportedAsset) -> Vec<(Category, Arc<Rule>)> {
        let chain = asset.class_chain();
        self.registry
            .read()
            .iter()
            .filter(|registration| registration.category.admits(chain))
            .flat_map(|registration| {
                registration
                    .rules
                    .iter()
                    .map(move |rule| (registration.category.clone(), rule.clone()))
            })
            .collect()
    }

    /// Handles one "object created" event and reports what happened.
    ///
    /// The re-processing state is read before any rule runs, and the marker
    /// is written once after all of them, whatever their outcomes.
    pub fn dispatch(
        &self,
        ctx: &ImportContext,
        asset: Option<&mut dyn ImportedAsset>,
    ) -> DispatchReport {
        let Some(asset) = asset else {
            debug!(factory = %ctx.factory, "import produced no object, nothing to do");
            return DispatchReport::new(None);
        };

        let mut report = DispatchReport::new(Some(asset.full_name()));
        report.is_reprocess = self.marker.is_set(ctx, &*asset);

        for (category, rule) in self.applicable(&*asset) {
            if report.is_reprocess && !rule.apply_on_reprocess() {
                debug!(rule = %rule.label(), "skipping rule on re-processed object");
                report.skipped.push(rule.label().to_string());
                continue;
            }
            let outcome = rule.apply(ctx, &mut *asset, self.reporter.as_ref());
            report.rules.push(RuleReport {
                category: category.to_string(),
                rule: rule.label().to_string(),
                outcome,
            });
        }

        match self.marker.stamp(&mut *asset) {
            Ok(()) => report.marker_written = true,
            Err(err) => {
                warn!(
                    object = %asset.full_name(),
                    error = %err,
                    "failed to record processed marker"
                );
                report.marker_error = Some(err.to_string());
            }
        }

        info!(
            event_id = %report.event_id,
            object = %asset.full_name(),
            reprocess = report.is_reprocess,
            matched = report.matched_rules().len(),
            failed = report.failed_rules().len(),
            skipped = report.skipped.len(),
            "processed imported object"
        );
        report
    }

    /// Subscribes the manager to a host event source.
    pub fn attach(self: &Arc<Self>, events: &dyn ImportEvents) -> Subscription {
        let listener: Arc<dyn ImportListener> = self.clone();
        let id = events.subscribe(listener);
        info!(subscription = id.0, rules = self.rule_count(), "rules manager attached");
        Subscription::new(id)
    }
}

impl Default for RulesManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportListener for RulesManager {
    fn on_object_created(&self, ctx: &ImportContext, asset: Option<&mut dyn ImportedAsset>) {
        self.dispatch(ctx, asset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::SetTagsAction;
    use crate::memory::{MemoryAsset, MemoryEventBus};
    use crate::action::{Action, ActionEffect};
    use crate::error::ActionError;
    use crate::predicate::SourcePathPredicate;
    use crate::report::{FaultKind, FaultReport};
    use mockall::mock;
    use mockall::predicate::function;

    mock! {
        Reporter {}

        impl ErrorReporter for Reporter {
            fn report(&self, fault: &FaultReport);
        }
    }

    #[derive(Debug)]
    struct Explodes;

    impl Action for Explodes {
        fn apply(
            &self,
            _ctx: &ImportContext,
            _asset: &mut dyn ImportedAsset,
        ) -> Result<ActionEffect, ActionError> {
            panic!("editor object went away");
        }

        fn describe(&self) -> String {
            "explodes".to_string()
        }
    }

    fn tag_rule(label: &str, key: &str) -> Rule {
        Rule::builder(label)
            .action(SetTagsAction::single(key, "1"))
            .build()
            .expect("rule")
    }

    fn texture() -> MemoryAsset {
        MemoryAsset::new("T_Wall_n", &["Texture2D", "Texture", "Object"], "/Game/T_Wall_n.T_Wall_n")
            .with_source_file("D:/art/wall_n.tga")
    }

    #[test]
    fn registration_appends_per_category() {
        let manager = RulesManager::new();
        manager.register_rule("Texture2D", tag_rule("a", "a"));
        manager.register_rule("StaticMesh", tag_rule("b", "b"));
        manager.register_rules("Texture2D", vec![tag_rule("c", "c")]);

        assert_eq!(
            manager.categories(),
            vec![Category::from("Texture2D"), Category::from("StaticMesh")]
        );
        let labels: Vec<String> = manager
            .rules_for(&Category::from("Texture2D"))
            .iter()
            .map(|rule| rule.label().to_string())
            .collect();
        assert_eq!(labels, vec!["a", "c"]);
        assert_eq!(manager.rule_count(), 3);
    }

    #[test]
    fn supertype_registrations_fire_too() {
        let manager = RulesManager::new();
        manager.register_rule("Texture", tag_rule("texture", "texture"));
        manager.register_rule("Texture2D", tag_rule("texture2d", "texture2d"));
        manager.register_rule("StaticMesh", tag_rule("mesh", "mesh"));

        let mut asset = texture();
        let report = manager.dispatch(&ImportContext::default(), Some(&mut asset));

        assert_eq!(report.matched_rules(), vec!["texture", "texture2d"]);
        assert!(asset.metadata_tag("mesh").is_none());
    }

    #[test]
    fn missing_object_is_a_no_op() {
        let manager = RulesManager::new();
        manager.register_rule("Texture2D", tag_rule("a", "a"));
        let report = manager.dispatch(&ImportContext::new("TextureFactory"), None);
        assert!(report.object.is_none());
        assert!(report.rules.is_empty());
        assert!(!report.marker_written);
    }

    #[test]
    fn marker_requires_exact_value() {
        let marker = ProcessedMarker::default();
        let ctx = ImportContext::default();
        assert!(!marker.is_set(&ctx, &texture()));
        assert!(!marker.is_set(&ctx, &texture().with_tag("importer_rules_applied", "true")));
        assert!(marker.is_set(&ctx, &texture().with_tag("importer_rules_applied", "True")));
    }

    #[test]
    fn marker_write_failure_is_reported_not_raised() {
        let manager = RulesManager::new();
        manager.register_rule(
            "Texture2D",
            Rule::builder("normals")
                .predicate(SourcePathPredicate::ends_with("_n"))
                .action(SetTagsAction::single("normal", "yes"))
                .build()
                .expect("rule"),
        );
        let mut asset = texture().with_read_only_tag("importer_rules_applied");

        let report = manager.dispatch(&ImportContext::default(), Some(&mut asset));

        assert_eq!(report.matched_rules(), vec!["normals"]);
        assert!(!report.marker_written);
        assert!(report.marker_error.is_some());
        assert!(report.has_failures());
    }

    #[test]
    fn attach_and_detach_follow_subscription() {
        let manager = Arc::new(RulesManager::new());
        manager.register_rule("Texture2D", tag_rule("a", "seen"));
        let bus = MemoryEventBus::new();

        let subscription = manager.attach(&bus);
        let mut first = texture();
        bus.emit(&ImportContext::default(), Some(&mut first));
        assert_eq!(first.metadata_tag("seen").as_deref(), Some("1"));

        assert!(subscription.detach(&bus));
        assert_eq!(bus.listener_count(), 0);
        let mut second = texture();
        bus.emit(&ImportContext::default(), Some(&mut second));
        assert!(second.metadata_tag("seen").is_none());
    }

    #[test]
    fn config_overrides_marker() {
        let config = EngineConfig {
            marker_key: "processed".into(),
            marker_value: "yes".into(),
            ..EngineConfig::default()
        };
        let manager = RulesManager::from_config(&config);
        let mut asset = texture();
        manager.dispatch(&ImportContext::default(), Some(&mut asset));
        assert_eq!(asset.metadata_tag("processed").as_deref(), Some("yes"));
        assert!(asset.metadata_tag(DEFAULT_MARKER_KEY).is_none());
    }

    #[test]
    fn panicking_rule_is_acknowledged_and_siblings_continue() {
        let mut reporter = MockReporter::new();
        reporter
            .expect_report()
            .with(function(|fault: &FaultReport| {
                fault.kind == FaultKind::Panicked
                    && fault.requires_acknowledgement
                    && fault.rule == "broken"
                    && fault.detail.contains("editor object went away")
            }))
            .times(1)
            .return_const(());

        let manager = RulesManager::new().with_reporter(Arc::new(reporter));
        manager.register_rules(
            "Texture2D",
            vec![
                Rule::builder("broken")
                    .action(Explodes)
                    .action(SetTagsAction::single("after", "1"))
                    .build()
                    .expect("rule"),
                tag_rule("sibling", "sibling"),
            ],
        );

        let mut asset = texture();
        let report = manager.dispatch(&ImportContext::default(), Some(&mut asset));

        assert_eq!(report.failed_rules(), vec!["broken"]);
        assert!(asset.metadata_tag("after").is_none());
        assert_eq!(asset.metadata_tag("sibling").as_deref(), Some("1"));
        assert!(report.marker_written);
    }
}
