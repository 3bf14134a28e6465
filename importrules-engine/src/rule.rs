use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::action::{Action, ActionConfig};
use crate::error::{error_chain, RuleError};
use crate::host::{ImportContext, ImportedAsset};
use crate::outcome::{ActionFailure, RuleOutcome};
use crate::predicate::{Predicate, PredicateConfig};
use crate::report::{ErrorReporter, FaultKind, FaultReport};

/// Predicates guarding an ordered list of actions.
///
/// Immutable once built; the manager shares it behind an `Arc`.
#[derive(Debug)]
pub struct Rule {
    label: String,
    predicates: Vec<Box<dyn Predicate>>,
    actions: Vec<Box<dyn Action>>,
    require_all: bool,
    apply_on_reprocess: bool,
}

impl Rule {
    pub fn builder(label: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(label)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn require_all(&self) -> bool {
        self.require_all
    }

    pub fn apply_on_reprocess(&self) -> bool {
        self.apply_on_reprocess
    }

    pub fn predicate_count(&self) -> usize {
        self.predicates.len()
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// An empty predicate list places no filter on the object.
    pub fn matches(&self, ctx: &ImportContext, asset: &dyn ImportedAsset) -> bool {
        if self.predicates.is_empty() {
            return true;
        }
        let mut results = self
            .predicates
            .iter()
            .map(|predicate| predicate.evaluate(ctx, asset));
        if self.require_all {
            results.all(|result| result)
        } else {
            results.any(|result| result)
        }
    }

    /// Evaluates the predicates and, on a match, runs every action in order.
    ///
    /// An action returning an error is recorded and the next action still
    /// runs. A panicking action is contained here, reported, and ends this
    /// rule. Nothing escapes to the caller.
    pub fn apply(
        &self,
        ctx: &ImportContext,
        asset: &mut dyn ImportedAsset,
        reporter: &dyn ErrorReporter,
    ) -> RuleOutcome {
        if !self.matches(ctx, &*asset) {
            debug!(rule = %self.label, object = %asset.full_name(), "rule did not match");
            return RuleOutcome::NotMatched;
        }

        debug!(rule = %self.label, object = %asset.full_name(), "rule matched object");

        let mut effects = Vec::new();
        let mut failures = Vec::new();

        for (index, action) in self.actions.iter().enumerate() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| action.apply(ctx, &mut *asset)));
            match result {
                Ok(Ok(effect)) => effects.push(effect),
                Ok(Err(err)) => {
                    let failure = ActionFailure {
                        index,
                        action: action.describe(),
                        kind: FaultKind::Failed,
                        detail: error_chain(&err),
                    };
                    reporter.report(&self.fault_report(&*asset, &failure));
                    failures.push(failure);
                }
                Err(payload) => {
                    let failure = ActionFailure {
                        index,
                        action: action.describe(),
                        kind: FaultKind::Panicked,
                        detail: panic_message(payload.as_ref()),
                    };
                    reporter.report(&self.fault_report(&*asset, &failure));
                    failures.push(failure);
                    break;
                }
            }
        }

        if failures.is_empty() {
            RuleOutcome::AppliedOk { effects }
        } else {
            RuleOutcome::AppliedWithActionFailure { effects, failures }
        }
    }

    fn fault_report(&self, asset: &dyn ImportedAsset, failure: &ActionFailure) -> FaultReport {
        FaultReport {
            kind: failure.kind,
            object: asset.full_name(),
            rule: self.label.clone(),
            action: failure.action.clone(),
            detail: failure.detail.clone(),
            requires_acknowledgement: failure.kind == FaultKind::Panicked,
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("action panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("action panicked: {}", message)
    } else {
        "action panicked with a non-string payload".to_string()
    }
}

/// Incremental constructor for [`Rule`].
#[derive(Debug)]
pub struct RuleBuilder {
    label: String,
    predicates: Vec<Box<dyn Predicate>>,
    actions: Vec<Box<dyn Action>>,
    require_all: bool,
    apply_on_reprocess: bool,
}

impl RuleBuilder {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            predicates: Vec::new(),
            actions: Vec::new(),
            require_all: false,
            apply_on_reprocess: false,
        }
    }

    pub fn predicate(mut self, predicate: impl Predicate + 'static) -> Self {
        self.predicates.push(Box::new(predicate));
        self
    }

    pub fn boxed_predicate(mut self, predicate: Box<dyn Predicate>) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn action(mut self, action: impl Action + 'static) -> Self {
        self.actions.push(Box::new(action));
        self
    }

    pub fn boxed_action(mut self, action: Box<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn require_all(mut self, require_all: bool) -> Self {
        self.require_all = require_all;
        self
    }

    pub fn apply_on_reprocess(mut self, apply_on_reprocess: bool) -> Self {
        self.apply_on_reprocess = apply_on_reprocess;
        self
    }

    /// Fails for rules that could never do anything.
    pub fn build(self) -> Result<Rule, RuleError> {
        if self.label.trim().is_empty() {
            return Err(RuleError::invalid_rule("<unnamed>", "rule label is empty"));
        }
        if self.actions.is_empty() {
            return Err(RuleError::invalid_rule(self.label, "rule declares no actions"));
        }
        Ok(Rule {
            label: self.label,
            predicates: self.predicates,
            actions: self.actions,
            require_all: self.require_all,
            apply_on_reprocess: self.apply_on_reprocess,
        })
    }
}

/// Serialized rule as written in rule modules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Defaults to `<category>#<position>` when omitted.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "queries")]
    pub predicates: Vec<PredicateConfig>,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
    #[serde(default, alias = "requires_all")]
    pub require_all: bool,
    #[serde(default, alias = "apply_on_reimport")]
    pub apply_on_reprocess: bool,
}

impl RuleConfig {
    pub fn build(self, fallback_label: impl Into<String>) -> Result<Rule, RuleError> {
        let label = self.label.unwrap_or_else(|| fallback_label.into());
        let mut builder = Rule::builder(label.clone())
            .require_all(self.require_all)
            .apply_on_reprocess(self.apply_on_reprocess);

        for predicate in self.predicates {
            let predicate = predicate.build().map_err(|err| match err {
                RuleError::InvalidRule { reason, .. } => RuleError::invalid_rule(&label, reason),
                other => other,
            })?;
            builder = builder.boxed_predicate(predicate);
        }
        for action in self.actions {
            builder = builder.boxed_action(action.build(&label)?);
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionEffect, SetPropertiesAction, SetTagsAction};
    use crate::error::ActionError;
    use crate::memory::MemoryAsset;
    use crate::predicate::{DestinationPathPredicate, SourcePathPredicate, TagPredicate};
    use crate::property::{PropertyMap, PropertyValue};
    use crate::report::TracingReporter;

    #[derive(Debug)]
    struct Explode;

    impl Action for Explode {
        fn apply(
            &self,
            _ctx: &ImportContext,
            _asset: &mut dyn ImportedAsset,
        ) -> Result<ActionEffect, ActionError> {
            panic!("host object was destroyed");
        }

        fn describe(&self) -> String {
            "explode".into()
        }
    }

    fn rock(destination: &str) -> MemoryAsset {
        MemoryAsset::new("Rock_d", &["Texture2D", "Texture"], destination)
            .with_source_file("D:/art/Rock_d.tga")
            .with_property("srgb", true)
            .with_property("lod_bias", 0)
    }

    fn props(pairs: &[(&str, PropertyValue)]) -> SetPropertiesAction {
        SetPropertiesAction::new(pairs.iter().cloned().collect())
    }

    #[test]
    fn any_rule_matches_when_one_predicate_holds() {
        let rule = Rule::builder("data maps")
            .predicate(SourcePathPredicate::ends_with("_n"))
            .predicate(SourcePathPredicate::ends_with("_d"))
            .action(props(&[("srgb", false.into())]))
            .build()
            .expect("rule");
        let asset = rock("/Game/Props/Rock_d.Rock_d");
        assert!(rule.matches(&ImportContext::default(), &asset));
    }

    #[test]
    fn all_rule_needs_every_predicate() {
        let rule = Rule::builder("test folder")
            .predicate(SourcePathPredicate::ends_with("_d"))
            .predicate(DestinationPathPredicate::contains("/TestFolder/"))
            .action(props(&[("srgb", false.into()), ("lod_bias", 5.into())]))
            .require_all(true)
            .build()
            .expect("rule");
        let ctx = ImportContext::default();

        let mut inside = rock("/Game/TestFolder/Rock_d.Rock_d");
        let outcome = rule.apply(&ctx, &mut inside, &TracingReporter);
        assert!(matches!(outcome, RuleOutcome::AppliedOk { .. }));
        assert_eq!(inside.property("srgb"), Some(&PropertyValue::Bool(false)));
        assert_eq!(inside.property("lod_bias"), Some(&PropertyValue::Int(5)));

        let mut outside = rock("/Game/Other/Rock_d.Rock_d");
        let outcome = rule.apply(&ctx, &mut outside, &TracingReporter);
        assert_eq!(outcome, RuleOutcome::NotMatched);
        assert_eq!(outside.property("srgb"), Some(&PropertyValue::Bool(true)));
        assert_eq!(outside.property("lod_bias"), Some(&PropertyValue::Int(0)));
    }

    #[test]
    fn empty_predicate_list_is_unconditional_in_both_modes() {
        for require_all in [false, true] {
            let rule = Rule::builder("always")
                .action(SetTagsAction::single("seen", "yes"))
                .require_all(require_all)
                .build()
                .expect("rule");
            let mut asset = rock("/Game/Rock_d.Rock_d");
            let outcome = rule.apply(&ImportContext::default(), &mut asset, &TracingReporter);
            assert!(outcome.matched(), "require_all={require_all}");
            assert_eq!(asset.metadata_tag("seen").as_deref(), Some("yes"));
        }
    }

    #[test]
    fn failing_action_does_not_stop_the_next_one() {
        let rule = Rule::builder("partial")
            .action(props(&[("missing_property", true.into())]))
            .action(props(&[("srgb", false.into())]))
            .build()
            .expect("rule");
        let mut asset = rock("/Game/Rock_d.Rock_d");

        let outcome = rule.apply(&ImportContext::default(), &mut asset, &TracingReporter);

        assert!(outcome.is_failure());
        assert_eq!(outcome.failures().len(), 1);
        assert_eq!(outcome.failures()[0].index, 0);
        assert_eq!(outcome.effects().len(), 1);
        assert_eq!(asset.property("srgb"), Some(&PropertyValue::Bool(false)));
    }

    #[test]
    fn panicking_action_ends_the_rule() {
        let rule = Rule::builder("explodes")
            .action(Explode)
            .action(props(&[("srgb", false.into())]))
            .build()
            .expect("rule");
        let mut asset = rock("/Game/Rock_d.Rock_d");

        let outcome = rule.apply(&ImportContext::default(), &mut asset, &TracingReporter);

        let failures = outcome.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, FaultKind::Panicked);
        assert!(failures[0].detail.contains("host object was destroyed"));
        assert_eq!(asset.property("srgb"), Some(&PropertyValue::Bool(true)));
    }

    #[test]
    fn rule_without_actions_is_rejected() {
        let err = Rule::builder("noop")
            .predicate(TagPredicate::present("x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, RuleError::InvalidRule { .. }));
    }

    #[test]
    fn rule_config_accepts_legacy_field_names() {
        let raw = r#"
queries:
  - type: source_path
    file_name_ends_with: _test
  - type: destination_path
    path_contains: /TestFolder/
actions:
  - type: set_properties
    properties: { srgb: false }
  - type: set_asset_tags
    tags: { obsolete: true }
requires_all: true
"#;
        let config: RuleConfig = serde_yaml::from_str(raw).expect("rule config");
        let rule = config.build("Texture2D#3").expect("rule");
        assert_eq!(rule.label(), "Texture2D#3");
        assert!(rule.require_all());
        assert!(!rule.apply_on_reprocess());
        assert_eq!(rule.predicate_count(), 2);
        assert_eq!(rule.action_count(), 2);
    }

    #[test]
    fn props_helper_keeps_order() {
        let map: PropertyMap = [("b", 1), ("a", 2)].into_iter().collect();
        assert_eq!(map.names(), vec!["b", "a"]);
    }
}
