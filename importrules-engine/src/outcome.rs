use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::action::ActionEffect;
use crate::report::FaultKind;

/// One action that did not complete inside a matched rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionFailure {
    /// Position of the action in the rule's action list.
    pub index: usize,
    pub action: String,
    pub kind: FaultKind,
    pub detail: String,
}

/// Result of applying a single rule to an object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RuleOutcome {
    NotMatched,
    AppliedOk {
        effects: Vec<ActionEffect>,
    },
    AppliedWithActionFailure {
        effects: Vec<ActionEffect>,
        failures: Vec<ActionFailure>,
    },
}

impl RuleOutcome {
    pub fn matched(&self) -> bool {
        !matches!(self, RuleOutcome::NotMatched)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RuleOutcome::AppliedWithActionFailure { .. })
    }

    pub fn failures(&self) -> &[ActionFailure] {
        match self {
            RuleOutcome::AppliedWithActionFailure { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn effects(&self) -> &[ActionEffect] {
        match self {
            RuleOutcome::NotMatched => &[],
            RuleOutcome::AppliedOk { effects }
            | RuleOutcome::AppliedWithActionFailure { effects, .. } => effects,
        }
    }
}

/// Rule outcome tagged with where the rule was registered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleReport {
    pub category: String,
    pub rule: String,
    pub outcome: RuleOutcome,
}

/// Aggregated view of one "object created" event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub event_id: Uuid,
    pub received_at: DateTime<Utc>,
    /// Full name of the object, `None` when the host delivered no object.
    pub object: Option<String>,
    pub is_reprocess: bool,
    pub rules: Vec<RuleReport>,
    /// Rules passed over because the object was already processed.
    pub skipped: Vec<String>,
    pub marker_written: bool,
    pub marker_error: Option<String>,
}

impl DispatchReport {
    pub(crate) fn new(object: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            received_at: Utc::now(),
            object,
            is_reprocess: false,
            rules: Vec::new(),
            skipped: Vec::new(),
            marker_written: false,
            marker_error: None,
        }
    }

    /// Labels of rules whose predicates matched, in the order they ran.
    pub fn matched_rules(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|report| report.outcome.matched())
            .map(|report| report.rule.as_str())
            .collect()
    }

    pub fn failed_rules(&self) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|report| report.outcome.is_failure())
            .map(|report| report.rule.as_str())
            .collect()
    }

    /// Number of actions that completed across all rules.
    pub fn actions_applied(&self) -> usize {
        self.rules
            .iter()
            .map(|report| report.outcome.effects().len())
            .sum()
    }

    pub fn has_failures(&self) -> bool {
        self.marker_error.is_some() || self.rules.iter().any(|report| report.outcome.is_failure())
    }
}
