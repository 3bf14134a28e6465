use serde::Serialize;
use tracing::{error, warn};

/// How an action failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The action returned an error.
    Failed,
    /// The action panicked; the remainder of its rule was skipped.
    Panicked,
}

/// Operator-facing description of an action that did not complete.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaultReport {
    pub kind: FaultKind,
    /// Full name of the object being processed.
    pub object: String,
    pub rule: String,
    pub action: String,
    /// Error message followed by its cause chain, or the panic payload.
    pub detail: String,
    /// Whether a host with dialogs should block until the operator acknowledges.
    pub requires_acknowledgement: bool,
}

impl FaultReport {
    pub fn title(&self) -> &'static str {
        match self.kind {
            FaultKind::Failed => "Import action failed",
            FaultKind::Panicked => "Import action error",
        }
    }
}

/// Operator-visible error channel.
///
/// Implementations must not assume they are called synchronously with any
/// user interaction; plain logging is a complete implementation.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, fault: &FaultReport);
}

/// Reporter that writes faults to the tracing pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, fault: &FaultReport) {
        match fault.kind {
            FaultKind::Failed => warn!(
                object = %fault.object,
                rule = %fault.rule,
                action = %fault.action,
                detail = %fault.detail,
                "{}", fault.title()
            ),
            FaultKind::Panicked => error!(
                object = %fault.object,
                rule = %fault.rule,
                action = %fault.action,
                detail = %fault.detail,
                "{}", fault.title()
            ),
        }
    }
}
