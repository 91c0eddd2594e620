//! Per-stage reconciliation policies and the decision table that
//! governs what happens with a schema comparison result.

use crate::compare::{SchemaComparisonResult, SchemaComparisonStatus};
use crate::config::UpgradeMode;
use crate::context::UpgradeStage;
use crate::model::hints::HintSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Policy the engine applies to one stage of an upgrade run.
///
/// Derived from the user-facing [`UpgradeMode`] per stage; the same mode
/// can map to different policies in the upgrading and final stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationPolicy {
    /// Trust the extracted schema without comparing.
    Skip,
    /// Require exact structural equality.
    ValidateExact,
    /// Accept the target being a subset of the extracted schema.
    ValidateCompatible,
    /// Require legacy-mode compatibility as judged by the differencer.
    ValidateLegacy,
    /// Drop and rebuild everything the model covers.
    Recreate,
    /// Execute whatever actions reconcile the schemas.
    Perform,
    /// Execute reconciling actions unless any of them can lose data.
    PerformSafely,
}

impl ReconciliationPolicy {
    /// Policy governing the given stage under a user mode.
    ///
    /// # Panics
    ///
    /// Only upgrade-capable modes run an upgrading stage. Deriving an
    /// upgrading-stage policy for any other mode is a programmer error
    /// and panics.
    pub fn for_mode(mode: UpgradeMode, stage: UpgradeStage) -> Self {
        match stage {
            UpgradeStage::Upgrading => match mode {
                UpgradeMode::Perform => ReconciliationPolicy::Perform,
                UpgradeMode::PerformSafely => ReconciliationPolicy::PerformSafely,
                other => panic!("mode {:?} has no upgrading stage", other),
            },
            UpgradeStage::Final => match mode {
                UpgradeMode::Skip | UpgradeMode::LegacySkip => ReconciliationPolicy::Skip,
                UpgradeMode::Validate => ReconciliationPolicy::ValidateExact,
                UpgradeMode::LegacyValidate => ReconciliationPolicy::ValidateLegacy,
                UpgradeMode::Recreate => ReconciliationPolicy::Recreate,
                UpgradeMode::Perform | UpgradeMode::PerformSafely => {
                    ReconciliationPolicy::Perform
                }
            },
        }
    }

    /// Whether this policy invokes the differencer at all.
    pub fn compares_schemas(&self) -> bool {
        !matches!(self, ReconciliationPolicy::Skip)
    }

    /// Whether this policy can execute upgrade actions.
    pub fn executes_actions(&self) -> bool {
        matches!(
            self,
            ReconciliationPolicy::Recreate
                | ReconciliationPolicy::Perform
                | ReconciliationPolicy::PerformSafely
        )
    }
}

impl fmt::Display for ReconciliationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconciliationPolicy::Skip => "skip",
            ReconciliationPolicy::ValidateExact => "validate_exact",
            ReconciliationPolicy::ValidateCompatible => "validate_compatible",
            ReconciliationPolicy::ValidateLegacy => "validate_legacy",
            ReconciliationPolicy::Recreate => "recreate",
            ReconciliationPolicy::Perform => "perform",
            ReconciliationPolicy::PerformSafely => "perform_safely",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of the decision table for one comparison result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The schema is acceptable as-is. Nothing to execute.
    Accept,
    /// Execute the comparison's upgrade actions.
    Execute,
    /// Policy violation. The run fails carrying the comparison result.
    Reject,
}

/// Apply the decision table to a stage's comparison result.
///
/// `hints` are the hints gathered for the stage; the suspicious-change
/// flag they carry feeds the exact-validation row. Rejections become
/// [`UpgradeError::Synchronization`](crate::error::UpgradeError) at the
/// call site, which owns the comparison result.
pub fn evaluate(
    policy: ReconciliationPolicy,
    result: &SchemaComparisonResult,
    hints: &HintSet,
) -> PolicyDecision {
    match policy {
        ReconciliationPolicy::Skip => PolicyDecision::Accept,
        ReconciliationPolicy::ValidateExact => {
            if result.status != SchemaComparisonStatus::Equal
                || result.has_column_type_changes
                || hints.has_suspicious_type_changes
            {
                PolicyDecision::Reject
            } else {
                PolicyDecision::Accept
            }
        }
        ReconciliationPolicy::ValidateCompatible => match result.status {
            SchemaComparisonStatus::Equal | SchemaComparisonStatus::TargetIsSubset => {
                PolicyDecision::Accept
            }
            _ => PolicyDecision::Reject,
        },
        ReconciliationPolicy::ValidateLegacy => {
            if result.is_compatible_in_legacy_mode == Some(true) {
                PolicyDecision::Accept
            } else {
                PolicyDecision::Reject
            }
        }
        ReconciliationPolicy::PerformSafely => {
            if result.has_unsafe_actions {
                PolicyDecision::Reject
            } else {
                PolicyDecision::Execute
            }
        }
        ReconciliationPolicy::Perform | ReconciliationPolicy::Recreate => PolicyDecision::Execute,
    }
}
