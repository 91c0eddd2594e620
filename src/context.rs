//! Per-run upgrade state shared with extension handlers.

use crate::config::UpgradeConfiguration;
use crate::metadata::MetadataSet;
use crate::model::domain::DomainModel;
use crate::model::hints::HintSet;
use crate::model::schema::StorageModel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Stage of a schema upgrade run.
///
/// Multistage modes pass through `Upgrading` before `Final`; every other
/// mode runs `Final` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeStage {
    /// Intermediate stage working against the model with recycled types.
    Upgrading,
    /// Last stage working against the target model.
    Final,
}

impl fmt::Display for UpgradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeStage::Upgrading => write!(f, "upgrading"),
            UpgradeStage::Final => write!(f, "final"),
        }
    }
}

/// Mutable state of one upgrade run, handed to extension handlers at
/// every callback.
///
/// Handlers read the stage and cached models and contribute to the hint
/// set; the orchestrator owns the caches and resets per-stage state when
/// a new stage begins.
#[derive(Debug)]
pub struct UpgradeContext {
    /// Effective configuration for this run.
    pub config: UpgradeConfiguration,
    /// Current stage. `None` until the first stage begins.
    pub stage: Option<UpgradeStage>,
    /// Hints gathered for the current stage.
    pub hints: HintSet,
    /// Domain model of the current stage, if one has been built.
    pub domain_model: Option<Arc<DomainModel>>,
    /// Extracted storage model, pruned. Shared across stages until DDL
    /// invalidates it.
    pub extracted_model: Option<Arc<StorageModel>>,
    /// Target storage model of the current stage.
    pub target_model: Option<Arc<StorageModel>>,
    /// Metadata read from the storage at the start of the run. `None`
    /// when the storage has never been built.
    pub stored_metadata: Option<MetadataSet>,
    /// Handler package names in dependency order.
    pub handler_order: Vec<String>,
}

impl UpgradeContext {
    /// Fresh context for the given configuration.
    pub fn new(config: UpgradeConfiguration) -> Self {
        UpgradeContext {
            config,
            stage: None,
            hints: HintSet::new(),
            domain_model: None,
            extracted_model: None,
            target_model: None,
            stored_metadata: None,
            handler_order: Vec::new(),
        }
    }

    /// Whether the run is currently in the upgrading stage.
    pub fn is_upgrading(&self) -> bool {
        self.stage == Some(UpgradeStage::Upgrading)
    }

    /// Enter a stage, dropping state that belongs to the previous one.
    ///
    /// The extracted model survives stage boundaries; hints and the
    /// per-stage models do not.
    pub fn enter_stage(&mut self, stage: UpgradeStage) {
        self.stage = Some(stage);
        self.hints = HintSet::new();
        self.domain_model = None;
        self.target_model = None;
    }

    /// Drop the cached extracted model after DDL changed the storage.
    pub fn invalidate_extracted_model(&mut self) {
        self.extracted_model = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::hints::UpgradeHint;

    #[test]
    fn test_enter_stage_resets_per_stage_state() {
        let mut context = UpgradeContext::new(UpgradeConfiguration::default());
        context.enter_stage(UpgradeStage::Upgrading);
        context.hints.add(UpgradeHint::RemoveType {
            name: "App.Order".to_string(),
        });
        context.extracted_model = Some(Arc::new(StorageModel::new()));
        context.target_model = Some(Arc::new(StorageModel::new()));

        context.enter_stage(UpgradeStage::Final);
        assert_eq!(context.stage, Some(UpgradeStage::Final));
        assert!(context.hints.is_empty());
        assert!(context.target_model.is_none());
        assert!(context.extracted_model.is_some());
    }

    #[test]
    fn test_invalidate_extracted_model() {
        let mut context = UpgradeContext::new(UpgradeConfiguration::default());
        context.extracted_model = Some(Arc::new(StorageModel::new()));
        context.invalidate_extracted_model();
        assert!(context.extracted_model.is_none());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(UpgradeStage::Upgrading.to_string(), "upgrading");
        assert_eq!(UpgradeStage::Final.to_string(), "final");
    }
}
