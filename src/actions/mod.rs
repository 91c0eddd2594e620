//! Ordered DDL action sequence.
//!
//! The differencer fills the nine buckets; the engine dispatches them in a
//! fixed order, separating transactional work from the prolog/epilog that must
//! run outside the ambient transaction. The ordering logic lives in
//! [`ActionSequence::batches`]; both the sync and the async entry points are
//! built on it.

use crate::error::{Result, UpgradeError};
use crate::model::traits::DdlExecutor;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// One opaque mutating action, rendered for the DDL executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeAction {
    /// Command text understood by the executor.
    pub text: String,
}

impl UpgradeAction {
    /// Create an action from its command text.
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl From<&str> for UpgradeAction {
    fn from(text: &str) -> Self {
        UpgradeAction::new(text)
    }
}

impl std::fmt::Display for UpgradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

/// The nine action buckets, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionPart {
    NonTransactionalProlog,
    PreCleanupData,
    CleanupData,
    PreUpgrade,
    Upgrade,
    CopyData,
    PostCopyData,
    Cleanup,
    NonTransactionalEpilog,
}

impl ActionPart {
    /// All parts in dispatch order.
    pub const ORDER: [ActionPart; 9] = [
        ActionPart::NonTransactionalProlog,
        ActionPart::PreCleanupData,
        ActionPart::CleanupData,
        ActionPart::PreUpgrade,
        ActionPart::Upgrade,
        ActionPart::CopyData,
        ActionPart::PostCopyData,
        ActionPart::Cleanup,
        ActionPart::NonTransactionalEpilog,
    ];

    /// Whether the part runs inside the ambient transaction.
    pub fn is_transactional(&self) -> bool {
        !matches!(
            self,
            ActionPart::NonTransactionalProlog | ActionPart::NonTransactionalEpilog
        )
    }
}

impl std::fmt::Display for ActionPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionPart::NonTransactionalProlog => "non_transactional_prolog",
            ActionPart::PreCleanupData => "pre_cleanup_data",
            ActionPart::CleanupData => "cleanup_data",
            ActionPart::PreUpgrade => "pre_upgrade",
            ActionPart::Upgrade => "upgrade",
            ActionPart::CopyData => "copy_data",
            ActionPart::PostCopyData => "post_copy_data",
            ActionPart::Cleanup => "cleanup",
            ActionPart::NonTransactionalEpilog => "non_transactional_epilog",
        };
        write!(f, "{}", name)
    }
}

/// One non-empty bucket ready for dispatch.
#[derive(Debug, Clone, Copy)]
pub struct ActionBatch<'a> {
    /// Which bucket.
    pub part: ActionPart,

    /// Whether the batch runs inside the ambient transaction.
    pub transactional: bool,

    /// The actions, in order.
    pub actions: &'a [UpgradeAction],
}

/// Ordered action buckets for one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSequence {
    /// Runs before the ambient transaction touches anything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_transactional_prolog: Vec<UpgradeAction>,

    /// Prepares destructive data cleanup.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_cleanup_data: Vec<UpgradeAction>,

    /// Destructive data cleanup.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup_data: Vec<UpgradeAction>,

    /// Prepares structural changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_upgrade: Vec<UpgradeAction>,

    /// Additive structural changes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upgrade: Vec<UpgradeAction>,

    /// Data motion between old and new structures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copy_data: Vec<UpgradeAction>,

    /// Fixups after data motion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_copy_data: Vec<UpgradeAction>,

    /// Removal of structures the upgrade obsoleted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cleanup: Vec<UpgradeAction>,

    /// Runs after the ambient transaction committed its stage scope.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub non_transactional_epilog: Vec<UpgradeAction>,
}

impl ActionSequence {
    /// Create an empty sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow one bucket.
    pub fn bucket(&self, part: ActionPart) -> &[UpgradeAction] {
        match part {
            ActionPart::NonTransactionalProlog => &self.non_transactional_prolog,
            ActionPart::PreCleanupData => &self.pre_cleanup_data,
            ActionPart::CleanupData => &self.cleanup_data,
            ActionPart::PreUpgrade => &self.pre_upgrade,
            ActionPart::Upgrade => &self.upgrade,
            ActionPart::CopyData => &self.copy_data,
            ActionPart::PostCopyData => &self.post_copy_data,
            ActionPart::Cleanup => &self.cleanup,
            ActionPart::NonTransactionalEpilog => &self.non_transactional_epilog,
        }
    }

    /// Borrow one bucket mutably.
    pub fn bucket_mut(&mut self, part: ActionPart) -> &mut Vec<UpgradeAction> {
        match part {
            ActionPart::NonTransactionalProlog => &mut self.non_transactional_prolog,
            ActionPart::PreCleanupData => &mut self.pre_cleanup_data,
            ActionPart::CleanupData => &mut self.cleanup_data,
            ActionPart::PreUpgrade => &mut self.pre_upgrade,
            ActionPart::Upgrade => &mut self.upgrade,
            ActionPart::CopyData => &mut self.copy_data,
            ActionPart::PostCopyData => &mut self.post_copy_data,
            ActionPart::Cleanup => &mut self.cleanup,
            ActionPart::NonTransactionalEpilog => &mut self.non_transactional_epilog,
        }
    }

    /// Append an action to a bucket.
    pub fn push(&mut self, part: ActionPart, action: impl Into<UpgradeAction>) {
        self.bucket_mut(part).push(action.into());
    }

    /// Total number of actions across all nine buckets.
    pub fn count(&self) -> usize {
        ActionPart::ORDER
            .iter()
            .map(|p| self.bucket(*p).len())
            .sum()
    }

    /// Whether every bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Non-empty buckets in dispatch order. This is the single source of the
    /// dispatch ordering; every entry point iterates it.
    pub fn batches(&self) -> impl Iterator<Item = ActionBatch<'_>> {
        ActionPart::ORDER.iter().filter_map(move |part| {
            let actions = self.bucket(*part);
            if actions.is_empty() {
                None
            } else {
                Some(ActionBatch {
                    part: *part,
                    transactional: part.is_transactional(),
                    actions,
                })
            }
        })
    }

    /// Dispatch synchronously: `non_transactional` for the prolog and epilog,
    /// `transactional` once per non-empty transactional bucket, in order.
    /// Empty buckets are skipped. The first error stops the dispatch.
    pub fn process_with<E, T, N>(&self, mut transactional: T, mut non_transactional: N) -> std::result::Result<(), E>
    where
        T: FnMut(ActionPart, &[UpgradeAction]) -> std::result::Result<(), E>,
        N: FnMut(ActionPart, &[UpgradeAction]) -> std::result::Result<(), E>,
    {
        for batch in self.batches() {
            if batch.transactional {
                transactional(batch.part, batch.actions)?;
            } else {
                non_transactional(batch.part, batch.actions)?;
            }
        }
        Ok(())
    }

    /// Dispatch through a DDL executor, checking the cancellation token before
    /// every batch.
    pub async fn process_with_executor(
        &self,
        executor: &dyn DdlExecutor,
        cancel: &CancellationToken,
    ) -> Result<()> {
        for batch in self.batches() {
            if cancel.is_cancelled() {
                return Err(UpgradeError::Cancelled);
            }
            if batch.transactional {
                executor.execute(batch.part, batch.actions, cancel).await?;
            } else {
                executor
                    .execute_non_transactional(batch.part, batch.actions, cancel)
                    .await?;
            }
        }
        Ok(())
    }
}
