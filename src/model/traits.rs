//! Collaborator traits the orchestrator drives.
//!
//! The engine itself never talks to a database. Everything
//! storage-specific sits behind these traits: extracting the current
//! schema, building models, diffing them, running DDL and persisting
//! metadata. An embedding supplies one implementation of each.

use crate::actions::{ActionPart, UpgradeAction};
use crate::compare::SchemaComparisonResult;
use crate::context::UpgradeStage;
use crate::error::Result;
use crate::metadata::MetadataSet;
use crate::model::domain::DomainModel;
use crate::model::hints::HintSet;
use crate::model::schema::StorageModel;
use crate::policy::ReconciliationPolicy;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait for reading the current schema out of the storage.
#[async_trait]
pub trait SchemaExtractor: Send + Sync {
    /// Extract the storage model of the database as it exists right now.
    async fn extract(&self, cancel: &CancellationToken) -> Result<StorageModel>;
}

/// Trait for building the domain model of a stage.
pub trait DomainBuilder: Send + Sync {
    /// Build the domain model for the given stage.
    ///
    /// The upgrading stage includes recycled types; the final stage
    /// holds only the live model.
    fn build(&self, stage: UpgradeStage) -> Result<DomainModel>;
}

/// Trait for converting a domain model into its storage shape.
pub trait ModelConverter: Send + Sync {
    /// Convert a domain model into the target storage model, honoring
    /// the hints gathered for the current stage.
    fn convert(&self, domain: &DomainModel, hints: &HintSet) -> Result<StorageModel>;
}

/// Trait for comparing an extracted schema with a target schema.
pub trait Differencer: Send + Sync {
    /// Compare the extracted model against the target model.
    ///
    /// Hints steer matching (renames, removals); the policy tells the
    /// comparer how strict to be and whether to emit upgrade actions.
    /// Long-running comparisons should poll the cancellation token
    /// between catalogs.
    fn compare(
        &self,
        extracted: &StorageModel,
        target: &StorageModel,
        hints: &HintSet,
        policy: ReconciliationPolicy,
        domain: &DomainModel,
        cancel: &CancellationToken,
    ) -> Result<SchemaComparisonResult>;
}

/// Trait for executing upgrade actions against the storage.
///
/// The whole run shares one ambient transaction that commits exactly
/// once at the very end. Stages open nested scopes inside it:
/// `begin_stage` opens a scope, `complete_stage` marks it complete, and
/// neither commits anything. An executor dropped without `commit` must
/// roll back.
#[async_trait]
pub trait DdlExecutor: Send + Sync {
    /// Open the transaction scope for a stage.
    async fn begin_stage(&self, stage: UpgradeStage) -> Result<()>;

    /// Execute one batch of actions inside the ambient transaction.
    async fn execute(
        &self,
        part: ActionPart,
        actions: &[UpgradeAction],
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Execute one batch of actions outside the ambient transaction.
    async fn execute_non_transactional(
        &self,
        part: ActionPart,
        actions: &[UpgradeAction],
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Mark the stage's transaction scope complete.
    async fn complete_stage(&self, stage: UpgradeStage) -> Result<()>;

    /// Commit the ambient transaction. Called once per run.
    async fn commit(&self) -> Result<()>;
}

/// Trait for reading and writing upgrade metadata.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Read stored metadata. `None` when the storage was never built.
    async fn read(&self, cancel: &CancellationToken) -> Result<Option<MetadataSet>>;

    /// Persist metadata for the current model.
    async fn write(&self, metadata: &MetadataSet, cancel: &CancellationToken) -> Result<()>;
}
