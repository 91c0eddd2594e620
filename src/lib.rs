//! # schema-upgrade
//!
//! Schema reconciliation and migration engine for object persistence layers.
//!
//! The engine compares the schema extracted from storage with the schema the
//! domain model requires and reconciles the two under a configurable policy:
//!
//! - **Seven upgrade modes** from validate-only to unconditional recreate
//! - **Two-stage runs** with an intermediate upgrading model for data motion
//! - **Upgrade hints** (renames, copies, removals) fed to the differencer
//! - **Extension hooks** dispatched over packages in dependency order
//! - **Single ambient transaction** committed once at the end of a run
//!
//! ## Example
//!
//! ```rust,no_run
//! use schema_upgrade::{Collaborators, ExtensionRegistry, UpgradeConfiguration, UpgradeOrchestrator};
//! # fn collaborators() -> Collaborators { unimplemented!() }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = UpgradeConfiguration::load("upgrade.yaml")?;
//!     let registry = ExtensionRegistry::build(vec![], vec![])?;
//!     let orchestrator = UpgradeOrchestrator::new(config, registry, collaborators())?;
//!     let report = orchestrator.build_async(None).await?;
//!     println!("{}", report.to_json()?);
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod compare;
pub mod compat;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod metadata;
pub mod model;
pub mod orchestrator;
pub mod policy;
pub mod prune;

// Re-exports for convenient access
pub use actions::{ActionPart, ActionSequence, UpgradeAction};
pub use compare::{SchemaComparisonResult, SchemaComparisonStatus, SchemaDifference};
pub use config::{DatabaseAlias, IgnoreRule, UpgradeConfiguration, UpgradeMode};
pub use context::{UpgradeContext, UpgradeStage};
pub use error::{Result, UpgradeError};
pub use hooks::{DefaultUpgradeHandler, ExtensionRegistry, PackageInfo, UpgradeHandler};
pub use metadata::{MetadataSet, PackageRecord};
pub use model::traits::{
    DdlExecutor, Differencer, DomainBuilder, MetadataStore, ModelConverter, SchemaExtractor,
};
pub use model::{
    Catalog, Column, DomainModel, HintSet, PersistentType, Schema, StorageModel, StorageType,
    Table, TypeKind, UpgradeHint,
};
pub use orchestrator::{
    Collaborators, Deferred, StageReport, StorageNode, UpgradeOrchestrator, UpgradeReport,
};
pub use policy::{PolicyDecision, ReconciliationPolicy};
pub use prune::SchemaPruner;
