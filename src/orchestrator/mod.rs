//! Upgrade orchestrator - drives the stage state machine.
//!
//! A run moves through `Initializing -> {Upgrading ->} Final ->
//! Complete`. The orchestrator owns the collaborators, threads one
//! cancellation token through every extraction, comparison and DDL call,
//! and keeps the whole run inside a single ambient transaction that
//! commits exactly once at the very end.

mod deferred;

pub use deferred::Deferred;

use crate::config::{UpgradeConfiguration, UpgradeMode};
use crate::context::{UpgradeContext, UpgradeStage};
use crate::error::{Result, UpgradeError};
use crate::hooks::ExtensionRegistry;
use crate::model::domain::DomainModel;
use crate::model::hints::HintSet;
use crate::model::schema::StorageModel;
use crate::model::traits::{
    DdlExecutor, Differencer, DomainBuilder, MetadataStore, ModelConverter, SchemaExtractor,
};
use crate::policy::{self, PolicyDecision, ReconciliationPolicy};
use crate::prune::SchemaPruner;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The storage-specific collaborators a run is driven against.
pub struct Collaborators {
    /// Reads the current schema out of the storage.
    pub extractor: Arc<dyn SchemaExtractor>,
    /// Builds the per-stage domain model.
    pub builder: Arc<dyn DomainBuilder>,
    /// Converts domain models into storage models.
    pub converter: Arc<dyn ModelConverter>,
    /// Compares extracted and target schemas.
    pub differencer: Arc<dyn Differencer>,
    /// Executes DDL batches inside the ambient transaction.
    pub executor: Arc<dyn DdlExecutor>,
    /// Reads and writes the metadata record set.
    pub metadata: Arc<dyn MetadataStore>,
}

/// A storage node registered with the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNode {
    /// Node name.
    pub name: String,

    /// Physical catalogs the node maps to.
    pub catalogs: Vec<String>,

    /// When the node was registered or last refreshed.
    pub registered_at: DateTime<Utc>,
}

/// Summary of one synchronized stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    /// Stage this summarizes.
    pub stage: UpgradeStage,

    /// Policy that governed the stage.
    pub policy: ReconciliationPolicy,

    /// Comparison status, when the policy compared schemas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<crate::compare::SchemaComparisonStatus>,

    /// Number of upgrade actions executed.
    pub actions_executed: usize,

    /// Number of hints in effect.
    pub hint_count: usize,
}

/// Result of an upgrade run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Mode the run was started with.
    pub mode: UpgradeMode,

    /// Storage node the run targeted.
    pub node_name: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Per-stage summaries, in execution order.
    pub stages: Vec<StageReport>,
}

impl UpgradeReport {
    /// Total number of upgrade actions executed across all stages.
    pub fn total_actions(&self) -> usize {
        self.stages.iter().map(|s| s.actions_executed).sum()
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Schema upgrade orchestrator.
pub struct UpgradeOrchestrator {
    config: UpgradeConfiguration,
    registry: ExtensionRegistry,
    extractor: Arc<dyn SchemaExtractor>,
    builder: Arc<dyn DomainBuilder>,
    converter: Arc<dyn ModelConverter>,
    differencer: Arc<dyn Differencer>,
    executor: Arc<dyn DdlExecutor>,
    metadata: Arc<dyn MetadataStore>,
    nodes: Mutex<BTreeMap<String, StorageNode>>,
}

impl UpgradeOrchestrator {
    /// Create a new orchestrator over validated configuration.
    pub fn new(
        config: UpgradeConfiguration,
        registry: ExtensionRegistry,
        collaborators: Collaborators,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            registry,
            extractor: collaborators.extractor,
            builder: collaborators.builder,
            converter: collaborators.converter,
            differencer: collaborators.differencer,
            executor: collaborators.executor,
            metadata: collaborators.metadata,
            nodes: Mutex::new(BTreeMap::new()),
        })
    }

    /// Run the upgrade, blocking the current thread.
    ///
    /// Drives [`build_async`](Self::build_async) on a private
    /// current-thread runtime; both entry points share one control flow.
    pub fn build(&self) -> Result<UpgradeReport> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(self.build_async(None))
    }

    /// Run the upgrade.
    pub async fn build_async(&self, cancel: Option<CancellationToken>) -> Result<UpgradeReport> {
        let cancel = cancel.unwrap_or_default();
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mode = self.config.mode;

        info!(
            "Starting upgrade run {} (mode: {:?}, node: {})",
            run_id, mode, self.config.node_name
        );

        let mut context = UpgradeContext::new(self.config.clone());
        context.handler_order = self.registry.handler_order();

        // Phase 1: Read stored metadata and gate versions
        info!("Phase 1: Reading stored metadata");
        let stored = self.metadata.read(&cancel).await?;
        self.registry.check_stored_versions(stored.as_ref())?;
        context.stored_metadata = stored;

        // Phase 2: Prepare handlers
        info!("Phase 2: Preparing {} upgrade handlers", self.registry.len());
        self.registry.on_prepare(&mut context)?;

        // Phase 3: Synchronize stages
        info!("Phase 3: Reconciling schema");
        let mut pending_extraction: Option<Deferred<StorageModel>> = None;
        if self.config.build_in_parallel {
            let extractor = self.extractor.clone();
            let token = cancel.clone();
            pending_extraction =
                Some(Deferred::spawn(async move { extractor.extract(&token).await }));
            debug!("Schema extraction started in the background");
        }

        let mut stages = Vec::new();
        let final_build = self.start_final_model_build();
        if mode.requires_upgrading_stage() {
            let domain = Arc::new(self.builder.build(UpgradeStage::Upgrading)?);
            let report = self
                .synchronize_stage(
                    UpgradeStage::Upgrading,
                    domain,
                    &mut context,
                    &mut pending_extraction,
                    &cancel,
                )
                .await?;
            stages.push(report);
        }

        let domain = Arc::new(final_build.wait().await?);
        let report = self
            .synchronize_stage(
                UpgradeStage::Final,
                domain,
                &mut context,
                &mut pending_extraction,
                &cancel,
            )
            .await?;
        stages.push(report);

        // Phase 4: Complete
        info!("Phase 4: Completing upgrade");
        self.registry.on_complete(&mut context)?;
        if cancel.is_cancelled() {
            warn!("Cancellation observed before commit, rolling back");
            return Err(UpgradeError::Cancelled);
        }
        self.executor.commit().await?;

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let report = UpgradeReport {
            run_id,
            mode,
            node_name: self.config.node_name.clone(),
            started_at,
            completed_at,
            duration_seconds: duration,
            stages,
        };

        info!(
            "Upgrade run {} completed: {} stage(s), {} action(s) in {:.1}s",
            report.run_id,
            report.stages.len(),
            report.total_actions(),
            report.duration_seconds
        );

        Ok(report)
    }

    /// Validate and register a secondary storage node.
    ///
    /// The node's schema is extracted through the given extractor,
    /// pruned with the node's configuration and checked against the
    /// already-built domain with the `ValidateCompatible` policy. No DDL
    /// ever runs against an attached node.
    pub async fn attach_node(
        &self,
        node_config: UpgradeConfiguration,
        extractor: Arc<dyn SchemaExtractor>,
        cancel: Option<CancellationToken>,
    ) -> Result<()> {
        node_config.validate()?;
        let cancel = cancel.unwrap_or_default();
        let node_name = node_config.node_name.clone();
        {
            let nodes = self.nodes.lock().await;
            if nodes.contains_key(&node_name) {
                return Err(UpgradeError::Config(format!(
                    "storage node '{}' is already attached",
                    node_name
                )));
            }
        }
        info!("Attaching storage node '{}'", node_name);

        let domain = self.builder.build(UpgradeStage::Final)?;
        let hints = HintSet::new();
        let mut extracted = extractor.extract(&cancel).await?;
        SchemaPruner::new(&node_config).apply(&mut extracted);
        let target = self.converter.convert(&domain, &hints)?;
        let result = self.differencer.compare(
            &extracted,
            &target,
            &hints,
            ReconciliationPolicy::ValidateCompatible,
            &domain,
            &cancel,
        )?;

        match policy::evaluate(ReconciliationPolicy::ValidateCompatible, &result, &hints) {
            PolicyDecision::Accept => {
                self.register_node(&node_name, &extracted).await;
                info!("Storage node '{}' attached", node_name);
                Ok(())
            }
            _ => {
                error!(
                    "Storage node '{}' rejected: {}",
                    node_name,
                    result.brief()
                );
                Err(UpgradeError::synchronization(result))
            }
        }
    }

    /// Registered storage nodes, keyed by name.
    pub async fn nodes(&self) -> Vec<StorageNode> {
        self.nodes.lock().await.values().cloned().collect()
    }

    /// Start building the final-stage domain model.
    ///
    /// A parallel multistage run sends the build to the blocking pool so
    /// it overlaps the upgrading stage; otherwise the build waits until
    /// the final stage claims it.
    fn start_final_model_build(&self) -> Deferred<DomainModel> {
        let builder = self.builder.clone();
        if self.config.build_in_parallel && self.config.mode.requires_upgrading_stage() {
            debug!("Final-stage model build started in the background");
            Deferred::spawn_blocking(move || builder.build(UpgradeStage::Final))
        } else {
            Deferred::lazy(move || builder.build(UpgradeStage::Final))
        }
    }

    /// Synchronize one stage against the storage.
    async fn synchronize_stage(
        &self,
        stage: UpgradeStage,
        domain: Arc<DomainModel>,
        context: &mut UpgradeContext,
        pending_extraction: &mut Option<Deferred<StorageModel>>,
        cancel: &CancellationToken,
    ) -> Result<StageReport> {
        if cancel.is_cancelled() {
            return Err(UpgradeError::Cancelled);
        }
        let policy = ReconciliationPolicy::for_mode(self.config.mode, stage);
        info!("Synchronizing {} stage (policy: {})", stage, policy);

        context.enter_stage(stage);
        context.domain_model = Some(domain.clone());
        self.registry.on_before_stage(context)?;

        self.executor.begin_stage(stage).await?;

        let extracted = self
            .current_schema(context, pending_extraction, cancel)
            .await?;

        let target = Arc::new(self.converter.convert(&domain, &context.hints)?);
        context.target_model = Some(target.clone());

        self.registry.on_schema_ready(context)?;

        let mut comparison = None;
        let mut actions_executed = 0;
        if policy.compares_schemas() {
            let result = self.differencer.compare(
                &extracted,
                &target,
                &context.hints,
                policy,
                &domain,
                cancel,
            )?;
            comparison = Some(result.status);
            debug!("Schema comparison: {}", result.brief());

            match policy::evaluate(policy, &result, &context.hints) {
                PolicyDecision::Accept => {}
                PolicyDecision::Reject => {
                    error!("Schema rejected by policy {}: {}", policy, result.brief());
                    return Err(UpgradeError::synchronization(result));
                }
                PolicyDecision::Execute => {
                    let count = result.upgrade_actions.count();
                    if count > 0 {
                        self.registry
                            .on_before_execute_actions(context, &result.upgrade_actions)?;
                        info!("Executing {} upgrade actions", count);
                        result
                            .upgrade_actions
                            .process_with_executor(self.executor.as_ref(), cancel)
                            .await?;
                        context.invalidate_extracted_model();
                        actions_executed = count;
                    } else {
                        debug!("Schemas already reconciled, nothing to execute");
                    }
                }
            }
        } else {
            debug!("Policy {} trusts the extracted schema", policy);
        }

        self.register_node(&context.config.node_name, &extracted)
            .await;

        self.registry.on_stage(context)?;

        if policy.executes_actions() {
            self.persist_metadata(context, &domain, cancel).await?;
        }

        self.executor.complete_stage(stage).await?;

        Ok(StageReport {
            stage,
            policy,
            comparison,
            actions_executed,
            hint_count: context.hints.len(),
        })
    }

    /// Extracted schema for the current stage, served from the context
    /// cache when DDL has not invalidated it.
    async fn current_schema(
        &self,
        context: &mut UpgradeContext,
        pending_extraction: &mut Option<Deferred<StorageModel>>,
        cancel: &CancellationToken,
    ) -> Result<Arc<StorageModel>> {
        if let Some(model) = &context.extracted_model {
            debug!("Reusing cached extracted schema");
            return Ok(model.clone());
        }

        let mut model = match pending_extraction.take() {
            Some(deferred) => deferred.wait().await?,
            None => self.extractor.extract(cancel).await?,
        };
        SchemaPruner::new(&context.config).apply(&mut model);
        debug!("Extracted schema covers {} tables", model.table_count());

        let model = Arc::new(model);
        context.extracted_model = Some(model.clone());
        Ok(model)
    }

    /// Write the metadata record set for the stage's domain model.
    async fn persist_metadata(
        &self,
        context: &mut UpgradeContext,
        domain: &DomainModel,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut metadata = context.stored_metadata.clone().unwrap_or_default();
        for package in self.registry.packages() {
            metadata.record_package(&package.name, package.version.clone());
        }
        let names: Vec<String> = domain.types.iter().map(|t| t.full_name()).collect();
        metadata.assign_type_ids(names.iter().map(|s| s.as_str()));
        metadata.set_snapshot(domain.snapshot_json()?);

        debug!(
            "Persisting metadata: {} packages, {} type ids",
            metadata.packages.len(),
            metadata.type_ids.len()
        );
        self.metadata.write(&metadata, cancel).await?;
        context.stored_metadata = Some(metadata);
        Ok(())
    }

    async fn register_node(&self, name: &str, extracted: &StorageModel) {
        let node = StorageNode {
            name: name.to_string(),
            catalogs: extracted.catalogs.keys().cloned().collect(),
            registered_at: Utc::now(),
        };
        debug!("Registered storage node '{}'", node.name);
        self.nodes.lock().await.insert(node.name.clone(), node);
    }
}
