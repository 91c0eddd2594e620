//! End-to-end upgrade flow tests.
//!
//! These tests drive the orchestrator against in-memory collaborators
//! and verify stage ordering, policy behavior, transaction boundaries,
//! cancellation and metadata persistence.

use async_trait::async_trait;
use schema_upgrade::{
    ActionPart, ActionSequence, Catalog, Collaborators, DdlExecutor, Differencer, DomainBuilder,
    DomainModel, ExtensionRegistry, HintSet, MetadataSet, MetadataStore, ModelConverter,
    PackageInfo, PersistentType, ReconciliationPolicy, Result, SchemaComparisonResult,
    SchemaComparisonStatus, SchemaDifference, SchemaExtractor, StorageModel, UpgradeAction,
    UpgradeConfiguration, UpgradeContext, UpgradeError, UpgradeHandler, UpgradeMode,
    UpgradeOrchestrator, UpgradeStage,
};
use semver::Version;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

type EventLog = Arc<Mutex<Vec<String>>>;

fn push_event(events: &EventLog, event: impl Into<String>) {
    events.lock().unwrap().push(event.into());
}

fn recorded(events: &EventLog) -> Vec<String> {
    events.lock().unwrap().clone()
}

fn position(events: &[String], needle: &str) -> usize {
    events
        .iter()
        .position(|e| e == needle)
        .unwrap_or_else(|| panic!("event '{}' not recorded in {:?}", needle, events))
}

// =============================================================================
// In-memory collaborators
// =============================================================================

struct FakeExtractor {
    model: StorageModel,
    events: EventLog,
}

#[async_trait]
impl SchemaExtractor for FakeExtractor {
    async fn extract(&self, _cancel: &CancellationToken) -> Result<StorageModel> {
        push_event(&self.events, "extract");
        Ok(self.model.clone())
    }
}

struct FakeBuilder {
    upgrading: DomainModel,
    final_model: DomainModel,
    events: EventLog,
    signal_final_build: Option<Arc<Notify>>,
}

impl DomainBuilder for FakeBuilder {
    fn build(&self, stage: UpgradeStage) -> Result<DomainModel> {
        push_event(&self.events, format!("build {}", stage));
        Ok(match stage {
            UpgradeStage::Upgrading => self.upgrading.clone(),
            UpgradeStage::Final => {
                if let Some(signal) = &self.signal_final_build {
                    signal.notify_one();
                }
                self.final_model.clone()
            }
        })
    }
}

struct FakeConverter;

impl ModelConverter for FakeConverter {
    fn convert(&self, _domain: &DomainModel, _hints: &HintSet) -> Result<StorageModel> {
        Ok(StorageModel::new())
    }
}

/// Replays a scripted list of comparison results, one per `compare` call.
struct ScriptedDifferencer {
    results: Mutex<VecDeque<SchemaComparisonResult>>,
    events: EventLog,
}

impl Differencer for ScriptedDifferencer {
    fn compare(
        &self,
        _extracted: &StorageModel,
        _target: &StorageModel,
        hints: &HintSet,
        policy: ReconciliationPolicy,
        _domain: &DomainModel,
        _cancel: &CancellationToken,
    ) -> Result<SchemaComparisonResult> {
        push_event(&self.events, format!("compare {} hints={}", policy, hints.len()));
        Ok(self
            .results
            .lock()
            .unwrap()
            .pop_front()
            .expect("comparison requested but none scripted"))
    }
}

struct RecordingExecutor {
    events: EventLog,
    fail_on: Option<ActionPart>,
    cancel_on_execute: Option<CancellationToken>,
    hold_upgrading_until: Option<Arc<Notify>>,
}

#[async_trait]
impl DdlExecutor for RecordingExecutor {
    async fn begin_stage(&self, stage: UpgradeStage) -> Result<()> {
        if stage == UpgradeStage::Upgrading {
            if let Some(gate) = &self.hold_upgrading_until {
                gate.notified().await;
            }
        }
        push_event(&self.events, format!("begin_stage {}", stage));
        Ok(())
    }

    async fn execute(
        &self,
        part: ActionPart,
        actions: &[UpgradeAction],
        _cancel: &CancellationToken,
    ) -> Result<()> {
        if self.fail_on == Some(part) {
            return Err(UpgradeError::ddl(part.to_string(), "injected failure"));
        }
        push_event(&self.events, format!("execute {} ({})", part, actions.len()));
        if let Some(token) = &self.cancel_on_execute {
            token.cancel();
        }
        Ok(())
    }

    async fn execute_non_transactional(
        &self,
        part: ActionPart,
        actions: &[UpgradeAction],
        _cancel: &CancellationToken,
    ) -> Result<()> {
        push_event(
            &self.events,
            format!("execute_non_transactional {} ({})", part, actions.len()),
        );
        Ok(())
    }

    async fn complete_stage(&self, stage: UpgradeStage) -> Result<()> {
        push_event(&self.events, format!("complete_stage {}", stage));
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        push_event(&self.events, "commit");
        Ok(())
    }
}

struct InMemoryMetadataStore {
    stored: Mutex<Option<MetadataSet>>,
    events: EventLog,
}

impl InMemoryMetadataStore {
    fn current(&self) -> Option<MetadataSet> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn read(&self, _cancel: &CancellationToken) -> Result<Option<MetadataSet>> {
        push_event(&self.events, "metadata_read");
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn write(&self, metadata: &MetadataSet, _cancel: &CancellationToken) -> Result<()> {
        push_event(&self.events, "metadata_write");
        *self.stored.lock().unwrap() = Some(metadata.clone());
        Ok(())
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    mode: UpgradeMode,
    build_in_parallel: bool,
    results: VecDeque<SchemaComparisonResult>,
    stored: Option<MetadataSet>,
    packages: Vec<PackageInfo>,
    handlers: Vec<Box<dyn UpgradeHandler>>,
    upgrading_domain: DomainModel,
    final_domain: DomainModel,
    fail_on: Option<ActionPart>,
    cancel_on_execute: Option<CancellationToken>,
    build_rendezvous: Option<Arc<Notify>>,
}

impl Harness {
    fn new(mode: UpgradeMode) -> Self {
        Harness {
            mode,
            build_in_parallel: false,
            results: VecDeque::new(),
            stored: None,
            packages: vec![PackageInfo::new("app", Version::new(2, 0, 0))],
            handlers: Vec::new(),
            upgrading_domain: DomainModel::new(),
            final_domain: DomainModel::new(),
            fail_on: None,
            cancel_on_execute: None,
            build_rendezvous: None,
        }
    }

    fn scripted(mut self, result: SchemaComparisonResult) -> Self {
        self.results.push_back(result);
        self
    }

    fn with_stored(mut self, metadata: MetadataSet) -> Self {
        self.stored = Some(metadata);
        self
    }

    fn with_handler(mut self, handler: Box<dyn UpgradeHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    fn with_upgrading_domain(mut self, domain: DomainModel) -> Self {
        self.upgrading_domain = domain;
        self
    }

    fn with_final_domain(mut self, domain: DomainModel) -> Self {
        self.final_domain = domain;
        self
    }

    fn failing_on(mut self, part: ActionPart) -> Self {
        self.fail_on = Some(part);
        self
    }

    fn cancelling_on_execute(mut self, token: CancellationToken) -> Self {
        self.cancel_on_execute = Some(token);
        self
    }

    fn in_parallel(mut self) -> Self {
        self.build_in_parallel = true;
        self
    }

    /// Hold the upgrading stage's transaction scope open until the
    /// final-stage model build has started.
    fn holding_upgrading_for_final_build(mut self) -> Self {
        self.build_rendezvous = Some(Arc::new(Notify::new()));
        self
    }

    fn start(self) -> (UpgradeOrchestrator, EventLog, Arc<InMemoryMetadataStore>) {
        let events = EventLog::default();
        let config = UpgradeConfiguration {
            mode: self.mode,
            build_in_parallel: self.build_in_parallel,
            ..UpgradeConfiguration::default()
        };
        let store = Arc::new(InMemoryMetadataStore {
            stored: Mutex::new(self.stored),
            events: events.clone(),
        });
        let collaborators = Collaborators {
            extractor: Arc::new(FakeExtractor {
                model: StorageModel::single(Catalog::new("main", "dbo")),
                events: events.clone(),
            }),
            builder: Arc::new(FakeBuilder {
                upgrading: self.upgrading_domain,
                final_model: self.final_domain,
                events: events.clone(),
                signal_final_build: self.build_rendezvous.clone(),
            }),
            converter: Arc::new(FakeConverter),
            differencer: Arc::new(ScriptedDifferencer {
                results: Mutex::new(self.results),
                events: events.clone(),
            }),
            executor: Arc::new(RecordingExecutor {
                events: events.clone(),
                fail_on: self.fail_on,
                cancel_on_execute: self.cancel_on_execute,
                hold_upgrading_until: self.build_rendezvous,
            }),
            metadata: store.clone(),
        };
        let registry = ExtensionRegistry::build(self.packages, self.handlers).unwrap();
        let orchestrator = UpgradeOrchestrator::new(config, registry, collaborators).unwrap();
        (orchestrator, events, store)
    }
}

fn actions_result(parts: &[(ActionPart, &str)]) -> SchemaComparisonResult {
    let mut seq = ActionSequence::new();
    for (part, text) in parts {
        seq.push(*part, *text);
    }
    SchemaComparisonResult::new(SchemaComparisonStatus::TargetIsSuperset).with_actions(seq)
}

// =============================================================================
// Run flow
// =============================================================================

#[tokio::test]
async fn test_validate_mode_runs_single_final_stage() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Validate)
        .scripted(SchemaComparisonResult::equal())
        .start();

    let report = orchestrator.build_async(None).await.unwrap();

    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].stage, UpgradeStage::Final);
    assert_eq!(report.stages[0].policy, ReconciliationPolicy::ValidateExact);
    assert_eq!(report.stages[0].comparison, Some(SchemaComparisonStatus::Equal));
    assert_eq!(report.total_actions(), 0);

    let events = recorded(&events);
    assert!(position(&events, "begin_stage final") < position(&events, "commit"));
    // Validation never persists metadata.
    assert!(!events.iter().any(|e| e == "metadata_write"));
}

#[tokio::test]
async fn test_perform_mode_runs_upgrading_then_final() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(actions_result(&[
            (ActionPart::Upgrade, "alter table dbo.Orders add column Total"),
            (ActionPart::Upgrade, "create table dbo.Invoices (Id int)"),
        ]))
        .scripted(SchemaComparisonResult::equal())
        .start();

    let report = orchestrator.build_async(None).await.unwrap();

    assert_eq!(report.stages.len(), 2);
    assert_eq!(report.stages[0].stage, UpgradeStage::Upgrading);
    assert_eq!(report.stages[1].stage, UpgradeStage::Final);
    assert_eq!(report.total_actions(), 2);

    let events = recorded(&events);
    let begin_upgrading = position(&events, "begin_stage upgrading");
    let execute = position(&events, "execute upgrade (2)");
    let complete_upgrading = position(&events, "complete_stage upgrading");
    let begin_final = position(&events, "begin_stage final");
    let complete_final = position(&events, "complete_stage final");
    let commit = position(&events, "commit");
    assert!(begin_upgrading < execute);
    assert!(execute < complete_upgrading);
    assert!(complete_upgrading < begin_final);
    assert!(begin_final < complete_final);
    assert!(complete_final < commit);

    // DDL invalidated the cached schema, so the final stage re-extracts.
    assert_eq!(events.iter().filter(|e| *e == "extract").count(), 2);
    // The whole run commits exactly once, at the very end.
    assert_eq!(events.iter().filter(|e| *e == "commit").count(), 1);
    assert_eq!(events.last().unwrap(), "commit");
    assert_eq!(events.iter().filter(|e| *e == "metadata_write").count(), 2);
}

#[tokio::test]
async fn test_skip_mode_trusts_storage_without_comparing() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Skip).start();

    let report = orchestrator.build_async(None).await.unwrap();

    assert_eq!(report.stages.len(), 1);
    assert_eq!(report.stages[0].policy, ReconciliationPolicy::Skip);
    assert_eq!(report.stages[0].comparison, None);

    let events = recorded(&events);
    assert!(!events.iter().any(|e| e.starts_with("compare")));
    // The schema is still extracted; only the comparison is skipped.
    assert_eq!(events.iter().filter(|e| *e == "extract").count(), 1);
    assert_eq!(events.iter().filter(|e| *e == "commit").count(), 1);
}

#[tokio::test]
async fn test_background_extraction_feeds_first_stage() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Validate)
        .scripted(SchemaComparisonResult::equal())
        .in_parallel()
        .start();

    orchestrator.build_async(None).await.unwrap();

    let events = recorded(&events);
    assert_eq!(events.iter().filter(|e| *e == "extract").count(), 1);
    assert_eq!(events.iter().filter(|e| *e == "commit").count(), 1);
}

#[tokio::test]
async fn test_parallel_final_build_overlaps_upgrading_stage() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(actions_result(&[(
            ActionPart::Upgrade,
            "alter table dbo.Orders add column Total",
        )]))
        .scripted(SchemaComparisonResult::equal())
        .in_parallel()
        .holding_upgrading_for_final_build()
        .start();

    // The upgrading stage cannot open until the final-stage build has
    // started, so a run that defers the build past the stage would hang
    // here instead of finishing.
    let report = tokio::time::timeout(Duration::from_secs(5), orchestrator.build_async(None))
        .await
        .expect("final-stage model build never started during the upgrading stage")
        .unwrap();

    assert_eq!(report.stages.len(), 2);
    assert_eq!(report.total_actions(), 1);
    let events = recorded(&events);
    assert!(position(&events, "build final") < position(&events, "begin_stage upgrading"));
}

#[tokio::test]
async fn test_sequential_final_build_waits_for_upgrading_stage() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(actions_result(&[(
            ActionPart::Upgrade,
            "alter table dbo.Orders add column Total",
        )]))
        .scripted(SchemaComparisonResult::equal())
        .start();

    orchestrator.build_async(None).await.unwrap();

    // Without the parallel flag the build is claimed lazily, after the
    // upgrading stage has fully completed.
    let events = recorded(&events);
    assert!(position(&events, "complete_stage upgrading") < position(&events, "build final"));
    assert!(position(&events, "build final") < position(&events, "begin_stage final"));
}

#[tokio::test]
async fn test_extracted_schema_cached_across_stages_without_ddl() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(SchemaComparisonResult::equal())
        .scripted(SchemaComparisonResult::equal())
        .start();

    let report = orchestrator.build_async(None).await.unwrap();

    assert_eq!(report.total_actions(), 0);
    let events = recorded(&events);
    // Nothing executed, so the final stage reuses the extracted schema.
    assert_eq!(events.iter().filter(|e| *e == "extract").count(), 1);
    assert!(!events.iter().any(|e| e.starts_with("execute ")));
}

// =============================================================================
// Policy behavior
// =============================================================================

#[tokio::test]
async fn test_validate_exact_rejects_type_changes() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Validate)
        .scripted(
            SchemaComparisonResult::new(SchemaComparisonStatus::NotEqual)
                .with_column_type_changes()
                .with_difference(SchemaDifference::new(
                    "column dbo.Orders.Total",
                    "type changed Decimal(20,2) -> Decimal(18,2)",
                )),
        )
        .start();

    let err = orchestrator.build_async(None).await.unwrap_err();

    assert!(err.to_string().contains("NotEqual"));
    let result = match err {
        UpgradeError::Synchronization(result) => result,
        other => panic!("unexpected error: {:?}", other),
    };
    assert!(result.has_column_type_changes);
    assert!(result.to_string().contains("Decimal(20,2) -> Decimal(18,2)"));

    let events = recorded(&events);
    assert!(!events.iter().any(|e| e.starts_with("execute")));
    assert!(!events.iter().any(|e| e == "commit"));
}

#[tokio::test]
async fn test_perform_safely_stops_before_unsafe_ddl() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::PerformSafely)
        .scripted(
            actions_result(&[
                (ActionPart::Upgrade, "alter table dbo.Orders add column Total"),
                (ActionPart::Cleanup, "drop table dbo.Legacy"),
            ])
            .with_unsafe_actions(vec!["drop table dbo.Legacy".into()]),
        )
        .start();

    let err = orchestrator.build_async(None).await.unwrap_err();

    assert!(matches!(err, UpgradeError::Synchronization(_)));
    assert!(err.to_string().contains("unsafe actions: yes"));
    let events = recorded(&events);
    // The refusal happens before any action reaches the executor.
    assert!(!events.iter().any(|e| e.starts_with("execute")));
    assert!(!events.iter().any(|e| e == "commit"));
}

#[tokio::test]
async fn test_perform_safely_executes_safe_actions() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::PerformSafely)
        .scripted(actions_result(&[(
            ActionPart::Upgrade,
            "alter table dbo.Orders add column Total",
        )]))
        .scripted(SchemaComparisonResult::equal())
        .start();

    let report = orchestrator.build_async(None).await.unwrap();

    assert_eq!(report.total_actions(), 1);
    let events = recorded(&events);
    assert!(events.iter().any(|e| e == "execute upgrade (1)"));
    assert_eq!(events.last().unwrap(), "commit");
}

// =============================================================================
// Cancellation and transaction boundaries
// =============================================================================

#[tokio::test]
async fn test_pre_cancelled_run_never_begins_a_stage() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform).start();

    let token = CancellationToken::new();
    token.cancel();
    let err = orchestrator.build_async(Some(token)).await.unwrap_err();

    assert!(matches!(err, UpgradeError::Cancelled));
    let events = recorded(&events);
    assert!(!events.iter().any(|e| e.starts_with("begin_stage")));
    assert!(!events.iter().any(|e| e == "commit"));
}

#[tokio::test]
async fn test_cancellation_between_batches_prevents_commit() {
    let token = CancellationToken::new();
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(actions_result(&[
            (ActionPart::Upgrade, "alter table dbo.Orders add column Total"),
            (ActionPart::Cleanup, "drop table dbo.Legacy"),
        ]))
        .cancelling_on_execute(token.clone())
        .start();

    let err = orchestrator.build_async(Some(token)).await.unwrap_err();

    assert!(matches!(err, UpgradeError::Cancelled));
    let events = recorded(&events);
    assert!(events.iter().any(|e| e == "execute upgrade (1)"));
    assert!(!events.iter().any(|e| e == "execute cleanup (1)"));
    assert!(!events.iter().any(|e| e == "commit"));
}

#[tokio::test]
async fn test_ddl_failure_aborts_without_commit() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(actions_result(&[(
            ActionPart::Upgrade,
            "alter table dbo.Orders add column Total",
        )]))
        .failing_on(ActionPart::Upgrade)
        .start();

    let err = orchestrator.build_async(None).await.unwrap_err();

    assert!(matches!(err, UpgradeError::Ddl { .. }));
    assert!(err.to_string().contains("injected failure"));
    let events = recorded(&events);
    assert!(!events.iter().any(|e| e == "commit"));
}

// =============================================================================
// Metadata persistence
// =============================================================================

#[tokio::test]
async fn test_version_gate_blocks_incompatible_stored_version() {
    let mut stored = MetadataSet::new();
    stored.record_package("app", Version::new(1, 0, 0));
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .with_stored(stored)
        .start();

    let err = orchestrator.build_async(None).await.unwrap_err();

    match err {
        UpgradeError::IncompatibleVersion {
            package,
            stored,
            current,
            ..
        } => {
            assert_eq!(package, "app");
            assert_eq!(stored, "1.0.0");
            assert_eq!(current, "2.0.0");
        }
        other => panic!("unexpected error: {:?}", other),
    }
    let events = recorded(&events);
    assert!(!events.iter().any(|e| e.starts_with("begin_stage")));
}

#[tokio::test]
async fn test_metadata_recorded_after_upgrade() {
    let mut domain = DomainModel::new();
    domain.types.push(PersistentType::new("App", "Order", "app"));
    domain.types.push(PersistentType::new("App", "Customer", "app"));

    let (orchestrator, _events, store) = Harness::new(UpgradeMode::Perform)
        .scripted(SchemaComparisonResult::equal())
        .scripted(SchemaComparisonResult::equal())
        .with_final_domain(domain)
        .start();

    orchestrator.build_async(None).await.unwrap();

    let metadata = store.current().expect("metadata written");
    assert_eq!(metadata.package_version("app"), Some(&Version::new(2, 0, 0)));
    assert!(metadata.type_ids.contains_key("App.Order"));
    assert!(metadata.type_ids.contains_key("App.Customer"));
    assert!(metadata.model_snapshot.is_some());
    assert!(metadata.updated_at.is_some());
}

// =============================================================================
// Hook protocol
// =============================================================================

struct RecordingHandler {
    package: String,
    events: EventLog,
}

fn stage_name(context: &UpgradeContext) -> String {
    context
        .stage
        .map(|s| s.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl UpgradeHandler for RecordingHandler {
    fn package(&self) -> &str {
        &self.package
    }

    fn on_prepare(&self, _context: &mut UpgradeContext) -> Result<()> {
        push_event(&self.events, "hook:prepare");
        Ok(())
    }

    fn on_before_stage(&self, context: &mut UpgradeContext) -> Result<()> {
        push_event(&self.events, format!("hook:before_stage {}", stage_name(context)));
        Ok(())
    }

    fn on_schema_ready(&self, context: &mut UpgradeContext) -> Result<()> {
        push_event(&self.events, format!("hook:schema_ready {}", stage_name(context)));
        Ok(())
    }

    fn on_before_execute_actions(
        &self,
        _context: &mut UpgradeContext,
        actions: &ActionSequence,
    ) -> Result<()> {
        push_event(&self.events, format!("hook:before_execute {}", actions.count()));
        Ok(())
    }

    fn on_stage(&self, context: &mut UpgradeContext) -> Result<()> {
        push_event(&self.events, format!("hook:stage {}", stage_name(context)));
        Ok(())
    }

    fn on_upgrade(&self, _context: &mut UpgradeContext) -> Result<()> {
        push_event(&self.events, "hook:upgrade");
        Ok(())
    }

    fn on_complete(&self, _context: &mut UpgradeContext) -> Result<()> {
        push_event(&self.events, "hook:complete");
        Ok(())
    }
}

#[tokio::test]
async fn test_hook_callbacks_follow_protocol_order() {
    let events = EventLog::default();
    let handler = RecordingHandler {
        package: "app".to_string(),
        events: events.clone(),
    };
    let (orchestrator, _run_events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(actions_result(&[(
            ActionPart::Upgrade,
            "alter table dbo.Orders add column Total",
        )]))
        .scripted(SchemaComparisonResult::equal())
        .with_handler(Box::new(handler))
        .start();

    orchestrator.build_async(None).await.unwrap();

    let hook_events: Vec<String> = recorded(&events)
        .into_iter()
        .filter(|e| e.starts_with("hook:"))
        .collect();
    assert_eq!(
        hook_events,
        vec![
            "hook:prepare",
            "hook:before_stage upgrading",
            "hook:schema_ready upgrading",
            "hook:before_execute 1",
            "hook:stage upgrading",
            "hook:upgrade",
            "hook:before_stage final",
            "hook:schema_ready final",
            "hook:stage final",
            "hook:complete",
        ]
    );
}

#[tokio::test]
async fn test_recycled_types_contribute_rename_hints() {
    let mut upgrading = DomainModel::new();
    upgrading.types.push(
        PersistentType::new("App.Model.Recycled", "LegacyOrder", "app")
            .recycled()
            .with_original_name("Order"),
    );

    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Perform)
        .scripted(SchemaComparisonResult::equal())
        .scripted(SchemaComparisonResult::equal())
        .with_upgrading_domain(upgrading)
        .start();

    orchestrator.build_async(None).await.unwrap();

    let events = recorded(&events);
    let upgrading_compare = format!("compare {} hints=1", ReconciliationPolicy::Perform);
    let final_compare = format!("compare {} hints=0", ReconciliationPolicy::Perform);
    // The derived rename hint is present while upgrading and gone after
    // the stage boundary reset.
    assert!(position(&events, &upgrading_compare) < position(&events, &final_compare));
}

// =============================================================================
// Node attachment
// =============================================================================

#[tokio::test]
async fn test_attach_node_accepts_compatible_schema() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Validate)
        .scripted(SchemaComparisonResult::new(SchemaComparisonStatus::TargetIsSubset))
        .start();

    let node_config = UpgradeConfiguration {
        node_name: "reporting".to_string(),
        ..UpgradeConfiguration::default()
    };
    let extractor = Arc::new(FakeExtractor {
        model: StorageModel::single(Catalog::new("reports", "public")),
        events: events.clone(),
    });

    orchestrator
        .attach_node(node_config.clone(), extractor.clone(), None)
        .await
        .unwrap();

    let nodes = orchestrator.nodes().await;
    assert!(nodes
        .iter()
        .any(|n| n.name == "reporting" && n.catalogs == vec!["reports".to_string()]));

    // A second node with the same name is refused before any extraction.
    let err = orchestrator
        .attach_node(node_config, extractor, None)
        .await
        .unwrap_err();
    assert!(matches!(err, UpgradeError::Config(_)));
    assert!(err.to_string().contains("already attached"));
}

#[tokio::test]
async fn test_attach_node_rejects_incompatible_schema() {
    let (orchestrator, events, _store) = Harness::new(UpgradeMode::Validate)
        .scripted(SchemaComparisonResult::new(SchemaComparisonStatus::NotEqual))
        .start();

    let node_config = UpgradeConfiguration {
        node_name: "reporting".to_string(),
        ..UpgradeConfiguration::default()
    };
    let extractor = Arc::new(FakeExtractor {
        model: StorageModel::single(Catalog::new("reports", "public")),
        events: events.clone(),
    });

    let err = orchestrator
        .attach_node(node_config, extractor, None)
        .await
        .unwrap_err();

    assert!(matches!(err, UpgradeError::Synchronization(_)));
    assert!(orchestrator.nodes().await.is_empty());
}
