//! Extension packages and their upgrade handlers.
//!
//! Every registered package gets exactly one handler. Handlers observe
//! the run through a fixed callback protocol (`on_prepare`, per-stage
//! callbacks, `on_complete`), contribute hints during the upgrading
//! stage and gate upgrades from incompatible stored versions. Packages
//! without a handler of their own get a synthesized no-op one.

mod registry;

pub use registry::{derive_recycled_hints, ExtensionRegistry};

use crate::actions::ActionSequence;
use crate::context::UpgradeContext;
use crate::error::Result;
use semver::Version;

/// One registered extension package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Package name. Unique among registered packages.
    pub name: String,

    /// Current version of the package.
    pub version: Version,

    /// Names of packages this one depends on. Handlers of dependencies
    /// always run first.
    pub dependencies: Vec<String>,
}

impl PackageInfo {
    /// Package with no dependencies.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        PackageInfo {
            name: name.into(),
            version,
            dependencies: Vec::new(),
        }
    }

    /// Add a dependency on another package.
    pub fn with_dependency(mut self, package: impl Into<String>) -> Self {
        self.dependencies.push(package.into());
        self
    }
}

/// Upgrade hooks for one package.
///
/// All methods except [`package`](UpgradeHandler::package) have
/// defaults, so a handler overrides only what it needs. Any error
/// returned from a callback aborts the whole run.
pub trait UpgradeHandler: Send + Sync {
    /// Name of the package this handler upgrades.
    fn package(&self) -> &str;

    /// Identifying name used in diagnostics.
    fn name(&self) -> &str {
        self.package()
    }

    /// Whether the handler participates in runs. Disabled handlers are
    /// ignored at registration time.
    fn enabled(&self) -> bool {
        true
    }

    /// Whether this handler can upgrade from the given stored version.
    ///
    /// `stored` is `None` when the storage has never been built. The
    /// default accepts a fresh storage or an unchanged version; anything
    /// else needs an explicit override.
    fn can_upgrade_from(&self, stored: Option<&Version>, current: &Version) -> bool {
        match stored {
            None => true,
            Some(stored) => stored == current,
        }
    }

    /// Called once before any stage runs.
    fn on_prepare(&self, _context: &mut UpgradeContext) -> Result<()> {
        Ok(())
    }

    /// Called at the start of every stage. During the upgrading stage
    /// handlers typically add hints to `context.hints` here.
    fn on_before_stage(&self, _context: &mut UpgradeContext) -> Result<()> {
        Ok(())
    }

    /// Called after both the extracted and target schemas are resolved,
    /// before any action is applied.
    fn on_schema_ready(&self, _context: &mut UpgradeContext) -> Result<()> {
        Ok(())
    }

    /// Called immediately before an action sequence is handed to the
    /// DDL executor.
    fn on_before_execute_actions(
        &self,
        _context: &mut UpgradeContext,
        _actions: &ActionSequence,
    ) -> Result<()> {
        Ok(())
    }

    /// Called at the end of every stage, after schema reconciliation.
    fn on_stage(&self, _context: &mut UpgradeContext) -> Result<()> {
        Ok(())
    }

    /// Data-migration hook, invoked during the upgrading stage right
    /// after [`on_stage`](UpgradeHandler::on_stage).
    fn on_upgrade(&self, _context: &mut UpgradeContext) -> Result<()> {
        Ok(())
    }

    /// Called once after all stages completed.
    fn on_complete(&self, _context: &mut UpgradeContext) -> Result<()> {
        Ok(())
    }
}

/// No-op handler synthesized for packages without one of their own.
pub struct DefaultUpgradeHandler {
    package: String,
}

impl DefaultUpgradeHandler {
    /// Default handler for the given package.
    pub fn new(package: impl Into<String>) -> Self {
        DefaultUpgradeHandler {
            package: package.into(),
        }
    }
}

impl UpgradeHandler for DefaultUpgradeHandler {
    fn package(&self) -> &str {
        &self.package
    }

    fn name(&self) -> &str {
        "default"
    }
}
