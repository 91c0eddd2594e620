//! Handler registration, ordering and callback dispatch.

use super::{DefaultUpgradeHandler, PackageInfo, UpgradeHandler};
use crate::actions::ActionSequence;
use crate::context::UpgradeContext;
use crate::error::{Result, UpgradeError};
use crate::metadata::MetadataSet;
use crate::model::domain::DomainModel;
use crate::model::hints::UpgradeHint;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use tracing::debug;

struct RegisteredHandler {
    package: PackageInfo,
    handler: Box<dyn UpgradeHandler>,
}

/// All upgrade handlers of a run, in dependency order.
///
/// Built once per run from the registered packages and their handlers.
/// Every callback fans out over the handlers in topological order of the
/// package-dependency graph, so a handler never runs before the handlers
/// of the packages it depends on.
pub struct ExtensionRegistry {
    handlers: Vec<RegisteredHandler>,
}

impl ExtensionRegistry {
    /// Pair packages with their handlers and fix the dispatch order.
    ///
    /// Disabled handlers are dropped. Packages without an enabled handler
    /// get a synthesized no-op one. Rejected with a configuration error:
    /// more than one enabled handler per package, handlers targeting
    /// unregistered packages, duplicate package registrations, unknown
    /// dependencies and dependency cycles.
    pub fn build(
        packages: Vec<PackageInfo>,
        handlers: Vec<Box<dyn UpgradeHandler>>,
    ) -> Result<Self> {
        let mut by_package: HashMap<String, Box<dyn UpgradeHandler>> = HashMap::new();
        for handler in handlers {
            if !handler.enabled() {
                debug!(
                    "Skipping disabled upgrade handler '{}' for package '{}'",
                    handler.name(),
                    handler.package()
                );
                continue;
            }
            let package = handler.package().to_string();
            if !packages.iter().any(|p| p.name == package) {
                return Err(UpgradeError::Config(format!(
                    "upgrade handler '{}' targets unregistered package '{}'",
                    handler.name(),
                    package
                )));
            }
            if by_package.insert(package.clone(), handler).is_some() {
                return Err(UpgradeError::Config(format!(
                    "package '{}' has more than one enabled upgrade handler",
                    package
                )));
            }
        }

        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        for package in &packages {
            let node = graph.add_node(package.name.clone());
            if nodes.insert(package.name.clone(), node).is_some() {
                return Err(UpgradeError::Config(format!(
                    "package '{}' is registered more than once",
                    package.name
                )));
            }
        }
        for package in &packages {
            for dependency in &package.dependencies {
                let Some(&from) = nodes.get(dependency.as_str()) else {
                    return Err(UpgradeError::Config(format!(
                        "package '{}' depends on unknown package '{}'",
                        package.name, dependency
                    )));
                };
                graph.add_edge(from, nodes[&package.name], ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            UpgradeError::Config(format!(
                "dependency cycle among packages involving '{}'",
                graph[cycle.node_id()]
            ))
        })?;

        let mut package_map: HashMap<String, PackageInfo> = packages
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        let mut registered = Vec::with_capacity(package_map.len());
        for node in order {
            let name = &graph[node];
            let package = package_map
                .remove(name)
                .expect("every graph node corresponds to a registered package");
            let handler = by_package
                .remove(name)
                .unwrap_or_else(|| Box::new(DefaultUpgradeHandler::new(name)));
            registered.push(RegisteredHandler { package, handler });
        }

        Ok(ExtensionRegistry {
            handlers: registered,
        })
    }

    /// Package names in dispatch order.
    pub fn handler_order(&self) -> Vec<String> {
        self.handlers
            .iter()
            .map(|rh| rh.package.name.clone())
            .collect()
    }

    /// Registered packages in dispatch order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageInfo> {
        self.handlers.iter().map(|rh| &rh.package)
    }

    /// Number of registered packages.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether no packages are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Check every handler against the stored package versions.
    ///
    /// The first refusal aborts with the package, handler and both
    /// versions identified.
    pub fn check_stored_versions(&self, stored: Option<&MetadataSet>) -> Result<()> {
        for rh in &self.handlers {
            let stored_version = stored.and_then(|m| m.package_version(&rh.package.name));
            if !rh.handler.can_upgrade_from(stored_version, &rh.package.version) {
                return Err(UpgradeError::IncompatibleVersion {
                    package: rh.package.name.clone(),
                    handler: rh.handler.name().to_string(),
                    stored: stored_version
                        .map(|v| v.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    current: rh.package.version.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Run `on_prepare` on every handler.
    pub fn on_prepare(&self, context: &mut UpgradeContext) -> Result<()> {
        for rh in &self.handlers {
            guard(rh.handler.as_ref(), rh.handler.on_prepare(context))?;
        }
        Ok(())
    }

    /// Run `on_before_stage` on every handler. During the upgrading
    /// stage this also adds the rename hints derived from recycled types.
    pub fn on_before_stage(&self, context: &mut UpgradeContext) -> Result<()> {
        for rh in &self.handlers {
            guard(rh.handler.as_ref(), rh.handler.on_before_stage(context))?;
        }
        if context.is_upgrading() {
            if let Some(domain) = context.domain_model.clone() {
                let derived = derive_recycled_hints(&domain);
                if !derived.is_empty() {
                    debug!("Derived {} rename hints from recycled types", derived.len());
                    context.hints.extend(derived);
                }
            }
        }
        Ok(())
    }

    /// Run `on_schema_ready` on every handler.
    pub fn on_schema_ready(&self, context: &mut UpgradeContext) -> Result<()> {
        for rh in &self.handlers {
            guard(rh.handler.as_ref(), rh.handler.on_schema_ready(context))?;
        }
        Ok(())
    }

    /// Run `on_before_execute_actions` on every handler.
    pub fn on_before_execute_actions(
        &self,
        context: &mut UpgradeContext,
        actions: &ActionSequence,
    ) -> Result<()> {
        for rh in &self.handlers {
            guard(
                rh.handler.as_ref(),
                rh.handler.on_before_execute_actions(context, actions),
            )?;
        }
        Ok(())
    }

    /// Run `on_stage` on every handler; during the upgrading stage each
    /// handler's `on_upgrade` follows its `on_stage`.
    pub fn on_stage(&self, context: &mut UpgradeContext) -> Result<()> {
        for rh in &self.handlers {
            guard(rh.handler.as_ref(), rh.handler.on_stage(context))?;
            if context.is_upgrading() {
                guard(rh.handler.as_ref(), rh.handler.on_upgrade(context))?;
            }
        }
        Ok(())
    }

    /// Run `on_complete` on every handler.
    pub fn on_complete(&self, context: &mut UpgradeContext) -> Result<()> {
        for rh in &self.handlers {
            guard(rh.handler.as_ref(), rh.handler.on_complete(context))?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("handlers", &self.handler_order())
            .finish()
    }
}

/// Attribute a hook failure to the handler that raised it.
fn guard(handler: &dyn UpgradeHandler, result: Result<()>) -> Result<()> {
    result.map_err(|e| match e {
        already @ UpgradeError::Hook { .. } => already,
        other => UpgradeError::hook(handler.name(), other.to_string()),
    })
}

/// Rename hints implied by the recycled naming convention.
///
/// Every recycled type whose original full name is recoverable yields a
/// type rename; its recycled fields yield field renames.
pub fn derive_recycled_hints(domain: &DomainModel) -> Vec<UpgradeHint> {
    let mut hints = Vec::new();
    for ty in domain.recycled_types() {
        let full_name = ty.full_name();
        if let Some(original) = ty.original_full_name() {
            if original != full_name {
                hints.push(UpgradeHint::RenameType {
                    old: original,
                    new: full_name.clone(),
                });
            }
        }
        for field in &ty.recycled_fields {
            hints.push(UpgradeHint::RenameField {
                type_name: full_name.clone(),
                old: field.original_name.clone(),
                new: field.name.clone(),
            });
        }
    }
    hints
}
