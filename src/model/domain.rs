//! Domain-model snapshot consumed by the engine.
//!
//! The engine never builds this itself; a [`crate::model::traits::DomainBuilder`]
//! collaborator produces one per stage. Only the parts the engine needs are
//! modeled: type identity, package ownership, table mapping and the recycled
//! markers that drive automatic rename hints.

use serde::{Deserialize, Serialize};

/// Namespace suffix marking recycled types. Stripping it from a recycled
/// type's namespace recovers the original namespace when no explicit override
/// is present.
pub const RECYCLED_NAMESPACE_SUFFIX: &str = ".Recycled";

/// Persistent-type metadata snapshot for one stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainModel {
    /// All persistent types known to this stage's model.
    pub types: Vec<PersistentType>,
}

impl DomainModel {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterate the recycled types of the model.
    pub fn recycled_types(&self) -> impl Iterator<Item = &PersistentType> {
        self.types.iter().filter(|t| t.is_recycled)
    }

    /// Look up a type by full name.
    pub fn find_type(&self, full_name: &str) -> Option<&PersistentType> {
        self.types.iter().find(|t| t.full_name() == full_name)
    }

    /// Serialize the model to the JSON snapshot persisted in the metadata
    /// record set.
    pub fn snapshot_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One persistent type of the domain model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistentType {
    /// Simple type name.
    pub name: String,

    /// Dotted enclosing namespace.
    pub namespace: String,

    /// Owning package.
    pub package: String,

    /// Mapped table name. `None` for types not materialized as tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Whether the type is kept only so upgrade actions can copy its data.
    #[serde(default)]
    pub is_recycled: bool,

    /// Explicit override for the original simple name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,

    /// Explicit override for the original namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_namespace: Option<String>,

    /// Recycled fields with their original names (explicit overrides only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recycled_fields: Vec<RecycledField>,
}

impl PersistentType {
    /// Create a plain (non-recycled) persistent type.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        package: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            package: package.into(),
            table: None,
            is_recycled: false,
            original_name: None,
            original_namespace: None,
            recycled_fields: Vec::new(),
        }
    }

    /// Set the mapped table name.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    /// Mark the type as recycled.
    pub fn recycled(mut self) -> Self {
        self.is_recycled = true;
        self
    }

    /// Set the explicit original-name override.
    pub fn with_original_name(mut self, name: impl Into<String>) -> Self {
        self.original_name = Some(name.into());
        self
    }

    /// Set the explicit original-namespace override.
    pub fn with_original_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.original_namespace = Some(namespace.into());
        self
    }

    /// Full dotted name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.namespace, self.name)
    }

    /// Full name the type had before it was recycled, if recoverable.
    ///
    /// Explicit overrides win; otherwise the original namespace is the
    /// enclosing namespace with [`RECYCLED_NAMESPACE_SUFFIX`] stripped.
    /// Returns `None` for non-recycled types and for recycled types whose
    /// original name cannot be derived.
    pub fn original_full_name(&self) -> Option<String> {
        if !self.is_recycled {
            return None;
        }
        let name = self.original_name.as_deref().unwrap_or(&self.name);
        let namespace = match &self.original_namespace {
            Some(ns) => ns.clone(),
            None => self
                .namespace
                .strip_suffix(RECYCLED_NAMESPACE_SUFFIX)?
                .to_string(),
        };
        Some(format!("{}.{}", namespace, name))
    }
}

/// A recycled field and the name it had before recycling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecycledField {
    /// Current field name.
    pub name: String,

    /// Original field name.
    pub original_name: String,
}
