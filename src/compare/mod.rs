//! Schema comparison results.
//!
//! The engine never diffs schemas itself; a [`crate::model::traits::Differencer`]
//! collaborator produces a [`SchemaComparisonResult`] and the decision table in
//! [`crate::policy`] acts on it. The types here exist so results can be carried
//! in errors and rendered as one fixed diagnostic block.

use crate::actions::{ActionSequence, UpgradeAction};
use crate::model::hints::UpgradeHint;
use serde::{Deserialize, Serialize};

/// Overall comparison status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaComparisonStatus {
    /// The schemas match.
    Equal,
    /// Everything the target needs exists; the extracted schema has more.
    TargetIsSubset,
    /// The target needs structures the extracted schema lacks.
    TargetIsSuperset,
    /// The schemas conflict.
    NotEqual,
}

impl std::fmt::Display for SchemaComparisonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SchemaComparisonStatus::Equal => "Equal",
            SchemaComparisonStatus::TargetIsSubset => "TargetIsSubset",
            SchemaComparisonStatus::TargetIsSuperset => "TargetIsSuperset",
            SchemaComparisonStatus::NotEqual => "NotEqual",
        };
        write!(f, "{}", name)
    }
}

/// One node of the structural difference tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDifference {
    /// What differs, e.g. `table dbo.Orders`.
    pub target: String,

    /// How it differs, e.g. `type changed Decimal(18,2) -> Decimal(20,2)`.
    pub change: String,

    /// Nested differences.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nested: Vec<SchemaDifference>,
}

impl SchemaDifference {
    /// Create a leaf difference.
    pub fn new(target: impl Into<String>, change: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            change: change.into(),
            nested: Vec::new(),
        }
    }

    /// Attach nested differences.
    pub fn with_nested(mut self, nested: Vec<SchemaDifference>) -> Self {
        self.nested = nested;
        self
    }

    fn render(&self, indent: usize, out: &mut String) {
        out.push_str(&"  ".repeat(indent));
        out.push_str(&format!("{}: {}\n", self.target, self.change));
        for child in &self.nested {
            child.render(indent + 1, out);
        }
    }
}

/// Result of comparing the extracted schema with the target schema.
///
/// Invariant: `has_unsafe_actions` is true exactly when `unsafe_actions` is
/// non-empty; the builder methods maintain it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaComparisonResult {
    /// Overall status.
    pub status: SchemaComparisonStatus,

    /// Whether any upgrade action may lose data.
    pub has_unsafe_actions: bool,

    /// Whether any column changed its storage type.
    pub has_column_type_changes: bool,

    /// Legacy-mode verdict; `None` when the differencer did not evaluate it.
    pub is_compatible_in_legacy_mode: Option<bool>,

    /// Ordered mutating actions that reconcile the schemas.
    pub upgrade_actions: ActionSequence,

    /// The subset of actions that may lose data.
    pub unsafe_actions: Vec<UpgradeAction>,

    /// The hints the differencer honored.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<UpgradeHint>,

    /// Structural difference tree; `None` when the schemas are equal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difference: Option<SchemaDifference>,
}

impl SchemaComparisonResult {
    /// Create a result with the given status and nothing else.
    pub fn new(status: SchemaComparisonStatus) -> Self {
        Self {
            status,
            has_unsafe_actions: false,
            has_column_type_changes: false,
            is_compatible_in_legacy_mode: None,
            upgrade_actions: ActionSequence::new(),
            unsafe_actions: Vec::new(),
            hints: Vec::new(),
            difference: None,
        }
    }

    /// Create an `Equal` result.
    pub fn equal() -> Self {
        Self::new(SchemaComparisonStatus::Equal)
    }

    /// Set the upgrade actions.
    pub fn with_actions(mut self, actions: ActionSequence) -> Self {
        self.upgrade_actions = actions;
        self
    }

    /// Set the unsafe-action subset and the matching flag.
    pub fn with_unsafe_actions(mut self, actions: Vec<UpgradeAction>) -> Self {
        self.has_unsafe_actions = !actions.is_empty();
        self.unsafe_actions = actions;
        self
    }

    /// Flag column type changes.
    pub fn with_column_type_changes(mut self) -> Self {
        self.has_column_type_changes = true;
        self
    }

    /// Record the legacy-mode verdict.
    pub fn with_legacy_compatibility(mut self, compatible: bool) -> Self {
        self.is_compatible_in_legacy_mode = Some(compatible);
        self
    }

    /// Attach the hints the comparison honored.
    pub fn with_hints(mut self, hints: Vec<UpgradeHint>) -> Self {
        self.hints = hints;
        self
    }

    /// Attach the structural difference tree.
    pub fn with_difference(mut self, difference: SchemaDifference) -> Self {
        self.difference = Some(difference);
        self
    }

    /// One-line summary: status plus flags.
    pub fn brief(&self) -> String {
        format!(
            "{} (unsafe actions: {}, column type changes: {}, legacy compatible: {})",
            self.status,
            yes_no(self.has_unsafe_actions),
            yes_no(self.has_column_type_changes),
            match self.is_compatible_in_legacy_mode {
                Some(v) => yes_no(v),
                None => "n/a",
            }
        )
    }
}

fn yes_no(v: bool) -> &'static str {
    if v {
        "yes"
    } else {
        "no"
    }
}

impl std::fmt::Display for SchemaComparisonResult {
    /// The fixed diagnostic block: status, flags, then the indented
    /// unsafe-action, hint and difference dumps.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Schema comparison result:")?;
        writeln!(f, "  Status: {}", self.status)?;
        writeln!(f, "  Has unsafe actions: {}", self.has_unsafe_actions)?;
        writeln!(
            f,
            "  Has column type changes: {}",
            self.has_column_type_changes
        )?;
        match self.is_compatible_in_legacy_mode {
            Some(v) => writeln!(f, "  Compatible in legacy mode: {}", v)?,
            None => writeln!(f, "  Compatible in legacy mode: n/a")?,
        }

        if self.unsafe_actions.is_empty() {
            writeln!(f, "  Unsafe actions: none")?;
        } else {
            writeln!(f, "  Unsafe actions:")?;
            for action in &self.unsafe_actions {
                writeln!(f, "    {}", action)?;
            }
        }

        if self.hints.is_empty() {
            writeln!(f, "  Hints: none")?;
        } else {
            writeln!(f, "  Hints:")?;
            for hint in &self.hints {
                writeln!(f, "    {}", hint)?;
            }
        }

        match &self.difference {
            None => writeln!(f, "  Difference: none")?,
            Some(difference) => {
                writeln!(f, "  Difference:")?;
                let mut out = String::new();
                difference.render(2, &mut out);
                f.write_str(&out)?;
            }
        }
        Ok(())
    }
}
