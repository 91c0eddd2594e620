//! Domain and storage model types.

pub mod domain;
pub mod hints;
pub mod schema;
pub mod traits;
pub mod types;

pub use domain::{DomainModel, PersistentType, RecycledField, RECYCLED_NAMESPACE_SUFFIX};
pub use hints::{HintSet, UpgradeHint};
pub use schema::{Catalog, Column, ForeignKey, Index, Schema, StorageModel, Table};
pub use types::{StorageType, TypeKind};
