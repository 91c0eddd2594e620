//! Storage-level column type representation.
//!
//! A `StorageType` is the database-agnostic form both schema sides (extracted
//! and target) are expressed in. Conversion compatibility between two storage
//! types is decided by the predicates in [`crate::compat`].

use serde::{Deserialize, Serialize};

/// Primitive kind of a storage type, stripped of nullability and size
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    /// Boolean/bit type.
    Bool,
    /// 8-bit signed integer.
    Int8,
    /// 8-bit unsigned integer (0-255).
    UInt8,
    /// 16-bit signed integer.
    Int16,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit signed integer.
    Int32,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit unsigned integer.
    UInt64,
    /// 32-bit floating point.
    Float32,
    /// 64-bit floating point.
    Float64,
    /// Exact decimal; precision and scale live on the [`StorageType`].
    Decimal,
    /// Single character.
    Char,
    /// Character string; max length lives on the [`StorageType`].
    String,
    /// Byte string; max length lives on the [`StorageType`].
    Bytes,
    /// Date and time.
    DateTime,
    /// 128-bit identifier.
    Guid,
    /// Type the extractor could not map. Never convertible.
    Unknown,
}

impl TypeKind {
    /// All defined kinds, i.e. everything except `Unknown`.
    pub const DEFINED: [TypeKind; 17] = [
        TypeKind::Bool,
        TypeKind::Int8,
        TypeKind::UInt8,
        TypeKind::Int16,
        TypeKind::UInt16,
        TypeKind::Int32,
        TypeKind::UInt32,
        TypeKind::Int64,
        TypeKind::UInt64,
        TypeKind::Float32,
        TypeKind::Float64,
        TypeKind::Decimal,
        TypeKind::Char,
        TypeKind::String,
        TypeKind::Bytes,
        TypeKind::DateTime,
        TypeKind::Guid,
    ];

    /// Whether the kind is defined (mappable).
    pub fn is_defined(&self) -> bool {
        !matches!(self, TypeKind::Unknown)
    }
}

impl std::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TypeKind::Bool => "Bool",
            TypeKind::Int8 => "Int8",
            TypeKind::UInt8 => "UInt8",
            TypeKind::Int16 => "Int16",
            TypeKind::UInt16 => "UInt16",
            TypeKind::Int32 => "Int32",
            TypeKind::UInt32 => "UInt32",
            TypeKind::Int64 => "Int64",
            TypeKind::UInt64 => "UInt64",
            TypeKind::Float32 => "Float32",
            TypeKind::Float64 => "Float64",
            TypeKind::Decimal => "Decimal",
            TypeKind::Char => "Char",
            TypeKind::String => "String",
            TypeKind::Bytes => "Bytes",
            TypeKind::DateTime => "DateTime",
            TypeKind::Guid => "Guid",
            TypeKind::Unknown => "Unknown",
        };
        write!(f, "{}", name)
    }
}

/// Full storage type: kind plus nullability and optional size parameters.
///
/// `length` applies to `String`/`Bytes` (`None` = unbounded), `precision` and
/// `scale` to `Decimal` (`None` = unbounded on that axis).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageType {
    /// Primitive kind.
    pub kind: TypeKind,

    /// Whether NULL is admitted.
    #[serde(default)]
    pub nullable: bool,

    /// Maximum length for string/byte types. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// Total digits for decimal types. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,

    /// Digits after the decimal point. `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,
}

impl StorageType {
    /// Create a non-nullable type of the given kind with no size parameters.
    pub fn new(kind: TypeKind) -> Self {
        Self {
            kind,
            nullable: false,
            length: None,
            precision: None,
            scale: None,
        }
    }

    /// Create a string type with the given max length (`None` = unbounded).
    pub fn string(length: Option<u32>) -> Self {
        Self {
            length,
            ..Self::new(TypeKind::String)
        }
    }

    /// Create a byte-string type with the given max length (`None` = unbounded).
    pub fn bytes(length: Option<u32>) -> Self {
        Self {
            length,
            ..Self::new(TypeKind::Bytes)
        }
    }

    /// Create a decimal type with bounded precision and scale.
    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self {
            precision: Some(precision),
            scale: Some(scale),
            ..Self::new(TypeKind::Decimal)
        }
    }

    /// Create an unmappable type.
    pub fn unknown() -> Self {
        Self::new(TypeKind::Unknown)
    }

    /// Return the same type with nullability switched on.
    pub fn into_nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Return the same type with the given max length.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)?;
        match self.kind {
            TypeKind::String | TypeKind::Bytes | TypeKind::Char => {
                if let Some(n) = self.length {
                    write!(f, "({})", n)?;
                }
            }
            TypeKind::Decimal => match (self.precision, self.scale) {
                (Some(p), Some(s)) => write!(f, "({},{})", p, s)?,
                (Some(p), None) => write!(f, "({})", p)?,
                _ => {}
            },
            _ => {}
        }
        if self.nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}
