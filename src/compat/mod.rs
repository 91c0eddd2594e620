//! Type conversion compatibility predicates.
//!
//! [`can_convert`] answers whether a column value of one storage type can be
//! represented in another at all; [`can_convert_safely`] additionally rules
//! out conversions that may lose data. Both are pure and never fail on
//! well-formed input; the decision table and the differencer build on them.

use crate::model::types::{StorageType, TypeKind};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Directed conversion table for kinds that differ. Identity and to-string
/// conversions are handled before the table is consulted.
static SUPPORTED_CONVERSIONS: Lazy<HashMap<TypeKind, Vec<TypeKind>>> = Lazy::new(|| {
    use TypeKind::*;
    let mut table = HashMap::new();
    table.insert(
        Bool,
        vec![
            Int16, UInt16, Int32, UInt32, Int64, UInt64, Float64, Float32, Decimal,
        ],
    );
    table.insert(
        Int8,
        vec![
            Int16, UInt16, Int32, UInt32, Int64, UInt64, Decimal, Float64, Float32, Char,
        ],
    );
    table.insert(
        UInt8,
        vec![
            Int16, UInt16, Int32, UInt32, Int64, UInt64, Decimal, Float64, Float32, Char,
        ],
    );
    table.insert(
        Int16,
        vec![Int32, UInt32, Int64, UInt64, Decimal, Float64, Float32],
    );
    table.insert(
        UInt16,
        vec![Char, Int32, UInt32, Int64, UInt64, Decimal, Float64, Float32],
    );
    table.insert(
        Int32,
        vec![Int64, UInt64, Decimal, Float64, Float32],
    );
    table.insert(
        UInt32,
        vec![Int64, UInt64, Decimal, Float64, Float32],
    );
    table.insert(Int64, vec![Decimal, Float64, Float32]);
    table.insert(UInt64, vec![Decimal, Float64, Float32]);
    table.insert(Float32, vec![Float64]);
    table.insert(Decimal, vec![Float64, Float32, Decimal]);
    table
});

/// Whether a value of `from` can be represented in `to` at all, ignoring
/// precision loss.
///
/// Nullability and size parameters are irrelevant here except for string
/// targets, where the declared max length must fit the widest printed value
/// of the source kind.
pub fn can_convert(from: &StorageType, to: &StorageType) -> bool {
    if !from.kind.is_defined() || !to.kind.is_defined() {
        return false;
    }
    if from.kind == to.kind {
        return true;
    }
    if to.kind == TypeKind::String {
        return can_convert_to_string(from, to);
    }
    SUPPORTED_CONVERSIONS
        .get(&from.kind)
        .map(|targets| targets.contains(&to.kind))
        .unwrap_or(false)
}

/// Whether converting `from` to `to` can never lose data.
pub fn can_convert_safely(from: &StorageType, to: &StorageType) -> bool {
    if !can_convert(from, to) {
        return false;
    }
    if from.nullable && !to.nullable {
        return false;
    }
    use TypeKind::*;
    match (from.kind, to.kind) {
        (Decimal, Decimal) => {
            le_unbounded(from.scale.map(u32::from), to.scale.map(u32::from))
                && le_unbounded(from.precision.map(u32::from), to.precision.map(u32::from))
        }
        (String, String) | (Bytes, Bytes) => match (from.length, to.length) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(f), Some(t)) => f <= t,
        },
        _ => true,
    }
}

/// String-target rule: the declared max length must hold the longest printed
/// value of the source kind.
fn can_convert_to_string(from: &StorageType, to: &StorageType) -> bool {
    use TypeKind::*;
    let needed = match from.kind {
        Char | String => return true,
        UInt8 => 3,
        Int8 => 4,
        Int16 => 6,
        UInt16 => 5,
        Int32 => 11,
        UInt32 => 10,
        Int64 | UInt64 => 20,
        // Sign and decimal point on top of the digits.
        Decimal => match from.precision {
            Some(p) => u32::from(p) + 2,
            None => return to.length.is_none(),
        },
        _ => return false,
    };
    match to.length {
        None => true,
        Some(max) => max >= needed,
    }
}

/// `a <= b` where `None` means unbounded: unbounded is >= any finite value
/// and equal to itself.
fn le_unbounded(a: Option<u32>, b: Option<u32>) -> bool {
    match (a, b) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => a <= b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(kind: TypeKind) -> StorageType {
        StorageType::new(kind)
    }

    #[test]
    fn test_identity_for_every_defined_kind() {
        for kind in TypeKind::DEFINED {
            let ty = t(kind);
            assert!(can_convert(&ty, &ty), "identity failed for {}", kind);
        }
    }

    #[test]
    fn test_identity_ignores_size_parameters() {
        assert!(can_convert(
            &StorageType::string(Some(10)),
            &StorageType::string(Some(5))
        ));
        assert!(can_convert(
            &StorageType::bytes(Some(10)),
            &StorageType::bytes(Some(20))
        ));
        assert!(can_convert(
            &StorageType::decimal(20, 2),
            &StorageType::decimal(18, 2)
        ));
    }

    #[test]
    fn test_unknown_never_converts() {
        assert!(!can_convert(&StorageType::unknown(), &t(TypeKind::Int32)));
        assert!(!can_convert(&t(TypeKind::Int32), &StorageType::unknown()));
        assert!(!can_convert(&StorageType::unknown(), &StorageType::unknown()));
    }

    #[test]
    fn test_conversion_table_entries() {
        assert!(can_convert(&t(TypeKind::Bool), &t(TypeKind::Int16)));
        assert!(can_convert(&t(TypeKind::Bool), &t(TypeKind::Decimal)));
        assert!(!can_convert(&t(TypeKind::Bool), &t(TypeKind::Char)));

        assert!(can_convert(&t(TypeKind::UInt8), &t(TypeKind::Char)));
        assert!(can_convert(&t(TypeKind::Int8), &t(TypeKind::Char)));
        assert!(can_convert(&t(TypeKind::UInt16), &t(TypeKind::Char)));
        assert!(!can_convert(&t(TypeKind::Int16), &t(TypeKind::Char)));

        assert!(can_convert(&t(TypeKind::Float32), &t(TypeKind::Float64)));
        assert!(!can_convert(&t(TypeKind::Float64), &t(TypeKind::Float32)));

        assert!(can_convert(&t(TypeKind::Decimal), &t(TypeKind::Float32)));
        assert!(!can_convert(&t(TypeKind::Int64), &t(TypeKind::Int8)));
        assert!(!can_convert(&t(TypeKind::DateTime), &t(TypeKind::Int64)));
        assert!(!can_convert(&t(TypeKind::Guid), &t(TypeKind::String)));
    }

    #[test]
    fn test_string_widening_boundary_int32() {
        assert!(!can_convert(
            &t(TypeKind::Int32),
            &StorageType::string(Some(10))
        ));
        assert!(can_convert(
            &t(TypeKind::Int32),
            &StorageType::string(Some(11))
        ));
    }

    #[test]
    fn test_string_widening_boundary_per_kind() {
        let boundaries = [
            (TypeKind::UInt8, 3),
            (TypeKind::Int8, 4),
            (TypeKind::Int16, 6),
            (TypeKind::UInt16, 5),
            (TypeKind::Int32, 11),
            (TypeKind::UInt32, 10),
            (TypeKind::Int64, 20),
            (TypeKind::UInt64, 20),
        ];
        for (kind, digits) in boundaries {
            let from = t(kind);
            assert!(
                !can_convert(&from, &StorageType::string(Some(digits - 1))),
                "{} must not fit in String({})",
                kind,
                digits - 1
            );
            assert!(
                can_convert(&from, &StorageType::string(Some(digits))),
                "{} must fit in String({})",
                kind,
                digits
            );
            assert!(can_convert(&from, &StorageType::string(None)));
        }
    }

    #[test]
    fn test_decimal_to_string_needs_precision_plus_two() {
        let from = StorageType::decimal(18, 2);
        assert!(!can_convert(&from, &StorageType::string(Some(19))));
        assert!(can_convert(&from, &StorageType::string(Some(20))));

        // Unbounded precision fits only an unbounded string.
        let unbounded = t(TypeKind::Decimal);
        assert!(can_convert(&unbounded, &StorageType::string(None)));
        assert!(!can_convert(&unbounded, &StorageType::string(Some(100))));
    }

    #[test]
    fn test_non_numeric_sources_never_stringify() {
        for kind in [TypeKind::Bool, TypeKind::Float64, TypeKind::DateTime] {
            assert!(!can_convert(&t(kind), &StorageType::string(None)));
            assert!(!can_convert(&t(kind), &StorageType::string(Some(1000))));
        }
        // Char and String themselves always fit.
        assert!(can_convert(&t(TypeKind::Char), &StorageType::string(Some(1))));
        assert!(can_convert(
            &StorageType::string(Some(500)),
            &StorageType::string(Some(1))
        ));
    }

    #[test]
    fn test_safely_implies_convert() {
        for from in TypeKind::DEFINED {
            for to in TypeKind::DEFINED {
                let from = t(from);
                let to = t(to);
                if can_convert_safely(&from, &to) {
                    assert!(
                        can_convert(&from, &to),
                        "{} -> {} safe but not convertible",
                        from,
                        to
                    );
                }
            }
        }
    }

    #[test]
    fn test_nullable_to_non_nullable_is_unsafe() {
        let from = t(TypeKind::Int32).into_nullable();
        let to = t(TypeKind::Int64);
        assert!(can_convert(&from, &to));
        assert!(!can_convert_safely(&from, &to));

        // The other direction is fine.
        assert!(can_convert_safely(&t(TypeKind::Int32), &to.into_nullable()));
    }

    #[test]
    fn test_decimal_safety_checks_scale_and_precision() {
        assert!(can_convert_safely(
            &StorageType::decimal(18, 2),
            &StorageType::decimal(20, 2)
        ));
        assert!(!can_convert_safely(
            &StorageType::decimal(20, 2),
            &StorageType::decimal(18, 2)
        ));
        assert!(!can_convert_safely(
            &StorageType::decimal(18, 4),
            &StorageType::decimal(20, 2)
        ));
    }

    #[test]
    fn test_decimal_safety_unbounded_rules() {
        let unbounded = t(TypeKind::Decimal);
        let bounded = StorageType::decimal(18, 2);

        // Unbounded target accepts anything; unbounded source only fits an
        // unbounded target.
        assert!(can_convert_safely(&bounded, &unbounded));
        assert!(!can_convert_safely(&unbounded, &bounded));
        assert!(can_convert_safely(&unbounded, &unbounded));
    }

    #[test]
    fn test_string_and_bytes_safety_needs_room() {
        assert!(can_convert_safely(
            &StorageType::string(Some(10)),
            &StorageType::string(Some(10))
        ));
        assert!(can_convert_safely(
            &StorageType::string(Some(10)),
            &StorageType::string(None)
        ));
        assert!(!can_convert_safely(
            &StorageType::string(None),
            &StorageType::string(Some(10))
        ));
        assert!(!can_convert_safely(
            &StorageType::string(Some(11)),
            &StorageType::string(Some(10))
        ));

        assert!(can_convert_safely(
            &StorageType::bytes(Some(16)),
            &StorageType::bytes(Some(32))
        ));
        assert!(!can_convert_safely(
            &StorageType::bytes(Some(32)),
            &StorageType::bytes(Some(16))
        ));
    }

    #[test]
    fn test_widening_numeric_is_safe() {
        assert!(can_convert_safely(
            &t(TypeKind::Int32),
            &t(TypeKind::Int64)
        ));
        assert!(can_convert_safely(
            &t(TypeKind::Int32),
            &StorageType::string(Some(11))
        ));
    }
}
