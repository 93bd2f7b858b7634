// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The classical value and type system: fixed-width integers with
//! wraparound arithmetic, angles normalized to `[0, 2*pi)`, and the
//! casting rules between them used by constant folding in [`crate::eval`].

use qasm_ast::ast::TypeDef;
use qasm_data_structures::span::Span;
use std::fmt::{self, Display, Formatter};

use crate::error::Error;

/// A resolved classical (non-quantum) type. Widths that were omitted in
/// source default the way the teacher's own lowering does: `bit`/`int`/
/// `uint` default to width 1/32/32 when a concrete width is required by
/// context and none was given.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Bool,
    Bit,
    BitArray(u32),
    Int(u32),
    UInt(u32),
    Float(u32),
    Angle(u32),
    Complex(Box<Type>),
    Duration,
    Stretch,
    Array(Box<Type>, Vec<u32>),
}

impl Type {
    #[must_use]
    pub fn from_ast(ty: &TypeDef) -> Self {
        match ty {
            TypeDef::Bool => Type::Bool,
            TypeDef::Bit => Type::Bit,
            TypeDef::BitArray(_) => Type::BitArray(1),
            TypeDef::Int(_) => Type::Int(32),
            TypeDef::UInt(_) => Type::UInt(32),
            TypeDef::Float(_) => Type::Float(64),
            TypeDef::Angle(_) => Type::Angle(32),
            TypeDef::Complex(inner) => Type::Complex(Box::new(Type::from_ast(inner))),
            TypeDef::Duration => Type::Duration,
            TypeDef::Stretch => Type::Stretch,
            TypeDef::Qubit | TypeDef::QubitArray(_) => {
                unreachable!("quantum types have no classical Type representation")
            }
            TypeDef::Array(inner, _) => Type::Array(Box::new(Type::from_ast(inner)), vec![]),
        }
    }

    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Type::Int(_) | Type::UInt(_) | Type::Float(_) | Type::Angle(_) | Type::Complex(_)
        )
    }

    #[must_use]
    pub fn width(&self) -> Option<u32> {
        match self {
            Type::Bit => Some(1),
            Type::BitArray(w) | Type::Int(w) | Type::UInt(w) | Type::Float(w) | Type::Angle(w) => {
                Some(*w)
            }
            _ => None,
        }
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Bit => write!(f, "bit"),
            Type::BitArray(w) => write!(f, "bit[{w}]"),
            Type::Int(w) => write!(f, "int[{w}]"),
            Type::UInt(w) => write!(f, "uint[{w}]"),
            Type::Float(w) => write!(f, "float[{w}]"),
            Type::Angle(w) => write!(f, "angle[{w}]"),
            Type::Complex(inner) => write!(f, "complex[{inner}]"),
            Type::Duration => write!(f, "duration"),
            Type::Stretch => write!(f, "stretch"),
            Type::Array(inner, dims) => {
                write!(f, "array[{inner}")?;
                for dim in dims {
                    write!(f, ", {dim}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A compile-time classical value, the unit constant folding operates on.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Bit(bool),
    BitArray(Vec<bool>),
    Int(i64, u32),
    UInt(u64, u32),
    Float(f64),
    /// Stored in radians, always kept normalized to `[0, 2*pi)` at the
    /// declared width.
    Angle(f64, u32),
    Complex(f64, f64),
    Duration(f64),
    Array(Vec<Value>),
}

impl Value {
    #[must_use]
    pub fn ty(&self) -> Type {
        match self {
            Value::Bool(_) => Type::Bool,
            Value::Bit(_) => Type::Bit,
            Value::BitArray(bits) => Type::BitArray(u32::try_from(bits.len()).unwrap_or(u32::MAX)),
            Value::Int(_, w) => Type::Int(*w),
            Value::UInt(_, w) => Type::UInt(*w),
            Value::Float(_) => Type::Float(64),
            Value::Angle(_, w) => Type::Angle(*w),
            Value::Complex(_, _) => Type::Complex(Box::new(Type::Float(64))),
            Value::Duration(_) => Type::Duration,
            Value::Array(items) => {
                let inner = items.first().map_or(Type::Float(64), Value::ty);
                Type::Array(Box::new(inner), vec![u32::try_from(items.len()).unwrap_or(0)])
            }
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) | Value::Bit(b) => Some(*b),
            Value::Int(i, _) => Some(*i != 0),
            Value::UInt(u, _) => Some(*u != 0),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i, _) => Some(*i),
            Value::UInt(u, _) => i64::try_from(*u).ok(),
            Value::Bool(b) | Value::Bit(b) => Some(i64::from(*b)),
            Value::Float(f) => Some(*f as i64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) | Value::Angle(f, _) | Value::Duration(f) => Some(*f),
            Value::Int(i, _) => Some(*i as f64),
            Value::UInt(u, _) => Some(*u as f64),
            _ => None,
        }
    }

    /// Casts this value to `target`, applying OpenQASM 3's truncation and
    /// wraparound rules rather than erroring on lossy conversions; only
    /// conversions that are outright meaningless (casting a duration to a
    /// bit, say) are rejected.
    pub fn cast(&self, target: &Type, span: Span) -> Result<Value, Error> {
        match (self, target) {
            (v, t) if &v.ty() == t => Ok(v.clone()),
            (Value::Bool(b), Type::Bit) => Ok(Value::Bit(*b)),
            (Value::Bit(b), Type::Bool) => Ok(Value::Bool(*b)),
            (Value::Bool(b), Type::Int(w)) => Ok(Value::Int(i64::from(*b), *w)),
            (Value::Bool(b), Type::UInt(w)) => Ok(Value::UInt(u64::from(*b), *w)),
            (Value::Bit(b), Type::Int(w)) => Ok(Value::Int(i64::from(*b), *w)),
            (Value::Bit(b), Type::UInt(w)) => Ok(Value::UInt(u64::from(*b), *w)),
            (Value::Int(i, _), Type::Int(w)) => Ok(Value::Int(wrap_signed(*i, *w), *w)),
            (Value::Int(i, _), Type::UInt(w)) => Ok(Value::UInt(wrap_unsigned(*i, *w), *w)),
            (Value::Int(i, _), Type::Bool) => Ok(Value::Bool(*i != 0)),
            (Value::Int(i, _), Type::Bit) => Ok(Value::Bit(*i & 1 != 0)),
            (Value::Int(i, _), Type::Float(_)) => Ok(Value::Float(*i as f64)),
            (Value::UInt(u, _), Type::UInt(w)) => {
                Ok(Value::UInt(wrap_unsigned(*u as i64, *w), *w))
            }
            (Value::UInt(u, _), Type::Int(w)) => Ok(Value::Int(wrap_signed(*u as i64, *w), *w)),
            (Value::UInt(u, _), Type::Bool) => Ok(Value::Bool(*u != 0)),
            (Value::UInt(u, _), Type::Bit) => Ok(Value::Bit(*u & 1 != 0)),
            (Value::UInt(u, _), Type::Float(_)) => Ok(Value::Float(*u as f64)),
            (Value::Float(f), Type::Int(w)) => Ok(Value::Int(wrap_signed(*f as i64, *w), *w)),
            (Value::Float(f), Type::UInt(w)) => Ok(Value::UInt(wrap_unsigned(*f as i64, *w), *w)),
            (Value::Float(f), Type::Bool) => Ok(Value::Bool(*f != 0.0)),
            (Value::Float(f), Type::Angle(w)) => Ok(Value::Angle(normalize_angle(*f), *w)),
            (Value::Angle(a, _), Type::Angle(w)) => Ok(Value::Angle(normalize_angle(*a), *w)),
            (Value::Angle(a, _), Type::Float(_)) => Ok(Value::Float(*a)),
            (Value::Angle(a, _), Type::Bit) => {
                // OpenQASM 3 defines angle-to-bit as the top bit of the
                // fixed-point representation: non-zero iff >= pi.
                Ok(Value::Bit(*a >= std::f64::consts::PI))
            }
            (Value::Bit(b), Type::BitArray(_)) => Ok(Value::BitArray(vec![*b])),
            (Value::BitArray(bits), Type::Int(w)) => Ok(Value::Int(bits_to_i64(bits), *w)),
            (Value::BitArray(bits), Type::UInt(w)) => Ok(Value::UInt(bits_to_u64(bits), *w)),
            _ => Err(Error::CannotCastLiteral {
                value: format!("{self:?}"),
                ty: target.to_string(),
                span,
            }),
        }
    }
}

/// Wraps a signed value into `width` bits using OpenQASM's two's-complement
/// wraparound semantics (no panic on overflow, matching hardware registers).
#[must_use]
pub fn wrap_signed(value: i64, width: u32) -> i64 {
    if width >= 64 {
        return value;
    }
    let mask: i64 = (1i64 << width) - 1;
    let truncated = value & mask;
    let sign_bit = 1i64 << (width - 1);
    if truncated & sign_bit != 0 {
        truncated - (1i64 << width)
    } else {
        truncated
    }
}

/// Wraps a value into `width` unsigned bits.
#[must_use]
pub fn wrap_unsigned(value: i64, width: u32) -> u64 {
    if width >= 64 {
        return value as u64;
    }
    let mask: i64 = (1i64 << width) - 1;
    (value & mask) as u64
}

/// Normalizes an angle in radians to the half-open interval `[0, 2*pi)`.
#[must_use]
pub fn normalize_angle(radians: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let r = radians % two_pi;
    if r < 0.0 {
        r + two_pi
    } else {
        r
    }
}

/// Interprets a bit string MSB-first, the convention this crate uses
/// throughout for `bit[n]` literals and registers (see
/// `helpers::bitstring_value`).
#[must_use]
fn bits_to_i64(bits: &[bool]) -> i64 {
    bits_to_u64(bits) as i64
}

#[must_use]
fn bits_to_u64(bits: &[bool]) -> u64 {
    bits.iter().fold(0u64, |acc, &b| (acc << 1) | u64::from(b))
}

#[cfg(test)]
mod tests {
    use super::{normalize_angle, wrap_signed, wrap_unsigned, Type, Value};
    use qasm_data_structures::span::Span;

    #[test]
    fn signed_wraparound_matches_twos_complement() {
        assert_eq!(wrap_signed(127, 8), 127);
        assert_eq!(wrap_signed(128, 8), -128);
        assert_eq!(wrap_signed(-1, 8), -1);
        assert_eq!(wrap_signed(256, 8), 0);
    }

    #[test]
    fn unsigned_wraparound_truncates() {
        assert_eq!(wrap_unsigned(255, 8), 255);
        assert_eq!(wrap_unsigned(256, 8), 0);
        assert_eq!(wrap_unsigned(-1, 8), 255);
    }

    #[test]
    fn angle_normalizes_into_range() {
        let tau = std::f64::consts::TAU;
        assert!((normalize_angle(tau + 1.0) - 1.0).abs() < 1e-9);
        assert!((normalize_angle(-1.0) - (tau - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn int_to_uint_cast_wraps() {
        let v = Value::Int(-1, 8);
        let cast = v.cast(&Type::UInt(8), Span::default()).unwrap();
        assert_eq!(cast, Value::UInt(255, 8));
    }

    #[test]
    fn bool_roundtrips_through_bit() {
        let v = Value::Bool(true);
        let bit = v.cast(&Type::Bit, Span::default()).unwrap();
        assert_eq!(bit, Value::Bit(true));
        let back = bit.cast(&Type::Bool, Span::default()).unwrap();
        assert_eq!(back, Value::Bool(true));
    }
}
