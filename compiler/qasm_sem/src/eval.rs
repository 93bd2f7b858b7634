// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Constant-folds classical expressions against a [`ScopeStack`]. Used
//! both by the lowerer (to resolve loop bounds, array sizes, gate
//! parameters) and by callers who just want to know whether an
//! expression is a compile-time constant at all.

use qasm_ast::ast::{BinOp, Expr, ExprKind, Literal, MathConstant, TypeDef, UnOp};
use qasm_data_structures::span::Span;

use crate::error::Error;
use crate::helpers::bitstring_to_bits;
use crate::scope::ScopeStack;
use crate::types::{normalize_angle, Type, Value};

/// Evaluates `expr` to a [`Value`], resolving identifiers against `scope`.
/// Returns [`Error::UndefinedSymbol`] for names with no constant value
/// and [`Error::DynamicLoopBound`]-class errors are left to callers that
/// need a constant in a specific syntactic position (this function only
/// reports what it can't evaluate as [`Error::UndefinedSymbol`]).
pub fn eval(expr: &Expr, scope: &ScopeStack) -> Result<Value, Error> {
    match expr.kind.as_ref() {
        ExprKind::Lit(lit) => eval_literal(lit, expr.span),
        ExprKind::Ident(name) => {
            let var = scope
                .lookup_variable(name)
                .ok_or_else(|| Error::UndefinedSymbol(name.to_string(), expr.span))?;
            var.value
                .clone()
                .ok_or_else(|| Error::UndefinedSymbol(name.to_string(), expr.span))
        }
        ExprKind::Paren(inner) => eval(inner, scope),
        ExprKind::Unary(op, inner) => eval_unary(*op, eval(inner, scope)?, expr.span),
        ExprKind::Binary(op, lhs, rhs) => {
            eval_binary(*op, eval(lhs, scope)?, eval(rhs, scope)?, expr.span)
        }
        ExprKind::Cast(ty, inner) => {
            eval(inner, scope)?.cast(&crate::types::Type::from_ast(ty), expr.span)
        }
        ExprKind::Call(name, args) => {
            let values = args
                .iter()
                .map(|a| eval(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            eval_builtin_call(name, &values, expr.span)
        }
        ExprKind::Index(base, idx) => eval_index(base, idx, scope, expr.span),
        ExprKind::Concat(lhs, rhs) => {
            let (l, r) = (eval(lhs, scope)?, eval(rhs, scope)?);
            match (l, r) {
                (Value::BitArray(mut a), Value::BitArray(b)) => {
                    a.extend(b);
                    Ok(Value::BitArray(a))
                }
                (Value::Array(mut a), Value::Array(b)) => {
                    a.extend(b);
                    Ok(Value::Array(a))
                }
                _ => Err(Error::Unimplemented(
                    "concatenation of non-array operands".to_string(),
                    expr.span,
                )),
            }
        }
        ExprKind::HardwareQubit(_) | ExprKind::Measure(_) => Err(Error::Unimplemented(
            "this expression form has no compile-time value".to_string(),
            expr.span,
        )),
    }
}

/// Like [`eval`], but reports [`Error::DynamicLoopBound`] instead of
/// `UndefinedSymbol` when the expression can't be resolved, for use in
/// the specific syntactic positions (loop bounds, array sizes) where a
/// non-constant value means "cannot unroll" rather than "unknown name".
pub fn eval_const_or_dynamic(expr: &Expr, scope: &ScopeStack) -> Result<Value, Error> {
    eval(expr, scope).map_err(|_| Error::DynamicLoopBound(expr.span))
}

fn eval_literal(lit: &Literal, _span: Span) -> Result<Value, Error> {
    Ok(match lit {
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i, 32),
        Literal::Float(f) => Value::Float(*f),
        Literal::Imaginary(f) => Value::Complex(0.0, *f),
        Literal::Bit(b) => Value::Bit(*b),
        Literal::BitString(s) => Value::BitArray(bitstring_to_bits(s)),
        Literal::Duration(value, unit) => {
            use qasm_ast::ast::DurationUnit;
            let seconds = match unit {
                DurationUnit::Dt => *value,
                DurationUnit::Ns => *value * 1e-9,
                DurationUnit::Us => *value * 1e-6,
                DurationUnit::Ms => *value * 1e-3,
                DurationUnit::S => *value,
            };
            Value::Duration(seconds)
        }
        Literal::Constant(c) => Value::Float(match c {
            MathConstant::Pi => std::f64::consts::PI,
            MathConstant::Euler => std::f64::consts::E,
            MathConstant::Tau => std::f64::consts::TAU,
        }),
    })
}

fn eval_unary(op: UnOp, v: Value, span: Span) -> Result<Value, Error> {
    match (op, &v) {
        (UnOp::Neg, Value::Int(i, w)) => Ok(Value::Int(-*i, *w)),
        (UnOp::Neg, Value::Float(f)) => Ok(Value::Float(-*f)),
        (UnOp::Neg, Value::Angle(a, w)) => Ok(Value::Angle(normalize_angle(-*a), *w)),
        (UnOp::Not, Value::Bool(b)) => Ok(Value::Bool(!*b)),
        (UnOp::BitNot, Value::Int(i, w)) => Ok(Value::Int(crate::types::wrap_signed(!*i, *w), *w)),
        (UnOp::BitNot, Value::UInt(u, w)) => {
            Ok(Value::UInt(crate::types::wrap_unsigned(!(*u as i64), *w), *w))
        }
        (UnOp::BitNot, Value::Bit(b)) => Ok(Value::Bit(!*b)),
        _ => Err(Error::TypeMismatch {
            expected: "a type supporting this unary operator".to_string(),
            found: v.ty().to_string(),
            span,
        }),
    }
}

#[allow(clippy::too_many_lines)]
fn eval_binary(op: BinOp, l: Value, r: Value, span: Span) -> Result<Value, Error> {
    use BinOp::{
        Add, And, BitAnd, BitOr, BitXor, Div, Eq, Ge, Gt, Le, Lt, Mod, Mul, Ne, Or, Pow, Shl, Shr,
        Sub,
    };

    // Comparisons and logical connectives first: defined uniformly across
    // the numeric types via as_f64/as_bool rather than per-variant arms.
    match op {
        Eq | Ne | Lt | Le | Gt | Ge => {
            let (lf, rf) = (numeric(&l, span)?, numeric(&r, span)?);
            return Ok(Value::Bool(match op {
                Eq => (lf - rf).abs() < f64::EPSILON,
                Ne => (lf - rf).abs() >= f64::EPSILON,
                Lt => lf < rf,
                Le => lf <= rf,
                Gt => lf > rf,
                Ge => lf >= rf,
                _ => unreachable!(),
            }));
        }
        And | Or => {
            let (lb, rb) = (
                l.as_bool().ok_or_else(|| type_err(&l, span))?,
                r.as_bool().ok_or_else(|| type_err(&r, span))?,
            );
            return Ok(Value::Bool(if matches!(op, And) { lb && rb } else { lb || rb }));
        }
        _ => {}
    }

    match (&l, &r) {
        (Value::Int(a, w), Value::Int(b, _)) => {
            let w = *w;
            let result = match op {
                Add => a.checked_add(*b),
                Sub => a.checked_sub(*b),
                Mul => a.checked_mul(*b),
                Div => {
                    if *b == 0 {
                        return Err(Error::DivisionByZero(span));
                    }
                    a.checked_div(*b)
                }
                Mod => {
                    if *b == 0 {
                        return Err(Error::DivisionByZero(span));
                    }
                    a.checked_rem(*b)
                }
                Pow => Some(a.pow(u32::try_from(*b).unwrap_or(0))),
                BitAnd => Some(a & b),
                BitOr => Some(a | b),
                BitXor => Some(a ^ b),
                Shl => Some(a << b),
                Shr => Some(a >> b),
                _ => unreachable!("handled above"),
            };
            Ok(Value::Int(
                crate::types::wrap_signed(result.unwrap_or(0), w),
                w,
            ))
        }
        (Value::UInt(a, w), Value::UInt(b, _)) => {
            let w = *w;
            let result: u64 = match op {
                Add => a.wrapping_add(*b),
                Sub => a.wrapping_sub(*b),
                Mul => a.wrapping_mul(*b),
                Div => {
                    if *b == 0 {
                        return Err(Error::DivisionByZero(span));
                    }
                    a / b
                }
                Mod => {
                    if *b == 0 {
                        return Err(Error::DivisionByZero(span));
                    }
                    a % b
                }
                Pow => a.pow(u32::try_from(*b).unwrap_or(0)),
                BitAnd => a & b,
                BitOr => a | b,
                BitXor => a ^ b,
                Shl => a << b,
                Shr => a >> b,
                _ => unreachable!("handled above"),
            };
            Ok(Value::UInt(crate::types::wrap_unsigned(result as i64, w), w))
        }
        (Value::Float(a), Value::Float(b)) => eval_float_binop(op, *a, *b, span),
        (Value::Angle(a, w), Value::Angle(b, _)) => {
            let w = *w;
            match op {
                Add => Ok(Value::Angle(normalize_angle(a + b), w)),
                Sub => Ok(Value::Angle(normalize_angle(a - b), w)),
                _ => Err(type_err(&l, span)),
            }
        }
        _ => {
            // Mixed numeric kinds (e.g. int op float): widen to float.
            if l.ty().is_numeric() && r.ty().is_numeric() {
                let (a, b) = (numeric(&l, span)?, numeric(&r, span)?);
                eval_float_binop(op, a, b, span)
            } else {
                Err(type_err(&l, span))
            }
        }
    }
}

fn eval_float_binop(op: BinOp, a: f64, b: f64, span: Span) -> Result<Value, Error> {
    use BinOp::{Add, Div, Mod, Mul, Pow, Sub};
    Ok(Value::Float(match op {
        Add => a + b,
        Sub => a - b,
        Mul => a * b,
        Div => {
            if b == 0.0 {
                return Err(Error::DivisionByZero(span));
            }
            a / b
        }
        Mod => a % b,
        Pow => a.powf(b),
        _ => return Err(Error::Unimplemented("bitwise op on float".to_string(), span)),
    }))
}

fn numeric(v: &Value, span: Span) -> Result<f64, Error> {
    v.as_f64().ok_or_else(|| type_err(v, span))
}

fn type_err(v: &Value, span: Span) -> Error {
    Error::TypeMismatch {
        expected: "a numeric type".to_string(),
        found: v.ty().to_string(),
        span,
    }
}

fn eval_index(
    base: &Expr,
    idx: &qasm_ast::ast::IndexKind,
    scope: &ScopeStack,
    span: Span,
) -> Result<Value, Error> {
    use qasm_ast::ast::IndexKind;
    let base_val = eval(base, scope)?;
    let elems = match &base_val {
        Value::Array(items) => items.clone(),
        Value::BitArray(bits) => bits.iter().map(|b| Value::Bit(*b)).collect(),
        _ => {
            return Err(Error::TypeMismatch {
                expected: "an indexable array".to_string(),
                found: base_val.ty().to_string(),
                span,
            })
        }
    };
    match idx {
        IndexKind::Single(e) => {
            let i = eval(e, scope)?
                .as_i64()
                .ok_or_else(|| type_err(&base_val, span))?;
            let normalized = if i < 0 { elems.len() as i64 + i } else { i };
            elems
                .get(usize::try_from(normalized).unwrap_or(usize::MAX))
                .cloned()
                .ok_or(Error::IndexOutOfRange {
                    index: i,
                    size: elems.len(),
                    span,
                })
        }
        IndexKind::Range(..) | IndexKind::Set(_) => Err(Error::Unimplemented(
            "slicing a constant array expression".to_string(),
            span,
        )),
    }
}

/// Resolves a parsed [`TypeDef`] to a [`Type`], evaluating any width or
/// array-dimension expressions against `scope`. Unlike [`Type::from_ast`],
/// which fills in default widths, this is used wherever a declared width
/// actually matters (variable declarations, subroutine parameters).
pub fn resolve_type(ty: &TypeDef, scope: &ScopeStack) -> Result<Type, Error> {
    Ok(match ty {
        TypeDef::Bool => Type::Bool,
        TypeDef::Bit => Type::Bit,
        TypeDef::BitArray(size) => Type::BitArray(resolve_width(size, scope, 1)?),
        TypeDef::Int(size) => Type::Int(resolve_width(size, scope, 32)?),
        TypeDef::UInt(size) => Type::UInt(resolve_width(size, scope, 32)?),
        TypeDef::Float(size) => Type::Float(resolve_width(size, scope, 64)?),
        TypeDef::Angle(size) => Type::Angle(resolve_width(size, scope, 32)?),
        TypeDef::Complex(inner) => Type::Complex(Box::new(resolve_type(inner, scope)?)),
        TypeDef::Duration => Type::Duration,
        TypeDef::Stretch => Type::Stretch,
        TypeDef::Qubit | TypeDef::QubitArray(_) => {
            return Err(Error::Unimplemented(
                "quantum types have no classical representation".to_string(),
                Span::default(),
            ))
        }
        TypeDef::Array(inner, dims) => {
            let mut widths = Vec::with_capacity(dims.len());
            for dim in dims {
                let width = eval(dim, scope)?
                    .as_i64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or(Error::WidthRequired(dim.span))?;
                widths.push(width);
            }
            Type::Array(Box::new(resolve_type(inner, scope)?), widths)
        }
    })
}

fn resolve_width(size: &Option<Expr>, scope: &ScopeStack, default: u32) -> Result<u32, Error> {
    match size {
        Some(e) => eval(e, scope)?
            .as_i64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(Error::WidthRequired(e.span)),
        None => Ok(default),
    }
}

/// Exposes the binary-operator folding logic to the lowerer for compound
/// assignment (`x += y`), which needs to fold against the variable's
/// current value rather than two freshly evaluated expressions.
pub fn fold_binary_pub(op: BinOp, l: Value, r: Value, span: Span) -> Result<Value, Error> {
    eval_binary(op, l, r, span)
}

/// Built-in math functions available in constant expressions:
/// `sin`, `cos`, `tan`, `exp`, `ln`, `sqrt`, `arcsin`, `arccos`, `arctan`,
/// `mod`, `popcount`.
fn eval_builtin_call(name: &str, args: &[Value], span: Span) -> Result<Value, Error> {
    let arg0 = || args.first().and_then(Value::as_f64).ok_or_else(|| Error::TypeMismatch {
        expected: "a numeric argument".to_string(),
        found: "none".to_string(),
        span,
    });
    Ok(Value::Float(match name {
        "sin" => arg0()?.sin(),
        "cos" => arg0()?.cos(),
        "tan" => arg0()?.tan(),
        "exp" => arg0()?.exp(),
        "ln" => arg0()?.ln(),
        "sqrt" => arg0()?.sqrt(),
        "arcsin" => arg0()?.asin(),
        "arccos" => arg0()?.acos(),
        "arctan" => arg0()?.atan(),
        "popcount" => {
            let Some(Value::BitArray(bits)) = args.first() else {
                return Err(Error::Unimplemented("popcount on non-bit-array".to_string(), span));
            };
            return Ok(Value::Int(bits.iter().filter(|b| **b).count() as i64, 32));
        }
        _ => return Err(Error::UndefinedSymbol(name.to_string(), span)),
    }))
}

#[cfg(test)]
mod tests {
    use super::eval;
    use crate::scope::ScopeStack;
    use qasm_ast::ast::{BinOp, Expr, ExprKind, Literal};
    use qasm_data_structures::span::Span;

    fn lit_int(i: i64) -> Expr {
        Expr {
            span: Span::default(),
            kind: Box::new(ExprKind::Lit(Literal::Int(i))),
        }
    }

    #[test]
    fn folds_integer_arithmetic() {
        let scope = ScopeStack::new();
        let expr = Expr {
            span: Span::default(),
            kind: Box::new(ExprKind::Binary(BinOp::Add, lit_int(2), lit_int(3))),
        };
        let v = eval(&expr, &scope).unwrap();
        assert_eq!(v.as_i64(), Some(5));
    }

    #[test]
    fn division_by_zero_errors() {
        let scope = ScopeStack::new();
        let expr = Expr {
            span: Span::default(),
            kind: Box::new(ExprKind::Binary(BinOp::Div, lit_int(1), lit_int(0))),
        };
        assert!(eval(&expr, &scope).is_err());
    }

    #[test]
    fn integer_overflow_wraps_at_declared_width() {
        use crate::types::Value;
        let scope = ScopeStack::new();
        let a = Expr {
            span: Span::default(),
            kind: Box::new(ExprKind::Lit(Literal::Int(i64::from(i32::MAX)))),
        };
        let one = lit_int(1);
        let expr = Expr {
            span: Span::default(),
            kind: Box::new(ExprKind::Binary(BinOp::Add, a, one)),
        };
        let v = eval(&expr, &scope).unwrap();
        assert_eq!(v, Value::Int(i64::from(i32::MIN), 32));
    }
}
