// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Recursive gate-basis rebase (`spec.md` §4.5 "Basis rebase"): rewrites a
//! flattened program so every `GateCall` names a gate in the target
//! [`TargetBasis`], by repeatedly substituting a fixed decomposition
//! recipe for whichever gate the basis doesn't allow.
//!
//! This runs **after** `unroll()`, on a program that already contains
//! only intrinsic gate calls with resolved `$n` operands and folded
//! numeric arguments — it never sees a modifier, a broadcast, or a
//! symbolic parameter.

use std::f64::consts::PI;

use qasm_ast::ast::{Expr, ExprKind, GateOperand, Literal, Stmt, StmtKind};
use qasm_data_structures::span::Span;

use crate::config::TargetBasis;
use crate::error::Error;

/// A single step of a fixed decomposition: an intrinsic name, the
/// positions (into the original call's qubit list) it applies to, and an
/// optional angle derived from the original call's first argument.
struct Step {
    name: &'static str,
    qubits: &'static [usize],
    angle: Option<fn(f64) -> f64>,
}

const fn step(name: &'static str, qubits: &'static [usize]) -> Step {
    Step {
        name,
        qubits,
        angle: None,
    }
}

const fn angle_step(name: &'static str, qubits: &'static [usize], angle: fn(f64) -> f64) -> Step {
    Step {
        name,
        qubits,
        angle: Some(angle),
    }
}

/// Decomposition recipes whose right-hand side only ever names
/// `{rx, ry, rz, cx, id}` — valid for [`TargetBasis::RotationalCx`], and
/// reused as the first decomposition pass for gates Clifford+T has no
/// finite exact rewrite for (this module never claims to reach
/// Clifford+T from those).
fn rotational_cx_recipe(name: &str) -> Option<&'static [Step]> {
    Some(match name {
        "h" => &[step("ry", &[0]), step("rx", &[0])],
        "x" => &[angle_step("rx", &[0], |_| PI)],
        "y" => &[angle_step("ry", &[0], |_| PI)],
        "z" => &[angle_step("rz", &[0], |_| PI)],
        "s" => &[angle_step("rz", &[0], |_| PI / 2.0)],
        "sdg" => &[angle_step("rz", &[0], |_| -PI / 2.0)],
        "t" => &[angle_step("rz", &[0], |_| PI / 4.0)],
        "tdg" => &[angle_step("rz", &[0], |_| -PI / 4.0)],
        "sx" => &[angle_step("rx", &[0], |_| PI / 2.0)],
        "sxdg" => &[angle_step("rx", &[0], |_| -PI / 2.0)],
        "p" => &[step("rz", &[0])],
        "swap" => &[step("cx", &[0, 1]), step("cx", &[1, 0]), step("cx", &[0, 1])],
        "cy" => &[
            angle_step("rz", &[1], |_| -PI / 2.0),
            step("cx", &[0, 1]),
            angle_step("rz", &[1], |_| PI / 2.0),
        ],
        "cz" => &[
            step("ry", &[1]),
            step("rx", &[1]),
            step("cx", &[0, 1]),
            step("ry", &[1]),
            step("rx", &[1]),
        ],
        "crz" => &[
            step("rz", &[1]),
            step("cx", &[0, 1]),
            step("rz", &[1]),
            step("cx", &[0, 1]),
        ],
        "cp" => &[
            step("rz", &[0]),
            step("rz", &[1]),
            step("cx", &[0, 1]),
            step("rz", &[1]),
            step("cx", &[0, 1]),
        ],
        _ => return None,
    })
}

/// Decomposition recipes whose right-hand side only ever names
/// `{h, s, sdg, t, tdg, x, cx, id}` — exact and finite, valid for
/// [`TargetBasis::CliffordT`].
fn clifford_t_recipe(name: &str) -> Option<&'static [Step]> {
    Some(match name {
        "y" => &[step("x", &[0]), step("s", &[0]), step("s", &[0])],
        "z" => &[step("s", &[0]), step("s", &[0])],
        "cy" => &[step("sdg", &[1]), step("cx", &[0, 1]), step("s", &[1])],
        "cz" => &[step("h", &[1]), step("cx", &[0, 1]), step("h", &[1])],
        "swap" => &[step("cx", &[0, 1]), step("cx", &[1, 0]), step("cx", &[0, 1])],
        _ => return None,
    })
}

/// Extracts the numeric literal an already-folded intrinsic gate call
/// carries as its sole angle argument (`0.0` for none — decomposition
/// steps that don't need it ignore the value).
fn first_arg_value(args: &[Expr]) -> f64 {
    args.first()
        .and_then(|e| match e.kind.as_ref() {
            ExprKind::Lit(Literal::Float(f)) => Some(*f),
            ExprKind::Lit(Literal::Int(i)) => Some(*i as f64),
            _ => None,
        })
        .unwrap_or(0.0)
}

fn angle_expr(value: f64, span: Span) -> Expr {
    Expr::new(span, ExprKind::Lit(Literal::Float(value)))
}

/// Rewrites `program`'s statement list in place so that every emitted
/// `GateCall` names a gate `basis` allows, decomposing (recursively,
/// since a single recipe step can itself need a further rewrite — e.g.
/// `cz` expands to `h`, which itself expands to `ry`/`rx` under
/// [`TargetBasis::RotationalCx`]) anything it doesn't.
pub fn rebase_block(stmts: &mut Vec<Stmt>, basis: &TargetBasis) -> Result<(), Error> {
    if matches!(basis, TargetBasis::None) {
        return Ok(());
    }
    let mut out = Vec::with_capacity(stmts.len());
    for stmt in stmts.drain(..) {
        rebase_stmt(stmt, basis, &mut out)?;
    }
    *stmts = out;
    Ok(())
}

fn rebase_stmt(stmt: Stmt, basis: &TargetBasis, out: &mut Vec<Stmt>) -> Result<(), Error> {
    let span = stmt.span;
    match *stmt.kind {
        StmtKind::GateCall {
            modifiers,
            name,
            args,
            qubits,
        } if modifiers.is_empty() => rebase_gate_call(&name, &args, &qubits, basis, span, out),
        StmtKind::If {
            cond,
            mut then_block,
            mut else_block,
        } => {
            rebase_block(&mut then_block, basis)?;
            if let Some(eb) = &mut else_block {
                rebase_block(eb, basis)?;
            }
            out.push(Stmt::new(
                span,
                StmtKind::If {
                    cond,
                    then_block,
                    else_block,
                },
            ));
            Ok(())
        }
        other => {
            out.push(Stmt::new(span, other));
            Ok(())
        }
    }
}

/// Upper bound on decomposition rounds for one original call, guarding
/// against a typo'd recipe that rewrites a gate to itself; no entry in
/// either table above is more than two rounds deep from a basis gate.
const MAX_REWRITE_ROUNDS: usize = 16;

fn rebase_gate_call(
    name: &str,
    args: &[Expr],
    qubits: &[GateOperand],
    basis: &TargetBasis,
    span: Span,
    out: &mut Vec<Stmt>,
) -> Result<(), Error> {
    rebase_round((name, args.to_vec(), qubits.to_vec()), basis, span, out, 0)
}

fn rebase_round(
    (name, args, qubits): (&str, Vec<Expr>, Vec<GateOperand>),
    basis: &TargetBasis,
    span: Span,
    out: &mut Vec<Stmt>,
    depth: usize,
) -> Result<(), Error> {
    if depth > MAX_REWRITE_ROUNDS {
        return Err(Error::NoRebaseRule {
            gate: name.to_string(),
            basis: format!("{basis:?}"),
            span,
        });
    }
    if !args.is_empty() && matches!(basis, TargetBasis::CliffordT) {
        return Err(Error::NoRebaseRule {
            gate: name.to_string(),
            basis: "CliffordT".to_string(),
            span,
        });
    }
    if basis.allows(name) {
        out.push(Stmt::new(
            span,
            StmtKind::GateCall {
                modifiers: vec![],
                name: name.into(),
                args,
                qubits,
            },
        ));
        return Ok(());
    }
    let recipe = match basis {
        TargetBasis::RotationalCx => rotational_cx_recipe(name),
        TargetBasis::CliffordT => clifford_t_recipe(name),
        TargetBasis::Custom(_) | TargetBasis::None => None,
    }
    .ok_or_else(|| Error::NoRebaseRule {
        gate: name.to_string(),
        basis: format!("{basis:?}"),
        span,
    })?;
    let base_angle = first_arg_value(&args);
    for s in recipe {
        let step_qubits: Vec<GateOperand> = s.qubits.iter().map(|&i| qubits[i].clone()).collect();
        let step_args = match s.angle {
            Some(f) => vec![angle_expr(f(base_angle), span)],
            None => args.clone(),
        };
        rebase_round((s.name, step_args, step_qubits), basis, span, out, depth + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::rebase_block;
    use crate::config::TargetBasis;
    use qasm_ast::ast::{GateOperand, Stmt, StmtKind};
    use qasm_data_structures::span::Span;

    fn h(qubit: u32) -> Stmt {
        Stmt::new(
            Span::default(),
            StmtKind::GateCall {
                modifiers: vec![],
                name: "h".into(),
                args: vec![],
                qubits: vec![GateOperand::HardwareQubit(qubit)],
            },
        )
    }

    #[test]
    fn h_rebases_to_ry_then_rx_under_rotational_cx() {
        let mut stmts = vec![h(0)];
        rebase_block(&mut stmts, &TargetBasis::RotationalCx).unwrap();
        let names: Vec<&str> = stmts
            .iter()
            .map(|s| match s.kind.as_ref() {
                StmtKind::GateCall { name, .. } => name.as_ref(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["ry", "rx"]);
    }

    #[test]
    fn rx_with_parameter_under_clifford_t_errors() {
        let mut stmts = vec![Stmt::new(
            Span::default(),
            StmtKind::GateCall {
                modifiers: vec![],
                name: "rx".into(),
                args: vec![qasm_ast::ast::Expr::new(
                    Span::default(),
                    qasm_ast::ast::ExprKind::Lit(qasm_ast::ast::Literal::Float(1.0)),
                )],
                qubits: vec![GateOperand::HardwareQubit(0)],
            },
        )];
        assert!(rebase_block(&mut stmts, &TargetBasis::CliffordT).is_err());
    }

    #[test]
    fn cz_rebases_fully_under_clifford_t() {
        let mut stmts = vec![Stmt::new(
            Span::default(),
            StmtKind::GateCall {
                modifiers: vec![],
                name: "cz".into(),
                args: vec![],
                qubits: vec![GateOperand::HardwareQubit(0), GateOperand::HardwareQubit(1)],
            },
        )];
        rebase_block(&mut stmts, &TargetBasis::CliffordT).unwrap();
        let names: Vec<&str> = stmts
            .iter()
            .map(|s| match s.kind.as_ref() {
                StmtKind::GateCall { name, .. } => name.as_ref(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["h", "cx", "h"]);
    }
}
