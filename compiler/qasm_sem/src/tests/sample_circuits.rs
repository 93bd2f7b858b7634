// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Small end-to-end circuits driven through `Module::unroll`/`rebase`,
//! exercising broadcast, duplicate-qubit detection, idle-qubit pruning
//! and basis rebasing together rather than one pass at a time.

use qasm_ast::ast::{Expr, ExprKind, GateOperand, IndexKind, Literal, Program, Stmt, StmtKind, Version};
use qasm_data_structures::span::Span;

use crate::config::{CompilerConfig, TargetBasis};
use crate::module::{Module, UnrollParams};

fn lit(n: i64) -> Expr {
    Expr::new(Span::default(), ExprKind::Lit(Literal::Int(n)))
}

fn qubit_decl(name: &str, size: i64) -> Stmt {
    Stmt::new(
        Span::default(),
        StmtKind::QubitDecl {
            name: name.into(),
            size: Some(lit(size)),
        },
    )
}

fn whole_reg(name: &str) -> GateOperand {
    GateOperand::Ident { name: name.into(), index: None }
}

fn indexed(name: &str, i: i64) -> GateOperand {
    GateOperand::Ident {
        name: name.into(),
        index: Some(IndexKind::Single(lit(i))),
    }
}

fn gate_call(name: &str, args: Vec<Expr>, qubits: Vec<GateOperand>) -> Stmt {
    Stmt::new(
        Span::default(),
        StmtKind::GateCall {
            modifiers: vec![],
            name: name.into(),
            args,
            qubits,
        },
    )
}

fn program(statements: Vec<Stmt>) -> Program {
    Program {
        version: Version::default(),
        statements,
    }
}

fn module(statements: Vec<Stmt>) -> Module {
    Module::loads(program(statements), CompilerConfig::default())
}

#[test]
fn broadcasting_a_two_qubit_gate_over_two_registers_pairs_them_elementwise() {
    let unrolled = module(vec![
        qubit_decl("q", 2),
        qubit_decl("anc", 2),
        gate_call("cx", vec![], vec![whole_reg("q"), whole_reg("anc")]),
    ])
    .unroll(&UnrollParams::default())
    .unwrap();

    let calls: Vec<_> = unrolled
        .dumps()
        .statements
        .iter()
        .filter(|s| matches!(s.kind.as_ref(), StmtKind::GateCall { name, .. } if &**name == "cx"))
        .collect();
    assert_eq!(calls.len(), 2);
    let StmtKind::GateCall { qubits, .. } = calls[0].kind.as_ref() else {
        unreachable!()
    };
    assert_eq!(qubits, &vec![GateOperand::HardwareQubit(0), GateOperand::HardwareQubit(2)]);
}

#[test]
fn broadcasting_a_register_against_itself_reports_the_duplicate_qubit() {
    let result = module(vec![qubit_decl("q", 2), gate_call("cx", vec![], vec![whole_reg("q"), whole_reg("q")])])
        .unroll(&UnrollParams::default());
    assert!(matches!(result, Err(ref e) if matches!(e.error(), crate::error::Error::DuplicateQubit(_, _))));
}

#[test]
fn a_single_call_naming_the_same_qubit_twice_also_errors() {
    let result = module(vec![
        qubit_decl("q", 2),
        gate_call("cx", vec![], vec![indexed("q", 0), indexed("q", 0)]),
    ])
    .unroll(&UnrollParams::default());
    assert!(result.is_err());
}

#[test]
fn idle_qubits_are_pruned_and_the_touched_ones_renumbered_contiguously() {
    let unrolled = module(vec![
        qubit_decl("q", 3),
        gate_call("x", vec![], vec![indexed("q", 0)]),
        gate_call("x", vec![], vec![indexed("q", 2)]),
    ])
    .unroll(&UnrollParams::default())
    .unwrap();
    assert_eq!(unrolled.num_qubits(), 3);

    let pruned = unrolled.remove_idle_qubits();
    assert_eq!(pruned.num_qubits(), 2);
}

#[test]
fn unrolling_then_rebasing_replaces_h_with_the_rotational_cx_decomposition() {
    let rebased = module(vec![qubit_decl("q", 1), gate_call("h", vec![], vec![indexed("q", 0)])])
        .unroll(&UnrollParams::default())
        .unwrap()
        .rebase(TargetBasis::RotationalCx)
        .unwrap();

    let names: Vec<&str> = rebased
        .dumps()
        .statements
        .iter()
        .filter_map(|s| match s.kind.as_ref() {
            StmtKind::GateCall { name, .. } => Some(name.as_ref()),
            _ => None,
        })
        .collect();
    assert!(!names.contains(&"h"));
    assert!(names.contains(&"ry") || names.contains(&"rx"));
}

#[test]
fn a_tier_2_decomposable_gate_unrolls_away_into_intrinsics_only() {
    let unrolled = module(vec![
        qubit_decl("q", 2),
        gate_call("crz", vec![lit(1)], vec![indexed("q", 0), indexed("q", 1)]),
    ])
    .unroll(&UnrollParams::default())
    .unwrap();

    let names: Vec<&str> = unrolled
        .dumps()
        .statements
        .iter()
        .filter_map(|s| match s.kind.as_ref() {
            StmtKind::GateCall { name, .. } => Some(name.as_ref()),
            _ => None,
        })
        .collect();
    assert!(!names.contains(&"crz"), "crz should have decomposed, found {names:?}");
    assert!(names.contains(&"rz"));
    assert!(names.contains(&"cx"));
}

#[test]
fn cswap_decomposes_to_the_fredkin_cx_ccx_cx_form() {
    let unrolled = module(vec![
        qubit_decl("q", 3),
        gate_call(
            "cswap",
            vec![],
            vec![indexed("q", 0), indexed("q", 1), indexed("q", 2)],
        ),
    ])
    .unroll(&UnrollParams::default())
    .unwrap();

    let names: Vec<&str> = unrolled
        .dumps()
        .statements
        .iter()
        .filter_map(|s| match s.kind.as_ref() {
            StmtKind::GateCall { name, .. } => Some(name.as_ref()),
            _ => None,
        })
        .collect();
    assert!(!names.contains(&"cswap"));
    assert_eq!(names.iter().filter(|n| **n == "cx").count(), 2);
    assert_eq!(names.iter().filter(|n| **n == "ccx").count(), 1);
}

#[test]
fn a_multibit_equality_branch_unrolls_to_a_nested_single_bit_if_chain() {
    use qasm_ast::ast::BinOp;

    let cond = Expr::new(
        Span::default(),
        ExprKind::Binary(BinOp::Eq, Expr::new(Span::default(), ExprKind::Ident("c".into())), lit(3)),
    );
    let if_stmt = Stmt::new(
        Span::default(),
        StmtKind::If {
            cond,
            then_block: vec![gate_call("h", vec![], vec![indexed("q", 0)])],
            else_block: None,
        },
    );
    let unrolled = module(vec![
        qubit_decl("q", 1),
        Stmt::new(Span::default(), StmtKind::CRegDecl { name: "c".into(), size: Some(lit(4)) }),
        if_stmt,
    ])
    .unroll(&UnrollParams::default())
    .unwrap();

    let mut stmt = unrolled.dumps().statements.last().expect("nested if present");
    for want in [false, false, true, true] {
        match stmt.kind.as_ref() {
            StmtKind::If { cond, then_block, .. } => {
                let ExprKind::Binary(op, _, rhs) = cond.kind.as_ref() else {
                    panic!("expected a binary comparison, got {cond:?}");
                };
                assert!(matches!(op, BinOp::Eq));
                assert!(matches!(rhs.kind.as_ref(), ExprKind::Lit(Literal::Bit(b)) if *b == want));
                stmt = then_block.first().unwrap_or(then_block.last().expect("non-empty arm"));
            }
            other => panic!("expected nested If, got {other:?}"),
        }
    }
}

#[test]
fn depth_accounts_for_a_two_qubit_gate_synchronizing_both_operands() {
    let unrolled = module(vec![
        qubit_decl("q", 2),
        gate_call("x", vec![], vec![indexed("q", 0)]),
        gate_call("cx", vec![], vec![indexed("q", 0), indexed("q", 1)]),
    ])
    .unroll(&UnrollParams::default())
    .unwrap();
    assert_eq!(unrolled.depth(), 2);
}
