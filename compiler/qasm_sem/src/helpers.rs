// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stand-alone analyzer helpers used by [`crate::module::Module`] that
//! don't need the full lowering pass: idle-qubit pruning, qubit-order
//! reversal, bit-string decoding, multi-bit branch expansion, and the
//! structural `compare()` used by tests.

use qasm_ast::ast::{Expr, GateOperand, Program, Stmt, StmtKind};
use qasm_ast::visit::{walk_program, Visitor};
use rustc_hash::{FxHashMap, FxHashSet};

/// Bit strings (`"101"` literals and `creg`/`bit[n]` comparisons) are
/// read MSB-first throughout this crate: the leftmost character is bit
/// `n-1`, matching the convention OpenQASM 3's own `bit[n]` literal
/// syntax uses and the one the retrieved lowerer tests assume.
#[must_use]
pub fn bitstring_to_bits(s: &str) -> Vec<bool> {
    s.chars().filter(|c| *c == '0' || *c == '1').map(|c| c == '1').collect()
}

struct TouchedQubits {
    ids: FxHashSet<u32>,
}

impl<'a> Visitor<'a> for TouchedQubits {
    fn visit_gate_operand(&mut self, operand: &'a GateOperand) {
        // Named-register operands are resolved to flat ids by the
        // lowerer against the register file built during `validate`;
        // this pass only collects hardware qubits, which need no such
        // resolution.
        if let GateOperand::HardwareQubit(n) = operand {
            self.ids.insert(*n);
        }
    }
}

/// Finds every `GateOperand::HardwareQubit` referenced anywhere in
/// `program`. Named-register operands are resolved against the register
/// file by the caller, since that requires the symbol table built during
/// `validate`.
#[must_use]
pub fn touched_hardware_qubits(program: &Program) -> FxHashSet<u32> {
    let mut visitor = TouchedQubits {
        ids: FxHashSet::default(),
    };
    walk_program(&mut visitor, program);
    visitor.ids
}

/// Expands a `switch` or multi-bit `if` condition of the form
/// `creg == value` into the list of bit patterns (as `bool` vectors,
/// MSB-first) that satisfy it, used when lowering a comparison against a
/// classical register wider than one bit into the primitive per-bit
/// branches the flattened output is built from.
#[must_use]
pub fn expand_equality_patterns(width: u32, target: u64) -> Vec<bool> {
    (0..width)
        .rev()
        .map(|bit| (target >> bit) & 1 == 1)
        .collect()
}

/// A structural, span-insensitive comparison between two flattened
/// programs: same statement count, and each pair of statements has the
/// same `StmtKind` discriminant and, for gate calls, the same gate name
/// and operand count. Used by `Module::compare` to check that a rebase
/// or idle-qubit removal pass didn't change the circuit's shape in an
/// unexpected way.
#[must_use]
pub fn compare_statements(a: &[Stmt], b: &[Stmt]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).all(|(x, y)| stmt_shape_eq(&x.kind, &y.kind))
}

fn stmt_shape_eq(a: &StmtKind, b: &StmtKind) -> bool {
    match (a, b) {
        (
            StmtKind::GateCall {
                name: n1, qubits: q1, ..
            },
            StmtKind::GateCall {
                name: n2, qubits: q2, ..
            },
        ) => n1 == n2 && q1.len() == q2.len(),
        (StmtKind::Reset(_), StmtKind::Reset(_))
        | (StmtKind::Barrier(_), StmtKind::Barrier(_))
        | (StmtKind::Measure { .. }, StmtKind::Measure { .. })
        | (StmtKind::QubitDecl { .. }, StmtKind::QubitDecl { .. })
        | (StmtKind::ClassicalDecl { .. }, StmtKind::ClassicalDecl { .. }) => true,
        _ => std::mem::discriminant(a) == std::mem::discriminant(b),
    }
}

/// The result of [`crate::module::Module::compare`]: whether two
/// flattened programs have the same shape, and if not, the index of the
/// first statement where they diverge (by length or by kind).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompareReport {
    pub equal: bool,
    pub first_divergence: Option<usize>,
}

#[must_use]
pub fn compare_report(a: &[Stmt], b: &[Stmt]) -> CompareReport {
    let shorter = a.len().min(b.len());
    for i in 0..shorter {
        if !stmt_shape_eq(&a[i].kind, &b[i].kind) {
            return CompareReport {
                equal: false,
                first_divergence: Some(i),
            };
        }
    }
    if a.len() == b.len() {
        CompareReport {
            equal: true,
            first_divergence: None,
        }
    } else {
        CompareReport {
            equal: false,
            first_divergence: Some(shorter),
        }
    }
}

/// Rewrites every `GateOperand::HardwareQubit` id in `stmts` through
/// `map`, recursing into the branch bodies an un-resolved `if` kept
/// after unrolling. Ids with no entry in `map` are left untouched (used
/// by callers, like `populate_idle_qubits`, that only need to shift a
/// subset of ids).
pub fn remap_hardware_qubits(stmts: &mut [Stmt], map: &FxHashMap<u32, u32>) {
    for stmt in stmts {
        remap_stmt(stmt, map);
    }
}

fn remap_operand(operand: &mut GateOperand, map: &FxHashMap<u32, u32>) {
    if let GateOperand::HardwareQubit(id) = operand {
        if let Some(new_id) = map.get(id) {
            *id = *new_id;
        }
    }
}

fn remap_stmt(stmt: &mut Stmt, map: &FxHashMap<u32, u32>) {
    match stmt.kind.as_mut() {
        StmtKind::GateCall { qubits, .. } => {
            for q in qubits {
                remap_operand(q, map);
            }
        }
        StmtKind::Reset(op) => remap_operand(op, map),
        StmtKind::Barrier(ops) => {
            for op in ops {
                remap_operand(op, map);
            }
        }
        StmtKind::Measure { qubit, .. } | StmtKind::MeasureArrow { qubit, .. } => {
            remap_operand(qubit, map);
        }
        StmtKind::Delay { qubits, .. } => {
            for op in qubits {
                remap_operand(op, map);
            }
        }
        StmtKind::If {
            then_block,
            else_block,
            ..
        } => {
            remap_hardware_qubits(then_block, map);
            if let Some(else_block) = else_block {
                remap_hardware_qubits(else_block, map);
            }
        }
        StmtKind::Box_ { body, .. } => remap_hardware_qubits(body, map),
        _ => {}
    }
}

/// Drops every statement matching `keep == false`, recursing into the
/// branch bodies of an un-resolved `if` so `remove_measurements` and
/// `remove_barriers` reach measurements/barriers nested under a dynamic
/// condition rather than only the top level.
pub fn retain_stmts(stmts: &mut Vec<Stmt>, keep: impl Fn(&StmtKind) -> bool + Copy) {
    let mut out = Vec::with_capacity(stmts.len());
    for mut stmt in stmts.drain(..) {
        if !keep(&stmt.kind) {
            continue;
        }
        if let StmtKind::If {
            then_block,
            else_block,
            ..
        } = stmt.kind.as_mut()
        {
            retain_stmts(then_block, keep);
            if let Some(else_block) = else_block {
                retain_stmts(else_block, keep);
            }
        }
        out.push(stmt);
    }
    *stmts = out;
}

fn lit_int(value: i64, span: qasm_data_structures::span::Span) -> Expr {
    Expr::new(span, qasm_ast::ast::ExprKind::Lit(qasm_ast::ast::Literal::Int(value)))
}

/// Rewrites a `QubitDecl`'s declared size in place, used after idle-qubit
/// pruning or padding has changed a register's qubit count.
pub fn set_qubit_decl_size(stmt: &mut Stmt, new_size: u32) {
    if let StmtKind::QubitDecl { size, .. } = stmt.kind.as_mut() {
        *size = Some(lit_int(i64::from(new_size), stmt.span));
    }
}

#[cfg(test)]
mod tests {
    use super::{bitstring_to_bits, expand_equality_patterns};

    #[test]
    fn bitstring_decodes_msb_first() {
        assert_eq!(bitstring_to_bits("101"), vec![true, false, true]);
    }

    #[test]
    fn equality_pattern_matches_manual_bit_extraction() {
        // 0b0110 == 6, width 4, MSB first -> [0,1,1,0]
        assert_eq!(
            expand_equality_patterns(4, 6),
            vec![false, true, true, false]
        );
    }
}
