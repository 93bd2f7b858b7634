// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A read-only walk over the AST. The Core Visitor in `qasm_sem` does not
//! use this trait for unrolling (it needs to produce a rewritten output
//! list, not just observe), but analyzer helpers that only need to collect
//! information — touched qubits for idle-qubit pruning, a `has_barriers`
//! check, span lookups for `compare()` — implement it instead of writing
//! another bespoke recursive function.

use crate::ast::{
    Expr, ExprKind, GateOperand, IndexKind, Program, Stmt, StmtKind,
};

pub trait Visitor<'a>: Sized {
    fn visit_program(&mut self, program: &'a Program) {
        walk_program(self, program);
    }

    fn visit_stmt(&mut self, stmt: &'a Stmt) {
        walk_stmt(self, stmt);
    }

    fn visit_expr(&mut self, expr: &'a Expr) {
        walk_expr(self, expr);
    }

    fn visit_gate_operand(&mut self, _operand: &'a GateOperand) {}
}

pub fn walk_program<'a, V: Visitor<'a>>(vis: &mut V, program: &'a Program) {
    for stmt in &program.statements {
        vis.visit_stmt(stmt);
    }
}

fn walk_block<'a, V: Visitor<'a>>(vis: &mut V, block: &'a [Stmt]) {
    for stmt in block {
        vis.visit_stmt(stmt);
    }
}

pub fn walk_stmt<'a, V: Visitor<'a>>(vis: &mut V, stmt: &'a Stmt) {
    match stmt.kind.as_ref() {
        StmtKind::Include(_)
        | StmtKind::QubitDecl { .. }
        | StmtKind::Pulse { .. }
        | StmtKind::IODecl { .. }
        | StmtKind::Pragma(_)
        | StmtKind::Annotation(_)
        | StmtKind::CRegDecl { .. } => {}
        StmtKind::ClassicalDecl { init, .. } => {
            if let Some(init) = init {
                vis.visit_expr(init);
            }
        }
        StmtKind::Alias { value, .. } => vis.visit_expr(value),
        StmtKind::GateDef { body, .. } | StmtKind::SubroutineDef { body, .. } => {
            walk_block(vis, body);
        }
        StmtKind::GateCall { args, qubits, .. } => {
            for arg in args {
                vis.visit_expr(arg);
            }
            for q in qubits {
                vis.visit_gate_operand(q);
            }
        }
        StmtKind::Reset(op) => vis.visit_gate_operand(op),
        StmtKind::Barrier(ops) => {
            for op in ops {
                vis.visit_gate_operand(op);
            }
        }
        StmtKind::Measure { qubit, .. } | StmtKind::MeasureArrow { qubit, .. } => {
            vis.visit_gate_operand(qubit);
        }
        StmtKind::Assign { value, .. } => vis.visit_expr(value),
        StmtKind::ExprStmt(e) => vis.visit_expr(e),
        StmtKind::If {
            cond,
            then_block,
            else_block,
        } => {
            vis.visit_expr(cond);
            walk_block(vis, then_block);
            if let Some(else_block) = else_block {
                walk_block(vis, else_block);
            }
        }
        StmtKind::Switch {
            target,
            cases,
            default,
        } => {
            vis.visit_expr(target);
            for (labels, body) in cases {
                for label in labels {
                    vis.visit_expr(label);
                }
                walk_block(vis, body);
            }
            if let Some(default) = default {
                walk_block(vis, default);
            }
        }
        StmtKind::For { body, .. } => walk_block(vis, body),
        StmtKind::While { cond, body } => {
            vis.visit_expr(cond);
            walk_block(vis, body);
        }
        StmtKind::Delay { duration, qubits } => {
            vis.visit_expr(duration);
            for op in qubits {
                vis.visit_gate_operand(op);
            }
        }
        StmtKind::Box_ { duration, body } => {
            if let Some(duration) = duration {
                vis.visit_expr(duration);
            }
            walk_block(vis, body);
        }
    }
}

pub fn walk_expr<'a, V: Visitor<'a>>(vis: &mut V, expr: &'a Expr) {
    match expr.kind.as_ref() {
        ExprKind::Lit(_) | ExprKind::Ident(_) | ExprKind::HardwareQubit(_) => {}
        ExprKind::Paren(e) | ExprKind::Unary(_, e) => vis.visit_expr(e),
        ExprKind::Binary(_, l, r) | ExprKind::Concat(l, r) => {
            vis.visit_expr(l);
            vis.visit_expr(r);
        }
        ExprKind::Cast(_, e) => vis.visit_expr(e),
        ExprKind::Index(e, idx) => {
            vis.visit_expr(e);
            walk_index(vis, idx);
        }
        ExprKind::Call(_, args) => {
            for arg in args {
                vis.visit_expr(arg);
            }
        }
        ExprKind::Measure(op) => vis.visit_gate_operand(op),
    }
}

fn walk_index<'a, V: Visitor<'a>>(vis: &mut V, idx: &'a IndexKind) {
    match idx {
        IndexKind::Single(e) => vis.visit_expr(e),
        IndexKind::Range(lo, hi, step) => {
            for e in [lo, step, hi].into_iter().flatten() {
                vis.visit_expr(e);
            }
        }
        IndexKind::Set(items) => {
            for e in items {
                vis.visit_expr(e);
            }
        }
    }
}
