// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The Core Visitor: a tree walk over a [`Program`] that checks it and,
//! in the same pass, produces the flattened equivalent — every `for`/
//! `while` loop unrolled, every `if`/`switch` with a resolvable condition
//! reduced to its taken arm, every gate definition inlined at its call
//! sites, every alias resolved to the registers it names, and every
//! modifier (`inv`/`pow`/`ctrl`/`negctrl`) folded into plain gate calls.
//!
//! Unlike `qasm_ast::visit::Visitor`, this is not a read-only walk: it
//! owns the statement list being built (`self.output`) and the
//! classical/qubit state (`ScopeStack`, `RegisterFile`) that the walk
//! both reads and mutates as declarations are seen.

use qasm_ast::ast::{
    AssignOp, BinOp, Expr, ExprKind, ForIter, GateOperand, IndexKind, LValue, Literal, Modifier,
    Program, Stmt, StmtKind, TypeDef, Version,
};
use qasm_data_structures::span::Span;
use rustc_hash::FxHashMap;
use std::rc::Rc;

use crate::config::CompilerConfig;
use crate::depth::DepthTracker;
use crate::error::Error;
use crate::eval::{eval, resolve_type};
use crate::gates::{
    broadcast_length, check_arity, check_basis, check_broadcast_lengths, intrinsic_arity,
};
use crate::helpers::expand_equality_patterns;
use crate::registers::{Id, RegisterFile};
use crate::scope::{Alias, GateDecl, ScopeStack, SubroutineDecl, Variable};
use crate::types::Value;

/// The result of a successful lowering pass: the flattened program plus
/// the side information [`crate::module::Module`] exposes without
/// re-walking the tree.
pub struct LoweredProgram {
    pub program: Program,
    pub registers: RegisterFile,
    pub depth: DepthTracker,
    pub has_measurements: bool,
    pub has_barriers: bool,
}

/// Gates whose inverse is another named intrinsic rather than the same
/// gate (self-inverse gates are handled by falling through unchanged).
const INVERSE_PAIRS: &[(&str, &str)] = &[("s", "sdg"), ("sdg", "s"), ("t", "tdg"), ("tdg", "t")];

/// Rotation-family gates whose inverse is the same gate with a negated
/// angle argument.
const NEGATE_ANGLE_GATES: &[&str] = &["rx", "ry", "rz", "p", "u"];

pub fn lower(program: &Program, config: &CompilerConfig) -> Result<LoweredProgram, Error> {
    let mut lowerer = Lowerer::new(config);
    lowerer.lower_block(&program.statements)?;
    Ok(LoweredProgram {
        program: Program {
            version: program.version,
            statements: lowerer.output,
        },
        registers: lowerer.registers,
        depth: lowerer.depth,
        has_measurements: lowerer.has_measurements,
        has_barriers: lowerer.has_barriers,
    })
}

struct Lowerer<'cfg> {
    config: &'cfg CompilerConfig,
    scope: ScopeStack,
    registers: RegisterFile,
    depth: DepthTracker,
    output: Vec<Stmt>,
    has_measurements: bool,
    has_barriers: bool,
    /// Formal qubit parameter -> concrete id, pushed when inlining a gate
    /// body; checked before the register/alias namespaces so a gate's own
    /// formal names shadow any same-named register in the caller.
    qubit_subst: Vec<FxHashMap<Rc<str>, Id>>,
    /// Accumulated control qubits from enclosing `ctrl`-modified inlined
    /// gate calls, applied to every intrinsic emitted while inlining.
    ctrl_stack: Vec<Id>,
    negctrl_stack: Vec<Id>,
}

impl<'cfg> Lowerer<'cfg> {
    fn new(config: &'cfg CompilerConfig) -> Self {
        Self {
            config,
            scope: ScopeStack::new(),
            registers: RegisterFile::new(),
            depth: DepthTracker::new(),
            output: Vec::new(),
            has_measurements: false,
            has_barriers: false,
            qubit_subst: Vec::new(),
            ctrl_stack: Vec::new(),
            negctrl_stack: Vec::new(),
        }
    }

    fn lower_block(&mut self, block: &[Stmt]) -> Result<(), Error> {
        for stmt in block {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    fn push(&mut self, kind: StmtKind, span: Span) {
        self.output.push(Stmt::new(span, kind));
    }

    #[allow(clippy::too_many_lines)]
    fn lower_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        let span = stmt.span;
        log::trace!("lowering statement at {span}: {}", stmt_kind_name(stmt.kind.as_ref()));
        match stmt.kind.as_ref() {
            StmtKind::Include(path) => {
                if !self.scope.is_global() {
                    return Err(Error::IncludeNotInGlobalScope(path.to_string(), span));
                }
                if self.config.unroll_options.contains(crate::config::UnrollOptions::PRESERVE_INCLUDES) {
                    self.push(StmtKind::Include(path.clone()), span);
                }
                Ok(())
            }
            StmtKind::QubitDecl { name, size } => {
                if self.registers.qubit_register(name).is_some() {
                    return Err(Error::RedefinedSymbol(name.to_string(), span));
                }
                let size = match size {
                    Some(e) => self.eval_usize(e)?,
                    None => 1,
                };
                self.registers.declare_qubits(name.clone(), size);
                self.push(
                    StmtKind::QubitDecl {
                        name: name.clone(),
                        size: Some(lit_int(size.into(), span)),
                    },
                    span,
                );
                Ok(())
            }
            StmtKind::CRegDecl { name, size } => {
                if self.registers.clbit_register(name).is_some() {
                    return Err(Error::RedefinedSymbol(name.to_string(), span));
                }
                let size = match size {
                    Some(e) => self.eval_usize(e)?,
                    None => 1,
                };
                self.registers.declare_clbits(name.clone(), size);
                self.push(
                    StmtKind::ClassicalDecl {
                        ty: TypeDef::BitArray(Some(lit_int(size.into(), span))),
                        name: name.clone(),
                        init: None,
                        is_const: false,
                    },
                    span,
                );
                Ok(())
            }
            StmtKind::ClassicalDecl {
                ty,
                name,
                init,
                is_const,
            } => self.lower_classical_decl(ty, name, init.as_ref(), *is_const, span),
            StmtKind::Alias { name, value } => self.lower_alias(name, value, span),
            StmtKind::GateDef {
                name,
                params,
                qubits,
                body,
            } => {
                self.scope.declare_gate(
                    name.clone(),
                    GateDecl {
                        params: params.clone(),
                        qubits: qubits.clone(),
                        body: Rc::from(body.clone()),
                    },
                    span,
                )?;
                Ok(())
            }
            StmtKind::SubroutineDef {
                name,
                params,
                return_ty,
                body,
            } => {
                let return_ty = match return_ty {
                    Some(ty) => Some(resolve_type(ty, &self.scope)?),
                    None => None,
                };
                self.scope.declare_subroutine(
                    name.clone(),
                    SubroutineDecl {
                        params: params.clone(),
                        return_ty,
                        body: Rc::from(body.clone()),
                    },
                    span,
                )?;
                Ok(())
            }
            StmtKind::GateCall {
                modifiers,
                name,
                args,
                qubits,
            } => self.lower_gate_call(modifiers, name, args, qubits, span),
            StmtKind::Reset(operand) => {
                let ids = self.resolve_operand(operand)?;
                for id in &ids {
                    self.depth.touch(&[*id], &[]);
                    self.push(StmtKind::Reset(GateOperand::HardwareQubit(*id)), span);
                }
                Ok(())
            }
            StmtKind::Barrier(operands) => {
                self.has_barriers = true;
                let mut ids = Vec::new();
                for op in operands {
                    ids.extend(self.resolve_operand(op)?);
                }
                self.depth.sync_barrier(&ids);
                if self
                    .config
                    .unroll_options
                    .contains(crate::config::UnrollOptions::PRESERVE_BARRIERS)
                {
                    let flat_operands = ids.iter().map(|id| GateOperand::HardwareQubit(*id)).collect();
                    self.push(StmtKind::Barrier(flat_operands), span);
                }
                Ok(())
            }
            StmtKind::Measure { qubit, target } => {
                self.has_measurements = true;
                let ids = self.resolve_operand(qubit)?;
                for id in &ids {
                    self.depth.touch(&[*id], &[]);
                }
                match target {
                    Some(lvalue) => {
                        self.check_lvalue_assignable(lvalue, span)?;
                        self.emit_measurements(&ids, lvalue, span);
                    }
                    None => {
                        for id in &ids {
                            self.push(
                                StmtKind::Measure {
                                    qubit: GateOperand::HardwareQubit(*id),
                                    target: None,
                                },
                                span,
                            );
                        }
                    }
                }
                Ok(())
            }
            StmtKind::MeasureArrow { qubit, target } => {
                self.has_measurements = true;
                let ids = self.resolve_operand(qubit)?;
                for id in &ids {
                    self.depth.touch(&[*id], &[]);
                }
                self.check_lvalue_assignable(target, span)?;
                self.emit_measurements(&ids, target, span);
                Ok(())
            }
            StmtKind::Assign { lvalue, op, value } => self.lower_assign(lvalue, *op, value, span),
            StmtKind::ExprStmt(expr) => self.lower_expr_stmt(expr, span),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => self.lower_if(cond, then_block, else_block.as_deref(), span),
            StmtKind::Switch {
                target,
                cases,
                default,
            } => self.lower_switch(target, cases, default.as_deref(), span),
            StmtKind::For { var, ty, iter, body } => self.lower_for(var, ty.as_ref(), iter, body, span),
            StmtKind::While { cond, body } => self.lower_while(cond, body, span),
            StmtKind::Delay { duration, qubits } => {
                let _ = self.eval_const_or_skip(duration);
                let mut ids = Vec::new();
                for op in qubits {
                    ids.extend(self.resolve_operand(op)?);
                }
                self.push(
                    StmtKind::Delay {
                        duration: duration.clone(),
                        qubits: ids.iter().map(|id| GateOperand::HardwareQubit(*id)).collect(),
                    },
                    span,
                );
                Ok(())
            }
            StmtKind::Box_ { duration, body } => {
                self.scope.push();
                let result = self.lower_block(body);
                self.scope.pop();
                result?;
                let _ = duration;
                Ok(())
            }
            StmtKind::Pulse { text } => {
                self.push(StmtKind::Pulse { text: text.clone() }, span);
                Ok(())
            }
            StmtKind::IODecl { text } => {
                self.push(StmtKind::IODecl { text: text.clone() }, span);
                Ok(())
            }
            StmtKind::Pragma(text) => {
                if self
                    .config
                    .unroll_options
                    .contains(crate::config::UnrollOptions::PRESERVE_PRAGMAS)
                {
                    self.push(StmtKind::Pragma(text.clone()), span);
                }
                Ok(())
            }
            StmtKind::Annotation(text) => {
                if self
                    .config
                    .unroll_options
                    .contains(crate::config::UnrollOptions::PRESERVE_PRAGMAS)
                {
                    self.push(StmtKind::Annotation(text.clone()), span);
                }
                Ok(())
            }
        }
    }

    /// Emits one `Measure` per resolved qubit id against `lvalue`,
    /// indexing into it element-wise when `ids` names a whole register
    /// (a broadcast measurement like `c = measure q;` with both `n`-wide).
    fn emit_measurements(&mut self, ids: &[Id], lvalue: &LValue, span: Span) {
        if ids.len() == 1 {
            self.push(
                StmtKind::Measure {
                    qubit: GateOperand::HardwareQubit(ids[0]),
                    target: Some(lvalue.clone()),
                },
                span,
            );
            return;
        }
        let name = match lvalue {
            LValue::Ident(name) | LValue::Indexed { name, .. } => name.clone(),
        };
        for (i, id) in ids.iter().enumerate() {
            self.push(
                StmtKind::Measure {
                    qubit: GateOperand::HardwareQubit(*id),
                    target: Some(LValue::Indexed {
                        name: name.clone(),
                        index: IndexKind::Single(lit_int(i as i64, span)),
                    }),
                },
                span,
            );
        }
    }

    fn eval_usize(&self, expr: &Expr) -> Result<u32, Error> {
        let value = eval(expr, &self.scope)?;
        value
            .as_i64()
            .filter(|n| *n >= 0)
            .map(|n| n as u32)
            .ok_or(Error::WidthRequired(expr.span))
    }

    fn eval_const_or_skip(&self, expr: &Expr) -> Option<Value> {
        eval(expr, &self.scope).ok()
    }

    fn lower_classical_decl(
        &mut self,
        ty: &TypeDef,
        name: &Rc<str>,
        init: Option<&Expr>,
        is_const: bool,
        span: Span,
    ) -> Result<(), Error> {
        let resolved_ty = resolve_type(ty, &self.scope)?;
        let value = match init {
            Some(expr) => Some(eval(expr, &self.scope)?.cast(&resolved_ty, span)?),
            None => None,
        };
        if is_const && value.is_none() {
            return Err(Error::Unimplemented(
                "const declaration without an initializer".to_string(),
                span,
            ));
        }
        self.scope.declare_variable(
            name.clone(),
            Variable {
                ty: resolved_ty,
                is_const,
                is_loop_binding: false,
                external: false,
                value: value.clone(),
            },
            span,
        )?;
        let folded_init = value.as_ref().and_then(value_to_literal_expr(span));
        self.push(
            StmtKind::ClassicalDecl {
                ty: ty.clone(),
                name: name.clone(),
                init: folded_init.or_else(|| init.cloned()),
                is_const,
            },
            span,
        );
        Ok(())
    }

    fn lower_alias(&mut self, name: &Rc<str>, value: &Expr, span: Span) -> Result<(), Error> {
        if let Some(ids) = self.try_resolve_qubit_alias_expr(value)? {
            self.scope
                .declare_qubit_alias(name.clone(), Alias { ids }, span)?;
            return Ok(());
        }
        if let Some(ids) = self.try_resolve_clbit_alias_expr(value) {
            self.scope
                .declare_clbit_alias(name.clone(), Alias { ids }, span)?;
            return Ok(());
        }
        Err(Error::InconsistentTypesInAlias(name.to_string(), span))
    }

    fn try_resolve_qubit_alias_expr(&mut self, expr: &Expr) -> Result<Option<Vec<Id>>, Error> {
        match expr.kind.as_ref() {
            ExprKind::Ident(name) if self.registers.qubit_register(name).is_some() => {
                let reg = self.registers.qubit_register(name).expect("checked above");
                Ok(Some((reg.base..reg.base + reg.size).collect()))
            }
            ExprKind::Ident(name) if self.scope.lookup_qubit_alias(name).is_some() => {
                Ok(self.scope.lookup_qubit_alias(name).map(|a| a.ids.clone()))
            }
            ExprKind::Index(base, idx) => {
                let Some(base_ids) = self.try_resolve_qubit_alias_expr(base)? else {
                    return Ok(None);
                };
                Ok(Some(self.select_indices(&base_ids, idx, expr.span)?))
            }
            ExprKind::Concat(lhs, rhs) => {
                let (l, r) = (
                    self.try_resolve_qubit_alias_expr(lhs)?,
                    self.try_resolve_qubit_alias_expr(rhs)?,
                );
                match (l, r) {
                    (Some(mut a), Some(b)) => {
                        a.extend(b);
                        Ok(Some(a))
                    }
                    _ => Ok(None),
                }
            }
            _ => Ok(None),
        }
    }

    fn try_resolve_clbit_alias_expr(&mut self, expr: &Expr) -> Option<Vec<Id>> {
        match expr.kind.as_ref() {
            ExprKind::Ident(name) => {
                if let Some(reg) = self.registers.clbit_register(name) {
                    return Some((reg.base..reg.base + reg.size).collect());
                }
                self.scope.lookup_clbit_alias(name).map(|a| a.ids.clone())
            }
            ExprKind::Index(base, idx) => {
                let base_ids = self.try_resolve_clbit_alias_expr(base)?;
                self.select_indices(&base_ids, idx, expr.span).ok()
            }
            ExprKind::Concat(lhs, rhs) => {
                let mut a = self.try_resolve_clbit_alias_expr(lhs)?;
                let b = self.try_resolve_clbit_alias_expr(rhs)?;
                a.extend(b);
                Some(a)
            }
            _ => None,
        }
    }

    fn select_indices(&self, ids: &[Id], idx: &IndexKind, span: Span) -> Result<Vec<Id>, Error> {
        match idx {
            IndexKind::Single(e) => {
                let i = eval(e, &self.scope)?.as_i64().ok_or(Error::WidthRequired(span))?;
                let normalized = if i < 0 { ids.len() as i64 + i } else { i };
                let id = *ids
                    .get(usize::try_from(normalized).unwrap_or(usize::MAX))
                    .ok_or(Error::IndexOutOfRange {
                        index: i,
                        size: ids.len(),
                        span,
                    })?;
                Ok(vec![id])
            }
            IndexKind::Range(lo, hi, step) => {
                let lo = lo.as_ref().map(|e| eval(e, &self.scope)).transpose()?.and_then(|v| v.as_i64()).unwrap_or(0);
                let hi = hi
                    .as_ref()
                    .map(|e| eval(e, &self.scope))
                    .transpose()?
                    .and_then(|v| v.as_i64())
                    .unwrap_or(ids.len() as i64 - 1);
                let step = step
                    .as_ref()
                    .map(|e| eval(e, &self.scope))
                    .transpose()?
                    .and_then(|v| v.as_i64())
                    .unwrap_or(1);
                let mut out = Vec::new();
                let mut i = lo;
                while (step > 0 && i <= hi) || (step < 0 && i >= hi) {
                    out.push(*ids.get(i as usize).ok_or(Error::IndexOutOfRange {
                        index: i,
                        size: ids.len(),
                        span,
                    })?);
                    i += step;
                }
                Ok(out)
            }
            IndexKind::Set(items) => {
                let mut out = Vec::new();
                for item in items {
                    let i = eval(item, &self.scope)?.as_i64().ok_or(Error::WidthRequired(span))?;
                    out.push(*ids.get(i as usize).ok_or(Error::IndexOutOfRange {
                        index: i,
                        size: ids.len(),
                        span,
                    })?);
                }
                Ok(out)
            }
        }
    }

    /// Resolves a qubit operand to the flat ids it names: one id for a
    /// single qubit, several for an unindexed whole register/alias
    /// (broadcast), substitution-stack entries taking priority over the
    /// register and alias namespaces.
    fn resolve_operand(&mut self, operand: &GateOperand) -> Result<Vec<Id>, Error> {
        match operand {
            GateOperand::HardwareQubit(n) => Ok(vec![self.registers.hardware_qubit(*n)]),
            GateOperand::Ident { name, index } => {
                for frame in self.qubit_subst.iter().rev() {
                    if let Some(id) = frame.get(name) {
                        return Ok(vec![*id]);
                    }
                }
                if let Some(reg) = self.registers.qubit_register(name).cloned() {
                    return match index {
                        None => Ok((reg.base..reg.base + reg.size).collect()),
                        Some(IndexKind::Single(e)) => {
                            let i = eval(e, &self.scope)?.as_i64().ok_or(Error::WidthRequired(e.span))?;
                            Ok(vec![self.registers.resolve_qubit_index(name, i, e.span)?])
                        }
                        Some(idx) => {
                            let all: Vec<Id> = (reg.base..reg.base + reg.size).collect();
                            self.select_indices(&all, idx, Span::default())
                        }
                    };
                }
                if let Some(alias) = self.scope.lookup_qubit_alias(name).cloned() {
                    return match index {
                        None => Ok(alias.ids),
                        Some(idx) => self.select_indices(&alias.ids, idx, Span::default()),
                    };
                }
                Err(Error::UndefinedSymbol(name.to_string(), Span::default()))
            }
        }
    }

    fn check_lvalue_assignable(&self, lvalue: &LValue, span: Span) -> Result<(), Error> {
        let name = match lvalue {
            LValue::Ident(name) | LValue::Indexed { name, .. } => name,
        };
        if self.registers.clbit_register(name).is_some() {
            return Ok(());
        }
        self.scope.check_assignable(name, span)
    }

    fn lower_assign(
        &mut self,
        lvalue: &LValue,
        op: AssignOp,
        value: &Expr,
        span: Span,
    ) -> Result<(), Error> {
        self.check_lvalue_assignable(lvalue, span)?;
        let name = match lvalue {
            LValue::Ident(name) | LValue::Indexed { name, .. } => name.clone(),
        };
        let rhs = eval(value, &self.scope)?;
        if let Some(var) = self.scope.lookup_variable(&name).cloned() {
            let new_value = if matches!(op, AssignOp::Assign) {
                rhs.cast(&var.ty, span)?
            } else {
                apply_compound(op, &var, &rhs, span)?
            };
            if let Some(slot) = self.scope.lookup_variable_mut(&name) {
                slot.value = Some(new_value);
            }
        }
        // Classical registers (`bit[n] c;`) backing measurement results are
        // not tracked as folded `Variable`s; an assignment to one is
        // inherently a runtime effect and is simply not constant-folded.
        Ok(())
    }

    fn lower_expr_stmt(&mut self, expr: &Expr, span: Span) -> Result<(), Error> {
        if let ExprKind::Call(name, args) = expr.kind.as_ref() {
            if let Some(decl) = self.scope.lookup_subroutine(name).cloned() {
                return self.inline_subroutine(&decl, args, span);
            }
        }
        let _ = eval(expr, &self.scope);
        Ok(())
    }

    fn inline_subroutine(
        &mut self,
        decl: &SubroutineDecl,
        args: &[Expr],
        span: Span,
    ) -> Result<(), Error> {
        if decl.params.len() != args.len() {
            return Err(Error::SubroutineArityMismatch {
                name: "subroutine".to_string(),
                expected: decl.params.len(),
                found: args.len(),
                span,
            });
        }
        self.scope.push();
        let mut qubit_frame = FxHashMap::default();
        for (param, arg) in decl.params.iter().zip(args) {
            if param.is_quantum {
                if let ExprKind::Measure(_) = arg.kind.as_ref() {
                    return Err(Error::TypeMismatch {
                        expected: "a qubit".to_string(),
                        found: "measurement result".to_string(),
                        span,
                    });
                }
                let operand = expr_as_gate_operand(arg).ok_or(Error::TypeMismatch {
                    expected: "a qubit".to_string(),
                    found: "classical expression".to_string(),
                    span,
                })?;
                let ids = self.resolve_operand(&operand)?;
                let Some(&id) = ids.first() else {
                    return Err(Error::QubitArityMismatch {
                        name: param.name.to_string(),
                        expected: 1,
                        found: 0,
                        span,
                    });
                };
                qubit_frame.insert(param.name.clone(), id);
            } else {
                let ty = resolve_type(&param.ty, &self.scope)?;
                let value = eval(arg, &self.scope)?.cast(&ty, span)?;
                self.scope.declare_variable(
                    param.name.clone(),
                    Variable {
                        ty,
                        is_const: true,
                        is_loop_binding: false,
                        external: false,
                        value: Some(value),
                    },
                    span,
                )?;
            }
        }
        self.qubit_subst.push(qubit_frame);
        let result = self.lower_block(&decl.body);
        self.qubit_subst.pop();
        self.scope.pop();
        result
    }

    #[allow(clippy::too_many_lines)]
    fn lower_gate_call(
        &mut self,
        modifiers: &[Modifier],
        name: &Rc<str>,
        args: &[Expr],
        qubits: &[GateOperand],
        span: Span,
    ) -> Result<(), Error> {
        let mut operand_ids = Vec::with_capacity(qubits.len());
        for q in qubits {
            operand_ids.push(self.resolve_operand(q)?);
        }
        let operand_lens: Vec<Option<usize>> = operand_ids
            .iter()
            .map(|ids| if ids.len() > 1 { Some(ids.len()) } else { None })
            .collect();
        check_broadcast_lengths(&operand_lens, span)?;
        let broadcast_n = broadcast_length(&operand_lens).unwrap_or(1);

        let mut ctrl_count = 0usize;
        let mut negctrl_count = 0usize;
        let mut const_pow: Option<i64> = None;
        let mut fractional_pow: Option<f64> = None;
        let mut inverted = false;
        for m in modifiers {
            match m {
                Modifier::Inv => inverted = !inverted,
                Modifier::Ctrl(n) => {
                    ctrl_count += match n {
                        Some(e) => self.eval_usize(e)? as usize,
                        None => 1,
                    };
                }
                Modifier::NegCtrl(n) => {
                    negctrl_count += match n {
                        Some(e) => self.eval_usize(e)? as usize,
                        None => 1,
                    };
                }
                Modifier::Pow(e) => match eval(e, &self.scope).ok().and_then(|v| v.as_i64()) {
                    Some(k) => const_pow = Some(k),
                    None => {
                        fractional_pow = eval(e, &self.scope).ok().and_then(|v| v.as_f64());
                    }
                },
            }
        }
        let total_controls = ctrl_count + negctrl_count;
        // A user-defined gate shadows a tier-2 catalog entry of the same
        // name; otherwise fall back to the fixed decomposition recipe
        // (`spec.md` §4.5 "Decomposables") if this name has one. Both are
        // inlined through the exact same `inline_gate_body` path below.
        let is_user_gate = self
            .scope
            .lookup_gate(name)
            .cloned()
            .or_else(|| crate::decompositions::lookup(name));

        if fractional_pow.is_some() && is_user_gate.is_some() {
            return Err(Error::UnsupportedFractionalPower(name.to_string(), span));
        }

        for i in 0..broadcast_n {
            let iter_qubits: Vec<Id> = operand_ids
                .iter()
                .zip(&operand_lens)
                .map(|(ids, len)| if len.is_some() { ids[i] } else { ids[0] })
                .collect();
            if iter_qubits.len() > 1 {
                crate::registers::check_no_duplicates(
                    &iter_qubits,
                    &qubits
                        .iter()
                        .map(|_| name.clone())
                        .collect::<Vec<_>>(),
                    span,
                )?;
            }
            let (control_ids, body_ids) = iter_qubits.split_at(total_controls.min(iter_qubits.len()));
            let neg_ids: Vec<Id> = control_ids[ctrl_count.min(control_ids.len())..].to_vec();

            let resolved_args = args
                .iter()
                .map(|a| eval(a, &self.scope))
                .collect::<Result<Vec<_>, _>>()?;

            let all_controls: Vec<Id> = self
                .ctrl_stack
                .iter()
                .copied()
                .chain(control_ids.iter().copied())
                .collect();
            let all_negctrls: Vec<Id> = self
                .negctrl_stack
                .iter()
                .copied()
                .chain(neg_ids.iter().copied())
                .collect();

            if let Some(decl) = &is_user_gate {
                check_arity(name, decl.qubits.len(), body_ids.len(), span)?;
                let repeat = const_pow.unwrap_or(1);
                let repeat_count = repeat.unsigned_abs() as usize;
                let body_inverted = inverted ^ (repeat < 0);

                for x in &all_negctrls {
                    self.push(StmtKind::GateCall {
                        modifiers: vec![],
                        name: "x".into(),
                        args: vec![],
                        qubits: vec![GateOperand::HardwareQubit(*x)],
                    }, span);
                }
                for _ in 0..repeat_count {
                    self.inline_gate_body(decl, &resolved_args, body_ids, &all_controls, &all_negctrls, body_inverted, span)?;
                }
                for x in &all_negctrls {
                    self.push(StmtKind::GateCall {
                        modifiers: vec![],
                        name: "x".into(),
                        args: vec![],
                        qubits: vec![GateOperand::HardwareQubit(*x)],
                    }, span);
                }
            } else {
                let arity = intrinsic_arity(name);
                let is_external = arity.is_none() && self.config.external_gates.contains(name.as_ref());
                if arity.is_none() && !is_external {
                    return Err(Error::UnknownGate(name.to_string(), span));
                }
                if let Some(arity) = arity {
                    check_arity(name, arity, body_ids.len(), span)?;
                    check_basis(name, &self.config.target_basis.clone(), span)?;
                }

                let mut final_args = resolved_args.clone();
                if let Some(scale) = fractional_pow {
                    if !crate::gates::fractional_pow_allowed(name) {
                        return Err(Error::UnsupportedFractionalPower(name.to_string(), span));
                    }
                    if let Some(first) = final_args.first_mut() {
                        if let Some(angle) = first.as_f64() {
                            *first = Value::Float(angle * scale);
                        }
                    }
                }
                let repeat_count = const_pow.map_or(1, |k| k.unsigned_abs() as usize);
                let net_inverted = inverted ^ const_pow.is_some_and(|k| k < 0);

                self.emit_intrinsic_with_controls(
                    name,
                    &final_args,
                    body_ids,
                    &all_controls,
                    &all_negctrls,
                    net_inverted,
                    repeat_count,
                    span,
                )?;
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_intrinsic_with_controls(
        &mut self,
        base_name: &str,
        args: &[Value],
        targets: &[Id],
        controls: &[Id],
        negctrls: &[Id],
        inverted: bool,
        repeat_count: usize,
        span: Span,
    ) -> Result<(), Error> {
        let (emitted_name, emitted_args) = if inverted {
            inverse_gate(base_name, args)
        } else {
            (base_name.to_string(), args.to_vec())
        };
        let canonical_name = format!("{}{}", "c".repeat(controls.len()), emitted_name);

        for x in negctrls {
            self.push(
                StmtKind::GateCall {
                    modifiers: vec![],
                    name: "x".into(),
                    args: vec![],
                    qubits: vec![GateOperand::HardwareQubit(*x)],
                },
                span,
            );
        }
        for _ in 0..repeat_count {
            let mut all_qubits: Vec<Id> = controls.to_vec();
            all_qubits.extend(negctrls.iter().copied());
            all_qubits.extend(targets.iter().copied());
            let qubit_operands = all_qubits.iter().map(|id| GateOperand::HardwareQubit(*id)).collect();
            let arg_exprs = emitted_args.iter().filter_map(value_to_literal_expr(span)).collect();
            self.push(
                StmtKind::GateCall {
                    modifiers: vec![],
                    name: canonical_name.clone().into(),
                    args: arg_exprs,
                    qubits: qubit_operands,
                },
                span,
            );
            self.depth.touch(&all_qubits, &[]);
        }
        for x in negctrls {
            self.push(
                StmtKind::GateCall {
                    modifiers: vec![],
                    name: "x".into(),
                    args: vec![],
                    qubits: vec![GateOperand::HardwareQubit(*x)],
                },
                span,
            );
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn inline_gate_body(
        &mut self,
        decl: &GateDecl,
        args: &[Value],
        targets: &[Id],
        controls: &[Id],
        negctrls: &[Id],
        inverted: bool,
        span: Span,
    ) -> Result<(), Error> {
        self.scope.push();
        for (param, value) in decl.params.iter().zip(args) {
            self.scope.declare_variable(
                param.clone(),
                Variable {
                    ty: value.ty(),
                    is_const: true,
                    is_loop_binding: false,
                    external: false,
                    value: Some(value.clone()),
                },
                span,
            )?;
        }
        let mut qubit_frame = FxHashMap::default();
        for (formal, &actual) in decl.qubits.iter().zip(targets) {
            qubit_frame.insert(formal.clone(), actual);
        }
        self.qubit_subst.push(qubit_frame);
        self.ctrl_stack.extend(controls.iter().copied());
        self.negctrl_stack.extend(negctrls.iter().copied());

        let start = self.output.len();
        let result = if inverted {
            let body: Vec<Stmt> = decl.body.to_vec();
            body.iter().rev().try_for_each(|s| self.lower_inverted_gate_stmt(s))
        } else {
            self.lower_block(&decl.body)
        };
        let _ = start;

        self.negctrl_stack.truncate(self.negctrl_stack.len() - negctrls.len());
        self.ctrl_stack.truncate(self.ctrl_stack.len() - controls.len());
        self.qubit_subst.pop();
        self.scope.pop();
        result
    }

    /// Lowers a single statement from an `inv`-modified gate body: only
    /// plain (possibly already-modified) gate calls are legal inside an
    /// invertible gate, since reset/measure have no inverse.
    fn lower_inverted_gate_stmt(&mut self, stmt: &Stmt) -> Result<(), Error> {
        match stmt.kind.as_ref() {
            StmtKind::GateCall {
                modifiers,
                name,
                args,
                qubits,
            } => {
                let mut flipped = modifiers.clone();
                flipped.push(Modifier::Inv);
                self.lower_gate_call(&flipped, name, args, qubits, stmt.span)
            }
            _ => Err(Error::Unimplemented(
                "only gate calls may appear in an invertible gate body".to_string(),
                stmt.span,
            )),
        }
    }

    fn lower_if(
        &mut self,
        cond: &Expr,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
        span: Span,
    ) -> Result<(), Error> {
        match eval(cond, &self.scope).ok().and_then(|v| v.as_bool()) {
            Some(true) => {
                self.scope.push();
                let r = self.lower_block(then_block);
                self.scope.pop();
                r
            }
            Some(false) => {
                self.scope.push();
                let r = if let Some(else_block) = else_block {
                    self.lower_block(else_block)
                } else {
                    Ok(())
                };
                self.scope.pop();
                r
            }
            None => {
                // Condition depends on a runtime value (typically a
                // measurement result). A comparison against a `bit[n]`
                // register wider than one bit is decomposed into its
                // constituent single-bit tests before falling back to
                // the generic "both arms kept" handling below.
                if let Some((name, _width, op, bits)) = self.detect_register_comparison(cond) {
                    return match op {
                        BinOp::Eq => {
                            self.lower_multibit_if(&name, &bits, false, then_block, else_block, span)
                        }
                        BinOp::Ne => {
                            self.lower_multibit_if(&name, &bits, true, then_block, else_block, span)
                        }
                        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                            let rewritten = build_magnitude_cond(&name, &bits, op, span);
                            self.lower_dynamic_if(&rewritten, then_block, else_block, span)
                        }
                        _ => unreachable!("detect_register_comparison only returns comparison ops"),
                    };
                }
                self.lower_dynamic_if(cond, then_block, else_block, span)
            }
        }
    }

    /// The generic "both arms kept" lowering for a condition that cannot
    /// be constant-folded: both branches are reachable through the
    /// emitted `if`, and depth is merged conservatively across them.
    fn lower_dynamic_if(
        &mut self,
        cond: &Expr,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
        span: Span,
    ) -> Result<(), Error> {
        let before = self.depth.snapshot();
        let saved_len = self.output.len();

        self.scope.push();
        self.lower_block(then_block)?;
        self.scope.pop();
        let then_out: Vec<Stmt> = self.output.split_off(saved_len);
        let then_depth = self.depth.snapshot();

        self.depth = before.clone();
        self.scope.push();
        let else_out = if let Some(else_block) = else_block {
            self.lower_block(else_block)?;
            self.scope.pop();
            self.output.split_off(saved_len)
        } else {
            self.scope.pop();
            Vec::new()
        };
        self.depth.merge_max(&then_depth);

        self.push(
            StmtKind::If {
                cond: cond.clone(),
                then_block: then_out,
                else_block: if else_out.is_empty() && else_block.is_none() {
                    None
                } else {
                    Some(else_out)
                },
            },
            span,
        );
        Ok(())
    }

    /// Decodes `creg <op> K` (or `K <op> creg`) against a classical
    /// register wider than one bit, returning the register's name, its
    /// width, the comparison normalized so the register is the
    /// left-hand operand, and the right-hand side decoded into an
    /// MSB-first bit pattern.
    fn detect_register_comparison(&self, cond: &Expr) -> Option<(Rc<str>, u32, BinOp, Vec<bool>)> {
        let ExprKind::Binary(op, lhs, rhs) = cond.kind.as_ref() else {
            return None;
        };
        if !matches!(
            op,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        ) {
            return None;
        }
        if let ExprKind::Ident(name) = lhs.kind.as_ref() {
            if let Some(width) = self.registers.clbit_register(name).map(|r| r.size) {
                if width > 1 {
                    if let Some(bits) = self.eval_bit_pattern(rhs, width) {
                        return Some((name.clone(), width, *op, bits));
                    }
                }
            }
        }
        if let ExprKind::Ident(name) = rhs.kind.as_ref() {
            if let Some(width) = self.registers.clbit_register(name).map(|r| r.size) {
                if width > 1 {
                    if let Some(bits) = self.eval_bit_pattern(lhs, width) {
                        return Some((name.clone(), width, flip_comparison(*op), bits));
                    }
                }
            }
        }
        None
    }

    /// Evaluates the non-register side of a register comparison into an
    /// MSB-first bit pattern of exactly `width` bits: an integer-like
    /// value is expanded via [`expand_equality_patterns`], a `bit[n]`
    /// bitstring literal is taken as-is.
    fn eval_bit_pattern(&self, expr: &Expr, width: u32) -> Option<Vec<bool>> {
        match eval(expr, &self.scope).ok()? {
            Value::BitArray(bits) if bits.len() as u32 == width => Some(bits),
            other => {
                let target = other.as_i64()?;
                (target >= 0).then(|| expand_equality_patterns(width, target as u64))
            }
        }
    }

    /// Lowers an `if` whose condition is a multi-bit equality test,
    /// already decomposed into `bits` (MSB-first) against `name`, as a
    /// nested chain of single-bit `if`s: one test per bit, innermost
    /// first, each guarding the next. `invert` swaps which side of the
    /// original `if`/`else` runs when every bit matches, turning the
    /// `==` construction into a `!=` one.
    fn lower_multibit_if(
        &mut self,
        name: &Rc<str>,
        bits: &[bool],
        invert: bool,
        then_block: &[Stmt],
        else_block: Option<&[Stmt]>,
        span: Span,
    ) -> Result<(), Error> {
        let (match_stmts, mismatch_stmts, mismatch_explicit) = if invert {
            (else_block.unwrap_or(&[]), then_block, true)
        } else {
            (then_block, else_block.unwrap_or(&[]), else_block.is_some())
        };

        let before = self.depth.snapshot();
        let saved_len = self.output.len();

        self.scope.push();
        self.lower_block(match_stmts)?;
        self.scope.pop();
        let match_out: Vec<Stmt> = self.output.split_off(saved_len);
        let match_depth = self.depth.snapshot();

        self.depth = before.clone();
        self.scope.push();
        self.lower_block(mismatch_stmts)?;
        self.scope.pop();
        let mismatch_out: Vec<Stmt> = self.output.split_off(saved_len);
        let mismatch_depth = self.depth.snapshot();

        self.depth = before;
        self.depth.merge_max(&match_depth);
        self.depth.merge_max(&mismatch_depth);

        let mismatch_else = if mismatch_out.is_empty() && !mismatch_explicit {
            None
        } else {
            Some(mismatch_out)
        };

        let mut current = match_out;
        for i in (0..bits.len()).rev() {
            let stmt = Stmt::new(
                span,
                StmtKind::If {
                    cond: bit_eq_expr(name, i as u32, bits[i], span),
                    then_block: current,
                    else_block: mismatch_else.clone(),
                },
            );
            current = vec![stmt];
        }

        self.output.extend(current);
        Ok(())
    }

    fn lower_switch(
        &mut self,
        target: &Expr,
        cases: &[(Vec<Expr>, Vec<Stmt>)],
        default: Option<&[Stmt]>,
        span: Span,
    ) -> Result<(), Error> {
        let target_value = eval(target, &self.scope).ok();
        if let Some(target_value) = target_value {
            for (labels, body) in cases {
                for label in labels {
                    if let Ok(label_value) = eval(label, &self.scope) {
                        if values_equal(&label_value, &target_value) {
                            self.scope.push();
                            let r = self.lower_block(body);
                            self.scope.pop();
                            return r;
                        }
                    }
                }
            }
            self.scope.push();
            let r = match default {
                Some(body) => self.lower_block(body),
                None => Ok(()),
            };
            self.scope.pop();
            return r;
        }
        Err(Error::DynamicLoopBound(span))
    }

    fn lower_for(
        &mut self,
        var: &Rc<str>,
        ty: Option<&TypeDef>,
        iter: &ForIter,
        body: &[Stmt],
        span: Span,
    ) -> Result<(), Error> {
        let values = self.resolve_for_iter(iter, span)?;
        if values.len() > self.config.max_loop_iters {
            return Err(Error::MaxLoopItersExceeded(self.config.max_loop_iters, span));
        }
        let ty = match ty {
            Some(ty) => resolve_type(ty, &self.scope)?,
            None => crate::types::Type::Int(32),
        };
        for value in values {
            self.scope.push();
            self.scope.declare_variable(
                var.clone(),
                Variable {
                    ty: ty.clone(),
                    is_const: false,
                    is_loop_binding: true,
                    external: false,
                    value: Some(value),
                },
                span,
            )?;
            let r = self.lower_block(body);
            self.scope.pop();
            r?;
        }
        Ok(())
    }

    fn resolve_for_iter(&self, iter: &ForIter, span: Span) -> Result<Vec<Value>, Error> {
        match iter {
            ForIter::Range(lo, hi, step) => {
                let lo = eval(lo, &self.scope).map_err(|_| Error::DynamicLoopBound(lo.span))?;
                let hi = eval(hi, &self.scope).map_err(|_| Error::DynamicLoopBound(hi.span))?;
                let step_val = match step {
                    Some(e) => eval(e, &self.scope).map_err(|_| Error::DynamicLoopBound(e.span))?,
                    None => Value::Int(1, 32),
                };
                let (lo, hi, step) = (
                    lo.as_i64().ok_or(Error::DynamicLoopBound(span))?,
                    hi.as_i64().ok_or(Error::DynamicLoopBound(span))?,
                    step_val.as_i64().ok_or(Error::DynamicLoopBound(span))?,
                );
                if step == 0 {
                    return Err(Error::DivisionByZero(span));
                }
                let mut out = Vec::new();
                let mut i = lo;
                while (step > 0 && i <= hi) || (step < 0 && i >= hi) {
                    out.push(Value::Int(i, 32));
                    i += step;
                }
                Ok(out)
            }
            ForIter::Set(items) => items
                .iter()
                .map(|e| eval(e, &self.scope).map_err(|_| Error::DynamicLoopBound(e.span)))
                .collect(),
            ForIter::Array(e) => {
                let value = eval(e, &self.scope).map_err(|_| Error::DynamicLoopBound(e.span))?;
                match value {
                    Value::Array(items) => Ok(items),
                    Value::BitArray(bits) => Ok(bits.into_iter().map(Value::Bit).collect()),
                    _ => Err(Error::DynamicLoopBound(span)),
                }
            }
        }
    }

    fn lower_while(&mut self, cond: &Expr, body: &[Stmt], span: Span) -> Result<(), Error> {
        let mut iterations = 0usize;
        loop {
            let Some(cond_value) = eval(cond, &self.scope).ok().and_then(|v| v.as_bool()) else {
                return Err(Error::DynamicLoopBound(cond.span));
            };
            if !cond_value {
                break;
            }
            iterations += 1;
            if iterations > self.config.max_loop_iters {
                return Err(Error::MaxLoopItersExceeded(self.config.max_loop_iters, span));
            }
            self.scope.push();
            let r = self.lower_block(body);
            self.scope.pop();
            r?;
        }
        Ok(())
    }
}

fn apply_compound(op: AssignOp, var: &Variable, rhs: &Value, span: Span) -> Result<Value, Error> {
    use qasm_ast::ast::BinOp;
    let current = var.value.clone().ok_or(Error::Unimplemented(
        "compound assignment on a variable with no known value".to_string(),
        span,
    ))?;
    let binop = match op {
        AssignOp::Add => BinOp::Add,
        AssignOp::Sub => BinOp::Sub,
        AssignOp::Mul => BinOp::Mul,
        AssignOp::Div => BinOp::Div,
        AssignOp::Mod => BinOp::Mod,
        AssignOp::Pow => BinOp::Pow,
        AssignOp::BitAnd => BinOp::BitAnd,
        AssignOp::BitOr => BinOp::BitOr,
        AssignOp::BitXor => BinOp::BitXor,
        AssignOp::Shl => BinOp::Shl,
        AssignOp::Shr => BinOp::Shr,
        AssignOp::Assign => unreachable!("handled by caller"),
    };
    crate::eval::fold_binary_pub(binop, current, rhs.clone(), span)?.cast(&var.ty, span)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a.as_f64().zip(b.as_f64()).is_some_and(|(x, y)| (x - y).abs() < f64::EPSILON),
    }
}

fn lit_int(value: i64, span: Span) -> Expr {
    Expr::new(span, ExprKind::Lit(Literal::Int(value)))
}

/// A short tag for the statement kind being dispatched, for the `trace!`
/// emitted at the top of `lower_stmt` — cheaper than `Debug`-formatting
/// the whole statement on every call.
fn stmt_kind_name(kind: &StmtKind) -> &'static str {
    match kind {
        StmtKind::Include(_) => "include",
        StmtKind::QubitDecl { .. } => "qubit decl",
        StmtKind::CRegDecl { .. } => "creg decl",
        StmtKind::ClassicalDecl { .. } => "classical decl",
        StmtKind::Alias { .. } => "alias",
        StmtKind::GateDef { .. } => "gate def",
        StmtKind::SubroutineDef { .. } => "subroutine def",
        StmtKind::GateCall { .. } => "gate call",
        StmtKind::Reset(_) => "reset",
        StmtKind::Barrier(_) => "barrier",
        StmtKind::Measure { .. } => "measure",
        StmtKind::MeasureArrow { .. } => "measure arrow",
        StmtKind::Assign { .. } => "assign",
        StmtKind::ExprStmt(_) => "expr stmt",
        StmtKind::If { .. } => "if",
        StmtKind::Switch { .. } => "switch",
        StmtKind::For { .. } => "for",
        StmtKind::While { .. } => "while",
        StmtKind::Delay { .. } => "delay",
        StmtKind::Box_ { .. } => "box",
        StmtKind::Pulse { .. } => "pulse",
        StmtKind::IODecl { .. } => "io decl",
        StmtKind::Pragma(_) => "pragma",
        StmtKind::Annotation(_) => "annotation",
    }
}

fn value_to_literal_expr(span: Span) -> impl Fn(&Value) -> Option<Expr> {
    move |value| match value {
        Value::Int(i, _) => Some(lit_int(*i, span)),
        Value::UInt(u, _) => Some(lit_int(*u as i64, span)),
        Value::Bool(b) => Some(Expr::new(span, ExprKind::Lit(Literal::Bool(*b)))),
        Value::Bit(b) => Some(Expr::new(span, ExprKind::Lit(Literal::Bit(*b)))),
        Value::Float(f) | Value::Angle(f, _) => Some(Expr::new(span, ExprKind::Lit(Literal::Float(*f)))),
        Value::BitArray(bits) => Some(Expr::new(
            span,
            ExprKind::Lit(Literal::BitString(
                bits.iter().map(|b| if *b { '1' } else { '0' }).collect::<String>().into(),
            )),
        )),
        _ => None,
    }
}

/// Flips a relational operator to normalize `K <op> creg` into `creg
/// <flipped op> K`; equality operators are their own flip.
fn flip_comparison(op: BinOp) -> BinOp {
    match op {
        BinOp::Lt => BinOp::Gt,
        BinOp::Le => BinOp::Ge,
        BinOp::Gt => BinOp::Lt,
        BinOp::Ge => BinOp::Le,
        other => other,
    }
}

fn bit_index_expr(name: &Rc<str>, index: u32, span: Span) -> Expr {
    Expr::new(
        span,
        ExprKind::Index(
            Expr::new(span, ExprKind::Ident(name.clone())),
            IndexKind::Single(lit_int(i64::from(index), span)),
        ),
    )
}

fn bit_eq_expr(name: &Rc<str>, index: u32, want: bool, span: Span) -> Expr {
    Expr::new(
        span,
        ExprKind::Binary(
            BinOp::Eq,
            bit_index_expr(name, index, span),
            Expr::new(span, ExprKind::Lit(Literal::Bit(want))),
        ),
    )
}

fn and_expr(a: Expr, b: Expr, span: Span) -> Expr {
    Expr::new(span, ExprKind::Binary(BinOp::And, a, b))
}

fn or_expr(a: Expr, b: Expr, span: Span) -> Expr {
    Expr::new(span, ExprKind::Binary(BinOp::Or, a, b))
}

fn or_fold(terms: Vec<Expr>, span: Span) -> Option<Expr> {
    let mut iter = terms.into_iter();
    let first = iter.next()?;
    Some(iter.fold(first, |acc, term| or_expr(acc, term, span)))
}

fn all_bits_eq_expr(name: &Rc<str>, bits: &[bool], span: Span) -> Expr {
    let mut iter = bits.iter().enumerate();
    let (i0, &b0) = iter.next().expect("width > 1 register comparison has at least one bit");
    iter.fold(bit_eq_expr(name, i0 as u32, b0, span), |acc, (i, &b)| {
        and_expr(acc, bit_eq_expr(name, i as u32, b, span), span)
    })
}

/// Builds the single boolean expression equivalent to `creg <op> target`
/// (`target` given MSB-first as `bits`) for a relational comparison,
/// following the standard digit-by-digit magnitude-comparison algorithm:
/// scan from the MSB for the first bit where `creg` and `target` differ;
/// `creg` is less than `target` there iff its bit is `0` and `target`'s
/// is `1` (greater iff the reverse), and every higher bit must agree.
/// `<=`/`>=` additionally admit the all-bits-equal case.
fn build_magnitude_cond(name: &Rc<str>, bits: &[bool], op: BinOp, span: Span) -> Expr {
    let greater = matches!(op, BinOp::Gt | BinOp::Ge);
    let mut terms = Vec::new();
    for (i, &target_bit) in bits.iter().enumerate() {
        if target_bit == greater {
            continue;
        }
        let mut term = bit_eq_expr(name, i as u32, greater, span);
        for (j, &prefix_bit) in bits.iter().enumerate().take(i) {
            term = and_expr(term, bit_eq_expr(name, j as u32, prefix_bit, span), span);
        }
        terms.push(term);
    }
    let strict = or_fold(terms, span);
    if matches!(op, BinOp::Le | BinOp::Ge) {
        let eq = all_bits_eq_expr(name, bits, span);
        strict.map_or(eq.clone(), |s| or_expr(s, eq, span))
    } else {
        strict.unwrap_or_else(|| Expr::new(span, ExprKind::Lit(Literal::Bool(false))))
    }
}

fn expr_as_gate_operand(expr: &Expr) -> Option<GateOperand> {
    match expr.kind.as_ref() {
        ExprKind::Ident(name) => Some(GateOperand::Ident {
            name: name.clone(),
            index: None,
        }),
        ExprKind::HardwareQubit(n) => Some(GateOperand::HardwareQubit(*n)),
        ExprKind::Index(base, idx) => {
            if let ExprKind::Ident(name) = base.kind.as_ref() {
                Some(GateOperand::Ident {
                    name: name.clone(),
                    index: Some(idx.clone()),
                })
            } else {
                None
            }
        }
        _ => None,
    }
}

fn inverse_gate(name: &str, args: &[Value]) -> (String, Vec<Value>) {
    if NEGATE_ANGLE_GATES.contains(&name) {
        let negated = args
            .iter()
            .map(|v| match v {
                Value::Float(f) => Value::Float(-f),
                Value::Angle(a, w) => Value::Angle(crate::types::normalize_angle(-a), *w),
                other => other.clone(),
            })
            .collect();
        return (name.to_string(), negated);
    }
    if let Some((_, inv)) = INVERSE_PAIRS.iter().find(|(n, _)| *n == name) {
        return ((*inv).to_string(), args.to_vec());
    }
    (name.to_string(), args.to_vec())
}

#[cfg(test)]
mod tests {
    use super::lower;
    use crate::config::CompilerConfig;
    use qasm_ast::ast::{Program, Stmt, StmtKind, Version};
    use qasm_data_structures::span::Span;

    fn stmt(kind: StmtKind) -> Stmt {
        Stmt::new(Span::default(), kind)
    }

    #[test]
    fn lowering_an_empty_program_succeeds() {
        let program = Program {
            version: Version::default(),
            statements: vec![],
        };
        let config = CompilerConfig::default();
        let lowered = lower(&program, &config).unwrap();
        assert_eq!(lowered.registers.num_qubits(), 0);
    }

    #[test]
    fn qubit_declaration_is_retained_and_counted() {
        use qasm_ast::ast::{Expr, ExprKind, Literal};
        let decl = stmt(StmtKind::QubitDecl {
            name: "q".into(),
            size: Some(Expr::new(Span::default(), ExprKind::Lit(Literal::Int(3)))),
        });
        let program = Program {
            version: Version::default(),
            statements: vec![decl],
        };
        let config = CompilerConfig::default();
        let lowered = lower(&program, &config).unwrap();
        assert_eq!(lowered.registers.num_qubits(), 3);
        assert_eq!(lowered.program.statements.len(), 1);
    }

    fn bit_eq(name: &str, index: i64, want: bool) -> qasm_ast::ast::Expr {
        use qasm_ast::ast::{BinOp, Expr, ExprKind, IndexKind, Literal};
        Expr::new(
            Span::default(),
            ExprKind::Binary(
                BinOp::Eq,
                Expr::new(
                    Span::default(),
                    ExprKind::Index(
                        Expr::new(Span::default(), ExprKind::Ident(name.into())),
                        IndexKind::Single(Expr::new(Span::default(), ExprKind::Lit(Literal::Int(index)))),
                    ),
                ),
                Expr::new(Span::default(), ExprKind::Lit(Literal::Bit(want))),
            ),
        )
    }

    /// `if (c == 3)` over a `bit[4] c;` register expands to the nested
    /// per-bit chain
    /// `if (c[0]==false) if (c[1]==false) if (c[2]==true) if (c[3]==true) { h q[0]; }`,
    /// matching the decoded bits `3 == 0b0011` MSB-first.
    #[test]
    fn multibit_equality_branch_expands_to_nested_bit_chain() {
        use qasm_ast::ast::{BinOp, Expr, ExprKind, GateOperand, Literal};

        let qubit_decl = stmt(StmtKind::QubitDecl {
            name: "q".into(),
            size: Some(Expr::new(Span::default(), ExprKind::Lit(Literal::Int(1)))),
        });
        let creg_decl = stmt(StmtKind::CRegDecl {
            name: "c".into(),
            size: Some(Expr::new(Span::default(), ExprKind::Lit(Literal::Int(4)))),
        });
        let cond = Expr::new(
            Span::default(),
            ExprKind::Binary(
                BinOp::Eq,
                Expr::new(Span::default(), ExprKind::Ident("c".into())),
                Expr::new(Span::default(), ExprKind::Lit(Literal::Int(3))),
            ),
        );
        let body = vec![stmt(StmtKind::GateCall {
            modifiers: vec![],
            name: "h".into(),
            args: vec![],
            qubits: vec![GateOperand::Ident { name: "q".into(), index: None }],
        })];
        let if_stmt = stmt(StmtKind::If {
            cond,
            then_block: body,
            else_block: None,
        });
        let program = Program {
            version: Version::default(),
            statements: vec![qubit_decl, creg_decl, if_stmt],
        };
        let config = CompilerConfig::default();
        let lowered = lower(&program, &config).unwrap();

        let expected_bits = [false, false, true, true];
        let mut stmt_ref = lowered.program.statements.last().expect("lowered if statement present");
        for (i, &want) in expected_bits.iter().enumerate() {
            match stmt_ref.kind.as_ref() {
                StmtKind::If { cond, then_block, else_block } => {
                    assert_eq!(*cond, bit_eq("c", i as i64, want), "bit {i} test mismatched");
                    assert!(else_block.is_none(), "S3 has no else at any nesting level");
                    if i == expected_bits.len() - 1 {
                        assert_eq!(then_block.len(), 1);
                        assert!(matches!(then_block[0].kind.as_ref(), StmtKind::GateCall { name, .. } if &**name == "h"));
                    } else {
                        stmt_ref = then_block.first().expect("nested if present");
                    }
                }
                other => panic!("expected nested If, got {other:?}"),
            }
        }
    }

    /// `if (c != 3)` inverts which side runs when every bit matches: the
    /// body moves to the mismatch side of the outermost test.
    #[test]
    fn multibit_inequality_branch_runs_body_on_mismatch() {
        use qasm_ast::ast::{BinOp, Expr, ExprKind, GateOperand, Literal};

        let qubit_decl = stmt(StmtKind::QubitDecl {
            name: "q".into(),
            size: Some(Expr::new(Span::default(), ExprKind::Lit(Literal::Int(1)))),
        });
        let creg_decl = stmt(StmtKind::CRegDecl {
            name: "c".into(),
            size: Some(Expr::new(Span::default(), ExprKind::Lit(Literal::Int(2)))),
        });
        let cond = Expr::new(
            Span::default(),
            ExprKind::Binary(
                BinOp::Ne,
                Expr::new(Span::default(), ExprKind::Ident("c".into())),
                Expr::new(Span::default(), ExprKind::Lit(Literal::Int(1))),
            ),
        );
        let body = vec![stmt(StmtKind::GateCall {
            modifiers: vec![],
            name: "x".into(),
            args: vec![],
            qubits: vec![GateOperand::Ident { name: "q".into(), index: None }],
        })];
        let if_stmt = stmt(StmtKind::If {
            cond,
            then_block: body,
            else_block: None,
        });
        let program = Program {
            version: Version::default(),
            statements: vec![qubit_decl, creg_decl, if_stmt],
        };
        let config = CompilerConfig::default();
        let lowered = lower(&program, &config).unwrap();

        // 1 == 0b01, MSB-first over width 2 -> [false, true]. Each level's
        // `then` continues checking further bits (this one still matches
        // the target so far); mismatching at any level runs the body via
        // that level's `else`.
        let outer = lowered.program.statements.last().expect("outer if present");
        match outer.kind.as_ref() {
            StmtKind::If { cond, then_block, else_block } => {
                assert_eq!(*cond, bit_eq("c", 0, false));
                let mismatch = else_block.as_ref().expect("mismatch arm runs the body");
                assert!(matches!(
                    mismatch[0].kind.as_ref(),
                    StmtKind::GateCall { name, .. } if &**name == "x"
                ));
                match then_block.first().expect("nested if present").kind.as_ref() {
                    StmtKind::If { cond, else_block, .. } => {
                        assert_eq!(*cond, bit_eq("c", 1, true));
                        let mismatch = else_block.as_ref().expect("mismatch arm runs the body");
                        assert!(matches!(
                            mismatch[0].kind.as_ref(),
                            StmtKind::GateCall { name, .. } if &**name == "x"
                        ));
                    }
                    other => panic!("expected nested If, got {other:?}"),
                }
            }
            other => panic!("expected outer If, got {other:?}"),
        }
    }
}
