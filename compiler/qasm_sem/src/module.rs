// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The public façade (`spec.md` §6 "Module operations"): a parsed
//! [`Program`] paired with the [`CompilerConfig`] it was (or will be)
//! checked against, plus whatever side information the last pass run over
//! it produced. Every transform returns a new `Module` rather than
//! mutating in place, mirroring the immutable-by-default style
//! `qsc_frontend`'s own compiler stages use.

use std::fmt::{self, Display, Formatter};
use std::rc::Rc;
use std::sync::Arc;

use qasm_ast::ast::{Expr, ExprKind, Literal, Program, Stmt, StmtKind};
use qasm_data_structures::span::Span;
use rustc_hash::FxHashSet;

use crate::config::{CompilerConfig, TargetBasis, UnrollOptions};
use crate::depth::DepthTracker;
use crate::error::{Error, Source, WithSource};
use crate::helpers::{compare_report, retain_stmts, set_qubit_decl_size, touched_hardware_qubits, CompareReport};
use crate::lowerer::lower;
use crate::rebase::rebase_block;
use crate::registers::RegisterFile;

/// Overrides accepted by [`Module::unroll`], each defaulting to the
/// value already on the module's [`CompilerConfig`] when left `None`.
#[derive(Clone, Debug, Default)]
pub struct UnrollParams {
    pub external_gates: Option<Rc<FxHashSet<Rc<str>>>>,
    pub unroll_barriers: Option<bool>,
    pub max_loop_iters: Option<usize>,
}

/// A parsed (and possibly already flattened) OpenQASM 3 program, plus the
/// configuration it was built or last re-checked with.
#[derive(Clone, Debug)]
pub struct Module {
    program: Program,
    config: CompilerConfig,
    source: Option<Source>,
    registers: RegisterFile,
    depth: DepthTracker,
    has_measurements: bool,
    has_barriers: bool,
}

impl Module {
    /// `loads(text) -> Module` per `spec.md` §6, scoped to this crate's
    /// boundary: the external parser already turned `text` into a
    /// [`Program`], so this just pairs it with a configuration.
    #[must_use]
    pub fn loads(program: Program, config: CompilerConfig) -> Self {
        Self {
            program,
            config,
            source: None,
            registers: RegisterFile::new(),
            depth: DepthTracker::new(),
            has_measurements: false,
            has_barriers: false,
        }
    }

    /// Attaches the original source text, so errors produced by this
    /// module's operations render a `miette` snippet instead of a bare
    /// message.
    #[must_use]
    pub fn with_source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// `dumps(Module) -> Module` — this crate hands the caller's external
    /// printer the AST rather than rendering text itself (see
    /// `SPEC_FULL.md` §7); `Display` below backs debug output and
    /// `compare()`.
    #[must_use]
    pub fn dumps(&self) -> Program {
        self.program.clone()
    }

    fn wrap(&self, error: Error) -> WithSource<Error> {
        // Matches the "logging channel emits a location snippet before the
        // error is raised" requirement: every `Module` operation funnels
        // its failure through here before returning it to the caller.
        log::error!("{}: {error}", self.config.name);
        let source = self.source.clone().unwrap_or_else(|| Source {
            name: self.config.name.to_string().into(),
            contents: Arc::from(""),
        });
        WithSource::new(source, error)
    }

    fn child(&self, program: Program, lowered: Option<(RegisterFile, DepthTracker, bool, bool)>) -> Self {
        let (registers, depth, has_measurements, has_barriers) = match lowered {
            Some(v) => v,
            None => (
                self.registers.clone(),
                self.depth.clone(),
                self.has_measurements,
                self.has_barriers,
            ),
        };
        Self {
            program,
            config: self.config.clone(),
            source: self.source.clone(),
            registers,
            depth,
            has_measurements,
            has_barriers,
        }
    }

    /// `Module.validate() -> ok | error`. Runs the full Core Visitor pass
    /// and discards its output, per §7's propagation policy: the first
    /// error halts the pass.
    pub fn validate(&self) -> Result<(), WithSource<Error>> {
        lower(&self.program, &self.config)
            .map(|_| ())
            .map_err(|e| self.wrap(e))
    }

    /// `Module.unroll(external_gates?, unroll_barriers?, max_loop_iters?) -> Module`.
    /// Flattens the program against (possibly overridden) configuration,
    /// returning a new `Module` whose `program` is the Output Statement
    /// List and whose register/depth/flag state is now populated.
    pub fn unroll(&self, overrides: &UnrollParams) -> Result<Self, WithSource<Error>> {
        let mut config = self.config.clone();
        if let Some(external_gates) = &overrides.external_gates {
            config = config.with_external_gates(external_gates.clone());
        }
        if let Some(unroll_barriers) = overrides.unroll_barriers {
            config.unroll_options.set(UnrollOptions::PRESERVE_BARRIERS, unroll_barriers);
        }
        if let Some(max_loop_iters) = overrides.max_loop_iters {
            config.max_loop_iters = max_loop_iters;
        }
        let lowered = lower(&self.program, &config).map_err(|e| self.wrap(e))?;
        Ok(Self {
            program: lowered.program,
            config,
            source: self.source.clone(),
            registers: lowered.registers,
            depth: lowered.depth,
            has_measurements: lowered.has_measurements,
            has_barriers: lowered.has_barriers,
        })
    }

    /// `Module.rebase(target_basis) -> Module`. Requires `self` to already
    /// be unrolled output (every `GateCall` intrinsic, every qubit operand
    /// a resolved `$n`) — `rebase_block` assumes exactly that shape.
    pub fn rebase(&self, basis: TargetBasis) -> Result<Self, WithSource<Error>> {
        let mut program = self.program.clone();
        rebase_block(&mut program.statements, &basis).map_err(|e| self.wrap(e))?;
        let mut result = self.child(program, None);
        result.config = result.config.with_target_basis(basis);
        Ok(result)
    }

    /// `Module.remove_idle_qubits()`: drops every declared qubit id never
    /// referenced by a gate, reset, measurement or barrier, renumbering
    /// the survivors contiguously and shrinking (or removing) the
    /// registers that declared them.
    #[must_use]
    pub fn remove_idle_qubits(&self) -> Self {
        let touched = touched_hardware_qubits(&self.program);
        let keep: FxHashSet<u32> = (0..self.registers.num_qubits())
            .filter(|id| touched.contains(id))
            .collect();
        let pruned = self.registers.num_qubits() as usize - keep.len();
        if pruned > 0 {
            log::warn!("pruning {pruned} idle qubit(s) from `{}`", self.config.name);
        }
        let (registers, map) = self.registers.filter_qubits(&keep);
        let depth = self.depth.remap_qubits(&map);
        let mut program = self.program.clone();
        crate::helpers::remap_hardware_qubits(&mut program.statements, &map);
        program.statements = rewrite_qubit_decls(program.statements, &self.registers, &touched);
        self.child(program, Some((registers, depth, self.has_measurements, self.has_barriers)))
    }

    /// `Module.populate_idle_qubits()`: the inverse of
    /// `remove_idle_qubits` — pads the qubit space up to `target` by
    /// declaring a fresh, untouched register rather than trying to guess
    /// which existing register an id used to belong to.
    #[must_use]
    pub fn populate_idle_qubits(&self, target: u32) -> Self {
        let current = self.registers.num_qubits();
        if target <= current {
            return self.clone();
        }
        let pad = target - current;
        let mut registers = self.registers.clone();
        let name: Rc<str> = Rc::from("__padding");
        let _ = registers.declare_qubits(name.clone(), pad);
        let span = self.program.statements.first().map_or_else(Span::default, |s| s.span);
        let decl = Stmt::new(
            span,
            StmtKind::QubitDecl {
                name,
                size: Some(lit_int(i64::from(pad), span)),
            },
        );
        let mut program = self.program.clone();
        let insert_at = program
            .statements
            .iter()
            .rposition(|s| matches!(s.kind.as_ref(), StmtKind::QubitDecl { .. }))
            .map_or(0, |i| i + 1);
        program.statements.insert(insert_at, decl);
        self.child(program, Some((registers, self.depth.clone(), self.has_measurements, self.has_barriers)))
    }

    /// `Module.reverse_qubit_order()`: maps every qubit id `i` to
    /// `num_qubits - 1 - i`, leaving register names, sizes and clbits
    /// untouched. Applying this twice is the identity (P7).
    #[must_use]
    pub fn reverse_qubit_order(&self) -> Self {
        let (registers, map) = self.registers.reverse_qubits();
        let depth = self.depth.remap_qubits(&map);
        let mut program = self.program.clone();
        crate::helpers::remap_hardware_qubits(&mut program.statements, &map);
        self.child(program, Some((registers, depth, self.has_measurements, self.has_barriers)))
    }

    /// `Module.remove_measurements()`.
    #[must_use]
    pub fn remove_measurements(&self) -> Self {
        let mut program = self.program.clone();
        retain_stmts(&mut program.statements, |kind| {
            !matches!(kind, StmtKind::Measure { .. } | StmtKind::MeasureArrow { .. })
        });
        self.child(program, Some((self.registers.clone(), self.depth.clone(), false, self.has_barriers)))
    }

    /// `Module.remove_barriers()`.
    #[must_use]
    pub fn remove_barriers(&self) -> Self {
        let mut program = self.program.clone();
        retain_stmts(&mut program.statements, |kind| !matches!(kind, StmtKind::Barrier(_)));
        self.child(program, Some((self.registers.clone(), self.depth.clone(), self.has_measurements, false)))
    }

    /// `Module.remove_includes()`.
    #[must_use]
    pub fn remove_includes(&self) -> Self {
        let mut program = self.program.clone();
        retain_stmts(&mut program.statements, |kind| !matches!(kind, StmtKind::Include(_)));
        self.child(program, None)
    }

    #[must_use]
    pub fn has_measurements(&self) -> bool {
        self.has_measurements
    }

    #[must_use]
    pub fn has_barriers(&self) -> bool {
        self.has_barriers
    }

    #[must_use]
    pub fn num_qubits(&self) -> u32 {
        self.registers.num_qubits()
    }

    #[must_use]
    pub fn num_clbits(&self) -> u32 {
        self.registers.num_clbits()
    }

    #[must_use]
    pub fn depth(&self) -> u64 {
        self.depth.total_depth()
    }

    /// `Module.to_qasm3()`: this crate's frontend only ever accepts
    /// OpenQASM 3 input (there is no QASM2 parser here for it to convert
    /// from — see `SPEC_FULL.md` §4), so the only meaningful effect is
    /// normalizing the version pragma to the canonical `x.0` form §6
    /// requires of unrolled output; a 3.1 input is conservatively left
    /// alone since it is not a conversion candidate.
    #[must_use]
    pub fn to_qasm3(&self) -> Self {
        let mut program = self.program.clone();
        if program.version.major < 3 {
            program.version = qasm_ast::ast::Version { major: 3, minor: 0 };
        }
        self.child(program, None)
    }

    /// `Module.compare(other) -> report`: a structural diff of the two
    /// modules' statement lists, reporting the first point of divergence.
    #[must_use]
    pub fn compare(&self, other: &Self) -> CompareReport {
        compare_report(&self.program.statements, &other.program.statements)
    }
}

impl Display for Module {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.program, f)
    }
}

/// Rewrites each `QubitDecl`'s declared size to the number of its
/// register's ids that survived idle-qubit pruning, dropping the
/// declaration entirely for a register left with none.
fn rewrite_qubit_decls(stmts: Vec<Stmt>, old_registers: &RegisterFile, touched: &FxHashSet<u32>) -> Vec<Stmt> {
    let mut out = Vec::with_capacity(stmts.len());
    for mut stmt in stmts {
        if let StmtKind::QubitDecl { name, .. } = stmt.kind.as_ref() {
            if let Some(reg) = old_registers.qubit_register(name) {
                let kept = (reg.base..reg.base + reg.size).filter(|id| touched.contains(id)).count() as u32;
                if kept == 0 {
                    continue;
                }
                set_qubit_decl_size(&mut stmt, kept);
            }
        }
        out.push(stmt);
    }
    out
}

fn lit_int(value: i64, span: Span) -> Expr {
    Expr::new(span, ExprKind::Lit(Literal::Int(value)))
}

#[cfg(test)]
mod tests {
    use super::{Module, UnrollParams};
    use crate::config::CompilerConfig;
    use qasm_ast::ast::{Expr, ExprKind, Literal, Program, Stmt, StmtKind, Version};
    use qasm_data_structures::span::Span;

    fn qubit_decl(name: &str, size: i64) -> Stmt {
        Stmt::new(
            Span::default(),
            StmtKind::QubitDecl {
                name: name.into(),
                size: Some(Expr::new(Span::default(), ExprKind::Lit(Literal::Int(size)))),
            },
        )
    }

    #[test]
    fn validate_accepts_a_trivial_program() {
        let program = Program {
            version: Version::default(),
            statements: vec![qubit_decl("q", 2)],
        };
        let module = Module::loads(program, CompilerConfig::default());
        assert!(module.validate().is_ok());
    }

    #[test]
    fn unroll_populates_qubit_count() {
        let program = Program {
            version: Version::default(),
            statements: vec![qubit_decl("q", 3)],
        };
        let module = Module::loads(program, CompilerConfig::default());
        let unrolled = module.unroll(&UnrollParams::default()).unwrap();
        assert_eq!(unrolled.num_qubits(), 3);
    }

    #[test]
    fn reverse_qubit_order_is_its_own_inverse() {
        let program = Program {
            version: Version::default(),
            statements: vec![qubit_decl("q", 4)],
        };
        let module = Module::loads(program, CompilerConfig::default())
            .unroll(&UnrollParams::default())
            .unwrap();
        let twice = module.reverse_qubit_order().reverse_qubit_order();
        assert_eq!(module.compare(&twice).equal, true);
    }

    #[test]
    fn compare_reports_equal_programs() {
        let program = Program {
            version: Version::default(),
            statements: vec![qubit_decl("q", 1)],
        };
        let a = Module::loads(program.clone(), CompilerConfig::default());
        let b = Module::loads(program, CompilerConfig::default());
        assert!(a.compare(&b).equal);
    }
}
