// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The abstract syntax tree (AST) for OpenQASM 3. Nodes in this tree are
//! produced by an external parser and consumed by `qasm_sem`; this crate
//! owns only the node shapes, not the grammar that builds them.

use indenter::{indented, Format, Indented};
use qasm_data_structures::span::Span;
use std::fmt::{self, Display, Formatter, Write};
use std::rc::Rc;

fn set_indentation<'a, 'b>(
    indent: Indented<'a, Formatter<'b>>,
    level: usize,
) -> Indented<'a, Formatter<'b>> {
    indent.with_format(Format::Custom {
        inserter: Box::new(move |_, f| {
            for _ in 0..level {
                write!(f, "    ")?;
            }
            Ok(())
        }),
    })
}

/// The whole program: a version pragma and a body of statements. This is
/// also the shape of the flattened "Output Statement List" that
/// `unroll()` produces — unrolling replaces `statements` wholesale and
/// leaves `version` untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Program {
    pub version: Version,
    pub statements: Vec<Stmt>,
}

impl Display for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut indent = set_indentation(indented(f), 0);
        write!(indent, "Program:")?;
        indent = set_indentation(indent, 1);
        write!(indent, "\nversion: {}", self.version)?;
        for stmt in &self.statements {
            write!(indent, "\n{stmt}")?;
        }
        Ok(())
    }
}

/// The `OPENQASM x.y;` version pragma. `minor` is `0` unless the source
/// text explicitly spelled out a minor version (only `3.1` is recognized
/// beyond the canonical `x.0` forms).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
}

impl Default for Version {
    fn default() -> Self {
        Self { major: 3, minor: 0 }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A statement, tagged with the span it occupies in the original source.
#[derive(Clone, Debug, PartialEq)]
pub struct Stmt {
    pub span: Span,
    pub kind: Box<StmtKind>,
}

impl Stmt {
    #[must_use]
    pub fn new(span: Span, kind: StmtKind) -> Self {
        Self {
            span,
            kind: Box::new(kind),
        }
    }
}

impl Display for Stmt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Stmt {}: {}", self.span, self.kind)
    }
}

/// Every statement kind the Core Visitor dispatches on (`spec.md` §4.6).
/// A tagged union rather than a class hierarchy, matched exhaustively by
/// the lowerer — no virtual dispatch.
#[derive(Clone, Debug, PartialEq)]
pub enum StmtKind {
    /// `include "file.inc";`
    Include(Rc<str>),
    /// `qubit[n] name;` / `qubit name;`
    QubitDecl { name: Rc<str>, size: Option<Expr> },
    /// `<ty> name = init;` (classical, possibly `const`).
    ClassicalDecl {
        ty: TypeDef,
        name: Rc<str>,
        init: Option<Expr>,
        is_const: bool,
    },
    /// `let name = expr;` — alias binding.
    Alias { name: Rc<str>, value: Expr },
    /// `gate name(params) qubits { body }` — stored, never itself emitted.
    GateDef {
        name: Rc<str>,
        params: Vec<Rc<str>>,
        qubits: Vec<Rc<str>>,
        body: Vec<Stmt>,
    },
    /// A (possibly modified, possibly broadcast) gate application.
    GateCall {
        modifiers: Vec<Modifier>,
        name: Rc<str>,
        args: Vec<Expr>,
        qubits: Vec<GateOperand>,
    },
    /// `reset q;`
    Reset(GateOperand),
    /// `barrier q, r;` (empty operand list means "all qubits").
    Barrier(Vec<GateOperand>),
    /// `c = measure q;` / `measure q -> c;` / bare `measure q;`
    Measure {
        qubit: GateOperand,
        target: Option<LValue>,
    },
    /// `lvalue op= expr;`
    Assign {
        lvalue: LValue,
        op: AssignOp,
        value: Expr,
    },
    /// A bare expression statement (used for void subroutine calls).
    ExprStmt(Expr),
    /// `if (cond) { ... } else { ... }`
    If {
        cond: Expr,
        then_block: Vec<Stmt>,
        else_block: Option<Vec<Stmt>>,
    },
    /// `switch (target) { case ...: {} default: {} }`
    Switch {
        target: Expr,
        cases: Vec<(Vec<Expr>, Vec<Stmt>)>,
        default: Option<Vec<Stmt>>,
    },
    /// `for var in iter { body }`
    For {
        var: Rc<str>,
        ty: Option<TypeDef>,
        iter: ForIter,
        body: Vec<Stmt>,
    },
    /// `while (cond) { body }`
    While { cond: Expr, body: Vec<Stmt> },
    /// `def name(params) -> ty { body }` — stored, never itself emitted.
    SubroutineDef {
        name: Rc<str>,
        params: Vec<SubroutineParam>,
        return_ty: Option<TypeDef>,
        body: Vec<Stmt>,
    },
    /// `delay[duration] q;`
    Delay { duration: Expr, qubits: Vec<GateOperand> },
    /// `box[duration] { body }`
    Box_ { duration: Option<Expr>, body: Vec<Stmt> },
    /// `cal { ... }` / `defcal ... { ... }` / `defcalgrammar "...";` — opaque.
    Pulse { text: Rc<str> },
    /// `input`/`output` declarations — retained verbatim, not analyzed.
    IODecl { text: Rc<str> },
    /// `pragma ...;` — retained verbatim, not analyzed.
    Pragma(Rc<str>),
    /// `@attr ...` annotation preceding a statement — retained verbatim.
    Annotation(Rc<str>),
    /// Legacy OpenQASM 2 `creg name[n];`, rewritten away before analysis.
    CRegDecl { name: Rc<str>, size: Option<Expr> },
    /// Legacy OpenQASM 2 `measure q -> c;` arrow form, kept distinct from
    /// [`StmtKind::Measure`] only until the QASM2-to-3 conversion pass runs.
    MeasureArrow { qubit: GateOperand, target: LValue },
}

impl Display for StmtKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StmtKind::Include(path) => write!(f, "Include {path:?}"),
            StmtKind::QubitDecl { name, size } => {
                write!(f, "QubitDecl {name}")?;
                if let Some(size) = size {
                    write!(f, "[{size}]")?;
                }
                Ok(())
            }
            StmtKind::ClassicalDecl {
                ty,
                name,
                init,
                is_const,
            } => {
                if *is_const {
                    write!(f, "const ")?;
                }
                write!(f, "ClassicalDecl {ty} {name}")?;
                if let Some(init) = init {
                    write!(f, " = {init}")?;
                }
                Ok(())
            }
            StmtKind::Alias { name, value } => write!(f, "Alias {name} = {value}"),
            StmtKind::GateDef {
                name,
                params,
                qubits,
                body,
            } => {
                write!(f, "GateDef {name}({}) ({})", params.join(", "), qubits.join(", "))?;
                let mut indent = set_indentation(indented(f), 1);
                for stmt in body {
                    write!(indent, "\n{stmt}")?;
                }
                Ok(())
            }
            StmtKind::GateCall {
                modifiers,
                name,
                args,
                qubits,
            } => {
                for m in modifiers {
                    write!(f, "{m} @ ")?;
                }
                write!(f, "{name}")?;
                if !args.is_empty() {
                    write!(
                        f,
                        "({})",
                        args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                    )?;
                }
                write!(
                    f,
                    " {}",
                    qubits.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                )
            }
            StmtKind::Reset(op) => write!(f, "Reset {op}"),
            StmtKind::Barrier(ops) => write!(
                f,
                "Barrier {}",
                ops.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
            StmtKind::Measure { qubit, target } => match target {
                Some(t) => write!(f, "{t} = Measure {qubit}"),
                None => write!(f, "Measure {qubit}"),
            },
            StmtKind::Assign { lvalue, op, value } => write!(f, "{lvalue} {op} {value}"),
            StmtKind::ExprStmt(e) => write!(f, "ExprStmt {e}"),
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                write!(f, "If {cond}")?;
                let mut indent = set_indentation(indented(f), 1);
                for stmt in then_block {
                    write!(indent, "\n{stmt}")?;
                }
                if let Some(else_block) = else_block {
                    write!(indent, "\nElse:")?;
                    for stmt in else_block {
                        write!(indent, "\n{stmt}")?;
                    }
                }
                Ok(())
            }
            StmtKind::Switch {
                target,
                cases,
                default,
            } => {
                write!(f, "Switch {target}")?;
                let mut indent = set_indentation(indented(f), 1);
                for (labels, body) in cases {
                    write!(
                        indent,
                        "\ncase {}:",
                        labels.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                    )?;
                    for stmt in body {
                        write!(indent, "\n{stmt}")?;
                    }
                }
                if let Some(default) = default {
                    write!(indent, "\ndefault:")?;
                    for stmt in default {
                        write!(indent, "\n{stmt}")?;
                    }
                }
                Ok(())
            }
            StmtKind::For { var, iter, body, .. } => {
                write!(f, "For {var} in {iter}")?;
                let mut indent = set_indentation(indented(f), 1);
                for stmt in body {
                    write!(indent, "\n{stmt}")?;
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                write!(f, "While {cond}")?;
                let mut indent = set_indentation(indented(f), 1);
                for stmt in body {
                    write!(indent, "\n{stmt}")?;
                }
                Ok(())
            }
            StmtKind::SubroutineDef {
                name, params, body, ..
            } => {
                write!(
                    f,
                    "SubroutineDef {name}({})",
                    params.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
                )?;
                let mut indent = set_indentation(indented(f), 1);
                for stmt in body {
                    write!(indent, "\n{stmt}")?;
                }
                Ok(())
            }
            StmtKind::Delay { duration, qubits } => write!(
                f,
                "Delay[{duration}] {}",
                qubits.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
            StmtKind::Box_ { duration, body } => {
                write!(f, "Box")?;
                if let Some(duration) = duration {
                    write!(f, "[{duration}]")?;
                }
                let mut indent = set_indentation(indented(f), 1);
                for stmt in body {
                    write!(indent, "\n{stmt}")?;
                }
                Ok(())
            }
            StmtKind::Pulse { text } => write!(f, "Pulse {text}"),
            StmtKind::IODecl { text } => write!(f, "IODecl {text}"),
            StmtKind::Pragma(text) => write!(f, "Pragma {text}"),
            StmtKind::Annotation(text) => write!(f, "Annotation {text}"),
            StmtKind::CRegDecl { name, size } => {
                write!(f, "CRegDecl {name}")?;
                if let Some(size) = size {
                    write!(f, "[{size}]")?;
                }
                Ok(())
            }
            StmtKind::MeasureArrow { qubit, target } => write!(f, "Measure {qubit} -> {target}"),
        }
    }
}

/// A qubit operand: either a logical register reference (possibly indexed
/// or sliced) or a physical `$n` qubit.
#[derive(Clone, Debug, PartialEq)]
pub enum GateOperand {
    Ident { name: Rc<str>, index: Option<IndexKind> },
    HardwareQubit(u32),
}

impl Display for GateOperand {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            GateOperand::Ident { name, index: None } => write!(f, "{name}"),
            GateOperand::Ident {
                name,
                index: Some(index),
            } => write!(f, "{name}[{index}]"),
            GateOperand::HardwareQubit(n) => write!(f, "${n}"),
        }
    }
}

/// The left-hand side of an assignment or a measurement target.
#[derive(Clone, Debug, PartialEq)]
pub enum LValue {
    Ident(Rc<str>),
    Indexed { name: Rc<str>, index: IndexKind },
}

impl Display for LValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            LValue::Ident(name) => write!(f, "{name}"),
            LValue::Indexed { name, index } => write!(f, "{name}[{index}]"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl Display for AssignOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
            AssignOp::Pow => "**=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitOr => "|=",
            AssignOp::BitXor => "^=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
        })
    }
}

/// A gate modifier: `inv`, `pow(k)`, or `ctrl(n)` / `negctrl(n)`.
#[derive(Clone, Debug, PartialEq)]
pub enum Modifier {
    Inv,
    Pow(Expr),
    Ctrl(Option<Expr>),
    NegCtrl(Option<Expr>),
}

impl Display for Modifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Modifier::Inv => write!(f, "inv"),
            Modifier::Pow(k) => write!(f, "pow({k})"),
            Modifier::Ctrl(None) => write!(f, "ctrl"),
            Modifier::Ctrl(Some(n)) => write!(f, "ctrl({n})"),
            Modifier::NegCtrl(None) => write!(f, "negctrl"),
            Modifier::NegCtrl(Some(n)) => write!(f, "negctrl({n})"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ForIter {
    Range(Expr, Expr, Option<Expr>),
    Set(Vec<Expr>),
    Array(Expr),
}

impl Display for ForIter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ForIter::Range(lo, hi, step) => {
                write!(f, "[{lo}:")?;
                if let Some(step) = step {
                    write!(f, "{step}:")?;
                }
                write!(f, "{hi}]")
            }
            ForIter::Set(items) => write!(
                f,
                "{{{}}}",
                items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
            ForIter::Array(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubroutineParam {
    pub name: Rc<str>,
    pub ty: TypeDef,
    pub is_quantum: bool,
}

impl Display for SubroutineParam {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}

/// A classical or quantum type as written in source. Widths and array
/// dimensions are expressions so that `int[n]` with a constant `n` can be
/// folded once the scope is available.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDef {
    Bool,
    Bit,
    BitArray(Option<Expr>),
    Int(Option<Expr>),
    UInt(Option<Expr>),
    Float(Option<Expr>),
    Angle(Option<Expr>),
    Complex(Box<TypeDef>),
    Duration,
    Stretch,
    Qubit,
    QubitArray(Expr),
    Array(Box<TypeDef>, Vec<Expr>),
}

impl Display for TypeDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TypeDef::Bool => write!(f, "bool"),
            TypeDef::Bit => write!(f, "bit"),
            TypeDef::BitArray(None) => write!(f, "bit[]"),
            TypeDef::BitArray(Some(n)) => write!(f, "bit[{n}]"),
            TypeDef::Int(None) => write!(f, "int"),
            TypeDef::Int(Some(n)) => write!(f, "int[{n}]"),
            TypeDef::UInt(None) => write!(f, "uint"),
            TypeDef::UInt(Some(n)) => write!(f, "uint[{n}]"),
            TypeDef::Float(None) => write!(f, "float"),
            TypeDef::Float(Some(n)) => write!(f, "float[{n}]"),
            TypeDef::Angle(None) => write!(f, "angle"),
            TypeDef::Angle(Some(n)) => write!(f, "angle[{n}]"),
            TypeDef::Complex(inner) => write!(f, "complex[{inner}]"),
            TypeDef::Duration => write!(f, "duration"),
            TypeDef::Stretch => write!(f, "stretch"),
            TypeDef::Qubit => write!(f, "qubit"),
            TypeDef::QubitArray(n) => write!(f, "qubit[{n}]"),
            TypeDef::Array(elem, dims) => write!(
                f,
                "array[{elem}, {}]",
                dims.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

/// A classical expression. Spans are carried so the evaluator can attach
/// diagnostics precisely.
#[derive(Clone, Debug, PartialEq)]
pub struct Expr {
    pub span: Span,
    pub kind: Box<ExprKind>,
}

impl Expr {
    #[must_use]
    pub fn new(span: Span, kind: ExprKind) -> Self {
        Self {
            span,
            kind: Box::new(kind),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ExprKind {
    Lit(Literal),
    Ident(Rc<str>),
    HardwareQubit(u32),
    Paren(Expr),
    Unary(UnOp, Expr),
    Binary(BinOp, Expr, Expr),
    Cast(TypeDef, Expr),
    Index(Expr, IndexKind),
    Call(Rc<str>, Vec<Expr>),
    Concat(Expr, Expr),
    Measure(GateOperand),
}

impl Display for ExprKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ExprKind::Lit(lit) => write!(f, "{lit}"),
            ExprKind::Ident(name) => write!(f, "{name}"),
            ExprKind::HardwareQubit(n) => write!(f, "${n}"),
            ExprKind::Paren(e) => write!(f, "({e})"),
            ExprKind::Unary(op, e) => write!(f, "{op}{e}"),
            ExprKind::Binary(op, l, r) => write!(f, "({l} {op} {r})"),
            ExprKind::Cast(ty, e) => write!(f, "{ty}({e})"),
            ExprKind::Index(e, idx) => write!(f, "{e}[{idx}]"),
            ExprKind::Call(name, args) => write!(
                f,
                "{name}({})",
                args.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
            ExprKind::Concat(l, r) => write!(f, "{l} ++ {r}"),
            ExprKind::Measure(op) => write!(f, "measure {op}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum IndexKind {
    Single(Expr),
    Range(Option<Expr>, Option<Expr>, Option<Expr>),
    Set(Vec<Expr>),
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            IndexKind::Single(e) => write!(f, "{e}"),
            IndexKind::Range(lo, hi, step) => {
                if let Some(lo) = lo {
                    write!(f, "{lo}")?;
                }
                write!(f, ":")?;
                if let Some(step) = step {
                    write!(f, "{step}:")?;
                }
                if let Some(hi) = hi {
                    write!(f, "{hi}")?;
                }
                Ok(())
            }
            IndexKind::Set(items) => write!(
                f,
                "{{{}}}",
                items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
    BitNot,
}

impl Display for UnOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UnOp::Neg => "-",
            UnOp::Not => "!",
            UnOp::BitNot => "~",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Shl,
    Shr,
    And,
    Or,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Display for BinOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::And => "&&",
            BinOp::Or => "||",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
        })
    }
}

/// Duration units, normalized to nanoseconds except `dt` (device ticks),
/// which is carried symbolically (`spec.md` §4.1, Open Question in §9).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DurationUnit {
    Dt,
    Ns,
    Us,
    Ms,
    S,
}

impl Display for DurationUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DurationUnit::Dt => "dt",
            DurationUnit::Ns => "ns",
            DurationUnit::Us => "us",
            DurationUnit::Ms => "ms",
            DurationUnit::S => "s",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Float(f64),
    Imaginary(f64),
    Bit(bool),
    BitString(Rc<str>),
    Duration(f64, DurationUnit),
    /// `pi`/`π`, `euler`/`e`, `tau`/`τ` (`spec.md` §4.4).
    Constant(MathConstant),
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Imaginary(x) => write!(f, "{x}im"),
            Literal::Bit(b) => write!(f, "{}", u8::from(*b)),
            Literal::BitString(s) => write!(f, "\"{s}\""),
            Literal::Duration(v, unit) => write!(f, "{v}{unit}"),
            Literal::Constant(c) => write!(f, "{c}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MathConstant {
    Pi,
    Euler,
    Tau,
}

impl Display for MathConstant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MathConstant::Pi => "pi",
            MathConstant::Euler => "euler",
            MathConstant::Tau => "tau",
        })
    }
}
