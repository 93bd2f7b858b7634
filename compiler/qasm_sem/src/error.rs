// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Diagnostics produced while checking and flattening a program.
//!
//! Every variant carries the `Span` of the offending construct so that
//! [`WithSource`] can render a `miette` report pointing at the original
//! source text. Diagnostic codes follow the `Qasm.Lowerer.*` convention.

use miette::{Diagnostic, MietteError, MietteSpanContents, SourceCode, SourceSpan, SpanContents};
use qasm_data_structures::span::Span;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::Arc;
use thiserror::Error;

#[derive(Clone, Debug, Diagnostic, Error)]
pub enum Error {
    #[error("unsupported OpenQASM version: {0}")]
    #[diagnostic(help("only OpenQASM 3.0 and 3.1 are supported"))]
    #[diagnostic(code("Qasm.Lowerer.UnsupportedVersion"))]
    UnsupportedVersion(String, #[label] Span),

    #[error("include `{0}` is not allowed outside the global scope")]
    #[diagnostic(code("Qasm.Lowerer.IncludeNotInGlobalScope"))]
    IncludeNotInGlobalScope(String, #[label] Span),

    #[error("cannot find include file `{0}`")]
    #[diagnostic(code("Qasm.Lowerer.IncludeNotFound"))]
    IncludeNotFound(String, #[label] Span),

    #[error("cyclic include of `{0}`")]
    #[diagnostic(code("Qasm.Lowerer.IncludeCycle"))]
    IncludeCycle(String, #[label] Span),

    #[error("undefined symbol: {0}")]
    #[diagnostic(code("Qasm.Lowerer.UndefinedSymbol"))]
    UndefinedSymbol(String, #[label] Span),

    #[error("redefined symbol: {0}")]
    #[diagnostic(help("a symbol with this name is already declared in this scope"))]
    #[diagnostic(code("Qasm.Lowerer.RedefinedSymbol"))]
    RedefinedSymbol(String, #[label] Span),

    #[error("cannot update const variable `{0}`")]
    #[diagnostic(help("mutable variables must be declared without the keyword `const`"))]
    #[diagnostic(code("Qasm.Lowerer.CannotUpdateConstVariable"))]
    CannotUpdateConstVariable(String, #[label] Span),

    #[error("cannot update a loop variable bound by a `for` statement")]
    #[diagnostic(help("the iteration variable of a `for` loop is read-only"))]
    #[diagnostic(code("Qasm.Lowerer.CannotUpdateLoopVariable"))]
    CannotUpdateLoopVariable(#[label] Span),

    #[error("type mismatch: expected {expected}, found {found}")]
    #[diagnostic(code("Qasm.Lowerer.TypeMismatch"))]
    TypeMismatch {
        expected: String,
        found: String,
        #[label]
        span: Span,
    },

    #[error("cannot cast literal {value} to type {ty}")]
    #[diagnostic(code("Qasm.Lowerer.CannotCastLiteral"))]
    CannotCastLiteral {
        value: String,
        ty: String,
        #[label]
        span: Span,
    },

    #[error("inconsistent types in alias: {0}")]
    #[diagnostic(code("Qasm.Lowerer.InconsistentTypesInAlias"))]
    InconsistentTypesInAlias(String, #[label] Span),

    #[error("a declared width is required here")]
    #[diagnostic(help("sized classical types need an explicit bit width in this context"))]
    #[diagnostic(code("Qasm.Lowerer.WidthRequired"))]
    WidthRequired(#[label] Span),

    #[error("index {index} is out of range for a register of size {size}")]
    #[diagnostic(code("Qasm.Lowerer.IndexOutOfRange"))]
    IndexOutOfRange {
        index: i64,
        size: usize,
        #[label]
        span: Span,
    },

    #[error("division by zero")]
    #[diagnostic(code("Qasm.Lowerer.DivisionByZero"))]
    DivisionByZero(#[label] Span),

    #[error("qubit `{0}` is referenced more than once in this gate call")]
    #[diagnostic(code("Qasm.Lowerer.DuplicateQubit"))]
    DuplicateQubit(String, #[label] Span),

    #[error(
        "broadcast operands have mismatched lengths: {0} and {1}"
    )]
    #[diagnostic(code("Qasm.Lowerer.BroadcastLengthMismatch"))]
    BroadcastLengthMismatch(usize, usize, #[label] Span),

    #[error("gate `{name}` expects {expected} qubit(s), found {found}")]
    #[diagnostic(code("Qasm.Lowerer.QubitArityMismatch"))]
    QubitArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        #[label]
        span: Span,
    },

    #[error("gate `{name}` expects {expected} parameter(s), found {found}")]
    #[diagnostic(code("Qasm.Lowerer.ParameterArityMismatch"))]
    ParameterArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        #[label]
        span: Span,
    },

    #[error("subroutine `{name}` expects {expected} argument(s), found {found}")]
    #[diagnostic(code("Qasm.Lowerer.SubroutineArityMismatch"))]
    SubroutineArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        #[label]
        span: Span,
    },

    #[error("unknown gate `{0}`")]
    #[diagnostic(code("Qasm.Lowerer.UnknownGate"))]
    UnknownGate(String, #[label] Span),

    #[error("`pow` modifier requires an integer or a gate that supports fractional powers")]
    #[diagnostic(code("Qasm.Lowerer.UnsupportedFractionalPower"))]
    UnsupportedFractionalPower(String, #[label] Span),

    #[error("`ctrl`/`negctrl` cannot be applied to `{0}`")]
    #[diagnostic(code("Qasm.Lowerer.UnsupportedControl"))]
    UnsupportedControl(String, #[label] Span),

    #[error("loop condition could not be resolved to a compile-time constant bound")]
    #[diagnostic(help(
        "the flattener can only unroll loops whose trip count is known without running the program"
    ))]
    #[diagnostic(code("Qasm.Lowerer.DynamicLoopBound"))]
    DynamicLoopBound(#[label] Span),

    #[error("loop exceeded the maximum of {0} iterations")]
    #[diagnostic(help(
        "raise `CompilerConfig::max_loop_iters` if this loop is expected to run this long"
    ))]
    #[diagnostic(code("Qasm.Lowerer.MaxLoopItersExceeded"))]
    MaxLoopItersExceeded(usize, #[label] Span),

    #[error("this construct is not supported: {0}")]
    #[diagnostic(code("Qasm.Lowerer.Unimplemented"))]
    Unimplemented(String, #[label] Span),

    #[error("a gate basis rebase has no rule for `{gate}` in the target basis `{basis}`")]
    #[diagnostic(code("Qasm.Lowerer.NoRebaseRule"))]
    NoRebaseRule {
        gate: String,
        basis: String,
        #[label]
        span: Span,
    },
}

impl Error {
    /// Returns `true` for diagnostics that should abort analysis outright
    /// (as opposed to being collected and reported alongside others).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::Unimplemented(..))
    }
}

/// A single named source text. Unlike `qsc_frontend`'s `SourceMap`, this
/// crate has no external parser stitching multiple included files into
/// one offset space: a `Program` is checked against the one source text
/// it was parsed from, with included files resolved and spliced in ahead
/// of time by the caller's parser, so a single `Source` suffices.
#[derive(Clone, Debug)]
pub struct Source {
    pub name: Arc<str>,
    pub contents: Arc<str>,
}

/// Wraps an [`Error`] with the source text needed to render a `miette`
/// report, mirroring the shape of `qsc_frontend::error::WithSource` without
/// the multi-file offset bookkeeping that crate needs for includes.
#[derive(Clone, Debug)]
pub struct WithSource<E> {
    source: Source,
    error: E,
}

impl<E: Diagnostic + Send + Sync> WithSource<E> {
    pub fn new(source: Source, error: E) -> Self {
        Self { source, error }
    }

    pub fn error(&self) -> &E {
        &self.error
    }

    pub fn into_error(self) -> E {
        self.error
    }
}

impl<E: Diagnostic> std::error::Error for WithSource<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

impl<E: Diagnostic + Send + Sync> Diagnostic for WithSource<E> {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.error.code()
    }

    fn severity(&self) -> Option<miette::Severity> {
        self.error.severity()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.error.help()
    }

    fn url<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.error.url()
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(self)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        self.error.labels()
    }

    fn related<'a>(&'a self) -> Option<Box<dyn Iterator<Item = &'a dyn Diagnostic> + 'a>> {
        self.error.related()
    }
}

impl<E: Diagnostic + Display> Display for WithSource<E> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(&self.error, f)
    }
}

impl<E: Diagnostic + Sync + Send> SourceCode for WithSource<E> {
    fn read_span<'a>(
        &'a self,
        span: &SourceSpan,
        context_lines_before: usize,
        context_lines_after: usize,
    ) -> Result<Box<dyn SpanContents<'a> + 'a>, MietteError> {
        let contents =
            self.source
                .contents
                .read_span(span, context_lines_before, context_lines_after)?;
        Ok(Box::new(MietteSpanContents::new_named(
            self.source.name.to_string(),
            contents.data(),
            *contents.span(),
            contents.line(),
            contents.column(),
            contents.line_count(),
        )))
    }
}

/// Reads the `QASM_EXPAND_TRACEBACK` environment variable. When set to a
/// truthy value, callers print the full `miette` report (source snippet,
/// label, help text) instead of a single-line message.
#[must_use]
pub fn expand_traceback_requested() -> bool {
    matches!(
        std::env::var("QASM_EXPAND_TRACEBACK").as_deref(),
        Ok("1" | "true" | "TRUE" | "yes")
    )
}
