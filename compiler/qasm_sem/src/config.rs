// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Compiler configuration: the knobs that change how a program is checked
//! and flattened without changing what OpenQASM 3 source is accepted.

use bitflags::bitflags;
use rustc_hash::FxHashSet;
use std::rc::Rc;

bitflags! {
    /// Independent toggles for [`crate::module::Module::unroll`].
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct UnrollOptions: u8 {
        /// Keep `barrier` statements in the flattened output instead of
        /// dropping them once their ordering constraint has been recorded.
        const PRESERVE_BARRIERS = 1 << 0;
        /// Keep `include` statements (re-emitted once, at the top) instead
        /// of inlining their effects and dropping the statement itself.
        const PRESERVE_INCLUDES = 1 << 1;
        /// Keep `pragma`/annotation statements attached to the statement
        /// that follows them, instead of dropping them.
        const PRESERVE_PRAGMAS = 1 << 2;
    }
}

/// A target gate basis for [`crate::module::Module::rebase`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TargetBasis {
    /// No rebase; gate applications are left as-is.
    None,
    /// `{rx, ry, rz, cx}`, a common rotational-gate entangling basis.
    RotationalCx,
    /// `{h, s, t, cx}`, the Clifford+T basis.
    CliffordT,
    /// A user-supplied allow-list of intrinsic gate names.
    Custom(Rc<FxHashSet<Rc<str>>>),
}

impl TargetBasis {
    #[must_use]
    pub fn rotational_cx() -> Self {
        Self::RotationalCx
    }

    #[must_use]
    pub fn clifford_t() -> Self {
        Self::CliffordT
    }

    #[must_use]
    pub fn allows(&self, gate: &str) -> bool {
        match self {
            Self::None => true,
            Self::RotationalCx => matches!(gate, "rx" | "ry" | "rz" | "cx" | "id"),
            Self::CliffordT => matches!(gate, "h" | "s" | "sdg" | "t" | "tdg" | "x" | "cx" | "id"),
            Self::Custom(set) => set.contains(gate),
        }
    }
}

/// The full set of settings that parameterize a single run of analysis
/// and flattening over a [`qasm_ast::ast::Program`].
#[derive(Clone, Debug)]
pub struct CompilerConfig {
    /// A display name for the program, used in diagnostics and as the
    /// default `Source::name`.
    pub name: Rc<str>,
    /// Upper bound on how many times a classical loop may be unrolled
    /// before analysis gives up and reports
    /// [`crate::error::Error::MaxLoopItersExceeded`].
    pub max_loop_iters: usize,
    /// Flags controlling what `unroll` keeps versus discards.
    pub unroll_options: UnrollOptions,
    /// The basis `rebase` targets. `TargetBasis::None` makes `rebase` a
    /// no-op.
    pub target_basis: TargetBasis,
    /// Gate names `unroll` leaves unexpanded: a call to one of these is
    /// emitted verbatim with whatever operands and arguments it was given
    /// instead of being looked up as an intrinsic or a user-defined gate,
    /// so a caller can mark a hardware-provided or externally-linked gate
    /// as intentionally opaque rather than triggering `UnknownGate`.
    pub external_gates: Rc<FxHashSet<Rc<str>>>,
}

impl CompilerConfig {
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            max_loop_iters: 1_000_000,
            unroll_options: UnrollOptions::empty(),
            target_basis: TargetBasis::None,
            external_gates: Rc::new(FxHashSet::default()),
        }
    }

    #[must_use]
    pub fn with_max_loop_iters(mut self, max_loop_iters: usize) -> Self {
        self.max_loop_iters = max_loop_iters;
        self
    }

    #[must_use]
    pub fn with_unroll_options(mut self, options: UnrollOptions) -> Self {
        self.unroll_options = options;
        self
    }

    #[must_use]
    pub fn with_target_basis(mut self, basis: TargetBasis) -> Self {
        self.target_basis = basis;
        self
    }

    #[must_use]
    pub fn with_external_gates(mut self, external_gates: Rc<FxHashSet<Rc<str>>>) -> Self {
        self.external_gates = external_gates;
        self
    }
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self::new("program")
    }
}

#[cfg(test)]
mod tests {
    use super::{CompilerConfig, TargetBasis, UnrollOptions};

    #[test]
    fn default_config_has_no_iteration_cap_surprises() {
        let config = CompilerConfig::default();
        assert_eq!(config.max_loop_iters, 1_000_000);
        assert!(config.unroll_options.is_empty());
        assert_eq!(config.target_basis, TargetBasis::None);
    }

    #[test]
    fn clifford_t_basis_allows_expected_gates() {
        let basis = TargetBasis::clifford_t();
        assert!(basis.allows("h"));
        assert!(basis.allows("cx"));
        assert!(!basis.allows("ry"));
    }

    #[test]
    fn unroll_options_combine() {
        let opts = UnrollOptions::PRESERVE_BARRIERS | UnrollOptions::PRESERVE_INCLUDES;
        assert!(opts.contains(UnrollOptions::PRESERVE_BARRIERS));
        assert!(opts.contains(UnrollOptions::PRESERVE_INCLUDES));
        assert!(!opts.contains(UnrollOptions::PRESERVE_PRAGMAS));
    }
}
