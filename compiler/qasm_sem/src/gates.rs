// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Resolves a `GateCall` statement to a concrete, modifier-free gate
//! application (or a sequence of them, for broadcast calls over
//! registers), and rebases intrinsic gates into a target basis.

use qasm_data_structures::span::Span;

use crate::error::Error;

/// The standard-library intrinsic gates this crate knows the arity of.
/// Anything else is either a user-defined gate (looked up in scope) or
/// unknown.
const INTRINSIC_ARITY: &[(&str, usize)] = &[
    ("id", 1),
    ("x", 1),
    ("y", 1),
    ("z", 1),
    ("h", 1),
    ("s", 1),
    ("sdg", 1),
    ("t", 1),
    ("tdg", 1),
    ("sx", 1),
    ("sxdg", 1),
    ("rx", 1),
    ("ry", 1),
    ("rz", 1),
    ("p", 1),
    ("u", 1),
    ("gphase", 0),
    ("cx", 2),
    ("cy", 2),
    ("cz", 2),
    ("swap", 2),
    ("ccx", 3),
];

/// Gates allowed a non-integer `pow(k)` exponent: rotation-family
/// *intrinsics* whose fractional power is itself a well-defined
/// rotation. `crx`/`cry`/`crz`/`cp` moved to [`crate::decompositions`]
/// (`spec.md` §4.5 tier 2) and are no longer dispatched on this path, so
/// a fractional `pow` on one of those now rejects via the user-gate-like
/// inlining path's integer-only repeat count rather than this list —
/// see `DESIGN.md`'s "Gate Dispatcher" entry for why that is an accepted
/// narrowing rather than a silent gap.
const FRACTIONAL_POW_ALLOWED: &[&str] = &["rx", "ry", "rz", "p"];

#[must_use]
pub fn intrinsic_arity(name: &str) -> Option<usize> {
    INTRINSIC_ARITY
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, arity)| *arity)
}

/// Whether `name` may take a non-integer `pow(k)` exponent: the
/// rotation-family intrinsics, whose fractional power is itself a
/// well-defined rotation by a scaled angle. The lowerer rewrites the
/// rotation argument directly for these rather than repeating the
/// application.
#[must_use]
pub fn fractional_pow_allowed(name: &str) -> bool {
    FRACTIONAL_POW_ALLOWED.contains(&name)
}

/// Checks that `qubits` has the arity `name` expects, where `name` is
/// either an intrinsic gate or a user-defined gate with a known
/// parameter count.
pub fn check_arity(
    name: &str,
    expected: usize,
    found: usize,
    span: Span,
) -> Result<(), Error> {
    if expected != found {
        return Err(Error::QubitArityMismatch {
            name: name.to_string(),
            expected,
            found,
            span,
        });
    }
    Ok(())
}

/// Expands a broadcast gate call: when one or more qubit operands name a
/// whole register (size > 1) rather than a single qubit, the call
/// applies element-wise across all such registers, which must all agree
/// on length.
///
/// `operand_lens` gives, for each operand position, `Some(len)` if that
/// operand is a whole register and `None` if it is a single qubit (to be
/// held fixed across every broadcast iteration).
#[must_use]
pub fn broadcast_length(operand_lens: &[Option<usize>]) -> Option<usize> {
    operand_lens.iter().flatten().copied().max()
}

pub fn check_broadcast_lengths(operand_lens: &[Option<usize>], span: Span) -> Result<(), Error> {
    let mut lens = operand_lens.iter().flatten().copied();
    let Some(first) = lens.next() else {
        return Ok(());
    };
    for len in lens {
        if len != first {
            return Err(Error::BroadcastLengthMismatch(first, len, span));
        }
    }
    Ok(())
}

/// Whether `name`, after modifiers were resolved, is permitted by
/// `basis`.
pub fn check_basis(name: &str, basis: &crate::config::TargetBasis, span: Span) -> Result<(), Error> {
    if matches!(basis, crate::config::TargetBasis::None) {
        return Ok(());
    }
    if basis.allows(name) {
        Ok(())
    } else {
        Err(Error::NoRebaseRule {
            gate: name.to_string(),
            basis: format!("{basis:?}"),
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{broadcast_length, check_arity, check_broadcast_lengths, intrinsic_arity};
    use qasm_data_structures::span::Span;

    #[test]
    fn known_intrinsics_report_correct_arity() {
        assert_eq!(intrinsic_arity("h"), Some(1));
        assert_eq!(intrinsic_arity("cx"), Some(2));
        assert_eq!(intrinsic_arity("ccx"), Some(3));
        assert_eq!(intrinsic_arity("bogus"), None);
    }

    #[test]
    fn arity_mismatch_is_reported() {
        assert!(check_arity("h", 1, 2, Span::default()).is_err());
        assert!(check_arity("cx", 2, 2, Span::default()).is_ok());
    }

    #[test]
    fn broadcast_takes_the_max_register_length() {
        assert_eq!(broadcast_length(&[Some(3), None, Some(3)]), Some(3));
        assert_eq!(broadcast_length(&[None, None]), None);
    }

    #[test]
    fn mismatched_broadcast_lengths_error() {
        assert!(check_broadcast_lengths(&[Some(2), Some(3)], Span::default()).is_err());
        assert!(check_broadcast_lengths(&[Some(2), None, Some(2)], Span::default()).is_ok());
    }
}
