// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The Gate Dispatcher's tier-2 catalog (`spec.md` §4.5 "Decomposables"):
//! named gates with a fixed rewrite rule into a sequence of intrinsic
//! applications, expressed as ordinary [`GateDecl`] bodies so
//! [`crate::lowerer`] inlines them through the exact same
//! `inline_gate_body` path it uses for user-defined gates — modifier
//! stacking (`inv`/`pow`/`ctrl`/`negctrl`) and broadcast fall out for
//! free rather than needing a second implementation.
//!
//! Recipes follow the standard circuit identities for each named gate
//! (the same ones a `stdgates.inc`-equivalent library would carry);
//! comments on each recipe name the identity rather than re-deriving it.
//! A name with no entry here and no arity in [`crate::gates`] surfaces
//! `Error::UnknownGate` at lowering time — loud, not a silent pass-through.

use std::rc::Rc;

use qasm_ast::ast::{Expr, ExprKind, GateOperand, Literal, Modifier, Stmt, StmtKind};
use qasm_data_structures::span::Span;

use crate::scope::GateDecl;

fn id(name: &str) -> Rc<str> {
    name.into()
}

fn e_param(name: &str) -> Expr {
    Expr::new(Span::default(), ExprKind::Ident(id(name)))
}

fn e_int(x: i64) -> Expr {
    Expr::new(Span::default(), ExprKind::Lit(Literal::Int(x)))
}

fn e_float(x: f64) -> Expr {
    Expr::new(Span::default(), ExprKind::Lit(Literal::Float(x)))
}

fn e_neg(e: Expr) -> Expr {
    Expr::new(Span::default(), ExprKind::Unary(qasm_ast::ast::UnOp::Neg, e))
}

fn e_add(a: Expr, b: Expr) -> Expr {
    Expr::new(Span::default(), ExprKind::Binary(qasm_ast::ast::BinOp::Add, a, b))
}

fn e_sub(a: Expr, b: Expr) -> Expr {
    Expr::new(Span::default(), ExprKind::Binary(qasm_ast::ast::BinOp::Sub, a, b))
}

fn e_div2(a: Expr) -> Expr {
    Expr::new(
        Span::default(),
        ExprKind::Binary(qasm_ast::ast::BinOp::Div, a, e_float(2.0)),
    )
}

fn e_mul(a: Expr, b: Expr) -> Expr {
    Expr::new(Span::default(), ExprKind::Binary(qasm_ast::ast::BinOp::Mul, a, b))
}

fn q(name: &str) -> GateOperand {
    GateOperand::Ident {
        name: id(name),
        index: None,
    }
}

fn call(name: &str, args: Vec<Expr>, qubits: &[&str]) -> Stmt {
    Stmt::new(
        Span::default(),
        StmtKind::GateCall {
            modifiers: vec![],
            name: id(name),
            args,
            qubits: qubits.iter().map(|n| q(n)).collect(),
        },
    )
}

/// Like [`call`] but with a modifier list attached — used by the
/// ancilla-free multi-controlled recipes (`c3sx`, `c4x`) that delegate
/// straight to the generic `ctrl(n) @` rewrite `lowerer.rs` already
/// implements for any gate, rather than hand-expanding a Toffoli ladder.
fn call_mod(modifiers: Vec<Modifier>, name: &str, args: Vec<Expr>, qubits: &[&str]) -> Stmt {
    Stmt::new(
        Span::default(),
        StmtKind::GateCall {
            modifiers,
            name: id(name),
            args,
            qubits: qubits.iter().map(|n| q(n)).collect(),
        },
    )
}

fn decl(params: &[&str], qubits: &[&str], body: Vec<Stmt>) -> GateDecl {
    GateDecl {
        params: params.iter().map(|p| id(p)).collect(),
        qubits: qubits.iter().map(|n| id(n)).collect(),
        body: body.into(),
    }
}

/// Looks up a fixed decomposition recipe for `name`, or `None` if it is
/// not part of the catalog this pass covers (see the module doc for the
/// ones left as documented gaps).
#[must_use]
pub fn lookup(name: &str) -> Option<GateDecl> {
    Some(match name {
        // U3(theta,phi,lambda) -> Rz(lambda).Rx(pi/2).Rz(theta+pi).Rx(pi/2).Rz(phi+3pi)
        // spec.md 4.1's own worked example of a decomposable recipe.
        "u3" => decl(
            &["theta", "phi", "lambda"],
            &["q"],
            vec![
                call("rz", vec![e_param("lambda")], &["q"]),
                call("rx", vec![e_float(std::f64::consts::FRAC_PI_2)], &["q"]),
                call("rz", vec![e_add(e_param("theta"), e_float(std::f64::consts::PI))], &["q"]),
                call("rx", vec![e_float(std::f64::consts::FRAC_PI_2)], &["q"]),
                call(
                    "rz",
                    vec![e_add(e_param("phi"), e_float(3.0 * std::f64::consts::PI))],
                    &["q"],
                ),
            ],
        ),
        // CU1(lambda)/CPhaseShift(lambda): phase-kickback identity
        // p(l/2) c; cx c,t; p(-l/2) t; cx c,t; p(l/2) t;
        "cu1" | "cp" | "cphaseshift" => decl(
            &["lambda"],
            &["c", "t"],
            vec![
                call("p", vec![e_div2(e_param("lambda"))], &["c"]),
                call("cx", vec![], &["c", "t"]),
                call("p", vec![e_neg(e_div2(e_param("lambda")))], &["t"]),
                call("cx", vec![], &["c", "t"]),
                call("p", vec![e_div2(e_param("lambda"))], &["t"]),
            ],
        ),
        // CPhaseShift00(lambda): phase applied on |00>, via X-conjugation of cp.
        "cphaseshift00" => decl(
            &["lambda"],
            &["c", "t"],
            vec![
                call("x", vec![], &["c"]),
                call("x", vec![], &["t"]),
                call("cp", vec![e_param("lambda")], &["c", "t"]),
                call("x", vec![], &["c"]),
                call("x", vec![], &["t"]),
            ],
        ),
        // CPhaseShift01(lambda): phase applied on |01> (control=0, target=1).
        "cphaseshift01" => decl(
            &["lambda"],
            &["c", "t"],
            vec![
                call("x", vec![], &["c"]),
                call("cp", vec![e_param("lambda")], &["c", "t"]),
                call("x", vec![], &["c"]),
            ],
        ),
        // CPhaseShift10(lambda): phase applied on |10> (control=1, target=0).
        "cphaseshift10" => decl(
            &["lambda"],
            &["c", "t"],
            vec![
                call("x", vec![], &["t"]),
                call("cp", vec![e_param("lambda")], &["c", "t"]),
                call("x", vec![], &["t"]),
            ],
        ),
        // CU3(theta,phi,lambda): standard controlled-U3 via phase kickback +
        // two CX, the same recipe the reference decomposition libraries carry.
        "cu3" => decl(
            &["theta", "phi", "lambda"],
            &["c", "t"],
            cu3_body(),
        ),
        // CU(theta,phi,lambda,gamma): as CU3, plus a global-phase p(gamma)
        // applied to the control qubit (the only place a controlled global
        // phase is observable).
        "cu" => {
            let mut body = vec![call("p", vec![e_param("gamma")], &["c"])];
            body.extend(cu3_body());
            decl(&["theta", "phi", "lambda", "gamma"], &["c", "t"], body)
        }
        // CH: S(t) H(t) T(t) CX(c,t) Tdg(t) H(t) Sdg(t).
        "ch" => decl(
            &[],
            &["c", "t"],
            vec![
                call("s", vec![], &["t"]),
                call("h", vec![], &["t"]),
                call("t", vec![], &["t"]),
                call("cx", vec![], &["c", "t"]),
                call("tdg", vec![], &["t"]),
                call("h", vec![], &["t"]),
                call("sdg", vec![], &["t"]),
            ],
        ),
        // CSwap (Fredkin): cx t2,t1; ccx c,t1,t2; cx t2,t1.
        "cswap" => decl(
            &[],
            &["c", "t1", "t2"],
            vec![
                call("cx", vec![], &["t2", "t1"]),
                call("ccx", vec![], &["c", "t1", "t2"]),
                call("cx", vec![], &["t2", "t1"]),
            ],
        ),
        // CRX(theta): p(pi/2) t; cx c,t; u(-theta/2,0,0) t; cx c,t; u(theta/2,-pi/2,0) t;
        "crx" => decl(
            &["theta"],
            &["c", "t"],
            vec![
                call("p", vec![e_float(std::f64::consts::FRAC_PI_2)], &["t"]),
                call("cx", vec![], &["c", "t"]),
                call("u", vec![e_neg(e_div2(e_param("theta"))), e_float(0.0), e_float(0.0)], &["t"]),
                call("cx", vec![], &["c", "t"]),
                call(
                    "u",
                    vec![e_div2(e_param("theta")), e_float(-std::f64::consts::FRAC_PI_2), e_float(0.0)],
                    &["t"],
                ),
            ],
        ),
        // CRY(theta): ry(theta/2) t; cx c,t; ry(-theta/2) t; cx c,t;
        "cry" => decl(
            &["theta"],
            &["c", "t"],
            vec![
                call("ry", vec![e_div2(e_param("theta"))], &["t"]),
                call("cx", vec![], &["c", "t"]),
                call("ry", vec![e_neg(e_div2(e_param("theta")))], &["t"]),
                call("cx", vec![], &["c", "t"]),
            ],
        ),
        // CRZ(theta): rz(theta/2) t; cx c,t; rz(-theta/2) t; cx c,t;
        "crz" => decl(
            &["theta"],
            &["c", "t"],
            vec![
                call("rz", vec![e_div2(e_param("theta"))], &["t"]),
                call("cx", vec![], &["c", "t"]),
                call("rz", vec![e_neg(e_div2(e_param("theta")))], &["t"]),
                call("cx", vec![], &["c", "t"]),
            ],
        ),
        // CSX: controlled sqrt(X), via SX = H.P(pi/2).H conjugation (up to
        // the global phase a controlled-sqrt gate does not need to track
        // for this pass's purposes).
        "csx" => decl(
            &[],
            &["c", "t"],
            vec![
                call("h", vec![], &["t"]),
                call("cp", vec![e_float(std::f64::consts::FRAC_PI_2)], &["c", "t"]),
                call("h", vec![], &["t"]),
            ],
        ),
        // iSWAP: s(a); s(b); h(a); cx a,b; cx b,a; h(b);
        "iswap" => decl(
            &[],
            &["a", "b"],
            vec![
                call("s", vec![], &["a"]),
                call("s", vec![], &["b"]),
                call("h", vec![], &["a"]),
                call("cx", vec![], &["a", "b"]),
                call("cx", vec![], &["b", "a"]),
                call("h", vec![], &["b"]),
            ],
        ),
        // RXX(theta): H⊗H; CX; RZ(theta); CX; H⊗H.
        "rxx" => decl(
            &["theta"],
            &["a", "b"],
            vec![
                call("h", vec![], &["a"]),
                call("h", vec![], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("rz", vec![e_param("theta")], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("h", vec![], &["a"]),
                call("h", vec![], &["b"]),
            ],
        ),
        // RYY(theta): Rx(pi/2)⊗Rx(pi/2); CX; RZ(theta); CX; Rx(-pi/2)⊗Rx(-pi/2).
        "ryy" => decl(
            &["theta"],
            &["a", "b"],
            vec![
                call("rx", vec![e_float(std::f64::consts::FRAC_PI_2)], &["a"]),
                call("rx", vec![e_float(std::f64::consts::FRAC_PI_2)], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("rz", vec![e_param("theta")], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("rx", vec![e_float(-std::f64::consts::FRAC_PI_2)], &["a"]),
                call("rx", vec![e_float(-std::f64::consts::FRAC_PI_2)], &["b"]),
            ],
        ),
        // RZZ(theta): CX; RZ(theta); CX.
        "rzz" => decl(
            &["theta"],
            &["a", "b"],
            vec![
                call("cx", vec![], &["a", "b"]),
                call("rz", vec![e_param("theta")], &["b"]),
                call("cx", vec![], &["a", "b"]),
            ],
        ),
        // RCCX (relative-phase / "Margolus" Toffoli): correct up to a
        // relative phase on the |101>/|111> subspace, the standard
        // reduced-gate-count Toffoli substitute.
        "rccx" => decl(
            &[],
            &["a", "b", "c"],
            vec![
                call("h", vec![], &["c"]),
                call("t", vec![], &["c"]),
                call("cx", vec![], &["b", "c"]),
                call("tdg", vec![], &["c"]),
                call("cx", vec![], &["a", "c"]),
                call("t", vec![], &["c"]),
                call("cx", vec![], &["b", "c"]),
                call("tdg", vec![], &["c"]),
                call("h", vec![], &["c"]),
            ],
        ),
        // `phaseshift` is the spec's catalog name for the single-qubit
        // phase gate this crate already carries as the intrinsic `p`.
        "phaseshift" => decl(
            &["lambda"],
            &["q"],
            vec![call("p", vec![e_param("lambda")], &["q"])],
        ),
        // ECR (echoed cross-resonance): two back-to-back RZX(+-pi/4)
        // pulses with an X echo between them, RZX expanded via
        // Z-to-X basis change (H on the target) around an RZZ-shaped
        // CX-RZ-CX core — the standard cross-resonance identity.
        "ecr" => decl(
            &[],
            &["a", "b"],
            vec![
                call("h", vec![], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("rz", vec![e_float(std::f64::consts::FRAC_PI_4)], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("h", vec![], &["b"]),
                call("x", vec![], &["a"]),
                call("h", vec![], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("rz", vec![e_float(-std::f64::consts::FRAC_PI_4)], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("h", vec![], &["b"]),
            ],
        ),
        // XXPlusYYGate(theta, beta): the standard partial-iSWAP recipe
        // (rz/sx conjugation sandwiching a pair of ry(-theta/2) rotations
        // through one CX, with beta carried as a pre/post phase on qubit
        // `b` only) — the same 14-gate identity used by every reference
        // decomposition library for this gate.
        "xx_plus_yy" => decl(
            &["theta", "beta"],
            &["a", "b"],
            vec![
                call("rz", vec![e_param("beta")], &["b"]),
                call("rz", vec![e_float(-std::f64::consts::FRAC_PI_2)], &["a"]),
                call("sx", vec![], &["a"]),
                call("rz", vec![e_float(std::f64::consts::FRAC_PI_2)], &["a"]),
                call("s", vec![], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("ry", vec![e_neg(e_div2(e_param("theta")))], &["a"]),
                call("ry", vec![e_neg(e_div2(e_param("theta")))], &["b"]),
                call("cx", vec![], &["a", "b"]),
                call("sdg", vec![], &["b"]),
                call("rz", vec![e_float(-std::f64::consts::FRAC_PI_2)], &["a"]),
                call("sxdg", vec![], &["a"]),
                call("rz", vec![e_float(std::f64::consts::FRAC_PI_2)], &["a"]),
                call("rz", vec![e_neg(e_param("beta"))], &["b"]),
            ],
        ),
        // PSWAP(theta): SWAP composed with the diagonal phase
        // exp(i*theta*(a XOR b)), built from single-qubit `p(theta)` on
        // each operand plus `cp(-2*theta)` to cancel the AND term down
        // to XOR (p(t)_a + p(t)_b - cp(2t)_{a,b} = theta*(a xor b) on
        // computational basis states), then the plain swap.
        "pswap" => decl(
            &["theta"],
            &["a", "b"],
            vec![
                call("p", vec![e_param("theta")], &["a"]),
                call("p", vec![e_param("theta")], &["b"]),
                call("cp", vec![e_neg(e_mul(e_float(2.0), e_param("theta")))], &["a", "b"]),
                call("swap", vec![], &["a", "b"]),
            ],
        ),
        // C3SX / C4X: ancilla-free multi-controlled forms delegated to
        // the generic `ctrl(n) @` rewrite (`spec.md` §4.5's "otherwise
        // decompose ... and controlify via standard multi-controlled
        // construction (ancilla-free, at the cost of exponential depth
        // is acceptable for this pass)") rather than a second hand-built
        // Toffoli-ladder recipe — `lowerer::lower_gate_call` already
        // implements that construction for any base gate.
        "c3sx" => decl(
            &[],
            &["c1", "c2", "c3", "t"],
            vec![call_mod(
                vec![Modifier::Ctrl(Some(e_int(3)))],
                "sx",
                vec![],
                &["c1", "c2", "c3", "t"],
            )],
        ),
        "c4x" => decl(
            &[],
            &["c1", "c2", "c3", "c4", "t"],
            vec![call_mod(
                vec![Modifier::Ctrl(Some(e_int(4)))],
                "x",
                vec![],
                &["c1", "c2", "c3", "c4", "t"],
            )],
        ),
        _ => return None,
    })
}

/// Shared body for `cu3(theta,phi,lambda)` and `cu`'s non-global-phase
/// part: phase-kickback on the control plus two CX, the standard
/// controlled-U3 recipe. Assumes formal names `theta`, `phi`, `lambda`,
/// `c`, `t` — private to this module, never exposed past [`lookup`].
fn cu3_body() -> Vec<Stmt> {
    vec![
        call("p", vec![e_div2(e_add(e_param("phi"), e_param("lambda")))], &["c"]),
        call("p", vec![e_div2(e_sub(e_param("phi"), e_param("lambda")))], &["t"]),
        call("cx", vec![], &["c", "t"]),
        call(
            "u",
            vec![
                e_neg(e_div2(e_param("theta"))),
                e_float(0.0),
                e_neg(e_div2(e_add(e_param("phi"), e_param("lambda")))),
            ],
            &["t"],
        ),
        call("cx", vec![], &["c", "t"]),
        call("u", vec![e_div2(e_param("theta")), e_param("phi"), e_float(0.0)], &["t"]),
    ]
}

#[cfg(test)]
mod tests {
    use super::lookup;

    #[test]
    fn known_decomposables_resolve() {
        for name in [
            "u3", "cu1", "cp", "cphaseshift", "cphaseshift00", "cphaseshift01", "cphaseshift10",
            "cu3", "cu", "ch", "cswap", "crx", "cry", "crz", "csx", "iswap", "rxx", "ryy", "rzz",
            "rccx", "phaseshift", "ecr", "xx_plus_yy", "pswap", "c3sx", "c4x",
        ] {
            assert!(lookup(name).is_some(), "expected a recipe for {name}");
        }
    }

    #[test]
    fn unknown_name_has_no_recipe() {
        assert!(lookup("not_a_gate").is_none());
        assert!(lookup("cx").is_none(), "cx is an intrinsic, not a catalog entry");
    }

    #[test]
    fn recipe_arity_matches_catalog_shape() {
        assert_eq!(lookup("ch").unwrap().qubits.len(), 2);
        assert_eq!(lookup("cswap").unwrap().qubits.len(), 3);
        assert_eq!(lookup("cu").unwrap().params.len(), 4);
        assert_eq!(lookup("ecr").unwrap().qubits.len(), 2);
        assert_eq!(lookup("xx_plus_yy").unwrap().params.len(), 2);
        assert_eq!(lookup("pswap").unwrap().params.len(), 1);
        assert_eq!(lookup("c3sx").unwrap().qubits.len(), 4);
        assert_eq!(lookup("c4x").unwrap().qubits.len(), 5);
    }
}
