// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lexical scope tracking. Each gate body, subroutine body, `if`/`for`/
//! `while` block, and `box` pushes a frame; variables, gates, subroutines
//! and aliases live in separate namespaces the way OpenQASM 3 requires
//! (a gate and a variable may share a name without conflict).

use qasm_data_structures::span::Span;
use rustc_hash::FxHashMap;
use std::rc::Rc;

use crate::error::Error;
use crate::types::{Type, Value};

/// A classical binding: either a runtime variable with a statically known
/// type (and, once constant-folded, a known value) or a `const` whose
/// value is fixed at declaration.
#[derive(Clone, Debug)]
pub struct Variable {
    pub ty: Type,
    pub is_const: bool,
    /// `true` for the implicit binding a `for` loop introduces for its
    /// iteration variable: read-only like a `const`, but not spelled with
    /// the `const` keyword, so it gets a dedicated diagnostic
    /// ([`Error::CannotUpdateLoopVariable`]) instead of
    /// [`Error::CannotUpdateConstVariable`].
    pub is_loop_binding: bool,
    /// Tracks whether this declaration came from `input`/`output` so that
    /// `Module` can report it distinctly if ever needed; not currently
    /// exposed but carried from the AST so it is not silently lost.
    pub external: bool,
    pub value: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct GateDecl {
    pub params: Vec<Rc<str>>,
    pub qubits: Vec<Rc<str>>,
    pub body: Rc<[qasm_ast::ast::Stmt]>,
}

#[derive(Clone, Debug)]
pub struct SubroutineDecl {
    pub params: Vec<qasm_ast::ast::SubroutineParam>,
    pub return_ty: Option<Type>,
    pub body: Rc<[qasm_ast::ast::Stmt]>,
}

/// The qubit or clbit identities an alias expands to, in order. Aliases
/// to qubit registers and aliases to clbit registers are kept in
/// separate namespaces by living in separate maps on [`Frame`].
#[derive(Clone, Debug)]
pub struct Alias {
    pub ids: Vec<crate::registers::Id>,
}

#[derive(Default, Debug)]
struct Frame {
    variables: FxHashMap<Rc<str>, Variable>,
    gates: FxHashMap<Rc<str>, GateDecl>,
    subroutines: FxHashMap<Rc<str>, SubroutineDecl>,
    qubit_aliases: FxHashMap<Rc<str>, Alias>,
    clbit_aliases: FxHashMap<Rc<str>, Alias>,
}

/// A stack of lexical frames, innermost last. Lookups walk outward from
/// the top; declarations always land in the top frame.
#[derive(Debug)]
pub struct ScopeStack {
    frames: Vec<Frame>,
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeStack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            frames: vec![Frame::default()],
        }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::default());
        log::debug!("scope: pushed frame, depth now {}", self.frames.len());
    }

    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "cannot pop the global frame");
        self.frames.pop();
        log::debug!("scope: popped frame, depth now {}", self.frames.len());
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.frames.len() == 1
    }

    pub fn declare_variable(
        &mut self,
        name: Rc<str>,
        var: Variable,
        span: Span,
    ) -> Result<(), Error> {
        let frame = self.frames.last_mut().expect("at least one frame");
        if frame.variables.contains_key(&name) {
            return Err(Error::RedefinedSymbol(name.to_string(), span));
        }
        frame.variables.insert(name, var);
        Ok(())
    }

    pub fn declare_gate(&mut self, name: Rc<str>, decl: GateDecl, span: Span) -> Result<(), Error> {
        let frame = self.frames.last_mut().expect("at least one frame");
        if frame.gates.contains_key(&name) {
            return Err(Error::RedefinedSymbol(name.to_string(), span));
        }
        frame.gates.insert(name, decl);
        Ok(())
    }

    pub fn declare_subroutine(
        &mut self,
        name: Rc<str>,
        decl: SubroutineDecl,
        span: Span,
    ) -> Result<(), Error> {
        let frame = self.frames.last_mut().expect("at least one frame");
        if frame.subroutines.contains_key(&name) {
            return Err(Error::RedefinedSymbol(name.to_string(), span));
        }
        frame.subroutines.insert(name, decl);
        Ok(())
    }

    pub fn declare_qubit_alias(
        &mut self,
        name: Rc<str>,
        alias: Alias,
        span: Span,
    ) -> Result<(), Error> {
        let frame = self.frames.last_mut().expect("at least one frame");
        if frame.qubit_aliases.contains_key(&name) {
            return Err(Error::RedefinedSymbol(name.to_string(), span));
        }
        frame.qubit_aliases.insert(name, alias);
        Ok(())
    }

    pub fn declare_clbit_alias(
        &mut self,
        name: Rc<str>,
        alias: Alias,
        span: Span,
    ) -> Result<(), Error> {
        let frame = self.frames.last_mut().expect("at least one frame");
        if frame.clbit_aliases.contains_key(&name) {
            return Err(Error::RedefinedSymbol(name.to_string(), span));
        }
        frame.clbit_aliases.insert(name, alias);
        Ok(())
    }

    #[must_use]
    pub fn lookup_variable(&self, name: &str) -> Option<&Variable> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.variables.get(name))
    }

    pub fn lookup_variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.frames
            .iter_mut()
            .rev()
            .find_map(|frame| frame.variables.get_mut(name))
    }

    #[must_use]
    pub fn lookup_gate(&self, name: &str) -> Option<&GateDecl> {
        self.frames.iter().rev().find_map(|frame| frame.gates.get(name))
    }

    #[must_use]
    pub fn lookup_subroutine(&self, name: &str) -> Option<&SubroutineDecl> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.subroutines.get(name))
    }

    #[must_use]
    pub fn lookup_qubit_alias(&self, name: &str) -> Option<&Alias> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.qubit_aliases.get(name))
    }

    #[must_use]
    pub fn lookup_clbit_alias(&self, name: &str) -> Option<&Alias> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.clbit_aliases.get(name))
    }

    /// Enforces mutability rules for an assignment target: unknown names
    /// report [`Error::UndefinedSymbol`], `const` targets report
    /// [`Error::CannotUpdateConstVariable`], and `for`-loop bindings report
    /// [`Error::CannotUpdateLoopVariable`].
    pub fn check_assignable(&self, name: &str, span: Span) -> Result<(), Error> {
        let var = self
            .lookup_variable(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_string(), span))?;
        if var.is_loop_binding {
            return Err(Error::CannotUpdateLoopVariable(span));
        }
        if var.is_const {
            return Err(Error::CannotUpdateConstVariable(name.to_string(), span));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(ty: Type, is_const: bool) -> Variable {
        Variable {
            ty,
            is_const,
            is_loop_binding: false,
            external: false,
            value: None,
        }
    }

    #[test]
    fn redeclaration_in_same_scope_errors() {
        let mut scope = ScopeStack::new();
        scope
            .declare_variable("x".into(), var(Type::Int(32), false), Span::default())
            .unwrap();
        let err = scope.declare_variable("x".into(), var(Type::Int(32), false), Span::default());
        assert!(matches!(err, Err(Error::RedefinedSymbol(_, _))));
    }

    #[test]
    fn inner_scope_can_shadow_outer() {
        let mut scope = ScopeStack::new();
        scope
            .declare_variable("x".into(), var(Type::Int(32), false), Span::default())
            .unwrap();
        scope.push();
        scope
            .declare_variable("x".into(), var(Type::Bool, false), Span::default())
            .unwrap();
        assert_eq!(scope.lookup_variable("x").unwrap().ty, Type::Bool);
        scope.pop();
        assert_eq!(scope.lookup_variable("x").unwrap().ty, Type::Int(32));
    }

    #[test]
    fn const_variable_is_not_assignable() {
        let mut scope = ScopeStack::new();
        scope
            .declare_variable("x".into(), var(Type::Int(32), true), Span::default())
            .unwrap();
        let err = scope.check_assignable("x", Span::default());
        assert!(matches!(err, Err(Error::CannotUpdateConstVariable(_, _))));
    }

    #[test]
    fn gate_and_variable_namespaces_do_not_collide() {
        let mut scope = ScopeStack::new();
        scope
            .declare_variable("h".into(), var(Type::Int(32), false), Span::default())
            .unwrap();
        scope
            .declare_gate(
                "h".into(),
                GateDecl {
                    params: vec![],
                    qubits: vec!["q".into()],
                    body: Rc::from(Vec::new()),
                },
                Span::default(),
            )
            .unwrap();
        assert!(scope.lookup_variable("h").is_some());
        assert!(scope.lookup_gate("h").is_some());
    }
}
