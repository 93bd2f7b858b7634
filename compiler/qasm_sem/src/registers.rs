// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Qubit and clbit identity tracking: every declared register is assigned
//! a contiguous range in a flat global index space, physical `$n` qubits
//! are drawn from the same pool, and aliases resolve to a list of indices
//! into it rather than owning storage of their own.

use qasm_data_structures::span::Span;
use rustc_hash::FxHashMap;
use std::rc::Rc;

use crate::error::Error;

/// A flat, 0-based index into the program's qubit space or clbit space.
pub type Id = u32;

/// A declared `qubit[n]` or `bit[n]` register: a name bound to a
/// contiguous range `[base, base + size)` in the relevant flat index
/// space.
#[derive(Clone, Debug)]
pub struct Register {
    pub name: Rc<str>,
    pub base: Id,
    pub size: u32,
}

impl Register {
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        index < self.size
    }

    #[must_use]
    pub fn resolve(&self, index: u32) -> Id {
        self.base + index
    }
}

/// Owns the flat qubit and clbit index spaces for one program, handing
/// out fresh ranges as registers are declared and resolving aliases
/// (which may select a non-contiguous subset) down to plain index lists.
#[derive(Clone, Debug, Default)]
pub struct RegisterFile {
    qubit_registers: FxHashMap<Rc<str>, Register>,
    clbit_registers: FxHashMap<Rc<str>, Register>,
    next_qubit: Id,
    next_clbit: Id,
    /// Hardware qubits (`$n`) referenced directly, deduplicated.
    hardware_qubits: FxHashMap<u32, Id>,
}

impl RegisterFile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_qubits(&mut self, name: Rc<str>, size: u32) -> Register {
        let reg = Register {
            name: name.clone(),
            base: self.next_qubit,
            size,
        };
        self.next_qubit += size;
        self.qubit_registers.insert(name, reg.clone());
        reg
    }

    pub fn declare_clbits(&mut self, name: Rc<str>, size: u32) -> Register {
        let reg = Register {
            name: name.clone(),
            base: self.next_clbit,
            size,
        };
        self.next_clbit += size;
        self.clbit_registers.insert(name, reg.clone());
        reg
    }

    /// Returns the flat id for a hardware qubit `$n`, allocating a fresh
    /// slot the first time `n` is seen.
    pub fn hardware_qubit(&mut self, n: u32) -> Id {
        if let Some(id) = self.hardware_qubits.get(&n) {
            return *id;
        }
        let id = self.next_qubit;
        self.next_qubit += 1;
        self.hardware_qubits.insert(n, id);
        id
    }

    #[must_use]
    pub fn qubit_register(&self, name: &str) -> Option<&Register> {
        self.qubit_registers.get(name)
    }

    #[must_use]
    pub fn clbit_register(&self, name: &str) -> Option<&Register> {
        self.clbit_registers.get(name)
    }

    #[must_use]
    pub fn num_qubits(&self) -> u32 {
        self.next_qubit
    }

    #[must_use]
    pub fn num_clbits(&self) -> u32 {
        self.next_clbit
    }

    /// Declared qubit registers in first-declared order, the order
    /// [`crate::module`]'s idle-qubit pruning and qubit-order reversal
    /// passes renumber against.
    #[must_use]
    pub fn qubit_registers_in_order(&self) -> Vec<&Register> {
        let mut regs: Vec<&Register> = self.qubit_registers.values().collect();
        regs.sort_by_key(|r| r.base);
        regs
    }

    /// Builds a new `RegisterFile` containing only the qubits in `keep`,
    /// renumbered contiguously in increasing id order, and carries the
    /// clbit registers across unchanged. Returns the old -> new qubit id
    /// map alongside, for remapping the statements that reference them.
    ///
    /// A register's surviving qubits stay contiguous in the new numbering:
    /// no other register's ids fall inside `[reg.base, reg.base + reg.size)`,
    /// so filtering that range and assigning new ids in sorted order never
    /// interleaves two registers.
    #[must_use]
    pub fn filter_qubits(&self, keep: &rustc_hash::FxHashSet<Id>) -> (Self, FxHashMap<Id, Id>) {
        let mut ids: Vec<Id> = keep.iter().copied().collect();
        ids.sort_unstable();
        let map: FxHashMap<Id, Id> = ids
            .iter()
            .enumerate()
            .map(|(new, &old)| (old, new as Id))
            .collect();

        let mut qubit_registers = FxHashMap::default();
        for reg in self.qubit_registers.values() {
            let kept: Vec<Id> = (reg.base..reg.base + reg.size)
                .filter(|id| keep.contains(id))
                .collect();
            let Some(&first) = kept.first() else {
                continue;
            };
            qubit_registers.insert(
                reg.name.clone(),
                Register {
                    name: reg.name.clone(),
                    base: map[&first],
                    size: kept.len() as u32,
                },
            );
        }
        let hardware_qubits = self
            .hardware_qubits
            .iter()
            .filter_map(|(&n, id)| map.get(id).map(|&new_id| (n, new_id)))
            .collect();
        let file = Self {
            qubit_registers,
            clbit_registers: self.clbit_registers.clone(),
            next_qubit: ids.len() as Id,
            next_clbit: self.next_clbit,
            hardware_qubits,
        };
        (file, map)
    }

    /// Builds a new `RegisterFile` with the qubit id space reversed
    /// (`id -> num_qubits - 1 - id`), clbits and register names/sizes
    /// unchanged. Returns the old -> new qubit id map alongside.
    #[must_use]
    pub fn reverse_qubits(&self) -> (Self, FxHashMap<Id, Id>) {
        let n = self.next_qubit;
        let map: FxHashMap<Id, Id> = (0..n).map(|id| (id, n - 1 - id)).collect();
        let qubit_registers = self
            .qubit_registers
            .iter()
            .map(|(name, reg)| {
                (
                    name.clone(),
                    Register {
                        name: reg.name.clone(),
                        base: n - reg.base - reg.size,
                        size: reg.size,
                    },
                )
            })
            .collect();
        let hardware_qubits = self
            .hardware_qubits
            .iter()
            .map(|(&hw, id)| (hw, map[id]))
            .collect();
        let file = Self {
            qubit_registers,
            clbit_registers: self.clbit_registers.clone(),
            next_qubit: n,
            next_clbit: self.next_clbit,
            hardware_qubits,
        };
        (file, map)
    }

    /// Resolves `name[index]` against a declared qubit register, checking
    /// bounds.
    pub fn resolve_qubit_index(
        &self,
        name: &str,
        index: i64,
        span: Span,
    ) -> Result<Id, Error> {
        let reg = self
            .qubit_registers
            .get(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_string(), span))?;
        resolve_index(reg, index, span)
    }

    /// Resolves `name[index]` against a declared clbit register, checking
    /// bounds.
    pub fn resolve_clbit_index(
        &self,
        name: &str,
        index: i64,
        span: Span,
    ) -> Result<Id, Error> {
        let reg = self
            .clbit_registers
            .get(name)
            .ok_or_else(|| Error::UndefinedSymbol(name.to_string(), span))?;
        resolve_index(reg, index, span)
    }
}

fn resolve_index(reg: &Register, index: i64, span: Span) -> Result<Id, Error> {
    let normalized = if index < 0 {
        i64::from(reg.size) + index
    } else {
        index
    };
    if normalized < 0 || normalized >= i64::from(reg.size) {
        return Err(Error::IndexOutOfRange {
            index,
            size: reg.size as usize,
            span,
        });
    }
    Ok(reg.resolve(normalized as u32))
}

/// Checks a list of resolved qubit ids used together in a single gate
/// call or barrier for duplicates, which OpenQASM 3 forbids (a qubit
/// cannot be both a control and the target of the same operation).
pub fn check_no_duplicates(ids: &[Id], names: &[Rc<str>], span: Span) -> Result<(), Error> {
    let mut seen = rustc_hash::FxHashSet::default();
    for (id, name) in ids.iter().zip(names) {
        if !seen.insert(*id) {
            return Err(Error::DuplicateQubit(name.to_string(), span));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::RegisterFile;
    use qasm_data_structures::span::Span;

    #[test]
    fn registers_are_allocated_contiguously() {
        let mut file = RegisterFile::new();
        file.declare_qubits("q".into(), 3);
        file.declare_qubits("anc".into(), 2);
        assert_eq!(file.num_qubits(), 5);
        assert_eq!(file.resolve_qubit_index("anc", 0, Span::default()).unwrap(), 3);
        assert_eq!(file.resolve_qubit_index("anc", 1, Span::default()).unwrap(), 4);
    }

    #[test]
    fn negative_index_counts_from_the_end() {
        let mut file = RegisterFile::new();
        file.declare_qubits("q".into(), 3);
        assert_eq!(file.resolve_qubit_index("q", -1, Span::default()).unwrap(), 2);
    }

    #[test]
    fn out_of_range_index_errors() {
        let mut file = RegisterFile::new();
        file.declare_qubits("q".into(), 3);
        assert!(file.resolve_qubit_index("q", 3, Span::default()).is_err());
    }

    #[test]
    fn hardware_qubits_are_deduplicated() {
        let mut file = RegisterFile::new();
        let a = file.hardware_qubit(5);
        let b = file.hardware_qubit(5);
        let c = file.hardware_qubit(6);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
