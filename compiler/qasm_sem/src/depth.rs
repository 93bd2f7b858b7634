// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tracks circuit depth: the longest chain of operations touching any
//! single qubit or clbit. Each operation bumps every operand's counter
//! to one past the current maximum among its operands, the standard
//! "critical path" definition.
//!
//! Branches (`if`, `switch` cases) are handled by snapshotting the
//! counters before the branch, running each arm against a independent
//! copy, and merging back in with the per-operand maximum across arms —
//! an untaken branch cannot be charged against depth, but a taken one
//! must be, and at lowering time we do not know which arm a dynamic
//! condition will take.

use rustc_hash::FxHashMap;

use crate::registers::Id;

#[derive(Clone, Debug, Default)]
pub struct DepthTracker {
    qubit_depth: FxHashMap<Id, u64>,
    clbit_depth: FxHashMap<Id, u64>,
}

impl DepthTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an operation touching `qubits` and `clbits`, advancing all
    /// of their counters to one past the current maximum among them.
    pub fn touch(&mut self, qubits: &[Id], clbits: &[Id]) {
        let current_max = qubits
            .iter()
            .map(|q| *self.qubit_depth.get(q).unwrap_or(&0))
            .chain(clbits.iter().map(|c| *self.clbit_depth.get(c).unwrap_or(&0)))
            .max()
            .unwrap_or(0);
        let next = current_max + 1;
        for q in qubits {
            self.qubit_depth.insert(*q, next);
        }
        for c in clbits {
            self.clbit_depth.insert(*c, next);
        }
    }

    /// A `barrier` over `qubits` synchronizes their depths to the common
    /// maximum without counting as an operation itself.
    pub fn sync_barrier(&mut self, qubits: &[Id]) {
        let current_max = qubits
            .iter()
            .map(|q| *self.qubit_depth.get(q).unwrap_or(&0))
            .max()
            .unwrap_or(0);
        for q in qubits {
            self.qubit_depth.insert(*q, current_max);
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Merges `other` (an arm explored from a snapshot of `self`) back
    /// in by taking the per-operand maximum, the conservative bound used
    /// when a branch's condition is not known at flatten time.
    pub fn merge_max(&mut self, other: &Self) {
        for (id, depth) in &other.qubit_depth {
            let entry = self.qubit_depth.entry(*id).or_insert(0);
            *entry = (*entry).max(*depth);
        }
        for (id, depth) in &other.clbit_depth {
            let entry = self.clbit_depth.entry(*id).or_insert(0);
            *entry = (*entry).max(*depth);
        }
    }

    #[must_use]
    pub fn total_depth(&self) -> u64 {
        self.qubit_depth
            .values()
            .chain(self.clbit_depth.values())
            .copied()
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn qubit_depth(&self, id: Id) -> u64 {
        *self.qubit_depth.get(&id).unwrap_or(&0)
    }

    /// Rekeys the qubit counters through `map` (old id -> new id),
    /// dropping any qubit with no entry — used after
    /// `Module::remove_idle_qubits`/`reverse_qubit_order` renumber the
    /// qubit id space out from under an already-computed `DepthTracker`.
    #[must_use]
    pub fn remap_qubits(&self, map: &FxHashMap<Id, Id>) -> Self {
        let qubit_depth = self
            .qubit_depth
            .iter()
            .filter_map(|(id, depth)| map.get(id).map(|new_id| (*new_id, *depth)))
            .collect();
        Self {
            qubit_depth,
            clbit_depth: self.clbit_depth.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DepthTracker;

    #[test]
    fn sequential_ops_on_the_same_qubit_increase_depth() {
        let mut tracker = DepthTracker::new();
        tracker.touch(&[0], &[]);
        tracker.touch(&[0], &[]);
        tracker.touch(&[0], &[]);
        assert_eq!(tracker.qubit_depth(0), 3);
    }

    #[test]
    fn independent_qubits_do_not_affect_each_other() {
        let mut tracker = DepthTracker::new();
        tracker.touch(&[0], &[]);
        tracker.touch(&[0], &[]);
        tracker.touch(&[1], &[]);
        assert_eq!(tracker.qubit_depth(0), 2);
        assert_eq!(tracker.qubit_depth(1), 1);
    }

    #[test]
    fn a_two_qubit_gate_synchronizes_depths() {
        let mut tracker = DepthTracker::new();
        tracker.touch(&[0], &[]);
        tracker.touch(&[0], &[]);
        tracker.touch(&[0, 1], &[]);
        assert_eq!(tracker.qubit_depth(0), 3);
        assert_eq!(tracker.qubit_depth(1), 3);
    }

    #[test]
    fn branch_merge_takes_the_conservative_maximum() {
        let mut tracker = DepthTracker::new();
        tracker.touch(&[0], &[]);
        let mut then_branch = tracker.snapshot();
        then_branch.touch(&[0], &[]);
        then_branch.touch(&[0], &[]);
        let mut else_branch = tracker.snapshot();
        else_branch.touch(&[0], &[]);
        tracker.merge_max(&then_branch);
        tracker.merge_max(&else_branch);
        assert_eq!(tracker.qubit_depth(0), 3);
    }
}
