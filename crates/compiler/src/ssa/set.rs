//! Variable sets, used by the liveness analysis behind GC hints.

use std::collections::HashMap;

use super::{Variable, VariableId};

/// A mathematical set of variables keyed by id.
#[derive(Clone, Debug, Default)]
pub struct Set {
	map: HashMap<VariableId, Variable>,
}

impl Set {
	pub fn new() -> Self {
		Set::default()
	}

	pub fn contains(&self, id: VariableId) -> bool {
		self.map.contains_key(&id)
	}

	pub fn add(&mut self, var: Variable) {
		self.map.insert(var.id, var);
	}

	/// Does nothing if the variable is not in the set.
	pub fn remove(&mut self, var: &Variable) {
		self.map.remove(&var.id);
	}

	pub fn copy(&self) -> Set {
		self.clone()
	}

	/// Removes the members of `other` from this set.
	pub fn subtract(&mut self, other: &Set) {
		for id in other.map.keys() {
			self.map.remove(id);
		}
	}

	pub fn len(&self) -> usize {
		self.map.len()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	/// Members as an array, sorted by id for determinism.
	pub fn array(&self) -> Vec<Variable> {
		let mut vars: Vec<Variable> = self.map.values().cloned().collect();
		vars.sort_by_key(|v| v.id);
		vars
	}
}

#[cfg(test)]
mod tests {
	use mpcl_circuit::TypeInfo;
	use proptest::prelude::*;

	use super::*;
	use crate::ssa::Generator;

	fn vars(n: usize) -> Vec<Variable> {
		let mut gen = Generator::new();
		(0..n).map(|_| gen.anon_var(TypeInfo::uint(8))).collect()
	}

	#[test]
	fn add_is_idempotent() {
		let vs = vars(1);
		let mut set = Set::new();
		set.add(vs[0].clone());
		set.add(vs[0].clone());
		assert_eq!(set.len(), 1);
		assert!(set.contains(vs[0].id));
	}

	#[test]
	fn subtract_self_is_empty() {
		let vs = vars(4);
		let mut set = Set::new();
		for v in &vs {
			set.add(v.clone());
		}
		let copy = set.copy();
		set.subtract(&copy);
		assert!(set.is_empty());
		// The copy is independent.
		assert_eq!(copy.len(), vs.len());
	}

	#[test]
	fn array_is_sorted_by_id() {
		let vs = vars(8);
		let mut set = Set::new();
		for v in vs.iter().rev() {
			set.add(v.clone());
		}
		let ids: Vec<_> = set.array().iter().map(|v| v.id).collect();
		let mut sorted = ids.clone();
		sorted.sort_unstable();
		assert_eq!(ids, sorted);
	}

	proptest! {
		#[test]
		fn union_laws(picks in proptest::collection::vec(0usize..16, 0..32)) {
			let vs = vars(16);
			let mut a = Set::new();
			let mut b = Set::new();
			for (idx, &pick) in picks.iter().enumerate() {
				if idx % 2 == 0 {
					a.add(vs[pick].clone());
				} else {
					b.add(vs[pick].clone());
				}
			}
			// Commutative union via add.
			let mut ab = a.copy();
			for v in b.array() {
				ab.add(v);
			}
			let mut ba = b.copy();
			for v in a.array() {
				ba.add(v);
			}
			prop_assert_eq!(
				ab.array().iter().map(|v| v.id).collect::<Vec<_>>(),
				ba.array().iter().map(|v| v.id).collect::<Vec<_>>()
			);
			// A \ A = empty.
			let mut aa = a.copy();
			let a2 = a.copy();
			aa.subtract(&a2);
			prop_assert!(aa.is_empty());
		}
	}
}
