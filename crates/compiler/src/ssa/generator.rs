//! The SSA value generator: variable versioning, constant interning and the
//! block arena.
//!
//! The generator is owned by one compilation session and passed explicitly;
//! there is no global state. Blocks live in an arena and are referenced by
//! integer handles, which keeps the bindings/block graph free of reference
//! cycles.

use cranelift_entity::PrimaryMap;
use mpcl_circuit::{TypeInfo, TypeKind};

use super::{Block, BlockId, Bindings, Const, Variable};

const ANON: &str = "%_";

pub struct Generator {
	versions: std::collections::HashMap<String, u32>,
	constants: std::collections::BTreeMap<String, Variable>,
	blocks: PrimaryMap<BlockId, Block>,
	next_id: u32,
}

impl Default for Generator {
	fn default() -> Self {
		Generator::new()
	}
}

impl Generator {
	pub fn new() -> Self {
		Generator {
			versions: std::collections::HashMap::new(),
			constants: std::collections::BTreeMap::new(),
			blocks: PrimaryMap::new(),
			next_id: 0,
		}
	}

	fn mint_id(&mut self) -> u32 {
		let id = self.next_id;
		self.next_id += 1;
		id
	}

	/// The next version of `name` in `scope`.
	pub fn new_var(&mut self, name: &str, ty: TypeInfo, scope: usize) -> Variable {
		let key = format!("{name}@{scope}");
		let version = match self.versions.get(&key) {
			Some(&v) => v + 1,
			None => 0,
		};
		self.versions.insert(key, version);
		Variable {
			id: self.mint_id(),
			name: name.to_string(),
			scope,
			version,
			ty,
			is_const: false,
			const_value: None,
		}
	}

	/// A fresh anonymous value with a rolling version.
	pub fn anon_var(&mut self, ty: TypeInfo) -> Variable {
		self.new_var(ANON, ty, 0)
	}

	/// The canonical undefined value.
	pub fn undef_var(&mut self) -> Variable {
		self.anon_var(TypeInfo::undefined())
	}

	/// A constant value. The type is derived from the value unless a
	/// contextual type is supplied; `min_bits` always reflects the value.
	pub fn constant(&mut self, value: Const, hint: TypeInfo) -> Variable {
		let mut ty = if hint.kind == TypeKind::Undefined {
			value.derive_type()
		} else {
			hint
		};
		ty.min_bits = value.min_bits();
		if ty.bits == 0 {
			ty.bits = ty.min_bits;
		}
		Variable {
			id: self.mint_id(),
			name: format!("${value}"),
			scope: 0,
			version: 0,
			ty,
			is_const: true,
			const_value: Some(value),
		}
	}

	/// Interns a constant by name. Re-adding is idempotent.
	pub fn add_constant(&mut self, c: &Variable) {
		self.constants.entry(c.name.clone()).or_insert_with(|| c.clone());
	}

	/// Removes a constant that turned out to be unused, e.g. the callee
	/// name of `native` once the circuit file has been resolved.
	pub fn remove_constant(&mut self, c: &Variable) {
		self.constants.remove(&c.name);
	}

	/// Interned constants in name order.
	pub fn constants(&self) -> impl Iterator<Item = &Variable> {
		self.constants.values()
	}

	// Block management.

	pub fn new_block(&mut self) -> BlockId {
		let id = self.blocks.next_key();
		self.blocks.push(Block {
			id,
			bindings: Bindings::new(),
			instrs: Vec::new(),
			next: None,
			branch: None,
		})
	}

	/// Creates the fall-through successor of `b`, inheriting its bindings.
	pub fn next_block(&mut self, b: BlockId) -> BlockId {
		let bindings = self.blocks[b].bindings.clone();
		let n = self.new_block();
		self.blocks[n].bindings = bindings;
		self.blocks[b].next = Some(n);
		n
	}

	/// Creates the branch target of `b`, inheriting its bindings.
	pub fn branch_block(&mut self, b: BlockId) -> BlockId {
		let bindings = self.blocks[b].bindings.clone();
		let n = self.new_block();
		self.blocks[n].bindings = bindings;
		self.blocks[b].branch = Some(n);
		n
	}

	pub fn block(&self, id: BlockId) -> &Block {
		&self.blocks[id]
	}

	pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
		&mut self.blocks[id]
	}

	pub fn push_instr(&mut self, block: BlockId, instr: super::Instr) {
		self.blocks[block].instrs.push(instr);
	}

	pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
		self.blocks.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn versions_are_per_name_and_scope() {
		let mut gen = Generator::new();
		let a0 = gen.new_var("a", TypeInfo::uint(8), 1);
		let a1 = gen.new_var("a", TypeInfo::uint(8), 1);
		let other_scope = gen.new_var("a", TypeInfo::uint(8), 2);
		assert_eq!(a0.version, 0);
		assert_eq!(a1.version, 1);
		assert_eq!(other_scope.version, 0);
		assert_ne!(a0, a1);
	}

	#[test]
	fn anon_vars_roll() {
		let mut gen = Generator::new();
		let v0 = gen.anon_var(TypeInfo::uint(4));
		let v1 = gen.undef_var();
		assert_eq!(v0.name, "%_");
		assert_eq!(v1.version, v0.version + 1);
	}

	#[test]
	fn constant_interning_is_idempotent() {
		let mut gen = Generator::new();
		let c0 = gen.constant(Const::I32(6), TypeInfo::undefined());
		let c1 = gen.constant(Const::I32(6), TypeInfo::undefined());
		gen.add_constant(&c0);
		gen.add_constant(&c1);
		assert_eq!(gen.constants().count(), 1);
		gen.remove_constant(&c0);
		assert_eq!(gen.constants().count(), 0);
	}

	#[test]
	fn block_successors_clone_bindings() {
		let mut gen = Generator::new();
		let b0 = gen.new_block();
		let var = gen.new_var("x", TypeInfo::uint(8), 1);
		gen.block_mut(b0).bindings.set("x", var.clone());
		let b1 = gen.next_block(b0);
		let b2 = gen.branch_block(b0);
		assert_eq!(gen.block(b0).next, Some(b1));
		assert_eq!(gen.block(b0).branch, Some(b2));
		assert_eq!(gen.block(b1).bindings.get("x"), Some(&var));
		// Rebinding in the branch does not leak back.
		let var2 = gen.new_var("x", TypeInfo::uint(8), 1);
		gen.block_mut(b2).bindings.set("x", var2);
		assert_eq!(gen.block(b0).bindings.get("x"), Some(&var));
	}
}
