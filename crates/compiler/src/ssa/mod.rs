//! The SSA intermediate representation.
//!
//! Every assignment mints a new [`Variable`] version; mutation is never in
//! place. Blocks form a top-down control-flow graph whose joins are
//! reconciled with φ instructions, and the linearized instruction stream of
//! a [`Program`] lowers one instruction at a time into gate families.

pub mod circuitgen;
pub mod generator;
pub mod set;

pub use generator::Generator;
pub use set::Set;

use std::{collections::HashMap, fmt, sync::Arc};

use cranelift_entity::entity_impl;
use itertools::Itertools;
use mpcl_circuit::{Circuit, IOArg, TypeInfo};

use crate::mpa;

pub type VariableId = u32;

/// An SSA variable, uniquely identified by `(name, scope, version)`.
///
/// Constant-folded values are variables with `is_const` set and the host
/// value carried alongside; they intern into the program's constant pool
/// by name.
#[derive(Clone, Debug)]
pub struct Variable {
	pub id: VariableId,
	pub name: String,
	pub scope: usize,
	pub version: u32,
	pub ty: TypeInfo,
	pub is_const: bool,
	pub const_value: Option<Const>,
}

impl Variable {
	/// The key a variable's wire group is bound under.
	pub fn wire_key(&self) -> String {
		self.to_string()
	}

	/// Constant bit at position `i`, in the two's-complement reading.
	pub fn bit(&self, i: u64) -> bool {
		match &self.const_value {
			Some(value) => value.bit(i),
			None => false,
		}
	}

	/// The constant value as a host integer, for indices and shift counts.
	pub fn const_index(&self) -> Option<i64> {
		self.const_value.as_ref()?.to_index()
	}
}

impl PartialEq for Variable {
	fn eq(&self, other: &Self) -> bool {
		self.name == other.name && self.scope == other.scope && self.version == other.version
	}
}

impl Eq for Variable {}

impl fmt::Display for Variable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.is_const {
			return f.write_str(&self.name);
		}
		write!(f, "{}@{}#{}", self.name, self.scope, self.version)
	}
}

/// A constant value. The closed set of host representations the folder
/// produces.
#[derive(Clone, Debug, PartialEq)]
pub enum Const {
	Bool(bool),
	I32(i32),
	Mpa(mpa::Int),
	Str(String),
	Composite(Vec<Const>),
	TypeRef(TypeInfo),
}

impl Const {
	/// The type of the value when no contextual type is known. Integer
	/// literals stay non-concrete so they adapt to the other operand.
	pub fn derive_type(&self) -> TypeInfo {
		match self {
			Const::Bool(_) => TypeInfo::bool(),
			Const::I32(_) => {
				let mut ty = TypeInfo::int32();
				ty.set_concrete(false);
				ty
			}
			Const::Mpa(i) => {
				let mut ty = TypeInfo::int(i.type_size());
				ty.set_concrete(false);
				ty
			}
			Const::Str(s) => TypeInfo::string(s.len() as u32),
			Const::Composite(_) => TypeInfo::undefined(),
			Const::TypeRef(_) => TypeInfo::undefined(),
		}
	}

	/// Smallest wire count sufficient for the value.
	pub fn min_bits(&self) -> u32 {
		match self {
			Const::Bool(false) => 0,
			Const::Bool(true) => 1,
			Const::I32(v) => mpa::Int::from_i64(i64::from(*v)).type_size(),
			Const::Mpa(i) => i.min_width(),
			Const::Str(s) => s.len() as u32 * 8,
			Const::Composite(_) | Const::TypeRef(_) => 0,
		}
	}

	pub fn bit(&self, i: u64) -> bool {
		match self {
			Const::Bool(b) => i == 0 && *b,
			Const::I32(v) => (v >> i.min(31)) & 1 == 1,
			Const::Mpa(x) => x.bit(i),
			Const::Str(s) => {
				let byte = (i / 8) as usize;
				byte < s.len() && (s.as_bytes()[byte] >> (i % 8)) & 1 == 1
			}
			Const::Composite(_) | Const::TypeRef(_) => false,
		}
	}

	/// Wires can be bound to scalar constants only.
	pub fn is_scalar(&self) -> bool {
		!matches!(self, Const::Composite(_) | Const::TypeRef(_))
	}

	pub fn to_index(&self) -> Option<i64> {
		match self {
			Const::I32(v) => Some(i64::from(*v)),
			Const::Mpa(i) => Some(i.to_i64()),
			_ => None,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Const::Bool(b) => Some(*b),
			_ => None,
		}
	}
}

impl fmt::Display for Const {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Const::Bool(b) => write!(f, "{b}"),
			Const::I32(v) => write!(f, "{v}"),
			Const::Mpa(i) => write!(f, "{i}"),
			Const::Str(s) => write!(f, "{s:?}"),
			Const::Composite(vals) => {
				write!(f, "{{")?;
				for (idx, v) in vals.iter().enumerate() {
					if idx > 0 {
						write!(f, ",")?;
					}
					write!(f, "{v}")?;
				}
				write!(f, "}}")
			}
			Const::TypeRef(ty) => write!(f, "{ty}"),
		}
	}
}

/// One SSA instruction.
#[derive(Clone, Debug)]
pub enum Instr {
	Iadd { x: Variable, y: Variable, out: Variable },
	Uadd { x: Variable, y: Variable, out: Variable },
	Isub { x: Variable, y: Variable, out: Variable },
	Usub { x: Variable, y: Variable, out: Variable },
	Imul { x: Variable, y: Variable, out: Variable },
	Umul { x: Variable, y: Variable, out: Variable },
	Idiv { x: Variable, y: Variable, out: Variable },
	Udiv { x: Variable, y: Variable, out: Variable },
	Imod { x: Variable, y: Variable, out: Variable },
	Umod { x: Variable, y: Variable, out: Variable },
	Ilt { x: Variable, y: Variable, out: Variable },
	Ult { x: Variable, y: Variable, out: Variable },
	Ile { x: Variable, y: Variable, out: Variable },
	Ule { x: Variable, y: Variable, out: Variable },
	Igt { x: Variable, y: Variable, out: Variable },
	Ugt { x: Variable, y: Variable, out: Variable },
	Ige { x: Variable, y: Variable, out: Variable },
	Uge { x: Variable, y: Variable, out: Variable },
	Eq { x: Variable, y: Variable, out: Variable },
	Neq { x: Variable, y: Variable, out: Variable },
	Band { x: Variable, y: Variable, out: Variable },
	Bclr { x: Variable, y: Variable, out: Variable },
	Bor { x: Variable, y: Variable, out: Variable },
	Bxor { x: Variable, y: Variable, out: Variable },
	And { x: Variable, y: Variable, out: Variable },
	Or { x: Variable, y: Variable, out: Variable },
	Lshift { x: Variable, count: Variable, out: Variable },
	Rshift { x: Variable, count: Variable, out: Variable },
	Bts { x: Variable, index: Variable, out: Variable },
	Btc { x: Variable, index: Variable, out: Variable },
	Slice { x: Variable, from: Variable, to: Variable, out: Variable },
	Mov { x: Variable, out: Variable },
	Phi { cond: Variable, t: Variable, f: Variable, out: Variable },
	Ret { values: Vec<Variable> },
	Circ { args: Vec<Variable>, circ: Arc<Circuit>, rets: Vec<Variable> },
	Builtin { kind: BuiltinKind, x: Variable, y: Variable, out: Variable },
	/// Garbage-collection hint: the named wire groups are dead past this
	/// point. Lowers to nothing.
	GC { keys: Vec<String> },
}

/// Closed set of builtin gate generators carried by `Builtin` instructions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuiltinKind {
	Hamming,
}

impl fmt::Display for BuiltinKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			BuiltinKind::Hamming => f.write_str("hamming"),
		}
	}
}

impl Instr {
	pub fn opcode(&self) -> &'static str {
		match self {
			Instr::Iadd { .. } => "iadd",
			Instr::Uadd { .. } => "uadd",
			Instr::Isub { .. } => "isub",
			Instr::Usub { .. } => "usub",
			Instr::Imul { .. } => "imul",
			Instr::Umul { .. } => "umul",
			Instr::Idiv { .. } => "idiv",
			Instr::Udiv { .. } => "udiv",
			Instr::Imod { .. } => "imod",
			Instr::Umod { .. } => "umod",
			Instr::Ilt { .. } => "ilt",
			Instr::Ult { .. } => "ult",
			Instr::Ile { .. } => "ile",
			Instr::Ule { .. } => "ule",
			Instr::Igt { .. } => "igt",
			Instr::Ugt { .. } => "ugt",
			Instr::Ige { .. } => "ige",
			Instr::Uge { .. } => "uge",
			Instr::Eq { .. } => "eq",
			Instr::Neq { .. } => "neq",
			Instr::Band { .. } => "band",
			Instr::Bclr { .. } => "bclr",
			Instr::Bor { .. } => "bor",
			Instr::Bxor { .. } => "bxor",
			Instr::And { .. } => "and",
			Instr::Or { .. } => "or",
			Instr::Lshift { .. } => "lshift",
			Instr::Rshift { .. } => "rshift",
			Instr::Bts { .. } => "bts",
			Instr::Btc { .. } => "btc",
			Instr::Slice { .. } => "slice",
			Instr::Mov { .. } => "mov",
			Instr::Phi { .. } => "phi",
			Instr::Ret { .. } => "ret",
			Instr::Circ { .. } => "circ",
			Instr::Builtin { .. } => "builtin",
			Instr::GC { .. } => "gc",
		}
	}

	/// Input operands, in instruction order.
	pub fn operands(&self) -> Vec<&Variable> {
		match self {
			Instr::Iadd { x, y, .. }
			| Instr::Uadd { x, y, .. }
			| Instr::Isub { x, y, .. }
			| Instr::Usub { x, y, .. }
			| Instr::Imul { x, y, .. }
			| Instr::Umul { x, y, .. }
			| Instr::Idiv { x, y, .. }
			| Instr::Udiv { x, y, .. }
			| Instr::Imod { x, y, .. }
			| Instr::Umod { x, y, .. }
			| Instr::Ilt { x, y, .. }
			| Instr::Ult { x, y, .. }
			| Instr::Ile { x, y, .. }
			| Instr::Ule { x, y, .. }
			| Instr::Igt { x, y, .. }
			| Instr::Ugt { x, y, .. }
			| Instr::Ige { x, y, .. }
			| Instr::Uge { x, y, .. }
			| Instr::Eq { x, y, .. }
			| Instr::Neq { x, y, .. }
			| Instr::Band { x, y, .. }
			| Instr::Bclr { x, y, .. }
			| Instr::Bor { x, y, .. }
			| Instr::Bxor { x, y, .. }
			| Instr::And { x, y, .. }
			| Instr::Or { x, y, .. }
			| Instr::Builtin { x, y, .. } => vec![x, y],
			Instr::Lshift { x, count, .. } => vec![x, count],
			Instr::Rshift { x, count, .. } => vec![x, count],
			Instr::Bts { x, index, .. } => vec![x, index],
			Instr::Btc { x, index, .. } => vec![x, index],
			Instr::Slice { x, from, to, .. } => vec![x, from, to],
			Instr::Mov { x, .. } => vec![x],
			Instr::Phi { cond, t, f, .. } => vec![cond, t, f],
			Instr::Ret { values } => values.iter().collect(),
			Instr::Circ { args, .. } => args.iter().collect(),
			Instr::GC { .. } => Vec::new(),
		}
	}

	/// Output operands.
	pub fn results(&self) -> Vec<&Variable> {
		match self {
			Instr::Iadd { out, .. }
			| Instr::Uadd { out, .. }
			| Instr::Isub { out, .. }
			| Instr::Usub { out, .. }
			| Instr::Imul { out, .. }
			| Instr::Umul { out, .. }
			| Instr::Idiv { out, .. }
			| Instr::Udiv { out, .. }
			| Instr::Imod { out, .. }
			| Instr::Umod { out, .. }
			| Instr::Ilt { out, .. }
			| Instr::Ult { out, .. }
			| Instr::Ile { out, .. }
			| Instr::Ule { out, .. }
			| Instr::Igt { out, .. }
			| Instr::Ugt { out, .. }
			| Instr::Ige { out, .. }
			| Instr::Uge { out, .. }
			| Instr::Eq { out, .. }
			| Instr::Neq { out, .. }
			| Instr::Band { out, .. }
			| Instr::Bclr { out, .. }
			| Instr::Bor { out, .. }
			| Instr::Bxor { out, .. }
			| Instr::And { out, .. }
			| Instr::Or { out, .. }
			| Instr::Lshift { out, .. }
			| Instr::Rshift { out, .. }
			| Instr::Bts { out, .. }
			| Instr::Btc { out, .. }
			| Instr::Slice { out, .. }
			| Instr::Mov { out, .. }
			| Instr::Phi { out, .. }
			| Instr::Builtin { out, .. } => vec![out],
			Instr::Circ { rets, .. } => rets.iter().collect(),
			Instr::Ret { .. } | Instr::GC { .. } => Vec::new(),
		}
	}
}

impl fmt::Display for Instr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{:<8}", self.opcode())?;
		match self {
			Instr::GC { keys } => {
				for key in keys {
					write!(f, " {key}")?;
				}
				return Ok(());
			}
			Instr::Circ { circ, .. } => {
				write!(f, " #gates={}", circ.num_gates)?;
			}
			Instr::Builtin { kind, .. } => {
				write!(f, " {kind}")?;
			}
			_ => {}
		}
		for op in self.operands() {
			write!(f, " {op}")?;
		}
		for out in self.results() {
			write!(f, " -> {out}")?;
		}
		Ok(())
	}
}

/// A binding environment: source names resolved to SSA variables. Blocks
/// clone their parent's bindings on creation, which is what gives the
/// source language lexical scope.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
	map: HashMap<String, Variable>,
}

impl Bindings {
	pub fn new() -> Self {
		Bindings::default()
	}

	pub fn get(&self, name: &str) -> Option<&Variable> {
		self.map.get(name)
	}

	pub fn set(&mut self, name: &str, var: Variable) {
		self.map.insert(name.to_string(), var);
	}

	/// Bound names in deterministic order.
	pub fn names(&self) -> Vec<&str> {
		let mut names: Vec<&str> = self.map.keys().map(String::as_str).collect();
		names.sort_unstable();
		names
	}
}

/// A basic block: bindings, an instruction stream and up to two successors
/// (fall-through and branch target).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct BlockId(u32);
entity_impl!(BlockId);

#[derive(Debug)]
pub struct Block {
	pub id: BlockId,
	pub bindings: Bindings,
	pub instrs: Vec<Instr>,
	pub next: Option<BlockId>,
	pub branch: Option<BlockId>,
}

/// A linearized SSA program, ready for circuit generation.
#[derive(Debug)]
pub struct Program {
	pub inputs: Vec<IOArg>,
	pub input_vars: Vec<Variable>,
	pub outputs: Vec<IOArg>,
	pub constants: Vec<Variable>,
	pub steps: Vec<Instr>,
}

impl Program {
	/// Flattens the generator's blocks, in creation order, into the final
	/// instruction stream. Blocks are immutable from here on.
	pub fn build(
		gen: &Generator,
		inputs: Vec<IOArg>,
		input_vars: Vec<Variable>,
		outputs: Vec<IOArg>,
	) -> Program {
		let mut steps = Vec::new();
		for (_, block) in gen.blocks() {
			steps.extend(block.instrs.iter().cloned());
		}
		Program {
			inputs,
			input_vars,
			outputs,
			constants: gen.constants().cloned().collect(),
			steps,
		}
	}

	/// Inserts `GC` hints after the last use of every non-constant, non-input
	/// value. The hints lower to nothing; they mark where a garbler may drop
	/// wire labels.
	pub fn add_gc_hints(&mut self) {
		// Backward walk: the first sighting of a value from the end is its
		// last use.
		let mut live = Set::new();
		for var in &self.input_vars {
			live.add(var.clone());
		}
		let mut dead_after: Vec<Vec<String>> = vec![Vec::new(); self.steps.len()];
		for (idx, step) in self.steps.iter().enumerate().rev() {
			for var in step.operands() {
				if var.is_const || live.contains(var.id) {
					continue;
				}
				live.add(var.clone());
				dead_after[idx].push(var.wire_key());
			}
		}

		let steps = std::mem::take(&mut self.steps);
		for (step, mut keys) in steps.into_iter().zip(dead_after) {
			let is_ret = matches!(step, Instr::Ret { .. });
			self.steps.push(step);
			if is_ret || keys.is_empty() {
				continue;
			}
			keys.sort_unstable();
			self.steps.push(Instr::GC { keys });
		}
	}
}

impl fmt::Display for Program {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(
			f,
			"func({}) ({})",
			self.inputs.iter().format(", "),
			self.outputs.iter().format(", ")
		)?;
		for c in &self.constants {
			writeln!(f, "const {} : {}", c.name, c.ty)?;
		}
		for (idx, step) in self.steps.iter().enumerate() {
			writeln!(f, "{idx:>4}: {step}")?;
		}
		Ok(())
	}
}
