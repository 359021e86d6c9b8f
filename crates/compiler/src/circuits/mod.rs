//! Wire allocation, gate emission and circuit assembly.
//!
//! The [`Builder`] owns every wire and gate of one circuit under
//! construction. Gate families append gates through it; [`Builder::compile`]
//! orders the gates deterministically, renumbers the wires (inputs first,
//! outputs last) and produces the read-only [`Circuit`].

mod arith;
mod cmp;
mod divider;
mod hamming;
mod logic;

pub use arith::{new_adder, new_multiplier, new_subtractor};
pub use cmp::{
	new_eq_comparator, new_ge_comparator, new_gt_comparator, new_le_comparator,
	new_lt_comparator, new_neq_comparator,
};
pub use divider::new_divider;
pub use hamming::{hamming_bits, new_hamming};
pub use logic::{
	new_binary_and, new_binary_clear, new_binary_or, new_binary_xor, new_bit_clr_test,
	new_bit_set_test, new_logical_and, new_logical_or, new_mux, new_shift,
};

use cranelift_entity::{PrimaryMap, SecondaryMap, entity_impl};
use mpcl_circuit::{Circuit, Gate, IOArg, Op, io_bits};
use tracing::debug;

use crate::{
	error::{CompileError, Point, Result},
	params::Params,
};

/// A wire during circuit construction.
///
/// Builder wires are abstract handles; the numeric ids of the final circuit
/// are assigned by [`Builder::compile`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct Wire(u32);
entity_impl!(Wire);

#[derive(Copy, Clone, Default)]
struct WireData {
	is_input: bool,
	is_output: bool,
}

struct BuilderGate {
	op: Op,
	in0: Wire,
	in1: Option<Wire>,
	out: Wire,
}

pub struct Builder {
	inputs: Vec<IOArg>,
	outputs: Vec<IOArg>,
	pub input_wires: Vec<Wire>,
	output_wires: Vec<Wire>,
	wires: PrimaryMap<Wire, WireData>,
	gates: Vec<BuilderGate>,
	zero: Option<Wire>,
	one: Option<Wire>,
	max_wire_bits: u32,
	pub mult_array_threshold: u32,
}

impl Builder {
	/// Creates a builder for a circuit with the given IO declarations. One
	/// wire per input bit is allocated up front, in declaration order.
	pub fn new(params: &Params, inputs: Vec<IOArg>, outputs: Vec<IOArg>) -> Result<Self> {
		for arg in inputs.iter().chain(outputs.iter()) {
			if arg.bits > params.max_wire_bits {
				return Err(CompileError::typ(
					&Point::unknown(),
					format!("width of {} exceeds maximum of {} bits", arg, params.max_wire_bits),
				));
			}
		}
		let mut wires = PrimaryMap::new();
		let mut input_wires = Vec::with_capacity(io_bits(&inputs) as usize);
		for _ in 0..io_bits(&inputs) {
			input_wires.push(wires.push(WireData {
				is_input: true,
				..WireData::default()
			}));
		}
		Ok(Builder {
			inputs,
			outputs,
			input_wires,
			output_wires: Vec::new(),
			wires,
			gates: Vec::new(),
			zero: None,
			one: None,
			max_wire_bits: params.max_wire_bits,
			mult_array_threshold: params.mult_array_threshold,
		})
	}

	pub fn alloc_wire(&mut self) -> Wire {
		self.wires.push(WireData::default())
	}

	pub fn alloc_wires(&mut self, n: usize) -> Result<Vec<Wire>> {
		if n as u32 > self.max_wire_bits {
			return Err(CompileError::typ(
				&Point::unknown(),
				format!("value of {n} bits exceeds maximum of {} bits", self.max_wire_bits),
			));
		}
		Ok((0..n).map(|_| self.alloc_wire()).collect())
	}

	/// The shared constant-0 wire. Materialized on first use as
	/// `XOR(i0, i0)` over the first input bit.
	pub fn zero_wire(&mut self) -> Result<Wire> {
		if let Some(w) = self.zero {
			return Ok(w);
		}
		let Some(&i0) = self.input_wires.first() else {
			return Err(CompileError::internal("constant wire in a circuit with no inputs"));
		};
		let w = self.gate(Op::Xor, i0, i0);
		self.zero = Some(w);
		Ok(w)
	}

	/// The shared constant-1 wire: `INV(ZERO)`.
	pub fn one_wire(&mut self) -> Result<Wire> {
		if let Some(w) = self.one {
			return Ok(w);
		}
		let zero = self.zero_wire()?;
		let w = self.inv_new(zero);
		self.one = Some(w);
		Ok(w)
	}

	/// Emits a binary gate producing a fresh wire.
	pub fn gate(&mut self, op: Op, in0: Wire, in1: Wire) -> Wire {
		debug_assert!(!op.is_unary());
		let out = self.alloc_wire();
		self.gates.push(BuilderGate {
			op,
			in0,
			in1: Some(in1),
			out,
		});
		out
	}

	/// Emits a binary gate into a preallocated output wire.
	pub fn gate_into(&mut self, op: Op, in0: Wire, in1: Wire, out: Wire) {
		debug_assert!(!op.is_unary());
		debug_assert!(out != in0 && out != in1);
		self.gates.push(BuilderGate {
			op,
			in0,
			in1: Some(in1),
			out,
		});
	}

	pub fn inv(&mut self, a: Wire, out: Wire) {
		debug_assert!(out != a);
		self.gates.push(BuilderGate {
			op: Op::Inv,
			in0: a,
			in1: None,
			out,
		});
	}

	pub fn inv_new(&mut self, a: Wire) -> Wire {
		let out = self.alloc_wire();
		self.inv(a, out);
		out
	}

	/// Identity renaming: `out = XOR(a, ZERO)`.
	pub fn id(&mut self, a: Wire, out: Wire) -> Result<()> {
		let zero = self.zero_wire()?;
		self.gate_into(Op::Xor, a, zero, out);
		Ok(())
	}

	/// Widens (or narrows) a wire group to `bits`: zero-pad unsigned
	/// values, replicate the sign wire for signed ones.
	pub fn extend(&mut self, x: &[Wire], bits: usize, signed: bool) -> Result<Vec<Wire>> {
		if x.len() >= bits {
			return Ok(x[..bits].to_vec());
		}
		let pad = if signed && !x.is_empty() {
			*x.last().unwrap()
		} else {
			self.zero_wire()?
		};
		let mut out = x.to_vec();
		out.resize(bits, pad);
		Ok(out)
	}

	/// Flags a wire as a circuit output and appends it to the output list.
	pub fn set_output(&mut self, w: Wire) {
		self.wires[w].is_output = true;
		self.output_wires.push(w);
	}

	/// Allocates and flags wires for every declared output bit. Used when
	/// gate families write circuit outputs directly (the constant
	/// arithmetic path); the SSA path builds outputs through `Ret` instead.
	pub fn alloc_output_wires(&mut self) -> Result<Vec<Vec<Wire>>> {
		let mut groups = Vec::with_capacity(self.outputs.len());
		for i in 0..self.outputs.len() {
			let group = self.alloc_wires(self.outputs[i].bits as usize)?;
			for &w in &group {
				self.set_output(w);
			}
			groups.push(group);
		}
		Ok(groups)
	}

	pub fn num_gates(&self) -> usize {
		self.gates.len()
	}

	/// Removes every gate whose output is read by no later gate and is not
	/// a circuit output. Returns the number of gates removed.
	pub fn prune(&mut self) -> usize {
		let mut live: SecondaryMap<Wire, bool> = SecondaryMap::new();
		for &w in &self.output_wires {
			live[w] = true;
		}
		let mut keep = vec![false; self.gates.len()];
		for (idx, gate) in self.gates.iter().enumerate().rev() {
			if !live[gate.out] {
				continue;
			}
			keep[idx] = true;
			live[gate.in0] = true;
			if let Some(in1) = gate.in1 {
				live[in1] = true;
			}
		}
		let before = self.gates.len();
		let mut idx = 0;
		self.gates.retain(|_| {
			let k = keep[idx];
			idx += 1;
			k
		});
		let removed = before - self.gates.len();
		debug!(removed, "pruned gates");
		removed
	}

	/// Assembles the final circuit.
	///
	/// Gates are ordered topologically by wire-production dependency with a
	/// deterministic tie-break (output-wire id ascending within a layer);
	/// wires are renumbered with inputs first and outputs last. Two
	/// compilations of the same gate stream yield identical circuits.
	pub fn compile(self) -> Result<Circuit> {
		let n_out = io_bits(&self.outputs) as usize;
		if self.output_wires.len() != n_out {
			return Err(CompileError::internal(format!(
				"{} output wires bound, declared outputs need {n_out}",
				self.output_wires.len()
			)));
		}

		// Emission order is topological, so one forward scan computes the
		// longest-path depth of every wire.
		let mut level: SecondaryMap<Wire, u32> = SecondaryMap::new();
		let mut order: Vec<usize> = (0..self.gates.len()).collect();
		for gate in self.gates.iter() {
			let mut l = level[gate.in0];
			if let Some(in1) = gate.in1 {
				l = l.max(level[in1]);
			}
			level[gate.out] = l + 1;
		}
		order.sort_by_key(|&idx| {
			let gate = &self.gates[idx];
			(level[gate.out], gate.out.as_u32())
		});

		// Renumber: inputs, then intermediates in production order, then the
		// declared outputs at the top of the range.
		const UNMAPPED: u32 = u32::MAX;
		let mut mapping: SecondaryMap<Wire, u32> = SecondaryMap::with_default(UNMAPPED);
		let mut next = 0u32;
		for &w in &self.input_wires {
			mapping[w] = next;
			next += 1;
		}
		let num_wires = self.input_wires.len() + self.gates.len();
		let mut out_id = (num_wires - n_out) as u32;
		for &w in &self.output_wires {
			if mapping[w] != UNMAPPED {
				return Err(CompileError::internal("output wire bound twice"));
			}
			mapping[w] = out_id;
			out_id += 1;
		}
		for &idx in &order {
			let out = self.gates[idx].out;
			if self.wires[out].is_output {
				continue;
			}
			if mapping[out] != UNMAPPED {
				return Err(CompileError::internal("wire produced by two gates"));
			}
			mapping[out] = next;
			next += 1;
		}

		let mut produced = vec![false; num_wires];
		for i in 0..self.input_wires.len() {
			produced[i] = true;
		}
		let mut gates = Vec::with_capacity(order.len());
		for &idx in &order {
			let gate = &self.gates[idx];
			let map = |w: Wire| -> Result<u32> {
				let id = mapping[w];
				if id == UNMAPPED {
					return Err(CompileError::internal("gate reads a wire that is never produced"));
				}
				Ok(id)
			};
			let input0 = map(gate.in0)?;
			let input1 = gate.in1.map(map).transpose()?;
			let output = map(gate.out)?;
			if !produced[input0 as usize] || input1.is_some_and(|w| !produced[w as usize]) {
				return Err(CompileError::internal("gate reads a wire before it is produced"));
			}
			if produced[output as usize] {
				return Err(CompileError::internal("wire produced twice"));
			}
			produced[output as usize] = true;
			gates.push(Gate {
				op: gate.op,
				input0,
				input1,
				output,
			});
		}

		Ok(Circuit {
			num_gates: gates.len() as u32,
			num_wires: num_wires as u32,
			inputs: self.inputs,
			outputs: self.outputs,
			gates,
		})
	}
}

#[cfg(test)]
mod tests {
	use mpcl_circuit::TypeKind;
	use num_bigint::BigInt;

	use super::*;

	fn io(name: &str, bits: u32) -> IOArg {
		IOArg::new(name, TypeKind::Uint, bits)
	}

	fn builder(in_bits: &[u32], out_bits: &[u32]) -> Builder {
		let params = Params::default();
		let inputs = in_bits.iter().enumerate().map(|(i, &b)| io(&format!("i{i}"), b)).collect();
		let outputs =
			out_bits.iter().enumerate().map(|(i, &b)| io(&format!("o{i}"), b)).collect();
		Builder::new(&params, inputs, outputs).unwrap()
	}

	#[test]
	fn id_renaming_copies_value() {
		let mut b = builder(&[1], &[1]);
		let a = b.input_wires[0];
		let out = b.alloc_wire();
		b.id(a, out).unwrap();
		b.set_output(out);
		let circ = b.compile().unwrap();
		for v in 0..2 {
			let out = circ.eval(&[BigInt::from(v)]).unwrap();
			assert_eq!(out, vec![BigInt::from(v)]);
		}
	}

	#[test]
	fn constant_wires_evaluate() {
		let mut b = builder(&[1], &[2]);
		let zero = b.zero_wire().unwrap();
		let one = b.one_wire().unwrap();
		let o0 = b.alloc_wire();
		let o1 = b.alloc_wire();
		b.id(zero, o0).unwrap();
		b.id(one, o1).unwrap();
		b.set_output(o0);
		b.set_output(o1);
		let circ = b.compile().unwrap();
		for v in 0..2 {
			// z = 0b10 regardless of the input.
			let out = circ.eval(&[BigInt::from(v)]).unwrap();
			assert_eq!(out, vec![BigInt::from(2)]);
		}
	}

	#[test]
	fn prune_removes_dead_gates_only() {
		let mut b = builder(&[2], &[1]);
		let i = b.input_wires.clone();
		let dead = b.gate(Op::And, i[0], i[1]);
		let _dead2 = b.gate(Op::Or, dead, i[0]);
		let live = b.gate(Op::Xor, i[0], i[1]);
		let out = b.alloc_wire();
		b.id(live, out).unwrap();
		b.set_output(out);
		assert_eq!(b.prune(), 2);
		let circ = b.compile().unwrap();
		for v in 0..4 {
			let out = circ.eval(&[BigInt::from(v)]).unwrap();
			let want = (v & 1) ^ (v >> 1);
			assert_eq!(out, vec![BigInt::from(want)]);
		}
	}

	#[test]
	fn compile_is_deterministic() {
		let build = || {
			let mut b = builder(&[4], &[1]);
			let i = b.input_wires.clone();
			let x = b.gate(Op::Xor, i[0], i[1]);
			let y = b.gate(Op::And, i[2], i[3]);
			let z = b.gate(Op::Or, x, y);
			let out = b.alloc_wire();
			b.id(z, out).unwrap();
			b.set_output(out);
			b.compile().unwrap()
		};
		assert_eq!(build(), build());
	}

	#[test]
	fn outputs_occupy_top_wire_ids() {
		let mut b = builder(&[2], &[1]);
		let i = b.input_wires.clone();
		let x = b.gate(Op::Xor, i[0], i[1]);
		let out = b.alloc_wire();
		b.id(x, out).unwrap();
		b.set_output(out);
		let circ = b.compile().unwrap();
		assert_eq!(circ.num_wires, 2 + circ.num_gates);
		let out_gate = circ.gates.iter().find(|g| g.output == circ.num_wires - 1);
		assert!(out_gate.is_some(), "output wire must be produced by a gate");
	}
}
