//! Lowering the SSA instruction stream into gates.
//!
//! Each variable owns a little-endian wire group bound under its unique
//! key. Input variables are bound to the circuit's input wires up front and
//! interned constants to ZERO/ONE wires; every instruction then reads its
//! operand groups and emits one gate family.

use std::{collections::HashMap, io::Write as _};

use mpcl_circuit::{Circuit, Op};
use tracing::{debug, info};

use super::{Instr, Program, Variable};
use crate::{
	circuits::{self, Builder, Wire},
	error::{CompileError, Point, Result},
	params::{CircFormat, Params},
};

#[derive(Default)]
struct WireMap {
	map: HashMap<String, Vec<Wire>>,
}

impl WireMap {
	/// The wire group of a variable, allocated at the variable's width on
	/// first reference. Constants must have been bound beforehand.
	fn wires(&mut self, b: &mut Builder, v: &Variable) -> Result<Vec<Wire>> {
		let key = v.wire_key();
		if let Some(wires) = self.map.get(&key) {
			return Ok(wires.clone());
		}
		if v.is_const {
			return Err(CompileError::internal(format!("constant {key} has no wires")));
		}
		let wires = b.alloc_wires(v.ty.bits as usize)?;
		self.map.insert(key, wires.clone());
		Ok(wires)
	}

	fn set(&mut self, v: &Variable, wires: Vec<Wire>) -> Result<()> {
		let key = v.wire_key();
		if self.map.insert(key.clone(), wires).is_some() {
			return Err(CompileError::internal(format!("wires of {key} bound twice")));
		}
		Ok(())
	}
}

impl Program {
	/// Compiles the program into a circuit and serializes it to the
	/// configured sink.
	pub fn compile_circuit(&self, params: &mut Params) -> Result<Circuit> {
		if let Some(out) = params.ssa_out.as_mut() {
			write!(out, "{self}")?;
		}

		let mut b = Builder::new(params, self.inputs.clone(), self.outputs.clone())?;
		let mut wmap = WireMap::default();

		// Bind the function parameters to the circuit input wires.
		let mut offset = 0usize;
		for (arg, var) in self.inputs.iter().zip(&self.input_vars) {
			let group = b.input_wires[offset..offset + arg.bits as usize].to_vec();
			offset += arg.bits as usize;
			wmap.set(var, group)?;
		}

		self.define_constants(&mut b, &mut wmap, params.verbose)?;

		if params.verbose {
			info!("creating circuit");
		}
		self.lower_steps(&mut b, &mut wmap)?;

		if params.verbose {
			info!("compiling circuit");
		}
		if params.opt_prune_gates {
			let pruned = b.prune();
			if params.verbose {
				info!(pruned, "pruned gates");
			}
		}
		let circ = b.compile()?;

		if let Some(out) = params.circ_out.as_mut() {
			if params.verbose {
				info!(format = %params.circ_format, "serializing circuit");
			}
			match params.circ_format {
				CircFormat::Mpclc => circ.marshal(out)?,
				CircFormat::Bristol => circ.marshal_bristol(out)?,
			}
		}

		Ok(circ)
	}

	/// Binds the wire groups of the interned constants, in name order, from
	/// the shared ZERO/ONE wires. Constants cost no gates of their own.
	fn define_constants(
		&self,
		b: &mut Builder,
		wmap: &mut WireMap,
		verbose: bool,
	) -> Result<()> {
		for c in &self.constants {
			let scalar = c.const_value.as_ref().is_some_and(|v| v.is_scalar());
			if !scalar {
				continue;
			}
			let mut wires = Vec::with_capacity(c.ty.min_bits as usize);
			for bit in 0..u64::from(c.ty.min_bits) {
				let w = if c.bit(bit) { b.one_wire()? } else { b.zero_wire()? };
				wires.push(w);
			}
			if verbose {
				debug!(name = %c.name, bits = c.ty.min_bits, "defined constant");
			}
			wmap.set(c, wires)?;
		}
		Ok(())
	}

	fn lower_steps(&self, b: &mut Builder, wmap: &mut WireMap) -> Result<()> {
		use Instr::*;

		let signed = |v: &Variable| v.ty.is_signed();

		for step in &self.steps {
			match step {
				Iadd { x, y, out } | Uadd { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_adder(b, &xw, &yw, &o, matches!(step, Iadd { .. }))?;
				}
				Isub { x, y, out } | Usub { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_subtractor(b, &xw, &yw, &o, matches!(step, Isub { .. }))?;
				}
				Imul { x, y, out } | Umul { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					let threshold = b.mult_array_threshold;
					circuits::new_multiplier(
						b,
						threshold,
						&xw,
						&yw,
						&o,
						matches!(step, Imul { .. }),
					)?;
				}
				Idiv { x, y, out } | Udiv { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_divider(
						b,
						&xw,
						&yw,
						Some(&o),
						None,
						matches!(step, Idiv { .. }),
					)?;
				}
				Imod { x, y, out } | Umod { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_divider(
						b,
						&xw,
						&yw,
						None,
						Some(&o),
						matches!(step, Imod { .. }),
					)?;
				}
				Ilt { x, y, out } | Ult { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_lt_comparator(b, &xw, &yw, &o, matches!(step, Ilt { .. }))?;
				}
				Ile { x, y, out } | Ule { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_le_comparator(b, &xw, &yw, &o, matches!(step, Ile { .. }))?;
				}
				Igt { x, y, out } | Ugt { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_gt_comparator(b, &xw, &yw, &o, matches!(step, Igt { .. }))?;
				}
				Ige { x, y, out } | Uge { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_ge_comparator(b, &xw, &yw, &o, matches!(step, Ige { .. }))?;
				}
				Eq { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_eq_comparator(b, &xw, &yw, &o, signed(x))?;
				}
				Neq { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_neq_comparator(b, &xw, &yw, &o, signed(x))?;
				}
				Band { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_binary_and(b, &xw, &yw, &o, signed(x))?;
				}
				Bclr { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_binary_clear(b, &xw, &yw, &o, signed(x))?;
				}
				Bor { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_binary_or(b, &xw, &yw, &o, signed(x))?;
				}
				Bxor { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_binary_xor(b, &xw, &yw, &o, signed(x))?;
				}
				And { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_logical_and(b, &xw, &yw, &o)?;
				}
				Or { x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					circuits::new_logical_or(b, &xw, &yw, &o)?;
				}
				Lshift { x, count, out } | Rshift { x, count, out } => {
					let n = const_operand(step, count)?;
					let xw = wmap.wires(b, x)?;
					let o = wmap.wires(b, out)?;
					let n = u64::try_from(n).unwrap_or(0);
					circuits::new_shift(b, &xw, n, matches!(step, Lshift { .. }), &o)?;
				}
				Bts { x, index, out } | Btc { x, index, out } => {
					let i = const_operand(step, index)?;
					let i = usize::try_from(i).unwrap_or(usize::MAX);
					let xw = wmap.wires(b, x)?;
					let o = wmap.wires(b, out)?;
					if matches!(step, Bts { .. }) {
						circuits::new_bit_set_test(b, &xw, i, &o)?;
					} else {
						circuits::new_bit_clr_test(b, &xw, i, &o)?;
					}
				}
				Slice { x, from, to, out } => {
					let from = const_operand(step, from)?;
					let to = const_operand(step, to)?;
					if from < 0 || from >= to || to > i64::from(x.ty.bits) {
						return Err(CompileError::bounds(
							&Point::unknown(),
							from,
							to,
							x.ty.bits,
						));
					}
					let xw = wmap.wires(b, x)?;
					let mut o = Vec::with_capacity(out.ty.bits as usize);
					for bit in from..to {
						match xw.get(bit as usize) {
							Some(&w) => o.push(w),
							None => o.push(b.zero_wire()?),
						}
					}
					while o.len() < out.ty.bits as usize {
						o.push(b.zero_wire()?);
					}
					o.truncate(out.ty.bits as usize);
					wmap.set(out, o)?;
				}
				Mov { x, out } => {
					let xw = wmap.wires(b, x)?;
					let o = b.extend(&xw, out.ty.bits as usize, signed(x))?;
					wmap.set(out, o)?;
				}
				Phi { cond, t, f, out } => {
					let cw = wmap.wires(b, cond)?;
					let (tw, fw) = (wmap.wires(b, t)?, wmap.wires(b, f)?);
					let o = wmap.wires(b, out)?;
					circuits::new_mux(b, &cw, &tw, &fw, &o)?;
				}
				Ret { values } => {
					for value in values {
						let wires = wmap.wires(b, value)?;
						for w in wires {
							let out = b.alloc_wire();
							b.id(w, out)?;
							b.set_output(out);
						}
					}
				}
				Circ { args, circ, rets } => {
					self.splice(b, wmap, args, circ, rets)?;
				}
				Builtin { kind, x, y, out } => {
					let (xw, yw) = (wmap.wires(b, x)?, wmap.wires(b, y)?);
					let o = wmap.wires(b, out)?;
					match kind {
						super::BuiltinKind::Hamming => {
							circuits::new_hamming(b, &xw, &yw, &o)?;
						}
					}
				}
				GC { .. } => {}
			}
		}
		Ok(())
	}

	/// Splices a nested circuit: caller wire groups feed the child's
	/// inputs (zero-padded when narrower), fresh wires cover the child's
	/// internals, and every child gate is copied with rebased wire ids.
	fn splice(
		&self,
		b: &mut Builder,
		wmap: &mut WireMap,
		args: &[Variable],
		circ: &Circuit,
		rets: &[Variable],
	) -> Result<()> {
		let mut table: Vec<Wire> = Vec::with_capacity(circ.num_wires as usize);
		for (idx, arg) in args.iter().enumerate() {
			let wires = wmap.wires(b, arg)?;
			let want = circ.inputs[idx].bits as usize;
			let wires = b.extend(&wires, want, false)?;
			table.extend(wires);
		}

		let mut ret_wires = Vec::new();
		for ret in rets {
			ret_wires.extend(wmap.wires(b, ret)?);
		}

		let interm = (circ.num_wires as usize)
			.checked_sub(table.len() + ret_wires.len())
			.ok_or_else(|| {
				CompileError::internal("nested circuit wire count below its IO width")
			})?;
		for _ in 0..interm {
			table.push(b.alloc_wire());
		}
		table.extend(ret_wires);

		for gate in &circ.gates {
			let resolve = |id: u32| -> Result<Wire> {
				table.get(id as usize).copied().ok_or_else(|| {
					CompileError::internal(format!("nested circuit wire {id} out of range"))
				})
			};
			let in0 = resolve(gate.input0)?;
			let out = resolve(gate.output)?;
			match (gate.op, gate.input1) {
				(Op::Inv, _) => b.inv(in0, out),
				(op, Some(input1)) => {
					let in1 = resolve(input1)?;
					b.gate_into(op, in0, in1, out);
				}
				(op, None) => {
					return Err(CompileError::internal(format!(
						"nested circuit {op} gate without second input"
					)));
				}
			}
		}
		Ok(())
	}
}

fn const_operand(step: &Instr, v: &Variable) -> Result<i64> {
	if !v.is_const {
		return Err(CompileError::constant(
			&Point::unknown(),
			format!("{}: only constant operand supported", step.opcode()),
		));
	}
	v.const_index().ok_or_else(|| {
		CompileError::constant(
			&Point::unknown(),
			format!("{}: unsupported operand type", step.opcode()),
		)
	})
}
