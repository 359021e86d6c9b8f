//! Multiplexer, bit tests, logical and bitwise gate families, shifts.

use mpcl_circuit::Op;

use super::{Builder, Wire};
use crate::error::Result;

/// Balanced OR-reduction of a wire group. An empty group reduces to ZERO.
pub(crate) fn or_reduce(b: &mut Builder, wires: &[Wire]) -> Result<Wire> {
	if wires.is_empty() {
		return b.zero_wire();
	}
	let mut layer = wires.to_vec();
	while layer.len() > 1 {
		let mut next = Vec::with_capacity(layer.len().div_ceil(2));
		for pair in layer.chunks(2) {
			match pair {
				[a, c] => next.push(b.gate(Op::Or, *a, *c)),
				[a] => next.push(*a),
				_ => unreachable!(),
			}
		}
		layer = next;
	}
	Ok(layer[0])
}

/// Per-bit select into fresh wires: cond ? t : f.
pub(crate) fn mux_fresh(b: &mut Builder, cond: Wire, t: &[Wire], f: &[Wire]) -> Result<Vec<Wire>> {
	debug_assert_eq!(t.len(), f.len());
	let ncond = b.inv_new(cond);
	let mut out = Vec::with_capacity(t.len());
	for i in 0..t.len() {
		let a0 = b.gate(Op::And, cond, t[i]);
		let a1 = b.gate(Op::And, ncond, f[i]);
		out.push(b.gate(Op::Xor, a0, a1));
	}
	Ok(out)
}

/// z = cond ? t : f. The condition is the low wire of its group; operands
/// zero-extend to the output width.
pub fn new_mux(
	b: &mut Builder,
	cond: &[Wire],
	t: &[Wire],
	f: &[Wire],
	z: &[Wire],
) -> Result<()> {
	let cond = cond[0];
	let t = b.extend(t, z.len(), false)?;
	let f = b.extend(f, z.len(), false)?;
	let ncond = b.inv_new(cond);
	for i in 0..z.len() {
		let a0 = b.gate(Op::And, cond, t[i]);
		let a1 = b.gate(Op::And, ncond, f[i]);
		b.gate_into(Op::Xor, a0, a1, z[i]);
	}
	Ok(())
}

/// z = bit `index` of x, renamed into the result; an out-of-range index is
/// the constant 0.
pub fn new_bit_set_test(b: &mut Builder, x: &[Wire], index: usize, z: &[Wire]) -> Result<()> {
	let bit = match x.get(index) {
		Some(&w) => w,
		None => b.zero_wire()?,
	};
	b.id(bit, z[0])?;
	let zero = b.zero_wire()?;
	for &w in &z[1..] {
		b.id(zero, w)?;
	}
	Ok(())
}

/// Dual of [`new_bit_set_test`]: z = !bit, constant 1 out of range.
pub fn new_bit_clr_test(b: &mut Builder, x: &[Wire], index: usize, z: &[Wire]) -> Result<()> {
	match x.get(index) {
		Some(&w) => b.inv(w, z[0]),
		None => {
			let one = b.one_wire()?;
			b.id(one, z[0])?;
		}
	}
	let zero = b.zero_wire()?;
	for &w in &z[1..] {
		b.id(zero, w)?;
	}
	Ok(())
}

/// 1-bit logical AND over the OR-reductions of the operands.
pub fn new_logical_and(b: &mut Builder, x: &[Wire], y: &[Wire], z: &[Wire]) -> Result<()> {
	let xr = or_reduce(b, x)?;
	let yr = or_reduce(b, y)?;
	let out = b.gate(Op::And, xr, yr);
	b.id(out, z[0])?;
	let zero = b.zero_wire()?;
	for &w in &z[1..] {
		b.id(zero, w)?;
	}
	Ok(())
}

/// 1-bit logical OR over the OR-reductions of the operands.
pub fn new_logical_or(b: &mut Builder, x: &[Wire], y: &[Wire], z: &[Wire]) -> Result<()> {
	let xr = or_reduce(b, x)?;
	let yr = or_reduce(b, y)?;
	let out = b.gate(Op::Or, xr, yr);
	b.id(out, z[0])?;
	let zero = b.zero_wire()?;
	for &w in &z[1..] {
		b.id(zero, w)?;
	}
	Ok(())
}

fn bitwise(
	b: &mut Builder,
	op: Op,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let x = b.extend(x, z.len(), signed)?;
	let y = b.extend(y, z.len(), signed)?;
	for i in 0..z.len() {
		b.gate_into(op, x[i], y[i], z[i]);
	}
	Ok(())
}

pub fn new_binary_and(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	bitwise(b, Op::And, x, y, z, signed)
}

pub fn new_binary_or(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	bitwise(b, Op::Or, x, y, z, signed)
}

pub fn new_binary_xor(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	bitwise(b, Op::Xor, x, y, z, signed)
}

/// z = x & ~y.
pub fn new_binary_clear(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let x = b.extend(x, z.len(), signed)?;
	let y = b.extend(y, z.len(), signed)?;
	for i in 0..z.len() {
		let ny = b.inv_new(y[i]);
		b.gate_into(Op::And, x[i], ny, z[i]);
	}
	Ok(())
}

/// Shift by a compile-time count, realized as rewiring with zero fill.
/// Counts beyond the width clamp to it (the result is all zeroes).
pub fn new_shift(
	b: &mut Builder,
	x: &[Wire],
	count: u64,
	left: bool,
	z: &[Wire],
) -> Result<()> {
	let count = (count as usize).min(z.len());
	let zero = b.zero_wire()?;
	for i in 0..z.len() {
		let src = if left {
			i.checked_sub(count).and_then(|j| x.get(j).copied())
		} else {
			x.get(i + count).copied()
		};
		b.id(src.unwrap_or(zero), z[i])?;
	}
	Ok(())
}
