//! Comparator gate families. Each writes a 1-bit result into `z[0]` and
//! zero-fills any remaining output wires.

use mpcl_circuit::Op;

use super::{Builder, Wire, logic::or_reduce};
use crate::error::Result;

/// Borrow chain of x - y over equal-width groups; optionally also produces
/// the difference bits. Returns `(diff, borrow_out)`.
pub(crate) fn borrow_subtract(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	want_diff: bool,
) -> Result<(Option<Vec<Wire>>, Wire)> {
	debug_assert_eq!(x.len(), y.len());
	let mut borrow = b.zero_wire()?;
	let mut diff = want_diff.then(|| Vec::with_capacity(x.len()));
	for i in 0..x.len() {
		let xy = b.gate(Op::Xor, x[i], y[i]);
		if let Some(diff) = diff.as_mut() {
			diff.push(b.gate(Op::Xor, xy, borrow));
		}
		// borrow' = (~x & y) | (borrow & ~(x ^ y))
		let nx = b.inv_new(x[i]);
		let t0 = b.gate(Op::And, nx, y[i]);
		let eq = b.gate(Op::Xnor, x[i], y[i]);
		let t1 = b.gate(Op::And, borrow, eq);
		borrow = b.gate(Op::Or, t0, t1);
	}
	Ok((diff, borrow))
}

fn extend_pair(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	signed: bool,
) -> Result<(Vec<Wire>, Vec<Wire>)> {
	let w = x.len().max(y.len());
	Ok((b.extend(x, w, signed)?, b.extend(y, w, signed)?))
}

/// x < y as a single wire: the borrow of x - y, with both operand sign
/// wires XORed in for signed comparison.
fn lt_wire(b: &mut Builder, x: &[Wire], y: &[Wire], signed: bool) -> Result<Wire> {
	let (x, y) = extend_pair(b, x, y, signed)?;
	let (_, borrow) = borrow_subtract(b, &x, &y, false)?;
	if !signed {
		return Ok(borrow);
	}
	let w = x.len();
	let t = b.gate(Op::Xor, borrow, x[w - 1]);
	Ok(b.gate(Op::Xor, t, y[w - 1]))
}

fn fill_result(b: &mut Builder, result: Wire, z: &[Wire]) -> Result<()> {
	b.id(result, z[0])?;
	let zero = b.zero_wire()?;
	for &w in &z[1..] {
		b.id(zero, w)?;
	}
	Ok(())
}

pub fn new_lt_comparator(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let lt = lt_wire(b, x, y, signed)?;
	fill_result(b, lt, z)
}

pub fn new_le_comparator(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	// x <= y is !(y < x).
	let gt = lt_wire(b, y, x, signed)?;
	let le = b.inv_new(gt);
	fill_result(b, le, z)
}

pub fn new_gt_comparator(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let gt = lt_wire(b, y, x, signed)?;
	fill_result(b, gt, z)
}

pub fn new_ge_comparator(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let lt = lt_wire(b, x, y, signed)?;
	let ge = b.inv_new(lt);
	fill_result(b, ge, z)
}

/// Pairwise XOR, OR-reduce, INV.
pub fn new_eq_comparator(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let (x, y) = extend_pair(b, x, y, signed)?;
	let diffs: Vec<Wire> = x.iter().zip(&y).map(|(&a, &c)| b.gate(Op::Xor, a, c)).collect();
	let any = or_reduce(b, &diffs)?;
	let eq = b.inv_new(any);
	fill_result(b, eq, z)
}

pub fn new_neq_comparator(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let (x, y) = extend_pair(b, x, y, signed)?;
	let diffs: Vec<Wire> = x.iter().zip(&y).map(|(&a, &c)| b.gate(Op::Xor, a, c)).collect();
	let neq = or_reduce(b, &diffs)?;
	fill_result(b, neq, z)
}

#[cfg(test)]
mod tests {
	use mpcl_circuit::{Circuit, IOArg, TypeKind};
	use num_bigint::BigInt;

	use super::*;
	use crate::params::Params;

	fn compile_cmp(
		bits: u32,
		signed: bool,
		f: impl Fn(&mut Builder, &[Wire], &[Wire], &[Wire], bool) -> Result<()>,
	) -> Circuit {
		let kind = if signed { TypeKind::Int } else { TypeKind::Uint };
		let params = Params::default();
		let mut b = Builder::new(
			&params,
			vec![IOArg::new("x", kind, bits), IOArg::new("y", kind, bits)],
			vec![IOArg::new("z", TypeKind::Bool, 1)],
		)
		.unwrap();
		let x: Vec<Wire> = b.input_wires[..bits as usize].to_vec();
		let y: Vec<Wire> = b.input_wires[bits as usize..].to_vec();
		let z = b.alloc_output_wires().unwrap().remove(0);
		f(&mut b, &x, &y, &z, signed).unwrap();
		b.compile().unwrap()
	}

	fn check(circ: &Circuit, x: i64, y: i64, want: bool) {
		let out = circ.eval(&[BigInt::from(x), BigInt::from(y)]).unwrap();
		assert_eq!(out[0], BigInt::from(want as u8), "x={x} y={y}");
	}

	#[test]
	fn unsigned_orderings() {
		let lt = compile_cmp(8, false, new_lt_comparator);
		let le = compile_cmp(8, false, new_le_comparator);
		let gt = compile_cmp(8, false, new_gt_comparator);
		let ge = compile_cmp(8, false, new_ge_comparator);
		for (x, y) in [(0, 0), (1, 2), (2, 1), (255, 0), (0, 255), (200, 200)] {
			check(&lt, x, y, x < y);
			check(&le, x, y, x <= y);
			check(&gt, x, y, x > y);
			check(&ge, x, y, x >= y);
		}
	}

	#[test]
	fn signed_orderings() {
		let lt = compile_cmp(8, true, new_lt_comparator);
		let ge = compile_cmp(8, true, new_ge_comparator);
		for (x, y) in [(-1, 1), (1, -1), (-3, -1), (-128, 127), (127, -128), (-5, -5)] {
			check(&lt, x, y, x < y);
			check(&ge, x, y, x >= y);
		}
	}

	#[test]
	fn equality() {
		let eq = compile_cmp(8, false, new_eq_comparator);
		let neq = compile_cmp(8, false, new_neq_comparator);
		for (x, y) in [(0, 0), (1, 0), (170, 170), (255, 254)] {
			check(&eq, x, y, x == y);
			check(&neq, x, y, x != y);
		}
	}
}
