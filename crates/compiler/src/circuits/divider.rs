//! Division producing quotient and remainder.
//!
//! The unsigned core is bit-serial long division: the remainder register
//! shifts in one dividend bit per step, a trial subtraction of the divisor
//! decides the quotient bit, and a select keeps or restores the remainder.
//! A zero divisor never borrows, so the quotient degrades to all-ones and
//! the remainder accumulates the dividend, which is the defined
//! division-by-zero behavior.
//!
//! Signed division takes absolute values through conditional negation,
//! divides unsigned, and corrects the result signs: the quotient is negative
//! when the operand signs differ, the remainder follows the dividend.

use mpcl_circuit::Op;

use super::{Builder, Wire, cmp::borrow_subtract, logic::mux_fresh};
use crate::error::Result;

/// z/r = x / y. Either output may be omitted; its wires are still built and
/// later pruned.
pub fn new_divider(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	q: Option<&[Wire]>,
	r: Option<&[Wire]>,
	signed: bool,
) -> Result<()> {
	let w = x
		.len()
		.max(y.len())
		.max(q.map_or(0, <[Wire]>::len))
		.max(r.map_or(0, <[Wire]>::len));
	let x = b.extend(x, w, signed)?;
	let y = b.extend(y, w, signed)?;

	let (uq, ur) = if signed {
		let sx = x[w - 1];
		let sy = y[w - 1];
		let ax = cond_negate(b, &x, sx)?;
		let ay = cond_negate(b, &y, sy)?;
		let (uq, ur) = unsigned_divide(b, &ax, &ay)?;
		let qsign = b.gate(Op::Xor, sx, sy);
		(cond_negate(b, &uq, qsign)?, cond_negate(b, &ur, sx)?)
	} else {
		unsigned_divide(b, &x, &y)?
	};

	if let Some(q) = q {
		let uq = b.extend(&uq, q.len(), signed)?;
		for i in 0..q.len() {
			b.id(uq[i], q[i])?;
		}
	}
	if let Some(r) = r {
		let ur = b.extend(&ur, r.len(), signed)?;
		for i in 0..r.len() {
			b.id(ur[i], r[i])?;
		}
	}
	Ok(())
}

/// Restoring long division over equal widths. Returns (quotient, remainder).
fn unsigned_divide(b: &mut Builder, x: &[Wire], y: &[Wire]) -> Result<(Vec<Wire>, Vec<Wire>)> {
	let w = x.len();
	let zero = b.zero_wire()?;
	let mut rem: Vec<Wire> = vec![zero; w];
	let mut quot: Vec<Wire> = vec![zero; w];

	// The trial subtraction runs one bit wider than the remainder so the
	// shifted-in dividend bit cannot overflow.
	let y_ext = b.extend(y, w + 1, false)?;
	for i in (0..w).rev() {
		let mut shifted = Vec::with_capacity(w + 1);
		shifted.push(x[i]);
		shifted.extend_from_slice(&rem);
		let (diff, borrow) = borrow_subtract(b, &shifted, &y_ext, true)?;
		let diff = diff.unwrap();
		quot[i] = b.inv_new(borrow);
		rem = mux_fresh(b, borrow, &shifted[..w], &diff[..w])?;
	}
	Ok((quot, rem))
}

/// Two's-complement negation of `v` when `sign` is set: XOR every bit with
/// the sign, then ripple in the sign as a carry.
fn cond_negate(b: &mut Builder, v: &[Wire], sign: Wire) -> Result<Vec<Wire>> {
	let mut out = Vec::with_capacity(v.len());
	let mut carry = sign;
	for (i, &bit) in v.iter().enumerate() {
		let t = b.gate(Op::Xor, bit, sign);
		out.push(b.gate(Op::Xor, t, carry));
		if i + 1 < v.len() {
			carry = b.gate(Op::And, t, carry);
		}
	}
	Ok(out)
}

#[cfg(test)]
mod tests {
	use mpcl_circuit::{Circuit, IOArg, TypeKind};
	use num_bigint::BigInt;

	use super::*;
	use crate::params::Params;

	fn compile_div(bits: u32, signed: bool) -> Circuit {
		let kind = if signed { TypeKind::Int } else { TypeKind::Uint };
		let params = Params::default();
		let mut b = Builder::new(
			&params,
			vec![IOArg::new("x", kind, bits), IOArg::new("y", kind, bits)],
			vec![IOArg::new("q", kind, bits), IOArg::new("r", kind, bits)],
		)
		.unwrap();
		let x: Vec<Wire> = b.input_wires[..bits as usize].to_vec();
		let y: Vec<Wire> = b.input_wires[bits as usize..].to_vec();
		let mut outs = b.alloc_output_wires().unwrap();
		let r = outs.pop().unwrap();
		let q = outs.pop().unwrap();
		new_divider(&mut b, &x, &y, Some(&q), Some(&r), signed).unwrap();
		b.compile().unwrap()
	}

	fn div(circ: &Circuit, x: i64, y: i64) -> (u64, u64) {
		let out = circ.eval(&[BigInt::from(x), BigInt::from(y)]).unwrap();
		(
			u64::try_from(out[0].clone()).unwrap(),
			u64::try_from(out[1].clone()).unwrap(),
		)
	}

	#[test]
	fn unsigned_quotient_and_remainder() {
		let circ = compile_div(8, false);
		for (x, y) in [(42, 7), (43, 7), (255, 16), (3, 200), (0, 5)] {
			assert_eq!(div(&circ, x, y), ((x / y) as u64, (x % y) as u64), "{x}/{y}");
		}
	}

	#[test]
	fn unsigned_division_by_zero() {
		let circ = compile_div(8, false);
		assert_eq!(div(&circ, 77, 0), (0xff, 77));
	}

	#[test]
	fn signed_truncated_division() {
		let circ = compile_div(8, true);
		// Rust's / and % are truncated division, the defined semantics.
		for (x, y) in [(-7, 2), (7, -2), (-7, -2), (7, 2), (-128, 3), (5, -1)] {
			let want_q = ((x / y) as i8) as u8 as u64;
			let want_r = ((x % y) as i8) as u8 as u64;
			assert_eq!(div(&circ, x, y), (want_q, want_r), "{x}/{y}");
		}
	}

	#[test]
	fn signed_division_by_zero_follows_dividend() {
		let circ = compile_div(8, true);
		// |x| divides by zero into all-ones; sign correction then flips the
		// quotient for a negative dividend and restores x as the remainder.
		assert_eq!(div(&circ, 7, 0), (0xff, 7));
		assert_eq!(div(&circ, -7, 0), (0x01, 0xf9));
	}
}
