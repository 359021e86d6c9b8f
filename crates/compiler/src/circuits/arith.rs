//! Adder, subtractor and multiplier gate families.
//!
//! All families extend their operands to the output width first: zero-pad
//! for unsigned values, sign-replicate for signed ones. Results are modular
//! in the output width.

use mpcl_circuit::Op;

use super::{Builder, Wire};
use crate::error::Result;

/// Full adder producing fresh sum and carry wires.
pub(crate) fn full_adder(b: &mut Builder, x: Wire, y: Wire, cin: Wire) -> (Wire, Wire) {
	let xy = b.gate(Op::Xor, x, y);
	let sum = b.gate(Op::Xor, xy, cin);
	let a0 = b.gate(Op::And, x, y);
	let a1 = b.gate(Op::And, cin, xy);
	let carry = b.gate(Op::Or, a0, a1);
	(sum, carry)
}

/// Half adder: sum and carry of two bits.
pub(crate) fn half_adder(b: &mut Builder, x: Wire, y: Wire) -> (Wire, Wire) {
	let sum = b.gate(Op::Xor, x, y);
	let carry = b.gate(Op::And, x, y);
	(sum, carry)
}

/// Ripple-carry addition of two equal-width groups into `z`, with an
/// explicit carry-in wire. The carry out of the last bit is not computed.
pub(crate) fn add_with_carry(b: &mut Builder, x: &[Wire], y: &[Wire], carry_in: Wire, z: &[Wire]) {
	debug_assert_eq!(x.len(), z.len());
	debug_assert_eq!(y.len(), z.len());
	let mut carry = carry_in;
	for i in 0..z.len() {
		let xy = b.gate(Op::Xor, x[i], y[i]);
		b.gate_into(Op::Xor, xy, carry, z[i]);
		if i + 1 < z.len() {
			let a0 = b.gate(Op::And, x[i], y[i]);
			let a1 = b.gate(Op::And, carry, xy);
			carry = b.gate(Op::Or, a0, a1);
		}
	}
}

/// z = x + y (mod 2^|z|). The initial carry is the ZERO wire.
pub fn new_adder(b: &mut Builder, x: &[Wire], y: &[Wire], z: &[Wire], signed: bool) -> Result<()> {
	let x = b.extend(x, z.len(), signed)?;
	let y = b.extend(y, z.len(), signed)?;
	let zero = b.zero_wire()?;
	add_with_carry(b, &x, &y, zero, z);
	Ok(())
}

/// z = x - y, via two's complement: x + ~y + 1.
pub fn new_subtractor(
	b: &mut Builder,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let x = b.extend(x, z.len(), signed)?;
	let y = b.extend(y, z.len(), signed)?;
	let ny: Vec<Wire> = y.iter().map(|&w| b.inv_new(w)).collect();
	let one = b.one_wire()?;
	add_with_carry(b, &x, &ny, one, z);
	Ok(())
}

/// z = x * y (mod 2^|z|), schoolbook partial products.
///
/// With `array_threshold > 0` and a multiplier operand at least that wide,
/// the partial products are reduced with 3:2 column compressors instead of
/// a chain of ripple adders, trading gates for depth.
pub fn new_multiplier(
	b: &mut Builder,
	array_threshold: u32,
	x: &[Wire],
	y: &[Wire],
	z: &[Wire],
	signed: bool,
) -> Result<()> {
	let n = z.len();
	let y_width = y.len();
	let x = b.extend(x, n, signed)?;
	let y = b.extend(y, n, signed)?;
	if array_threshold > 0 && y_width as u32 >= array_threshold {
		array_multiplier(b, &x, &y, z)
	} else {
		linear_multiplier(b, &x, &y, z)
	}
}

fn linear_multiplier(b: &mut Builder, x: &[Wire], y: &[Wire], z: &[Wire]) -> Result<()> {
	let n = z.len();
	// acc holds the running sum, left-aligned at bit i of the current row.
	let mut acc: Vec<Wire> = (0..n).map(|j| b.gate(Op::And, x[j], y[0])).collect();
	for i in 1..n {
		let width = n - i;
		let row: Vec<Wire> = (0..width).map(|j| b.gate(Op::And, x[j], y[i])).collect();
		let sum = b.alloc_wires(width)?;
		let zero = b.zero_wire()?;
		add_with_carry(b, &acc[i..], &row, zero, &sum);
		acc.truncate(i);
		acc.extend(sum);
	}
	for j in 0..n {
		b.id(acc[j], z[j])?;
	}
	Ok(())
}

fn array_multiplier(b: &mut Builder, x: &[Wire], y: &[Wire], z: &[Wire]) -> Result<()> {
	let n = z.len();
	// Column j collects every partial-product bit of weight 2^j. Weights at
	// and above 2^n are truncated away.
	let mut cols: Vec<Vec<Wire>> = vec![Vec::new(); n];
	for i in 0..n {
		for j in 0..n - i {
			let p = b.gate(Op::And, x[j], y[i]);
			cols[i + j].push(p);
		}
	}

	while cols.iter().any(|c| c.len() > 2) {
		let mut next: Vec<Vec<Wire>> = vec![Vec::new(); n];
		for j in 0..n {
			let col = &cols[j];
			let mut k = 0;
			while col.len() - k >= 3 {
				let (sum, carry) = full_adder(b, col[k], col[k + 1], col[k + 2]);
				next[j].push(sum);
				if j + 1 < n {
					next[j + 1].push(carry);
				}
				k += 3;
			}
			if col.len() - k == 2 {
				let (sum, carry) = half_adder(b, col[k], col[k + 1]);
				next[j].push(sum);
				if j + 1 < n {
					next[j + 1].push(carry);
				}
			} else if col.len() - k == 1 {
				next[j].push(col[k]);
			}
		}
		cols = next;
	}

	// Two rows remain; a final ripple adder folds them into z.
	let zero = b.zero_wire()?;
	let row0: Vec<Wire> = cols.iter().map(|c| c.first().copied().unwrap_or(zero)).collect();
	let row1: Vec<Wire> = cols.iter().map(|c| c.get(1).copied().unwrap_or(zero)).collect();
	add_with_carry(b, &row0, &row1, zero, z);
	Ok(())
}
