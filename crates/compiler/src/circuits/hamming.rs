//! Hamming distance: population count of x XOR y.

use mpcl_circuit::Op;

use super::{Builder, Wire, arith::add_with_carry};
use crate::error::Result;

/// Result width of a hamming distance over `bits`-wide operands:
/// ceil(log2(bits + 1)).
pub fn hamming_bits(bits: u32) -> u32 {
	(u64::from(bits) + 1).next_power_of_two().trailing_zeros().max(1)
}

/// z = popcount(x ^ y), zero-extended into z.
pub fn new_hamming(b: &mut Builder, x: &[Wire], y: &[Wire], z: &[Wire]) -> Result<()> {
	let w = x.len().max(y.len());
	let x = b.extend(x, w, false)?;
	let y = b.extend(y, w, false)?;

	// One 1-bit counter per bit position, then pairwise ripple additions
	// until a single count remains.
	let mut counts: Vec<Vec<Wire>> = x
		.iter()
		.zip(&y)
		.map(|(&a, &c)| vec![b.gate(Op::Xor, a, c)])
		.collect();
	if counts.is_empty() {
		counts.push(vec![b.zero_wire()?]);
	}
	while counts.len() > 1 {
		let mut next = Vec::with_capacity(counts.len().div_ceil(2));
		let mut iter = counts.into_iter();
		while let Some(a) = iter.next() {
			match iter.next() {
				Some(c) => {
					let width = a.len().max(c.len()) + 1;
					let a = b.extend(&a, width, false)?;
					let c = b.extend(&c, width, false)?;
					let sum = b.alloc_wires(width)?;
					let zero = b.zero_wire()?;
					add_with_carry(b, &a, &c, zero, &sum);
					next.push(sum);
				}
				None => next.push(a),
			}
		}
		counts = next;
	}

	let count = b.extend(&counts[0], z.len(), false)?;
	for i in 0..z.len() {
		b.id(count[i], z[i])?;
	}
	Ok(())
}
