//! Multi-precision, bit-width-aware signed integers.
//!
//! [`Int`] is the value representation of integer constants during folding.
//! Bitwise operations run on the host big-integer backing and then correct
//! the sign so the in-memory value always matches the two's-complement
//! interpretation at the tracked width.
//!
//! Arithmetic is defined by the circuits: for widths above 64 bits the
//! corresponding adder/subtractor/multiplier/divider circuit is built and
//! evaluated on the operands. Widths up to 64 bits take a native-integer
//! fast path that models the same gate structure; both layers produce
//! identical bit patterns, which keeps constant folding bit-identical to
//! garbled evaluation.

use std::{cmp::Ordering, fmt};

use mpcl_circuit::{Circuit, IOArg, TypeKind};
use num_bigint::{BigInt, Sign};
use num_traits::{One, Zero};

use crate::{
	circuits::{self, Builder, Wire},
	params::Params,
};

#[derive(Clone, Debug)]
pub struct Int {
	bits: u32,
	value: BigInt,
}

impl Int {
	/// A 64-bit integer, the width of untyped arithmetic intermediates.
	pub fn new(x: i64) -> Self {
		Int {
			bits: 64,
			value: BigInt::from(x),
		}
	}

	/// An integer at its minimal two's-complement width.
	pub fn from_i64(x: i64) -> Self {
		let mut z = Int {
			bits: 0,
			value: BigInt::from(x),
		};
		z.bits = min_width(&z.value);
		z
	}

	/// Reinterprets a raw value at the given width.
	pub fn with_bits(bits: u32, value: BigInt) -> Self {
		let mut z = Int { bits, value };
		z.set_sign();
		z
	}

	pub fn set_big(x: &BigInt) -> Self {
		let mut bits = x.bits() as u32;
		if bits > 0 && x.sign() == Sign::Plus && x.bit(u64::from(bits) - 1) {
			bits += 1;
		}
		Int {
			bits,
			value: x.clone(),
		}
	}

	pub fn from_str_radix(s: &str, radix: u32) -> Option<Self> {
		let value = BigInt::parse_bytes(s.as_bytes(), radix)?;
		Some(Int::set_big(&value))
	}

	/// The tracked type width in bits.
	pub fn type_size(&self) -> u32 {
		self.bits
	}

	pub fn set_type_size(&mut self, bits: u32) {
		self.bits = bits;
		self.set_sign();
	}

	/// Smallest two's-complement width that represents the value.
	pub fn min_width(&self) -> u32 {
		min_width(&self.value)
	}

	/// Bit of the two's-complement representation.
	pub fn bit(&self, i: u64) -> bool {
		self.value.bit(i)
	}

	pub fn bit_len(&self) -> u64 {
		self.value.bits()
	}

	pub fn sign(&self) -> i32 {
		match self.value.sign() {
			Sign::Minus => -1,
			Sign::NoSign => 0,
			Sign::Plus => 1,
		}
	}

	pub fn cmp_value(&self, other: &Int) -> Ordering {
		self.value.cmp(&other.value)
	}

	pub fn to_i64(&self) -> i64 {
		i64::try_from(&self.value).unwrap_or_default()
	}

	pub fn value(&self) -> &BigInt {
		&self.value
	}

	// Host-side bitwise operations.

	pub fn and(&self, y: &Int) -> Int {
		Int::with_bits(self.bits.max(y.bits), &self.value & &y.value)
	}

	pub fn or(&self, y: &Int) -> Int {
		Int::with_bits(self.bits.max(y.bits), &self.value | &y.value)
	}

	pub fn xor(&self, y: &Int) -> Int {
		Int::with_bits(self.bits.max(y.bits), &self.value ^ &y.value)
	}

	/// x << n, truncated to the operand width.
	pub fn lsh(&self, n: u64) -> Int {
		let shifted = &self.value << n;
		Int::with_bits(self.bits, wrap(&shifted, self.bits))
	}

	/// x >> n (arithmetic for negative values).
	pub fn rsh(&self, n: u64) -> Int {
		Int::with_bits(self.bits, &self.value >> n)
	}

	// Circuit-defined arithmetic.

	pub fn add(&self, y: &Int) -> Int {
		self.binary(y, BinFamily::Add)
	}

	pub fn sub(&self, y: &Int) -> Int {
		self.binary(y, BinFamily::Sub)
	}

	pub fn mul(&self, y: &Int) -> Int {
		self.binary(y, BinFamily::Mul)
	}

	pub fn div(&self, y: &Int) -> Int {
		self.divide(y).0
	}

	pub fn rem(&self, y: &Int) -> Int {
		self.divide(y).1
	}

	pub fn neg(&self) -> Int {
		Int::new(0).sub(self)
	}

	fn binary(&self, y: &Int, family: BinFamily) -> Int {
		let w = self.bits.max(y.bits);
		if w == 0 {
			return Int::with_bits(0, BigInt::zero());
		}
		if w <= 64 {
			let xv = interp(&self.value, w);
			let yv = interp(&y.value, w);
			let raw = match family {
				BinFamily::Add => xv.wrapping_add(yv),
				BinFamily::Sub => xv.wrapping_sub(yv),
				BinFamily::Mul => xv.wrapping_mul(yv),
			};
			return Int::with_bits(w, wrap(&BigInt::from(raw), w));
		}

		let circ = build_binary(self.bits, y.bits, w, family);
		let out = circ
			.eval(&[self.value.clone(), y.value.clone()])
			.expect("constant arithmetic circuit evaluation");
		let pattern = out.into_iter().next().expect("arithmetic circuit output");
		Int::with_bits(w, pattern)
	}

	/// Quotient and remainder, both at the unified width. Division by zero
	/// follows the divider circuit: all-ones quotient, dividend remainder.
	fn divide(&self, y: &Int) -> (Int, Int) {
		let w = self.bits.max(y.bits);
		if w == 0 {
			return (Int::with_bits(0, BigInt::zero()), Int::with_bits(0, BigInt::zero()));
		}
		if w <= 64 {
			// Model of the signed divider: conditional negation, unsigned
			// restoring division, sign correction.
			let xv = interp(&self.value, w);
			let yv = interp(&y.value, w);
			let mask = (1u128 << w) - 1;
			let ax = xv.unsigned_abs() & mask;
			let ay = yv.unsigned_abs() & mask;
			let (uq, ur) = if ay == 0 { (mask, ax) } else { (ax / ay, ax % ay) };
			let qsign = (xv < 0) ^ (yv < 0);
			let q_raw = if qsign { uq.wrapping_neg() & mask } else { uq };
			let r_raw = if xv < 0 { ur.wrapping_neg() & mask } else { ur };
			return (
				Int::with_bits(w, BigInt::from(q_raw)),
				Int::with_bits(w, BigInt::from(r_raw)),
			);
		}

		let circ = build_divider(self.bits, y.bits, w);
		let out = circ
			.eval(&[self.value.clone(), y.value.clone()])
			.expect("constant division circuit evaluation");
		let mut out = out.into_iter();
		let q = Int::with_bits(w, out.next().expect("quotient output"));
		let r = Int::with_bits(w, out.next().expect("remainder output"));
		(q, r)
	}

	/// Corrects the backing value so it equals the two's-complement reading
	/// of its low `bits`: when the sign bit at `bits - 1` disagrees with the
	/// host value's sign, the value is renormalized through the raw pattern.
	fn set_sign(&mut self) {
		if self.bits == 0 {
			return;
		}
		let raw = wrap(&self.value, self.bits);
		self.value = if raw.bit(u64::from(self.bits) - 1) {
			raw - (BigInt::one() << self.bits)
		} else {
			raw
		};
	}
}

impl PartialEq for Int {
	fn eq(&self, other: &Self) -> bool {
		self.value == other.value
	}
}

impl Eq for Int {}

impl fmt::Display for Int {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.value.fmt(f)
	}
}

#[derive(Clone, Copy)]
enum BinFamily {
	Add,
	Sub,
	Mul,
}

/// Low `bits` of the two's-complement pattern, as a non-negative value.
fn wrap(value: &BigInt, bits: u32) -> BigInt {
	let mask = (BigInt::one() << bits) - 1;
	value & &mask
}

/// Signed interpretation of the low `w` bits. Only valid for w <= 64.
fn interp(value: &BigInt, w: u32) -> i128 {
	let raw = wrap(value, w);
	let raw = i128::try_from(&raw).expect("width <= 64");
	if w > 0 && (raw >> (w - 1)) & 1 == 1 {
		raw - (1i128 << w)
	} else {
		raw
	}
}

/// Smallest two's-complement width representing the value: zero is empty,
/// positives need their magnitude plus a sign bit, negatives round to the
/// next power-of-two boundary below.
fn min_width(value: &BigInt) -> u32 {
	match value.sign() {
		Sign::NoSign => 0,
		Sign::Plus => value.bits() as u32 + 1,
		Sign::Minus => {
			let mag = value.magnitude() - 1u8;
			mag.bits() as u32 + 1
		}
	}
}

fn io_pair(x_bits: u32, y_bits: u32) -> Vec<IOArg> {
	vec![
		IOArg::new("x", TypeKind::Int, x_bits),
		IOArg::new("y", TypeKind::Int, y_bits),
	]
}

fn input_groups(b: &Builder, x_bits: u32, y_bits: u32) -> (Vec<Wire>, Vec<Wire>) {
	let x = b.input_wires[..x_bits as usize].to_vec();
	let y = b.input_wires[x_bits as usize..(x_bits + y_bits) as usize].to_vec();
	(x, y)
}

fn build_binary(x_bits: u32, y_bits: u32, w: u32, family: BinFamily) -> Circuit {
	let params = Params::default();
	let outputs = vec![IOArg::new("z", TypeKind::Int, w)];
	let mut b = Builder::new(&params, io_pair(x_bits, y_bits), outputs)
		.expect("constant arithmetic builder");
	let (x, y) = input_groups(&b, x_bits, y_bits);
	let z = b.alloc_output_wires().expect("output wires").remove(0);
	match family {
		BinFamily::Add => circuits::new_adder(&mut b, &x, &y, &z, true),
		BinFamily::Sub => circuits::new_subtractor(&mut b, &x, &y, &z, true),
		BinFamily::Mul => circuits::new_multiplier(&mut b, 0, &x, &y, &z, true),
	}
	.expect("constant arithmetic gates");
	b.compile().expect("constant arithmetic circuit")
}

fn build_divider(x_bits: u32, y_bits: u32, w: u32) -> Circuit {
	let params = Params::default();
	let outputs = vec![
		IOArg::new("q", TypeKind::Int, w),
		IOArg::new("r", TypeKind::Int, w),
	];
	let mut b = Builder::new(&params, io_pair(x_bits, y_bits), outputs)
		.expect("constant division builder");
	let (x, y) = input_groups(&b, x_bits, y_bits);
	let mut outs = b.alloc_output_wires().expect("output wires");
	let r = outs.pop().expect("remainder wires");
	let q = outs.pop().expect("quotient wires");
	circuits::new_divider(&mut b, &x, &y, Some(&q), Some(&r), true).expect("divider gates");
	b.compile().expect("constant division circuit")
}
