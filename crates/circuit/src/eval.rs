//! Plaintext evaluation of a compiled circuit.
//!
//! This is not the runtime execution path (that is the garbling protocol);
//! it is the reference semantics used by the multi-precision constant
//! arithmetic and by tests. Constant-folded arithmetic must be bit-identical
//! to what the garbled evaluation of the same circuit would produce, and
//! both are defined by this walk.

use num_bigint::{BigInt, BigUint};
use num_traits::Zero;

use crate::{circuit::Circuit, error::CircuitError, gate::Op};

impl Circuit {
	/// Evaluates the circuit on one value per declared input.
	///
	/// Inputs are seeded as two's-complement bit patterns of the declared
	/// widths (negative values wrap); outputs are returned as the raw,
	/// non-negative bit patterns of the declared output widths. Sign
	/// reinterpretation is the caller's concern.
	pub fn eval(&self, inputs: &[BigInt]) -> Result<Vec<BigInt>, CircuitError> {
		if inputs.len() != self.inputs.len() {
			return Err(CircuitError::eval(format!(
				"invalid inputs: got {}, need {}",
				inputs.len(),
				self.inputs.len()
			)));
		}

		let mut wires = vec![false; self.num_wires as usize];

		let mut offset = 0usize;
		for (arg, value) in self.inputs.iter().zip(inputs) {
			for bit in 0..arg.bits as u64 {
				wires[offset + bit as usize] = value.bit(bit);
			}
			offset += arg.bits as usize;
		}

		for gate in &self.gates {
			let a = wires[gate.input0 as usize];
			let b = match gate.input1 {
				Some(w) => wires[w as usize],
				None => false,
			};
			wires[gate.output as usize] = gate.op.eval(a, b);
		}

		let mut outputs = Vec::with_capacity(self.outputs.len());
		let mut offset = (self.num_wires - self.output_bits()) as usize;
		for arg in &self.outputs {
			let mut value = BigUint::zero();
			for bit in (0..arg.bits as usize).rev() {
				value <<= 1;
				if wires[offset + bit] {
					value |= BigUint::from(1u8);
				}
			}
			outputs.push(BigInt::from(value));
			offset += arg.bits as usize;
		}

		Ok(outputs)
	}
}

#[cfg(test)]
mod tests {
	use num_bigint::BigInt;

	use crate::{
		circuit::{Circuit, IOArg},
		gate::{Gate, Op},
		types::TypeKind,
	};

	// Half adder over two 1-bit inputs: sum = a^b, carry = a&b.
	fn half_adder() -> Circuit {
		Circuit {
			num_gates: 2,
			num_wires: 4,
			inputs: vec![
				IOArg::new("a", TypeKind::Uint, 1),
				IOArg::new("b", TypeKind::Uint, 1),
			],
			outputs: vec![IOArg::new("z", TypeKind::Uint, 2)],
			gates: vec![Gate::binary(Op::Xor, 0, 1, 2), Gate::binary(Op::And, 0, 1, 3)],
		}
	}

	#[test]
	fn half_adder_truth_table() {
		let circ = half_adder();
		for (a, b, want) in [(0, 0, 0), (0, 1, 1), (1, 0, 1), (1, 1, 2)] {
			let out = circ.eval(&[BigInt::from(a), BigInt::from(b)]).unwrap();
			assert_eq!(out, vec![BigInt::from(want)], "a={a} b={b}");
		}
	}

	#[test]
	fn negative_inputs_wrap() {
		// INV over an 4-bit input: z = !x.
		let circ = Circuit {
			num_gates: 4,
			num_wires: 8,
			inputs: vec![IOArg::new("x", TypeKind::Int, 4)],
			outputs: vec![IOArg::new("z", TypeKind::Int, 4)],
			gates: (0..4).map(|i| Gate::inv(i, i + 4)).collect(),
		};
		// -1 seeds as 0b1111, inverted to 0b0000.
		let out = circ.eval(&[BigInt::from(-1)]).unwrap();
		assert_eq!(out, vec![BigInt::from(0)]);
	}

	#[test]
	fn input_count_checked() {
		assert!(half_adder().eval(&[BigInt::from(1)]).is_err());
	}
}
