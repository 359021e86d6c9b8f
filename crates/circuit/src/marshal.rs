//! Circuit serialization: native binary `mpclc` and Bristol-fashion text.
//!
//! The mpclc gate stream is delta-encoded: each gate record stores its wire
//! ids as zigzag varints relative to the corresponding field of the previous
//! record. Compiled circuits number wires in production order, so deltas stay
//! small and the stream compresses well.

use std::io::Write;

use bytes::{BufMut, BytesMut};

use crate::{circuit::Circuit, error::CircuitError, gate::Op};

pub const MAGIC: [u8; 4] = *b"MPCL";
pub const VERSION: u16 = 1;

impl Circuit {
	/// Writes the circuit in the native binary format.
	pub fn marshal<W: Write>(&self, mut w: W) -> Result<(), CircuitError> {
		let mut buf = BytesMut::new();
		buf.put_slice(&MAGIC);
		buf.put_u16(VERSION);
		buf.put_u32(self.num_gates);
		buf.put_u32(self.num_wires);

		for args in [&self.inputs, &self.outputs] {
			buf.put_u16(args.len() as u16);
			for arg in args.iter() {
				buf.put_u16(arg.name.len() as u16);
				buf.put_slice(arg.name.as_bytes());
				buf.put_u8(arg.kind as u8);
				buf.put_u32(arg.bits);
			}
		}

		let mut prev_in0 = 0i64;
		let mut prev_in1 = 0i64;
		let mut prev_out = 0i64;
		for gate in &self.gates {
			buf.put_u8(gate.op as u8);
			put_varint(&mut buf, gate.input0 as i64 - prev_in0);
			prev_in0 = gate.input0 as i64;
			if let Some(input1) = gate.input1 {
				put_varint(&mut buf, input1 as i64 - prev_in1);
				prev_in1 = input1 as i64;
			}
			put_varint(&mut buf, gate.output as i64 - prev_out);
			prev_out = gate.output as i64;
		}

		w.write_all(&buf)?;
		Ok(())
	}

	/// Writes the circuit in Bristol fashion.
	///
	/// Bristol knows only XOR, AND and INV; a circuit containing XNOR or OR
	/// gates cannot be expressed and is rejected.
	pub fn marshal_bristol<W: Write>(&self, mut w: W) -> Result<(), CircuitError> {
		writeln!(w, "{} {}", self.num_gates, self.num_wires)?;

		let widths: Vec<String> = self.inputs.iter().map(|a| a.bits.to_string()).collect();
		writeln!(w, "{} {}", self.inputs.len(), widths.join(" "))?;
		let widths: Vec<String> = self.outputs.iter().map(|a| a.bits.to_string()).collect();
		writeln!(w, "{} {}", self.outputs.len(), widths.join(" "))?;

		for gate in &self.gates {
			match (gate.op, gate.input1) {
				(Op::Inv, _) => writeln!(w, "1 1 {} {} INV", gate.input0, gate.output)?,
				(Op::Xor | Op::And, Some(input1)) => writeln!(
					w,
					"2 1 {} {} {} {}",
					gate.input0, input1, gate.output, gate.op
				)?,
				(op, _) => {
					return Err(CircuitError::malformed(format!(
						"bristol format cannot express {op} gates"
					)));
				}
			}
		}
		Ok(())
	}
}

/// Unsigned LEB128.
pub(crate) fn put_uvarint(buf: &mut BytesMut, mut v: u64) {
	loop {
		let byte = (v & 0x7f) as u8;
		v >>= 7;
		if v == 0 {
			buf.put_u8(byte);
			return;
		}
		buf.put_u8(byte | 0x80);
	}
}

/// Zigzag-encoded signed LEB128.
pub(crate) fn put_varint(buf: &mut BytesMut, v: i64) {
	put_uvarint(buf, ((v << 1) ^ (v >> 63)) as u64);
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{circuit::IOArg, gate::Gate, parse, types::TypeKind};

	fn sample() -> Circuit {
		Circuit {
			num_gates: 4,
			num_wires: 20,
			inputs: vec![
				IOArg::new("a", TypeKind::Uint, 8),
				IOArg::new("b", TypeKind::Uint, 8),
			],
			outputs: vec![IOArg::new("z", TypeKind::Uint, 2)],
			gates: vec![
				Gate::binary(Op::Xor, 0, 8, 16),
				Gate::binary(Op::And, 1, 9, 17),
				Gate::binary(Op::Xor, 16, 17, 18),
				Gate::binary(Op::And, 16, 17, 19),
			],
		}
	}

	#[test]
	fn mpclc_roundtrip() {
		let circ = sample();
		let mut data = Vec::new();
		circ.marshal(&mut data).unwrap();
		assert_eq!(&data[..4], &MAGIC);
		let parsed = Circuit::parse(&data[..]).unwrap();
		assert_eq!(parsed, circ);
	}

	#[test]
	fn mpclc_roundtrip_with_inv_and_xnor() {
		let mut circ = sample();
		circ.gates.push(Gate::inv(18, 19));
		circ.gates[1] = Gate::binary(Op::Xnor, 1, 9, 17);
		circ.gates[2] = Gate::binary(Op::Or, 16, 17, 18);
		circ.num_gates = circ.gates.len() as u32;
		circ.num_wires = 21;
		circ.gates[4] = Gate::inv(18, 20);
		let mut data = Vec::new();
		circ.marshal(&mut data).unwrap();
		let parsed = Circuit::parse(&data[..]).unwrap();
		assert_eq!(parsed, circ);
	}

	#[test]
	fn bristol_roundtrip() {
		// Bristol carries no names or kinds; use the synthesized ones so the
		// round trip compares equal.
		let mut circ = sample();
		circ.inputs = vec![
			IOArg::new("i0", TypeKind::Uint, 8),
			IOArg::new("i1", TypeKind::Uint, 8),
		];
		circ.outputs = vec![IOArg::new("o0", TypeKind::Uint, 2)];
		let mut text = Vec::new();
		circ.marshal_bristol(&mut text).unwrap();
		let parsed = Circuit::parse(&text[..]).unwrap();
		assert_eq!(parsed, circ);
	}

	#[test]
	fn bristol_rejects_xnor() {
		let mut circ = sample();
		circ.gates[0] = Gate::binary(Op::Xnor, 0, 8, 16);
		let mut out = Vec::new();
		assert!(circ.marshal_bristol(&mut out).is_err());
	}

	#[test]
	fn truncated_binary_is_malformed() {
		let circ = sample();
		let mut data = Vec::new();
		circ.marshal(&mut data).unwrap();
		for cut in [3, 6, 10, data.len() - 1] {
			assert!(
				Circuit::parse(&data[..cut]).is_err(),
				"cut at {cut} should fail"
			);
		}
	}

	#[test]
	fn varint_roundtrip() {
		let mut buf = BytesMut::new();
		let values = [0i64, 1, -1, 63, -64, 64, -65, 1 << 20, -(1 << 20)];
		for &v in &values {
			put_varint(&mut buf, v);
		}
		let mut slice: &[u8] = &buf;
		for &v in &values {
			assert_eq!(parse::get_varint(&mut slice).unwrap(), v);
		}
	}
}
