//! Circuit parsing for both on-disk formats.
//!
//! The format is sniffed from the leading bytes: the `MPCL` magic selects the
//! native binary format, anything else is treated as Bristol text.

use std::io::Read;

use bytes::Buf;

use crate::{
	circuit::{Circuit, IOArg},
	error::CircuitError,
	gate::{Gate, Op, WireId},
	marshal::{MAGIC, VERSION},
	types::TypeKind,
};

impl Circuit {
	/// Reads and parses a circuit in either supported format.
	pub fn parse<R: Read>(mut r: R) -> Result<Circuit, CircuitError> {
		let mut data = Vec::new();
		r.read_to_end(&mut data)?;
		if data.starts_with(&MAGIC) {
			parse_mpclc(&data[MAGIC.len()..])
		} else {
			parse_bristol(&data)
		}
	}
}

fn need(buf: &impl Buf, n: usize, what: &str) -> Result<(), CircuitError> {
	if buf.remaining() < n {
		return Err(CircuitError::malformed(format!("unexpected EOF reading {what}")));
	}
	Ok(())
}

fn parse_mpclc(mut buf: &[u8]) -> Result<Circuit, CircuitError> {
	need(&buf, 2, "version")?;
	let version = buf.get_u16();
	if version != VERSION {
		return Err(CircuitError::malformed(format!(
			"unsupported circuit version {version}"
		)));
	}
	need(&buf, 8, "gate and wire counts")?;
	let num_gates = buf.get_u32();
	let num_wires = buf.get_u32();

	let inputs = parse_io(&mut buf)?;
	let outputs = parse_io(&mut buf)?;

	let mut gates = Vec::with_capacity(num_gates as usize);
	let mut prev_in0 = 0i64;
	let mut prev_in1 = 0i64;
	let mut prev_out = 0i64;
	for _ in 0..num_gates {
		need(&buf, 1, "gate op")?;
		let op = Op::from_u8(buf.get_u8())?;
		let input0 = apply_delta(prev_in0, get_varint(&mut buf)?, num_wires)?;
		prev_in0 = input0 as i64;
		let input1 = if op.is_unary() {
			None
		} else {
			let w = apply_delta(prev_in1, get_varint(&mut buf)?, num_wires)?;
			prev_in1 = w as i64;
			Some(w)
		};
		let output = apply_delta(prev_out, get_varint(&mut buf)?, num_wires)?;
		prev_out = output as i64;
		gates.push(Gate {
			op,
			input0,
			input1,
			output,
		});
	}

	Ok(Circuit {
		num_gates,
		num_wires,
		inputs,
		outputs,
		gates,
	})
}

fn parse_io(buf: &mut &[u8]) -> Result<Vec<IOArg>, CircuitError> {
	need(buf, 2, "IO count")?;
	let count = buf.get_u16();
	let mut args = Vec::with_capacity(count as usize);
	for _ in 0..count {
		need(buf, 2, "IO name length")?;
		let name_len = buf.get_u16() as usize;
		need(buf, name_len, "IO name")?;
		let name = String::from_utf8(buf.copy_to_bytes(name_len).to_vec())
			.map_err(|_| CircuitError::malformed("IO name is not valid UTF-8"))?;
		need(buf, 5, "IO kind and width")?;
		let kind = TypeKind::from_u8(buf.get_u8())?;
		let bits = buf.get_u32();
		args.push(IOArg { name, kind, bits });
	}
	Ok(args)
}

fn apply_delta(prev: i64, delta: i64, num_wires: u32) -> Result<WireId, CircuitError> {
	let wire = prev + delta;
	if wire < 0 || wire >= num_wires as i64 {
		return Err(CircuitError::malformed(format!(
			"wire {wire} out of range (circuit has {num_wires} wires)"
		)));
	}
	Ok(wire as WireId)
}

pub(crate) fn get_uvarint(buf: &mut impl Buf) -> Result<u64, CircuitError> {
	let mut value = 0u64;
	let mut shift = 0u32;
	loop {
		need(buf, 1, "varint")?;
		let byte = buf.get_u8();
		if shift >= 63 && byte > 1 {
			return Err(CircuitError::malformed("varint overflows 64 bits"));
		}
		value |= u64::from(byte & 0x7f) << shift;
		if byte & 0x80 == 0 {
			return Ok(value);
		}
		shift += 7;
	}
}

pub(crate) fn get_varint(buf: &mut impl Buf) -> Result<i64, CircuitError> {
	let v = get_uvarint(buf)?;
	Ok(((v >> 1) as i64) ^ -((v & 1) as i64))
}

fn parse_bristol(data: &[u8]) -> Result<Circuit, CircuitError> {
	let text = std::str::from_utf8(data)
		.map_err(|_| CircuitError::malformed("circuit is neither mpclc nor UTF-8 text"))?;
	let mut lines = text.lines().filter(|l| !l.trim().is_empty());

	let header = fields(lines.next(), "gate and wire counts")?;
	if header.len() != 2 {
		return Err(CircuitError::malformed("invalid first line"));
	}
	let num_gates: u32 = int_field(header[0])?;
	let num_wires: u32 = int_field(header[1])?;

	let inputs = parse_bristol_io(lines.next(), "input widths", "i")?;
	let outputs = parse_bristol_io(lines.next(), "output widths", "o")?;

	let mut gates = Vec::with_capacity(num_gates as usize);
	for line in lines {
		let parts: Vec<&str> = line.split_whitespace().collect();
		if parts.len() < 4 {
			return Err(CircuitError::malformed(format!("invalid gate: {line}")));
		}
		let num_in: usize = int_field(parts[0])? as usize;
		let num_out: usize = int_field(parts[1])? as usize;
		if num_out != 1 || parts.len() != 2 + num_in + num_out + 1 {
			return Err(CircuitError::malformed(format!("invalid gate: {line}")));
		}
		let op = match *parts.last().unwrap() {
			"XOR" => Op::Xor,
			"AND" => Op::And,
			"INV" => Op::Inv,
			other => {
				return Err(CircuitError::malformed(format!("invalid operation '{other}'")));
			}
		};
		let wire = |s: &str| -> Result<WireId, CircuitError> {
			let w: u32 = int_field(s)?;
			if w >= num_wires {
				return Err(CircuitError::malformed(format!("wire {w} out of range")));
			}
			Ok(w)
		};
		let gate = match (op, num_in) {
			(Op::Inv, 1) => Gate::inv(wire(parts[2])?, wire(parts[3])?),
			(Op::Xor | Op::And, 2) => {
				Gate::binary(op, wire(parts[2])?, wire(parts[3])?, wire(parts[4])?)
			}
			_ => {
				return Err(CircuitError::malformed(format!(
					"{op} gate with {num_in} inputs"
				)));
			}
		};
		gates.push(gate);
	}

	if gates.len() != num_gates as usize {
		return Err(CircuitError::malformed(format!(
			"declared {num_gates} gates, found {}",
			gates.len()
		)));
	}

	Ok(Circuit {
		num_gates,
		num_wires,
		inputs,
		outputs,
		gates,
	})
}

fn parse_bristol_io(
	line: Option<&str>,
	what: &str,
	prefix: &str,
) -> Result<Vec<IOArg>, CircuitError> {
	let parts = fields(line, what)?;
	let count: usize = int_field(parts[0])? as usize;
	if parts.len() != count + 1 {
		return Err(CircuitError::malformed(format!("invalid {what} line")));
	}
	let mut args = Vec::with_capacity(count);
	for (idx, part) in parts[1..].iter().enumerate() {
		args.push(IOArg::new(format!("{prefix}{idx}"), TypeKind::Uint, int_field(part)?));
	}
	Ok(args)
}

fn fields<'a>(line: Option<&'a str>, what: &str) -> Result<Vec<&'a str>, CircuitError> {
	let line = line.ok_or_else(|| CircuitError::malformed(format!("unexpected EOF reading {what}")))?;
	let parts: Vec<&str> = line.split_whitespace().collect();
	if parts.is_empty() {
		return Err(CircuitError::malformed(format!("empty {what} line")));
	}
	Ok(parts)
}

fn int_field(s: &str) -> Result<u32, CircuitError> {
	s.parse::<u32>()
		.map_err(|_| CircuitError::malformed(format!("invalid integer '{s}'")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bristol_xor_byte() {
		let text = "8 24\n2 8 8\n1 8\n\
			2 1 0 8 16 XOR\n2 1 1 9 17 XOR\n2 1 2 10 18 XOR\n2 1 3 11 19 XOR\n\
			2 1 4 12 20 XOR\n2 1 5 13 21 XOR\n2 1 6 14 22 XOR\n2 1 7 15 23 XOR\n";
		let circ = Circuit::parse(text.as_bytes()).unwrap();
		assert_eq!(circ.num_gates, 8);
		assert_eq!(circ.input_bits(), 16);
		assert_eq!(circ.output_bits(), 8);
		let out = circ
			.eval(&[num_bigint::BigInt::from(0x55), num_bigint::BigInt::from(0xaa)])
			.unwrap();
		assert_eq!(out, vec![num_bigint::BigInt::from(0xff)]);
	}

	#[test]
	fn bristol_bad_op_rejected() {
		let text = "1 3\n1 2\n1 1\n2 1 0 1 2 NAND\n";
		assert!(Circuit::parse(text.as_bytes()).is_err());
	}

	#[test]
	fn bristol_gate_count_mismatch_rejected() {
		let text = "2 3\n1 2\n1 1\n2 1 0 1 2 XOR\n";
		assert!(Circuit::parse(text.as_bytes()).is_err());
	}

	#[test]
	fn bad_magic_falls_back_to_bristol() {
		let data = b"MPCJunk";
		assert!(Circuit::parse(&data[..]).is_err());
	}
}
