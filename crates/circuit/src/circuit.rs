//! The compiled circuit and its typed input/output declarations.

use std::fmt;

use crate::{
	gate::Gate,
	types::{TypeInfo, TypeKind},
};

/// A single named input or output value of a circuit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IOArg {
	pub name: String,
	pub kind: TypeKind,
	pub bits: u32,
}

impl IOArg {
	pub fn new(name: impl Into<String>, kind: TypeKind, bits: u32) -> Self {
		IOArg {
			name: name.into(),
			kind,
			bits,
		}
	}

	pub fn from_type(name: impl Into<String>, ty: &TypeInfo) -> Self {
		IOArg::new(name, ty.kind, ty.bits)
	}
}

impl fmt::Display for IOArg {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}{}", self.name, self.kind, self.bits)
	}
}

/// Total bit width of a group of IO arguments.
pub fn io_bits(args: &[IOArg]) -> u32 {
	args.iter().map(|a| a.bits).sum()
}

/// A compiled Boolean circuit.
///
/// Once compiled the circuit is read-only. Gates are stored in compile
/// order: every gate input is either an input wire or the output of an
/// earlier gate. The garbling runtime relies on this ordering and on the
/// wire numbering (inputs first, outputs last).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Circuit {
	pub num_gates: u32,
	pub num_wires: u32,
	pub inputs: Vec<IOArg>,
	pub outputs: Vec<IOArg>,
	pub gates: Vec<Gate>,
}

impl Circuit {
	/// Total input width in wires, over all parties.
	pub fn input_bits(&self) -> u32 {
		io_bits(&self.inputs)
	}

	/// Total output width in wires.
	pub fn output_bits(&self) -> u32 {
		io_bits(&self.outputs)
	}

	/// Per-party input widths, in party order.
	pub fn input_widths(&self) -> Vec<u32> {
		self.inputs.iter().map(|a| a.bits).collect()
	}
}

impl fmt::Display for Circuit {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"#gates={} #wires={} in=[{}] out=[{}]",
			self.num_gates,
			self.num_wires,
			self.inputs.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "),
			self.outputs.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", "),
		)
	}
}
