//! Compilation parameters and output sinks.

use std::{fmt, io::Write, str::FromStr};

/// On-disk circuit format selector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CircFormat {
	#[default]
	Mpclc,
	Bristol,
}

impl FromStr for CircFormat {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"mpclc" => Ok(CircFormat::Mpclc),
			"bristol" => Ok(CircFormat::Bristol),
			other => Err(format!("unsupported circuit format: {other}")),
		}
	}
}

impl fmt::Display for CircFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CircFormat::Mpclc => f.write_str("mpclc"),
			CircFormat::Bristol => f.write_str("bristol"),
		}
	}
}

/// Compiler parameters.
///
/// The output sinks are owned by the parameters object; [`Params::close`]
/// (or dropping the object) releases them all on every exit path.
pub struct Params {
	pub verbose: bool,

	/// Maximum width of a single value in wires.
	pub max_wire_bits: u32,

	/// Multiplier operand width from which the array (column compressor)
	/// multiplier is used instead of linear accumulation. Zero disables the
	/// array multiplier.
	pub mult_array_threshold: u32,

	pub opt_prune_gates: bool,

	pub circ_format: CircFormat,
	pub circ_out: Option<Box<dyn Write>>,
	pub ssa_out: Option<Box<dyn Write>>,
}

impl Default for Params {
	fn default() -> Self {
		Params {
			verbose: false,
			max_wire_bits: 0x20000,
			mult_array_threshold: 0,
			opt_prune_gates: false,
			circ_format: CircFormat::default(),
			circ_out: None,
			ssa_out: None,
		}
	}
}

impl Params {
	pub fn new() -> Self {
		Params::default()
	}

	/// Closes all open output sinks.
	pub fn close(&mut self) {
		self.circ_out = None;
		self.ssa_out = None;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn format_from_str() {
		assert_eq!("mpclc".parse::<CircFormat>().unwrap(), CircFormat::Mpclc);
		assert_eq!("bristol".parse::<CircFormat>().unwrap(), CircFormat::Bristol);
		assert!("dot".parse::<CircFormat>().is_err());
	}
}
