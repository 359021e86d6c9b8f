//! Compiler error kinds and source locations.
//!
//! Every error is fatal: compilation is deterministic, so nothing retries.
//! The user-visible rendering is a single `source:line:col: message` line.

use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

/// A source location. An empty `source` means the location is unknown and
/// the rendered message carries no position prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Point {
	pub source: String,
	pub line: u32,
	pub col: u32,
}

impl Point {
	pub fn new(source: impl Into<String>, line: u32, col: u32) -> Self {
		Point {
			source: source.into(),
			line,
			col,
		}
	}

	pub fn unknown() -> Self {
		Point::default()
	}
}

impl fmt::Display for Point {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.source.is_empty() {
			return Ok(());
		}
		write!(f, "{}:{}:{}: ", self.source, self.line, self.col)
	}
}

#[derive(Debug, Error)]
pub enum CompileError {
	#[error("{point}{message}")]
	Syntax { point: Point, message: String },

	#[error("{point}{message}")]
	Type { point: Point, message: String },

	#[error("{point}{message}")]
	Const { point: Point, message: String },

	#[error("{point}slice bounds out of range [{from}:{to}] for {width} bits")]
	Bounds {
		point: Point,
		from: i64,
		to: i64,
		width: u32,
	},

	#[error("{point}malformed circuit: {message}")]
	MalformedCircuit { point: Point, message: String },

	/// An invariant violation. Surfacing one implies a compiler bug.
	#[error("internal error: {message}")]
	Internal { message: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl CompileError {
	pub fn syntax(point: &Point, message: impl Into<String>) -> Self {
		CompileError::Syntax {
			point: point.clone(),
			message: message.into(),
		}
	}

	pub fn typ(point: &Point, message: impl Into<String>) -> Self {
		CompileError::Type {
			point: point.clone(),
			message: message.into(),
		}
	}

	pub fn constant(point: &Point, message: impl Into<String>) -> Self {
		CompileError::Const {
			point: point.clone(),
			message: message.into(),
		}
	}

	pub fn bounds(point: &Point, from: i64, to: i64, width: u32) -> Self {
		CompileError::Bounds {
			point: point.clone(),
			from,
			to,
			width,
		}
	}

	pub fn circuit(point: &Point, message: impl Into<String>) -> Self {
		CompileError::MalformedCircuit {
			point: point.clone(),
			message: message.into(),
		}
	}

	pub fn internal(message: impl Into<String>) -> Self {
		CompileError::Internal {
			message: message.into(),
		}
	}
}

impl From<mpcl_circuit::CircuitError> for CompileError {
	fn from(err: mpcl_circuit::CircuitError) -> Self {
		match err {
			mpcl_circuit::CircuitError::Io(io) => CompileError::Io(io),
			other => CompileError::MalformedCircuit {
				point: Point::unknown(),
				message: other.to_string(),
			},
		}
	}
}
