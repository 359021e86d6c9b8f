//! Boolean circuit model for garbled-circuit evaluation.
//!
//! A [`Circuit`] is a flat, read-only list of XOR/XNOR/AND/OR/INV gates over
//! numeric wire ids, together with the typed input and output declarations.
//! The compiler produces circuits in a deterministic gate order; the garbling
//! runtime consumes them as-is, allocating one label pair per wire.
//!
//! Two on-disk formats are supported: the native binary `mpclc` format and
//! the Bristol-fashion text format. [`parse`](Circuit::parse) sniffs the
//! format from the leading bytes.

pub mod circuit;
pub mod error;
pub mod eval;
pub mod gate;
pub mod marshal;
pub mod parse;
pub mod types;

pub use circuit::{Circuit, IOArg, io_bits};
pub use error::CircuitError;
pub use gate::{Gate, Op, WireId};
pub use types::{TypeInfo, TypeKind};
