//! The front-end-to-circuit compilation pipeline.
//!
//! A source program arrives as an [`ast::Ast`] tree. Constant subtrees fold
//! in the constant folder; the remainder lowers to an SSA instruction stream
//! ([`ssa`]), and each SSA instruction bit-blasts into families of Boolean
//! gates ([`circuits`]) over a shared wire allocator. The result is a
//! read-only [`mpcl_circuit::Circuit`] in deterministic gate order, ready for
//! garbling.
//!
//! Constant arithmetic ([`mpa`]) is defined by building the corresponding
//! circuit and evaluating it, so folded results are bit-identical to what the
//! garbled evaluation would produce.

pub mod ast;
pub mod circuits;
pub mod error;
pub mod mpa;
pub mod params;
pub mod ssa;

pub use error::{CompileError, Point, Result};
pub use params::{CircFormat, Params};
