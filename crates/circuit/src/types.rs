//! Type information records shared by the compiler and the circuit formats.

use std::fmt;

use crate::error::CircuitError;

/// The kind of a value. The discriminants are the on-disk encoding of the
/// `mpclc` format and must not be reordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeKind {
	Undefined = 0,
	Bool = 1,
	Int = 2,
	Uint = 3,
	Str = 4,
	Array = 5,
	Struct = 6,
}

impl TypeKind {
	pub fn from_u8(v: u8) -> Result<Self, CircuitError> {
		Ok(match v {
			0 => TypeKind::Undefined,
			1 => TypeKind::Bool,
			2 => TypeKind::Int,
			3 => TypeKind::Uint,
			4 => TypeKind::Str,
			5 => TypeKind::Array,
			6 => TypeKind::Struct,
			_ => {
				return Err(CircuitError::malformed(format!("unknown type kind {v}")));
			}
		})
	}

	/// Signed integer interpretation applies to this kind.
	pub fn is_signed(self) -> bool {
		matches!(self, TypeKind::Int)
	}
}

impl fmt::Display for TypeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			TypeKind::Undefined => "?",
			TypeKind::Bool => "bool",
			TypeKind::Int => "int",
			TypeKind::Uint => "uint",
			TypeKind::Str => "string",
			TypeKind::Array => "array",
			TypeKind::Struct => "struct",
		};
		f.write_str(name)
	}
}

/// Full type information of a value.
///
/// `bits` is the materialized width in wires; `min_bits` the smallest width
/// sufficient to represent a known constant. A non-concrete type still
/// participates in width inference and may have `bits == 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeInfo {
	pub kind: TypeKind,
	pub bits: u32,
	pub min_bits: u32,
	pub array_size: u32,
	pub element: Option<Box<TypeInfo>>,
	pub is_concrete: bool,
}

impl TypeInfo {
	pub const fn undefined() -> Self {
		TypeInfo {
			kind: TypeKind::Undefined,
			bits: 0,
			min_bits: 0,
			array_size: 0,
			element: None,
			is_concrete: false,
		}
	}

	pub fn new(kind: TypeKind, bits: u32) -> Self {
		TypeInfo {
			kind,
			bits,
			min_bits: bits,
			array_size: 0,
			element: None,
			is_concrete: true,
		}
	}

	pub fn bool() -> Self {
		TypeInfo::new(TypeKind::Bool, 1)
	}

	pub fn int(bits: u32) -> Self {
		TypeInfo::new(TypeKind::Int, bits)
	}

	pub fn uint(bits: u32) -> Self {
		TypeInfo::new(TypeKind::Uint, bits)
	}

	/// The type of untyped integer literals.
	pub fn int32() -> Self {
		TypeInfo::new(TypeKind::Int, 32)
	}

	pub fn string(byte_len: u32) -> Self {
		TypeInfo::new(TypeKind::Str, byte_len * 8)
	}

	pub fn array(element: TypeInfo, size: u32) -> Self {
		let bits = element.bits * size;
		TypeInfo {
			kind: TypeKind::Array,
			bits,
			min_bits: bits,
			array_size: size,
			element: Some(Box::new(element)),
			is_concrete: true,
		}
	}

	pub fn concrete(&self) -> bool {
		self.is_concrete
	}

	pub fn set_concrete(&mut self, concrete: bool) {
		self.is_concrete = concrete;
	}

	pub fn is_signed(&self) -> bool {
		self.kind.is_signed()
	}
}

impl fmt::Display for TypeInfo {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.kind {
			TypeKind::Array => match &self.element {
				Some(el) => write!(f, "[{}]{}", self.array_size, el),
				None => write!(f, "[{}]?", self.array_size),
			},
			TypeKind::Int | TypeKind::Uint if self.bits > 0 => {
				write!(f, "{}{}", self.kind, self.bits)
			}
			_ => write!(f, "{}", self.kind),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kind_roundtrips_on_the_wire() {
		for v in 0u8..=6 {
			let kind = TypeKind::from_u8(v).unwrap();
			assert_eq!(kind as u8, v);
		}
		assert!(TypeKind::from_u8(7).is_err());
	}

	#[test]
	fn display_names() {
		assert_eq!(TypeInfo::int(8).to_string(), "int8");
		assert_eq!(TypeInfo::uint(64).to_string(), "uint64");
		assert_eq!(TypeInfo::bool().to_string(), "bool");
		assert_eq!(TypeInfo::array(TypeInfo::uint(8), 4).to_string(), "[4]uint8");
	}
}
