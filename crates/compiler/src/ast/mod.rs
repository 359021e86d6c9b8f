//! The abstract syntax tree and its compilation context.
//!
//! Nodes form a single tagged enum; the constant folder ([`eval`]) and the
//! SSA lowering ([`codegen`]) both dispatch over it by match. The tokenizer
//! and grammar that produce these trees are front-end territory and out of
//! scope here.

pub mod builtin;
pub mod codegen;
pub mod eval;

pub use builtin::{Builtin, builtin};
pub use codegen::ssa_func;
pub use eval::eval;

use std::{fmt, path::PathBuf};

use mpcl_circuit::{TypeInfo, TypeKind};

use crate::{error::Point, params::Params, ssa::Const};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
	Mul,
	Div,
	Mod,
	Lshift,
	Rshift,
	Band,
	Bclr,
	Add,
	Sub,
	Bor,
	Bxor,
	Eq,
	Neq,
	Lt,
	Le,
	Gt,
	Ge,
	And,
	Or,
}

impl fmt::Display for BinaryOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			BinaryOp::Mul => "*",
			BinaryOp::Div => "/",
			BinaryOp::Mod => "%",
			BinaryOp::Lshift => "<<",
			BinaryOp::Rshift => ">>",
			BinaryOp::Band => "&",
			BinaryOp::Bclr => "&^",
			BinaryOp::Add => "+",
			BinaryOp::Sub => "-",
			BinaryOp::Bor => "|",
			BinaryOp::Bxor => "^",
			BinaryOp::Eq => "==",
			BinaryOp::Neq => "!=",
			BinaryOp::Lt => "<",
			BinaryOp::Le => "<=",
			BinaryOp::Gt => ">",
			BinaryOp::Ge => ">=",
			BinaryOp::And => "&&",
			BinaryOp::Or => "||",
		};
		f.write_str(s)
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
	Not,
	Minus,
}

impl fmt::Display for UnaryOp {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			UnaryOp::Not => f.write_str("!"),
			UnaryOp::Minus => f.write_str("-"),
		}
	}
}

#[derive(Clone, Debug)]
pub struct FuncParam {
	pub name: String,
	pub ty: TypeInfo,
}

#[derive(Clone, Debug)]
pub struct Func {
	pub name: String,
	pub params: Vec<FuncParam>,
	pub ret: Vec<TypeInfo>,
	pub body: Vec<Ast>,
	pub loc: Point,
}

/// One AST node.
#[derive(Clone, Debug)]
pub enum Ast {
	List {
		items: Vec<Ast>,
		loc: Point,
	},
	Func(Box<Func>),
	Assign {
		lvalues: Vec<Ast>,
		exprs: Vec<Ast>,
		define: bool,
		loc: Point,
	},
	If {
		cond: Box<Ast>,
		then: Vec<Ast>,
		els: Vec<Ast>,
		loc: Point,
	},
	For {
		init: Box<Ast>,
		cond: Box<Ast>,
		post: Box<Ast>,
		body: Vec<Ast>,
		loc: Point,
	},
	Return {
		exprs: Vec<Ast>,
		loc: Point,
	},
	Binary {
		op: BinaryOp,
		left: Box<Ast>,
		right: Box<Ast>,
		loc: Point,
	},
	Unary {
		op: UnaryOp,
		expr: Box<Ast>,
		loc: Point,
	},
	Call {
		name: String,
		args: Vec<Ast>,
		loc: Point,
	},
	Slice {
		expr: Box<Ast>,
		from: Option<Box<Ast>>,
		to: Option<Box<Ast>>,
		loc: Point,
	},
	Index {
		expr: Box<Ast>,
		index: Box<Ast>,
		loc: Point,
	},
	BasicLit {
		value: Const,
		loc: Point,
	},
	CompositeLit {
		ty: TypeInfo,
		values: Vec<Ast>,
		loc: Point,
	},
	VariableRef {
		name: String,
		loc: Point,
	},
}

impl Ast {
	pub fn loc(&self) -> &Point {
		match self {
			Ast::List { loc, .. }
			| Ast::Assign { loc, .. }
			| Ast::If { loc, .. }
			| Ast::For { loc, .. }
			| Ast::Return { loc, .. }
			| Ast::Binary { loc, .. }
			| Ast::Unary { loc, .. }
			| Ast::Call { loc, .. }
			| Ast::Slice { loc, .. }
			| Ast::Index { loc, .. }
			| Ast::BasicLit { loc, .. }
			| Ast::CompositeLit { loc, .. }
			| Ast::VariableRef { loc, .. } => loc,
			Ast::Func(func) => &func.loc,
		}
	}
}

/// Resolves a type name: `bool`, `int`, `uint`, `intN`, `uintN`, `string`.
/// Widthless integer names stay non-concrete until inference or `make`
/// resolves them.
pub fn parse_type_name(name: &str) -> Option<TypeInfo> {
	match name {
		"bool" => return Some(TypeInfo::bool()),
		"string" => {
			let mut ty = TypeInfo::new(TypeKind::Str, 0);
			ty.set_concrete(false);
			return Some(ty);
		}
		_ => {}
	}
	let (kind, width) = if let Some(rest) = name.strip_prefix("uint") {
		(TypeKind::Uint, rest)
	} else if let Some(rest) = name.strip_prefix("int") {
		(TypeKind::Int, rest)
	} else {
		return None;
	};
	if width.is_empty() {
		let mut ty = TypeInfo::new(kind, 0);
		ty.set_concrete(false);
		return Some(ty);
	}
	let bits: u32 = width.parse().ok()?;
	if bits == 0 {
		return None;
	}
	Some(TypeInfo::new(kind, bits))
}

/// The compilation context of one source unit: parameters, the source path
/// (native circuit references resolve relative to it) and the scope
/// counter.
pub struct Codegen<'a> {
	pub params: &'a Params,
	pub source: PathBuf,
	pub ret_types: Vec<TypeInfo>,
	scope: usize,
}

impl<'a> Codegen<'a> {
	pub fn new(params: &'a Params, source: impl Into<PathBuf>) -> Self {
		Codegen {
			params,
			source: source.into(),
			ret_types: Vec::new(),
			scope: 0,
		}
	}

	pub fn scope(&self) -> usize {
		self.scope
	}

	pub fn enter_scope(&mut self) {
		self.scope += 1;
	}

	pub fn exit_scope(&mut self) {
		self.scope -= 1;
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn type_names() {
		assert_eq!(parse_type_name("bool"), Some(TypeInfo::bool()));
		assert_eq!(parse_type_name("uint8"), Some(TypeInfo::uint(8)));
		assert_eq!(parse_type_name("int128"), Some(TypeInfo::int(128)));
		let int = parse_type_name("int").unwrap();
		assert!(!int.concrete());
		assert_eq!(int.bits, 0);
		assert_eq!(parse_type_name("float64"), None);
		assert_eq!(parse_type_name("uint0"), None);
	}
}
