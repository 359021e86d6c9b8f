//! Predeclared builtin functions.
//!
//! A builtin may carry an SSA hook (lowering into instructions), an Eval
//! hook (constant folding, three-valued: value, folded, error), or both.

use std::{fs::File, sync::Arc};

use mpcl_circuit::{Circuit, TypeInfo, TypeKind};

use super::{Ast, Codegen, eval::eval, parse_type_name};
use crate::{
	circuits::hamming_bits,
	error::{CompileError, Point, Result},
	ssa::{Bindings, BlockId, BuiltinKind, Const, Generator, Instr, Variable},
};

pub type SsaFn = fn(
	args: &[Variable],
	block: BlockId,
	ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<(BlockId, Vec<Variable>)>;

pub type EvalFn = fn(
	args: &[Ast],
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<Option<Variable>>;

pub struct Builtin {
	pub name: &'static str,
	pub ssa: Option<SsaFn>,
	pub eval: Option<EvalFn>,
}

static BUILTINS: [Builtin; 5] = [
	Builtin {
		name: "hamming",
		ssa: Some(hamming_ssa),
		eval: None,
	},
	Builtin {
		name: "len",
		ssa: None,
		eval: Some(len_eval),
	},
	Builtin {
		name: "make",
		ssa: None,
		eval: Some(make_eval),
	},
	Builtin {
		name: "native",
		ssa: Some(native_ssa),
		eval: None,
	},
	Builtin {
		name: "size",
		ssa: Some(size_ssa),
		eval: Some(size_eval),
	},
];

pub fn builtin(name: &str) -> Option<&'static Builtin> {
	BUILTINS.iter().find(|b| b.name == name)
}

/// `native(name, args...)`: splices a named intrinsic or a `.circ` file,
/// resolved relative to the invoking source file.
fn native_ssa(
	args: &[Variable],
	block: BlockId,
	ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<(BlockId, Vec<Variable>)> {
	let Some(Const::Str(name)) = args.first().and_then(|a| a.const_value.clone()) else {
		return Err(CompileError::constant(
			loc,
			"native: circuit name must be a constant string",
		));
	};
	// The name constant only references the circuit file; it takes no part
	// in the computation.
	gen.remove_constant(&args[0]);

	if name == "hamming" {
		return hamming_ssa(&args[1..], block, ctx, gen, loc);
	}

	let dir = ctx.source.parent().unwrap_or_else(|| std::path::Path::new("."));
	let path = dir.join(&name);
	let file = File::open(&path).map_err(|err| {
		CompileError::circuit(loc, format!("failed to open circuit {}: {err}", path.display()))
	})?;
	let circ = Circuit::parse(file)
		.map_err(|err| CompileError::circuit(loc, format!("failed to parse circuit: {err}")))?;

	let supplied = args.len() - 1;
	if supplied < circ.inputs.len() {
		return Err(CompileError::typ(loc, "not enough arguments in call to native"));
	}
	if supplied > circ.inputs.len() {
		return Err(CompileError::typ(loc, "too many arguments in call to native"));
	}

	let mut call_args = args[1..].to_vec();
	for (idx, io) in circ.inputs.iter().enumerate() {
		let arg = &mut call_args[idx];
		if io.bits == arg.ty.bits {
			continue;
		}
		// A narrower compile-time constant extends to the circuit's width.
		if arg.is_const && arg.ty.min_bits <= io.bits {
			arg.ty.bits = io.bits;
			continue;
		}
		return Err(CompileError::typ(
			loc,
			format!(
				"invalid argument {idx} for native circuit: got {}, need {} bits",
				arg.ty, io.bits
			),
		));
	}

	let mut rets = Vec::with_capacity(circ.outputs.len());
	for io in &circ.outputs {
		rets.push(gen.anon_var(TypeInfo::new(TypeKind::Undefined, io.bits)));
	}

	gen.push_instr(block, Instr::Circ {
		args: call_args,
		circ: Arc::new(circ),
		rets: rets.clone(),
	});
	Ok((block, rets))
}

/// `hamming(a, b)`: bit distance, result wide enough for the count.
fn hamming_ssa(
	args: &[Variable],
	block: BlockId,
	_ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<(BlockId, Vec<Variable>)> {
	if args.len() != 2 {
		return Err(CompileError::typ(
			loc,
			"invalid amount of arguments in call to hamming",
		));
	}
	let bits = hamming_bits(args[0].ty.bits.max(args[1].ty.bits));
	let out = gen.anon_var(TypeInfo::uint(bits));
	gen.push_instr(block, Instr::Builtin {
		kind: BuiltinKind::Hamming,
		x: args[0].clone(),
		y: args[1].clone(),
		out: out.clone(),
	});
	Ok((block, vec![out]))
}

/// `size(x)` over an already-lowered value: the bit width of its type.
fn size_ssa(
	args: &[Variable],
	block: BlockId,
	_ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<(BlockId, Vec<Variable>)> {
	if args.len() != 1 {
		return Err(CompileError::typ(loc, "invalid amount of arguments in call to size"));
	}
	let bits = args[0].ty.bits;
	let v = gen.constant(Const::I32(bits as i32), TypeInfo::undefined());
	gen.add_constant(&v);
	Ok((block, vec![v]))
}

fn size_eval(
	args: &[Ast],
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<Option<Variable>> {
	if args.len() != 1 {
		return Err(CompileError::typ(loc, "invalid amount of arguments in call to size"));
	}
	match &args[0] {
		Ast::VariableRef { name, .. } => match env.get(name) {
			Some(bound) => {
				let bits = bound.ty.bits;
				Ok(Some(gen.constant(Const::I32(bits as i32), TypeInfo::undefined())))
			}
			None => Err(CompileError::typ(loc, format!("undefined variable '{name}'"))),
		},
		other => {
			let Some(val) = eval(other, env, ctx, gen)? else {
				return Ok(None);
			};
			Ok(Some(gen.constant(Const::I32(val.ty.bits as i32), TypeInfo::undefined())))
		}
	}
}

/// `len(x)`: byte length of strings, element count of arrays.
fn len_eval(
	args: &[Ast],
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<Option<Variable>> {
	if args.len() != 1 {
		return Err(CompileError::typ(loc, "invalid amount of arguments in call to len"));
	}
	let ty = match &args[0] {
		Ast::VariableRef { name, .. } => match env.get(name) {
			Some(bound) if !bound.is_const => Some(bound.ty.clone()),
			_ => None,
		},
		_ => None,
	};
	let ty = match ty {
		Some(ty) => ty,
		None => {
			let Some(val) = eval(&args[0], env, ctx, gen)? else {
				return Ok(None);
			};
			match val.const_value.as_ref() {
				Some(Const::Str(s)) => {
					let n = s.len() as i32;
					return Ok(Some(gen.constant(Const::I32(n), TypeInfo::undefined())));
				}
				Some(Const::Composite(vals)) => {
					let n = vals.len() as i32;
					return Ok(Some(gen.constant(Const::I32(n), TypeInfo::undefined())));
				}
				_ => val.ty.clone(),
			}
		}
	};
	match ty.kind {
		TypeKind::Str => {
			let n = (ty.bits / 8) as i32;
			Ok(Some(gen.constant(Const::I32(n), TypeInfo::undefined())))
		}
		TypeKind::Array => {
			let n = ty.array_size as i32;
			Ok(Some(gen.constant(Const::I32(n), TypeInfo::undefined())))
		}
		_ => Err(CompileError::typ(loc, format!("invalid argument for len: {ty}"))),
	}
}

/// `make(T, n)`: materializes T at runtime width n. Only type names whose
/// width is otherwise indeterminate can be made.
fn make_eval(
	args: &[Ast],
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<Option<Variable>> {
	if args.len() != 2 {
		return Err(CompileError::typ(loc, "invalid amount of arguments in call to make"));
	}
	let Ast::VariableRef { name, .. } = &args[0] else {
		return Err(CompileError::typ(loc, "make: first argument is not a type"));
	};
	let Some(mut ty) = parse_type_name(name) else {
		return Err(CompileError::typ(loc, format!("{name} is not a type")));
	};
	if ty.kind == TypeKind::Array {
		return Ok(None);
	}
	if ty.bits != 0 {
		return Err(CompileError::typ(loc, format!("can't make specified type {ty}")));
	}
	let Some(n) = eval(&args[1], env, ctx, gen)? else {
		return Err(CompileError::constant(loc, "non-constant length argument in make"));
	};
	let Some(bits) = n.const_index() else {
		return Err(CompileError::constant(loc, "non-integer length argument in make"));
	};
	if bits <= 0 {
		return Err(CompileError::typ(loc, format!("invalid make length {bits}")));
	}
	ty.bits = bits as u32;
	ty.min_bits = ty.bits;
	ty.set_concrete(true);
	Ok(Some(gen.constant(Const::TypeRef(ty), TypeInfo::undefined())))
}
