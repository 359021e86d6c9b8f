//! The constant folder.
//!
//! `eval` returns `Ok(Some(value))` when a subtree folds to a constant,
//! `Ok(None)` when it does not (lowering then proceeds to the gate-level
//! path), and an error when a folding rule is violated. Errors are fatal:
//! there is no fall-through from a failed fold.

use mpcl_circuit::{TypeInfo, TypeKind};
use num_bigint::BigInt;
use num_traits::One;

use super::{Ast, BinaryOp, Codegen, UnaryOp, builtin, parse_type_name};
use crate::{
	error::{CompileError, Point, Result},
	mpa,
	ssa::{Bindings, Const, Generator, Variable},
};

pub fn eval(
	ast: &Ast,
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	match ast {
		Ast::List { .. }
		| Ast::Func(_)
		| Ast::If { .. }
		| Ast::For { .. }
		| Ast::Return { .. } => Ok(None),

		Ast::BasicLit { value, .. } => {
			Ok(Some(gen.constant(value.clone(), TypeInfo::undefined())))
		}

		Ast::VariableRef { name, .. } => match env.get(name) {
			Some(var) if var.is_const => Ok(Some(var.clone())),
			_ => Ok(None),
		},

		Ast::Assign {
			lvalues,
			exprs,
			define,
			loc,
		} => eval_assign(lvalues, exprs, *define, loc, env, ctx, gen),

		Ast::Binary {
			op, left, right, ..
		} => {
			let Some(l) = eval(left, env, ctx, gen)? else {
				return Ok(None);
			};
			let Some(r) = eval(right, env, ctx, gen)? else {
				return Ok(None);
			};
			eval_binary(*op, &l, &r, right.loc(), gen)
		}

		Ast::Unary { op, expr, loc } => {
			let Some(val) = eval(expr, env, ctx, gen)? else {
				return Ok(None);
			};
			eval_unary(*op, &val, loc, gen)
		}

		Ast::Slice {
			expr, from, to, loc,
		} => eval_slice(expr, from.as_deref(), to.as_deref(), loc, env, ctx, gen),

		Ast::Index { expr, index, loc } => {
			let Some(val) = eval(expr, env, ctx, gen)? else {
				return Ok(None);
			};
			let Some(idx) = eval(index, env, ctx, gen)? else {
				return Ok(None);
			};
			let Some(idx) = idx.const_index() else {
				return Err(CompileError::constant(loc, "non-constant array index"));
			};
			eval_index(&val, idx, loc, gen)
		}

		Ast::CompositeLit { ty, values, loc } => eval_composite(ty, values, loc, env, ctx, gen),

		Ast::Call { name, args, loc } => eval_call(name, args, loc, env, ctx, gen),
	}
}

#[allow(clippy::too_many_arguments)]
fn eval_assign(
	lvalues: &[Ast],
	exprs: &[Ast],
	define: bool,
	loc: &Point,
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	let mut values = Vec::with_capacity(exprs.len());
	for expr in exprs {
		let Some(val) = eval(expr, env, ctx, gen)? else {
			return Ok(None);
		};
		values.push(val);
	}
	if lvalues.len() != values.len() {
		return Err(CompileError::typ(
			loc,
			format!(
				"assignment mismatch: {} variables but {} values",
				lvalues.len(),
				values.len()
			),
		));
	}

	let mut consts = Vec::with_capacity(values.len());
	for (lv, val) in lvalues.iter().zip(values) {
		let Ast::VariableRef { name, .. } = lv else {
			return Err(CompileError::typ(loc, format!("cannot assign to {lv:?}")));
		};
		let value = val
			.const_value
			.clone()
			.ok_or_else(|| CompileError::internal("folded value without a constant"))?;
		let hint = if define {
			val.ty.clone()
		} else {
			let bound = env.get(name).ok_or_else(|| {
				CompileError::typ(loc, format!("undefined variable '{name}'"))
			})?;
			bound.ty.clone()
		};
		let const_val = gen.constant(value.clone(), hint);
		gen.add_constant(&const_val);
		env.set(name, const_val);
		consts.push(value);
	}

	let arr = TypeInfo {
		kind: TypeKind::Array,
		bits: 0,
		min_bits: 0,
		array_size: consts.len() as u32,
		element: None,
		is_concrete: true,
	};
	Ok(Some(gen.constant(Const::Composite(consts), arr)))
}

fn as_mpa(c: &Const) -> Option<mpa::Int> {
	match c {
		Const::Mpa(i) => Some(i.clone()),
		Const::I32(v) => {
			let mut i = mpa::Int::from_i64(i64::from(*v));
			i.set_type_size(32);
			Some(i)
		}
		_ => None,
	}
}

fn wider_ty(l: &Variable, r: &Variable) -> TypeInfo {
	if r.ty.bits > l.ty.bits {
		r.ty.clone()
	} else {
		l.ty.clone()
	}
}

fn eval_binary(
	op: BinaryOp,
	l: &Variable,
	r: &Variable,
	loc: &Point,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	let lv = l.const_value.as_ref();
	let rv = r.const_value.as_ref();
	let (Some(lv), Some(rv)) = (lv, rv) else {
		return Ok(None);
	};

	if let (Const::Bool(a), Const::Bool(b)) = (lv, rv) {
		let result = match op {
			BinaryOp::Eq => a == b,
			BinaryOp::Neq => a != b,
			BinaryOp::And => *a && *b,
			BinaryOp::Or => *a || *b,
			_ => {
				return Err(CompileError::typ(
					loc,
					format!("invalid operation: {l} {op} {r}"),
				));
			}
		};
		return Ok(Some(gen.constant(Const::Bool(result), TypeInfo::bool())));
	}

	if let (Const::Str(a), Const::Str(b)) = (lv, rv) {
		return match op {
			BinaryOp::Add => {
				let joined = format!("{a}{b}");
				Ok(Some(gen.constant(Const::Str(joined), TypeInfo::undefined())))
			}
			_ => Err(CompileError::typ(
				loc,
				format!("invalid operation: {l} {op} {r}"),
			)),
		};
	}

	let (Some(a), Some(b)) = (as_mpa(lv), as_mpa(rv)) else {
		return Err(CompileError::typ(
			loc,
			format!("invalid operation: {l} {op} {r}"),
		));
	};
	let hint = wider_ty(l, r);

	let shift = |i: &mpa::Int| -> Result<u64> {
		u64::try_from(i.to_i64())
			.map_err(|_| CompileError::typ(loc, "negative shift count"))
	};

	let int_result = match op {
		BinaryOp::Mul => Some(a.mul(&b)),
		BinaryOp::Div => Some(a.div(&b)),
		BinaryOp::Mod => Some(a.rem(&b)),
		BinaryOp::Add => Some(a.add(&b)),
		BinaryOp::Sub => Some(a.sub(&b)),
		BinaryOp::Lshift => Some(a.lsh(shift(&b)?)),
		BinaryOp::Rshift => Some(a.rsh(shift(&b)?)),
		BinaryOp::Band => Some(a.and(&b)),
		BinaryOp::Bor => Some(a.or(&b)),
		BinaryOp::Bxor => Some(a.xor(&b)),
		_ => None,
	};
	if let Some(result) = int_result {
		return Ok(Some(gen.constant(Const::Mpa(result), hint)));
	}

	let ord = a.cmp_value(&b);
	let result = match op {
		BinaryOp::Eq => ord.is_eq(),
		BinaryOp::Neq => ord.is_ne(),
		BinaryOp::Lt => ord.is_lt(),
		BinaryOp::Le => ord.is_le(),
		BinaryOp::Gt => ord.is_gt(),
		BinaryOp::Ge => ord.is_ge(),
		_ => {
			return Err(CompileError::typ(
				loc,
				format!("invalid operation: {l} {op} {r}"),
			));
		}
	};
	Ok(Some(gen.constant(Const::Bool(result), TypeInfo::bool())))
}

fn eval_unary(
	op: UnaryOp,
	val: &Variable,
	loc: &Point,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	match (op, val.const_value.as_ref()) {
		(UnaryOp::Not, Some(Const::Bool(b))) => {
			Ok(Some(gen.constant(Const::Bool(!b), TypeInfo::bool())))
		}
		(UnaryOp::Minus, Some(Const::I32(v))) => {
			Ok(Some(gen.constant(Const::I32(-v), TypeInfo::undefined())))
		}
		(UnaryOp::Minus, Some(Const::Mpa(i))) => {
			Ok(Some(gen.constant(Const::Mpa(i.neg()), val.ty.clone())))
		}
		_ => Err(CompileError::typ(
			loc,
			format!("invalid unary expression: {op}{val}"),
		)),
	}
}

#[allow(clippy::too_many_arguments)]
fn eval_slice(
	expr: &Ast,
	from: Option<&Ast>,
	to: Option<&Ast>,
	loc: &Point,
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	let Some(val) = eval(expr, env, ctx, gen)? else {
		return Ok(None);
	};

	let mut bound = |ast: Option<&Ast>, default: i64| -> Result<Option<i64>> {
		let Some(ast) = ast else {
			return Ok(Some(default));
		};
		let Some(v) = eval(ast, env, ctx, gen)? else {
			return Ok(None);
		};
		v.const_index()
			.map(Some)
			.ok_or_else(|| CompileError::constant(loc, "invalid slice index"))
	};
	let Some(from) = bound(from, 0)? else {
		return Ok(None);
	};
	let Some(to) = bound(to, i64::MAX)? else {
		return Ok(None);
	};
	if to <= from || from < 0 {
		return Err(CompileError::typ(loc, format!("invalid slice range {from}:{to}")));
	}

	match val.const_value.as_ref() {
		Some(Const::Mpa(i)) => {
			let width = i64::from(val.ty.bits.max(val.ty.min_bits));
			let to = if to == i64::MAX { width } else { to };
			if to > width {
				return Err(CompileError::bounds(loc, from, to, width as u32));
			}
			let len = (to - from) as u32;
			let mask = (BigInt::one() << len) - 1;
			let sliced = (i.value() >> from) & mask;
			let result = mpa::Int::with_bits(len, sliced);
			Ok(Some(gen.constant(Const::Mpa(result), TypeInfo::undefined())))
		}
		Some(Const::I32(v)) => {
			if to != i64::MAX && to > 32 {
				return Err(CompileError::bounds(loc, from, to, 32));
			}
			let to = to.min(32);
			let len = (to - from) as u32;
			let mask: u32 = if len >= 32 { u32::MAX } else { (1 << len) - 1 };
			let sliced = ((*v as u32) >> from) & mask;
			Ok(Some(gen.constant(Const::I32(sliced as i32), TypeInfo::undefined())))
		}
		Some(Const::Str(s)) => {
			let to = if to == i64::MAX { s.len() as i64 } else { to };
			if to > s.len() as i64 {
				return Err(CompileError::bounds(loc, from, to, s.len() as u32 * 8));
			}
			let bytes = &s.as_bytes()[from as usize..to as usize];
			let sliced = String::from_utf8_lossy(bytes).into_owned();
			Ok(Some(gen.constant(Const::Str(sliced), TypeInfo::undefined())))
		}
		Some(Const::Composite(vals)) => {
			let to = if to == i64::MAX { vals.len() as i64 } else { to };
			if to > vals.len() as i64 {
				return Err(CompileError::bounds(loc, from, to, vals.len() as u32));
			}
			let sliced = vals[from as usize..to as usize].to_vec();
			let mut ty = val.ty.clone();
			ty.array_size = (to - from) as u32;
			Ok(Some(gen.constant(Const::Composite(sliced), ty)))
		}
		_ => Err(CompileError::constant(loc, "slice of a non-constant value")),
	}
}

fn eval_index(
	val: &Variable,
	idx: i64,
	loc: &Point,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	match val.const_value.as_ref() {
		Some(Const::Str(s)) => {
			let bytes = s.as_bytes();
			if idx < 0 || idx >= bytes.len() as i64 {
				return Err(CompileError::typ(
					loc,
					format!(
						"invalid array index {idx} (out of bounds for {}-byte string)",
						bytes.len()
					),
				));
			}
			let b = i32::from(bytes[idx as usize]);
			Ok(Some(gen.constant(Const::I32(b), TypeInfo::undefined())))
		}
		Some(Const::Composite(vals)) => {
			if idx < 0 || idx >= vals.len() as i64 {
				return Err(CompileError::typ(
					loc,
					format!(
						"invalid array index {idx} (out of bounds for {}-element array)",
						vals.len()
					),
				));
			}
			let element_ty = val
				.ty
				.element
				.as_deref()
				.cloned()
				.unwrap_or_else(TypeInfo::undefined);
			Ok(Some(gen.constant(vals[idx as usize].clone(), element_ty)))
		}
		_ => Err(CompileError::constant(loc, "index of a non-constant value")),
	}
}

#[allow(clippy::too_many_arguments)]
fn eval_composite(
	ty: &TypeInfo,
	values: &[Ast],
	loc: &Point,
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	match ty.kind {
		TypeKind::Struct | TypeKind::Array => {
			let mut consts = Vec::with_capacity(values.len());
			for el in values {
				let Some(v) = eval(el, env, ctx, gen)? else {
					return Ok(None);
				};
				let value = v
					.const_value
					.clone()
					.ok_or_else(|| CompileError::internal("folded value without a constant"))?;
				consts.push(value);
			}
			let mut ty = ty.clone();
			if ty.kind == TypeKind::Array {
				ty.array_size = consts.len() as u32;
				let el_bits = ty.element.as_ref().map_or(0, |el| el.bits);
				ty.bits = ty.array_size * el_bits;
				ty.min_bits = ty.bits;
			}
			Ok(Some(gen.constant(Const::Composite(consts), ty)))
		}
		_ => Err(CompileError::typ(
			loc,
			format!("composite literal of non-composite type {ty}"),
		)),
	}
}

fn eval_call(
	name: &str,
	args: &[Ast],
	loc: &Point,
	env: &mut Bindings,
	ctx: &Codegen,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	if let Some(bi) = builtin(name) {
		if let Some(eval_fn) = bi.eval {
			return eval_fn(args, env, ctx, gen, loc);
		}
		return Ok(None);
	}

	// A type name applied to a constant is a cast.
	let Some(mut ty) = parse_type_name(name) else {
		return Ok(None);
	};
	if args.len() != 1 {
		return Ok(None);
	}
	let Some(val) = eval(&args[0], env, ctx, gen)? else {
		return Ok(None);
	};

	match (ty.kind, val.ty.kind) {
		(TypeKind::Int | TypeKind::Uint, TypeKind::Int | TypeKind::Uint) => {
			if !ty.concrete() {
				ty.bits = val.ty.bits;
				ty.set_concrete(true);
			}
			ty.min_bits = val.ty.min_bits.min(ty.bits);
			let mut cast = val.clone();
			cast.ty = ty;
			// A cast changes the type, never the value's equality class.
			if cast.const_value != val.const_value {
				return Err(CompileError::internal("const cast changes value equality"));
			}
			Ok(Some(cast))
		}
		(TypeKind::Int | TypeKind::Uint, _) => Err(CompileError::typ(
			loc,
			format!("cannot cast {} to {ty}", val.ty),
		)),
		_ => Ok(None),
	}
}
