//! AST to SSA lowering.
//!
//! Every expression is first offered to the constant folder; only unfolded
//! subtrees lower to instructions. Control flow is oblivious: both arms of
//! an `if` materialize and a φ per rebound name selects the result, and
//! `for` loops whose bounds fold to constants unroll into straight-line
//! code.

use mpcl_circuit::{IOArg, TypeInfo, TypeKind};

use super::{Ast, BinaryOp, Codegen, Func, UnaryOp, builtin, eval::eval, parse_type_name};
use crate::{
	error::{CompileError, Point, Result},
	mpa,
	ssa::{BlockId, Const, Generator, Instr, Program, Variable},
};

/// Loop unrolling bound. A loop that folds past this many iterations is
/// rejected rather than compiled into an absurd circuit.
const MAX_LOOP_ITERATIONS: usize = 1 << 16;

/// Lowers a function definition into a linearized SSA program.
pub fn ssa_func(func: &Func, ctx: &mut Codegen, gen: &mut Generator) -> Result<Program> {
	let block = gen.new_block();
	ctx.enter_scope();

	let mut inputs = Vec::with_capacity(func.params.len());
	let mut input_vars = Vec::with_capacity(func.params.len());
	for param in &func.params {
		if !param.ty.concrete() {
			return Err(CompileError::typ(
				&func.loc,
				format!("parameter {} has unspecified type {}", param.name, param.ty),
			));
		}
		let var = gen.new_var(&param.name, param.ty.clone(), ctx.scope());
		gen.block_mut(block).bindings.set(&param.name, var.clone());
		inputs.push(IOArg::from_type(&param.name, &param.ty));
		input_vars.push(var);
	}
	let outputs: Vec<IOArg> = func
		.ret
		.iter()
		.enumerate()
		.map(|(idx, ty)| IOArg::from_type(format!("r{idx}"), ty))
		.collect();

	ctx.ret_types = func.ret.clone();
	let mut blk = block;
	for stmt in &func.body {
		blk = ssa_stmt(stmt, blk, ctx, gen)?;
	}
	ctx.exit_scope();

	let mut prog = Program::build(gen, inputs, input_vars, outputs);
	prog.add_gc_hints();
	Ok(prog)
}

/// Runs the constant folder against a block's bindings.
fn eval_in_block(
	ast: &Ast,
	block: BlockId,
	ctx: &Codegen,
	gen: &mut Generator,
) -> Result<Option<Variable>> {
	let mut bindings = std::mem::take(&mut gen.block_mut(block).bindings);
	let result = eval(ast, &mut bindings, ctx, gen);
	gen.block_mut(block).bindings = bindings;
	result
}

pub fn ssa_stmt(ast: &Ast, block: BlockId, ctx: &mut Codegen, gen: &mut Generator) -> Result<BlockId> {
	match ast {
		Ast::List { items, .. } => {
			let mut blk = block;
			for item in items {
				blk = ssa_stmt(item, blk, ctx, gen)?;
			}
			Ok(blk)
		}

		Ast::Assign { lvalues, exprs, define, loc } => {
			// Fully constant assignments fold into bindings without code.
			if eval_in_block(ast, block, ctx, gen)?.is_some() {
				return Ok(block);
			}
			if lvalues.len() != exprs.len() {
				return Err(CompileError::typ(
					loc,
					format!(
						"assignment mismatch: {} variables but {} values",
						lvalues.len(),
						exprs.len()
					),
				));
			}
			let mut blk = block;
			for (lv, expr) in lvalues.iter().zip(exprs) {
				let Ast::VariableRef { name, .. } = lv else {
					return Err(CompileError::typ(loc, format!("cannot assign to {lv:?}")));
				};
				let (b2, value) = ssa_expr(expr, blk, ctx, gen)?;
				blk = b2;
				if value.is_const {
					gen.block_mut(blk).bindings.set(name, value);
					continue;
				}
				let target_ty = if *define {
					value.ty.clone()
				} else {
					gen.block(blk)
						.bindings
						.get(name)
						.ok_or_else(|| {
							CompileError::typ(loc, format!("undefined variable '{name}'"))
						})?
						.ty
						.clone()
				};
				let out = gen.new_var(name, target_ty, ctx.scope());
				gen.push_instr(blk, Instr::Mov { x: value, out: out.clone() });
				gen.block_mut(blk).bindings.set(name, out);
			}
			Ok(blk)
		}

		Ast::If { cond, then, els, loc } => ssa_if(cond, then, els, loc, block, ctx, gen),

		Ast::For { init, cond, post, body, loc } => {
			if eval_in_block(init, block, ctx, gen)?.is_none() {
				return Err(CompileError::constant(loc, "non-constant for loop init"));
			}
			let mut blk = block;
			let mut iterations = 0usize;
			loop {
				let Some(c) = eval_in_block(cond, blk, ctx, gen)? else {
					return Err(CompileError::constant(loc, "non-constant for loop condition"));
				};
				let Some(take) = c.const_value.as_ref().and_then(Const::as_bool) else {
					return Err(CompileError::typ(loc, "non-boolean for loop condition"));
				};
				if !take {
					break;
				}
				iterations += 1;
				if iterations > MAX_LOOP_ITERATIONS {
					return Err(CompileError::constant(
						loc,
						format!("for loop exceeds {MAX_LOOP_ITERATIONS} iterations"),
					));
				}
				ctx.enter_scope();
				for stmt in body {
					blk = ssa_stmt(stmt, blk, ctx, gen)?;
				}
				ctx.exit_scope();
				if eval_in_block(post, blk, ctx, gen)?.is_none() {
					return Err(CompileError::constant(loc, "non-constant for loop post statement"));
				}
			}
			Ok(blk)
		}

		Ast::Return { exprs, loc } => {
			let mut blk = block;
			let mut values = Vec::with_capacity(exprs.len());
			for expr in exprs {
				let (b2, v) = ssa_expr(expr, blk, ctx, gen)?;
				blk = b2;
				values.push(v);
			}
			let ret_types = ctx.ret_types.clone();
			if values.len() != ret_types.len() {
				return Err(CompileError::typ(
					loc,
					format!("returning {} values, need {}", values.len(), ret_types.len()),
				));
			}
			let mut adjusted = Vec::with_capacity(values.len());
			for (value, ty) in values.into_iter().zip(ret_types) {
				if value.ty.bits == ty.bits {
					adjusted.push(value);
					continue;
				}
				let out = gen.anon_var(ty);
				gen.push_instr(blk, Instr::Mov { x: value, out: out.clone() });
				adjusted.push(out);
			}
			gen.push_instr(blk, Instr::Ret { values: adjusted });
			Ok(blk)
		}

		// Expression statement: lower for its side effects.
		_ => {
			let (blk, _) = ssa_expr(ast, block, ctx, gen)?;
			Ok(blk)
		}
	}
}

#[allow(clippy::too_many_arguments)]
fn ssa_if(
	cond: &Ast,
	then: &[Ast],
	els: &[Ast],
	loc: &Point,
	block: BlockId,
	ctx: &mut Codegen,
	gen: &mut Generator,
) -> Result<BlockId> {
	// A constant condition lowers the taken arm only.
	if let Some(c) = eval_in_block(cond, block, ctx, gen)? {
		let Some(take) = c.const_value.as_ref().and_then(Const::as_bool) else {
			return Err(CompileError::typ(loc, "non-boolean if condition"));
		};
		let arm = if take { then } else { els };
		ctx.enter_scope();
		let mut blk = block;
		for stmt in arm {
			blk = ssa_stmt(stmt, blk, ctx, gen)?;
		}
		ctx.exit_scope();
		return Ok(blk);
	}

	let (blk, cond_var) = ssa_expr(cond, block, ctx, gen)?;
	if cond_var.ty.kind != TypeKind::Bool {
		return Err(CompileError::typ(loc, "non-boolean if condition"));
	}

	let t_start = gen.branch_block(blk);
	ctx.enter_scope();
	let mut t_end = t_start;
	for stmt in then {
		t_end = ssa_stmt(stmt, t_end, ctx, gen)?;
	}
	ctx.exit_scope();

	let f_start = gen.next_block(blk);
	ctx.enter_scope();
	let mut f_end = f_start;
	for stmt in els {
		f_end = ssa_stmt(stmt, f_end, ctx, gen)?;
	}
	ctx.exit_scope();

	// Join block: the pre-branch scope is visible, and names both arms may
	// have rebound reconcile through φ.
	let join = gen.next_block(t_end);
	gen.block_mut(f_end).next = Some(join);
	let mut join_bindings = gen.block(blk).bindings.clone();
	let names: Vec<String> = join_bindings.names().into_iter().map(str::to_string).collect();
	for name in names {
		let vt = gen.block(t_end).bindings.get(&name).cloned();
		let vf = gen.block(f_end).bindings.get(&name).cloned();
		let (Some(vt), Some(vf)) = (vt, vf) else {
			continue;
		};
		if vt == vf {
			join_bindings.set(&name, vt);
			continue;
		}
		let mut ty = if vt.ty.bits >= vf.ty.bits { vt.ty.clone() } else { vf.ty.clone() };
		if ty.kind == TypeKind::Undefined {
			ty = if vt.ty.kind != TypeKind::Undefined { vt.ty.clone() } else { vf.ty.clone() };
		}
		let out = gen.new_var(&name, ty, ctx.scope());
		gen.push_instr(join, Instr::Phi {
			cond: cond_var.clone(),
			t: vt,
			f: vf,
			out: out.clone(),
		});
		join_bindings.set(&name, out);
	}
	gen.block_mut(join).bindings = join_bindings;
	Ok(join)
}

pub fn ssa_expr(
	ast: &Ast,
	block: BlockId,
	ctx: &mut Codegen,
	gen: &mut Generator,
) -> Result<(BlockId, Variable)> {
	// Constant subtrees intern and bind to ZERO/ONE wires; no gates.
	if let Some(c) = eval_in_block(ast, block, ctx, gen)? {
		gen.add_constant(&c);
		return Ok((block, c));
	}

	match ast {
		Ast::VariableRef { name, loc } => match gen.block(block).bindings.get(name) {
			Some(var) => Ok((block, var.clone())),
			None => Err(CompileError::typ(loc, format!("undefined: {name}"))),
		},

		Ast::Binary { op, left, right, loc } => {
			let (blk, l) = ssa_expr(left, block, ctx, gen)?;
			let (blk, r) = ssa_expr(right, blk, ctx, gen)?;
			lower_binary(*op, l, r, loc, blk, gen)
		}

		Ast::Unary { op, expr, loc } => {
			let (blk, value) = ssa_expr(expr, block, ctx, gen)?;
			lower_unary(*op, value, loc, blk, gen)
		}

		Ast::Call { name, args, loc } => {
			if let Some(bi) = builtin(name) {
				let Some(ssa) = bi.ssa else {
					return Err(CompileError::constant(
						loc,
						format!("argument of {name} must be constant"),
					));
				};
				let mut blk = block;
				let mut vars = Vec::with_capacity(args.len());
				for arg in args {
					let (b2, v) = ssa_expr(arg, blk, ctx, gen)?;
					blk = b2;
					vars.push(v);
				}
				let (blk, mut rets) = ssa(&vars, blk, ctx, gen, loc)?;
				if rets.len() != 1 {
					return Err(CompileError::typ(
						loc,
						format!("{name} returns {} values in single-value context", rets.len()),
					));
				}
				return Ok((blk, rets.remove(0)));
			}
			if let Some(ty) = parse_type_name(name) {
				if args.len() != 1 {
					return Err(CompileError::typ(loc, format!("invalid cast to {ty}")));
				}
				let (blk, value) = ssa_expr(&args[0], block, ctx, gen)?;
				let mut ty = ty;
				if !ty.concrete() {
					ty.bits = value.ty.bits;
					ty.set_concrete(true);
				}
				let out = gen.anon_var(ty);
				gen.push_instr(blk, Instr::Mov { x: value, out: out.clone() });
				return Ok((blk, out));
			}
			Err(CompileError::typ(loc, format!("undefined: {name}")))
		}

		Ast::Slice { expr, from, to, loc } => {
			let (blk, x) = ssa_expr(expr, block, ctx, gen)?;
			let from = match from {
				Some(ast) => fold_index(ast, blk, ctx, gen, loc)?,
				None => 0,
			};
			let to = match to {
				Some(ast) => fold_index(ast, blk, ctx, gen, loc)?,
				None => i64::from(x.ty.bits),
			};
			lower_slice(x, from, to, loc, blk, gen)
		}

		Ast::Index { expr, index, loc } => {
			let (blk, x) = ssa_expr(expr, block, ctx, gen)?;
			if x.ty.kind != TypeKind::Array {
				return Err(CompileError::typ(loc, format!("cannot index {}", x.ty)));
			}
			let element = x
				.ty
				.element
				.as_deref()
				.cloned()
				.ok_or_else(|| CompileError::typ(loc, "array without element type"))?;
			let idx = fold_index(index, blk, ctx, gen, loc)?;
			if idx < 0 || idx >= i64::from(x.ty.array_size) {
				return Err(CompileError::typ(
					loc,
					format!("invalid array index {idx} (array size {})", x.ty.array_size),
				));
			}
			let eb = i64::from(element.bits);
			lower_slice(x, idx * eb, (idx + 1) * eb, loc, blk, gen)
		}

		other => Err(CompileError::typ(
			other.loc(),
			"expression is not supported in circuit lowering",
		)),
	}
}

fn fold_index(
	ast: &Ast,
	block: BlockId,
	ctx: &Codegen,
	gen: &mut Generator,
	loc: &Point,
) -> Result<i64> {
	let Some(v) = eval_in_block(ast, block, ctx, gen)? else {
		return Err(CompileError::constant(loc, "non-constant index"));
	};
	v.const_index()
		.ok_or_else(|| CompileError::constant(loc, "non-integer index"))
}

fn lower_slice(
	x: Variable,
	from: i64,
	to: i64,
	loc: &Point,
	block: BlockId,
	gen: &mut Generator,
) -> Result<(BlockId, Variable)> {
	if from < 0 || from >= to || to > i64::from(x.ty.bits) {
		return Err(CompileError::bounds(loc, from, to, x.ty.bits));
	}
	let out = gen.anon_var(TypeInfo::new(x.ty.kind, (to - from) as u32));
	let from = gen.constant(Const::I32(from as i32), TypeInfo::int32());
	let to = gen.constant(Const::I32(to as i32), TypeInfo::int32());
	gen.push_instr(block, Instr::Slice { x, from, to, out: out.clone() });
	Ok((block, out))
}

/// True when the operand is an untyped constant that adapts to the other
/// operand's kind.
fn adaptable(v: &Variable) -> bool {
	v.is_const && !v.ty.concrete()
}

fn operand_width(v: &Variable) -> u32 {
	if v.is_const { v.ty.min_bits } else { v.ty.bits }
}

fn lower_binary(
	op: BinaryOp,
	l: Variable,
	r: Variable,
	loc: &Point,
	block: BlockId,
	gen: &mut Generator,
) -> Result<(BlockId, Variable)> {
	let kind = if adaptable(&l) && !adaptable(&r) {
		r.ty.kind
	} else if !adaptable(&l) && adaptable(&r) {
		l.ty.kind
	} else if l.ty.kind == r.ty.kind {
		l.ty.kind
	} else {
		return Err(CompileError::typ(
			loc,
			format!("invalid operation: mismatched types {} and {}", l.ty, r.ty),
		));
	};
	let signed = kind == TypeKind::Int;
	let int_kind = matches!(kind, TypeKind::Int | TypeKind::Uint);
	let bits = operand_width(&l).max(operand_width(&r));

	use BinaryOp as B;
	let (out, instr) = match op {
		B::Add | B::Sub | B::Mul | B::Div | B::Mod | B::Band | B::Bclr | B::Bor | B::Bxor => {
			if !int_kind {
				return Err(CompileError::typ(
					loc,
					format!("invalid operation: {op} on {kind} operands"),
				));
			}
			let out = gen.anon_var(TypeInfo::new(kind, bits));
			let (x, y, o) = (l, r, out.clone());
			let instr = match (op, signed) {
				(B::Add, true) => Instr::Iadd { x, y, out: o },
				(B::Add, false) => Instr::Uadd { x, y, out: o },
				(B::Sub, true) => Instr::Isub { x, y, out: o },
				(B::Sub, false) => Instr::Usub { x, y, out: o },
				(B::Mul, true) => Instr::Imul { x, y, out: o },
				(B::Mul, false) => Instr::Umul { x, y, out: o },
				(B::Div, true) => Instr::Idiv { x, y, out: o },
				(B::Div, false) => Instr::Udiv { x, y, out: o },
				(B::Mod, true) => Instr::Imod { x, y, out: o },
				(B::Mod, false) => Instr::Umod { x, y, out: o },
				(B::Band, _) => Instr::Band { x, y, out: o },
				(B::Bclr, _) => Instr::Bclr { x, y, out: o },
				(B::Bor, _) => Instr::Bor { x, y, out: o },
				(B::Bxor, _) => Instr::Bxor { x, y, out: o },
				_ => unreachable!(),
			};
			(out, instr)
		}
		B::Lt | B::Le | B::Gt | B::Ge => {
			if !int_kind {
				return Err(CompileError::typ(
					loc,
					format!("invalid operation: {op} on {kind} operands"),
				));
			}
			let out = gen.anon_var(TypeInfo::bool());
			let (x, y, o) = (l, r, out.clone());
			let instr = match (op, signed) {
				(B::Lt, true) => Instr::Ilt { x, y, out: o },
				(B::Lt, false) => Instr::Ult { x, y, out: o },
				(B::Le, true) => Instr::Ile { x, y, out: o },
				(B::Le, false) => Instr::Ule { x, y, out: o },
				(B::Gt, true) => Instr::Igt { x, y, out: o },
				(B::Gt, false) => Instr::Ugt { x, y, out: o },
				(B::Ge, true) => Instr::Ige { x, y, out: o },
				(B::Ge, false) => Instr::Uge { x, y, out: o },
				_ => unreachable!(),
			};
			(out, instr)
		}
		B::Eq | B::Neq => {
			let out = gen.anon_var(TypeInfo::bool());
			let (x, y, o) = (l, r, out.clone());
			let instr = if op == B::Eq {
				Instr::Eq { x, y, out: o }
			} else {
				Instr::Neq { x, y, out: o }
			};
			(out, instr)
		}
		B::And | B::Or => {
			if kind != TypeKind::Bool {
				return Err(CompileError::typ(
					loc,
					format!("invalid operation: {op} on {kind} operands"),
				));
			}
			let out = gen.anon_var(TypeInfo::bool());
			let (x, y, o) = (l, r, out.clone());
			let instr = if op == B::And {
				Instr::And { x, y, out: o }
			} else {
				Instr::Or { x, y, out: o }
			};
			(out, instr)
		}
		B::Lshift | B::Rshift => {
			if !int_kind {
				return Err(CompileError::typ(
					loc,
					format!("invalid operation: {op} on {kind} operands"),
				));
			}
			if !r.is_const {
				return Err(CompileError::constant(loc, "non-constant shift count"));
			}
			let out = gen.anon_var(TypeInfo::new(kind, operand_width(&l)));
			let o = out.clone();
			let instr = if op == B::Lshift {
				Instr::Lshift { x: l, count: r, out: o }
			} else {
				Instr::Rshift { x: l, count: r, out: o }
			};
			(out, instr)
		}
	};
	gen.push_instr(block, instr);
	Ok((block, out))
}

fn lower_unary(
	op: UnaryOp,
	value: Variable,
	loc: &Point,
	block: BlockId,
	gen: &mut Generator,
) -> Result<(BlockId, Variable)> {
	match op {
		UnaryOp::Not => {
			if value.ty.kind != TypeKind::Bool {
				return Err(CompileError::typ(loc, format!("invalid operation: !{}", value.ty)));
			}
			let one = gen.constant(Const::Bool(true), TypeInfo::bool());
			gen.add_constant(&one);
			let out = gen.anon_var(TypeInfo::bool());
			gen.push_instr(block, Instr::Bxor {
				x: value,
				y: one,
				out: out.clone(),
			});
			Ok((block, out))
		}
		UnaryOp::Minus => {
			let ty = value.ty.clone();
			let zero = gen.constant(Const::Mpa(mpa::Int::from_i64(0)), ty.clone());
			gen.add_constant(&zero);
			let out = gen.anon_var(ty);
			let instr = if value.ty.is_signed() {
				Instr::Isub { x: zero, y: value, out: out.clone() }
			} else {
				Instr::Usub { x: zero, y: value, out: out.clone() }
			};
			gen.push_instr(block, instr);
			Ok((block, out))
		}
	}
}
