//! End-to-end pipeline scenarios: AST construction, constant folding, SSA
//! lowering, circuit generation and plaintext evaluation.
//!
//! The tokenizer and grammar are out of scope, so the source programs of
//! each scenario are built as trees directly.

use mpcl_circuit::{Circuit, TypeInfo};
use mpcl_compiler::{
	Params, Point,
	ast::{self, Ast, BinaryOp, Codegen, Func, FuncParam},
	mpa,
	ssa::{Const, Generator, Program},
};
use num_bigint::BigInt;
use rand::{Rng, SeedableRng, rngs::StdRng};

fn loc() -> Point {
	Point::new("test.mpcl", 1, 1)
}

fn lit(v: i64) -> Ast {
	Ast::BasicLit {
		value: Const::Mpa(mpa::Int::new(v)),
		loc: loc(),
	}
}

fn strlit(s: &str) -> Ast {
	Ast::BasicLit {
		value: Const::Str(s.into()),
		loc: loc(),
	}
}

fn var(name: &str) -> Ast {
	Ast::VariableRef {
		name: name.into(),
		loc: loc(),
	}
}

fn bin(op: BinaryOp, l: Ast, r: Ast) -> Ast {
	Ast::Binary {
		op,
		left: Box::new(l),
		right: Box::new(r),
		loc: loc(),
	}
}

fn call(name: &str, args: Vec<Ast>) -> Ast {
	Ast::Call {
		name: name.into(),
		args,
		loc: loc(),
	}
}

fn ret(exprs: Vec<Ast>) -> Ast {
	Ast::Return { exprs, loc: loc() }
}

fn assign(name: &str, expr: Ast, define: bool) -> Ast {
	Ast::Assign {
		lvalues: vec![var(name)],
		exprs: vec![expr],
		define,
		loc: loc(),
	}
}

fn func(params: &[(&str, TypeInfo)], ret_types: &[TypeInfo], body: Vec<Ast>) -> Func {
	Func {
		name: "f".into(),
		params: params
			.iter()
			.map(|(name, ty)| FuncParam {
				name: (*name).into(),
				ty: ty.clone(),
			})
			.collect(),
		ret: ret_types.to_vec(),
		body,
		loc: loc(),
	}
}

fn lower(f: &Func, params: &Params, source: &str) -> Program {
	let mut gen = Generator::new();
	let mut ctx = Codegen::new(params, source);
	ast::ssa_func(f, &mut ctx, &mut gen).expect("ssa lowering")
}

fn compile_with(f: &Func, params: &mut Params, source: &str) -> Circuit {
	let prog = lower(f, params, source);
	prog.compile_circuit(params).expect("circuit generation")
}

fn compile(f: &Func) -> Circuit {
	let mut params = Params::default();
	compile_with(f, &mut params, "test.mpcl")
}

fn eval(circ: &Circuit, inputs: &[i64]) -> Vec<u64> {
	let inputs: Vec<BigInt> = inputs.iter().map(|&v| BigInt::from(v)).collect();
	circ.eval(&inputs)
		.expect("circuit evaluation")
		.into_iter()
		.map(|v| u64::try_from(v).expect("output fits u64"))
		.collect()
}

// S1: adder correctness, uint8 wrap-around.
#[test]
fn adder_wraps_modulo_256() {
	let f = func(
		&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![bin(BinaryOp::Add, var("a"), var("b"))])],
	);
	let circ = compile(&f);
	assert_eq!(eval(&circ, &[200, 100]), vec![44]);

	let mut rng = StdRng::seed_from_u64(7);
	for _ in 0..64 {
		let (a, b) = (rng.random_range(0..256i64), rng.random_range(0..256i64));
		assert_eq!(eval(&circ, &[a, b]), vec![((a + b) % 256) as u64], "{a}+{b}");
	}
}

// S2: signed division and remainder sign rules.
#[test]
fn signed_division_sign_rules() {
	let f = func(
		&[("x", TypeInfo::int(8)), ("y", TypeInfo::int(8))],
		&[TypeInfo::int(8), TypeInfo::int(8)],
		vec![ret(vec![
			bin(BinaryOp::Div, var("x"), var("y")),
			bin(BinaryOp::Mod, var("x"), var("y")),
		])],
	);
	let circ = compile(&f);
	// -7 / 2 = -3 rem -1.
	assert_eq!(eval(&circ, &[-7, 2]), vec![0xfd, 0xff]);
	// 7 / -2 = -3 rem 1.
	assert_eq!(eval(&circ, &[7, -2]), vec![0xfd, 0x01]);
}

// S3: constant folding precedes lowering; x + 2*3 compiles like x + 6.
#[test]
fn constant_folding_precedes_lowering() {
	let params = Params::default();
	let folded = func(
		&[("x", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![bin(
			BinaryOp::Add,
			var("x"),
			bin(BinaryOp::Mul, lit(2), lit(3)),
		)])],
	);
	let direct = func(
		&[("x", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![bin(BinaryOp::Add, var("x"), lit(6))])],
	);

	let prog = lower(&folded, &params, "test.mpcl");
	let opcodes: Vec<&str> = prog.steps.iter().map(|s| s.opcode()).collect();
	assert!(!opcodes.contains(&"umul"), "multiplication must fold away: {opcodes:?}");
	assert_eq!(opcodes.iter().filter(|&&op| op == "uadd").count(), 1);

	let mut params = Params::default();
	let c1 = compile_with(&folded, &mut params, "test.mpcl");
	let c2 = compile_with(&direct, &mut params, "test.mpcl");
	assert_eq!(c1.num_gates, c2.num_gates);
	assert_eq!(eval(&c1, &[10]), vec![16]);
}

// S4: native circuit splice.
#[test]
fn native_circuit_splice() {
	let dir = tempfile::tempdir().expect("tempdir");
	let child_text = "8 24\n2 8 8\n1 8\n\
		2 1 0 8 16 XOR\n2 1 1 9 17 XOR\n2 1 2 10 18 XOR\n2 1 3 11 19 XOR\n\
		2 1 4 12 20 XOR\n2 1 5 13 21 XOR\n2 1 6 14 22 XOR\n2 1 7 15 23 XOR\n";
	std::fs::write(dir.path().join("child.circ"), child_text).expect("write child.circ");
	let source = dir.path().join("main.mpcl");

	let parent = func(
		&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![call("native", vec![
			strlit("child.circ"),
			var("a"),
			var("b"),
		])])],
	);
	let mut params = Params::default();
	let circ = compile_with(&parent, &mut params, source.to_str().unwrap());
	assert_eq!(eval(&circ, &[0x55, 0xaa]), vec![0xff]);

	// The spliced circuit adds exactly the child's gates on top of an
	// identity function over one uint8.
	let identity = func(
		&[("a", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![var("a")])],
	);
	let identity_gates = compile(&identity).num_gates;
	assert_eq!(circ.num_gates, identity_gates + 8);
}

// S4 argument-count policy: too few and too many are distinct errors.
#[test]
fn native_argument_count_errors() {
	let dir = tempfile::tempdir().expect("tempdir");
	let child_text = "1 3\n2 1 1\n1 1\n2 1 0 1 2 XOR\n";
	std::fs::write(dir.path().join("two_in.circ"), child_text).expect("write circuit");
	let source = dir.path().join("main.mpcl");

	for (args, needle) in [
		(vec![strlit("two_in.circ"), var("a")], "not enough"),
		(
			vec![strlit("two_in.circ"), var("a"), var("a"), var("a")],
			"too many",
		),
	] {
		let f = func(
			&[("a", TypeInfo::uint(1))],
			&[TypeInfo::uint(1)],
			vec![ret(vec![call("native", args)])],
		);
		let params = Params::default();
		let mut gen = Generator::new();
		let mut ctx = Codegen::new(&params, source.to_str().unwrap());
		let err = ast::ssa_func(&f, &mut ctx, &mut gen).unwrap_err();
		assert!(err.to_string().contains(needle), "{err}");
	}
}

// S5: pruning removes dead gates without changing the function.
#[test]
fn pruning_is_a_functional_noop() {
	let build = |prune: bool| {
		let f = func(
			&[("a", TypeInfo::uint(8))],
			&[TypeInfo::uint(8)],
			vec![
				assign("_", bin(BinaryOp::Mul, var("a"), var("a")), true),
				ret(vec![bin(BinaryOp::Add, var("a"), lit(1))]),
			],
		);
		let mut params = Params {
			opt_prune_gates: prune,
			..Params::default()
		};
		compile_with(&f, &mut params, "test.mpcl")
	};
	let pruned = build(true);
	let unpruned = build(false);
	assert!(
		pruned.num_gates < unpruned.num_gates,
		"pruning must remove the dead multiplier ({} vs {})",
		pruned.num_gates,
		unpruned.num_gates
	);
	for a in 0..256i64 {
		assert_eq!(eval(&pruned, &[a]), eval(&unpruned, &[a]), "input {a}");
	}
}

// S6: hamming builtin.
#[test]
fn hamming_distance_of_uint16() {
	let f = func(
		&[("a", TypeInfo::uint(16)), ("b", TypeInfo::uint(16))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![call("hamming", vec![var("a"), var("b")])])],
	);
	let circ = compile(&f);
	assert_eq!(eval(&circ, &[0x00ff, 0xf00f]), vec![8]);
	assert_eq!(eval(&circ, &[0, 0]), vec![0]);
	assert_eq!(eval(&circ, &[0xffff, 0]), vec![16]);
}

// The hamming intrinsic is also reachable through native().
#[test]
fn native_hamming_intrinsic() {
	let f = func(
		&[("a", TypeInfo::uint(16)), ("b", TypeInfo::uint(16))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![call("native", vec![
			strlit("hamming"),
			var("a"),
			var("b"),
		])])],
	);
	let circ = compile(&f);
	assert_eq!(eval(&circ, &[0x00ff, 0xf00f]), vec![8]);
}

// Invariant 3: compilation is deterministic.
#[test]
fn compilation_is_deterministic() {
	let build = || {
		let f = func(
			&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
			&[TypeInfo::uint(8)],
			vec![ret(vec![bin(
				BinaryOp::Add,
				bin(BinaryOp::Mul, var("a"), var("b")),
				bin(BinaryOp::Div, var("a"), bin(BinaryOp::Add, var("b"), lit(1))),
			)])],
		);
		let circ = compile(&f);
		let mut bytes = Vec::new();
		circ.marshal(&mut bytes).expect("marshal");
		bytes
	};
	assert_eq!(build(), build());
}

// Invariants 1 and 2: wires are produced before use; outputs are each
// produced exactly once and occupy the top of the id range.
#[test]
fn wire_production_invariants() {
	let f = func(
		&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![bin(BinaryOp::Mul, var("a"), var("b"))])],
	);
	let circ = compile(&f);
	let n_in = circ.input_bits();
	let n_out = circ.output_bits();
	assert!(n_out > 0);

	let mut produced = vec![false; circ.num_wires as usize];
	for id in 0..n_in {
		produced[id as usize] = true;
	}
	for gate in &circ.gates {
		assert!(produced[gate.input0 as usize], "wire {} read before production", gate.input0);
		if let Some(in1) = gate.input1 {
			assert!(produced[in1 as usize], "wire {in1} read before production");
		}
		assert!(!produced[gate.output as usize], "wire {} produced twice", gate.output);
		produced[gate.output as usize] = true;
	}
	for id in circ.num_wires - n_out..circ.num_wires {
		assert!(produced[id as usize], "output wire {id} never produced");
	}
}

// Invariant 5: constant folding agrees with compiled-circuit evaluation.
#[test]
fn folding_matches_circuit_evaluation() {
	let f = func(
		&[("a", TypeInfo::int(16)), ("b", TypeInfo::int(16))],
		&[TypeInfo::int(16)],
		vec![ret(vec![bin(BinaryOp::Add, var("a"), var("b"))])],
	);
	let circ = compile(&f);
	let mut rng = StdRng::seed_from_u64(11);
	for _ in 0..32 {
		let (a, b) = (rng.random_range(-100..100i64), rng.random_range(-100..100i64));
		let mut x = mpa::Int::from_i64(a);
		x.set_type_size(16);
		let mut y = mpa::Int::from_i64(b);
		y.set_type_size(16);
		let folded = x.add(&y);
		let circuit_out = eval(&circ, &[a, b])[0];
		let folded_pattern = u64::try_from(folded.value() & &BigInt::from(0xffffu32))
			.expect("pattern fits");
		assert_eq!(folded_pattern, circuit_out, "{a}+{b}");
	}
}

// Invariant 6 at pipeline level: a compiled circuit survives both formats.
#[test]
fn compiled_circuit_roundtrips() {
	let f = func(
		&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![bin(BinaryOp::Add, var("a"), var("b"))])],
	);
	let circ = compile(&f);

	let mut bytes = Vec::new();
	circ.marshal(&mut bytes).expect("marshal mpclc");
	let parsed = Circuit::parse(&bytes[..]).expect("parse mpclc");
	assert_eq!(parsed, circ);
	assert_eq!(eval(&parsed, &[17, 25]), vec![42]);
}

// Oblivious control flow: both arms compile, a φ selects the result.
#[test]
fn if_lowers_to_phi() {
	let f = func(
		&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![
			assign("m", call("uint8", vec![lit(0)]), true),
			Ast::If {
				cond: Box::new(bin(BinaryOp::Gt, var("a"), var("b"))),
				then: vec![assign("m", var("a"), false)],
				els: vec![assign("m", var("b"), false)],
				loc: loc(),
			},
			ret(vec![var("m")]),
		],
	);
	let params = Params::default();
	let prog = lower(&f, &params, "test.mpcl");
	let opcodes: Vec<&str> = prog.steps.iter().map(|s| s.opcode()).collect();
	assert!(opcodes.contains(&"phi"), "{opcodes:?}");

	let circ = compile(&f);
	for (a, b) in [(3, 7), (7, 3), (200, 100), (5, 5), (0, 255)] {
		assert_eq!(eval(&circ, &[a, b]), vec![a.max(b) as u64], "max({a},{b})");
	}
}

// Constant-bound loops unroll into straight-line code.
#[test]
fn for_loop_unrolls() {
	let f = func(
		&[("a", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![
			assign("s", var("a"), true),
			Ast::For {
				init: Box::new(assign("i", lit(0), true)),
				cond: Box::new(bin(BinaryOp::Lt, var("i"), lit(3))),
				post: Box::new(assign("i", bin(BinaryOp::Add, var("i"), lit(1)), false)),
				body: vec![assign("s", bin(BinaryOp::Add, var("s"), var("a")), false)],
				loc: loc(),
			},
			ret(vec![var("s")]),
		],
	);
	let params = Params::default();
	let prog = lower(&f, &params, "test.mpcl");
	let adds = prog.steps.iter().filter(|s| s.opcode() == "uadd").count();
	assert_eq!(adds, 3, "three unrolled additions");

	let circ = compile(&f);
	assert_eq!(eval(&circ, &[7]), vec![28]);
	assert_eq!(eval(&circ, &[100]), vec![144]); // 400 mod 256
}

// Slices extract bit ranges; a shift by a constant is pure rewiring.
#[test]
fn slice_and_shift() {
	let f = func(
		&[("a", TypeInfo::uint(16))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![Ast::Slice {
			expr: Box::new(var("a")),
			from: Some(Box::new(lit(8))),
			to: Some(Box::new(lit(16))),
			loc: loc(),
		}])],
	);
	let circ = compile(&f);
	assert_eq!(eval(&circ, &[0xab_cd]), vec![0xab]);

	let f = func(
		&[("a", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![bin(BinaryOp::Rshift, var("a"), lit(4))])],
	);
	let circ = compile(&f);
	assert_eq!(eval(&circ, &[0xf3]), vec![0x0f]);
}

// Slice upper bounds beyond the operand width are compile-time errors.
#[test]
fn slice_out_of_bounds_is_rejected() {
	let f = func(
		&[("a", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![ret(vec![Ast::Slice {
			expr: Box::new(var("a")),
			from: Some(Box::new(lit(0))),
			to: Some(Box::new(lit(9))),
			loc: loc(),
		}])],
	);
	let params = Params::default();
	let mut gen = Generator::new();
	let mut ctx = Codegen::new(&params, "test.mpcl");
	let err = ast::ssa_func(&f, &mut ctx, &mut gen).unwrap_err();
	assert!(err.to_string().contains("slice bounds out of range"), "{err}");
}

// size() folds to the operand's declared width.
#[test]
fn size_builtin_folds() {
	let f = func(
		&[("a", TypeInfo::uint(16))],
		&[TypeInfo::uint(16)],
		vec![ret(vec![bin(
			BinaryOp::Add,
			var("a"),
			call("size", vec![var("a")]),
		)])],
	);
	let circ = compile(&f);
	assert_eq!(eval(&circ, &[100]), vec![116]);
}

// The bitwise and logical instruction families.
#[test]
fn bitwise_and_logical_families() {
	let f = func(
		&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
		&[
			TypeInfo::uint(8),
			TypeInfo::uint(8),
			TypeInfo::uint(8),
			TypeInfo::uint(8),
			TypeInfo::bool(),
		],
		vec![ret(vec![
			bin(BinaryOp::Band, var("a"), var("b")),
			bin(BinaryOp::Bor, var("a"), var("b")),
			bin(BinaryOp::Bxor, var("a"), var("b")),
			bin(BinaryOp::Bclr, var("a"), var("b")),
			bin(
				BinaryOp::And,
				bin(BinaryOp::Lt, var("a"), var("b")),
				bin(BinaryOp::Neq, var("b"), lit(0)),
			),
		])],
	);
	let circ = compile(&f);
	let out = eval(&circ, &[0b1100_1010, 0b1010_0110]);
	assert_eq!(out[0], 0b1000_0010);
	assert_eq!(out[1], 0b1110_1110);
	assert_eq!(out[2], 0b0110_1100);
	assert_eq!(out[3], 0b0100_1000);
	assert_eq!(out[4], 0); // a > b here
	let out = eval(&circ, &[3, 9]);
	assert_eq!(out[4], 1);
}

// GC hints are emitted for dead values and lower to nothing.
#[test]
fn gc_hints_are_noops() {
	let f = func(
		&[("a", TypeInfo::uint(8)), ("b", TypeInfo::uint(8))],
		&[TypeInfo::uint(8)],
		vec![
			assign("t", bin(BinaryOp::Mul, var("a"), var("b")), true),
			ret(vec![bin(BinaryOp::Add, var("t"), lit(1))]),
		],
	);
	let params = Params::default();
	let prog = lower(&f, &params, "test.mpcl");
	assert!(
		prog.steps.iter().any(|s| s.opcode() == "gc"),
		"liveness pass must mark dead values"
	);
	let circ = compile(&f);
	assert_eq!(eval(&circ, &[6, 7]), vec![43]);
}
