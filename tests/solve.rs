//! Solver-backed end-to-end scenarios. Every test skips quietly when no
//! SMT solver binary is on PATH.

use std::collections::HashMap;
use symir::interp::{Interpreter, RuntimeValue, SymBinding};
use symir::smt::SmtProcSolver;
use symir::symbolic::{Config, Executor, ModelValue, Outcome, Status};

macro_rules! require_solver {
    () => {
        if !SmtProcSolver::available() {
            eprintln!("skipping: no SMT solver on PATH");
            return;
        }
    };
}

fn solve(src: &str, fun: &str, path: &[&str], fixed: &[(&str, i64)]) -> Outcome {
    let prog = symir::parse_source(src).expect("source should parse");
    let mut diags = symir::diagnostics::DiagBag::new();
    assert_eq!(
        symir::check_program(&prog, &mut diags),
        symir::passes::PassResult::Success,
        "program should check: {:?}",
        diags.diags
    );
    let executor = Executor::new(&prog, Config::default());
    let path: Vec<String> = path.iter().map(|s| s.to_string()).collect();
    let fixed: HashMap<String, i64> =
        fixed.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    executor.solve(fun, &path, &fixed).expect("solve should not fail")
}

fn int_model(outcome: &Outcome, name: &str) -> i64 {
    match outcome.model.get(name) {
        Some(ModelValue::Int(i)) => *i,
        other => panic!("expected integer model for {}, got {:?}", name, other),
    }
}

#[test]
fn linear_requirement_pins_the_symbol() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?k: value i32; ^entry: require %?k * 3 == 42; ret %?k; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Sat);
    assert_eq!(int_model(&out, "%?k"), 14);
}

#[test]
fn bounds_check_narrows_the_domain() {
    require_solver!();
    let src = "fun @g(%i: i32): i32 { sym %?a: value i32 in [0,10]; \
               let mut %arr: [4] i32 = 0; \
               ^entry: %arr[%?a] = 1; ret %arr[0]; }";
    let out = solve(src, "@g", &["^entry"], &[]);
    assert_eq!(out.status, Status::Sat);
    let a = int_model(&out, "%?a");
    assert!((0..4).contains(&a), "in-bounds witness required, got {}", a);

    let out = solve(src, "@g", &["^entry"], &[("%?a", 5)]);
    assert_eq!(out.status, Status::Unsat);
}

#[test]
fn signed_overflow_makes_the_path_infeasible() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?x: value i32; let mut %y: i32 = 0; \
         ^entry: %y = %?x * 2; require %y > 2147483646; ret %y; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Unsat);
}

#[test]
fn symbolic_index_update_is_observed_by_later_reads() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?i: value i32 in [0,3]; \
         let mut %arr: [4] i32 = 0; \
         ^entry: %arr[%?i] = 7; require %arr[2] == 7; ret 0; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Sat);
    assert_eq!(int_model(&out, "%?i"), 2);
}

#[test]
fn branch_conditions_constrain_the_path() {
    require_solver!();
    let src = "fun @main(): i32 { sym %?k: value i32 in [0,100]; let mut %x: i32 = 0; \
               ^entry: br %?k > 50, ^hi, ^lo; \
               ^hi: %x = 1; br ^join; \
               ^lo: %x = 2; br ^join; \
               ^join: require %x == 1; ret %x; }";

    let out = solve(src, "@main", &["^entry", "^hi", "^join"], &[]);
    assert_eq!(out.status, Status::Sat);
    let k = int_model(&out, "%?k");
    assert!(k > 50, "the taken branch requires %?k > 50, got {}", k);

    // the other arm leaves %x = 2, which the requirement forbids
    let out = solve(src, "@main", &["^entry", "^lo", "^join"], &[]);
    assert_eq!(out.status, Status::Unsat);
}

#[test]
fn witnesses_replay_in_the_interpreter() {
    require_solver!();
    let src = "fun @main(): i32 { sym %?k: value i32 in [0,100]; let mut %x: i32 = 0; \
               ^entry: br %?k > 50, ^hi, ^lo; \
               ^hi: %x = 1; br ^join; \
               ^lo: %x = 2; br ^join; \
               ^join: require %x == 1; ret %x; }";
    let out = solve(src, "@main", &["^entry", "^hi", "^join"], &[]);
    assert_eq!(out.status, Status::Sat);
    let k = int_model(&out, "%?k");

    let prog = symir::parse_source(src).unwrap();
    let interp = Interpreter::new(&prog);
    let mut bindings = HashMap::new();
    bindings.insert("%?k".to_string(), SymBinding::Int(k));
    match interp.run("@main", &bindings) {
        Ok(Some(RuntimeValue::Int { value, .. })) => assert_eq!(value, 1),
        other => panic!("interpreter disagreed with the solver: {:?}", other),
    }
}

#[test]
fn fixing_symbols_is_monotone() {
    require_solver!();
    let src =
        "fun @g(): i32 { sym %?k: value i32; ^entry: require %?k * 3 == 42; ret %?k; }";
    let out = solve(src, "@g", &["^entry"], &[("%?k", 14)]);
    assert_eq!(out.status, Status::Sat);
    assert_eq!(int_model(&out, "%?k"), 14);

    let out = solve(src, "@g", &["^entry"], &[("%?k", 13)]);
    assert_eq!(out.status, Status::Unsat);
}

#[test]
fn disjoint_writes_commute() {
    require_solver!();
    let a = solve(
        "fun @g(): i32 { sym %?v: value i32; let mut %arr: [4] i32 = 0; \
         ^entry: %arr[1] = %?v; %arr[2] = 9; \
         require %arr[1] == 5; require %arr[2] == 9; ret 0; }",
        "@g",
        &["^entry"],
        &[],
    );
    let b = solve(
        "fun @g(): i32 { sym %?v: value i32; let mut %arr: [4] i32 = 0; \
         ^entry: %arr[2] = 9; %arr[1] = %?v; \
         require %arr[1] == 5; require %arr[2] == 9; ret 0; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(a.status, Status::Sat);
    assert_eq!(b.status, Status::Sat);
    assert_eq!(int_model(&a, "%?v"), int_model(&b, "%?v"));
}

#[test]
fn division_by_zero_is_encoded_as_infeasibility() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?d: value i32 in [0,0]; let mut %x: i32 = 10; \
         ^entry: %x = %x / %?d; ret %x; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Unsat);
}

#[test]
fn assumes_join_the_path_constraints() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?k: value i32; \
         ^entry: assume %?k > 10; assume %?k < 12; ret %?k; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Sat);
    assert_eq!(int_model(&out, "%?k"), 11);
}

#[test]
fn set_domains_enumerate_alternatives() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?k: value i32 in {3,5,9}; \
         ^entry: require %?k * %?k == 25; ret %?k; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Sat);
    assert_eq!(int_model(&out, "%?k"), 5);
}

#[test]
fn float_symbols_extract_through_bit_patterns() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?f: value f32; \
         ^entry: require %?f * 2.0 == 5.0; ret 0; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Sat);
    match out.model.get("%?f") {
        Some(ModelValue::Float(f)) => assert!((f - 2.5).abs() < 1e-6, "got {}", f),
        other => panic!("expected float model, got {:?}", other),
    }
}

#[test]
fn struct_fields_constrain_independently() {
    require_solver!();
    let out = solve(
        "struct @P { a: i32; b: i32; } \
         fun @g(): i32 { sym %?x: value i32; let mut %p: @P = 0; \
         ^entry: %p.a = %?x; %p.b = %?x + 1; \
         require %p.a == 4; require %p.b == 5; ret 0; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Sat);
    assert_eq!(int_model(&out, "%?x"), 4);
}

#[test]
fn overshift_is_infeasible() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?s: value i32 in [32,40]; let mut %x: i32 = 1; \
         ^entry: %x = %x << %?s; ret %x; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Unsat);
}

#[test]
fn unsatisfiable_requirements_on_undef_free_paths() {
    require_solver!();
    let out = solve(
        "fun @g(): i32 { sym %?k: value i8; \
         ^entry: require %?k > 126; require %?k < 127; ret 0; }",
        "@g",
        &["^entry"],
        &[],
    );
    assert_eq!(out.status, Status::Unsat);
}
