//! End-to-end frontend + analysis pipeline checks, no solver involved.

use symir::diagnostics::{DiagBag, Level};
use symir::passes::PassResult;

fn check(src: &str) -> (PassResult, DiagBag) {
    let prog = symir::parse_source(src).expect("source should parse");
    let mut diags = DiagBag::new();
    let r = symir::check_program(&prog, &mut diags);
    (r, diags)
}

fn messages(diags: &DiagBag) -> Vec<String> {
    diags.diags.iter().map(|d| d.message.clone()).collect()
}

#[test]
fn clean_program_passes_with_no_diagnostics() {
    let (r, diags) = check(
        "struct @Vec2 { x: i32; y: i32; } \
         fun @len2(%v: @Vec2): i32 { \
         let mut %t: i32 = 0; \
         let mut %acc: i32 = 0; \
         ^entry: %t = %v.x; %acc = %t * %t; \
         %t = %v.y; %acc = %acc + %t * %t; ret %acc; }",
    );
    assert_eq!(r, PassResult::Success);
    assert!(diags.diags.is_empty(), "{:?}", messages(&diags));
}

#[test]
fn literal_width_error_stops_the_pipeline() {
    let (r, diags) = check("fun @g(): i8 { let %x: i8 = 300; ^entry: ret %x; }");
    assert_eq!(r, PassResult::Error);
    let msgs = messages(&diags);
    assert!(
        msgs.iter().any(|m| m == "Literal 300 out of range for i8"),
        "{:?}",
        msgs
    );
}

#[test]
fn partial_initialization_is_reported_at_the_merge() {
    let (r, diags) = check(
        "fun @g(%c: i32): i32 { let mut %x: i32; \
         ^entry: br %c == 0, ^t, ^f; \
         ^t: %x = 1; br ^join; \
         ^f: br ^join; \
         ^join: ret %x; }",
    );
    assert_eq!(r, PassResult::Error);
    let msgs = messages(&diags);
    assert!(
        msgs.iter().any(|m| m == "Read of possibly uninitialized local: %x"),
        "{:?}",
        msgs
    );
}

#[test]
fn type_errors_suppress_later_function_passes() {
    // %dead would draw an unused-local warning, but the return width
    // error aborts the pipeline before that pass runs
    let (r, diags) = check(
        "fun @g(%a: i64): i32 { let %dead: i32 = 0; ^entry: ret %a; }",
    );
    assert_eq!(r, PassResult::Error);
    let msgs = messages(&diags);
    assert!(msgs.iter().any(|m| m.contains("Bitwidth mismatch")), "{:?}", msgs);
    assert!(!msgs.iter().any(|m| m.contains("Unused local")), "{:?}", msgs);
}

#[test]
fn warnings_do_not_fail_the_pipeline() {
    let (r, diags) = check(
        "fun @g(): i32 { ^entry: ret 0; ^dead: ret 1; }",
    );
    assert_eq!(r, PassResult::Success);
    assert!(diags.has_warnings());
    assert!(!diags.has_errors());
    let warn = diags
        .diags
        .iter()
        .find(|d| d.level == Level::Warning)
        .expect("one warning");
    assert!(warn.message.contains("Unreachable basic block: ^dead"));
}

#[test]
fn structural_errors_come_first() {
    let (r, diags) = check(
        "fun @g(): i32 { sym %?x: value i32 in [9,1]; ^entry: ret %?x; }",
    );
    assert_eq!(r, PassResult::Error);
    let msgs = messages(&diags);
    assert!(
        msgs.iter().any(|m| m.contains("lower bound > upper bound")),
        "{:?}",
        msgs
    );
}

#[test]
fn printed_programs_reparse_and_recheck() {
    let src = "struct @P { a: i32; bs: [2] i64; } \
               fun @f(%p: @P): i32 { sym %?k: value i32 in {1,2,3}; \
               let mut %x: i32 = %?k; \
               ^entry: %x = %x * 3; br %x > 3, ^hi, ^lo; \
               ^hi: ret %x; \
               ^lo: ret 0; }";
    let prog = symir::parse_source(src).unwrap();
    let printed = symir::pp::print_program(&prog, None);
    let (r, diags) = check(&printed);
    assert_eq!(r, PassResult::Success, "{:?}", messages(&diags));
}
