//! Forward must-initialize analysis over locals. The fixpoint runs with a
//! silent transfer; one reporting sweep over the converged in-states emits
//! each finding exactly once.

use crate::ast::*;
use crate::cfg::Cfg;
use crate::dataflow::{self, DataflowProblem};
use crate::diagnostics::{DiagBag, Level};
use crate::passes::{FunctionPass, PassResult};
use std::collections::HashMap;

type InitSet = HashMap<String, bool>;

#[derive(Default)]
pub struct DefiniteInit;

impl DefiniteInit {
    pub fn new() -> Self {
        Self::default()
    }
}

struct Problem<'f> {
    f: &'f FunDecl,
}

impl<'f> DataflowProblem for Problem<'f> {
    type State = InitSet;

    // all-true is the neutral element of the pointwise AND meet
    fn bottom(&self) -> InitSet {
        let mut s = InitSet::new();
        for p in &self.f.params {
            s.insert(p.name.name.clone(), true);
        }
        for sy in &self.f.syms {
            s.insert(sy.name.name.clone(), true);
        }
        for l in &self.f.lets {
            s.insert(l.name.name.clone(), true);
        }
        s
    }

    fn entry_state(&self) -> InitSet {
        let mut s = InitSet::new();
        for p in &self.f.params {
            s.insert(p.name.name.clone(), true);
        }
        for sy in &self.f.syms {
            s.insert(sy.name.name.clone(), true);
        }
        for l in &self.f.lets {
            let initialized = matches!(&l.init, Some(iv) if !iv.is_undef());
            s.insert(l.name.name.clone(), initialized);
        }
        s
    }

    fn meet(&self, lhs: &InitSet, rhs: &InitSet) -> InitSet {
        let mut r = InitSet::new();
        for (key, val) in lhs {
            let both = *val && rhs.get(key).copied().unwrap_or(true);
            r.insert(key.clone(), both);
        }
        r
    }

    fn transfer(&mut self, block: &Block, input: &InitSet) -> InitSet {
        walk_block(block, input, &mut None)
    }

    fn equal(&self, lhs: &InitSet, rhs: &InitSet) -> bool {
        lhs == rhs
    }
}

fn report(state: &InitSet, name: &str, span: SourceSpan, diags: &mut Option<&mut DiagBag>) {
    if state.get(name) == Some(&false) {
        if let Some(diags) = diags {
            diags.error(format!("Read of possibly uninitialized local: {}", name), span);
        }
    }
}

fn walk_lvalue(lv: &LValue, state: &InitSet, diags: &mut Option<&mut DiagBag>) {
    report(state, &lv.base.name, lv.base.span, diags);
    walk_indices(lv, state, diags);
}

fn walk_indices(lv: &LValue, state: &InitSet, diags: &mut Option<&mut DiagBag>) {
    for acc in &lv.accesses {
        if let Access::Index(ai) = acc {
            if let Index::Id(LocalOrSym::Local(lid)) = &ai.index {
                report(state, &lid.name, lid.span, diags);
            }
        }
    }
}

fn walk_coef(c: &Coef, state: &InitSet, diags: &mut Option<&mut DiagBag>) {
    if let Coef::Id(LocalOrSym::Local(lid)) = c {
        report(state, &lid.name, lid.span, diags);
    }
}

fn walk_select_val(sv: &SelectVal, state: &InitSet, diags: &mut Option<&mut DiagBag>) {
    match sv {
        SelectVal::RVal(rv) => walk_lvalue(rv, state, diags),
        SelectVal::Coef(c)  => walk_coef(c, state, diags),
    }
}

fn walk_atom(a: &Atom, state: &InitSet, diags: &mut Option<&mut DiagBag>) {
    match &a.kind {
        AtomKind::Op(op) => {
            walk_coef(&op.coef, state, diags);
            match &op.rhs {
                OpOperand::RVal(rv) => walk_lvalue(rv, state, diags),
                OpOperand::Coef(c)  => walk_coef(c, state, diags),
            }
        }
        AtomKind::Select(sel) => {
            walk_expr(&sel.cond.lhs, state, diags);
            walk_expr(&sel.cond.rhs, state, diags);
            walk_select_val(&sel.vtrue, state, diags);
            walk_select_val(&sel.vfalse, state, diags);
        }
        AtomKind::Coef(c) => walk_coef(&c.coef, state, diags),
        AtomKind::RVal(rv) => walk_lvalue(&rv.rval, state, diags),
        AtomKind::Cast(cast) => {
            if let CastSrc::LVal(lv) = &cast.src {
                walk_lvalue(lv, state, diags);
            }
        }
        AtomKind::Unary(u) => walk_lvalue(&u.rval, state, diags),
    }
}

fn walk_expr(e: &Expr, state: &InitSet, diags: &mut Option<&mut DiagBag>) {
    walk_atom(&e.first, state, diags);
    for t in &e.rest {
        walk_atom(&t.atom, state, diags);
    }
}

fn walk_cond(c: &Cond, state: &InitSet, diags: &mut Option<&mut DiagBag>) {
    walk_expr(&c.lhs, state, diags);
    walk_expr(&c.rhs, state, diags);
}

fn walk_block(b: &Block, input: &InitSet, diags: &mut Option<&mut DiagBag>) -> InitSet {
    let mut state = input.clone();
    for ins in &b.instrs {
        match ins {
            Instr::Assign(a) => {
                walk_expr(&a.rhs, &state, diags);
                walk_indices(&a.lhs, &state, diags);
                state.insert(a.lhs.base.name.clone(), true);
            }
            Instr::Assume(a)    => walk_cond(&a.cond, &state, diags),
            Instr::Require(r)   => walk_cond(&r.cond, &state, diags),
        }
    }
    match &b.term {
        Terminator::CondBr { cond, .. }         => walk_cond(cond, &state, diags),
        Terminator::Ret { value: Some(e), .. }  => walk_expr(e, &state, diags),
        _ => {}
    }
    state
}

impl FunctionPass for DefiniteInit {
    fn name(&self) -> &'static str {
        "definite-init"
    }

    fn run(&mut self, f: &FunDecl, diags: &mut DiagBag) -> PassResult {
        let errors_before = diags.diags.iter().filter(|d| d.level == Level::Error).count();
        let cfg = Cfg::build(f, diags);
        let errors_now = diags.diags.iter().filter(|d| d.level == Level::Error).count();
        if errors_now > errors_before {
            return PassResult::Error;
        }

        let mut problem = Problem { f };
        let res = dataflow::solve(f, &cfg, &mut problem);

        for (i, b) in f.blocks.iter().enumerate() {
            let mut sink = Some(&mut *diags);
            walk_block(b, &res.input[i], &mut sink);
        }

        let errors_after = diags.diags.iter().filter(|d| d.level == Level::Error).count();
        if errors_after > errors_before {
            PassResult::Error
        } else {
            PassResult::Success
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    fn run(src: &str) -> (PassResult, Vec<String>) {
        let prog = parse_source(src).unwrap();
        let mut diags = DiagBag::new();
        let r = DefiniteInit::new().run(&prog.funs[0], &mut diags);
        (r, diags.diags.into_iter().map(|d| d.message).collect())
    }

    #[test]
    fn init_on_one_branch_only() {
        let (r, msgs) = run(
            "fun @g(%c: i32): i32 { let mut %x: i32; \
             ^entry: br %c == 0, ^t, ^f; \
             ^t: %x = 1; br ^join; \
             ^f: br ^join; \
             ^join: ret %x; }",
        );
        assert_eq!(r, PassResult::Error);
        assert_eq!(msgs, vec!["Read of possibly uninitialized local: %x"]);
    }

    #[test]
    fn init_on_both_branches_is_fine() {
        let (r, msgs) = run(
            "fun @g(%c: i32): i32 { let mut %x: i32; \
             ^entry: br %c == 0, ^t, ^f; \
             ^t: %x = 1; br ^join; \
             ^f: %x = 2; br ^join; \
             ^join: ret %x; }",
        );
        assert_eq!(r, PassResult::Success);
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn undef_initializer_still_counts_as_uninitialized() {
        let (r, msgs) = run(
            "fun @g(): i32 { let mut %x: i32 = undef; ^entry: ret %x; }",
        );
        assert_eq!(r, PassResult::Error);
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn params_and_syms_start_initialized() {
        let (r, msgs) = run(
            "fun @g(%p: i32): i32 { sym %?s: value i32; ^entry: ret %p + %?s; }",
        );
        assert_eq!(r, PassResult::Success);
        assert!(msgs.is_empty(), "{:?}", msgs);
    }

    #[test]
    fn read_before_write_in_same_block() {
        let (r, msgs) = run(
            "fun @g(): i32 { let mut %x: i32; ^entry: %x = %x + 1; ret %x; }",
        );
        assert_eq!(r, PassResult::Error);
        assert_eq!(msgs.len(), 1);
    }

    #[test]
    fn uninitialized_index_local_is_flagged() {
        let (r, msgs) = run(
            "fun @g(): i32 { let mut %i: i32; let mut %arr: [4] i32 = 0; \
             ^entry: %arr[%i] = 1; ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        assert_eq!(msgs, vec!["Read of possibly uninitialized local: %i"]);
    }

    #[test]
    fn loop_assignment_does_not_leak_backwards() {
        // the loop body initializes %x, but the path entry -> head -> done
        // never does, so the read in ^done must still be flagged
        let (r, msgs) = run(
            "fun @g(%c: i32): i32 { let mut %x: i32; \
             ^entry: br ^head; \
             ^head: br %c == 0, ^body, ^done; \
             ^body: %x = 1; br ^head; \
             ^done: ret %x; }",
        );
        assert_eq!(r, PassResult::Error);
        assert_eq!(msgs, vec!["Read of possibly uninitialized local: %x"]);
    }

    #[test]
    fn errors_are_not_duplicated_by_fixpoint_sweeps() {
        let (_r, msgs) = run(
            "fun @g(%c: i32): i32 { let mut %x: i32; \
             ^entry: br ^head; \
             ^head: br %c == 0, ^body, ^done; \
             ^body: br ^head; \
             ^done: ret %x; }",
        );
        assert_eq!(msgs.len(), 1, "{:?}", msgs);
    }
}
