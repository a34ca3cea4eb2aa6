//! Warns about parameters, symbols, and locals that nothing reads or
//! writes.

use crate::ast::*;
use crate::diagnostics::DiagBag;
use crate::passes::{FunctionPass, PassResult};
use std::collections::HashSet;

#[derive(Default)]
pub struct UnusedName;

impl UnusedName {
    pub fn new() -> Self {
        Self::default()
    }
}

fn collect_lvalue(lv: &LValue, used: &mut HashSet<String>) {
    used.insert(lv.base.name.clone());
    for acc in &lv.accesses {
        if let Access::Index(ai) = acc {
            if let Index::Id(id) = &ai.index {
                used.insert(id.name().to_string());
            }
        }
    }
}

fn collect_coef(c: &Coef, used: &mut HashSet<String>) {
    if let Coef::Id(id) = c {
        used.insert(id.name().to_string());
    }
}

fn collect_select_val(sv: &SelectVal, used: &mut HashSet<String>) {
    match sv {
        SelectVal::RVal(rv) => collect_lvalue(rv, used),
        SelectVal::Coef(c)  => collect_coef(c, used),
    }
}

fn collect_atom(a: &Atom, used: &mut HashSet<String>) {
    match &a.kind {
        AtomKind::Op(op) => {
            collect_coef(&op.coef, used);
            match &op.rhs {
                OpOperand::RVal(rv) => collect_lvalue(rv, used),
                OpOperand::Coef(c)  => collect_coef(c, used),
            }
        }
        AtomKind::Select(sel) => {
            collect_expr(&sel.cond.lhs, used);
            collect_expr(&sel.cond.rhs, used);
            collect_select_val(&sel.vtrue, used);
            collect_select_val(&sel.vfalse, used);
        }
        AtomKind::Coef(c) => collect_coef(&c.coef, used),
        AtomKind::RVal(rv) => collect_lvalue(&rv.rval, used),
        AtomKind::Cast(cast) => match &cast.src {
            CastSrc::LVal(lv)   => collect_lvalue(lv, used),
            CastSrc::Sym(s)     => {
                used.insert(s.name.clone());
            }
            CastSrc::Int(_) | CastSrc::Float(_) => {}
        },
        AtomKind::Unary(u) => collect_lvalue(&u.rval, used),
    }
}

fn collect_expr(e: &Expr, used: &mut HashSet<String>) {
    collect_atom(&e.first, used);
    for t in &e.rest {
        collect_atom(&t.atom, used);
    }
}

fn collect_cond(c: &Cond, used: &mut HashSet<String>) {
    collect_expr(&c.lhs, used);
    collect_expr(&c.rhs, used);
}

impl FunctionPass for UnusedName {
    fn name(&self) -> &'static str {
        "unused-name"
    }

    fn run(&mut self, f: &FunDecl, diags: &mut DiagBag) -> PassResult {
        let mut used = HashSet::new();

        for l in &f.lets {
            match &l.init {
                Some(InitVal::Sym(s))   => {
                    used.insert(s.name.clone());
                }
                Some(InitVal::Local(l)) => {
                    used.insert(l.name.clone());
                }
                _ => {}
            }
        }

        for b in &f.blocks {
            for ins in &b.instrs {
                match ins {
                    Instr::Assign(a) => {
                        collect_expr(&a.rhs, &mut used);
                        collect_lvalue(&a.lhs, &mut used);
                    }
                    Instr::Assume(a)    => collect_cond(&a.cond, &mut used),
                    Instr::Require(r)   => collect_cond(&r.cond, &mut used),
                }
            }
            match &b.term {
                Terminator::CondBr { cond, .. }         => collect_cond(cond, &mut used),
                Terminator::Ret { value: Some(e), .. }  => collect_expr(e, &mut used),
                _ => {}
            }
        }

        for p in &f.params {
            if !used.contains(&p.name.name) {
                diags.warn(format!("Unused parameter: {}", p.name.name), p.span);
            }
        }
        for s in &f.syms {
            if !used.contains(&s.name.name) {
                diags.warn(format!("Unused symbol: {}", s.name.name), s.span);
            }
        }
        for l in &f.lets {
            if !used.contains(&l.name.name) {
                diags.warn(format!("Unused local: {}", l.name.name), l.span);
            }
        }

        PassResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    fn warnings(src: &str) -> Vec<String> {
        let prog = parse_source(src).unwrap();
        let mut diags = DiagBag::new();
        UnusedName::new().run(&prog.funs[0], &mut diags);
        diags.diags.into_iter().map(|d| d.message).collect()
    }

    #[test]
    fn flags_all_three_kinds() {
        let w = warnings(
            "fun @f(%p: i32): i32 { sym %?s: value i32; let %l: i32 = 0; ^entry: ret 0; }",
        );
        assert_eq!(w.len(), 3);
        assert!(w[0].contains("Unused parameter: %p"));
        assert!(w[1].contains("Unused symbol: %?s"));
        assert!(w[2].contains("Unused local: %l"));
    }

    #[test]
    fn uses_through_indices_and_casts_count() {
        let w = warnings(
            "fun @f(%i: i32): i32 { sym %?s: value i64; \
             let mut %arr: [2] i32 = 0; \
             ^entry: %arr[%i] = %?s as i32; ret %arr[0]; }",
        );
        assert!(w.is_empty(), "unexpected warnings: {:?}", w);
    }

    #[test]
    fn initializer_reference_counts_as_use() {
        let w = warnings(
            "fun @f(): i32 { sym %?s: value i32; let %l: i32 = %?s; ^entry: ret %l; }",
        );
        assert!(w.is_empty(), "unexpected warnings: {:?}", w);
    }
}
