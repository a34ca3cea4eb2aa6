//! Structural checks that run before anything type-aware: global and
//! per-function name uniqueness, sigil scoping, non-empty bodies, and
//! well-formed symbol domains.

use crate::ast::{Domain, FunDecl, Program, StructDecl};
use crate::diagnostics::DiagBag;
use crate::passes::{ModulePass, PassResult};
use std::collections::HashSet;

#[derive(Default)]
pub struct SemChecker;

impl SemChecker {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_struct(&self, s: &StructDecl, diags: &mut DiagBag) {
        let mut fields = HashSet::new();
        for f in &s.fields {
            if !fields.insert(f.name.as_str()) {
                diags.error(format!("Duplicate field name: {}", f.name), f.span);
            }
        }
    }

    fn check_function(&self, f: &FunDecl, diags: &mut DiagBag) {
        if f.blocks.is_empty() {
            diags.error("Function must have at least one basic block", f.span);
        }

        // inside a function only %? symbols are legal
        for s in &f.syms {
            if s.name.name.starts_with("@?") {
                diags.error(
                    format!(
                        "Global symbol '{}' declared in local scope. Use '%?' for local symbols.",
                        s.name.name
                    ),
                    s.name.span,
                );
            }
        }

        let mut locals = HashSet::new();
        for p in &f.params {
            if !locals.insert(p.name.name.as_str()) {
                diags.error(format!("Duplicate parameter name: {}", p.name.name), p.span);
            }
        }
        for s in &f.syms {
            if !locals.insert(s.name.name.as_str()) {
                diags.error(format!("Duplicate name (symbol): {}", s.name.name), s.span);
            }
        }
        for l in &f.lets {
            if !locals.insert(l.name.name.as_str()) {
                diags.error(format!("Duplicate name (local): {}", l.name.name), l.span);
            }
        }

        let mut labels = HashSet::new();
        for b in &f.blocks {
            if !labels.insert(b.label.name.as_str()) {
                diags.error(format!("Duplicate block label: {}", b.label.name), b.label.span);
            }
        }

        for s in &f.syms {
            if let Some(Domain::Interval(iv)) = &s.domain {
                if iv.lo > iv.hi {
                    diags.error("Invalid symbol domain: lower bound > upper bound", iv.span);
                }
            }
        }
    }
}

impl ModulePass for SemChecker {
    fn name(&self) -> &'static str {
        "semck"
    }

    fn run(&mut self, prog: &Program, diags: &mut DiagBag) -> PassResult {
        let mut global_names = HashSet::new();

        for s in &prog.structs {
            if !global_names.insert(s.name.name.as_str()) {
                diags.error(
                    format!("Duplicate global name (struct): {}", s.name.name),
                    s.span,
                );
            }
            self.check_struct(s, diags);
        }
        for f in &prog.funs {
            if !global_names.insert(f.name.name.as_str()) {
                diags.error(
                    format!("Duplicate global name (function): {}", f.name.name),
                    f.span,
                );
            }
            self.check_function(f, diags);
        }

        if diags.has_errors() {
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

    fn run(src: &str) -> (PassResult, DiagBag) {
        let prog = parse_source(src).unwrap();
        let mut diags = DiagBag::new();
        let r = SemChecker::new().run(&prog, &mut diags);
        (r, diags)
    }

    #[test]
    fn accepts_plain_function() {
        let (r, diags) = run("fun @f(%a: i32): i32 { ^entry: ret %a; }");
        assert_eq!(r, PassResult::Success);
        assert!(diags.diags.is_empty());
    }

    #[test]
    fn duplicate_names() {
        let (r, diags) = run(
            "fun @f(%a: i32, %a: i32): i32 { let %a: i32 = 0; ^entry: ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        let msgs: Vec<_> = diags.diags.iter().map(|d| d.message.as_str()).collect();
        assert!(msgs.iter().any(|m| m.contains("Duplicate parameter name")));
        assert!(msgs.iter().any(|m| m.contains("Duplicate name (local)")));
    }

    #[test]
    fn empty_body() {
        let (r, diags) = run("fun @f(): i32 { }");
        assert_eq!(r, PassResult::Error);
        assert!(diags.diags[0].message.contains("at least one basic block"));
    }

    #[test]
    fn inverted_domain() {
        let (r, diags) = run(
            "fun @f(): i32 { sym %?x: value i32 in [5,1]; ^entry: ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
        assert!(diags.diags[0].message.contains("lower bound > upper bound"));
    }

    #[test]
    fn duplicate_globals() {
        let (r, _diags) = run(
            "struct @X { a: i32; } fun @X(): i32 { ^entry: ret 0; }",
        );
        assert_eq!(r, PassResult::Error);
    }
}
