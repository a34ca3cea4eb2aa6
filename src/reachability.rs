//! Warns about basic blocks that no path from the entry can reach.

use crate::ast::FunDecl;
use crate::cfg::Cfg;
use crate::diagnostics::DiagBag;
use crate::passes::{FunctionPass, PassResult};
use std::collections::{HashSet, VecDeque};

#[derive(Default)]
pub struct Reachability;

impl Reachability {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FunctionPass for Reachability {
    fn name(&self) -> &'static str {
        "reachability"
    }

    fn run(&mut self, f: &FunDecl, diags: &mut DiagBag) -> PassResult {
        let cfg = Cfg::build(f, diags);
        if diags.has_errors() {
            return PassResult::Error;
        }

        let mut visited = HashSet::new();
        let mut worklist = VecDeque::new();
        worklist.push_back(cfg.entry);
        visited.insert(cfg.entry);

        while let Some(cur) = worklist.pop_front() {
            for &next in &cfg.succ[cur] {
                if visited.insert(next) {
                    worklist.push_back(next);
                }
            }
        }

        if visited.len() < cfg.blocks.len() {
            for i in 0..cfg.blocks.len() {
                if !visited.contains(&i) {
                    diags.warn(
                        format!("Unreachable basic block: {}", cfg.blocks[i]),
                        f.blocks[i].label.span,
                    );
                }
            }
        }

        PassResult::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    #[test]
    fn flags_dead_block() {
        let prog = parse_source(
            "fun @f(): i32 { ^entry: ret 0; ^dead: ret 1; }",
        )
        .unwrap();
        let mut diags = DiagBag::new();
        let r = Reachability::new().run(&prog.funs[0], &mut diags);
        assert_eq!(r, PassResult::Success);
        assert!(diags.has_warnings());
        assert!(diags.diags[0].message.contains("^dead"));
    }

    #[test]
    fn loop_is_reachable() {
        let prog = parse_source(
            "fun @f(%c: i32): i32 { \
             ^entry: br ^head; \
             ^head: br %c == 0, ^body, ^done; \
             ^body: br ^head; \
             ^done: ret 0; }",
        )
        .unwrap();
        let mut diags = DiagBag::new();
        Reachability::new().run(&prog.funs[0], &mut diags);
        assert!(!diags.has_warnings());
    }
}
