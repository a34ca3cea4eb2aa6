//! Indexed control-flow graph over a function's basic blocks.

use crate::ast::{FunDecl, SourceSpan, Terminator};
use crate::diagnostics::DiagBag;
use std::collections::HashMap;

#[derive(Default)]
pub struct Cfg {
    /// Block labels in declaration order, one entry per block.
    pub blocks:     Vec<String>,
    /// Label to index. Duplicate labels keep the first index.
    pub index_of:   HashMap<String, usize>,
    pub succ:       Vec<Vec<usize>>,
    pub pred:       Vec<Vec<usize>>,
    pub entry:      usize,
}

impl Cfg {
    pub fn build(f: &FunDecl, diags: &mut DiagBag) -> Cfg {
        let mut g = Cfg::default();

        if f.blocks.is_empty() {
            diags.error("Function has no blocks", f.span);
            return g;
        }

        for (i, b) in f.blocks.iter().enumerate() {
            if g.index_of.contains_key(&b.label.name) {
                diags.error(format!("Duplicate block label: {}", b.label.name), b.span);
            } else {
                g.index_of.insert(b.label.name.clone(), i);
            }
            g.blocks.push(b.label.name.clone());
        }

        g.succ = vec![Vec::new(); f.blocks.len()];
        g.pred = vec![Vec::new(); f.blocks.len()];

        g.entry = *g.index_of.get("^entry").unwrap_or(&0);

        for (i, b) in f.blocks.iter().enumerate() {
            match &b.term {
                Terminator::Br { dest, span } => {
                    g.add_edge(i, &dest.name, *span, diags);
                }
                Terminator::CondBr { then_label, else_label, span, .. } => {
                    g.add_edge(i, &then_label.name, *span, diags);
                    g.add_edge(i, &else_label.name, *span, diags);
                }
                Terminator::Ret { .. } | Terminator::Unreachable { .. } => {}
            }
        }

        g
    }

    fn add_edge(&mut self, from: usize, to: &str, span: SourceSpan, diags: &mut DiagBag) {
        match self.index_of.get(to) {
            Some(&dst) => {
                self.succ[from].push(dst);
                self.pred[dst].push(from);
            }
            None => diags.error(format!("Unknown block label: {}", to), span),
        }
    }

    /// Reverse postorder from the entry. Unreachable blocks are absent.
    pub fn rpo(&self) -> Vec<usize> {
        let mut order = Vec::new();
        if self.blocks.is_empty() {
            return order;
        }
        let mut visited = vec![false; self.blocks.len()];
        self.dfs(self.entry, &mut visited, &mut order);
        order.reverse();
        order
    }

    fn dfs(&self, u: usize, visited: &mut Vec<bool>, order: &mut Vec<usize>) {
        visited[u] = true;
        for &v in &self.succ[u] {
            if !visited[v] {
                self.dfs(v, visited, order);
            }
        }
        order.push(u);
    }
}
