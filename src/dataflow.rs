//! Generic iterative solver for forward dataflow problems.

use crate::ast::{Block, FunDecl};
use crate::cfg::Cfg;

/// A forward dataflow problem over a meet semilattice. `meet` must be
/// commutative, associative and idempotent, and `transfer` monotone, or
/// the solver is not guaranteed to converge.
pub trait DataflowProblem {
    type State: Clone;

    /// Lattice value non-entry blocks start from (the neutral element of
    /// `meet`).
    fn bottom(&self) -> Self::State;

    /// State at the start of the entry block.
    fn entry_state(&self) -> Self::State;

    fn meet(&self, lhs: &Self::State, rhs: &Self::State) -> Self::State;

    fn transfer(&mut self, block: &Block, input: &Self::State) -> Self::State;

    fn equal(&self, lhs: &Self::State, rhs: &Self::State) -> bool;
}

pub struct DataflowResult<S> {
    pub input:  Vec<S>,
    pub output: Vec<S>,
}

/// Sweep the blocks in reverse postorder until a full sweep changes no
/// out-state.
pub fn solve<P: DataflowProblem>(
    f: &FunDecl,
    cfg: &Cfg,
    problem: &mut P,
) -> DataflowResult<P::State> {
    let n = cfg.blocks.len();
    let mut res = DataflowResult {
        input:  vec![problem.bottom(); n],
        output: vec![problem.bottom(); n],
    };
    if n == 0 {
        return res;
    }

    res.input[cfg.entry] = problem.entry_state();

    let rpo = cfg.rpo();
    let mut changed = true;
    while changed {
        changed = false;
        for &idx in &rpo {
            if idx != cfg.entry && !cfg.pred[idx].is_empty() {
                let mut meet_state = res.output[cfg.pred[idx][0]].clone();
                for &p in &cfg.pred[idx][1..] {
                    meet_state = problem.meet(&meet_state, &res.output[p]);
                }
                res.input[idx] = meet_state;
            }
            let new_out = problem.transfer(&f.blocks[idx], &res.input[idx]);
            if !problem.equal(&res.output[idx], &new_out) {
                res.output[idx] = new_out;
                changed = true;
            }
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagBag;
    use crate::parse_source;

    /// Saturating counter lattice: bottom is the max, meet is min, the
    /// transfer decrements toward zero. Monotone and of finite height, so
    /// the solver must terminate even over the loop.
    struct Countdown {
        start: u32,
    }

    impl DataflowProblem for Countdown {
        type State = u32;

        fn bottom(&self) -> u32 {
            self.start
        }
        fn entry_state(&self) -> u32 {
            self.start
        }
        fn meet(&self, lhs: &u32, rhs: &u32) -> u32 {
            *lhs.min(rhs)
        }
        fn transfer(&mut self, _block: &Block, input: &u32) -> u32 {
            input.saturating_sub(1)
        }
        fn equal(&self, lhs: &u32, rhs: &u32) -> bool {
            lhs == rhs
        }
    }

    #[test]
    fn terminates_on_a_loop() {
        let prog = parse_source(
            "fun @f(%c: i32): i32 { \
             ^entry: br ^head; \
             ^head: br %c == 0, ^body, ^done; \
             ^body: br ^head; \
             ^done: ret 0; }",
        )
        .unwrap();
        let mut diags = DiagBag::new();
        let cfg = Cfg::build(&prog.funs[0], &mut diags);
        for start in [0u32, 1, 5, 64, 1000] {
            let mut p = Countdown { start };
            let res = solve(&prog.funs[0], &cfg, &mut p);
            // everything reachable drains to zero eventually
            assert_eq!(res.output[cfg.index_of["^body"]], 0);
            assert_eq!(res.output[cfg.index_of["^done"]], 0);
        }
    }

    #[test]
    fn straight_line_single_sweep() {
        let prog = parse_source(
            "fun @f(): i32 { ^entry: br ^next; ^next: ret 0; }",
        )
        .unwrap();
        let mut diags = DiagBag::new();
        let cfg = Cfg::build(&prog.funs[0], &mut diags);
        let mut p = Countdown { start: 3 };
        let res = solve(&prog.funs[0], &cfg, &mut p);
        assert_eq!(res.input[0], 3);
        assert_eq!(res.output[0], 2);
        assert_eq!(res.input[1], 2);
        assert_eq!(res.output[1], 1);
    }
}
