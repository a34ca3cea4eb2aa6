//! Pass orchestration: module passes run in registration order, function
//! passes are lifted to module passes, and the pipeline short-circuits on
//! the first pass that fails.

use crate::ast::{FunDecl, Program};
use crate::diagnostics::DiagBag;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PassResult {
    Success,
    Error,
}

pub trait ModulePass {
    fn name(&self) -> &'static str;
    fn run(&mut self, prog: &Program, diags: &mut DiagBag) -> PassResult;
}

pub trait FunctionPass {
    fn name(&self) -> &'static str;
    fn run(&mut self, fun: &FunDecl, diags: &mut DiagBag) -> PassResult;
}

struct LiftedFunctionPass<P: FunctionPass> {
    inner: P,
}

impl<P: FunctionPass> ModulePass for LiftedFunctionPass<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn run(&mut self, prog: &Program, diags: &mut DiagBag) -> PassResult {
        let mut failed = false;
        for f in &prog.funs {
            if self.inner.run(f, diags) == PassResult::Error {
                failed = true;
            }
        }
        if failed {
            PassResult::Error
        } else {
            PassResult::Success
        }
    }
}

#[derive(Default)]
pub struct PassManager {
    passes: Vec<Box<dyn ModulePass>>,
}

impl PassManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module_pass<P: ModulePass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    pub fn add_function_pass<P: FunctionPass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(LiftedFunctionPass { inner: pass }));
    }

    pub fn run(&mut self, prog: &Program, diags: &mut DiagBag) -> PassResult {
        for pass in &mut self.passes {
            debug!("running pass {}", pass.name());
            if pass.run(prog, diags) == PassResult::Error {
                return PassResult::Error;
            }
        }
        PassResult::Success
    }
}

/// The fixed default sequence.
pub fn default_pipeline() -> PassManager {
    let mut pm = PassManager::new();
    pm.add_module_pass(crate::semck::SemChecker::new());
    pm.add_module_pass(crate::typeck::TypeChecker::new());
    pm.add_function_pass(crate::reachability::Reachability::new());
    pm.add_function_pass(crate::definite_init::DefiniteInit::new());
    pm.add_function_pass(crate::unused_name::UnusedName::new());
    pm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_source;

    struct Fails;
    impl ModulePass for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }
        fn run(&mut self, _prog: &Program, diags: &mut DiagBag) -> PassResult {
            diags.error("boom", Default::default());
            PassResult::Error
        }
    }

    struct Counts(std::rc::Rc<std::cell::Cell<u32>>);
    impl FunctionPass for Counts {
        fn name(&self) -> &'static str {
            "counts"
        }
        fn run(&mut self, _fun: &FunDecl, _diags: &mut DiagBag) -> PassResult {
            self.0.set(self.0.get() + 1);
            PassResult::Success
        }
    }

    #[test]
    fn short_circuits_after_error() {
        let prog = parse_source(
            "fun @a(): i32 { ^entry: ret 0; } fun @b(): i32 { ^entry: ret 0; }",
        )
        .unwrap();
        let ran = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut pm = PassManager::new();
        pm.add_module_pass(Fails);
        pm.add_function_pass(Counts(ran.clone()));
        let mut diags = DiagBag::new();
        assert_eq!(pm.run(&prog, &mut diags), PassResult::Error);
        assert_eq!(ran.get(), 0);
    }

    #[test]
    fn function_pass_sees_every_function() {
        let prog = parse_source(
            "fun @a(): i32 { ^entry: ret 0; } fun @b(): i32 { ^entry: ret 0; }",
        )
        .unwrap();
        let ran = std::rc::Rc::new(std::cell::Cell::new(0));
        let mut pm = PassManager::new();
        pm.add_function_pass(Counts(ran.clone()));
        let mut diags = DiagBag::new();
        assert_eq!(pm.run(&prog, &mut diags), PassResult::Success);
        assert_eq!(ran.get(), 2);
    }
}
