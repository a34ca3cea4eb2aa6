#[macro_use]
extern crate log;

pub mod ast;
pub mod cfg;
pub mod dataflow;
pub mod definite_init;
pub mod diagnostics;
pub mod emitter;
pub mod emitter_wat;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod passes;
pub mod pp;
pub mod reachability;
pub mod semck;
pub mod smt;
pub mod symbolic;
pub mod typeck;
pub mod types;
pub mod unused_name;

use std::fmt;

/// A fatal toolchain error: a message plus zero or more located details.
/// Non-fatal findings go through the diagnostics bag instead.
#[derive(Debug, Clone)]
pub struct Error {
    pub message: String,
    pub details: Vec<(ast::SourceSpan, String)>,
}

impl Error {
    pub fn new(message: String, details: Vec<(ast::SourceSpan, String)>) -> Self {
        Self { message, details }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)?;
        for (span, detail) in &self.details {
            write!(f, "\n  {}:{}: {}", span.begin.line, span.begin.col, detail)?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {}

/// Lex and parse a SymIR source text into a program.
pub fn parse_source(src: &str) -> Result<ast::Program, Error> {
    let toks = lexer::Lexer::new(src).lex_all()?;
    parser::Parser::new(toks).parse_program()
}

/// Run the default analysis pipeline over a program.
pub fn check_program(
    prog: &ast::Program,
    diags: &mut diagnostics::DiagBag,
) -> passes::PassResult {
    passes::default_pipeline().run(prog, diags)
}
