//! CRTZ: a small scripting language for branching NPC conversations.
//!
//! A script is lexed and parsed into a [`Program`](ast::Program) in one pass,
//! collecting [`Diagnostic`]s instead of stopping at the first problem. An
//! [`Interpreter`] then walks the node graph against a console.

use std::{
    fs,
    io::{BufRead, Write},
    path::Path,
};

pub mod assets;
pub mod ast;
pub mod common;
pub mod debugger;
pub mod expr;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod store;
pub mod token;

pub use common::{Diagnostic, Error};
pub use debugger::Debugger;
pub use interpreter::{Interpreter, Observer, Outcome, RunOptions};
pub use parser::{parse, Parsed};

pub fn load_script(path: impl AsRef<Path>) -> Result<String, Error> {
    let path = path.as_ref();
    fs::read_to_string(path).map_err(|source| Error::Load {
        path: path.to_path_buf(),
        source,
    })
}

/// Everything a finished run produced besides its console output.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub outcome: Outcome,
    pub parse_diagnostics: Vec<Diagnostic>,
    pub runtime_diagnostics: Vec<Diagnostic>,
}

/// Parses and runs `source` in one go.
pub fn run_source(
    source: &str,
    options: RunOptions,
    input: impl BufRead,
    output: impl Write,
) -> Result<Report, Error> {
    let Parsed {
        program,
        diagnostics,
    } = parse(source);

    let mut interpreter = Interpreter::new(&program, input, output).with_options(options);
    let outcome = interpreter.run()?;

    Ok(Report {
        outcome,
        parse_diagnostics: diagnostics,
        runtime_diagnostics: interpreter.diagnostics().to_vec(),
    })
}
