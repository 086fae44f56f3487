#![allow(dead_code)]

use crtz::{parse, store::Store, Diagnostic, Interpreter, Outcome, RunOptions};

pub struct Run {
    pub outcome: Outcome,
    pub output: String,
    pub store: Store,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn run_with(script: &str, input: &str, options: RunOptions) -> Run {
    let parsed = parse(script);
    assert!(parsed.diagnostics.is_empty(), "{:?}", parsed.diagnostics);

    let mut output = Vec::new();
    let (outcome, store, diagnostics) = {
        let mut interpreter = Interpreter::new(&parsed.program, input.as_bytes(), &mut output)
            .with_options(options);
        let outcome = interpreter.run().unwrap();
        (
            outcome,
            interpreter.store().clone(),
            interpreter.diagnostics().to_vec(),
        )
    };

    Run {
        outcome,
        output: String::from_utf8(output).unwrap(),
        store,
        diagnostics,
    }
}

pub fn run(script: &str, input: &str) -> Run {
    run_with(script, input, RunOptions::default())
}
