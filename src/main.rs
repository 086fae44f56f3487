use std::{
    io,
    path::{Path, PathBuf},
};

use clap::Parser;
use crtz::{
    assets::PictureSet, interpreter::DEFAULT_PLAYER, Debugger, Interpreter, RunOptions,
};
use miette::{IntoDiagnostic, Result};
use tracing::{debug, info, warn};

/// CRTZ - branching NPC dialogue scripts on the console
#[derive(Parser, Debug)]
#[command(name = "crtz")]
#[command(about = "Run a CRTZ dialogue script", long_about = None)]
struct Args {
    /// Pause before the first node and open the debugger prompt
    #[arg(long)]
    debug: bool,

    /// Name substituted for [@You] in dialogue text
    #[arg(long, default_value = DEFAULT_PLAYER)]
    player: String,

    /// Script to run
    script: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    use tracing_subscriber::{fmt, EnvFilter};

    // RUST_LOG controls verbosity, warnings only by default
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let source = crtz::load_script(&args.script).into_diagnostic()?;
    let parsed = crtz::parse(&source);
    for diagnostic in &parsed.diagnostics {
        eprintln!("{}", diagnostic);
    }

    let base = args.script.parent().unwrap_or(Path::new("."));
    for decl in &parsed.program.pictures {
        match PictureSet::load(decl, base) {
            Ok(set) => {
                eprintln!("{}", set);
                info!(name = %set.name, count = set.images.len(), "loaded picture folder");
                if set.images.len() as i64 > decl.size {
                    warn!(name = %set.name, size = decl.size, "picture folder holds more images than declared");
                }
            }
            Err(err) => eprintln!("{}", err),
        }
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut interpreter = Interpreter::new(&parsed.program, stdin.lock(), stdout.lock())
        .with_options(RunOptions {
            player_name: args.player,
        });
    if args.debug {
        interpreter.observe(Debugger::stepping());
    }

    let outcome = interpreter.run().into_diagnostic()?;
    debug!(?outcome, "run finished");

    Ok(())
}
