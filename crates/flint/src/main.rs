//! Command line interpreter for the flint scripting language.
//!
//! # Usage
//!
//! ```text
//! flint < program.fl              Run a program from standard input
//! flint --dump-ast < program.fl   Print the parsed AST instead of evaluating
//! ```
//!
//! `quit;` in the program exits with status 0. Parse and evaluation errors
//! are printed as `Error: <message>` and exit non-zero.

use std::io::Read;

use clap::Parser;
use flint_interop::host_registry;
use flint_parser::parse_program;
use flint_runtime::{EvalError, Evaluator};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "flint")]
#[command(author, version, about = "The flint scripting language", long_about = None)]
struct Cli {
    /// Print the parsed AST instead of evaluating the program
    #[arg(long)]
    dump_ast: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut source = String::new();
    std::io::stdin().read_to_string(&mut source)?;

    let program = parse_program(&source)?;
    if cli.dump_ast {
        println!("{program:#?}");
        return Ok(());
    }

    let evaluator = Evaluator::with_host(host_registry());
    match evaluator.run(&program) {
        Ok(()) => Ok(()),
        Err(EvalError::Quit) => std::process::exit(0),
        Err(e) => Err(Box::new(e)),
    }
}
