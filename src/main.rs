use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use diylang::{Environment, interpret_each, read_source};
use tracing::info;

/// Runs DIY Lang source files, printing the value of each top-level expression.
#[derive(Parser, Debug)]
#[command(name = "diylang", version)]
struct Args {
    /// Files to run, in order, in one shared environment
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Start from an empty environment instead of loading the prelude
    #[arg(long)]
    no_prelude: bool,

    /// Do not print expression values
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let env = if args.no_prelude {
        Environment::new()
    } else {
        match Environment::new_global_populated() {
            Ok(env) => env,
            Err(e) => {
                eprintln!("Failed to load prelude: {}", e);
                return ExitCode::FAILURE;
            }
        }
    };

    for path in &args.files {
        info!(file = %path.display(), "running");
        let source = match read_source(path) {
            Ok(source) => source,
            Err(e) => {
                eprintln!("Error: {}", e);
                return ExitCode::FAILURE;
            }
        };

        // Values are printed as they come, up to the first failing expression
        let result = interpret_each(&source, &env, |value| {
            if !args.quiet {
                println!("{}", value);
            }
        });
        if let Err(e) = result {
            let source_id = path.display().to_string();
            if e.pretty_print(&source_id, &source).is_err() {
                eprintln!("Error: {}", e);
            }
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
