use clap::Parser;

mod backfill;
mod events;
mod exit_codes;
mod validate;

use backfill::BackfillArgs;
use validate::ValidateArgs;

/// Tools for maintaining an arXiv canonical record.
#[derive(Parser)]
#[command(name = "canon", version, about)]
enum Cli {
    /// Stream announcement events from an NDJSON file into a record.
    Backfill(BackfillArgs),
    /// Recompute and verify every checksum in a record.
    Validate(ValidateArgs),
}

fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let code = match Cli::parse() {
        Cli::Backfill(args) => backfill::run(args),
        Cli::Validate(args) => validate::run(args),
    };
    let code = match code {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:?}");
            exit_codes::FATAL
        }
    };
    std::process::exit(code);
}
