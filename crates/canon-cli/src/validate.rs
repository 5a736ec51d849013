//! Validate a record on disk.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use canon_core::roles::Repository;
use canon_store::FilesystemStorage;

use crate::exit_codes;

#[derive(Args)]
pub struct ValidateArgs {
    /// Root of the canonical record to validate.
    #[arg(long, env = "CANON_RECORD")]
    pub record: PathBuf,
}

pub fn run(args: ValidateArgs) -> Result<i32> {
    let storage = FilesystemStorage::new(&args.record)
        .with_context(|| format!("cannot open record {}", args.record.display()))?;
    let repository =
        Repository::new(Arc::new(storage), Vec::new()).context("cannot open register")?;
    match repository.validate() {
        Ok(()) => {
            tracing::info!(record = %args.record.display(), "record is valid");
            Ok(exit_codes::OK)
        }
        Err(e) => {
            tracing::error!(error = %e, "record failed validation");
            Ok(exit_codes::INVALID)
        }
    }
}
