use anyhow::{Context, Result};
use log::info;

use crate::string_utils::size_to_str;

/// Run an extraction; returns false when per-file errors occurred.
pub fn run(opts: &gdeltar::ExtractOptions) -> Result<bool> {
    let progress = if opts.verbose {
        gdeltar::log_progress()
    } else {
        gdeltar::null_progress()
    };
    let result = gdeltar::decompress(opts, &progress).context("extraction failed")?;

    if !opts.quiet {
        info!("Files written: {}", result.files_written);
        info!("Bytes written: {}", size_to_str(result.total_bytes));
    }
    for err in &result.errors {
        eprintln!("error: {}", err);
    }
    Ok(result.errors.is_empty())
}
