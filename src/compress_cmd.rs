use anyhow::{Context, Result};
use log::info;

use crate::string_utils::{size_to_str, Ratio};

/// Run a compression; returns false when per-file errors occurred.
pub fn run(opts: &gdeltar::Options) -> Result<bool> {
    let progress = if opts.verbose {
        gdeltar::log_progress()
    } else {
        gdeltar::null_progress()
    };
    let result = gdeltar::compress(opts, &progress).context("compression failed")?;

    if !opts.quiet {
        info!("Files processed: {}", result.files_processed);
        info!("Original size:   {}", size_to_str(result.total_original));
        info!("Compressed size: {}", size_to_str(result.total_compressed));
        info!(
            "Ratio:           {}",
            Ratio(result.total_original, result.total_compressed)
        );
        if result.archive_size > 0 {
            info!("Archive size:    {}", size_to_str(result.archive_size));
        }
        if let Some(stats) = &result.stats {
            info!(
                "Chunks:          {} total, {} unique, {} deduplicated",
                stats.total_seen, stats.unique, stats.deduped
            );
            info!("Dedup savings:   {}", size_to_str(stats.bytes_saved));
            if stats.evictions > 0 {
                info!("Cache evictions: {}", stats.evictions);
            }
        }
    }

    for err in &result.errors {
        eprintln!("error: {}", err);
    }
    Ok(result.errors.is_empty())
}
