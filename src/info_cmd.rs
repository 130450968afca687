use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::string_utils::size_to_str;

/// Print archive details from a structural walk.
pub fn run(path: &Path) -> Result<bool> {
    let opts = gdeltar::VerifyOptions {
        archive_path: path.to_path_buf(),
        verify_data: false,
    };
    let progress = gdeltar::null_progress();
    let report = gdeltar::verify(&opts, &progress).context("unable to read archive")?;

    let size = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    match report.format {
        Some(format) => info!("Format:       {}", format),
        None => info!("Format:       unknown"),
    }
    info!("Archive size: {}", size_to_str(size));
    info!("Files:        {}", report.file_count);
    if report.unique_chunks > 0 {
        info!(
            "Chunks:       {} referenced, {} unique",
            report.total_chunks, report.unique_chunks
        );
        info!("Chunk size:   {} (average)", size_to_str(report.avg_chunk_size));
        if report.total_chunks > 0 {
            info!(
                "Dedup ratio:  {:.1}%",
                100.0 * (report.total_chunks - report.unique_chunks) as f64
                    / report.total_chunks as f64
            );
        }
    }
    info!(
        "Structure:    {}",
        if report.is_valid() { "consistent" } else { "INCONSISTENT" }
    );
    Ok(report.is_valid())
}
