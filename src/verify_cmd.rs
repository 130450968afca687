use anyhow::{Context, Result};
use log::info;

/// Run a verification; returns false when the archive is not valid.
pub fn run(opts: &gdeltar::VerifyOptions) -> Result<bool> {
    let progress = gdeltar::null_progress();
    let report = gdeltar::verify(opts, &progress).context("verification failed")?;

    if let Some(format) = report.format {
        info!("Format:          {}", format);
    }
    info!("Header valid:    {}", report.header_valid);
    info!("Footer valid:    {}", report.footer_valid);
    info!("Files:           {}", report.file_count);
    if report.empty_files > 0 {
        info!("Empty files:     {}", report.empty_files);
    }
    if report.duplicate_paths > 0 {
        info!("Duplicate paths: {}", report.duplicate_paths);
    }
    if report.unique_chunks > 0 {
        info!(
            "Chunks:          {} referenced, {} unique (avg size {})",
            report.total_chunks, report.unique_chunks, report.avg_chunk_size
        );
    }
    if report.missing_chunks > 0 {
        info!("Missing chunks:  {}", report.missing_chunks);
    }
    if report.orphan_chunks > 0 {
        info!("Orphaned chunks: {}", report.orphan_chunks);
    }
    if report.data_checked {
        info!(
            "Data check:      {} corrupt files, {} corrupt chunks",
            report.corrupt_files, report.corrupt_chunks
        );
    }
    info!(
        "Archive is {}",
        if report.is_valid() { "valid" } else { "NOT valid" }
    );

    for message in &report.errors {
        eprintln!("error: {}", message);
    }
    Ok(report.is_valid())
}
