mod common;

use common::*;

use gdeltar::format::{self, ChunkedHeader};
use gdeltar::{ChunkInfo, Compression, FileMetadata, HashSum, VerifyOptions};

fn verify(path: &std::path::Path, data: bool) -> gdeltar::VerifyReport {
    let opts = VerifyOptions {
        archive_path: path.to_path_buf(),
        verify_data: data,
    };
    gdeltar::verify(&opts, &gdeltar::null_progress()).unwrap()
}

#[test]
fn intact_chunked_archive_is_valid() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(
        &input,
        &[
            ("a/x.bin", pseudo_random(100 * 1024)),
            ("a/y.bin", pseudo_random(30 * 1024)),
            ("empty.bin", Vec::new()),
        ],
    );
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 8 * 1024);

    let report = verify(&archive, true);
    assert!(report.is_valid(), "{:?}", report.errors);
    assert_eq!(report.file_count, 3);
    assert_eq!(report.empty_files, 1);
    assert_eq!(report.missing_chunks, 0);
    assert_eq!(report.orphan_chunks, 0);
    assert_eq!(report.corrupt_chunks, 0);
    assert_eq!(report.avg_chunk_size, 8 * 1024);
}

#[test]
fn truncated_footer_detected() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("f.bin", pseudo_random(40 * 1024))]);
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 8 * 1024);

    let bytes = std::fs::read(&archive).unwrap();
    std::fs::write(&archive, &bytes[..bytes.len() - 4]).unwrap();

    let report = verify(&archive, false);
    assert!(!report.footer_valid);
    assert!(!report.is_valid());
    assert!(!report.errors.is_empty());
}

#[test]
fn bit_flip_detected_in_data_mode() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("f.bin", pseudo_random(64 * 1024))]);
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 8 * 1024);

    // Flip one byte inside the chunk body region (just before the footer).
    let mut bytes = std::fs::read(&archive).unwrap();
    let index = bytes.len() - 12;
    bytes[index] ^= 0xff;
    std::fs::write(&archive, bytes).unwrap();

    let structural = verify(&archive, false);
    // Structure alone cannot see payload damage.
    assert!(structural.corrupt_chunks == 0);

    let report = verify(&archive, true);
    assert!(report.corrupt_chunks >= 1, "{:?}", report.errors);
    assert!(!report.is_valid());
}

#[test]
fn sequential_data_mode_detects_payload_damage() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("f.bin", pseudo_random(64 * 1024))]);
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 0);

    let mut bytes = std::fs::read(&archive).unwrap();
    let index = bytes.len() - 40;
    bytes[index] ^= 0xff;
    std::fs::write(&archive, bytes).unwrap();

    let report = verify(&archive, true);
    assert!(report.corrupt_files >= 1 || !report.footer_valid);
    assert!(!report.is_valid());
}

#[test]
fn dictionary_archive_verifies() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    let files: Vec<(String, Vec<u8>)> = (0..10)
        .map(|i| (format!("f{}.txt", i), format!("payload {}", i).repeat(50).into_bytes()))
        .collect();
    let files_ref: Vec<(&str, Vec<u8>)> =
        files.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();
    write_tree(&input, &files_ref);

    let archive = work.path().join("out.gda");
    let opts = gdeltar::Options {
        use_dictionary: true,
        ..compress_options(&input, &archive, 0)
    };
    gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap();

    let report = verify(&archive, true);
    assert!(report.is_valid(), "{:?}", report.errors);
    assert_eq!(report.file_count, 10);
}

/// Hand-build a chunked archive whose index holds one chunk no file
/// references and whose file references one hash the index lacks.
#[test]
fn structural_anomalies_counted() {
    use std::io::Write;

    let work = tempfile::tempdir().unwrap();
    let archive_path = work.path().join("anomalous.gda");

    let compression = Compression::try_new(3).unwrap();
    let stored = pseudo_random(2048);
    let frame = compression.compress(&stored).unwrap();
    let stored_hash = HashSum::digest(&stored);
    let orphan = pseudo_random(512);
    let orphan_frame = compression.compress(&orphan).unwrap();
    let missing_hash = HashSum::digest(b"never archived");

    let mut out = Vec::new();
    format::write_chunked_header(
        &mut out,
        &ChunkedHeader {
            avg_chunk_size: 4096,
            file_count: 1,
            unique_chunk_count: 2,
        },
    )
    .unwrap();
    format::write_chunk_index(
        &mut out,
        &[
            ChunkInfo {
                hash: stored_hash,
                offset: 0,
                compressed_size: frame.len() as u64,
                original_size: stored.len() as u64,
            },
            ChunkInfo {
                hash: HashSum::digest(&orphan),
                offset: frame.len() as u64,
                compressed_size: orphan_frame.len() as u64,
                original_size: orphan.len() as u64,
            },
        ],
    )
    .unwrap();
    format::write_file_metadata(
        &mut out,
        &FileMetadata {
            relative_path: "partial.bin".into(),
            original_size: stored.len() as u64 + 10,
            chunk_hashes: vec![stored_hash, missing_hash],
        },
    )
    .unwrap();
    out.write_all(&frame).unwrap();
    out.write_all(&orphan_frame).unwrap();
    out.write_all(format::FOOTER_CHUNKED).unwrap();
    std::fs::write(&archive_path, out).unwrap();

    let report = verify(&archive_path, false);
    assert_eq!(report.missing_chunks, 1);
    assert_eq!(report.orphan_chunks, 1);
    assert!(report.footer_valid);
    assert!(!report.is_valid());
}

#[test]
fn unknown_bytes_are_not_an_archive() {
    let work = tempfile::tempdir().unwrap();
    let path = work.path().join("garbage.bin");
    std::fs::write(&path, b"this is not an archive at all").unwrap();

    let report = verify(&path, false);
    assert!(report.format.is_none());
    assert!(!report.is_valid());
    assert!(!report.errors.is_empty());
}
