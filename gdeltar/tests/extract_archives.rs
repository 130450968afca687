mod common;

use common::*;

use gdeltar::{Compression, Error, ExtractOptions};

#[test]
fn overwrite_protection() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(
        &input,
        &[
            ("f.txt", b"archived content".to_vec()),
            ("other.txt", b"still extracted".to_vec()),
        ],
    );
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 0);

    let restored = work.path().join("restored");
    std::fs::create_dir_all(&restored).unwrap();
    std::fs::write(restored.join("f.txt"), b"pre-existing").unwrap();

    let extract = extract_to(&archive, &restored);
    assert_eq!(extract.errors.len(), 1);
    assert!(matches!(extract.errors[0], Error::FileExists(_)));
    // Existing file untouched, the rest of the archive still extracted.
    assert_eq!(
        std::fs::read(restored.join("f.txt")).unwrap(),
        b"pre-existing"
    );
    assert_eq!(
        std::fs::read(restored.join("other.txt")).unwrap(),
        b"still extracted"
    );
}

#[test]
fn overwrite_enabled_replaces() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("f.txt", b"archived content".to_vec())]);
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 0);

    let restored = work.path().join("restored");
    std::fs::create_dir_all(&restored).unwrap();
    std::fs::write(restored.join("f.txt"), b"old").unwrap();

    let opts = ExtractOptions {
        archive_path: archive,
        output_dir: restored.clone(),
        overwrite: true,
        quiet: true,
        ..ExtractOptions::default()
    };
    let extract = gdeltar::decompress(&opts, &gdeltar::null_progress()).unwrap();
    assert!(extract.errors.is_empty());
    assert_eq!(
        std::fs::read(restored.join("f.txt")).unwrap(),
        b"archived content"
    );
}

#[test]
fn chunked_overwrite_protection() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("f.bin", pseudo_random(50 * 1024))]);
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 8 * 1024);

    let restored = work.path().join("restored");
    std::fs::create_dir_all(&restored).unwrap();
    std::fs::write(restored.join("f.bin"), b"keep me").unwrap();

    let extract = extract_to(&archive, &restored);
    assert_eq!(extract.errors.len(), 1);
    assert_eq!(std::fs::read(restored.join("f.bin")).unwrap(), b"keep me");
}

/// A hand-built archive storing a traversal path must not escape the
/// output directory.
#[test]
fn unsafe_stored_path_rejected() {
    use gdeltar::format::{self, SimpleEntry};
    use std::io::Write;

    let work = tempfile::tempdir().unwrap();
    let archive_path = work.path().join("evil.gda");
    let payload = Compression::try_new(3).unwrap().compress(b"owned").unwrap();

    let mut out = Vec::new();
    format::write_simple_header(&mut out, 1).unwrap();
    let path = "../escape.txt";
    let data_offset = out.len() as u64 + format::entry_header_len(path);
    format::write_simple_entry(
        &mut out,
        &SimpleEntry {
            relative_path: path.into(),
            original_size: 5,
            compressed_size: payload.len() as u64,
            data_offset,
        },
    )
    .unwrap();
    out.write_all(&payload).unwrap();
    out.write_all(format::FOOTER_SIMPLE).unwrap();
    std::fs::write(&archive_path, out).unwrap();

    let restored = work.path().join("restored");
    let extract = extract_to(&archive_path, &restored);
    assert_eq!(extract.files_written, 0);
    assert!(matches!(extract.errors[0], Error::UnsafePath(_)));
    assert!(!work.path().join("escape.txt").exists());
}

#[test]
fn missing_archive_is_an_error() {
    let opts = ExtractOptions {
        archive_path: "/no/such/archive.gda".into(),
        output_dir: "/tmp".into(),
        quiet: true,
        ..ExtractOptions::default()
    };
    assert!(matches!(
        gdeltar::decompress(&opts, &gdeltar::null_progress()),
        Err(Error::MissingInput(_))
    ));
}

#[test]
fn truncated_archive_reported() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("f.bin", pseudo_random(64 * 1024))]);
    let archive = work.path().join("out.gda");
    compress_dir(&input, &archive, 0);

    // Cut the archive mid-payload; the reader must fail cleanly instead of
    // producing garbage.
    let bytes = std::fs::read(&archive).unwrap();
    std::fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

    let restored = work.path().join("restored");
    std::fs::create_dir_all(&restored).unwrap();
    let opts = ExtractOptions {
        archive_path: archive,
        output_dir: restored,
        quiet: true,
        ..ExtractOptions::default()
    };
    let result = gdeltar::decompress(&opts, &gdeltar::null_progress());
    match result {
        Err(_) => {}
        Ok(extract) => assert!(!extract.errors.is_empty()),
    }
}
