mod common;

use common::*;

use gdeltar::{Options, Parallelism};

#[test]
fn identical_files_deduplicate() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    let data = b"ABCDEFGHIJ".repeat(10_000);
    write_tree(
        &input,
        &[
            ("a.txt", data.clone()),
            ("b.txt", data.clone()),
            ("c.txt", data.clone()),
        ],
    );

    let archive = work.path().join("out.gda");
    let result = compress_dir(&input, &archive, 64 * 1024);
    assert_eq!(result.files_processed, 3);
    let stats = result.stats.unwrap();
    assert!(stats.total_seen > 0);
    assert!(stats.deduped * 2 >= stats.total_seen, "{:?}", stats);

    let restored = work.path().join("restored");
    extract_to(&archive, &restored);
    assert_eq!(read_tree(&input), read_tree(&restored));
}

#[test]
fn empty_file_chunked() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("empty.bin", Vec::new())]);

    let archive = work.path().join("out.gda");
    let result = compress_dir(&input, &archive, 1024 * 1024);
    assert_eq!(result.files_processed, 1);
    let stats = result.stats.unwrap();
    assert_eq!(stats.total_seen, 0);
    assert!(archive.is_file());

    let restored = work.path().join("restored");
    let extract = extract_to(&archive, &restored);
    assert_eq!(extract.files_written, 1);
    assert_eq!(std::fs::read(restored.join("empty.bin")).unwrap(), b"");
}

#[test]
fn shifted_duplicate_deduplicates() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    let data = pseudo_random(100 * 1024);
    let mut shifted = b"PREFIX_A:".to_vec();
    shifted.extend_from_slice(&data);
    write_tree(&input, &[("x.bin", data), ("shifted.bin", shifted)]);

    let archive = work.path().join("out.gda");
    let result = compress_dir(&input, &archive, 8 * 1024);
    let stats = result.stats.unwrap();
    assert!(stats.deduped >= 1, "{:?}", stats);

    let restored = work.path().join("restored");
    extract_to(&archive, &restored);
    assert_eq!(read_tree(&input), read_tree(&restored));
}

#[test]
fn sequential_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(
        &input,
        &[
            ("docs/readme.md", b"hello world".to_vec()),
            ("docs/empty.txt", Vec::new()),
            ("bin/data.bin", pseudo_random(300 * 1024)),
        ],
    );
    assert_round_trip(&input, work.path(), 0);
}

#[test]
fn chunked_round_trip_multi_folder() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    let mut files = Vec::new();
    let payloads: Vec<Vec<u8>> = (0..6).map(|i| pseudo_random(40 * 1024 + i * 777)).collect();
    let names: Vec<String> = (0..6).map(|i| format!("folder{}/file{}.bin", i % 3, i)).collect();
    for (name, payload) in names.iter().zip(&payloads) {
        files.push((name.as_str(), payload.clone()));
    }
    write_tree(&input, &files);
    assert_round_trip(&input, work.path(), 16 * 1024);
}

#[test]
fn dictionary_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    let files: Vec<(String, Vec<u8>)> = (0..40)
        .map(|i| {
            (
                format!("records/record_{:03}.json", i),
                format!(
                    "{{\"id\": {}, \"kind\": \"record\", \"payload\": \"{}\"}}",
                    i,
                    "x".repeat(200)
                )
                .into_bytes(),
            )
        })
        .collect();
    let files_ref: Vec<(&str, Vec<u8>)> =
        files.iter().map(|(n, d)| (n.as_str(), d.clone())).collect();
    write_tree(&input, &files_ref);

    let archive = work.path().join("out.gda");
    let opts = Options {
        use_dictionary: true,
        ..compress_options(&input, &archive, 0)
    };
    let result = gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap();
    assert_eq!(result.files_processed, 40);
    assert!(result.errors.is_empty());

    let restored = work.path().join("restored");
    let extract = extract_to(&archive, &restored);
    assert!(extract.errors.is_empty());
    assert_eq!(read_tree(&input), read_tree(&restored));
}

#[test]
fn chunked_beats_sequential_on_duplicated_input() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    // Four identical large files: far beyond 10% internal duplication.
    let data = pseudo_random(256 * 1024);
    write_tree(
        &input,
        &[
            ("copies/a.bin", data.clone()),
            ("copies/b.bin", data.clone()),
            ("copies/c.bin", data.clone()),
            ("copies/d.bin", data.clone()),
        ],
    );

    let chunked = work.path().join("chunked.gda");
    let chunked_size = compress_dir(&input, &chunked, 16 * 1024).archive_size;
    let sequential = work.path().join("sequential.gda");
    let sequential_size = compress_dir(&input, &sequential, 0).archive_size;
    assert!(
        chunked_size < sequential_size,
        "chunked {} vs sequential {}",
        chunked_size,
        sequential_size
    );
}

#[test]
fn dry_run_writes_nothing() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(&input, &[("a.bin", pseudo_random(64 * 1024))]);

    let archive = work.path().join("out.gda");
    let opts = Options {
        dry_run: true,
        ..compress_options(&input, &archive, 8 * 1024)
    };
    let result = gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap();
    assert!(!archive.exists());
    assert_eq!(result.archive_size, 0);
    let stats = result.stats.unwrap();
    assert!(stats.unique > 0);
}

#[test]
fn zip_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(
        &input,
        &[
            ("a/one.txt", b"one one one".to_vec()),
            ("b/two.txt", pseudo_random(100 * 1024)),
        ],
    );

    let opts = Options {
        use_zip: true,
        level: 6,
        chunk_size: 0,
        ..compress_options(&input, &work.path().join("out.zip"), 0)
    };
    let result = gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap();
    assert!(result.errors.is_empty());
    assert!(work.path().join("out_01.zip").is_file());

    let restored = work.path().join("restored");
    let extract = extract_to(&work.path().join("out_01.zip"), &restored);
    assert!(extract.errors.is_empty());
    assert_eq!(read_tree(&input), read_tree(&restored));
}

#[test]
fn tar_xz_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(
        &input,
        &[
            ("a/one.txt", b"one one one".to_vec()),
            ("a/two.bin", pseudo_random(64 * 1024)),
        ],
    );

    let opts = Options {
        use_xz: true,
        level: 4,
        chunk_size: 0,
        ..compress_options(&input, &work.path().join("out.tar.xz"), 0)
    };
    let result = gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap();
    assert!(result.errors.is_empty());
    assert!(work.path().join("out_01.tar.xz").is_file());

    let restored = work.path().join("restored");
    let extract = extract_to(&work.path().join("out_01.tar.xz"), &restored);
    assert!(extract.errors.is_empty());
    assert_eq!(read_tree(&input), read_tree(&restored));
}

#[test]
fn folder_mode_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    let mut files = Vec::new();
    let names: Vec<String> = (0..12)
        .map(|i| format!("dir{}/file.bin", i))
        .collect();
    for (i, name) in names.iter().enumerate() {
        files.push((name.as_str(), pseudo_random(10 * 1024 + i)));
    }
    write_tree(&input, &files);

    let archive = work.path().join("out.gda");
    let opts = Options {
        parallelism: Parallelism::Folder,
        ..compress_options(&input, &archive, 8 * 1024)
    };
    let result = gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap();
    assert_eq!(result.files_processed, 12);

    let restored = work.path().join("restored");
    extract_to(&archive, &restored);
    assert_eq!(read_tree(&input), read_tree(&restored));
}

#[test]
fn explicit_file_list_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let input = work.path().join("input");
    write_tree(
        &input,
        &[
            ("single.bin", pseudo_random(20 * 1024)),
            ("data/nested/deep.bin", pseudo_random(30 * 1024)),
        ],
    );

    let archive = work.path().join("out.gda");
    let opts = Options {
        files: vec![input.join("single.bin"), input.join("data")],
        ..compress_options(&input, &archive, 8 * 1024)
    };
    let result = gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap();
    assert_eq!(result.files_processed, 2);

    let restored = work.path().join("restored");
    extract_to(&archive, &restored);
    let tree = read_tree(&restored);
    assert!(tree.contains_key("single.bin"));
    assert!(tree.contains_key("data/nested/deep.bin"));
    assert_eq!(
        tree["data/nested/deep.bin"],
        std::fs::read(input.join("data/nested/deep.bin")).unwrap()
    );
}
