#![allow(dead_code)]
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use gdeltar::{CompressResult, ExtractOptions, ExtractResult, Options};

/// Deterministic pseudo random bytes, no external seed.
pub fn pseudo_random(len: usize) -> Vec<u8> {
    let mut seed: usize = 0xa3;
    (0..len)
        .map(|v| {
            seed ^= seed.wrapping_mul(4);
            (seed ^ v) as u8
        })
        .collect()
}

pub fn write_tree(root: &Path, files: &[(&str, Vec<u8>)]) {
    for (relative, data) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }
}

/// Read back a tree as relative path -> contents.
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for entry in walk(root) {
        let relative = entry
            .strip_prefix(root)
            .unwrap()
            .components()
            .map(|c| c.as_os_str().to_str().unwrap())
            .collect::<Vec<_>>()
            .join("/");
        files.insert(relative, fs::read(&entry).unwrap());
    }
    files
}

fn walk(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

pub fn compress_options(input: &Path, output: &Path, chunk_size: u64) -> Options {
    Options {
        input_path: input.to_path_buf(),
        output_path: output.to_path_buf(),
        chunk_size,
        level: 3,
        max_threads: 2,
        quiet: true,
        ..Options::default()
    }
}

pub fn compress_dir(input: &Path, output: &Path, chunk_size: u64) -> CompressResult {
    let opts = compress_options(input, output, chunk_size);
    gdeltar::compress(&opts, &gdeltar::null_progress()).unwrap()
}

pub fn extract_to(archive: &Path, output_dir: &Path) -> ExtractResult {
    fs::create_dir_all(output_dir).unwrap();
    let opts = ExtractOptions {
        archive_path: archive.to_path_buf(),
        output_dir: output_dir.to_path_buf(),
        overwrite: false,
        quiet: true,
        ..ExtractOptions::default()
    };
    gdeltar::decompress(&opts, &gdeltar::null_progress()).unwrap()
}

/// Compress `input`, extract the result and assert the trees are equal.
pub fn assert_round_trip(input: &Path, work: &Path, chunk_size: u64) {
    let archive = work.join("archive.gda");
    let result = compress_dir(input, &archive, chunk_size);
    assert!(result.errors.is_empty());

    let restored = work.join("restored");
    let extract = extract_to(&archive, &restored);
    assert!(extract.errors.is_empty());
    assert_eq!(read_tree(input), read_tree(&restored));
}
