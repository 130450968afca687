//! Dictionary training.
//!
//! Samples the head of each input file and feeds the samples to the zstd
//! dictionary builder. All parameters are derived from the input shape;
//! nothing here is user-tunable. Training failures of any kind degrade to
//! an empty dictionary, never to a failed run.

use std::fs::File;
use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, warn};

use super::tasks::TaskList;

/// Files smaller than this carry too little signal to sample.
const MIN_SAMPLE_FILE_SIZE: u64 = 64;
/// Below this many samples, or this much total sample data, training is
/// skipped entirely.
const MIN_SAMPLES: usize = 3;
const MIN_TOTAL_SAMPLE_BYTES: usize = 2 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrainerParams {
    /// Upper bound for the produced dictionary.
    pub max_dict_size: usize,
    /// Bytes sampled from the head of each file.
    pub max_sample_size: usize,
    /// Total sample budget across all files.
    pub max_total_samples: usize,
}

/// Derive training parameters from the input shape.
pub fn derive_params(total_input: u64, file_count: u64) -> TrainerParams {
    let max_dict_size: usize = if total_input < 10 * 1024 * 1024 {
        32 * 1024
    } else if total_input < 100 * 1024 * 1024 {
        64 * 1024
    } else {
        112 * 1024
    };
    let avg_file_size = total_input / file_count.max(1);
    let max_sample_size = (avg_file_size.min(64 * 1024).max(1024)) as usize;
    let max_total_samples = (total_input / 20)
        .max(4 * 1024 * file_count)
        .max(8 * max_dict_size as u64)
        .clamp(512 * 1024, 50 * 1024 * 1024) as usize;
    TrainerParams {
        max_dict_size,
        max_sample_size,
        max_total_samples,
    }
}

/// Train a shared dictionary over the enumerated files.
///
/// Returns an empty vec when the sample set is too small or the builder
/// fails; the dictionary format stays valid either way.
pub fn train(tasks: &TaskList) -> Vec<u8> {
    let params = derive_params(tasks.total_bytes, tasks.total_files);
    debug!(
        "dictionary training: dict<={}, sample<={}, total<={}",
        params.max_dict_size, params.max_sample_size, params.max_total_samples
    );

    let mut sample_data: Vec<u8> = Vec::new();
    let mut sample_sizes: Vec<usize> = Vec::new();
    let mut head = vec![0u8; params.max_sample_size];
    for task in tasks.files() {
        if sample_data.len() >= params.max_total_samples {
            break;
        }
        if task.size < MIN_SAMPLE_FILE_SIZE {
            continue;
        }
        let mut file = match File::open(&task.source) {
            Ok(file) => file,
            Err(err) => {
                debug!("skipping sample {}: {}", task.source.display(), err);
                continue;
            }
        };
        let mut filled = 0;
        while filled < head.len() {
            match file.read(&mut head[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(_) => break,
            }
        }
        if filled == 0 {
            continue;
        }
        sample_data.extend_from_slice(&head[..filled]);
        sample_sizes.push(filled);
    }

    if sample_sizes.len() < MIN_SAMPLES || sample_data.len() < MIN_TOTAL_SAMPLE_BYTES {
        debug!(
            "not enough sample data to train ({} samples, {} bytes)",
            sample_sizes.len(),
            sample_data.len()
        );
        return Vec::new();
    }

    // Small sample sets cannot support a full-size dictionary.
    let dict_size = params
        .max_dict_size
        .min((sample_data.len() / 2).max(1024));

    // The builder is isolated; a panic or error yields an empty dictionary
    // and the archive is simply written without one.
    let trained = catch_unwind(AssertUnwindSafe(|| {
        zstd::dict::from_continuous(&sample_data, &sample_sizes, dict_size)
    }));
    match trained {
        Ok(Ok(dictionary)) => {
            debug!(
                "trained a {} byte dictionary from {} samples",
                dictionary.len(),
                sample_sizes.len()
            );
            dictionary
        }
        Ok(Err(err)) => {
            warn!("dictionary training failed: {}", err);
            Vec::new()
        }
        Err(_) => {
            warn!("dictionary training panicked");
            Vec::new()
        }
    }
}
