mod compress_cmd;
mod extract_cmd;
mod info_cmd;
mod string_utils;
mod verify_cmd;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use log::error;
use std::path::PathBuf;
use std::process;

use crate::string_utils::parse_size;
use gdeltar::Parallelism;

pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

enum Config {
    Compress(gdeltar::Options),
    Extract(gdeltar::ExtractOptions),
    Verify(gdeltar::VerifyOptions),
    Info(PathBuf),
}

fn init_log(level: log::LevelFilter) -> Result<()> {
    let local_level = level;
    fern::Dispatch::new()
        .format(move |out, message, record| {
            if local_level > log::LevelFilter::Info {
                // Add some extra info to each message in debug
                out.finish(format_args!(
                    "[{}]({})({}) {}",
                    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                    record.target(),
                    record.level(),
                    message
                ))
            } else {
                out.finish(format_args!("{}", message))
            }
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .context("unable to initialize log")?;
    Ok(())
}

fn cli() -> Command {
    Command::new(PKG_NAME)
        .version(PKG_VERSION)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .global(true)
                .help("Set verbosity level"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Only print errors"),
        )
        .subcommand(
            Command::new("compress")
                .about("Compress a file tree into an archive.")
                .arg(
                    Arg::new("INPUT")
                        .short('i')
                        .long("input")
                        .value_name("PATH")
                        .help("Root of the tree to compress"),
                )
                .arg(
                    Arg::new("FILES")
                        .long("file")
                        .value_name("PATH")
                        .action(ArgAction::Append)
                        .help("Explicit file or directory to include (repeatable, overrides --input)"),
                )
                .arg(
                    Arg::new("OUTPUT")
                        .value_name("OUTPUT")
                        .required(true)
                        .help("Output archive path"),
                )
                .arg(
                    Arg::new("chunk-size")
                        .long("chunk-size")
                        .value_name("SIZE")
                        .help("Average chunk size for deduplication, 0 to disable [default: 64KB]"),
                )
                .arg(
                    Arg::new("level")
                        .long("level")
                        .short('l')
                        .value_name("LEVEL")
                        .help("Compression level (zstd 1-22, zip 1-9) [default: 5]"),
                )
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .short('t')
                        .value_name("COUNT")
                        .help("Worker threads [default: number of CPUs]"),
                )
                .arg(
                    Arg::new("store-size")
                        .long("store-size")
                        .value_name("MB")
                        .help("Chunk cache memory bound in MiB, 0 for unlimited [default: 0]"),
                )
                .arg(
                    Arg::new("thread-memory")
                        .long("thread-memory")
                        .value_name("SIZE")
                        .help("Per-worker memory budget, 0 to derive from input [default: 0]"),
                )
                .arg(
                    Arg::new("parallelism")
                        .long("parallelism")
                        .value_name("MODE")
                        .help("Scheduling mode: auto, folder or file [default: auto]"),
                )
                .arg(
                    Arg::new("zip")
                        .long("zip")
                        .action(ArgAction::SetTrue)
                        .help("Write per-worker ZIP archives instead"),
                )
                .arg(
                    Arg::new("xz")
                        .long("xz")
                        .action(ArgAction::SetTrue)
                        .help("Write per-worker tar.xz archives instead"),
                )
                .arg(
                    Arg::new("dictionary")
                        .long("dictionary")
                        .action(ArgAction::SetTrue)
                        .help("Train a shared dictionary and write the dictionary format"),
                )
                .arg(
                    Arg::new("gitignore")
                        .long("gitignore")
                        .action(ArgAction::SetTrue)
                        .help("Honor .gitignore files while enumerating"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Compute statistics without writing an archive"),
                ),
        )
        .subcommand(
            Command::new("extract")
                .about("Extract an archive.")
                .arg(
                    Arg::new("INPUT")
                        .value_name("INPUT")
                        .required(true)
                        .help("Archive to extract"),
                )
                .arg(
                    Arg::new("OUTPUT")
                        .value_name("OUTPUT")
                        .help("Output directory [default: .]"),
                )
                .arg(
                    Arg::new("overwrite")
                        .short('f')
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Overwrite existing files"),
                ),
        )
        .subcommand(
            Command::new("verify")
                .about("Check archive integrity without extracting.")
                .arg(
                    Arg::new("INPUT")
                        .value_name("INPUT")
                        .required(true)
                        .help("Archive to verify"),
                )
                .arg(
                    Arg::new("data")
                        .long("data")
                        .action(ArgAction::SetTrue)
                        .help("Also re-decode every payload"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Print archive details.")
                .arg(
                    Arg::new("INPUT")
                        .value_name("INPUT")
                        .required(true)
                        .help("Archive to inspect"),
                ),
        )
}

fn parse_opts() -> Result<Config> {
    let matches = cli().get_matches();

    let quiet = matches.get_flag("quiet");
    init_log(if quiet {
        log::LevelFilter::Error
    } else {
        match matches.get_count("verbose") {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    })?;
    let verbose = matches.get_count("verbose") > 0;

    if let Some(matches) = matches.subcommand_matches("compress") {
        let output = matches.get_one::<String>("OUTPUT").unwrap();
        let input = matches
            .get_one::<String>("INPUT")
            .map(PathBuf::from)
            .unwrap_or_default();
        let files: Vec<PathBuf> = matches
            .get_many::<String>("FILES")
            .unwrap_or_default()
            .map(PathBuf::from)
            .collect();
        if files.is_empty() && input.as_os_str().is_empty() {
            return Err(anyhow!("either --input or --file is required"));
        }

        let chunk_size = parse_size(
            matches
                .get_one::<String>("chunk-size")
                .map(String::as_str)
                .unwrap_or("64KB"),
        )
        .context("invalid chunk size value")?;
        let level: u32 = matches
            .get_one::<String>("level")
            .map(String::as_str)
            .unwrap_or("5")
            .parse()
            .context("invalid compression level value")?;
        let max_threads: usize = matches
            .get_one::<String>("threads")
            .map(String::as_str)
            .unwrap_or("0")
            .parse()
            .context("invalid thread count")?;
        let chunk_store_size_mb: u64 = matches
            .get_one::<String>("store-size")
            .map(String::as_str)
            .unwrap_or("0")
            .parse()
            .context("invalid store size")?;
        let max_thread_memory = parse_size(
            matches
                .get_one::<String>("thread-memory")
                .map(String::as_str)
                .unwrap_or("0"),
        )
        .context("invalid thread memory value")?;
        let parallelism = match matches
            .get_one::<String>("parallelism")
            .map(String::as_str)
            .unwrap_or("auto")
        {
            "auto" => Parallelism::Auto,
            "folder" => Parallelism::Folder,
            "file" => Parallelism::File,
            other => return Err(anyhow!("invalid parallelism mode: {}", other)),
        };

        let use_zip = matches.get_flag("zip");
        let use_xz = matches.get_flag("xz");
        let use_dictionary = matches.get_flag("dictionary");
        // ZIP, xz and dictionary outputs have no chunked layout; silently
        // forcing chunking off here would mask conflicting flags, so the
        // library validates the combination instead.
        let chunk_size = if use_zip || use_xz || use_dictionary {
            if matches.contains_id("chunk-size") {
                chunk_size
            } else {
                0
            }
        } else {
            chunk_size
        };

        Ok(Config::Compress(gdeltar::Options {
            input_path: input,
            files,
            output_path: PathBuf::from(output),
            max_threads,
            level,
            chunk_size,
            chunk_store_size_mb,
            max_thread_memory,
            parallelism,
            use_zip,
            use_xz,
            use_dictionary,
            use_gitignore: matches.get_flag("gitignore"),
            dry_run: matches.get_flag("dry-run"),
            verbose,
            quiet,
        }))
    } else if let Some(matches) = matches.subcommand_matches("extract") {
        Ok(Config::Extract(gdeltar::ExtractOptions {
            archive_path: PathBuf::from(matches.get_one::<String>("INPUT").unwrap()),
            output_dir: matches
                .get_one::<String>("OUTPUT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            overwrite: matches.get_flag("overwrite"),
            verbose,
            quiet,
        }))
    } else if let Some(matches) = matches.subcommand_matches("verify") {
        Ok(Config::Verify(gdeltar::VerifyOptions {
            archive_path: PathBuf::from(matches.get_one::<String>("INPUT").unwrap()),
            verify_data: matches.get_flag("data"),
        }))
    } else if let Some(matches) = matches.subcommand_matches("info") {
        Ok(Config::Info(PathBuf::from(
            matches.get_one::<String>("INPUT").unwrap(),
        )))
    } else {
        Err(anyhow!("unknown command"))
    }
}

fn main() {
    // Interrupt means: drop every live temp file, leave with a failure
    // status. The partially written archive stays for the caller to judge.
    if let Err(err) = ctrlc::set_handler(|| {
        gdeltar::temp::cleanup_all();
        process::exit(1);
    }) {
        eprintln!("warning: unable to install signal handler: {}", err);
    }

    let result = match parse_opts() {
        Ok(Config::Compress(opts)) => compress_cmd::run(&opts),
        Ok(Config::Extract(opts)) => extract_cmd::run(&opts),
        Ok(Config::Verify(opts)) => verify_cmd::run(&opts),
        Ok(Config::Info(path)) => info_cmd::run(&path),
        Err(err) => Err(err),
    };
    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!("error: {:#}", err);
            process::exit(1);
        }
    }
}
