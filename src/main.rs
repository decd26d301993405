mod cli;
mod error;
mod logging;
mod pipeline;

use crate::cli::{CacheCommand, Cli, Command};
use crate::error::{ErrorKind, Result};
use crate::pipeline::Pipeline;
use clap::Parser;
use exn::ResultExt;
use salvage_cache::{DocumentKey, FileCache, MetadataCache};
use salvage_config::Config;
use salvage_extract::analyzer::Unavailable;
use salvage_extract::charset::DEFAULT_CHARSET;
use salvage_extract::models::Metadata;
use salvage_extract::{Analyzer, StaticAnalyzer, preprocess};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Error: {error:?}");
            return ExitCode::FAILURE;
        },
    };
    logging::init(&config.log.level);

    match run(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("Error: {error:?}");
            if error.is_retryable() {
                eprintln!("This may succeed if retried.");
            }
            ExitCode::FAILURE
        },
    }
}

fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Extract {
            file,
            metadata,
            source_name,
            no_cache,
            pretty,
        } => {
            let bytes = read(&file)?;
            let source_name = source_name.or_else(|| file.file_stem().map(|stem| stem.to_string_lossy().into_owned()));
            // Explicit metadata always wins over, and replaces, a cached entry.
            let refresh = metadata.is_some();
            let analyzer: Box<dyn Analyzer> = match metadata {
                Some(argument) => Box::new(StaticAnalyzer::new(parse_metadata(&argument)?)),
                None => Box::new(Unavailable),
            };
            let cache = if config.cache.enabled && !no_cache { Some(open_cache(config)?) } else { None };

            let mut pipeline = Pipeline::new(analyzer.as_ref())
                .max_html_bytes(config.analysis.max_html_bytes)
                .refresh(refresh);
            if let Some(cache) = &cache {
                pipeline = pipeline.with_cache(cache);
            }
            let result = pipeline.run(&bytes, source_name.as_deref())?;
            print_json(&result, pretty)
        },
        Command::Preprocess { file, pretty } => {
            let preprocessed = preprocess(&read(&file)?);
            let input = preprocessed.analysis_input(config.analysis.max_html_bytes);
            print_json(
                &PreprocessReport {
                    declared_charset: &preprocessed.declared_charset,
                    anomalies: &preprocessed.anomalies,
                    warnings: &preprocessed.warnings,
                    script_fragments: preprocessed.script_fragments.len(),
                    normalized_html: &input.html,
                },
                pretty,
            )
        },
        Command::Cache { command } => {
            let cache = open_cache(config)?;
            match command {
                CacheCommand::List => {
                    for entry in cache.list().or_raise(|| ErrorKind::Cache)? {
                        println!(
                            "{}\t{}\t{}",
                            entry.key,
                            entry.source_name.as_deref().unwrap_or("-"),
                            entry.created_at
                        );
                    }
                },
                CacheCommand::Clear => {
                    let removed = cache.clear().or_raise(|| ErrorKind::Cache)?;
                    println!("Removed {removed} cached entries");
                },
                CacheCommand::Delete { key } => {
                    let key = DocumentKey::parse(&key).or_raise(|| ErrorKind::Cache)?;
                    if cache.delete(&key).or_raise(|| ErrorKind::Cache)? {
                        println!("Deleted {key}");
                    } else {
                        println!("No cached entry for {key}");
                    }
                },
            }
            Ok(())
        },
    }
}

#[derive(Serialize)]
struct PreprocessReport<'a> {
    declared_charset: &'a str,
    anomalies: &'a [String],
    warnings: &'a [String],
    script_fragments: usize,
    normalized_html: &'a str,
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).or_raise(|| ErrorKind::Read(path.to_path_buf()))
}

fn open_cache(config: &Config) -> Result<FileCache> {
    FileCache::open(&config.cache.dir).or_raise(|| ErrorKind::Cache)
}

/// Reads metadata given inline or, with a leading `@`, from a file.
fn parse_metadata(argument: &str) -> Result<Metadata> {
    let json = match argument.strip_prefix('@') {
        Some(path) => {
            let path = Path::new(path);
            std::fs::read_to_string(path).or_raise(|| ErrorKind::Read(path.to_path_buf()))?
        },
        None => argument.to_string(),
    };
    let value: serde_json::Value =
        serde_json::from_str(&json).or_raise(|| ErrorKind::Metadata("not valid JSON".to_string()))?;
    if !value.is_object() {
        exn::bail!(ErrorKind::Metadata("expected a JSON object".to_string()));
    }
    Ok(Metadata::from_response(&value, DEFAULT_CHARSET))
}

fn print_json(value: &impl Serialize, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .or_raise(|| ErrorKind::Output)?;
    println!("{json}");
    Ok(())
}
