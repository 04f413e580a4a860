use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use vorbis_tag::tag::TagData;
use vorbis_tag::vorbis::{self, ReadOptions};
use vorbis_tag::{config, flac, pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "vorbis-tag",
    version,
    about = "Read, edit and clear Vorbis comments in FLAC files"
)]
struct Cli {
    /// Audio files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Display the current tag and exit
    #[arg(long)]
    show: bool,

    /// Set a field, e.g. `--set ARTIST=Autechre` (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Remove a field (repeatable)
    #[arg(long = "remove", value_name = "KEY")]
    remove: Vec<String>,

    /// Remove every field and picture, keeping the vendor string
    #[arg(long)]
    clear: bool,

    /// Preview changes without writing to files
    #[arg(long)]
    dry_run: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let mut config = config::Config::load(cli.config.as_deref())?;
    if cli.dry_run {
        config.output.dry_run = true;
    }

    let files = pipeline::collect_audio_files(&cli.paths);
    if files.is_empty() {
        anyhow::bail!("No supported audio files found in the specified paths.");
    }

    // Handle --show
    if cli.show || (cli.set.is_empty() && cli.remove.is_empty() && !cli.clear) {
        return show(&files, &ReadOptions::from(&config), cli.json);
    }

    let action = if cli.clear {
        pipeline::Action::Clear
    } else {
        pipeline::Action::Update(pipeline::build_edits(&cli.set, &cli.remove)?)
    };

    log::info!("Found {} file(s) to process", files.len());
    if config.output.dry_run {
        log::info!("DRY RUN: no files will be modified");
    }

    let mut results = Vec::new();
    let total = files.len();

    for (i, path) in files.iter().enumerate() {
        log::info!("[{}/{}] Processing: {}", i + 1, total, path.display());

        let result = pipeline::process_file(path, &action, &config);
        match result.error {
            Some(ref err) => log::error!("  Error: {err}"),
            None if !result.fields_written.is_empty() => {
                log::info!("  Wrote: {}", result.fields_written.join(", "));
            }
            None => {}
        }
        results.push(result);
    }

    // JSON output
    if cli.json {
        let json_results: Vec<serde_json::Value> = results
            .iter()
            .map(|r| {
                serde_json::json!({
                    "path": r.path.display().to_string(),
                    "previous": r.existing.as_ref().map(tag_json),
                    "fields_written": r.fields_written,
                    "backup_path": r.backup_path.as_ref().map(|p| p.display().to_string()),
                    "error": r.error,
                })
            })
            .collect();

        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }

    let success = results.iter().filter(|r| r.error.is_none()).count();
    let failed = total - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} files");

    Ok(())
}

fn show(files: &[PathBuf], options: &ReadOptions, json: bool) -> Result<()> {
    let mut json_results = Vec::new();

    for path in files {
        let tag = match flac::read_flac(path, options) {
            Ok(tag) => tag,
            Err(e) => {
                log::error!("{e:#}");
                continue;
            }
        };

        if json {
            json_results.push(serde_json::json!({
                "path": path.display().to_string(),
                "exists": tag.exists,
                "tag": tag_json(&tag.tag),
            }));
        } else {
            print_tag(path, &tag.tag);
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&json_results)?);
    }
    Ok(())
}

/// Tag as JSON, with the byte count of each picture in place of its data.
fn tag_json(tag: &TagData) -> serde_json::Value {
    let mut value = serde_json::to_value(tag).unwrap_or_default();
    if let Some(pictures) = value.get_mut("pictures").and_then(|p| p.as_array_mut()) {
        for (json, picture) in pictures.iter_mut().zip(&tag.pictures) {
            json["size"] = serde_json::json!(picture.data.len());
        }
    }
    value
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Print a tag as a two-column table.
fn print_tag(path: &std::path::Path, tag: &TagData) {
    println!();
    println!("  {BOLD}{}{RESET}", path.display());
    println!("  {DIM}{}{RESET}", "─".repeat(72));

    for (key, field) in vorbis::FIELD_MAPPING {
        if let Some(value) = tag.get(*field).filter(|v| !v.is_empty()) {
            print_row(key, value);
        }
    }
    for field in tag.additional_fields.iter().filter(|f| !f.marked_for_deletion) {
        print_row(&field.native_key, &field.value);
    }
    for picture in &tag.pictures {
        let summary = format!(
            "{:?} #{} {} {}x{} ({} bytes)",
            picture.pic_type,
            picture.position,
            picture.mime_type,
            picture.width,
            picture.height,
            picture.data.len()
        );
        print_row("PICTURE", &summary);
    }

    println!("  {DIM}{}{RESET}", "─".repeat(72));
}

fn print_row(key: &str, value: &str) {
    println!("  {key:<22} : {value}");
}
