use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use speech_prompt_dataset::shard::{discover_shards, read_prompt_shard};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shard_report")]
#[command(about = "Summarize prompt shards written by the dataset builder")]
struct Args {
    /// Directory holding output shards (searched recursively).
    #[arg(long, env = "SHARD_REPORT_DIR")]
    dir: PathBuf,
    #[arg(long, env = "SHARD_REPORT_EXTENSION", default_value = ".parquet")]
    extension: String,
    /// Write the report as JSON instead of only logging totals.
    #[arg(long, env = "SHARD_REPORT_OUT")]
    out: Option<PathBuf>,
    /// Print the first N prompts found.
    #[arg(long, env = "SHARD_REPORT_SAMPLE", default_value_t = 0)]
    sample: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    generated_at: String,
    dir: String,
    shard_count: usize,
    record_count: usize,
    shards: Vec<ShardEntry>,
    unreadable: Vec<UnreadableShard>,
}

impl Report {
    /// Saves the report as pretty JSON, creating the parent directory.
    fn save(&self, out: &Path) -> Result<(), String> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|err| format!("Cannot encode report: {err}"))?;
        json.push('\n');
        match out.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
                .map_err(|err| format!("Cannot create '{}': {err}", parent.display()))?,
            _ => {}
        }
        fs::write(out, json).map_err(|err| format!("Cannot write '{}': {err}", out.display()))
    }
}

#[derive(Debug, Serialize)]
struct ShardEntry {
    path: String,
    records: usize,
    max_prompt_chars: usize,
}

#[derive(Debug, Serialize)]
struct UnreadableShard {
    path: String,
    error: String,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(err) = run() {
        tracing::error!(error = err.as_str(), "shard report failed");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let args = Args::parse();
    if args.extension.is_empty() {
        return Err("--extension must not be empty.".to_string());
    }

    let paths = discover_shards(&args.dir, &[args.extension.clone()]);
    if paths.is_empty() {
        return Err(format!(
            "No '{}' shards found under '{}'.",
            args.extension,
            args.dir.display()
        ));
    }

    let progress = ProgressBar::new(paths.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );

    let mut shards = Vec::with_capacity(paths.len());
    let mut unreadable = Vec::new();
    let mut samples_left = args.sample;
    for path in &paths {
        progress.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        match read_prompt_shard(path) {
            Ok(records) => {
                for record in records.iter().take(samples_left) {
                    progress.println(format!("--- {}\n{}", path.display(), record.prompt));
                }
                samples_left = samples_left.saturating_sub(records.len());
                shards.push(ShardEntry {
                    path: path.display().to_string(),
                    records: records.len(),
                    max_prompt_chars: records
                        .iter()
                        .map(|r| r.prompt.chars().count())
                        .max()
                        .unwrap_or(0),
                });
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "unreadable shard");
                unreadable.push(UnreadableShard {
                    path: path.display().to_string(),
                    error: err.to_string(),
                });
            }
        }
        progress.inc(1);
    }
    progress.finish_with_message("scan complete");

    let report = Report {
        generated_at: Utc::now().to_rfc3339(),
        dir: args.dir.display().to_string(),
        shard_count: shards.len(),
        record_count: shards.iter().map(|s| s.records).sum(),
        shards,
        unreadable,
    };
    tracing::info!(
        shards = report.shard_count,
        records = report.record_count,
        unreadable = report.unreadable.len(),
        "shard report"
    );

    if let Some(out) = args.out.as_ref() {
        report.save(out)?;
        tracing::info!(path = %out.display(), "wrote report");
    }
    Ok(())
}
