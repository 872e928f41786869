use std::fmt::Write as _;
use std::time::{Duration, Instant};

use colored::Colorize;
use colrec_recorder::{
    Filter, IngestOutcome, RecorderConfig, RecorderFilter, RecorderHandle, RecorderState,
};
use colrec_store::ArtifactReader;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::cli::*;

/// One line of `record` input.
#[derive(Debug, Deserialize)]
struct Envelope {
    topic: String,
    message: Value,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Record(args) => cmd_record(args),
        Command::Inspect(args) => cmd_inspect(args, &cli.format),
        Command::CheckConfig(args) => cmd_check_config(args, &cli.format),
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<RecorderConfig> {
    Ok(match path {
        Some(path) => RecorderConfig::from_file(path)?,
        None => RecorderConfig::default(),
    })
}

fn cmd_record(args: RecordArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(folder) = args.folder {
        config.folder_path = folder;
    }
    let period = config.health_period();
    let filter = RecorderFilter::new(config)?;
    for (key, value) in filter.info() {
        info!(%key, %value, "recorder");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let (handle, task) = RecorderHandle::spawn(filter, 1024);
        let result = record_loop(&handle, period).await;

        if handle.state().await? == RecorderState::Recording {
            info!("input closed; finalizing open session");
            if let Err(e) = handle.ingest("control", json!({"command": "stop"})).await {
                warn!(kind = %e.kind(), error = %e, "failed to finalize session");
            }
        }
        drop(handle);
        task.await?;
        result
    })
}

async fn record_loop(handle: &RecorderHandle, period: Duration) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => ingest_line(handle, &line).await?,
                    None => break,
                }
            }
            _ = ticker.tick() => {
                if let Some(status) = handle.drain(Instant::now()).await? {
                    println!("{}", serde_json::to_string(&status)?);
                }
            }
        }
    }
    Ok(())
}

/// Rejected messages are logged and skipped; only a dead actor is fatal.
async fn ingest_line(handle: &RecorderHandle, line: &str) -> anyhow::Result<()> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    let envelope: Envelope = match serde_json::from_str(line) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(error = %e, "skipping malformed input line");
            return Ok(());
        }
    };

    match handle.ingest(envelope.topic.as_str(), envelope.message).await {
        Ok(IngestOutcome::Started { path }) => info!(path = %path.display(), "session started"),
        Ok(IngestOutcome::Stopped { path }) => info!(path = %path.display(), "session finalized"),
        Ok(IngestOutcome::Record(outcome)) => debug!(topic = %envelope.topic, ?outcome, "record"),
        Err(colrec_recorder::RecorderError::Closed) => anyhow::bail!("recorder stopped unexpectedly"),
        Err(e) => warn!(topic = %envelope.topic, kind = %e.kind(), error = %e, "message rejected"),
    }
    Ok(())
}

fn cmd_inspect(args: InspectArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let reader = ArtifactReader::open(&args.path)?;
    match format {
        OutputFormat::Text => print!("{}", render_text(&reader, args.rows)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&render_json(&reader, args.rows))?),
    }
    Ok(())
}

fn render_text(reader: &ArtifactReader, rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", reader.path().display().to_string().bold());
    if reader.trailing_bytes() > 0 {
        let _ = writeln!(
            out,
            "  {} {} trailing bytes after the last complete frame",
            "!".yellow().bold(),
            reader.trailing_bytes()
        );
    }
    let groups = reader.groups();
    if groups.is_empty() {
        let _ = writeln!(out, "  (no groups)");
    }
    for group in groups {
        let _ = writeln!(out, "  {}", group.cyan().bold());
        for field in reader.fields(&group) {
            let Some(dataset) = reader.dataset(&group, &field) else {
                continue;
            };
            let _ = writeln!(
                out,
                "    {:<24} {:<16} {} rows, {} chunks",
                field,
                dataset.schema.to_string().green(),
                dataset.row_count(),
                dataset.chunks
            );
            for value in dataset.column.rows(dataset.schema.shape).iter().take(rows) {
                let _ = writeln!(out, "      {}", value.to_json());
            }
        }
    }
    out
}

fn render_json(reader: &ArtifactReader, rows: usize) -> Value {
    let mut groups = serde_json::Map::new();
    for group in reader.groups() {
        let mut fields = serde_json::Map::new();
        for field in reader.fields(&group) {
            let Some(dataset) = reader.dataset(&group, &field) else {
                continue;
            };
            let mut entry = json!({
                "schema": dataset.schema.to_string(),
                "rows": dataset.row_count(),
                "chunks": dataset.chunks,
            });
            if rows > 0 {
                let values: Vec<Value> = dataset
                    .column
                    .rows(dataset.schema.shape)
                    .iter()
                    .take(rows)
                    .map(|v| v.to_json())
                    .collect();
                entry["values"] = Value::Array(values);
            }
            fields.insert(field, entry);
        }
        groups.insert(group, Value::Object(fields));
    }
    json!({
        "path": reader.path().display().to_string(),
        "trailing_bytes": reader.trailing_bytes(),
        "groups": groups,
    })
}

fn cmd_check_config(args: CheckConfigArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = RecorderConfig::from_file(&args.path)?;
    let filter = RecorderFilter::new(config)?;
    match format {
        OutputFormat::Text => {
            println!("{} {} is valid", "✓".green().bold(), args.path.display());
            for (key, value) in filter.info() {
                println!("  {}: {}", key.bold(), value);
            }
        }
        OutputFormat::Json => {
            let out = json!({
                "valid": true,
                "info": filter.info(),
                "config": filter.config(),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
