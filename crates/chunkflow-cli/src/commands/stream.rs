use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, bail};
use chunkflow_core::{ChunkflowConfig, StorageSettings};
use chunkflow_driver::{FetchSummary, LoopbackTransport, Method, StreamingDriver, TransferOptions};
use chunkflow_provider::{BackendHint, ProviderFactory};
use serde::Serialize;

use super::init::CONFIG_FILE;

const ROUTE: &str = "/stream";

pub struct StreamArgs<'a> {
    pub path: &'a str,
    pub config: Option<&'a str>,
    pub root: Option<&'a str>,
    pub backend: &'a str,
    pub buffer_size: Option<usize>,
    pub chunk: Option<usize>,
    pub output: Option<&'a str>,
    pub format: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamReport {
    path: String,
    mime_type: String,
    content_length: u64,
    bytes: u64,
    chunks: usize,
    buffer_size: usize,
    outcome: String,
    elapsed_ms: u64,
}

pub fn stream(args: &StreamArgs<'_>) -> anyhow::Result<()> {
    let (config, base) = load_config(args.config)?;
    let mut streaming = config.streaming_settings()?;
    if let Some(size) = args.buffer_size {
        streaming.buffer_size = size;
    }
    let storage = storage_settings(&config, &base, args.root)?;
    let hint = parse_backend(args.backend)?;
    let format = parse_format(args.format)?;

    let transport = LoopbackTransport::new().with_max_chunk(args.chunk.unwrap_or(streaming.buffer_size));
    let mut driver = StreamingDriver::with_settings(transport, &streaming)?
        .with_factory(ProviderFactory::from_settings(&storage));

    let options = TransferOptions::new().with_progress(|transferred, total| {
        tracing::debug!(transferred, total, "progress");
    });

    let started = Instant::now();
    let handle = driver
        .stream_file(ROUTE, Method::Get, args.path, hint, options)
        .with_context(|| format!("failed to stream {}", args.path))?;

    let summary = match args.output {
        Some(output) => {
            let file = File::create(output).with_context(|| format!("failed to create {output}"))?;
            fetch(&mut driver, &mut BufWriter::new(file))?
        }
        None => fetch(&mut driver, &mut io::stdout().lock())?,
    };

    let report = StreamReport {
        path: args.path.to_string(),
        mime_type: summary.mime_type.clone(),
        content_length: summary.content_length,
        bytes: summary.bytes_written,
        chunks: summary.chunks,
        buffer_size: handle.buffer_size(),
        outcome: handle
            .outcome()
            .map(|outcome| outcome.as_str().to_string())
            .unwrap_or_else(|| "active".to_string()),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    let rendered = render(&report, format)?;
    if args.output.is_some() {
        println!("{rendered}");
    } else {
        eprintln!("{rendered}");
    }

    if summary.is_short() {
        bail!(
            "transfer ended early: {} of {} bytes",
            summary.bytes_written,
            summary.content_length
        );
    }
    Ok(())
}

fn fetch<W: Write>(
    driver: &mut StreamingDriver<LoopbackTransport>,
    out: &mut W,
) -> anyhow::Result<FetchSummary> {
    driver
        .transport_mut()
        .fetch_to(Method::Get, ROUTE, out)
        .context("failed to write content")?
        .context("transfer was not registered")
}

/// Load the config file and the directory relative roots resolve against.
fn load_config(path: Option<&str>) -> anyhow::Result<(ChunkflowConfig, PathBuf)> {
    let path = match path {
        Some(path) => PathBuf::from(path),
        None => {
            let default = PathBuf::from(CONFIG_FILE);
            if !default.exists() {
                return Ok((ChunkflowConfig::default(), PathBuf::from(".")));
            }
            default
        }
    };

    let config = ChunkflowConfig::from_file(&path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    let base = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    tracing::debug!(config = %path.display(), "loaded config");
    Ok((config, base))
}

fn storage_settings(
    config: &ChunkflowConfig,
    base: &Path,
    root: Option<&str>,
) -> anyhow::Result<StorageSettings> {
    let mut storage = config.storage_settings()?;
    if let Some(root) = root {
        storage.flash_root = Some(PathBuf::from(root));
    } else {
        storage.flash_root = Some(base.join(storage.flash_root.as_deref().unwrap_or(Path::new("."))));
    }
    storage.removable_root = storage.removable_root.map(|r| base.join(r));
    Ok(storage)
}

fn parse_backend(name: &str) -> anyhow::Result<BackendHint> {
    Ok(match name {
        "auto" => BackendHint::Auto,
        "flash" => BackendHint::Flash,
        "unbuffered" => BackendHint::Unbuffered,
        "removable" => BackendHint::Removable,
        other => bail!("unknown backend {other:?} (expected auto, flash, unbuffered, or removable)"),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
}

fn parse_format(name: &str) -> anyhow::Result<ReportFormat> {
    Ok(match name {
        "text" => ReportFormat::Text,
        "json" => ReportFormat::Json,
        other => bail!("unknown format {other:?} (expected text or json)"),
    })
}

fn render(report: &StreamReport, format: ReportFormat) -> anyhow::Result<String> {
    Ok(match format {
        ReportFormat::Json => serde_json::to_string_pretty(report)?,
        ReportFormat::Text => format!(
            "✓ Streamed {} ({}, {} bytes in {} chunks, {})",
            report.path, report.mime_type, report.bytes, report.chunks, report.outcome
        ),
    })
}
