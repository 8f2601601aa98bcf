//! Diagnostic log setup.
//!
//! The interactive front-end owns the terminal, so its diagnostics go to a
//! file. `ask --verbose` logs to stderr instead.

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
    Discard,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Open the writer for `target`. Only a file target can fail.
fn open(target: &LogTarget) -> Result<BoxMakeWriter> {
    let writer = match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        LogTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        LogTarget::Discard => BoxMakeWriter::new(std::io::sink),
    };
    Ok(writer)
}

fn install(writer: BoxMakeWriter, ansi: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(ansi)
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {}", e))
}

/// Install the global subscriber. `RUST_LOG` sets the filter; the default is `info`.
pub fn init(target: LogTarget) -> Result<()> {
    let writer = open(&target)?;
    install(writer, target == LogTarget::Stderr)
}

/// Like [`init`], but an unopenable target falls back to discarding
/// diagnostics. The error that forced the fallback is returned.
pub fn init_or_discard(target: LogTarget) -> Result<Option<anyhow::Error>> {
    match open(&target) {
        Ok(writer) => {
            install(writer, target == LogTarget::Stderr)?;
            Ok(None)
        }
        Err(err) => {
            install(BoxMakeWriter::new(std::io::sink), false)?;
            Ok(Some(err))
        }
    }
}
