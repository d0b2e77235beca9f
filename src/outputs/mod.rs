//! Report generation.
//!
//! # Submodules
//!
//! - [`markdown`]: renders a [`Digest`] as the human-facing markdown report
//! - [`charts`]: mermaid and plain-text charts embedded in that report
//! - [`json`]: serializes a [`Digest`] for machine consumers
//!
//! A report is written only once the whole run has succeeded; a failed run
//! never leaves a partial file behind.

pub mod charts;
pub mod json;
pub mod markdown;

use clap::ValueEnum;
use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

use crate::error::Result;
use crate::models::Digest;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Md,
    Json,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Md => "md",
            ReportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Render `digest` in `format`.
pub fn render(digest: &Digest, format: ReportFormat) -> Result<String> {
    Ok(match format {
        ReportFormat::Md => markdown::render_markdown(digest),
        ReportFormat::Json => json::render_json(digest)?,
    })
}

/// Render `digest` and write it to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display(), %format))]
pub async fn write_report(digest: &Digest, format: ReportFormat, path: &Path) -> Result<()> {
    let contents = render(digest, format)?;
    fs::write(path, contents.as_bytes()).await?;
    info!(bytes = contents.len(), "Wrote report");
    Ok(())
}
