//! Artifact manager for persisting report outputs.
//!
//! Each publish writes `<stem>-<timestamp>-v1.json` and `.md`, then copies
//! both over `<stem>-latest-v1.{json,md}`. Timestamped files are never
//! rewritten, so a crash mid-publish leaves the previous latest intact.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::reports::{Report, REPORT_VERSION};

/// Artifact paths returned after publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
    pub latest_json: PathBuf,
    pub latest_markdown: PathBuf,
}

/// Manages writing and reading report artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir).with_context(|| {
            format!(
                "Failed to create artifact output directory {}",
                output_dir.display()
            )
        })?;
        Ok(Self { output_dir })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write the timestamped JSON and Markdown, then refresh the latest aliases.
    pub fn publish<R: Report>(&self, report: &R) -> Result<ArtifactPaths> {
        let slug = timestamp_slug(report.generated_at());
        let json = self.path_for(R::STEM, &slug, "json");
        let markdown = self.path_for(R::STEM, &slug, "md");

        let body = serde_json::to_string_pretty(report)
            .with_context(|| format!("Failed to serialize {} report", R::STEM))?;
        std::fs::write(&json, body)
            .with_context(|| format!("Failed to write {}", json.display()))?;
        std::fs::write(&markdown, report.render_markdown())
            .with_context(|| format!("Failed to write {}", markdown.display()))?;

        let latest_json = self.latest_path(R::STEM, "json");
        let latest_markdown = self.latest_path(R::STEM, "md");
        std::fs::copy(&json, &latest_json)
            .with_context(|| format!("Failed to update {}", latest_json.display()))?;
        std::fs::copy(&markdown, &latest_markdown)
            .with_context(|| format!("Failed to update {}", latest_markdown.display()))?;

        info!(json = %json.display(), markdown = %markdown.display(), "artifacts written");
        Ok(ArtifactPaths {
            json,
            markdown,
            latest_json,
            latest_markdown,
        })
    }

    /// The latest JSON artifact for `stem`.
    ///
    /// Returns `Ok(None)` when nothing has been published yet. A missing or
    /// unparseable latest alias falls back to the newest timestamped file
    /// that parses.
    pub fn read_latest(&self, stem: &str) -> Result<Option<serde_json::Value>> {
        let latest = self.latest_path(stem, "json");
        if latest.exists() {
            match read_json(&latest) {
                Ok(value) => return Ok(Some(value)),
                Err(err) => warn!(path = %latest.display(), error = %err, "latest artifact unreadable"),
            }
        }

        for path in self.history(stem)?.iter().rev() {
            match read_json(path) {
                Ok(value) => {
                    info!(path = %path.display(), "using previous artifact");
                    return Ok(Some(value));
                }
                Err(err) => warn!(path = %path.display(), error = %err, "skipping unreadable artifact"),
            }
        }
        Ok(None)
    }

    /// Timestamped JSON artifacts for `stem`, oldest first.
    pub fn history(&self, stem: &str) -> Result<Vec<PathBuf>> {
        let prefix = format!("{stem}-");
        let suffix = format!("-{REPORT_VERSION}.json");
        let latest_name = format!("{stem}-latest-{REPORT_VERSION}.json");

        let entries = std::fs::read_dir(&self.output_dir).with_context(|| {
            format!("Failed to list artifact directory {}", self.output_dir.display())
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.context("Failed to read artifact directory entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_timestamped = name.starts_with(&prefix)
                && name.ends_with(&suffix)
                && name != latest_name
                && name[prefix.len()..]
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_digit());
            if is_timestamped {
                paths.push(entry.path());
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn path_for(&self, stem: &str, slug: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{stem}-{slug}-{REPORT_VERSION}.{ext}"))
    }

    fn latest_path(&self, stem: &str, ext: &str) -> PathBuf {
        self.output_dir
            .join(format!("{stem}-latest-{REPORT_VERSION}.{ext}"))
    }
}

/// File-name-safe form of an ISO timestamp.
pub fn timestamp_slug(generated_at: &str) -> String {
    generated_at.replace(':', "-")
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
