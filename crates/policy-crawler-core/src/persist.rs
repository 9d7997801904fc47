//! Artifact naming and writing.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::fs;
use tracing::debug;

use crate::error::{CrawlError, CrawlResult};

/// Which crawl produced an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Organization,
    Identity,
}

impl ArtifactKind {
    fn suffix(&self) -> &'static str {
        match self {
            ArtifactKind::Organization => "policies",
            ArtifactKind::Identity => "users-groups-profile-policies",
        }
    }

    /// `<epoch-millis>-<profile>-<suffix>.json`
    pub fn file_name(&self, profile: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}.json",
            at.timestamp_millis(),
            sanitize_profile(profile),
            self.suffix()
        )
    }
}

/// Make a profile name safe to embed in a file name.
pub fn sanitize_profile(profile: &str) -> String {
    profile
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Serialize `report` into `dir/file_name`, creating `dir` if needed.
///
/// The file is written to a temporary sibling and renamed into place.
pub async fn save_report<T: Serialize>(
    dir: &Path,
    file_name: &str,
    report: &T,
    pretty: bool,
) -> CrawlResult<PathBuf> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(report)
    } else {
        serde_json::to_vec(report)
    }
    .map_err(|e| CrawlError::Serialize {
        message: e.to_string(),
    })?;

    fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))?;

    let path = dir.join(file_name);
    write_atomic(&path, &bytes).await?;
    debug!(path = %path.display(), bytes = bytes.len(), "report written");
    Ok(path)
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> CrawlResult<()> {
    let base = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CrawlError::Io {
            path: path.display().to_string(),
            message: "path has no file name".to_string(),
        })?;
    let tmp_path = path.with_file_name(format!(".{}.tmp-{}", base, std::process::id()));

    fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| io_error(&tmp_path, e))?;

    if let Err(e) = fs::rename(&tmp_path, path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(io_error(path, e));
    }
    Ok(())
}

fn io_error(path: &Path, err: std::io::Error) -> CrawlError {
    CrawlError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
