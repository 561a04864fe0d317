use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::RecordError;

/// The fields of a Google Takeout sidecar this tool cares about.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidecarRecord {
    /// Original filename as uploaded; informational only.
    #[serde(default)]
    pub title: Option<String>,
    pub photo_taken_time: TakenTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TakenTime {
    pub timestamp: Epoch,
}

/// Takeout writes the epoch as a decimal string; older exports and other
/// tools write a number.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Epoch {
    Seconds(i64),
    Text(String),
}

impl Epoch {
    pub fn seconds(&self) -> Option<i64> {
        match self {
            Epoch::Seconds(s) => Some(*s),
            Epoch::Text(s) => s.trim().parse().ok(),
        }
    }
}

pub fn parse_sidecar(bytes: &[u8]) -> Result<SidecarRecord, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Read and parse a sidecar. Any failure is a per-record `MalformedMetadata`.
pub fn read_sidecar(path: &Path) -> Result<SidecarRecord, RecordError> {
    let bytes = fs::read(path).map_err(|e| RecordError::MalformedMetadata {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_sidecar(&bytes).map_err(|e| RecordError::MalformedMetadata {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// `album/IMG_0001.jpg.json` declares `album/IMG_0001.jpg`.
pub fn declared_path(sidecar: &Path, sidecar_ext: &str) -> Option<PathBuf> {
    let ext = sidecar.extension()?.to_str()?;
    if !ext.eq_ignore_ascii_case(sidecar_ext) {
        return None;
    }
    Some(sidecar.with_file_name(sidecar.file_stem()?))
}
