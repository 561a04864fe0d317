pub mod archive;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod date;
pub mod dedup;
pub mod error;
pub mod extras;
pub mod fsops;
pub mod matcher;
pub mod reconcile;
pub mod report;

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use cancel::{CancellationToken, CancelledError};
pub use classify::{Classifier, Disposition};
pub use config::{Config, LabelZone, MatchStrategy, SamenessMode};
pub use error::{ConfigError, RecordError};
pub use reconcile::Reconciler;

/// Counts for one run. Every media file that was handled shows up in exactly
/// one of `relocated`, `duplicates` or `overflow`; every sidecar in
/// `relocated`/`duplicates` (as its media), `deferred` or `malformed`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    pub archives_extracted: u64,
    pub exports: u64,
    pub albums: u64,
    pub sidecars: u64,
    pub relocated: u64,
    pub duplicates: u64,
    pub overflow: u64,
    pub deferred: u64,
    pub deferred_resolved: u64,
    pub malformed: u64,
    pub vanished: u64,
    pub albums_removed: u64,
    pub albums_left: u64,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Summary {
    pub fn record(&mut self, disposition: &Disposition) {
        match disposition {
            Disposition::Relocated(_) => self.relocated += 1,
            Disposition::DeletedDuplicate(_) => self.duplicates += 1,
            Disposition::Deferred(_) => self.deferred += 1,
            Disposition::Overflow(_) => self.overflow += 1,
            Disposition::Vanished => self.vanished += 1,
        }
    }

    /// Count a recovered per-record error and keep its message.
    pub fn skip(&mut self, error: &RecordError) {
        match error {
            RecordError::MalformedMetadata { .. } => self.malformed += 1,
            RecordError::DirectoryNotEmpty { .. } => self.albums_left += 1,
            _ => {}
        }
        self.warnings.push(error.to_string());
    }

    /// Media files that left the export tree this run.
    pub fn media_placed(&self) -> u64 {
        self.relocated + self.duplicates + self.overflow
    }
}

/// Control options for process execution.
#[derive(Debug, Clone, Default)]
pub struct ProcessControl {
    /// Cancellation token checked between records.
    pub cancel_token: Option<CancellationToken>,
}

impl ProcessControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }
}

/// Type alias for progress callback: `(stage, current, total, message)`.
pub type ProgressCallback = dyn Fn(&str, u64, u64, &str) + Send + Sync;

/// Throttled progress reporter; emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback,
    last_emit: Cell<Option<Instant>>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback) -> Self {
        Self {
            inner,
            last_emit: Cell::new(None),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            if let Some(last) = self.last_emit.get() {
                if last.elapsed() < Duration::from_millis(200) {
                    return;
                }
            }
            self.last_emit.set(Some(Instant::now()));
        }
        (self.inner)(stage, current, total, message);
    }
}

/// An extracted export: `<root>/<export>` and its album parent.
struct Export {
    dir: PathBuf,
    albums_root: PathBuf,
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>, RecordError> {
    let entries = fs::read_dir(dir).map_err(|e| RecordError::from_io(dir, e))?;
    let mut dirs: Vec<PathBuf> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    Ok(dirs)
}

/// Export folders under the root, skipping this tool's own folders and
/// anything without the Takeout layout.
fn find_exports(config: &Config, summary: &mut Summary) -> Result<Vec<Export>, RecordError> {
    let extracted = config
        .archive_dir
        .as_ref()
        .map(|d| d.join(archive::EXTRACTED_FOLDER));
    let mut exports = Vec::new();
    for dir in sorted_subdirs(&config.root)? {
        let reserved = dir
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| config.is_reserved_folder(n));
        if reserved || extracted.as_ref().is_some_and(|e| same_dir(e, &dir)) {
            continue;
        }
        let albums_root = dir.join(&config.takeout_subpath);
        if !albums_root.is_dir() {
            let message = format!(
                "{} does not follow the Takeout layout (no {}), skipped",
                dir.display(),
                config.takeout_subpath.display()
            );
            warn!("{}", message);
            summary.warnings.push(message);
            continue;
        }
        exports.push(Export { dir, albums_root });
    }
    Ok(exports)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run the full pipeline with progress reporting.
pub fn process(config: &Config, progress_callback: &ProgressCallback) -> anyhow::Result<Summary> {
    process_with_control(config, &ProcessControl::default(), progress_callback)
}

/// Run the full pipeline: extract, first pass over every album of every
/// export, second pass over the same albums, then prune drained exports.
pub fn process_with_control(
    config: &Config,
    control: &ProcessControl,
    progress_callback: &ProgressCallback,
) -> anyhow::Result<Summary> {
    config.validate()?;
    let tp = ThrottledProgress::new(progress_callback);
    let cancel = control.cancel_token.as_ref();
    let mut summary = Summary::default();

    if let Some(archive_dir) = &config.archive_dir {
        summary.archives_extracted = archive::extract_archives(archive_dir, &config.root, &tp)?;
    }

    let exports = find_exports(config, &mut summary)?;
    let mut albums = Vec::new();
    for export in &exports {
        albums.extend(sorted_subdirs(&export.albums_root)?);
    }
    summary.exports = exports.len() as u64;
    summary.albums = albums.len() as u64;
    info!(exports = exports.len(), albums = albums.len(), "starting");

    let total = albums.len() as u64;
    let classifier = Classifier::new(config);
    for (i, album) in albums.iter().enumerate() {
        tp.report("classify", i as u64, total, &display_name(album));
        classifier.classify_album(album, &mut summary, cancel)?;
    }

    let reconciler = Reconciler::new(&classifier);
    for (i, album) in albums.iter().enumerate() {
        tp.report("reconcile", i as u64, total, &display_name(album));
        reconciler.reconcile_album(album, &mut summary, cancel)?;
    }

    if config.remove_empty_exports {
        for export in &exports {
            let removed = fsops::prune_empty_dirs(&export.dir);
            debug!(export = %export.dir.display(), removed, "pruned empty directories");
        }
    }

    info!(
        relocated = summary.relocated,
        duplicates = summary.duplicates,
        overflow = summary.overflow,
        deferred = summary.deferred,
        "done"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn quiet(_: &str, _: u64, _: u64, _: &str) {}

    #[test]
    fn test_throttled_progress_always_emits_completion() {
        let seen = std::sync::Arc::new(Mutex::new(Vec::new()));
        let seen_cb = std::sync::Arc::clone(&seen);
        let cb = move |stage: &str, current: u64, _total: u64, _msg: &str| {
            seen_cb.lock().unwrap().push((stage.to_string(), current));
        };
        let tp = ThrottledProgress::new(&cb);
        tp.report("classify", 0, 3, "a");
        tp.report("classify", 1, 3, "b");
        tp.report("classify", 2, 3, "c");

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.first(), Some(&("classify".to_string(), 0)));
        assert_eq!(seen.last(), Some(&("classify".to_string(), 2)));
        assert!(seen.len() < 3);
    }

    #[test]
    fn test_summary_skip_counts() {
        let mut summary = Summary::default();
        summary.skip(&RecordError::MalformedMetadata {
            path: PathBuf::from("a.json"),
            reason: "bad".to_string(),
        });
        summary.skip(&RecordError::DirectoryNotEmpty {
            path: PathBuf::from("album"),
            remaining: 2,
        });
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.albums_left, 1);
        assert_eq!(summary.warnings.len(), 2);
    }

    #[test]
    fn test_non_takeout_export_is_skipped() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("random-folder/stuff")).unwrap();
        fs::create_dir_all(dir.path().join("Photos/2024")).unwrap();

        let summary = process(&Config::new(dir.path()), &quiet).unwrap();
        assert_eq!(summary.exports, 0);
        assert_eq!(summary.warnings.len(), 1);
        assert!(summary.warnings[0].contains("random-folder"));
        assert!(dir.path().join("random-folder/stuff").exists());
    }

    #[test]
    fn test_missing_root_is_rejected() {
        let config = Config::new("/nonexistent/photosort-root");
        assert!(process(&config, &quiet).is_err());
    }
}
