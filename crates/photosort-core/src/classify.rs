//! First pass: one album at a time, one sidecar at a time.
//!
//! ```text
//! Unprocessed --match--> MatchedImage --label+dedup--> Relocated | DeletedDuplicate
//!             \-------> Unmatched ----------------> Deferred (sidecar to Lost)
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::date::json::{declared_path, read_sidecar};
use crate::date::{Capture, TimestampResolver};
use crate::dedup::{self, ByteOracle, Resolution, SamenessOracle};
use crate::error::RecordError;
use crate::fsops;
use crate::matcher::{self, IdentityMatcher};
use crate::Summary;

/// Where a record ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Media moved into its dated folder.
    Relocated(PathBuf),
    /// Media deleted; an identical file already lives at this path.
    DeletedDuplicate(PathBuf),
    /// Sidecar parked in the Lost pool at this path.
    Deferred(PathBuf),
    /// Media moved into the Unknown folder.
    Overflow(PathBuf),
    /// Source was already gone (re-run after partial completion).
    Vanished,
}

/// Composes matching, timestamp resolution and duplicate resolution into
/// per-record moves and deletes.
pub struct Classifier {
    config: Config,
    matcher: Box<dyn IdentityMatcher>,
    oracle: Box<dyn SamenessOracle>,
    resolver: TimestampResolver,
}

impl Classifier {
    pub fn new(config: &Config) -> Self {
        Self::with_strategies(
            config,
            matcher::matcher_for(config),
            dedup::oracle_for(config.sameness),
        )
    }

    /// Build with explicit matching and sameness strategies.
    pub fn with_strategies(
        config: &Config,
        matcher: Box<dyn IdentityMatcher>,
        oracle: Box<dyn SamenessOracle>,
    ) -> Self {
        Self {
            config: config.clone(),
            matcher,
            oracle,
            resolver: TimestampResolver::from_config(config),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn resolver(&self) -> &TimestampResolver {
        &self.resolver
    }

    /// Process one sidecar.
    pub fn classify(&self, sidecar: &Path) -> Result<Disposition, RecordError> {
        let declared = declared_path(sidecar, &self.config.sidecar_ext).ok_or_else(|| {
            RecordError::MalformedMetadata {
                path: sidecar.to_path_buf(),
                reason: "sidecar name declares no media file".to_string(),
            }
        })?;
        let record = read_sidecar(sidecar)?;
        let capture = self.resolver.resolve_sidecar(sidecar, &record)?;

        let Some(media) = self.matcher.locate(&declared) else {
            let unmatched = RecordError::UnmatchedMedia { declared };
            debug!(
                error = %unmatched,
                title = record.title.as_deref().unwrap_or_default(),
                "deferring sidecar"
            );
            return self.defer(sidecar);
        };

        let disposition = self.place_dated(&media, &capture)?;
        discard(sidecar)?;
        Ok(disposition)
    }

    /// Move `media` into its month folder, or delete it if that folder
    /// already holds the same file.
    pub fn place_dated(&self, media: &Path, capture: &Capture) -> Result<Disposition, RecordError> {
        let Some(name) = media.file_name() else {
            return Ok(Disposition::Vanished);
        };
        let dir = self.config.dated_dir(&capture.label);
        fsops::ensure_dir(&dir)?;

        match dedup::resolve(media, &dir.join(name), self.oracle.as_ref())? {
            Resolution::Free(dest) => {
                if let Err(e) = fsops::move_file(media, &dest) {
                    return vanished_or(media, e);
                }
                if self.config.preserve_mtime {
                    fsops::set_mtime(&dest, capture.timestamp);
                }
                debug!(from = %media.display(), to = %dest.display(), "relocated");
                Ok(Disposition::Relocated(dest))
            }
            Resolution::Duplicate(existing) => {
                if let Err(e) = fsops::remove_file(media) {
                    return vanished_or(media, e);
                }
                debug!(file = %media.display(), duplicate_of = %existing.display(), "deleted duplicate");
                Ok(Disposition::DeletedDuplicate(existing))
            }
        }
    }

    /// Park an unmatched sidecar in the Lost pool under its own name. A
    /// byte-identical entry already there absorbs it; a different one pushes
    /// it to `name(n).json`.
    fn defer(&self, sidecar: &Path) -> Result<Disposition, RecordError> {
        let Some(name) = sidecar.file_name() else {
            return Ok(Disposition::Vanished);
        };
        let lost = self.config.deferred_dir();
        fsops::ensure_dir(&lost)?;

        match dedup::resolve(sidecar, &lost.join(name), &ByteOracle)? {
            Resolution::Free(dest) => {
                if let Err(e) = fsops::move_file(sidecar, &dest) {
                    return vanished_or(sidecar, e);
                }
                Ok(Disposition::Deferred(dest))
            }
            Resolution::Duplicate(existing) => {
                discard(sidecar)?;
                Ok(Disposition::Deferred(existing))
            }
        }
    }

    /// Run the first pass over one album directory. Per-record failures are
    /// logged and counted; only fatal filesystem errors and cancellation
    /// end the album early.
    pub fn classify_album(
        &self,
        album: &Path,
        summary: &mut Summary,
        cancel: Option<&CancellationToken>,
    ) -> anyhow::Result<()> {
        info!(album = %album.display(), "classifying album");
        for sidecar in self.album_sidecars(album)? {
            if let Some(token) = cancel {
                token.check()?;
            }
            summary.sidecars += 1;
            match self.classify(&sidecar) {
                Ok(disposition) => summary.record(&disposition),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "record skipped");
                    summary.skip(&e);
                }
            }
        }

        let metadata = album.join(&self.config.album_metadata);
        if let Err(e) = fsops::remove_file(&metadata) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(RecordError::from_io(metadata, e).into());
            }
        }
        Ok(())
    }

    /// Per-item sidecars in `album`, sorted by name.
    fn album_sidecars(&self, album: &Path) -> Result<Vec<PathBuf>, RecordError> {
        let entries = fs::read_dir(album).map_err(|e| RecordError::from_io(album, e))?;
        let mut sidecars: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .map(|e| e.path())
            .filter(|p| self.config.is_sidecar(p) && !self.config.is_album_metadata(p))
            .collect();
        sidecars.sort();
        Ok(sidecars)
    }
}

/// Delete a sidecar whose record is finished. Already gone is fine.
pub(crate) fn discard(path: &Path) -> Result<(), RecordError> {
    match fsops::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) => match RecordError::from_io(path, e) {
            RecordError::SourceVanished { .. } => Ok(()),
            fatal => Err(fatal),
        },
    }
}

/// A source that disappeared mid-record is a no-op; anything else is fatal.
pub(crate) fn vanished_or(path: &Path, e: std::io::Error) -> Result<Disposition, RecordError> {
    match RecordError::from_io(path, e) {
        RecordError::SourceVanished { path } => {
            debug!(path = %path.display(), "source vanished");
            Ok(Disposition::Vanished)
        }
        fatal => Err(fatal),
    }
}
