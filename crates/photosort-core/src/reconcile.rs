//! Second pass: whatever the first pass left inside an album.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::classify::{discard, vanished_or, Classifier, Disposition};
use crate::date::json::read_sidecar;
use crate::date::Capture;
use crate::dedup::{self, NeverSameOracle, Resolution};
use crate::error::RecordError;
use crate::fsops;
use crate::Summary;

/// Result of sweeping one leftover file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Swept {
    pub disposition: Disposition,
    /// Lost-pool sidecar that supplied the date and was consumed.
    pub consumed: Option<PathBuf>,
}

pub struct Reconciler<'a> {
    classifier: &'a Classifier,
}

impl<'a> Reconciler<'a> {
    pub fn new(classifier: &'a Classifier) -> Self {
        Self { classifier }
    }

    /// Date a leftover media file from the Lost pool or its own tags, then
    /// place it; with no date at all it goes to Unknown.
    pub fn reconcile_file(&self, media: &Path) -> Result<Swept, RecordError> {
        let Some(name) = media.file_name() else {
            return Ok(Swept {
                disposition: Disposition::Vanished,
                consumed: None,
            });
        };

        let (capture, lost_entry) = match self.deferred_capture(media) {
            Some((capture, entry)) => (Some(capture), Some(entry)),
            None => (self.classifier.resolver().resolve_media(media), None),
        };

        let disposition = match capture {
            Some(capture) => self.classifier.place_dated(media, &capture)?,
            None => self.overflow(media, name)?,
        };

        // Consumed only once the media's fate is settled.
        if let Some(entry) = &lost_entry {
            discard(entry)?;
        }
        Ok(Swept {
            disposition,
            consumed: lost_entry,
        })
    }

    /// `Lost/<media name>.json`, if present and readable.
    fn deferred_capture(&self, media: &Path) -> Option<(Capture, PathBuf)> {
        let config = self.classifier.config();
        let mut entry_name = media.file_name()?.to_os_string();
        entry_name.push(".");
        entry_name.push(&config.sidecar_ext);
        let entry = config.deferred_dir().join(entry_name);
        if !entry.is_file() {
            return None;
        }

        let capture = read_sidecar(&entry)
            .and_then(|record| self.classifier.resolver().resolve_sidecar(&entry, &record));
        match capture {
            Ok(capture) => Some((capture, entry)),
            Err(e) => {
                warn!(error = %e, "ignoring unusable Lost entry");
                None
            }
        }
    }

    /// Unknown accepts every name; a collision is renamed, never compared
    /// or overwritten.
    fn overflow(&self, media: &Path, name: &std::ffi::OsStr) -> Result<Disposition, RecordError> {
        let dir = self.classifier.config().overflow_dir();
        fsops::ensure_dir(&dir)?;
        match dedup::resolve(media, &dir.join(name), &NeverSameOracle)? {
            Resolution::Free(dest) | Resolution::Duplicate(dest) => {
                if let Err(e) = fsops::move_file(media, &dest) {
                    return vanished_or(media, e);
                }
                debug!(from = %media.display(), to = %dest.display(), "moved to overflow");
                Ok(Disposition::Overflow(dest))
            }
        }
    }

    /// Sweep every leftover media file in `album`, then try to remove it.
    /// Sidecars still present (malformed records) are left for the user.
    pub fn reconcile_album(
        &self,
        album: &Path,
        summary: &mut Summary,
        cancel: Option<&CancellationToken>,
    ) -> anyhow::Result<()> {
        if !album.is_dir() {
            return Ok(());
        }
        let entries = fs::read_dir(album).map_err(|e| RecordError::from_io(album, e))?;
        let mut leftovers: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
            .map(|e| e.path())
            .filter(|p| !self.classifier.config().is_sidecar(p))
            .collect();
        leftovers.sort();

        if !leftovers.is_empty() {
            info!(album = %album.display(), files = leftovers.len(), "reconciling leftovers");
        }
        for media in leftovers {
            if let Some(token) = cancel {
                token.check()?;
            }
            match self.reconcile_file(&media) {
                Ok(swept) => {
                    if swept.consumed.is_some() {
                        summary.deferred_resolved += 1;
                    }
                    summary.record(&swept.disposition);
                }
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(error = %e, "leftover skipped");
                    summary.skip(&e);
                }
            }
        }

        match fsops::remove_empty_dir(album) {
            Ok(()) => summary.albums_removed += 1,
            Err(e) => {
                warn!(error = %e, "album not removed");
                summary.skip(&e);
            }
        }
        Ok(())
    }
}
