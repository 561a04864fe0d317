use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

use image::{ImageReader, RgbaImage};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::SamenessMode;
use crate::error::RecordError;

/// What sits at a candidate destination, relative to the source being placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    Free,
    Same,
    Different,
}

/// Final answer for one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Move the source here; nothing occupies it.
    Free(PathBuf),
    /// The source is a copy of the file already at this path; delete it.
    Duplicate(PathBuf),
}

/// Decides whether two colliding files are the same item.
pub trait SamenessOracle {
    fn is_same(&self, source: &Path, existing: &Path) -> bool;
}

/// Byte equality first, then decoded pixels. Anything that cannot be
/// decoded on either side (videos, corrupt files) counts as the same, so an
/// unverifiable collision is rejected instead of renamed.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelOracle;

/// Degraded mode: a name collision is always the same file.
#[derive(Debug, Clone, Copy, Default)]
pub struct NameOracle;

/// Exact content equality by SHA-256. Unreadable files are never the same.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteOracle;

/// Every collision is a different file. Used where nothing may be dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSameOracle;

pub fn oracle_for(mode: SamenessMode) -> Box<dyn SamenessOracle> {
    match mode {
        SamenessMode::Pixel => Box::new(PixelOracle),
        SamenessMode::Name => Box::new(NameOracle),
    }
}

impl SamenessOracle for PixelOracle {
    fn is_same(&self, source: &Path, existing: &Path) -> bool {
        if same_bytes(source, existing).unwrap_or(false) {
            return true;
        }
        match (decode(source), decode(existing)) {
            (Ok(a), Ok(b)) => a.dimensions() == b.dimensions() && a.as_raw() == b.as_raw(),
            (Err(e), _) | (_, Err(e)) => {
                debug!(error = %e, "collision treated as duplicate");
                true
            }
        }
    }
}

impl SamenessOracle for NameOracle {
    fn is_same(&self, _source: &Path, _existing: &Path) -> bool {
        true
    }
}

impl SamenessOracle for ByteOracle {
    fn is_same(&self, source: &Path, existing: &Path) -> bool {
        same_bytes(source, existing).unwrap_or(false)
    }
}

impl SamenessOracle for NeverSameOracle {
    fn is_same(&self, _source: &Path, _existing: &Path) -> bool {
        false
    }
}

fn decode(path: &Path) -> Result<RgbaImage, RecordError> {
    let undecodable = || RecordError::UndecodableDuplicateCandidate {
        path: path.to_path_buf(),
    };
    // Skip reading whole videos just to fail the decode.
    let is_video = mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::VIDEO);
    if is_video {
        return Err(undecodable());
    }
    let image = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|_| undecodable())?
        .decode()
        .map_err(|_| undecodable())?;
    Ok(image.to_rgba8())
}

fn file_digest(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn same_bytes(a: &Path, b: &Path) -> io::Result<bool> {
    if fs::metadata(a)?.len() != fs::metadata(b)?.len() {
        return Ok(false);
    }
    Ok(file_digest(a)? == file_digest(b)?)
}

/// `dir/IMG1.JPG` with `n = 2` becomes `dir/IMG1(2).JPG`.
pub fn suffixed(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    let name = match path.extension() {
        Some(ext) => format!("{}({}).{}", stem, n, ext.to_string_lossy()),
        None => format!("{}({})", stem, n),
    };
    path.with_file_name(name)
}

/// Walk `desired`, `stem(1).ext`, `stem(2).ext`, ... and stop at the first
/// candidate that is free or holds the same file.
///
/// Pure over `probe`: the same occupancy answers always give the same
/// result. Each step strictly increases the counter, so the search ends at
/// the first non-`Different` candidate; `None` only if every `u32` suffix is
/// taken by a different file.
pub fn next_free<F>(desired: &Path, mut probe: F) -> Option<Resolution>
where
    F: FnMut(&Path) -> Occupancy,
{
    std::iter::once(desired.to_path_buf())
        .chain((1..=u32::MAX).map(|n| suffixed(desired, n)))
        .find_map(|candidate| match probe(&candidate) {
            Occupancy::Free => Some(Resolution::Free(candidate)),
            Occupancy::Same => Some(Resolution::Duplicate(candidate)),
            Occupancy::Different => None,
        })
}

/// Filesystem occupancy of `candidate` for `source` under `oracle`.
/// A dangling symlink still occupies its name.
pub fn probe(source: &Path, candidate: &Path, oracle: &dyn SamenessOracle) -> Occupancy {
    if fs::symlink_metadata(candidate).is_err() {
        Occupancy::Free
    } else if oracle.is_same(source, candidate) {
        Occupancy::Same
    } else {
        Occupancy::Different
    }
}

/// Decide where `source` goes given that it wants to land at `desired`.
pub fn resolve(
    source: &Path,
    desired: &Path,
    oracle: &dyn SamenessOracle,
) -> Result<Resolution, RecordError> {
    next_free(desired, |candidate| probe(source, candidate, oracle)).ok_or_else(|| {
        RecordError::SuffixExhausted {
            path: desired.to_path_buf(),
        }
    })
}
