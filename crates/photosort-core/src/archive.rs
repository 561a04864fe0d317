use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Component, Path, PathBuf};

use encoding_rs::SHIFT_JIS;
use tracing::{info, warn};

use crate::dedup::{self, NeverSameOracle, Resolution};
use crate::fsops;
use crate::ThrottledProgress;

/// Folder inside the archive directory that receives processed zips.
pub const EXTRACTED_FOLDER: &str = "Extracted";

/// Decode ZIP entry name, trying UTF-8 first, then Shift_JIS
fn decode_zip_name(entry: &zip::read::ZipFile) -> String {
    let raw = entry.name_raw();

    if let Ok(s) = std::str::from_utf8(raw) {
        return s.to_string();
    }

    // Japanese Windows zippers write Shift_JIS without flagging it
    let (decoded, _, had_errors) = SHIFT_JIS.decode(raw);
    if !had_errors {
        return decoded.into_owned();
    }

    String::from_utf8_lossy(raw).into_owned()
}

/// Entry name as a relative path that stays inside the destination, or
/// `None` for names with `..`, roots or drive prefixes.
fn safe_relative(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

/// Extract one zip into `<dest_root>/<zip stem>/`. Existing files are
/// overwritten so an interrupted extraction can simply be repeated.
pub fn extract_archive(zip_path: &Path, dest_root: &Path) -> anyhow::Result<PathBuf> {
    let stem = zip_path
        .file_stem()
        .ok_or_else(|| anyhow::anyhow!("archive has no name: {}", zip_path.display()))?;
    // canonicalize yields a verbatim path on Windows, which lifts MAX_PATH.
    let dest = fs::canonicalize(dest_root)?.join(stem);
    fs::create_dir_all(&dest)?;

    let mut archive = zip::ZipArchive::new(File::open(zip_path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = decode_zip_name(&entry);
        let Some(relative) = safe_relative(&name) else {
            warn!(archive = %zip_path.display(), entry = %name, "skipping unsafe entry");
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&target)?);
        io::copy(&mut entry, &mut out)?;
    }
    Ok(dest)
}

/// Extract every `*.zip` in `archive_dir` under `dest_root`, then move each
/// into `<archive_dir>/Extracted/`. Returns how many archives were extracted.
pub fn extract_archives(
    archive_dir: &Path,
    dest_root: &Path,
    progress: &ThrottledProgress,
) -> anyhow::Result<u64> {
    let mut zips: Vec<PathBuf> = fs::read_dir(archive_dir)?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
        })
        .collect();
    zips.sort();

    let done_dir = archive_dir.join(EXTRACTED_FOLDER);
    fsops::ensure_dir(&done_dir)?;

    let total = zips.len() as u64;
    for (i, zip_path) in zips.iter().enumerate() {
        let name = zip_path.file_name().unwrap_or_default().to_string_lossy();
        progress.report("extract", i as u64, total, &format!("Extracting {}", name));
        let dest = extract_archive(zip_path, dest_root)?;
        info!(archive = %zip_path.display(), to = %dest.display(), "extracted");

        let desired = done_dir.join(zip_path.file_name().unwrap_or_default());
        let (Resolution::Free(done) | Resolution::Duplicate(done)) =
            dedup::resolve(zip_path, &desired, &NeverSameOracle)?;
        fsops::move_file(zip_path, &done)?;
    }
    Ok(total)
}
