use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::RecordError;

/// `mkdir -p`; an existing directory is fine.
pub fn ensure_dir(path: &Path) -> Result<(), RecordError> {
    fs::create_dir_all(path).map_err(|source| RecordError::Filesystem {
        path: path.to_path_buf(),
        source,
    })
}

/// Move `src` to `dst`. The caller has already made sure `dst` is free.
///
/// A missing source surfaces as `NotFound`. `rename` fails across
/// filesystems, so fall back to a verified copy, then remove the source.
pub fn move_file(src: &Path, dst: &Path) -> io::Result<()> {
    fs::symlink_metadata(src)?;
    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }
    copy_into_place(src, dst)?;
    fs::remove_file(src)
}

/// `dir/IMG.jpg` is staged as `dir/.IMG.jpg.partial`.
fn staging_path(dst: &Path) -> PathBuf {
    let mut name = std::ffi::OsString::from(".");
    name.push(dst.file_name().unwrap_or_default());
    name.push(".partial");
    dst.with_file_name(name)
}

/// Copy through a staging name and rename into place only once the size
/// checks out. `dst` never holds a truncated file, so a resumed run cannot
/// mistake one for an existing copy.
fn copy_into_place(src: &Path, dst: &Path) -> io::Result<()> {
    let staging = staging_path(dst);
    let copied = fs::metadata(src).and_then(|meta| {
        let written = fs::copy(src, &staging)?;
        if written != meta.len() {
            return Err(io::Error::other(format!(
                "copy verification failed: source {} bytes, dest {} bytes",
                meta.len(),
                written
            )));
        }
        fs::rename(&staging, dst)
    });
    if copied.is_err() {
        let _ = fs::remove_file(&staging);
    }
    copied
}

pub fn remove_file(path: &Path) -> io::Result<()> {
    fs::remove_file(path)
}

/// Best effort: a file whose timestamp cannot be set is still correctly placed.
pub fn set_mtime(path: &Path, timestamp: i64) {
    let ft = filetime::FileTime::from_unix_time(timestamp, 0);
    if let Err(e) = filetime::set_file_mtime(path, ft) {
        debug!(path = %path.display(), error = %e, "could not set modification time");
    }
}

/// Remove `dir` if it is empty. A directory that still holds entries, or
/// cannot be removed for another reason, is left in place and reported.
pub fn remove_empty_dir(dir: &Path) -> Result<(), RecordError> {
    match fs::remove_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            let remaining = fs::read_dir(dir).map(|it| it.count()).unwrap_or(0);
            if remaining == 0 {
                warn!(dir = %dir.display(), error = %e, "could not remove directory");
            }
            Err(RecordError::DirectoryNotEmpty {
                path: dir.to_path_buf(),
                remaining,
            })
        }
    }
}

/// Remove every empty directory under and including `dir`, deepest first.
/// Returns how many were removed. Directories holding files are kept.
pub fn prune_empty_dirs(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    let mut removed = 0;
    for entry in entries.flatten() {
        if entry.file_type().is_ok_and(|t| t.is_dir()) {
            removed += prune_empty_dirs(&entry.path());
        }
    }
    if fs::remove_dir(dir).is_ok() {
        removed += 1;
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Photos/2024/02 - February 2024");
        ensure_dir(&target).unwrap();
        ensure_dir(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_move_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        let dst = dir.path().join("b.jpg");
        fs::write(&src, b"photo").unwrap();
        move_file(&src, &dst).unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"photo");
    }

    #[test]
    fn test_move_missing_source_is_not_found() {
        let dir = tempdir().unwrap();
        let err = move_file(&dir.path().join("gone.jpg"), &dir.path().join("b.jpg")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_copy_into_place_is_atomic() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.jpg");
        fs::write(&src, b"photo").unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();

        // A leftover staging file from an interrupted run is replaced.
        fs::write(out.join(".a.jpg.partial"), b"ph").unwrap();
        copy_into_place(&src, &out.join("a.jpg")).unwrap();
        assert_eq!(fs::read(out.join("a.jpg")).unwrap(), b"photo");
        assert!(!out.join(".a.jpg.partial").exists());
        assert!(src.exists());
    }

    #[test]
    fn test_failed_copy_leaves_no_destination() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("b.jpg");
        fs::write(&src, b"photo").unwrap();
        let out = dir.path().join("out");
        fs::create_dir(&out).unwrap();
        // The staging name is blocked, so the copy itself fails.
        fs::create_dir(out.join(".b.jpg.partial")).unwrap();

        assert!(copy_into_place(&src, &out.join("b.jpg")).is_err());
        assert!(!out.join("b.jpg").exists());
        assert_eq!(fs::read(&src).unwrap(), b"photo");
    }

    #[test]
    fn test_set_mtime() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jpg");
        fs::write(&path, b"photo").unwrap();
        set_mtime(&path, 1709150400);
        let meta = fs::metadata(&path).unwrap();
        let mtime = filetime::FileTime::from_last_modification_time(&meta);
        assert_eq!(mtime.unix_seconds(), 1709150400);
    }

    #[test]
    fn test_remove_empty_dir_reports_leftovers() {
        let dir = tempdir().unwrap();
        let album = dir.path().join("Album");
        fs::create_dir(&album).unwrap();
        fs::write(album.join("left.json"), b"{}").unwrap();

        let err = remove_empty_dir(&album).unwrap_err();
        assert!(matches!(err, RecordError::DirectoryNotEmpty { remaining: 1, .. }));
        assert!(album.exists());

        fs::remove_file(album.join("left.json")).unwrap();
        remove_empty_dir(&album).unwrap();
        assert!(!album.exists());
        remove_empty_dir(&album).unwrap();
    }

    #[test]
    fn test_prune_keeps_files() {
        let dir = tempdir().unwrap();
        let export = dir.path().join("takeout-001");
        fs::create_dir_all(export.join("Takeout/Google Photos/Empty")).unwrap();
        fs::create_dir_all(export.join("Takeout/Google Photos/Kept")).unwrap();
        fs::write(export.join("Takeout/Google Photos/Kept/x.json"), b"{}").unwrap();

        assert_eq!(prune_empty_dirs(&export), 1);
        assert!(export.join("Takeout/Google Photos/Kept/x.json").exists());
        assert!(!export.join("Takeout/Google Photos/Empty").exists());
    }
}
