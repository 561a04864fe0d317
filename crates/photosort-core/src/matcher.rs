use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{Config, MatchStrategy};
use crate::extras;

/// Takeout caps sidecar names (including the extension) at this many bytes.
const MAX_SIDECAR_NAME: usize = 51;

/// A `(n)` disambiguator directly before an extension.
static BRACKET_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)\.").unwrap());

/// Resolves the filename a sidecar declares to the media file actually on disk.
pub trait IdentityMatcher {
    /// `None` when no candidate exists. Must be deterministic for a given
    /// directory state.
    fn locate(&self, declared: &Path) -> Option<PathBuf>;
}

/// Build the matcher selected by `config.matcher`.
pub fn matcher_for(config: &Config) -> Box<dyn IdentityMatcher> {
    match config.matcher {
        MatchStrategy::Substring => Box::new(SubstringMatcher::new(&config.sidecar_ext)),
        MatchStrategy::Transform => Box::new(TransformMatcher::new(&config.sidecar_ext)),
    }
}

/// Non-sidecar files next to `declared`, sorted by name so the first match
/// does not depend on directory enumeration order.
fn sibling_media(declared: &Path, sidecar_ext: &str) -> Vec<(String, PathBuf)> {
    let dir = match declared.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<(String, PathBuf)> = entries
        .flatten()
        .filter(|e| e.file_type().is_ok_and(|t| t.is_file()))
        .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
        .filter(|(_, path)| {
            !path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(sidecar_ext))
        })
        .collect();
    files.sort();
    files
}

/// Exact name first, then the lexicographically first sibling whose name
/// contains the declared stem. The exporter truncates and decorates long
/// names, so an exact match alone misses many files. A sibling that has its
/// own `<name>.<ext>` sidecar belongs to that sidecar and is never taken.
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    sidecar_ext: String,
}

impl SubstringMatcher {
    pub fn new(sidecar_ext: &str) -> Self {
        Self {
            sidecar_ext: sidecar_ext.to_string(),
        }
    }
}

impl IdentityMatcher for SubstringMatcher {
    fn locate(&self, declared: &Path) -> Option<PathBuf> {
        if declared.is_file() {
            return Some(declared.to_path_buf());
        }
        let stem = declared.file_stem()?.to_string_lossy();
        if stem.is_empty() {
            return None;
        }
        sibling_media(declared, &self.sidecar_ext)
            .into_iter()
            .find(|(name, path)| {
                name.contains(stem.as_ref()) && !has_own_sidecar(path, &self.sidecar_ext)
            })
            .map(|(_, path)| path)
    }
}

fn has_own_sidecar(media: &Path, sidecar_ext: &str) -> bool {
    let mut name = media.as_os_str().to_os_string();
    name.push(".");
    name.push(sidecar_ext);
    Path::new(&name).is_file()
}

/// Undoes the specific renames the exporter applies when pairing sidecars
/// with media, before falling back to substring matching.
#[derive(Debug, Clone)]
pub struct TransformMatcher {
    sidecar_ext: String,
    fallback: SubstringMatcher,
}

impl TransformMatcher {
    pub fn new(sidecar_ext: &str) -> Self {
        Self {
            sidecar_ext: sidecar_ext.to_string(),
            fallback: SubstringMatcher::new(sidecar_ext),
        }
    }

    /// The declared names the exporter could have produced for a media file
    /// called `name`, in order of confidence.
    fn sidecar_names(&self, name: &str) -> [String; 5] {
        [
            shorten_name(name, self.sidecar_ext.len() + 1),
            bracket_swap(name),
            extras::remove_extra(name),
            no_extension(name),
            remove_digit(name),
        ]
    }
}

impl IdentityMatcher for TransformMatcher {
    fn locate(&self, declared: &Path) -> Option<PathBuf> {
        if declared.is_file() {
            return Some(declared.to_path_buf());
        }
        let wanted = declared.file_name()?.to_string_lossy();
        let siblings = sibling_media(declared, &self.sidecar_ext);
        let variants: Vec<[String; 5]> = siblings
            .iter()
            .map(|(name, _)| self.sidecar_names(name))
            .collect();

        // Transformation-major order: a truncation hit on any file beats an
        // "edited" hit on an earlier file.
        for rule in 0..5 {
            if let Some(i) = variants.iter().position(|v| v[rule] == wanted) {
                return Some(siblings[i].1.clone());
            }
        }
        self.fallback.locate(declared)
    }
}

fn shorten_name(name: &str, ext_len: usize) -> String {
    if name.len() + ext_len <= MAX_SIDECAR_NAME {
        return name.to_string();
    }
    let mut end = MAX_SIDECAR_NAME - ext_len;
    while end > 0 && !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

/// `IMG(1).jpg` is described by `IMG.jpg(1).json`.
fn bracket_swap(name: &str) -> String {
    let Some(m) = BRACKET_RE.find_iter(name).last() else {
        return name.to_string();
    };
    let bracket = &name[m.start()..m.end() - 1];
    let mut swapped = String::with_capacity(name.len());
    swapped.push_str(&name[..m.start()]);
    swapped.push_str(&name[m.end() - 1..]);
    swapped.push_str(bracket);
    swapped
}

fn no_extension(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string())
}

fn remove_digit(name: &str) -> String {
    BRACKET_RE.replace_all(name, ".").into_owned()
}
