use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::date::MonthLabel;
use crate::error::ConfigError;

/// How a name collision at a destination is judged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamenessMode {
    /// Decode both files and compare pixels. Undecodable files count as the same.
    #[default]
    Pixel,
    /// Any collision is assumed to be the same file.
    Name,
}

/// How a sidecar's declared filename is resolved to a file on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    #[default]
    Substring,
    Transform,
}

/// Time zone used to turn an epoch timestamp into a month label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelZone {
    #[default]
    Utc,
    Local,
}

impl FromStr for SamenessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pixel" => Ok(SamenessMode::Pixel),
            "name" => Ok(SamenessMode::Name),
            other => Err(format!("unknown sameness mode {other:?} (expected pixel or name)")),
        }
    }
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "substring" => Ok(MatchStrategy::Substring),
            "transform" => Ok(MatchStrategy::Transform),
            other => Err(format!("unknown matcher {other:?} (expected substring or transform)")),
        }
    }
}

impl FromStr for LabelZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utc" => Ok(LabelZone::Utc),
            "local" => Ok(LabelZone::Local),
            other => Err(format!("unknown label zone {other:?} (expected utc or local)")),
        }
    }
}

/// Everything the reconciliation engine needs to know about the tree it
/// works on. Passed explicitly into every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Top directory holding the extracted exports and the result folder.
    pub root: PathBuf,
    /// Directory of Takeout zip files to extract before sorting.
    pub archive_dir: Option<PathBuf>,
    pub result_folder: String,
    pub overflow_folder: String,
    pub deferred_folder: String,
    /// Path from an export folder to its albums.
    pub takeout_subpath: PathBuf,
    pub sidecar_ext: String,
    /// Album-level sidecar that describes the album, not a media file.
    pub album_metadata: String,
    pub sameness: SamenessMode,
    pub matcher: MatchStrategy,
    pub label_zone: LabelZone,
    pub guess_from_filename: bool,
    /// Stamp relocated files with their capture time.
    pub preserve_mtime: bool,
    /// Remove export folders once nothing but empty directories remain.
    pub remove_empty_exports: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            archive_dir: None,
            result_folder: "Photos".to_string(),
            overflow_folder: "Unknown".to_string(),
            deferred_folder: "Lost".to_string(),
            takeout_subpath: Path::new("Takeout").join("Google Photos"),
            sidecar_ext: "json".to_string(),
            album_metadata: "metadata.json".to_string(),
            sameness: SamenessMode::default(),
            matcher: MatchStrategy::default(),
            label_zone: LabelZone::default(),
            guess_from_filename: false,
            preserve_mtime: true,
            remove_empty_exports: true,
        }
    }
}

impl Config {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Folder names become single path components; reject anything that
    /// would not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let folders = [
            ("result_folder", &self.result_folder),
            ("overflow_folder", &self.overflow_folder),
            ("deferred_folder", &self.deferred_folder),
            ("sidecar_ext", &self.sidecar_ext),
            ("album_metadata", &self.album_metadata),
        ];
        for (field, value) in folders {
            let bad = value.is_empty()
                || value == "."
                || value == ".."
                || value.contains(['/', '\\']);
            if bad {
                return Err(ConfigError::InvalidFolderName {
                    field,
                    value: value.clone(),
                });
            }
        }
        if !self.root.is_dir() {
            return Err(ConfigError::MissingRoot {
                path: self.root.clone(),
            });
        }
        Ok(())
    }

    pub fn result_dir(&self) -> PathBuf {
        self.root.join(&self.result_folder)
    }

    /// `<root>/<ResultFolder>/Unknown`
    pub fn overflow_dir(&self) -> PathBuf {
        self.result_dir().join(&self.overflow_folder)
    }

    /// `<root>/Lost`
    pub fn deferred_dir(&self) -> PathBuf {
        self.root.join(&self.deferred_folder)
    }

    /// `<root>/<ResultFolder>/<YYYY>/<MM - Month YYYY>`
    pub fn dated_dir(&self, label: &MonthLabel) -> PathBuf {
        self.result_dir().join(label.year_folder()).join(label.folder())
    }

    pub fn is_sidecar(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(&self.sidecar_ext))
    }

    pub fn is_album_metadata(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n == self.album_metadata)
    }

    /// Folders directly under the root that belong to this tool, not to an export.
    pub fn is_reserved_folder(&self, name: &str) -> bool {
        name == self.result_folder || name == self.deferred_folder
    }
}
