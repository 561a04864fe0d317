pub mod exif;
pub mod guess;
pub mod json;

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::config::{Config, LabelZone};
use crate::error::RecordError;
use json::SidecarRecord;

/// Month/year a media item was captured in, rendered as a directory name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthLabel(NaiveDate);

impl MonthLabel {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.with_day(1).unwrap_or(date))
    }

    /// `YYYY`
    pub fn year_folder(&self) -> String {
        self.0.format("%Y").to_string()
    }

    /// `MM - Month YYYY`. chrono's month names are always English, so the
    /// label does not depend on the host locale.
    pub fn folder(&self) -> String {
        self.0.format("%m - %B %Y").to_string()
    }
}

impl fmt::Display for MonthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.folder())
    }
}

/// Where a capture time came from, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelSource {
    Sidecar,
    Embedded,
    Filename,
}

/// A resolved capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capture {
    pub label: MonthLabel,
    /// Seconds since the epoch, used to stamp the relocated file.
    pub timestamp: i64,
    pub source: LabelSource,
}

/// Turns sidecars and media files into month labels.
#[derive(Debug, Clone, Copy)]
pub struct TimestampResolver {
    zone: LabelZone,
    guess_from_filename: bool,
}

impl TimestampResolver {
    pub fn new(zone: LabelZone, guess_from_filename: bool) -> Self {
        Self {
            zone,
            guess_from_filename,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.label_zone, config.guess_from_filename)
    }

    /// Primary path: the sidecar's `photoTakenTime`.
    pub fn resolve_sidecar(&self, sidecar: &Path, record: &SidecarRecord) -> Result<Capture, RecordError> {
        let malformed = |reason: &str| RecordError::MalformedMetadata {
            path: sidecar.to_path_buf(),
            reason: reason.to_string(),
        };
        let epoch = record
            .photo_taken_time
            .timestamp
            .seconds()
            .ok_or_else(|| malformed("photoTakenTime.timestamp is not an integer"))?;
        let utc = DateTime::<Utc>::from_timestamp(epoch, 0)
            .ok_or_else(|| malformed("photoTakenTime.timestamp is out of range"))?;
        let date = match self.zone {
            LabelZone::Utc => utc.date_naive(),
            LabelZone::Local => utc.with_timezone(&Local).date_naive(),
        };
        Ok(Capture {
            label: MonthLabel::from_date(date),
            timestamp: epoch,
            source: LabelSource::Sidecar,
        })
    }

    /// Fallback path for media without a sidecar: the embedded capture tag,
    /// then (if enabled) the filename. `None` means Unknown.
    pub fn resolve_media(&self, media: &Path) -> Option<Capture> {
        self.resolve_embedded(media).or_else(|| {
            if self.guess_from_filename {
                self.resolve_filename(media.file_name()?.to_str()?)
            } else {
                None
            }
        })
    }

    /// EXIF capture time. Unsupported or unreadable files are `None`, never an error.
    pub fn resolve_embedded(&self, media: &Path) -> Option<Capture> {
        exif::read_capture_time(media).map(|dt| self.naive_capture(dt, LabelSource::Embedded))
    }

    pub fn resolve_filename(&self, name: &str) -> Option<Capture> {
        guess::guess_date_from_filename(name).map(|dt| self.naive_capture(dt, LabelSource::Filename))
    }

    /// Embedded and filename times carry no zone; the label uses them as-is
    /// and the timestamp interprets them in the configured zone.
    fn naive_capture(&self, dt: NaiveDateTime, source: LabelSource) -> Capture {
        let timestamp = match self.zone {
            LabelZone::Utc => Utc.from_utc_datetime(&dt).timestamp(),
            LabelZone::Local => Local
                .from_local_datetime(&dt)
                .earliest()
                .map_or_else(|| dt.and_utc().timestamp(), |t| t.timestamp()),
        };
        Capture {
            label: MonthLabel::from_date(dt.date()),
            timestamp,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(ts: &str) -> SidecarRecord {
        json::parse_sidecar(format!(r#"{{"photoTakenTime": {{"timestamp": {ts}}}}}"#).as_bytes()).unwrap()
    }

    #[test]
    fn test_label_format() {
        let resolver = TimestampResolver::new(LabelZone::Utc, false);
        let capture = resolver
            .resolve_sidecar(Path::new("IMG.jpg.json"), &record("1709150400"))
            .unwrap();
        assert_eq!(capture.label.folder(), "02 - February 2024");
        assert_eq!(capture.label.year_folder(), "2024");
        assert_eq!(capture.timestamp, 1709150400);
        assert_eq!(capture.source, LabelSource::Sidecar);
    }

    #[test]
    fn test_string_timestamp() {
        let resolver = TimestampResolver::new(LabelZone::Utc, false);
        let capture = resolver
            .resolve_sidecar(Path::new("IMG.jpg.json"), &record(r#""1577836800""#))
            .unwrap();
        assert_eq!(capture.label.to_string(), "01 - January 2020");
    }

    #[test]
    fn test_non_numeric_timestamp_is_malformed() {
        let resolver = TimestampResolver::new(LabelZone::Utc, false);
        let err = resolver
            .resolve_sidecar(Path::new("IMG.jpg.json"), &record(r#""yesterday""#))
            .unwrap_err();
        assert!(matches!(err, RecordError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_single_digit_year_is_padded() {
        let label = MonthLabel::from_date(NaiveDate::from_ymd_opt(987, 12, 3).unwrap());
        assert_eq!(label.folder(), "12 - December 0987");
        assert_eq!(label.year_folder(), "0987");
    }

    #[test]
    fn test_media_without_tags_is_unknown() {
        let dir = tempdir().unwrap();
        let video = dir.path().join("VID_20200101_101010.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        assert!(TimestampResolver::new(LabelZone::Utc, false)
            .resolve_media(&video)
            .is_none());

        let guessed = TimestampResolver::new(LabelZone::Utc, true)
            .resolve_media(&video)
            .unwrap();
        assert_eq!(guessed.label.folder(), "01 - January 2020");
        assert_eq!(guessed.source, LabelSource::Filename);
    }

    #[test]
    fn test_missing_media_is_unknown() {
        let resolver = TimestampResolver::new(LabelZone::Utc, false);
        assert!(resolver.resolve_media(Path::new("/nonexistent/IMG.jpg")).is_none());
    }
}
