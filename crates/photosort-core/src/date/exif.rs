use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use exif::{In, Reader, Tag};

/// Read the capture time embedded in a media file.
/// EXIF datetimes carry no zone; they are returned as written.
/// Returns `None` for non-images, unreadable files, or files without a usable tag.
pub fn read_capture_time(path: &Path) -> Option<NaiveDateTime> {
    let is_image = mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
    if !is_image {
        return None;
    }

    let file = File::open(path).ok()?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;

    [Tag::DateTimeOriginal, Tag::DateTimeDigitized, Tag::DateTime]
        .into_iter()
        .filter_map(|tag| exif.get_field(tag, In::PRIMARY))
        .find_map(|field| parse_exif_datetime(&field.display_value().to_string()))
}

/// `YYYY:MM:DD HH:MM:SS`, tolerating the separators some cameras use instead
/// of colons and a missing time part.
pub fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned: String = s
        .trim()
        .chars()
        .map(|c| if matches!(c, '-' | '/' | '\\' | '.') { ':' } else { c })
        .collect();

    if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S") {
        return Some(dt);
    }

    let date = cleaned.split(' ').next()?;
    NaiveDate::parse_from_str(date, "%Y:%m:%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_exif_formats() {
        let dt = parse_exif_datetime("2021:07:04 18:30:00").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2021-07-04 18:30");
        assert!(parse_exif_datetime("2021-07-04 18:30:00").is_some());
        assert!(parse_exif_datetime("2021:07:04").is_some());
        assert!(parse_exif_datetime("0000:00:00 00:00:00").is_none());
        assert!(parse_exif_datetime("").is_none());
    }

    #[test]
    fn test_image_without_exif() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.png");
        image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();
        assert!(read_capture_time(&path).is_none());
    }

    #[test]
    fn test_video_is_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"\x00\x00\x00\x18ftypmp42").unwrap();
        assert!(read_capture_time(&path).is_none());
    }
}
