use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

/// Camera, screenshot and messenger filename patterns, most specific first.
/// Each regex captures exactly the text its format parses.
static PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    const MONTH: &str = "(?:0[1-9]|1[0-2])";
    const DAY: &str = "[0-3]\\d";
    const YEAR: &str = "(?:20|19|18)\\d{2}";
    [
        (format!("{YEAR}{MONTH}{DAY}-\\d{{6}}"), "%Y%m%d-%H%M%S"),
        (format!("{YEAR}{MONTH}{DAY}_\\d{{6}}"), "%Y%m%d_%H%M%S"),
        (format!("{YEAR}-{MONTH}-{DAY}-\\d{{2}}-\\d{{2}}-\\d{{2}}"), "%Y-%m-%d-%H-%M-%S"),
        (format!("{YEAR}-{MONTH}-{DAY}-\\d{{6}}"), "%Y-%m-%d-%H%M%S"),
        (format!("{YEAR}{MONTH}{DAY}\\d{{6}}"), "%Y%m%d%H%M%S"),
        (format!("{YEAR}_{MONTH}_{DAY}_\\d{{2}}_\\d{{2}}_\\d{{2}}"), "%Y_%m_%d_%H_%M_%S"),
    ]
    .into_iter()
    .map(|(pattern, format)| (Regex::new(&pattern).unwrap(), format))
    .collect()
});

/// Guess a capture time from a bare filename such as `IMG_20190509_154733.jpg`.
pub fn guess_date_from_filename(filename: &str) -> Option<NaiveDateTime> {
    PATTERNS.iter().find_map(|(regex, format)| {
        let found = regex.find(filename)?;
        NaiveDateTime::parse_from_str(found.as_str(), format).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_patterns() {
        let dt = guess_date_from_filename("IMG_20190509_154733.jpg").unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2019-05-09 15:47:33");
        assert!(guess_date_from_filename("Screenshot_20190919-053857.jpg").is_some());
        assert!(guess_date_from_filename("signal-2020-10-26-163832.jpg").is_some());
        assert!(guess_date_from_filename("2016_01_30_11_49_15.mp4").is_some());
        assert!(guess_date_from_filename("PXL_20211231235959123.jpg").is_some());
    }

    #[test]
    fn test_no_date_in_name() {
        assert!(guess_date_from_filename("random_photo.jpg").is_none());
        assert!(guess_date_from_filename("IMG_0042.JPG").is_none());
    }
}
