use unicode_normalization::UnicodeNormalization;

/// Localized suffixes Google appends to edited copies (lowercase, NFC).
const EXTRA_FORMATS: &[&str] = &[
    "-edited",      // EN
    "-effects",     // EN
    "-smile",       // EN
    "-mix",         // EN
    "-edytowane",   // PL
    "-bearbeitet",  // DE
    "-bewerkt",     // NL
    "-編集済み",     // JA
    "-modificato",  // IT
    "-modifié",     // FR
    "-ha editado",  // ES
    "-editat",      // CA
];

/// Strip an "edited" suffix so `IMG-edited.jpg` can pair with the sidecar
/// written for `IMG.jpg`. Matching is case-insensitive; the rest of the
/// name keeps its case.
pub fn remove_extra(filename: &str) -> String {
    let normalized: String = filename.nfc().collect();
    let lowered = normalized.to_lowercase();
    // Lowercasing can change byte lengths outside ASCII; only cut when the
    // offsets still line up.
    if lowered.len() == normalized.len() {
        for extra in EXTRA_FORMATS {
            if let Some(pos) = lowered.rfind(extra) {
                let mut result = normalized.clone();
                result.replace_range(pos..pos + extra.len(), "");
                return result;
            }
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_extra() {
        assert_eq!(remove_extra("IMG_1234-edited.jpg"), "IMG_1234.jpg");
        assert_eq!(remove_extra("IMG_1234-EDITED.JPG"), "IMG_1234.JPG");
        assert_eq!(remove_extra("Foto-bearbeitet.png"), "Foto.png");
        assert_eq!(remove_extra("IMG_1234.jpg"), "IMG_1234.jpg");
    }
}
