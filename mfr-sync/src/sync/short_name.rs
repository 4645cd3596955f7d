//! Default `shortName` derivation
//!
//! Administrative units and facilities carry long descriptive names. DHIS2
//! limits `shortName` to 50 characters, so well-known suffixes are replaced
//! by their customary abbreviations.

use crate::api::destination::SHORT_NAME_MAX;

const FULL_NAME_ABBREVIATIONS: [(&str, &str); 1] = [("Federal Ministry of Health", "FMOH")];

/// Ordered longest / most specific first
const SUFFIX_ABBREVIATIONS: [(&str, &str); 7] = [
    (" Regional Health Bureau", " RHB"),
    (" Zonal Health Department", " ZHD"),
    (" Woreda Health Office", " WorHO"),
    (" Health Center", " HC"),
    (" Health Post", " HP"),
    (" Hospital", " HSP"),
    (" Clinic", " C"),
];

/// Abbreviate a known suffix; names matching nothing are returned unchanged
pub fn abbreviate(name: &str) -> String {
    let trimmed = name.trim();
    for (full, short) in FULL_NAME_ABBREVIATIONS {
        if trimmed.eq_ignore_ascii_case(full) {
            return short.to_string();
        }
    }
    for (suffix, short) in SUFFIX_ABBREVIATIONS {
        if let Some(stem) = trimmed.strip_suffix(suffix) {
            if !stem.trim().is_empty() {
                return format!("{}{}", stem, short);
            }
        }
    }
    trimmed.to_string()
}

/// Truncate to the destination's shortName limit, on a character boundary
pub fn truncate_short_name(value: &str) -> String {
    value.trim().chars().take(SHORT_NAME_MAX).collect::<String>().trim_end().to_string()
}

/// shortName used when the record does not provide one
pub fn default_short_name(name: &str) -> String {
    truncate_short_name(&abbreviate(name))
}

/// Explicit shortName if present and non-empty, else the default
pub fn short_name_for(name: &str, explicit: Option<&str>) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(explicit) => truncate_short_name(explicit),
        None => default_short_name(name),
    }
}
