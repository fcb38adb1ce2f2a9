use crate::domain::market::{CropCondition, HarvestTiming};

// (language, identifier, label)
const HARVEST_TIMING_LABELS: &[(&str, &str, &str)] = &[
    ("en", "just_now", "Just now harvested"),
    ("en", "2_days_ago", "Harvested 2 days ago"),
    ("en", "4_days_ago", "Harvested 4 days ago"),
    ("hi", "just_now", "अभी-अभी काटा गया"),
    ("hi", "2_days_ago", "2 दिन पहले काटा गया"),
    ("hi", "4_days_ago", "4 दिन पहले काटा गया"),
    ("ta", "just_now", "இப்போதுதான் அறுவடை செய்யப்பட்டது"),
    ("ta", "2_days_ago", "2 நாட்களுக்கு முன்பு அறுவடை செய்யப்பட்டது"),
    ("ta", "4_days_ago", "4 நாட்களுக்கு முன்பு அறுவடை செய்யப்பட்டது"),
];

const CROP_CONDITION_LABELS: &[(&str, &str, &str)] = &[
    ("en", "perfect", "Perfectly alright"),
    ("en", "good", "Good"),
    ("en", "average", "Average"),
    ("en", "poor", "At risk of spoiling soon"),
    ("hi", "perfect", "पूरी तरह से ठीक"),
    ("hi", "good", "अच्छा"),
    ("hi", "average", "औसत"),
    ("hi", "poor", "जल्द खराब होने का खतरा"),
    ("ta", "perfect", "முற்றிலும் சரி"),
    ("ta", "good", "நல்லது"),
    ("ta", "average", "சராசரி"),
    ("ta", "poor", "விரைவில் கெட்டுப்போகும் அபாயம்"),
];

const LANGUAGE_NAMES: &[(&str, &str)] = &[
    ("en", "English"),
    ("hi", "Hindi"),
    ("mr", "Marathi"),
    ("pa", "Punjabi"),
    ("bn", "Bengali"),
    ("ta", "Tamil"),
    ("te", "Telugu"),
    ("gu", "Gujarati"),
    ("kn", "Kannada"),
    ("ml", "Malayalam"),
];

pub fn harvest_timing_display(timing: &HarvestTiming, language: &str) -> String {
    lookup(HARVEST_TIMING_LABELS, timing.as_str(), language)
}

pub fn crop_condition_display(condition: &CropCondition, language: &str) -> String {
    lookup(CROP_CONDITION_LABELS, condition.as_str(), language)
}

/// Human name of a locale code for prompting; unknown codes pass through.
pub fn language_name(code: &str) -> String {
    let base = base_language(code);
    LANGUAGE_NAMES
        .iter()
        .find(|(c, _)| *c == base)
        .map(|(_, name)| (*name).to_string())
        .unwrap_or_else(|| code.trim().to_string())
}

fn base_language(code: &str) -> String {
    code.trim()
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn lookup(table: &[(&str, &str, &str)], id: &str, language: &str) -> String {
    let id = id.trim();
    let base = base_language(language);
    let find = |lang: &str| {
        table
            .iter()
            .find(|(l, k, _)| *l == lang && *k == id)
            .map(|(_, _, label)| (*label).to_string())
    };

    find(&base)
        .or_else(|| find("en"))
        .unwrap_or_else(|| id.to_string())
}
