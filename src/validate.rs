//! Input validation for settings and identifiers.
//!
//! Setting names resolve in three tiers: exact match → synonym lookup →
//! error with the closest suggestion. Server URLs must be plain http(s)
//! base URLs, since network collaborators append their own paths.

use crate::model::settings::SettingKey;
use std::collections::HashMap;
use std::sync::LazyLock;
use url::Url;

// ── Setting names ────────────────────────────────────────────

pub static SETTING_SYNONYMS: LazyLock<HashMap<&str, SettingKey>> = LazyLock::new(|| {
    [
        ("dark-theme", SettingKey::UseDarkTheme),
        ("dark_theme", SettingKey::UseDarkTheme),
        ("theme", SettingKey::UseDarkTheme),
        ("anisette", SettingKey::AnisetteServerUrl),
        ("anisette-url", SettingKey::AnisetteServerUrl),
        ("fmd", SettingKey::FmdServerUrl),
        ("fmd-url", SettingKey::FmdServerUrl),
        ("fmd-server", SettingKey::FmdServerUrl),
        ("email", SettingKey::FmdEmail),
        ("fmd-email", SettingKey::FmdEmail),
        ("password", SettingKey::FmdPassword),
        ("fmd-password", SettingKey::FmdPassword),
        ("lang", SettingKey::Language),
        ("locale", SettingKey::Language),
        ("debug", SettingKey::EnableDebugData),
        ("debug-data", SettingKey::EnableDebugData),
    ]
    .into_iter()
    .collect()
});

/// Resolve a user-typed setting name.
///
/// Returns the key, or an error with the original input and an optional
/// suggestion.
pub fn normalize_setting_key(input: &str) -> Result<SettingKey, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    // Tier 1: exact match on the stored name
    if let Some(key) = SettingKey::ALL.iter().find(|k| k.as_str() == lower) {
        return Ok(*key);
    }

    // Tier 2: synonym lookup
    if let Some(&key) = SETTING_SYNONYMS.get(lower.as_str()) {
        return Ok(key);
    }

    // Tier 3: closest suggestion
    let suggestion = SettingKey::ALL
        .iter()
        .map(|k| k.as_str())
        .chain(SETTING_SYNONYMS.keys().copied())
        .map(|candidate| (levenshtein_distance(&lower, candidate), candidate))
        .filter(|(dist, _)| *dist <= 3)
        .min_by_key(|(dist, _)| *dist)
        .map(|(_, candidate)| candidate.to_string());

    Err((input.to_string(), suggestion))
}

/// Parse a boolean the way people type it.
#[must_use]
pub fn parse_flag(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" | "enabled" => Some(true),
        "false" | "no" | "off" | "0" | "disabled" => Some(false),
        _ => None,
    }
}

// ── Server URLs ──────────────────────────────────────────────

/// Check that a server URL is an http(s) base URL.
///
/// The URL must have an empty path, so `https://host/` is rejected. A query
/// is allowed; a fragment is not.
#[must_use]
pub fn is_valid_server_url(input: &str) -> bool {
    let input = input.trim();
    let Ok(url) = Url::parse(input) else {
        return false;
    };
    // `Url` reports an empty path as "/", so look at the text itself.
    let authority_and_path = input
        .split_once("://")
        .map_or("", |(_, rest)| rest.split(['?', '#']).next().unwrap_or(""));

    matches!(url.scheme(), "http" | "https")
        && url.host_str().is_some_and(|h| !h.is_empty())
        && !authority_and_path.contains('/')
        && url.fragment().is_none()
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Find stored ids similar to one that was not found.
///
/// Returns up to `max` suggestions with edit distance ≤ 3,
/// sorted by distance then alphabetically.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_setting_key() {
        assert_eq!(normalize_setting_key("fmd_server_url"), Ok(SettingKey::FmdServerUrl));
        assert_eq!(normalize_setting_key("THEME"), Ok(SettingKey::UseDarkTheme));
        assert_eq!(normalize_setting_key("lang"), Ok(SettingKey::Language));

        let (input, suggestion) = normalize_setting_key("pasword").unwrap_err();
        assert_eq!(input, "pasword");
        assert_eq!(suggestion.as_deref(), Some("password"));

        assert!(normalize_setting_key("completely-unrelated-name").is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("on"), Some(true));
        assert_eq!(parse_flag(" FALSE "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_server_url_validation() {
        assert!(is_valid_server_url("https://fmd.example.org"));
        assert!(is_valid_server_url("http://192.168.1.10:8080"));
        assert!(is_valid_server_url("https://fmd.example.org?x=1"));
        assert!(!is_valid_server_url("https://fmd.example.org/"));
        assert!(!is_valid_server_url("https://fmd.example.org/api"));
        assert!(!is_valid_server_url("https://fmd.example.org/?x=1"));
        assert!(!is_valid_server_url("https://fmd.example.org#top"));
        assert!(!is_valid_server_url("ftp://fmd.example.org"));
        assert!(!is_valid_server_url("not a url"));
        assert!(!is_valid_server_url(""));
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_find_similar_ids() {
        let ids = vec!["tag-a1b2".to_string(), "tag-a1b3".to_string(), "zzzzzzzzz".to_string()];
        let result = find_similar_ids("tag-a1b1", &ids, 3);
        assert_eq!(result, vec!["tag-a1b2".to_string(), "tag-a1b3".to_string()]);
    }
}
