//! Field validation for plugin creation and updates.
//!
//! All checks here are pure; nothing touches the store.

use std::collections::HashSet;

use uuid::Uuid;

use super::error::PluginError;
use super::types::{DependencyCandidate, DependencyRequest, License, Platform, Tag};

pub const NAME_MIN_CHARS: usize = 5;
pub const NAME_MAX_CHARS: usize = 15;
pub const DESCRIPTION_MAX_CHARS: usize = 300;

pub fn validate_name(name: &str) -> Result<String, PluginError> {
    let name = name.trim();
    let len = name.chars().count();
    if len < NAME_MIN_CHARS {
        return Err(PluginError::invalid_name(format!(
            "plugin name must be at least {NAME_MIN_CHARS} characters"
        )));
    }
    if len > NAME_MAX_CHARS {
        return Err(PluginError::invalid_name(format!(
            "plugin name must be at most {NAME_MAX_CHARS} characters"
        )));
    }
    Ok(name.to_string())
}

/// An absent or blank description is stored as no description.
pub fn validate_description(description: Option<&str>) -> Result<Option<String>, PluginError> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(PluginError::invalid_description(format!(
            "description must be at most {DESCRIPTION_MAX_CHARS} characters"
        )));
    }
    Ok(Some(description.to_string()))
}

pub fn validate_license(license: &str) -> Result<License, PluginError> {
    license
        .trim()
        .parse()
        .map_err(|license| PluginError::InvalidLicense { license })
}

/// Platforms must be a non-empty subset of the known platforms.
pub fn validate_platforms(platforms: &[String]) -> Result<Vec<Platform>, PluginError> {
    if platforms.is_empty() {
        return Err(PluginError::invalid_platform(
            "at least one target platform is required",
            Vec::new(),
        ));
    }

    let (valid, invalid) = parse_all::<Platform>(platforms);
    if !invalid.is_empty() {
        return Err(PluginError::invalid_platform(
            format!("invalid target platforms: {}", invalid.join(", ")),
            invalid,
        ));
    }
    Ok(valid)
}

/// Tags must be a subset of the known tags. Duplicates collapse.
pub fn validate_tags(tags: &[String]) -> Result<Vec<Tag>, PluginError> {
    let (valid, invalid) = parse_all::<Tag>(tags);
    if !invalid.is_empty() {
        return Err(PluginError::InvalidTags {
            invalid_tags: invalid,
        });
    }
    Ok(valid)
}

/// Parse every value, keeping first occurrences of the valid ones in order.
fn parse_all<T>(raw: &[String]) -> (Vec<T>, Vec<String>)
where
    T: std::str::FromStr<Err = String> + Eq + std::hash::Hash + Copy,
{
    let mut seen = HashSet::new();
    let mut valid = Vec::new();
    let mut invalid = Vec::new();
    for value in raw {
        match value.trim().parse::<T>() {
            Ok(parsed) => {
                if seen.insert(parsed) {
                    valid.push(parsed);
                }
            }
            Err(bad) => invalid.push(bad),
        }
    }
    (valid, invalid)
}

/// Collapse repeated dependency requests. The first occurrence of each
/// plugin id wins, together with its version and optional flag.
pub fn dedupe_dependencies(requests: Vec<DependencyRequest>) -> Vec<DependencyCandidate> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    requests
        .into_iter()
        .map(DependencyRequest::into_candidate)
        .filter(|c| seen.insert(c.plugin_id))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn name_length_bounds() {
        assert!(validate_name("abcd").is_err());
        assert_eq!(validate_name("abcde").unwrap(), "abcde");
        assert_eq!(validate_name("a".repeat(15).as_str()).unwrap().len(), 15);
        let err = validate_name(&"a".repeat(16)).unwrap_err();
        assert_eq!(err.code(), "INVALID_NAME");
    }

    #[test]
    fn name_is_trimmed_before_counting() {
        assert!(validate_name("  abc  ").is_err());
        assert_eq!(validate_name("  hello ").unwrap(), "hello");
    }

    #[test]
    fn name_counts_characters_not_bytes() {
        // Five characters, ten bytes.
        assert!(validate_name("ééééé").is_ok());
    }

    #[test]
    fn blank_description_is_none() {
        assert_eq!(validate_description(None).unwrap(), None);
        assert_eq!(validate_description(Some("   ")).unwrap(), None);
        assert_eq!(
            validate_description(Some(" tidy ")).unwrap().as_deref(),
            Some("tidy")
        );
    }

    #[test]
    fn long_description_rejected() {
        let err = validate_description(Some(&"x".repeat(301))).unwrap_err();
        assert_eq!(err.code(), "INVALID_DESCRIPTION");
        assert!(validate_description(Some(&"x".repeat(300))).is_ok());
    }

    #[test]
    fn license_must_be_known() {
        assert_eq!(validate_license("GPL-3.0").unwrap(), License::Gpl3);
        let err = validate_license("WTFPL").unwrap_err();
        assert_eq!(err.code(), "INVALID_LICENSE");
    }

    #[test]
    fn platforms_must_be_non_empty() {
        let err = validate_platforms(&[]).unwrap_err();
        assert_eq!(err.code(), "INVALID_PLATFORM");
    }

    #[test]
    fn platforms_reject_unknown_values() {
        let err = validate_platforms(&strings(&["Extera", "Desktop"])).unwrap_err();
        match err {
            PluginError::InvalidPlatform {
                invalid_platforms, ..
            } => assert_eq!(invalid_platforms, vec!["Desktop"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn tags_dedupe_and_report_invalid() {
        let tags = validate_tags(&strings(&["Fun", "Media", "Fun"])).unwrap();
        assert_eq!(tags, vec![Tag::Fun, Tag::Media]);

        let err = validate_tags(&strings(&["Fun", "Games", "Memes"])).unwrap_err();
        match err {
            PluginError::InvalidTags { invalid_tags } => {
                assert_eq!(invalid_tags, vec!["Games", "Memes"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_tags_are_valid() {
        assert!(validate_tags(&[]).unwrap().is_empty());
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let candidates = dedupe_dependencies(vec![
            DependencyRequest::Detailed {
                plugin_id: a,
                version: Some("1.0".to_string()),
                optional: true,
            },
            DependencyRequest::Id(b),
            DependencyRequest::Id(a),
        ]);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].plugin_id, a);
        assert_eq!(candidates[0].version.as_deref(), Some("1.0"));
        assert!(candidates[0].optional);
        assert_eq!(candidates[1].plugin_id, b);
    }
}
