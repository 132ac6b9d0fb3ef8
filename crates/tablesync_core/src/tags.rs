use std::collections::BTreeMap;

/// Tags applied to the destination table at creation time.
pub type TagSet = BTreeMap<String, String>;

/// Outcome of parsing a comma-separated `key=value` tag list. Malformed
/// entries are collected rather than failing the run; the caller decides
/// how to surface them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedTags {
    pub tags: TagSet,
    pub skipped: Vec<String>,
}

pub fn parse_tag_list(raw: &str) -> ParsedTags {
    let mut parsed = ParsedTags::default();
    if raw.trim().is_empty() {
        return parsed;
    }

    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                parsed
                    .tags
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
            _ => parsed.skipped.push(entry.to_string()),
        }
    }

    parsed
}
