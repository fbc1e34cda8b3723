//! Domain ID generation and resolution
//!
//! Trip ids use the format: `{8-char-hex}-{type}-{slug}`
//! Example: `3f9a01c2-trip-lisbon-long-weekend`
//!
//! Activity ids are content-derived: the same activity (after text
//! normalization) gets the same id in every plan.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Longest slug kept in a generated id
const MAX_SLUG_LEN: usize = 48;

/// Generate a domain ID from type and title
///
/// The hex prefix comes from the random tail of a v7 UUID so two ids minted in
/// the same millisecond for the same title still differ.
pub fn generate_id(domain_type: &str, title: &str) -> String {
    let uuid = uuid::Uuid::now_v7().simple().to_string();
    let hex_prefix = &uuid[uuid.len() - 8..];
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}-{}", hex_prefix, domain_type)
    } else {
        format!("{}-{}-{}", hex_prefix, domain_type, slug)
    }
}

/// Slugify a title for use in IDs (ASCII only, so ids are safe file names)
fn slugify(title: &str) -> String {
    let slug = fold_ascii(title)
        .to_lowercase()
        .chars()
        // Strip apostrophes entirely, replace other non-alphanumeric with hyphens
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' || c == '\u{2018}' {
                None
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.len() <= MAX_SLUG_LEN {
        return slug;
    }
    slug[..MAX_SLUG_LEN].trim_end_matches('-').to_string()
}

/// Strip diacritics: "São Paulo" -> "Sao Paulo"
pub fn fold_ascii(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Normalize free text for matching: diacritics removed, lower-cased,
/// punctuation dropped, whitespace collapsed
pub fn normalize_text(text: &str) -> String {
    fold_ascii(text)
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Short hex digest of the given parts, joined with a separator that cannot
/// appear in normalized text
pub fn short_hash(parts: &[&str], len: usize) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\x1f");
        }
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..len.min(hex.len())].to_string()
}

/// Stable activity id from its normalized `name | location | category` signature
pub fn activity_id(name: &str, location: &str, category: &str) -> String {
    let signature = format!(
        "{} | {} | {}",
        normalize_text(name),
        normalize_text(location),
        normalize_text(category)
    );
    format!("act-{}", short_hash(&[&signature], 12))
}

/// ID resolution for partial matches
pub struct IdResolver<'a> {
    ids: &'a HashMap<String, String>, // id -> display name
}

impl<'a> IdResolver<'a> {
    pub fn new(ids: &'a HashMap<String, String>) -> Self {
        Self { ids }
    }

    /// Resolve a partial reference to a full ID
    ///
    /// Returns:
    /// - Ok(Some(id)) if exactly one match
    /// - Ok(None) if no matches
    /// - Err with candidates if ambiguous
    pub fn resolve(&self, reference: &str) -> Result<Option<String>, Vec<String>> {
        if self.ids.contains_key(reference) {
            return Ok(Some(reference.to_string()));
        }

        let mut matches: Vec<String> = self
            .ids
            .keys()
            .filter(|id| Self::matches(id, reference))
            .cloned()
            .collect();
        matches.sort();

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(matches),
        }
    }

    fn matches(id: &str, reference: &str) -> bool {
        // Hex prefix match
        if id.starts_with(reference) {
            return true;
        }

        // Slug contains match
        match id.find('-') {
            Some(slug_start) => id[slug_start + 1..].contains(reference),
            None => false,
        }
    }
}
