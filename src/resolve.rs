//! Entity resolver: match an extracted well name to an existing well.

use crate::types::WellEntity;

/// Canonical matching form: lowercased, runs of non-alphanumerics
/// collapsed to single `-` separators, trimmed.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('-');
            }
            pending_sep = false;
            for lc in c.to_lowercase() {
                out.push(lc);
            }
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Short id-safe slug of a name (lowercase, dashed, capped at 24 chars).
pub fn slugify(name: &str) -> String {
    normalize_name(name)
        .chars()
        .take(24)
        .collect::<String>()
        .trim_matches('-')
        .to_string()
}

/// True when every token of `needle` appears as a substring of `haystack`.
fn tokens_contained(needle: &str, haystack: &str) -> bool {
    let tokens: Vec<&str> = needle.split('-').filter(|t| !t.is_empty()).collect();
    !tokens.is_empty() && tokens.iter().all(|t| haystack.contains(t))
}

/// Resolve a candidate name against a registry snapshot.
///
/// 1. Exact match on the normalized form.
/// 2. Loose containment: every token of the candidate appears in an
///    existing well's normalized name, or every token of the existing
///    name appears in the candidate.
///
/// First satisfying well wins; the snapshot keeps registration order, so
/// the result is deterministic. `None` signals "create a new well".
pub fn resolve(candidate: &str, wells: &[WellEntity]) -> Option<String> {
    let norm = normalize_name(candidate);
    if norm.is_empty() {
        return None;
    }

    if let Some(hit) = wells.iter().find(|w| normalize_name(&w.name) == norm) {
        return Some(hit.id.clone());
    }

    wells
        .iter()
        .find(|w| {
            let existing = normalize_name(&w.name);
            !existing.is_empty()
                && (tokens_contained(&norm, &existing) || tokens_contained(&existing, &norm))
        })
        .map(|w| w.id.clone())
}
