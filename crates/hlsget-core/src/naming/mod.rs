//! Artifact filename derivation.
//!
//! Prefers the job's human title, falls back to the manifest URL's path, and
//! finally to a timestamp-based name. Always produces a sanitized `.ts` name.

mod sanitize;

pub use sanitize::sanitize_filename;

use std::time::{SystemTime, UNIX_EPOCH};

const EXTENSION: &str = ".ts";

/// Derive the output filename for an assembled artifact.
pub fn derive_artifact_name(title: Option<&str>, source_url: &str) -> String {
    if let Some(title) = title.map(str::trim).filter(|t| !t.is_empty()) {
        let clean = sanitize_filename(title);
        if !clean.is_empty() {
            return format!("{clean}{EXTENSION}");
        }
    }
    name_from_url(source_url).unwrap_or_else(timestamp_name)
}

/// Name from the manifest URL path: the playlist's file stem, or its parent
/// folder when the stem is just a generic manifest name.
fn name_from_url(source_url: &str) -> Option<String> {
    let path = source_url.split(['?', '#']).next().unwrap_or(source_url);
    let mut parts = path.rsplit('/');
    let last = parts.next()?;
    if last.is_empty() {
        return None;
    }

    let candidate = if let Some(stem) = last.strip_suffix(".m3u8") {
        if stem.len() > 2 && !is_generic_stem(stem) {
            stem
        } else {
            // Generic stems like "index" carry no information; prefer the folder.
            match parts.next().filter(|f| f.len() > 2 && !f.contains(':')) {
                Some(folder) => folder,
                None if !stem.is_empty() => stem,
                None => return None,
            }
        }
    } else {
        last
    };

    let clean = sanitize_filename(candidate);
    if clean.is_empty() {
        None
    } else {
        Some(format!("{clean}{EXTENSION}"))
    }
}

fn is_generic_stem(stem: &str) -> bool {
    matches!(
        stem.to_ascii_lowercase().as_str(),
        "index" | "playlist" | "master" | "media" | "chunklist"
    )
}

fn timestamp_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("video_{secs}{EXTENSION}")
}
