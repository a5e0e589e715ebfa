//! Line-level manifest scanning.
//!
//! A manifest is scanned top to bottom: key directives update the current
//! encryption context, comment/directive lines are otherwise skipped, and URI
//! lines are classified as either media segments or nested variant manifests.

use std::sync::Arc;

use url::Url;

use super::{EncryptionKey, ResolveError, Segment};

const KEY_TAG: &str = "#EXT-X-KEY:";

/// Result of scanning one manifest body.
pub(super) struct ScanOutcome {
    pub segments: Vec<Segment>,
    /// Absolute URLs of nested manifests, in source order.
    pub variants: Vec<String>,
}

/// The manifest URL truncated after its last path separator. Relative segment
/// paths are resolved against this.
pub(super) fn base_url_of(manifest_url: &str) -> String {
    match manifest_url.rfind('/') {
        Some(pos) => manifest_url[..=pos].to_string(),
        None => manifest_url.to_string(),
    }
}

/// Scan manifest text, resolving URI lines against `manifest_url`.
pub(super) fn scan(manifest_url: &str, text: &str) -> Result<ScanOutcome, ResolveError> {
    let base = Url::parse(manifest_url)?;
    let mut segments = Vec::new();
    let mut variants = Vec::new();
    let mut current_key: Option<Arc<EncryptionKey>> = None;

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(attrs) = line.strip_prefix(KEY_TAG) {
            current_key = parse_key_directive(attrs, &base)?;
            continue;
        }
        if line.starts_with('#') {
            continue;
        }

        let abs = base.join(line)?;
        if is_manifest_path(&abs) {
            variants.push(abs.into());
        } else {
            segments.push(Segment {
                url: abs.into(),
                key: current_key.clone(),
            });
        }
    }

    Ok(ScanOutcome { segments, variants })
}

/// True if the URL path (query and fragment excluded) names another manifest.
fn is_manifest_path(url: &Url) -> bool {
    url.path().ends_with(".m3u8")
}

/// Parse a `#EXT-X-KEY` attribute list into an encryption context.
/// METHOD=NONE (or a missing METHOD) clears the context, hence `None`.
fn parse_key_directive(
    attrs: &str,
    base: &Url,
) -> Result<Option<Arc<EncryptionKey>>, ResolveError> {
    let mut method = None;
    let mut uri = None;
    let mut iv = None;

    for attr in split_attributes(attrs) {
        let Some((name, value)) = attr.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches('"');
        match name.trim().to_ascii_uppercase().as_str() {
            "METHOD" => method = Some(value.to_string()),
            "URI" => uri = Some(value.to_string()),
            "IV" => iv = Some(value.to_string()),
            _ => {}
        }
    }

    let Some(method) = method.filter(|m| !m.eq_ignore_ascii_case("NONE")) else {
        return Ok(None);
    };
    let key_url = match uri {
        Some(u) => Some(base.join(&u)?.into()),
        None => None,
    };
    Ok(Some(Arc::new(EncryptionKey {
        method,
        key_url,
        iv,
    })))
}

/// Split a tag attribute list on commas, ignoring commas inside quoted values
/// (URIs routinely contain them).
fn split_attributes(attrs: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (i, c) in attrs.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                out.push(&attrs[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&attrs[start..]);
    out
}
