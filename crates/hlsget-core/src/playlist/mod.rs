//! Playlist model and manifest resolution.
//!
//! `resolve` turns a manifest URL into an ordered segment list, following
//! master → variant indirection and carrying per-segment encryption
//! descriptors. Decryption itself is out of scope; the descriptor is resolved
//! and attached so a consumer can act on it.

mod parse;
mod resolve;

pub use resolve::{resolve, MAX_MANIFEST_HOPS};

use std::sync::Arc;

use thiserror::Error;

use crate::fetch::FetchError;

/// Encryption descriptor from the most recent `#EXT-X-KEY` directive.
/// METHOD=NONE never produces one of these; it clears the current context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    /// Cipher method as declared (e.g. "AES-128").
    pub method: String,
    /// Key URI resolved against the manifest base URL.
    pub key_url: Option<String>,
    /// IV attribute verbatim (hex string with 0x prefix in practice).
    pub iv: Option<String>,
}

/// One fetchable media segment. Immutable once resolved.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Absolute URL of the segment.
    pub url: String,
    /// Encryption context inherited from the preceding key directive, shared
    /// across all segments under the same directive.
    pub key: Option<Arc<EncryptionKey>>,
}

/// A fully resolved playlist: non-empty ordered segment list.
#[derive(Debug, Clone)]
pub struct Playlist {
    /// URL of the manifest the segments came from (the variant, after hops).
    pub source_url: String,
    /// Manifest URL truncated after its last path separator; relative segment
    /// paths were joined against this.
    pub base_url: String,
    pub segments: Vec<Segment>,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("manifest request failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("manifest fetch returned HTTP {0}")]
    Status(u16),
    #[error("no media segments or variant references in manifest")]
    NoSegments,
    #[error("variant indirection exceeded {0} hops")]
    TooManyHops(usize),
    #[error("invalid manifest url: {0}")]
    Url(#[from] url::ParseError),
}
