//! Manifest resolution with master → variant indirection.

use std::sync::Arc;

use crate::fetch::Fetcher;

use super::parse;
use super::{Playlist, ResolveError};

/// Hop budget for master → variant indirection. Real-world chains are one or
/// two hops; anything deeper is treated as malformed.
pub const MAX_MANIFEST_HOPS: usize = 5;

/// Resolve `url` into a playlist with a non-empty segment list.
///
/// A manifest with no media segments but at least one nested manifest is a
/// master playlist; resolution hops into its *last* listed variant (the
/// conventional highest-quality slot, a heuristic rather than a guarantee)
/// and rescans with that variant's own base URL. `max_hops` bounds the chain.
pub async fn resolve(
    fetcher: &Arc<dyn Fetcher>,
    url: &str,
    max_hops: usize,
) -> Result<Playlist, ResolveError> {
    let mut current = url.to_string();

    for _ in 0..max_hops.max(1) {
        let resp = fetcher.fetch(&current).await?;
        if !resp.is_success() {
            return Err(ResolveError::Status(resp.status));
        }

        let outcome = parse::scan(&current, &resp.text())?;
        if !outcome.segments.is_empty() {
            return Ok(Playlist {
                base_url: parse::base_url_of(&current),
                source_url: current,
                segments: outcome.segments,
            });
        }

        let Some(variant) = outcome.variants.last() else {
            return Err(ResolveError::NoSegments);
        };
        tracing::debug!(master = %current, variant = %variant, "hopping into last-listed variant");
        current = variant.clone();
    }

    Err(ResolveError::TooManyHops(max_hops))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::test_support::ScriptedFetcher;

    #[tokio::test]
    async fn media_playlist_resolves_directly() {
        let fetcher = ScriptedFetcher::new();
        fetcher.serve_text(
            "https://cdn.example.com/v/index.m3u8",
            "#EXTM3U\na.ts\nb.ts\n",
        );
        let f = fetcher.as_dyn();
        let pl = resolve(&f, "https://cdn.example.com/v/index.m3u8", MAX_MANIFEST_HOPS)
            .await
            .unwrap();
        assert_eq!(pl.base_url, "https://cdn.example.com/v/");
        assert_eq!(pl.segments.len(), 2);
    }

    #[tokio::test]
    async fn master_playlist_hops_into_last_variant() {
        let fetcher = ScriptedFetcher::new();
        fetcher.serve_text(
            "https://cdn.example.com/master.m3u8",
            "#EXTM3U\nv/a/index.m3u8\nv/b/index.m3u8\nv/c/index.m3u8\n",
        );
        fetcher.serve_text(
            "https://cdn.example.com/v/c/index.m3u8",
            "#EXTM3U\nseg.ts\n",
        );
        let f = fetcher.as_dyn();
        let pl = resolve(&f, "https://cdn.example.com/master.m3u8", MAX_MANIFEST_HOPS)
            .await
            .unwrap();
        assert_eq!(pl.source_url, "https://cdn.example.com/v/c/index.m3u8");
        assert_eq!(pl.segments[0].url, "https://cdn.example.com/v/c/seg.ts");
    }

    #[tokio::test]
    async fn hop_cycle_is_cut_off() {
        let fetcher = ScriptedFetcher::new();
        fetcher.serve_text("https://e.com/a.m3u8", "b.m3u8\n");
        fetcher.serve_text("https://e.com/b.m3u8", "a.m3u8\n");
        let f = fetcher.as_dyn();
        let err = resolve(&f, "https://e.com/a.m3u8", MAX_MANIFEST_HOPS)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::TooManyHops(_)));
    }

    #[tokio::test]
    async fn empty_manifest_is_a_parse_error() {
        let fetcher = ScriptedFetcher::new();
        fetcher.serve_text("https://e.com/empty.m3u8", "#EXTM3U\n#EXT-X-ENDLIST\n");
        let f = fetcher.as_dyn();
        let err = resolve(&f, "https://e.com/empty.m3u8", MAX_MANIFEST_HOPS)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::NoSegments));
    }

    #[tokio::test]
    async fn non_success_status_is_a_fetch_error() {
        let fetcher = ScriptedFetcher::new();
        fetcher.serve_status("https://e.com/gone.m3u8", 404);
        let f = fetcher.as_dyn();
        let err = resolve(&f, "https://e.com/gone.m3u8", MAX_MANIFEST_HOPS)
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Status(404)));
    }
}
