//! Read-through render pipeline.
//!
//! Ties the cache and renderer together for one view session:
//!
//! - cache lookup completes before any fallback render is attempted, so two
//!   renders never race to populate the same key;
//! - every render carries a generation; when inputs change before earlier
//!   work completes, the stale result is discarded ("last requested key
//!   wins") instead of being committed;
//! - a notification fires exactly once per distinct render key so a parent
//!   view can persist the payload once per logical render;
//! - teardown revokes every outstanding object URL and drops completions
//!   that arrive afterwards.

use crate::cache::{key_for_inputs, key_for_payload, ObjectUrl, ObjectUrls, RenderCache};
use crate::error::RadmarkError;
use crate::model::Detection;
use crate::render::{annotate_image, encode_png};

/// Token for one requested render. Completing a ticket whose generation has
/// been superseded discards the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTicket {
    key: String,
    generation: u64,
}

impl RenderTicket {
    /// The cache key this render targets.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// One view's render session. Owns the cache handle, the object-URL
/// registry, and the per-session "last notified key" state (an instance
/// field, never a global, so independent views cannot interfere).
pub struct RenderSession<C: RenderCache> {
    cache: C,
    urls: ObjectUrls,
    generation: u64,
    last_notified_key: Option<String>,
    closed: bool,
}

impl<C: RenderCache> RenderSession<C> {
    /// Start a session over the given cache store.
    pub fn new(cache: C) -> Self {
        Self {
            cache,
            urls: ObjectUrls::new(),
            generation: 0,
            last_notified_key: None,
            closed: false,
        }
    }

    /// Request a render for the given inputs. Bumps the generation, which
    /// supersedes every ticket issued earlier.
    pub fn begin(
        &mut self,
        source_locator: &str,
        detections: &[Detection],
    ) -> Result<RenderTicket, RadmarkError> {
        self.generation += 1;
        Ok(RenderTicket {
            key: key_for_inputs(source_locator, detections)?,
            generation: self.generation,
        })
    }

    /// Cache lookup for a ticket. `None` is a normal miss and the signal to
    /// run the fallback render.
    pub fn lookup(&self, ticket: &RenderTicket) -> Option<Vec<u8>> {
        self.cache.get(&ticket.key)
    }

    /// Commit a completed render.
    ///
    /// Stale tickets (superseded generation) and completions after teardown
    /// are discarded: the blob is dropped, no URL survives, no notification
    /// fires. For a current ticket the blob is cached, `notify` fires if
    /// this key differs from the last notified one, and a live URL is
    /// returned.
    pub fn complete(
        &mut self,
        ticket: &RenderTicket,
        blob: Vec<u8>,
        notify: impl FnOnce(&str, &[u8]),
    ) -> Option<ObjectUrl> {
        if self.closed {
            log::debug!("render for {} completed after teardown; dropped", ticket.key);
            return None;
        }
        if ticket.generation != self.generation {
            log::debug!(
                "render for {} superseded (gen {} < {}); result discarded",
                ticket.key,
                ticket.generation,
                self.generation
            );
            return None;
        }

        self.cache.put(&ticket.key, &blob);
        self.notify_once(&ticket.key, &blob, notify);
        Some(self.urls.create(blob))
    }

    /// Synchronous read-through render: lookup first, then the fallback
    /// `render` closure only on a miss. The closure seam keeps the render
    /// path spy-able in tests and lets callers swap the rasterizer.
    pub fn render_with(
        &mut self,
        source_locator: &str,
        detections: &[Detection],
        render: impl FnOnce() -> Result<Vec<u8>, RadmarkError>,
        notify: impl FnOnce(&str, &[u8]),
    ) -> Result<Option<ObjectUrl>, RadmarkError> {
        if self.closed {
            return Ok(None);
        }
        let ticket = self.begin(source_locator, detections)?;
        let blob = match self.lookup(&ticket) {
            Some(hit) => hit,
            None => render()?,
        };
        Ok(self.complete(&ticket, blob, notify))
    }

    /// Render a detection list over a base image through the cache,
    /// producing a PNG blob URL.
    pub fn render_annotated(
        &mut self,
        source_locator: &str,
        base_bytes: &[u8],
        detections: &[Detection],
        notify: impl FnOnce(&str, &[u8]),
    ) -> Result<Option<ObjectUrl>, RadmarkError> {
        self.render_with(
            source_locator,
            detections,
            || {
                let annotated = annotate_image(base_bytes, detections)?;
                encode_png(&annotated)
            },
            notify,
        )
    }

    /// Register a pre-rendered annotated payload, keyed by its leading
    /// bytes (see [`crate::cache::key_for_payload`]).
    pub fn register_payload(
        &mut self,
        payload: Vec<u8>,
        notify: impl FnOnce(&str, &[u8]),
    ) -> Option<ObjectUrl> {
        if self.closed {
            return None;
        }
        self.generation += 1;
        let ticket = RenderTicket {
            key: key_for_payload(&payload),
            generation: self.generation,
        };
        let blob = self.lookup(&ticket).unwrap_or(payload);
        self.complete(&ticket, blob, notify)
    }

    /// Resolve a live URL created by this session.
    pub fn resolve(&self, url: &ObjectUrl) -> Option<&[u8]> {
        self.urls.resolve(url)
    }

    /// Revoke one URL. The caller that created a URL owns its revocation on
    /// unmount or replacement.
    pub fn revoke(&mut self, url: &ObjectUrl) -> bool {
        self.urls.revoke(url)
    }

    /// Live URL count; should be zero after a clean teardown.
    pub fn outstanding_urls(&self) -> usize {
        self.urls.outstanding()
    }

    /// Tear the session down: revoke all outstanding URLs and drop any
    /// completions that arrive later.
    pub fn teardown(&mut self) {
        self.urls.revoke_all();
        self.closed = true;
    }

    fn notify_once(&mut self, key: &str, blob: &[u8], notify: impl FnOnce(&str, &[u8])) {
        if self.last_notified_key.as_deref() != Some(key) {
            notify(key, blob);
            self.last_notified_key = Some(key.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::model::{BoundingBox, Detection};

    fn session() -> RenderSession<MemoryCache> {
        RenderSession::new(MemoryCache::new())
    }

    fn detections() -> Vec<Detection> {
        vec![Detection::boxed(
            "Bone Loss",
            0.7,
            BoundingBox::new(1.0, 2.0, 3.0, 4.0),
        )]
    }

    #[test]
    fn test_second_render_is_cache_hit() {
        let mut s = session();
        let dets = detections();
        let mut render_calls = 0;

        for _ in 0..2 {
            let url = s
                .render_with(
                    "scan.png",
                    &dets,
                    || {
                        render_calls += 1;
                        Ok(b"rendered".to_vec())
                    },
                    |_, _| {},
                )
                .unwrap()
                .unwrap();
            assert_eq!(s.resolve(&url), Some(b"rendered".as_slice()));
            s.revoke(&url);
        }

        // Second call hit the cache and never invoked the render path
        assert_eq!(render_calls, 1);
    }

    #[test]
    fn test_notify_fires_once_per_distinct_key() {
        let mut s = session();
        let dets = detections();
        let mut notified: Vec<String> = Vec::new();

        for _ in 0..3 {
            let url = s
                .render_with("scan.png", &dets, || Ok(b"x".to_vec()), |key, _| {
                    notified.push(key.to_string());
                })
                .unwrap()
                .unwrap();
            s.revoke(&url);
        }
        assert_eq!(notified.len(), 1);

        // A different key fires again
        let url = s
            .render_with("other.png", &dets, || Ok(b"y".to_vec()), |key, _| {
                notified.push(key.to_string());
            })
            .unwrap()
            .unwrap();
        s.revoke(&url);
        assert_eq!(notified.len(), 2);
        assert_ne!(notified[0], notified[1]);
    }

    #[test]
    fn test_superseded_render_discarded() {
        let mut s = session();
        let dets = detections();

        let stale = s.begin("scan.png", &dets).unwrap();
        // A newer request supersedes the first before it completes
        let current = s.begin("scan.png", &dets).unwrap();

        let mut notified = 0;
        assert!(s
            .complete(&stale, b"stale".to_vec(), |_, _| notified += 1)
            .is_none());
        assert_eq!(notified, 0);
        assert_eq!(s.outstanding_urls(), 0);

        let url = s
            .complete(&current, b"fresh".to_vec(), |_, _| notified += 1)
            .unwrap();
        assert_eq!(notified, 1);
        assert_eq!(s.resolve(&url), Some(b"fresh".as_slice()));
    }

    #[test]
    fn test_teardown_revokes_and_drops_late_completions() {
        let mut s = session();
        let dets = detections();
        let url = s
            .render_with("scan.png", &dets, || Ok(b"x".to_vec()), |_, _| {})
            .unwrap()
            .unwrap();
        assert_eq!(s.outstanding_urls(), 1);

        let late = s.begin("scan.png", &dets).unwrap();
        s.teardown();

        assert_eq!(s.outstanding_urls(), 0);
        assert_eq!(s.resolve(&url), None);
        assert!(s.complete(&late, b"late".to_vec(), |_, _| {}).is_none());
        assert!(s
            .render_with("scan.png", &dets, || Ok(b"x".to_vec()), |_, _| {})
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_render_failure_propagates_without_caching() {
        let mut s = session();
        let dets = detections();
        let err = s
            .render_with(
                "scan.png",
                &dets,
                || Err(RadmarkError::decode("truncated image")),
                |_, _| {},
            )
            .unwrap_err();
        assert!(matches!(err, RadmarkError::Decode { .. }));

        // The failure was not committed; the next render runs again
        let mut calls = 0;
        let _ = s
            .render_with(
                "scan.png",
                &dets,
                || {
                    calls += 1;
                    Ok(b"ok".to_vec())
                },
                |_, _| {},
            )
            .unwrap();
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_register_payload_prefix_key() {
        let mut s = session();
        let mut notified = 0;
        let payload = vec![1u8; 64];

        let a = s.register_payload(payload.clone(), |_, _| notified += 1).unwrap();
        let b = s.register_payload(payload, |_, _| notified += 1).unwrap();
        assert_eq!(notified, 1);
        assert_eq!(s.resolve(&a), s.resolve(&b));
    }

    #[test]
    fn test_independent_sessions_do_not_share_notify_state() {
        let mut s1 = session();
        let mut s2 = session();
        let dets = detections();
        let mut notified = 0;

        let _ = s1
            .render_with("scan.png", &dets, || Ok(b"x".to_vec()), |_, _| notified += 1)
            .unwrap();
        let _ = s2
            .render_with("scan.png", &dets, || Ok(b"x".to_vec()), |_, _| notified += 1)
            .unwrap();
        // Same key, but per-session state: both sessions notify
        assert_eq!(notified, 2);
    }
}
