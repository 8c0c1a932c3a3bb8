//! Content-addressable cache for rendered annotation images.
//!
//! Cache keys are derived from the render inputs, so the same (image,
//! detections) pair always maps to the same key within a session and across
//! reloads. The cache is an optimization, never a correctness dependency:
//! writes are best-effort and a miss is normal control flow.

use std::collections::HashMap;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::Value;

use crate::error::RadmarkError;
use crate::model::Detection;

/// Cache key format version. Bump when the key derivation changes so stale
/// persisted entries are superseded instead of misread.
pub const KEY_VERSION: &str = "v2";

/// Number of leading payload bytes hashed when a pre-rendered payload is
/// supplied directly. Two payloads sharing this prefix collide even if they
/// diverge later; accepted perf/precision trade-off since payloads are
/// content-addressed upstream.
pub const PAYLOAD_PREFIX_LEN: usize = 4096;

const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(BASE36_DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    // Digits are ASCII by construction
    String::from_utf8(out).unwrap_or_default()
}

/// 32-bit rolling multiplicative hash of a byte sequence, reduced to a short
/// base-36 string. Fast and non-cryptographic; collisions are a cache
/// trade-off, not a security property.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hash: u32 = 0;
    for &b in bytes {
        hash = hash.wrapping_mul(31).wrapping_add(u32::from(b));
    }
    to_base36(hash)
}

/// [`hash_bytes`] over a string's UTF-8 bytes.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Serialize a JSON value with object keys sorted recursively, so logically
/// equal values hash identically regardless of key order. List order is
/// preserved: detection list order affects rendering, so it must affect the
/// key.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by_key(|(key, _)| *key);
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Cache key for a pre-rendered annotated image payload: a hash of the first
/// [`PAYLOAD_PREFIX_LEN`] bytes.
pub fn key_for_payload(payload: &[u8]) -> String {
    let prefix = &payload[..payload.len().min(PAYLOAD_PREFIX_LEN)];
    format!("p-{}", hash_bytes(prefix))
}

/// Cache key for a (source image locator, detection list) pair: a versioned
/// combination of the locator hash and a hash of the canonical detection
/// serialization.
pub fn key_for_inputs(
    source_locator: &str,
    detections: &[Detection],
) -> Result<String, RadmarkError> {
    let value = serde_json::to_value(detections)?;
    Ok(format!(
        "{KEY_VERSION}-{}-{}",
        hash_str(source_locator),
        hash_str(&canonical_json(&value))
    ))
}

/// Keyed blob store for rendered images.
///
/// `put` is best-effort: implementations swallow write failures because the
/// cache is never a correctness dependency. `get` returning `None` is an
/// expected miss. Writes are keyed and last-write-wins; identical inputs
/// produce identical bytes, so concurrent writers are safe without locking.
pub trait RenderCache {
    /// Look up a blob. `None` is a normal cache miss.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a blob, best-effort.
    fn put(&mut self, key: &str, blob: &[u8]);
}

impl RenderCache for Box<dyn RenderCache> {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.as_ref().get(key)
    }

    fn put(&mut self, key: &str, blob: &[u8]) {
        self.as_mut().put(key, blob)
    }
}

/// In-memory session cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RenderCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn put(&mut self, key: &str, blob: &[u8]) {
        self.entries.insert(key.to_string(), blob.to_vec());
    }
}

/// Persisted cache: one file per key under a cache directory, surviving
/// across sessions. All I/O failures degrade to a miss or a skipped write.
#[derive(Debug)]
pub struct DiskCache {
    dir: PathBuf,
}

impl DiskCache {
    /// Open a cache rooted at the platform cache directory.
    pub fn open_default() -> Option<Self> {
        dirs::cache_dir().map(|base| Self::open(base.join("radmark")))
    }

    /// Open a cache rooted at an explicit directory.
    pub fn open(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        // Keys are base36 plus '-' so they are filesystem-safe as-is
        self.dir.join(format!("{key}.bin"))
    }
}

impl RenderCache for DiskCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match std::fs::read(self.entry_path(key)) {
            Ok(blob) => Some(blob),
            Err(_) => None,
        }
    }

    fn put(&mut self, key: &str, blob: &[u8]) {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            log::debug!("cache dir create failed, skipping write: {e}");
            return;
        }
        // Stage in a temp file and rename, so an interrupted write can
        // never surface later as a truncated hit
        let staging = self.dir.join(format!("{key}.tmp"));
        if let Err(e) = std::fs::write(&staging, blob) {
            log::debug!("cache write for {key} failed, skipping: {e}");
            return;
        }
        if let Err(e) = std::fs::rename(&staging, self.entry_path(key)) {
            log::debug!("cache commit for {key} failed, skipping: {e}");
            std::fs::remove_file(&staging).ok();
        }
    }
}

/// Encode a blob as a `data:` URL.
pub fn blob_to_data_url(mime: &str, blob: &[u8]) -> String {
    format!("data:{mime};base64,{}", BASE64.encode(blob))
}

/// Decode a `data:` URL back into `(mime, bytes)`.
pub fn data_url_to_blob(url: &str) -> Result<(String, Vec<u8>), RadmarkError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| RadmarkError::InvalidDataUrl {
            reason: "missing data: scheme".to_string(),
        })?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| RadmarkError::InvalidDataUrl {
            reason: "missing payload separator".to_string(),
        })?;
    let mime = header
        .strip_suffix(";base64")
        .ok_or_else(|| RadmarkError::InvalidDataUrl {
            reason: "only base64 data URLs are supported".to_string(),
        })?;
    let bytes = BASE64
        .decode(payload)
        .map_err(|e| RadmarkError::InvalidDataUrl {
            reason: e.to_string(),
        })?;
    Ok((mime.to_string(), bytes))
}

/// Handle to a blob registered in [`ObjectUrls`]. Cheap to clone; resolving
/// a revoked handle yields `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectUrl(String);

impl ObjectUrl {
    /// The URL string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// In-process registry of revocable blob URLs.
///
/// The caller that creates a URL owns its revocation; leaking URLs is a
/// defect, so [`ObjectUrls::outstanding`] exposes the live count for
/// teardown checks.
#[derive(Debug, Default)]
pub struct ObjectUrls {
    next_id: u64,
    live: HashMap<String, Vec<u8>>,
}

impl ObjectUrls {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a blob and return its URL.
    pub fn create(&mut self, blob: Vec<u8>) -> ObjectUrl {
        let url = format!("blob:radmark/{}", self.next_id);
        self.next_id += 1;
        self.live.insert(url.clone(), blob);
        ObjectUrl(url)
    }

    /// Resolve a live URL to its blob.
    pub fn resolve(&self, url: &ObjectUrl) -> Option<&[u8]> {
        self.live.get(&url.0).map(Vec::as_slice)
    }

    /// Revoke a URL. Returns whether it was live. Revoking twice is a no-op.
    pub fn revoke(&mut self, url: &ObjectUrl) -> bool {
        self.live.remove(&url.0).is_some()
    }

    /// Revoke every live URL.
    pub fn revoke_all(&mut self) {
        self.live.clear();
    }

    /// Number of live (unrevoked) URLs.
    pub fn outstanding(&self) -> usize {
        self.live.len()
    }
}
