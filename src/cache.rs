use std::future::Future;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::Result;

/// Filesystem key-value store mapping segment content fingerprints to
/// transcript text, one file per fingerprint.
///
/// Entries are written only after a recognition call fully succeeds, so a
/// failed or cancelled call never leaves a partial entry. Writes to the same
/// fingerprint are idempotent: identical bytes produce identical text.
#[derive(Debug)]
pub struct TranscriptionCache {
    dir: PathBuf,
    enabled: bool,
}

impl TranscriptionCache {
    /// Open a cache rooted at `dir`. If the directory cannot be created the
    /// cache degrades to disabled for this run rather than failing.
    pub fn new(dir: PathBuf, enabled: bool) -> Self {
        let enabled = if enabled {
            match std::fs::create_dir_all(&dir) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Cache directory {} not writable ({e}), caching disabled for this run",
                        dir.display()
                    );
                    false
                }
            }
        } else {
            false
        };

        Self { dir, enabled }
    }

    /// Disabled cache that never hits and never stores.
    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Content fingerprint over a segment's raw canonical bytes.
    /// Identical bytes always yield the same fingerprint.
    pub fn fingerprint(bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.txt"))
    }

    /// Return the cached transcript for a fingerprint, if present.
    pub fn lookup(&self, fingerprint: &str) -> Option<String> {
        if !self.enabled {
            return None;
        }
        match std::fs::read_to_string(self.entry_path(fingerprint)) {
            Ok(text) => {
                debug!("Cache hit for {fingerprint}");
                Some(text)
            }
            Err(_) => None,
        }
    }

    /// Persist a transcript under its fingerprint. A failed write is
    /// non-fatal; the run continues without the entry.
    pub fn store(&self, fingerprint: &str, text: &str) {
        if !self.enabled {
            return;
        }
        let path = self.entry_path(fingerprint);
        if let Err(e) = std::fs::write(&path, text) {
            warn!("Failed to write cache entry {}: {e}", path.display());
        } else {
            debug!("Cached transcript for {fingerprint}");
        }
    }

    /// Return the transcript for `segment_bytes`, invoking `compute` only on
    /// a miss. The second element is true when the cache supplied the text.
    ///
    /// For a fixed fingerprint and an enabled cache the backend is invoked at
    /// most once across the lifetime of the cache directory.
    pub async fn lookup_or_compute<F, Fut>(
        &self,
        segment_bytes: &[u8],
        compute: F,
    ) -> Result<(String, bool)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let fingerprint = Self::fingerprint(segment_bytes);

        if let Some(text) = self.lookup(&fingerprint) {
            return Ok((text, true));
        }

        let text = compute().await?;
        self.store(&fingerprint, &text);
        Ok((text, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ChunkscribeError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_fingerprint_is_content_addressed() {
        let a = TranscriptionCache::fingerprint(b"same bytes");
        let b = TranscriptionCache::fingerprint(b"same bytes");
        let c = TranscriptionCache::fingerprint(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn test_miss_computes_then_hits() {
        let dir = TempDir::new().unwrap();
        let cache = TranscriptionCache::new(dir.path().to_path_buf(), true);
        let calls = AtomicUsize::new(0);

        let (text, cached) = cache
            .lookup_or_compute(b"segment", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("hello".to_string())
            })
            .await
            .unwrap();
        assert_eq!(text, "hello");
        assert!(!cached);

        let (text, cached) = cache
            .lookup_or_compute(b"segment", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("recomputed".to_string())
            })
            .await
            .unwrap();
        assert_eq!(text, "hello");
        assert!(cached);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let cache = TranscriptionCache::disabled();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let (_, cached) = cache
                .lookup_or_compute(b"segment", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("text".to_string())
                })
                .await
                .unwrap();
            assert!(!cached);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_compute_writes_no_entry() {
        let dir = TempDir::new().unwrap();
        let cache = TranscriptionCache::new(dir.path().to_path_buf(), true);

        let result = cache
            .lookup_or_compute(b"segment", || async {
                Err(ChunkscribeError::Transcription("backend down".to_string()))
            })
            .await;
        assert!(result.is_err());

        let fingerprint = TranscriptionCache::fingerprint(b"segment");
        assert!(cache.lookup(&fingerprint).is_none());
    }

    #[test]
    fn test_unwritable_dir_degrades_to_disabled() {
        // a file where the directory should be
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("occupied");
        std::fs::write(&blocker, b"file").unwrap();

        let cache = TranscriptionCache::new(blocker.join("cache"), true);
        assert!(!cache.is_enabled());
    }

    #[test]
    fn test_survives_across_instances() {
        let dir = TempDir::new().unwrap();
        let fingerprint = TranscriptionCache::fingerprint(b"persisted");

        {
            let cache = TranscriptionCache::new(dir.path().to_path_buf(), true);
            cache.store(&fingerprint, "kept");
        }

        let reopened = TranscriptionCache::new(dir.path().to_path_buf(), true);
        assert_eq!(reopened.lookup(&fingerprint).as_deref(), Some("kept"));
    }
}
