// Engine cache: one lazily-created, shared backend instance per fingerprint.
//
// Every stage adapter funnels backend construction through one of these
// caches. A fingerprint captures the model identifier, language pair and
// dynamic configuration (see fingerprint.rs); identical fingerprints always
// resolve to the same instance, distinct fingerprints never share one.
// Initialization is expensive (model load, credential handshake), which is
// the whole reason the cache exists.

pub mod fingerprint;
pub mod resolve;

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::services::detection::DetectionBackend;
use crate::services::inpainting::InpaintBackend;
use crate::services::ocr::OcrBackend;
use crate::services::translation::Translator;

struct CacheEntry<B: ?Sized> {
    cell: Arc<OnceCell<Arc<B>>>,
    created_at: Instant,
}

/// Fingerprint → backend cache for one stage kind.
///
/// Concurrent first requests for an uncached fingerprint are serialized
/// through a per-entry `OnceCell`, so exactly one initializer runs and every
/// caller receives the same `Arc`. A failed initialization leaves the cell
/// vacant: the failure is not cached and the next request retries. Entries
/// are never evicted within the process.
pub struct EngineCache<B: ?Sized + Send + Sync> {
    entries: DashMap<String, CacheEntry<B>>,
}

impl<B: ?Sized + Send + Sync> EngineCache<B> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the backend for `fingerprint`, running `init` at most once per
    /// fingerprint process-wide. The map shard lock is released before `init`
    /// is awaited.
    pub async fn get_or_create<F, Fut, E>(&self, fingerprint: &str, init: F) -> Result<Arc<B>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Arc<B>, E>>,
    {
        let cell = {
            let entry = self
                .entries
                .entry(fingerprint.to_string())
                .or_insert_with(|| CacheEntry {
                    cell: Arc::new(OnceCell::new()),
                    created_at: Instant::now(),
                });
            Arc::clone(&entry.cell)
        };

        if cell.get().is_none() {
            debug!(fingerprint, "engine not cached, initializing");
        }

        let backend = cell.get_or_try_init(init).await?;
        Ok(Arc::clone(backend))
    }

    /// Number of fingerprints seen (including ones whose initialization is
    /// still pending or has failed).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Age of a cache entry, for diagnostics.
    pub fn entry_age(&self, fingerprint: &str) -> Option<std::time::Duration> {
        self.entries
            .get(fingerprint)
            .map(|entry| entry.created_at.elapsed())
    }
}

impl<B: ?Sized + Send + Sync> Default for EngineCache<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// The four per-stage caches, built once at the composition root and
/// injected into the controller's adapters. Tests construct a fresh set per
/// case instead of reaching for ambient global state.
pub struct EngineCaches {
    pub detection: EngineCache<dyn DetectionBackend>,
    pub ocr: EngineCache<dyn OcrBackend>,
    pub translation: EngineCache<Translator>,
    pub inpainting: EngineCache<dyn InpaintBackend>,
}

impl EngineCaches {
    pub fn new() -> Self {
        Self {
            detection: EngineCache::new(),
            ocr: EngineCache::new(),
            translation: EngineCache::new(),
            inpainting: EngineCache::new(),
        }
    }
}

impl Default for EngineCaches {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(usize);

    #[tokio::test]
    async fn test_identical_fingerprints_share_one_instance() {
        let cache: EngineCache<Counter> = EngineCache::new();

        let a = cache
            .get_or_create("model_ja_en", || async {
                Ok::<_, std::convert::Infallible>(Arc::new(Counter(1)))
            })
            .await
            .unwrap();
        let b = cache
            .get_or_create("model_ja_en", || async {
                Ok::<_, std::convert::Infallible>(Arc::new(Counter(2)))
            })
            .await
            .unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.0, 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_fingerprints_get_distinct_instances() {
        let cache: EngineCache<Counter> = EngineCache::new();

        let a = cache
            .get_or_create("model_ja_en", || async {
                Ok::<_, std::convert::Infallible>(Arc::new(Counter(1)))
            })
            .await
            .unwrap();
        let b = cache
            .get_or_create("model_ja_fr", || async {
                Ok::<_, std::convert::Infallible>(Arc::new(Counter(2)))
            })
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_creates_exactly_one_instance() {
        let cache = Arc::new(EngineCache::<Counter>::new());
        let constructions = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let constructions = Arc::clone(&constructions);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create("GPT-4.1-mini_ja_en_deadbeef", || async move {
                        // Simulate a slow model load so tasks overlap
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        constructions.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, std::convert::Infallible>(Arc::new(Counter(7)))
                    })
                    .await
                    .unwrap()
            }));
        }

        let instances: Vec<Arc<Counter>> =
            futures::future::join_all(handles).await.into_iter().map(|r| r.unwrap()).collect();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        for instance in &instances[1..] {
            assert!(Arc::ptr_eq(&instances[0], instance));
        }
    }

    #[tokio::test]
    async fn test_failed_initialization_is_not_cached() {
        let cache: EngineCache<Counter> = EngineCache::new();

        let first = cache
            .get_or_create("flaky", || async { Err::<Arc<Counter>, _>("bad credentials") })
            .await;
        assert!(first.is_err());

        let second = cache
            .get_or_create("flaky", || async {
                Ok::<_, &'static str>(Arc::new(Counter(42)))
            })
            .await
            .unwrap();
        assert_eq!(second.0, 42);
    }
}
