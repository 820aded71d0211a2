//! Validated-Response Cache
//!
//! Process-wide cache of evaluator-passed responses and classifier
//! labels, keyed by a deterministic fingerprint of (namespace, normalized
//! query). Queries differing only by case or surrounding whitespace
//! collide by construction. The base contract carries no TTL; the
//! `cleanup_older_than` hook exists so a TTL policy can be layered on by
//! the management surface.
//!
//! Invariant: callers only store evaluator-passed responses here. The
//! workflow never writes a failing draft or a fallback.

use crate::intent::Intent;
use crate::response::ResponseDraft;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Cache namespace for classifier results
pub const CLASSIFIER_NAMESPACE: &str = "classifier";

/// A cached value: either a classifier label or a validated draft
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    Intent(Intent),
    Response(ResponseDraft),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    namespace: String,
    stored_at: DateTime<Utc>,
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    /// Formatted percentage, e.g. "57.1%" (wire contract of the stats endpoint)
    pub hit_rate: String,
    pub cache_size: usize,
}

/// In-memory response cache shared across concurrent requests.
///
/// Reads take a shared lock; writes swap the entry under an exclusive
/// lock, so a racing writer can win but never leave a torn value.
#[derive(Clone, Default)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint of (namespace, case-folded and trimmed query)
    fn make_key(namespace: &str, query: &str) -> String {
        let normalized = format!("{}:{}", namespace, query.trim().to_lowercase());
        let digest = Sha256::digest(normalized.as_bytes());
        hex::encode(digest)
    }

    /// Look up a cached value, counting the hit or miss
    pub fn get(&self, namespace: &str, query: &str) -> Option<CachedValue> {
        let key = Self::make_key(namespace, query);
        let entries = self.entries.read().expect("cache lock poisoned");

        match entries.get(&key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(namespace, "cache hit");
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(namespace, "cache miss");
                None
            }
        }
    }

    /// Store a value. Callers must only pass evaluator-passed responses.
    pub fn set(&self, namespace: &str, query: &str, value: CachedValue) {
        let key = Self::make_key(namespace, query);
        let entry = CacheEntry {
            value,
            namespace: namespace.to_string(),
            stored_at: Utc::now(),
        };

        let mut entries = self.entries.write().expect("cache lock poisoned");
        entries.insert(key, entry);
        tracing::debug!(namespace, "cache store");
    }

    /// Invalidate entries. Both arguments given removes one entry; only a
    /// query removes it across all namespaces; only an intent removes that
    /// namespace; neither clears everything. Returns removed-entry count.
    pub fn invalidate(&self, namespace: Option<&str>, query: Option<&str>) -> usize {
        let mut entries = self.entries.write().expect("cache lock poisoned");

        match (namespace, query) {
            (Some(ns), Some(q)) => {
                let key = Self::make_key(ns, q);
                usize::from(entries.remove(&key).is_some())
            }
            (None, Some(q)) => {
                let mut removed = 0;
                let namespaces: Vec<String> = {
                    let mut all: Vec<String> =
                        Intent::all().iter().map(|i| i.as_str().to_string()).collect();
                    all.push(CLASSIFIER_NAMESPACE.to_string());
                    all
                };
                for ns in namespaces {
                    let key = Self::make_key(&ns, q);
                    if entries.remove(&key).is_some() {
                        removed += 1;
                    }
                }
                removed
            }
            (Some(ns), None) => {
                let before = entries.len();
                entries.retain(|_, entry| entry.namespace != ns);
                before - entries.len()
            }
            (None, None) => {
                let removed = entries.len();
                entries.clear();
                removed
            }
        }
    }

    /// Clear every entry. Returns the number removed.
    pub fn invalidate_all(&self) -> usize {
        self.invalidate(None, None)
    }

    /// TTL hook: drop entries stored longer ago than `max_age`.
    /// Returns the number removed.
    pub fn cleanup_older_than(&self, max_age: Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut entries = self.entries.write().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.stored_at >= cutoff);
        before - entries.len()
    }

    /// Snapshot of the cache counters
    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        };
        let size = self.entries.read().expect("cache lock poisoned").len();

        CacheStats {
            hits,
            misses,
            total_requests: total,
            hit_rate: format!("{:.1}%", rate),
            cache_size: size,
        }
    }

    /// Hit rate as a number in [0, 100], for health classification
    pub fn hit_rate_percent(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }

    /// Snapshot of stored responses, for invariant checks in tests
    pub fn stored_responses(&self) -> Vec<ResponseDraft> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .values()
            .filter_map(|entry| match &entry.value {
                CachedValue::Response(draft) => Some(draft.clone()),
                CachedValue::Intent(_) => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::{CompanionAnswer, DuaResponse};
    use proptest::prelude::*;

    fn sample_draft() -> ResponseDraft {
        ResponseDraft::Companion(CompanionAnswer {
            text: "Patience is a light.".to_string(),
        })
    }

    #[test]
    fn test_set_then_get_returns_exact_value() {
        let cache = ResponseCache::new();
        let draft = sample_draft();

        cache.set(
            "companion_answer",
            "what is patience",
            CachedValue::Response(draft.clone()),
        );

        let got = cache.get("companion_answer", "what is patience");
        assert_eq!(got, Some(CachedValue::Response(draft)));
    }

    #[test]
    fn test_case_and_whitespace_collide() {
        let cache = ResponseCache::new();
        cache.set("dua", "morning dua", CachedValue::Response(sample_draft()));

        assert!(cache.get("dua", "  Morning DUA  ").is_some());
        assert!(cache.get("dua", "\tMORNING DUA\n").is_some());
    }

    #[test]
    fn test_namespaces_do_not_collide() {
        let cache = ResponseCache::new();
        cache.set("dua", "patience", CachedValue::Response(sample_draft()));

        assert!(cache.get("video_list", "patience").is_none());
        assert!(cache.get("dua", "patience").is_some());
    }

    #[test]
    fn test_intent_values_round_trip() {
        let cache = ResponseCache::new();
        cache.set(
            CLASSIFIER_NAMESPACE,
            "show me a dua",
            CachedValue::Intent(Intent::Dua),
        );

        assert_eq!(
            cache.get(CLASSIFIER_NAMESPACE, "show me a dua"),
            Some(CachedValue::Intent(Intent::Dua))
        );
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let cache = ResponseCache::new();
        cache.set("dua", "q", CachedValue::Response(sample_draft()));

        cache.get("dua", "q"); // hit
        cache.get("dua", "other"); // miss
        cache.get("dua", "q"); // hit

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 3);
        assert_eq!(stats.hit_rate, "66.7%");
        assert_eq!(stats.cache_size, 1);
    }

    #[test]
    fn test_empty_cache_stats() {
        let stats = ResponseCache::new().stats();
        assert_eq!(stats.hit_rate, "0.0%");
        assert_eq!(stats.cache_size, 0);
    }

    #[test]
    fn test_invalidate_single_entry() {
        let cache = ResponseCache::new();
        cache.set("dua", "q1", CachedValue::Response(sample_draft()));
        cache.set("dua", "q2", CachedValue::Response(sample_draft()));

        assert_eq!(cache.invalidate(Some("dua"), Some("q1")), 1);
        assert!(cache.get("dua", "q1").is_none());
        assert!(cache.get("dua", "q2").is_some());
    }

    #[test]
    fn test_invalidate_query_across_namespaces() {
        let cache = ResponseCache::new();
        cache.set("dua", "q", CachedValue::Response(sample_draft()));
        cache.set(CLASSIFIER_NAMESPACE, "q", CachedValue::Intent(Intent::Dua));

        assert_eq!(cache.invalidate(None, Some("q")), 2);
        assert_eq!(cache.stats().cache_size, 0);
    }

    #[test]
    fn test_invalidate_namespace() {
        let cache = ResponseCache::new();
        cache.set("dua", "q1", CachedValue::Response(sample_draft()));
        cache.set("dua", "q2", CachedValue::Response(sample_draft()));
        cache.set("video_list", "q3", CachedValue::Response(sample_draft()));

        assert_eq!(cache.invalidate(Some("dua"), None), 2);
        assert_eq!(cache.stats().cache_size, 1);
    }

    #[test]
    fn test_invalidate_all() {
        let cache = ResponseCache::new();
        cache.set("dua", "q1", CachedValue::Response(sample_draft()));
        cache.set("video_list", "q2", CachedValue::Response(sample_draft()));

        assert_eq!(cache.invalidate_all(), 2);
        assert_eq!(cache.stats().cache_size, 0);
    }

    #[test]
    fn test_cleanup_respects_age() {
        let cache = ResponseCache::new();
        cache.set("dua", "fresh", CachedValue::Response(sample_draft()));

        // Nothing is older than an hour yet
        assert_eq!(cache.cleanup_older_than(Duration::hours(1)), 0);
        assert_eq!(cache.stats().cache_size, 1);

        // A zero-age cutoff sweeps everything already stored
        assert_eq!(cache.cleanup_older_than(Duration::zero()), 1);
        assert_eq!(cache.stats().cache_size, 0);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let cache = ResponseCache::new();
        cache.set(
            "dua",
            "q",
            CachedValue::Response(ResponseDraft::Dua(DuaResponse::default())),
        );
        cache.set("dua", "q", CachedValue::Response(sample_draft()));

        assert_eq!(cache.get("dua", "q"), Some(CachedValue::Response(sample_draft())));
    }

    #[test]
    fn test_concurrent_writers_leave_consistent_state() {
        let cache = ResponseCache::new();
        let mut handles = Vec::new();

        for i in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for j in 0..50 {
                    cache.set(
                        "companion_answer",
                        &format!("query {}", j),
                        CachedValue::Response(ResponseDraft::Companion(CompanionAnswer {
                            text: format!("answer from writer {}", i),
                        })),
                    );
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        // One winner per key, never a torn entry
        assert_eq!(cache.stats().cache_size, 50);
        for draft in cache.stored_responses() {
            match draft {
                ResponseDraft::Companion(answer) => {
                    assert!(answer.text.starts_with("answer from writer"))
                }
                other => panic!("unexpected draft: {:?}", other),
            }
        }
    }

    proptest! {
        #[test]
        fn prop_normalization_collides_case_and_whitespace(
            query in "[a-z][a-z ]{0,38}[a-z]",
            left_pad in " {0,4}",
            right_pad in " {0,4}",
        ) {
            let cache = ResponseCache::new();
            cache.set("dua", &query, CachedValue::Response(sample_draft()));

            let variant = format!("{}{}{}", left_pad, query.to_uppercase(), right_pad);
            prop_assert!(cache.get("dua", &variant).is_some());
        }
    }
}
