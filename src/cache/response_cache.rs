use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Thread-safe LRU cache for LLM responses
///
/// Keyed by a SHA-256 digest of (system message, prompt) so identical
/// enrichment prompts within one process don't pay for a second API call.
pub struct ResponseCache {
    cache: Mutex<LruCache<String, String>>,
}

impl ResponseCache {
    /// Create a new response cache with the specified capacity
    ///
    /// # Panics
    ///
    /// Panics if capacity is 0 (LRU cache requires non-zero capacity)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("Cache capacity must be at least 1");

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    fn key(system_message: &str, prompt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(system_message.as_bytes());
        hasher.update([0u8]);
        hasher.update(prompt.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Get a cached response
    pub fn get(&self, system_message: &str, prompt: &str) -> Option<String> {
        self.cache
            .lock()
            .unwrap()
            .get(&Self::key(system_message, prompt))
            .cloned()
    }

    /// Store a response in the cache
    pub fn put(&self, system_message: &str, prompt: &str, content: String) {
        self.cache
            .lock()
            .unwrap()
            .put(Self::key(system_message, prompt), content);
    }

    /// Number of cached responses
    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    /// Whether the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_miss_then_hit() {
        let cache = ResponseCache::new(4);
        assert!(cache.get("sys", "prompt").is_none());

        cache.put("sys", "prompt", "{\"ok\":true}".to_string());
        assert_eq!(cache.get("sys", "prompt").unwrap(), "{\"ok\":true}");
    }

    #[test]
    fn test_system_message_is_part_of_key() {
        let cache = ResponseCache::new(4);
        cache.put("sys-a", "prompt", "a".to_string());
        assert!(cache.get("sys-b", "prompt").is_none());
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ResponseCache::new(2);
        cache.put("s", "p1", "1".to_string());
        cache.put("s", "p2", "2".to_string());
        cache.put("s", "p3", "3".to_string());

        assert!(cache.get("s", "p1").is_none());
        assert_eq!(cache.get("s", "p3").unwrap(), "3");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let cache = ResponseCache::new(0);
        cache.put("s", "p", "v".to_string());
        assert_eq!(cache.get("s", "p").unwrap(), "v");
    }
}
