//! # 结果缓存
//!
//! 资源定位符 → PNG Data URL。默认不限容量、永不淘汰；
//! 配置了 `result_cache_capacity` 时按最近最少使用淘汰。

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

pub struct ResultCache {
    entries: Mutex<LruCache<String, String>>,
}

impl ResultCache {
    /// `None` 表示不限容量。
    pub fn new(capacity: Option<NonZeroUsize>) -> Self {
        let entries = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };

        Self {
            entries: Mutex::new(entries),
        }
    }

    pub fn get(&self, locator: &str) -> Option<String> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => return None,
        };

        entries.get(locator).cloned()
    }

    /// 写入结果；同一 key 重复写入直接覆盖。
    pub fn put(&self, locator: impl Into<String>, data_url: impl Into<String>) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(_) => {
                log::warn!("⚠️ 结果缓存锁已中毒，跳过写入");
                return;
            }
        };

        entries.put(locator.into(), data_url.into());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn put_overwrites_existing_entry() {
        let cache = ResultCache::new(None);

        cache.put("photo.webp", "data:image/png;base64,AAA");
        cache.put("photo.webp", "data:image/png;base64,BBB");

        assert_eq!(cache.get("photo.webp").as_deref(), Some("data:image/png;base64,BBB"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_returns_none() {
        let cache = ResultCache::new(None);

        assert!(cache.get("missing.webp").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn unbounded_cache_never_evicts() {
        let cache = ResultCache::new(None);

        for i in 0..2_000 {
            cache.put(format!("{}.webp", i), format!("data:{}", i));
        }

        assert_eq!(cache.len(), 2_000);
        assert_eq!(cache.get("0.webp").as_deref(), Some("data:0"));
    }

    #[test]
    fn bounded_cache_evicts_least_recently_used() {
        let cache = ResultCache::new(NonZeroUsize::new(2));

        cache.put("a.webp", "data:a");
        cache.put("b.webp", "data:b");
        assert!(cache.get("a.webp").is_some());
        cache.put("c.webp", "data:c");

        assert!(cache.get("a.webp").is_some());
        assert!(cache.get("b.webp").is_none());
        assert!(cache.get("c.webp").is_some());
    }

    #[test]
    fn single_entry_cache_keeps_only_latest() {
        let cache = ResultCache::new(NonZeroUsize::new(1));

        cache.put("a.webp", "data:a");
        cache.put("b.webp", "data:b");

        assert_eq!(cache.len(), 1);
        assert!(cache.get("a.webp").is_none());
        assert_eq!(cache.get("b.webp").as_deref(), Some("data:b"));
    }

    proptest! {
        #[test]
        fn get_after_put_returns_value(
            entries in proptest::collection::vec((".{0,24}", ".{0,64}"), 1..32),
        ) {
            let cache = ResultCache::new(None);

            for (key, value) in &entries {
                cache.put(key.clone(), value.clone());
                prop_assert_eq!(cache.get(key), Some(value.clone()));
            }
        }
    }
}
