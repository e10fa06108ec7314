use crate::report::ValidationError;
use crate::stylesheet::StylesheetPart;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const DEFAULT_CAPACITY: usize = 256;

// A parsed-and-filtered stylesheet together with the validation errors the
// filter recorded. Errors are replayed against the origin node on every
// cache hit; entries are immutable once stored.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedStylesheet {
    pub parts: Vec<StylesheetPart>,
    pub errors: Vec<ValidationError>,
}

pub trait ParseCache: Send + Sync {
    fn get(&self, key: &str) -> Option<Arc<CachedStylesheet>>;
    fn set(&self, key: &str, value: Arc<CachedStylesheet>);
}

pub struct LruParseCache {
    inner: Mutex<LruCache<String, Arc<CachedStylesheet>>>,
}

impl LruParseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Default for LruParseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ParseCache for LruParseCache {
    fn get(&self, key: &str) -> Option<Arc<CachedStylesheet>> {
        match self.inner.lock() {
            Ok(mut cache) => cache.get(key).cloned(),
            Err(_) => None,
        }
    }

    fn set(&self, key: &str, value: Arc<CachedStylesheet>) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(key.to_string(), value);
        }
    }
}
