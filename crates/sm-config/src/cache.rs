//! Build-once caching of the validated configuration.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use sm_types::SmResult;

use crate::model::{ConfigBuilder, OptimizationConfig};

/// Explicit build-once cache for a validated [`OptimizationConfig`].
///
/// The first successful build is retained; later calls return the cached
/// instance unchanged regardless of their arguments. [`ConfigCache::reset`]
/// clears the slot (intended for tests and deliberate re-initialization).
#[derive(Debug, Default)]
pub struct ConfigCache {
    slot: Mutex<Option<Arc<OptimizationConfig>>>,
}

impl ConfigCache {
    pub const fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the cached configuration, building it with `builder` only if
    /// the cache is empty. A failed build leaves the cache empty.
    pub fn get_or_init(&self, builder: ConfigBuilder) -> SmResult<Arc<OptimizationConfig>> {
        let mut slot = self.slot.lock();
        if let Some(config) = slot.as_ref() {
            debug!("returning cached optimization config");
            return Ok(Arc::clone(config));
        }
        let config = Arc::new(builder.build()?);
        *slot = Some(Arc::clone(&config));
        Ok(config)
    }

    /// Currently cached configuration, if one has been built.
    pub fn get(&self) -> Option<Arc<OptimizationConfig>> {
        self.slot.lock().clone()
    }

    /// Drop the cached configuration so the next call rebuilds.
    pub fn reset(&self) {
        *self.slot.lock() = None;
    }
}

static PROCESS_CACHE: ConfigCache = ConfigCache::new();

/// Process-wide configuration entry point.
///
/// Builds the configuration on the first call (contents > file path >
/// default file path); every later call returns the same instance until
/// [`reset`] is invoked.
pub fn init(
    config_path: Option<&str>,
    config_dict: Option<serde_json::Value>,
    api_key: Option<&str>,
) -> SmResult<Arc<OptimizationConfig>> {
    let mut builder = ConfigBuilder::new();
    if let Some(content) = config_dict {
        builder = builder.with_content(content);
    } else if let Some(path) = config_path {
        builder = builder.with_path(path);
    }
    if let Some(key) = api_key {
        builder = builder.with_api_key(key);
    }
    PROCESS_CACHE.get_or_init(builder)
}

/// Clear the process-wide configuration cache.
pub fn reset() {
    PROCESS_CACHE.reset();
}

/// Access the process-wide cache directly (e.g. to seed it in tests).
pub fn process_cache() -> &'static ConfigCache {
    &PROCESS_CACHE
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str) -> serde_json::Value {
        json!({
            "optimization_name": name,
            "parameters": [
                {"name": "x", "type": "continuous", "low_value": 1.0, "high_value": 2.0}
            ],
            "objectives": [{"name": "y"}]
        })
    }

    #[test]
    fn second_init_returns_first_instance_unchanged() {
        let cache = ConfigCache::new();
        let first = cache
            .get_or_init(ConfigBuilder::new().with_content(spec("first")))
            .unwrap();
        let second = cache
            .get_or_init(ConfigBuilder::new().with_content(spec("second")))
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.optimization_name, "first");
    }

    #[test]
    fn reset_allows_rebuild() {
        let cache = ConfigCache::new();
        let first = cache
            .get_or_init(ConfigBuilder::new().with_content(spec("first")))
            .unwrap();
        cache.reset();
        assert!(cache.get().is_none());
        let rebuilt = cache
            .get_or_init(ConfigBuilder::new().with_content(spec("second")))
            .unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(rebuilt.optimization_name, "second");
    }

    #[test]
    fn failed_build_leaves_cache_empty() {
        let cache = ConfigCache::new();
        let result = cache.get_or_init(ConfigBuilder::new().with_content(json!({})));
        assert!(result.is_err());
        assert!(cache.get().is_none());
    }
}
