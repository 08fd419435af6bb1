use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::cache::HandleCache;
use crate::config::IoConfig;
use crate::location::Location;

static GLOBAL: Lazy<Arc<Context>> = Lazy::new(|| Context::new(IoConfig::from_env()));

/// Configuration, handle cache and name resolution shared by a group of
/// readers and writers.
///
/// [`Context::global`] is the process-wide instance; tests build their own
/// with [`Context::new`] so cache limits and id maps stay isolated.
#[derive(Debug)]
pub struct Context {
    config: IoConfig,
    cache: HandleCache,
    location: Location,
}

impl Context {
    pub fn new(config: IoConfig) -> Arc<Self> {
        Arc::new(Self {
            cache: HandleCache::new(config.max_open_handles),
            location: Location::new(),
            config,
        })
    }

    pub fn global() -> Arc<Self> {
        GLOBAL.clone()
    }

    pub fn config(&self) -> &IoConfig {
        &self.config
    }

    pub fn cache(&self) -> &HandleCache {
        &self.cache
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}
