use std::sync::Arc;

use crate::cache::StatsCache;

/// Shared state for the web server. Handlers only read through the cache.
#[derive(Clone)]
pub struct WebSharedState {
    pub cache: Arc<StatsCache>,
}

impl WebSharedState {
    pub fn new(cache: Arc<StatsCache>) -> Self {
        Self { cache }
    }
}
