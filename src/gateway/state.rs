use std::sync::Arc;

use crate::cache::ReadCache;
use crate::queue::JobQueue;
use crate::store::RecordStore;

/// Gateway shared state
///
/// Every dependency is injected, so tests can assemble a gateway from the
/// in-process store, queue and cache.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub queue: Arc<dyn JobQueue>,
    pub cache: Arc<dyn ReadCache>,
    /// Build identifier reported by the health endpoint
    pub version: String,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        queue: Arc<dyn JobQueue>,
        cache: Arc<dyn ReadCache>,
    ) -> Self {
        Self {
            store,
            queue,
            cache,
            version: env!("GIT_HASH").to_string(),
        }
    }
}
