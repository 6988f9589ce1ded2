//! HTTP handlers
//!
//! Read endpoints go through [`read_through`]: a cache hit is returned as is,
//! a miss loads from the store and populates the key. Nothing here ever
//! invalidates a key.

pub mod health;
pub mod stocks;
pub mod tasks;
pub mod transactions;
pub mod users;

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::ApiError;
use crate::cache::{self, ReadCache};

pub use health::{HealthResponse, health_check};
pub use stocks::{CreateStockRequest, create_stock, get_stock, list_stocks};
pub use tasks::get_task;
pub use transactions::{
    get_transaction, list_user_transactions, list_user_transactions_range, submit_transaction,
};
pub use users::{CreateUserRequest, create_user, get_user};

/// Cache-aside read.
///
/// `load` returning `None` means "nothing to show": the caller answers 404
/// and the key stays empty. Cache failures propagate as errors.
pub(crate) async fn read_through<T, F, Fut>(
    cache: &dyn ReadCache,
    key: &str,
    load: F,
) -> Result<Option<T>, ApiError>
where
    T: Serialize + DeserializeOwned + Sync,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Option<T>, ApiError>>,
{
    if let Some(hit) = cache::get_json::<T>(cache, key).await? {
        tracing::debug!(key, "Cache hit");
        return Ok(Some(hit));
    }

    let Some(value) = load().await? else {
        return Ok(None);
    };
    cache::set_json(cache, key, &value).await?;

    Ok(Some(value))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::cache::InProcessCache;
    use crate::gateway::state::AppState;
    use crate::queue::MemoryJobQueue;
    use crate::store::MemoryRecordStore;

    pub fn app_state() -> Arc<AppState> {
        Arc::new(AppState::new(
            Arc::new(MemoryRecordStore::new()),
            Arc::new(MemoryJobQueue::default()),
            Arc::new(InProcessCache::default()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InProcessCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_read_through_loads_once() {
        let cache = InProcessCache::default();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Option<Vec<i64>> = read_through(&cache, "k", || async {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ApiError>(Some(vec![1, 2]))
            })
            .await
            .unwrap();
            assert_eq!(value, Some(vec![1, 2]));
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_through_does_not_cache_misses() {
        let cache = InProcessCache::default();
        let value: Option<String> = read_through(&cache, "missing", || async { Ok::<_, ApiError>(None) })
            .await
            .unwrap();
        assert!(value.is_none());
        assert_eq!(cache.get("missing").await.unwrap(), None);
    }
}
