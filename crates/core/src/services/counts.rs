//! Cached queue counts for review UI badges.
//!
//! Counts are computed lazily from the store and invalidated whenever any
//! service mutates request state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use vestibule_common::AppResult;
use vestibule_db::repositories::AccountRequestRepository;

/// Counts for one queue (or all queues when the key is `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueCounts {
    /// Pending requests not on hold.
    pub open: u64,
    /// Requests on hold.
    pub held: u64,
    /// Rejected requests (including spam discards).
    pub rejected: u64,
}

/// Cache of per-queue request counts.
#[derive(Clone, Default)]
pub struct RequestCountCache {
    cache: Arc<RwLock<HashMap<Option<i32>, QueueCounts>>>,
}

impl RequestCountCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get counts for a queue, computing and caching them when absent.
    pub async fn get(
        &self,
        repo: &AccountRequestRepository,
        request_type: Option<i32>,
    ) -> AppResult<QueueCounts> {
        if let Some(counts) = self.cache.read().await.get(&request_type) {
            return Ok(*counts);
        }

        let counts = QueueCounts {
            open: repo.count_open(request_type).await?,
            held: repo.count_held(request_type).await?,
            rejected: repo.count_rejected(request_type).await?,
        };

        self.cache.write().await.insert(request_type, counts);
        Ok(counts)
    }

    /// Drop all cached counts; called after every store mutation.
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn count_result(n: i64) -> std::collections::BTreeMap<&'static str, sea_orm::Value> {
        maplit::btreemap! {
            "num_items" => sea_orm::Value::BigInt(Some(n))
        }
    }

    #[tokio::test]
    async fn test_get_computes_and_caches() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count_result(4)]])
                .append_query_results([[count_result(2)]])
                .append_query_results([[count_result(1)]])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db);
        let cache = RequestCountCache::new();

        let counts = cache.get(&repo, None).await.unwrap();
        assert_eq!(
            counts,
            QueueCounts {
                open: 4,
                held: 2,
                rejected: 1
            }
        );

        // Cached: no further queries are consumed from the mock.
        let again = cache.get(&repo, None).await.unwrap();
        assert_eq!(again, counts);
    }

    #[tokio::test]
    async fn test_invalidate_recomputes() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[count_result(1)]])
                .append_query_results([[count_result(0)]])
                .append_query_results([[count_result(0)]])
                .append_query_results([[count_result(2)]])
                .append_query_results([[count_result(0)]])
                .append_query_results([[count_result(0)]])
                .into_connection(),
        );

        let repo = AccountRequestRepository::new(db);
        let cache = RequestCountCache::new();

        assert_eq!(cache.get(&repo, None).await.unwrap().open, 1);
        cache.invalidate().await;
        assert_eq!(cache.get(&repo, None).await.unwrap().open, 2);
    }
}
