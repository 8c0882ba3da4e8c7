use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),
}

/// Key-value cache used for derived listings and exchange rates. Failures here
/// are never allowed to fail a committed business transaction; callers log and
/// move on.
#[allow(async_fn_in_trait)]
pub trait ListingCache: Clone {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete every key starting with `prefix`. Returns the number of keys removed.
    async fn delete_pattern(&self, prefix: &str) -> Result<usize, CacheError>;
}
