use crate::redis_client::RedisClient;

pub mod seats;

pub use seats::CacheLookup;

/// Read-through cache of per-listing seat views. Every operation is
/// best-effort: redis failures are logged and the caller falls back to the
/// store.
#[derive(Clone)]
pub struct CacheService {
    redis: RedisClient,
    ttl_seconds: u64,
}

impl CacheService {
    pub fn new(redis: RedisClient, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }
}
