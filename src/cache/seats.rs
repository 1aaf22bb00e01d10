use redis::AsyncCommands;
use tracing::{debug, error, warn};

use crate::cache::CacheService;
use crate::models::SeatWithIndirect;

/// Generation counter of a listing's views. Invalidation bumps it, so a view
/// computed before a mutation is saved under a generation nobody reads.
pub fn version_key(event_id: &str) -> String {
    format!("seats:{event_id}:version")
}

pub fn view_key(event_id: &str, version: u64) -> String {
    format!("seats:{event_id}:view:{version}")
}

#[derive(Debug)]
pub enum CacheLookup {
    Hit(Vec<SeatWithIndirect>),
    /// Nothing cached for the current generation; save under `version`.
    Miss { version: u64 },
    Unavailable,
}

impl CacheService {
    pub async fn get_seat_views(&self, event_id: &str) -> CacheLookup {
        let mut conn = self.redis.conn.clone();
        let version: Option<u64> = match conn.get(version_key(event_id)).await {
            Ok(version) => version,
            Err(e) => {
                error!(event_id, error = %e, "Seat view version read failed");
                return CacheLookup::Unavailable;
            }
        };
        let version = version.unwrap_or(0);

        let data: Option<String> = match conn.get(view_key(event_id, version)).await {
            Ok(data) => data,
            Err(e) => {
                error!(event_id, error = %e, "Seat view cache read failed");
                return CacheLookup::Unavailable;
            }
        };
        let Some(data) = data else {
            return CacheLookup::Miss { version };
        };

        match serde_json::from_str(&data) {
            Ok(views) => {
                debug!(event_id, version, "Seat view cache hit");
                CacheLookup::Hit(views)
            }
            Err(e) => {
                warn!(event_id, error = %e, "Discarding unreadable cached seat view");
                let _: redis::RedisResult<()> = conn.del(view_key(event_id, version)).await;
                CacheLookup::Miss { version }
            }
        }
    }

    pub async fn save_seat_views(&self, event_id: &str, version: u64, views: &[SeatWithIndirect]) {
        let data = match serde_json::to_string(views) {
            Ok(data) => data,
            Err(e) => {
                error!(event_id, error = %e, "Failed to serialize seat views");
                return;
            }
        };
        let mut conn = self.redis.conn.clone();
        let result: redis::RedisResult<()> = conn
            .set_ex(view_key(event_id, version), data, self.ttl_seconds)
            .await;
        if let Err(e) = result {
            error!(event_id, error = %e, "Seat view cache write failed");
        }
    }

    /// Move the given listings to a new generation. Views of the old one are
    /// left to expire.
    pub async fn invalidate_events<'a, I>(&self, event_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys: Vec<String> = event_ids.into_iter().map(version_key).collect();
        if keys.is_empty() {
            return;
        }

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.incr(key, 1).ignore();
        }
        let mut conn = self.redis.conn.clone();
        let result: redis::RedisResult<()> = pipe.query_async(&mut conn).await;
        match result {
            Ok(()) => debug!(count = keys.len(), "Invalidated seat views"),
            Err(e) => error!(error = %e, "Seat view invalidation failed"),
        }
    }
}
