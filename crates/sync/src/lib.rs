//! The periodic sync loop (spec §4.7): request coalescing, anchor-bucket orchestration, and the
//! linear extrapolating interpolation that hides the gap between location polls.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::{Mutex, OnceCell};

use orbitmap_anchors::{AnchorCache, ProjectedLocation};
use orbitmap_api::{ApiClient, ApiError};
use orbitmap_core::vector::Vector2;
use orbitmap_projection::{LocationArena, RawLocation};

pub const LOCATIONS_POLL_INTERVAL_S: f64 = 5.0;
pub const STATE_POLL_INTERVAL_S: f64 = 1.0;
pub const ORG_POLL_INTERVAL_S: f64 = 30.0;
/// Duration of the client-side interpolation installed after each locations poll (spec §4.7).
pub const LOCATION_INTERP_DURATION_S: f64 = 5.0;

/// Generic request coalescing by key: concurrent callers for the same key share one in-flight
/// call and its result (spec §4.7, §9 "Request coalescing"). An entry is evicted once its call
/// completes, so the next call for that key always starts fresh work.
pub struct SingleFlight<K, T> {
    inflight: Mutex<HashMap<K, Arc<OnceCell<T>>>>,
}

impl<K, T> Default for SingleFlight<K, T> {
    fn default() -> Self {
        SingleFlight { inflight: Mutex::new(HashMap::new()) }
    }
}

impl<K: Eq + Hash + Clone, T: Clone> SingleFlight<K, T> {
    pub fn new() -> Self {
        SingleFlight::default()
    }

    pub async fn run<F, Fut>(&self, key: K, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let cell = {
            let mut map = self.inflight.lock().await;
            map.entry(key.clone()).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };
        let result = cell.get_or_init(f).await.clone();
        let mut map = self.inflight.lock().await;
        if let Some(existing) = map.get(&key) {
            if Arc::ptr_eq(existing, &cell) {
                map.remove(&key);
            }
        }
        result
    }
}

/// Server time estimated locally between polls: `serverSyncGameS + (realNow - clientSyncRealS)
/// * timeScale` (spec §4.7).
pub fn estimate_server_time(
    server_sync_game_s: f64,
    client_sync_real_s: f64,
    real_now_s: f64,
    time_scale: f64,
) -> f64 {
    server_sync_game_s + (real_now_s - client_sync_real_s) * time_scale
}

/// A single location's in-progress move between its last two polled positions.
///
/// `current` is intentionally unclamped past `LOCATION_INTERP_DURATION_S`: a body keeps moving
/// at its last velocity until the next poll overrides it, eliminating the visible pause between
/// polls (spec §4.7).
#[derive(Debug, Clone, Copy)]
pub struct LocationInterpolation {
    pub from: Vector2,
    pub to: Vector2,
    pub started_at_s: f64,
}

impl LocationInterpolation {
    pub fn new(from: Vector2, to: Vector2, started_at_s: f64) -> Self {
        LocationInterpolation { from, to, started_at_s }
    }

    pub fn current(&self, now_s: f64) -> Vector2 {
        let t = (now_s - self.started_at_s) / LOCATION_INTERP_DURATION_S;
        self.from.lerp(self.to, t)
    }
}

/// Installs a fresh `LocationInterpolation` per moved location on every locations poll,
/// replacing stale ones wholesale.
#[derive(Default)]
pub struct LocationInterpolationSet {
    interpolations: HashMap<String, LocationInterpolation>,
}

impl LocationInterpolationSet {
    pub fn new() -> Self {
        LocationInterpolationSet::default()
    }

    /// Install interpolations for `fresh`, a `(location_id, new_rx, new_ry)` set just fetched
    /// from a poll; `previous_position` supplies each location's last known position, if any.
    pub fn install(
        &mut self,
        fresh: impl IntoIterator<Item = (String, Vector2)>,
        previous_position: impl Fn(&str) -> Option<Vector2>,
        now_s: f64,
    ) {
        let mut next = HashMap::new();
        for (id, to) in fresh {
            let from = previous_position(&id).unwrap_or(to);
            next.insert(id, LocationInterpolation::new(from, to, now_s));
        }
        self.interpolations = next;
    }

    pub fn current_position(&self, location_id: &str, now_s: f64) -> Option<Vector2> {
        self.interpolations.get(location_id).map(|interp| interp.current(now_s))
    }
}

/// Wires `orbitmap_api`, `orbitmap_projection`, and `orbitmap_anchors` together: fetches and
/// projects a bucket's locations on demand, coalescing concurrent `ensure` calls for the same
/// bucket (spec §4.2 "ensure deduplicates in-flight requests per bucket").
pub struct AnchorOrchestrator {
    cache: Mutex<AnchorCache>,
    single_flight: SingleFlight<i64, Result<(), String>>,
}

impl AnchorOrchestrator {
    pub fn new(capacity: usize) -> Self {
        AnchorOrchestrator {
            cache: Mutex::new(AnchorCache::new(capacity)),
            single_flight: SingleFlight::new(),
        }
    }

    pub async fn get(&self, location_id: &str, game_time: f64) -> Option<Vector2> {
        self.cache.lock().await.get(location_id, game_time)
    }

    /// Ensure `bucket` is present in the cache, fetching and projecting it through the API
    /// client if missing. A no-op if already cached.
    pub async fn ensure(&self, bucket: i64, api: &ApiClient) -> Result<(), String> {
        if self.cache.lock().await.contains_bucket(bucket) {
            return Ok(());
        }
        self.single_flight
            .run(bucket, || async move {
                let game_time = orbitmap_core::time::bucket_center(bucket);
                let locations = api.get_locations(Some(game_time)).await.map_err(|err: ApiError| err.to_string())?;
                let raw: Vec<RawLocation> = locations
                    .iter()
                    .map(|l| RawLocation {
                        id: l.id.clone(),
                        parent_id: l.parent_id.clone(),
                        is_group: l.is_group,
                        x_km: l.x,
                        y_km: l.y,
                    })
                    .collect();
                let arena = LocationArena::build(&raw);
                let projected = orbitmap_projection::project_all(&arena);
                let entries: Vec<ProjectedLocation> = projected
                    .into_iter()
                    .map(|(ix, pos)| ProjectedLocation {
                        location_id: arena.node(ix).id.clone(),
                        position: pos,
                    })
                    .collect();
                self.cache.lock().await.insert(bucket, entries);
                Ok(())
            })
            .await
    }

    /// Ensure every bucket referenced by a ship's legs and transit times, in parallel (spec
    /// §4.2).
    pub async fn ensure_ship_buckets(&self, buckets: &[i64], api: &ApiClient) -> Vec<Result<(), String>> {
        let futures = buckets.iter().map(|&b| self.ensure(b, api));
        futures::future::join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn location_interpolation_extrapolates_past_t_equals_one_without_clamping() {
        let interp = LocationInterpolation::new(Vector2::new(0.0, 0.0), Vector2::new(10.0, 0.0), 0.0);
        let pos = interp.current(LOCATION_INTERP_DURATION_S * 2.0);
        assert!((pos.x - 20.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_server_time_scales_elapsed_real_time() {
        let t = estimate_server_time(1000.0, 0.0, 10.0, 2.0);
        assert!((t - 1020.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn single_flight_runs_once_for_concurrent_callers_with_same_key() {
        let flight: SingleFlight<&str, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c1 = calls.clone();
        let c2 = calls.clone();
        let (a, b) = tokio::join!(
            flight.run("bucket-1", || async move {
                c1.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                42
            }),
            flight.run("bucket-1", || async move {
                c2.fetch_add(1, Ordering::SeqCst);
                7
            })
        );
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_flight_runs_fresh_work_for_a_later_call_with_the_same_key() {
        let flight: SingleFlight<&str, u32> = SingleFlight::new();
        let first = flight.run("k", || async { 1 }).await;
        let second = flight.run("k", || async { 2 }).await;
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }
}
