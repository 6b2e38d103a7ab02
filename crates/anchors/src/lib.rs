//! The transit anchor-snapshot cache (spec §4.2): answers "where will location L be at game
//! time T?" for transit-curve rendering, without needing a live ephemeris.
//!
//! This crate is a plain data structure with no network or async dependency; the orchestration
//! that fetches a missing bucket and coalesces concurrent requests for it lives in
//! `orbitmap_sync`, which owns the Sync Loop component (spec §4.7, §10.2).

use std::collections::{HashMap, VecDeque};

use orbitmap_core::constants::ANCHOR_CACHE_CAPACITY;
use orbitmap_core::time::bucket;
use orbitmap_core::vector::Vector2;

pub type LocationId = String;

/// A single location's projected world position within one anchor bucket.
#[derive(Debug, Clone)]
pub struct ProjectedLocation {
    pub location_id: LocationId,
    pub position: Vector2,
}

/// The bounded LRU of anchor buckets. Eviction is first-in-first-out: spec §8's "request 20
/// distinct buckets sequentially, the 4 oldest are absent" describes insertion order, not
/// access recency, so a plain FIFO queue satisfies it exactly without the bookkeeping a true
/// LRU would need.
#[derive(Debug)]
pub struct AnchorCache {
    capacity: usize,
    buckets: HashMap<i64, HashMap<LocationId, Vector2>>,
    insertion_order: VecDeque<i64>,
}

impl AnchorCache {
    pub fn new(capacity: usize) -> Self {
        AnchorCache {
            capacity: capacity.max(1),
            buckets: HashMap::new(),
            insertion_order: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn contains_bucket(&self, bucket: i64) -> bool {
        self.buckets.contains_key(&bucket)
    }

    /// `get(L, T)`: the stored `(rx, ry)` for location `L` at game time `T`, or `None` if that
    /// bucket has not been fetched.
    pub fn get(&self, location_id: &str, game_time: f64) -> Option<Vector2> {
        let b = bucket(game_time);
        self.buckets.get(&b)?.get(location_id).copied()
    }

    /// Store a freshly fetched bucket's projected locations, evicting the oldest-inserted
    /// bucket if the cache is now over capacity. Re-inserting an already-present bucket
    /// refreshes its contents but not its position in the eviction order.
    pub fn insert(&mut self, bucket: i64, locations: impl IntoIterator<Item = ProjectedLocation>) {
        let is_new = !self.buckets.contains_key(&bucket);
        let entry = self.buckets.entry(bucket).or_default();
        entry.clear();
        for loc in locations {
            entry.insert(loc.location_id, loc.position);
        }
        if is_new {
            self.insertion_order.push_back(bucket);
            while self.buckets.len() > self.capacity {
                if let Some(oldest) = self.insertion_order.pop_front() {
                    self.buckets.remove(&oldest);
                } else {
                    break;
                }
            }
        }
    }
}

impl Default for AnchorCache {
    fn default() -> Self {
        AnchorCache::new(ANCHOR_CACHE_CAPACITY)
    }
}

/// The set of anchor buckets referenced by a ship's legs and transit times (spec §4.2: "on
/// every ship list update, the set of buckets derived from every leg's departure_time and
/// arrival_time ... is ensured in parallel").
pub fn buckets_for_ship(
    departed_at: Option<f64>,
    arrives_at: Option<f64>,
    leg_times: impl IntoIterator<Item = (f64, f64)>,
) -> Vec<i64> {
    let mut buckets: Vec<i64> = Vec::new();
    let mut push = |t: f64| {
        let b = bucket(t);
        if !buckets.contains(&b) {
            buckets.push(b);
        }
    };
    if let Some(t) = departed_at {
        push(t);
    }
    if let Some(t) = arrives_at {
        push(t);
    }
    for (departure, arrival) in leg_times {
        push(departure);
        push(arrival);
    }
    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbitmap_core::constants::BUCKET_SECONDS;

    fn loc(id: &str, x: f64, y: f64) -> ProjectedLocation {
        ProjectedLocation {
            location_id: id.to_string(),
            position: Vector2::new(x, y),
        }
    }

    #[test]
    fn get_returns_none_for_unfetched_bucket() {
        let cache = AnchorCache::new(4);
        assert_eq!(cache.get("grp_mars", 0.0), None);
    }

    #[test]
    fn insert_then_get_resolves_position_for_game_time_in_bucket() {
        let mut cache = AnchorCache::new(4);
        cache.insert(0, vec![loc("grp_mars", 1.0, 2.0)]);
        assert_eq!(cache.get("grp_mars", BUCKET_SECONDS / 2.0), Some(Vector2::new(1.0, 2.0)));
    }

    #[test]
    fn anchor_lru_size_never_exceeds_capacity() {
        let mut cache = AnchorCache::new(16);
        for b in 0..20_i64 {
            cache.insert(b, vec![loc("grp_mars", b as f64, 0.0)]);
        }
        assert_eq!(cache.len(), 16);
    }

    #[test]
    fn anchor_lru_evicts_oldest_four_of_twenty() {
        let mut cache = AnchorCache::new(16);
        for b in 0..20_i64 {
            cache.insert(b, vec![loc("grp_mars", b as f64, 0.0)]);
        }
        for b in 0..4_i64 {
            assert!(!cache.contains_bucket(b), "bucket {b} should have been evicted");
        }
        for b in 4..20_i64 {
            assert!(cache.contains_bucket(b), "bucket {b} should still be cached");
        }
    }

    #[test]
    fn buckets_for_ship_dedupes_and_covers_legs() {
        let buckets = buckets_for_ship(
            Some(0.0),
            Some(BUCKET_SECONDS * 2.0),
            vec![(0.0, BUCKET_SECONDS), (BUCKET_SECONDS, BUCKET_SECONDS * 2.0)],
        );
        assert_eq!(buckets, vec![0, 2, 1]);
    }
}
