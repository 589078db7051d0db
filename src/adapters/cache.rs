use crate::domain::model::{Course, StudentId};
use crate::domain::ports::CourseListCache;
use dashmap::DashMap;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// Soft bound on cached lists; reaching it triggers an expiry sweep on `put`.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CacheEntry {
    courses: Vec<Course>,
    inserted_at: Instant,
}

/// In-process TTL cache of each student's course list.
///
/// Expired entries are dropped on `get`, when `put` finds the map at capacity,
/// and by the background sweeper started with [`TtlCache::spawn_sweeper`].
#[derive(Debug)]
pub struct TtlCache {
    ttl: Duration,
    max_entries: usize,
    entries: DashMap<StudentId, CacheEntry>,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_capacity(ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_capacity(ttl: Duration, max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            ttl,
            max_entries,
            entries: DashMap::with_capacity(max_entries.min(DEFAULT_MAX_ENTRIES)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.inserted_at.elapsed() < self.ttl
    }

    /// Removes every expired entry and returns how many went.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry));
        before.saturating_sub(self.entries.len())
    }

    /// Sweeps expired entries every `every` until the cache is dropped.
    pub fn spawn_sweeper(cache: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(cache);
        let every = every.max(Duration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(live) = cache.upgrade() else {
                    break;
                };
                let purged = live.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, remaining = live.len(), "Swept expired course lists");
                }
            }
        })
    }
}

impl Default for TtlCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl CourseListCache for TtlCache {
    fn get(&self, student_id: StudentId) -> Option<Vec<Course>> {
        if let Some(entry) = self.entries.get(&student_id) {
            if self.is_fresh(&entry) {
                return Some(entry.courses.clone());
            }
        }
        self.entries
            .remove_if(&student_id, |_, entry| !self.is_fresh(entry));
        None
    }

    fn put(&self, student_id: StudentId, courses: Vec<Course>) {
        if self.entries.len() >= self.max_entries {
            self.purge_expired();
        }

        // Still full of live lists: drop a tenth of them, in map order.
        if self.entries.len() >= self.max_entries {
            let to_remove: Vec<StudentId> = self
                .entries
                .iter()
                .take((self.max_entries / 10).max(1))
                .map(|r| *r.key())
                .collect();
            for key in to_remove {
                self.entries.remove(&key);
            }
        }

        self.entries.insert(
            student_id,
            CacheEntry {
                courses,
                inserted_at: Instant::now(),
            },
        );
    }

    fn invalidate(&self, student_id: StudentId) {
        if self.entries.remove(&student_id).is_some() {
            tracing::debug!(student_id, "Invalidated cached course list");
        }
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: i64) -> Course {
        Course {
            id,
            name: format!("Course {}", id),
            code: format!("C{}", id),
            description: None,
            max_students: 3,
            professor_id: None,
        }
    }

    #[test]
    fn test_put_then_get_returns_list() {
        let cache = TtlCache::default();
        cache.put(1, vec![course(10), course(11)]);

        let cached = cache.get(1).unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cache.ttl(), Duration::from_secs(600));
        assert!(cache.get(2).is_none());
    }

    #[test]
    fn test_invalidate_removes_entry() {
        let cache = TtlCache::default();
        cache.put(1, vec![course(10)]);
        cache.invalidate(1);

        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = TtlCache::new(Duration::ZERO);
        cache.put(1, vec![course(10)]);

        assert!(cache.get(1).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_purge_expired_sweeps_only_stale_entries() {
        let stale = TtlCache::new(Duration::ZERO);
        stale.put(1, vec![]);
        stale.put(2, vec![course(10)]);
        assert_eq!(stale.purge_expired(), 2);

        let fresh = TtlCache::default();
        fresh.put(1, vec![course(10)]);
        assert_eq!(fresh.purge_expired(), 0);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn test_put_at_capacity_evicts_expired_lists() {
        let cache = TtlCache::with_capacity(Duration::ZERO, 4);
        for id in 0..4 {
            cache.put(id, vec![course(id)]);
        }
        assert_eq!(cache.len(), 4);

        cache.put(99, vec![]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_at_capacity_drops_live_lists_when_nothing_expired() {
        let cache = TtlCache::with_capacity(DEFAULT_TTL, 20);
        for id in 0..20 {
            cache.put(id, vec![]);
        }

        cache.put(100, vec![course(1)]);

        assert_eq!(cache.len(), 19);
        assert!(cache.get(100).is_some());
    }

    #[tokio::test]
    async fn test_sweeper_removes_lists_nobody_reads_again() {
        let cache = Arc::new(TtlCache::new(Duration::from_millis(1)));
        for id in 0..500 {
            cache.put(id, vec![course(id)]);
        }

        let sweeper = TtlCache::spawn_sweeper(&cache, Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.len(), 0);
        sweeper.abort();
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_cache_is_dropped() {
        let cache = Arc::new(TtlCache::default());
        let sweeper = TtlCache::spawn_sweeper(&cache, Duration::from_millis(1));
        drop(cache);

        tokio::time::timeout(Duration::from_secs(1), sweeper)
            .await
            .expect("sweeper exits")
            .unwrap();
    }
}
