//! `DirEntryCache` (§4.3, §5): an in-memory LRU from a directory's inode to
//! its materialised child list, so repeated `readdir`/`lookup` calls on a
//! hot directory skip re-running `compute_entries`. Single-threaded by
//! construction (§5: "not thread-safe across event loops... all access is
//! from the single event loop"), so it's a plain `lru::LruCache`, not a
//! `parking_lot`-guarded one.

use lru::LruCache;
use std::num::NonZeroUsize;

/// A child list cached under one parent inode, with an estimated
/// heap footprint used for the byte-budget eviction policy.
struct Entry<T> {
    children: Vec<T>,
    approx_bytes: usize,
}

/// How the configured capacity was expressed (§6 `cache.direntry.maxram`).
#[derive(Debug, Clone, Copy)]
pub enum Budget {
    /// A fixed byte budget.
    Bytes(usize),
    /// A percentage of total system RAM, resolved against `total_ram_bytes`
    /// at construction time.
    Percent(f64),
}

impl Budget {
    fn resolve(self, total_ram_bytes: usize) -> usize {
        match self {
            Budget::Bytes(n) => n,
            Budget::Percent(pct) => ((total_ram_bytes as f64) * (pct / 100.0)) as usize,
        }
    }
}

/// Estimated bytes-per-child used to size an [`Entry`], since the real
/// heap footprint of an arbitrary entry type isn't known to this crate
/// (§4.3: "size-per-value is estimated linearly from list length").
pub const ESTIMATED_BYTES_PER_CHILD: usize = 256;

/// In-memory LRU cache of directory listings, keyed by parent inode.
///
/// Exempt parent kinds (the on-the-fly mounting directories and the
/// sharded cache directories, per §4.3) are never inserted here — callers
/// enforce that by simply not calling [`DirEntryCache::set`] for them, the
/// cache itself has no notion of "kind".
pub struct DirEntryCache<T> {
    entries: LruCache<u64, Entry<T>>,
    max_bytes: usize,
    used_bytes: usize,
}

impl<T: Clone> DirEntryCache<T> {
    /// `max_bytes` bounds total estimated footprint; capacity in *entry
    /// count* is effectively unbounded (eviction is byte-budget driven),
    /// so the underlying `LruCache` is sized generously.
    pub fn new(budget: Budget, total_ram_bytes: usize) -> Self {
        let max_bytes = budget.resolve(total_ram_bytes).max(ESTIMATED_BYTES_PER_CHILD);
        Self {
            entries: LruCache::new(NonZeroUsize::new(1 << 20).unwrap()),
            max_bytes,
            used_bytes: 0,
        }
    }

    /// Look up the cached children of `inode`, promoting it to
    /// most-recently-used.
    pub fn get(&mut self, inode: u64) -> Option<&[T]> {
        self.entries.get(&inode).map(|e| e.children.as_slice())
    }

    /// Cache `children` under `inode`, evicting the least-recently-used
    /// entries until the estimated footprint is back under budget (§5:
    /// "Insertion is O(1) amortised LRU; eviction occurs synchronously
    /// during `set`").
    pub fn set(&mut self, inode: u64, children: Vec<T>) {
        let approx_bytes = children.len() * ESTIMATED_BYTES_PER_CHILD;
        if let Some(old) = self.entries.pop(&inode) {
            self.used_bytes -= old.approx_bytes;
        }
        self.entries.put(
            inode,
            Entry {
                children,
                approx_bytes,
            },
        );
        self.used_bytes += approx_bytes;

        while self.used_bytes > self.max_bytes {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.used_bytes -= evicted.approx_bytes,
                None => break,
            }
        }
    }

    /// Drop any cached listing for `inode`, used by `by-date/`'s
    /// invalidate-every-100-fetches discipline (§4.4.9, §4.4.12).
    pub fn invalidate(&mut self, inode: u64) {
        if let Some(old) = self.entries.pop(&inode) {
            self.used_bytes -= old.approx_bytes;
        }
    }

    /// Current estimated footprint, exposed for the §8 testable property
    /// "used memory <= configured max after every insertion".
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_down_to_budget() {
        let mut cache: DirEntryCache<u32> =
            DirEntryCache::new(Budget::Bytes(ESTIMATED_BYTES_PER_CHILD * 3), 0);

        cache.set(1, vec![1, 2]); // 2 children, within budget
        cache.set(2, vec![1, 2]); // 4 children total > 3-child budget, evicts inode 1
        assert!(cache.used_bytes() <= cache.max_bytes());
        assert!(cache.get(1).is_none());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn get_promotes_recency() {
        let mut cache: DirEntryCache<u32> =
            DirEntryCache::new(Budget::Bytes(ESTIMATED_BYTES_PER_CHILD * 2), 0);
        cache.set(1, vec![1]);
        cache.set(2, vec![1]);
        // touch 1 so it's no longer the least-recently-used
        cache.get(1);
        cache.set(3, vec![1]);
        assert!(cache.get(2).is_none(), "2 should have been evicted, not 1");
        assert!(cache.get(1).is_some());
    }

    #[test]
    fn percent_budget_resolves_against_total_ram() {
        let cache: DirEntryCache<u32> = DirEntryCache::new(Budget::Percent(10.0), 1_000_000);
        assert_eq!(cache.max_bytes(), 100_000);
    }

    #[test]
    fn invalidate_removes_entry() {
        let mut cache: DirEntryCache<u32> = DirEntryCache::new(Budget::Bytes(1 << 20), 0);
        cache.set(1, vec![1, 2, 3]);
        cache.invalidate(1);
        assert!(cache.get(1).is_none());
        assert_eq!(cache.used_bytes(), 0);
    }
}
