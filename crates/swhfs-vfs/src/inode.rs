//! The inode table (§4.5 "Inode allocator"). Modeled on `tinymist-vfs`'s
//! `PathInterner` — monotonic id allocation over a map — generalized from
//! interning paths to interning [`Entry`] values, since inodes here don't
//! need content-addressed deduplication: every `lookup` mints a fresh one.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::entry::Entry;

/// The inode the kernel assigns to the mountpoint root, fixed by the FUSE
/// protocol.
pub const ROOT_INODE: u64 = 1;

struct Inner {
    next: u64,
    entries: HashMap<u64, Entry>,
}

/// Maps allocated inodes to the [`Entry`] they name (§3 "bijection from
/// allocated inode to entry"). Shared by every kernel callback; guarded by
/// a plain mutex since all access happens from the single event loop (§5).
pub struct InodeTable {
    inner: Mutex<Inner>,
}

impl InodeTable {
    /// Construct the table with `root` already bound to [`ROOT_INODE`].
    pub fn new(root: Entry) -> Self {
        let mut entries = HashMap::new();
        entries.insert(ROOT_INODE, root);
        Self {
            inner: Mutex::new(Inner {
                next: ROOT_INODE + 1,
                entries,
            }),
        }
    }

    /// Allocate a fresh inode for `entry` and bind it. Inodes are never
    /// reused within a mount session (§3 invariant).
    pub fn alloc(&self, entry: Entry) -> u64 {
        let mut inner = self.inner.lock();
        let inode = inner.next;
        inner.next += 1;
        inner.entries.insert(inode, entry);
        inode
    }

    /// Look up the entry bound to `inode`, cloning it out from under the
    /// lock (entries are cheap — see [`crate::entry`] module docs).
    pub fn get(&self, inode: u64) -> Option<Entry> {
        self.inner.lock().entries.get(&inode).cloned()
    }

    /// Drop the binding for `inode`. The kernel is expected to have
    /// already invalidated its own cache entry via `forget` before this is
    /// called in response to an explicit removal (§4.5 `remove_inode`).
    pub fn remove(&self, inode: u64) {
        self.inner.lock().entries.remove(&inode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{Kind, Mode};

    fn root() -> Entry {
        Entry::new("", Mode::RoDir, 0, Kind::RootDir)
    }

    #[test]
    fn allocates_monotonically_and_never_reuses() {
        let table = InodeTable::new(root());
        let a = table.alloc(Entry::new("archive", Mode::RoDir, 1, Kind::ArchiveDir));
        let b = table.alloc(Entry::new("origin", Mode::RoDir, 1, Kind::OriginDir));
        assert!(b > a);
        assert_ne!(a, ROOT_INODE);
        table.remove(a);
        let c = table.alloc(Entry::new("cache", Mode::RoDir, 1, Kind::CacheDir));
        assert!(c > b, "removed inodes are never reissued");
    }

    #[test]
    fn root_is_bound_at_construction() {
        let table = InodeTable::new(root());
        assert!(matches!(table.get(ROOT_INODE).unwrap().kind, Kind::RootDir));
    }
}
