//! The `fuser::Filesystem` bridge (§4.5 "each request dispatched on a
//! cooperative async task"): every kernel callback clones the cheap
//! `Arc<SessionState>` handle and hands the actual work off to a spawned
//! task, so the synchronous callback returns immediately and the FUSE
//! session loop is never blocked waiting on backend I/O — the pattern the
//! retrieval pack's richer FUSE implementations use to bridge `fuser`'s
//! synchronous trait to an async core.
//!
//! Opendir/open reuse the inode itself as the file handle (§4.5 "reuses
//! inode as directory/file handle"): there is no separate handle
//! allocator.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyXattr, Request,
};
use parking_lot::Mutex;

use crate::entry::Entry;
use crate::fuse::{Child, Fuse};

/// How long the kernel may cache attributes/entries before re-asking.
/// Not specified numerically by the archive's semantics (objects are
/// immutable once cached); chosen short enough that a `cache/` unlink is
/// noticed promptly by a subsequent `ls`.
const TTL: Duration = Duration::from_secs(1);

struct SessionState {
    fuse: Arc<Fuse>,
    dir_sessions: Mutex<HashMap<u64, Vec<Child>>>,
    start_time: SystemTime,
    uid: u32,
    gid: u32,
}

impl SessionState {
    async fn build_attr(&self, inode: u64, entry: &Entry) -> Result<FileAttr, libc::c_int> {
        let size = self.fuse.entry_size(entry).await.map_err(|e| e.errno())?;
        let kind = entry.mode.file_type();
        let perm = entry.mode.perm();
        let nlink = if kind == FileType::Directory { 2 } else { 1 };
        Ok(FileAttr {
            ino: inode,
            size,
            blocks: size.div_ceil(512),
            atime: self.start_time,
            mtime: self.start_time,
            ctime: self.start_time,
            crtime: self.start_time,
            kind,
            perm,
            nlink,
            uid: self.uid,
            gid: self.gid,
            rdev: 0,
            blksize: 512,
            flags: 0,
        })
    }

    async fn getattr(&self, ino: u64, reply: ReplyAttr) {
        let Some(entry) = self.fuse.inodes().get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.build_attr(ino, &entry).await {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(errno) => reply.error(errno),
        }
    }

    async fn lookup(&self, parent: u64, name: String, reply: ReplyEntry) {
        let Some(parent_entry) = self.fuse.inodes().get(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fuse.lookup(&parent_entry, &name).await {
            Ok(child) => match self.build_attr(child.inode, &child.entry).await {
                Ok(attr) => reply.entry(&TTL, &attr, 0),
                Err(errno) => reply.error(errno),
            },
            Err(err) => reply.error(err.errno()),
        }
    }

    async fn opendir(&self, ino: u64, reply: ReplyOpen) {
        let Some(entry) = self.fuse.inodes().get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if entry.mode.file_type() != FileType::Directory {
            reply.error(libc::ENOTDIR);
            return;
        }
        match self.fuse.get_entries(ino, &entry).await {
            Ok(children) => {
                self.dir_sessions.lock().insert(ino, children);
                reply.opened(ino, 0);
            }
            Err(err) => reply.error(err.errno()),
        }
    }

    async fn readdir(&self, fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(children) = self.dir_sessions.lock().get(&fh).cloned() else {
            reply.error(libc::ENOENT);
            return;
        };
        let start = offset.max(0) as usize;
        for (i, child) in children.iter().enumerate().skip(start) {
            let full = reply.add(child.inode, (i + 1) as i64, child.entry.mode.file_type(), &child.entry.name);
            if full {
                break;
            }
        }
        reply.ok();
    }

    async fn releasedir(&self, fh: u64, reply: ReplyEmpty) {
        self.dir_sessions.lock().remove(&fh);
        reply.ok();
    }

    async fn open(&self, ino: u64, reply: ReplyOpen) {
        let Some(entry) = self.fuse.inodes().get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if entry.mode.file_type() != FileType::RegularFile {
            reply.error(libc::EISDIR);
            return;
        }
        let info = entry.file_info();
        let mut flags = 0;
        if info.keep_cache {
            flags |= fuser::consts::FOPEN_KEEP_CACHE;
        }
        if info.direct_io {
            flags |= fuser::consts::FOPEN_DIRECT_IO;
        }
        reply.opened(ino, flags as u32);
    }

    async fn read(&self, ino: u64, offset: i64, size: u32, reply: ReplyData) {
        let Some(entry) = self.fuse.inodes().get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fuse.entry_content(&entry).await {
            Ok(bytes) => {
                let offset = offset.max(0) as usize;
                if offset >= bytes.len() {
                    reply.data(&[]);
                    return;
                }
                let end = (offset + size as usize).min(bytes.len());
                reply.data(&bytes[offset..end]);
            }
            Err(err) => reply.error(err.errno()),
        }
    }

    async fn readlink(&self, ino: u64, reply: ReplyData) {
        let Some(entry) = self.fuse.inodes().get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if entry.mode.file_type() != FileType::Symlink {
            reply.error(libc::EINVAL);
            return;
        }
        match self.fuse.entry_content(&entry).await {
            Ok(bytes) => reply.data(&bytes),
            Err(err) => reply.error(err.errno()),
        }
    }

    async fn unlink(&self, parent: u64, name: String, reply: ReplyEmpty) {
        let Some(parent_entry) = self.fuse.inodes().get(parent) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fuse.unlink(&parent_entry, &name).await {
            Ok(()) => {
                self.dir_sessions.lock().remove(&parent);
                reply.ok();
            }
            Err(err) => reply.error(err.errno()),
        }
    }

    /// §6 "Extended attribute `user.swhid`... Other xattrs return
    /// ENOSYS", supplemented (§11) so kernel-probed xattrs like
    /// `security.capability` don't surface as spurious `ls -l` warnings.
    async fn getxattr(&self, ino: u64, name: String, size: u32, reply: ReplyXattr) {
        let Some(entry) = self.fuse.inodes().get(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        if name != "user.swhid" {
            reply.error(libc::ENOSYS);
            return;
        }
        let Some(swhid) = entry.kind.swhid() else {
            reply.error(libc::ENOSYS);
            return;
        };
        let value = swhid.to_string().into_bytes();
        if size == 0 {
            reply.size(value.len() as u32);
        } else if (size as usize) < value.len() {
            reply.error(libc::ERANGE);
        } else {
            reply.data(&value);
        }
    }
}

/// The `fuser::Filesystem` entry point, holding just the `Arc` handle so
/// every trait method can cheaply clone it into a spawned task.
pub struct FuseSession {
    state: Arc<SessionState>,
}

impl FuseSession {
    pub fn new(fuse: Arc<Fuse>) -> Self {
        Self {
            state: Arc::new(SessionState {
                fuse,
                dir_sessions: Mutex::new(HashMap::new()),
                start_time: SystemTime::now(),
                uid: unsafe { libc::getuid() },
                gid: unsafe { libc::getgid() },
            }),
        }
    }
}

/// Decodes a kernel-supplied `OsStr` name. Every name this filesystem
/// produces itself is valid UTF-8 (SWHIDs, hex shards, percent-encoded
/// URLs); a non-UTF-8 lookup can never match anything, so it's EINVAL
/// without delegating to the entry tree at all.
fn decode_name(name: &OsStr, reply_error: impl FnOnce(libc::c_int)) -> Option<String> {
    match name.to_str() {
        Some(s) => Some(s.to_owned()),
        None => {
            reply_error(libc::EINVAL);
            None
        }
    }
}

impl Filesystem for FuseSession {
    fn init(&mut self, _req: &Request<'_>, _config: &mut fuser::KernelConfig) -> Result<(), libc::c_int> {
        log::info!("swh-fuse session initialized");
        Ok(())
    }

    fn destroy(&mut self) {
        log::info!("swh-fuse session tearing down");
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.getattr(ino, reply).await });
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = decode_name(name, |errno| reply.error(errno)) else {
            return;
        };
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.lookup(parent, name, reply).await });
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.opendir(ino, reply).await });
    }

    fn readdir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, offset: i64, reply: ReplyDirectory) {
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.readdir(fh, offset, reply).await });
    }

    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, fh: u64, _flags: i32, reply: ReplyEmpty) {
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.releasedir(fh, reply).await });
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.open(ino, reply).await });
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.read(ino, offset, size, reply).await });
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.readlink(ino, reply).await });
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(name) = decode_name(name, |errno| reply.error(errno)) else {
            return;
        };
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.unlink(parent, name, reply).await });
    }

    fn getxattr(&mut self, _req: &Request<'_>, ino: u64, name: &OsStr, size: u32, reply: ReplyXattr) {
        let Some(name) = name.to_str() else {
            reply.error(libc::ENOSYS);
            return;
        };
        let name = name.to_owned();
        let state = Arc::clone(&self.state);
        tokio::task::spawn(async move { state.getxattr(ino, name, size, reply).await });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use swhfs_backend::fixtures::FixtureBackend;
    use swhfs_cache::{Budget, Store, StoreConfig};

    use super::*;
    use crate::fuse::FuseConfig;

    fn test_fuse() -> Arc<Fuse> {
        let store = Store::open_in_memory("session-test").unwrap();
        let backend = Arc::new(FixtureBackend::new());
        Arc::new(Fuse::new(
            store,
            backend.clone(),
            backend,
            FuseConfig { json_indent: 2 },
            Budget::Bytes(1 << 20),
            0,
        ))
    }

    #[tokio::test]
    async fn root_lookup_resolves_fixed_children() {
        let fuse = test_fuse();
        let root = fuse.inodes().get(crate::inode::ROOT_INODE).unwrap();
        let child = fuse.lookup(&root, "archive").await.unwrap();
        assert!(matches!(child.entry.kind, crate::entry::Kind::ArchiveDir));
    }

    #[tokio::test]
    async fn getattr_reports_readme_size() {
        let fuse = test_fuse();
        let root = fuse.inodes().get(crate::inode::ROOT_INODE).unwrap();
        let readme = fuse.lookup(&root, "README").await.unwrap();
        let size = fuse.entry_size(&readme.entry).await.unwrap();
        assert_eq!(size, crate::entry::README_BANNER.len() as u64);
    }
}
