//! The mounted view over a Software Heritage archive: the entry tree
//! (§3, §4.4), the inode table, the `Fuse` core that mediates between
//! them and the cache/backend layers (§4.5), and the `fuser::Filesystem`
//! dispatcher that answers kernel callbacks from it.

mod entry;
mod error;
mod fuse;
mod inode;
mod session;
mod shard;
mod tree;

pub use entry::{Entry, FileInfo, Kind, Mode, ShardPath, root_children, README_BANNER};
pub use error::FuseError;
pub use fuse::{Child, Fuse, FuseConfig};
pub use inode::{InodeTable, ROOT_INODE};
pub use session::FuseSession;
