//! The §4.3 cache layer: four embedded-SQL caches behind two database
//! files, plus the in-process `DirEntryCache` LRU, all wired together by
//! [`Store`].

mod blob;
mod db;
mod direntry;
mod error;
mod history;
mod metadata;
mod store;
mod visits;

pub use blob::BlobCache;
pub use db::{Db, DbLocation};
pub use direntry::{Budget, DirEntryCache, ESTIMATED_BYTES_PER_CHILD};
pub use error::CacheError;
pub use history::HistoryCache;
pub use metadata::MetadataCache;
pub use store::{Store, StoreConfig};
pub use visits::{VisitsCache, FRESHNESS_WINDOW};
