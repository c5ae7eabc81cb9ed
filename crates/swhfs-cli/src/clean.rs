//! `swh-fuse clean` (§6, §11): deletes the on-disk cache database files
//! directly, matching `swh/fuse/cli.py`'s `clean` command. Deliberately
//! does not go through the mounted `cache/` tree's unlink path — this is
//! the "nuke everything" operation, not the per-entry eviction one.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::{self, PathOrMemory};

#[derive(Debug, Clone, Args)]
pub struct CleanArgs {
    /// Configuration file; defaults to `SWH_CONFIG_FILE`/XDG resolution.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

pub fn clean_main(args: CleanArgs) -> Result<()> {
    let config = config::load(args.config.as_deref())?;

    let mut removed = 0;
    for (label, path) in [
        ("metadata.sqlite", config.cache.metadata.path.as_ref()),
        ("blob.sqlite", config.cache.blob.path.as_ref()),
    ] {
        match path {
            Some(PathOrMemory::Path(path)) => match std::fs::remove_file(path) {
                Ok(()) => {
                    log::info!("removed {}", path.display());
                    removed += 1;
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("{label} already absent at {}", path.display());
                }
                Err(err) => return Err(err.into()),
            },
            Some(PathOrMemory::InMemory) => log::debug!("{label} is in-memory, nothing to remove"),
            None => log::debug!("no path configured for {label}"),
        }
    }
    log::info!("clean removed {removed} cache file(s)");
    Ok(())
}
