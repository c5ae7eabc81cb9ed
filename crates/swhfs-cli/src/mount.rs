//! `swh-fuse mount` (§6, §11): builds the `Fuse` core from configuration,
//! optionally prefetches a list of SWHIDs concurrently, and hands the
//! session to `fuser`. Daemonises by default by re-executing itself with
//! `--foreground` as a detached child process (§11: "`--foreground` as the
//! switch between blocking on the mounted session and detaching a child
//! process").

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use fuser::MountOption;
use swhfs_cache::{Store, StoreConfig};
use swhfs_vfs::{Fuse, FuseConfig, FuseSession};
use swhid::Swhid;

use crate::config::{self, Config, PathOrMemory};
use crate::sysmem;

#[derive(Debug, Clone, Args)]
pub struct MountArgs {
    /// Where to mount the filesystem.
    pub path: PathBuf,

    /// SWHIDs to prefetch metadata for concurrently at startup (§11).
    pub swhids: Vec<String>,

    /// Block in this process instead of detaching a background mount.
    #[clap(long)]
    pub foreground: bool,

    /// Configuration file; defaults to `SWH_CONFIG_FILE`/XDG resolution.
    #[clap(long)]
    pub config: Option<PathBuf>,
}

pub fn mount_main(args: MountArgs) -> Result<()> {
    if !args.foreground {
        return daemonize(&args);
    }

    let config = config::load(args.config.as_deref())?;
    let store = open_store(&config)?;
    let graph = crate::backends::build_graph_backend(&config)?;
    let content = crate::backends::build_content_backend(&config)?;
    let total_ram = sysmem::total_ram_bytes();
    let fuse_config = FuseConfig {
        json_indent: config.json_indent.0,
    };
    let fuse = Arc::new(Fuse::new(
        store,
        graph,
        content,
        fuse_config,
        config.cache.direntry.max_ram.0,
        total_ram,
    ));

    let swhids = args
        .swhids
        .iter()
        .filter_map(|raw| match raw.parse::<Swhid>() {
            Ok(swhid) => Some(swhid),
            Err(err) => {
                log::warn!("ignoring invalid prefetch SWHID {raw:?}: {err}");
                None
            }
        })
        .collect::<Vec<_>>();

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(run_mounted(Arc::clone(&fuse), swhids, args.path))
}

/// Prefetches every requested SWHID's metadata concurrently, tolerating
/// individual failures (§11: "mirrors the original's `asyncio.gather(...,
/// return_exceptions=True)`"), then blocks driving the FUSE session.
async fn run_mounted(fuse: Arc<Fuse>, swhids: Vec<Swhid>, path: PathBuf) -> Result<()> {
    if !swhids.is_empty() {
        let mut prefetches = tokio::task::JoinSet::new();
        for swhid in swhids {
            let fuse = Arc::clone(&fuse);
            prefetches.spawn(async move {
                if let Err(err) = fuse.get_metadata(swhid).await {
                    log::warn!("prefetch of {swhid} failed: {err}");
                }
            });
        }
        while prefetches.join_next().await.is_some() {}
    }

    let session = FuseSession::new(Arc::clone(&fuse));
    let options = vec![
        MountOption::FSName("swhfs".to_owned()),
        MountOption::RO,
        MountOption::DefaultPermissions,
    ];
    log::info!("mounting {} ", path.display());
    let mount_path = path.clone();
    tokio::task::spawn_blocking(move || fuser::mount2(session, &mount_path, &options))
        .await
        .context("mount task panicked")?
        .with_context(|| format!("mounting {}", path.display()))
}

fn open_store(config: &Config) -> Result<Store> {
    let (metadata_path, metadata_in_memory) = split_path_or_memory(config.cache.metadata.path.as_ref());
    let (blob_path, blob_in_memory) = split_path_or_memory(config.cache.blob.path.as_ref());
    Store::open(StoreConfig {
        metadata_path,
        metadata_in_memory,
        blob_path,
        blob_in_memory,
        blob_bypass: config.cache.blob.bypass,
    })
}

fn split_path_or_memory(path: Option<&PathOrMemory>) -> (Option<PathBuf>, bool) {
    match path {
        Some(PathOrMemory::Path(p)) => (Some(p.clone()), false),
        Some(PathOrMemory::InMemory) => (None, true),
        None => (None, false),
    }
}

/// Re-executes the current binary with `--foreground` appended, detached
/// from this process's standard streams, and returns immediately.
fn daemonize(args: &MountArgs) -> Result<()> {
    let exe = std::env::current_exe().context("resolving current executable")?;
    let mut command = std::process::Command::new(exe);
    command.arg("mount").arg(&args.path);
    command.args(&args.swhids);
    command.arg("--foreground");
    if let Some(config) = &args.config {
        command.arg("--config").arg(config);
    }
    command
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());
    let child = command.spawn().context("spawning detached mount process")?;
    log::info!("mounted {} in background (pid {})", args.path.display(), child.id());
    Ok(())
}
