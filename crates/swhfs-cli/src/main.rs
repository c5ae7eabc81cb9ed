mod backends;
mod clean;
mod config;
mod mount;
mod sysmem;
mod umount;

use anyhow::Result;
use clap::Parser;

use crate::clean::{clean_main, CleanArgs};
use crate::mount::{mount_main, MountArgs};
use crate::umount::{umount_main, UmountArgs};

#[derive(Debug, Clone, clap::Parser)]
#[clap(name = "swh-fuse", author, version, about)]
struct CliArguments {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, clap::Subcommand)]
#[clap(rename_all = "kebab-case")]
enum Commands {
    /// Mount the filesystem, optionally prefetching SWHIDs.
    Mount(MountArgs),
    /// Unmount a previously mounted directory.
    Umount(UmountArgs),
    /// Delete the on-disk cache database files.
    Clean(CleanArgs),
}

fn main() -> Result<()> {
    let args = CliArguments::parse();

    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .ok();

    match args.command {
        Commands::Mount(args) => mount_main(args),
        Commands::Umount(args) => umount_main(args),
        Commands::Clean(args) => clean_main(args),
    }
}
