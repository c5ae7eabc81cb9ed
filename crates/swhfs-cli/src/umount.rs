//! `swh-fuse umount` (§6, §11): shells out to the host `fusermount`/
//! `fusermount3`, same as the original `cli.py`'s `umount` command — no
//! in-process unmount API is used, since the mounting process may be a
//! detached background child we have no handle to.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

#[derive(Debug, Clone, Args)]
pub struct UmountArgs {
    /// The mounted directory to unmount.
    pub path: PathBuf,
}

pub fn umount_main(args: UmountArgs) -> Result<()> {
    for program in ["fusermount3", "fusermount"] {
        match std::process::Command::new(program).arg("-u").arg(&args.path).status() {
            Ok(status) if status.success() => return Ok(()),
            Ok(status) => bail!("{program} exited with {status}"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err).context(format!("running {program}")),
        }
    }
    bail!("neither fusermount3 nor fusermount is available on PATH")
}
