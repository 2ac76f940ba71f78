//! Spawn Module
//!
//! Detached child processes for the terminal and launcher actions. The
//! children run through the shell in their own process group with all
//! stdio silenced; SIGCHLD is ignored in main so they never zombify.

use std::process::{Command, Stdio};

use tracing::{info, warn};

pub fn spawn(command: &str) {
    use std::os::unix::process::CommandExt;

    let result = Command::new("/bin/sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn();
    match result {
        Ok(child) => info!("spawned {:?} as pid {}", command, child.id()),
        Err(e) => warn!("failed to spawn {:?}: {}", command, e),
    }
}
