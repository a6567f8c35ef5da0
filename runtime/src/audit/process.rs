//! Process-tree termination.
//!
//! Audit children are spawned as process-group leaders on POSIX, so the
//! whole tree (tool, browser, renderer helpers) shares the child's pid as
//! its group id. On Windows `taskkill /T` walks the tree instead.

use std::io;

/// Forcefully kill `pid` and every process it spawned.
///
/// A tree that has already exited is not an error.
pub async fn kill_process_tree(pid: u32) -> io::Result<()> {
    kill_tree(pid).await
}

/// Whether any process still belongs to the group led by `pid`.
///
/// Only meaningful for a group we created. Once the leader is reaped and the
/// group is empty the id can be recycled, so callers check this first and
/// skip the sweep when it reports `false`. A recycle between this check and
/// the sweep is still possible but needs the id to come back as a new group
/// leader within that window.
#[cfg(unix)]
pub fn process_group_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    // SAFETY: signal 0 performs the permission and existence check only.
    let result = unsafe { libc::killpg(pid as libc::pid_t, 0) };
    result == 0 || io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn process_group_alive(_pid: u32) -> bool {
    true
}

#[cfg(unix)]
async fn kill_tree(pid: u32) -> io::Result<()> {
    // `killpg(0)` would signal our own group.
    if pid == 0 || pid > i32::MAX as u32 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "invalid pid"));
    }

    // SAFETY: killpg only sends a signal; the group id comes from a child we spawned.
    let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if result == 0 {
        return Ok(());
    }
    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(code) if code == libc::ESRCH => Ok(()),
        _ => Err(err),
    }
}

#[cfg(windows)]
async fn kill_tree(pid: u32) -> io::Result<()> {
    let output = tokio::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output()
        .await?;
    // 128: no such process.
    match output.status.code() {
        Some(0) | Some(128) => Ok(()),
        _ => Err(io::Error::other(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
    }
}

#[cfg(not(any(unix, windows)))]
async fn kill_tree(_pid: u32) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "process-tree kill is not supported on this platform",
    ))
}
