//! Daemon lifecycle management (stop, status) against the PID file only —
//! this binary has no IPC socket of its own to probe.

use gamecache_config::Paths;

fn read_pid(paths: &Paths) -> Option<i32> {
    std::fs::read_to_string(paths.pid_file())
        .ok()
        .and_then(|raw| raw.trim().parse::<i32>().ok())
}

/// `kill(pid, 0)` probes for existence without sending a real signal.
fn process_is_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

/// Stop the daemon by sending `SIGTERM` to the PID in the PID file, then
/// waiting up to three seconds for it to exit before escalating to
/// `SIGKILL`.
pub async fn stop_daemon(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let pid_path = paths.pid_file();
    let Some(pid) = read_pid(paths) else {
        println!("Daemon is not running (no pid file)");
        return Ok(());
    };

    if !process_is_alive(pid) {
        println!("Daemon is not running (stale pid file)");
        let _ = std::fs::remove_file(&pid_path);
        return Ok(());
    }

    println!("Stopping daemon (pid {pid})");
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    for _ in 0..30 {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
        if !process_is_alive(pid) {
            println!("Daemon stopped");
            let _ = std::fs::remove_file(&pid_path);
            return Ok(());
        }
    }

    println!("Daemon did not stop gracefully, sending SIGKILL to pid {pid}");
    unsafe {
        libc::kill(pid, libc::SIGKILL);
    }
    let _ = std::fs::remove_file(&pid_path);
    println!("Daemon killed");
    Ok(())
}

/// Check daemon status by probing the PID in the PID file.
pub async fn check_status(paths: &Paths) -> Result<(), Box<dyn std::error::Error>> {
    let Some(pid) = read_pid(paths) else {
        println!("Daemon is not running (no pid file)");
        return Ok(());
    };

    if process_is_alive(pid) {
        println!("Daemon is running");
        println!("  PID: {pid}");
    } else {
        println!("Daemon is not running (stale pid file)");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stop_against_a_missing_pid_file_reports_not_running_without_error() {
        let base = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());

        let result = stop_daemon(&paths).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn status_against_a_missing_pid_file_reports_not_running_without_error() {
        let base = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());

        let result = check_status(&paths).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn stop_against_a_stale_pid_cleans_up_the_pid_file() {
        let base = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(base.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        // pid 1 is always alive (init/launchd); use an implausibly large
        // pid instead so the probe reliably reports dead.
        std::fs::write(paths.pid_file(), "999999").unwrap();

        stop_daemon(&paths).await.unwrap();
        assert!(!paths.pid_file().exists());
    }
}
