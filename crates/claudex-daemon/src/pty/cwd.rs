use std::path::{Path, PathBuf};

/// Best-effort lookup of a child process's current working directory.
/// Falls back to `fallback` on any failure — this is advisory, used to
/// keep session metadata's `directory` field in sync with a shell that
/// `cd`'d elsewhere, never load-bearing for correctness.
pub fn process_cwd(pid: u32, fallback: &Path) -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        let link = format!("/proc/{pid}/cwd");
        if let Ok(resolved) = std::fs::read_link(&link) {
            return resolved;
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(resolved) = macos_cwd(pid) {
            return resolved;
        }
    }

    let _ = pid;
    fallback.to_path_buf()
}

#[cfg(target_os = "macos")]
fn macos_cwd(pid: u32) -> Option<PathBuf> {
    let output = std::process::Command::new("lsof")
        .args(["-a", "-d", "cwd", "-p", &pid.to_string(), "-Fn"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    text.lines()
        .find(|l| l.starts_with('n'))
        .map(|l| PathBuf::from(&l[1..]))
}
