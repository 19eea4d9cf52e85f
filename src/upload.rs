//! Packing local file trees for upload and unpacking them on the far side.

use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;

use crate::shell;


/// Resolve `path` the way a shell in `cwd` with `env` exported would,
/// so `$VARS` and `~` in upload sources work.
pub async fn resolve_local_path(cwd: &Path, path: &str, env: &str) -> Result<String, String> {
    let output = Command::new("bash")
        .arg("-c")
        .arg(format!("{}echo -n {}", env, path))
        .current_dir(cwd)
        .output()
        .await
        .map_err(|err| format!("resolving path failed: {}", err))?;

    if !output.status.success() {
        return Err(format!(
            "resolving path failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    let resolved = String::from_utf8_lossy(&output.stdout).to_string();
    if resolved.is_empty() {
        return Err("resolving path failed: empty path".to_string());
    }
    Ok(resolved)
}


/// A gzip'd tar of `path` (relative to `cwd`) with `exclude` patterns left
/// out. The archive is read once here and shared by every client it goes to.
pub async fn tar_stream(cwd: &Path, path: &str, exclude: &[String]) -> Result<Arc<[u8]>, String> {
    if !cwd.join(path).exists() {
        return Err(format!("{}: no such file or directory", path));
    }

    let mut command = Command::new("tar");
    command.arg("-C").arg(cwd).arg("-czf").arg("-");
    for pattern in exclude {
        command.arg(format!("--exclude={}", pattern));
    }
    command.arg("--").arg(path);

    let output = command
        .output()
        .await
        .map_err(|err| format!("failed to run tar: {}", err))?;

    if !output.status.success() {
        return Err(format!(
            "tar failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }
    Ok(Arc::from(output.stdout))
}


/// The command that unpacks a `tar_stream` archive arriving on stdin.
pub fn remote_tar_command(dst: &str) -> String {
    format!("tar -C {} -xzf -", shell::quote(dst))
}
