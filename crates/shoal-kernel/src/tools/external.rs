//! External programs.
//!
//! A command head that is not a registered tool is looked up on the
//! search path and run as a child process. Ports 0-2 become the child's
//! standard streams: a port still on the host stream it naturally maps to
//! is inherited directly; anything else is connected through an OS pipe
//! and pumped to or from the port's channel.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use shoal_types::Value;

use crate::interpreter::{Channel, EvalResult, Evaluator};

const PUMP_CHUNK: usize = 8192;

/// Find `name` on `search_paths`.
///
/// Names containing a `/` are taken as paths and not searched for.
pub fn resolve_in_path(name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return is_executable(&path).then_some(path);
    }
    search_paths
        .iter()
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Status value for a finished child: empty on success.
pub fn exit_status_value(status: ExitStatus) -> Value {
    match status.code() {
        Some(0) => Value::string(""),
        Some(code) => Value::string(format!("exited {code}")),
        None => Value::string("killed"),
    }
}

fn stdio_for(channel: Option<&Channel>, index: usize) -> Stdio {
    match (channel, index) {
        (None, _) => Stdio::null(),
        (Some(Channel::Stdin), 0) | (Some(Channel::Stdout), 1) | (Some(Channel::Stderr), 2) => {
            Stdio::inherit()
        }
        (Some(_), _) => Stdio::piped(),
    }
}

/// Run `name` with `args` as a child process and wait for it.
#[tracing::instrument(level = "debug", skip(args, ev), fields(argc = args.len()))]
pub async fn run_external(name: &str, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value> {
    let Some(path) = resolve_in_path(name, ev.search_paths()) else {
        return Err(ev.error(format!("command not found: {name}")));
    };

    let channels = [ev.channel(0), ev.channel(1), ev.channel(2)];
    let mut cmd = Command::new(&path);
    cmd.args(args.iter().map(Value::to_string))
        .env_clear()
        .envs(ev.env().iter())
        .stdin(stdio_for(channels[0].as_ref(), 0))
        .stdout(stdio_for(channels[1].as_ref(), 1))
        .stderr(stdio_for(channels[2].as_ref(), 2));

    let mut child = cmd
        .spawn()
        .map_err(|e| ev.error(format!("{name}: {e}")))?;
    tracing::debug!(path = %path.display(), pid = ?child.id(), "spawned");

    let [stdin_ch, stdout_ch, stderr_ch] = channels;
    let feeder = match (child.stdin.take(), stdin_ch) {
        (Some(mut sink), Some(source)) => Some(tokio::spawn(async move {
            let mut buf = vec![0u8; PUMP_CHUNK];
            loop {
                match source.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if sink.write_all(&buf[..n]).await.is_err() {
                            break;
                        }
                    }
                }
            }
        })),
        _ => None,
    };
    let mut drains: Vec<JoinHandle<()>> = Vec::new();
    if let (Some(source), Some(sink)) = (child.stdout.take(), stdout_ch) {
        drains.push(tokio::spawn(drain(source, sink)));
    }
    if let (Some(source), Some(sink)) = (child.stderr.take(), stderr_ch) {
        drains.push(tokio::spawn(drain(source, sink)));
    }

    let waited = child.wait().await;
    for handle in drains {
        let _ = handle.await;
    }
    if let Some(feeder) = feeder {
        feeder.abort();
    }

    let status = waited.map_err(|e| ev.error(format!("{name}: {e}")))?;
    tracing::debug!(?status, "child exited");
    Ok(exit_status_value(status))
}

/// Copy a child's output into a channel until the child closes it.
async fn drain(mut source: impl AsyncRead + Unpin, sink: Channel) {
    let mut buf = vec![0u8; PUMP_CHUNK];
    loop {
        match source.read(&mut buf).await {
            Ok(0) => return,
            Ok(n) => {
                if let Err(e) = sink.write_all(&buf[..n]).await {
                    tracing::trace!(error = %e, "output sink gone");
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reading child output failed");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_on_search_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("mytool");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        let paths = vec![PathBuf::from("/nonexistent"), dir.path().to_path_buf()];
        assert_eq!(resolve_in_path("mytool", &paths), Some(tool));
        assert_eq!(resolve_in_path("othertool", &paths), None);
    }

    #[cfg(unix)]
    #[test]
    fn skips_non_executable_files() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data");
        std::fs::write(&file, "x").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(resolve_in_path("data", &[dir.path().to_path_buf()]), None);
    }

    #[cfg(unix)]
    #[test]
    fn exit_codes_map_to_statuses() {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(exit_status_value(ExitStatus::from_raw(0)), Value::from(""));
        assert_eq!(exit_status_value(ExitStatus::from_raw(3 << 8)), Value::from("exited 3"));
        assert_eq!(exit_status_value(ExitStatus::from_raw(9)), Value::from("killed"));
    }
}
