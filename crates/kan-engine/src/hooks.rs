use std::process::Stdio;
use std::time::{Duration, Instant};

use kan_domain::{Card, PatternHookConfig};
use serde::Serialize;
use tokio::process::Command;

/// Captured output is truncated to 2 KiB per stream.
const MAX_OUTPUT_BYTES: usize = 2048;

/// Outcome of one hook invocation. Failures are non-fatal; the card is
/// kept and the result is surfaced to the presenter.
#[derive(Debug, Clone, Serialize)]
pub struct HookResult {
    pub hook: String,
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration_ms: u64,
}

/// Run every hook whose `pattern_title` matches the card's title, in config
/// order, sequentially. Compile failures are skipped with a warning; the
/// card is fully persisted before this is called, so hooks may shell back
/// into the engine.
pub async fn run_hooks_for_card(
    hooks: &[PatternHookConfig],
    card: &Card,
    board: &str,
) -> Vec<HookResult> {
    let mut results = Vec::new();
    for hook in hooks {
        let pattern = match regex::Regex::new(&hook.pattern_title) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(hook = %hook.name, "Skipping hook with invalid pattern: {e}");
                continue;
            }
        };
        if !pattern.is_match(&card.title) {
            continue;
        }
        results.push(execute(hook, &card.id, board).await);
    }
    results
}

async fn execute(hook: &PatternHookConfig, card_id: &str, board: &str) -> HookResult {
    let start = Instant::now();
    let command_path = expand_tilde(&hook.command);

    let mut cmd = Command::new(&command_path);
    cmd.arg(card_id)
        .arg(board)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    // The hook gets its own process group so a timeout can reap any
    // grandchildren it forked, not just the direct child.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setpgid(0, 0);
            Ok(())
        });
    }

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(hook = %hook.name, "Hook spawn failed: {e}");
            return HookResult {
                hook: hook.name.clone(),
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: format!("failed to spawn {command_path}: {e}"),
                timed_out: false,
                duration_ms: start.elapsed().as_millis() as u64,
            };
        }
    };

    let timeout = Duration::from_secs(hook.timeout_secs);
    let pid = child.id();
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => {
            let exit_code = output.status.code();
            HookResult {
                hook: hook.name.clone(),
                success: output.status.success(),
                exit_code,
                stdout: truncate(String::from_utf8_lossy(&output.stdout).into_owned()),
                stderr: truncate(String::from_utf8_lossy(&output.stderr).into_owned()),
                timed_out: false,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
        Ok(Err(e)) => HookResult {
            hook: hook.name.clone(),
            success: false,
            exit_code: None,
            stdout: String::new(),
            stderr: e.to_string(),
            timed_out: false,
            duration_ms: start.elapsed().as_millis() as u64,
        },
        Err(_) => {
            // The dropped future already killed the direct child
            // (kill_on_drop); the group kill takes its grandchildren too.
            kill_process_group(pid);
            tracing::warn!(
                hook = %hook.name,
                "Hook timed out after {}s",
                hook.timeout_secs
            );
            HookResult {
                hook: hook.name.clone(),
                success: false,
                exit_code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        }
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else { return };
    // Negative PID targets the whole group created at spawn.
    unsafe {
        libc::kill(-(pid as i32), libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

pub fn expand_tilde(command: &str) -> String {
    if let Some(rest) = command.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).display().to_string();
        }
    }
    command.to_string()
}

fn truncate(output: String) -> String {
    if output.len() > MAX_OUTPUT_BYTES {
        let mut end = MAX_OUTPUT_BYTES;
        while !output.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}\n... [truncated]", &output[..end])
    } else {
        output
    }
}
