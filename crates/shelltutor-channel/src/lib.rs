//! Wraps the VM and exposes the Session Driver's out-of-band filesystem
//! channel plus raw serial input, following the `Transport`/
//! `Connection` async-trait split in `omnish-transport::traits`.

mod ready_gate;

pub use ready_gate::ReadyGate;

use anyhow::Result;
use async_trait::async_trait;
use shelltutor_parser::SentinelParser;
use tokio::sync::broadcast;

/// Out-of-band filesystem write + raw serial input; wraps the VM.
///
/// `has_dir_with_file`/`find_file_containing` are provided as default
/// methods on top of `exec_capture` — see the grounding ledger
/// (`DESIGN.md`, Open Question 1) for why their output doesn't depend
/// on the Driver-owned `SentinelParser`'s `skip_captures` bookkeeping.
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Starts the VM. Callers subscribe to `subscribe()` for its serial
    /// output before or after calling this.
    async fn boot(&self) -> Result<()>;

    /// A fresh subscription to the VM's raw serial output stream. Every
    /// subscriber receives every byte chunk from the point of
    /// subscription onward.
    fn subscribe(&self) -> broadcast::Receiver<Vec<u8>>;

    /// Forwards keystrokes or strings to the VM's serial input.
    async fn send_serial(&self, text: &str) -> Result<()>;

    /// Creates or overwrites a file through the out-of-band channel
    /// (never through the serial tty, so its content is not echoed).
    async fn write_file(&self, path: &str, bytes: &[u8]) -> Result<()>;

    async fn file_exists(&self, path: &str) -> Result<bool>;

    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Runs `command` via the temp-file-redirect-then-read-and-delete
    /// choreography described in spec.md §4.4, scanning its own
    /// independent tap of the serial stream rather than the
    /// Driver-owned parser. Returns the command's stdout.
    async fn exec_capture(&self, command: &str) -> Result<String> {
        default_exec_capture(self, command).await
    }

    /// `find <root> -mindepth 2 -maxdepth 2 -type f` — true if it
    /// yields at least one result.
    async fn has_dir_with_file(&self, root: &str) -> Result<bool> {
        let out = self
            .exec_capture(&format!("find {root} -mindepth 2 -maxdepth 2 -type f"))
            .await?;
        Ok(out.lines().any(|l| !l.trim().is_empty()))
    }

    /// `grep -rl <needle> <root>` — true if it yields at least one result.
    async fn find_file_containing(&self, root: &str, needle: &str) -> Result<bool> {
        let out = self
            .exec_capture(&format!("grep -rl {needle} {root}"))
            .await?;
        Ok(out.lines().any(|l| !l.trim().is_empty()))
    }
}

/// Shared default implementation of `exec_capture`, usable by any
/// `SessionChannel` impl that backs `send_serial`/`subscribe` with a
/// real byte stream. Runs two command cycles against a scratch
/// `SentinelParser` that starts with `skip_captures = 0`: the first
/// (redirect to temp file) is discarded, the second (cat+rm) is
/// captured and returned.
async fn default_exec_capture<C: SessionChannel + ?Sized>(
    channel: &C,
    command: &str,
) -> Result<String> {
    let tmp = format!("/tmp/.shelltutor_capture_{}", fastrand_u32());
    let mut rx = channel.subscribe();
    let mut tap = SentinelParser::new_for_tap();

    channel
        .send_serial(&format!("{command} > {tmp} 2>&1\n"))
        .await?;
    await_one_result(&mut rx, &mut tap).await?;

    channel
        .send_serial(&format!("cat {tmp}; rm -f {tmp}\n"))
        .await?;
    let result = await_one_result(&mut rx, &mut tap).await?;
    Ok(result.stdout)
}

async fn await_one_result(
    rx: &mut broadcast::Receiver<Vec<u8>>,
    tap: &mut SentinelParser,
) -> Result<shelltutor_parser::CommandResult> {
    loop {
        let chunk = rx.recv().await?;
        let out = tap.process_output(&chunk);
        if let Some(result) = out.commands.into_iter().next() {
            return Ok(result);
        }
    }
}

/// A small, dependency-free pseudo-random suffix for scratch temp file
/// names; collisions are harmless (each `exec_capture` call overwrites
/// its own file and no two run concurrently on the same channel).
fn fastrand_u32() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos ^ 0x9e3779b9
}
