//! The Sentinel Parser: the heart of the Shell Session Controller. It
//! turns a stream of raw serial byte chunks into a (display-segment,
//! sentinel-event) stream, owns `CaptureState`, and emits
//! `CommandResult`s.
//!
//! Grounded in `omnish-tracker::command_tracker::CommandTracker`'s
//! overall event-driven-tracker shape and `osc133_detector`'s
//! delimiter-scanning state machine, generalized from OSC 133 framing
//! to the `0x1F`-delimited sentinel framing this controller uses.

mod ansi;
mod capture_state;
mod system_message;

pub use capture_state::CaptureState;
pub use system_message::render_system_message;

use regex::bytes::Regex;
use shelltutor_sentinel::{CMD_END_PREFIX, CMD_START, SENTINEL_DELIM};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A completed, cleaned-up command execution: exactly what the Session
/// Driver receives from the Parser's command callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub stdout: String,
    pub returncode: i32,
    pub cwd: String,
}

/// The result of one `process_output` call: the ordering contract is
/// encoded structurally — `display` must be delivered to the terminal
/// before any of `commands` are dispatched to the Session Driver. See
/// `process_and_dispatch` for a helper that enforces this.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParseOutput {
    pub display: Vec<u8>,
    pub commands: Vec<CommandResult>,
    pub became_ready: bool,
}

fn sentinel_pattern() -> Regex {
    let pattern = format!(
        r"\x1f(?:(?P<start>{start})|{end}:(?P<code>\d+):(?P<cwd>[^\x1f]*))\x1f",
        start = regex::escape(CMD_START),
        end = regex::escape(CMD_END_PREFIX),
    );
    Regex::new(&pattern).expect("sentinel pattern is a fixed, valid regex")
}

pub struct SentinelParser {
    capture: CaptureState,
    partial: Vec<u8>,
    partial_since: Option<Instant>,
    mute: bool,
    system_queue: VecDeque<String>,
    regex: Regex,
}

impl SentinelParser {
    pub fn new() -> Self {
        Self {
            capture: CaptureState::initial(),
            partial: Vec::new(),
            partial_since: None,
            mute: false,
            system_queue: VecDeque::new(),
            regex: sentinel_pattern(),
        }
    }

    /// A parser variant whose `skip_captures` starts at 0 rather than 1.
    /// For independent taps on the raw byte stream (e.g.
    /// `SessionChannel::exec_capture`) that aren't swallowing a
    /// boot-time prompt and need their very first `CMD_END` to produce
    /// a result.
    pub fn new_for_tap() -> Self {
        let mut parser = Self::new();
        parser.capture.skip_captures = 0;
        parser
    }

    pub fn capture_state(&self) -> &CaptureState {
        &self.capture
    }

    pub fn is_ready(&self) -> bool {
        self.capture.ready
    }

    pub fn cwd(&self) -> &str {
        &self.capture.cwd
    }

    /// Tells the caller (the Driver, issuing extra shell commands for
    /// `dir_with_file`/`any_file_contains`) to expect `n` more
    /// `CMD_END`s to be discarded.
    pub fn add_skip_captures(&mut self, n: u32) {
        self.capture.skip_captures += n;
    }

    /// Withholds display bytes until the next `CMD_START`. Captured
    /// bytes are unaffected.
    pub fn mute_until_next_prompt(&mut self) {
        self.mute = true;
    }

    pub fn is_muted(&self) -> bool {
        self.mute
    }

    /// Queues a message; held until `ready` and then flushed atomically,
    /// either at the start of the next `process_output` call or via an
    /// explicit `flush_system_messages` call from an idle timer.
    pub fn queue_system_message(&mut self, text: impl Into<String>) {
        self.system_queue.push_back(text.into());
    }

    pub fn has_pending_system_messages(&self) -> bool {
        !self.system_queue.is_empty()
    }

    /// Drains the queue into one atomic write, rendered message-by-message.
    /// Returns `None` (and leaves the queue intact) until `ready`.
    pub fn flush_system_messages(&mut self) -> Option<Vec<u8>> {
        if !self.capture.ready || self.system_queue.is_empty() {
            return None;
        }
        let mut out = Vec::new();
        for msg in self.system_queue.drain(..) {
            out.extend_from_slice(render_system_message(&msg).as_bytes());
        }
        Some(out)
    }

    /// Clears every field: used when leaving a lesson.
    pub fn reset(&mut self) {
        self.capture = CaptureState::initial();
        self.partial.clear();
        self.partial_since = None;
        self.mute = false;
        self.system_queue.clear();
    }

    /// How long until the 50 ms partial-sentinel safety timer should
    /// fire, if a partial sentinel is currently buffered.
    pub fn partial_deadline(&self, now: Instant, timeout: Duration) -> Option<Duration> {
        let since = self.partial_since?;
        Some(timeout.saturating_sub(now.duration_since(since)))
    }

    /// Called by the owning loop when the 50 ms safety timer fires with
    /// no further data: flushes the buffered partial as plain bytes
    /// (display, and capture if `capturing`).
    pub fn flush_partial_on_timeout(&mut self) -> Vec<u8> {
        if self.partial.is_empty() {
            return Vec::new();
        }
        let bytes = std::mem::take(&mut self.partial);
        self.partial_since = None;
        let mut display = Vec::new();
        self.emit(&bytes, &mut display);
        display
    }

    fn emit(&mut self, bytes: &[u8], display: &mut Vec<u8>) {
        if bytes.is_empty() {
            return;
        }
        if self.capture.capturing {
            self.capture.chunks.push(bytes.to_vec());
        }
        if !self.mute {
            display.extend_from_slice(bytes);
        }
    }

    fn finalize_capture(&mut self, exit_code: i32, cwd: String) -> CommandResult {
        let raw: Vec<u8> = self.capture.chunks.concat();
        self.capture.chunks.clear();
        let stripped = ansi::strip_csi(&raw);
        let stripped = ansi::strip_osc(&stripped);
        let stripped = ansi::strip_control_bytes(&stripped);
        let stdout_bytes = ansi::remove_first_line(&stripped);
        CommandResult {
            stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
            returncode: exit_code,
            cwd,
        }
    }

    /// The core scan. Prepends any buffered partial, finds every
    /// complete sentinel match, and for each: emits the bytes before it
    /// (display + capture per `emit`), then handles the event. Tail
    /// bytes after the last match are emitted up to a stray `0x1f` (if
    /// any), which is buffered as the next call's partial.
    pub fn process_output(&mut self, chunk: &[u8]) -> ParseOutput {
        let mut data = std::mem::take(&mut self.partial);
        self.partial_since = None;
        data.extend_from_slice(chunk);

        let mut out = ParseOutput::default();

        if let Some(sys) = self.flush_system_messages() {
            out.display.extend_from_slice(&sys);
        }

        let mut last_end = 0usize;
        let captures: Vec<_> = self.regex.captures_iter(&data).collect();
        for caps in captures {
            let m = caps.get(0).expect("capture 0 is always the whole match");
            self.emit(&data[last_end..m.start()], &mut out.display);
            last_end = m.end();

            if caps.name("start").is_some() {
                self.mute = false;
                self.capture.capturing = true;
                self.capture.chunks.clear();
                continue;
            }

            let code: i32 = caps
                .name("code")
                .and_then(|m| std::str::from_utf8(m.as_bytes()).ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            let cwd = caps
                .name("cwd")
                .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                .unwrap_or_default();

            self.capture.capturing = false;
            self.capture.cwd = cwd.clone();

            if self.capture.skip_captures > 0 {
                self.capture.skip_captures -= 1;
                self.capture.chunks.clear();
                if !self.capture.ready {
                    self.capture.ready = true;
                    out.became_ready = true;
                }
            } else {
                let result = self.finalize_capture(code, cwd);
                if !self.capture.ready {
                    self.capture.ready = true;
                    out.became_ready = true;
                }
                out.commands.push(result);
            }
        }

        let tail = &data[last_end..];
        match tail.iter().position(|&b| b == SENTINEL_DELIM) {
            Some(pos) => {
                self.emit(&tail[..pos], &mut out.display);
                self.partial = tail[pos..].to_vec();
                self.partial_since = Some(Instant::now());
            }
            None => self.emit(tail, &mut out.display),
        }

        out
    }

    /// Convenience wrapper encoding the ordering contract directly:
    /// the display callback is invoked (at most once, with all
    /// accumulated display bytes) strictly before the command callback
    /// fires for each completed capture.
    pub fn process_and_dispatch(
        &mut self,
        chunk: &[u8],
        mut on_display: impl FnMut(&[u8]),
        mut on_command: impl FnMut(CommandResult),
    ) -> bool {
        let out = self.process_output(chunk);
        if !out.display.is_empty() {
            on_display(&out.display);
        }
        for cmd in out.commands {
            on_command(cmd);
        }
        out.became_ready
    }
}

impl Default for SentinelParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd_start() -> Vec<u8> {
        format!("\x1f{CMD_START}\x1f").into_bytes()
    }

    fn cmd_end(code: i64, cwd: &str) -> Vec<u8> {
        format!("\x1f{CMD_END_PREFIX}:{code}:{cwd}\x1f").into_bytes()
    }

    #[test]
    fn first_cmd_end_marks_ready_and_is_skipped() {
        let mut p = SentinelParser::new();
        let out = p.process_output(&cmd_end(0, "/home/student"));
        assert!(out.became_ready);
        assert!(out.commands.is_empty());
        assert!(p.is_ready());
        assert_eq!(p.capture_state().skip_captures, 0);
    }

    #[test]
    fn capture_after_boot_produces_command_result() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student")); // swallow boot prompt
        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\nhi\n");
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        let out = p.process_output(&chunk);
        assert_eq!(out.commands.len(), 1);
        assert_eq!(out.commands[0].stdout, "hi\n");
        assert_eq!(out.commands[0].returncode, 0);
        assert_eq!(out.commands[0].cwd, "/home/student");
    }

    #[test]
    fn empty_capture_yields_empty_stdout() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let mut chunk = cmd_start();
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        let out = p.process_output(&chunk);
        assert_eq!(out.commands.len(), 1);
        assert_eq!(out.commands[0].stdout, "");
    }

    #[test]
    fn unparseable_exit_code_is_malformed_capture_and_defaults_to_zero() {
        // craft a CMD_END whose digits regex still matches but represents
        // an exit code wider than the parser cares to validate beyond \d+;
        // exercise the fallback path directly via a non-digit body is
        // impossible since the regex requires \d+, so this test instead
        // confirms a huge (overflowing) exit code value degrades to 0.
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"x\n");
        chunk.extend_from_slice(&cmd_end(99999999999, "/home/student"));
        let out = p.process_output(&chunk);
        assert_eq!(out.commands[0].returncode, 0);
    }

    #[test]
    fn ordering_contract_display_before_command_in_one_chunk() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\nhi\n");
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        chunk.extend_from_slice(b"prompt-bytes");
        chunk.extend_from_slice(&cmd_start());

        let order = std::cell::RefCell::new(Vec::new());
        p.process_and_dispatch(
            &chunk,
            |_| order.borrow_mut().push("display"),
            |_| order.borrow_mut().push("command"),
        );
        assert_eq!(order.into_inner(), vec!["display", "command"]);
    }

    #[test]
    fn display_segments_include_both_output_and_prompt_bytes_before_command() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\nhi\n");
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        chunk.extend_from_slice(b"prompt-bytes");
        chunk.extend_from_slice(&cmd_start());

        let out = p.process_output(&chunk);
        assert_eq!(out.commands.len(), 1);
        assert!(out.display.ends_with(b"prompt-bytes"));
    }

    #[test]
    fn sentinel_split_across_two_chunks_still_parses() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\nhi\n");
        let whole_end = cmd_end(0, "/home/student");
        let (first_half, second_half) = whole_end.split_at(whole_end.len() / 2);
        chunk.extend_from_slice(first_half);
        let out1 = p.process_output(&chunk);
        assert!(out1.commands.is_empty());

        let out2 = p.process_output(second_half);
        assert_eq!(out2.commands.len(), 1);
        assert_eq!(out2.commands[0].stdout, "hi\n");
    }

    #[test]
    fn every_byte_split_point_of_a_sentinel_parses_correctly() {
        for n in 1..=CMD_START.len() {
            let mut p = SentinelParser::new();
            p.process_output(&cmd_end(0, "/home/student"));
            let start = cmd_start();
            let (first, rest) = start.split_at(n);
            p.process_output(first);
            p.process_output(rest);

            let mut chunk = b"echo hi\nhi\n".to_vec();
            chunk.extend_from_slice(&cmd_end(0, "/home/student"));
            let out3 = p.process_output(&chunk);
            assert_eq!(out3.commands.len(), 1, "split at {n} failed to parse CMD_START");
            assert_eq!(out3.commands[0].stdout, "hi\n");
        }
    }

    #[test]
    fn mute_withholds_display_but_not_capture() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        p.mute_until_next_prompt();

        let out = p.process_output(b"hidden-bytes");
        assert!(out.display.is_empty());

        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\nhi\n");
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        let out = p.process_output(&chunk);
        // mute should have cleared on CMD_START, output after is visible,
        // and the "hidden-bytes" before capturing began was never captured
        // because `capturing` only became true at CMD_START.
        assert_eq!(out.commands[0].stdout, "hi\n");
        assert!(!out.display.is_empty());
    }

    #[test]
    fn mute_does_not_drop_bytes_that_are_being_captured() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\n");
        let out1 = p.process_output(&chunk);
        assert!(!out1.display.is_empty());

        p.mute_until_next_prompt();
        let out2 = p.process_output(b"hi\n");
        assert!(out2.display.is_empty(), "muted bytes must not reach display");

        let out3 = p.process_output(&cmd_end(0, "/home/student"));
        assert_eq!(out3.commands[0].stdout, "hi\n", "muted bytes must still be captured");
    }

    #[test]
    fn mute_has_no_wall_clock_expiry_only_cmd_start_clears_it() {
        // The mute flag is a plain bool with no deadline of its own —
        // unlike `partial_deadline`, nothing here takes an `Instant`.
        // Feeding it an arbitrary number of chunks with no CMD_START
        // (standing in for an arbitrarily long real-world delay) must
        // never auto-clear it; only an actual CMD_START does.
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        p.mute_until_next_prompt();

        for _ in 0..500 {
            let out = p.process_output(b"still hidden\n");
            assert!(out.display.is_empty());
            assert!(p.is_muted());
        }

        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\nhi\n");
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        let out = p.process_output(&chunk);
        assert!(!p.is_muted());
        assert!(!out.display.is_empty());
    }

    #[test]
    fn skip_captures_suppresses_command_result_without_dropping_ready() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        p.add_skip_captures(2);

        for _ in 0..2 {
            let mut chunk = cmd_start();
            chunk.extend_from_slice(b"find-output\n");
            chunk.extend_from_slice(&cmd_end(0, "/home/student"));
            let out = p.process_output(&chunk);
            assert!(out.commands.is_empty());
        }
        assert_eq!(p.capture_state().skip_captures, 0);

        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"echo hi\nhi\n");
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        let out = p.process_output(&chunk);
        assert_eq!(out.commands.len(), 1);
    }

    #[test]
    fn system_messages_are_held_until_ready() {
        let mut p = SentinelParser::new();
        p.queue_system_message("too early");
        assert!(p.flush_system_messages().is_none());
        p.process_output(&cmd_end(0, "/home/student"));
        let flushed = p.flush_system_messages().unwrap();
        let text = String::from_utf8_lossy(&flushed);
        assert!(text.contains("too early"));
    }

    #[test]
    fn system_messages_flush_atomically_at_start_of_next_process_call() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        p.queue_system_message("passed!");
        let out = p.process_output(b"");
        let text = String::from_utf8_lossy(&out.display);
        assert!(text.contains("passed!"));
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        p.mute_until_next_prompt();
        p.queue_system_message("x");
        p.reset();
        assert!(!p.is_ready());
        assert!(!p.is_muted());
        assert!(!p.has_pending_system_messages());
        assert_eq!(p.capture_state().skip_captures, 1);
    }

    #[test]
    fn ansi_heavy_output_is_stripped_from_captured_stdout_only() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let mut chunk = cmd_start();
        chunk.extend_from_slice(b"clear\n\x1b[2J\x1b[Hhi\n");
        chunk.extend_from_slice(&cmd_end(0, "/home/student"));
        let out = p.process_output(&chunk);
        assert_eq!(out.commands[0].stdout, "hi\n");
        // but the display stream retains it verbatim
        assert!(out.display.windows(4).any(|w| w == b"\x1b[2J"));
    }

    #[test]
    fn stray_unterminated_sentinel_eventually_flushed_as_plain_bytes() {
        let mut p = SentinelParser::new();
        p.process_output(&cmd_end(0, "/home/student"));
        let out = p.process_output(b"garbage \x1f never closes");
        assert!(out.display.ends_with(b"garbage "));
        let flushed = p.flush_partial_on_timeout();
        assert_eq!(flushed, b"\x1f never closes");
    }
}
