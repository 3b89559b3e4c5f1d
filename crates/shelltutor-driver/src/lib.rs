//! The Session Driver: orchestrates VM lifecycle, lesson seeding, the
//! command guard chain, and validation. Grounded on
//! `omnish-daemon::server::DaemonServer` (`Arc<dyn Trait>` pluggable
//! backends, `tracing::error!` on a fallible side-effect rather than
//! propagating) and `omnish-daemon::session_mgr::SessionManager`
//! (`Arc<Mutex<...>>` for genuinely shared state, short lock scopes
//! that never span an `.await`).

mod interceptor;

pub use interceptor::{InputInterceptor, InterceptAction};

use anyhow::{Context, Result};
use shelltutor_channel::{ReadyGate, SessionChannel};
use shelltutor_common::ControllerConfig;
use shelltutor_coalescer::ByteCoalescer;
use shelltutor_parser::SentinelParser;
use shelltutor_store::{compute_xp, Exercise, ProgressStore};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};

const STARTUP_SCRIPT_PATH: &str = "/tmp/.shelltutor_profile";
const SEED_SCRIPT_PATH: &str = "/tmp/.shelltutor_seed.sh";

/// A lesson's ordered exercises, as loaded by the (out-of-scope) lesson
/// content loader and handed to the Driver on `/lesson <N>` or initial
/// entry.
#[derive(Debug, Clone)]
pub struct Lesson {
    pub id: String,
    pub exercises: Vec<Exercise>,
}

/// What the Controller writes to; the terminal widget itself (xterm.js
/// equivalent) is out of scope and owned by the embedder.
pub trait TerminalSink: Send + Sync {
    fn write(&self, bytes: &[u8]);
}

/// Slash commands the Driver does not own enough state to act on itself
/// (lesson catalog, sidebar visibility, overlay routing are all named
/// as external collaborators in the Controller's scope) — returned to
/// the embedder to handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    Lessons,
    Lesson(Option<u32>),
    Status,
    Sidebar,
    Close,
    Back,
}

/// The result of feeding one byte of terminal input through the Driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEffect {
    /// A hint was revealed (or `None` if every hint was already shown).
    HintRevealed(Option<String>),
    Skipped,
    /// `/reset` was typed; caller should invoke `reset_lesson` with the
    /// current lesson's freshly reloaded content.
    ResetRequested,
    /// A slash command the Driver itself doesn't act on.
    Other(SlashCommand),
}

struct DriverState {
    lesson: Option<Lesson>,
    exercise_index: usize,
    validating: bool,
}

/// Owns lesson state and ties the Channel, Parser, Validator, and
/// ProgressStore together. One instance per active VM session.
pub struct SessionDriver {
    channel: Arc<dyn SessionChannel>,
    terminal: Arc<dyn TerminalSink>,
    progress: Arc<dyn ProgressStore>,
    config: ControllerConfig,
    parser: Mutex<SentinelParser>,
    ready: ReadyGate,
    state: Mutex<DriverState>,
    /// Separate from the Parser's own `mute_until_next_prompt`, which
    /// auto-clears on the next `CMD_START`. Validation's filesystem-kind
    /// predicates issue extra shell commands that produce their own
    /// `CMD_START`/`CMD_END` pairs on this same broadcast stream (even
    /// though `exec_capture` reads them via its own independent tap);
    /// a CMD_START-tied mute would clear before the mandated post-
    /// validation drain completes. This flag is cleared by the Driver
    /// itself, on its own schedule, never by the Parser.
    display_suppressed: AtomicBool,
}

impl SessionDriver {
    pub fn new(
        channel: Arc<dyn SessionChannel>,
        terminal: Arc<dyn TerminalSink>,
        progress: Arc<dyn ProgressStore>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            channel,
            terminal,
            progress,
            config,
            parser: Mutex::new(SentinelParser::new()),
            ready: ReadyGate::new(),
            state: Mutex::new(DriverState {
                lesson: None,
                exercise_index: 0,
                validating: false,
            }),
            display_suppressed: AtomicBool::new(false),
        }
    }

    /// Starts the VM, waits for the shell to become interactive, and
    /// installs the prompt hook. Boot failure (including exceeding the
    /// configured boot timeout) is fatal and surfaced to the caller.
    pub async fn boot(&self) -> Result<()> {
        self.channel.boot().await.context("VM boot failed")?;
        self.ready
            .wait(Duration::from_secs(self.config.timing.boot_timeout_secs))
            .await
            .context("shell did not become ready")?;

        let dangerous: Vec<&str> = self
            .config
            .sandbox
            .dangerous_commands
            .iter()
            .map(String::as_str)
            .collect();
        let hook = shelltutor_sentinel::build_prompt_hook(&self.config.sandbox.root, Some(&dangerous));
        self.channel
            .write_file(STARTUP_SCRIPT_PATH, hook.as_bytes())
            .await?;
        self.channel
            .send_serial(&format!("source {STARTUP_SCRIPT_PATH}\n"))
            .await?;
        Ok(())
    }

    /// The background read loop: coalesces raw serial bytes, feeds them
    /// through the Parser, forwards display bytes to the terminal
    /// (unless suppressed), and dispatches completed commands through
    /// the guard chain. Runs until the channel's broadcast sender is
    /// dropped.
    pub async fn run(self: Arc<Self>) {
        let mut rx = self.channel.subscribe();
        let mut coalescer =
            ByteCoalescer::with_idle_timeout(Duration::from_millis(self.config.timing.byte_coalesce_ms));

        loop {
            let wake_in = self.next_wake(&coalescer).await;
            tokio::select! {
                received = rx.recv() => {
                    match received {
                        Ok(bytes) => {
                            for byte in bytes {
                                if let Some(flushed) = coalescer.push_byte(byte) {
                                    self.on_coalesced(&flushed).await;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = sleep_or_forever(wake_in) => {
                    self.on_idle_wake(&mut coalescer).await;
                }
            }
        }
    }

    async fn next_wake(&self, coalescer: &ByteCoalescer) -> Option<Duration> {
        let now = Instant::now();
        let coalesce = coalescer.next_idle_deadline(now);
        let partial = {
            let parser = self.parser.lock().await;
            parser.partial_deadline(now, Duration::from_millis(self.config.timing.partial_sentinel_ms))
        };
        match (coalesce, partial) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        }
    }

    async fn on_idle_wake(&self, coalescer: &mut ByteCoalescer) {
        let now = Instant::now();
        if let Some(flushed) = coalescer.poll_idle(now) {
            self.on_coalesced(&flushed).await;
        }
        let timed_out = {
            let parser = self.parser.lock().await;
            parser
                .partial_deadline(now, Duration::from_millis(self.config.timing.partial_sentinel_ms))
                .map(|d| d.is_zero())
                .unwrap_or(false)
        };
        if timed_out {
            let bytes = {
                let mut parser = self.parser.lock().await;
                parser.flush_partial_on_timeout()
            };
            self.write_display(&bytes);
        }
    }

    async fn on_coalesced(&self, chunk: &[u8]) {
        let out = {
            let mut parser = self.parser.lock().await;
            parser.process_output(chunk)
        };
        if out.became_ready {
            self.ready.mark_ready();
        }
        self.write_display(&out.display);
        for command in out.commands {
            self.handle_command(command).await;
        }
    }

    fn write_display(&self, bytes: &[u8]) {
        if !bytes.is_empty() && !self.display_suppressed.load(Ordering::SeqCst) {
            self.terminal.write(bytes);
        }
    }

    /// Resets the Parser, restores progress-backed exercise completion,
    /// seeds the lesson's sandbox, and installs the lesson as current.
    /// `clean` requests the destructive `rm -rf` prefix (lesson switch
    /// or `/reset`).
    pub async fn enter_lesson(&self, mut lesson: Lesson, clean: bool) -> Result<()> {
        {
            let mut parser = self.parser.lock().await;
            parser.reset();
        }

        let index = self.restore_progress(&mut lesson);

        let mut lines = Vec::new();
        if clean {
            lines.push(format!(
                "cd {} && rm -rf ./* ./.[!.]* 2>/dev/null",
                self.config.sandbox.root
            ));
        }
        let mut has_git = false;
        for exercise in &lesson.exercises {
            if let Some(setup) = &exercise.sandbox_setup {
                for command in setup {
                    if command.contains("git") {
                        has_git = true;
                    }
                    lines.push(format!("cd {}", self.config.sandbox.root));
                    lines.push(command.clone());
                }
            }
        }

        if !lines.is_empty() {
            let script = lines.join("\n");
            self.channel
                .write_file(SEED_SCRIPT_PATH, script.as_bytes())
                .await?;
            {
                let mut parser = self.parser.lock().await;
                parser.add_skip_captures(1);
                parser.mute_until_next_prompt();
            }
            self.channel
                .send_serial(&format!(
                    "bash {SEED_SCRIPT_PATH} > /dev/null 2>&1; rm -f {SEED_SCRIPT_PATH}\n"
                ))
                .await?;
            let drain_ms = if has_git {
                self.config.timing.seed_drain_git_ms
            } else {
                self.config.timing.seed_drain_ms
            };
            tokio::time::sleep(Duration::from_millis(drain_ms)).await;
        }

        let mut state = self.state.lock().await;
        state.lesson = Some(lesson);
        state.exercise_index = index;
        state.validating = false;
        Ok(())
    }

    /// Re-runs `enter_lesson` with `clean = true`, the behavior named
    /// for `/reset`.
    pub async fn reset_lesson(&self, lesson: Lesson) -> Result<()> {
        self.enter_lesson(lesson, true).await
    }

    fn restore_progress(&self, lesson: &mut Lesson) -> usize {
        let progress = self.progress.get_lesson_progress(&lesson.id);
        let mut index = 0;
        for (i, exercise) in lesson.exercises.iter_mut().enumerate() {
            if progress
                .exercises
                .get(&exercise.id)
                .map(|e| e.completed)
                .unwrap_or(false)
            {
                exercise.completed = true;
                index = i + 1;
            }
        }
        index
    }

    /// The guard chain from spec.md §4.6, checked in this exact order.
    async fn handle_command(&self, result: shelltutor_parser::CommandResult) {
        {
            let state = self.state.lock().await;
            if state.validating {
                return;
            }
            let Some(lesson) = &state.lesson else {
                return;
            };
            if state.exercise_index >= lesson.exercises.len() {
                return;
            }
            let exercise = &lesson.exercises[state.exercise_index];
            if exercise.completed {
                return;
            }
            if exercise.validation_type.is_output_kind()
                && result.stdout.trim().is_empty()
                && result.returncode == 0
            {
                return;
            }
        }
        self.run_validation(result).await;
    }

    async fn run_validation(&self, result: shelltutor_parser::CommandResult) {
        let exercise = {
            let mut state = self.state.lock().await;
            state.validating = true;
            let index = state.exercise_index;
            let lesson = state
                .lesson
                .as_mut()
                .expect("guarded by handle_command: lesson is Some");
            lesson.exercises[index].attempts += 1;
            lesson.exercises[index].clone()
        };
        self.display_suppressed.store(true, Ordering::SeqCst);

        if exercise.validation_type.issues_extra_shell_commands() {
            let mut parser = self.parser.lock().await;
            parser.add_skip_captures(2);
        }

        let outcome = shelltutor_validator::validate(&exercise, &result, self.channel.as_ref()).await;

        tokio::time::sleep(Duration::from_millis(self.config.timing.post_validation_drain_ms)).await;
        self.display_suppressed.store(false, Ordering::SeqCst);

        if outcome.passed {
            self.on_validation_passed(&exercise).await;
        } else {
            self.on_validation_failed(&exercise, &outcome.message).await;
        }
    }

    async fn on_validation_passed(&self, exercise: &Exercise) {
        let xp = compute_xp(
            exercise.xp,
            exercise.difficulty,
            exercise.first_try,
            exercise.hints_used,
        );

        let message = {
            let mut state = self.state.lock().await;
            let index = state.exercise_index;
            let lesson = state.lesson.as_mut().expect("lesson present during validation");
            lesson.exercises[index].completed = true;
            let lesson_id = lesson.id.clone();
            let exercise_id = lesson.exercises[index].id.clone();
            let attempts = lesson.exercises[index].attempts;
            let hints_used = lesson.exercises[index].hints_used;

            if let Err(e) = self
                .progress
                .record_exercise(&lesson_id, &exercise_id, xp, attempts, hints_used)
            {
                tracing::error!(error = %e, lesson = %lesson_id, exercise = %exercise_id, "failed to persist exercise progress");
            }

            state.exercise_index += 1;
            let lesson = state.lesson.as_ref().unwrap();
            if state.exercise_index < lesson.exercises.len() {
                format!(
                    "Passed! +{xp} XP — next: {}",
                    lesson.exercises[state.exercise_index].title
                )
            } else {
                format!("Passed! +{xp} XP — lesson complete!")
            }
        };

        {
            let mut state = self.state.lock().await;
            state.validating = false;
        }
        self.queue_and_kick(message).await;
    }

    async fn on_validation_failed(&self, exercise: &Exercise, message: &str) {
        {
            let mut state = self.state.lock().await;
            let index = state.exercise_index;
            if let Some(lesson) = state.lesson.as_mut() {
                if lesson.exercises.get(index).map(|e| e.id.as_str()) == Some(exercise.id.as_str()) {
                    lesson.exercises[index].first_try = false;
                }
            }
            state.validating = false;
        }
        self.queue_and_kick(message.to_string()).await;
    }

    async fn queue_and_kick(&self, message: String) {
        {
            let mut parser = self.parser.lock().await;
            parser.queue_system_message(message);
            parser.add_skip_captures(1);
        }
        if let Err(e) = self.channel.send_serial("\n").await {
            tracing::error!(error = %e, "failed to kick a fresh prompt after validation");
        }
    }

    /// `/hint`: reveals the current exercise's next hint, if any remain.
    pub async fn hint(&self) -> Option<String> {
        let mut state = self.state.lock().await;
        let index = state.exercise_index;
        let lesson = state.lesson.as_mut()?;
        lesson
            .exercises
            .get_mut(index)
            .and_then(|e| e.reveal_next_hint())
            .map(str::to_string)
    }

    /// `/skip`: advances past the current exercise without validating.
    pub async fn skip(&self) {
        let mut state = self.state.lock().await;
        if let Some(lesson) = &state.lesson {
            if state.exercise_index < lesson.exercises.len() {
                state.exercise_index += 1;
            }
        }
    }

    /// Feeds one keystroke byte through `interceptor`, forwarding
    /// non-command bytes to the VM's serial input and acting on, or
    /// returning, recognized slash commands.
    pub async fn handle_input_byte(
        &self,
        interceptor: &mut InputInterceptor,
        byte: u8,
    ) -> Option<InputEffect> {
        match interceptor.feed_byte(byte) {
            InterceptAction::Forward(bytes) => {
                if let Err(e) = self.channel.send_serial(&String::from_utf8_lossy(&bytes)).await {
                    tracing::error!(error = %e, "failed to forward input to VM");
                }
                None
            }
            InterceptAction::Buffering(_) | InterceptAction::Backspace(_) => None,
            InterceptAction::Command(line) => {
                // Ctrl-U clears the VM's input line, CR kicks a fresh
                // prompt; the slash command itself never reaches the shell.
                if let Err(e) = self.channel.send_serial("\u{15}\r").await {
                    tracing::error!(error = %e, "failed to clear input line for slash command");
                }
                Some(self.dispatch_slash_command(&line).await)
            }
        }
    }

    async fn dispatch_slash_command(&self, line: &str) -> InputEffect {
        let mut parts = line.split_whitespace();
        match parts.next().unwrap_or("") {
            "hint" => InputEffect::HintRevealed(self.hint().await),
            "skip" => {
                self.skip().await;
                InputEffect::Skipped
            }
            "reset" => InputEffect::ResetRequested,
            "help" => InputEffect::Other(SlashCommand::Help),
            "lessons" => InputEffect::Other(SlashCommand::Lessons),
            "lesson" => {
                let n = parts.next().and_then(|s| s.parse().ok());
                InputEffect::Other(SlashCommand::Lesson(n))
            }
            "status" => InputEffect::Other(SlashCommand::Status),
            "sidebar" => InputEffect::Other(SlashCommand::Sidebar),
            "close" => InputEffect::Other(SlashCommand::Close),
            "back" => InputEffect::Other(SlashCommand::Back),
            _ => InputEffect::Other(SlashCommand::Help),
        }
    }
}

async fn sleep_or_forever(duration: Option<Duration>) {
    match duration {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shelltutor_store::{MemoryProgressStore, ValidationType};
    use std::sync::Mutex as StdMutex;

    struct RecordingTerminal {
        written: StdMutex<Vec<u8>>,
    }
    impl RecordingTerminal {
        fn new() -> Self {
            Self {
                written: StdMutex::new(Vec::new()),
            }
        }
        fn contents(&self) -> Vec<u8> {
            self.written.lock().unwrap().clone()
        }
    }
    impl TerminalSink for RecordingTerminal {
        fn write(&self, bytes: &[u8]) {
            self.written.lock().unwrap().extend_from_slice(bytes);
        }
    }

    /// A channel whose `send_serial` synthesizes a CMD_START/CMD_END
    /// pair carrying fixed output, simulating a VM that echoes whatever
    /// is sent back as a completed command.
    struct FakeVmChannel {
        sender: broadcast::Sender<Vec<u8>>,
        next_stdout: StdMutex<String>,
        next_returncode: StdMutex<i32>,
    }

    impl FakeVmChannel {
        fn new() -> Self {
            let (sender, _) = broadcast::channel(64);
            Self {
                sender,
                next_stdout: StdMutex::new(String::new()),
                next_returncode: StdMutex::new(0),
            }
        }
    }

    #[async_trait]
    impl SessionChannel for FakeVmChannel {
        async fn boot(&self) -> Result<()> {
            let _ = self
                .sender
                .send(b"\x1fSHELLTUTOR_CMD_END:0:/home/student\x1f".to_vec());
            Ok(())
        }
        fn subscribe(&self) -> broadcast::Receiver<Vec<u8>> {
            self.sender.subscribe()
        }
        async fn send_serial(&self, _text: &str) -> Result<()> {
            let stdout = self.next_stdout.lock().unwrap().clone();
            let code = *self.next_returncode.lock().unwrap();
            let mut chunk = Vec::new();
            chunk.extend_from_slice(b"\x1fSHELLTUTOR_CMD_START\x1f");
            chunk.extend_from_slice(b"echoed command\n");
            chunk.extend_from_slice(stdout.as_bytes());
            chunk.extend_from_slice(
                format!("\x1fSHELLTUTOR_CMD_END:{code}:/home/student\x1f").as_bytes(),
            );
            let _ = self.sender.send(chunk);
            Ok(())
        }
        async fn write_file(&self, _path: &str, _bytes: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn file_exists(&self, _path: &str) -> Result<bool> {
            Ok(false)
        }
        async fn read_file(&self, _path: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn test_config() -> ControllerConfig {
        let mut cfg = ControllerConfig::default();
        cfg.timing.post_validation_drain_ms = 1;
        cfg.timing.seed_drain_ms = 1;
        cfg.timing.seed_drain_git_ms = 1;
        cfg.timing.boot_timeout_secs = 5;
        cfg
    }

    fn one_exercise_lesson() -> Lesson {
        Lesson {
            id: "l1".to_string(),
            exercises: vec![Exercise::new(
                "e1",
                "say hi",
                20,
                1,
                ValidationType::OutputContains,
                "hi",
            )],
        }
    }

    async fn booted_driver() -> (Arc<SessionDriver>, Arc<FakeVmChannel>, Arc<RecordingTerminal>) {
        let channel = Arc::new(FakeVmChannel::new());
        let terminal = Arc::new(RecordingTerminal::new());
        let progress = Arc::new(MemoryProgressStore::new());
        let driver = Arc::new(SessionDriver::new(
            channel.clone(),
            terminal.clone(),
            progress,
            test_config(),
        ));
        driver.boot().await.unwrap();
        let _read_loop = tokio::spawn(driver.clone().run());
        // give the read loop a moment to observe the boot CMD_END
        tokio::time::sleep(Duration::from_millis(20)).await;
        (driver, channel, terminal)
    }

    #[tokio::test]
    async fn passing_command_advances_exercise_and_awards_xp() {
        let (driver, channel, _terminal) = booted_driver().await;
        driver.enter_lesson(one_exercise_lesson(), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        *channel.next_stdout.lock().unwrap() = "hi\n".to_string();
        channel.send_serial("echo hi\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = driver.state.lock().await;
        let lesson = state.lesson.as_ref().unwrap();
        assert!(lesson.exercises[0].completed);
        assert_eq!(state.exercise_index, 1);
    }

    #[tokio::test]
    async fn bare_enter_on_output_kind_does_not_bump_attempts() {
        let (driver, channel, _terminal) = booted_driver().await;
        driver.enter_lesson(one_exercise_lesson(), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        *channel.next_stdout.lock().unwrap() = String::new();
        channel.send_serial("\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = driver.state.lock().await;
        let lesson = state.lesson.as_ref().unwrap();
        assert_eq!(lesson.exercises[0].attempts, 0);
        assert!(!lesson.exercises[0].completed);
    }

    #[tokio::test]
    async fn failing_command_marks_not_first_try_and_keeps_exercise_pending() {
        let (driver, channel, _terminal) = booted_driver().await;
        driver.enter_lesson(one_exercise_lesson(), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        *channel.next_stdout.lock().unwrap() = "nope\n".to_string();
        channel.send_serial("echo nope\n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = driver.state.lock().await;
        let lesson = state.lesson.as_ref().unwrap();
        assert!(!lesson.exercises[0].completed);
        assert!(!lesson.exercises[0].first_try);
        assert_eq!(lesson.exercises[0].attempts, 1);
    }

    #[tokio::test]
    async fn hint_reveals_and_caps() {
        let (driver, _channel, _terminal) = booted_driver().await;
        let mut lesson = one_exercise_lesson();
        lesson.exercises[0].hints = vec!["try echo".to_string()];
        driver.enter_lesson(lesson, true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(driver.hint().await, Some("try echo".to_string()));
        assert_eq!(driver.hint().await, None);
    }

    #[tokio::test]
    async fn skip_advances_without_validation() {
        let (driver, _channel, _terminal) = booted_driver().await;
        driver.enter_lesson(one_exercise_lesson(), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        driver.skip().await;
        let state = driver.state.lock().await;
        assert_eq!(state.exercise_index, 1);
        assert!(!state.lesson.as_ref().unwrap().exercises[0].completed);
    }

    #[tokio::test]
    async fn guard_chain_ignores_commands_while_validating() {
        let (driver, _channel, _terminal) = booted_driver().await;
        driver.enter_lesson(one_exercise_lesson(), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        {
            let mut state = driver.state.lock().await;
            state.validating = true;
        }
        driver
            .handle_command(shelltutor_parser::CommandResult {
                stdout: "hi\n".to_string(),
                returncode: 0,
                cwd: "/home/student".to_string(),
            })
            .await;
        let state = driver.state.lock().await;
        assert_eq!(state.lesson.as_ref().unwrap().exercises[0].attempts, 0);
    }

    #[tokio::test]
    async fn input_interceptor_routes_hint_and_forwards_other_text() {
        let (driver, channel, _terminal) = booted_driver().await;
        driver.enter_lesson(one_exercise_lesson(), true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut interceptor = InputInterceptor::new();

        let mut effect = None;
        for b in b"/hint\n" {
            if let Some(e) = driver.handle_input_byte(&mut interceptor, *b).await {
                effect = Some(e);
            }
        }
        assert!(matches!(effect, Some(InputEffect::HintRevealed(_))));

        let mut rx = channel.subscribe();
        for b in b"ls\n" {
            driver.handle_input_byte(&mut interceptor, *b).await;
        }
        // draining isn't asserted precisely here; forwarding doesn't panic
        // and the channel stays usable for subsequent recv calls.
        drop(rx.try_recv());
    }
}
