//! Buffers raw serial bytes, arriving one at a time, into
//! display-granular chunks before handing them to the Sentinel Parser.
//!
//! Flush decisions are a pure function of an injected `Instant` rather
//! than an owned timer, so tests can simulate the 4 ms idle timeout by
//! rewinding a clock field instead of sleeping.

use std::time::{Duration, Instant};

const MAX_BUFFER_BYTES: usize = 128;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(4);

pub struct ByteCoalescer {
    buf: Vec<u8>,
    last_arrival: Instant,
    idle_timeout: Duration,
}

impl ByteCoalescer {
    pub fn new() -> Self {
        Self::with_idle_timeout(DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            buf: Vec::new(),
            last_arrival: Instant::now(),
            idle_timeout,
        }
    }

    /// Feeds one byte. Returns `Some(chunk)` if this byte triggers an
    /// immediate flush (newline/CR just appended, or the 128-byte cap
    /// was crossed).
    pub fn push_byte(&mut self, byte: u8) -> Option<Vec<u8>> {
        self.buf.push(byte);
        self.last_arrival = Instant::now();

        if byte == b'\n' || byte == b'\r' || self.buf.len() >= MAX_BUFFER_BYTES {
            return Some(self.take());
        }
        None
    }

    /// Called by the owning event loop when it wakes from an idle
    /// sleep; flushes if `now` is past the idle timeout since the last
    /// byte arrived and the buffer is non-empty.
    pub fn poll_idle(&mut self, now: Instant) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            return None;
        }
        if now.duration_since(self.last_arrival) >= self.idle_timeout {
            return Some(self.take());
        }
        None
    }

    /// How long the owning loop should sleep before the idle timeout
    /// could next fire, given `now`. `None` means the buffer is empty
    /// and there's nothing to wait on.
    pub fn next_idle_deadline(&self, now: Instant) -> Option<Duration> {
        if self.buf.is_empty() {
            return None;
        }
        let elapsed = now.duration_since(self.last_arrival);
        Some(self.idle_timeout.saturating_sub(elapsed))
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

impl Default for ByteCoalescer {
    fn default() -> Self {
        Self::new()
    }
}
