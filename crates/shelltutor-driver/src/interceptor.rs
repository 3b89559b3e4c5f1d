//! Recognizes `/`-prefixed slash commands out of a raw keystroke
//! stream, the way the shell widget's `onData` feed delivers it one
//! byte at a time. Ported from `omnish-client::interceptor`'s
//! `::`-prefix state machine, retargeted to a bare `/` prefix plus a
//! recognized-word check performed once Enter arrives (the legal word
//! set is fixed and known up front, unlike the teacher's open-ended
//! LLM-query suffix).

use std::collections::VecDeque;

const RECOGNIZED_WORDS: &[&str] = &[
    "help", "lessons", "lesson", "hint", "skip", "reset", "status", "sidebar", "close", "back",
];

#[derive(Debug, PartialEq, Eq)]
pub enum InterceptAction {
    /// Buffering input after a leading `/`; not yet sent to the VM.
    Buffering(Vec<u8>),
    /// Forward these bytes to the VM's serial input untouched.
    Forward(Vec<u8>),
    /// A recognized slash command line, with its leading `/` stripped.
    Command(String),
    /// Backspace while buffering; contains the updated buffer for echo.
    Backspace(Vec<u8>),
}

pub struct InputInterceptor {
    buffer: VecDeque<u8>,
    in_slash: bool,
}

impl InputInterceptor {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::new(),
            in_slash: false,
        }
    }

    /// Any output from the shell cancels a partially typed slash
    /// command (mirrors Ctrl+C/Ctrl+D cancellation in the teacher's
    /// `note_output`).
    pub fn note_output(&mut self, _data: &[u8]) {
        if self.in_slash {
            self.in_slash = false;
            self.buffer.clear();
        }
    }

    pub fn feed_byte(&mut self, byte: u8) -> InterceptAction {
        if byte == 0x7f || byte == 0x08 {
            if !self.buffer.is_empty() {
                self.buffer.pop_back();
                if self.buffer.is_empty() {
                    self.in_slash = false;
                }
                return InterceptAction::Backspace(self.buffer.iter().copied().collect());
            }
            return InterceptAction::Forward(vec![byte]);
        }

        if byte == b'\n' || byte == b'\r' {
            return self.handle_enter();
        }

        if self.buffer.is_empty() {
            if byte == b'/' {
                self.in_slash = true;
                self.buffer.push_back(byte);
                return InterceptAction::Buffering(self.buffer.iter().copied().collect());
            }
            return InterceptAction::Forward(vec![byte]);
        }

        if self.in_slash {
            self.buffer.push_back(byte);
            return InterceptAction::Buffering(self.buffer.iter().copied().collect());
        }

        InterceptAction::Forward(vec![byte])
    }

    fn handle_enter(&mut self) -> InterceptAction {
        let buffered: Vec<u8> = self.buffer.iter().copied().collect();
        self.buffer.clear();
        self.in_slash = false;

        if buffered.is_empty() || buffered[0] != b'/' {
            return InterceptAction::Forward(buffered);
        }

        let Ok(line) = std::str::from_utf8(&buffered[1..]) else {
            return InterceptAction::Forward(buffered);
        };
        let word = line.split_whitespace().next().unwrap_or("");
        if RECOGNIZED_WORDS.contains(&word) {
            InterceptAction::Command(line.to_string())
        } else {
            InterceptAction::Forward(buffered)
        }
    }
}

impl Default for InputInterceptor {
    fn default() -> Self {
        Self::new()
    }
}
