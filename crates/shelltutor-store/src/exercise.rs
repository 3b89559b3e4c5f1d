use serde::{Deserialize, Serialize};

/// One of the nine predicate kinds a `shelltutor-validator` can evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationType {
    OutputEquals,
    OutputContains,
    OutputRegex,
    ExitCode,
    CwdRegex,
    FileExists,
    FileContains,
    DirWithFile,
    AnyFileContains,
}

impl ValidationType {
    /// The four "output kinds" the guard chain's bare-Enter suppression
    /// (spec.md §4.6 step 5) applies to.
    pub fn is_output_kind(self) -> bool {
        matches!(
            self,
            ValidationType::OutputEquals
                | ValidationType::OutputContains
                | ValidationType::OutputRegex
                | ValidationType::ExitCode
        )
    }

    /// The two filesystem kinds that issue extra shell commands and so
    /// require a 2-capture `skipCaptures` pre-increment.
    pub fn issues_extra_shell_commands(self) -> bool {
        matches!(
            self,
            ValidationType::DirWithFile | ValidationType::AnyFileContains
        )
    }
}

/// A single exercise within a lesson. `attempts`, `first_try`,
/// `hints_used`, and `completed` mutate during the session; the rest
/// are immutable once loaded from lesson content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub title: String,
    pub xp: u32,
    pub difficulty: u8,
    #[serde(default)]
    pub sandbox_setup: Option<Vec<String>>,
    pub validation_type: ValidationType,
    pub expected: String,
    #[serde(default)]
    pub hints: Vec<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default = "default_true")]
    pub first_try: bool,
    #[serde(default)]
    pub hints_used: u32,
    #[serde(default)]
    pub completed: bool,
}

fn default_true() -> bool {
    true
}

impl Exercise {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        xp: u32,
        difficulty: u8,
        validation_type: ValidationType,
        expected: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            xp,
            difficulty,
            sandbox_setup: None,
            validation_type,
            expected: expected.into(),
            hints: Vec::new(),
            attempts: 0,
            first_try: true,
            hints_used: 0,
            completed: false,
        }
    }

    /// `/hint` reveals the next hint, capped at `hints.len()`, and bumps
    /// `hints_used`. Returns the revealed hint text, or `None` if every
    /// hint has already been revealed.
    pub fn reveal_next_hint(&mut self) -> Option<&str> {
        if (self.hints_used as usize) >= self.hints.len() {
            return None;
        }
        let idx = self.hints_used as usize;
        self.hints_used += 1;
        Some(self.hints[idx].as_str())
    }
}
