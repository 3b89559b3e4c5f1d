//! Nine predicate kinds over a `CommandResult` plus optional filesystem
//! reads. Grounded in `omnish-context`'s narrow, single-purpose trait
//! style; unlike that crate's async trait, validation here is exposed
//! as one free async function dispatching on `ValidationType`, since
//! every predicate shares the same signature and none needs its own
//! implementor type.
//!
//! Never throws: evaluation errors (bad regex, missing `::`, a
//! non-integer `exit_code` expectation) produce `passed = false` with
//! an explanatory message instead of propagating.

use regex::Regex;
use shelltutor_channel::SessionChannel;
use shelltutor_parser::CommandResult;
use shelltutor_sentinel::SANDBOX_ROOT;
use shelltutor_store::{Exercise, ValidationType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub passed: bool,
    pub message: String,
}

impl ValidationOutcome {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii_whitespace())
}

pub async fn validate(
    exercise: &Exercise,
    result: &CommandResult,
    channel: &dyn SessionChannel,
) -> ValidationOutcome {
    match exercise.validation_type {
        ValidationType::OutputEquals => output_equals(&exercise.expected, result),
        ValidationType::OutputContains => output_contains(&exercise.expected, result),
        ValidationType::OutputRegex => output_regex(&exercise.expected, result),
        ValidationType::ExitCode => exit_code(&exercise.expected, result),
        ValidationType::CwdRegex => cwd_regex(&exercise.expected, result),
        ValidationType::FileExists => file_exists(&exercise.expected, result, channel).await,
        ValidationType::FileContains => file_contains(&exercise.expected, result, channel).await,
        ValidationType::DirWithFile => dir_with_file(channel).await,
        ValidationType::AnyFileContains => any_file_contains(&exercise.expected, channel).await,
    }
}

fn output_equals(expected: &str, result: &CommandResult) -> ValidationOutcome {
    if trim(&result.stdout) == trim(expected) {
        ValidationOutcome::pass("output matched exactly")
    } else {
        ValidationOutcome::fail(format!(
            "expected output '{}', got '{}'",
            trim(expected),
            trim(&result.stdout)
        ))
    }
}

fn output_contains(expected: &str, result: &CommandResult) -> ValidationOutcome {
    if result.stdout.contains(trim(expected)) {
        ValidationOutcome::pass("output contained expected text")
    } else {
        ValidationOutcome::fail(format!("output did not contain '{}'", trim(expected)))
    }
}

fn output_regex(expected: &str, result: &CommandResult) -> ValidationOutcome {
    match Regex::new(expected) {
        Ok(re) => {
            if re.is_match(&result.stdout) {
                ValidationOutcome::pass("output matched pattern")
            } else {
                ValidationOutcome::fail(format!("output did not match /{expected}/"))
            }
        }
        Err(e) => ValidationOutcome::fail(format!("invalid regex '{expected}': {e}")),
    }
}

fn exit_code(expected: &str, result: &CommandResult) -> ValidationOutcome {
    match expected.trim().parse::<i32>() {
        Ok(code) if code == result.returncode => {
            ValidationOutcome::pass(format!("exit code {code} as expected"))
        }
        Ok(code) => ValidationOutcome::fail(format!(
            "expected exit code {code}, got {}",
            result.returncode
        )),
        Err(_) => ValidationOutcome::fail(format!("'{expected}' is not a valid exit code")),
    }
}

fn cwd_regex(expected: &str, result: &CommandResult) -> ValidationOutcome {
    match Regex::new(expected) {
        Ok(re) => {
            if re.is_match(&result.cwd) {
                ValidationOutcome::pass("working directory matched pattern")
            } else {
                ValidationOutcome::fail(format!(
                    "cwd '{}' did not match /{expected}/",
                    result.cwd
                ))
            }
        }
        Err(e) => ValidationOutcome::fail(format!("invalid regex '{expected}': {e}")),
    }
}

fn candidate_paths(expected: &str, cwd: &str) -> [String; 2] {
    [
        format!("{SANDBOX_ROOT}/{expected}"),
        format!("{cwd}/{expected}"),
    ]
}

async fn file_exists(
    expected: &str,
    result: &CommandResult,
    channel: &dyn SessionChannel,
) -> ValidationOutcome {
    for candidate in candidate_paths(expected, &result.cwd) {
        match channel.file_exists(&candidate).await {
            Ok(true) => return ValidationOutcome::pass(format!("found {candidate}")),
            Ok(false) => continue,
            Err(e) => return ValidationOutcome::fail(format!("could not check {candidate}: {e}")),
        }
    }
    ValidationOutcome::fail(format!("'{expected}' does not exist"))
}

async fn file_contains(
    expected: &str,
    result: &CommandResult,
    channel: &dyn SessionChannel,
) -> ValidationOutcome {
    let Some((path, needle)) = expected.split_once("::") else {
        return ValidationOutcome::fail(format!(
            "'{expected}' is missing the required '::' separator"
        ));
    };
    for candidate in candidate_paths(path, &result.cwd) {
        match channel.read_file(&candidate).await {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes);
                if content.contains(needle) {
                    return ValidationOutcome::pass(format!("{candidate} contains '{needle}'"));
                }
                return ValidationOutcome::fail(format!(
                    "{candidate} does not contain '{needle}'"
                ));
            }
            Err(_) => continue,
        }
    }
    ValidationOutcome::fail(format!("'{path}' does not exist"))
}

async fn dir_with_file(channel: &dyn SessionChannel) -> ValidationOutcome {
    match channel.has_dir_with_file(SANDBOX_ROOT).await {
        Ok(true) => ValidationOutcome::pass("found a directory containing a file"),
        Ok(false) => ValidationOutcome::fail("no directory with a file was found"),
        Err(e) => ValidationOutcome::fail(format!("could not search {SANDBOX_ROOT}: {e}")),
    }
}

async fn any_file_contains(expected: &str, channel: &dyn SessionChannel) -> ValidationOutcome {
    match channel.find_file_containing(SANDBOX_ROOT, expected).await {
        Ok(true) => ValidationOutcome::pass(format!("found a file containing '{expected}'")),
        Ok(false) => ValidationOutcome::fail(format!("no file contains '{expected}'")),
        Err(e) => ValidationOutcome::fail(format!("could not search {SANDBOX_ROOT}: {e}")),
    }
}
