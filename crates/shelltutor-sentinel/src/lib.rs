//! Sentinel byte/string definitions and the bash prompt hook that emits
//! them. The hook is installed by writing this text to the VM's
//! filesystem through the out-of-band channel and sourcing it — never
//! typed into the serial tty, so its source never echoes.

/// The single control byte that delimits every sentinel. Excluded from
/// legitimate text, ANSI sequences, and UTF-8 continuation bytes, so a
/// byte-oriented scan can pick it out unambiguously.
pub const SENTINEL_DELIM: u8 = 0x1F;

/// The literal identifier body emitted right before the shell shows a
/// fresh prompt.
pub const CMD_START: &str = "SHELLTUTOR_CMD_START";

/// The prefix of the body emitted right after a command finishes; the
/// full body is `CMD_END:<exitcode>:<cwd>`.
pub const CMD_END_PREFIX: &str = "SHELLTUTOR_CMD_END";

/// The fixed sandbox root the hook pins `HOME` to and the Validator
/// resolves relative paths against.
pub const SANDBOX_ROOT: &str = "/home/student";

const DEFAULT_DANGEROUS_COMMANDS: &[&str] =
    &["sudo", "su", "chroot", "mount", "umount", "fdisk", "parted"];

/// Builds the bash startup file text. Firing order on every prompt is
/// load-bearing and must not be reordered:
///
/// 1. capture `$?` into a local variable first (anything else resets it)
/// 2. emit `CMD_END` with that exit code and the current working directory
/// 3. rebuild the prompt string with the new cwd
/// 4. emit `CMD_START`
///
/// `dangerous_commands` are replaced with refusal stubs; pass `None`
/// to use the default list.
pub fn build_prompt_hook(sandbox_root: &str, dangerous_commands: Option<&[&str]>) -> String {
    let delim = SENTINEL_DELIM as char;
    let commands = dangerous_commands.unwrap_or(DEFAULT_DANGEROUS_COMMANDS);

    let mut out = String::new();
    out.push_str("# shelltutor shell integration\n");
    out.push_str(&format!("export HOME=\"{sandbox_root}\"\n"));
    out.push_str("unset HISTFILE\n");
    out.push_str("set +o history\n\n");

    for cmd in commands {
        out.push_str(&format!(
            "{cmd}() {{\n  echo \"{cmd}: disabled in this sandbox\" >&2\n  return 1\n}}\n"
        ));
    }
    out.push('\n');

    out.push_str("__shelltutor_prompt_cmd() {\n");
    out.push_str("  local __shelltutor_ec=$?\n");
    out.push_str(&format!(
        "  printf '%c{CMD_END_PREFIX}:%d:%s%c' '{delim}' \"$__shelltutor_ec\" \"$PWD\" '{delim}'\n"
    ));
    out.push_str("  PS1=\"\\u@\\h:\\w\\$ \"\n");
    out.push_str(&format!(
        "  printf '%c{CMD_START}%c' '{delim}' '{delim}'\n"
    ));
    out.push_str("}\n");
    out.push_str("PROMPT_COMMAND=\"__shelltutor_prompt_cmd\"\n");

    out
}
