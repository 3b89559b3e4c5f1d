//! Byte-level stripping of ANSI CSI/OSC sequences and stray control
//! bytes from a finalized capture, before it becomes `CommandResult::stdout`.
//!
//! Grounded in `omnish-daemon::prompt_detector::strip_ansi` (CSI
//! scan-to-final-byte) and `omnish-tracker::osc133_detector::strip_osc133`
//! (OSC scan-to-terminator), generalized from their single-purpose
//! forms into the three-pass pipeline this parser's captures need.

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Removes `ESC [ ... <final>` sequences, where `<final>` is the first
/// byte in `0x40..=0x7E`. Covers private CSI forms (`ESC [ ? ...`) since
/// those parameter bytes fall before the final byte too.
pub fn strip_csi(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == ESC && input.get(i + 1) == Some(&b'[') {
            let mut j = i + 2;
            while j < input.len() && !(0x40..=0x7e).contains(&input[j]) {
                j += 1;
            }
            // include the final byte if found, otherwise drop the dangling sequence
            i = if j < input.len() { j + 1 } else { input.len() };
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    out
}

/// Removes `ESC ] ... BEL` sequences.
pub fn strip_osc(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == ESC && input.get(i + 1) == Some(&b']') {
            let mut j = i + 2;
            while j < input.len() && input[j] != BEL {
                j += 1;
            }
            i = if j < input.len() { j + 1 } else { input.len() };
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    out
}

/// Removes control bytes in `0x00..=0x07` and `0x0B..=0x1F`, preserving
/// tab (`0x09`) and LF (`0x0A`).
pub fn strip_control_bytes(input: &[u8]) -> Vec<u8> {
    input
        .iter()
        .copied()
        .filter(|&b| !((b <= 0x08) || (0x0b..=0x1f).contains(&b)))
        .collect()
}

/// Removes everything up to and including the first LF (the echoed
/// prompt+command line). If there is no LF at all, the whole input was
/// that echoed line with no output following it.
pub fn remove_first_line(input: &[u8]) -> Vec<u8> {
    match input.iter().position(|&b| b == b'\n') {
        Some(pos) => input[pos + 1..].to_vec(),
        None => Vec::new(),
    }
}
