/// Owned exclusively by `SentinelParser`. `skip_captures` begins at 1
/// to swallow the boot-time prompt; `ready` becomes true on the first
/// `CMD_END` and never reverts except via `reset`.
#[derive(Debug, Clone)]
pub struct CaptureState {
    pub capturing: bool,
    pub chunks: Vec<Vec<u8>>,
    pub cwd: String,
    pub skip_captures: u32,
    pub ready: bool,
}

pub const DEFAULT_CWD: &str = "/home/student";

impl CaptureState {
    pub fn initial() -> Self {
        Self {
            capturing: false,
            chunks: Vec::new(),
            cwd: DEFAULT_CWD.to_string(),
            skip_captures: 1,
            ready: false,
        }
    }
}

impl Default for CaptureState {
    fn default() -> Self {
        Self::initial()
    }
}
