use anyhow::Result;
use serde::Deserialize;

/// Process-wide configuration for the Shell Session Controller.
///
/// Everything here is overridable so that tests and embedders can shrink
/// the timing constants; the defaults match the values named in the
/// controller's specification.
#[derive(Debug, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub timing: TimingConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sandbox: SandboxConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_sandbox_root")]
    pub root: String,
    #[serde(default = "default_dangerous_commands")]
    pub dangerous_commands: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            root: default_sandbox_root(),
            dangerous_commands: default_dangerous_commands(),
        }
    }
}

fn default_sandbox_root() -> String {
    "/home/student".to_string()
}

fn default_dangerous_commands() -> Vec<String> {
    ["sudo", "su", "chroot", "mount", "umount", "fdisk", "parted"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_byte_coalesce_ms")]
    pub byte_coalesce_ms: u64,
    #[serde(default = "default_partial_sentinel_ms")]
    pub partial_sentinel_ms: u64,
    #[serde(default = "default_system_message_flush_ms")]
    pub system_message_flush_ms: u64,
    #[serde(default = "default_seed_drain_ms")]
    pub seed_drain_ms: u64,
    #[serde(default = "default_seed_drain_git_ms")]
    pub seed_drain_git_ms: u64,
    #[serde(default = "default_post_validation_drain_ms")]
    pub post_validation_drain_ms: u64,
    #[serde(default = "default_boot_timeout_secs")]
    pub boot_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            byte_coalesce_ms: default_byte_coalesce_ms(),
            partial_sentinel_ms: default_partial_sentinel_ms(),
            system_message_flush_ms: default_system_message_flush_ms(),
            seed_drain_ms: default_seed_drain_ms(),
            seed_drain_git_ms: default_seed_drain_git_ms(),
            post_validation_drain_ms: default_post_validation_drain_ms(),
            boot_timeout_secs: default_boot_timeout_secs(),
        }
    }
}

fn default_byte_coalesce_ms() -> u64 {
    4
}
fn default_partial_sentinel_ms() -> u64 {
    50
}
fn default_system_message_flush_ms() -> u64 {
    8
}
fn default_seed_drain_ms() -> u64 {
    800
}
fn default_seed_drain_git_ms() -> u64 {
    3000
}
fn default_post_validation_drain_ms() -> u64 {
    600
}
fn default_boot_timeout_secs() -> u64 {
    120
}

/// Loads config from `SHELLTUTOR_CONFIG`, falling back to
/// `$XDG_CONFIG_HOME/shelltutor/config.toml`, falling back to defaults.
pub fn load_config() -> Result<ControllerConfig> {
    let path = std::env::var("SHELLTUTOR_CONFIG")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::config_dir()
                .unwrap_or_else(|| std::path::PathBuf::from("/etc"))
                .join("shelltutor/config.toml")
        });
    if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    } else {
        Ok(ControllerConfig::default())
    }
}
