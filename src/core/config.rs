/*!
 * Pool Configuration
 *
 * Runtime configuration for the lifecycle manager, the IPC layer and the job loader
 */

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_MAX_CHILDREN: usize = 4;
pub const DEFAULT_IPC_BASE_KEY: i32 = 0x5050_0000;
pub const DEFAULT_KEY_SEARCH_LIMIT: u32 = 4096;
pub const DEFAULT_LINE_WIDTH: usize = 256;
pub const DEFAULT_MAX_LINES: usize = 1024;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What the job loader does when the input has more than `max_lines` lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Spread the lines over several segments linked by key
    #[default]
    Chain,
    /// Keep the first `max_lines` lines and drop the rest
    Truncate,
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chain" | "split" => Ok(OverflowPolicy::Chain),
            "truncate" => Ok(OverflowPolicy::Truncate),
            other => Err(format!("unknown overflow policy '{}'", other)),
        }
    }
}

/// Settings for reaping and bulk termination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapConfig {
    /// Sleep between polls in bounded waits
    pub poll_interval: Duration,
    /// Signal sent by `kill_all`
    pub termination_signal: Signal,
}

impl Default for ReapConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            termination_signal: Signal::SIGTERM,
        }
    }
}

/// Settings for kernel object creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcConfig {
    /// First key tried when creating a new object
    pub base_key: i32,
    /// How many consecutive keys to try before giving up
    pub search_limit: u32,
    /// Permission bits for created objects
    pub mode: i32,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            base_key: DEFAULT_IPC_BASE_KEY,
            search_limit: DEFAULT_KEY_SEARCH_LIMIT,
            mode: 0o600,
        }
    }
}

impl IpcConfig {
    pub fn with_base_key(mut self, base_key: i32) -> Self {
        self.base_key = base_key;
        self
    }
}

/// Top-level pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_children: usize,
    pub line_width: usize,
    pub max_lines: usize,
    pub overflow: OverflowPolicy,
    pub ipc: IpcConfig,
    pub reap: ReapConfig,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_children: DEFAULT_MAX_CHILDREN,
            line_width: DEFAULT_LINE_WIDTH,
            max_lines: DEFAULT_MAX_LINES,
            overflow: OverflowPolicy::default(),
            ipc: IpcConfig::default(),
            reap: ReapConfig::default(),
        }
    }
}

impl PoolConfig {
    /// Defaults overridden by `PROCPOOL_*` environment variables
    ///
    /// Environment variables:
    /// - PROCPOOL_MAX_CHILDREN
    /// - PROCPOOL_IPC_BASE_KEY (decimal or 0x-prefixed hex)
    /// - PROCPOOL_LINE_WIDTH
    /// - PROCPOOL_MAX_LINES
    /// - PROCPOOL_OVERFLOW (chain | truncate)
    /// - PROCPOOL_POLL_MS
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`PoolConfig::from_env`] with a custom variable source
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(n) = parse_var(&lookup, "PROCPOOL_MAX_CHILDREN", |v| v.parse::<usize>().ok()) {
            config.max_children = n.max(1);
        }
        if let Some(key) = parse_var(&lookup, "PROCPOOL_IPC_BASE_KEY", parse_key) {
            config.ipc.base_key = key;
        }
        if let Some(width) = parse_var(&lookup, "PROCPOOL_LINE_WIDTH", |v| v.parse::<usize>().ok()) {
            config.line_width = width;
        }
        if let Some(lines) = parse_var(&lookup, "PROCPOOL_MAX_LINES", |v| v.parse::<usize>().ok()) {
            config.max_lines = lines;
        }
        if let Some(policy) = parse_var(&lookup, "PROCPOOL_OVERFLOW", |v| v.parse().ok()) {
            config.overflow = policy;
        }
        if let Some(ms) = parse_var(&lookup, "PROCPOOL_POLL_MS", |v| v.parse::<u64>().ok()) {
            config.reap.poll_interval = Duration::from_millis(ms);
        }

        config
    }

    pub fn with_max_children(mut self, max_children: usize) -> Self {
        self.max_children = max_children.max(1);
        self
    }

    pub fn with_max_lines(mut self, max_lines: usize) -> Self {
        self.max_lines = max_lines;
        self
    }

    pub fn with_line_width(mut self, line_width: usize) -> Self {
        self.line_width = line_width;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn with_ipc_base_key(mut self, base_key: i32) -> Self {
        self.ipc.base_key = base_key;
        self
    }
}

fn parse_var<F, T, P>(lookup: &F, name: &str, parse: P) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    let raw = lookup(name)?;
    let parsed = parse(raw.trim());
    if parsed.is_none() {
        warn!(var = name, value = %raw, "Ignoring invalid configuration value");
    }
    parsed
}

/// Parse a key given in decimal or `0x` hex
pub fn parse_key(raw: &str) -> Option<i32> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => i32::from_str_radix(hex, 16).ok(),
        None => raw.parse::<i32>().ok(),
    };
    parsed.filter(|key| *key > 0)
}
