//! # Configuration
//!
//! [`UiConfig`] is layered: built-in defaults, then an optional TOML file,
//! then `COORD_UI_*` environment variables, then command-line flags (applied
//! by the binary).
//!
//! ```toml
//! host = "127.0.0.1"
//! port = 8080
//! stack_size = "0x8000"   # or 32768
//! template_dir = "templates"
//! drain_timeout_ms = 5000
//! ```
//!
//! | Variable | Field |
//! |---|---|
//! | `COORD_UI_HOST` | `host` |
//! | `COORD_UI_PORT` | `port` |
//! | `COORD_UI_STACK_SIZE` | `stack_size`, decimal or `0x` hex |
//! | `COORD_UI_TEMPLATE_DIR` | `template_dir` |
//! | `COORD_UI_DRAIN_TIMEOUT_MS` | `drain_timeout_ms` |

use crate::error::{Result, UiError};
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_STACK_SIZE: usize = 0x8000;
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UiConfig {
    pub host: String,
    pub port: u16,
    /// Coroutine stack size in bytes.
    #[serde(deserialize_with = "deserialize_stack_size")]
    pub stack_size: usize,
    /// Load page templates from here instead of the embedded set.
    pub template_dir: Option<PathBuf>,
    /// Upper bound on waiting for in-flight requests during a blocking stop.
    pub drain_timeout_ms: u64,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            stack_size: DEFAULT_STACK_SIZE,
            template_dir: None,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
        }
    }
}

impl UiConfig {
    /// Defaults overlaid with the TOML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| UiError::Config(format!("{}: {}", path.display(), e.message())))
    }

    /// Overlay `COORD_UI_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        let vars: HashMap<String, String> = env::vars()
            .filter(|(k, _)| k.starts_with("COORD_UI_"))
            .collect();
        self.apply_vars(&vars)
    }

    /// Overlay variables from `vars`; unknown keys are ignored.
    pub fn apply_vars(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        if let Some(host) = vars.get("COORD_UI_HOST") {
            self.host = host.clone();
        }
        if let Some(port) = vars.get("COORD_UI_PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| UiError::Config(format!("COORD_UI_PORT: invalid port `{port}`")))?;
        }
        if let Some(size) = vars.get("COORD_UI_STACK_SIZE") {
            self.stack_size = parse_stack_size(size)
                .ok_or_else(|| UiError::Config(format!("COORD_UI_STACK_SIZE: invalid size `{size}`")))?;
        }
        if let Some(dir) = vars.get("COORD_UI_TEMPLATE_DIR") {
            self.template_dir = Some(PathBuf::from(dir));
        }
        if let Some(ms) = vars.get("COORD_UI_DRAIN_TIMEOUT_MS") {
            self.drain_timeout_ms = ms.trim().parse().map_err(|_| {
                UiError::Config(format!("COORD_UI_DRAIN_TIMEOUT_MS: invalid value `{ms}`"))
            })?;
        }
        Ok(())
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// `host:port` suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Decimal or `0x`-prefixed hexadecimal byte count.
pub fn parse_stack_size(val: &str) -> Option<usize> {
    let val = val.trim();
    let size = match val.strip_prefix("0x").or_else(|| val.strip_prefix("0X")) {
        Some(hex) => usize::from_str_radix(hex, 16).ok(),
        None => val.parse().ok(),
    };
    size.filter(|size| *size > 0)
}

fn deserialize_stack_size<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bytes(usize),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bytes(n) if n > 0 => Ok(n),
        Raw::Bytes(n) => Err(serde::de::Error::custom(format!("invalid stack size {n}"))),
        Raw::Text(s) => parse_stack_size(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid stack size `{s}`"))),
    }
}
