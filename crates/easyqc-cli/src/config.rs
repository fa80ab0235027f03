//! CLI configuration: the project registry and rating defaults.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use easyqc_table::JoinMode;

/// Name of the config file searched for in the current directory.
pub const LOCAL_CONFIG: &str = "easyqc.toml";

/// Top-level easyqc configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EasyqcConfig {
    /// Project used when a command is given `-` as the project name.
    #[serde(default)]
    pub default_project: Option<String>,
    /// Rater used when a command is given `-` as the rater.
    #[serde(default)]
    pub default_rater: Option<String>,
    /// Default join for `aggregate`.
    #[serde(default)]
    pub join: JoinMode,
    /// Project name → project directory.
    #[serde(default)]
    pub projects: BTreeMap<String, String>,
}

impl EasyqcConfig {
    /// Resolve `name` (or the default project for `-`) to its name and
    /// directory.
    pub fn project(&self, name: &str) -> Result<(String, PathBuf)> {
        let name = if name == "-" {
            self.default_project
                .clone()
                .context("no default_project configured")?
        } else {
            name.to_string()
        };
        let Some(dir) = self.projects.get(&name) else {
            anyhow::bail!(
                "unknown project '{}'. Run `easyqc init {} <dir>` to register it.",
                name,
                name
            );
        };
        Ok((name, PathBuf::from(resolve_env_vars(dir))))
    }

    /// Resolve `-` to the default rater.
    pub fn rater(&self, rater: &str) -> Result<String> {
        if rater != "-" {
            return Ok(rater.to_string());
        }
        self.default_rater
            .clone()
            .context("no default_rater configured (set it or EASYQC_RATER)")
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
/// Unset variables expand to nothing.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        result.push_str(&rest[..start]);
        let var_name = &rest[start + 2..start + end];
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config").join("easyqc"))
}

/// Where the config lives: the explicit path, `./easyqc.toml`, or
/// `~/.config/easyqc/config.toml`. The local file wins when neither exists.
pub fn config_location(path: Option<&Path>) -> PathBuf {
    if let Some(p) = path {
        return p.to_path_buf();
    }
    let local = PathBuf::from(LOCAL_CONFIG);
    if local.exists() {
        return local;
    }
    match dirs_path().map(|d| d.join("config.toml")) {
        Some(global) if global.exists() => global,
        _ => local,
    }
}

/// Load config from an explicit path, or search the default locations.
///
/// A missing file yields the defaults. `EASYQC_RATER` overrides
/// `default_rater`.
pub fn load_config_from(path: Option<&Path>) -> Result<EasyqcConfig> {
    let location = config_location(path);
    let mut config = if location.exists() {
        let content = std::fs::read_to_string(&location)
            .with_context(|| format!("failed to read config: {}", location.display()))?;
        toml::from_str::<EasyqcConfig>(&content)
            .with_context(|| format!("failed to parse config: {}", location.display()))?
    } else {
        tracing::debug!("no config at {}, using defaults", location.display());
        EasyqcConfig::default()
    };

    if let Ok(rater) = std::env::var("EASYQC_RATER") {
        if !rater.trim().is_empty() {
            config.default_rater = Some(rater);
        }
    }
    Ok(config)
}

/// Write `config` as TOML to `path`.
pub fn save_config(config: &EasyqcConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("failed to serialize config")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    tracing::debug!("saved config to {}", path.display());
    Ok(())
}
