// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered config loading with figment.
//!
//! Files from [`config_paths`] merge over the compiled defaults, lowest
//! precedence first, with `TASKCHAT_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::diagnostic::SECTION_KEYS;
use crate::model::TaskchatConfig;

const FILE_NAME: &str = "taskchat.toml";

/// Config files in merge order: `/etc/taskchat`, the user config dir, then
/// the working directory. Missing files are skipped when loading.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![Path::new("/etc/taskchat").join(FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("taskchat").join(FILE_NAME));
    }
    paths.push(
        std::env::current_dir()
            .map(|dir| dir.join(FILE_NAME))
            .unwrap_or_else(|_| PathBuf::from(FILE_NAME)),
    );
    paths
}

/// Load configuration from [`config_paths`] with env var overrides.
pub fn load_config() -> Result<TaskchatConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<TaskchatConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TaskchatConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TaskchatConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TaskchatConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    config_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(TaskchatConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `TASKCHAT_AUTH_JWT_SECRET` must become `auth.jwt_secret`.
fn env_provider() -> Env {
    Env::prefixed("TASKCHAT_").map(|key| env_key_to_path(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env key onto its dotted config path.
pub fn env_key_to_path(key: &str) -> String {
    for &(section, _) in SECTION_KEYS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
