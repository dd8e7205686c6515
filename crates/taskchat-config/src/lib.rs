// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for Taskchat.
//!
//! `taskchat.toml` is parsed strictly (`deny_unknown_fields`), layered with
//! figment and checked semantically. Every failure comes back as a
//! [`ConfigError`] that points into the file it came from.
//!
//! ```no_run
//! let config = taskchat_config::load_and_validate().unwrap_or_else(|errors| {
//!     taskchat_config::render_errors(&errors);
//!     std::process::exit(2);
//! });
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::{Path, PathBuf};

pub use diagnostic::{ConfigError, ConfigSource, render_errors, render_report};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::TaskchatConfig;
pub use validation::validate_for_serve;

/// Loads the file hierarchy plus environment overrides and validates it.
pub fn load_and_validate() -> Result<TaskchatConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || read_sources(&loader::config_paths()))
}

/// Loads one explicit file plus environment overrides and validates it.
pub fn load_and_validate_path(path: &Path) -> Result<TaskchatConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        read_sources(&[path.to_path_buf()])
    })
}

pub fn load_and_validate_str(toml_content: &str) -> Result<TaskchatConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![ConfigSource::new("<inline>", toml_content)]
    })
}

/// Turns an extraction result into a validated config. Sources are only
/// read when there is an error to point into.
fn finish(
    extracted: Result<TaskchatConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<ConfigSource>,
) -> Result<TaskchatConfig, Vec<ConfigError>> {
    let errors = match extracted {
        Ok(config) => match validation::validate_config(&config) {
            Ok(()) => return Ok(config),
            Err(errors) => diagnostic::locate_all(errors, &sources()),
        },
        Err(err) => diagnostic::from_figment(err, &sources()),
    };
    Err(errors)
}

fn read_sources(paths: &[PathBuf]) -> Vec<ConfigSource> {
    paths
        .iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            Some(ConfigSource::new(path.display().to_string(), content))
        })
        .collect()
}
