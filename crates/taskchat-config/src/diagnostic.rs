// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config diagnostics: figment failures and validation errors become miette
//! reports pointing at the offending line of `taskchat.toml`.
//!
//! Unknown keys are matched against [`SECTION_KEYS`], so a typo in `[chat]`
//! is only compared with chat keys, and a key placed in the wrong section is
//! pointed at the section that owns it.

#![allow(unused_assignments)] // miette's Diagnostic derive trips this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Every section of `taskchat.toml` with the keys it accepts.
pub const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("service", &["name", "log_level"]),
    (
        "server",
        &[
            "host",
            "port",
            "cors_origin",
            "rate_limit_requests",
            "rate_limit_window_secs",
        ],
    ),
    ("auth", &["jwt_secret", "jwt_issuer", "validate_url", "timeout_secs"]),
    ("tasks", &["base_url", "service_token", "timeout_secs"]),
    ("storage", &["database_path", "wal_mode"]),
    (
        "chat",
        &[
            "max_message_chars",
            "backlog_limit",
            "default_page_size",
            "max_page_size",
            "typing_timeout_ms",
        ],
    ),
    ("presence", &["reap_interval_secs", "stale_after_hours"]),
    (
        "client",
        &[
            "url",
            "handshake_timeout_secs",
            "max_reconnect_attempts",
            "reconnect_delay_ms",
        ],
    ),
];

const SUGGESTION_THRESHOLD: f64 = 0.8;

/// One config file's text, kept so errors can quote it.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub name: String,
    pub content: String,
}

impl ConfigSource {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    fn named(&self) -> NamedSource<String> {
        NamedSource::new(&self.name, self.content.clone())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown key `{key}` in {location}")]
    #[diagnostic(code(taskchat::config::unknown_key), help("{help}"))]
    UnknownKey {
        key: String,
        /// `[section]`, or `the top level`.
        location: String,
        suggestion: Option<String>,
        help: String,
        #[label("not a taskchat setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` expects {expected}, found {found}")]
    #[diagnostic(code(taskchat::config::invalid_type))]
    InvalidType {
        key: String,
        found: String,
        expected: String,
        #[label("wrong type")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value that parsed but is out of range or malformed.
    #[error("invalid `{key}`: {message}")]
    #[diagnostic(code(taskchat::config::invalid_value))]
    InvalidValue {
        /// Dotted path, e.g. `chat.max_page_size`.
        key: String,
        message: String,
        #[label("set here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// Something `taskchat serve` needs that the config leaves unset.
    #[error("{message}")]
    #[diagnostic(code(taskchat::config::missing_setting), help("{help}"))]
    MissingSetting { message: String, help: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(taskchat::config::other))]
    Other(String),
}

impl ConfigError {
    /// Value error without a location; see [`locate_all`].
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.into(),
            message: message.into(),
            span: None,
            src: None,
        }
    }
}

/// Keys accepted by `section`.
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SECTION_KEYS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// The section that owns `key`, if any does.
pub fn home_section(key: &str) -> Option<&'static str> {
    SECTION_KEYS
        .iter()
        .find(|(_, keys)| keys.iter().any(|k| *k == key))
        .map(|(name, _)| *name)
}

/// Closest candidate by Jaro-Winkler similarity, if it is close enough.
pub fn suggest(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|c| (strsim::jaro_winkler(unknown, c), *c))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, c)| c.to_string())
}

/// Converts a figment failure into one diagnostic per underlying error.
pub fn from_figment(err: figment::Error, sources: &[ConfigSource]) -> Vec<ConfigError> {
    use figment::error::Kind;

    err.into_iter()
        .map(|error| {
            let source = pick_source(&error, sources);
            match &error.kind {
                Kind::UnknownField(key, _) => {
                    let section = error
                        .path
                        .iter()
                        .map(String::as_str)
                        .find(|s| *s != key.as_str() && section_keys(s).is_some());
                    unknown_key(key, section, source)
                }
                Kind::InvalidType(found, expected) => {
                    let (span, src) = locate_path(&error.path, source);
                    ConfigError::InvalidType {
                        key: error.path.join("."),
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                Kind::InvalidValue(found, expected) => {
                    let (span, src) = locate_path(&error.path, source);
                    ConfigError::InvalidValue {
                        key: error.path.join("."),
                        message: format!("expected {expected}, found {found}"),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn unknown_key(key: &str, section: Option<&str>, source: Option<&ConfigSource>) -> ConfigError {
    let (location, suggestion, help) = match section {
        Some(section) => {
            let keys = section_keys(section).unwrap_or_default();
            let suggestion = suggest(key, keys);
            let help = match (&suggestion, home_section(key)) {
                (Some(s), _) => format!("did you mean `{s}`? [{section}] accepts: {}", keys.join(", ")),
                (None, Some(home)) => format!("`{key}` belongs in [{home}]"),
                (None, None) => format!("[{section}] accepts: {}", keys.join(", ")),
            };
            (format!("[{section}]"), suggestion, help)
        }
        None => {
            let sections: Vec<&str> = SECTION_KEYS.iter().map(|(name, _)| *name).collect();
            let suggestion = suggest(key, &sections);
            let help = match (&suggestion, home_section(key)) {
                (_, Some(home)) => format!("`{key}` belongs in [{home}]"),
                (Some(s), None) => format!("did you mean [{s}]?"),
                (None, None) => format!("known sections: {}", sections.join(", ")),
            };
            ("the top level".to_string(), suggestion, help)
        }
    };

    let located = source.and_then(|s| locate_key(&s.content, section, key).map(|span| (span, s.named())));
    ConfigError::UnknownKey {
        key: key.to_string(),
        location,
        suggestion,
        help,
        span: located.as_ref().map(|(span, _)| *span),
        src: located.map(|(_, src)| src),
    }
}

/// The source a figment error came from: the file named in its metadata,
/// or the only source when there is just one.
fn pick_source<'a>(error: &figment::Error, sources: &'a [ConfigSource]) -> Option<&'a ConfigSource> {
    let file = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });
    let only = sources.first().filter(|_| sources.len() == 1);
    match file {
        Some(file) => sources.iter().find(|s| s.name == file).or(only),
        None => only,
    }
}

fn locate_path(
    path: &[String],
    source: Option<&ConfigSource>,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let (section, key) = match path {
        [section, key] => (Some(section.as_str()), key.as_str()),
        [key] => (None, key.as_str()),
        _ => return (None, None),
    };
    source
        .and_then(|s| locate_key(&s.content, section, key).map(|span| (Some(span), Some(s.named()))))
        .unwrap_or((None, None))
}

/// Finds `key` inside `[section]` (or before the first header when
/// `section` is `None`). At the top level a matching `[key]` header counts
/// too, so unknown sections can be pointed at.
pub fn locate_key(content: &str, section: Option<&str>, key: &str) -> Option<SourceSpan> {
    let mut current: Option<&str> = None;
    let mut offset = 0;

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Some(header) = trimmed.strip_prefix('[') {
            let name = header.split(']').next().unwrap_or_default().trim();
            if section.is_none() && name == key {
                let at = offset + indent + 1 + (header.len() - header.trim_start().len());
                return Some(SourceSpan::new(at.into(), key.len()));
            }
            current = Some(name);
        } else if current == section {
            let is_key = trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='));
            if is_key {
                return Some(SourceSpan::new((offset + indent).into(), key.len()));
            }
        }
        offset += line.len();
    }
    None
}

/// Attaches a location to value errors from semantic validation. Later
/// sources win, matching the merge order.
pub fn locate_all(errors: Vec<ConfigError>, sources: &[ConfigSource]) -> Vec<ConfigError> {
    errors
        .into_iter()
        .map(|error| match error {
            ConfigError::InvalidValue {
                key,
                message,
                span: None,
                src: None,
            } => {
                let (section, field) = match key.split_once('.') {
                    Some((section, field)) => (Some(section), field),
                    None => (None, key.as_str()),
                };
                let found = sources.iter().rev().find_map(|s| {
                    locate_key(&s.content, section, field).map(|span| (span, s.named()))
                });
                let (span, src) = match found {
                    Some((span, src)) => (Some(span), Some(src)),
                    None => (None, None),
                };
                ConfigError::InvalidValue {
                    key,
                    message,
                    span,
                    src,
                }
            }
            other => other,
        })
        .collect()
}

/// Renders every error with miette's graphical handler.
pub fn render_report(errors: &[ConfigError]) -> String {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            out.push_str(&format!("Error: {error}\n"));
        }
    }
    out
}

pub fn render_errors(errors: &[ConfigError]) {
    eprint!("{}", render_report(errors));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_config_from_str;
    use figment::error::Kind;

    fn expected_keys(toml: &str) -> Vec<&'static str> {
        let err = load_config_from_str(toml).unwrap_err();
        err.into_iter()
            .find_map(|e| match e.kind {
                Kind::UnknownField(_, expected) => Some(expected.to_vec()),
                _ => None,
            })
            .expect("unknown field error")
    }

    #[test]
    fn section_keys_match_the_config_model() {
        for (section, keys) in SECTION_KEYS {
            let expected = expected_keys(&format!("[{section}]\nzz_not_a_key = 1\n"));
            assert_eq!(expected, keys.to_vec(), "keys of [{section}]");
        }
        let sections: Vec<&str> = SECTION_KEYS.iter().map(|(name, _)| *name).collect();
        assert_eq!(expected_keys("zz_not_a_key = 1\n"), sections);
    }

    #[test]
    fn suggestions_stay_inside_the_section() {
        assert_eq!(suggest("prot", section_keys("server").unwrap()), Some("port".into()));
        assert_eq!(suggest("prot", section_keys("chat").unwrap()), None);
        assert_eq!(suggest("zzzzzz", section_keys("server").unwrap()), None);
    }

    #[test]
    fn misplaced_key_points_at_its_section() {
        assert_eq!(home_section("backlog_limit"), Some("chat"));
        assert_eq!(home_section("nope"), None);

        let source = ConfigSource::new("taskchat.toml", "[server]\nbacklog_limit = 5\n");
        match unknown_key("backlog_limit", Some("server"), Some(&source)) {
            ConfigError::UnknownKey { help, span, .. } => {
                assert_eq!(help, "`backlog_limit` belongs in [chat]");
                assert_eq!(span.map(|s| s.offset()), Some(9));
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
    }

    #[test]
    fn locate_key_respects_section_boundaries() {
        let content = "port = 1\n\n[server]\nhost = \"x\"\nport = 2\n\n[chat]\nport = 3\n";
        let at = |section, key| locate_key(content, section, key).map(|s| s.offset());

        let server_port = content.find("port = 2").unwrap();
        let chat_port = content.find("port = 3").unwrap();
        assert_eq!(at(Some("server"), "port"), Some(server_port));
        assert_eq!(at(Some("chat"), "port"), Some(chat_port));
        assert_eq!(at(None, "port"), Some(0));
        assert_eq!(at(Some("storage"), "port"), None);
    }

    #[test]
    fn locate_key_needs_an_assignment_and_finds_headers() {
        let content = "[client]\nurl_extra = 1\nurl=\"ws://x\"\n[telegram]\n";
        let url = content.find("url=").unwrap();
        assert_eq!(locate_key(content, Some("client"), "url").map(|s| s.offset()), Some(url));

        let header = content.find("telegram").unwrap();
        assert_eq!(locate_key(content, None, "telegram").map(|s| s.offset()), Some(header));
    }

    #[test]
    fn value_errors_get_located_in_the_winning_source() {
        let sources = [
            ConfigSource::new("/etc/taskchat/taskchat.toml", "[chat]\nbacklog_limit = 0\n"),
            ConfigSource::new("taskchat.toml", "[service]\nname = \"x\"\n[chat]\nbacklog_limit = 0\n"),
        ];
        let errors = locate_all(
            vec![ConfigError::invalid_value("chat.backlog_limit", "must be greater than 0")],
            &sources,
        );
        match &errors[0] {
            ConfigError::InvalidValue { span, src, .. } => {
                assert!(span.is_some());
                assert_eq!(src.as_ref().map(|s| s.name()), Some("taskchat.toml"));
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
        let report = render_report(&errors);
        assert!(report.contains("chat.backlog_limit"), "report was: {report}");
    }
}
