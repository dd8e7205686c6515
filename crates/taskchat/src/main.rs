// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Taskchat - realtime chat between a task's owner and its assigned worker.
//!
//! This is the binary entry point: `serve` runs the gateway, `chat` is a
//! terminal client and `config` prints the effective configuration.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod chat;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use taskchat_config::TaskchatConfig;
use taskchat_config::model::REDACTED;
use taskchat_core::{ChatError, TaskId};

/// Taskchat - realtime chat scoped to a task.
#[derive(Parser, Debug)]
#[command(name = "taskchat", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true, env = "TASKCHAT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the chat gateway.
    Serve,
    /// Join a task's chat room from the terminal.
    Chat {
        /// Task whose room to join.
        #[arg(long)]
        task: TaskId,
        /// Bearer token issued by the identity service.
        #[arg(long, env = "TASKCHAT_TOKEN", hide_env_values = true)]
        token: String,
        /// WebSocket endpoint, overriding `client.url`.
        #[arg(long)]
        url: Option<String>,
    },
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => taskchat_config::load_and_validate_path(path),
        None => taskchat_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            taskchat_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            if let Err(errors) = taskchat_config::validate_for_serve(&config) {
                taskchat_config::render_errors(&errors);
                std::process::exit(1);
            }
            serve::run_serve(config).await
        }
        Some(Commands::Chat { task, token, url }) => chat::run_chat(config, task, &token, url).await,
        Some(Commands::Config) => render_config(&config).map(|toml| print!("{toml}")),
        None => {
            println!("taskchat: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

/// The configuration as TOML, with every secret replaced.
fn render_config(config: &TaskchatConfig) -> Result<String, ChatError> {
    let mut shown = config.clone();
    if shown.auth.jwt_secret.is_some() {
        shown.auth.jwt_secret = Some(REDACTED.to_string());
    }
    if shown.tasks.service_token.is_some() {
        shown.tasks.service_token = Some(REDACTED.to_string());
    }
    toml::to_string_pretty(&shown)
        .map_err(|e| ChatError::Internal(format!("failed to render config: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        // Only jemalloc supports advancing the stats epoch.
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn binary_loads_config_defaults() {
        let config = taskchat_config::load_and_validate_str("").unwrap();
        assert_eq!(config.server.port, 3001);
    }

    #[test]
    fn rendered_config_hides_secrets() {
        let config = taskchat_config::load_and_validate_str(
            r#"
[auth]
jwt_secret = "hunter2hunter2"

[tasks]
service_token = "svc-abc"
"#,
        )
        .unwrap();
        let rendered = render_config(&config).unwrap();
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("svc-abc"));
        assert!(rendered.contains(REDACTED));
        assert!(rendered.contains("[server]"));
    }

    #[test]
    fn chat_command_parses() {
        let cli = Cli::try_parse_from([
            "taskchat", "chat", "--task", "42", "--token", "t0k", "--url", "ws://x/ws",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Chat { task, token, url }) => {
                assert_eq!(task, 42);
                assert_eq!(token, "t0k");
                assert_eq!(url.as_deref(), Some("ws://x/ws"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
