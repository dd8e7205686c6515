// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `taskchat chat` command: a line-oriented terminal client for one task room.
//!
//! Lines are sent as messages. `/read` marks everything received so far as
//! read, `/reconnect` reopens the socket after the client gave up, and
//! `/quit` or `/exit` leaves.

use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use taskchat_client::{ChatClient, ClientSettings};
use taskchat_config::TaskchatConfig;
use taskchat_core::{ChatError, ChatEvent, EventKind, Message, MessageType, TaskId, UserId};

/// What the handlers learn about the room, shared with the input loop.
#[derive(Debug, Default)]
struct ChatView {
    room_id: Option<String>,
    me: Option<UserId>,
    unread: Vec<String>,
}

impl ChatView {
    fn remember(&mut self, message: &Message) {
        if Some(message.sender_id) != self.me && !message.is_read {
            self.unread.push(message.id.clone());
        }
    }
}

type SharedView = Arc<Mutex<ChatView>>;

fn with_view<T>(view: &SharedView, f: impl FnOnce(&mut ChatView) -> T) -> T {
    let mut guard = view.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Runs the interactive chat against `url` or the configured endpoint.
pub async fn run_chat(
    config: TaskchatConfig,
    task_id: TaskId,
    token: &str,
    url: Option<String>,
) -> Result<(), ChatError> {
    let mut settings = ClientSettings::from(&config.client);
    if let Some(url) = url {
        settings.url = url;
    }

    let client = ChatClient::new(settings);
    let view: SharedView = Arc::new(Mutex::new(ChatView::default()));
    register_printers(&client, &view);

    client.connect(token).await?;
    client.join_task_room(task_id)?;

    let (tx, mut lines) = mpsc::channel::<String>(16);
    let reader = tokio::task::spawn_blocking(move || read_lines(tx));

    while let Some(line) = lines.recv().await {
        let result = match line.as_str() {
            "/quit" | "/exit" => break,
            "/read" => mark_all_read(&client, &view),
            "/reconnect" => match client.reconnect(token).await {
                Ok(()) => client.join_task_room(task_id),
                Err(e) => Err(e),
            },
            text => {
                let result = client.send_message(task_id, text, MessageType::Text);
                if result.is_ok() {
                    let _ = client.send_stop_typing(task_id);
                }
                result
            }
        };
        if let Err(e) = result {
            eprintln!("{}: {e}", "error".red());
        }
    }

    client.disconnect().await;
    drop(lines);
    let _ = reader.await;
    println!("{}", "goodbye".dimmed());
    Ok(())
}

fn mark_all_read(client: &ChatClient, view: &SharedView) -> Result<(), ChatError> {
    let (room_id, ids) = with_view(view, |v| (v.room_id.clone(), std::mem::take(&mut v.unread)));
    match room_id {
        Some(room_id) => client.mark_messages_read(&room_id, ids),
        None => Err(ChatError::Validation("no room joined yet".into())),
    }
}

/// Blocking prompt loop, run on the blocking pool.
fn read_lines(tx: mpsc::Sender<String>) {
    let mut rl = match DefaultEditor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("{}: failed to start line editor: {e}", "error".red());
            return;
        }
    };
    let prompt = format!("{} ", "taskchat>".green());

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);
                let leaving = line == "/quit" || line == "/exit";
                if tx.blocking_send(line).is_err() || leaving {
                    break;
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                let _ = tx.blocking_send("/quit".to_string());
                break;
            }
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                let _ = tx.blocking_send("/quit".to_string());
                break;
            }
        }
    }
}

fn register_printers(client: &ChatClient, view: &SharedView) {
    let v = Arc::clone(view);
    client.on(EventKind::Connected, move |event| {
        if let ChatEvent::Connected { user_id, .. } = event {
            with_view(&v, |view| view.me = Some(*user_id));
            println!("{} as user {user_id}", "connected".green());
        }
    });

    let v = Arc::clone(view);
    client.on(EventKind::RoomJoined, move |event| {
        if let ChatEvent::RoomJoined { room, messages } = event {
            println!(
                "{} {} with {}",
                "joined".green(),
                room.room.task_title.as_deref().unwrap_or("task room").bold(),
                room.other_user.email
            );
            // Backlog arrives newest first.
            for message in messages.iter().rev() {
                print_message(message);
            }
            with_view(&v, |view| {
                view.room_id = Some(room.room.id.clone());
                view.unread.clear();
                for message in messages {
                    view.remember(message);
                }
            });
        }
    });

    let v = Arc::clone(view);
    client.on(EventKind::NewMessage, move |event| {
        if let ChatEvent::NewMessage(message) = event {
            print_message(message);
            with_view(&v, |view| view.remember(message));
        }
    });

    client.on(EventKind::UserTyping, |event| {
        if let ChatEvent::UserTyping { user_id, is_typing: true } = event {
            println!("{}", format!("user {user_id} is typing...").dimmed());
        }
    });

    client.on(EventKind::MessagesRead, |event| {
        if let ChatEvent::MessagesRead { unread_count, .. } = event {
            println!("{}", format!("{unread_count} unread").dimmed());
        }
    });

    client.on(EventKind::Error, |event| {
        if let ChatEvent::Error { message, .. } = event {
            eprintln!("{}: {message}", "error".red());
        }
    });

    client.on(EventKind::Disconnected, |event| {
        if let ChatEvent::Disconnected { reason } = event {
            println!("{} ({reason})", "disconnected".yellow());
        }
    });
}

fn print_message(message: &Message) {
    let stamp = message.created_at.format("%H:%M");
    println!(
        "[{stamp}] {} ({}): {}",
        message.sender_name.cyan(),
        message.sender_role,
        message.message
    );
}
