use anyhow::{Result, bail};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{Config, DispatchMode};
use crate::model::Message;
use crate::model_gateway::{CompletionGateway, CompletionRequest};
use crate::records::{Directory, Record};

pub const USER_NOT_FOUND: &str = "User not found";

/// Record field a trigger phrase resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Balance,
    LastTransaction,
    OpeningDate,
    CrossSell,
    Products,
    FullName,
}

impl Field {
    fn render(&self, record: &Record) -> String {
        match self {
            Self::Balance => format!("Your account balance is {}.", record.balance()),
            Self::LastTransaction => format!(
                "Your last transaction was on {}.",
                record.last_transaction.format("%Y-%m-%d")
            ),
            Self::OpeningDate => format!(
                "Your account was opened on {}.",
                record.opened_on.format("%Y-%m-%d")
            ),
            Self::CrossSell if record.cross_sell.is_empty() => {
                "There are no recommended products for you right now.".to_string()
            }
            Self::CrossSell => format!(
                "Products recommended for you: {}.",
                record.cross_sell.join(", ")
            ),
            Self::Products if record.products.is_empty() => {
                "You do not hold any products.".to_string()
            }
            Self::Products => format!("Your products: {}.", record.products.join(", ")),
            Self::FullName => format!("Your name on file is {}.", record.full_name()),
        }
    }
}

/// Ordered trigger table; the first phrase found in the input wins.
const TRIGGERS: &[(&str, Field)] = &[
    ("account balance", Field::Balance),
    ("my balance", Field::Balance),
    ("last transaction", Field::LastTransaction),
    ("opening date", Field::OpeningDate),
    ("account opened", Field::OpeningDate),
    ("open date", Field::OpeningDate),
    ("cross sell", Field::CrossSell),
    ("cross-sell", Field::CrossSell),
    ("recommend", Field::CrossSell),
    ("products", Field::Products),
    ("orders", Field::Products),
    ("my name", Field::FullName),
    ("full name", Field::FullName),
];

pub fn match_trigger(normalized_input: &str) -> Option<Field> {
    TRIGGERS
        .iter()
        .find(|(phrase, _)| normalized_input.contains(phrase))
        .map(|(_, field)| *field)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Lookup,
    NotFound,
    Completion,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

/// Routes each submission to the directory or the completion gateway and
/// records the exchange in the process-wide history.
pub struct Dispatcher {
    mode: DispatchMode,
    directory: Directory,
    gateway: Arc<dyn CompletionGateway>,
    system_messages: Vec<Message>,
    history_limit: Option<usize>,
    // Held across the completion call so turns never interleave.
    history: Mutex<Vec<Message>>,
}

impl Dispatcher {
    pub fn new(cfg: &Config, directory: Directory, gateway: Arc<dyn CompletionGateway>) -> Self {
        let system_messages = build_system_messages(cfg);
        Self {
            mode: cfg.dispatch_mode,
            directory,
            gateway,
            history: Mutex::new(system_messages.clone()),
            system_messages,
            history_limit: cfg.history_limit,
        }
    }

    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    pub async fn dispatch(&self, input: &str, username: &str) -> Result<Reply> {
        let normalized = input.trim().to_lowercase();
        if normalized.is_empty() {
            bail!("Message must not be empty");
        }

        let mut history = self.history.lock().await;
        let turn_start = history.len();
        match self.mode {
            DispatchMode::Lookup => {
                history.push(Message::user(normalized.clone()));
                if let Some(field) = match_trigger(&normalized) {
                    let reply = self.answer_from_directory(field, username);
                    history.push(Message::assistant(reply.text.clone()));
                    self.trim(&mut history, 0);
                    return Ok(reply);
                }
            }
            DispatchMode::Passthrough => {
                history.push(Message::user(normalized));
                let username = username.trim().to_lowercase();
                if !username.is_empty() {
                    history.push(Message::user(username));
                }
            }
        }

        let turn_len = history.len() - turn_start;
        self.trim(&mut history, turn_len);
        debug!(
            mode = self.mode.as_str(),
            message_count = history.len(),
            "forwarding history to completion gateway"
        );
        let response = self
            .gateway
            .complete(CompletionRequest {
                messages: history.clone(),
            })
            .await?;
        history.push(Message::assistant(response.content.clone()));
        self.trim(&mut history, 0);

        Ok(Reply {
            text: response.content,
            source: ReplySource::Completion,
        })
    }

    fn answer_from_directory(&self, field: Field, username: &str) -> Reply {
        match self.directory.lookup(username) {
            Some(record) => {
                info!(record_id = %record.id, field = ?field, "answered from record directory");
                Reply {
                    text: field.render(record),
                    source: ReplySource::Lookup,
                }
            }
            None => {
                info!(field = ?field, "trigger matched but username did not resolve");
                Reply {
                    text: USER_NOT_FOUND.to_string(),
                    source: ReplySource::NotFound,
                }
            }
        }
    }

    /// Keeps the system prompt plus the newest `history_limit` entries. The
    /// last `protected_tail` entries survive even when they exceed the limit.
    fn trim(&self, history: &mut Vec<Message>, protected_tail: usize) {
        let Some(limit) = self.history_limit else {
            return;
        };
        let keep_from = self.system_messages.len();
        let conversation_len = history.len().saturating_sub(keep_from);
        let excess = conversation_len
            .saturating_sub(limit)
            .min(conversation_len.saturating_sub(protected_tail));
        if excess > 0 {
            history.drain(keep_from..keep_from + excess);
        }
    }
}

fn build_system_messages(cfg: &Config) -> Vec<Message> {
    if cfg.system_prompt.trim().is_empty() {
        return Vec::new();
    }
    vec![Message::system(cfg.system_prompt.clone())]
}
