//! Telegram front end for the task assistant.
//!
//! ```text
//! getUpdates → PollingRunner → ChatRouter → AssistantService
//!                                  ↓
//!                   sendMessage ← progress / result texts
//! ```
//!
//! - `updates` - Bot API update payloads and their classification
//! - `commands` - `/start`, `/task`, `/ask` parsing
//! - `messages` - every text the bot sends
//! - `router` - per-chat mode tracking and pipeline dispatch
//! - `transport` - long-poll transport trait and the HTTP implementation
//! - `polling` - offset acknowledgement and reconnect loop

pub mod commands;
pub mod messages;
pub mod polling;
pub mod router;
pub mod transport;
pub mod updates;

pub use commands::BotCommand;
pub use polling::{PollingRunner, ReconnectPolicy};
pub use router::{AssistantService, ChatMode, ChatRouter};
pub use transport::{BotTransport, TelegramHttpTransport, TransportError};
pub use updates::{BotEvent, Chat, IncomingMessage, Update};
