use serde::Deserialize;

use crate::commands::{parse_command, BotCommand};

/// Subset of the Bot API `Update` object the assistant consumes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotEvent {
    Command { chat_id: i64, command: BotCommand },
    Text { chat_id: i64, text: String },
    Unsupported,
}

impl BotEvent {
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Command { chat_id, .. } | Self::Text { chat_id, .. } => Some(*chat_id),
            Self::Unsupported => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Text { .. } => "text",
            Self::Unsupported => "unsupported",
        }
    }
}

impl Update {
    pub fn chat_id(&self) -> Option<i64> {
        self.message.as_ref().map(|message| message.chat.id)
    }

    /// Messages without text (stickers, photos, joins) are unsupported.
    pub fn classify(&self) -> BotEvent {
        let Some(message) = &self.message else {
            return BotEvent::Unsupported;
        };
        let Some(text) = message.text.as_deref().map(str::trim).filter(|text| !text.is_empty())
        else {
            return BotEvent::Unsupported;
        };

        match parse_command(text) {
            Some(command) => BotEvent::Command { chat_id: message.chat.id, command },
            None => BotEvent::Text { chat_id: message.chat.id, text: text.to_owned() },
        }
    }
}
