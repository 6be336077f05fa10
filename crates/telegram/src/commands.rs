#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Task,
    Ask,
    Unknown(String),
}

impl BotCommand {
    pub fn name(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::Task => "task",
            Self::Ask => "ask",
            Self::Unknown(name) => name,
        }
    }
}

/// Parses `/name`, `/name@bot_username` and `/name args`; arguments are ignored.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let token = text.split_whitespace().next()?;
    let name = token.strip_prefix('/')?;
    let name = name.split_once('@').map_or(name, |(name, _bot)| name).to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }

    Some(match name.as_str() {
        "start" | "help" => BotCommand::Start,
        "task" => BotCommand::Task,
        "ask" => BotCommand::Ask,
        _ => BotCommand::Unknown(name),
    })
}
