pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "taskpilot",
    about = "Taskpilot operator CLI",
    long_about = "Inspect configuration, prepare the SOP knowledge index, and exercise the task and question pipelines.",
    after_help = "Examples:\n  taskpilot doctor --json\n  taskpilot index --reload\n  taskpilot ask \"Which card should I use for laptop purchases?\"\n  taskpilot task \"Buy MacBook for new developer, urgent\""
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, knowledge source readability, and vector store connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Apply pending vector store migrations and return structured status output")]
    Migrate,
    #[command(about = "Index the SOP knowledge source and report the chunk count")]
    Index {
        #[arg(long, help = "Drop the collection before indexing")]
        reload: bool,
    },
    #[command(about = "Answer a question from the SOP knowledge base")]
    Ask {
        #[arg(required = true, help = "Question text")]
        question: Vec<String>,
    },
    #[command(about = "Create an SOP-enriched task from a free-text request")]
    Task {
        #[arg(required = true, help = "Task request text")]
        text: Vec<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Migrate => commands::migrate::run(),
        Command::Index { reload } => commands::index::run(reload),
        Command::Ask { question } => commands::ask::run(&question.join(" ")),
        Command::Task { text } => commands::task::run(&text.join(" ")),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
