//! CLI command definitions and argument parsing

use std::path::PathBuf;

use clap::Args;
use clap::Parser;
use clap::Subcommand;

#[derive(Parser)]
#[command(name = "legalx")]
#[command(about = "LegalX law chatbot: ask legal questions and watch the answer stream in")]
#[command(version)]
pub struct Cli {
    /// Enable verbose debug logging (default: info level, file only)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a TOML config file (default: ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the backend endpoint, e.g. http://127.0.0.1:8000
    #[arg(long, global = true)]
    pub endpoint: Option<String>,

    /// Defaults to `chat` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session
    Chat {
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Ask a single question and exit
    Ask {
        /// The question to send
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        #[command(flatten)]
        display: DisplayArgs,
    },
    /// Show current configuration
    Config,
}

#[derive(Args, Clone, Copy, Default)]
pub struct DisplayArgs {
    /// Do not print the model's reasoning
    #[arg(long)]
    pub hide_reasoning: bool,

    /// Print the retrieved legal passages under each answer
    #[arg(long)]
    pub sources: bool,
}

impl DisplayArgs {
    /// Apply the flags on top of the configured display settings
    pub fn apply(self, config: &mut crate::AppConfig) {
        if self.hide_reasoning {
            config.display.show_reasoning = false;
        }
        if self.sources {
            config.display.show_sources = true;
        }
    }
}
