use clap::Parser;
use legalx::cli::handle_ask_command;
use legalx::cli::handle_chat_command;
use legalx::cli::handle_config_command;
use legalx::cli::Cli;
use legalx::cli::Commands;
use legalx::cli::DisplayArgs;
use legalx::AppConfig;
use legalx::GenerateClient;
use legalx::Result;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint {
        config.backend.endpoint = endpoint;
        config.validate()?;
    }

    // Initialize logging
    let _log_guard = legalx::logging::init_logging_with_config(Some(&config), cli.verbose)?;
    info!("Configuration loaded successfully");

    // Execute the requested command
    let command = cli.command.unwrap_or(Commands::Chat {
        display: DisplayArgs::default(),
    });
    match command {
        Commands::Config => {
            handle_config_command(&config);
        }
        Commands::Ask { prompt, display } => {
            display.apply(&mut config);
            let client = GenerateClient::new(&config)?;
            handle_ask_command(&config, &client, &prompt.join(" ")).await?;
        }
        Commands::Chat { display } => {
            display.apply(&mut config);
            let client = GenerateClient::new(&config)?;
            handle_chat_command(&config, &client).await?;
        }
    }

    Ok(())
}
