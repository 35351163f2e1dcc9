//! CLI command handlers

use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tracing::debug;
use tracing::info;

use crate::cli::output::*;
use crate::client::GenerateClient;
use crate::conversation::ConversationEntry;
use crate::session::ChatSession;
use crate::session::FrameSource;
use crate::session::SubmitOutcome;
use crate::AppConfig;
use crate::Result;

/// Handle `chat`: read prompts from stdin until EOF
pub async fn handle_chat_command(config: &AppConfig, client: &GenerateClient) -> Result<()> {
    print_banner();
    info!("Chat session started against {}", client.url());

    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print_prompt();
        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        run_turn(config, client, &mut session, &line).await?;
    }

    info!(
        "Chat session ended with {} entries",
        session.conversation().len()
    );
    Ok(())
}

/// Handle `ask`: a single prompt, rendered, then exit
pub async fn handle_ask_command(
    config: &AppConfig,
    client: &GenerateClient,
    prompt: &str,
) -> Result<()> {
    let mut session = ChatSession::new();
    match run_turn(config, client, &mut session, prompt).await? {
        SubmitOutcome::Ignored => print_warning("Nothing to ask: the prompt is empty."),
        SubmitOutcome::Cleared => print_info("Nothing to clear outside of a chat session."),
        SubmitOutcome::Completed { .. } | SubmitOutcome::Failed { .. } => {}
    }
    Ok(())
}

/// Handle `config`
pub fn handle_config_command(config: &AppConfig) {
    print_config(config);
}

/// Submit one line of input and render the outcome
pub async fn run_turn<S>(
    config: &AppConfig,
    source: &S,
    session: &mut ChatSession,
    input: &str,
) -> Result<SubmitOutcome>
where
    S: FrameSource + ?Sized,
{
    let mut printer = TurnPrinter::from_config(config).with_spinner();
    let mut stdout = std::io::stdout();

    let outcome = session
        .submit(source, input, |entry| {
            if let Err(e) = printer.update(&mut stdout, entry) {
                debug!("Failed to render update: {}", e);
            }
        })
        .await?;

    printer.stop_spinner();
    let rendered = match &outcome {
        SubmitOutcome::Ignored => Ok(()),
        SubmitOutcome::Cleared => {
            print_success("Conversation cleared.");
            Ok(())
        }
        SubmitOutcome::Completed { .. } => {
            printer.finish(&mut stdout, session.conversation().last())
        }
        SubmitOutcome::Failed { error } => {
            // Close a turn that was partly printed before the failure
            let closed = if printer.has_output() {
                printer.finish(&mut stdout, None)
            } else {
                Ok(())
            };
            print_error(&format!("Request failed: {error}"));
            closed.and_then(|()| {
                write_assistant_turn(
                    &mut stdout,
                    &ConversationEntry::error_turn(),
                    config.show_reasoning(),
                    false,
                )
            })
        }
    };
    if let Err(e) = rendered {
        debug!("Failed to render turn: {}", e);
    }

    Ok(outcome)
}
