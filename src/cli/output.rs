//! CLI output formatting utilities
//!
//! This module renders the conversation on the terminal. Frames carry the full
//! text received so far, so [`TurnPrinter`] only writes what was not printed
//! by the previous update.

use std::io::IsTerminal;
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crate::conversation::ConversationEntry;
use crate::conversation::Field;
use crate::stream::ContextSource;
use crate::AppConfig;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// Returns the truncated string with "..." suffix if truncated, otherwise the
/// original string
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

pub fn print_banner() {
    println!("⚖️  Welcome to LegalX");
    println!("Ask your legal questions and get answers from the LegalX law assistant.");
    println!("Type `clear` to start over, Ctrl-D to quit.");
    println!();
}

pub fn print_prompt() {
    print!("> ");
    std::io::stdout().flush().ok();
}

pub fn print_config(config: &AppConfig) {
    println!("📋 LegalX Configuration:");
    println!();

    println!("🌐 Backend:");
    println!("  Endpoint: {}", config.endpoint());
    match config.generate_url() {
        Ok(url) => println!("  Generate URL: {url}"),
        Err(e) => println!("  Generate URL: invalid ({e})"),
    }
    println!("  Connect timeout: {}s", config.connect_timeout_secs());
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.log_level());
    println!("  Directory: {}", config.log_directory());
    println!();

    println!("🖥️  Display:");
    println!("  Show reasoning: {}", config.show_reasoning());
    println!("  Show sources: {}", config.show_sources());
}

pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("❌ {msg}");
}

/// Terminal spinner shown while waiting for the first frame
pub struct Spinner {
    running: Arc<AtomicBool>,
}

impl Spinner {
    pub fn start(message: &str) -> Self {
        let message = message.to_string();
        let running = Arc::new(AtomicBool::new(true));
        let flag = running.clone();

        std::thread::spawn(move || {
            let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
            let mut idx = 0;

            while flag.load(Ordering::Relaxed) {
                print!("\r   {} {}...", frames[idx], message);
                std::io::stdout().flush().ok();
                idx = (idx + 1) % frames.len();
                std::thread::sleep(Duration::from_millis(80));
            }

            // Clear the line
            print!("\r{}\r", " ".repeat(message.chars().count() + 10));
            std::io::stdout().flush().ok();
        });

        Self { running }
    }

    pub fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(100)); // Give time to clear
        }
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Incremental renderer for one assistant turn
pub struct TurnPrinter {
    show_reasoning: bool,
    show_sources: bool,
    reasoning_shown: String,
    answer_shown: String,
    reasoning_open: bool,
    answer_open: bool,
    spinner: Option<Spinner>,
}

impl TurnPrinter {
    pub fn new(show_reasoning: bool, show_sources: bool) -> Self {
        Self {
            show_reasoning,
            show_sources,
            reasoning_shown: String::new(),
            answer_shown: String::new(),
            reasoning_open: false,
            answer_open: false,
            spinner: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.show_reasoning(), config.show_sources())
    }

    /// Show a spinner until the first update, when stdout is a terminal
    #[must_use]
    pub fn with_spinner(mut self) -> Self {
        if std::io::stdout().is_terminal() {
            self.spinner = Some(Spinner::start("Thinking"));
        }
        self
    }

    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.stop();
        }
    }

    /// True once any part of the turn has been written
    pub fn has_output(&self) -> bool {
        self.reasoning_open || self.answer_open
    }

    /// Render whatever the turn gained since the last call
    pub fn update<W: Write>(&mut self, out: &mut W, entry: &ConversationEntry) -> std::io::Result<()> {
        let ConversationEntry::Assistant {
            reasoning, answer, ..
        } = entry
        else {
            return Ok(());
        };

        let reasoning = visible_text(reasoning);
        let answer = visible_text(answer);
        if reasoning.is_none() && answer.is_none() {
            return Ok(());
        }
        self.stop_spinner();

        // Once the answer has started, repeated reasoning is not re-rendered
        if let (true, false, Some(text)) = (self.show_reasoning, self.answer_open, reasoning) {
            if !self.reasoning_open {
                writeln!(out, "💭 Thinking...")?;
                self.reasoning_open = true;
            }
            write_delta(out, &mut self.reasoning_shown, text)?;
        }

        if let Some(text) = answer {
            if !self.answer_open {
                if self.reasoning_open {
                    writeln!(out)?;
                    writeln!(out)?;
                }
                writeln!(out, "⚖️  Answer:")?;
                self.answer_open = true;
            }
            write_delta(out, &mut self.answer_shown, text)?;
        }

        out.flush()
    }

    /// Close the turn: final newline and, if enabled, the sources
    pub fn finish<W: Write>(&mut self, out: &mut W, entry: Option<&ConversationEntry>) -> std::io::Result<()> {
        self.stop_spinner();

        if self.reasoning_open || self.answer_open {
            writeln!(out)?;
        }
        if !self.answer_open {
            writeln!(out, "⚖️  (no answer received)")?;
        }

        if let (true, Some(ConversationEntry::Assistant { sources, .. })) = (self.show_sources, entry) {
            write_sources(out, sources)?;
        }

        writeln!(out)?;
        out.flush()
    }
}

/// Non-empty received text; the sentinel and "" both render as pending
fn visible_text(field: &Field) -> Option<&str> {
    field.as_text().filter(|text| !text.is_empty())
}

fn write_delta<W: Write>(out: &mut W, shown: &mut String, text: &str) -> std::io::Result<()> {
    if let Some(suffix) = text.strip_prefix(shown.as_str()) {
        write!(out, "{suffix}")?;
    } else {
        // The backend rewrote earlier text; start over on a fresh line
        writeln!(out)?;
        write!(out, "{text}")?;
    }
    text.clone_into(shown);
    Ok(())
}

fn write_sources<W: Write>(out: &mut W, sources: &[ContextSource]) -> std::io::Result<()> {
    if sources.is_empty() {
        return Ok(());
    }
    writeln!(out, "📚 Sources:")?;
    for source in sources {
        let score = source
            .score
            .map(|score| format!(" (score {score:.3})"))
            .unwrap_or_default();
        writeln!(
            out,
            "  - {}{}: {}",
            source.source,
            score,
            truncate_str(&source.text.replace('\n', " "), 120)
        )?;
    }
    Ok(())
}

/// Render a complete assistant turn in one go
pub fn write_assistant_turn<W: Write>(
    out: &mut W,
    entry: &ConversationEntry,
    show_reasoning: bool,
    show_sources: bool,
) -> std::io::Result<()> {
    let mut printer = TurnPrinter::new(show_reasoning, show_sources);
    printer.update(out, entry)?;
    printer.finish(out, Some(entry))
}
