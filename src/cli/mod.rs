//! Command line surface: argument parsing and the interactive chat loop.
//!
//! ```text
//! persona-chat [chat] [--config <path>] [--persona <mode>] [--offline]
//! persona-chat biases [--config <path>] [--persona <mode>]
//! persona-chat version
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::chat::cancel::CancelSignal;
use crate::chat::message::ChatMessage;
use crate::chat::orchestrator::ChatOrchestrator;
use crate::persona::PersonaMode;
use crate::stylometry::LogitBias;
use crate::utilities::errors::ChatError;

/// Available CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliCommand {
    /// Interactive chat (default).
    Chat,
    /// Print the persona's logit biases as JSON.
    Biases,
    /// Show version information.
    Version,
}

impl std::fmt::Display for CliCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat => write!(f, "chat"),
            Self::Biases => write!(f, "biases"),
            Self::Version => write!(f, "version"),
        }
    }
}

/// Parse a CLI command from a string.
pub fn parse_command(cmd: &str) -> Option<CliCommand> {
    match cmd {
        "chat" => Some(CliCommand::Chat),
        "biases" => Some(CliCommand::Biases),
        "version" | "--version" | "-v" => Some(CliCommand::Version),
        _ => None,
    }
}

/// Parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    pub command: CliCommand,
    pub config_path: Option<PathBuf>,
    /// Overrides the configured persona.
    pub persona: Option<PersonaMode>,
    /// Echo input back instead of calling the backend.
    pub offline: bool,
}

pub const USAGE: &str = "\
usage: persona-chat [chat|biases|version] [--config <path>] [--persona <mode>] [--offline]

  chat      interactive conversation (default)
  biases    print the persona's logit biases as JSON
  version   print the version

  --persona Base | Punctuation | Random | Trained";

/// Parse arguments (without the program name).
pub fn parse_args<I>(args: I) -> Result<CliArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = CliArgs {
        command: CliCommand::Chat,
        config_path: None,
        persona: None,
        offline: false,
    };
    let mut command_seen = false;
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config needs a path")?;
                parsed.config_path = Some(PathBuf::from(path));
            }
            "--persona" | "-p" => {
                let mode = args.next().ok_or("--persona needs a mode")?;
                parsed.persona = Some(mode.parse()?);
            }
            "--offline" => parsed.offline = true,
            other => match parse_command(other) {
                Some(command) if !command_seen => {
                    parsed.command = command;
                    command_seen = true;
                }
                _ => return Err(format!("unexpected argument '{}'", other)),
            },
        }
    }
    Ok(parsed)
}

/// Version line for `persona-chat version`.
pub fn version() -> String {
    format!("persona-chat {}", env!("CARGO_PKG_VERSION"))
}

/// Write `biases` as a JSON array of `{token, bias}` records.
pub fn write_biases<W: Write>(biases: &[LogitBias], output: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *output, biases)?;
    writeln!(output)
}

/// The conversation so far. Grows by one user and one assistant message per
/// successful turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push_turn(&mut self, input: impl Into<String>, reply: impl Into<String>) {
        self.messages.push(ChatMessage::user(input));
        self.messages.push(ChatMessage::assistant(reply));
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Hands out one cancellation signal per turn so an interrupt handler can
/// cancel whichever turn is running.
#[derive(Debug, Clone, Default)]
pub struct TurnCanceller {
    current: Arc<Mutex<Option<CancelSignal>>>,
}

impl TurnCanceller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a turn and return its signal.
    pub fn begin(&self) -> CancelSignal {
        let signal = CancelSignal::new();
        if let Ok(mut current) = self.current.lock() {
            *current = Some(signal.clone());
        }
        signal
    }

    pub fn finish(&self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
    }

    /// Cancel the running turn. Returns `false` when no turn is running.
    pub fn cancel_current(&self) -> bool {
        match self.current.lock() {
            Ok(current) => match current.as_ref() {
                Some(signal) => {
                    signal.cancel();
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }
}

/// Read lines from `input` and chat until end of input.
///
/// Empty lines are skipped. A failed or cancelled turn is reported and
/// leaves the conversation unchanged.
pub async fn run_chat_loop<R, W>(
    orchestrator: &ChatOrchestrator,
    input: R,
    output: &mut W,
    canceller: &TurnCanceller,
) -> io::Result<Conversation>
where
    R: AsyncBufRead + Unpin,
    W: Write + Send,
{
    let mut conversation = Conversation::new();
    let mut lines = input.lines();

    writeln!(output, "Ready!")?;
    writeln!(output)?;

    loop {
        write!(output, "User: ")?;
        output.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(output)?;
            break;
        };
        let text = line.trim_end_matches('\r');
        if text.is_empty() {
            writeln!(output)?;
            continue;
        }

        write!(output, "Assistant: ")?;
        output.flush()?;

        let signal = canceller.begin();
        let mut write_error = None;
        let result = orchestrator
            .chat(
                conversation.messages(),
                text,
                |token| {
                    if write_error.is_none() {
                        if let Err(e) = output.write_all(token.as_bytes()).and_then(|_| output.flush()) {
                            write_error = Some(e);
                        }
                    }
                },
                Some(&signal),
            )
            .await;
        canceller.finish();

        if let Some(e) = write_error {
            return Err(e);
        }
        writeln!(output)?;

        match result {
            Ok(reply) => conversation.push_turn(text, reply),
            Err(ChatError::Cancelled) => writeln!(output, "(cancelled)")?,
            Err(e) => {
                log::warn!("Chat turn failed: {}", e);
                writeln!(output, "Error: {}", e)?;
            }
        }
    }

    log::debug!("Chat loop finished after {} messages", conversation.len());
    Ok(conversation)
}
