//! persona-chat binary.
//!
//! Builds the persona's logit-bias settings once, then chats over stdin and
//! stdout with the configured OpenAI model.
//!
//! # Environment Variables
//!
//! - `PERSONA_CONFIG`: configuration file (default: `appsettings.json`)
//! - `OPENAI_API_KEY`, `OPENAI_MODEL`, `OPENAI_BASE_URL`: backend overrides
//! - `PERSONA_MODE`: persona override
//! - `RUST_LOG`: tracing filter (default: the configured `Logging:Filter`)
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin persona-chat -- --persona Trained
//! cargo run --bin persona-chat -- biases --persona Punctuation
//! ```

use std::sync::Arc;

use anyhow::Context;

use persona_chat::chat::{ChatOrchestrator, ChatSettings};
use persona_chat::cli::{self, CliArgs, CliCommand, TurnCanceller};
use persona_chat::llms::{OpenAIChatCompletion, ScriptedChat, StreamingChat};
use persona_chat::persona::{self, PersonaSources};
use persona_chat::tokenizer::{Cl100kTokenizer, TokenEncoder};
use persona_chat::utilities::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match cli::parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{}\n\n{}", message, cli::USAGE);
            std::process::exit(2);
        }
    };

    if args.command == CliCommand::Version {
        println!("{}", cli::version());
        return Ok(());
    }

    let mut config = load_config(&args)?;
    if let Some(mode) = args.persona {
        config.general.persona = mode;
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.filter.as_str().into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let encoder: Arc<dyn TokenEncoder> =
        Arc::new(Cl100kTokenizer::new().context("Failed to load the cl100k_base tokenizer")?);

    let sources = PersonaSources::from_config(&config.general);
    let biases = persona::persona_biases(
        config.general.persona,
        encoder.as_ref(),
        &sources,
        &mut rand::thread_rng(),
    )
    .with_context(|| format!("Failed to build the {} persona", config.general.persona))?;

    if args.command == CliCommand::Biases {
        cli::write_biases(&biases, &mut std::io::stdout().lock())?;
        return Ok(());
    }

    let backend: Arc<dyn StreamingChat> = if args.offline {
        Arc::new(ScriptedChat::echo())
    } else {
        Arc::new(OpenAIChatCompletion::from_config(&config.openai)?)
    };
    tracing::info!(
        "Chatting with {} as the {} persona",
        backend.model(),
        config.general.persona
    );

    let settings = ChatSettings::with_biases(config.general.temperature, &biases);
    let orchestrator = ChatOrchestrator::new(backend, encoder, Arc::new(settings))
        .with_history_budget(config.general.history_token_budget);

    let canceller = TurnCanceller::new();
    spawn_interrupt_handler(canceller.clone());

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    cli::run_chat_loop(&orchestrator, stdin, &mut stdout, &canceller).await?;
    Ok(())
}

/// Configuration for the run. Offline and `biases` runs need no backend
/// credentials, so validation failures for those are only warnings.
fn load_config(args: &CliArgs) -> anyhow::Result<AppConfig> {
    let needs_backend = args.command == CliCommand::Chat && !args.offline;
    if needs_backend {
        return AppConfig::load(args.config_path.as_deref()).context("Invalid configuration");
    }

    let path = AppConfig::resolve_path(args.config_path.as_deref());
    let mut config = AppConfig::from_file(&path)?;
    config.apply_env(|name| std::env::var(name).ok())?;
    if let Err(e) = config.validate() {
        eprintln!("warning: {}", e);
    }
    Ok(config)
}

/// Ctrl-C cancels the running turn, or exits when no turn is running.
fn spawn_interrupt_handler(canceller: TurnCanceller) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !canceller.cancel_current() {
                println!();
                std::process::exit(130);
            }
            tracing::debug!("Cancelled the running turn");
        }
    });
}
