//! FeedPilot server entry point.

use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use feedpilot_server::config::{engine_settings, resolve_state_path};
use feedpilot_server::protocol::{MethodRegistry, ProtocolHandler};
use feedpilot_server::session::PilotSession;
use feedpilot_server::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "feedpilot-server",
    about = "JSON-RPC server for FeedPilot: content classification, learned control matching and paced actions",
    version
)]
struct Cli {
    /// Path to the JSON state file.
    #[arg(short, long, global = true)]
    state: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Minimum spacing between two actions, in milliseconds.
    #[arg(long, global = true)]
    min_interval_ms: Option<u64>,

    /// Bound on the external scoring call, in milliseconds.
    #[arg(long, global = true)]
    scoring_timeout_ms: Option<u64>,

    /// Fixed random seed for reproducible runs.
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve JSON-RPC over stdio (default).
    Serve,

    /// Load a state file and print a summary.
    Validate,

    /// Print the method table as JSON.
    Info,

    /// Print the learned rules as JSON.
    Export,

    /// Validate a rule document and merge it into the state file.
    Import {
        /// Path to the rule document.
        file: String,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   feedpilot-server completions bash > ~/.local/share/bash-completion/completions/feedpilot-server
    ///   feedpilot-server completions zsh > ~/.zfunc/_feedpilot-server
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let state_path = resolve_state_path(cli.state.as_deref());
    let settings = engine_settings(cli.min_interval_ms, cli.scoring_timeout_ms, cli.seed);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("FeedPilot server");
            tracing::info!("State: {state_path}");
            let session = Arc::new(PilotSession::open(&state_path, settings)?);
            let handler = ProtocolHandler::new(session);
            let transport = StdioTransport::new(handler);
            transport.run().await?;
        }

        Commands::Validate if !std::path::Path::new(&state_path).exists() => {
            eprintln!("State file not found: {state_path}");
            std::process::exit(1);
        }

        Commands::Validate => match PilotSession::open(&state_path, settings) {
            Ok(session) => {
                let engine = session.engine();
                let stats = engine.learning_stats();
                println!("Valid state file: {state_path}");
                println!("  Primary action rules: {}", stats.primary_action);
                println!("  Already-acted indicator rules: {}", stats.already_acted_indicator);
                println!("  Repost indicator rules: {}", stats.repost_indicator);
                println!("  Secondary action rules: {}", stats.secondary_action);
                println!("  History records: {}", engine.history().len());
                println!("  Stopped: {}", engine.is_stopped());
                println!("  Auto-act: {}", engine.config().auto_act_enabled);
            }
            Err(e) => {
                eprintln!("Invalid state file: {e}");
                std::process::exit(1);
            }
        },

        Commands::Info => {
            let methods = MethodRegistry::list_methods();
            let info = serde_json::json!({
                "server": { "name": "feedpilot-server", "version": env!("CARGO_PKG_VERSION") },
                "protocol": "jsonrpc-2.0 over newline-delimited stdio",
                "methods": methods,
                "method_count": methods.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Export => {
            let session = PilotSession::open(&state_path, settings)?;
            let rules = session.engine().export_rules();
            println!("{}", serde_json::to_string_pretty(&rules)?);
        }

        Commands::Import { file } => {
            let data = std::fs::read_to_string(&file)
                .with_context(|| format!("reading rule document {file}"))?;
            let doc: serde_json::Value =
                serde_json::from_str(&data).with_context(|| format!("parsing {file}"))?;
            let session = PilotSession::open(&state_path, settings)?;
            let merged = session.engine().import_rules(&doc)?;
            session.mark_dirty();
            session.save()?;
            println!("Imported into {state_path}: {} rules after merge", merged.len());
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "feedpilot-server", &mut std::io::stdout());
        }
    }

    Ok(())
}
