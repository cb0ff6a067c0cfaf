// crates/callgate-cli/src/main.rs
// ============================================================================
// Module: Call Gate CLI Entry Point
// Description: Command dispatcher for config checks, discovery and calls.
// Purpose: Drive the gateway from the command line with stable exit codes.
// Dependencies: callgate-config, callgate-gateway, clap, tokio, tracing-subscriber
// ============================================================================

//! ## Overview
//! The Call Gate CLI validates gateway configuration, lists the capability
//! descriptors of the configured catalog, and performs one governed call.
//! Exit codes: `0` for a successful call or command, `1` when a call returns
//! a failure result, `2` when startup fails (config, wiring, arguments).
//!
//! Logs go to stderr through `tracing-subscriber`, filtered by `CALLGATE_LOG`.
//! Stdout carries only command output.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use callgate_config::GatewayConfig;
use callgate_config::config_toml_example;
use callgate_core::CallResult;
use callgate_gateway::Credential;
use callgate_gateway::HandlerSet;
use callgate_gateway::ProxyEngine;
use callgate_gateway::TracingOpsSink;
use callgate_gateway::TransformSet;
use callgate_gateway::capabilities::describe;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde_json::Value;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable holding the log filter.
const LOG_ENV_VAR: &str = "CALLGATE_LOG";
/// Log filter used when `CALLGATE_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";
/// Exit code for a call that returned a failure result.
const EXIT_CALL_FAILED: u8 = 1;
/// Exit code for startup errors.
const EXIT_STARTUP: u8 = 2;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "callgate", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Action catalog utilities.
    Actions {
        /// Selected actions subcommand.
        #[command(subcommand)]
        command: ActionsCommand,
    },
    /// Perform one governed call and print the result.
    Call(CallCommand),
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigArgs),
    /// Print an annotated example config.
    Example,
}

/// Actions subcommands.
#[derive(Subcommand, Debug)]
enum ActionsCommand {
    /// Print capability descriptors as JSON.
    List(ConfigArgs),
}

/// Config file selection shared by commands.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Config file path (defaults to `CALLGATE_CONFIG`, then `callgate.toml`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `call`.
#[derive(Args, Debug)]
struct CallCommand {
    /// Config file selection.
    #[command(flatten)]
    config: ConfigArgs,
    /// Action name.
    #[arg(long, value_name = "NAME")]
    action: String,
    /// Call arguments as a JSON document.
    #[arg(long, value_name = "JSON", default_value = "{}")]
    args: String,
    /// Static identity id.
    #[arg(long, value_name = "ID", conflicts_with = "token", required_unless_present = "token")]
    identity: Option<String>,
    /// Signed caller token.
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,
}

impl CallCommand {
    /// Returns the credential selected on the command line.
    fn credential(&self) -> CliResult<Credential> {
        match (&self.identity, &self.token) {
            (Some(id), None) => Ok(Credential::Static(id.clone())),
            (None, Some(token)) => Ok(Credential::Token(token.clone())),
            _ => Err(CliError::new("exactly one of --identity or --token is required")),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Startup error surfaced with exit code 2.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Installs the stderr log subscriber.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

/// Executes the CLI command dispatcher.
async fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(args) => command_config_validate(&args),
            ConfigCommand::Example => command_config_example(),
        },
        Commands::Actions {
            command: ActionsCommand::List(args),
        } => command_actions_list(&args),
        Commands::Call(command) => command_call(&command).await,
    }
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Loads configuration, mapping failures to startup errors.
fn load_config(args: &ConfigArgs) -> CliResult<GatewayConfig> {
    GatewayConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))
}

/// Executes `config validate`.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    config.build_registry().map_err(|err| CliError::new(format!("invalid catalog: {err}")))?;
    write_stdout_line(&format!("config ok: {} action(s)", config.actions.len()))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `config example`.
fn command_config_example() -> CliResult<ExitCode> {
    write_stdout_line(config_toml_example().trim_end())?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `actions list`.
fn command_actions_list(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let registry =
        config.build_registry().map_err(|err| CliError::new(format!("invalid catalog: {err}")))?;
    let descriptors = describe(&registry);
    let rendered = serde_json::to_string_pretty(&descriptors)
        .map_err(|err| CliError::new(format!("failed to render descriptors: {err}")))?;
    write_stdout_line(&rendered)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `call`.
async fn command_call(command: &CallCommand) -> CliResult<ExitCode> {
    let result = execute_call(command).await?;
    write_stdout_line(&result.to_json().to_string())?;
    Ok(ExitCode::from(exit_status(&result)))
}

/// Starts the gateway, performs the call and drains the audit writer.
async fn execute_call(command: &CallCommand) -> CliResult<CallResult> {
    let credential = command.credential()?;
    let args = parse_args(&command.args)?;
    let config = load_config(&command.config)?;
    let engine = ProxyEngine::from_config(
        &config,
        HandlerSet::new(),
        TransformSet::new(),
        Arc::new(TracingOpsSink),
    )
    .map_err(|err| CliError::new(format!("failed to start gateway: {err}")))?;
    let result = engine.invoke(&credential, &command.action, args).await;
    if let Err(err) = engine.shutdown().await {
        tracing::error!(target: "callgate::cli", %err, "audit shutdown failed");
    }
    Ok(result)
}

/// Parses `--args` as JSON.
fn parse_args(raw: &str) -> CliResult<Value> {
    serde_json::from_str(raw).map_err(|err| CliError::new(format!("--args is not valid JSON: {err}")))
}

/// Maps a call result to the process exit status.
const fn exit_status(result: &CallResult) -> u8 {
    if result.is_ok() { 0 } else { EXIT_CALL_FAILED }
}

// ============================================================================
// SECTION: Output
// ============================================================================

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}").map_err(|err| CliError::new(format!("stdout: {err}")))
}

/// Writes a startup error to stderr and returns the startup exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = writeln!(std::io::stderr(), "{message}");
    ExitCode::from(EXIT_STARTUP)
}
