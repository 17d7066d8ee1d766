pub mod commands;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use ano_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use ano_core::environment::EnvironmentTier;
use clap::{Parser, Subcommand};
use tracing::Level;

use crate::commands::run::RunArgs;
use crate::commands::{CommandResult, EXIT_CONFIG_INVALID};

#[derive(Debug, Parser)]
#[command(
    name = "ano",
    about = "ANO agent orchestration CLI",
    long_about = "Run policy-gated agent pipelines, inspect the agent catalog and gates, and chat with a single agent.",
    after_help = "Examples:\n  ano run --topic \"Grant readiness\"\n  ano agents --team engineering\n  ano gates --tier production\n  ano chat --agent chat-advisor"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a TOML config file (default: ano.toml, config/ano.toml)")]
    config: Option<PathBuf>,

    #[arg(long, global = true, help = "Override the environment tier (development|test|production)")]
    tier: Option<EnvironmentTier>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run the research-review demo pipeline and print the result as JSON")]
    Run {
        #[arg(long, help = "Topic handed to every stage")]
        topic: Option<String>,
        #[arg(long, help = "Organization name for the agent context")]
        org: Option<String>,
        #[arg(long, help = "JSON object merged into the initial input (gate evidence)")]
        input: Option<PathBuf>,
    },
    #[command(about = "List registered agents, optionally filtered by team or capability")]
    Agents {
        #[arg(long)]
        team: Option<String>,
        #[arg(long)]
        capability: Option<String>,
    },
    #[command(about = "Show every policy gate and whether the tier enforces it")]
    Gates,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Interactive line REPL with one agent")]
    Chat {
        #[arg(long, default_value = "chat-advisor")]
        agent: String,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
        overrides: ConfigOverrides { environment: cli.tier, ..ConfigOverrides::default() },
    };
    let config = match AppConfig::load(options) {
        Ok(config) => config,
        Err(error) => {
            let result = CommandResult::failure(
                "config",
                "config_validation",
                error.to_string(),
                EXIT_CONFIG_INVALID,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };
    init_logging(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            let result = CommandResult::failure("runtime", "io", error.to_string(), commands::EXIT_IO);
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };

    let result = match cli.command {
        Command::Run { topic, org, input } => {
            let defaults = RunArgs::default();
            let args = RunArgs {
                topic: topic.unwrap_or(defaults.topic),
                org_name: org.unwrap_or(defaults.org_name),
                org_type: defaults.org_type,
                input_file: input,
            };
            runtime.block_on(commands::run::run(&config, &args))
        }
        Command::Agents { team, capability } => {
            commands::agents::run(&config, team.as_deref(), capability.as_deref())
        }
        Command::Gates => commands::gates::run(&config),
        Command::Config => commands::config::run(&config, cli.config.as_deref()),
        Command::Chat { agent } => {
            let stdin = io::stdin();
            runtime.block_on(commands::chat::run(&config, &agent, stdin.lock(), io::stdout()))
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

/// Installs the global subscriber. Logs go to stderr so stdout stays JSON.
fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}
