//! firewatch - Fire Weather Alert Relay
//!
//! Watches the NWS feed for fire weather alerts and posts them to Discord.

use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use firewatch::config::{BotConfig, Overrides};
use firewatch::{BotContext, BotError, NwsClient, bot, commands, config};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_LOG_DIRECTIVES: &str = "firewatch=info,fire_alerts=info";

#[derive(Parser)]
#[command(name = "firewatch")]
#[command(about = "Fire weather alert relay for Discord")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,

        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Generate a sample config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Prompt for the bot token and channel, then save them
    Setup {
        /// Path to write config
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Fetch the feed once and print the matching alerts
    CheckFeed {
        /// Path to config file, used for feed settings when present
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },
}

#[derive(Args)]
struct OverrideArgs {
    /// Discord bot token
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Channel that receives alerts
    #[arg(long, env = "DISCORD_CHANNEL_ID")]
    channel_id: Option<String>,

    /// Discord application id
    #[arg(long, env = "DISCORD_APPLICATION_ID")]
    application_id: Option<String>,

    /// Discord application public key (hex)
    #[arg(long, env = "DISCORD_PUBLIC_KEY")]
    public_key: Option<String>,

    /// Interactions endpoint listen address
    #[arg(long, env = "FIREWATCH_LISTEN")]
    listen: Option<String>,

    /// Seconds between polls
    #[arg(long)]
    interval: Option<u64>,
}

impl From<OverrideArgs> for Overrides {
    fn from(args: OverrideArgs) -> Self {
        Self {
            token: args.token,
            channel_id: args.channel_id,
            application_id: args.application_id,
            public_key: args.public_key,
            listen_addr: args.listen,
            interval_secs: args.interval,
        }
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_DIRECTIVES))?;

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let result = match cli.command {
        Commands::Run { config, overrides } => run_bot(config, overrides.into()).await,
        Commands::InitConfig { output, force } => init_config(&output, force),
        Commands::Setup { config } => setup(&config),
        Commands::CheckFeed { config } => check_feed(&config).await,
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(BotError::Config(reason)) => {
            error!(reason = %reason, "configuration error");
            eprintln!("Configuration error: {reason}");
            Ok(ExitCode::from(2))
        }
        Err(e) => {
            error!(error = %e, "firewatch failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_bot(config_path: PathBuf, overrides: Overrides) -> Result<(), BotError> {
    info!(config = %config_path.display(), "starting firewatch");

    let mut config = if config_path.exists() {
        BotConfig::load(&config_path)?
    } else if io::stdin().is_terminal() {
        println!("No config found at {}.", config_path.display());
        first_run(&config_path)?
    } else {
        BotConfig::default()
    };
    config.apply(overrides);
    bot::preflight(&config)?;

    BotContext::new(config)?.run().await
}

fn first_run(path: &Path) -> Result<BotConfig, BotError> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let config = config::prompt_setup(&mut input, &mut output)?;
    config.save(path)?;
    println!();
    println!("Config saved to {}", path.display());
    println!();
    Ok(config)
}

fn init_config(output: &Path, force: bool) -> Result<(), BotError> {
    if output.exists() && !force {
        return Err(BotError::Config(format!(
            "{} already exists, pass --force to overwrite",
            output.display()
        )));
    }
    BotConfig::sample().save(output)?;
    println!("Wrote sample config to {}", output.display());
    println!("Edit the token and channel id, then run: firewatch run");
    Ok(())
}

fn setup(path: &Path) -> Result<(), BotError> {
    let mut config = BotConfig::load_or_default(path)?;
    let answers = {
        let stdin = io::stdin();
        config::prompt_setup(&mut stdin.lock(), &mut io::stdout())?
    };
    config.discord.token = answers.discord.token;
    config.discord.channel_id = answers.discord.channel_id;
    config.save(path)?;
    println!();
    println!("Config saved to {}", path.display());
    Ok(())
}

async fn check_feed(path: &Path) -> Result<(), BotError> {
    let config = BotConfig::load_or_default(path)?;
    let client = NwsClient::new(&config.feed)?;

    println!("Fetching {}", client.request_url());
    let alerts = client.try_fetch().await?;

    println!("Active fire weather alerts: {}", alerts.len());
    println!();
    println!("{}", commands::active_summary(&alerts));
    Ok(())
}
