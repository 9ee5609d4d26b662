//! # Sign-off Configuration Validator
//!
//! Command-line tool for validating sign-off engine configuration across environments.
//! Catches configuration problems before the engine is embedded in a service.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use signoff_core::config::{ConfigManager, SignoffConfig};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "signoff-config-validator")]
#[command(about = "Validate sign-off engine configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production, ...)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every configuration section
    All,

    /// Validate a single configuration section
    Component {
        /// Section name (database, engine, events, logging)
        name: String,
    },

    /// List environments that have an override file
    Environments,

    /// Print the resolved configuration with secrets masked
    Show,
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Component { name }) => validate_component(&cli, name),
        Some(Commands::Environments) => list_environments(&cli),
        Some(Commands::Show) => show_config(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn config_dir(cli: &Cli) -> PathBuf {
    cli.config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("config"))
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    ConfigManager::load_from_directory_with_env(Some(config_dir(cli)), &cli.environment)
        .with_context(|| format!("loading configuration for '{}'", cli.environment))
}

fn validate_all(cli: &Cli) -> Result<()> {
    println!("🔧 Validating Sign-off Configuration");
    println!("Environment: {}", cli.environment);
    println!("Config Directory: {}", config_dir(cli).display());
    println!();

    let manager = load(cli)?;
    println!("✅ Configuration loaded and validated");

    let config = manager.config();
    validate_database(config)?;
    validate_engine(config)?;
    validate_events(config)?;
    validate_logging(config)?;

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn validate_component(cli: &Cli, name: &str) -> Result<()> {
    println!("🔧 Validating Component: {name}");
    let manager = load(cli)?;
    let config = manager.config();

    match name.to_lowercase().as_str() {
        "database" => validate_database(config)?,
        "engine" => validate_engine(config)?,
        "events" => validate_events(config)?,
        "logging" => validate_logging(config)?,
        _ => bail!("Unknown component: {name}"),
    }

    println!("✅ Component '{name}' validation passed!");
    Ok(())
}

fn list_environments(cli: &Cli) -> Result<()> {
    let dir = config_dir(cli);
    println!("📋 Environments with overrides in {}:", dir.display());

    let mut environments = environment_files(&dir)?;
    environments.sort();
    if environments.is_empty() {
        println!("  (none)");
    }
    for env in environments {
        println!("  • {env}");
    }
    Ok(())
}

/// Environment names taken from `signoff.<env>.toml` files
fn environment_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
        let file_name = entry?.file_name();
        let file_name = file_name.to_string_lossy();
        if let Some(env) = file_name
            .strip_prefix("signoff.")
            .and_then(|rest| rest.strip_suffix(".toml"))
        {
            names.push(env.to_string());
        }
    }
    Ok(names)
}

fn show_config(cli: &Cli) -> Result<()> {
    let manager = load(cli)?;
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    Ok(())
}

fn validate_database(config: &SignoffConfig) -> Result<()> {
    println!("🗄️  Validating Database Configuration...");
    let db = &config.database;
    println!("   ✅ URL: {}", db.url_for_logging());
    println!(
        "   ✅ Pool configuration valid (min: {}, max: {}, acquire timeout: {}s)",
        db.min_connections, db.max_connections, db.acquire_timeout_seconds
    );
    println!("   ✅ Run migrations on connect: {}", db.run_migrations);
    Ok(())
}

fn validate_engine(config: &SignoffConfig) -> Result<()> {
    println!("⚙️  Validating Engine Configuration...");
    let engine = &config.engine;
    println!("   ✅ Reference code prefix: {}", engine.reference_code_prefix);
    println!("   ✅ Max steps per workflow: {}", engine.max_steps_per_workflow);
    println!(
        "   ✅ Comment required on rejection: {}, on return: {}",
        engine.require_comment_on_rejection, engine.require_comment_on_return
    );
    Ok(())
}

fn validate_events(config: &SignoffConfig) -> Result<()> {
    println!("📡 Validating Events Configuration...");
    println!("   ✅ Channel capacity: {}", config.events.channel_capacity);
    Ok(())
}

fn validate_logging(config: &SignoffConfig) -> Result<()> {
    println!("📝 Validating Logging Configuration...");
    match &config.logging.level {
        Some(level) => {
            tracing_subscriber::EnvFilter::try_new(level)
                .with_context(|| format!("invalid logging.level filter '{level}'"))?;
            println!("   ✅ Level override: {level}");
        }
        None => println!("   ℹ️  No level override (environment default)"),
    }
    println!("   ✅ JSON output: {}", config.logging.json);
    Ok(())
}
