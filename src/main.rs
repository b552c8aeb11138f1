//! WolfMask - obfuscation layer node daemon
//!
//! Pushes the stored device configuration to the tunnel endpoint over UAPI
//! and answers parameter requests from other nodes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfmask::config::WolfMaskConfig;
use wolfmask::device::DeviceConfig;
use wolfmask::key::NodePrivate;
use wolfmask::network::{params_handler, NetworkServer};
use wolfmask::prefs::{FilePrefsStore, PrefsEditor};
use wolfmask::uapi::{to_uapi_string, UapiSocket};

/// WolfMask - obfuscation layer node daemon
#[derive(Parser)]
#[command(name = "wolfmask")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfmask.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); defaults to [logging].level
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the endpoint and answer peer requests
    Start,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfmask.toml")]
        output: PathBuf,

        /// Node name
        #[arg(long, default_value = "wolfmask")]
        name: String,
    },

    /// Validate configuration file
    Validate,

    /// Print the UAPI directives that move one device snapshot to another
    Uapi {
        /// Configuration currently applied (omit for a fresh device)
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Configuration to apply
        #[arg(long)]
        desired: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config may not exist yet for `init`
    let config = WolfMaskConfig::from_file(&cli.config).ok();
    let (level, format) = match (&cli.log_level, &config) {
        (Some(level), _) => (level.clone(), "pretty".to_string()),
        (None, Some(config)) => (config.logging.level.clone(), config.logging.format.clone()),
        (None, None) => ("info".to_string(), "pretty".to_string()),
    };
    init_logging(&level, &format);

    match cli.command {
        Commands::Start => run_start(&cli.config).await,
        Commands::Init { output, name } => run_init(&output, name),
        Commands::Validate => run_validate(&cli.config),
        Commands::Uapi { previous, desired } => {
            run_uapi(config.unwrap_or_default(), previous.as_deref(), &desired)
        }
    }
}

/// Initialize logging
fn init_logging(level: &str, format: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Start the node
async fn run_start(config_path: &Path) -> anyhow::Result<()> {
    let config = match WolfMaskConfig::from_file(config_path) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            return Err(e.into());
        }
    };

    tracing::info!("Starting WolfMask node {}", config.node.name);

    let key_file = config.private_key_file();
    let private_key = NodePrivate::load_or_generate(&key_file)
        .with_context(|| format!("reading private key {}", key_file.display()))?;
    tracing::info!("Node public key: {}", private_key.public_key());

    let store = FilePrefsStore::new(config.prefs_file()).with_private_key(private_key);
    let desired = store
        .load()
        .with_context(|| format!("loading preferences {}", store.path().display()))?;
    tracing::info!(
        "Loaded {} peer(s), obfuscation: {}",
        desired.peers.len(),
        desired.obfuscation.compact()
    );

    // A fresh endpoint has no identity, so everything is written
    let overrides = config.effective_overrides();
    if !overrides.is_empty() {
        tracing::info!("Obfuscation overrides in effect");
    }
    let socket = UapiSocket::new(&config.device.uapi_socket);
    match socket.reconcile(&DeviceConfig::default(), &desired, &overrides).await {
        Ok(bytes) => tracing::info!("Configured endpoint ({} bytes of directives)", bytes),
        Err(e) => {
            tracing::error!("Failed to configure endpoint at {:?}: {}", socket.path(), e);
            return Err(e.into());
        }
    }

    let params = Arc::new(RwLock::new(desired.obfuscation.clone()));
    let server = Arc::new(NetworkServer::new(
        config.node.listen_address.clone(),
        params_handler(params),
    ));

    let running = {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.start().await })
    };

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    tracing::info!("Shutdown requested");
    server.stop();

    running.await.context("network server task")??;
    tracing::info!("WolfMask node stopped");
    Ok(())
}

/// Write a default configuration file
fn run_init(output: &Path, name: String) -> anyhow::Result<()> {
    let mut config = WolfMaskConfig::default();
    config.node.name = name;

    let body = toml::to_string_pretty(&config).context("encoding default configuration")?;
    let content = format!(
        "# WolfMask Configuration\n# Generated configuration file\n\n{}\n\
         # Query other nodes with `wolfmaskctl sync`:\n\
         # [[discovery.peers]]\n\
         # public_key = \"<base64 key>\"\n\
         # name = \"edge-2\"\n\
         # address = \"100.64.0.2:7655\"\n",
        body
    );

    std::fs::write(output, content)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure the device socket and discovery peers.");
    println!("Then start with: wolfmask start --config {}", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: &Path) -> anyhow::Result<()> {
    match WolfMaskConfig::from_file(config_path) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Node: {}", config.node.name);
            println!("  Listen Address: {}", config.node.listen_address);
            println!("  UAPI Socket: {}", config.device.uapi_socket.display());
            println!("  Preferences: {}", config.prefs_file().display());
            println!("  Discovery Peers: {}", config.discovery.peers.len());
            println!(
                "  Overrides: {}",
                if config.overrides.is_empty() { "none" } else { "set" }
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e.into())
        }
    }
}

/// Print the directive stream between two snapshots
fn run_uapi(config: WolfMaskConfig, previous: Option<&Path>, desired: &Path) -> anyhow::Result<()> {
    let previous = match previous {
        Some(path) => DeviceConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DeviceConfig::default(),
    };
    let desired = DeviceConfig::load(desired)
        .with_context(|| format!("loading {}", desired.display()))?;

    let text = to_uapi_string(&previous, &desired, &config.effective_overrides())?;
    print!("{}", text);
    Ok(())
}
