//! WolfMaskCtl - Command line tool for managing obfuscation parameters
//!
//! Usage:
//!   wolfmaskctl get              - Show the stored parameters
//!   wolfmaskctl set [JSON]       - Change parameters (interactive without JSON)
//!   wolfmaskctl reset            - Return to standard WireGuard
//!   wolfmaskctl validate         - Check the stored parameters
//!   wolfmaskctl sync             - Adopt parameters from an online peer

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfmask::config::WolfMaskConfig;
use wolfmask::network::NetworkClient;
use wolfmask::obfuscation::{validate, ObfuscationParams};
use wolfmask::prefs::{FilePrefsStore, PrefsEditor};
use wolfmask::prompt::Prompter;
use wolfmask::setup::prompt_params;
use wolfmask::sync::{discover_until, SyncOutcome, SyncSession};

/// WolfMask Obfuscation Control Tool
#[derive(Parser)]
#[command(name = "wolfmaskctl")]
#[command(about = "Inspect, edit and sync obfuscation parameters", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "wolfmask.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the stored obfuscation parameters
    Get,
    /// Change the obfuscation parameters
    Set {
        /// Parameters as JSON, e.g. '{"jc":4,"jmin":64,"jmax":96}'
        json: Option<String>,
    },
    /// Disable obfuscation (standard WireGuard)
    Reset {
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Check the stored parameters and report compatibility
    Validate,
    /// Query online peers and adopt one of their configurations
    Sync,
}

// ============ Main ============

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match WolfMaskConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))
    {
        Ok(config) => {
            let store = FilePrefsStore::new(config.prefs_file());
            match cli.command {
                Commands::Get => show_params(&store),
                Commands::Set { json } => set_params(&store, json.as_deref()),
                Commands::Reset { force } => reset_params(&store, force),
                Commands::Validate => validate_params(&store),
                Commands::Sync => sync_params(&config, &store).await,
            }
        }
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn stdin_prompter() -> Prompter<std::io::StdinLock<'static>, std::io::Stdout> {
    Prompter::new(std::io::stdin().lock(), std::io::stdout())
}

fn print_restart_hint() {
    println!();
    println!("Restart wolfmask to apply the new parameters to the tunnel.");
}

// ============ Commands ============

fn show_params(store: &FilePrefsStore) -> anyhow::Result<()> {
    let params = store.load()?.obfuscation;

    println!("Current obfuscation configuration:");
    print!("{}", params.detailed());
    if !params.is_standard() {
        println!("\nJSON format:\n{}", params.to_json()?);
    }
    Ok(())
}

fn set_params(store: &FilePrefsStore, json: Option<&str>) -> anyhow::Result<()> {
    let params = match json {
        Some(text) => ObfuscationParams::from_json(text).context("parsing parameters")?,
        None => {
            let current = store.load()?.obfuscation;
            let mut prompter = stdin_prompter();
            let mut rng = rand::thread_rng();
            match prompt_params(&mut prompter, &current, &mut rng)? {
                Some(params) => params,
                None => bail!("input ended before the configuration was complete"),
            }
        }
    };

    let desired = store
        .edit_obfuscation(params)
        .context("saving parameters")?;
    println!("Obfuscation configuration updated: {}", desired.obfuscation.compact());
    print_restart_hint();
    Ok(())
}

fn reset_params(store: &FilePrefsStore, force: bool) -> anyhow::Result<()> {
    if !force {
        let mut prompter = stdin_prompter();
        let answer = prompter.confirm("Disable obfuscation on this node? [y/N]: ", false)?;
        if answer != Some(true) {
            println!("Aborted.");
            return Ok(());
        }
    }

    store.edit_obfuscation(ObfuscationParams::default())?;
    println!("Obfuscation configuration reset to standard WireGuard.");
    print_restart_hint();
    Ok(())
}

fn validate_params(store: &FilePrefsStore) -> anyhow::Result<()> {
    let params = store.load()?.obfuscation;
    print!("{}", validate::report(&params));

    match params.clone().validated() {
        Ok(_) => println!("\n✓ Parameters are valid"),
        Err(e) => {
            println!("\n✗ Parameters are invalid: {}", e);
            bail!("invalid parameters");
        }
    }
    Ok(())
}

async fn sync_params(config: &WolfMaskConfig, store: &FilePrefsStore) -> anyhow::Result<()> {
    let peers = &config.discovery.peers;
    if peers.is_empty() {
        println!("No discovery peers configured in [[discovery.peers]].");
        return Ok(());
    }

    println!("Querying {} peer(s)...", peers.len());

    let options = config.discovery_options();
    let client = NetworkClient::new(
        config.local_public_key(),
        config.connect_timeout(),
        options.per_peer_timeout,
    );

    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let report = discover_until(peers, Arc::new(client), options, interrupt).await;
    for line in report.outcome_lines() {
        println!("  {}", line);
    }
    println!("\nDiscovery summary: {}\n", report.stats);

    // SIGINT stays routed to tokio once a listener was created, so the
    // blocking selection prompt needs its own exit path
    let exit_on_interrupt = tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!();
            std::process::exit(130);
        }
    });

    let session = SyncSession::new(&report);
    let outcome = tokio::task::block_in_place(|| {
        let mut prompter = stdin_prompter();
        session.run(&mut prompter, store)
    });
    exit_on_interrupt.abort();
    let outcome = outcome?;

    if let SyncOutcome::Applied { .. } = outcome {
        print_restart_hint();
    }
    Ok(())
}
