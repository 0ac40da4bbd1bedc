use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use gk_config::{ConfigMode, GateConfig, UnusedKeyPolicy};
use gk_schemas::{GlobalState, RepairReport};
use gk_store::{recover, JsonFileStateStore, RecoveryOrigin, StateStore};
use serde::Serialize;
use tracing::warn;

#[derive(Parser)]
#[command(name = "gk")]
#[command(about = "Rotating channel gatekeeper CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> local...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Inspect or repair the persisted gate state
    State {
        #[command(subcommand)]
        cmd: StateCmd,
    },
}

#[derive(Subcommand)]
enum StateCmd {
    /// Load and repair the state file in memory and print a summary. Writes nothing.
    Show {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,
    },

    /// Load, repair and write the state file back in the current schema.
    Repair {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Print what would be written without writing it.
        #[arg(long, default_value_t = false)]
        dry_run: bool,

        /// Overwrite an unreadable state file with a fresh state.
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct StateSummary<'a> {
    store: String,
    /// "fresh" | "restored" | "reset"
    origin: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    repairs: Option<&'a RepairReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reset_reason: Option<String>,
    schema_version: u32,
    active_index: usize,
    required_joins: u32,
    channels: Vec<ChannelSummary>,
}

#[derive(Serialize)]
struct ChannelSummary {
    index: usize,
    chat_id: i64,
    pending: usize,
    counted: usize,
    join_count: u32,
}

fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = gk_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::State { cmd } => match cmd {
            StateCmd::Show { config_paths } => {
                let cfg = load_offline_config(&config_paths)?;
                let store = JsonFileStateStore::new(cfg.state_path.clone());
                let recovery = recover(&store, cfg.channel_count());
                print_summary(&cfg, &store, &recovery.state, &recovery.origin)?;
            }

            StateCmd::Repair {
                config_paths,
                dry_run,
                yes,
            } => {
                let cfg = load_offline_config(&config_paths)?;
                let store = JsonFileStateStore::new(cfg.state_path.clone());
                let recovery = recover(&store, cfg.channel_count());

                if let RecoveryOrigin::Reset { reason } = &recovery.origin {
                    if !yes && !dry_run {
                        bail!(
                            "REPAIR_REFUSED: state file {} is unreadable ({reason}); \
                             rerun with --yes to replace it with a fresh state",
                            store.describe()
                        );
                    }
                }

                print_summary(&cfg, &store, &recovery.state, &recovery.origin)?;

                if dry_run {
                    println!("dry_run=true (nothing written)");
                } else {
                    store.save(&recovery.state)?;
                    println!("written={}", store.describe());
                }
            }
        },
    }

    Ok(())
}

/// Diagnostics go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}

fn load_offline_config(paths: &[String]) -> Result<GateConfig> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = gk_config::load_layered_yaml(&path_refs)?;
    let report = gk_config::report_unused_keys(
        ConfigMode::Offline,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !report.is_clean() {
        // Serve-only keys (telegram, http) are expected here.
        tracing::debug!(unused = ?report.unused_leaf_pointers, "keys not read offline");
    }
    loaded.gate()
}

fn print_summary(
    cfg: &GateConfig,
    store: &JsonFileStateStore,
    state: &GlobalState,
    origin: &RecoveryOrigin,
) -> Result<()> {
    let (origin_name, repairs, reset_reason) = match origin {
        RecoveryOrigin::Fresh => ("fresh", None, None),
        RecoveryOrigin::Restored { report } => ("restored", Some(report), None),
        RecoveryOrigin::Reset { reason } => {
            warn!(error = %reason, "state file unreadable");
            ("reset", None, Some(reason.to_string()))
        }
    };
    let summary = StateSummary {
        store: store.describe(),
        origin: origin_name,
        repairs,
        reset_reason,
        schema_version: state.schema_version,
        active_index: state.active_index,
        required_joins: cfg.required_joins,
        channels: state
            .channels
            .iter()
            .zip(cfg.channels.iter())
            .enumerate()
            .map(|(index, (p, c))| ChannelSummary {
                index,
                chat_id: c.chat_id,
                pending: p.pending.len(),
                counted: p.counted.len(),
                join_count: p.join_count,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
