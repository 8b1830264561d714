//! Binary entrypoint for the idlequest CLI.
//!
//! Commands:
//! - `start` - run the game with the console transport
//! - `init` - write a starter `config.toml` and create the data directory
//! - `status` - print a summary of the saved game
//! - `backup create|list|verify|restore` - manage data backups
//! - `migrate --to <flat|relational>` - copy the saved game into the other store format
//!
//! See the library crate docs for module-level details: `idlequest::`.
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;

use idlequest::config::{Config, StoreFormat};
use idlequest::game::format::duration;
use idlequest::server::GameServer;
use idlequest::storage::backup::{BackupKind, BackupManager};
use idlequest::storage::{migrate, open_store};
use idlequest::transport::console::ConsoleTransport;

#[derive(Parser)]
#[command(name = "idlequest")]
#[command(about = "An idle role-playing game for chat channels")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the game on the console transport
    Start,
    /// Initialize a new configuration
    Init,
    /// Show saved game status
    Status,
    /// Manage backups of the data files
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Copy the saved game into another store format
    Migrate {
        /// Destination format: flat or relational
        #[arg(long, value_parser = parse_format)]
        to: StoreFormat,
        /// Destination data directory (defaults to the configured one)
        #[arg(long)]
        data_dir: Option<String>,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Take a manual backup now
    Create {
        #[arg(short, long)]
        label: Option<String>,
    },
    /// List backups, newest first
    List,
    /// Check a backup's checksum
    Verify { id: String },
    /// Unpack a backup into a directory
    Restore { id: String, dest: String },
}

fn parse_format(s: &str) -> Result<StoreFormat, String> {
    match s.to_ascii_lowercase().as_str() {
        "flat" => Ok(StoreFormat::Flat),
        "relational" | "sqlite" => Ok(StoreFormat::Relational),
        other => Err(format!("unknown store format '{other}' (flat or relational)")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new configuration");
            Config::create_default(&cli.config).await?;
            let cfg = Config::default();
            tokio::fs::create_dir_all(&cfg.storage.data_dir).await?;
            info!("Configuration file created at {}", cli.config);
            info!("Data directory ready at {}", cfg.storage.data_dir);
        }
        Commands::Start => {
            let config = load_config(&cli.config, cli.verbose).await?;
            info!("Starting idlequest v{}", env!("CARGO_PKG_VERSION"));
            let store = open_store(&config.storage)?;
            let ConsoleTransport { events, sink, .. } = ConsoleTransport::spawn(config.throttle.transport_buffer);
            let mut server = GameServer::new(config, store, Box::new(sink))?;
            server.run(events).await?;
        }
        Commands::Status => {
            let config = load_config(&cli.config, cli.verbose).await?;
            show_status(&config)?;
        }
        Commands::Backup { action } => {
            let config = load_config(&cli.config, cli.verbose).await?;
            let store = open_store(&config.storage)?;
            let mut manager = BackupManager::new(
                store.backup_sources(),
                config.storage.backup_dir.clone().into(),
                config.storage.backup_keep,
            )?;
            match action {
                BackupAction::Create { label } => {
                    let meta = manager.create_backup(label, BackupKind::Manual)?;
                    println!("Created {} ({} bytes, {} files)", meta.id, meta.size_bytes, meta.files.len());
                }
                BackupAction::List => {
                    for b in manager.list_backups() {
                        println!(
                            "{}  {}  {:?}  {} bytes{}{}",
                            b.id,
                            b.created_at.format("%Y-%m-%d %H:%M:%S"),
                            b.kind,
                            b.size_bytes,
                            if b.verified { "  verified" } else { "" },
                            b.label.map(|l| format!("  \"{l}\"")).unwrap_or_default()
                        );
                    }
                }
                BackupAction::Verify { id } => {
                    if manager.verify_backup(&id)? {
                        println!("{id}: OK");
                    } else {
                        return Err(anyhow!("{id}: checksum mismatch"));
                    }
                }
                BackupAction::Restore { id, dest } => {
                    manager.restore_backup(&id, std::path::Path::new(&dest))?;
                    println!("Restored {id} into {dest}/data");
                }
            }
        }
        Commands::Migrate { to, data_dir } => {
            let config = load_config(&cli.config, cli.verbose).await?;
            let mut dest = config.storage.clone();
            dest.format = to;
            if let Some(dir) = data_dir {
                dest.data_dir = dir;
            }
            let report = migrate(&config.storage, &dest)?;
            println!(
                "Migrated {} characters ({} unreadable records skipped). Set storage.format = \"{}\" to use it.",
                report.characters.len(),
                report.dropped,
                match to {
                    StoreFormat::Flat => "flat",
                    StoreFormat::Relational => "relational",
                }
            );
        }
    }

    Ok(())
}

async fn load_config(path: &str, verbosity: u8) -> Result<Config> {
    let config = Config::load(path).await?;
    init_logging(&Some(config.clone()), verbosity);
    Ok(config)
}

fn show_status(config: &Config) -> Result<()> {
    let mut store = open_store(&config.storage)?;
    let loaded = store.load()?;
    println!("=== idlequest Status ===");
    println!("Store: {}", store.describe());
    println!("Characters: {}", loaded.characters.len());
    println!(
        "Online at last save: {}",
        loaded.characters.iter().filter(|c| c.online && !c.archived).count()
    );
    if loaded.dropped > 0 {
        println!("Unreadable records: {}", loaded.dropped);
    }
    let mut ranked: Vec<_> = loaded.characters.iter().filter(|c| !c.archived).collect();
    ranked.sort_by(|a, b| b.level.cmp(&a.level).then(a.ttl.cmp(&b.ttl)));
    for (n, c) in ranked.iter().take(5).enumerate() {
        println!("  #{} {}, level {} {} (next in {})", n + 1, c.name, c.level, c.class, duration(c.ttl));
    }
    match loaded.quest {
        Some(q) if q.is_active() => println!("Quest: {} ({})", q.description, q.participants.join(", ")),
        Some(q) => println!("Quest: none running (next at {})", q.next_quest_at),
        None => println!("Quest: never started"),
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    let file = config
        .as_ref()
        .and_then(|c| c.logging.file.as_ref())
        .and_then(|path| std::fs::OpenOptions::new().create(true).append(true).open(path).ok());
    if let Some(f) = file {
        let write_mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
        // Foreground runs also echo to the console.
        let is_tty = atty::is(atty::Stream::Stdout);
        builder.format(move |fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            let line = format!("{} [{}] {}", ts, record.level(), record.args());
            if let Ok(mut guard) = write_mutex.lock() {
                let _ = writeln!(guard, "{}", line);
            }
            if is_tty {
                writeln!(fmt, "{}", line)
            } else {
                Ok(())
            }
        });
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}
