use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use wizardpi_core::bridge::{HostSurface, SessionBridge};
use wizardpi_core::config::{self, Config, StorageBackend};
use wizardpi_core::session::SessionCache;
use wizardpi_core::store;
use wizardpi_core::sync::{RemoteSyncClient, SessionSync, SyncTransport};
use wizardpi_core::types::{ActionStep, UserAction, UserId};
use wizardpi_core::util::{blob_preview, ensure_dir};

#[derive(Parser)]
#[command(
    name = "wizardpi",
    about = "Wizard Pi session cache and sync client",
    version = wizardpi_core::VERSION,
)]
struct Cli {
    /// Path to config.json (defaults to ~/.wizardpi/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Keep sessions in memory only for this run
    #[arg(long, global = true)]
    ephemeral: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the session store, creating it if needed
    Init,
    /// Store a session blob read from a file
    Save {
        #[arg(short, long)]
        user: UserId,
        /// File holding the raw session bytes
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print or export a stored session
    Get {
        #[arg(short, long)]
        user: UserId,
        /// Write the raw bytes here instead of printing a preview
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Delete a stored session
    Delete {
        #[arg(short, long)]
        user: UserId,
    },
    /// Check whether a session is stored
    Exists {
        #[arg(short, long)]
        user: UserId,
    },
    /// Import `<dir>/<user>.session` exported from another device
    Seed {
        #[arg(short, long)]
        user: UserId,
        #[arg(short, long, default_value = "sessions")]
        dir: PathBuf,
    },
    /// Send one action to the backend and persist the returned session
    Send {
        #[arg(short, long)]
        user: UserId,
        #[arg(long)]
        username: String,
        /// Free-form message text
        #[arg(short, long, conflicts_with = "step", required_unless_present = "step")]
        action: Option<String>,
        /// Lifecycle step (MINI_APP_INITIALIZED, LOGIN_START, SIGN_OUT)
        #[arg(short, long)]
        step: Option<ActionStep>,
    },
    /// Look up a user's avatar URL
    Avatar {
        #[arg(short, long)]
        user: UserId,
    },
    /// Serve session operations to a host process over stdin/stdout
    Bridge,
    /// Write a default config and create the data directory
    Onboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries bridge replies, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    // Onboarding writes the config, so it must not require one.
    if let Commands::Onboard = cli.command {
        return cmd_onboard(cli.config.as_deref());
    }
    let cfg = resolve_config(cli.config.as_deref(), cli.ephemeral)?;

    match cli.command {
        Commands::Init => cmd_init(&cfg).await?,
        Commands::Save { user, file } => cmd_save(&cfg, user, &file).await?,
        Commands::Get { user, out } => cmd_get(&cfg, user, out.as_deref()).await?,
        Commands::Delete { user } => cmd_delete(&cfg, user).await?,
        Commands::Exists { user } => cmd_exists(&cfg, user).await?,
        Commands::Seed { user, dir } => cmd_seed(&cfg, user, &dir).await?,
        Commands::Send {
            user,
            username,
            action,
            step,
        } => cmd_send(&cfg, user, &username, action, step).await?,
        Commands::Avatar { user } => cmd_avatar(&cfg, user).await?,
        Commands::Bridge => cmd_bridge(&cfg).await?,
        Commands::Onboard => unreachable!("handled before config is loaded"),
    }

    Ok(())
}

const DEFAULT_LOG_FILTER: &str = "wizardpi=info,wizardpi_core=info";

/// `RUST_LOG` wins outright when set; otherwise log our crates at info.
fn log_filter(rust_log: Option<String>) -> EnvFilter {
    match rust_log {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::new(DEFAULT_LOG_FILTER),
    }
}

fn resolve_config(path: Option<&Path>, ephemeral: bool) -> Result<Config> {
    let mut cfg = match path {
        Some(p) => {
            let mut cfg = config::load_config_file(p)?;
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        None => config::load_config_from_env(),
    };
    if ephemeral {
        cfg.storage.backend = StorageBackend::Memory;
    }
    Ok(cfg)
}

async fn open_cache(cfg: &Config) -> Result<Arc<SessionCache>> {
    let cache = Arc::new(SessionCache::new(store::open_store(cfg)));
    cache
        .init_db()
        .await
        .with_context(|| format!("opening {} session store", cache.engine()))?;
    Ok(cache)
}

async fn cmd_init(cfg: &Config) -> Result<()> {
    let cache = open_cache(cfg).await?;
    println!("Session store ready ({})", cache.engine());
    if cfg.storage.backend == StorageBackend::File {
        println!("Data dir: {}", cfg.data_dir().display());
    }
    Ok(())
}

async fn cmd_save(cfg: &Config, user: UserId, file: &Path) -> Result<()> {
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let cache = open_cache(cfg).await?;
    cache.save_user_session(user, &data).await?;
    println!("Saved session for user {} {}", user, blob_preview(&data, 8));
    Ok(())
}

async fn cmd_get(cfg: &Config, user: UserId, out: Option<&Path>) -> Result<()> {
    let cache = open_cache(cfg).await?;
    let Some(data) = cache.get_user_session(user).await? else {
        println!("No session for user {}", user);
        return Ok(());
    };

    match out {
        Some(path) => {
            tokio::fs::write(path, &data)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {} bytes to {}", data.len(), path.display());
        }
        None => println!("{}", blob_preview(&data, 32)),
    }
    Ok(())
}

async fn cmd_delete(cfg: &Config, user: UserId) -> Result<()> {
    let cache = open_cache(cfg).await?;
    cache.delete_user_session(user).await?;
    println!("Deleted session for user {}", user);
    Ok(())
}

async fn cmd_exists(cfg: &Config, user: UserId) -> Result<()> {
    let cache = open_cache(cfg).await?;
    let exists = cache.check_session_exists(user).await?;
    println!("{}", exists);
    Ok(())
}

async fn cmd_seed(cfg: &Config, user: UserId, dir: &Path) -> Result<()> {
    let cache = open_cache(cfg).await?;
    let n = cache.seed_from_dir(user, dir).await?;
    println!("Seeded {} bytes for user {}", n, user);
    Ok(())
}

async fn cmd_send(
    cfg: &Config,
    user: UserId,
    username: &str,
    action: Option<String>,
    step: Option<ActionStep>,
) -> Result<()> {
    let action = match (action, step) {
        (Some(text), None) => UserAction::Message(text),
        (None, Some(step)) => UserAction::Step(step),
        _ => bail!("pass exactly one of --action or --step"),
    };

    let cache = open_cache(cfg).await?;
    let client = RemoteSyncClient::new(cfg)?;
    let sync = SessionSync::new(cache, Arc::new(client));

    let resp = sync.perform(user, username, action).await?;
    println!("{}", resp.message);
    if !resp.buttons.is_empty() {
        println!("Buttons: {}", resp.buttons.join(" | "));
    }
    if !resp.action_buttons.is_empty() {
        println!("Actions: {}", resp.action_buttons.join(" | "));
    }
    if let Some(stage) = resp.stage {
        println!("Stage: {:?}", stage);
    }
    Ok(())
}

async fn cmd_avatar(cfg: &Config, user: UserId) -> Result<()> {
    let client = RemoteSyncClient::new(cfg)?;
    match client.fetch_avatar(user).await {
        Some(url) => println!("{}", url),
        None => println!("No avatar for user {}", user),
    }
    Ok(())
}

async fn cmd_bridge(cfg: &Config) -> Result<()> {
    let Some(mut surface) = HostSurface::detect() else {
        bail!("bridge expects a host on stdin (pipe requests or set WIZARDPI_HOST)");
    };

    // The host calls initDB itself; the store starts closed.
    let cache = Arc::new(SessionCache::new(store::open_store(cfg)));
    SessionBridge::new(cache).install(&mut surface)?;
    tracing::info!("Bridge ready: {}", surface.op_names().join(", "));

    let reader = tokio::io::BufReader::new(tokio::io::stdin());
    let answered = surface.serve(reader, tokio::io::stdout()).await?;
    tracing::info!("Host closed the bridge after {} requests", answered);
    Ok(())
}

fn cmd_onboard(path: Option<&Path>) -> Result<()> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(config::get_config_path);

    if config_path.exists() {
        println!("Config already exists at {}", config_path.display());
        println!("Delete it first to re-onboard.");
        return Ok(());
    }

    let cfg = Config::default();
    config::save_config(&cfg, Some(&config_path))?;
    println!("Created config at {}", config_path.display());

    let data_dir = ensure_dir(&cfg.data_dir())?;
    println!("Created data dir at {}", data_dir.display());

    println!("\nwizardpi is ready!");
    println!("\nNext steps:");
    println!("  1. Point sync.baseUrl in {} at your backend", config_path.display());
    println!("  2. Log in: wizardpi send --user <ID> --username <NAME> --step LOGIN_START");
    Ok(())
}
