use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;

use dockterm::api::{self, AppState};
use dockterm::auth::{IdentityGate, TokenAuthority};
use dockterm::container::{ContainerRuntime, DockerRuntime, FlavorTable};
use dockterm::session::AdmissionController;
use dockterm::settings::Settings;
use dockterm::ws;

const APP_NAME: &str = "dockterm";

fn main() {
    if let Err(err) = try_main() {
        let _ = writeln!(io::stderr(), "{err:?}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let config_file = resolve_config_file(cli.common.config.clone())?;

    match cli.command {
        Command::Serve(cmd) => {
            let mut settings = Settings::load(&config_file)?;
            cmd.apply_to(&mut settings);
            init_logging(&cli.common, &settings);
            run_serve(settings)
        }
        Command::Init(cmd) => handle_init(&config_file, cmd),
        Command::Config { command } => handle_config(&config_file, command),
    }
}

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "dockterm - single-session container terminal orchestrator.",
    propagate_version = true
)]
struct Cli {
    #[command(flatten)]
    common: CommonOpts,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Args)]
struct CommonOpts {
    /// Override the config file path
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Reduce output to only errors
    #[arg(short, long, action = clap::ArgAction::SetTrue, global = true)]
    quiet: bool,
    /// Increase logging verbosity (stackable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Enable trace logging (overrides other levels)
    #[arg(long, global = true)]
    trace: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the orchestrator server
    Serve(ServeCommand),
    /// Create the default configuration file
    Init(InitCommand),
    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Debug, Clone, Args)]
struct ServeCommand {
    /// Host address to bind to
    #[arg(long)]
    host: Option<String>,
    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,
    /// Maximum simultaneous shell sessions
    #[arg(long, value_name = "N")]
    max_sessions: Option<usize>,
    /// Path to the credential record JSON
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,
}

impl ServeCommand {
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(ref host) = self.host {
            settings.server.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(max) = self.max_sessions {
            settings.session.max_connections = max;
        }
        if let Some(ref credentials) = self.credentials {
            settings.credentials.file = credentials.clone();
        }
    }
}

#[derive(Debug, Clone, Args)]
struct InitCommand {
    /// Recreate configuration even if it already exists
    #[arg(long = "force")]
    force: bool,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Output the effective configuration
    Show,
    /// Print the resolved config file path
    Path,
}

fn resolve_config_file(override_path: Option<PathBuf>) -> Result<PathBuf> {
    match override_path {
        Some(path) if path.is_dir() => Ok(path.join("config.toml")),
        Some(path) => Ok(path),
        None => {
            let base = dirs::config_dir().ok_or_else(|| anyhow!("no config directory available"))?;
            Ok(base.join(APP_NAME).join("config.toml"))
        }
    }
}

fn init_logging(common: &CommonOpts, settings: &Settings) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let level = if common.quiet {
        "error"
    } else if common.trace {
        "trace"
    } else {
        match common.verbose {
            0 => settings.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{APP_NAME}={level},tower_http={level}")));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .ok();
}

fn handle_init(config_file: &Path, cmd: InitCommand) -> Result<()> {
    if config_file.exists() && !cmd.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            config_file.display()
        ));
    }
    Settings::write_default(config_file)?;
    println!("wrote {}", config_file.display());
    Ok(())
}

fn handle_config(config_file: &Path, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show => {
            let settings = Settings::load(config_file)?;
            println!(
                "{}",
                toml::to_string_pretty(&settings).context("serializing configuration")?
            );
            Ok(())
        }
        ConfigCommand::Path => {
            println!("{}", config_file.display());
            Ok(())
        }
    }
}

#[tokio::main]
async fn run_serve(settings: Settings) -> Result<()> {
    handle_serve(settings).await
}

async fn handle_serve(settings: Settings) -> Result<()> {
    let gate = IdentityGate::from_file(&settings.credentials.file)?;

    std::fs::create_dir_all(&settings.paths.staging_dir).with_context(|| {
        format!(
            "creating staging directory {}",
            settings.paths.staging_dir.display()
        )
    })?;

    let runtime: Arc<dyn ContainerRuntime> =
        Arc::new(DockerRuntime::connect(settings.container.socket.as_deref())?);
    let flavors = FlavorTable::with_overrides(&settings.container.images);
    let tokens = TokenAuthority::new(settings.session.grace_period());
    let admission = AdmissionController::new(settings.session.max_connections);

    let state = AppState::new(
        gate,
        tokens,
        admission,
        runtime,
        flavors,
        settings.paths.staging_dir.clone(),
    );

    let heartbeat = ws::spawn_heartbeat(
        state.channels.clone(),
        settings.session.heartbeat_interval(),
    );

    let app = api::create_router(state.clone());

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr)
        .await
        .context("binding to address")?;
    info!("listening on http://{addr}");

    let shutdown_state = state.clone();
    let shutdown_signal = async move {
        let ctrl_c = async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install Ctrl+C handler");
        };

        #[cfg(unix)]
        let terminate = async {
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install signal handler")
                .recv()
                .await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }

        info!("shutdown signal received, disposing sessions");
        for (origin, session) in shutdown_state.registry.drain() {
            shutdown_state.runtime.teardown(&session.container_id).await;
            info!(%origin, container_id = %session.container_id, "session terminal disposed");
        }
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await
    .context("running server")?;

    heartbeat.abort();
    Ok(())
}
