use std::path::PathBuf;

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use joycursor::config::{EngineSettings, SinkKind};
use joycursor::controller::GilrsSource;
use joycursor::engine::{DriverSettings, EngineHandle, PollDriver};
use joycursor::output::{InputSink, TracingSink};
use joycursor::persistence::{JsonProfileStore, PersistenceWorker};

#[derive(Parser)]
#[command(name = "joycursor")]
#[command(author, version, about = "Use a gamepad as mouse and keyboard")]
struct Cli {
    /// Settings file (default: ~/.config/joycursor/engine.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log actions instead of injecting them
    #[arg(long)]
    dry_run: bool,

    /// Log filter, e.g. "debug" or "joycursor=trace" (overrides RUST_LOG)
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.log_level.as_deref())?;

    let config_path = cli.config.unwrap_or_else(EngineSettings::default_path);
    let settings = EngineSettings::load_or_create(&config_path)
        .await
        .map_err(|e| eyre!("Failed to load settings: {}", e))?;
    info!("Using settings from {}", config_path.display());

    let source =
        GilrsSource::create().map_err(|e| eyre!("Failed to open controller input: {}", e))?;
    let sink = create_sink(settings.sink, cli.dry_run);

    let store = JsonProfileStore::open(settings.store_paths())
        .await
        .map_err(|e| eyre!("Failed to open mapping store: {}", e))?;
    info!(
        "Mappings: {}, controllers: {}",
        store.paths().mappings.display(),
        store.paths().controllers.display()
    );

    let (persist_tx, persistence_worker) = PersistenceWorker::spawn();
    let driver = PollDriver::create(
        Box::new(source),
        sink,
        Box::new(store),
        DriverSettings::from(&settings),
    )
    .with_persistence(persist_tx);

    let mut engine = EngineHandle::spawn(driver, settings.poll_interval());
    info!("joycursor running, press Ctrl+C to quit");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("Failed to listen for Ctrl+C: {}", e))?;
    info!("Ctrl+C received, shutting down");

    engine
        .shutdown()
        .await
        .map_err(|e| eyre!("Engine shutdown failed: {}", e))?;
    persistence_worker
        .join()
        .await
        .map_err(|e| eyre!("Persistence worker failed: {}", e))?;

    info!("Bye");
    Ok(())
}

fn setup(log_level: Option<&str>) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if let Some(level) = log_level {
        std::env::set_var("RUST_LOG", level)
    } else if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn create_sink(kind: SinkKind, dry_run: bool) -> Box<dyn InputSink> {
    if dry_run || kind == SinkKind::Log {
        info!("Dry run: actions are logged, not injected");
        return Box::new(TracingSink);
    }
    uinput_sink().unwrap_or_else(|| {
        warn!("Falling back to logging sink");
        Box::new(TracingSink)
    })
}

#[cfg(target_os = "linux")]
fn uinput_sink() -> Option<Box<dyn InputSink>> {
    use joycursor::output::uinput::{UinputSink, DEVICE_NAME};

    match UinputSink::new(DEVICE_NAME) {
        Ok(sink) => Some(Box::new(sink)),
        Err(e) => {
            warn!("{} (is /dev/uinput writable?)", e);
            None
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn uinput_sink() -> Option<Box<dyn InputSink>> {
    warn!("Virtual input devices are only supported on Linux");
    None
}
