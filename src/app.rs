use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use crate::core::{
    command_channel::{ChannelState, CommandChannel},
    config::{ConfigManager, Profile, Settings},
    coordinator::{Coordinator, CoordinatorEvent},
    feed::{self, FEED_POLL_INTERVAL},
    notifier::{HttpNotifier, Notifier},
};

/// Time left for the final Offline post before the runtime is torn down.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);
const QUEUE_CAPACITY: usize = 256;

fn init_logging() {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

/// First argument, else `$HOME/.config/ha-signal-bridge`.
fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::args_os().nth(1) {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".config/ha-signal-bridge")
}

fn describe_command(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "ON",
        Some(false) => "OFF",
        None => "unknown",
    }
}

pub fn run() {
    init_logging();

    let config_manager = ConfigManager::new(config_dir());
    let settings = config_manager.load();
    if !config_manager.path().exists() {
        match config_manager.save(&settings) {
            Ok(()) => log::info!("Wrote default settings to {}", config_manager.path().display()),
            Err(e) => log::warn!("Could not write default settings: {}", e),
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start async runtime: {}", e);
            return;
        }
    };
    runtime.block_on(serve(settings));
}

async fn serve(settings: Settings) {
    log::info!(
        "Bridge starting ({:?} profile), feed {}",
        settings.profile,
        settings.feed_path.display()
    );

    let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
    let notifier: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(&settings, Handle::current()));

    let command_state = Arc::new(ChannelState::default());
    let command_task = if settings.profile == Profile::Full {
        match CommandChannel::from_settings(&settings, command_state.clone()) {
            Some(channel) => Some(tokio::spawn(async move {
                if let Err(e) = channel.run().await {
                    log::error!("Command channel stopped: {}", e);
                }
            })),
            None => {
                log::info!("No hub url configured, command channel disabled");
                None
            }
        }
    } else {
        None
    };

    let feed_path = settings.feed_path.clone();
    let feed_tx = tx.clone();
    let feed_task = tokio::spawn(async move {
        if let Err(e) = feed::pump(feed_path, feed_tx, FEED_POLL_INTERVAL).await {
            log::debug!("Feed pump stopped: {}", e);
        }
    });

    let shutdown_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested");
            let _ = shutdown_tx.send(CoordinatorEvent::Shutdown).await;
        }
    });

    let coordinator = Coordinator::new(settings, notifier, tx, Instant::now());
    coordinator.run(rx).await;

    feed_task.abort();
    if let Some(task) = command_task {
        task.abort();
        log::info!(
            "Command channel {:?}, last command state {}",
            command_state.phase(),
            describe_command(command_state.latest_value())
        );
    }
    tokio::time::sleep(SHUTDOWN_GRACE).await;
}
