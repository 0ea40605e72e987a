//! Main application entry point for the herald chat server
//!
//! Provides CLI interface, configuration loading, and startup of the chat
//! core: channel registry, profile persistence, and cross-server messaging.

use clap::{Arg, Command};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use toml;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use herald_core::{
    ChannelRegistry, ChannelsConfig, JsonFileStore, MemoryBus, MemoryBusFactory, Messaging,
    PlayerRegistry, SaveScheduler, SignatureCache, StaticPermissions, DEFAULT_SAVE_INTERVAL,
    DEFAULT_SIGNATURE_CAPACITY,
};
use herald_events::{create_event_bus, EventBus};

// ============================================================================
// Configuration
// ============================================================================

/// Application configuration loaded from TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server identity and storage
    pub server: ServerSettings,
    /// Cross-server messaging configuration
    pub messaging: MessagingSettings,
    /// Profile save scheduling
    pub saves: SaveSettings,
    /// Chat channel configuration
    pub channels: ChannelsConfig,
    /// Logging configuration
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Display name used in logs
    pub name: String,
    /// Directory player profiles are persisted under
    pub data_directory: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingSettings {
    /// How many recent messages stay deletable
    pub signature_cache_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveSettings {
    /// Seconds between periodic profile flushes
    pub interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
    /// Log to file
    pub file_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                name: "herald".to_string(),
                data_directory: "data/players".to_string(),
            },
            messaging: MessagingSettings {
                signature_cache_size: DEFAULT_SIGNATURE_CAPACITY,
            },
            saves: SaveSettings {
                interval_seconds: DEFAULT_SAVE_INTERVAL.as_secs(),
            },
            channels: ChannelsConfig::default(),
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }
}

// ============================================================================
// CLI Interface
// ============================================================================

/// Command line arguments
#[derive(Debug, Clone)]
pub struct CliArgs {
    pub config_path: PathBuf,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub json_logs: bool,
}

impl CliArgs {
    /// Parse command line arguments
    pub fn parse() -> Self {
        let matches = Command::new("Herald Chat Server")
            .version("0.1.0")
            .about("Cross-server chat distribution for game server fleets")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("herald.toml"),
            )
            .arg(
                Arg::new("data-dir")
                    .short('d')
                    .long("data-dir")
                    .value_name("DIR")
                    .help("Player profile storage directory"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(clap::ArgAction::SetTrue),
            )
            .get_matches();

        Self {
            config_path: PathBuf::from(
                matches
                    .get_one::<String>("config")
                    .expect("Default config path should always be set"),
            ),
            data_dir: matches.get_one::<String>("data-dir").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

/// Initialize logging system
fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        // JSON formatting with thread info
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    } else {
        // Human-readable formatting with thread info
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    }

    if config.file_path.is_some() {
        warn!("Log file output is not supported yet; logging to stdout");
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

// ============================================================================
// Signal Handling
// ============================================================================

/// Setup graceful shutdown signal handling
async fn setup_signal_handlers() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => {
                info!("📡 Received SIGINT");
            }
            _ = sigterm.recv() => {
                info!("📡 Received SIGTERM");
            }
        }
    }

    #[cfg(windows)]
    {
        signal::ctrl_c().await?;
        info!("📡 Received Ctrl+C");
    }

    Ok(())
}

// ============================================================================
// Application
// ============================================================================

/// Main application struct wiring the chat core together
pub struct Application {
    config: AppConfig,
    events: Arc<EventBus>,
    channels: Arc<ChannelRegistry>,
    messaging: Arc<Messaging>,
    scheduler: Arc<SaveScheduler>,
}

impl Application {
    /// Create new application from CLI arguments
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        // Load configuration first (before logging setup)
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(data_dir) = args.data_dir {
            config.server.data_directory = data_dir.to_string_lossy().to_string();
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {}", e).into());
        }

        // Setup logging
        setup_logging(&config.logging, args.json_logs)?;

        // Display banner after logging is setup
        display_banner();

        // Wire the chat core
        let events = create_event_bus();
        let players = PlayerRegistry::new(events.clone());
        let permissions = Arc::new(StaticPermissions::new());

        let channels = Arc::new(ChannelRegistry::new(permissions, players.clone()));
        channels.reload(&config.channels)?;

        let signatures = Arc::new(SignatureCache::new(config.messaging.signature_cache_size));
        let store = Arc::new(JsonFileStore::new(&config.server.data_directory));
        let scheduler = SaveScheduler::new(players, store);
        scheduler.watch(&events);

        // Standalone deployments run on an in-process bus. Fleet deployments
        // swap in a factory backed by their broker here.
        let transport = MemoryBusFactory::new(MemoryBus::new());
        let messaging = Arc::new(Messaging::new(
            events.clone(),
            signatures,
            Arc::new(transport),
        ));

        info!("🚀 Herald Chat Server v{}", env!("CARGO_PKG_VERSION"));
        info!(
            "📂 Config: {} | Profiles: {}",
            args.config_path.display(),
            config.server.data_directory
        );

        Ok(Self {
            config,
            events,
            channels,
            messaging,
            scheduler,
        })
    }

    /// Run the application until a shutdown signal arrives
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting {} chat node", self.config.server.name);
        info!("📋 Configuration Summary:");
        info!("  💬 Channels: {}", self.channels.len());
        info!(
            "  🗑 Deletable message window: {}",
            self.config.messaging.signature_cache_size
        );
        info!(
            "  💾 Profile save interval: {}s",
            self.config.saves.interval_seconds
        );

        // Bring messaging online. The library connects lazily; a relay node
        // wants to know at boot whether the transport is reachable.
        let manager = self.messaging.manager().await?;
        info!("✅ Messaging online as server {}", manager.server_id());

        // Start periodic profile persistence
        self.scheduler
            .run_periodic(Duration::from_secs(self.config.saves.interval_seconds));

        // Start monitoring task for real-time statistics
        let monitoring_handle = {
            let events = self.events.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                let mut last_events_published = 0u64;

                loop {
                    interval.tick().await;

                    let stats = events.stats();
                    let events_this_period = stats.events_published - last_events_published;
                    last_events_published = stats.events_published;

                    info!(
                        "📊 System Health - {} events/min | {} handlers",
                        events_this_period, stats.total_subscriptions
                    );
                }
            })
        };

        info!("✅ Herald is now running!");
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        setup_signal_handlers().await?;

        info!("🛑 Shutdown signal received, initiating graceful shutdown...");

        // Cancel monitoring first
        monitoring_handle.abort();

        // Stop relaying before the final flush so no new remote profile
        // changes land mid-save.
        if let Err(e) = self.messaging.shutdown().await {
            warn!("Messaging shutdown reported an error: {}", e);
        }

        let report = self.scheduler.flush_on_shutdown().await;
        if report.is_clean() {
            info!("💾 Final flush saved {} profiles", report.saved.len());
        } else {
            error!(
                "💾 Final flush saved {} profiles, {} FAILED",
                report.saved.len(),
                report.failed.len()
            );
        }

        let final_stats = self.events.stats();
        info!("✅ Herald shutdown complete");
        info!("📊 Final Statistics:");
        info!("  - Total events published: {}", final_stats.events_published);
        info!("  - Handlers registered: {}", final_stats.total_subscriptions);

        Ok(())
    }
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Create and run application
    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Failed to start application: {:?}", e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Utilities and Helpers
// ============================================================================

/// Display startup banner using proper logging
fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🌐 HERALD SERVER 🌐           ║");
    info!("║               v{}                     ║", version);
    info!("║                                          ║");
    info!("║  Cross-Server Chat Distribution          ║");
    info!("║  for Game Server Fleets                  ║");
    info!("║                                          ║");
    info!("║  📨 Fleet-Wide Chat Relay                ║");
    info!("║  🗑  Remote Message Deletion              ║");
    info!("║  👤 Profile Sync + Persistence           ║");
    info!("║  💬 Configurable Channels                ║");
    info!("╚══════════════════════════════════════════╝");
}

/// Configuration validation
impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Validate server identity
        if self.server.name.is_empty() {
            return Err("Server name cannot be empty".to_string());
        }

        if self.server.data_directory.is_empty() {
            return Err("Data directory cannot be empty".to_string());
        }

        // Validate messaging settings
        if self.messaging.signature_cache_size == 0 {
            return Err("Signature cache size must be at least 1".to_string());
        }

        // Validate save scheduling
        if self.saves.interval_seconds == 0 {
            return Err("Save interval must be at least 1 second".to_string());
        }

        // Validate channel configuration
        if let Err(e) = self.channels.validate() {
            return Err(format!("Channel configuration invalid: {}", e));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {:?}",
                self.logging.level, valid_levels
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        assert_eq!(config.messaging.signature_cache_size, 10);
        assert_eq!(config.saves.interval_seconds, 300);
        assert_eq!(config.channels.default_channel, "global");
    }

    #[tokio::test]
    async fn test_config_validation() {
        let mut config = AppConfig::default();

        // Test invalid log level
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        // Test zero cache size
        config.logging.level = "info".to_string();
        config.messaging.signature_cache_size = 0;
        assert!(config.validate().is_err());

        // Test broken channel config
        config.messaging.signature_cache_size = 10;
        config.channels.default_channel = "missing".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_parsing() {
        // This would require more setup to test properly with clap
        // For now, we'll just test that the structure is correct
        let args = CliArgs {
            config_path: PathBuf::from("test.toml"),
            data_dir: Some(PathBuf::from("test_data")),
            log_level: Some("debug".to_string()),
            json_logs: true,
        };

        assert_eq!(args.config_path, PathBuf::from("test.toml"));
        assert_eq!(args.data_dir, Some(PathBuf::from("test_data")));
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert_eq!(args.json_logs, true);
    }

    #[tokio::test]
    async fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("herald.toml");

        // First load creates the default file
        let created = AppConfig::load_from_file(&path)
            .await
            .expect("Failed to create default config");
        assert!(path.exists());

        // Second load parses what was written
        let loaded = AppConfig::load_from_file(&path)
            .await
            .expect("Failed to reload config");
        assert_eq!(loaded.server.name, created.server.name);
        assert_eq!(loaded.saves.interval_seconds, created.saves.interval_seconds);
        assert_eq!(loaded.channels.channels.len(), created.channels.channels.len());
    }
}
