mod handlers;
mod scrape;
mod srv;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use clap::Parser;
use tower_http::compression::CompressionLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use rosmetrics_core::collector::CollectorRegistry;
use rosmetrics_core::config::{Config, ConfigError, Device, Features};
use rosmetrics_core::session::Connector;
use rosmetrics_core::session::api::ApiConnector;
use rosmetrics_core::session::mock::MockConnector;

use state::{AppInner, SharedState};

// ============================================================
// CLI
// ============================================================

#[derive(Parser)]
#[command(name = "rosmetrics", about = "RouterOS metrics exporter", version = rosmetrics_core::VERSION)]
struct Args {
    /// YAML configuration file with devices and features.
    #[arg(long, env = "ROSMETRICS_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Single device name (used when no config file is given).
    #[arg(long, env = "ROSMETRICS_DEVICE")]
    device: Option<String>,

    /// Single device address.
    #[arg(long, env = "ROSMETRICS_ADDRESS")]
    address: Option<String>,

    /// Single device API user.
    #[arg(long, env = "ROSMETRICS_USER", default_value = "")]
    user: String,

    /// Single device API password.
    #[arg(long, env = "ROSMETRICS_PASSWORD", default_value = "")]
    password: String,

    /// Single device API port.
    #[arg(long, env = "ROSMETRICS_PORT")]
    port: Option<u16>,

    /// Listen address.
    #[arg(long, default_value = "0.0.0.0:9436", env = "ROSMETRICS_LISTEN")]
    listen: String,

    /// Path under which metrics are served.
    #[arg(long, default_value = "/metrics", env = "ROSMETRICS_METRICS_PATH")]
    metrics_path: String,

    /// Connect and read timeout for device API sessions, in seconds.
    #[arg(long, default_value_t = 5, env = "ROSMETRICS_TIMEOUT")]
    timeout: u64,

    /// Serve recorded device replies from this directory (`<device>.yaml` files)
    /// instead of connecting to devices.
    #[arg(long, value_name = "DIR", env = "ROSMETRICS_REPLAY")]
    replay: Option<PathBuf>,

    /// Collect BGP peer metrics.
    #[arg(long)]
    with_bgp: bool,

    /// Collect DHCP lease counts per server.
    #[arg(long)]
    with_dhcp: bool,

    /// Collect one series per bound DHCP lease.
    #[arg(long)]
    with_dhcpl: bool,

    /// Collect DHCPv6 binding counts per server.
    #[arg(long)]
    with_dhcpv6: bool,

    /// Collect installed package versions.
    #[arg(long)]
    with_firmware: bool,

    /// Collect health sensor metrics.
    #[arg(long)]
    with_health: bool,

    /// Collect routing table metrics.
    #[arg(long)]
    with_routes: bool,

    /// Collect PoE output metrics.
    #[arg(long)]
    with_poe: bool,

    /// Collect IP pool metrics.
    #[arg(long)]
    with_pools: bool,

    /// Collect SFP optics diagnostics.
    #[arg(long)]
    with_optics: bool,

    /// Collect 60 GHz wireless link metrics.
    #[arg(long)]
    with_w60g: bool,

    /// Collect wireless client metrics.
    #[arg(long)]
    with_wlansta: bool,

    /// Collect wireless interface metrics.
    #[arg(long)]
    with_wlanif: bool,

    /// Collect ethernet monitor metrics.
    #[arg(long)]
    with_monitor: bool,

    /// Collect IPsec peer metrics.
    #[arg(long)]
    with_ipsec: bool,

    /// Collect queue tree metrics.
    #[arg(long)]
    with_queue_trees: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn features(&self) -> Features {
        Features {
            bgp: self.with_bgp,
            dhcp: self.with_dhcp,
            dhcpl: self.with_dhcpl,
            dhcpv6: self.with_dhcpv6,
            firmware: self.with_firmware,
            health: self.with_health,
            ipsec: self.with_ipsec,
            monitor: self.with_monitor,
            optics: self.with_optics,
            poe: self.with_poe,
            pools: self.with_pools,
            queue_trees: self.with_queue_trees,
            routes: self.with_routes,
            w60g: self.with_w60g,
            wlanif: self.with_wlanif,
            wlansta: self.with_wlansta,
        }
    }
}

// ============================================================
// Setup
// ============================================================

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["rosmetrics", "rosmetrics_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Devices and features from the config file, the single-device flags, or
/// the replay fixtures, in that order of preference.
fn load_config(args: &Args, replay: Option<&MockConnector>) -> Result<Config, ConfigError> {
    let mut config = if let Some(path) = &args.config_file {
        Config::load_from_path(path)?
    } else if let Some(name) = &args.device {
        let config = Config {
            devices: vec![Device {
                name: name.clone(),
                address: args.address.clone(),
                srv: None,
                user: args.user.clone(),
                password: args.password.clone(),
                port: args.port,
            }],
            features: Features::default(),
        };
        config.validate()?;
        config
    } else if let Some(connector) = replay {
        let config = Config {
            devices: connector
                .device_names()
                .into_iter()
                .map(|name| Device {
                    name,
                    ..Device::default()
                })
                .collect(),
            features: Features::default(),
        };
        if config.devices.is_empty() {
            return Err(ConfigError::Invalid(
                "replay directory contains no device fixtures".to_string(),
            ));
        }
        config
    } else {
        return Err(ConfigError::Invalid(
            "either --config-file or --device is required".to_string(),
        ));
    };

    config.features = config.features.merge(args.features());
    Ok(config)
}

/// Routes for the exporter. The metrics path comes from the state.
fn build_router(state: SharedState) -> Router {
    let metrics_path = state.metrics_path.clone();
    Router::new()
        .route(&metrics_path, get(handlers::handle_metrics))
        .route("/health", get(handlers::handle_health))
        .route("/", get(handlers::handle_index))
        .with_state(state)
        .layer(CompressionLayer::new())
}

// ============================================================
// Main
// ============================================================

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    let replay = match &args.replay {
        Some(dir) => match MockConnector::from_dir(dir) {
            Ok(connector) => {
                info!(path = %dir.display(), devices = connector.device_names().len(), "replay mode");
                Some(connector)
            }
            Err(e) => {
                error!(path = %dir.display(), error = %e, "failed to load replay fixtures");
                process::exit(1);
            }
        },
        None => None,
    };

    let config = match load_config(&args, replay.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(1);
        }
    };

    let connector: Arc<dyn Connector> = match replay {
        Some(connector) => Arc::new(connector),
        None => Arc::new(ApiConnector::new(Duration::from_secs(args.timeout))),
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(args, config, connector));
}

async fn async_main(args: Args, config: Config, connector: Arc<dyn Connector>) {
    let registry = CollectorRegistry::from_features(&config.features);
    info!(
        version = rosmetrics_core::VERSION,
        devices = config.devices.len(),
        collectors = ?registry.names(),
        "starting exporter"
    );

    let state: SharedState = Arc::new(AppInner::new(
        config.devices,
        registry,
        connector,
        args.metrics_path.clone(),
    ));
    let app = build_router(state);

    let addr: SocketAddr = args.listen.parse().expect("invalid listen address");
    info!(%addr, metrics_path = %args.metrics_path, "listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");

    axum::serve(listener, app).await.expect("server error");
}
