use arlo_entities::backend::DryRunBackend;
use arlo_entities::config::{Config, load_dotenv};
use arlo_entities::entity::ANY_ATTRIBUTE;
use arlo_entities::events::EventBus;
use arlo_entities::tasks::TokioRunner;
use arlo_entities::{Device, Location, Result, Services};
use clap::Parser;
use log::{error, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// Replay recorded Arlo cloud events through the entity layer.
#[derive(Parser, Debug)]
#[command(name = "arlo-replay", version)]
struct Args {
    /// Discovery snapshot: `{"devices": [...], "locations": [...]}`
    #[arg(long, env = "ARLO_DEVICES")]
    devices: PathBuf,

    /// JSON-lines file of cloud messages (stdin when omitted)
    #[arg(long)]
    events: Option<PathBuf>,

    /// Keep attributes in memory only
    #[arg(long)]
    no_persist: bool,
}

#[derive(Debug, Default, Deserialize)]
struct Discovery {
    #[serde(default)]
    devices: Vec<Value>,
    #[serde(default)]
    locations: Vec<Value>,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // .env must be applied before the runtime starts its worker threads
    load_dotenv();
    init_logger();
    let args = Args::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start tokio runtime: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run(args)) {
        error!("arlo-replay failed: {}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::from_env()?;
    if args.no_persist {
        config.storage.persist = false;
    }
    info!("Configuration loaded:");
    info!("  Store: {:?} (persist={})", config.storage.path, config.storage.persist);
    info!("  Event filter: {}", config.events.filter);

    let bus = Arc::new(EventBus::new());
    let services = Services::new(
        config.storage.open(),
        bus.clone(),
        Arc::new(TokioRunner::current()),
        Arc::new(DryRunBackend),
    )
    .with_filter(config.events.filter);

    let discovery: Discovery = serde_json::from_slice(&tokio::fs::read(&args.devices).await?)?;

    let mut devices = Vec::new();
    for attrs in discovery.devices {
        match Device::from_snapshot(attrs, &services) {
            Ok(device) => {
                device.add_attr_callback(ANY_ATTRIBUTE, |entity, attr, value| {
                    info!("[{}] {} = {}", entity.name(), attr, value);
                });
                devices.push(device);
            }
            Err(e) => warn!("Skipping device: {}", e),
        }
    }

    let mut locations = Vec::new();
    for attrs in discovery.locations {
        match Location::new(attrs, &services) {
            Ok(location) => {
                location.add_attr_callback(ANY_ATTRIBUTE, |entity, attr, value| {
                    info!("[{}] {} = {}", entity.name(), attr, value);
                });
                locations.push(location);
            }
            Err(e) => warn!("Skipping location: {}", e),
        }
    }
    info!(
        "Loaded {} device(s) and {} location(s)",
        devices.len(),
        locations.len()
    );

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match &args.events {
        Some(path) => Box::new(BufReader::new(tokio::fs::File::open(path).await?)),
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let mut lines = reader.lines();
    let mut delivered = 0usize;
    let mut line_no = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let message: Value = match serde_json::from_str(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!("line {}: not JSON: {}", line_no, e);
                continue;
            }
        };
        match bus.route(&message) {
            Ok(0) => warn!("line {}: no entity listening", line_no),
            Ok(n) => delivered += n,
            Err(e) => warn!("line {}: {}", line_no, e),
        }
    }
    info!("Replayed {} line(s), {} delivery(ies)", line_no, delivered);

    for device in &devices {
        info!(
            "{} ({}): state={}, battery={}, signal={}",
            device.name(),
            device.kind(),
            device.state(),
            device.battery_level(),
            device.signal_strength()
        );
    }
    for location in &locations {
        info!("{}: mode={}", location.name(), location.mode());
    }

    Ok(())
}
