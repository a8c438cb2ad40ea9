use std::{io, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use mitsubishi2mqtt::{
    config::{ControllerConfig, Port},
    controller::{spawn_inbound_handler, HeatPumpController},
    publish::LinePublisher,
};
use tokio::{io::{AsyncBufReadExt, BufReader}, select, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;


/// Bridge a Mitsubishi heat pump's CN105 port to a line-based control plane.
///
/// Changed attributes are written to stdout as `<topic> <value>` lines.
/// Lines of the form `<prefix>/update/<setting> <value>` read from stdin
/// change settings on the unit.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL of the port to connect to
    ///
    /// either serial:///device/path or tcp+raw://host:port URLs supported
    #[arg(env = "SERIAL_PORT")]
    port: Url,

    /// Prefix of every published and subscribed topic
    #[arg(long, env = "TOPIC_PREFIX", default_value = "heat_pump")]
    topic_prefix: String,

    /// Room temperature poll interval, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    temperature_interval: u64,

    /// Settings poll interval, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    settings_interval: u64,

    /// Operation status poll interval, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    operation_status_interval: u64,

    /// Maximum random delay added to each poll, in milliseconds
    #[arg(long, default_value_t = 300)]
    jitter: u64,

    /// How long to wait for the unit to answer, in milliseconds
    #[arg(long, default_value_t = 500)]
    response_timeout: u64,
}

impl Args {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            topic_prefix: self.topic_prefix.trim_end_matches('/').to_string(),
            temperature_interval: Duration::from_millis(self.temperature_interval),
            settings_interval: Duration::from_millis(self.settings_interval),
            operation_status_interval: Duration::from_millis(self.operation_status_interval),
            jitter: Duration::from_millis(self.jitter),
            response_timeout: Duration::from_millis(self.response_timeout),
        }
    }
}


/// Read `topic payload` lines from stdin into `tx`.
async fn read_control_lines(tx: mpsc::Sender<(String, String)>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        let Some((topic, payload)) = line.split_once(char::is_whitespace) else {
            warn!(line, "expected `<topic> <payload>`");
            continue;
        };

        if tx.send((topic.to_string(), payload.trim().to_string())).await.is_err() {
            break;
        }
    }

    Ok(())
}


#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = args.controller_config();

    let link = Port::open(&args.port).await?.link();
    info!(port = %args.port, "opened port");

    let publisher = Arc::new(LinePublisher::new(io::stdout()));

    let controller = HeatPumpController::start(link, publisher, config.clone())
        .context("failed to start controller")?;

    let (tx, rx) = mpsc::channel(16);
    let inbound_cancel = CancellationToken::new();
    let inbound = spawn_inbound_handler(controller.updates(), config.topic_prefix.clone(), rx, inbound_cancel.clone());

    tokio::spawn(async move {
        if let Err(err) = read_control_lines(tx).await {
            warn!("{err:#}");
        }
    });

    select! {
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = controller.cancelled() => (),
    }

    inbound_cancel.cancel();
    inbound.await?;

    if let Err(err) = controller.stop().await {
        error!("heat pump link lost: {err}");
        std::process::exit(1);
    }

    Ok(())
}
