use anyhow::Context;
use bmvbridge::{default_poll_list, MqttPublisher};
use clap::Parser;
use std::time::Duration;
use tokio::sync::watch;
use tokio_serial::SerialPortBuilderExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bridge a BMV battery monitor's VE.Direct serial output to MQTT.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Serial device the monitor is attached to
    #[arg(long, default_value = "/dev/ttyS0")]
    serial: String,

    /// Serial baud rate
    #[arg(long, default_value_t = 19200)]
    baud: u32,

    /// MQTT broker host
    #[arg(long, default_value = "localhost")]
    mqtt_host: String,

    /// MQTT broker port
    #[arg(long, default_value_t = 1883)]
    mqtt_port: u16,

    /// Topic root; values appear under <root>/hex/ and <root>/text/
    #[arg(long, default_value = "bmv")]
    topic_root: String,

    /// Poll period in seconds for the default register set. Below about two
    /// seconds the device may stop emitting its automatic TEXT output.
    #[arg(long, default_value_t = 3)]
    poll_period: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let port = tokio_serial::new(&args.serial, args.baud)
        .open_native_async()
        .with_context(|| format!("unable to open serial device {}", args.serial))?;
    let (reader, writer) = tokio::io::split(port);

    let publisher = MqttPublisher::start(&args.mqtt_host, args.mqtt_port);
    info!(
        host = %args.mqtt_host,
        port = args.mqtt_port,
        topic_root = %args.topic_root,
        "mqtt client started"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested, waiting for tasks to finish");
            let _ = shutdown_tx.send(true);
        }
    });

    bmvbridge::run(
        reader,
        writer,
        publisher,
        default_poll_list(Duration::from_secs(args.poll_period)),
        args.topic_root,
        shutdown_rx,
    )
    .await
}
