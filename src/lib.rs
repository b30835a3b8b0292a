//! Bridge a BMV battery monitor's VE.Direct serial protocol to MQTT.
//!
//! Tested with a BMV-702 shunt monitor. The device speaks two sub-protocols
//! over the same serial line: a request/response "HEX" protocol addressing
//! registers by 16 bit id, with ASCII-hex payloads and a mod-256 checksum,
//! and a push-style "TEXT" protocol emitting tab separated tag/value lines
//! about once a second. This crate demultiplexes both off one byte stream,
//! decodes the registers it knows into scaled values, and republishes them
//! as `<root>/hex/<name>` and `<root>/text/<name>` MQTT topics.
//!
//! Only reads are implemented. The device also supports SET commands over
//! the HEX protocol but this crate never writes a register.
//!
//! # Example
//!
//! ```rust,no_run
//! # use std::time::Duration;
//! # #[tokio::main]
//! # pub async fn main() -> anyhow::Result<()> {
//! use tokio_serial::SerialPortBuilderExt;
//!
//! let port = tokio_serial::new("/dev/ttyS0", 19200).open_native_async()?;
//! let (reader, writer) = tokio::io::split(port);
//! let publisher = bmvbridge::MqttPublisher::start("localhost", 1883);
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! bmvbridge::run(
//!     reader,
//!     writer,
//!     publisher,
//!     bmvbridge::default_poll_list(Duration::from_secs(3)),
//!     "bmv".to_string(),
//!     shutdown_rx,
//! )
//! .await
//! # }
//! ```

mod bridge;
pub mod codec;
pub mod demux;
mod mqtt;
mod queue;
pub mod registry;
mod scheduler;

pub use bridge::{run, Publish, MIN_REQUEST_PERIOD};
pub use mqtt::MqttPublisher;
pub use scheduler::{default_poll_list, PollConfig};
