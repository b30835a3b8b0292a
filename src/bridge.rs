//! The bridge orchestrator.
//!
//! Three continuously-running tasks share nothing but the transmit queue:
//!
//! - the **receiver** drains serial bytes, drives the frame demultiplexer
//!   and publishes decoded values in-task;
//! - the **scheduler** sweeps the poll list and enqueues due registers;
//! - the **transmitter** drains the queue, writing one encoded GET request
//!   per address and sleeping the device's minimum inter-request interval
//!   between sends.
//!
//! Shutdown is cooperative: a watch channel every task checks each
//! iteration. [`run`] joins all three before returning, so the serial
//! halves and the publisher outlive every in-flight iteration.

use crate::codec;
use crate::demux::{Demux, Frame};
use crate::queue::TxQueue;
use crate::scheduler::{PollConfig, Scheduler};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Minimum spacing between requests. Any faster and the BMV misses them.
pub const MIN_REQUEST_PERIOD: Duration = Duration::from_millis(50);

/// How often the scheduler pass runs. This bounds the poll cadence
/// granularity, not any per-register timer.
const SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Idle wait for the transmitter when the queue is empty, and for the
/// receiver when the byte source reports end of stream.
const IDLE_WAIT: Duration = Duration::from_millis(20);

const QUEUE_CAPACITY: usize = 32;

/// The message-bus boundary. The bridge emits `(topic, payload)` pairs and
/// nothing else; connection management belongs to the implementation.
#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()>;
}

/// Run the bridge over the given serial halves until `shutdown` signals.
pub async fn run<R, W, P>(
    reader: R,
    writer: W,
    publisher: P,
    poll_list: Vec<PollConfig>,
    topic_root: String,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
    P: Publish + 'static,
{
    let queue = Arc::new(TxQueue::new(QUEUE_CAPACITY));
    let publisher = Arc::new(publisher);
    let scheduler = Scheduler::new(poll_list.clone());

    let receiver = tokio::spawn(receiver_loop(
        reader,
        publisher,
        poll_list,
        topic_root,
        shutdown.clone(),
    ));
    let sweeper = tokio::spawn(scheduler_loop(scheduler, queue.clone(), shutdown.clone()));
    let transmitter = tokio::spawn(transmitter_loop(writer, queue, shutdown));

    tokio::try_join!(receiver, sweeper, transmitter)?;
    info!("bridge stopped");
    Ok(())
}

async fn receiver_loop<R, P>(
    mut reader: R,
    publisher: Arc<P>,
    poll_list: Vec<PollConfig>,
    topic_root: String,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncRead + Unpin,
    P: Publish,
{
    let mut demux = Demux::new();
    let mut buf = [0u8; 64];
    loop {
        let n = tokio::select! {
            _ = shutdown.changed() => break,
            read = reader.read(&mut buf) => match read {
                Ok(0) => {
                    // Nothing may ever arrive; idling here is accepted
                    tokio::time::sleep(IDLE_WAIT).await;
                    continue;
                }
                Ok(n) => n,
                Err(err) => {
                    warn!("serial read failed: {err}");
                    tokio::time::sleep(IDLE_WAIT).await;
                    continue;
                }
            },
        };
        for &byte in &buf[..n] {
            if let Some(frame) = demux.push(byte) {
                handle_frame(frame, publisher.as_ref(), &poll_list, &topic_root).await;
            }
        }
    }
}

async fn handle_frame<P: Publish>(
    frame: Frame,
    publisher: &P,
    poll_list: &[PollConfig],
    topic_root: &str,
) {
    match frame {
        Frame::Hex(payload) => {
            debug!(payload = %payload, "hex frame");
            if let Some((reg, value)) = codec::decode_hex_frame(&payload) {
                // Only registers the poll list marks for publication go out
                if poll_list.iter().any(|e| e.name == reg.name && e.publish) {
                    let topic = format!("{topic_root}/hex/{}", reg.name);
                    let payload = format!("{value:.2}");
                    info!(%topic, %payload, "publish");
                    if let Err(err) = publisher.publish(&topic, &payload).await {
                        warn!("publish failed: {err}");
                    }
                }
            }
        }
        Frame::Text(line) => {
            debug!(line = %line, "text line");
            if let Some((reg, payload)) = codec::decode_text_line(&line) {
                let topic = format!("{topic_root}/text/{}", reg.name);
                info!(%topic, %payload, "publish");
                if let Err(err) = publisher.publish(&topic, &payload).await {
                    warn!("publish failed: {err}");
                }
            }
        }
    }
}

async fn scheduler_loop(
    mut scheduler: Scheduler,
    queue: Arc<TxQueue>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        scheduler.sweep(Instant::now(), &queue);
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(SWEEP_INTERVAL) => {}
        }
    }
}

async fn transmitter_loop<W>(mut writer: W, queue: Arc<TxQueue>, mut shutdown: watch::Receiver<bool>)
where
    W: AsyncWrite + Unpin,
{
    loop {
        let wait = match queue.pop() {
            Some(address) => {
                let frame = codec::encode_get_request(address);
                debug!(address, frame = %frame.trim_end(), "request");
                if let Err(err) = write_frame(&mut writer, &frame).await {
                    warn!("serial write failed: {err}");
                }
                MIN_REQUEST_PERIOD
            }
            None => IDLE_WAIT,
        };
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &str) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::default_poll_list;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct RecordingSink {
        events: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl Publish for RecordingSink {
        async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    fn hex_response(body: &str) -> String {
        format!(":{}{:02X}\n", body, codec::checksum(body))
    }

    #[tokio::test]
    async fn test_receiver_decodes_and_publishes() {
        let (mut device_out, bridge_in) = tokio::io::duplex(256);
        let (bridge_out, mut device_in) = tokio::io::duplex(256);
        let sink = RecordingSink::default();
        let events = sink.events.clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let bridge = tokio::spawn(run(
            bridge_in,
            bridge_out,
            sink,
            default_poll_list(Duration::from_secs(3)),
            "bmv".to_string(),
            shutdown_rx,
        ));

        // A pushed TEXT line and a HEX response for soc, interleaved
        device_out.write_all(b"\nSOC\t950\r").await.unwrap();
        device_out
            .write_all(hex_response("7FF0F00E40E").as_bytes())
            .await
            .unwrap();

        // Drain whatever the transmitter sends so its writes never stall
        tokio::spawn(async move {
            let mut scratch = [0u8; 64];
            while device_in.read(&mut scratch).await.is_ok_and(|n| n > 0) {}
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(true).unwrap();
        bridge.await.unwrap().unwrap();

        let events = events.lock().unwrap();
        assert!(events.contains(&("bmv/text/soc".to_string(), "95.000".to_string())));
        assert!(events.contains(&("bmv/hex/soc".to_string(), "38.12".to_string())));
    }

    #[tokio::test]
    async fn test_publish_gate_suppresses_unlisted_hex() {
        let (mut device_out, bridge_in) = tokio::io::duplex(256);
        let (bridge_out, _device_in) = tokio::io::duplex(256);
        let sink = RecordingSink::default();
        let events = sink.events.clone();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // soc polled but not published
        let poll_list = vec![PollConfig {
            name: "soc",
            publish: false,
            period: Duration::from_secs(3),
        }];
        let bridge = tokio::spawn(run(
            bridge_in,
            bridge_out,
            sink,
            poll_list,
            "bmv".to_string(),
            shutdown_rx,
        ));

        device_out
            .write_all(hex_response("7FF0F00E40E").as_bytes())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        bridge.await.unwrap().unwrap();

        // The TEXT namespace has no gate, but no TEXT line was sent either
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transmitter_sends_encoded_requests() {
        let (_device_out, bridge_in) = tokio::io::duplex(256);
        let (bridge_out, mut device_in) = tokio::io::duplex(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let poll_list = vec![PollConfig {
            name: "soc",
            publish: true,
            period: Duration::from_secs(3),
        }];
        let bridge = tokio::spawn(run(
            bridge_in,
            bridge_out,
            RecordingSink::default(),
            poll_list,
            "bmv".to_string(),
            shutdown_rx,
        ));

        let expected = codec::encode_get_request(0x0FFF);
        let mut buf = vec![0u8; expected.len()];
        device_in.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, expected.as_bytes());

        shutdown_tx.send(true).unwrap();
        bridge.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_joins_all_tasks() {
        let (_device_out, bridge_in) = tokio::io::duplex(256);
        let (bridge_out, _device_in) = tokio::io::duplex(256);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let bridge = tokio::spawn(run(
            bridge_in,
            bridge_out,
            RecordingSink::default(),
            default_poll_list(Duration::from_secs(3)),
            "bmv".to_string(),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), bridge)
            .await
            .expect("bridge did not stop")
            .unwrap()
            .unwrap();
    }
}
