//! MQTT publisher for the bridge's message-bus boundary.
//!
//! Thin wrapper over a `rumqttc` client. The connection event loop runs in
//! its own task; losing the broker only costs publishes until the loop
//! reconnects, the protocol engine never notices.

use crate::bridge::Publish;
use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;
use tracing::{debug, warn};

pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    /// Create the client and start its event-loop driver task.
    pub fn start(host: &str, port: u16) -> Self {
        let client_id = format!("bmvbridge-{}", std::process::id());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(15));
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(event) => debug!(?event, "mqtt event"),
                    Err(err) => {
                        warn!("mqtt connection error: {err}");
                        // Polling again drives rumqttc's reconnect
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Self { client }
    }
}

#[async_trait]
impl Publish for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> anyhow::Result<()> {
        self.client
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes())
            .await?;
        Ok(())
    }
}
