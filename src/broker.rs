//! Broker seam: everything downstream publishes through `Announcer`,
//! so the console binary and the tests can run without a broker.

use anyhow::Result;
use async_trait::async_trait;
use rand::Rng;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use serde_json::Value;
use std::time::Duration;

use crate::logging::{self, obj, v_str, Domain};
use crate::state::Config;

#[async_trait]
pub trait Announcer: Send + Sync {
    async fn publish(&self, topic: &str, payload: Value) -> Result<()>;
}

/// Connect to the MQTT broker and subscribe to the command topic.
/// The returned event loop must be polled by the caller; rumqttc
/// re-establishes the session and the poll loop re-subscribes on
/// every ConnAck.
pub fn connect(cfg: &Config) -> (AsyncClient, EventLoop) {
    // Random suffix keeps a restarted rig from kicking its own ghost
    // session off the broker.
    let client_id = format!("{}-{:04x}", cfg.client_id_prefix, rand::thread_rng().gen::<u16>());
    let mut options = MqttOptions::new(client_id, cfg.broker_host.clone(), cfg.broker_port);
    options.set_keep_alive(Duration::from_secs(60));

    let (client, eventloop) = AsyncClient::new(options, 10);
    logging::info(
        Domain::Broker,
        "connecting",
        obj(&[
            ("host", v_str(&cfg.broker_host)),
            ("port", serde_json::json!(cfg.broker_port)),
            ("command_topic", v_str(&cfg.command_topic)),
        ]),
    );
    (client, eventloop)
}

pub async fn subscribe_commands(client: &AsyncClient, cfg: &Config) -> Result<()> {
    client.subscribe(&cfg.command_topic, QoS::AtLeastOnce).await?;
    logging::info(Domain::Broker, "subscribed", obj(&[("topic", v_str(&cfg.command_topic))]));
    Ok(())
}

pub struct MqttAnnouncer {
    client: AsyncClient,
}

impl MqttAnnouncer {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Announcer for MqttAnnouncer {
    async fn publish(&self, topic: &str, payload: Value) -> Result<()> {
        let body = payload.to_string();
        self.client.publish(topic, QoS::AtLeastOnce, false, body.clone()).await?;
        logging::info(
            Domain::Broker,
            "published",
            obj(&[("topic", v_str(topic)), ("payload", payload)]),
        );
        Ok(())
    }
}

/// Broker-less announcer for the console binary: notifications land
/// on stdout in `topic payload` form.
pub struct StdoutAnnouncer;

#[async_trait]
impl Announcer for StdoutAnnouncer {
    async fn publish(&self, topic: &str, payload: Value) -> Result<()> {
        println!("{} {}", topic, payload);
        Ok(())
    }
}
