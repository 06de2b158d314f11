use anyhow::Result;
use rumqttc::{Event, Packet};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use planktovis::broker::{self, MqttAnnouncer};
use planktovis::controller::Controller;
use planktovis::logging::{self, obj, v_str, Domain};
use planktovis::state::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    logging::info(
        Domain::System,
        "starting",
        obj(&[
            ("pool_size", json!(cfg.pool_size)),
            ("data_dir", v_str(&cfg.data_dir)),
            ("page_path", v_str(&cfg.page_path)),
        ]),
    );

    let (client, mut eventloop) = broker::connect(&cfg);
    let announcer = Arc::new(MqttAnnouncer::new(client.clone()));
    let (closed_tx, mut closed_rx) = mpsc::channel(16);
    let mut controller = Controller::new(cfg.clone(), announcer, closed_tx)?;

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    logging::info(
                        Domain::Broker,
                        "connected",
                        obj(&[("session_present", json!(ack.session_present))]),
                    );
                    // Subscriptions do not survive a clean reconnect.
                    if let Err(err) = broker::subscribe_commands(&client, &cfg).await {
                        logging::error(
                            Domain::Broker,
                            "subscribe_failed",
                            obj(&[("err", v_str(&err.to_string()))]),
                        );
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic == cfg.command_topic {
                        controller.handle_payload(&publish.payload).await;
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    logging::error(
                        Domain::Broker,
                        "connection_lost",
                        obj(&[("err", v_str(&err.to_string()))]),
                    );
                    sleep(Duration::from_secs(5)).await;
                }
            },
            Some(closed) = closed_rx.recv() => {
                controller.handle_closed(closed).await;
            }
        }
    }
}
