//! Broker-less console: the same dispatch surface as the MQTT
//! service, driven from stdin for bench testing a rig by hand.
//!
//! Commands: `load dataframe <path>`, `scatter plot <x> <y>`,
//! `hist plot <x>`, `world map`, `timeline`, `datatable`,
//! `infotable`, `datasets [dir]`, `history [n]`,
//! `remove iframe <url>`, `quit`.

use anyhow::Result;
use std::sync::Arc;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use planktovis::broker::StdoutAnnouncer;
use planktovis::controller::{Command, Controller};
use planktovis::state::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    let announcer = Arc::new(StdoutAnnouncer);
    let (closed_tx, mut closed_rx) = mpsc::channel(16);
    let mut controller = Controller::new(cfg, announcer, closed_tx)?;

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed == "quit" || trimmed == "exit" {
                    break;
                }
                match Command::from_console_line(trimmed) {
                    Some(cmd) => {
                        if let Err(err) = controller.dispatch(cmd).await {
                            eprintln!("error: {:#}", err);
                        }
                    }
                    None => eprintln!("unknown command: {}", trimmed),
                }
            }
            Some(closed) = closed_rx.recv() => {
                controller.handle_closed(closed).await;
            }
        }
    }
    Ok(())
}
