//! Command dispatch: JSON operator commands in, dataset mutations and
//! view lifecycles out, notifications published on the way.

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::broker::Announcer;
use crate::dataset::{self, Frame};
use crate::logging::{self, obj, params_hash, v_str, Domain};
use crate::page::{same_url, ChartsPage};
use crate::pool::{Acquired, SlotPool};
use crate::render::datatable::StatsTable;
use crate::render::infotable::InfoTable;
use crate::render::{histogram, scatter, timeline, worldmap, Table, ViewKind};
use crate::serve::{self, ClosedView, PageContent, ViewHandle};
use crate::state::Config;
use crate::storage::HistoryStore;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Command {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Command {
    pub fn parse(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).context("command payload is not valid JSON")
    }

    /// Plain-text console form, e.g. `scatter plot object_width object_area`.
    pub fn from_console_line(line: &str) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let cmd = |command: &str, args: &[&str]| {
            Some(Command {
                command: command.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
            })
        };
        match tokens.as_slice() {
            ["load", "dataframe", rest @ ..] => cmd("load dataframe", rest),
            ["scatter", "plot", rest @ ..] => cmd("create scatter plot", rest),
            ["hist", "plot", rest @ ..] => cmd("create hist plot", rest),
            ["world", "map"] => cmd("create world map", &[]),
            ["timeline"] => cmd("create timeline", &[]),
            ["datatable"] => cmd("init datatable", &[]),
            ["infotable"] => cmd("init infotable", &[]),
            ["datasets", rest @ ..] => cmd("list datasets", rest),
            ["history", rest @ ..] => cmd("dataset history", rest),
            ["remove", "iframe", rest @ ..] => cmd("remove iframe", rest),
            _ => None,
        }
    }
}

pub struct Controller {
    cfg: Config,
    announcer: Arc<dyn Announcer>,
    pool: SlotPool,
    views: HashMap<usize, ViewHandle>,
    page: ChartsPage,
    store: HistoryStore,
    frame: Option<Arc<Frame>>,
    datatable: Arc<Mutex<StatsTable>>,
    infotable: Arc<Mutex<InfoTable>>,
    closed_tx: mpsc::Sender<ClosedView>,
}

impl Controller {
    pub fn new(
        cfg: Config,
        announcer: Arc<dyn Announcer>,
        closed_tx: mpsc::Sender<ClosedView>,
    ) -> Result<Self> {
        let mut store = HistoryStore::new(&cfg.sqlite_path)?;
        store.init()?;
        let page = ChartsPage::open(Path::new(&cfg.page_path))?;
        let pool = SlotPool::new(cfg.pool_size);
        Ok(Self {
            cfg,
            announcer,
            pool,
            views: HashMap::new(),
            page,
            store,
            frame: None,
            datatable: Arc::new(Mutex::new(StatsTable::new())),
            infotable: Arc::new(Mutex::new(InfoTable::new())),
            closed_tx,
        })
    }

    pub fn frame(&self) -> Option<&Arc<Frame>> {
        self.frame.as_ref()
    }

    pub fn running_views(&self) -> usize {
        self.views.len()
    }

    pub fn view_urls(&self) -> Vec<String> {
        self.views.values().map(|h| h.url.clone()).collect()
    }

    /// Entry point for raw broker payloads. Bad input is logged and
    /// dropped; a malformed command never takes the service down.
    pub async fn handle_payload(&mut self, payload: &[u8]) {
        let cmd = match Command::parse(payload) {
            Ok(cmd) => cmd,
            Err(err) => {
                logging::warn(
                    Domain::Command,
                    "bad_payload",
                    obj(&[("err", v_str(&err.to_string()))]),
                );
                return;
            }
        };
        logging::info(
            Domain::Command,
            "received",
            obj(&[
                ("command", v_str(&cmd.command)),
                ("args", json!(cmd.args)),
                ("payload_hash", v_str(&params_hash(&String::from_utf8_lossy(payload)))),
            ]),
        );
        if let Err(err) = self.dispatch(cmd).await {
            logging::error(
                Domain::Command,
                "command_failed",
                obj(&[("err", v_str(&format!("{:#}", err)))]),
            );
        }
    }

    pub async fn dispatch(&mut self, cmd: Command) -> Result<()> {
        match cmd.command.as_str() {
            "load dataframe" => {
                if !self.arity_ok(&cmd, 1, r#"{"command": "load dataframe", "args": ["/path/to/export.tsv"]}"#) {
                    return Ok(());
                }
                self.load_dataframe(&cmd.args[0]).await
            }
            "create scatter plot" => {
                if !self.arity_ok(&cmd, 2, r#"{"command": "create scatter plot", "args": ["x", "y"]}"#) {
                    return Ok(());
                }
                self.create_scatter(&cmd.args[0], &cmd.args[1]).await
            }
            "create hist plot" => {
                if !self.arity_ok(&cmd, 1, r#"{"command": "create hist plot", "args": ["x"]}"#) {
                    return Ok(());
                }
                self.create_histogram(&cmd.args[0]).await
            }
            "create world map" => {
                if !self.arity_ok(&cmd, 0, r#"{"command": "create world map"}"#) {
                    return Ok(());
                }
                self.create_world_map().await
            }
            "create timeline" => {
                if !self.arity_ok(&cmd, 0, r#"{"command": "create timeline"}"#) {
                    return Ok(());
                }
                self.create_timeline().await
            }
            "init datatable" => {
                if !self.arity_ok(&cmd, 0, r#"{"command": "init datatable"}"#) {
                    return Ok(());
                }
                self.init_datatable().await
            }
            "init infotable" => {
                if !self.arity_ok(&cmd, 0, r#"{"command": "init infotable"}"#) {
                    return Ok(());
                }
                self.init_infotable().await
            }
            "remove iframe" => {
                if !self.arity_ok(&cmd, 1, r#"{"command": "remove iframe", "args": ["http://host:port/"]}"#) {
                    return Ok(());
                }
                self.remove_view(&cmd.args[0]).await
            }
            "list datasets" => {
                if cmd.args.len() > 1 {
                    self.log_arity(&cmd, r#"{"command": "list datasets", "args": ["/optional/dir"]}"#);
                    return Ok(());
                }
                self.list_datasets(cmd.args.first().cloned()).await
            }
            "dataset history" => {
                if cmd.args.len() > 1 {
                    self.log_arity(&cmd, r#"{"command": "dataset history", "args": ["10"]}"#);
                    return Ok(());
                }
                self.dataset_history(cmd.args.first().cloned()).await
            }
            other => {
                logging::warn(
                    Domain::Command,
                    "unknown_command",
                    obj(&[("command", v_str(other))]),
                );
                Ok(())
            }
        }
    }

    /// A view server reported itself closed (page X button, or its
    /// task died). Stale reports for slots already torn down by the
    /// controller are ignored.
    pub async fn handle_closed(&mut self, ev: ClosedView) {
        let matches = matches!(self.views.get(&ev.slot), Some(h) if h.url == ev.url);
        if !matches {
            return;
        }
        let Some(handle) = self.views.remove(&ev.slot) else {
            return;
        };
        self.pool.release(handle.slot);
        self.reset_table(handle.kind);
        if let Err(err) = self.page.remove_iframe(&handle.url) {
            logging::error(Domain::Page, "remove_failed", obj(&[("err", v_str(&err.to_string()))]));
        }
        if let Err(err) = self
            .announcer
            .publish(&ev.topic, json!({"command": "remove iframe", "src": ev.url}))
            .await
        {
            logging::error(Domain::Broker, "publish_failed", obj(&[("err", v_str(&err.to_string()))]));
        }
        logging::info(
            Domain::Pool,
            "slot_released",
            obj(&[("slot", json!(ev.slot)), ("available", json!(self.pool.available()))]),
        );
    }

    fn arity_ok(&self, cmd: &Command, expected: usize, usage: &str) -> bool {
        if cmd.args.len() != expected {
            self.log_arity(cmd, usage);
            return false;
        }
        true
    }

    fn log_arity(&self, cmd: &Command, usage: &str) {
        logging::warn(
            Domain::Command,
            "bad_arity",
            obj(&[
                ("command", v_str(&cmd.command)),
                ("args", json!(cmd.args)),
                ("usage", v_str(usage)),
            ]),
        );
    }

    async fn load_dataframe(&mut self, path: &str) -> Result<()> {
        let frame = Arc::new(Frame::load(path)?);
        if frame.provenance.bad_rows > 0 {
            logging::warn(
                Domain::Dataset,
                "ragged_rows_skipped",
                obj(&[("path", v_str(path)), ("bad_rows", json!(frame.provenance.bad_rows))]),
            );
        }
        self.store.record(&frame.provenance, frame.columns().len())?;
        if let Ok(mut table) = self.datatable.lock() {
            table.bind(frame.clone());
        }
        if let Ok(mut table) = self.infotable.lock() {
            table.bind(frame.clone());
        }
        self.announcer
            .publish(
                &self.cfg.page_topic,
                json!({
                    "command": "add metadata",
                    "metadata": frame.columns(),
                    "interest": frame.columns_of_interest(),
                    "objects": frame.len(),
                }),
            )
            .await?;
        logging::info(
            Domain::Dataset,
            "loaded",
            obj(&[
                ("path", v_str(path)),
                ("rows", json!(frame.len())),
                ("sha256", v_str(&frame.provenance.sha256)),
            ]),
        );
        self.frame = Some(frame);
        Ok(())
    }

    fn current_frame(&self) -> Result<Arc<Frame>> {
        self.frame.clone().ok_or_else(|| anyhow!("no dataframe loaded"))
    }

    async fn create_scatter(&mut self, x: &str, y: &str) -> Result<()> {
        let frame = self.current_frame()?;
        let figure = scatter::figure(&frame, x, y)?;
        let title = format!("{} vs {}", x, y);
        let handle = self
            .spawn_view(
                ViewKind::Scatter,
                &title,
                PageContent::Figure { figure, close_button: true, mode_bar: true },
                self.cfg.page_topic.clone(),
            )
            .await?;
        self.page.add_iframe(&handle.url)?;
        self.announce_add(&handle).await?;
        self.views.insert(handle.slot, handle);
        Ok(())
    }

    async fn create_histogram(&mut self, x: &str) -> Result<()> {
        let frame = self.current_frame()?;
        let figure = histogram::figure(&frame, x)?;
        let handle = self
            .spawn_view(
                ViewKind::Histogram,
                x,
                PageContent::Figure { figure, close_button: true, mode_bar: true },
                self.cfg.page_topic.clone(),
            )
            .await?;
        self.page.add_iframe(&handle.url)?;
        self.announce_add(&handle).await?;
        self.views.insert(handle.slot, handle);
        Ok(())
    }

    async fn create_world_map(&mut self) -> Result<()> {
        let path = Path::new(&self.cfg.data_dir).join("datasets.json");
        let stations = worldmap::read_stations(&path)?;
        let figure = worldmap::figure(&stations);
        let handle = self
            .spawn_view(
                ViewKind::WorldMap,
                "Sampling stations",
                PageContent::Figure { figure, close_button: false, mode_bar: true },
                self.cfg.worldmap_topic.clone(),
            )
            .await?;
        self.announce_add(&handle).await?;
        self.views.insert(handle.slot, handle);
        Ok(())
    }

    async fn create_timeline(&mut self) -> Result<()> {
        let path = Path::new(&self.cfg.data_dir).join("summary.json");
        let samples = timeline::read_summaries(&path)?;
        let figure = timeline::figure(&samples);
        let handle = self
            .spawn_view(
                ViewKind::Timeline,
                "Objects/ml",
                PageContent::Figure { figure, close_button: false, mode_bar: false },
                self.cfg.page_topic.clone(),
            )
            .await?;
        self.page.add_iframe(&handle.url)?;
        self.announce_add(&handle).await?;
        self.views.insert(handle.slot, handle);
        Ok(())
    }

    async fn init_datatable(&mut self) -> Result<()> {
        let model: Arc<Mutex<dyn Table>> = self.datatable.clone();
        let handle = self
            .spawn_view(
                ViewKind::DataTable,
                "Morphology metrics",
                PageContent::Table { model, row_deletable: true },
                self.cfg.datatable_topic.clone(),
            )
            .await?;
        self.announce_add(&handle).await?;
        self.views.insert(handle.slot, handle);
        Ok(())
    }

    async fn init_infotable(&mut self) -> Result<()> {
        let model: Arc<Mutex<dyn Table>> = self.infotable.clone();
        let handle = self
            .spawn_view(
                ViewKind::InfoTable,
                "Project Information",
                PageContent::Table { model, row_deletable: false },
                self.cfg.infotable_topic.clone(),
            )
            .await?;
        self.announce_add(&handle).await?;
        self.views.insert(handle.slot, handle);
        Ok(())
    }

    async fn remove_view(&mut self, url: &str) -> Result<()> {
        let slot = self
            .views
            .iter()
            .find(|(_, h)| same_url(&h.url, url))
            .map(|(slot, _)| *slot);
        let Some(slot) = slot else {
            logging::warn(Domain::Render, "unknown_iframe", obj(&[("url", v_str(url))]));
            return Ok(());
        };
        let Some(handle) = self.views.remove(&slot) else {
            return Ok(());
        };
        self.close_view(handle, true).await
    }

    async fn list_datasets(&mut self, dir: Option<String>) -> Result<()> {
        let dir = dir.unwrap_or_else(|| self.cfg.data_dir.clone());
        let files = dataset::find_tsv_files(&dir)?;
        logging::info(
            Domain::Dataset,
            "discovered",
            obj(&[("dir", v_str(&dir)), ("count", json!(files.len()))]),
        );
        self.announcer
            .publish(
                &self.cfg.page_topic,
                json!({"command": "dataset list", "datasets": files}),
            )
            .await
    }

    async fn dataset_history(&mut self, n: Option<String>) -> Result<()> {
        let n: usize = match n {
            Some(raw) => raw.parse().with_context(|| format!("bad history size '{}'", raw))?,
            None => 10,
        };
        let loads: Vec<Value> = self.store.recent(n)?.iter().map(|r| r.to_json()).collect();
        self.announcer
            .publish(
                &self.cfg.page_topic,
                json!({"command": "dataset history", "loads": loads}),
            )
            .await
    }

    /// Acquire a slot (tearing down a recycled occupant when the pool
    /// is exhausted) and spawn the view server on it.
    async fn spawn_view(
        &mut self,
        kind: ViewKind,
        title: &str,
        content: PageContent,
        topic: String,
    ) -> Result<ViewHandle> {
        let Some(acquired) = self.pool.acquire() else {
            bail!("slot pool is empty");
        };
        if let Acquired::Recycled(id) = acquired {
            if let Some(old) = self.views.remove(&id) {
                logging::warn(
                    Domain::Pool,
                    "recycling_slot",
                    obj(&[("slot", json!(id)), ("url", v_str(&old.url))]),
                );
                // The slot stays in the running list; only the old
                // occupant is torn down.
                self.close_view(old, false).await?;
            }
        }
        let slot = acquired.id();
        match serve::spawn(&self.cfg, slot, kind, title, content, &topic, self.closed_tx.clone()).await {
            Ok(handle) => {
                logging::info(
                    Domain::Pool,
                    "slot_acquired",
                    obj(&[
                        ("slot", json!(slot)),
                        ("kind", v_str(kind.as_str())),
                        ("available", json!(self.pool.available())),
                    ]),
                );
                Ok(handle)
            }
            Err(err) => {
                self.pool.release(slot);
                Err(err)
            }
        }
    }

    async fn close_view(&mut self, handle: ViewHandle, release_slot: bool) -> Result<()> {
        handle.shutdown().await;
        if release_slot {
            self.pool.release(handle.slot);
        }
        self.reset_table(handle.kind);
        self.page.remove_iframe(&handle.url)?;
        self.announcer
            .publish(&handle.topic, json!({"command": "remove iframe", "src": handle.url}))
            .await?;
        logging::info(
            Domain::Render,
            "view_closed",
            obj(&[("slot", json!(handle.slot)), ("url", v_str(&handle.url))]),
        );
        Ok(())
    }

    fn reset_table(&self, kind: ViewKind) {
        match kind {
            ViewKind::DataTable => {
                if let Ok(mut table) = self.datatable.lock() {
                    table.reset();
                }
            }
            ViewKind::InfoTable => {
                if let Ok(mut table) = self.infotable.lock() {
                    table.reset();
                }
            }
            _ => {}
        }
    }

    async fn announce_add(&self, handle: &ViewHandle) -> Result<()> {
        self.announcer
            .publish(&handle.topic, json!({"command": "add iframe", "src": handle.url}))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_command() {
        let cmd = Command::parse(br#"{"command": "load dataframe", "args": ["/data/export.tsv"]}"#).unwrap();
        assert_eq!(cmd.command, "load dataframe");
        assert_eq!(cmd.args, vec!["/data/export.tsv"]);
    }

    #[test]
    fn test_parse_defaults_missing_args() {
        let cmd = Command::parse(br#"{"command": "create world map"}"#).unwrap();
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(Command::parse(b"load dataframe /data/export.tsv").is_err());
    }

    #[test]
    fn test_console_lines_map_to_commands() {
        let cmd = Command::from_console_line("scatter plot object_width object_area").unwrap();
        assert_eq!(cmd.command, "create scatter plot");
        assert_eq!(cmd.args, vec!["object_width", "object_area"]);

        let cmd = Command::from_console_line("load dataframe /data/export.tsv").unwrap();
        assert_eq!(cmd.command, "load dataframe");

        let cmd = Command::from_console_line("world map").unwrap();
        assert_eq!(cmd.command, "create world map");

        let cmd = Command::from_console_line("datasets").unwrap();
        assert_eq!(cmd.command, "list datasets");
        assert!(cmd.args.is_empty());

        assert!(Command::from_console_line("make me a sandwich").is_none());
        assert!(Command::from_console_line("").is_none());
    }
}
