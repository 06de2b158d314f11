//! Morphology metrics table: mean/min/max/sd per metric column.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::dataset::Frame;
use crate::render::Table;

pub const LABEL_COLUMN: &str = "Morphology metrics";

const DEFAULT_ROWS: [&str; 5] = [
    "object_width",
    "object_height",
    "object_area",
    "object_elongation",
    "object_circex",
];

const STAT_COLUMNS: [&str; 4] = ["mean", "min", "max", "sd"];

pub struct StatsTable {
    rows: Vec<String>,
    frame: Option<Arc<Frame>>,
}

impl StatsTable {
    pub fn new() -> Self {
        Self {
            rows: DEFAULT_ROWS.iter().map(|r| r.to_string()).collect(),
            frame: None,
        }
    }

    fn stat(&self, metric: &str, stat: &str) -> f64 {
        let Some(frame) = &self.frame else { return 0.0 };
        match stat {
            "mean" => frame.mean(metric),
            "min" => frame.min(metric),
            "max" => frame.max(metric),
            "sd" => frame.sd(metric),
            _ => 0.0,
        }
    }
}

impl Default for StatsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Table for StatsTable {
    fn columns(&self) -> Vec<String> {
        let mut cols = vec![LABEL_COLUMN.to_string()];
        cols.extend(STAT_COLUMNS.iter().map(|c| c.to_string()));
        cols
    }

    fn rows(&self) -> Value {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|metric| {
                let mut row = serde_json::Map::new();
                row.insert(LABEL_COLUMN.to_string(), json!(metric));
                for stat in STAT_COLUMNS {
                    row.insert(stat.to_string(), json!(self.stat(metric, stat)));
                }
                Value::Object(row)
            })
            .collect();
        json!(rows)
    }

    fn options(&self) -> Vec<String> {
        match &self.frame {
            Some(frame) => frame.numeric_columns().iter().map(|c| c.to_string()).collect(),
            None => Vec::new(),
        }
    }

    fn add_row(&mut self, key: &str) {
        self.rows.push(key.to_string());
    }

    fn delete_row(&mut self, index: usize) {
        if index < self.rows.len() {
            self.rows.remove(index);
        }
    }

    fn bind(&mut self, frame: Arc<Frame>) {
        self.frame = Some(frame);
    }

    fn reset(&mut self) {
        self.rows = DEFAULT_ROWS.iter().map(|r| r.to_string()).collect();
        self.frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Arc<Frame> {
        let raw = "object_width\tobject_height\tobject_label\n\
                   [f]\t[f]\t[t]\n\
                   10\t4\tcopepod\n\
                   20\t6\tdiatom\n\
                   30\t8\tcopepod\n";
        Arc::new(Frame::from_tsv(raw, "export.tsv", None).unwrap())
    }

    #[test]
    fn test_default_rows_zero_without_dataset() {
        let table = StatsTable::new();
        let rows = table.rows();
        assert_eq!(rows.as_array().unwrap().len(), 5);
        assert_eq!(rows[0][LABEL_COLUMN], "object_width");
        assert_eq!(rows[0]["mean"], 0.0);
        assert!(table.options().is_empty());
    }

    #[test]
    fn test_bind_fills_stats() {
        let mut table = StatsTable::new();
        table.bind(sample());
        let rows = table.rows();
        assert_eq!(rows[0]["mean"], 20.0);
        assert_eq!(rows[0]["sd"], 8.16);
        // Metrics absent from the dataset stay at zero.
        assert_eq!(rows[2]["mean"], 0.0);
        assert_eq!(table.options(), vec!["object_width", "object_height"]);
    }

    #[test]
    fn test_add_and_delete_rows() {
        let mut table = StatsTable::new();
        table.bind(sample());
        table.add_row("object_height");
        assert_eq!(table.rows().as_array().unwrap().len(), 6);
        table.delete_row(0);
        let rows = table.rows();
        assert_eq!(rows.as_array().unwrap().len(), 5);
        assert_eq!(rows[0][LABEL_COLUMN], "object_height");
        // Out-of-range delete is a no-op.
        table.delete_row(99);
        assert_eq!(table.rows().as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut table = StatsTable::new();
        table.bind(sample());
        table.add_row("object_height");
        table.reset();
        assert_eq!(table.rows().as_array().unwrap().len(), 5);
        assert_eq!(table.rows()[0]["mean"], 0.0);
    }
}
