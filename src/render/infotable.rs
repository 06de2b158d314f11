//! Project information table: one row per sampling metadata field.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::dataset::Frame;
use crate::render::Table;

pub const LABEL_COLUMN: &str = "Project Information";
pub const VALUE_COLUMN: &str = "Value";

/// Where a row's value comes from: a dataset column (first data row,
/// these fields repeat per object) or the object count.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RowSource {
    Column(String),
    Count,
}

#[derive(Debug, Clone)]
struct InfoRow {
    label: String,
    source: RowSource,
}

fn default_rows() -> Vec<InfoRow> {
    let col = |label: &str, source: &str| InfoRow {
        label: label.to_string(),
        source: RowSource::Column(source.to_string()),
    };
    vec![
        col("Project Name", "sample_project"),
        InfoRow { label: "Number of objects".to_string(), source: RowSource::Count },
        col("Sample ID", "sample_id"),
        col("Ship", "sample_ship"),
        col("Sampling operator", "sample_operator"),
        col("Sampling gear", "sample_sampling_gear"),
        col("Concentrated volume (mL)", "sample_concentrated_sample_volume"),
        col("Total volume (mL)", "sample_total_volume"),
        col("Dilution factor", "sample_dilution_factor"),
        col("Acquisition date (UTC)", "acq_local_datetime"),
        col("Pixel size (um)", "process_pixel"),
    ]
}

pub struct InfoTable {
    rows: Vec<InfoRow>,
    frame: Option<Arc<Frame>>,
}

impl InfoTable {
    pub fn new() -> Self {
        Self { rows: default_rows(), frame: None }
    }

    fn value_of(&self, row: &InfoRow) -> Value {
        let Some(frame) = &self.frame else { return Value::Null };
        match &row.source {
            RowSource::Count => json!(frame.len()),
            RowSource::Column(col) => frame.first_value(col).map(|v| json!(v)).unwrap_or(Value::Null),
        }
    }
}

impl Default for InfoTable {
    fn default() -> Self {
        Self::new()
    }
}

/// `sample_sampling_gear` → `sampling gear`.
fn strip_prefix_label(column: &str) -> String {
    let parts: Vec<&str> = column.split('_').skip(1).collect();
    if parts.is_empty() {
        column.to_string()
    } else {
        parts.join(" ")
    }
}

impl Table for InfoTable {
    fn columns(&self) -> Vec<String> {
        vec![LABEL_COLUMN.to_string(), VALUE_COLUMN.to_string()]
    }

    fn rows(&self) -> Value {
        let rows: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                json!({
                    LABEL_COLUMN: row.label,
                    VALUE_COLUMN: self.value_of(row),
                })
            })
            .collect();
        json!(rows)
    }

    fn options(&self) -> Vec<String> {
        match &self.frame {
            Some(frame) => frame
                .columns()
                .iter()
                .filter(|c| c.contains("sample") || c.contains("acq"))
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    fn add_row(&mut self, key: &str) {
        self.rows.push(InfoRow {
            label: strip_prefix_label(key),
            source: RowSource::Column(key.to_string()),
        });
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
        self.rows = default_rows();
        self.frame = None;
    }
}
