//! Object concentration over sampling dates, one bar group per export.
//!
//! Sample summaries come from `summary.json` in the data directory.
//! Dates arrive as `YYYYMMDD` (string or number, the export tooling
//! has produced both).

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct SampleSummary {
    pub filename: String,
    pub date: NaiveDate,
    pub objects_per_ml: f64,
    pub lat: f64,
    pub lon: f64,
}

pub fn read_summaries(path: &Path) -> Result<Vec<SampleSummary>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    let records: Vec<Value> =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

    let mut out = Vec::with_capacity(records.len());
    for rec in &records {
        out.push(SampleSummary {
            filename: rec["filename"].as_str().unwrap_or_default().to_string(),
            date: parse_date(&rec["date"])?,
            objects_per_ml: rec["Objects/ml"].as_f64().unwrap_or(0.0),
            lat: rec["lat"].as_f64().unwrap_or(0.0),
            lon: rec["lon"].as_f64().unwrap_or(0.0),
        });
    }
    Ok(out)
}

fn parse_date(v: &Value) -> Result<NaiveDate> {
    let compact = match v {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        other => return Err(anyhow!("unsupported date value: {}", other)),
    };
    NaiveDate::parse_from_str(&compact, "%Y%m%d").with_context(|| format!("bad date '{}'", compact))
}

pub fn figure(samples: &[SampleSummary]) -> Value {
    // One trace per export so bars group side by side on shared dates.
    let mut traces: Vec<Value> = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    for s in samples {
        if !seen.contains(&s.filename.as_str()) {
            seen.push(&s.filename);
        }
    }
    for name in seen {
        let group: Vec<&SampleSummary> = samples.iter().filter(|s| s.filename == name).collect();
        let x: Vec<String> = group.iter().map(|s| s.date.format("%Y-%m-%d").to_string()).collect();
        let y: Vec<f64> = group.iter().map(|s| s.objects_per_ml).collect();
        let customdata: Vec<Value> = group.iter().map(|s| json!([s.lat, s.lon])).collect();
        traces.push(json!({
            "type": "bar",
            "name": name,
            "x": x,
            "y": y,
            "customdata": customdata,
            "marker": {"color": "#a3a7e4"},
            "hovertemplate": "%{fullData.name}<br>%{x}<br>%{y:.2f} objects/ml<br>(%{customdata[0]}, %{customdata[1]})<extra></extra>"
        }));
    }

    json!({
        "data": traces,
        "layout": {
            "barmode": "group",
            "autosize": true,
            "margin": {"l": 0, "r": 0, "t": 0, "b": 0},
            "height": 150,
            "showlegend": false
        }
    })
}
