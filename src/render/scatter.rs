//! Scatter of two dataset columns, with linear/log toggles per axis.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::dataset::Frame;

pub fn figure(frame: &Frame, x: &str, y: &str) -> Result<Value> {
    for col in [x, y] {
        if !frame.has_column(col) {
            bail!("no column '{}' in {}", col, frame.provenance.name);
        }
    }

    let mut trace = json!({
        "type": "scatter",
        "mode": "markers",
        "x": column_json(frame, x),
        "y": column_json(frame, y),
        "marker": {"size": 10, "color": "#a3a7e4"},
    });
    // Per-point image names let the embedding page resolve a click to
    // the object's vignette.
    if frame.has_column("img_file_name") {
        trace["customdata"] = json!(frame.column_values("img_file_name"));
    }

    Ok(json!({
        "data": [trace],
        "layout": {
            "xaxis": {"title": {"text": x}},
            "yaxis": {"title": {"text": y}},
            "updatemenus": [
                {
                    "type": "buttons",
                    "direction": "down",
                    "showactive": true,
                    "x": -0.03, "xanchor": "left",
                    "y": 1, "yanchor": "top",
                    "buttons": [
                        {"label": "Linear", "method": "relayout", "args": [{"yaxis.type": "linear"}]},
                        {"label": "Log", "method": "relayout", "args": [{"yaxis.type": "log"}]}
                    ]
                },
                {
                    "type": "buttons",
                    "direction": "right",
                    "showactive": true,
                    "x": 0.90, "xanchor": "left",
                    "y": -0.05, "yanchor": "top",
                    "buttons": [
                        {"label": "Linear", "method": "relayout", "args": [{"xaxis.type": "linear"}]},
                        {"label": "Log", "method": "relayout", "args": [{"xaxis.type": "log"}]}
                    ]
                }
            ]
        }
    }))
}

/// Numeric columns as numbers (NaN serializes to null), text columns
/// as raw strings.
pub(crate) fn column_json(frame: &Frame, col: &str) -> Value {
    if let Some(values) = frame.numeric_column(col) {
        return json!(values);
    }
    json!(frame.column_values(col))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        let raw = "object_width\tobject_height\timg_file_name\n\
                   [f]\t[f]\t[t]\n\
                   10\t4\timg_1.png\n\
                   20\t\timg_2.png\n";
        Frame::from_tsv(raw, "export.tsv", None).unwrap()
    }

    #[test]
    fn test_scatter_trace_shape() {
        let fig = figure(&sample(), "object_width", "object_height").unwrap();
        let trace = &fig["data"][0];
        assert_eq!(trace["type"], "scatter");
        assert_eq!(trace["mode"], "markers");
        assert_eq!(trace["x"], json!([10.0, 20.0]));
        // Empty cell surfaces as a null point, not a dropped row.
        assert_eq!(trace["y"][1], Value::Null);
        assert_eq!(trace["customdata"][0], "img_1.png");
        assert_eq!(trace["marker"]["color"], "#a3a7e4");
    }

    #[test]
    fn test_axis_toggles_present() {
        let fig = figure(&sample(), "object_width", "object_height").unwrap();
        let menus = fig["layout"]["updatemenus"].as_array().unwrap();
        assert_eq!(menus.len(), 2);
        assert_eq!(menus[0]["buttons"][1]["label"], "Log");
    }

    #[test]
    fn test_unknown_column_rejected() {
        assert!(figure(&sample(), "object_width", "nope").is_err());
    }
}
