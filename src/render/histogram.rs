//! Histogram of one dataset column with count/percent normalization.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::dataset::Frame;
use crate::render::scatter::column_json;

pub fn figure(frame: &Frame, x: &str) -> Result<Value> {
    if !frame.has_column(x) {
        bail!("no column '{}' in {}", x, frame.provenance.name);
    }

    Ok(json!({
        "data": [{
            "type": "histogram",
            "x": column_json(frame, x),
        }],
        "layout": {
            "xaxis": {"title": {"text": x}},
            "updatemenus": [{
                "type": "buttons",
                "direction": "left",
                "pad": {"r": 10, "t": 10},
                "showactive": true,
                "x": 0.1, "xanchor": "left",
                "y": 1.1, "yanchor": "top",
                "buttons": [
                    {
                        "label": "Standard Units",
                        "method": "update",
                        "args": [{"histnorm": ""}, {"yaxis": {"title": "Count"}}]
                    },
                    {
                        "label": "Percentage",
                        "method": "update",
                        "args": [{"histnorm": "percent"}, {"yaxis": {"title": "Percentage"}}]
                    }
                ]
            }]
        }
    }))
}
