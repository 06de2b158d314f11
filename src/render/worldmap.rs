//! Sampling stations on a world map, colored by object count.
//!
//! Station records come from `datasets.json` in the data directory,
//! one record per export the rig knows about.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub filename: String,
    pub number_of_objects: u64,
    pub lat: f64,
    pub lon: f64,
}

pub fn read_stations(path: &Path) -> Result<Vec<Station>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("open {}", path.display()))?;
    let stations: Vec<Station> =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(stations)
}

pub fn figure(stations: &[Station]) -> Value {
    let lat: Vec<f64> = stations.iter().map(|s| s.lat).collect();
    let lon: Vec<f64> = stations.iter().map(|s| s.lon).collect();
    let counts: Vec<u64> = stations.iter().map(|s| s.number_of_objects).collect();
    let names: Vec<&str> = stations.iter().map(|s| s.filename.as_str()).collect();

    json!({
        "data": [{
            "type": "scattergeo",
            "lat": lat,
            "lon": lon,
            "text": names,
            "marker": {
                "size": 10,
                "opacity": 0.6,
                "color": counts,
                // Blue for sparse stations through red for dense ones.
                "colorscale": [[0, "rgb(0,0,255)"], [1, "rgb(255,0,0)"]],
                "colorbar": {
                    "thickness": 10,
                    "len": 0.7,
                    "yanchor": "middle",
                    "y": 0.5
                }
            }
        }],
        "layout": {
            "geo": {"projection": {"type": "natural earth"}},
            "autosize": true,
            "margin": {"l": 0, "r": 0, "t": 0, "b": 0}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stations() -> Vec<Station> {
        vec![
            Station { filename: "dataset1.tsv".into(), number_of_objects: 100, lat: 0.0, lon: -30.0 },
            Station { filename: "dataset2.tsv".into(), number_of_objects: 500, lat: -10.0, lon: 150.0 },
        ]
    }

    #[test]
    fn test_scattergeo_shape() {
        let fig = figure(&stations());
        let trace = &fig["data"][0];
        assert_eq!(trace["type"], "scattergeo");
        assert_eq!(trace["lat"], json!([0.0, -10.0]));
        assert_eq!(trace["marker"]["color"], json!([100, 500]));
        assert_eq!(fig["layout"]["geo"]["projection"]["type"], "natural earth");
    }

    #[test]
    fn test_station_records_parse() {
        let raw = r#"[{"filename":"a.tsv","number_of_objects":3,"lat":1.5,"lon":-2.5}]"#;
        let stations: Vec<Station> = serde_json::from_str(raw).unwrap();
        assert_eq!(stations[0].number_of_objects, 3);
        assert_eq!(stations[0].lon, -2.5);
    }
}
