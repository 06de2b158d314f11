//! Figure builders and table models for the embeddable views.
//!
//! Every view is an HTML page with the chart library loaded from a
//! CDN and the figure spec inlined as JSON. Figure builders produce
//! that spec; table models back the polling table pages.

use serde_json::Value;
use std::sync::Arc;

use crate::dataset::Frame;

pub mod datatable;
pub mod histogram;
pub mod infotable;
pub mod scatter;
pub mod timeline;
pub mod worldmap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Scatter,
    Histogram,
    WorldMap,
    Timeline,
    DataTable,
    InfoTable,
}

impl ViewKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewKind::Scatter => "scatter",
            ViewKind::Histogram => "histogram",
            ViewKind::WorldMap => "worldmap",
            ViewKind::Timeline => "timeline",
            ViewKind::DataTable => "datatable",
            ViewKind::InfoTable => "infotable",
        }
    }
}

/// Behaviour shared by the two table views. The chart pages poll
/// `/data.json` and mutate rows through plain POSTs, so the model
/// lives server-side behind a lock.
pub trait Table: Send {
    /// Table header, label column first.
    fn columns(&self) -> Vec<String>;
    /// Current rows as JSON objects keyed by column name.
    fn rows(&self) -> Value;
    /// Dropdown options for the add-row control.
    fn options(&self) -> Vec<String>;
    fn add_row(&mut self, key: &str);
    fn delete_row(&mut self, index: usize);
    /// Point the table at a newly loaded dataset.
    fn bind(&mut self, frame: Arc<Frame>);
    /// Back to the default rows, used when a slot is reclaimed.
    fn reset(&mut self);
}

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.32.0.min.js";

/// Page for a one-off figure view. The red X posts to `/shutdown`,
/// which tears the view down and frees its slot.
pub fn figure_page(title: &str, figure: &Value, close_button: bool, mode_bar: bool) -> String {
    let button = if close_button {
        r#"<button id="stop-button">X</button>"#
    } else {
        ""
    };
    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>{title}</title>
    <script src="{cdn}"></script>
    <style>
      html, body {{ margin: 0; width: 100%; height: 100%; }}
      #chart {{ position: relative; width: 100%; height: 100%; }}
      #stop-button {{ position: absolute; top: 10px; right: 10px; background-color: red; color: white; border: none; cursor: pointer; z-index: 10; }}
    </style>
  </head>
  <body>
    <div id="chart"></div>
    {button}
    <script>
      const fig = {figure};
      Plotly.newPlot('chart', fig.data, fig.layout, {{responsive: true, displayModeBar: {mode_bar}}});
      const stop = document.getElementById('stop-button');
      if (stop) {{
        stop.addEventListener('click', async () => {{
          await fetch('/shutdown', {{method: 'POST'}});
          stop.textContent = 'Server stopped';
        }});
      }}
    </script>
  </body>
</html>
"#,
        title = title,
        cdn = PLOTLY_CDN,
        figure = figure,
        button = button,
        mode_bar = mode_bar,
    )
}

/// Page for a table view: renders `/data.json` every 2.5 s, with a
/// dropdown + button to add rows and per-row delete buttons.
pub fn table_page(title: &str, row_deletable: bool) -> String {
    format!(
        r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>{title}</title>
    <style>
      body {{ font-family: system-ui, sans-serif; margin: 0; width: 100%; height: 100%; }}
      table {{ width: 100%; border-collapse: collapse; text-align: center; }}
      th {{ background-color: lightgray; font-weight: bold; padding: 6px; }}
      td {{ padding: 6px; border-bottom: 1px solid #ddd; }}
      tr:nth-child(odd) td {{ background-color: rgb(240, 240, 240); }}
      .controls {{ display: flex; justify-content: flex-start; align-items: center; height: 50px; gap: 8px; padding: 4px; }}
      .controls select {{ flex: 2; }}
      .controls button {{ flex: 1; height: 90%; }}
    </style>
  </head>
  <body>
    <div style="width: 100%"><table id="table"></table></div>
    <div class="controls">
      <select id="row-dropdown"></select>
      <button id="add-row">Add Row</button>
    </div>
    <script>
      const deletable = {row_deletable};
      async function refresh() {{
        const resp = await fetch('/data.json');
        const data = await resp.json();
        const table = document.getElementById('table');
        let html = '<tr>' + data.columns.map(c => '<th>' + c + '</th>').join('');
        if (deletable) html += '<th></th>';
        html += '</tr>';
        data.rows.forEach((row, i) => {{
          html += '<tr>' + data.columns.map(c => '<td>' + (row[c] ?? '') + '</td>').join('');
          if (deletable) html += '<td><button data-i="' + i + '" class="del">x</button></td>';
          html += '</tr>';
        }});
        table.innerHTML = html;
        const dropdown = document.getElementById('row-dropdown');
        dropdown.innerHTML = data.options.map(o => '<option value="' + o + '">' + o + '</option>').join('');
        table.querySelectorAll('.del').forEach(btn => btn.addEventListener('click', async () => {{
          await fetch('/rows/delete', {{
            method: 'POST',
            headers: {{'Content-Type': 'application/json'}},
            body: JSON.stringify({{index: parseInt(btn.dataset.i)}}),
          }});
          refresh();
        }}));
      }}
      document.getElementById('add-row').addEventListener('click', async () => {{
        const key = document.getElementById('row-dropdown').value;
        if (!key) return;
        await fetch('/rows', {{
          method: 'POST',
          headers: {{'Content-Type': 'application/json'}},
          body: JSON.stringify({{key: key}}),
        }});
        refresh();
      }});
      refresh();
      setInterval(refresh, 2500);
    </script>
  </body>
</html>
"#,
        title = title,
        row_deletable = row_deletable,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_figure_page_embeds_spec_and_button() {
        let fig = json!({"data": [], "layout": {}});
        let page = figure_page("width vs height", &fig, true, true);
        assert!(page.contains("width vs height"));
        assert!(page.contains(r#""data":[]"#));
        assert!(page.contains("stop-button"));
        assert!(page.contains("/shutdown"));
    }

    #[test]
    fn test_figure_page_without_close_button() {
        let fig = json!({"data": [], "layout": {}});
        let page = figure_page("stations", &fig, false, false);
        assert!(!page.contains(r#"<button id="stop-button">"#));
        assert!(page.contains("displayModeBar: false"));
    }

    #[test]
    fn test_table_page_polls_data() {
        let page = table_page("Morphology metrics", true);
        assert!(page.contains("/data.json"));
        assert!(page.contains("2500"));
        assert!(page.contains("Add Row"));
    }
}
