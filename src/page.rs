//! The external charts page: an HTML file served by the control
//! surface, holding one iframe per announced view.
//!
//! The file is machine-written by this module only, so recovering the
//! iframe list on startup is a plain scan for `<iframe src="...">`
//! tags rather than a full HTML parse.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use url::Url;

pub struct ChartsPage {
    path: PathBuf,
    iframes: Vec<String>,
}

impl ChartsPage {
    /// Open the page file, recovering any iframes already embedded.
    /// A missing file is created from the default template.
    pub fn open(path: &Path) -> Result<Self> {
        let mut page = Self { path: path.to_path_buf(), iframes: Vec::new() };
        match std::fs::read_to_string(path) {
            Ok(html) => {
                page.iframes = extract_iframe_srcs(&html);
            }
            Err(_) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("create {}", parent.display()))?;
                }
                page.write()?;
            }
        }
        Ok(page)
    }

    pub fn iframes(&self) -> &[String] {
        &self.iframes
    }

    pub fn add_iframe(&mut self, url: &str) -> Result<()> {
        if !self.iframes.iter().any(|u| same_url(u, url)) {
            self.iframes.push(url.to_string());
        }
        self.write()
    }

    /// Remove the iframe pointing at `url`. Returns whether one was
    /// found.
    pub fn remove_iframe(&mut self, url: &str) -> Result<bool> {
        let before = self.iframes.len();
        self.iframes.retain(|u| !same_url(u, url));
        let removed = self.iframes.len() != before;
        self.write()?;
        Ok(removed)
    }

    fn render(&self) -> String {
        let iframes: String = self
            .iframes
            .iter()
            .map(|u| format!("      <iframe src=\"{}\"></iframe>\n", u))
            .collect();
        format!(
            r#"<!doctype html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>Charts</title>
    <style>
      body {{ margin: 0; }}
      .iframe-container {{ display: flex; flex-wrap: wrap; gap: 10px; padding: 10px; }}
      .iframe-container iframe {{ border: none; width: 48%; height: 420px; }}
    </style>
  </head>
  <body>
    <div class="iframe-container">
{iframes}    </div>
  </body>
</html>
"#,
            iframes = iframes
        )
    }

    fn write(&self) -> Result<()> {
        std::fs::write(&self.path, self.render())
            .with_context(|| format!("write {}", self.path.display()))
    }
}

/// URL equality that tolerates the trailing-slash and default-port
/// spelling differences between announce and remove messages.
pub(crate) fn same_url(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(ua), Ok(ub)) => ua == ub,
        _ => a == b,
    }
}

fn extract_iframe_srcs(html: &str) -> Vec<String> {
    let mut srcs = Vec::new();
    let mut rest = html;
    while let Some(idx) = rest.find("<iframe src=\"") {
        rest = &rest[idx + "<iframe src=\"".len()..];
        if let Some(end) = rest.find('"') {
            srcs.push(rest[..end].to_string());
            rest = &rest[end..];
        } else {
            break;
        }
    }
    srcs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_url_normalizes_trailing_slash() {
        assert!(same_url("http://192.168.1.50:8051", "http://192.168.1.50:8051/"));
        assert!(!same_url("http://192.168.1.50:8051/", "http://192.168.1.50:8052/"));
    }

    #[test]
    fn test_extract_iframe_srcs() {
        let html = r#"<div class="iframe-container">
            <iframe src="http://10.0.0.2:8051/"></iframe>
            <iframe src="http://10.0.0.2:8052/"></iframe>
        </div>"#;
        assert_eq!(
            extract_iframe_srcs(html),
            vec!["http://10.0.0.2:8051/", "http://10.0.0.2:8052/"]
        );
        assert!(extract_iframe_srcs("<p>no frames</p>").is_empty());
    }

    #[test]
    fn test_render_contains_container_and_iframes() {
        let page = ChartsPage {
            path: PathBuf::from("/tmp/unused.html"),
            iframes: vec!["http://10.0.0.2:8051/".to_string()],
        };
        let html = page.render();
        assert!(html.contains("iframe-container"));
        assert!(html.contains(r#"<iframe src="http://10.0.0.2:8051/">"#));
    }
}
