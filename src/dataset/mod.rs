//! EcoTaxa-style TSV exports loaded into a small in-memory frame.
//!
//! Layout of an export file:
//!   line 1: column names
//!   line 2: type markers, `[f]` for float columns, `[t]` for text
//!   line 3+: data rows
//!
//! Column names are lowercased on load. `[f]` columns are coerced to
//! f64; an empty cell becomes NaN, anything else unparsable fails the
//! load. A path of the form `export.zip:member.tsv` loads the member
//! out of the archive.

use anyhow::{anyhow, bail, Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::logging::ts_epoch;

/// Where a frame came from.
#[derive(Debug, Clone)]
pub struct Provenance {
    /// Path as given, including the `zip:member` composite form.
    pub path: String,
    /// Basename of the source, e.g. `ecotaxa_export.tsv`.
    pub name: String,
    /// Archive the member was read from, when applicable.
    pub archive: Option<String>,
    pub sha256: String,
    pub rows: usize,
    /// Ragged data rows skipped during the load.
    pub bad_rows: usize,
    pub loaded_at: u64,
}

#[derive(Debug)]
pub struct Frame {
    columns: Vec<String>,
    cells: Vec<Vec<String>>,
    numeric: HashMap<String, Vec<f64>>,
    pub provenance: Provenance,
}

impl Frame {
    /// Load a frame from a `.tsv` path or an `archive.zip:member.tsv`
    /// composite path.
    pub fn load(path: &str) -> Result<Frame> {
        let (raw, archive) = read_source(path)?;
        Frame::from_tsv(&raw, path, archive)
    }

    /// Parse TSV content. `path` and `archive` only feed provenance.
    pub fn from_tsv(raw: &str, path: &str, archive: Option<String>) -> Result<Frame> {
        let mut lines = raw.lines().map(|l| l.trim_end_matches('\r'));

        let header = lines.next().ok_or_else(|| anyhow!("{}: empty file", path))?;
        let columns: Vec<String> = header.split('\t').map(|c| c.trim().to_lowercase()).collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            bail!("{}: no columns in header", path);
        }

        let marker_line = lines
            .next()
            .ok_or_else(|| anyhow!("{}: missing type marker row", path))?;
        let markers: Vec<&str> = marker_line.split('\t').map(|m| m.trim()).collect();
        if markers.len() != columns.len() {
            bail!(
                "{}: type marker row has {} fields, header has {}",
                path,
                markers.len(),
                columns.len()
            );
        }

        let mut cells: Vec<Vec<String>> = Vec::new();
        let mut bad_rows = 0usize;
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let row: Vec<String> = line.split('\t').map(|c| c.to_string()).collect();
            if row.len() != columns.len() {
                bad_rows += 1;
                continue;
            }
            cells.push(row);
        }

        let mut numeric: HashMap<String, Vec<f64>> = HashMap::new();
        for (idx, col) in columns.iter().enumerate() {
            if markers[idx] != "[f]" {
                continue;
            }
            let mut values = Vec::with_capacity(cells.len());
            for (row_no, row) in cells.iter().enumerate() {
                let cell = row[idx].trim();
                if cell.is_empty() {
                    values.push(f64::NAN);
                    continue;
                }
                let v: f64 = cell.parse().with_context(|| {
                    format!("{}: column '{}' row {}: not numeric: '{}'", path, col, row_no + 1, cell)
                })?;
                values.push(v);
            }
            numeric.insert(col.clone(), values);
        }

        let name = basename(path);
        let provenance = Provenance {
            path: path.to_string(),
            name,
            archive,
            sha256: hex::encode(Sha256::digest(raw.as_bytes())),
            rows: cells.len(),
            bad_rows,
            loaded_at: ts_epoch(),
        };

        Ok(Frame { columns, cells, numeric, provenance })
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.numeric.contains_key(name)
    }

    /// Numeric column values, NaN where the cell was empty.
    pub fn numeric_column(&self, name: &str) -> Option<&[f64]> {
        self.numeric.get(name).map(|v| v.as_slice())
    }

    /// Numeric column names in header order.
    pub fn numeric_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| self.numeric.contains_key(c.as_str()))
            .map(|c| c.as_str())
            .collect()
    }

    /// Raw cell values of a column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.cells.iter().map(|row| row[idx].as_str()).collect())
    }

    /// First data row of a column, the way the info table samples
    /// per-project metadata fields.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        let idx = self.columns.iter().position(|c| c == name)?;
        self.cells.first().map(|row| row[idx].as_str())
    }

    /// Numeric morphology columns: name contains `object_` but is
    /// neither an identifier nor a label.
    pub fn columns_of_interest(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| {
                self.numeric.contains_key(c.as_str())
                    && c.contains("object_")
                    && !c.contains("id")
                    && !c.contains("label")
            })
            .cloned()
            .collect()
    }

    pub fn mean(&self, col: &str) -> f64 {
        round2(self.reduce(col, |vals| vals.iter().sum::<f64>() / vals.len() as f64))
    }

    /// Population standard deviation.
    pub fn sd(&self, col: &str) -> f64 {
        round2(self.reduce(col, |vals| {
            let n = vals.len() as f64;
            let mean = vals.iter().sum::<f64>() / n;
            (vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
        }))
    }

    pub fn min(&self, col: &str) -> f64 {
        round2(self.reduce(col, |vals| vals.iter().cloned().fold(f64::INFINITY, f64::min)))
    }

    pub fn max(&self, col: &str) -> f64 {
        round2(self.reduce(col, |vals| vals.iter().cloned().fold(f64::NEG_INFINITY, f64::max)))
    }

    /// Apply a reducer over the non-NaN values of a numeric column.
    /// Non-numeric or empty columns reduce to 0, matching what the
    /// rig's tables display for unusable metrics.
    fn reduce(&self, col: &str, f: impl Fn(&[f64]) -> f64) -> f64 {
        let Some(values) = self.numeric.get(col) else {
            return 0.0;
        };
        let clean: Vec<f64> = values.iter().cloned().filter(|v| !v.is_nan()).collect();
        if clean.is_empty() {
            return 0.0;
        }
        f(&clean)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn basename(path: &str) -> String {
    let tail = path.rsplit(|c| c == '/' || c == '\\' || c == ':').next().unwrap_or(path);
    tail.to_string()
}

/// Read a source file, resolving `archive.zip:member` composites.
fn read_source(path: &str) -> Result<(String, Option<String>)> {
    if let Some((zip_part, member)) = split_zip_path(path) {
        let file = File::open(&zip_part).with_context(|| format!("open archive {}", zip_part))?;
        let mut archive = zip::ZipArchive::new(file).with_context(|| format!("read archive {}", zip_part))?;
        let mut entry = archive
            .by_name(&member)
            .with_context(|| format!("{}: no member {}", zip_part, member))?;
        let mut raw = String::new();
        entry.read_to_string(&mut raw)?;
        Ok((raw, Some(zip_part)))
    } else {
        let raw = std::fs::read_to_string(path).with_context(|| format!("open {}", path))?;
        Ok((raw, None))
    }
}

/// `export.zip:member.tsv` → (`export.zip`, `member.tsv`).
fn split_zip_path(path: &str) -> Option<(String, String)> {
    let idx = path.find(".zip:")?;
    let (zip_part, rest) = path.split_at(idx + 4);
    Some((zip_part.to_string(), rest[1..].to_string()))
}

/// Recursively discover `.tsv` files under `dir`, including members
/// of `.zip` archives (reported in the composite `zip:member` form).
pub fn find_tsv_files(dir: &str) -> Result<Vec<String>> {
    let mut found = Vec::new();
    walk(Path::new(dir), &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<String>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, found)?;
            continue;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        match ext {
            "tsv" => found.push(path.to_string_lossy().to_string()),
            "zip" => {
                // Unreadable archives are skipped, not fatal to discovery.
                let Ok(file) = File::open(&path) else { continue };
                let Ok(mut archive) = zip::ZipArchive::new(file) else { continue };
                for i in 0..archive.len() {
                    if let Ok(member) = archive.by_index(i) {
                        if member.name().ends_with(".tsv") {
                            found.push(format!("{}:{}", path.to_string_lossy(), member.name()));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "object_id\tObject_Width\tobject_height\tobject_label\timg_file_name\n\
                          [t]\t[f]\t[f]\t[t]\t[t]\n\
                          o1\t10\t4\tcopepod\timg_1.png\n\
                          o2\t20\t6\tdiatom\timg_2.png\n\
                          o3\t30\t8\tcopepod\timg_3.png\n";

    #[test]
    fn test_headers_lowercased_and_marker_row_dropped() {
        let f = Frame::from_tsv(SAMPLE, "export.tsv", None).unwrap();
        assert_eq!(f.columns()[1], "object_width");
        assert_eq!(f.len(), 3);
        assert_eq!(f.first_value("object_id"), Some("o1"));
    }

    #[test]
    fn test_float_columns_coerced() {
        let f = Frame::from_tsv(SAMPLE, "export.tsv", None).unwrap();
        assert!(f.is_numeric("object_width"));
        assert!(!f.is_numeric("object_label"));
        assert_eq!(f.numeric_column("object_height").unwrap(), &[4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_columns_of_interest_excludes_ids_and_labels() {
        let f = Frame::from_tsv(SAMPLE, "export.tsv", None).unwrap();
        assert_eq!(f.columns_of_interest(), vec!["object_width", "object_height"]);
    }

    #[test]
    fn test_stats_rounded_to_two_decimals() {
        let f = Frame::from_tsv(SAMPLE, "export.tsv", None).unwrap();
        assert_eq!(f.mean("object_width"), 20.0);
        assert_eq!(f.min("object_width"), 10.0);
        assert_eq!(f.max("object_width"), 30.0);
        // population sd of {10,20,30} = sqrt(200/3) = 8.164...
        assert_eq!(f.sd("object_width"), 8.16);
    }

    #[test]
    fn test_stats_of_text_column_are_zero() {
        let f = Frame::from_tsv(SAMPLE, "export.tsv", None).unwrap();
        assert_eq!(f.mean("object_label"), 0.0);
        assert_eq!(f.sd("missing_entirely"), 0.0);
    }

    #[test]
    fn test_empty_numeric_cell_becomes_nan_and_skips_stats() {
        let raw = "object_area\n[f]\n5\n\n7\n";
        // The blank line is a skipped empty row, not an empty cell; build one explicitly.
        let raw2 = "object_area\tobject_depth\n[f]\t[f]\n5\t1\n\t2\n7\t3\n";
        let f = Frame::from_tsv(raw2, "x.tsv", None).unwrap();
        assert!(f.numeric_column("object_area").unwrap()[1].is_nan());
        assert_eq!(f.mean("object_area"), 6.0);
        let g = Frame::from_tsv(raw, "y.tsv", None).unwrap();
        assert_eq!(g.len(), 2);
        assert_eq!(g.mean("object_area"), 6.0);
    }

    #[test]
    fn test_unparsable_numeric_cell_fails_load() {
        let raw = "object_area\n[f]\nnot-a-number\n";
        let err = Frame::from_tsv(raw, "x.tsv", None).unwrap_err();
        assert!(err.to_string().contains("object_area"));
    }

    #[test]
    fn test_ragged_rows_counted_not_fatal() {
        let raw = "a\tb\n[f]\t[f]\n1\t2\n3\n4\t5\n";
        let f = Frame::from_tsv(raw, "x.tsv", None).unwrap();
        assert_eq!(f.len(), 2);
        assert_eq!(f.provenance.bad_rows, 1);
    }

    #[test]
    fn test_provenance_hash_and_name() {
        let f = Frame::from_tsv(SAMPLE, "/data/run1/export.tsv", None).unwrap();
        assert_eq!(f.provenance.name, "export.tsv");
        assert_eq!(f.provenance.sha256.len(), 64);
        assert_eq!(f.provenance.rows, 3);
        assert!(f.provenance.archive.is_none());
    }

    #[test]
    fn test_split_zip_path() {
        assert_eq!(
            split_zip_path("/data/export.zip:inner/ecotaxa.tsv"),
            Some(("/data/export.zip".to_string(), "inner/ecotaxa.tsv".to_string()))
        );
        assert_eq!(split_zip_path("/data/plain.tsv"), None);
    }

    #[test]
    fn test_missing_marker_row_is_error() {
        assert!(Frame::from_tsv("a\tb\n", "x.tsv", None).is_err());
        assert!(Frame::from_tsv("", "x.tsv", None).is_err());
    }
}
