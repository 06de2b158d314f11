//! End-to-end checks for the dataset path: real files on disk through
//! the loader, discovery and the load-history store.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use planktovis::dataset::{find_tsv_files, Frame};
use planktovis::storage::HistoryStore;

const EXPORT: &str = "object_id\tobject_width\tobject_height\tobject_area\tsample_project\timg_file_name\n\
                      [t]\t[f]\t[f]\t[f]\t[t]\t[t]\n\
                      o1\t10\t4\t40\tBTS2023\timg_1.png\n\
                      o2\t20\t6\t120\tBTS2023\timg_2.png\n\
                      o3\t30\t8\t240\tBTS2023\timg_3.png\n";

fn write_export(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, EXPORT).unwrap();
    path.to_string_lossy().into_owned()
}

fn write_zip(dir: &Path, name: &str, member: &str) -> String {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    writer
        .start_file(member, zip::write::SimpleFileOptions::default())
        .unwrap();
    writer.write_all(EXPORT.as_bytes()).unwrap();
    writer.finish().unwrap();
    path.to_string_lossy().into_owned()
}

#[test]
fn load_export_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_export(dir.path(), "ecotaxa_export.tsv");

    let frame = Frame::load(&path).unwrap();
    assert_eq!(frame.len(), 3);
    assert_eq!(frame.columns_of_interest(), vec!["object_width", "object_height", "object_area"]);
    assert_eq!(frame.mean("object_area"), 133.33);
    assert_eq!(frame.provenance.name, "ecotaxa_export.tsv");
    assert!(frame.provenance.archive.is_none());
}

#[test]
fn load_export_from_zip_member() {
    let dir = tempfile::tempdir().unwrap();
    let zip_path = write_zip(dir.path(), "export.zip", "run1/ecotaxa_export.tsv");

    let composite = format!("{}:run1/ecotaxa_export.tsv", zip_path);
    let frame = Frame::load(&composite).unwrap();
    assert_eq!(frame.len(), 3);
    assert_eq!(frame.provenance.archive.as_deref(), Some(zip_path.as_str()));
    assert_eq!(frame.provenance.name, "ecotaxa_export.tsv");

    // Same content loaded two ways hashes identically.
    let direct = write_export(dir.path(), "direct.tsv");
    let direct_frame = Frame::load(&direct).unwrap();
    assert_eq!(frame.provenance.sha256, direct_frame.provenance.sha256);
}

#[test]
fn load_missing_file_fails() {
    assert!(Frame::load("/nonexistent/export.tsv").is_err());
}

#[test]
fn discovery_walks_directories_and_archives() {
    let dir = tempfile::tempdir().unwrap();
    write_export(dir.path(), "top.tsv");
    fs::create_dir(dir.path().join("nested")).unwrap();
    write_export(&dir.path().join("nested"), "deep.tsv");
    write_zip(dir.path(), "bundle.zip", "inner.tsv");
    fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

    let found = find_tsv_files(&dir.path().to_string_lossy()).unwrap();
    assert_eq!(found.len(), 3);
    assert!(found.iter().any(|p| p.ends_with("top.tsv")));
    assert!(found.iter().any(|p| p.ends_with("nested/deep.tsv")));
    assert!(found.iter().any(|p| p.ends_with("bundle.zip:inner.tsv")));

    // Every discovered path must load.
    for path in &found {
        assert!(Frame::load(path).is_ok(), "cannot load discovered {}", path);
    }
}

#[test]
fn history_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("history.sqlite");
    let mut store = HistoryStore::new(&db.to_string_lossy()).unwrap();
    store.init().unwrap();

    let path = write_export(dir.path(), "ecotaxa_export.tsv");
    let frame = Frame::load(&path).unwrap();
    store.record(&frame.provenance, frame.columns().len()).unwrap();
    store.record(&frame.provenance, frame.columns().len()).unwrap();

    let recent = store.recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].rows, 3);
    assert_eq!(recent[0].cols, 6);
    assert_eq!(recent[0].sha256, frame.provenance.sha256);
    assert!(recent[0].archive.is_none());

    assert_eq!(store.recent(1).unwrap().len(), 1);
}
