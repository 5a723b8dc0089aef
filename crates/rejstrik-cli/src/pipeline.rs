//! File discovery, transformation and loading.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rejstrik_core::{
  graph::GraphSnapshot,
  load::{LoadReport, Loader},
  source::{self, Provenance},
  transform::{TransformReport, Transformer},
};
use rejstrik_parse::{ParseContext, SourceFormat, parse_document};
use rejstrik_store_sqlite::SqliteStore;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{Error, PipelineConfig, Result};

/// A discovered input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
  pub path:   PathBuf,
  pub format: SourceFormat,
}

/// Outcome of [`transform`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransformSummary {
  pub files:   usize,
  /// Documents that could not be read or parsed.
  pub skipped: Vec<PathBuf>,
  pub report:  TransformReport,
}

/// Every recognised document under `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<SourceFile>> {
  let mut paths = Vec::new();
  walk(dir, &mut paths)?;
  paths.sort();

  let files: Vec<SourceFile> = paths
    .into_iter()
    .filter_map(|path| match SourceFormat::detect(&path) {
      Some(format) => Some(SourceFile { path, format }),
      None => {
        debug!(path = %path.display(), "unrecognised file ignored");
        None
      }
    })
    .collect();
  info!(dir = %dir.display(), files = files.len(), "source files discovered");
  Ok(files)
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
  let read_err = |source| Error::Read { path: dir.to_path_buf(), source };
  for entry in std::fs::read_dir(dir).map_err(read_err)? {
    let path = entry.map_err(read_err)?.path();
    if path.is_dir() {
      walk(&path, out)?;
    } else {
      out.push(path);
    }
  }
  Ok(())
}

/// Parse and transform every document under `config.input_dir`.
///
/// Unreadable or malformed documents are logged and skipped.
pub fn transform(config: &PipelineConfig) -> Result<(GraphSnapshot, TransformSummary)> {
  let files = discover(&config.input_dir)?;
  let mut transformer = Transformer::new(config.reference_year());
  let mut skipped = Vec::new();

  for file in &files {
    let bytes = match std::fs::read(&file.path) {
      Ok(bytes) => bytes,
      Err(e) => {
        warn!(path = %file.path.display(), error = %e, "unreadable document skipped");
        skipped.push(file.path.clone());
        continue;
      }
    };
    let ctx = ParseContext::for_path(&file.path).with_filter_ico(config.filter_ico.clone());
    let records = match parse_document(&bytes, file.format, &ctx) {
      Ok(records) => records,
      Err(e) => {
        warn!(
          path = %file.path.display(),
          format = %file.format,
          error = %e,
          "malformed document skipped"
        );
        skipped.push(file.path.clone());
        continue;
      }
    };

    let document = file
      .path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_default();
    let provenance =
      Provenance::new(source::lookup(file.format.default_source())?, document, Utc::now());
    transformer.ingest(&provenance, records);
  }

  let (snapshot, report) = transformer.finalize();
  if report.dangling > 0 {
    warn!(dangling = report.dangling, "snapshot has relationships to missing nodes");
  }
  let summary = TransformSummary { files: files.len(), skipped, report };
  Ok((snapshot, summary))
}

pub fn write_snapshot(path: &Path, snapshot: &GraphSnapshot) -> Result<()> {
  let write_err = |source| Error::Write { path: path.to_path_buf(), source };
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent).map_err(write_err)?;
  }
  std::fs::write(path, snapshot.to_json_pretty()?).map_err(write_err)?;
  info!(
    path = %path.display(),
    nodes = snapshot.node_count(),
    relationships = snapshot.relationship_count(),
    "snapshot written"
  );
  Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<GraphSnapshot> {
  let raw = std::fs::read_to_string(path)
    .map_err(|source| Error::Read { path: path.to_path_buf(), source })?;
  Ok(GraphSnapshot::from_json(&raw)?)
}

/// Open (or create) the store named by `config`.
pub async fn open_store(config: &PipelineConfig) -> Result<SqliteStore> {
  let path = config.resolved_store_path();
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .map_err(|source| Error::Write { path: parent.to_path_buf(), source })?;
  }
  Ok(SqliteStore::open(&path).await?)
}

/// Remove all nodes and relationships so the next load starts from empty.
pub async fn clear_store(store: &SqliteStore) -> Result<usize> {
  let removed = store.clear().await?;
  warn!(removed, "store cleared before load");
  Ok(removed)
}

/// Apply `snapshot` to `store` in batches of `config.batch_size`.
pub async fn load(
  config: &PipelineConfig,
  store: &SqliteStore,
  snapshot: &GraphSnapshot,
) -> Result<LoadReport> {
  let report = Loader::new(store)
    .with_batch_size(config.batch_size)
    .apply(snapshot)
    .await?;
  for failure in &report.failures {
    warn!(
      label = %failure.label,
      attempted = failure.attempted,
      succeeded = failure.succeeded,
      "batch not applied"
    );
  }
  Ok(report)
}

#[cfg(test)]
mod tests {
  use rejstrik_core::kind::{NodeKind, RelKind};

  use super::*;

  const DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dump xmlns="http://portal.gov.cz/rejstriky/ISRS/1.2/">
  <den>
    <zaznam>
      <identifikator><idSmlouvy>123</idSmlouvy><idVerze>456</idVerze></identifikator>
      <smlouva>
        <subjekt><ico>70886288</ico><nazev>Město Kolín</nazev></subjekt>
        <smluvniStrana><ico>12345678</ico><nazev>Acme s.r.o.</nazev></smluvniStrana>
        <predmet>Oprava chodníku</predmet>
        <hodnotaBezDph>1000000</hodnotaBezDph>
      </smlouva>
      <platnyZaznam>1</platnyZaznam>
    </zaznam>
  </den>
</dump>"#;

  const PEOPLE: &str = r#"[{
    "name": "Jan Novák", "role": "Jednatel",
    "company_id": "12345678", "appointment_date": "2015-02-01"
  }]"#;

  fn fixture() -> (tempfile::TempDir, PipelineConfig) {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    for sub in ["smlouvy_gov", "rzp", "people"] {
      std::fs::create_dir_all(data.join(sub)).unwrap();
    }
    std::fs::write(data.join("smlouvy_gov/dump_2025_11_01.xml"), DUMP).unwrap();
    std::fs::write(data.join("rzp/rzp_broken.xml"), "<Odpoved>").unwrap();
    std::fs::write(data.join("people/people.json"), PEOPLE).unwrap();
    std::fs::write(data.join("README.txt"), "not a source").unwrap();

    let config = PipelineConfig {
      input_dir: data,
      store_path: dir.path().join("db/graph.sqlite"),
      snapshot_path: dir.path().join("out/snapshot.json"),
      batch_size: 2,
      reference_year: Some(2025),
      ..Default::default()
    };
    (dir, config)
  }

  #[test]
  fn discovery_is_sorted_and_ignores_unknown_files() {
    let (_dir, config) = fixture();
    let files = discover(&config.input_dir).unwrap();
    let formats: Vec<_> = files.iter().map(|f| f.format).collect();
    assert_eq!(formats, [SourceFormat::PeopleJson, SourceFormat::Rzp, SourceFormat::SmlouvyDump]);
  }

  #[test]
  fn missing_input_directory_is_an_error() {
    let err = discover(Path::new("/nonexistent/rejstrik/input")).unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
  }

  #[test]
  fn malformed_documents_are_skipped() {
    let (_dir, config) = fixture();
    let (snapshot, summary) = transform(&config).unwrap();

    assert_eq!(summary.files, 3);
    assert_eq!(summary.skipped.len(), 1);
    assert!(summary.skipped[0].ends_with("rzp/rzp_broken.xml"));
    assert_eq!(summary.report.documents, 2);

    assert_eq!(snapshot.nodes(NodeKind::ContractingAuthority).len(), 1);
    assert_eq!(snapshot.nodes(NodeKind::Contract).len(), 1);
    assert_eq!(snapshot.relationships(RelKind::PerformsFunction).len(), 1);
    assert!(snapshot.find_node(NodeKind::Company, "12345678").is_some());
  }

  #[test]
  fn snapshot_survives_a_file_round_trip() {
    let (_dir, config) = fixture();
    let (snapshot, _) = transform(&config).unwrap();
    write_snapshot(&config.snapshot_path, &snapshot).unwrap();
    assert_eq!(read_snapshot(&config.snapshot_path).unwrap(), snapshot);
  }

  #[tokio::test]
  async fn loading_twice_converges() {
    let (_dir, config) = fixture();
    let (snapshot, _) = transform(&config).unwrap();
    let store = open_store(&config).await.unwrap();

    let first = load(&config, &store, &snapshot).await.unwrap();
    let stats = store.stats().await.unwrap();
    let second = load(&config, &store, &snapshot).await.unwrap();

    assert!(first.is_clean());
    assert_eq!(first.totals(), second.totals());
    assert_eq!(store.stats().await.unwrap(), stats);
    assert_eq!(stats.node_total(), snapshot.node_count());
    assert_eq!(
      store.relationship_count(Some(RelKind::PerformsFunction)).await.unwrap(),
      1
    );
  }

  #[tokio::test]
  async fn clearing_drops_nodes_missing_from_the_snapshot() {
    use rejstrik_core::store::GraphStore as _;

    let (_dir, config) = fixture();
    let (snapshot, _) = transform(&config).unwrap();
    let store = open_store(&config).await.unwrap();
    let stale: [rejstrik_core::graph::Properties; 1] =
      [[("ico".to_string(), serde_json::json!("99999999"))].into_iter().collect()];
    store.upsert_nodes(NodeKind::Company, &stale, "ico").await.unwrap();

    assert_eq!(clear_store(&store).await.unwrap(), 1);
    load(&config, &store, &snapshot).await.unwrap();

    assert!(store.get_node(NodeKind::Company, "99999999").await.unwrap().is_none());
    assert_eq!(store.node_count(None).await.unwrap(), snapshot.node_count());
  }
}
