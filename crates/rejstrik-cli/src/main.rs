//! rejstrik binary.
//!
//! Reads `rejstrik.toml` (or the path given with `--config`), then runs one
//! pipeline stage:
//!
//! ```text
//! rejstrik transform   # data/ → graph_snapshot.json
//! rejstrik load        # graph_snapshot.json → rejstrik.sqlite (--clear empties it first)
//! rejstrik run         # both
//! rejstrik stats       # row counts of the store
//! ```

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use rejstrik_cli::{PipelineConfig, pipeline};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Czech procurement and registry graph ETL")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "rejstrik.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Parse source documents and write a graph snapshot.
  Transform(Overrides),
  /// Apply a previously written snapshot to the store.
  Load(LoadArgs),
  /// Transform, write the snapshot, then load it.
  Run(LoadArgs),
  /// Print node and relationship counts of the store.
  Stats(Overrides),
}

/// Flags that override configuration values.
#[derive(Args)]
struct Overrides {
  #[arg(long)]
  input:      Option<PathBuf>,
  #[arg(long)]
  store:      Option<PathBuf>,
  #[arg(long)]
  snapshot:   Option<PathBuf>,
  #[arg(long)]
  batch_size: Option<usize>,
  /// Keep only contracts where this IČO is a party.
  #[arg(long)]
  filter_ico: Option<String>,
}

#[derive(Args)]
struct LoadArgs {
  #[command(flatten)]
  overrides: Overrides,
  /// Delete every node and relationship before loading.
  #[arg(long)]
  clear:     bool,
}

impl Overrides {
  fn apply(self, mut cfg: PipelineConfig) -> PipelineConfig {
    if let Some(input) = self.input {
      cfg.input_dir = input;
    }
    if let Some(store) = self.store {
      cfg.store_path = store;
    }
    if let Some(snapshot) = self.snapshot {
      cfg.snapshot_path = snapshot;
    }
    if let Some(batch_size) = self.batch_size {
      cfg.batch_size = batch_size;
    }
    if self.filter_ico.is_some() {
      cfg.filter_ico = self.filter_ico;
    }
    cfg
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let base = PipelineConfig::load(&cli.config)
    .with_context(|| format!("failed to read configuration from {:?}", cli.config))?;

  match cli.command {
    Command::Transform(o) => {
      let cfg = o.apply(base);
      transform(&cfg)?;
    }
    Command::Load(args) => {
      let cfg = args.overrides.apply(base);
      let snapshot = pipeline::read_snapshot(&cfg.snapshot_path)
        .with_context(|| format!("failed to read snapshot {:?}", cfg.snapshot_path))?;
      load(&cfg, &snapshot, args.clear).await?;
    }
    Command::Run(args) => {
      let cfg = args.overrides.apply(base);
      let snapshot = transform(&cfg)?;
      load(&cfg, &snapshot, args.clear).await?;
    }
    Command::Stats(o) => {
      let cfg = o.apply(base);
      let store = pipeline::open_store(&cfg).await.context("failed to open store")?;
      let stats = store.stats().await.context("failed to count rows")?;
      for (label, n) in stats.nodes.iter().chain(&stats.relationships) {
        println!("{label:<20} {n}");
      }
      println!("{:<20} {}", "nodes", stats.node_total());
      println!("{:<20} {}", "relationships", stats.relationship_total());
    }
  }

  Ok(())
}

fn transform(cfg: &PipelineConfig) -> anyhow::Result<rejstrik_core::graph::GraphSnapshot> {
  let (snapshot, summary) = pipeline::transform(cfg)
    .with_context(|| format!("failed to transform {:?}", cfg.input_dir))?;
  pipeline::write_snapshot(&cfg.snapshot_path, &snapshot).context("failed to write snapshot")?;
  println!("{}", serde_json::to_string_pretty(&summary)?);
  Ok(snapshot)
}

async fn load(
  cfg: &PipelineConfig,
  snapshot: &rejstrik_core::graph::GraphSnapshot,
  clear: bool,
) -> anyhow::Result<()> {
  let store = pipeline::open_store(cfg)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.resolved_store_path()))?;
  if clear {
    pipeline::clear_store(&store).await.context("failed to clear store")?;
  }
  let report = pipeline::load(cfg, &store, snapshot)
    .await
    .context("load aborted")?;
  println!("{}", serde_json::to_string_pretty(&report)?);
  if !report.is_clean() {
    tracing::warn!(
      failed_batches = report.failures.len(),
      failed_rows = report.failed_rows(),
      "some batches were not applied; re-run to retry"
    );
  }
  Ok(())
}
