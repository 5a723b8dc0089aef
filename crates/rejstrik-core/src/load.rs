//! Idempotent application of a [`GraphSnapshot`] to a [`GraphStore`].
//!
//! Nodes go first, kind by kind in declaration order, so that every
//! relationship batch can match its endpoints. Each batch is one store
//! transaction. A failed batch is recorded in the [`LoadReport`] and loading
//! continues; only an error the store reports as fatal aborts the run.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
  Error, Result,
  graph::{Edge, GraphSnapshot, Properties, key_value},
  kind::{NodeKind, RelKind},
  store::{ConstraintStatus, GraphStore},
};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// A batch the store refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
  /// Node label or relationship type.
  pub label:     String,
  pub attempted: usize,
  pub succeeded: usize,
  pub message:   String,
}

/// Counters for one [`Loader::apply`] run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
  pub nodes_applied:         usize,
  pub relationships_applied: usize,
  /// Relationships dropped because an endpoint was not in the store.
  pub relationships_skipped: usize,
  /// Rows or edges without their identity key; never sent to the store.
  pub rejected:              usize,
  pub constraints_created:   usize,
  pub failures:              Vec<BatchFailure>,
}

impl LoadReport {
  /// `(nodes_applied, relationships_applied)`.
  pub fn totals(&self) -> (usize, usize) {
    (self.nodes_applied, self.relationships_applied)
  }

  pub fn failed_rows(&self) -> usize {
    self.failures.iter().map(|f| f.attempted - f.succeeded).sum()
  }

  pub fn is_clean(&self) -> bool { self.failures.is_empty() }
}

/// Applies snapshots to one store in fixed-size batches.
pub struct Loader<'s, S> {
  store:      &'s S,
  batch_size: usize,
}

impl<'s, S: GraphStore> Loader<'s, S> {
  pub fn new(store: &'s S) -> Self {
    Self { store, batch_size: DEFAULT_BATCH_SIZE }
  }

  /// A batch size of zero is treated as one.
  pub fn with_batch_size(mut self, batch_size: usize) -> Self {
    self.batch_size = batch_size.max(1);
    self
  }

  pub fn batch_size(&self) -> usize { self.batch_size }

  pub async fn apply(&self, snapshot: &GraphSnapshot) -> Result<LoadReport> {
    let mut report = LoadReport::default();

    for kind in snapshot.node_kinds() {
      self.ensure_constraint(kind, &mut report).await?;
      self.load_nodes(kind, snapshot.nodes(kind), &mut report).await?;
    }

    for rel in snapshot.rel_kinds() {
      self
        .load_relationships(rel, snapshot.relationships(rel), &mut report)
        .await?;
    }

    info!(
      nodes = report.nodes_applied,
      relationships = report.relationships_applied,
      skipped = report.relationships_skipped,
      rejected = report.rejected,
      failed_batches = report.failures.len(),
      "snapshot applied"
    );
    Ok(report)
  }

  async fn ensure_constraint(
    &self,
    kind: NodeKind,
    report: &mut LoadReport,
  ) -> Result<()> {
    match self.store.ensure_constraint(kind, kind.key_field()).await {
      Ok(ConstraintStatus::Created) => {
        debug!(%kind, "constraint created");
        report.constraints_created += 1;
        Ok(())
      }
      Ok(ConstraintStatus::AlreadyExists) => Ok(()),
      Err(e) => {
        self.check_fatal(kind.label(), &e)?;
        warn!(%kind, error = %e, "could not ensure constraint");
        Ok(())
      }
    }
  }

  async fn load_nodes(
    &self,
    kind: NodeKind,
    rows: &[Properties],
    report: &mut LoadReport,
  ) -> Result<()> {
    let key_field = kind.key_field();
    let (keyed, missing): (Vec<Properties>, Vec<Properties>) = rows
      .iter()
      .cloned()
      .partition(|row| key_value(row, key_field).is_some());
    if !missing.is_empty() {
      warn!(%kind, count = missing.len(), "rows without key field rejected");
      report.rejected += missing.len();
    }

    for batch in keyed.chunks(self.batch_size) {
      match self.store.upsert_nodes(kind, batch, key_field).await {
        Ok(n) => report.nodes_applied += n,
        Err(e) => {
          self.check_fatal(kind.label(), &e)?;
          report.failures.push(failure(kind.label(), batch.len(), &e));
        }
      }
    }
    Ok(())
  }

  async fn load_relationships(
    &self,
    rel: RelKind,
    edges: &[Edge],
    report: &mut LoadReport,
  ) -> Result<()> {
    let (keyed, missing): (Vec<&Edge>, Vec<&Edge>) = edges
      .iter()
      .partition(|e| !e.from.trim().is_empty() && !e.to.trim().is_empty());
    if !missing.is_empty() {
      warn!(rel = rel.label(), count = missing.len(), "edges without endpoint keys rejected");
      report.rejected += missing.len();
    }

    let (static_from, to_kind) = rel.endpoints();

    // Edges whose source kind is known, grouped by that kind; the rest are
    // probed against every node kind in turn.
    let mut known: Vec<(NodeKind, Vec<Edge>)> = Vec::new();
    let mut unknown: Vec<Edge> = Vec::new();
    for edge in keyed {
      match static_from.or(edge.from_kind) {
        Some(kind) => match known.iter_mut().find(|(k, _)| *k == kind) {
          Some((_, group)) => group.push(edge.clone()),
          None => known.push((kind, vec![edge.clone()])),
        },
        None => unknown.push(edge.clone()),
      }
    }

    for (from_kind, group) in known {
      let unmatched = self.send_edges(rel, from_kind, to_kind, group, report).await?;
      report.relationships_skipped += unmatched.len();
    }

    if !unknown.is_empty() {
      debug!(rel = rel.label(), count = unknown.len(), "probing source kinds");
    }
    for from_kind in NodeKind::ALL {
      if unknown.is_empty() {
        break;
      }
      unknown = self.send_edges(rel, from_kind, to_kind, unknown, report).await?;
    }
    report.relationships_skipped += unknown.len();

    Ok(())
  }

  /// Send `edges` in batches; returns the edges that matched no endpoints.
  async fn send_edges(
    &self,
    rel: RelKind,
    from_kind: NodeKind,
    to_kind: NodeKind,
    edges: Vec<Edge>,
    report: &mut LoadReport,
  ) -> Result<Vec<Edge>> {
    let mut unmatched = Vec::new();
    for batch in edges.chunks(self.batch_size) {
      let result = self
        .store
        .upsert_relationships(
          rel,
          from_kind,
          to_kind,
          batch,
          from_kind.key_field(),
          to_kind.key_field(),
        )
        .await;
      match result {
        Ok(outcome) => {
          report.relationships_applied += outcome.applied;
          unmatched.extend(
            outcome
              .unmatched
              .into_iter()
              .filter_map(|i| batch.get(i).cloned()),
          );
        }
        Err(e) => {
          self.check_fatal(rel.label(), &e)?;
          report.failures.push(failure(rel.label(), batch.len(), &e));
        }
      }
    }
    Ok(unmatched)
  }

  fn check_fatal(&self, label: &str, err: &S::Error) -> Result<()> {
    if S::is_fatal(err) {
      return Err(Error::StoreUnavailable {
        label:   label.to_string(),
        message: err.to_string(),
      });
    }
    Ok(())
  }
}

fn failure(label: &str, attempted: usize, err: &impl std::fmt::Display) -> BatchFailure {
  warn!(label, attempted, error = %err, "batch failed");
  BatchFailure {
    label: label.to_string(),
    attempted,
    succeeded: 0,
    message: err.to_string(),
  }
}
