//! The `GraphStore` trait.
//!
//! Implemented by storage backends (e.g. `rejstrik-store-sqlite`). The
//! [`Loader`](crate::load::Loader) depends on this abstraction only.

use std::future::Future;

use crate::{
  graph::{Edge, Properties},
  kind::{NodeKind, RelKind},
};

/// Outcome of [`GraphStore::ensure_constraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintStatus {
  Created,
  AlreadyExists,
}

/// Outcome of one relationship batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipUpsert {
  /// Relationships created or whose properties were merged.
  pub applied:   usize,
  /// Indices into the batch whose endpoints could not both be matched.
  pub unmatched: Vec<usize>,
}

/// A graph database backend.
///
/// Writes are merge-based: applying the same batch twice leaves the store in
/// the same state as applying it once. Each call is one transaction, so a
/// failed batch leaves nothing behind.
pub trait GraphStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create a uniqueness constraint on `key_field` for `kind` unless present.
  fn ensure_constraint<'a>(
    &'a self,
    kind: NodeKind,
    key_field: &'a str,
  ) -> impl Future<Output = Result<ConstraintStatus, Self::Error>> + Send + 'a;

  /// Merge `rows` by `key_field` and set all their properties.
  ///
  /// Every row must carry a non-empty `key_field`. Returns the number of rows
  /// applied.
  fn upsert_nodes<'a>(
    &'a self,
    kind: NodeKind,
    rows: &'a [Properties],
    key_field: &'a str,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + 'a;

  /// Match both endpoints of every edge, then merge the relationship and set
  /// its properties. Edges with a missing endpoint are skipped and reported
  /// in [`RelationshipUpsert::unmatched`].
  #[allow(clippy::too_many_arguments)]
  fn upsert_relationships<'a>(
    &'a self,
    rel: RelKind,
    from_kind: NodeKind,
    to_kind: NodeKind,
    edges: &'a [Edge],
    from_key_field: &'a str,
    to_key_field: &'a str,
  ) -> impl Future<Output = Result<RelationshipUpsert, Self::Error>> + Send + 'a;

  /// Whether `err` means the backend is gone and loading must stop.
  fn is_fatal(_err: &Self::Error) -> bool { false }
}
