//! [`SqliteStore`], the SQLite implementation of [`GraphStore`].

use std::{future::Future, path::Path};

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tracing::debug;

use rejstrik_core::{
  graph::{Edge, Properties, key_value},
  kind::{NodeKind, RelKind},
  store::{ConstraintStatus, GraphStore, RelationshipUpsert},
};

use crate::{
  Error, Result,
  encode::{decode_props, encode_dt, encode_props},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A rejstrik graph store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

/// Row counts per label and relationship type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
  pub nodes:         Vec<(String, usize)>,
  pub relationships: Vec<(String, usize)>,
}

impl StoreStats {
  pub fn node_total(&self) -> usize { self.nodes.iter().map(|(_, n)| n).sum() }

  pub fn relationship_total(&self) -> usize {
    self.relationships.iter().map(|(_, n)| n).sum()
  }
}

/// An edge ready to be written: endpoint keys plus encoded properties.
struct EncodedEdge {
  index: usize,
  from:  String,
  to:    String,
  props: String,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Properties of the node with `key`, if stored.
  pub async fn get_node(&self, kind: NodeKind, key: &str) -> Result<Option<Properties>> {
    let label = kind.label();
    let key = key.to_string();
    let what = format!("{label} {key}");

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT props FROM nodes WHERE label = ?1 AND key = ?2",
              rusqlite::params![label, key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| decode_props(&what, &r)).transpose()
  }

  /// Properties of one relationship, if stored.
  pub async fn get_relationship(
    &self,
    rel: RelKind,
    from_kind: NodeKind,
    from: &str,
    to_kind: NodeKind,
    to: &str,
  ) -> Result<Option<Properties>> {
    let rel_type = rel.label();
    let (from_label, to_label) = (from_kind.label(), to_kind.label());
    let (from, to) = (from.to_string(), to.to_string());
    let what = format!("{rel_type} {from} -> {to}");

    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT props FROM relationships
               WHERE rel_type = ?1 AND from_label = ?2 AND from_key = ?3
                 AND to_label = ?4 AND to_key = ?5",
              rusqlite::params![rel_type, from_label, from, to_label, to],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(|r| decode_props(&what, &r)).transpose()
  }

  /// Number of stored nodes, optionally of one kind only.
  pub async fn node_count(&self, kind: Option<NodeKind>) -> Result<usize> {
    let label = kind.map(NodeKind::label);
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM nodes WHERE ?1 IS NULL OR label = ?1",
          rusqlite::params![label],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  /// Number of stored relationships, optionally of one type only.
  pub async fn relationship_count(&self, rel: Option<RelKind>) -> Result<usize> {
    let rel_type = rel.map(RelKind::label);
    let n: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM relationships WHERE ?1 IS NULL OR rel_type = ?1",
          rusqlite::params![rel_type],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(usize::try_from(n).unwrap_or_default())
  }

  /// Row counts grouped by label and by relationship type.
  pub async fn stats(&self) -> Result<StoreStats> {
    let stats = self
      .conn
      .call(|conn| {
        let grouped = |sql: &str| -> rusqlite::Result<Vec<(String, usize)>> {
          let mut stmt = conn.prepare(sql)?;
          let rows = stmt
            .query_map([], |row| {
              let n: i64 = row.get(1)?;
              Ok((row.get::<_, String>(0)?, usize::try_from(n).unwrap_or_default()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          Ok(rows)
        };
        let nodes =
          grouped("SELECT label, COUNT(*) FROM nodes GROUP BY label ORDER BY label")?;
        let relationships = grouped(
          "SELECT rel_type, COUNT(*) FROM relationships GROUP BY rel_type ORDER BY rel_type",
        )?;
        Ok(StoreStats { nodes, relationships })
      })
      .await?;
    Ok(stats)
  }

  /// Delete every node and relationship. Declared constraints are kept.
  ///
  /// Returns the number of nodes removed.
  pub async fn clear(&self) -> Result<usize> {
    let removed = self
      .conn
      .call(|conn| {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM relationships", [])?;
        let removed = tx.execute("DELETE FROM nodes", [])?;
        tx.commit()?;
        Ok(removed)
      })
      .await?;
    debug!(removed, "store cleared");
    Ok(removed)
  }

  async fn create_constraint(&self, kind: NodeKind, key_field: &str) -> Result<ConstraintStatus> {
    let label = kind.label();
    let key_field = key_field.to_string();
    let now = encode_dt(Utc::now());

    let inserted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT OR IGNORE INTO constraints (label, key_field, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![label, key_field, now],
        )?)
      })
      .await?;

    Ok(if inserted == 0 {
      ConstraintStatus::AlreadyExists
    } else {
      ConstraintStatus::Created
    })
  }

  async fn merge_nodes(&self, kind: NodeKind, rows: &[Properties], key_field: &str) -> Result<usize> {
    let label = kind.label();
    let encoded = rows
      .iter()
      .enumerate()
      .map(|(index, row)| {
        let key = key_value(row, key_field).ok_or_else(|| Error::MissingKey {
          label,
          index,
          key_field: key_field.to_string(),
        })?;
        Ok((key, encode_props(row)?))
      })
      .collect::<Result<Vec<_>>>()?;
    let key_field = key_field.to_string();
    let now = encode_dt(Utc::now());

    let applied = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare_cached(
            "INSERT INTO nodes (label, key, key_field, props, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (label, key) DO UPDATE SET
               props      = json_patch(nodes.props, excluded.props),
               key_field  = excluded.key_field,
               updated_at = excluded.updated_at",
          )?;
          for (key, props) in &encoded {
            stmt.execute(rusqlite::params![label, key, key_field, props, now])?;
          }
        }
        tx.commit()?;
        Ok(encoded.len())
      })
      .await?;

    debug!(label, applied, "nodes merged");
    Ok(applied)
  }

  async fn merge_relationships(
    &self,
    rel: RelKind,
    from_kind: NodeKind,
    to_kind: NodeKind,
    edges: &[Edge],
    from_key_field: &str,
    to_key_field: &str,
  ) -> Result<RelationshipUpsert> {
    let rel_type = rel.label();
    let (from_label, to_label) = (from_kind.label(), to_kind.label());
    let (from_key_field, to_key_field) = (from_key_field.to_string(), to_key_field.to_string());
    let encoded = edges
      .iter()
      .enumerate()
      .map(|(index, edge)| {
        Ok(EncodedEdge {
          index,
          from: edge.from.clone(),
          to: edge.to.clone(),
          props: encode_props(&edge.properties)?,
        })
      })
      .collect::<Result<Vec<_>>>()?;
    let now = encode_dt(Utc::now());

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut outcome = RelationshipUpsert::default();
        {
          let mut exists = tx.prepare_cached(
            "SELECT 1 FROM nodes WHERE label = ?1 AND key = ?2 AND key_field = ?3",
          )?;
          let mut merge = tx.prepare_cached(
            "INSERT INTO relationships
               (rel_type, from_label, from_key, to_label, to_key, props, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (rel_type, from_label, from_key, to_label, to_key) DO UPDATE SET
               props      = json_patch(relationships.props, excluded.props),
               updated_at = excluded.updated_at",
          )?;
          for edge in &encoded {
            let from_found =
              exists.exists(rusqlite::params![from_label, edge.from, from_key_field])?;
            let to_found = from_found
              && exists.exists(rusqlite::params![to_label, edge.to, to_key_field])?;
            if !to_found {
              outcome.unmatched.push(edge.index);
              continue;
            }
            merge.execute(rusqlite::params![
              rel_type, from_label, edge.from, to_label, edge.to, edge.props, now
            ])?;
            outcome.applied += 1;
          }
        }
        tx.commit()?;
        Ok(outcome)
      })
      .await?;

    debug!(
      rel = rel_type,
      from = from_label,
      applied = outcome.applied,
      unmatched = outcome.unmatched.len(),
      "relationships merged"
    );
    Ok(outcome)
  }
}

// ─── GraphStore impl ─────────────────────────────────────────────────────────

impl GraphStore for SqliteStore {
  type Error = Error;

  fn ensure_constraint<'a>(
    &'a self,
    kind: NodeKind,
    key_field: &'a str,
  ) -> impl Future<Output = Result<ConstraintStatus>> + Send + 'a {
    self.create_constraint(kind, key_field)
  }

  fn upsert_nodes<'a>(
    &'a self,
    kind: NodeKind,
    rows: &'a [Properties],
    key_field: &'a str,
  ) -> impl Future<Output = Result<usize>> + Send + 'a {
    self.merge_nodes(kind, rows, key_field)
  }

  fn upsert_relationships<'a>(
    &'a self,
    rel: RelKind,
    from_kind: NodeKind,
    to_kind: NodeKind,
    edges: &'a [Edge],
    from_key_field: &'a str,
    to_key_field: &'a str,
  ) -> impl Future<Output = Result<RelationshipUpsert>> + Send + 'a {
    self.merge_relationships(rel, from_kind, to_kind, edges, from_key_field, to_key_field)
  }

  fn is_fatal(err: &Error) -> bool { err.is_fatal() }
}
