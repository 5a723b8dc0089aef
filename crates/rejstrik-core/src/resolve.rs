//! Cross-source entity resolution.
//!
//! The [`Resolver`] remembers, for one pipeline run, which canonical keys
//! already have a node in the [`GraphBuilder`]. Re-resolving a key never
//! overwrites a populated property; it only fills properties the node does
//! not have yet. Each call also emits a `POCHAZI_Z` provenance edge, once per
//! (entity, source, document). The store's merge-by-endpoints is the exact
//! deduplication backstop for those edges.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::{
  graph::{Edge, GraphBuilder, NodeSlot, Properties, strip_empty},
  kind::{NodeKind, RelKind},
  source::Provenance,
};

// ─── Backing map ─────────────────────────────────────────────────────────────

/// Map from canonical key to the builder slot holding that entity.
pub trait EntityIndex {
  fn get(&self, kind: NodeKind, key: &str) -> Option<NodeSlot>;
  fn insert(&mut self, kind: NodeKind, key: String, slot: NodeSlot);
  fn len(&self) -> usize;
  fn is_empty(&self) -> bool { self.len() == 0 }
}

/// The default hash-backed index.
pub type HashIndex = HashMap<(NodeKind, String), NodeSlot>;

impl EntityIndex for HashIndex {
  fn get(&self, kind: NodeKind, key: &str) -> Option<NodeSlot> {
    HashMap::get(self, &(kind, key.to_string())).copied()
  }

  fn insert(&mut self, kind: NodeKind, key: String, slot: NodeSlot) {
    HashMap::insert(self, (kind, key), slot);
  }

  fn len(&self) -> usize { HashMap::len(self) }
}

impl EntityIndex for BTreeMap<(NodeKind, String), NodeSlot> {
  fn get(&self, kind: NodeKind, key: &str) -> Option<NodeSlot> {
    BTreeMap::get(self, &(kind, key.to_string())).copied()
  }

  fn insert(&mut self, kind: NodeKind, key: String, slot: NodeSlot) {
    BTreeMap::insert(self, (kind, key), slot);
  }

  fn len(&self) -> usize { BTreeMap::len(self) }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// A canonical key together with how much it can be trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  /// A stable natural key (IČO, contract ID, source ID, external person ID).
  Natural(String),
  /// A fallback derived from a name or digest; may collide.
  Synthetic(String),
}

impl Identity {
  pub fn key(&self) -> &str {
    match self {
      Identity::Natural(k) | Identity::Synthetic(k) => k,
    }
  }

  pub fn is_synthetic(&self) -> bool { matches!(self, Identity::Synthetic(_)) }
}

// ─── Resolver ────────────────────────────────────────────────────────────────

type ProvenanceKey = (NodeKind, String, &'static str, String);

/// Per-run entity resolver. Holds no global state; create one per run.
#[derive(Debug, Default)]
pub struct Resolver<I = HashIndex> {
  index:          I,
  provenance:     HashSet<ProvenanceKey>,
  low_confidence: BTreeSet<(NodeKind, String)>,
  unresolved:     BTreeMap<NodeKind, usize>,
}

impl Resolver<HashIndex> {
  pub fn new() -> Self { Self::with_index(HashIndex::new()) }
}

impl<I: EntityIndex> Resolver<I> {
  pub fn with_index(index: I) -> Self {
    Self {
      index,
      provenance: HashSet::new(),
      low_confidence: BTreeSet::new(),
      unresolved: BTreeMap::new(),
    }
  }

  /// Resolve `identity` to a node, creating it on first sight.
  ///
  /// Empty candidate properties are dropped. On a repeat sighting only
  /// properties missing from the existing node are filled in. When
  /// `provenance` is given, its source node is ensured and a provenance edge
  /// is enqueued unless one was already enqueued for the same document.
  /// Returns the canonical key.
  pub fn resolve_or_create(
    &mut self,
    graph: &mut GraphBuilder,
    kind: NodeKind,
    identity: Identity,
    mut candidate: Properties,
    provenance: Option<&Provenance>,
  ) -> String {
    let key = identity.key().to_string();
    strip_empty(&mut candidate);
    candidate.insert(kind.key_field().to_string(), Value::String(key.clone()));

    match self.index.get(kind, &key) {
      Some(slot) => {
        if let Some(node) = graph.node_mut(slot) {
          for (name, value) in candidate {
            node.entry(name).or_insert(value);
          }
        }
      }
      None => {
        let slot = graph.add_node(kind, candidate);
        self.index.insert(kind, key.clone(), slot);
      }
    }

    if identity.is_synthetic() {
      self.low_confidence.insert((kind, key.clone()));
    }

    if let Some(p) = provenance.filter(|_| kind.requires_provenance()) {
      let source_key = self.ensure_source(graph, p);
      let seen = (kind, key.clone(), p.source.id, p.document.clone());
      if self.provenance.insert(seen) {
        graph.add_relationship(
          RelKind::OriginatesFrom,
          Edge::new(key.clone(), source_key)
            .with_from_kind(kind)
            .with("datum_ziskani", p.acquired_at_iso())
            .with("zdroj_id", p.source.id)
            .with("dokument", p.document.as_str()),
        );
      }
    }

    key
  }

  /// Ensure the `Zdroj` node for `provenance` exists; returns its key.
  pub fn ensure_source(
    &mut self,
    graph: &mut GraphBuilder,
    provenance: &Provenance,
  ) -> String {
    let src = provenance.source;
    if self.index.get(NodeKind::Source, src.id).is_none() {
      debug!(source = src.id, "registering data source");
    }
    let mut props: Properties = [
      ("nazev", src.name),
      ("url", src.url),
      ("typ", src.kind),
      ("vydavatel", src.publisher),
      ("licence", src.license),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), Value::from(v)))
    .collect();
    props.insert("datum_ziskani".into(), Value::from(provenance.acquired_at_iso()));
    self.resolve_or_create(
      graph,
      NodeKind::Source,
      Identity::Natural(src.id.to_string()),
      props,
      None,
    )
  }

  /// Count a record that could not be given any key and was dropped.
  pub fn record_unresolved(&mut self, kind: NodeKind) {
    *self.unresolved.entry(kind).or_default() += 1;
  }

  pub fn unresolved_count(&self) -> usize { self.unresolved.values().sum() }

  pub fn unresolved(&self, kind: NodeKind) -> usize {
    self.unresolved.get(&kind).copied().unwrap_or(0)
  }

  /// Whether `key` was only ever resolved through a synthetic identity.
  pub fn is_low_confidence(&self, kind: NodeKind, key: &str) -> bool {
    self.low_confidence.contains(&(kind, key.to_string()))
  }

  pub fn low_confidence_count(&self) -> usize { self.low_confidence.len() }

  pub fn resolved_count(&self) -> usize { self.index.len() }
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use serde_json::json;

  use super::*;
  use crate::source::lookup;

  fn prov(document: &str) -> Provenance {
    Provenance::new(
      lookup("smlouvy_gov").unwrap(),
      document,
      Utc.with_ymd_and_hms(2025, 11, 1, 0, 0, 0).unwrap(),
    )
  }

  fn name(n: &str) -> Properties {
    [("nazev".to_string(), json!(n))].into_iter().collect()
  }

  #[test]
  fn first_seen_name_wins() {
    let mut graph = GraphBuilder::new();
    let mut r = Resolver::new();
    let id = Identity::Natural("70886288".into());
    r.resolve_or_create(&mut graph, NodeKind::Company, id.clone(), name("První"), None);
    r.resolve_or_create(&mut graph, NodeKind::Company, id, name("Druhá"), None);

    let snap = graph.finalize();
    assert_eq!(snap.nodes(NodeKind::Company).len(), 1);
    assert_eq!(snap.nodes(NodeKind::Company)[0]["nazev"], json!("První"));
  }

  #[test]
  fn empty_first_value_is_filled_later() {
    let mut graph = GraphBuilder::new();
    let mut r = Resolver::new();
    let id = Identity::Natural("70886288".into());
    r.resolve_or_create(&mut graph, NodeKind::Company, id.clone(), name(""), None);
    r.resolve_or_create(&mut graph, NodeKind::Company, id, name("Město Kolín"), None);

    let snap = graph.finalize();
    let node = snap.find_node(NodeKind::Company, "70886288").unwrap();
    assert_eq!(node["nazev"], json!("Město Kolín"));
    assert_eq!(node["ico"], json!("70886288"));
  }

  #[test]
  fn provenance_is_emitted_once_per_document() {
    let mut graph = GraphBuilder::new();
    let mut r = Resolver::new();
    let id = Identity::Natural("70886288".into());
    let a = prov("dump_a.xml");
    let b = prov("dump_b.xml");
    for p in [&a, &a, &b] {
      r.resolve_or_create(
        &mut graph,
        NodeKind::ContractingAuthority,
        id.clone(),
        Properties::new(),
        Some(p),
      );
    }

    let snap = graph.finalize();
    assert_eq!(snap.nodes(NodeKind::Source).len(), 1);
    let edges = snap.relationships(RelKind::OriginatesFrom);
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().all(|e| e.to == "smlouvy_gov"));
    assert!(
      edges
        .iter()
        .all(|e| e.from_kind == Some(NodeKind::ContractingAuthority))
    );
    assert_eq!(edges[0].properties["datum_ziskani"], json!("2025-11-01T00:00:00Z"));
  }

  #[test]
  fn same_key_in_different_kinds_stays_separate() {
    let mut graph = GraphBuilder::new();
    let mut r = Resolver::new();
    let id = Identity::Natural("70886288".into());
    r.resolve_or_create(&mut graph, NodeKind::Company, id.clone(), name("A"), None);
    r.resolve_or_create(&mut graph, NodeKind::ContractingAuthority, id, name("B"), None);
    assert_eq!(graph.node_count(), 2);
  }

  #[test]
  fn synthetic_identities_are_low_confidence() {
    let mut graph = GraphBuilder::new();
    let mut r = Resolver::with_index(BTreeMap::<(NodeKind, String), NodeSlot>::new());
    let key = r.resolve_or_create(
      &mut graph,
      NodeKind::Company,
      Identity::Synthetic("FIRMA-Acme".into()),
      Properties::new(),
      None,
    );
    r.resolve_or_create(
      &mut graph,
      NodeKind::Company,
      Identity::Natural("12345678".into()),
      Properties::new(),
      None,
    );
    assert!(r.is_low_confidence(NodeKind::Company, &key));
    assert!(!r.is_low_confidence(NodeKind::Company, "12345678"));
    assert_eq!(r.low_confidence_count(), 1);
    assert_eq!(r.resolved_count(), 2);
  }

  #[test]
  fn unresolved_records_are_counted() {
    let mut r = Resolver::new();
    r.record_unresolved(NodeKind::Company);
    r.record_unresolved(NodeKind::Company);
    r.record_unresolved(NodeKind::Person);
    assert_eq!(r.unresolved_count(), 3);
    assert_eq!(r.unresolved(NodeKind::Company), 2);
    assert_eq!(r.unresolved(NodeKind::School), 0);
  }
}
