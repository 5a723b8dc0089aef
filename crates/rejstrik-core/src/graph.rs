//! In-memory graph accumulation and the serialisable snapshot.
//!
//! A [`GraphBuilder`] accepts nodes and relationships in insertion order.
//! Calling [`GraphBuilder::finalize`] consumes it and yields a read-only
//! [`GraphSnapshot`]; there is no way back to the accumulating state.
//!
//! No referential integrity is checked here. A relationship may name an
//! endpoint that never becomes a node; the store's match-then-merge drops it
//! at load time, and [`GraphSnapshot::dangling_relationships`] reports it
//! ahead of time for callers that want to know.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
  Result,
  kind::{NodeKind, RelKind},
};

/// Property map of a node or relationship. Sorted keys keep snapshots stable
/// and diff-able.
pub type Properties = BTreeMap<String, Value>;

/// `true` for values that must never be written: `null` and blank strings.
pub fn is_empty_value(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.trim().is_empty(),
    _ => false,
  }
}

/// Drop every empty value from `props`.
pub fn strip_empty(props: &mut Properties) {
  props.retain(|_, v| !is_empty_value(v));
}

/// Read an identity key from `props`. Numeric keys are rendered as text.
pub fn key_value(props: &Properties, field: &str) -> Option<String> {
  match props.get(field)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

// ─── Edges ───────────────────────────────────────────────────────────────────

/// One relationship entry: endpoint keys plus properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
  pub from:       String,
  pub to:         String,
  /// Explicit source kind for polymorphic relationships (`POCHAZI_Z`).
  /// When absent the loader probes every node kind in turn.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from_kind:  Option<NodeKind>,
  #[serde(flatten)]
  pub properties: Properties,
}

impl Edge {
  pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
    Self {
      from:       from.into(),
      to:         to.into(),
      from_kind:  None,
      properties: Properties::new(),
    }
  }

  pub fn with_from_kind(mut self, kind: NodeKind) -> Self {
    self.from_kind = Some(kind);
    self
  }

  /// Set a property; empty values are dropped.
  pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
    let value = value.into();
    if !is_empty_value(&value) {
      self.properties.insert(name.to_string(), value);
    }
    self
  }

  /// Like [`Edge::with`] but skips `None`.
  pub fn with_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
    match value {
      Some(v) => self.with(name, v),
      None => self,
    }
  }
}

// ─── Builder (accumulating) ──────────────────────────────────────────────────

/// Position of a node inside a [`GraphBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeSlot {
  pub kind:  NodeKind,
  pub index: usize,
}

/// Accumulates nodes and relationships for one pipeline run.
#[derive(Debug, Default)]
pub struct GraphBuilder {
  nodes:         BTreeMap<NodeKind, Vec<Properties>>,
  relationships: BTreeMap<RelKind, Vec<Edge>>,
}

impl GraphBuilder {
  pub fn new() -> Self { Self::default() }

  /// Append a node and return its slot.
  pub fn add_node(&mut self, kind: NodeKind, node: Properties) -> NodeSlot {
    let list = self.nodes.entry(kind).or_default();
    list.push(node);
    NodeSlot { kind, index: list.len() - 1 }
  }

  pub fn node(&self, slot: NodeSlot) -> Option<&Properties> {
    self.nodes.get(&slot.kind)?.get(slot.index)
  }

  pub fn node_mut(&mut self, slot: NodeSlot) -> Option<&mut Properties> {
    self.nodes.get_mut(&slot.kind)?.get_mut(slot.index)
  }

  pub fn add_relationship(&mut self, rel: RelKind, edge: Edge) {
    self.relationships.entry(rel).or_default().push(edge);
  }

  pub fn node_count(&self) -> usize { self.nodes.values().map(Vec::len).sum() }

  pub fn relationship_count(&self) -> usize {
    self.relationships.values().map(Vec::len).sum()
  }

  /// Freeze the accumulated graph.
  pub fn finalize(self) -> GraphSnapshot {
    GraphSnapshot {
      nodes:         self.nodes,
      relationships: self.relationships,
    }
  }
}

// ─── Snapshot (read-only) ────────────────────────────────────────────────────

/// The hand-off format between the builder and the loader.
///
/// Serialises as
/// `{"nodes": {"Firma": [..]}, "relationships": {"POCHAZI_Z": [..]}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
  #[serde(default)]
  nodes:         BTreeMap<NodeKind, Vec<Properties>>,
  #[serde(default)]
  relationships: BTreeMap<RelKind, Vec<Edge>>,
}

impl GraphSnapshot {
  pub fn nodes(&self, kind: NodeKind) -> &[Properties] {
    self.nodes.get(&kind).map(Vec::as_slice).unwrap_or_default()
  }

  pub fn relationships(&self, rel: RelKind) -> &[Edge] {
    self.relationships.get(&rel).map(Vec::as_slice).unwrap_or_default()
  }

  /// Node kinds present, in load order.
  pub fn node_kinds(&self) -> impl Iterator<Item = NodeKind> + '_ {
    self.nodes.keys().copied()
  }

  pub fn rel_kinds(&self) -> impl Iterator<Item = RelKind> + '_ {
    self.relationships.keys().copied()
  }

  pub fn node_count(&self) -> usize { self.nodes.values().map(Vec::len).sum() }

  pub fn relationship_count(&self) -> usize {
    self.relationships.values().map(Vec::len).sum()
  }

  /// Find a node by its identity key.
  pub fn find_node(&self, kind: NodeKind, key: &str) -> Option<&Properties> {
    self
      .nodes(kind)
      .iter()
      .find(|n| key_value(n, kind.key_field()).as_deref() == Some(key))
  }

  /// Relationships whose endpoints are not present in this snapshot.
  ///
  /// A polymorphic edge without `from_kind` counts as resolved when any node
  /// kind carries its `from` key.
  pub fn dangling_relationships(&self) -> Vec<(RelKind, &Edge)> {
    let keys: HashSet<(NodeKind, String)> = self
      .nodes
      .iter()
      .flat_map(|(kind, nodes)| {
        nodes
          .iter()
          .filter_map(|n| key_value(n, kind.key_field()).map(|k| (*kind, k)))
      })
      .collect();
    let has = |kind: NodeKind, key: &str| keys.contains(&(kind, key.to_string()));

    let mut dangling = Vec::new();
    for (rel, edges) in &self.relationships {
      let (from_kind, to_kind) = rel.endpoints();
      for edge in edges {
        let from_ok = match from_kind.or(edge.from_kind) {
          Some(kind) => has(kind, &edge.from),
          None => NodeKind::ALL.into_iter().any(|k| has(k, &edge.from)),
        };
        if !from_ok || !has(to_kind, &edge.to) {
          dangling.push((*rel, edge));
        }
      }
    }
    dangling
  }

  pub fn to_json_pretty(&self) -> Result<String> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn from_json(s: &str) -> Result<Self> { Ok(serde_json::from_str(s)?) }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn props(pairs: &[(&str, Value)]) -> Properties {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
  }

  #[test]
  fn builder_keeps_insertion_order() {
    let mut b = GraphBuilder::new();
    b.add_node(NodeKind::Company, props(&[("ico", json!("00000002"))]));
    b.add_node(NodeKind::Company, props(&[("ico", json!("00000001"))]));
    let snap = b.finalize();
    let icos: Vec<_> = snap
      .nodes(NodeKind::Company)
      .iter()
      .map(|n| n["ico"].as_str().unwrap())
      .collect();
    assert_eq!(icos, ["00000002", "00000001"]);
  }

  #[test]
  fn node_mut_updates_in_place() {
    let mut b = GraphBuilder::new();
    let slot = b.add_node(NodeKind::School, props(&[("id", json!("SKOLA-X"))]));
    b.node_mut(slot).unwrap().insert("nazev".into(), json!("X"));
    assert_eq!(b.node(slot).unwrap()["nazev"], json!("X"));
  }

  #[test]
  fn edge_drops_empty_properties() {
    let e = Edge::new("a", "b")
      .with("funkce", "jednatel")
      .with("platnost_od", "")
      .with_opt::<String>("platnost_do", None);
    assert_eq!(e.properties.len(), 1);
  }

  #[test]
  fn snapshot_json_shape_is_stable() {
    let mut b = GraphBuilder::new();
    b.add_node(
      NodeKind::Source,
      props(&[("id", json!("rzp")), ("nazev", json!("RZP"))]),
    );
    b.add_relationship(
      RelKind::OriginatesFrom,
      Edge::new("12345678", "rzp")
        .with_from_kind(NodeKind::Company)
        .with("zdroj_id", "rzp"),
    );
    let snap = b.finalize();
    let value: Value = serde_json::to_value(&snap).unwrap();
    assert_eq!(
      value,
      json!({
        "nodes": { "Zdroj": [ { "id": "rzp", "nazev": "RZP" } ] },
        "relationships": {
          "POCHAZI_Z": [
            { "from": "12345678", "to": "rzp", "from_kind": "Firma", "zdroj_id": "rzp" }
          ]
        }
      })
    );

    let back = GraphSnapshot::from_json(&snap.to_json_pretty().unwrap()).unwrap();
    assert_eq!(back, snap);
  }

  #[test]
  fn dangling_relationships_are_reported() {
    let mut b = GraphBuilder::new();
    b.add_node(NodeKind::Person, props(&[("id", json!("OSOBA-1"))]));
    b.add_node(NodeKind::Company, props(&[("ico", json!("11111111"))]));
    b.add_relationship(
      RelKind::PerformsFunction,
      Edge::new("OSOBA-1", "11111111"),
    );
    b.add_relationship(
      RelKind::PerformsFunction,
      Edge::new("OSOBA-1", "99999999"),
    );
    // polymorphic without from_kind resolves through any kind
    b.add_relationship(RelKind::OriginatesFrom, Edge::new("11111111", "rzp"));
    let snap = b.finalize();

    let dangling = snap.dangling_relationships();
    // the second function edge has no company; the provenance edge has no source
    assert_eq!(dangling.len(), 2);
    assert!(dangling.iter().any(|(_, e)| e.to == "99999999"));
  }
}
