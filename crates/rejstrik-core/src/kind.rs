//! Node labels and relationship types of the procurement graph.
//!
//! Labels follow the Czech schema used by downstream queries (`Osoba`,
//! `Firma`, `Zadavatel`, …). The Rust names are English.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

// ─── Node kinds ──────────────────────────────────────────────────────────────

/// The label of a node in the graph.
///
/// Declaration order is the order in which the loader applies node batches
/// and the order in which polymorphic provenance edges probe for a match.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum NodeKind {
  #[serde(rename = "Zdroj")]
  Source,
  #[serde(rename = "Firma")]
  Company,
  #[serde(rename = "Zadavatel")]
  ContractingAuthority,
  #[serde(rename = "Zakazka")]
  Contract,
  #[serde(rename = "Osoba")]
  Person,
  #[serde(rename = "Skola")]
  School,
}

impl NodeKind {
  pub const ALL: [NodeKind; 6] = [
    NodeKind::Source,
    NodeKind::Company,
    NodeKind::ContractingAuthority,
    NodeKind::Contract,
    NodeKind::Person,
    NodeKind::School,
  ];

  /// The graph label written to the store.
  pub fn label(self) -> &'static str {
    match self {
      NodeKind::Source => "Zdroj",
      NodeKind::Company => "Firma",
      NodeKind::ContractingAuthority => "Zadavatel",
      NodeKind::Contract => "Zakazka",
      NodeKind::Person => "Osoba",
      NodeKind::School => "Skola",
    }
  }

  /// The property that carries the identity key of this kind.
  ///
  /// Companies and contracting authorities share the IČO namespace.
  pub fn key_field(self) -> &'static str {
    match self {
      NodeKind::Company | NodeKind::ContractingAuthority => "ico",
      _ => "id",
    }
  }

  /// Every kind except `Source` must carry a provenance edge.
  pub fn requires_provenance(self) -> bool { self != NodeKind::Source }
}

impl fmt::Display for NodeKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for NodeKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    NodeKind::ALL
      .into_iter()
      .find(|k| k.label() == s)
      .ok_or_else(|| Error::UnknownNodeKind(s.to_string()))
  }
}

// ─── Relationship kinds ──────────────────────────────────────────────────────

/// The type of a directed relationship.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RelKind {
  /// Person performs a function (officer role) at a company.
  #[serde(rename = "VYKONAVA_FUNKCI")]
  PerformsFunction,
  /// Person owns a share of a company.
  #[serde(rename = "VLASTNI_PODIL")]
  OwnsShare,
  /// Company submitted a bid for a contract.
  #[serde(rename = "PODAVA_NABIDKU")]
  SubmittedBid,
  /// Company was awarded a contract.
  #[serde(rename = "JE_PRIDELENA")]
  AwardedContract,
  /// Contracting authority announced a contract.
  #[serde(rename = "VYHLASUJE_ZAKAZKU")]
  AnnouncedContract,
  /// Person studied at a school.
  #[serde(rename = "STUDOVAL_NA")]
  StudiedAt,
  /// Provenance: any entity originates from a data source.
  #[serde(rename = "POCHAZI_Z")]
  OriginatesFrom,
}

impl RelKind {
  pub const ALL: [RelKind; 7] = [
    RelKind::PerformsFunction,
    RelKind::OwnsShare,
    RelKind::SubmittedBid,
    RelKind::AwardedContract,
    RelKind::AnnouncedContract,
    RelKind::StudiedAt,
    RelKind::OriginatesFrom,
  ];

  pub fn label(self) -> &'static str {
    match self {
      RelKind::PerformsFunction => "VYKONAVA_FUNKCI",
      RelKind::OwnsShare => "VLASTNI_PODIL",
      RelKind::SubmittedBid => "PODAVA_NABIDKU",
      RelKind::AwardedContract => "JE_PRIDELENA",
      RelKind::AnnouncedContract => "VYHLASUJE_ZAKAZKU",
      RelKind::StudiedAt => "STUDOVAL_NA",
      RelKind::OriginatesFrom => "POCHAZI_Z",
    }
  }

  /// Static endpoint table. `None` on the `from` side means the source kind
  /// is polymorphic and must come from the edge itself.
  pub fn endpoints(self) -> (Option<NodeKind>, NodeKind) {
    match self {
      RelKind::PerformsFunction | RelKind::OwnsShare => {
        (Some(NodeKind::Person), NodeKind::Company)
      }
      RelKind::SubmittedBid | RelKind::AwardedContract => {
        (Some(NodeKind::Company), NodeKind::Contract)
      }
      RelKind::AnnouncedContract => {
        (Some(NodeKind::ContractingAuthority), NodeKind::Contract)
      }
      RelKind::StudiedAt => (Some(NodeKind::Person), NodeKind::School),
      RelKind::OriginatesFrom => (None, NodeKind::Source),
    }
  }
}

impl fmt::Display for RelKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for RelKind {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    RelKind::ALL
      .into_iter()
      .find(|k| k.label() == s)
      .ok_or_else(|| Error::UnknownRelKind(s.to_string()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn labels_parse_back() {
    for kind in NodeKind::ALL {
      assert_eq!(kind.label().parse::<NodeKind>().unwrap(), kind);
    }
    for rel in RelKind::ALL {
      assert_eq!(rel.label().parse::<RelKind>().unwrap(), rel);
    }
    assert!("Company".parse::<NodeKind>().is_err());
  }

  #[test]
  fn serde_uses_graph_labels() {
    let json = serde_json::to_string(&NodeKind::ContractingAuthority).unwrap();
    assert_eq!(json, "\"Zadavatel\"");
    let rel: RelKind = serde_json::from_str("\"POCHAZI_Z\"").unwrap();
    assert_eq!(rel, RelKind::OriginatesFrom);
  }

  #[test]
  fn only_provenance_is_polymorphic() {
    for rel in RelKind::ALL {
      let (from, _) = rel.endpoints();
      assert_eq!(from.is_none(), rel == RelKind::OriginatesFrom);
    }
  }
}
