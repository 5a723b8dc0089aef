//! Data sources and provenance context.
//!
//! Every node except a [`NodeKind::Source`](crate::kind::NodeKind::Source)
//! points back to the source that contributed it through a `POCHAZI_Z` edge.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::{Error, Result};

/// Static description of one external data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceDescriptor {
  /// Fixed symbolic ID, e.g. `smlouvy_gov`.
  pub id:        &'static str,
  pub name:      &'static str,
  pub url:       &'static str,
  /// Access type: `xml_dump`, `xml_api`, `rest_api`, …
  pub kind:      &'static str,
  pub publisher: &'static str,
  pub license:   &'static str,
}

/// Sources known to the pipeline.
pub static CATALOGUE: &[SourceDescriptor] = &[
  SourceDescriptor {
    id:        "smlouvy_gov",
    name:      "Registr smluv",
    url:       "https://smlouvy.gov.cz",
    kind:      "xml_dump",
    publisher: "Digitální a informační agentura",
    license:   "otevřená data",
  },
  SourceDescriptor {
    id:        "rzp",
    name:      "Registr živnostenského podnikání",
    url:       "https://rzp.gov.cz",
    kind:      "xml_api",
    publisher: "Ministerstvo průmyslu a obchodu",
    license:   "otevřená data",
  },
  SourceDescriptor {
    id:        "obchodni_rejstrik",
    name:      "Obchodní rejstřík",
    url:       "https://or.justice.cz",
    kind:      "registry",
    publisher: "Ministerstvo spravedlnosti",
    license:   "otevřená data",
  },
  SourceDescriptor {
    id:        "opencorporates_cz",
    name:      "OpenCorporates",
    url:       "https://api.opencorporates.com/v0.4",
    kind:      "rest_api",
    publisher: "OpenCorporates",
    license:   "ODbL",
  },
  SourceDescriptor {
    id:        "vestnik_vz",
    name:      "Věstník veřejných zakázek",
    url:       "https://www.vestnikverejnychzakazek.cz",
    kind:      "portal",
    publisher: "Ministerstvo pro místní rozvoj",
    license:   "otevřená data",
  },
  SourceDescriptor {
    id:        "eu_ted_cz",
    name:      "Tenders Electronic Daily (CZ)",
    url:       "https://ted.europa.eu",
    kind:      "rest_api",
    publisher: "Publications Office of the European Union",
    license:   "CC BY 4.0",
  },
  SourceDescriptor {
    id:        "nen_zakazky",
    name:      "Národní elektronický nástroj",
    url:       "https://nen.nipez.cz",
    kind:      "portal",
    publisher: "Ministerstvo pro místní rozvoj",
    license:   "otevřená data",
  },
];

/// Look up a source by its symbolic ID.
pub fn lookup(id: &str) -> Result<&'static SourceDescriptor> {
  CATALOGUE
    .iter()
    .find(|s| s.id == id)
    .ok_or_else(|| Error::UnknownSource(id.to_string()))
}

/// Where the entities of one document came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
  pub source:      &'static SourceDescriptor,
  /// File name of the document, recorded on the provenance edge.
  pub document:    String,
  pub acquired_at: DateTime<Utc>,
}

impl Provenance {
  pub fn new(
    source: &'static SourceDescriptor,
    document: impl Into<String>,
    acquired_at: DateTime<Utc>,
  ) -> Self {
    Self { source, document: document.into(), acquired_at }
  }

  /// ISO 8601 acquisition timestamp with second precision.
  pub fn acquired_at_iso(&self) -> String {
    self.acquired_at.to_rfc3339_opts(SecondsFormat::Secs, true)
  }
}
