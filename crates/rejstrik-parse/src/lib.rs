//! Source record parsers for the rejstrik pipeline.
//!
//! Turns one raw payload (an XML tree or a JSON array) into a sequence of
//! [`Record`]s. Pure and synchronous; no database or network dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use rejstrik_parse::{ParseContext, SourceFormat, parse_document};
//!
//! let path = std::path::Path::new("data/dump_2025_11_01.xml");
//! let format = SourceFormat::detect(path).unwrap();
//! let bytes = std::fs::read(path).unwrap();
//! for record in parse_document(&bytes, format, &ParseContext::for_path(path)).unwrap() {
//!   println!("{:?}", record.kind);
//! }
//! ```

pub mod error;
pub mod json;
pub mod rzp;
pub mod smlouvy;
pub mod strategy;
pub mod xml;

use std::{fmt, path::Path};

pub use error::{Error, Result};
use rejstrik_core::record::Record;
use strategy::{ExtractStrategy, run_strategy};
use xml::Document;

// ─── Formats ─────────────────────────────────────────────────────────────────

/// The payload formats the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceFormat {
  /// Registr smluv XML dump.
  SmlouvyDump,
  /// RZP XML, any of its schema variants.
  Rzp,
  CompaniesJson,
  PeopleJson,
  TendersJson,
}

impl SourceFormat {
  pub const ALL: [SourceFormat; 5] = [
    SourceFormat::SmlouvyDump,
    SourceFormat::Rzp,
    SourceFormat::CompaniesJson,
    SourceFormat::PeopleJson,
    SourceFormat::TendersJson,
  ];

  /// Guess the format from the file name, then from the parent directory.
  pub fn detect(path: &Path) -> Option<Self> {
    let name = path.file_name()?.to_str()?.to_lowercase();
    let ext = path.extension().and_then(|e| e.to_str()).map(str::to_lowercase);
    let by_name = match ext.as_deref() {
      Some("xml") if name.starts_with("dump_") => Some(Self::SmlouvyDump),
      Some("xml") if name.starts_with("rzp_") => Some(Self::Rzp),
      Some("json") if name.starts_with("companies") => Some(Self::CompaniesJson),
      Some("json") if name.starts_with("people") || name.starts_with("persons") => {
        Some(Self::PeopleJson)
      }
      Some("json") if name.starts_with("tenders") || name.starts_with("contracts") => {
        Some(Self::TendersJson)
      }
      _ => None,
    };
    by_name.or_else(|| {
      let dir = path.parent()?.file_name()?.to_str()?.to_lowercase();
      match (dir.as_str(), ext.as_deref()) {
        ("smlouvy_gov", Some("xml")) => Some(Self::SmlouvyDump),
        ("rzp", Some("xml")) => Some(Self::Rzp),
        ("companies", Some("json")) => Some(Self::CompaniesJson),
        ("people", Some("json")) => Some(Self::PeopleJson),
        ("tenders", Some("json")) => Some(Self::TendersJson),
        _ => None,
      }
    })
  }

  /// Symbolic ID of the source this format is published by.
  pub fn default_source(self) -> &'static str {
    match self {
      Self::SmlouvyDump => "smlouvy_gov",
      Self::Rzp => "rzp",
      Self::CompaniesJson => "opencorporates_cz",
      Self::PeopleJson => "obchodni_rejstrik",
      Self::TendersJson => "vestnik_vz",
    }
  }

  pub fn is_xml(self) -> bool { matches!(self, Self::SmlouvyDump | Self::Rzp) }
}

impl fmt::Display for SourceFormat {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      Self::SmlouvyDump => "smlouvy-dump",
      Self::Rzp => "rzp",
      Self::CompaniesJson => "companies-json",
      Self::PeopleJson => "people-json",
      Self::TendersJson => "tenders-json",
    };
    f.write_str(s)
  }
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// Per-document parsing options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseContext {
  /// Keep only contracts where this IČO is a party.
  pub filter_ico:   Option<String>,
  /// IČO of the company a detail document is about, when the document itself
  /// does not say.
  pub document_ico: Option<String>,
}

impl ParseContext {
  /// Context for `path`, picking up an `ico_<digits>` file name component.
  pub fn for_path(path: &Path) -> Self {
    Self { filter_ico: None, document_ico: ico_from_file_name(path) }
  }

  pub fn with_filter_ico(mut self, ico: Option<String>) -> Self {
    self.filter_ico = ico;
    self
  }
}

/// `rzp_detail_ico_47114983_2025.xml` → `47114983`.
fn ico_from_file_name(path: &Path) -> Option<String> {
  let stem = path.file_stem()?.to_str()?;
  let (_, rest) = stem.split_once("ico_")?;
  let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
  (!digits.is_empty()).then_some(digits)
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

/// Records extracted from one document.
///
/// The payload is decoded and parsed up front, so a malformed document fails
/// in [`parse_document`]. Records themselves are produced as the iterator
/// advances: XML strategies run one at a time, and JSON objects are mapped one
/// by one.
pub struct Records(Pending);

enum Pending {
  Xml {
    doc:        Document,
    ctx:        ParseContext,
    strategies: std::slice::Iter<'static, &'static dyn ExtractStrategy>,
    batch:      std::vec::IntoIter<Record>,
  },
  Json {
    objects: std::vec::IntoIter<json::Object>,
    map:     fn(&json::Object) -> Record,
  },
}

impl Iterator for Records {
  type Item = Record;

  fn next(&mut self) -> Option<Record> {
    match &mut self.0 {
      Pending::Xml { doc, ctx, strategies, batch } => loop {
        if let Some(record) = batch.next() {
          return Some(record);
        }
        *batch = run_strategy(*strategies.next()?, doc, ctx).into_iter();
      },
      Pending::Json { objects, map } => {
        let map = *map;
        objects.next().map(|o| map(&o))
      }
    }
  }
}

/// Parse one document.
///
/// Errors mean the document as a whole is unreadable; fields that fail to
/// parse are simply absent from their records.
pub fn parse_document(bytes: &[u8], format: SourceFormat, ctx: &ParseContext) -> Result<Records> {
  let from_xml = |strategies: &'static [&'static dyn ExtractStrategy]| -> Result<Records> {
    Ok(Records(Pending::Xml {
      doc:        Document::parse(bytes)?,
      ctx:        ctx.clone(),
      strategies: strategies.iter(),
      batch:      Vec::new().into_iter(),
    }))
  };
  let from_json = |map: fn(&json::Object) -> Record| -> Result<Records> {
    Ok(Records(Pending::Json { objects: json::objects(bytes)?.into_iter(), map }))
  };
  match format {
    SourceFormat::SmlouvyDump => from_xml(smlouvy::STRATEGIES),
    SourceFormat::Rzp => from_xml(rzp::STRATEGIES),
    SourceFormat::CompaniesJson => from_json(json::company),
    SourceFormat::PeopleJson => from_json(json::person),
    SourceFormat::TendersJson => from_json(json::tender),
  }
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use rejstrik_core::{
    record::{LinkRole, RecordKind, field},
    source,
  };

  use super::*;

  #[test]
  fn detect_by_file_name() {
    let cases = [
      ("raw/dump_2025_11_01.xml", Some(SourceFormat::SmlouvyDump)),
      ("raw/rzp_ico_47114983.xml", Some(SourceFormat::Rzp)),
      ("x/companies_cz.json", Some(SourceFormat::CompaniesJson)),
      ("x/persons.json", Some(SourceFormat::PeopleJson)),
      ("x/contracts_dump_2025.json", Some(SourceFormat::TendersJson)),
      ("x/notes.txt", None),
      ("x/dump_2025.json", None),
    ];
    for (path, expected) in cases {
      assert_eq!(SourceFormat::detect(&PathBuf::from(path)), expected, "{path}");
    }
  }

  #[test]
  fn detect_by_directory() {
    assert_eq!(
      SourceFormat::detect(Path::new("data/tenders/ted_export.json")),
      Some(SourceFormat::TendersJson)
    );
    assert_eq!(
      SourceFormat::detect(Path::new("data/rzp/manual.xml")),
      Some(SourceFormat::Rzp)
    );
    assert_eq!(SourceFormat::detect(Path::new("data/misc/a.json")), None);
  }

  #[test]
  fn default_sources_are_catalogued() {
    for format in SourceFormat::ALL {
      assert!(source::lookup(format.default_source()).is_ok(), "{format}");
    }
  }

  #[test]
  fn ico_from_the_file_name() {
    let ctx = ParseContext::for_path(Path::new("rzp/rzp_detail_ico_47114983_2025.xml"));
    assert_eq!(ctx.document_ico.as_deref(), Some("47114983"));
    assert_eq!(ParseContext::for_path(Path::new("rzp/rzp_x.xml")).document_ico, None);
  }

  #[test]
  fn parse_document_dispatches_by_format() {
    let records: Vec<_> = parse_document(
      br#"[{"name": "Acme"}]"#,
      SourceFormat::CompaniesJson,
      &ParseContext::default(),
    )
    .unwrap()
    .collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, RecordKind::Company);

    let err = parse_document(b"<a>", SourceFormat::Rzp, &ParseContext::default());
    assert!(matches!(err, Err(Error::Xml(_))));
  }

  #[test]
  fn xml_strategies_run_as_records_are_consumed() {
    let xml = r#"<Odpoved>
      <StatutarniOrgan>
        <IdentifikacniCislo>47114983</IdentifikacniCislo>
        <Clen><Jmeno>Jan</Jmeno><Prijmeni>Novak</Prijmeni></Clen>
      </StatutarniOrgan>
      <PodnikatelSeznam>
        <IdentifikacniCisloSeznam>12345678</IdentifikacniCisloSeznam>
      </PodnikatelSeznam>
    </Odpoved>"#;
    let mut records =
      parse_document(xml.as_bytes(), SourceFormat::Rzp, &ParseContext::default()).unwrap();
    let first = records.next().unwrap();
    assert_eq!(first.links(LinkRole::Function).count(), 1);
    let rest: Vec<_> = records.collect();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].fields.text(field::ICO), Some("12345678"));
  }
}
