//! Record → graph transformation.
//!
//! A [`Transformer`] is the accumulation context of one pipeline run: it owns
//! the [`GraphBuilder`] and the [`Resolver`] and maps each parsed
//! [`Record`] onto nodes and relationships of the Czech graph schema.

use chrono::{DateTime, NaiveDate};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::{
  graph::{Edge, GraphBuilder, GraphSnapshot, Properties},
  ico::{digest_id, normalize_company_id, person_id, school_id, synthetic_key},
  kind::{NodeKind, RelKind},
  record::{Fields, Link, LinkRole, Record, RecordKind, field},
  resolve::{EntityIndex, HashIndex, Identity, Resolver},
  source::Provenance,
};

/// Default currency of Czech sources.
pub const DEFAULT_CURRENCY: &str = "CZK";

/// Default jurisdiction of Czech sources.
pub const DEFAULT_JURISDICTION: &str = "CZ";

/// Counters collected while transforming.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformReport {
  pub documents:      usize,
  pub records:        usize,
  /// Records or linked parties dropped because no key could be built.
  pub unresolved:     usize,
  /// Entities that only have a synthetic key.
  pub low_confidence: usize,
  /// Relationships whose endpoints are missing from the snapshot.
  pub dangling:       usize,
}

/// The accumulation context of one run.
pub struct Transformer<I = HashIndex> {
  graph:          GraphBuilder,
  resolver:       Resolver<I>,
  reference_year: i32,
  documents:      usize,
  records:        usize,
}

impl Transformer<HashIndex> {
  /// `reference_year` is used for contracts without any usable date.
  pub fn new(reference_year: i32) -> Self {
    Self::with_resolver(Resolver::new(), reference_year)
  }
}

impl<I: EntityIndex> Transformer<I> {
  pub fn with_resolver(resolver: Resolver<I>, reference_year: i32) -> Self {
    Self {
      graph: GraphBuilder::new(),
      resolver,
      reference_year,
      documents: 0,
      records: 0,
    }
  }

  pub fn resolver(&self) -> &Resolver<I> { &self.resolver }

  pub fn graph(&self) -> &GraphBuilder { &self.graph }

  /// Transform every record of one document.
  pub fn ingest<R>(&mut self, provenance: &Provenance, records: R) -> usize
  where
    R: IntoIterator<Item = Record>,
  {
    self.documents += 1;
    self.resolver.ensure_source(&mut self.graph, provenance);
    let mut count = 0;
    for record in records {
      self.ingest_record(provenance, &record);
      count += 1;
    }
    debug!(document = %provenance.document, records = count, "document ingested");
    count
  }

  /// Transform a single record.
  pub fn ingest_record(&mut self, provenance: &Provenance, record: &Record) {
    self.records += 1;
    match record.kind {
      RecordKind::Contract => self.contract(provenance, record),
      RecordKind::Company => {
        self.company(provenance, &record.fields);
      }
      RecordKind::Authority => {
        self.authority(provenance, &record.fields);
      }
      RecordKind::Person => self.person(provenance, record),
    }
  }

  /// Freeze the graph. No more records can be ingested afterwards.
  pub fn finalize(self) -> (GraphSnapshot, TransformReport) {
    let snapshot = self.graph.finalize();
    let report = TransformReport {
      documents:      self.documents,
      records:        self.records,
      unresolved:     self.resolver.unresolved_count(),
      low_confidence: self.resolver.low_confidence_count(),
      dangling:       snapshot.dangling_relationships().len(),
    };
    info!(
      documents = report.documents,
      records = report.records,
      nodes = snapshot.node_count(),
      relationships = snapshot.relationship_count(),
      unresolved = report.unresolved,
      "transformation finished"
    );
    (snapshot, report)
  }

  // ── Contracts ─────────────────────────────────────────────────────────

  fn contract(&mut self, prov: &Provenance, record: &Record) {
    let f = &record.fields;
    let identity = match f.text(field::ID) {
      Some(id) => Identity::Natural(id.to_string()),
      None => match f.text(field::SUBJECT) {
        Some(subject) => Identity::Synthetic(digest_id("ZAKAZKA", &[
          prov.source.id,
          subject,
          f.text(field::PUBLISHED_DATE).unwrap_or(""),
          f.text(field::CONTRACT_DATE).unwrap_or(""),
        ])),
        None => {
          self.resolver.record_unresolved(NodeKind::Contract);
          return;
        }
      },
    };

    let with_vat = f.number(field::VALUE_WITH_VAT);
    let without_vat = f.number(field::VALUE_WITHOUT_VAT);
    let value = with_vat.or(without_vat).or_else(|| f.number(field::VALUE));
    let contract_date = f.text(field::CONTRACT_DATE).map(normalize_date);
    let published_date = f.text(field::PUBLISHED_DATE).map(normalize_date);
    let year = contract_date
      .as_deref()
      .and_then(year_of)
      .or_else(|| published_date.as_deref().and_then(year_of))
      .unwrap_or(self.reference_year);

    let mut props = Properties::new();
    put(&mut props, "nazev", f.text(field::SUBJECT));
    put(&mut props, "hodnota", value);
    put(&mut props, "hodnota_s_dph", with_vat);
    put(&mut props, "hodnota_bez_dph", without_vat);
    put(
      &mut props,
      "mena",
      Some(f.text(field::CURRENCY).unwrap_or(DEFAULT_CURRENCY)),
    );
    put(&mut props, "rok", Some(year));
    put(&mut props, "stav", f.text(field::STATUS));
    put(
      &mut props,
      "jurisdikce",
      Some(f.text(field::JURISDICTION).unwrap_or(DEFAULT_JURISDICTION)),
    );
    put(&mut props, "datum_uzavreni", contract_date.clone());
    put(&mut props, "datum_zverejneni", published_date.clone());
    put(&mut props, "cislo_smlouvy", f.text(field::CONTRACT_NUMBER));
    put(&mut props, "id_verze", f.text(field::VERSION_ID));
    put(&mut props, "url", f.text(field::URL));
    put(&mut props, "schvalil", f.text(field::APPROVED_BY));
    put(&mut props, "prilohy", attachments(record));

    let contract_key = self.resolver.resolve_or_create(
      &mut self.graph,
      NodeKind::Contract,
      identity,
      props,
      Some(prov),
    );

    for link in record.links(LinkRole::Authority) {
      if let Some(key) = self.authority(prov, &link.fields) {
        self.graph.add_relationship(
          RelKind::AnnouncedContract,
          Edge::new(key, contract_key.clone())
            .with_opt("datum_vyhlaseni", published_date.clone()),
        );
      }
    }

    for link in record.links(LinkRole::Contractor) {
      if let Some(key) = self.company(prov, &link.fields) {
        let award = link.fields.number(field::VALUE).or(value);
        self.graph.add_relationship(
          RelKind::AwardedContract,
          Edge::new(key, contract_key.clone())
            .with_opt("hodnota", award)
            .with("id_smlouvy", contract_key.as_str()),
        );
      }
    }

    for link in record.links(LinkRole::Bidder) {
      if let Some(key) = self.company(prov, &link.fields) {
        self.graph.add_relationship(
          RelKind::SubmittedBid,
          Edge::new(key, contract_key.clone())
            .with_opt("hodnota_nabidky", link.fields.number(field::BID_VALUE))
            .with_opt("datum", link.fields.text(field::BID_DATE).map(normalize_date)),
        );
      }
    }
  }

  // ── Organisations ─────────────────────────────────────────────────────

  fn organisation_identity(&mut self, kind: NodeKind, f: &Fields) -> Option<Identity> {
    let prefix = match kind {
      NodeKind::ContractingAuthority => "ZADAVATEL",
      _ => "FIRMA",
    };
    let name = f.text(field::NAME).or_else(|| f.text(field::COMPANY_NAME));
    let identity = f
      .text(field::ICO)
      .or_else(|| f.text(field::COMPANY_ICO))
      .and_then(normalize_company_id)
      .map(Identity::Natural)
      .or_else(|| {
        name
          .or_else(|| f.text(field::COMPANY_REF))
          .and_then(|n| synthetic_key(prefix, n))
          .map(Identity::Synthetic)
      });
    if identity.is_none() {
      self.resolver.record_unresolved(kind);
    }
    identity
  }

  fn company(&mut self, prov: &Provenance, f: &Fields) -> Option<String> {
    let identity = self.organisation_identity(NodeKind::Company, f)?;

    let mut props = Properties::new();
    put(
      &mut props,
      "nazev",
      f.text(field::NAME).or_else(|| f.text(field::COMPANY_NAME)),
    );
    put(&mut props, "dic", f.text(field::DIC));
    put(
      &mut props,
      "jurisdikce",
      Some(f.text(field::JURISDICTION).unwrap_or(DEFAULT_JURISDICTION)),
    );
    put(&mut props, "pravni_forma", f.text(field::LEGAL_FORM));
    put(&mut props, "stav", f.text(field::STATUS));
    put(&mut props, "datum_vzniku", f.text(field::FOUNDED).map(normalize_date));
    put(&mut props, "adresa", f.text(field::ADDRESS));
    put(&mut props, "datova_schranka", f.text(field::DATA_BOX));
    put(&mut props, "externi_id", f.text(field::COMPANY_REF));
    put(&mut props, "overeno", Some(false));

    Some(self.resolver.resolve_or_create(
      &mut self.graph,
      NodeKind::Company,
      identity,
      props,
      Some(prov),
    ))
  }

  fn authority(&mut self, prov: &Provenance, f: &Fields) -> Option<String> {
    let identity = self.organisation_identity(NodeKind::ContractingAuthority, f)?;

    let mut props = Properties::new();
    put(&mut props, "nazev", f.text(field::NAME));
    put(&mut props, "typ", f.text(field::AUTHORITY_TYPE));
    put(&mut props, "uroven", f.text(field::LEVEL));
    put(
      &mut props,
      "jurisdikce",
      Some(f.text(field::JURISDICTION).unwrap_or(DEFAULT_JURISDICTION)),
    );
    put(&mut props, "adresa", f.text(field::ADDRESS));
    put(&mut props, "datova_schranka", f.text(field::DATA_BOX));
    put(&mut props, "utvar", f.text(field::DEPARTMENT));
    put(&mut props, "overeno", Some(false));

    Some(self.resolver.resolve_or_create(
      &mut self.graph,
      NodeKind::ContractingAuthority,
      identity,
      props,
      Some(prov),
    ))
  }

  // ── Persons ───────────────────────────────────────────────────────────

  fn person(&mut self, prov: &Provenance, record: &Record) {
    let f = &record.fields;
    let given = f.text(field::GIVEN_NAME);
    let family = f.text(field::FAMILY_NAME);
    let full_name = f.text(field::FULL_NAME).map(str::to_string).or_else(|| {
      let joined = [given, family].into_iter().flatten().collect::<Vec<_>>().join(" ");
      (!joined.is_empty()).then_some(joined)
    });
    let birth_date = f.text(field::BIRTH_DATE).map(normalize_date);

    // The first company the person is tied to scopes the synthetic ID.
    let company_scope = record
      .links
      .iter()
      .filter(|l| matches!(l.role, LinkRole::Function | LinkRole::Ownership))
      .find_map(|l| l.fields.text(field::COMPANY_ICO).and_then(normalize_company_id));

    // An entrepreneur's own IČO identifies them across sources.
    let own_ico = f.text(field::ICO).and_then(normalize_company_id);
    let identity = match (f.text(field::ID), &own_ico, full_name.as_deref()) {
      (Some(id), ..) => Identity::Natural(id.to_string()),
      (None, Some(ico), _) => Identity::Natural(format!("OSOBA-ICO-{ico}")),
      (None, None, Some(name)) => Identity::Synthetic(person_id(
        prov.source.id,
        name,
        birth_date.as_deref(),
        company_scope.as_deref(),
      )),
      (None, None, None) => {
        self.resolver.record_unresolved(NodeKind::Person);
        return;
      }
    };

    let mut props = Properties::new();
    put(&mut props, "jmeno", given);
    put(&mut props, "prijmeni", family);
    put(&mut props, "cele_jmeno", full_name.clone());
    put(&mut props, "datum_narozeni", birth_date);
    put(&mut props, "narodnost", f.text(field::NATIONALITY));
    put(&mut props, "ico", own_ico);
    put(&mut props, "adresa", f.text(field::ADDRESS));
    put(&mut props, "obory", f.list(field::TRADES).map(<[String]>::to_vec));
    put(&mut props, "overeno", Some(false));

    let person_key = self.resolver.resolve_or_create(
      &mut self.graph,
      NodeKind::Person,
      identity,
      props,
      Some(prov),
    );

    for link in &record.links {
      match link.role {
        LinkRole::Function => self.function(prov, &person_key, link),
        LinkRole::Ownership => self.ownership(prov, &person_key, link),
        LinkRole::Education => self.education(prov, &person_key, link),
        LinkRole::Authority | LinkRole::Contractor | LinkRole::Bidder | LinkRole::Attachment => {
          debug!(role = ?link.role, "ignoring contract link on a person record");
        }
      }
    }
  }

  fn function(&mut self, prov: &Provenance, person_key: &str, link: &Link) {
    let Some(company_key) = self.company(prov, &link.fields) else {
      return;
    };
    let f = &link.fields;
    self.graph.add_relationship(
      RelKind::PerformsFunction,
      Edge::new(person_key, company_key)
        .with_opt("funkce", f.text(field::ROLE).map(str::to_lowercase))
        .with_opt("platnost_od", f.text(field::VALID_FROM).map(normalize_date))
        .with_opt("platnost_do", f.text(field::VALID_TO).map(normalize_date)),
    );
  }

  fn ownership(&mut self, prov: &Provenance, person_key: &str, link: &Link) {
    let Some(company_key) = self.company(prov, &link.fields) else {
      return;
    };
    let f = &link.fields;
    self.graph.add_relationship(
      RelKind::OwnsShare,
      Edge::new(person_key, company_key)
        .with_opt("podil_procent", f.number(field::SHARE_PERCENT))
        .with_opt("platnost_od", f.text(field::VALID_FROM).map(normalize_date))
        .with_opt("platnost_do", f.text(field::VALID_TO).map(normalize_date)),
    );
  }

  fn education(&mut self, prov: &Provenance, person_key: &str, link: &Link) {
    let f = &link.fields;
    let Some(name) = f.text(field::SCHOOL) else {
      self.resolver.record_unresolved(NodeKind::School);
      return;
    };
    let Some(key) = school_id(name) else {
      self.resolver.record_unresolved(NodeKind::School);
      return;
    };
    let mut props = Properties::new();
    put(&mut props, "nazev", Some(name));
    let school_key = self.resolver.resolve_or_create(
      &mut self.graph,
      NodeKind::School,
      Identity::Synthetic(key),
      props,
      Some(prov),
    );
    self.graph.add_relationship(
      RelKind::StudiedAt,
      Edge::new(person_key, school_key)
        .with_opt("obor", f.text(field::FIELD_OF_STUDY))
        .with_opt("rok_od", f.number(field::YEAR_FROM).map(|y| y as i64))
        .with_opt("rok_do", f.number(field::YEAR_TO).map(|y| y as i64)),
    );
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn put<V: Into<Value>>(props: &mut Properties, name: &str, value: Option<V>) {
  if let Some(v) = value {
    props.insert(name.to_string(), v.into());
  }
}

/// Attachment descriptors of a contract as a JSON list, if it has any.
fn attachments(record: &Record) -> Option<Vec<Value>> {
  let list: Vec<Value> = record
    .links(LinkRole::Attachment)
    .map(|l| {
      let mut a = Properties::new();
      put(&mut a, "nazev_souboru", l.fields.text(field::FILE_NAME));
      put(&mut a, "hash", l.fields.text(field::HASH));
      put(&mut a, "odkaz", l.fields.text(field::URL));
      a
    })
    .filter(|a| !a.is_empty())
    .map(|a| Value::Object(a.into_iter().collect()))
    .collect();
  (!list.is_empty()).then_some(list)
}

/// Normalise the date formats seen in Czech sources to `YYYY-MM-DD`.
///
/// Unrecognised values are returned trimmed but otherwise unchanged.
pub fn normalize_date(raw: &str) -> String {
  let raw = raw.trim();
  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return dt.date_naive().to_string();
  }
  for fmt in ["%Y-%m-%d", "%d.%m.%Y", "%d. %m. %Y", "%Y%m%d"] {
    if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
      return d.to_string();
    }
  }
  // Timestamps without an offset, e.g. `2025-11-01T10:00:00`.
  if let Some((date, _)) = raw.split_once('T')
    && let Ok(d) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
  {
    return d.to_string();
  }
  raw.to_string()
}

/// The year of a normalised date, if it starts with four digits.
fn year_of(date: &str) -> Option<i32> {
  let head = date.get(..4)?;
  if head.chars().all(|c| c.is_ascii_digit()) {
    head.parse().ok()
  } else {
    None
  }
}
