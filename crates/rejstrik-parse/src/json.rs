//! JSON array payloads: companies, people and tenders.
//!
//! Field names vary between exporters (OpenCorporates, ARES, manual CSV
//! conversions), so every recognised field lists its aliases in order of
//! preference.

use encoding_rs::{UTF_8, WINDOWS_1250};
use rejstrik_core::record::{Fields, Link, LinkRole, Record, RecordKind, field, parse_number};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};

pub type Object = Map<String, Value>;

/// Decode `bytes` as UTF-8, falling back to windows-1250.
pub fn decode(bytes: &[u8]) -> String {
  let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
  match UTF_8.decode_without_bom_handling_and_without_replacement(body) {
    Some(text) => text.into_owned(),
    None => {
      debug!("payload is not UTF-8, decoding as windows-1250");
      WINDOWS_1250.decode_without_bom_handling(body).0.into_owned()
    }
  }
}

/// Parse the payload into its list of objects.
///
/// Accepts a bare array or an object wrapping one under `items`, `data` or
/// `results`. Non-object entries are skipped.
pub fn objects(bytes: &[u8]) -> Result<Vec<Object>> {
  let value: Value = serde_json::from_str(&decode(bytes))?;
  let items = match value {
    Value::Array(items) => items,
    Value::Object(mut obj) => ["items", "data", "results"]
      .iter()
      .find_map(|k| match obj.remove(*k) {
        Some(Value::Array(items)) => Some(items),
        _ => None,
      })
      .ok_or(Error::NotAnArray("object"))?,
    Value::Null => return Err(Error::NotAnArray("null")),
    Value::Bool(_) => return Err(Error::NotAnArray("boolean")),
    Value::Number(_) => return Err(Error::NotAnArray("number")),
    Value::String(_) => return Err(Error::NotAnArray("string")),
  };
  let total = items.len();
  let objects: Vec<Object> = items
    .into_iter()
    .filter_map(|v| match v {
      Value::Object(o) => Some(o),
      _ => None,
    })
    .collect();
  if objects.len() < total {
    debug!(skipped = total - objects.len(), "non-object entries skipped");
  }
  Ok(objects)
}

// ─── Value access ────────────────────────────────────────────────────────────

/// The first alias holding a non-blank string or a number, as text.
fn text(obj: &Object, keys: &[&str]) -> Option<String> {
  keys.iter().find_map(|k| match obj.get(*k)? {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  })
}

/// The first alias holding a number or a parseable numeric string.
fn number(obj: &Object, keys: &[&str]) -> Option<f64> {
  keys.iter().find_map(|k| match obj.get(*k)? {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => parse_number(s),
    _ => None,
  })
}

fn object<'a>(obj: &'a Object, keys: &[&str]) -> Option<&'a Object> {
  keys.iter().find_map(|k| obj.get(*k)?.as_object())
}

fn array<'a>(obj: &'a Object, keys: &[&str]) -> impl Iterator<Item = &'a Object> {
  keys
    .iter()
    .find_map(|k| obj.get(*k)?.as_array())
    .into_iter()
    .flatten()
    .filter_map(Value::as_object)
}

/// A company reference split into an IČO and the exporter's own identifier.
///
/// `ref_keys` hold identifiers such as `COMP-001` or `OC-CZ-…`; one is taken
/// as the IČO only when it is nothing but up to eight digits.
fn company_ids(
  obj: &Object,
  ico_keys: &[&str],
  ref_keys: &[&str],
) -> (Option<String>, Option<String>) {
  match (text(obj, ico_keys), text(obj, ref_keys)) {
    (None, Some(r)) if looks_like_ico(&r) => (Some(r), None),
    ids => ids,
  }
}

fn looks_like_ico(raw: &str) -> bool {
  let digits = raw.chars().filter(|c| !c.is_whitespace()).count();
  (1..=8).contains(&digits) && raw.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
}

/// Copy each `(field, aliases)` pair as text.
fn copy_text(fields: &mut Fields, obj: &Object, mapping: &[(&str, &[&str])]) {
  for (name, keys) in mapping {
    fields.set_text(name, text(obj, keys));
  }
}

// ─── Companies ───────────────────────────────────────────────────────────────

const COMPANY_FIELDS: &[(&str, &[&str])] = &[
  (field::ICO, &["ico", "registration_number", "company_number"]),
  (field::NAME, &["name", "nazev"]),
  (field::DIC, &["dic"]),
  (field::JURISDICTION, &["country", "jurisdiction", "jurisdiction_code"]),
  (field::ADDRESS, &["address", "adresa"]),
  (field::FOUNDED, &["incorporation_date", "founded_date"]),
  (field::LEGAL_FORM, &["company_type", "legal_form"]),
  (field::STATUS, &["status", "current_status"]),
];

pub fn companies(bytes: &[u8]) -> Result<Vec<Record>> {
  Ok(objects(bytes)?.iter().map(company).collect())
}

pub fn company(obj: &Object) -> Record {
  let mut f = Fields::new();
  copy_text(&mut f, obj, COMPANY_FIELDS);
  Record::new(RecordKind::Company, f)
}

// ─── People ──────────────────────────────────────────────────────────────────

pub fn people(bytes: &[u8]) -> Result<Vec<Record>> {
  Ok(objects(bytes)?.iter().map(person).collect())
}

/// One officer with their function, ownership and education links.
pub fn person(obj: &Object) -> Record {
  let mut f = Fields::new();
  copy_text(&mut f, obj, &[
    (field::ID, &["id"]),
    (field::FULL_NAME, &["name", "full_name"]),
    (field::GIVEN_NAME, &["first_name", "given_name", "jmeno"]),
    (field::FAMILY_NAME, &["last_name", "family_name", "prijmeni"]),
    (field::BIRTH_DATE, &["birth_date", "date_of_birth", "datum_narozeni"]),
    (field::NATIONALITY, &["nationality"]),
  ]);
  let mut record = Record::new(RecordKind::Person, f);

  // The officer's own company and role sit on the person object itself.
  let (company, company_ref) = company_ids(obj, &["company_ico", "ico"], &["company_id"]);
  let company_name = text(obj, &["company_name"]);
  if company.is_some() || company_ref.is_some() || company_name.is_some() {
    let mut l = Fields::new();
    l.set_text(field::COMPANY_ICO, company);
    l.set_text(field::COMPANY_REF, company_ref);
    l.set_text(field::COMPANY_NAME, company_name);
    copy_text(&mut l, obj, &[
      (field::ROLE, &["role", "position"]),
      (field::VALID_FROM, &["appointment_date", "start_date"]),
      (field::VALID_TO, &["resignation_date", "end_date"]),
    ]);
    record = record.with_link(Link::new(LinkRole::Function, l));
  }

  for share in array(obj, &["ownership", "shares"]) {
    let (company, company_ref) = company_ids(share, &["company_ico", "ico"], &["company_id"]);
    let mut l = Fields::new();
    l.set_text(field::COMPANY_ICO, company);
    l.set_text(field::COMPANY_REF, company_ref);
    copy_text(&mut l, share, &[
      (field::COMPANY_NAME, &["company_name", "name"]),
      (field::VALID_FROM, &["start_date", "from"]),
      (field::VALID_TO, &["end_date", "to"]),
    ]);
    l.set_number(field::SHARE_PERCENT, number(share, &["percent", "share_percent", "share"]));
    record = record.with_link(Link::new(LinkRole::Ownership, l));
  }

  for school in array(obj, &["education", "schools"]) {
    let mut l = Fields::new();
    copy_text(&mut l, school, &[
      (field::SCHOOL, &["school", "name"]),
      (field::FIELD_OF_STUDY, &["field", "field_of_study", "obor"]),
    ]);
    l.set_number(field::YEAR_FROM, number(school, &["year_from", "from"]));
    l.set_number(field::YEAR_TO, number(school, &["year_to", "to"]));
    record = record.with_link(Link::new(LinkRole::Education, l));
  }

  record
}

// ─── Tenders ─────────────────────────────────────────────────────────────────

pub fn tenders(bytes: &[u8]) -> Result<Vec<Record>> {
  Ok(objects(bytes)?.iter().map(tender).collect())
}

pub fn tender(obj: &Object) -> Record {
  let mut f = Fields::new();
  copy_text(&mut f, obj, &[
    (field::ID, &["id"]),
    (field::SUBJECT, &["title", "name"]),
    (field::CURRENCY, &["currency"]),
    (field::PUBLISHED_DATE, &["publication_date", "published_date"]),
    (field::CONTRACT_DATE, &["award_date", "contract_date"]),
    (field::STATUS, &["status"]),
    (field::JURISDICTION, &["country"]),
    (field::URL, &["url"]),
  ]);
  f.set_number(field::VALUE, number(obj, &["value", "estimated_value"]));
  let mut record = Record::new(RecordKind::Contract, f);

  if let Some(publisher) = object(obj, &["publisher", "buyer"]) {
    let mut l = Fields::new();
    copy_text(&mut l, publisher, &[
      (field::ICO, &["ico", "registration_number"]),
      (field::NAME, &["name"]),
      (field::AUTHORITY_TYPE, &["type"]),
      (field::LEVEL, &["level"]),
      (field::JURISDICTION, &["country"]),
      (field::ADDRESS, &["address"]),
    ]);
    record = record.with_link(Link::new(LinkRole::Authority, l));
  }

  if let Some(winner) = object(obj, &["winner", "supplier"]) {
    let mut l = Fields::new();
    copy_text(&mut l, winner, &[(field::ICO, &["ico"]), (field::NAME, &["name"])]);
    l.set_number(field::VALUE, number(winner, &["value"]));
    record = record.with_link(Link::new(LinkRole::Contractor, l));
  }

  for bidder in array(obj, &["bidders", "bids"]) {
    let mut l = Fields::new();
    copy_text(&mut l, bidder, &[
      (field::ICO, &["ico"]),
      (field::NAME, &["name"]),
      (field::BID_DATE, &["date"]),
    ]);
    l.set_number(field::BID_VALUE, number(bidder, &["value", "amount"]));
    record = record.with_link(Link::new(LinkRole::Bidder, l));
  }

  record
}
