//! Intermediate records produced by the source parsers.
//!
//! A record is a flat, source-neutral bag of recognised fields. Fields that a
//! document does not carry are absent from the map; they are never stored as
//! empty strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ─── Field names ─────────────────────────────────────────────────────────────

/// Recognised field names shared by every parser.
pub mod field {
  pub const ID: &str = "id";
  pub const ICO: &str = "ico";
  pub const DIC: &str = "dic";
  pub const NAME: &str = "name";
  pub const GIVEN_NAME: &str = "given_name";
  pub const FAMILY_NAME: &str = "family_name";
  pub const FULL_NAME: &str = "full_name";
  pub const BIRTH_DATE: &str = "birth_date";
  pub const NATIONALITY: &str = "nationality";
  pub const ADDRESS: &str = "address";
  pub const DATA_BOX: &str = "data_box";
  pub const DEPARTMENT: &str = "department";
  pub const JURISDICTION: &str = "jurisdiction";
  pub const LEGAL_FORM: &str = "legal_form";
  pub const STATUS: &str = "status";
  pub const FOUNDED: &str = "founded";
  pub const AUTHORITY_TYPE: &str = "authority_type";
  pub const LEVEL: &str = "level";

  pub const SUBJECT: &str = "subject";
  pub const VERSION_ID: &str = "version_id";
  pub const CONTRACT_NUMBER: &str = "contract_number";
  pub const CONTRACT_DATE: &str = "contract_date";
  pub const PUBLISHED_DATE: &str = "published_date";
  pub const APPROVED_BY: &str = "approved_by";
  pub const URL: &str = "url";
  pub const VALUE: &str = "value";
  pub const VALUE_WITH_VAT: &str = "value_with_vat";
  pub const VALUE_WITHOUT_VAT: &str = "value_without_vat";
  pub const CURRENCY: &str = "currency";

  pub const ROLE: &str = "role";
  pub const VALID_FROM: &str = "valid_from";
  pub const VALID_TO: &str = "valid_to";
  pub const SHARE_PERCENT: &str = "share_percent";
  pub const BID_VALUE: &str = "bid_value";
  pub const BID_DATE: &str = "bid_date";
  pub const COMPANY_ICO: &str = "company_ico";
  pub const COMPANY_NAME: &str = "company_name";
  /// An exporter's own company identifier that is not an IČO.
  pub const COMPANY_REF: &str = "company_ref";
  pub const SCHOOL: &str = "school";
  pub const FIELD_OF_STUDY: &str = "field_of_study";
  pub const YEAR_FROM: &str = "year_from";
  pub const YEAR_TO: &str = "year_to";
  /// Trade licence subjects of an entrepreneur.
  pub const TRADES: &str = "trades";

  pub const FILE_NAME: &str = "file_name";
  pub const HASH: &str = "hash";
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A single recognised field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
  Number(f64),
  Text(String),
  List(Vec<String>),
}

impl FieldValue {
  pub fn as_text(&self) -> Option<&str> {
    match self {
      FieldValue::Text(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      FieldValue::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&[String]> {
    match self {
      FieldValue::List(items) => Some(items),
      _ => None,
    }
  }
}

/// A flat map of recognised fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
  pub fn new() -> Self { Self::default() }

  /// Set a text field. Blank values leave the field absent.
  pub fn set_text(&mut self, name: &str, value: Option<impl AsRef<str>>) {
    if let Some(v) = value {
      let v = v.as_ref().trim();
      if !v.is_empty() {
        self.0.insert(name.to_string(), FieldValue::Text(v.to_string()));
      }
    }
  }

  /// Set a numeric field. Non-finite values leave the field absent.
  pub fn set_number(&mut self, name: &str, value: Option<f64>) {
    if let Some(n) = value.filter(|n| n.is_finite()) {
      self.0.insert(name.to_string(), FieldValue::Number(n));
    }
  }

  /// Set a list of text values. Blank items are dropped, and an empty list
  /// leaves the field absent.
  pub fn set_list<I, S>(&mut self, name: &str, items: I)
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let items: Vec<String> = items
      .into_iter()
      .map(|s| s.as_ref().trim().to_string())
      .filter(|s| !s.is_empty())
      .collect();
    if !items.is_empty() {
      self.0.insert(name.to_string(), FieldValue::List(items));
    }
  }

  /// Builder-style [`Fields::set_text`].
  pub fn with_text(mut self, name: &str, value: impl AsRef<str>) -> Self {
    self.set_text(name, Some(value));
    self
  }

  /// Builder-style [`Fields::set_number`].
  pub fn with_number(mut self, name: &str, value: f64) -> Self {
    self.set_number(name, Some(value));
    self
  }

  pub fn text(&self, name: &str) -> Option<&str> {
    self.0.get(name).and_then(FieldValue::as_text)
  }

  /// A numeric field; text fields are coerced with [`parse_number`].
  pub fn number(&self, name: &str) -> Option<f64> {
    match self.0.get(name)? {
      FieldValue::Number(n) => Some(*n),
      FieldValue::Text(s) => parse_number(s),
      FieldValue::List(_) => None,
    }
  }

  pub fn list(&self, name: &str) -> Option<&[String]> {
    self.0.get(name).and_then(FieldValue::as_list)
  }

  pub fn contains(&self, name: &str) -> bool { self.0.contains_key(name) }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
    self.0.iter().map(|(k, v)| (k.as_str(), v))
  }
}

/// Lenient numeric coercion for monetary and percentage values.
///
/// Accepts spaces (including non-breaking) as thousands separators, a Czech
/// decimal comma, a trailing `%` and a currency suffix such as `Kč`. Anything
/// else yields `None` rather than an error.
pub fn parse_number(raw: &str) -> Option<f64> {
  let cleaned: String = raw
    .trim()
    .trim_end_matches('%')
    .trim_end_matches("Kč")
    .trim_end_matches("CZK")
    .chars()
    .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
    .map(|c| if c == ',' { '.' } else { c })
    .collect();
  if cleaned.is_empty() {
    return None;
  }
  cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// What a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
  Contract,
  Company,
  Person,
  Authority,
}

/// How a linked party relates to the record that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkRole {
  /// Contract → the contracting authority that announced it.
  Authority,
  /// Contract → the company it was awarded to.
  Contractor,
  /// Contract → a company that bid for it.
  Bidder,
  /// Person → a company where the person holds a function.
  Function,
  /// Person → a company the person owns a share of.
  Ownership,
  /// Person → a school the person attended.
  Education,
  /// Contract → a published document attached to it.
  Attachment,
}

/// A related party referenced from a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
  pub role:   LinkRole,
  pub fields: Fields,
}

impl Link {
  pub fn new(role: LinkRole, fields: Fields) -> Self { Self { role, fields } }
}

/// One normalised record extracted from a source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub kind:   RecordKind,
  pub fields: Fields,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub links:  Vec<Link>,
}

impl Record {
  pub fn new(kind: RecordKind, fields: Fields) -> Self {
    Self { kind, fields, links: Vec::new() }
  }

  pub fn with_link(mut self, link: Link) -> Self {
    self.links.push(link);
    self
  }

  pub fn links(&self, role: LinkRole) -> impl Iterator<Item = &Link> {
    self.links.iter().filter(move |l| l.role == role)
  }
}
