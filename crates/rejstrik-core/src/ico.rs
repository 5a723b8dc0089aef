//! Identifier normalisation and deterministic entity IDs.
//!
//! IČO (identifikační číslo osoby) is the 8-digit registration number of a
//! Czech legal entity. Sources format it inconsistently (`"604 69 803"`,
//! `"123"`, sometimes a birth date in the same column), so every key passes
//! through [`normalize_company_id`] before it is used for matching.

use sha2::{Digest, Sha256};

/// Canonical IČO length.
pub const ICO_LEN: usize = 8;

/// Longest name fragment kept in a synthetic key.
const SYNTHETIC_NAME_MAX: usize = 60;

/// Hex characters kept from a digest-based ID.
const DIGEST_ID_LEN: usize = 16;

/// Normalise a raw company identifier to its canonical 8-digit form.
///
/// Non-digits are stripped, short values are left-padded with zeros and long
/// values are truncated to their first 8 digits. Returns `None` for input
/// without digits and for values that look like dates (a separator plus more
/// than 10 characters), since some sources put birth dates in the IČO column.
pub fn normalize_company_id(raw: &str) -> Option<String> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  if looks_like_date(raw) {
    return None;
  }

  let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
  if digits.is_empty() {
    return None;
  }

  if digits.len() >= ICO_LEN {
    Some(digits[..ICO_LEN].to_string())
  } else {
    Some(format!("{digits:0>width$}", width = ICO_LEN))
  }
}

fn looks_like_date(raw: &str) -> bool {
  raw.contains(['.', '/', '-']) && raw.chars().count() > 10
}

/// Build a name-derived fallback key such as `FIRMA-Acme_s.r.o.`.
///
/// Not globally unique: two different entities with the same name collapse
/// onto the same key. Returns `None` when `name` is blank.
pub fn synthetic_key(prefix: &str, name: &str) -> Option<String> {
  let words: Vec<&str> = name.split_whitespace().collect();
  if words.is_empty() {
    return None;
  }
  let slug: String = words.join("_").chars().take(SYNTHETIC_NAME_MAX).collect();
  Some(format!("{prefix}-{slug}"))
}

/// Build a stable ID from a digest of `parts`, e.g. `OSOBA-3f2a…`.
///
/// Parts are separated by a unit separator so `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
pub fn digest_id(prefix: &str, parts: &[&str]) -> String {
  let mut hasher = Sha256::new();
  for (i, part) in parts.iter().enumerate() {
    if i > 0 {
      hasher.update([0x1f]);
    }
    hasher.update(part.trim().as_bytes());
  }
  let digest = hex::encode(hasher.finalize());
  format!("{prefix}-{}", &digest[..DIGEST_ID_LEN])
}

/// Deterministic person ID derived from where the person was seen.
///
/// Persons have no reliable natural key, so the same name at two companies
/// yields two persons. The same person extracted again from the same source
/// and company converges on the same ID across runs.
pub fn person_id(
  source_id: &str,
  full_name: &str,
  birth_date: Option<&str>,
  company_key: Option<&str>,
) -> String {
  digest_id("OSOBA", &[
    source_id,
    &full_name.to_lowercase(),
    birth_date.unwrap_or(""),
    company_key.unwrap_or(""),
  ])
}

/// Key of a school node: `SKOLA-<name>`.
pub fn school_id(name: &str) -> Option<String> { synthetic_key("SKOLA", name) }
