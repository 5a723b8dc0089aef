//! Registr smluv (smlouvy.gov.cz) XML dumps.
//!
//! A dump is `<dump>` → `<den>`* → `<zaznam>`*; each valid `zaznam` becomes
//! one contract record with the publishing authority (`subjekt`) and the
//! counterparties (`smluvniStrana`) attached as links. Published files
//! (`prilohy/priloha`) become attachment links.

use rejstrik_core::{
  ico::normalize_company_id,
  record::{Fields, Link, LinkRole, Record, RecordKind, field},
};
use tracing::debug;

use crate::{
  ParseContext,
  strategy::ExtractStrategy,
  xml::{Document, Node},
};

pub const ISRS_NS: &str = "http://portal.gov.cz/rejstriky/ISRS/1.2/";

pub const STRATEGIES: &[&dyn ExtractStrategy] = &[&SmlouvyRecords];

/// Extracts `zaznam` records.
pub struct SmlouvyRecords;

impl ExtractStrategy for SmlouvyRecords {
  fn name(&self) -> &'static str { "smlouvy-zaznam" }

  fn extract(&self, doc: &Document, ctx: &ParseContext) -> Vec<Record> {
    let filter = ctx.filter_ico.as_deref().and_then(normalize_company_id);
    let mut skipped = 0usize;
    let mut records = Vec::new();

    for zaznam in doc.root().descendants("zaznam") {
      if zaznam.namespace().is_some_and(|ns| ns != ISRS_NS) {
        continue;
      }
      let Some(record) = contract(zaznam) else {
        skipped += 1;
        continue;
      };
      if let Some(wanted) = &filter
        && !involves(&record, wanted)
      {
        continue;
      }
      records.push(record);
    }

    if skipped > 0 {
      debug!(skipped, "invalid or incomplete zaznam elements skipped");
    }
    records
  }
}

fn contract(zaznam: Node<'_>) -> Option<Record> {
  if zaznam.child_text("platnyZaznam") != Some("1") {
    return None;
  }
  let identifikator = zaznam.child("identifikator")?;
  let smlouva = zaznam.child("smlouva")?;

  let mut fields = Fields::new();
  fields.set_text(field::ID, identifikator.child_text("idSmlouvy"));
  fields.set_text(field::VERSION_ID, identifikator.child_text("idVerze"));
  fields.set_text(field::URL, zaznam.child_text("odkaz"));
  fields.set_text(field::PUBLISHED_DATE, zaznam.child_text("casZverejneni"));
  fields.set_text(field::SUBJECT, smlouva.child_text("predmet"));
  fields.set_text(field::CONTRACT_DATE, smlouva.child_text("datumUzavreni"));
  fields.set_text(field::CONTRACT_NUMBER, smlouva.child_text("cisloSmlouvy"));
  fields.set_text(field::APPROVED_BY, smlouva.child_text("schvalil"));
  fields.set_text(field::VALUE_WITH_VAT, smlouva.child_text("hodnotaVcetneDph"));
  fields.set_text(field::VALUE_WITHOUT_VAT, smlouva.child_text("hodnotaBezDph"));
  fields.set_text(field::CURRENCY, smlouva.find_text("mena"));

  let mut record = Record::new(RecordKind::Contract, fields);
  if let Some(subjekt) = smlouva.child("subjekt") {
    record = record.with_link(Link::new(LinkRole::Authority, party(subjekt)));
  }
  for strana in smlouva.children_named("smluvniStrana") {
    record = record.with_link(Link::new(LinkRole::Contractor, party(strana)));
  }
  // Older dumps nest `prilohy` in `smlouva`, current ones in `zaznam`.
  let prilohy = smlouva.child("prilohy").or_else(|| zaznam.child("prilohy"));
  for priloha in prilohy.into_iter().flat_map(|p| p.children_named("priloha")) {
    let mut f = Fields::new();
    f.set_text(field::FILE_NAME, priloha.child_text("nazevSouboru"));
    f.set_text(field::HASH, priloha.child_text("hash"));
    f.set_text(field::URL, priloha.child_text("odkaz"));
    if !f.is_empty() {
      record = record.with_link(Link::new(LinkRole::Attachment, f));
    }
  }
  Some(record)
}

fn party(node: Node<'_>) -> Fields {
  let mut f = Fields::new();
  f.set_text(field::ICO, node.child_text("ico"));
  f.set_text(field::NAME, node.child_text("nazev"));
  f.set_text(field::ADDRESS, node.child_text("adresa"));
  f.set_text(field::DATA_BOX, node.child_text("datovaSchranka"));
  f.set_text(field::DEPARTMENT, node.child_text("utvar"));
  f
}

/// Whether `ico` is the authority or one of the contractors.
fn involves(record: &Record, ico: &str) -> bool {
  record
    .links
    .iter()
    .filter_map(|l| l.fields.text(field::ICO))
    .filter_map(normalize_company_id)
    .any(|candidate| candidate == ico)
}

#[cfg(test)]
mod tests {
  use super::*;

  const DUMP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<dump xmlns="http://portal.gov.cz/rejstriky/ISRS/1.2/">
  <den>
    <zaznam>
      <identifikator><idSmlouvy>123</idSmlouvy><idVerze>456</idVerze></identifikator>
      <odkaz>https://smlouvy.gov.cz/smlouva/456</odkaz>
      <casZverejneni>2025-11-01T08:00:00+01:00</casZverejneni>
      <smlouva>
        <subjekt>
          <ico>70886288</ico>
          <nazev>Město Kolín</nazev>
          <datovaSchranka>abc123</datovaSchranka>
        </subjekt>
        <smluvniStrana><ico>604 69 803</ico><nazev>Stavby a.s.</nazev></smluvniStrana>
        <predmet>Oprava chodníku</predmet>
        <datumUzavreni>2025-10-30</datumUzavreni>
        <hodnotaBezDph>1000000</hodnotaBezDph>
      </smlouva>
      <prilohy>
        <priloha>
          <nazevSouboru>smlouva_123.pdf</nazevSouboru>
          <hash algoritmus="sha256">ab12cd</hash>
          <odkaz>https://smlouvy.gov.cz/smlouva/soubor/1/smlouva_123.pdf</odkaz>
        </priloha>
        <priloha><nazevSouboru>dodatek.pdf</nazevSouboru></priloha>
        <priloha/>
      </prilohy>
      <platnyZaznam>1</platnyZaznam>
    </zaznam>
    <zaznam>
      <identifikator><idSmlouvy>124</idSmlouvy></identifikator>
      <smlouva><predmet>Zneplatněno</predmet></smlouva>
      <platnyZaznam>0</platnyZaznam>
    </zaznam>
    <zaznam>
      <platnyZaznam>1</platnyZaznam>
      <smlouva><predmet>Bez identifikátoru</predmet></smlouva>
    </zaznam>
  </den>
</dump>"#;

  fn parse(ctx: &ParseContext) -> Vec<Record> {
    let doc = Document::parse(DUMP.as_bytes()).unwrap();
    SmlouvyRecords.extract(&doc, ctx)
  }

  #[test]
  fn only_valid_records_are_extracted() {
    let records = parse(&ParseContext::default());
    assert_eq!(records.len(), 1);

    let r = &records[0];
    assert_eq!(r.kind, RecordKind::Contract);
    assert_eq!(r.fields.text(field::ID), Some("123"));
    assert_eq!(r.fields.text(field::VERSION_ID), Some("456"));
    assert_eq!(r.fields.number(field::VALUE_WITHOUT_VAT), Some(1_000_000.0));
    assert!(!r.fields.contains(field::VALUE_WITH_VAT));
    assert!(!r.fields.contains(field::APPROVED_BY));

    let authority = r.links(LinkRole::Authority).next().unwrap();
    assert_eq!(authority.fields.text(field::NAME), Some("Město Kolín"));
    assert_eq!(authority.fields.text(field::DATA_BOX), Some("abc123"));
    let contractor = r.links(LinkRole::Contractor).next().unwrap();
    assert_eq!(contractor.fields.text(field::ICO), Some("604 69 803"));
  }

  #[test]
  fn attachments_are_linked() {
    let records = parse(&ParseContext::default());
    let files: Vec<_> = records[0]
      .links(LinkRole::Attachment)
      .map(|l| &l.fields)
      .collect();
    assert_eq!(files.len(), 2);
    assert_eq!(files[0].text(field::FILE_NAME), Some("smlouva_123.pdf"));
    assert_eq!(files[0].text(field::HASH), Some("ab12cd"));
    assert_eq!(
      files[0].text(field::URL),
      Some("https://smlouvy.gov.cz/smlouva/soubor/1/smlouva_123.pdf")
    );
    assert_eq!(files[1].text(field::FILE_NAME), Some("dodatek.pdf"));
    assert!(!files[1].contains(field::HASH));
  }

  #[test]
  fn attachments_inside_the_contract_element() {
    let doc = Document::parse(
      br#"<dump><zaznam>
        <identifikator><idSmlouvy>9</idSmlouvy></identifikator>
        <smlouva><prilohy><priloha><hash>ff</hash></priloha></prilohy></smlouva>
        <platnyZaznam>1</platnyZaznam>
      </zaznam></dump>"#,
    )
    .unwrap();
    let records = SmlouvyRecords.extract(&doc, &ParseContext::default());
    let hashes: Vec<_> = records[0]
      .links(LinkRole::Attachment)
      .filter_map(|l| l.fields.text(field::HASH))
      .collect();
    assert_eq!(hashes, ["ff"]);
  }

  #[test]
  fn ico_filter_matches_authority_or_contractor() {
    let by = |ico: &str| {
      parse(&ParseContext { filter_ico: Some(ico.into()), ..Default::default() }).len()
    };
    assert_eq!(by("70886288"), 1);
    assert_eq!(by("60469803"), 1);
    assert_eq!(by("11111111"), 0);
  }

  #[test]
  fn foreign_namespace_is_ignored() {
    let doc = Document::parse(
      br#"<dump xmlns="urn:other"><zaznam><platnyZaznam>1</platnyZaznam></zaznam></dump>"#,
    )
    .unwrap();
    assert!(SmlouvyRecords.extract(&doc, &ParseContext::default()).is_empty());
  }
}
