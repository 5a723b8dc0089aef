//! Registr živnostenského podnikání (RZP) XML.
//!
//! RZP answers come in several shapes. The search API returns a flat list of
//! entrepreneurs (`PodnikatelSeznam`), detail exports carry the statutory
//! body (`StatutarniOrgan/Clen`), and the web export lists officers as
//! `OsobaVeFunkci` with separate `ObdobiFunkce` periods. Each shape has its
//! own strategy; all three run on every RZP document.

use rejstrik_core::{
  ico::normalize_company_id,
  record::{Fields, Link, LinkRole, Record, RecordKind, field, parse_number},
};

use crate::{
  ParseContext,
  strategy::ExtractStrategy,
  xml::{Document, Node},
};

pub const RZP_NS: &str = "urn:cz:isvs:rzp:schemas:VerejnaCast:v1";

/// Elements that carry a company identifier.
const ICO_ELEMENTS: [&str; 2] = ["IdentifikacniCislo", "IdentifikacniCisloSeznam"];

/// Elements that carry a company name.
const NAME_ELEMENTS: [&str; 2] = ["ObchodniJmeno", "ObchodniJmenoSeznam"];

/// How far the company lookup walks outward from a person.
const MAX_ANCESTOR_DEPTH: usize = 10;

pub const ROLE_STATUTORY_BODY: &str = "statutární orgán";
pub const ROLE_BODY_MEMBER: &str = "člen statutárního orgánu";
pub const ROLE_PARTNER: &str = "společník";

const FROM_ELEMENTS: [&str; 2] = ["VznikFunkce", "PlatnostOd"];
const TO_ELEMENTS: [&str; 2] = ["ZanikFunkce", "PlatnostDo"];
const PERIOD_FROM: [&str; 3] = ["Ustanoven", "DatumZapisuOd", "DatumPlatnostiOd"];
const PERIOD_TO: [&str; 3] = ["Ukoncen", "DatumZapisuDo", "DatumPlatnostiDo"];

/// Every RZP schema variant, in the order they run.
pub const STRATEGIES: &[&dyn ExtractStrategy] =
  &[&StatutoryBody, &OfficersInFunction, &Entrepreneurs];

// ─── Company context ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
struct CompanyRef<'d> {
  ico:  String,
  name: Option<&'d str>,
}

impl CompanyRef<'_> {
  fn fields(&self) -> Fields {
    let mut f = Fields::new().with_text(field::COMPANY_ICO, &self.ico);
    f.set_text(field::COMPANY_NAME, self.name);
    f
  }
}

/// Walk outward from `node` to the first element carrying a company
/// identifier, at most [`MAX_ANCESTOR_DEPTH`] levels.
fn enclosing_company(node: Node<'_>) -> Option<CompanyRef<'_>> {
  let (holder, raw) = node
    .self_and_ancestors()
    .take(MAX_ANCESTOR_DEPTH)
    .find_map(|n| n.first_child_text(&ICO_ELEMENTS).map(|raw| (n, raw)))?;
  Some(CompanyRef {
    ico:  normalize_company_id(raw)?,
    name: holder.first_child_text(&NAME_ELEMENTS),
  })
}

/// The company a detail document is about: the first identifier in the
/// document, else one taken from the file name.
fn document_company<'d>(doc: &'d Document, ctx: &ParseContext) -> Option<CompanyRef<'d>> {
  let root = doc.root();
  let ico = root
    .descendants("IdentifikacniCislo")
    .find_map(|n| n.text())
    .and_then(normalize_company_id)
    .or_else(|| ctx.document_ico.as_deref().and_then(normalize_company_id))?;
  let name = NAME_ELEMENTS.iter().find_map(|n| root.find_text(n));
  Some(CompanyRef { ico, name })
}

// ─── Person helpers ──────────────────────────────────────────────────────────

/// Split `"Jméno Příjmení"` at the first space.
fn split_name(full: &str) -> (Option<&str>, Option<&str>) {
  match full.trim().split_once(' ') {
    Some((given, family)) => (Some(given), Some(family.trim())),
    None => (Some(full.trim()), None),
  }
}

fn person_fields(
  given: Option<&str>,
  family: Option<&str>,
  full: Option<&str>,
  birth_date: Option<&str>,
) -> Option<Fields> {
  let full = match full {
    Some(f) => f.trim().to_string(),
    None => [given, family].into_iter().flatten().collect::<Vec<_>>().join(" "),
  };
  if full.trim().is_empty() {
    return None;
  }
  let mut f = Fields::new().with_text(field::FULL_NAME, &full);
  f.set_text(field::GIVEN_NAME, given);
  f.set_text(field::FAMILY_NAME, family);
  f.set_text(field::BIRTH_DATE, birth_date);
  Some(f)
}

fn function_link(
  company: &CompanyRef<'_>,
  role: &str,
  from: Option<&str>,
  to: Option<&str>,
) -> Link {
  let mut f = company.fields().with_text(field::ROLE, role);
  f.set_text(field::VALID_FROM, from);
  f.set_text(field::VALID_TO, to);
  Link::new(LinkRole::Function, f)
}

/// A statutory body member: `Jmeno`, `Prijmeni`, `DatumNarozeni`, dates.
fn member_record(clen: Node<'_>, company: &CompanyRef<'_>, role: &str) -> Option<Record> {
  let fields = person_fields(
    clen.child_text("Jmeno"),
    clen.child_text("Prijmeni"),
    None,
    clen.child_text("DatumNarozeni"),
  )?;
  Some(Record::new(RecordKind::Person, fields).with_link(function_link(
    company,
    role,
    clen.first_child_text(&FROM_ELEMENTS),
    clen.first_child_text(&TO_ELEMENTS),
  )))
}

// ─── Strategies ──────────────────────────────────────────────────────────────

/// `StatutarniOrgan/Clen` in detail exports.
pub struct StatutoryBody;

impl ExtractStrategy for StatutoryBody {
  fn name(&self) -> &'static str { "rzp-statutarni-organ" }

  fn extract(&self, doc: &Document, ctx: &ParseContext) -> Vec<Record> {
    let fallback = document_company(doc, ctx);
    let mut records = Vec::new();
    for organ in doc.root().descendants("StatutarniOrgan") {
      for clen in organ.children_named("Clen") {
        let Some(company) = enclosing_company(clen).or_else(|| fallback.clone()) else {
          continue;
        };
        records.extend(member_record(clen, &company, ROLE_STATUTORY_BODY));
      }
    }
    records
  }
}

/// `OsobaVeFunkci` with `ObdobiFunkce` periods, from the web export.
pub struct OfficersInFunction;

impl ExtractStrategy for OfficersInFunction {
  fn name(&self) -> &'static str { "rzp-osoba-ve-funkci" }

  fn extract(&self, doc: &Document, ctx: &ParseContext) -> Vec<Record> {
    let root = doc.root();
    let officers: Vec<Node<'_>> = root.descendants("OsobaVeFunkci").collect();
    if officers.is_empty() {
      return Vec::new();
    }
    // Periods sometimes sit apart from the officers, in the same order.
    let periods: Vec<Node<'_>> = root.descendants("ObdobiFunkce").collect();
    let fallback = document_company(doc, ctx);

    let mut records = Vec::new();
    for (i, officer) in officers.into_iter().enumerate() {
      let Some(full) = officer.child_text("OsobaJmenoPrijmeni") else {
        continue;
      };
      let Some(company) = enclosing_company(officer).or_else(|| fallback.clone()) else {
        continue;
      };
      let (given, family) = split_name(full);
      let Some(fields) =
        person_fields(given, family, Some(full), officer.child_text("DatumNarozeni"))
      else {
        continue;
      };

      let own = officer.child("ObdobiFunkce");
      let period = own
        .filter(|p| p.first_child_text(&PERIOD_FROM).is_some())
        .or_else(|| periods.get(i).copied())
        .or(own);
      let role = officer.child_text("VeFunkci").unwrap_or(ROLE_STATUTORY_BODY);

      records.push(Record::new(RecordKind::Person, fields).with_link(function_link(
        &company,
        role,
        period.and_then(|p| p.first_child_text(&PERIOD_FROM)),
        period.and_then(|p| p.first_child_text(&PERIOD_TO)),
      )));
    }
    records
  }
}

/// Entrepreneur lists (`PodnikatelSeznam`, `Podnikatel` or `Vysledek`) with
/// trade licences (`Zivnost/Predmet`), partners (`Spolecnik`), generic
/// relations (`Vazba`) and loose body members.
pub struct Entrepreneurs;

impl Entrepreneurs {
  const CONTAINERS: [&'static str; 3] = ["PodnikatelSeznam", "Podnikatel", "Vysledek"];

  fn entrepreneur(&self, p: Node<'_>) -> Option<Record> {
    let ico = p.first_child_text(&ICO_ELEMENTS).and_then(normalize_company_id);
    let birth = p.child_text("DatumNarozeni");
    let fields = match p.child_text("ObchodniJmenoSeznam") {
      Some(full) => {
        let (given, family) = split_name(full);
        person_fields(given, family, Some(full), birth)
      }
      None => person_fields(p.child_text("Jmeno"), p.child_text("Prijmeni"), None, birth),
    };

    let mut links = Vec::new();
    for partner in p.descendants("Spolecnik") {
      let Some(ico) = partner.child_text("IdentifikacniCislo").and_then(normalize_company_id)
      else {
        continue;
      };
      let company = CompanyRef { ico, name: partner.first_child_text(&NAME_ELEMENTS) };
      let from = partner.child_text("PlatnostOd");
      let to = partner.child_text("PlatnostDo");
      links.push(function_link(&company, ROLE_PARTNER, from, to));
      if let Some(share) = partner.child_text("Podil").and_then(parse_number) {
        let mut f = company.fields();
        f.set_number(field::SHARE_PERCENT, Some(share));
        f.set_text(field::VALID_FROM, from);
        f.set_text(field::VALID_TO, to);
        links.push(Link::new(LinkRole::Ownership, f));
      }
    }
    for relation in p.descendants("Vazba") {
      let ico = relation.child_text("IdentifikacniCislo").and_then(normalize_company_id);
      let role = relation.child_text("Role");
      if let (Some(ico), Some(role)) = (ico, role) {
        let company = CompanyRef { ico, name: relation.first_child_text(&NAME_ELEMENTS) };
        links.push(function_link(
          &company,
          &role.to_lowercase(),
          relation.child_text("PlatnostOd"),
          relation.child_text("PlatnostDo"),
        ));
      }
    }

    if ico.is_none() && fields.is_none() && links.is_empty() {
      return None;
    }
    let mut fields = fields.unwrap_or_default();
    fields.set_text(field::ICO, ico);
    fields.set_text(field::ADDRESS, address(p));
    fields.set_list(
      field::TRADES,
      p.descendants("Zivnost").filter_map(|z| z.child_text("Predmet")),
    );
    let mut record = Record::new(RecordKind::Person, fields);
    record.links = links;
    Some(record)
  }
}

impl ExtractStrategy for Entrepreneurs {
  fn name(&self) -> &'static str { "rzp-podnikatel" }

  fn extract(&self, doc: &Document, _ctx: &ParseContext) -> Vec<Record> {
    let root = doc.root();
    let entrepreneurs: Vec<Node<'_>> = Self::CONTAINERS
      .iter()
      .map(|name| root.descendants(name).collect::<Vec<_>>())
      .find(|found| !found.is_empty())
      .unwrap_or_default();

    let mut records = Vec::new();
    for p in entrepreneurs {
      records.extend(self.entrepreneur(p));
      // Members outside a StatutarniOrgan are not seen by StatutoryBody.
      for clen in p.descendants("Clen").filter(|c| !c.has_ancestor("StatutarniOrgan")) {
        if let Some(company) = enclosing_company(clen) {
          records.extend(member_record(clen, &company, ROLE_BODY_MEMBER));
        }
      }
    }
    records
  }
}

/// `AdresaPodnikaniSeznam`, else the street/postcode/city parts of the seat.
fn address(p: Node<'_>) -> Option<String> {
  if let Some(a) = p.child_text("AdresaPodnikaniSeznam") {
    return Some(a.to_string());
  }
  [["SidloUlice", "SidloPsc", "SidloMesto"], ["Ulice", "Psc", "Mesto"]]
    .iter()
    .map(|parts| parts.iter().filter_map(|n| p.child_text(n)).collect::<Vec<_>>())
    .find(|found| !found.is_empty())
    .map(|found| found.join(", "))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::strategy::run_strategies;

  fn run(xml: &str, ctx: &ParseContext) -> Vec<Record> {
    let doc = Document::parse(xml.as_bytes()).unwrap();
    run_strategies(STRATEGIES, &doc, ctx)
  }

  fn function(r: &Record) -> &Fields { &r.links(LinkRole::Function).next().unwrap().fields }

  #[test]
  fn statutory_body_members_use_the_enclosing_company() {
    let xml = r#"<VerejnaCast xmlns="urn:cz:isvs:rzp:schemas:VerejnaCast:v1">
      <Firma>
        <IdentifikacniCislo>47114983</IdentifikacniCislo>
        <ObchodniJmeno>Česká pošta, s.p.</ObchodniJmeno>
        <Organy>
          <StatutarniOrgan>
            <Clen>
              <Jmeno>Jan</Jmeno><Prijmeni>Novák</Prijmeni>
              <DatumNarozeni>1970-01-01</DatumNarozeni>
              <VznikFunkce>2015-02-01</VznikFunkce>
            </Clen>
            <Clen><Jmeno>Eva</Jmeno><Prijmeni>Malá</Prijmeni></Clen>
          </StatutarniOrgan>
        </Organy>
      </Firma>
    </VerejnaCast>"#;
    let records = run(xml, &ParseContext::default());
    assert_eq!(records.len(), 2);

    let jan = &records[0];
    assert_eq!(jan.fields.text(field::FULL_NAME), Some("Jan Novák"));
    assert_eq!(jan.fields.text(field::BIRTH_DATE), Some("1970-01-01"));
    let f = function(jan);
    assert_eq!(f.text(field::COMPANY_ICO), Some("47114983"));
    assert_eq!(f.text(field::COMPANY_NAME), Some("Česká pošta, s.p."));
    assert_eq!(f.text(field::ROLE), Some(ROLE_STATUTORY_BODY));
    assert_eq!(f.text(field::VALID_FROM), Some("2015-02-01"));
    assert!(!function(&records[1]).contains(field::VALID_FROM));
  }

  #[test]
  fn company_lookup_is_bounded() {
    // The identifier sits eleven levels above the member.
    let mut xml = String::from("<r><IdentifikacniCislo>47114983</IdentifikacniCislo>");
    for _ in 0..9 {
      xml.push_str("<w>");
    }
    xml.push_str("<StatutarniOrgan><Clen><Jmeno>Jan</Jmeno></Clen></StatutarniOrgan>");
    for _ in 0..9 {
      xml.push_str("</w>");
    }
    xml.push_str("</r>");
    let doc = Document::parse(xml.as_bytes()).unwrap();
    let clen = doc.root().find("Clen").unwrap();
    assert_eq!(enclosing_company(clen), None);
    // the document-level fallback still finds it
    let records = StatutoryBody.extract(&doc, &ParseContext::default());
    assert_eq!(function(&records[0]).text(field::COMPANY_ICO), Some("47114983"));
  }

  #[test]
  fn officers_take_ico_from_the_file_name_and_periods_by_position() {
    let xml = r#"<Vypis>
      <ObchodniJmeno>Stavby a.s.</ObchodniJmeno>
      <Osoby>
        <OsobaVeFunkci><OsobaJmenoPrijmeni>Jan Novák</OsobaJmenoPrijmeni>
          <VeFunkci>jednatel</VeFunkci></OsobaVeFunkci>
        <OsobaVeFunkci><OsobaJmenoPrijmeni>Eva Malá</OsobaJmenoPrijmeni></OsobaVeFunkci>
      </Osoby>
      <Obdobi>
        <ObdobiFunkce><Ustanoven>01.02.2015</Ustanoven></ObdobiFunkce>
        <ObdobiFunkce><DatumZapisuOd>2018-01-01</DatumZapisuOd>
          <DatumZapisuDo>2020-01-01</DatumZapisuDo></ObdobiFunkce>
      </Obdobi>
    </Vypis>"#;
    let ctx = ParseContext { document_ico: Some("60469803".into()), ..Default::default() };
    let records = run(xml, &ctx);
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].fields.text(field::GIVEN_NAME), Some("Jan"));
    assert_eq!(records[0].fields.text(field::FAMILY_NAME), Some("Novák"));
    let jan = function(&records[0]);
    assert_eq!(jan.text(field::COMPANY_ICO), Some("60469803"));
    assert_eq!(jan.text(field::COMPANY_NAME), Some("Stavby a.s."));
    assert_eq!(jan.text(field::ROLE), Some("jednatel"));
    assert_eq!(jan.text(field::VALID_FROM), Some("01.02.2015"));

    let eva = function(&records[1]);
    assert_eq!(eva.text(field::ROLE), Some(ROLE_STATUTORY_BODY));
    assert_eq!(eva.text(field::VALID_TO), Some("2020-01-01"));
  }

  #[test]
  fn entrepreneur_list_with_partners_and_relations() {
    let xml = r#"<Odpoved>
      <PodnikatelSeznam>
        <IdentifikacniCisloSeznam>12345678</IdentifikacniCisloSeznam>
        <ObchodniJmenoSeznam>Jan Novák</ObchodniJmenoSeznam>
        <AdresaPodnikaniSeznam>Hlavní 1, 110 00, Praha</AdresaPodnikaniSeznam>
        <Spolecnik>
          <IdentifikacniCislo>87654321</IdentifikacniCislo>
          <Podil>33,3 %</Podil>
        </Spolecnik>
        <Vazba><IdentifikacniCislo>11111111</IdentifikacniCislo><Role>Prokurista</Role></Vazba>
        <Vazba><IdentifikacniCislo>22222222</IdentifikacniCislo></Vazba>
      </PodnikatelSeznam>
    </Odpoved>"#;
    let records = run(xml, &ParseContext::default());
    assert_eq!(records.len(), 1);

    let p = &records[0];
    assert_eq!(p.fields.text(field::ICO), Some("12345678"));
    assert_eq!(p.fields.text(field::ADDRESS), Some("Hlavní 1, 110 00, Praha"));
    let roles: Vec<_> = p
      .links(LinkRole::Function)
      .filter_map(|l| l.fields.text(field::ROLE))
      .collect();
    assert_eq!(roles, [ROLE_PARTNER, "prokurista"]);
    let share = p.links(LinkRole::Ownership).next().unwrap();
    assert_eq!(share.fields.number(field::SHARE_PERCENT), Some(33.3));
    assert_eq!(share.fields.text(field::COMPANY_ICO), Some("87654321"));
  }

  #[test]
  fn trade_subjects_are_collected() {
    let xml = r#"<Odpoved><PodnikatelSeznam>
      <IdentifikacniCisloSeznam>12345678</IdentifikacniCisloSeznam>
      <Zivnosti>
        <Zivnost><Predmet>Hostinská činnost</Predmet></Zivnost>
        <Zivnost><Predmet> </Predmet></Zivnost>
        <Zivnost><Predmet>Zámečnictví, nástrojářství</Predmet></Zivnost>
      </Zivnosti>
    </PodnikatelSeznam></Odpoved>"#;
    let records = run(xml, &ParseContext::default());
    assert_eq!(records.len(), 1);
    assert_eq!(
      records[0].fields.list(field::TRADES),
      Some(&["Hostinská činnost".to_string(), "Zámečnictví, nástrojářství".to_string()][..])
    );
    // An entrepreneur without a name still keeps its IČO.
    assert!(!records[0].fields.contains(field::FULL_NAME));
    assert_eq!(records[0].fields.text(field::ICO), Some("12345678"));
  }

  #[test]
  fn loose_members_become_their_own_people() {
    let xml = r#"<Odpoved><Podnikatel>
      <IdentifikacniCislo>12345678</IdentifikacniCislo>
      <Jmeno>Jan</Jmeno><Prijmeni>Novák</Prijmeni>
      <SidloUlice>Hlavní 1</SidloUlice><SidloMesto>Praha</SidloMesto>
      <Clen><Jmeno>Eva</Jmeno><Prijmeni>Malá</Prijmeni></Clen>
    </Podnikatel></Odpoved>"#;
    let records = run(xml, &ParseContext::default());
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].fields.text(field::ADDRESS), Some("Hlavní 1, Praha"));
    assert_eq!(records[1].fields.text(field::FULL_NAME), Some("Eva Malá"));
    let f = function(&records[1]);
    assert_eq!(f.text(field::ROLE), Some(ROLE_BODY_MEMBER));
    assert_eq!(f.text(field::COMPANY_ICO), Some("12345678"));
  }
}
