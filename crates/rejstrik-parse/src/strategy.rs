//! Pluggable extraction strategies for XML payloads.
//!
//! One source can publish several schema variants. Each variant gets its own
//! [`ExtractStrategy`]; a format runs its strategies in order and concatenates
//! what they find.

use rejstrik_core::record::Record;
use tracing::debug;

use crate::{ParseContext, xml::Document};

/// Extracts candidate records from one parsed document.
pub trait ExtractStrategy: Send + Sync {
  /// Short name used in logs.
  fn name(&self) -> &'static str;

  fn extract(&self, doc: &Document, ctx: &ParseContext) -> Vec<Record>;
}

/// Run one strategy, logging how much it found.
pub fn run_strategy(
  strategy: &dyn ExtractStrategy,
  doc: &Document,
  ctx: &ParseContext,
) -> Vec<Record> {
  let found = strategy.extract(doc, ctx);
  debug!(strategy = strategy.name(), records = found.len(), "strategy finished");
  found
}

/// Run `strategies` in order and concatenate their results.
pub fn run_strategies(
  strategies: &[&dyn ExtractStrategy],
  doc: &Document,
  ctx: &ParseContext,
) -> Vec<Record> {
  strategies.iter().flat_map(|s| run_strategy(*s, doc, ctx)).collect()
}

#[cfg(test)]
mod tests {
  use rejstrik_core::record::{Fields, RecordKind, field};

  use super::*;

  struct Fixed(&'static str);

  impl ExtractStrategy for Fixed {
    fn name(&self) -> &'static str { self.0 }

    fn extract(&self, _doc: &Document, _ctx: &ParseContext) -> Vec<Record> {
      vec![Record::new(
        RecordKind::Company,
        Fields::new().with_text(field::NAME, self.0),
      )]
    }
  }

  #[test]
  fn results_are_concatenated_in_order() {
    let doc = Document::parse(b"<r/>").unwrap();
    let records = run_strategies(
      &[&Fixed("first"), &Fixed("second")],
      &doc,
      &ParseContext::default(),
    );
    let names: Vec<_> = records.iter().filter_map(|r| r.fields.text(field::NAME)).collect();
    assert_eq!(names, ["first", "second"]);
  }
}
