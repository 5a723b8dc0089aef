//! A small read-only XML tree.
//!
//! Registry payloads are queried in ways a streaming reader makes awkward:
//! walking outward from a person to the company that owns the statutory body,
//! or falling back to a breadth-first search when an element is not where the
//! schema variant usually puts it. Documents are therefore read once with
//! `quick-xml` into an arena of elements with parent links.
//!
//! Element names are compared by local name; the resolved namespace URI is
//! kept for callers that need to check it.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use quick_xml::{
  NsReader,
  events::{BytesStart, Event},
  name::{Namespace, ResolveResult},
};

use crate::error::{Error, Result};

// ─── Decoding ────────────────────────────────────────────────────────────────

/// Decode raw document bytes to UTF-8.
///
/// A byte-order mark wins; otherwise the `encoding` pseudo-attribute of the
/// XML declaration is honoured (e.g. `windows-1250`); otherwise UTF-8.
pub fn decode(bytes: &[u8]) -> Result<Cow<'_, str>> {
  let (encoding, body) = match Encoding::for_bom(bytes) {
    Some((encoding, bom_len)) => (encoding, &bytes[bom_len..]),
    None => {
      let encoding = match declared_encoding(bytes) {
        Some(label) => Encoding::for_label(label.as_bytes())
          .ok_or_else(|| Error::Encoding(label.clone()))?,
        None => UTF_8,
      };
      (encoding, bytes)
    }
  };
  let (text, had_errors) = encoding.decode_without_bom_handling(body);
  if had_errors {
    return Err(Error::Encoding(format!("invalid {} data", encoding.name())));
  }
  Ok(text)
}

/// The encoding label from `<?xml ... encoding="..."?>`, if any.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
  let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
  let decl = head.trim_start().strip_prefix("<?xml")?;
  let decl = &decl[..decl.find("?>")?];
  let rest = &decl[decl.find("encoding")? + "encoding".len()..];
  let rest = rest.trim_start().strip_prefix('=')?.trim_start();
  let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
  let value = &rest[1..];
  Some(value[..value.find(quote)?].trim().to_string())
}

// ─── Tree ────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Element {
  name:      String,
  namespace: Option<String>,
  text:      String,
  parent:    Option<usize>,
  children:  Vec<usize>,
  depth:     usize,
  /// One past the last descendant; elements are stored in document order.
  end:       usize,
}

/// A parsed XML document.
#[derive(Debug)]
pub struct Document {
  elements: Vec<Element>,
}

impl Document {
  /// Decode and parse `bytes`.
  pub fn parse(bytes: &[u8]) -> Result<Self> {
    let text = decode(bytes)?;
    Self::parse_str(&text)
  }

  pub fn parse_str(text: &str) -> Result<Self> {
    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut elements: Vec<Element> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();

    loop {
      match reader.read_resolved_event() {
        Ok((ns, Event::Start(e))) => {
          let id = open(&mut elements, &stack, ns, &e);
          stack.push(id);
        }
        Ok((ns, Event::Empty(e))) => {
          let id = open(&mut elements, &stack, ns, &e);
          elements[id].end = elements.len();
        }
        Ok((_, Event::End(_))) => {
          if let Some(id) = stack.pop() {
            elements[id].end = elements.len();
          }
        }
        Ok((_, Event::Text(t))) => {
          if let Some(&id) = stack.last() {
            let text = t
              .unescape()
              .map(Cow::into_owned)
              .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
            elements[id].text.push_str(&text);
          }
        }
        Ok((_, Event::CData(c))) => {
          if let Some(&id) = stack.last() {
            elements[id].text.push_str(&String::from_utf8_lossy(&c));
          }
        }
        Ok((_, Event::Eof)) => break,
        Ok(_) => {}
        Err(e) => return Err(Error::Xml(e.to_string())),
      }
    }

    if elements.is_empty() {
      return Err(Error::EmptyDocument);
    }
    if !stack.is_empty() {
      return Err(Error::Xml("unexpected end of document".into()));
    }
    Ok(Self { elements })
  }

  pub fn root(&self) -> Node<'_> { Node { doc: self, id: 0 } }
}

fn open(
  elements: &mut Vec<Element>,
  stack: &[usize],
  ns: ResolveResult<'_>,
  start: &BytesStart<'_>,
) -> usize {
  let id = elements.len();
  let parent = stack.last().copied();
  let namespace = match ns {
    ResolveResult::Bound(Namespace(uri)) => {
      Some(String::from_utf8_lossy(uri).into_owned())
    }
    _ => None,
  };
  elements.push(Element {
    name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
    namespace,
    text: String::new(),
    parent,
    children: Vec::new(),
    depth: stack.len(),
    end: id + 1,
  });
  if let Some(p) = parent {
    elements[p].children.push(id);
  }
  id
}

// ─── Node handle ─────────────────────────────────────────────────────────────

/// A borrowed handle to one element.
#[derive(Clone, Copy)]
pub struct Node<'d> {
  doc: &'d Document,
  id:  usize,
}

impl std::fmt::Debug for Node<'_> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "<{}>", self.name())
  }
}

impl PartialEq for Node<'_> {
  fn eq(&self, other: &Self) -> bool {
    std::ptr::eq(self.doc, other.doc) && self.id == other.id
  }
}

impl<'d> Node<'d> {
  fn element(self) -> &'d Element { &self.doc.elements[self.id] }

  fn at(self, id: usize) -> Node<'d> { Node { doc: self.doc, id } }

  /// Local name, without any prefix.
  pub fn name(self) -> &'d str { &self.element().name }

  pub fn namespace(self) -> Option<&'d str> { self.element().namespace.as_deref() }

  /// Trimmed text content; `None` when blank.
  pub fn text(self) -> Option<&'d str> {
    let t = self.element().text.trim();
    (!t.is_empty()).then_some(t)
  }

  pub fn parent(self) -> Option<Node<'d>> {
    self.element().parent.map(|p| self.at(p))
  }

  pub fn children(self) -> impl Iterator<Item = Node<'d>> + 'd {
    let doc = self.doc;
    self.element().children.iter().map(move |&id| Node { doc, id })
  }

  /// Direct children named `name`.
  pub fn children_named<'n>(self, name: &'n str) -> impl Iterator<Item = Node<'d>> + 'n
  where
    'd: 'n,
  {
    self.children().filter(move |c| c.name() == name)
  }

  pub fn child(self, name: &str) -> Option<Node<'d>> {
    self.children().find(|c| c.name() == name)
  }

  pub fn child_text(self, name: &str) -> Option<&'d str> {
    self.child(name).and_then(|c| c.text())
  }

  /// Text of the first direct child among `names` that has any.
  pub fn first_child_text(self, names: &[&str]) -> Option<&'d str> {
    names.iter().find_map(|n| self.child_text(n))
  }

  /// All descendants named `name`, in document order.
  pub fn descendants<'n>(self, name: &'n str) -> impl Iterator<Item = Node<'d>> + 'n
  where
    'd: 'n,
  {
    let doc = self.doc;
    (self.id + 1..self.element().end)
      .map(move |id| Node { doc, id })
      .filter(move |n| n.name() == name)
  }

  /// The direct child named `name`, else the shallowest descendant of that
  /// name (breadth-first; document order breaks ties).
  pub fn find(self, name: &str) -> Option<Node<'d>> {
    self
      .child(name)
      .or_else(|| self.descendants(name).min_by_key(|n| n.element().depth))
  }

  pub fn find_text(self, name: &str) -> Option<&'d str> {
    self.find(name).and_then(|n| n.text())
  }

  /// This element followed by its ancestors, innermost first.
  pub fn self_and_ancestors(self) -> impl Iterator<Item = Node<'d>> + 'd {
    std::iter::successors(Some(self), |n| n.parent())
  }

  /// Whether any ancestor is named `name`.
  pub fn has_ancestor(self, name: &str) -> bool {
    self.self_and_ancestors().skip(1).any(|a| a.name() == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  const NS: &str = "urn:test";

  fn doc(xml: &str) -> Document { Document::parse(xml.as_bytes()).unwrap() }

  #[test]
  fn local_names_and_namespaces() {
    let d = doc(r#"<r:root xmlns:r="urn:test"><r:a>1</r:a><b>2</b></r:root>"#);
    let root = d.root();
    assert_eq!(root.name(), "root");
    assert_eq!(root.namespace(), Some(NS));
    assert_eq!(root.child_text("a"), Some("1"));
    assert_eq!(root.child("b").unwrap().namespace(), None);
  }

  #[test]
  fn default_namespace_applies_to_children() {
    let d = doc(r#"<root xmlns="urn:test"><a>x</a></root>"#);
    assert_eq!(d.root().child("a").unwrap().namespace(), Some(NS));
  }

  #[test]
  fn find_prefers_the_shallowest_match() {
    let d = doc("<r><x><y><n>deep</n></y></x><z><n>shallow</n></z></r>");
    assert_eq!(d.root().find_text("n"), Some("shallow"));
    let all: Vec<_> = d.root().descendants("n").filter_map(|n| n.text()).collect();
    assert_eq!(all, ["deep", "shallow"]);
  }

  #[test]
  fn empty_elements_and_blank_text() {
    let d = doc("<r><a/><b>   </b><c>&amp;</c></r>");
    let r = d.root();
    assert!(r.child("a").is_some());
    assert_eq!(r.child_text("a"), None);
    assert_eq!(r.child_text("b"), None);
    assert_eq!(r.child_text("c"), Some("&"));
    assert_eq!(r.first_child_text(&["a", "b", "c"]), Some("&"));
  }

  #[test]
  fn ancestors_walk_outward() {
    let d = doc("<a><b><c/></b></a>");
    let c = d.root().find("c").unwrap();
    let names: Vec<_> = c.self_and_ancestors().map(|n| n.name()).collect();
    assert_eq!(names, ["c", "b", "a"]);
    assert!(c.has_ancestor("a"));
    assert!(!c.has_ancestor("c"));
  }

  #[test]
  fn declared_windows_1250_is_decoded() {
    let mut bytes = br#"<?xml version="1.0" encoding="windows-1250"?><r>"#.to_vec();
    // "Novák" with á = 0xE1, "Šťastný" with Š = 0x8A, ť = 0x9D, ý = 0xFD
    bytes.extend_from_slice(b"Nov\xe1k \x8a\x9dastn\xfd");
    bytes.extend_from_slice(b"</r>");
    let d = Document::parse(&bytes).unwrap();
    assert_eq!(d.root().text(), Some("Novák Šťastný"));
  }

  #[test]
  fn malformed_documents_are_errors() {
    assert!(matches!(Document::parse(b"<a><b></a>"), Err(Error::Xml(_))));
    assert!(matches!(Document::parse(b"<a>"), Err(Error::Xml(_))));
    assert!(matches!(Document::parse(b""), Err(Error::EmptyDocument)));
    assert!(matches!(
      Document::parse(br#"<?xml version="1.0" encoding="x-klingon"?><a/>"#),
      Err(Error::Encoding(_))
    ));
  }
}
