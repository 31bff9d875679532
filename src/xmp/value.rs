//! Value shapes a mapping rule can produce, and their conversion into XMP
//! document fragments.

use xmltree::{AttributeName, Element, XMLNode};

use super::{qelement, Ns, RDF, XML_NS_URI};

/// The result of a value transform: exactly one shape per produced value.
///
/// The shapes mirror the XMP array kinds — `LangAlt` becomes an `rdf:Alt`
/// language alternative, `Bag` an unordered `rdf:Bag`, `Seq` an
/// order-preserving `rdf:Seq`. `Node` and `Attr` carry pre-built fragments
/// for the rules that compose their output directly.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A plain scalar, written as text content or an attribute value.
    Text(String),
    /// Language-tagged alternatives: `(language tag, text)` pairs.
    LangAlt(Vec<(String, String)>),
    /// Unordered collection (`rdf:Bag`).
    Bag(Vec<String>),
    /// Ordered collection (`rdf:Seq`).
    Seq(Vec<String>),
    /// A pre-built element, appended as-is.
    Node(Element),
    /// A pre-built attribute.
    Attr(AttributeName, String),
}

impl FieldValue {
    /// Convert this value into the element to append for an element-target
    /// destination. `Node` values already carry their own tag; everything
    /// else is wrapped in a fresh `ns:local` element.
    pub fn into_element(self, ns: &Ns, local: &str) -> Element {
        match self {
            FieldValue::Node(element) => element,
            FieldValue::Text(text) | FieldValue::Attr(_, text) => {
                let mut element = qelement(ns, local);
                element.children.push(XMLNode::Text(text));
                element
            }
            FieldValue::LangAlt(alternatives) => {
                let mut alt = qelement(&RDF, "Alt");
                for (lang, text) in alternatives {
                    let mut li = list_item(text);
                    li.attributes.insert(
                        AttributeName {
                            local_name: "lang".to_string(),
                            namespace: Some(XML_NS_URI.to_string()),
                            prefix: Some("xml".to_string()),
                        },
                        lang,
                    );
                    alt.children.push(XMLNode::Element(li));
                }
                wrap(ns, local, alt)
            }
            FieldValue::Bag(items) => wrap(ns, local, collection("Bag", items)),
            FieldValue::Seq(items) => wrap(ns, local, collection("Seq", items)),
        }
    }
}

fn list_item(text: String) -> Element {
    let mut li = qelement(&RDF, "li");
    li.children.push(XMLNode::Text(text));
    li
}

fn collection(kind: &str, items: Vec<String>) -> Element {
    let mut container = qelement(&RDF, kind);
    for item in items {
        container.children.push(XMLNode::Element(list_item(item)));
    }
    container
}

fn wrap(ns: &Ns, local: &str, inner: Element) -> Element {
    let mut element = qelement(ns, local);
    element.children.push(XMLNode::Element(inner));
    element
}
