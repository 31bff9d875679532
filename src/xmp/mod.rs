//! XMP document access on top of the `xmltree` DOM.
//!
//! This module knows how to find the two structural anchors of an AfterShot
//! Pro sidecar — the `rdf:Description` metadata container and the vendor's
//! `blay:options` settings block — and provides the namespace-qualified
//! attribute and element helpers the mapping rules are written against.
//!
//! AfterShot keeps one `blay:options` block per saved version of an image.
//! When several versions exist, the last block in document order is the
//! newest and is the authoritative one.

use std::collections::HashMap;
use std::io::Write;

use xmltree::{AttributeName, Element, EmitterConfig, Namespace, XMLNode};

pub mod value;

/// A fixed prefix/URI pair for one of the schemas the converter writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ns {
    pub prefix: &'static str,
    pub uri: &'static str,
}

pub const TIFF: Ns = Ns { prefix: "tiff", uri: "http://ns.adobe.com/tiff/1.0/" };
pub const EXIF: Ns = Ns { prefix: "exif", uri: "http://ns.adobe.com/exif/1.0/" };
pub const PHOTOSHOP: Ns = Ns { prefix: "photoshop", uri: "http://ns.adobe.com/photoshop/1.0/" };
pub const IPTC4XMP_CORE: Ns = Ns { prefix: "Iptc4xmpCore", uri: "http://iptc.org/std/Iptc4xmpCore/1.0/xmlns/" };
pub const XMP: Ns = Ns { prefix: "xmp", uri: "http://ns.adobe.com/xap/1.0/" };
pub const XMP_RIGHTS: Ns = Ns { prefix: "xmpRights", uri: "http://ns.adobe.com/xap/1.0/rights/" };
pub const DC: Ns = Ns { prefix: "dc", uri: "http://purl.org/dc/elements/1.1/" };
pub const LR: Ns = Ns { prefix: "lr", uri: "http://ns.adobe.com/lightroom/1.0/" };

/// Every schema the rule set writes into; declared on `rdf:Description`
/// before any rule runs.
pub const STANDARD_NAMESPACES: &[Ns] =
    &[TIFF, EXIF, PHOTOSHOP, IPTC4XMP_CORE, XMP, XMP_RIGHTS, DC, LR];

pub const RDF: Ns = Ns { prefix: "rdf", uri: "http://www.w3.org/1999/02/22-rdf-syntax-ns#" };
pub(crate) const XML_NS_URI: &str = "http://www.w3.org/XML/1998/namespace";

// AfterShot Pro (Bibble) vendor namespaces.
const BLAY: Ns = Ns { prefix: "blay", uri: "http://ns.bibblelabs.com/BibbleLayers/5.0/" };
const BOPT: Ns = Ns { prefix: "bopt", uri: "http://ns.bibblelabs.com/BibbleOpt/5.0/" };

/// Build a namespace-qualified attribute name.
pub(crate) fn qattr(ns: &Ns, local: &str) -> AttributeName {
    AttributeName {
        local_name: local.to_string(),
        namespace: Some(ns.uri.to_string()),
        prefix: Some(ns.prefix.to_string()),
    }
}

/// Build an empty namespace-qualified element.
pub(crate) fn qelement(ns: &Ns, local: &str) -> Element {
    let mut element = Element::new(local);
    element.prefix = Some(ns.prefix.to_string());
    element.namespace = Some(ns.uri.to_string());
    element
}

/// True when a parsed name belongs to `ns`. The namespace URI is
/// authoritative; the prefix is a fallback for documents that never declared
/// the namespace.
fn name_matches(prefix: Option<&str>, namespace: Option<&str>, ns: &Ns) -> bool {
    match namespace {
        Some(uri) => uri == ns.uri,
        None => prefix == Some(ns.prefix),
    }
}

fn element_is(element: &Element, ns: &Ns, local: &str) -> bool {
    element.name == local
        && name_matches(element.prefix.as_deref(), element.namespace.as_deref(), ns)
}

/// Find the first `rdf:Description` anywhere in the tree.
pub fn find_description(root: &Element) -> Option<&Element> {
    find_first(root, &|e| element_is(e, &RDF, "Description"))
}

/// Mutable variant of [`find_description`].
pub fn find_description_mut(root: &mut Element) -> Option<&mut Element> {
    find_first_mut(root, &|e| element_is(e, &RDF, "Description"))
}

fn find_first<'a>(element: &'a Element, pred: &dyn Fn(&Element) -> bool) -> Option<&'a Element> {
    if pred(element) {
        return Some(element);
    }
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .find_map(|child| find_first(child, pred))
}

fn find_first_mut<'a>(
    element: &'a mut Element,
    pred: &dyn Fn(&Element) -> bool,
) -> Option<&'a mut Element> {
    if pred(element) {
        return Some(element);
    }
    for child in element.children.iter_mut() {
        if let XMLNode::Element(child) = child {
            if let Some(found) = find_first_mut(child, pred) {
                return Some(found);
            }
        }
    }
    None
}

/// The flat key→value attribute set of one vendor settings block, detached
/// from the document so rules can mutate the tree while reading from it.
#[derive(Debug, Clone, Default)]
pub struct VendorBlock {
    fields: HashMap<String, String>,
}

impl VendorBlock {
    /// Extract the authoritative vendor block from a parsed document.
    ///
    /// Returns `None` when the document contains no `blay:options` element.
    /// With multiple revisions, the last block in document order wins.
    pub fn extract(root: &Element) -> Option<VendorBlock> {
        let mut blocks = Vec::new();
        collect_matching(root, &|e| element_is(e, &BLAY, "options"), &mut blocks);
        let newest = blocks.last()?;

        let fields = newest
            .attributes
            .iter()
            .filter(|(key, _)| {
                name_matches(key.prefix.as_deref(), key.namespace.as_deref(), &BOPT)
            })
            .map(|(key, value)| (key.local_name.clone(), value.clone()))
            .collect();
        Some(VendorBlock { fields })
    }

    /// Build a block directly from field/value pairs. Useful for exercising
    /// rules against synthetic input.
    pub fn from_fields<'a, I>(pairs: I) -> VendorBlock
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        VendorBlock {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Look up a vendor field by its local name.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn collect_matching<'a>(
    element: &'a Element,
    pred: &dyn Fn(&Element) -> bool,
    out: &mut Vec<&'a Element>,
) {
    if pred(element) {
        out.push(element);
    }
    for child in element.children.iter().filter_map(XMLNode::as_element) {
        collect_matching(child, pred, out);
    }
}

/// Declare every standard namespace on the container element. Declaring an
/// already-declared prefix is a no-op, so this is safe to run on files the
/// converter has already touched.
pub fn ensure_namespaces(container: &mut Element) {
    let declared = container.namespaces.get_or_insert_with(Namespace::empty);
    for ns in STANDARD_NAMESPACES {
        if declared.get(ns.prefix).is_none() {
            declared.put(ns.prefix, ns.uri);
        }
    }
}

/// Read a namespace-qualified attribute.
pub(crate) fn get_attribute<'a>(element: &'a Element, ns: &Ns, local: &str) -> Option<&'a str> {
    element
        .attributes
        .iter()
        .find(|(key, _)| {
            key.local_name == local
                && name_matches(key.prefix.as_deref(), key.namespace.as_deref(), ns)
        })
        .map(|(_, value)| value.as_str())
}

pub(crate) fn has_attribute(element: &Element, ns: &Ns, local: &str) -> bool {
    get_attribute(element, ns, local).is_some()
}

/// Set a namespace-qualified attribute, replacing any previous value.
pub(crate) fn set_attribute(element: &mut Element, ns: &Ns, local: &str, value: String) {
    // Insert first: with an identical key this replaces the value in place,
    // keeping the attribute's position stable across reruns.
    let previous = element.attributes.insert(qattr(ns, local), value);
    if previous.is_none() {
        // A same-named attribute may still exist under a mismatched key
        // (e.g. declared with a different prefix). Drop any duplicates.
        let keep = qattr(ns, local);
        element.attributes.retain(|key, _| {
            *key == keep
                || !(key.local_name == local
                    && name_matches(key.prefix.as_deref(), key.namespace.as_deref(), ns))
        });
    }
}

/// True when the element has at least one child with the given tag.
pub(crate) fn has_child(element: &Element, ns: &Ns, local: &str) -> bool {
    element
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .any(|child| element_is(child, ns, local))
}

/// Remove every child with the given tag. Destinations hold at most one
/// child per tag, so a rewrite always starts from a clean slate.
pub(crate) fn remove_children(element: &mut Element, ns: &Ns, local: &str) {
    element.children.retain(|node| match node.as_element() {
        Some(child) => !element_is(child, ns, local),
        None => true,
    });
}

/// Drop whitespace-only text nodes so the pretty-printer starts from a
/// blank-line-free tree.
pub fn strip_whitespace_text(element: &mut Element) {
    element
        .children
        .retain(|node| !matches!(node, XMLNode::Text(text) if text.trim().is_empty()));
    for child in element.children.iter_mut() {
        if let XMLNode::Element(child) = child {
            strip_whitespace_text(child);
        }
    }
}

/// Serialize with stable two-space indentation.
pub fn write_pretty<W: Write>(root: &Element, writer: W) -> Result<(), xmltree::Error> {
    root.write_with_config(writer, EmitterConfig::new().perform_indent(true))
}
