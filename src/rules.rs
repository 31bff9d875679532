//! The field-transfer engine: a declarative mapping table from AfterShot Pro
//! vendor attributes to standard XMP fields, plus the runtime that applies
//! each rule against a parsed document.
//!
//! Most mappings are a [`Transfer`] record — source field, destination
//! locator, transform function. Two mappings cannot be expressed that way
//! and are registered as custom rules: the composite creator-contact-info
//! block and the rating/rejection fusion.
//!
//! All rules share the same contract: a missing or empty source field is a
//! silent no-op, and an already-populated destination blocks the write
//! unless `overwrite` is requested. Re-running the converter without
//! `overwrite` therefore never clobbers manually edited fields.

use xmltree::{Element, XMLNode};

use crate::error::RuleError;
use crate::xmp::{
    self, qattr, value::FieldValue, Ns, VendorBlock, DC, EXIF, IPTC4XMP_CORE, LR, PHOTOSHOP,
    TIFF, XMP, XMP_RIGHTS,
};

/// Where a rule writes: an attribute on `rdf:Description`, or a named child
/// element of it.
#[derive(Debug, Clone, Copy)]
pub enum Target {
    Attribute(&'static Ns, &'static str),
    Element(&'static Ns, &'static str),
}

type Transform = fn(&str) -> Result<Option<FieldValue>, RuleError>;

/// One declarative source→destination mapping.
#[derive(Debug, Clone, Copy)]
pub struct Transfer {
    pub source: &'static str,
    pub target: Target,
    transform: Transform,
}

type CustomRule = fn(&mut Element, &VendorBlock, bool) -> Result<(), RuleError>;

enum RuleKind {
    Transfer(Transfer),
    Custom(CustomRule),
}

/// A registered mapping rule. Rules are built once at startup by
/// [`build_rules`] and shared read-only across workers.
pub struct Rule {
    pub name: &'static str,
    kind: RuleKind,
}

impl Rule {
    fn transfer(
        name: &'static str,
        source: &'static str,
        target: Target,
        transform: Transform,
    ) -> Rule {
        Rule {
            name,
            kind: RuleKind::Transfer(Transfer { source, target, transform }),
        }
    }

    fn custom(name: &'static str, apply: CustomRule) -> Rule {
        Rule { name, kind: RuleKind::Custom(apply) }
    }

    /// Apply this rule against the metadata container and vendor block.
    /// Idempotent when `overwrite` is false.
    pub fn apply(
        &self,
        container: &mut Element,
        block: &VendorBlock,
        overwrite: bool,
    ) -> Result<(), RuleError> {
        match &self.kind {
            RuleKind::Custom(apply) => apply(container, block, overwrite),
            RuleKind::Transfer(transfer) => {
                let Some(raw) = block.get(transfer.source) else {
                    return Ok(());
                };
                if raw.trim().is_empty() {
                    return Ok(());
                }
                if !overwrite && target_present(container, transfer.target) {
                    return Ok(());
                }
                let Some(value) = (transfer.transform)(raw)? else {
                    return Ok(());
                };
                write_value(container, transfer.target, value)
            }
        }
    }
}

fn target_present(container: &Element, target: Target) -> bool {
    match target {
        Target::Attribute(ns, local) => xmp::has_attribute(container, ns, local),
        Target::Element(ns, local) => xmp::has_child(container, ns, local),
    }
}

fn write_value(container: &mut Element, target: Target, value: FieldValue) -> Result<(), RuleError> {
    match target {
        Target::Attribute(ns, local) => match value {
            FieldValue::Text(text) => {
                xmp::set_attribute(container, ns, local, text);
                Ok(())
            }
            FieldValue::Attr(name, text) => {
                container.attributes.insert(name, text);
                Ok(())
            }
            _ => Err(RuleError::new(format!(
                "transform produced a collection for attribute destination {}:{}",
                ns.prefix, local
            ))),
        },
        Target::Element(ns, local) => {
            // Replace semantics: at most one child per destination tag.
            xmp::remove_children(container, ns, local);
            container
                .children
                .push(XMLNode::Element(value.into_element(ns, local)));
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Value transforms
// ---------------------------------------------------------------------------

fn identity(value: &str) -> Result<Option<FieldValue>, RuleError> {
    Ok(Some(FieldValue::Text(value.to_string())))
}

/// `"<lang>|<text>"` → a one-entry language alternative. AfterShot stores
/// the UI language tag ahead of the text.
fn lang_alt(value: &str) -> Result<Option<FieldValue>, RuleError> {
    let (lang, text) = value
        .split_once('|')
        .ok_or_else(|| RuleError::new(format!("missing language delimiter in '{value}'")))?;
    Ok(Some(FieldValue::LangAlt(vec![(
        lang.to_string(),
        text.to_string(),
    )])))
}

/// Free-form keywords: split on `;` or `,`, unordered.
fn keyword_bag(value: &str) -> Result<Option<FieldValue>, RuleError> {
    let items: Vec<String> = value
        .split(|c| c == ';' || c == ',')
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .collect();
    Ok((!items.is_empty()).then_some(FieldValue::Bag(items)))
}

/// Hierarchical keyword paths: `;` separates levels within one hierarchy
/// (becoming the `|` path separator Lightroom expects) and `,` separates
/// sibling hierarchies. Order is significant.
fn hierarchical_seq(value: &str) -> Result<Option<FieldValue>, RuleError> {
    let items: Vec<String> = value
        .replace(';', "|")
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .collect();
    Ok((!items.is_empty()).then_some(FieldValue::Seq(items)))
}

/// A single creator name: the first comma-separated token, as a one-element
/// ordered list.
fn creator_seq(value: &str) -> Result<Option<FieldValue>, RuleError> {
    let first = value.split(',').next().unwrap_or("").trim();
    if first.is_empty() {
        return Ok(None);
    }
    Ok(Some(FieldValue::Seq(vec![first.to_string()])))
}

/// Comma-separated code lists (IPTC subject codes, scene codes), trimmed.
fn csv_bag(value: &str) -> Result<Option<FieldValue>, RuleError> {
    let items: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Ok((!items.is_empty()).then_some(FieldValue::Bag(items)))
}

/// AfterShot color label codes 1..5 map to the canonical label names; 0 and
/// anything unmapped produce no value.
fn color_label(value: &str) -> Result<Option<FieldValue>, RuleError> {
    let label = match value.trim() {
        "1" => "Red",
        "2" => "Yellow",
        "3" => "Green",
        "4" => "Blue",
        "5" => "Purple",
        _ => return Ok(None),
    };
    Ok(Some(FieldValue::Text(label.to_string())))
}

// ---------------------------------------------------------------------------
// Special-case rules
// ---------------------------------------------------------------------------

/// Contact sub-fields and the `Iptc4xmpCore` attribute each one lands in.
const CONTACT_FIELDS: &[(&str, &str)] = &[
    ("contactcity", "CiAdrCity"),
    ("contactcountry", "CiAdrCtry"),
    ("contactaddress", "CiAdrExtadr"),
    ("contactpostalcode", "CiAdrPcode"),
    ("contactregion", "CiAdrRegion"),
    ("contactemail", "CiEmailWork"),
    ("contactphone", "CiTelWork"),
    ("contacturl", "CiUrlWork"),
];

/// Aggregate the contact sub-fields into one composite
/// `Iptc4xmpCore:CreatorContactInfo` element. Skipped entirely when no
/// sub-field is present.
fn creator_contact_info(
    container: &mut Element,
    block: &VendorBlock,
    overwrite: bool,
) -> Result<(), RuleError> {
    let target = Target::Element(&IPTC4XMP_CORE, "CreatorContactInfo");
    if !overwrite && target_present(container, target) {
        return Ok(());
    }

    let mut node = xmp::qelement(&IPTC4XMP_CORE, "CreatorContactInfo");
    let mut populated = false;
    for (source, attribute) in CONTACT_FIELDS {
        if let Some(value) = block.get(source) {
            if !value.trim().is_empty() {
                xmp::set_attribute(&mut node, &IPTC4XMP_CORE, attribute, value.to_string());
                populated = true;
            }
        }
    }
    if !populated {
        return Ok(());
    }
    write_value(container, target, FieldValue::Node(node))
}

/// Fuse the rejection flag and the numeric rating into `xmp:Rating`:
/// rejection wins and forces the `-1` sentinel; otherwise the rating is
/// copied verbatim; neither present means no attribute at all.
fn rating_and_rejection(
    container: &mut Element,
    block: &VendorBlock,
    overwrite: bool,
) -> Result<(), RuleError> {
    let target = Target::Attribute(&XMP, "Rating");
    if !overwrite && target_present(container, target) {
        return Ok(());
    }

    let rejected = block.get("rejected").is_some_and(is_truthy);
    let rating = if rejected {
        Some("-1".to_string())
    } else {
        block
            .get("rating")
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string)
    };
    match rating {
        Some(value) => write_value(
            container,
            target,
            FieldValue::Attr(qattr(&XMP, "Rating"), value),
        ),
        None => Ok(()),
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty()
        && !value.eq_ignore_ascii_case("0")
        && !value.eq_ignore_ascii_case("false")
        && !value.eq_ignore_ascii_case("no")
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Build the ordered rule registry.
///
/// The set is designed so no two rules write the same destination, which
/// makes registration order inconsequential beyond presence checks. Rules
/// are applied per document in exactly this order.
pub fn build_rules() -> Vec<Rule> {
    use Target::{Attribute, Element};

    vec![
        Rule::transfer("tiff:Make", "profilemake", Attribute(&TIFF, "Make"), identity),
        Rule::transfer("tiff:Model", "profilemodel", Attribute(&TIFF, "Model"), identity),
        Rule::transfer(
            "exif:GPSLatitude",
            "GPSLatitude",
            Attribute(&EXIF, "GPSLatitude"),
            identity,
        ),
        Rule::transfer(
            "exif:GPSLongitude",
            "GPSLongitude",
            Attribute(&EXIF, "GPSLongitude"),
            identity,
        ),
        Rule::transfer(
            "photoshop:Headline",
            "headline",
            Attribute(&PHOTOSHOP, "Headline"),
            identity,
        ),
        Rule::transfer("photoshop:City", "city", Attribute(&PHOTOSHOP, "City"), identity),
        Rule::transfer("photoshop:State", "state", Attribute(&PHOTOSHOP, "State"), identity),
        Rule::transfer(
            "photoshop:Country",
            "country",
            Attribute(&PHOTOSHOP, "Country"),
            identity,
        ),
        Rule::transfer(
            "xmpRights:WebStatement",
            "webstatement",
            Attribute(&XMP_RIGHTS, "WebStatement"),
            identity,
        ),
        Rule::transfer("xmp:Label", "colorlabel", Attribute(&XMP, "Label"), color_label),
        Rule::transfer("dc:title", "title", Element(&DC, "title"), lang_alt),
        Rule::transfer(
            "dc:description",
            "description",
            Element(&DC, "description"),
            lang_alt,
        ),
        Rule::transfer(
            "xmpRights:UsageTerms",
            "usageterms",
            Element(&XMP_RIGHTS, "UsageTerms"),
            lang_alt,
        ),
        Rule::transfer("dc:creator", "creator", Element(&DC, "creator"), creator_seq),
        Rule::transfer("dc:subject", "keywordlist", Element(&DC, "subject"), keyword_bag),
        Rule::transfer(
            "lr:hierarchicalSubject",
            "keywordlist",
            Element(&LR, "hierarchicalSubject"),
            hierarchical_seq,
        ),
        Rule::transfer(
            "Iptc4xmpCore:SubjectCode",
            "subjectcode",
            Element(&IPTC4XMP_CORE, "SubjectCode"),
            csv_bag,
        ),
        Rule::transfer(
            "Iptc4xmpCore:Scene",
            "scene",
            Element(&IPTC4XMP_CORE, "Scene"),
            csv_bag,
        ),
        Rule::custom("Iptc4xmpCore:CreatorContactInfo", creator_contact_info),
        Rule::custom("xmp:Rating", rating_and_rejection),
    ]
}
