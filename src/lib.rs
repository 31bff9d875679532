//! # afp2xmp
//!
//! Convert AfterShot Pro XMP sidecar data to standard XMP metadata readable
//! by other photo tools.
//!
//! AfterShot Pro (previously Bibble) keeps ratings, keywords, descriptions
//! and the rest of its catalogue data in a proprietary `bopt:` attribute
//! block inside each `.xmp` sidecar. This crate reads that block and maps
//! its fields onto the standard schemas — EXIF, TIFF, Photoshop, IPTC Core,
//! XMP core and rights, Dublin Core, and Lightroom's hierarchical subjects.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use afp2xmp::pipeline::{self, ProcessOptions};
//! use afp2xmp::rules;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     // Build the mapping rule set once; it is read-only afterwards and
//!     // can be shared across worker threads.
//!     let rules = rules::build_rules();
//!
//!     // Default options rewrite the sidecar in place and never overwrite
//!     // standard fields that already have a value.
//!     let options = ProcessOptions::default();
//!
//!     let outcome = pipeline::process_sidecar(
//!         Path::new("photos/IMG_0042.NEF.xmp"),
//!         &rules,
//!         &options,
//!     );
//!     match &outcome.error {
//!         Some(err) => eprintln!("Error processing {}: {err}", outcome.input.display()),
//!         None => println!("File processed successfully: {}", outcome.input.display()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Lower-Level Usage
//!
//! The mapping engine can also be driven directly against a parsed document,
//! for example to convert in memory without touching the filesystem:
//!
//! ```rust
//! use afp2xmp::rules::build_rules;
//! use afp2xmp::xmp::{self, VendorBlock};
//! use xmltree::Element;
//!
//! # fn main() -> anyhow::Result<()> {
//! let xml = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
//!     xmlns:blay="http://ns.bibblelabs.com/BibbleLayers/5.0/"
//!     xmlns:bopt="http://ns.bibblelabs.com/BibbleOpt/5.0/">
//!   <rdf:Description rdf:about="">
//!     <blay:options bopt:rating="4"/>
//!   </rdf:Description>
//! </rdf:RDF>"#;
//! let mut root = Element::parse(xml.as_bytes())?;
//!
//! let block = VendorBlock::extract(&root).expect("an AfterShot sidecar");
//! let desc = xmp::find_description_mut(&mut root).expect("an XMP document");
//! xmp::ensure_namespaces(desc);
//! for rule in build_rules() {
//!     rule.apply(desc, &block, false)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`rules`] — the declarative mapping table and the rule runtime
//! - [`xmp`] — document access: anchors, namespaces, serialization
//! - [`pipeline`] — per-file processing, sidecar discovery, output paths
//! - [`error`] — the file-scoped error taxonomy

pub mod error;
pub mod pipeline;
pub mod rules;
pub mod xmp;
