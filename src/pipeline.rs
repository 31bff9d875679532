//! Per-file conversion pipeline: load a sidecar, apply the rule set, write
//! the result, and report a per-file [`Outcome`].
//!
//! Processing is stateless — each call is a pure function of the document
//! bytes, the shared rule set, and the options — which is what makes the
//! per-file parallelism in the CLI safe.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use walkdir::WalkDir;
use xmltree::Element;

use crate::error::ConvertError;
use crate::rules::Rule;
use crate::xmp::{self, VendorBlock};

/// Options shared by every file in a batch.
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Output path template; `None` rewrites the input file in place.
    /// Recognized markers: `{d}` input directory, `{f}` full input file
    /// name, `{o}` original image file name, `{n}` image name without
    /// extension, `{e}` image extension. A template ending in a path
    /// separator is treated as a target directory.
    pub output: Option<String>,
    /// Restore the input file's access/modification timestamps after
    /// writing. Only meaningful when rewriting in place.
    pub preserve_timestamps: bool,
    /// Overwrite standard fields that already hold a value.
    pub overwrite: bool,
}

/// The result of converting one sidecar file.
#[derive(Debug)]
pub struct Outcome {
    pub input: PathBuf,
    /// The written file, when conversion succeeded.
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Collect every `.xmp` sidecar under a directory, recursively.
pub fn collect_sidecars(root: &Path) -> Vec<PathBuf> {
    let mut sidecars = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        let is_sidecar = path.is_file()
            && path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xmp"));
        if is_sidecar {
            sidecars.push(path.to_path_buf());
        }
    }
    log::debug!("{}: {} sidecar file(s)", root.display(), sidecars.len());
    sidecars
}

/// Convert one sidecar file. Never panics and never aborts the batch: every
/// failure is folded into the returned [`Outcome`].
pub fn process_sidecar(input: &Path, rules: &[Rule], options: &ProcessOptions) -> Outcome {
    match convert_file(input, rules, options) {
        Ok(output) => Outcome {
            input: input.to_path_buf(),
            output: Some(output),
            error: None,
        },
        Err(error) => Outcome {
            input: input.to_path_buf(),
            output: None,
            error: Some(error.to_string()),
        },
    }
}

fn convert_file(
    input: &Path,
    rules: &[Rule],
    options: &ProcessOptions,
) -> Result<PathBuf, ConvertError> {
    let bytes = fs::read(input).map_err(|e| ConvertError::Read(e.to_string()))?;
    let mut root =
        Element::parse(bytes.as_slice()).map_err(|e| ConvertError::Read(e.to_string()))?;

    if xmp::find_description(&root).is_none() {
        return Err(ConvertError::Format("not a valid XMP file".to_string()));
    }
    let block = VendorBlock::extract(&root)
        .ok_or_else(|| ConvertError::Format("not an AfterShot Pro XMP file".to_string()))?;

    if block.is_empty() {
        log::debug!("{}: vendor block carries no fields", input.display());
    }

    let Some(description) = xmp::find_description_mut(&mut root) else {
        return Err(ConvertError::Format("not a valid XMP file".to_string()));
    };
    xmp::ensure_namespaces(description);

    for rule in rules {
        rule.apply(description, &block, options.overwrite)
            .map_err(|source| ConvertError::Rule { rule: rule.name, source })?;
    }

    xmp::strip_whitespace_text(&mut root);

    let output = match &options.output {
        Some(template) => resolve_output(template, input),
        None => input.to_path_buf(),
    };

    // Snapshot before writing: an in-place rewrite changes them.
    let timestamps = if options.preserve_timestamps {
        input_timestamps(input)
    } else {
        None
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            fs::create_dir_all(parent).map_err(|e| ConvertError::Write(e.to_string()))?;
        }
    }

    let mut serialized = Vec::new();
    xmp::write_pretty(&root, &mut serialized).map_err(|e| ConvertError::Write(e.to_string()))?;
    serialized.push(b'\n');
    fs::write(&output, &serialized).map_err(|e| ConvertError::Write(e.to_string()))?;

    if let Some((accessed, modified)) = timestamps {
        restore_timestamps(input, accessed, modified)
            .map_err(|e| ConvertError::Write(e.to_string()))?;
    }

    Ok(output)
}

fn input_timestamps(input: &Path) -> Option<(SystemTime, SystemTime)> {
    let metadata = fs::metadata(input).ok()?;
    Some((metadata.accessed().ok()?, metadata.modified().ok()?))
}

fn restore_timestamps(
    path: &Path,
    accessed: SystemTime,
    modified: SystemTime,
) -> std::io::Result<()> {
    let file = fs::File::options().write(true).open(path)?;
    file.set_times(
        fs::FileTimes::new()
            .set_accessed(accessed)
            .set_modified(modified),
    )
}

/// Resolve the output path for one input against a template.
///
/// AfterShot sidecars are named after the image file (`IMG_0042.NEF.xmp`),
/// so `{o}` is the image file name, `{n}` the image name without extension
/// and `{e}` the image extension. The result always ends in `.xmp`.
pub fn resolve_output(template: &str, input: &Path) -> PathBuf {
    let directory = input
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = input
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();

    // A template ending in a separator names a directory.
    if template.ends_with('/') || template.ends_with(std::path::MAIN_SEPARATOR) {
        return Path::new(template).join(&file_name);
    }

    let original = Path::new(&file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let image_name = Path::new(&original)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let image_ext = Path::new(&original)
        .extension()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut resolved = template
        .replace("{d}", &directory)
        .replace("{f}", &file_name)
        .replace("{o}", &original)
        .replace("{n}", &image_name)
        .replace("{e}", &image_ext);
    if !resolved.ends_with(".xmp") {
        resolved.push_str(".xmp");
    }
    PathBuf::from(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::build_rules;
    use crate::xmp::{find_description, get_attribute, DC, LR, TIFF, XMP};
    use tempfile::TempDir;
    use xmltree::XMLNode;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<x:xmpmeta xmlns:x="adobe:ns:meta/">
 <rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""
     xmlns:dmf="http://ns.bibblelabs.com/DmfVersion/1.0/"
     xmlns:dmfversion="http://ns.bibblelabs.com/DmfVersionSettings/1.0/"
     xmlns:bset="http://ns.bibblelabs.com/BibbleSettings/5.0/"
     xmlns:blay="http://ns.bibblelabs.com/BibbleLayers/5.0/"
     xmlns:bopt="http://ns.bibblelabs.com/BibbleOpt/5.0/">
   <dmf:versions>
    <rdf:Seq>
     <rdf:li>
      <dmfversion:settings>
       <bset:layers>
        <rdf:Seq>
         <rdf:li>
          <blay:options
             bopt:rating="4"
             bopt:profilemake="Canon"
             bopt:description="en-US|A red boat"
             bopt:keywordlist="harbor;boats,sunset"/>
         </rdf:li>
        </rdf:Seq>
       </bset:layers>
      </dmfversion:settings>
     </rdf:li>
    </rdf:Seq>
   </dmf:versions>
  </rdf:Description>
 </rdf:RDF>
</x:xmpmeta>"#;

    const NO_VENDOR: &str = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#">
  <rdf:Description rdf:about=""/>
</rdf:RDF>"#;

    fn write_sample(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn parse(path: &Path) -> Element {
        Element::parse(fs::read(path).unwrap().as_slice()).unwrap()
    }

    fn list_items(desc: &Element, prefix: &str, local: &str, kind: &str) -> Vec<String> {
        let field = desc
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .find(|c| c.name == local && c.prefix.as_deref() == Some(prefix))
            .unwrap_or_else(|| panic!("no {prefix}:{local}"));
        let array = field
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .find(|c| c.name == kind)
            .unwrap_or_else(|| panic!("{prefix}:{local} has no rdf:{kind}"));
        array
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .map(|li| li.get_text().unwrap_or_default().into_owned())
            .collect()
    }

    #[test]
    fn converts_in_place() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir, "IMG_0042.NEF.xmp", SAMPLE);
        let rules = build_rules();

        let outcome = process_sidecar(&input, &rules, &ProcessOptions::default());
        assert!(outcome.is_success(), "unexpected error: {:?}", outcome.error);
        assert_eq!(outcome.output.as_deref(), Some(input.as_path()));

        let root = parse(&input);
        let desc = find_description(&root).unwrap();
        assert_eq!(get_attribute(desc, &XMP, "Rating"), Some("4"));
        assert_eq!(get_attribute(desc, &TIFF, "Make"), Some("Canon"));
        assert_eq!(
            list_items(desc, DC.prefix, "subject", "Bag"),
            vec!["harbor", "boats", "sunset"]
        );
        assert_eq!(
            list_items(desc, LR.prefix, "hierarchicalSubject", "Seq"),
            vec!["harbor|boats", "sunset"]
        );
    }

    #[test]
    fn rerun_without_overwrite_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir, "IMG_0001.NEF.xmp", SAMPLE);
        let rules = build_rules();
        let options = ProcessOptions::default();

        assert!(process_sidecar(&input, &rules, &options).is_success());
        let first = fs::read(&input).unwrap();
        assert!(process_sidecar(&input, &rules, &options).is_success());
        let second = fs::read(&input).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn read_error_for_missing_file() {
        let rules = build_rules();
        let outcome = process_sidecar(
            Path::new("/nonexistent/file.xmp"),
            &rules,
            &ProcessOptions::default(),
        );
        assert!(outcome.error.unwrap().contains("error reading file"));
    }

    #[test]
    fn format_error_for_non_xmp_file() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir, "plain.xmp", "<root><child/></root>");
        let rules = build_rules();
        let outcome = process_sidecar(&input, &rules, &ProcessOptions::default());
        assert_eq!(outcome.error.as_deref(), Some("not a valid XMP file"));
    }

    #[test]
    fn format_error_for_foreign_xmp_file() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir, "foreign.xmp", NO_VENDOR);
        let rules = build_rules();
        let outcome = process_sidecar(&input, &rules, &ProcessOptions::default());
        assert_eq!(
            outcome.error.as_deref(),
            Some("not an AfterShot Pro XMP file")
        );
    }

    #[test]
    fn rule_error_carries_rule_name() {
        let dir = TempDir::new().unwrap();
        let bad = SAMPLE.replace("en-US|A red boat", "no delimiter here");
        let input = write_sample(&dir, "bad.xmp", &bad);
        let rules = build_rules();
        let outcome = process_sidecar(&input, &rules, &ProcessOptions::default());
        let message = outcome.error.expect("rule failure expected");
        assert!(message.contains("dc:description"), "got: {message}");
    }

    #[test]
    fn failed_file_is_left_unwritten() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir, "foreign.xmp", NO_VENDOR);
        let rules = build_rules();
        let before = fs::read(&input).unwrap();
        let _ = process_sidecar(&input, &rules, &ProcessOptions::default());
        assert_eq!(fs::read(&input).unwrap(), before);
    }

    #[test]
    fn output_template_writes_to_new_path() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir, "IMG_7.CR2.xmp", SAMPLE);
        let rules = build_rules();
        let template = format!("{}/converted/{{n}}_std.{{e}}", dir.path().display());
        let options = ProcessOptions {
            output: Some(template),
            ..Default::default()
        };

        let outcome = process_sidecar(&input, &rules, &options);
        assert!(outcome.is_success(), "unexpected error: {:?}", outcome.error);
        let expected = dir.path().join("converted/IMG_7_std.CR2.xmp");
        assert_eq!(outcome.output.as_deref(), Some(expected.as_path()));
        assert!(expected.is_file());
        // Input untouched when writing elsewhere.
        assert_eq!(fs::read_to_string(&input).unwrap(), SAMPLE);
    }

    #[test]
    fn preserve_timestamps_keeps_mtime() {
        let dir = TempDir::new().unwrap();
        let input = write_sample(&dir, "IMG_9.NEF.xmp", SAMPLE);
        let before = fs::metadata(&input).unwrap().modified().unwrap();
        let rules = build_rules();
        let options = ProcessOptions {
            preserve_timestamps: true,
            ..Default::default()
        };
        assert!(process_sidecar(&input, &rules, &options).is_success());
        let after = fs::metadata(&input).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn resolve_output_markers() {
        let input = Path::new("photos/IMG_1.NEF.xmp");
        assert_eq!(
            resolve_output("{d}/{n}_converted.{e}", input),
            PathBuf::from("photos/IMG_1_converted.NEF.xmp")
        );
        assert_eq!(resolve_output("{o}", input), PathBuf::from("IMG_1.NEF.xmp"));
        // Full file name marker already ends in .xmp; nothing appended.
        assert_eq!(
            resolve_output("out_{f}", input),
            PathBuf::from("out_IMG_1.NEF.xmp")
        );
    }

    #[test]
    fn resolve_output_directory_template() {
        let input = Path::new("photos/IMG_1.NEF.xmp");
        assert_eq!(
            resolve_output("converted/", input),
            PathBuf::from("converted/IMG_1.NEF.xmp")
        );
    }

    #[test]
    fn collect_sidecars_recurses_and_filters() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("album");
        fs::create_dir(&sub).unwrap();
        fs::write(dir.path().join("a.xmp"), b"x").unwrap();
        fs::write(sub.join("b.XMP"), b"x").unwrap();
        fs::write(sub.join("c.jpg"), b"x").unwrap();

        let found = collect_sidecars(dir.path());
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn batch_with_one_failure_still_converts_the_rest() {
        let dir = TempDir::new().unwrap();
        let good_a = write_sample(&dir, "a.NEF.xmp", SAMPLE);
        let bad = write_sample(&dir, "b.xmp", NO_VENDOR);
        let good_b = write_sample(&dir, "c.NEF.xmp", SAMPLE);
        let rules = build_rules();
        let options = ProcessOptions::default();

        let outcomes: Vec<_> = [&good_a, &bad, &good_b]
            .iter()
            .map(|p| process_sidecar(p, &rules, &options))
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        assert_eq!(failed, 1);
        for path in [&good_a, &good_b] {
            let root = parse(path);
            let desc = find_description(&root).unwrap();
            assert_eq!(get_attribute(desc, &XMP, "Rating"), Some("4"));
        }
    }
}
