use thiserror::Error;

/// A failure while converting a single sidecar file.
///
/// Every variant is file-scoped: the batch driver reports it and moves on to
/// the next file. Only pre-batch validation (a named input that is neither a
/// file nor a directory) aborts the whole run, and that happens in the CLI
/// before any conversion starts.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input file could not be opened or parsed as XML.
    #[error("error reading file: {0}")]
    Read(String),

    /// The document is missing a structural anchor — either it is not an XMP
    /// file at all, or it carries no AfterShot Pro settings block.
    #[error("{0}")]
    Format(String),

    /// A single mapping rule failed while converting a value.
    #[error("rule '{rule}': {source}")]
    Rule {
        rule: &'static str,
        #[source]
        source: RuleError,
    },

    /// The output file could not be created or written.
    #[error("error writing output: {0}")]
    Write(String),
}

/// An error raised by one mapping rule during value conversion, e.g. a
/// localized-text value missing its language delimiter.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RuleError(String);

impl RuleError {
    pub fn new(message: impl Into<String>) -> Self {
        RuleError(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
