//! Error types for the docingest pipeline.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for docingest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while ingesting documents.
///
/// Only setup errors (see [`Error::is_batch_fatal`]) ever reach the caller of
/// [`Ingestor::ingest`](crate::Ingestor::ingest); everything else is caught at
/// the input, page or item boundary and reported in the outcome.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input bytes cannot be opened or parsed.
    #[error("Cannot read {filename}: {reason}")]
    SourceUnreadable {
        /// Name of the offending input
        filename: String,
        /// What went wrong
        reason: String,
    },

    /// A table, image or slide took longer than its ceiling.
    #[error("Extraction of {item} timed out after {limit:?}")]
    ExtractionTimeout {
        /// Source tag of the abandoned item
        item: String,
        /// The ceiling that was exceeded
        limit: Duration,
    },

    /// An extraction step failed for a single item.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    /// Rendered slide count does not match the slide text count.
    #[error("Slide deck rendered {rendered} pages but contains {extracted} slides")]
    StructuralMismatch {
        /// Pages produced by the renderer
        rendered: usize,
        /// Slides found in the deck structure
        extracted: usize,
    },

    /// The file is not a recognized PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(usize, usize),

    /// An external capability (renderer, classifier, describer, ...) failed.
    #[error("Capability {name} failed: {reason}")]
    Capability {
        /// Capability name
        name: &'static str,
        /// Failure description
        reason: String,
    },

    /// The batch request itself is malformed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The working root cannot be used.
    #[error("Working storage error: {0}")]
    WorkingStorage(String),

    /// The batch was cancelled by the caller.
    #[error("Ingestion cancelled")]
    Cancelled,
}

impl Error {
    /// Create a capability error.
    pub fn capability(name: &'static str, reason: impl Into<String>) -> Self {
        Error::Capability {
            name,
            reason: reason.into(),
        }
    }

    /// Create an unreadable-source error.
    pub fn unreadable(filename: impl Into<String>, reason: impl ToString) -> Self {
        Error::SourceUnreadable {
            filename: filename.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error aborts the whole batch rather than a single input.
    pub fn is_batch_fatal(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::WorkingStorage(_))
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::ExtractionFailed(format!("slide package: {err}"))
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::ExtractionFailed(format!("slide xml: {err}"))
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::ExtractionFailed(format!("table export: {err}"))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::ExtractionFailed(format!("image decode: {err}"))
    }
}
