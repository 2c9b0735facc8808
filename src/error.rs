//! Error types for the certificate generator

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the certificate library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Template could not be read or parsed
    #[error("Unable to open template {}: {reason}", .path.display())]
    Template { path: PathBuf, reason: String },

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Names file could not be read
    #[error("Unable to read names file {}: {reason}", .path.display())]
    NamesUnreadable { path: PathBuf, reason: String },

    /// Names file contained no usable names
    #[error("No names found in {}", .0.display())]
    NoNames(PathBuf),

    /// Placement rectangle is malformed or outside the page
    #[error("Invalid rectangle: {0}")]
    InvalidRectangle(String),

    /// Font file could not be loaded
    #[error("Font error: {0}")]
    Font(String),

    /// Requested font is not in the catalog
    #[error("Font not found: {requested} (available: {available})")]
    FontNotFound { requested: String, available: String },

    /// Session configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// General error
    #[error("{0}")]
    General(String),
}
