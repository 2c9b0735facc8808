//! PDF Certificates Library
//!
//! Batch certificate generation: participant names are drawn onto a
//! single-page PDF template inside a chosen rectangle and each certificate is
//! written to its own file. This library provides functionality to:
//! - Load and clean lists of participant names
//! - Inspect certificate templates
//! - Discover, load and measure fonts
//! - Fit and place a name inside a rectangle
//! - Render certificates and write them without clobbering earlier output
//! - Run whole batches, optionally with a per-name review step
//!
//! # Example
//!
//! ```no_run
//! use pdf_certificates::batch::Batch;
//! use pdf_certificates::fonts::{FontCatalog, FontChoice, FontLibrary};
//! use pdf_certificates::layout::{FontSize, Placement, Rectangle};
//! use pdf_certificates::names::load_names;
//! use pdf_certificates::output::{CollisionPolicy, OutputManager};
//! use pdf_certificates::pdf::CertificateTemplate;
//! use std::path::Path;
//!
//! # fn main() -> pdf_certificates::Result<()> {
//! let template = CertificateTemplate::open(Path::new("template.pdf"))?;
//! let names = load_names(Path::new("participants.txt"), true)?;
//!
//! let catalog = FontCatalog::scan(Path::new("fonts"))?;
//! let choice = FontChoice {
//!     font: catalog.choose(None)?,
//!     size: FontSize::default(),
//! };
//! let placement = Placement::new(Rectangle::new(171.0, 250.0, 671.0, 310.0));
//! let output = OutputManager::new(Path::new("output"), CollisionPolicy::Suffix)?;
//!
//! let mut batch = Batch::new(&template, FontLibrary::new(catalog), choice, placement, output);
//! let report = batch.run(&names, None)?;
//! println!("{} certificates written", report.written.len());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod error;
pub mod fonts;
pub mod layout;
pub mod logging;
pub mod names;
pub mod output;
pub mod pdf;
pub mod review;
pub mod session;

// Re-export commonly used items
pub use error::{Error, Result};
