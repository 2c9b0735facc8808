//! Certificate batches
//!
//! A [`Batch`] renders one certificate per name and writes it to the output
//! folder. In manual mode every name is first handed to a [`Reviewer`], which
//! may adjust the font, size and placement, skip the name, or stop the run.

use std::path::PathBuf;

use tracing::{error, info, warn};

use crate::error::Result;
use crate::fonts::{FontChoice, FontLibrary, FontRef};
use crate::layout::{FontSize, Placement, Rectangle, TextLayout};
use crate::output::{OutputManager, OutputRecord, WriteOutcome};
use crate::pdf::{layout_name, render_certificate, CertificateTemplate};

/// File name used for manual-mode previews
pub const PREVIEW_FILE: &str = "preview.pdf";

/// What was proposed to the reviewer for one name
#[derive(Debug, Clone)]
pub struct Proposal {
    pub name: String,
    /// Zero-based position in the name list
    pub index: usize,
    pub total: usize,
    pub choice: FontChoice,
    pub placement: Placement,
    pub layout: TextLayout,
}

/// The reviewer's answer for one name
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewDecision {
    /// Render with these settings
    Confirm {
        choice: FontChoice,
        placement: Placement,
    },
    /// Move on without a certificate for this name
    Skip,
    /// Stop the batch; certificates already written are kept
    Cancel,
}

/// Per-name confirmation step of manual mode
pub trait Reviewer {
    fn review(&mut self, proposal: Proposal, ctx: &mut ReviewContext<'_>) -> Result<ReviewDecision>;
}

/// What a reviewer may use while deciding: re-layout and previews
pub struct ReviewContext<'a> {
    template: &'a CertificateTemplate,
    fonts: &'a mut FontLibrary,
    output: &'a OutputManager,
    configured_size: FontSize,
}

impl ReviewContext<'_> {
    pub fn page_box(&self) -> Rectangle {
        self.template.page_box()
    }

    /// Font size setting the run started with
    pub fn configured_size(&self) -> FontSize {
        self.configured_size
    }

    /// Labels of the fonts that can be selected
    pub fn font_labels(&self) -> Vec<String> {
        self.fonts
            .catalog()
            .entries()
            .iter()
            .map(|entry| entry.label.clone())
            .collect()
    }

    /// Resolve and load a font by label or path
    pub fn select_font(&mut self, requested: &str) -> Result<FontRef> {
        let (font, _) = self.fonts.resolve(requested)?;
        Ok(font)
    }

    /// Where `name` would be drawn with these settings
    pub fn layout(&mut self, name: &str, choice: &FontChoice, placement: &Placement) -> Result<TextLayout> {
        let font = self.fonts.load(&choice.font)?;
        layout_name(name, &font, choice.size, placement)
    }

    /// Render a throwaway preview into the output folder
    pub fn preview(&mut self, name: &str, choice: &FontChoice, placement: &Placement) -> Result<PathBuf> {
        let font = self.fonts.load(&choice.font)?;
        let rendered = render_certificate(self.template, name, &font, choice.size, placement)?;
        self.output.write_scratch(PREVIEW_FILE, &rendered.bytes)
    }
}

/// Result of a batch run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub written: Vec<OutputRecord>,
    /// Names left out by the reviewer or the collision policy
    pub skipped: Vec<String>,
    /// Names whose certificate could not be produced, with the reason
    pub failed: Vec<(String, String)>,
    /// Whether the reviewer stopped the run early
    pub cancelled: bool,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Renders certificates for a list of names
pub struct Batch<'a> {
    template: &'a CertificateTemplate,
    fonts: FontLibrary,
    choice: FontChoice,
    placement: Placement,
    output: OutputManager,
}

impl<'a> Batch<'a> {
    pub fn new(
        template: &'a CertificateTemplate,
        fonts: FontLibrary,
        choice: FontChoice,
        placement: Placement,
        output: OutputManager,
    ) -> Self {
        Self {
            template,
            fonts,
            choice,
            placement,
            output,
        }
    }

    /// Process every name in order
    ///
    /// Without a reviewer all names use the initial settings. With one, each
    /// name is proposed with the font and size confirmed for the previous
    /// name. Failures for a single name are recorded and the batch moves on.
    pub fn run(&mut self, names: &[String], mut reviewer: Option<&mut dyn Reviewer>) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let mut choice = self.choice.clone();
        let total = names.len();

        for (index, name) in names.iter().enumerate() {
            let (name_choice, placement) = match reviewer.as_deref_mut() {
                None => (choice.clone(), self.placement),
                Some(reviewer) => {
                    let proposal = match self.propose(name, index, total, &choice) {
                        Ok(proposal) => proposal,
                        Err(e) => {
                            error!("Failed to lay out '{}': {}", name, e);
                            report.failed.push((name.clone(), e.to_string()));
                            continue;
                        }
                    };

                    let mut ctx = ReviewContext {
                        template: self.template,
                        fonts: &mut self.fonts,
                        output: &self.output,
                        configured_size: self.choice.size,
                    };
                    match reviewer.review(proposal, &mut ctx)? {
                        ReviewDecision::Confirm { choice: confirmed, placement } => {
                            choice = confirmed.clone();
                            (confirmed, placement)
                        }
                        ReviewDecision::Skip => {
                            info!("Skipped '{}'", name);
                            report.skipped.push(name.clone());
                            continue;
                        }
                        ReviewDecision::Cancel => {
                            warn!(
                                "Cancelled after {} of {} name(s); written certificates are kept",
                                index, total
                            );
                            report.cancelled = true;
                            break;
                        }
                    }
                }
            };

            match self.produce(name, &name_choice, &placement) {
                Ok(WriteOutcome::Written(record)) => {
                    info!("[{}/{}] {} -> {}", index + 1, total, name, record.path.display());
                    report.written.push(record);
                }
                Ok(WriteOutcome::Skipped(path)) => {
                    info!("[{}/{}] {} already exists, skipped", index + 1, total, path.display());
                    report.skipped.push(name.clone());
                }
                Err(e) => {
                    error!("[{}/{}] Failed to create certificate for '{}': {}", index + 1, total, name, e);
                    report.failed.push((name.clone(), e.to_string()));
                }
            }
        }

        Ok(report)
    }

    fn propose(&mut self, name: &str, index: usize, total: usize, previous: &FontChoice) -> Result<Proposal> {
        let choice = FontChoice {
            font: previous.font.clone(),
            size: carry_over_size(previous.size, self.choice.size.min_size(), &self.placement.rect),
        };
        let font = self.fonts.load(&choice.font)?;
        let layout = layout_name(name, &font, choice.size, &self.placement)?;

        Ok(Proposal {
            name: name.to_string(),
            index,
            total,
            choice,
            placement: self.placement,
            layout,
        })
    }

    fn produce(&mut self, name: &str, choice: &FontChoice, placement: &Placement) -> Result<WriteOutcome> {
        let font = self.fonts.load(&choice.font)?;
        let rendered = render_certificate(self.template, name, &font, choice.size, placement)?;
        self.output.write(name, &rendered.bytes)
    }
}

/// A fixed size confirmed for one name, limited to what the rectangle can hold
fn carry_over_size(size: FontSize, min: f32, rect: &Rectangle) -> FontSize {
    match size {
        FontSize::Fixed(pt) => FontSize::Fixed(FontSize::limit(pt, min, rect)),
        auto => auto,
    }
}
