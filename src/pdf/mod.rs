//! PDF manipulation module

pub mod font;
pub mod render;
pub mod template;

// Re-export commonly used items
pub use render::{layout_name, render_certificate, RenderedCertificate};
pub use template::CertificateTemplate;
