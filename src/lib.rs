//! # glassforge – glass-morphism resume → PDF pipeline
//!
//! Turns a display-ready resume payload and a declarative template into a
//! paginated PDF with translucent "glass" cards over a layered backdrop.
//! The stages are:
//!
//! 1. **Resolve** – pick and validate a [`template::Template`] ([`templates`])
//! 2. **Shape** – an external [`data::DataShaper`] produces [`data::ProcessedPdfData`]
//! 3. **Lay out** – grid, typography and preflight pagination ([`layout`], [`fonts`], [`pagination`])
//! 4. **Composite** – raster glass panes and backdrops with tiny-skia ([`glass`], [`background`], [`sections`])
//! 5. **Write** – emit PDF bytes via printpdf ([`writer`])
//!
//! [`pipeline::PdfGenerator`] drives all of it; [`performance`] owns the
//! surface pool, the priority work queue and the background workers.

pub mod background;
pub mod color;
pub mod config;
pub mod data;
pub mod document;
pub mod error;
pub mod fonts;
pub mod glass;
pub mod layout;
pub mod pagination;
pub mod performance;
pub mod pipeline;
pub mod renderer;
pub mod sections;
pub mod template;
pub mod templates;
pub mod writer;

// Re-exports for convenience
pub use config::{GenerationOptions, GeneratorConfig, RequestOptions};
pub use data::{DataShaper, PassthroughShaper, ProcessedPdfData, TemplateSource};
pub use error::GenerationError;
pub use pipeline::{GenerationMetadata, GenerationResult, PdfGenerator};
pub use template::Template;
pub use templates::TemplateRegistry;
