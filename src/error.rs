//! Error taxonomy for the rendering pipeline.
//!
//! Configuration problems are reported by the template validator and never
//! raised mid-render. Everything that does get raised funnels into
//! [`GenerationError`] at the orchestrator boundary.

use thiserror::Error;

/// Invalid colour input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ColorError {
    #[error("invalid hex colour {0:?}")]
    InvalidHex(String),

    #[error("invalid colour string {0:?}")]
    InvalidColor(String),

    #[error("gradient needs at least two stops, got {0}")]
    TooFewStops(usize),
}

/// Failures inside the glass compositing layer. Callers recover from these
/// by falling back to a flat vector fill.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlassError {
    #[error("drawing surface unavailable ({width}x{height} px)")]
    SurfaceUnavailable { width: u32, height: u32 },

    #[error("degenerate shape {0}")]
    DegenerateShape(String),

    #[error("invalid snapshot source: {0}")]
    InvalidSnapshot(String),

    #[error("surface encode failed: {0}")]
    Encode(String),

    #[error(transparent)]
    Color(#[from] ColorError),
}

/// Failures that abort a single render.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("colour error: {0}")]
    Color(#[from] ColorError),

    #[error("invalid page geometry: {0}")]
    Geometry(String),

    #[error("background composite failed: {0}")]
    Background(GlassError),

    #[error("document writer failed: {0}")]
    Writer(String),
}

/// Errors raised by the external data-shaping collaborator. Messages are
/// surfaced verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("Personal information is required")]
    PersonalInfoRequired,

    #[error("Invalid template configuration")]
    InvalidTemplate,

    #[error("{0}")]
    Other(String),
}

/// Top-level error returned by the orchestrator.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("No templates available")]
    NoTemplates,

    #[error("PDF generation failed: invalid request: {0}")]
    InvalidRequest(String),

    #[error("PDF generation failed: invalid template {id}: {}", errors.join("; "))]
    InvalidTemplate { id: String, errors: Vec<String> },

    #[error("PDF generation failed: {0}")]
    Shaping(#[from] ShapeError),

    #[error("PDF generation failed: {0}")]
    Render(#[from] RenderError),

    #[error("PDF generation failed: queued request dropped before completion")]
    QueueClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_errors_carry_prefix() {
        let err: GenerationError = RenderError::Geometry("content area is empty".into()).into();
        assert_eq!(
            err.to_string(),
            "PDF generation failed: invalid page geometry: content area is empty"
        );
    }

    #[test]
    fn shaping_errors_surface_verbatim() {
        let err: GenerationError = ShapeError::PersonalInfoRequired.into();
        assert!(err.to_string().ends_with("Personal information is required"));
    }

    #[test]
    fn template_not_found_message() {
        let err = GenerationError::TemplateNotFound("missing".into());
        assert_eq!(err.to_string(), "Template not found: missing");
    }
}
