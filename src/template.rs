//! Template data model and validation.
//!
//! A [`Template`] is plain immutable configuration; it carries no behaviour
//! beyond a handful of derived lookups. [`validate_template`] reports every
//! configuration problem at once instead of failing mid-render.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Audience a template is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetAudience {
    Technical,
    #[default]
    Recruiter,
    Executive,
    Creative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageFormat {
    #[default]
    A4,
    Letter,
    Legal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Density {
    Compact,
    #[default]
    Normal,
    Spacious,
}

/// Four-sided margins in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn uniform(mm: f32) -> Self {
        Self {
            top: mm,
            right: mm,
            bottom: mm,
            left: mm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacingScale {
    pub section: f32,
    pub paragraph: f32,
    pub line: f32,
    pub element: f32,
}

impl Default for SpacingScale {
    fn default() -> Self {
        Self {
            section: 8.0,
            paragraph: 5.0,
            line: 1.5,
            element: 3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusScale {
    pub card: f32,
    pub chip: f32,
    pub button: f32,
}

impl Default for RadiusScale {
    fn default() -> Self {
        Self {
            card: 3.0,
            chip: 1.8,
            button: 2.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypographyBase {
    pub font_family: String,
    #[serde(default)]
    pub heading_family: Option<String>,
    #[serde(default)]
    pub monospace_family: Option<String>,
    #[serde(default)]
    pub density: Density,
}

impl Default for TypographyBase {
    fn default() -> Self {
        Self {
            font_family: "Helvetica".to_string(),
            heading_family: None,
            monospace_family: None,
            density: Density::Normal,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default)]
    pub format: PageFormat,
    #[serde(default)]
    pub orientation: Orientation,
    pub margins: Margins,
    #[serde(default = "LayoutConfig::default_columns")]
    pub columns: u8,
    #[serde(default = "LayoutConfig::default_column_gap")]
    pub column_gap: f32,
    #[serde(default)]
    pub spacing: SpacingScale,
    #[serde(default)]
    pub radius: RadiusScale,
    #[serde(default)]
    pub typography: TypographyBase,
}

impl LayoutConfig {
    fn default_columns() -> u8 {
        1
    }

    fn default_column_gap() -> f32 {
        6.0
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            format: PageFormat::A4,
            orientation: Orientation::Portrait,
            margins: Margins::uniform(15.0),
            columns: Self::default_columns(),
            column_gap: Self::default_column_gap(),
            spacing: SpacingScale::default(),
            radius: RadiusScale::default(),
            typography: TypographyBase::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowScheme {
    pub color: String,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub opacity: f32,
}

/// Named glass variant (e.g. `hero`, `card`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlassPreset {
    pub opacity: f32,
    #[serde(default)]
    pub elevation: u8,
    #[serde(default = "GlassPreset::default_border_alpha")]
    pub border_alpha: f32,
}

impl GlassPreset {
    fn default_border_alpha() -> f32 {
        0.25
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    /// Direction the light travels, in page space (y down).
    pub direction: [f32; 2],
    pub strength: f32,
    #[serde(default = "LightConfig::default_specular")]
    pub specular: bool,
}

impl LightConfig {
    fn default_specular() -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseKind {
    #[default]
    Mono,
    Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    pub amount: f32,
    pub scale: f32,
    #[serde(default)]
    pub kind: NoiseKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BorderGradient {
    pub top_alpha: f32,
    pub bottom_alpha: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlassScheme {
    pub fill: String,
    pub stroke: String,
    pub opacity: f32,
    pub shadow: ShadowScheme,
    #[serde(default)]
    pub presets: BTreeMap<String, GlassPreset>,
    #[serde(default)]
    pub light: Option<LightConfig>,
    #[serde(default)]
    pub noise: Option<NoiseConfig>,
    #[serde(default)]
    pub border_gradient: Option<BorderGradient>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub surface: String,
    pub text: String,
    pub text_secondary: String,
    pub glass: GlassScheme,
}

/// Percentage-based rectangle, each bound in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionPosition {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl SectionPosition {
    pub const FULL_WIDTH: SectionPosition = SectionPosition {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 100.0,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionVariant {
    #[default]
    Default,
    Hero,
    Card,
    TwoColumn,
    Stacked,
    Compact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    pub id: String,
    pub position: SectionPosition,
    #[serde(default)]
    pub variant: SectionVariant,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub page: u32,
}

/// Capability flags a template opts into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemplateFeatures {
    pub glass_effects: bool,
    pub gradients: bool,
    pub profile_photo: bool,
    pub progress_bars: bool,
}

impl Default for TemplateFeatures {
    fn default() -> Self {
        Self {
            glass_effects: true,
            gradients: true,
            profile_photo: false,
            progress_bars: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerToggle {
    pub enabled: bool,
    pub opacity: f32,
}

/// Per-layer switches for the page backdrop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackgroundOptions {
    pub gradient: bool,
    pub pattern: LayerToggle,
    pub lighting: LayerToggle,
    pub vignette: LayerToggle,
}

impl BackgroundOptions {
    /// Default backdrop per audience. Executive layouts drop the pattern.
    pub fn for_audience(audience: TargetAudience) -> Self {
        let (pattern, lighting, vignette) = match audience {
            TargetAudience::Technical => (0.06, 0.22, 0.10),
            TargetAudience::Creative => (0.05, 0.28, 0.12),
            TargetAudience::Executive => (0.0, 0.12, 0.08),
            TargetAudience::Recruiter => (0.03, 0.14, 0.06),
        };
        Self {
            gradient: true,
            pattern: LayerToggle {
                enabled: pattern > 0.0,
                opacity: pattern,
            },
            lighting: LayerToggle {
                enabled: true,
                opacity: lighting,
            },
            vignette: LayerToggle {
                enabled: true,
                opacity: vignette,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderingOptions {
    /// Rasterise technology badges as cached images instead of vector chips.
    #[serde(default)]
    pub badge_snapshots: bool,
    #[serde(default)]
    pub background: Option<BackgroundOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub target_audience: TargetAudience,
    pub min_pages: u32,
    pub max_pages: u32,
    pub colors: ColorScheme,
    pub layout: LayoutConfig,
    pub sections: Vec<SectionConfig>,
    #[serde(default)]
    pub features: TemplateFeatures,
    #[serde(default)]
    pub rendering: RenderingOptions,
}

impl Template {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Backdrop options, falling back to the audience defaults.
    pub fn background_options(&self) -> BackgroundOptions {
        self.rendering
            .background
            .unwrap_or_else(|| BackgroundOptions::for_audience(self.target_audience))
    }

    pub fn section(&self, id: &str) -> Option<&SectionConfig> {
        self.sections.iter().find(|s| s.id == id)
    }
}

/// Outcome of [`validate_template`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateValidation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Check every template invariant and collect one message per violation.
pub fn validate_template(template: &Template) -> TemplateValidation {
    let mut errors = Vec::new();

    if template.id.trim().is_empty() {
        errors.push("Template id is required".to_string());
    }
    if template.min_pages == 0 {
        errors.push("minPages must be at least 1".to_string());
    }
    if template.min_pages > template.max_pages {
        errors.push(format!(
            "Invalid page range: minPages ({}) exceeds maxPages ({})",
            template.min_pages, template.max_pages
        ));
    }

    let colors = &template.colors;
    for (name, value) in [
        ("primary", &colors.primary),
        ("background", &colors.background),
        ("text", &colors.text),
    ] {
        if value.trim().is_empty() {
            errors.push(format!("Color scheme is missing '{name}'"));
        }
    }
    if !(0.0..=1.0).contains(&colors.glass.opacity) {
        errors.push(format!(
            "Glass opacity {} is outside [0, 1]",
            colors.glass.opacity
        ));
    }

    let layout = &template.layout;
    if layout.columns == 0 {
        errors.push("Layout must have at least one column".to_string());
    }
    let m = &layout.margins;
    if [m.top, m.right, m.bottom, m.left].iter().any(|v| *v < 0.0) {
        errors.push("Layout margins must not be negative".to_string());
    }

    if template.sections.is_empty() {
        errors.push("Template must define at least one section".to_string());
    } else if !template.sections.iter().any(|s| s.required) {
        errors.push("At least one section must be required".to_string());
    }

    for section in &template.sections {
        let p = &section.position;
        for (name, value) in [("x", p.x), ("y", p.y), ("width", p.width), ("height", p.height)] {
            if !(0.0..=100.0).contains(&value) {
                errors.push(format!(
                    "Section '{}' position {name} ({value}) must be within [0, 100]",
                    section.id
                ));
            }
        }
        if p.width <= 0.0 || p.height <= 0.0 {
            errors.push(format!(
                "Section '{}' must have a positive width and height",
                section.id
            ));
        }
        if p.x + p.width > 100.0 + f32::EPSILON {
            errors.push(format!(
                "Section '{}' extends past the right edge ({} + {} > 100)",
                section.id, p.x, p.width
            ));
        }
        if section.page >= template.max_pages.max(1) {
            errors.push(format!(
                "Section '{}' targets page {} but maxPages is {}",
                section.id, section.page, template.max_pages
            ));
        }
    }

    TemplateValidation {
        is_valid: errors.is_empty(),
        errors,
    }
}
