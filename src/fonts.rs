//! Typeface resolution and the type scale.
//!
//! Only the PDF base-14 families are available, so text is measured with
//! per-family average advance widths rather than real glyph metrics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::layout::{PT_PER_MM, A4_WIDTH_PT};
use crate::template::{Density, TypographyBase};

/// Built-in font families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontFamily {
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Family used when nothing else resolves.
    pub const UNIVERSAL: FontFamily = FontFamily::Helvetica;

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "helvetica" | "sans-serif" => Some(FontFamily::Helvetica),
            "times" | "times-roman" | "times new roman" | "serif" => Some(FontFamily::Times),
            "courier" | "courier new" | "monospace" => Some(FontFamily::Courier),
            _ => None,
        }
    }

    /// Average advance width as a fraction of the em.
    fn average_advance(self, bold: bool) -> f32 {
        match (self, bold) {
            (FontFamily::Helvetica, false) => 0.5,
            (FontFamily::Helvetica, true) => 0.55,
            (FontFamily::Times, false) => 0.45,
            (FontFamily::Times, true) => 0.5,
            (FontFamily::Courier, _) => 0.6,
        }
    }
}

/// Logical role a piece of text plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontPurpose {
    Primary,
    Secondary,
    Monospace,
    Heading,
    Body,
}

impl FontPurpose {
    fn fallbacks(self) -> &'static [FontFamily] {
        match self {
            FontPurpose::Monospace => &[FontFamily::Courier, FontFamily::Helvetica],
            FontPurpose::Secondary => &[FontFamily::Times, FontFamily::Helvetica],
            _ => &[FontFamily::Helvetica, FontFamily::Times],
        }
    }
}

/// Resolves font purposes and measures text.
#[derive(Debug, Clone)]
pub struct FontManager {
    available: Vec<FontFamily>,
    preferred: HashMap<FontPurpose, String>,
}

impl FontManager {
    pub fn new() -> Self {
        Self {
            available: vec![FontFamily::Helvetica, FontFamily::Times, FontFamily::Courier],
            preferred: HashMap::new(),
        }
    }

    /// Manager honouring the template's preferred families.
    pub fn for_typography(base: &TypographyBase) -> Self {
        let mut mgr = Self::new();
        mgr.prefer(FontPurpose::Primary, &base.font_family);
        mgr.prefer(FontPurpose::Body, &base.font_family);
        let heading = base.heading_family.as_deref().unwrap_or(&base.font_family);
        mgr.prefer(FontPurpose::Heading, heading);
        if let Some(mono) = &base.monospace_family {
            mgr.prefer(FontPurpose::Monospace, mono);
        }
        mgr
    }

    /// Restrict the set of usable families.
    pub fn with_available(mut self, families: Vec<FontFamily>) -> Self {
        self.available = families;
        self
    }

    pub fn prefer(&mut self, purpose: FontPurpose, family: &str) {
        self.preferred.insert(purpose, family.to_string());
    }

    /// Preferred family, then the purpose's fallbacks, then Helvetica.
    pub fn resolve(&self, purpose: FontPurpose) -> FontFamily {
        let preferred = self
            .preferred
            .get(&purpose)
            .and_then(|name| FontFamily::from_name(name))
            .filter(|f| self.available.contains(f));
        if let Some(family) = preferred {
            return family;
        }
        if let Some(name) = self.preferred.get(&purpose) {
            log::debug!("font '{name}' unavailable for {purpose:?}, using fallback");
        }
        purpose
            .fallbacks()
            .iter()
            .copied()
            .find(|f| self.available.contains(f))
            .unwrap_or(FontFamily::UNIVERSAL)
    }

    /// Width of `text` in millimetres.
    pub fn measure_text_width(&self, text: &str, size_pt: f32, family: FontFamily, bold: bool) -> f32 {
        let width_pt = text.chars().count() as f32 * size_pt * family.average_advance(bold);
        width_pt / PT_PER_MM
    }

    /// Word-wrap `text` into lines no wider than `max_width` millimetres.
    /// Words longer than a line are broken by character.
    pub fn wrap_text(
        &self,
        text: &str,
        size_pt: f32,
        family: FontFamily,
        bold: bool,
        max_width: f32,
    ) -> Vec<String> {
        if max_width <= 0.0 || text.is_empty() {
            return vec![text.to_string()];
        }

        let mut lines: Vec<String> = Vec::new();
        for paragraph in text.split('\n') {
            let words: Vec<&str> = paragraph.split_whitespace().collect();
            if words.is_empty() {
                lines.push(String::new());
                continue;
            }

            let mut current_line = String::new();
            for word in words {
                let candidate = if current_line.is_empty() {
                    word.to_string()
                } else {
                    format!("{current_line} {word}")
                };
                if self.measure_text_width(&candidate, size_pt, family, bold) <= max_width {
                    current_line = candidate;
                    continue;
                }
                if !current_line.is_empty() {
                    lines.push(std::mem::take(&mut current_line));
                }
                // The word alone may still be too wide.
                let mut piece = String::new();
                for ch in word.chars() {
                    piece.push(ch);
                    if piece.chars().count() > 1
                        && self.measure_text_width(&piece, size_pt, family, bold) > max_width
                    {
                        piece.pop();
                        lines.push(std::mem::take(&mut piece));
                        piece.push(ch);
                    }
                }
                current_line = piece;
            }
            if !current_line.is_empty() {
                lines.push(current_line);
            }
        }

        if lines.is_empty() {
            lines.push(String::new());
        }
        lines
    }

    /// Trim `text` to one line, appending an ellipsis when cut.
    pub fn truncate_to_width(
        &self,
        text: &str,
        size_pt: f32,
        family: FontFamily,
        bold: bool,
        max_width: f32,
    ) -> String {
        if self.measure_text_width(text, size_pt, family, bold) <= max_width {
            return text.to_string();
        }
        let mut out: String = String::new();
        for ch in text.chars() {
            out.push(ch);
            let probe = format!("{}...", out.trim_end());
            if self.measure_text_width(&probe, size_pt, family, bold) > max_width {
                out.pop();
                break;
            }
        }
        format!("{}...", out.trim_end())
    }
}

impl Default for FontManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Named sizes in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TypeSizes {
    pub name: f32,
    pub title: f32,
    pub section_header: f32,
    pub body: f32,
    pub caption: f32,
    pub small: f32,
}

impl TypeSizes {
    pub const BASE: TypeSizes = TypeSizes {
        name: 24.0,
        title: 16.0,
        section_header: 14.0,
        body: 11.0,
        caption: 10.0,
        small: 9.0,
    };

    fn map(self, f: impl Fn(f32) -> f32) -> Self {
        TypeSizes {
            name: f(self.name),
            title: f(self.title),
            section_header: f(self.section_header),
            body: f(self.body),
            caption: f(self.caption),
            small: f(self.small),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RoleMetrics {
    pub heading: f32,
    pub body: f32,
    pub small: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TypographyScale {
    pub sizes: TypeSizes,
    pub line_height: RoleMetrics,
    /// Letter spacing in em.
    pub tracking: RoleMetrics,
}

impl TypographyScale {
    /// Height of one line of `size_pt` text in millimetres.
    pub fn line_mm(size_pt: f32, line_height: f32) -> f32 {
        size_pt * line_height / PT_PER_MM
    }
}

pub fn density_factor(density: Density) -> f32 {
    match density {
        Density::Compact => 0.95,
        Density::Normal => 1.0,
        Density::Spacious => 1.05,
    }
}

/// Type scale for a page width (points) and density.
pub fn typography_scale(page_width_pt: f32, density: Density) -> TypographyScale {
    let mut sizes = TypeSizes::BASE;
    if page_width_pt > A4_WIDTH_PT {
        let factor = (page_width_pt / A4_WIDTH_PT).min(1.1);
        sizes = sizes.map(|s| (s * factor).round());
    }
    let density = density_factor(density);
    sizes = sizes.map(|s| (s * density).round());

    TypographyScale {
        sizes,
        line_height: RoleMetrics {
            heading: 1.15,
            body: 1.35,
            small: 1.3,
        },
        tracking: RoleMetrics {
            heading: 0.0,
            body: 0.0,
            small: 0.01,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristic_text_width() {
        let mgr = FontManager::default();
        // 5 chars × 16pt × 0.5 = 40pt
        let w = mgr.measure_text_width("Hello", 16.0, FontFamily::Helvetica, false);
        assert!((w - 40.0 / PT_PER_MM).abs() < 1e-3);
    }

    #[test]
    fn word_wrap_basic() {
        let mgr = FontManager::default();
        let lines = mgr.wrap_text("Hello world foo bar", 16.0, FontFamily::Helvetica, false, 25.0);
        assert!(lines.len() >= 2, "Expected wrapping, got {:?}", lines);
        for line in &lines {
            assert!(mgr.measure_text_width(line, 16.0, FontFamily::Helvetica, false) <= 25.0);
        }
    }

    #[test]
    fn long_words_are_broken() {
        let mgr = FontManager::default();
        let lines = mgr.wrap_text(&"x".repeat(200), 10.0, FontFamily::Courier, false, 30.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat().len(), 200);
    }

    #[test]
    fn truncation_adds_ellipsis() {
        let mgr = FontManager::default();
        let t = mgr.truncate_to_width(&"word ".repeat(40), 10.0, FontFamily::Helvetica, false, 40.0);
        assert!(t.ends_with("..."));
        assert!(mgr.measure_text_width(&t, 10.0, FontFamily::Helvetica, false) <= 40.0);
    }

    #[test]
    fn resolution_falls_back_and_never_fails() {
        let mut mgr = FontManager::new();
        mgr.prefer(FontPurpose::Heading, "Comic Sans");
        assert_eq!(mgr.resolve(FontPurpose::Heading), FontFamily::Helvetica);
        mgr.prefer(FontPurpose::Body, "times new roman");
        assert_eq!(mgr.resolve(FontPurpose::Body), FontFamily::Times);
        assert_eq!(mgr.resolve(FontPurpose::Monospace), FontFamily::Courier);

        let bare = FontManager::new().with_available(vec![]);
        assert_eq!(bare.resolve(FontPurpose::Monospace), FontFamily::UNIVERSAL);
    }

    #[test]
    fn a4_scale_is_the_base_scale() {
        let s = typography_scale(595.28, Density::Normal);
        assert_eq!(s.sizes, TypeSizes::BASE);
        assert_eq!(s.line_height.body, 1.35);
        assert_eq!(s.tracking.small, 0.01);
    }

    #[test]
    fn wide_pages_scale_up_to_ten_percent() {
        let s = typography_scale(842.0, Density::Normal);
        assert_eq!(s.sizes.name, 26.0);
        assert_eq!(s.sizes.body, 12.0);
        assert_eq!(s.sizes.small, 10.0);
    }

    #[test]
    fn density_applies_after_width() {
        let s = typography_scale(595.0, Density::Compact);
        assert_eq!(s.sizes.name, 23.0);
        assert_eq!(s.sizes.title, 15.0);
        let s = typography_scale(595.0, Density::Spacious);
        assert_eq!(s.sizes.name, 25.0);
        assert_eq!(s.sizes.body, 12.0);
    }
}
