//! Preflight height estimation and page cursors.
//!
//! The document writer cannot reflow, so every multi-line block is measured
//! before anything is drawn. The estimator returns the exact lines the
//! renderer will draw together with the height they occupy, so the estimate
//! and the drawing can never disagree.

use crate::data::{ExperienceItem, ProjectItem, SkillCategory};
use crate::fonts::{FontFamily, FontManager, TypeSizes};

/// Per-line costs in millimetres.
pub const TITLE_LINE_MM: f32 = 6.0;
pub const META_LINE_MM: f32 = 5.0;
pub const DESCRIPTION_LINE_MM: f32 = 4.5;
pub const ACHIEVEMENT_LINE_MM: f32 = 4.5;
pub const TECH_LINE_MM: f32 = 5.0;
pub const CATEGORY_HEADING_MM: f32 = 6.0;
pub const CATEGORY_LINE_MM: f32 = 4.5;
/// Running section header (title + rule).
pub const SECTION_HEADER_MM: f32 = 10.0;

pub const MAX_DESCRIPTION_LINES: usize = 2;
pub const MAX_ACHIEVEMENTS: usize = 3;

/// Inner padding of a card, applied top and bottom.
pub const CARD_PADDING_MM: f32 = 3.0;
/// Vertical gap after a block.
pub const BLOCK_SPACING_MM: f32 = 4.0;

const EPSILON: f32 = 1e-3;

/// Lines of a card-style block, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedBlock {
    pub title: String,
    pub meta: Option<String>,
    pub description: Vec<String>,
    pub bullets: Vec<String>,
    pub tech: Option<String>,
    /// Card height including padding.
    pub height: f32,
}

impl PreparedBlock {
    fn measure(&mut self) {
        let mut h = TITLE_LINE_MM;
        if self.meta.is_some() {
            h += META_LINE_MM;
        }
        h += self.description.len() as f32 * DESCRIPTION_LINE_MM;
        h += self.bullets.len() as f32 * ACHIEVEMENT_LINE_MM;
        if self.tech.is_some() {
            h += TECH_LINE_MM;
        }
        self.height = h + 2.0 * CARD_PADDING_MM;
    }

    /// Space to reserve: the larger of the measured and upstream estimates.
    pub fn reserved(&self, upstream_estimate: f32) -> f32 {
        self.height.max(upstream_estimate)
    }
}

/// A skill category as heading plus wrapped name lines.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedCategory {
    pub heading: String,
    pub lines: Vec<String>,
    pub height: f32,
}

/// Measures blocks with the fonts and sizes the renderer draws with.
#[derive(Debug, Clone)]
pub struct Estimator<'a> {
    fonts: &'a FontManager,
    body: FontFamily,
    heading: FontFamily,
    sizes: TypeSizes,
}

impl<'a> Estimator<'a> {
    pub fn new(fonts: &'a FontManager, body: FontFamily, heading: FontFamily, sizes: TypeSizes) -> Self {
        Self {
            fonts,
            body,
            heading,
            sizes,
        }
    }

    /// Size of block titles.
    pub fn title_size(&self) -> f32 {
        self.sizes.body
    }

    pub fn meta_size(&self) -> f32 {
        self.sizes.small
    }

    pub fn text_size(&self) -> f32 {
        self.sizes.caption
    }

    fn clip(&self, text: &str, size: f32, bold: bool, width: f32) -> String {
        let family = if bold { self.heading } else { self.body };
        self.fonts.truncate_to_width(text, size, family, bold, width)
    }

    fn description(&self, text: &str, width: f32) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        let mut lines = self
            .fonts
            .wrap_text(text.trim(), self.text_size(), self.body, false, width);
        if lines.len() > MAX_DESCRIPTION_LINES {
            let rest = lines[MAX_DESCRIPTION_LINES - 1..].join(" ");
            lines.truncate(MAX_DESCRIPTION_LINES - 1);
            lines.push(self.clip(&rest, self.text_size(), false, width));
        }
        lines
    }

    fn bullets(&self, items: &[String], width: f32) -> Vec<String> {
        items
            .iter()
            .filter(|a| !a.trim().is_empty())
            .take(MAX_ACHIEVEMENTS)
            .map(|a| self.clip(&format!("- {}", a.trim()), self.text_size(), false, width))
            .collect()
    }

    fn tech(&self, technologies: &[String], width: f32) -> Option<String> {
        if technologies.is_empty() {
            return None;
        }
        Some(self.clip(&technologies.join(", "), self.meta_size(), false, width))
    }

    /// `width` is the text width inside the card padding.
    pub fn experience(&self, item: &ExperienceItem, width: f32) -> PreparedBlock {
        let meta = item.meta_line();
        let mut block = PreparedBlock {
            title: self.clip(&item.title, self.title_size(), true, width),
            meta: (!meta.trim().is_empty()).then(|| self.clip(&meta, self.meta_size(), false, width)),
            description: self.description(&item.description, width),
            bullets: self.bullets(&item.achievements, width),
            tech: self.tech(&item.technologies, width),
            height: 0.0,
        };
        block.measure();
        block
    }

    pub fn project(&self, item: &ProjectItem, width: f32) -> PreparedBlock {
        let meta = match (item.role.as_deref(), item.url.as_deref()) {
            (Some(role), Some(url)) => Some(format!("{role} | {url}")),
            (Some(role), None) => Some(role.to_string()),
            (None, Some(url)) => Some(url.to_string()),
            (None, None) => None,
        };
        let mut block = PreparedBlock {
            title: self.clip(&item.name, self.title_size(), true, width),
            meta: meta.map(|m| self.clip(&m, self.meta_size(), false, width)),
            description: self.description(&item.description, width),
            bullets: self.bullets(&item.highlights, width),
            tech: self.tech(&item.technologies, width),
            height: 0.0,
        };
        block.measure();
        block
    }

    /// Category heading plus the comma-joined skill names wrapped to `width`.
    pub fn category(&self, category: &SkillCategory, width: f32) -> PreparedCategory {
        let lines = if category.skills.is_empty() {
            Vec::new()
        } else {
            self.fonts
                .wrap_text(&category.skills.join(", "), self.sizes.body, self.body, false, width)
        };
        PreparedCategory {
            heading: category.name.clone(),
            height: CATEGORY_HEADING_MM + lines.len() as f32 * CATEGORY_LINE_MM,
            lines,
        }
    }
}

/// Vertical position on the current page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageCursor {
    pub y: f32,
    pub page: usize,
    top: f32,
    limit: f32,
}

impl PageCursor {
    pub fn new(top: f32, limit: f32) -> Self {
        Self {
            y: top,
            page: 0,
            top,
            limit,
        }
    }

    pub fn limit(&self) -> f32 {
        self.limit
    }

    pub fn top(&self) -> f32 {
        self.top
    }

    /// True when a block of `height` starting at the cursor stays above the
    /// bottom margin.
    pub fn fits(&self, height: f32) -> bool {
        self.y + height <= self.limit + EPSILON
    }

    /// True when nothing has been placed since the page started.
    pub fn at_top(&self) -> bool {
        self.y <= self.top + EPSILON
    }

    pub fn advance(&mut self, height: f32) {
        self.y += height;
    }

    pub fn new_page(&mut self) {
        self.page += 1;
        self.y = self.top;
    }
}

/// Two independent column cursors sharing one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnFlow {
    ys: [f32; 2],
    limit: f32,
}

impl ColumnFlow {
    pub fn new(top: f32, limit: f32) -> Self {
        Self {
            ys: [top, top],
            limit,
        }
    }

    /// Column with the smaller accumulated y; ties go left.
    pub fn pick(&self) -> usize {
        if self.ys[1] < self.ys[0] {
            1
        } else {
            0
        }
    }

    pub fn y(&self, column: usize) -> f32 {
        self.ys[column]
    }

    pub fn fits(&self, column: usize, height: f32) -> bool {
        self.ys[column] + height <= self.limit + EPSILON
    }

    /// Reserve `height` plus `gap` in `column` and return the block's top.
    pub fn place(&mut self, column: usize, height: f32, gap: f32) -> f32 {
        let y = self.ys[column];
        self.ys[column] += height + gap;
        y
    }

    pub fn bottom(&self) -> f32 {
        self.ys[0].max(self.ys[1])
    }

    pub fn reset(&mut self, top: f32) {
        self.ys = [top, top];
    }
}

/// Smallest block a column can still accept.
pub fn minimal_block_height() -> f32 {
    TITLE_LINE_MM + META_LINE_MM + 2.0 * CARD_PADDING_MM
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator(fonts: &FontManager) -> Estimator<'_> {
        Estimator::new(fonts, FontFamily::Helvetica, FontFamily::Helvetica, TypeSizes::BASE)
    }

    fn long_item() -> ExperienceItem {
        ExperienceItem {
            id: "e1".into(),
            title: "Staff Engineer".into(),
            company: "Acme".into(),
            start_date: "2019".into(),
            current: true,
            description: "Led the migration of a large monolith to services. ".repeat(10),
            achievements: (0..6).map(|i| format!("Shipped milestone {i}")).collect(),
            technologies: vec!["Rust".into(), "Postgres".into()],
            ..ExperienceItem::default()
        }
    }

    #[test]
    fn experience_caps_description_and_bullets() {
        let fonts = FontManager::default();
        let block = estimator(&fonts).experience(&long_item(), 70.0);
        assert_eq!(block.description.len(), MAX_DESCRIPTION_LINES);
        assert!(block.description[1].ends_with("..."));
        assert_eq!(block.bullets.len(), MAX_ACHIEVEMENTS);
        assert!(block.tech.is_some());
        let expected = TITLE_LINE_MM
            + META_LINE_MM
            + 2.0 * DESCRIPTION_LINE_MM
            + 3.0 * ACHIEVEMENT_LINE_MM
            + TECH_LINE_MM
            + 2.0 * CARD_PADDING_MM;
        assert!((block.height - expected).abs() < 1e-4);
    }

    #[test]
    fn reserved_height_respects_upstream_estimate() {
        let fonts = FontManager::default();
        let block = estimator(&fonts).experience(&ExperienceItem::default(), 70.0);
        assert_eq!(block.reserved(80.0), 80.0);
        assert_eq!(block.reserved(0.0), block.height);
    }

    #[test]
    fn category_lines_match_wrap() {
        let fonts = FontManager::default();
        let cat = SkillCategory {
            name: "Infrastructure".into(),
            skills: (0..6).map(|i| format!("Very Long Skill Name Number {i}")).collect(),
        };
        let prepared = estimator(&fonts).category(&cat, 60.0);
        let wrapped = fonts.wrap_text(&cat.skills.join(", "), 11.0, FontFamily::Helvetica, false, 60.0);
        assert_eq!(prepared.lines, wrapped);
        assert!(prepared.lines.len() > 1);
    }

    #[test]
    fn cursor_fits_up_to_limit() {
        let mut c = PageCursor::new(15.0, 282.0);
        assert!(c.fits(267.0));
        assert!(!c.fits(267.5));
        c.advance(200.0);
        assert!(!c.at_top());
        c.new_page();
        assert_eq!((c.page, c.y), (1, 15.0));
    }

    #[test]
    fn columns_balance_by_min_y() {
        let mut flow = ColumnFlow::new(0.0, 100.0);
        let mut counts = [0, 0];
        for _ in 0..6 {
            let col = flow.pick();
            flow.place(col, 30.0, 0.0);
            counts[col] += 1;
        }
        assert_eq!(counts, [3, 3]);
        assert!(!flow.fits(flow.pick(), minimal_block_height()));
    }
}
