//! Page geometry.
//!
//! All rectangles are in millimetres with the origin at the top-left of the
//! page. Pixel conversions exist in two flavours: DPI-based for surface
//! allocation and surface-relative for compositing onto an already
//! allocated surface.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use crate::template::{LayoutConfig, Orientation, PageFormat, SectionPosition};

pub const MM_PER_INCH: f32 = 25.4;
pub const PT_PER_MM: f32 = 72.0 / MM_PER_INCH;
pub const GRID_COLUMNS: u32 = 16;
/// Sidebar width as a fraction of the page width.
pub const SIDEBAR_RATIO: f32 = 0.35;
/// A4 width in points, the reference for type scaling.
pub const A4_WIDTH_PT: f32 = 595.0;

/// Axis-aligned rectangle in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Shrink by `pad` on every side; never produces negative sizes.
    pub fn inset(&self, pad: f32) -> Rect {
        Rect {
            x: self.x + pad,
            y: self.y + pad,
            width: (self.width - 2.0 * pad).max(0.0),
            height: (self.height - 2.0 * pad).max(0.0),
        }
    }

    /// Grow by `pad` on every side.
    pub fn outset(&self, pad: f32) -> Rect {
        Rect {
            x: self.x - pad,
            y: self.y - pad,
            width: self.width + 2.0 * pad,
            height: self.height + 2.0 * pad,
        }
    }

    pub fn with_height(&self, height: f32) -> Rect {
        Rect { height, ..*self }
    }
}

/// Page size in millimetres, swapped for landscape.
pub fn page_size(format: PageFormat, orientation: Orientation) -> (f32, f32) {
    let (w, h) = match format {
        PageFormat::A4 => (210.0, 297.0),
        PageFormat::Letter => (215.9, 279.4),
        PageFormat::Legal => (215.9, 355.6),
    };
    match orientation {
        Orientation::Portrait => (w, h),
        Orientation::Landscape => (h, w),
    }
}

pub fn mm_to_px(mm: f32, dpi: f32) -> f32 {
    mm / MM_PER_INCH * dpi
}

pub fn px_to_mm(px: f32, dpi: f32) -> f32 {
    px / dpi * MM_PER_INCH
}

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * PT_PER_MM
}

pub fn pt_to_mm(pt: f32) -> f32 {
    pt / PT_PER_MM
}

/// Map a millimetre length onto a surface that is `surface_px` wide and
/// represents `target_mm` of page width.
pub fn mm_to_canvas_px(mm: f32, surface_px: u32, target_mm: f32) -> f32 {
    if target_mm <= 0.0 {
        return 0.0;
    }
    mm * surface_px as f32 / target_mm
}

/// Pixel size of a surface covering `rect` at `dpi`, at least 1×1.
pub fn surface_size(width_mm: f32, height_mm: f32, dpi: f32) -> (u32, u32) {
    let w = mm_to_px(width_mm, dpi).ceil().max(1.0) as u32;
    let h = mm_to_px(height_mm, dpi).ceil().max(1.0) as u32;
    (w, h)
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

/// Padding for a card at `level`: +12 % per elevation step.
pub fn elevated_padding(base: f32, level: u8) -> f32 {
    round2(base * (1.0 + level as f32 * 0.12))
}

/// Gutter for a card at `level`: +8 % per elevation step.
pub fn elevated_gutter(base: f32, level: u8) -> f32 {
    round2(base * (1.0 + level as f32 * 0.08))
}

/// Geometry derived from one [`LayoutConfig`].
#[derive(Debug, Clone)]
pub struct LayoutManager {
    config: LayoutConfig,
    page: Rect,
    content: Rect,
    gutter: f32,
    column_width: f32,
}

impl LayoutManager {
    pub fn new(config: &LayoutConfig) -> Result<Self, RenderError> {
        let (w, h) = page_size(config.format, config.orientation);
        let m = &config.margins;
        let content = Rect::new(m.left, m.top, w - m.left - m.right, h - m.top - m.bottom);
        if content.is_empty() {
            return Err(RenderError::Geometry(format!(
                "margins leave no content area on a {w}x{h}mm page"
            )));
        }
        let spacing = &config.spacing;
        let gutter = (spacing.element + (spacing.paragraph - spacing.element) * 0.5).clamp(2.0, 10.0);
        let columns = GRID_COLUMNS as f32;
        let column_width = (content.width - (columns - 1.0) * gutter) / columns;
        if column_width <= 0.0 {
            return Err(RenderError::Geometry(format!(
                "content width {:.1}mm is too narrow for a {GRID_COLUMNS}-column grid",
                content.width
            )));
        }
        Ok(Self {
            config: config.clone(),
            page: Rect::new(0.0, 0.0, w, h),
            content,
            gutter,
            column_width,
        })
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn page_rect(&self) -> Rect {
        self.page
    }

    pub fn page_width_pt(&self) -> f32 {
        mm_to_pt(self.page.width)
    }

    pub fn content_rect(&self) -> Rect {
        self.content
    }

    /// Lowest y any block may reach.
    pub fn bottom_limit(&self) -> f32 {
        self.page.height - self.config.margins.bottom
    }

    pub fn sidebar_rect(&self) -> Rect {
        Rect::new(
            self.content.x,
            self.content.y,
            self.page.width * SIDEBAR_RATIO,
            self.content.height,
        )
    }

    pub fn main_rect(&self) -> Rect {
        let sidebar = self.sidebar_rect();
        Rect::new(
            sidebar.right() + self.config.column_gap,
            self.content.y,
            (self.content.width - sidebar.width - self.config.column_gap).max(0.0),
            self.content.height,
        )
    }

    /// The two equal columns of a split layout.
    pub fn split_columns(&self, within: Rect) -> [Rect; 2] {
        let w = ((within.width - self.config.column_gap) / 2.0).max(0.0);
        [
            Rect::new(within.x, within.y, w, within.height),
            Rect::new(within.x + w + self.config.column_gap, within.y, w, within.height),
        ]
    }

    pub fn grid_gutter(&self) -> f32 {
        self.gutter
    }

    pub fn grid_column_width(&self) -> f32 {
        self.column_width
    }

    /// Rectangle covering `span` columns starting at zero-based `start_col`.
    /// Both arguments are clamped so the result always lies on the grid.
    pub fn grid_rect_by_span(&self, start_col: u32, span: u32) -> Rect {
        let start = start_col.min(GRID_COLUMNS - 1);
        let span = span.clamp(1, GRID_COLUMNS - start);
        let x = self.content.x + start as f32 * (self.column_width + self.gutter);
        let width = span as f32 * self.column_width + (span - 1) as f32 * self.gutter;
        Rect::new(x, self.content.y, width, self.content.height)
    }

    /// Span (and its rectangle) whose width is closest to `target_width`.
    pub fn snap_width_to_grid(&self, start_col: u32, target_width: f32) -> (u32, Rect) {
        let start = start_col.min(GRID_COLUMNS - 1);
        let mut best = (1, self.grid_rect_by_span(start, 1));
        let mut best_delta = f32::MAX;
        for span in 1..=(GRID_COLUMNS - start) {
            let rect = self.grid_rect_by_span(start, span);
            let delta = (rect.width - target_width).abs();
            if delta < best_delta {
                best_delta = delta;
                best = (span, rect);
            }
        }
        best
    }

    /// Snap a legacy percentage position onto the grid. Only the horizontal
    /// extent is snapped; vertical placement follows document flow.
    pub fn snap_section(&self, position: &SectionPosition) -> Rect {
        let start = ((position.x / 100.0) * GRID_COLUMNS as f32)
            .round()
            .clamp(0.0, (GRID_COLUMNS - 1) as f32) as u32;
        let target = self.content.width * position.width.clamp(0.0, 100.0) / 100.0;
        self.snap_width_to_grid(start, target).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::Margins;

    fn a4(margin: f32) -> LayoutManager {
        LayoutManager::new(&LayoutConfig {
            margins: Margins::uniform(margin),
            ..LayoutConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn page_sizes() {
        assert_eq!(page_size(PageFormat::A4, Orientation::Portrait), (210.0, 297.0));
        assert_eq!(page_size(PageFormat::A4, Orientation::Landscape), (297.0, 210.0));
        let (w, h) = page_size(PageFormat::Letter, Orientation::Portrait);
        assert!((w - 216.0).abs() < 0.2 && (h - 279.0).abs() < 0.5);
        let (_, h) = page_size(PageFormat::Legal, Orientation::Portrait);
        assert!((h - 356.0).abs() < 0.5);
    }

    #[test]
    fn unit_conversions() {
        assert!((mm_to_px(25.4, 96.0) - 96.0).abs() < 1e-4);
        assert!((px_to_mm(96.0, 96.0) - 25.4).abs() < 1e-4);
        assert!((mm_to_canvas_px(10.0, 200, 20.0) - 100.0).abs() < 1e-4);
        assert_eq!(surface_size(0.0, 0.0, 96.0), (1, 1));
    }

    #[test]
    fn content_sidebar_and_main() {
        let lm = a4(15.0);
        assert_eq!(lm.content_rect(), Rect::new(15.0, 15.0, 180.0, 267.0));
        let sidebar = lm.sidebar_rect();
        assert!((sidebar.width - 73.5).abs() < 1e-4);
        let main = lm.main_rect();
        assert!((main.width - (180.0 - 73.5 - 6.0)).abs() < 1e-4);
        assert_eq!(lm.bottom_limit(), 282.0);
    }

    #[test]
    fn empty_content_is_a_geometry_error() {
        let err = LayoutManager::new(&LayoutConfig {
            margins: Margins::uniform(120.0),
            ..LayoutConfig::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("no content area"));
    }

    #[test]
    fn grid_gutter_is_interpolated_and_clamped() {
        // default spacing: element 3, paragraph 5 → 4
        assert!((a4(15.0).grid_gutter() - 4.0).abs() < 1e-6);
        let mut cfg = LayoutConfig::default();
        cfg.spacing.element = 20.0;
        cfg.spacing.paragraph = 30.0;
        assert_eq!(LayoutManager::new(&cfg).unwrap().grid_gutter(), 10.0);
    }

    #[test]
    fn grid_spans_cover_content() {
        let lm = a4(15.0);
        let full = lm.grid_rect_by_span(0, 16);
        assert!((full.width - lm.content_rect().width).abs() < 1e-3);
        // out-of-range inputs are clamped
        assert_eq!(lm.grid_rect_by_span(40, 3), lm.grid_rect_by_span(15, 1));
        assert_eq!(lm.grid_rect_by_span(4, 0), lm.grid_rect_by_span(4, 1));
        // pure: same inputs, same output
        assert_eq!(lm.grid_rect_by_span(3, 5), lm.grid_rect_by_span(3, 5));
    }

    #[test]
    fn snapping_picks_closest_span() {
        let lm = a4(15.0);
        let half = lm.content_rect().width / 2.0;
        let (span, rect) = lm.snap_width_to_grid(0, half);
        assert_eq!(span, 8);
        assert!((rect.width - half).abs() <= lm.grid_column_width());
        let snapped = lm.snap_section(&SectionPosition {
            x: 50.0,
            y: 0.0,
            width: 50.0,
            height: 10.0,
        });
        assert!((snapped.right() - lm.content_rect().right()).abs() < 1e-3);
    }

    #[test]
    fn elevation_scaling() {
        assert_eq!(elevated_padding(4.0, 0), 4.0);
        assert_eq!(elevated_padding(4.0, 3), 5.44);
        assert_eq!(elevated_gutter(5.0, 4), 6.6);
    }
}
