//! Page IR – the frozen, writer-agnostic description of what goes on each
//! page. The renderer produces it; [`crate::writer`] turns it into PDF
//! bytes.
//!
//! Coordinates are millimetres from the top-left corner of the page.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::color::Rgb;
use crate::fonts::FontFamily;
use crate::layout::Rect;

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

/// A PNG produced by rasterising a drawing surface (or decoded from a data
/// URI). Shared between pages by `Arc`; the writer embeds each id once.
#[derive(Debug)]
pub struct RasterImage {
    pub id: u64,
    /// Encoded PNG or JPEG bytes.
    pub encoded: Vec<u8>,
    pub px_width: u32,
    pub px_height: u32,
}

impl RasterImage {
    pub fn new(encoded: Vec<u8>, px_width: u32, px_height: u32) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed),
            encoded,
            px_width,
            px_height,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Rgb,
    pub width_pt: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Left edge.
    pub x: f32,
    /// Top of the first line.
    pub y: f32,
    pub lines: Vec<String>,
    pub family: FontFamily,
    pub size_pt: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Rgb,
    /// Distance between consecutive baselines.
    pub line_height: f32,
}

impl TextBlock {
    pub fn height(&self) -> f32 {
        self.lines.len() as f32 * self.line_height
    }
}

/// One drawable item on a page.
#[derive(Debug, Clone)]
pub enum Element {
    Rect {
        rect: Rect,
        radius: f32,
        fill: Option<Rgb>,
        stroke: Option<StrokeStyle>,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        stroke: StrokeStyle,
    },
    Text(TextBlock),
    Image {
        rect: Rect,
        image: Arc<RasterImage>,
    },
}

#[derive(Debug, Clone, Default)]
pub struct PageLayout {
    pub index: usize,
    pub elements: Vec<Element>,
}

impl PageLayout {
    pub fn push(&mut self, element: Element) {
        self.elements.push(element);
    }

    pub fn texts(&self) -> impl Iterator<Item = &TextBlock> {
        self.elements.iter().filter_map(|e| match e {
            Element::Text(t) => Some(t),
            _ => None,
        })
    }
}

/// A complete document ready for the writer.
#[derive(Debug, Clone)]
pub struct DocumentLayout {
    pub title: String,
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    pub fn new(title: &str, page_width_mm: f32, page_height_mm: f32) -> Self {
        Self {
            title: title.to_string(),
            page_width_mm,
            page_height_mm,
            pages: Vec::new(),
        }
    }

    /// Start a new page and return its index.
    pub fn add_page(&mut self) -> usize {
        let index = self.pages.len();
        self.pages.push(PageLayout {
            index,
            elements: Vec::new(),
        });
        index
    }

    /// The page currently being drawn, created on first use.
    pub fn current_page_mut(&mut self) -> &mut PageLayout {
        if self.pages.is_empty() {
            self.add_page();
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn element_count(&self) -> usize {
        self.pages.iter().map(|p| p.elements.len()).sum()
    }

    /// Number of distinct raster images across all pages.
    pub fn unique_image_count(&self) -> usize {
        let mut ids = HashSet::new();
        for page in &self.pages {
            for el in &page.elements {
                if let Element::Image { image, .. } = el {
                    ids.insert(image.id);
                }
            }
        }
        ids.len()
    }

    /// All text lines in drawing order, useful for content checks.
    pub fn all_text(&self) -> Vec<&str> {
        self.pages
            .iter()
            .flat_map(|p| p.texts())
            .flat_map(|t| t.lines.iter().map(String::as_str))
            .collect()
    }
}
