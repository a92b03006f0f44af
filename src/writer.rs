//! PDF writer – takes a [`DocumentLayout`] and produces PDF bytes using
//! `printpdf` (v0.8 ops-based API).

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64_STD, Engine as _};
use printpdf::*;

use crate::color::Rgb as Colour;
use crate::document::{DocumentLayout, Element, StrokeStyle, TextBlock};
use crate::error::RenderError;
use crate::fonts::FontFamily;
use crate::layout::{mm_to_pt, Rect};

/// Optional writer features a render may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Deflate page streams.
    Compression,
    /// Embed each shared raster image once.
    ImageDeduplication,
    /// Embedded ICC output intent.
    ColorProfile,
    /// Explicit PDF version header.
    VersionOverride,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::Compression,
        Capability::ImageDeduplication,
        Capability::ColorProfile,
        Capability::VersionOverride,
    ];
}

/// What the backend supports, resolved once per document.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityTable {
    supported: HashMap<Capability, bool>,
}

impl Default for CapabilityTable {
    fn default() -> Self {
        Self::resolve()
    }
}

impl CapabilityTable {
    pub fn resolve() -> Self {
        let supported = Capability::ALL
            .iter()
            .map(|c| {
                let ok = matches!(c, Capability::Compression | Capability::ImageDeduplication);
                (*c, ok)
            })
            .collect();
        Self { supported }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.supported.get(&capability).copied().unwrap_or(false)
    }

    /// Filter `requested` down to what the backend can do. Unsupported
    /// requests are dropped with a debug log.
    pub fn apply(&self, requested: &[Capability]) -> Vec<Capability> {
        requested
            .iter()
            .copied()
            .filter(|c| {
                let ok = self.supports(*c);
                if !ok {
                    log::debug!("writer capability {c:?} unavailable, skipping");
                }
                ok
            })
            .collect()
    }
}

/// A printpdf XObject together with the pixel dimensions of the source image.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Cubic approximation constant for quarter circles.
const KAPPA: f32 = 0.552_284_8;

/// Write a page IR into PDF bytes.
///
/// Images that fail to decode are skipped with a `log::warn`.
pub fn write_pdf(layout: &DocumentLayout, capabilities: &[Capability]) -> Result<Vec<u8>, RenderError> {
    if layout.page_width_mm <= 0.0 || layout.page_height_mm <= 0.0 {
        return Err(RenderError::Writer(format!(
            "invalid page size {}x{} mm",
            layout.page_width_mm, layout.page_height_mm
        )));
    }
    let dedupe = capabilities.contains(&Capability::ImageDeduplication);
    let page_w = Mm(layout.page_width_mm);
    let page_h = Mm(layout.page_height_mm);
    let page_h_pt = mm_to_pt(layout.page_height_mm);

    let mut doc = PdfDocument::new(&layout.title);

    // ── Register images ────────────────────────────────────────────────────
    let mut image_resources: HashMap<u64, ImageResource> = HashMap::new();
    let mut img_warnings: Vec<PdfWarnMsg> = Vec::new();
    let mut pages = Vec::with_capacity(layout.pages.len());

    for page_layout in &layout.pages {
        let mut ops = Vec::new();
        for element in &page_layout.elements {
            if let Element::Image { image, .. } = element {
                if dedupe && image_resources.contains_key(&image.id) {
                    continue;
                }
                match RawImage::decode_from_bytes(&image.encoded, &mut img_warnings) {
                    Ok(raw) => {
                        let xobj_id = doc.add_image(&raw);
                        image_resources.insert(
                            image.id,
                            ImageResource {
                                xobj_id,
                                px_width: image.px_width,
                                px_height: image.px_height,
                            },
                        );
                    }
                    Err(e) => log::warn!("Skipping image {}: {e}", image.id),
                }
            }
        }

        for element in &page_layout.elements {
            render_element(&mut ops, element, page_h_pt, &image_resources);
        }
        pages.push(PdfPage::new(page_w, page_h, ops));
    }

    // Ensure at least one page.
    if pages.is_empty() {
        pages.push(PdfPage::new(page_w, page_h, Vec::new()));
    }

    log::debug!(
        "writing {} pages, {} embedded images",
        pages.len(),
        image_resources.len()
    );
    doc.with_pages(pages);
    let bytes = doc.save(&save_options(capabilities), &mut Vec::new());
    if bytes.is_empty() {
        return Err(RenderError::Writer("printpdf produced no output".to_string()));
    }
    Ok(bytes)
}

/// Fold `s` into the ASCII range the base-14 fonts render reliably.
/// Typographic punctuation and accented Latin-1 letters get their plain
/// spelling; anything else becomes `?`.
fn to_builtin_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let folded = match c {
            '\u{2018}' | '\u{2019}' | '\u{2032}' => "'",
            '\u{201C}' | '\u{201D}' | '\u{00AB}' | '\u{00BB}' => "\"",
            '\u{2013}' | '\u{2014}' | '\u{2212}' | '\u{2022}' | '\u{00B7}' => "-",
            '\u{2026}' => "...",
            '\u{00A0}' | '\u{2009}' | '\u{202F}' => " ",
            '\u{20AC}' => "EUR",
            '\u{00A9}' => "(c)",
            '\u{00AE}' => "(R)",
            '\u{00C0}'..='\u{00C5}' => "A",
            '\u{00C6}' => "AE",
            '\u{00C7}' => "C",
            '\u{00C8}'..='\u{00CB}' => "E",
            '\u{00CC}'..='\u{00CF}' => "I",
            '\u{00D0}' => "D",
            '\u{00D1}' => "N",
            '\u{00D2}'..='\u{00D6}' | '\u{00D8}' => "O",
            '\u{00D9}'..='\u{00DC}' => "U",
            '\u{00DD}' => "Y",
            '\u{00DE}' => "Th",
            '\u{00DF}' => "ss",
            '\u{00E0}'..='\u{00E5}' => "a",
            '\u{00E6}' => "ae",
            '\u{00E7}' => "c",
            '\u{00E8}'..='\u{00EB}' => "e",
            '\u{00EC}'..='\u{00EF}' => "i",
            '\u{00F0}' => "d",
            '\u{00F1}' => "n",
            '\u{00F2}'..='\u{00F6}' | '\u{00F8}' => "o",
            '\u{00F9}'..='\u{00FC}' => "u",
            '\u{00FD}' | '\u{00FF}' => "y",
            '\u{00FE}' => "th",
            _ => "?",
        };
        out.push_str(folded);
    }
    out
}

/// Save options driven by the applied capability list.
fn save_options(capabilities: &[Capability]) -> PdfSaveOptions {
    PdfSaveOptions {
        optimize: capabilities.contains(&Capability::Compression),
        ..PdfSaveOptions::default()
    }
}

/// Parse a `data:<mime>;base64,<data>` URI and return the raw decoded bytes.
pub(crate) fn parse_data_uri(src: &str) -> Result<Vec<u8>, String> {
    let rest = src.strip_prefix("data:").ok_or_else(|| {
        let preview: String = src.chars().take(40).collect();
        format!("expected a base64 data URI, got {preview:?}")
    })?;
    let comma_pos = rest
        .find(',')
        .ok_or_else(|| "invalid data URI: missing `,` separator".to_string())?;
    let header = &rest[..comma_pos];
    if !header.contains(";base64") {
        return Err("only base64-encoded data URIs are supported".to_string());
    }
    BASE64_STD
        .decode(rest[comma_pos + 1..].trim())
        .map_err(|e| format!("base64 decode error: {e}"))
}

fn builtin_font(family: FontFamily, bold: bool, italic: bool) -> BuiltinFont {
    match (family, bold, italic) {
        (FontFamily::Helvetica, false, false) => BuiltinFont::Helvetica,
        (FontFamily::Helvetica, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::Helvetica, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::Helvetica, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::Times, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Times, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Times, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Courier, false, false) => BuiltinFont::Courier,
        (FontFamily::Courier, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Courier, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
    }
}

fn pdf_color(c: Colour) -> Color {
    let [r, g, b] = c.to_unit();
    Color::Rgb(Rgb {
        r,
        g,
        b,
        icc_profile: None,
    })
}

fn pt(x: f32, y: f32) -> Point {
    Point { x: Pt(x), y: Pt(y) }
}

fn on(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: pt(x, y),
        bezier: false,
    }
}

fn ctrl(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: pt(x, y),
        bezier: true,
    }
}

/// Outline of a (rounded) rectangle in PDF space, points in pt. `(x, y)`
/// is the bottom-left corner.
fn rect_points(x: f32, y: f32, w: f32, h: f32, r: f32) -> Vec<LinePoint> {
    let r = r.min(w / 2.0).min(h / 2.0).max(0.0);
    if r <= 0.0 {
        return vec![on(x, y), on(x + w, y), on(x + w, y + h), on(x, y + h)];
    }
    let k = r * KAPPA;
    let (x2, y2) = (x + w, y + h);
    vec![
        on(x + r, y),
        on(x2 - r, y),
        ctrl(x2 - r + k, y),
        ctrl(x2, y + r - k),
        on(x2, y + r),
        on(x2, y2 - r),
        ctrl(x2, y2 - r + k),
        ctrl(x2 - r + k, y2),
        on(x2 - r, y2),
        on(x + r, y2),
        ctrl(x + r - k, y2),
        ctrl(x, y2 - r + k),
        on(x, y2 - r),
        on(x, y + r),
        ctrl(x, y + r - k),
        ctrl(x + r - k, y),
    ]
}

fn set_stroke(ops: &mut Vec<Op>, stroke: &StrokeStyle) {
    ops.push(Op::SetOutlineColor {
        col: pdf_color(stroke.color),
    });
    ops.push(Op::SetOutlineThickness {
        pt: Pt(stroke.width_pt),
    });
}

fn render_rect(
    ops: &mut Vec<Op>,
    rect: &Rect,
    radius: f32,
    fill: Option<Colour>,
    stroke: Option<&StrokeStyle>,
    page_h_pt: f32,
) {
    // PDF origin is bottom-left; the IR is top-left.
    let x = mm_to_pt(rect.x);
    let y = page_h_pt - mm_to_pt(rect.bottom());
    let (w, h, r) = (mm_to_pt(rect.width), mm_to_pt(rect.height), mm_to_pt(radius));
    let points = rect_points(x, y, w, h, r);

    if let Some(fill) = fill {
        ops.push(Op::SetFillColor { col: pdf_color(fill) });
        ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: points.clone(),
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }
    if let Some(stroke) = stroke {
        set_stroke(ops, stroke);
        ops.push(Op::DrawLine {
            line: Line {
                points,
                is_closed: true,
            },
        });
    }
}

fn render_text(ops: &mut Vec<Op>, text: &TextBlock, page_h_pt: f32) {
    let font = builtin_font(text.family, text.bold, text.italic);
    // Baseline ≈ top of line + ascender (approx 0.75 × font size)
    let ascender = text.size_pt * 0.75;
    for (i, line) in text.lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        let top = mm_to_pt(text.y + i as f32 * text.line_height);
        ops.push(Op::StartTextSection);
        ops.push(Op::SetTextCursor {
            pos: pt(mm_to_pt(text.x), page_h_pt - top - ascender),
        });
        ops.push(Op::SetFontSizeBuiltinFont {
            size: Pt(text.size_pt),
            font,
        });
        ops.push(Op::SetFillColor {
            col: pdf_color(text.color),
        });
        ops.push(Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(to_builtin_text(line))],
            font,
        });
        ops.push(Op::EndTextSection);
    }
}

fn render_element(
    ops: &mut Vec<Op>,
    element: &Element,
    page_h_pt: f32,
    images: &HashMap<u64, ImageResource>,
) {
    match element {
        Element::Rect {
            rect,
            radius,
            fill,
            stroke,
        } => render_rect(ops, rect, *radius, *fill, stroke.as_ref(), page_h_pt),
        Element::Line { from, to, stroke } => {
            set_stroke(ops, stroke);
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![
                        on(mm_to_pt(from.0), page_h_pt - mm_to_pt(from.1)),
                        on(mm_to_pt(to.0), page_h_pt - mm_to_pt(to.1)),
                    ],
                    is_closed: false,
                },
            });
        }
        Element::Text(text) => render_text(ops, text, page_h_pt),
        Element::Image { rect, image } => {
            let Some(res) = images.get(&image.id) else {
                return;
            };
            // At dpi=72 printpdf renders 1 px = 1 pt, so
            // scale = desired_pt / px_dim.
            let scale_x = if res.px_width > 0 {
                mm_to_pt(rect.width) / res.px_width as f32
            } else {
                1.0
            };
            let scale_y = if res.px_height > 0 {
                mm_to_pt(rect.height) / res.px_height as f32
            } else {
                1.0
            };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(mm_to_pt(rect.x))),
                    translate_y: Some(Pt(page_h_pt - mm_to_pt(rect.bottom()))),
                    dpi: Some(72.0),
                    scale_x: Some(scale_x),
                    scale_y: Some(scale_y),
                    rotate: None,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::RasterImage;

    fn tiny_png() -> Vec<u8> {
        let img = ::image::RgbaImage::from_pixel(2, 2, ::image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, ::image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn render_empty_document() {
        let layout = DocumentLayout::new("empty", 210.0, 297.0);
        let bytes = write_pdf(&layout, &[]).unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
    }

    #[test]
    fn renders_every_element_kind() {
        let mut layout = DocumentLayout::new("kinds", 210.0, 297.0);
        let img = RasterImage::new(tiny_png(), 2, 2);
        for _ in 0..2 {
            layout.add_page();
            let page = layout.current_page_mut();
            page.push(Element::Image {
                rect: Rect::new(0.0, 0.0, 210.0, 297.0),
                image: img.clone(),
            });
            page.push(Element::Rect {
                rect: Rect::new(10.0, 10.0, 50.0, 20.0),
                radius: 3.0,
                fill: Some(Colour::WHITE),
                stroke: Some(StrokeStyle {
                    color: Colour::BLACK,
                    width_pt: 0.5,
                }),
            });
            page.push(Element::Text(TextBlock {
                x: 12.0,
                y: 12.0,
                lines: vec!["Caf\u{e9} \u{2013} r\u{e9}sum\u{e9}".into(), String::new()],
                family: FontFamily::Times,
                size_pt: 11.0,
                bold: true,
                italic: false,
                color: Colour::BLACK,
                line_height: 5.0,
            }));
            page.push(Element::Line {
                from: (10.0, 40.0),
                to: (100.0, 40.0),
                stroke: StrokeStyle {
                    color: Colour::BLACK,
                    width_pt: 0.3,
                },
            });
        }
        let bytes = write_pdf(&layout, &CapabilityTable::resolve().apply(&Capability::ALL)).unwrap();
        assert!(bytes.len() > 500);
    }

    #[test]
    fn unsupported_capabilities_are_dropped() {
        let table = CapabilityTable::resolve();
        let applied = table.apply(&Capability::ALL);
        assert_eq!(applied, vec![Capability::Compression, Capability::ImageDeduplication]);
        assert!(!table.supports(Capability::ColorProfile));
    }

    #[test]
    fn rounded_outline_has_bezier_corners() {
        let pts = rect_points(0.0, 0.0, 100.0, 50.0, 10.0);
        assert_eq!(pts.len(), 16);
        assert_eq!(pts.iter().filter(|p| p.bezier).count(), 8);
        assert_eq!(rect_points(0.0, 0.0, 10.0, 10.0, 0.0).len(), 4);
    }

    #[test]
    fn data_uris() {
        assert_eq!(parse_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
        assert!(parse_data_uri("https://example.com/a.png").is_err());
        assert!(parse_data_uri("data:image/png,abc").is_err());
    }

    #[test]
    fn builtin_text_folds_to_ascii() {
        assert_eq!(to_builtin_text("\u{2022} Caf\u{00E9} \u{2013} Stra\u{00DF}e"), "- Cafe - Strasse");
        assert_eq!(to_builtin_text("\u{201C}na\u{00EF}ve\u{201D}\u{2026}"), "\"naive\"...");
        assert_eq!(to_builtin_text("\u{1F600}\u{4E2D}"), "??");
        assert!(to_builtin_text("\u{00C5}ngstr\u{00F6}m \u{00A9}").is_ascii());
    }

    #[test]
    fn compression_capability_drives_save_options() {
        assert!(save_options(&[Capability::Compression]).optimize);
        assert!(!save_options(&[Capability::ImageDeduplication]).optimize);
        assert!(!save_options(&[]).optimize);
    }
}
