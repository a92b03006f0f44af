//! Full-page atmospheric backdrop.
//!
//! Layers, bottom to top: flat clear, diagonal gradient, hatch pattern, two
//! soft radial lights, vignette. Each optional layer is switched and tuned by
//! [`BackgroundOptions`]. The composite is rasterised once per distinct
//! configuration and the same image is placed on every page.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tiny_skia::{
    FilterQuality, GradientStop as SkStop, Paint, PathBuilder, Pattern, Pixmap, Point,
    RadialGradient, Rect as SkRect, Shader, SpreadMode, Stroke, Transform,
};

use crate::color::{parse_color, LinearGradient, GradientStop, Rgb, Rgba};
use crate::document::{Element, PageLayout, RasterImage};
use crate::error::GlassError;
use crate::glass::{encode_surface, gradient_shader, sk_color};
use crate::layout::{surface_size, Rect};
use crate::performance::{lock, RenderContext, SurfacePool};
use crate::template::{BackgroundOptions, ColorScheme};

const HATCH_TILE_PX: u32 = 12;
/// Light anchors as fractions of the page, with relative strength and radius.
const LIGHTS: [(f32, f32, f32, f32); 2] = [(0.15, 0.20, 1.0, 0.55), (0.85, 0.85, 0.6, 0.45)];
const ACCENT_ALPHA: f32 = 0.08;

/// Colours the backdrop draws with, parsed once from the scheme.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundPalette {
    pub background: Rgb,
    pub surface: Rgb,
    pub accent: Rgb,
    pub ink: Rgb,
}

impl BackgroundPalette {
    pub fn from_scheme(colors: &ColorScheme) -> Result<Self, GlassError> {
        let opaque = |s: &str| -> Result<Rgb, GlassError> { Ok(parse_color(s)?.rgb()) };
        Ok(Self {
            background: opaque(&colors.background)?,
            surface: opaque(&colors.surface)?,
            accent: opaque(&colors.accent)?,
            ink: opaque(&colors.text)?,
        })
    }
}

fn paint_of(shader: Shader<'_>) -> Paint<'_> {
    Paint {
        shader,
        anti_alias: true,
        ..Paint::default()
    }
}

fn full_rect(pixmap: &Pixmap) -> Result<SkRect, GlassError> {
    SkRect::from_xywh(0.0, 0.0, pixmap.width() as f32, pixmap.height() as f32)
        .ok_or_else(|| GlassError::DegenerateShape("background surface".to_string()))
}

/// Paint the layered backdrop onto `ctx`. Returns the number of primitive
/// operations issued.
pub fn compose_background(
    ctx: &mut RenderContext,
    palette: &BackgroundPalette,
    options: &BackgroundOptions,
) -> Result<usize, GlassError> {
    let pixmap = ctx.pixmap_mut();
    let rect = full_rect(pixmap)?;
    let (w, h) = (rect.width(), rect.height());
    let mut ops = 0;

    let bg = palette.background;
    pixmap.fill(tiny_skia::Color::from_rgba8(bg.r, bg.g, bg.b, 255));
    ops += 1;

    if options.gradient {
        let gradient = LinearGradient {
            angle_deg: 135.0,
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: palette.background.with_alpha(1.0),
                },
                GradientStop {
                    offset: 0.55,
                    color: palette.surface.with_alpha(1.0),
                },
                GradientStop {
                    offset: 1.0,
                    color: palette.accent.with_alpha(ACCENT_ALPHA),
                },
            ],
        };
        let shader = gradient_shader(&gradient, 0.0, 0.0, w, h)
            .ok_or_else(|| GlassError::DegenerateShape("background gradient".to_string()))?;
        pixmap.fill_rect(rect, &paint_of(shader), Transform::identity(), None);
        ops += 1;
    }

    if options.pattern.enabled && options.pattern.opacity > 0.0 {
        let tile = hatch_tile(palette.ink.with_alpha(1.0))?;
        let shader = Pattern::new(
            tile.as_ref(),
            SpreadMode::Repeat,
            FilterQuality::Nearest,
            options.pattern.opacity.clamp(0.0, 1.0),
            Transform::identity(),
        );
        pixmap.fill_rect(rect, &paint_of(shader), Transform::identity(), None);
        ops += 1;
    }

    if options.lighting.enabled && options.lighting.opacity > 0.0 {
        for (fx, fy, strength, radius) in LIGHTS {
            let centre = Point::from_xy(w * fx, h * fy);
            let alpha = options.lighting.opacity * strength;
            let shader = RadialGradient::new(
                centre,
                centre,
                w.max(h) * radius,
                vec![
                    SkStop::new(0.0, sk_color(Rgb::WHITE.with_alpha(alpha))),
                    SkStop::new(1.0, sk_color(Rgb::WHITE.with_alpha(0.0))),
                ],
                SpreadMode::Pad,
                Transform::identity(),
            )
            .ok_or_else(|| GlassError::DegenerateShape("background light".to_string()))?;
            pixmap.fill_rect(rect, &paint_of(shader), Transform::identity(), None);
            ops += 1;
        }
    }

    if options.vignette.enabled && options.vignette.opacity > 0.0 {
        let centre = Point::from_xy(w / 2.0, h / 2.0);
        let reach = (w * w + h * h).sqrt() / 2.0;
        let shader = RadialGradient::new(
            centre,
            centre,
            reach,
            vec![
                SkStop::new(0.0, sk_color(Rgba { r: 0, g: 0, b: 0, a: 0.0 })),
                SkStop::new(0.6, sk_color(Rgba { r: 0, g: 0, b: 0, a: 0.0 })),
                SkStop::new(1.0, sk_color(Rgb::BLACK.with_alpha(options.vignette.opacity))),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| GlassError::DegenerateShape("vignette".to_string()))?;
        pixmap.fill_rect(rect, &paint_of(shader), Transform::identity(), None);
        ops += 1;
    }

    Ok(ops)
}

/// Small offscreen tile with one diagonal stroke; repeats seamlessly.
fn hatch_tile(ink: Rgba) -> Result<Pixmap, GlassError> {
    let size = HATCH_TILE_PX;
    let mut tile = Pixmap::new(size, size).ok_or(GlassError::SurfaceUnavailable {
        width: size,
        height: size,
    })?;
    let s = size as f32;
    let mut pb = PathBuilder::new();
    pb.move_to(0.0, s);
    pb.line_to(s, 0.0);
    // corner stubs keep the diagonal continuous across tile edges
    pb.move_to(-1.0, 1.0);
    pb.line_to(1.0, -1.0);
    pb.move_to(s - 1.0, s + 1.0);
    pb.line_to(s + 1.0, s - 1.0);
    let path = pb
        .finish()
        .ok_or_else(|| GlassError::DegenerateShape("hatch".to_string()))?;
    let mut paint = Paint::default();
    paint.set_color(sk_color(ink));
    paint.anti_alias = true;
    let stroke = Stroke {
        width: 1.0,
        ..Stroke::default()
    };
    tile.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    Ok(tile)
}

/// Rasterises and memoises page backdrops.
#[derive(Debug, Default)]
pub struct BackgroundRenderer {
    cache: Mutex<HashMap<String, Arc<RasterImage>>>,
}

impl BackgroundRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backdrop image for a page of `page_mm` (width, height) at `dpi`.
    pub fn page_image(
        &self,
        pool: &SurfacePool,
        colors: &ColorScheme,
        options: &BackgroundOptions,
        page_mm: (f32, f32),
        dpi: f32,
    ) -> Result<Arc<RasterImage>, GlassError> {
        let palette = BackgroundPalette::from_scheme(colors)?;
        let key = format!("{palette:?}|{options:?}|{:.1}x{:.1}|{dpi}", page_mm.0, page_mm.1);
        if let Some(hit) = lock(&self.cache).get(&key).cloned() {
            log::debug!("background cache hit");
            return Ok(hit);
        }

        let (w, h) = surface_size(page_mm.0, page_mm.1, dpi);
        let mut ctx = pool.acquire(w, h)?;
        let composed = compose_background(&mut ctx, &palette, options);
        let encoded = composed.and_then(|ops| {
            log::debug!("background composited in {ops} operations ({w}x{h} px)");
            encode_surface(ctx.pixmap())
        });
        pool.release(ctx);
        let image = encoded?;

        lock(&self.cache).insert(key, image.clone());
        Ok(image)
    }

    /// Cover `page` with the backdrop. Call before any content is drawn.
    pub fn paint_page(&self, page: &mut PageLayout, image: Arc<RasterImage>, page_mm: (f32, f32)) {
        page.push(Element::Image {
            rect: Rect::new(0.0, 0.0, page_mm.0, page_mm.1),
            image,
        });
    }

    pub fn cached(&self) -> usize {
        lock(&self.cache).len()
    }
}
