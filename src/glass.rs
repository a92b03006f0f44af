//! Glass compositing on raster surfaces.
//!
//! A glass card is built from simple primitives only: layered translucent
//! rounded rectangles stand in for a blurred drop shadow, a gradient or flat
//! translucent fill plus a light stroke form the pane, and optional edge
//! light, specular spot, micro-noise, gradient border and inner highlight
//! layers sell the refraction. The finished surface crosses into the page
//! IR exclusively through [`GlassEffects::canvas_to_pdf`].

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use rand::{Rng, SeedableRng};
use tiny_skia::{
    Color, FillRule, FilterQuality, GradientStop as SkStop, Mask, Paint, Path, PathBuilder,
    Pattern, Pixmap, Point, RadialGradient, Rect as SkRect, Shader, SpreadMode, Stroke, Transform,
};

use crate::color::{LinearGradient, Rgb, Rgba};
use crate::document::{Element, PageLayout, RasterImage};
use crate::error::GlassError;
use crate::layout::{mm_to_canvas_px, Rect};
use crate::performance::{lock, RenderContext};
use crate::template::{BorderGradient, LightConfig, NoiseConfig, NoiseKind};

/// Card opacity per elevation level 0–4.
pub const ELEVATION_OPACITY: [f32; 5] = [0.08, 0.12, 0.15, 0.18, 0.20];

const NOISE_TILE_PX: u32 = 64;
const NOISE_CACHE_CAPACITY: usize = 16;
const SNAPSHOT_CACHE_CAPACITY: usize = 64;
/// Height of the inner top highlight relative to the card.
const INNER_HIGHLIGHT_RATIO: f32 = 0.35;

/// Shadow parameters in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowStyle {
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub opacity: f32,
}

/// Derived styling for an elevation level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlassCardStyle {
    pub elevation: u8,
    pub opacity: f32,
    pub shadow: ShadowStyle,
}

/// Style for `level`; levels above 4 behave like 4.
pub fn glass_card_style(level: u8) -> GlassCardStyle {
    let level = level.min(4);
    let l = level as f32;
    GlassCardStyle {
        elevation: level,
        opacity: ELEVATION_OPACITY[level as usize],
        shadow: ShadowStyle {
            blur: 1.2 + l * 0.9,
            offset_x: 0.0,
            offset_y: 0.4 + l * 0.4,
            opacity: 0.08 + l * 0.03,
        },
    }
}

impl GlassCardStyle {
    /// Margin a surface needs around the card so the shadow is not cut.
    pub fn bleed(&self) -> f32 {
        self.shadow.blur + self.shadow.offset_x.abs().max(self.shadow.offset_y.abs()) + 0.5
    }
}

/// Pane fill.
#[derive(Debug, Clone, PartialEq)]
pub enum GlassFill {
    Flat(Rgba),
    Gradient(LinearGradient),
}

/// Everything needed to composite one card.
#[derive(Debug, Clone, PartialEq)]
pub struct CardRecipe {
    pub style: GlassCardStyle,
    pub radius: f32,
    pub fill: GlassFill,
    pub stroke: Rgba,
    pub shadow_color: Rgb,
    pub light: Option<LightConfig>,
    pub noise: Option<NoiseConfig>,
    pub border_gradient: Option<BorderGradient>,
    pub inner_highlight: bool,
}

/// Card placement inside a surface, in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CardGeometry {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub radius: f32,
    /// Surface pixels per millimetre.
    pub scale: f32,
}

impl CardGeometry {
    /// Geometry of a `card_mm` sized card centred in a surface that covers
    /// the card plus `bleed_mm` on every side.
    pub fn for_surface(ctx: &RenderContext, card_mm: Rect, bleed_mm: f32, radius_mm: f32) -> Self {
        let total_mm = card_mm.width + 2.0 * bleed_mm;
        let scale = mm_to_canvas_px(1.0, ctx.width(), total_mm);
        Self {
            x: bleed_mm * scale,
            y: bleed_mm * scale,
            width: card_mm.width * scale,
            height: card_mm.height * scale,
            radius: radius_mm * scale,
            scale,
        }
    }

    fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    fn path(&self) -> Result<Path, GlassError> {
        rounded_rect_path(self.x, self.y, self.width, self.height, self.radius)
    }
}

/// Rounded rectangle with quadratic corners, or a plain rectangle when
/// `r <= 0`. The radius is clamped to half the shorter side.
pub fn rounded_rect_path(x: f32, y: f32, w: f32, h: f32, r: f32) -> Result<Path, GlassError> {
    let degenerate = || GlassError::DegenerateShape(format!("{w}x{h} at ({x}, {y})"));
    if !(w > 0.0 && h > 0.0) {
        return Err(degenerate());
    }
    if r <= 0.0 {
        let rect = SkRect::from_xywh(x, y, w, h).ok_or_else(degenerate)?;
        return Ok(PathBuilder::from_rect(rect));
    }
    let r = r.min(w / 2.0).min(h / 2.0);
    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(x + w - r, y);
    pb.quad_to(x + w, y, x + w, y + r);
    pb.line_to(x + w, y + h - r);
    pb.quad_to(x + w, y + h, x + w - r, y + h);
    pb.line_to(x + r, y + h);
    pb.quad_to(x, y + h, x, y + h - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish().ok_or_else(degenerate)
}

pub(crate) fn sk_color(c: Rgba) -> Color {
    Color::from_rgba8(c.r, c.g, c.b, c.alpha_u8())
}

fn solid_paint(c: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(sk_color(c));
    paint.anti_alias = true;
    paint
}

fn shader_paint(shader: Shader<'_>) -> Paint<'_> {
    Paint {
        shader,
        anti_alias: true,
        ..Paint::default()
    }
}

/// Linear gradient shader spanning a `w`×`h` box at (`x`, `y`), oriented by
/// the gradient's CSS angle.
pub(crate) fn gradient_shader(g: &LinearGradient, x: f32, y: f32, w: f32, h: f32) -> Option<Shader<'static>> {
    let (dx, dy) = g.direction();
    let half = (dx.abs() * w + dy.abs() * h) / 2.0;
    let (cx, cy) = (x + w / 2.0, y + h / 2.0);
    let stops = g
        .stops
        .iter()
        .map(|s| SkStop::new(s.offset, sk_color(s.color)))
        .collect();
    tiny_skia::LinearGradient::new(
        Point::from_xy(cx - dx * half, cy - dy * half),
        Point::from_xy(cx + dx * half, cy + dy * half),
        stops,
        SpreadMode::Pad,
        Transform::identity(),
    )
}

fn clip_mask(pixmap: &Pixmap, path: &Path) -> Result<Mask, GlassError> {
    let mut mask = Mask::new(pixmap.width(), pixmap.height()).ok_or(GlassError::SurfaceUnavailable {
        width: pixmap.width(),
        height: pixmap.height(),
    })?;
    mask.fill_path(path, FillRule::Winding, true, Transform::identity());
    Ok(mask)
}

fn normalise(dir: [f32; 2]) -> (f32, f32) {
    let len = (dir[0] * dir[0] + dir[1] * dir[1]).sqrt();
    if len <= f32::EPSILON {
        (0.0, 1.0)
    } else {
        (dir[0] / len, dir[1] / len)
    }
}

/// Insertion-ordered cache with FIFO eviction.
#[derive(Debug)]
struct BoundedCache<K, V> {
    capacity: usize,
    map: HashMap<K, V>,
    order: VecDeque<K>,
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedCache<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            map: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    fn get(&self, key: &K) -> Option<V> {
        self.map.get(key).cloned()
    }

    fn insert(&mut self, key: K, value: V) {
        if self.map.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.map.remove(&old);
            }
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }
}

/// Cache key for noise tiles; floats are quantised to thousandths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoiseKey {
    amount: u32,
    scale: u32,
    kind: NoiseKind,
}

impl NoiseKey {
    pub fn new(config: &NoiseConfig) -> Self {
        Self {
            amount: (config.amount.clamp(0.0, 1.0) * 1000.0).round() as u32,
            scale: (config.scale.max(0.0) * 1000.0).round() as u32,
            kind: config.kind,
        }
    }

    fn seed(&self) -> u64 {
        ((self.amount as u64) << 32) ^ ((self.scale as u64) << 1) ^ (self.kind == NoiseKind::Color) as u64
    }
}

/// A badge chip to rasterise instead of drawing it as vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct BadgeElement {
    pub label: String,
    pub width_mm: f32,
    pub height_mm: f32,
    pub radius_mm: f32,
    pub background: Rgba,
    pub border: Rgba,
    pub highlight: bool,
}

impl BadgeElement {
    fn cache_key(&self, dpi: f32) -> String {
        format!(
            "{}|{:.2}x{:.2}|{:.2}|{}|{}|{}|{dpi}",
            self.label,
            self.width_mm,
            self.height_mm,
            self.radius_mm,
            self.background,
            self.border,
            self.highlight
        )
    }
}

/// Glass compositor. Owns the noise-tile and badge-snapshot caches.
#[derive(Debug)]
pub struct GlassEffects {
    noise_cache: Mutex<BoundedCache<NoiseKey, Arc<Pixmap>>>,
    snapshot_cache: Mutex<BoundedCache<String, Arc<RasterImage>>>,
    noise_generated: AtomicUsize,
}

impl Default for GlassEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl GlassEffects {
    pub fn new() -> Self {
        Self {
            noise_cache: Mutex::new(BoundedCache::new(NOISE_CACHE_CAPACITY)),
            snapshot_cache: Mutex::new(BoundedCache::new(SNAPSHOT_CACHE_CAPACITY)),
            noise_generated: AtomicUsize::new(0),
        }
    }

    /// Full card composite. Returns the number of primitive operations.
    pub fn compose_card(
        &self,
        ctx: &mut RenderContext,
        geom: &CardGeometry,
        recipe: &CardRecipe,
    ) -> Result<usize, GlassError> {
        let mut ops = self.render_glass_card(ctx, geom, recipe)?;
        if let Some(light) = &recipe.light {
            ops += self.draw_edge_light(ctx, geom, light.direction, light.strength)?;
            if light.specular {
                ops += self.draw_specular_spot(ctx, geom, light.direction, light.strength)?;
            }
        }
        if let Some(noise) = &recipe.noise {
            ops += self.draw_micro_noise(ctx, geom, noise)?;
        }
        if let Some(border) = &recipe.border_gradient {
            ops += self.draw_gradient_border(ctx, geom, border.top_alpha, border.bottom_alpha)?;
        }
        if recipe.inner_highlight {
            ops += self.draw_inner_highlight(ctx, geom, recipe.style.opacity + 0.1)?;
        }
        Ok(ops)
    }

    /// Shadow, then fill, then stroke.
    pub fn render_glass_card(
        &self,
        ctx: &mut RenderContext,
        geom: &CardGeometry,
        recipe: &CardRecipe,
    ) -> Result<usize, GlassError> {
        let path = geom.path()?;
        let pixmap = ctx.pixmap_mut();
        let mut ops = 0;

        ops += draw_layered_shadow(pixmap, geom, &recipe.style.shadow, recipe.shadow_color)?;

        match &recipe.fill {
            GlassFill::Flat(c) => {
                pixmap.fill_path(&path, &solid_paint(*c), FillRule::Winding, Transform::identity(), None);
            }
            GlassFill::Gradient(g) => {
                let shader = gradient_shader(g, geom.x, geom.y, geom.width, geom.height)
                    .ok_or_else(|| GlassError::DegenerateShape("gradient".to_string()))?;
                pixmap.fill_path(&path, &shader_paint(shader), FillRule::Winding, Transform::identity(), None);
            }
        }
        ops += 1;

        let stroke = Stroke {
            width: (0.25 * geom.scale).max(1.0),
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &solid_paint(recipe.stroke), &stroke, Transform::identity(), None);
        ops += 1;
        Ok(ops)
    }

    /// Thick border stroke clipped to the card, fading from `strength` to
    /// transparent along the light direction.
    pub fn draw_edge_light(
        &self,
        ctx: &mut RenderContext,
        geom: &CardGeometry,
        direction: [f32; 2],
        strength: f32,
    ) -> Result<usize, GlassError> {
        let path = geom.path()?;
        let pixmap = ctx.pixmap_mut();
        let mask = clip_mask(pixmap, &path)?;
        let (dx, dy) = normalise(direction);
        let (cx, cy) = geom.center();
        let half = (dx.abs() * geom.width + dy.abs() * geom.height) / 2.0;
        // Light travels along `direction`, so the lit edge faces against it.
        let shader = tiny_skia::LinearGradient::new(
            Point::from_xy(cx - dx * half, cy - dy * half),
            Point::from_xy(cx + dx * half, cy + dy * half),
            vec![
                SkStop::new(0.0, sk_color(Rgb::WHITE.with_alpha(strength))),
                SkStop::new(1.0, sk_color(Rgb::WHITE.with_alpha(0.0))),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| GlassError::DegenerateShape("edge light".to_string()))?;
        let stroke = Stroke {
            width: (0.8 * geom.scale).max(2.0),
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &shader_paint(shader), &stroke, Transform::identity(), Some(&mask));
        Ok(1)
    }

    /// Small radial highlight in the quadrant facing the light.
    pub fn draw_specular_spot(
        &self,
        ctx: &mut RenderContext,
        geom: &CardGeometry,
        direction: [f32; 2],
        strength: f32,
    ) -> Result<usize, GlassError> {
        let path = geom.path()?;
        let pixmap = ctx.pixmap_mut();
        let mask = clip_mask(pixmap, &path)?;
        let (dx, dy) = normalise(direction);
        let (cx, cy) = geom.center();
        let sx = cx - dx * geom.width * 0.3;
        let sy = cy - dy * geom.height * 0.3;
        let radius = geom.width.min(geom.height) * 0.35;
        let shader = RadialGradient::new(
            Point::from_xy(sx, sy),
            Point::from_xy(sx, sy),
            radius.max(1.0),
            vec![
                SkStop::new(0.0, sk_color(Rgb::WHITE.with_alpha(strength * 0.6))),
                SkStop::new(1.0, sk_color(Rgb::WHITE.with_alpha(0.0))),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| GlassError::DegenerateShape("specular spot".to_string()))?;
        pixmap.fill_path(&path, &shader_paint(shader), FillRule::Winding, Transform::identity(), Some(&mask));
        Ok(1)
    }

    /// Soft-light noise over the card to break up banding.
    pub fn draw_micro_noise(
        &self,
        ctx: &mut RenderContext,
        geom: &CardGeometry,
        config: &NoiseConfig,
    ) -> Result<usize, GlassError> {
        if config.amount <= 0.0 {
            return Ok(0);
        }
        let tile = self.noise_tile(config)?;
        let path = geom.path()?;
        let scale = config.scale.max(0.25);
        let shader = Pattern::new(
            Pixmap::as_ref(&tile),
            SpreadMode::Repeat,
            FilterQuality::Nearest,
            config.amount.clamp(0.0, 1.0),
            Transform::from_scale(scale, scale),
        );
        let mut paint = shader_paint(shader);
        paint.blend_mode = tiny_skia::BlendMode::SoftLight;
        ctx.pixmap_mut()
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        Ok(1)
    }

    /// Vertical two-stop alpha border.
    pub fn draw_gradient_border(
        &self,
        ctx: &mut RenderContext,
        geom: &CardGeometry,
        top_alpha: f32,
        bottom_alpha: f32,
    ) -> Result<usize, GlassError> {
        let path = geom.path()?;
        let shader = tiny_skia::LinearGradient::new(
            Point::from_xy(geom.x, geom.y),
            Point::from_xy(geom.x, geom.y + geom.height),
            vec![
                SkStop::new(0.0, sk_color(Rgb::WHITE.with_alpha(top_alpha))),
                SkStop::new(1.0, sk_color(Rgb::WHITE.with_alpha(bottom_alpha))),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| GlassError::DegenerateShape("gradient border".to_string()))?;
        let stroke = Stroke {
            width: (0.35 * geom.scale).max(1.0),
            ..Stroke::default()
        };
        ctx.pixmap_mut()
            .stroke_path(&path, &shader_paint(shader), &stroke, Transform::identity(), None);
        Ok(1)
    }

    /// Highlight band along the top ~35 % of the card.
    pub fn draw_inner_highlight(
        &self,
        ctx: &mut RenderContext,
        geom: &CardGeometry,
        alpha: f32,
    ) -> Result<usize, GlassError> {
        let path = geom.path()?;
        let pixmap = ctx.pixmap_mut();
        let mask = clip_mask(pixmap, &path)?;
        let band_h = geom.height * INNER_HIGHLIGHT_RATIO;
        let band = SkRect::from_xywh(geom.x, geom.y, geom.width, band_h)
            .ok_or_else(|| GlassError::DegenerateShape("inner highlight".to_string()))?;
        let shader = tiny_skia::LinearGradient::new(
            Point::from_xy(geom.x, geom.y),
            Point::from_xy(geom.x, geom.y + band_h),
            vec![
                SkStop::new(0.0, sk_color(Rgb::WHITE.with_alpha(alpha.clamp(0.0, 1.0)))),
                SkStop::new(1.0, sk_color(Rgb::WHITE.with_alpha(0.0))),
            ],
            SpreadMode::Pad,
            Transform::identity(),
        )
        .ok_or_else(|| GlassError::DegenerateShape("inner highlight".to_string()))?;
        pixmap.fill_rect(band, &shader_paint(shader), Transform::identity(), Some(&mask));
        Ok(1)
    }

    /// Encode the surface and place it on `page` at `target` (mm).
    pub fn canvas_to_pdf(
        &self,
        ctx: &RenderContext,
        page: &mut PageLayout,
        target: Rect,
    ) -> Result<(), GlassError> {
        let image = encode_surface(ctx.pixmap())?;
        page.push(Element::Image { rect: target, image });
        Ok(())
    }

    /// Rasterise a badge chip, memoised per badge description and DPI.
    pub fn render_badge_snapshot(&self, badge: &BadgeElement, dpi: f32) -> Result<Arc<RasterImage>, GlassError> {
        if badge.label.trim().is_empty() {
            return Err(GlassError::InvalidSnapshot("badge has no label".to_string()));
        }
        if !(badge.width_mm > 0.0 && badge.height_mm > 0.0) {
            return Err(GlassError::InvalidSnapshot(format!(
                "badge '{}' has size {}x{}mm",
                badge.label, badge.width_mm, badge.height_mm
            )));
        }
        let key = badge.cache_key(dpi);
        if let Some(hit) = lock(&self.snapshot_cache).get(&key) {
            log::trace!("badge snapshot cache hit for '{}'", badge.label);
            return Ok(hit);
        }

        let (w, h) = crate::layout::surface_size(badge.width_mm, badge.height_mm, dpi);
        let mut pixmap = Pixmap::new(w, h).ok_or(GlassError::SurfaceUnavailable { width: w, height: h })?;
        let scale = w as f32 / badge.width_mm;
        let inset = 0.5;
        let path = rounded_rect_path(
            inset,
            inset,
            w as f32 - 2.0 * inset,
            h as f32 - 2.0 * inset,
            badge.radius_mm * scale,
        )?;
        pixmap.fill_path(&path, &solid_paint(badge.background), FillRule::Winding, Transform::identity(), None);
        if badge.highlight {
            let shader = tiny_skia::LinearGradient::new(
                Point::from_xy(0.0, 0.0),
                Point::from_xy(0.0, h as f32 * 0.6),
                vec![
                    SkStop::new(0.0, sk_color(Rgb::WHITE.with_alpha(0.35))),
                    SkStop::new(1.0, sk_color(Rgb::WHITE.with_alpha(0.0))),
                ],
                SpreadMode::Pad,
                Transform::identity(),
            );
            if let Some(shader) = shader {
                pixmap.fill_path(&path, &shader_paint(shader), FillRule::Winding, Transform::identity(), None);
            }
        }
        let stroke = Stroke {
            width: 1.0,
            ..Stroke::default()
        };
        pixmap.stroke_path(&path, &solid_paint(badge.border), &stroke, Transform::identity(), None);

        let image = encode_surface(&pixmap)?;
        lock(&self.snapshot_cache).insert(key, image.clone());
        Ok(image)
    }

    /// Noise tile for `config`, generated once per key.
    pub fn noise_tile(&self, config: &NoiseConfig) -> Result<Arc<Pixmap>, GlassError> {
        let key = NoiseKey::new(config);
        if let Some(tile) = lock(&self.noise_cache).get(&key) {
            return Ok(tile);
        }
        let tile = Arc::new(generate_noise_tile(&key)?);
        self.noise_generated.fetch_add(1, Ordering::Relaxed);
        lock(&self.noise_cache).insert(key, tile.clone());
        Ok(tile)
    }

    /// How many noise tiles were generated (cache misses).
    pub fn noise_tiles_generated(&self) -> usize {
        self.noise_generated.load(Ordering::Relaxed)
    }

    pub fn cached_noise_tiles(&self) -> usize {
        lock(&self.noise_cache).len()
    }

    pub fn cached_snapshots(&self) -> usize {
        lock(&self.snapshot_cache).len()
    }
}

/// Concentric translucent rounded rectangles approximating a blurred drop
/// shadow; outer rings are fainter.
fn draw_layered_shadow(
    pixmap: &mut Pixmap,
    geom: &CardGeometry,
    shadow: &ShadowStyle,
    color: Rgb,
) -> Result<usize, GlassError> {
    if shadow.opacity <= 0.0 || shadow.blur <= 0.0 {
        return Ok(0);
    }
    let blur_px = shadow.blur * geom.scale;
    let steps = ((shadow.blur * 2.0).round() as usize).clamp(3, 8);
    let ox = shadow.offset_x * geom.scale;
    let oy = shadow.offset_y * geom.scale;
    let per_step = shadow.opacity / steps as f32;
    for i in (0..steps).rev() {
        let spread = blur_px * (i as f32 + 1.0) / steps as f32;
        let path = rounded_rect_path(
            geom.x + ox - spread / 2.0,
            geom.y + oy - spread / 2.0,
            geom.width + spread,
            geom.height + spread,
            geom.radius + spread / 2.0,
        )?;
        pixmap.fill_path(
            &path,
            &solid_paint(color.with_alpha(per_step)),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
    }
    Ok(steps)
}

fn generate_noise_tile(key: &NoiseKey) -> Result<Pixmap, GlassError> {
    let mut tile = Pixmap::new(NOISE_TILE_PX, NOISE_TILE_PX).ok_or(GlassError::SurfaceUnavailable {
        width: NOISE_TILE_PX,
        height: NOISE_TILE_PX,
    })?;
    let mut rng = rand::rngs::StdRng::seed_from_u64(key.seed());
    for px in tile.pixels_mut() {
        let (r, g, b) = match key.kind {
            NoiseKind::Mono => {
                let v: u8 = rng.random();
                (v, v, v)
            }
            NoiseKind::Color => (rng.random(), rng.random(), rng.random()),
        };
        *px = tiny_skia::ColorU8::from_rgba(r, g, b, 255).premultiply();
    }
    Ok(tile)
}

/// PNG-encode a surface (un-premultiplying alpha) into a raster image.
pub fn encode_surface(pixmap: &Pixmap) -> Result<Arc<RasterImage>, GlassError> {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    let (w, h) = (pixmap.width(), pixmap.height());
    let img = image::RgbaImage::from_raw(w, h, rgba)
        .ok_or_else(|| GlassError::Encode(format!("buffer does not match {w}x{h}")))?;
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| GlassError::Encode(e.to_string()))?;
    Ok(RasterImage::new(out.into_inner(), w, h))
}
