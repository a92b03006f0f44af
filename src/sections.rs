//! Section card presets.
//!
//! Each painter draws the glass pane behind one kind of section and returns
//! the number of drawing operations it issued. Text is laid over the pane by
//! the renderer afterwards. If compositing fails for any reason the pane is
//! drawn as a flat, pre-blended vector rectangle instead.

use crate::color::{blend_over, hero_gradient, parse_color, sidebar_card_gradient, Rgb, Rgba};
use crate::config::RenderOptions;
use crate::document::{Element, PageLayout, StrokeStyle};
use crate::error::GlassError;
use crate::glass::{glass_card_style, CardGeometry, CardRecipe, GlassEffects, GlassFill};
use crate::layout::{surface_size, Rect};
use crate::performance::SurfacePool;
use crate::template::{ColorScheme, GlassScheme, Template};

/// Which preset a card uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Header,
    Sidebar,
    Experience,
    Project,
    /// Trough behind a progress bar.
    Track,
}

impl CardKind {
    fn preset_name(self) -> &'static str {
        match self {
            CardKind::Header => "hero",
            CardKind::Sidebar => "sidebar",
            CardKind::Experience | CardKind::Project => "card",
            CardKind::Track => "track",
        }
    }

    fn default_elevation(self) -> u8 {
        match self {
            CardKind::Header => 3,
            CardKind::Sidebar => 1,
            CardKind::Experience => 2,
            CardKind::Project => 2,
            CardKind::Track => 0,
        }
    }
}

/// Parsed glass colours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlassPalette {
    pub fill: Rgb,
    pub stroke: Rgb,
    pub shadow: Rgb,
    pub accent: Rgb,
    pub page: Rgb,
}

impl GlassPalette {
    pub fn from_scheme(colors: &ColorScheme) -> Result<Self, GlassError> {
        let opaque = |s: &str| -> Result<Rgb, GlassError> { Ok(parse_color(s)?.rgb()) };
        Ok(Self {
            fill: opaque(&colors.glass.fill)?,
            stroke: opaque(&colors.glass.stroke)?,
            shadow: opaque(&colors.glass.shadow.color)?,
            accent: opaque(&colors.accent)?,
            page: opaque(&colors.background)?,
        })
    }
}

/// Draws section panes for one render.
pub struct SectionPainter<'a> {
    effects: &'a GlassEffects,
    pool: &'a SurfacePool,
    scheme: &'a GlassScheme,
    palette: GlassPalette,
    card_radius: f32,
    glass_enabled: bool,
    gradients: bool,
    noise: bool,
    dpi: f32,
    fallbacks: usize,
}

impl<'a> SectionPainter<'a> {
    pub fn new(
        effects: &'a GlassEffects,
        pool: &'a SurfacePool,
        template: &'a Template,
        render: &RenderOptions,
    ) -> Result<Self, GlassError> {
        Ok(Self {
            effects,
            pool,
            scheme: &template.colors.glass,
            palette: GlassPalette::from_scheme(&template.colors)?,
            card_radius: template.layout.radius.card,
            glass_enabled: render.glass_effects && template.features.glass_effects,
            gradients: template.features.gradients,
            noise: render.micro_noise,
            dpi: render.surface_dpi,
            fallbacks: 0,
        })
    }

    pub fn palette(&self) -> &GlassPalette {
        &self.palette
    }

    /// Elevation for a card kind, honouring the template's named presets.
    pub fn elevation(&self, kind: CardKind) -> u8 {
        self.scheme
            .presets
            .get(kind.preset_name())
            .map(|p| p.elevation)
            .unwrap_or_else(|| kind.default_elevation())
    }

    pub fn glass_enabled(&self) -> bool {
        self.glass_enabled
    }

    /// How many panes took the flat path after a compositing failure.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    pub fn recipe(&self, kind: CardKind) -> CardRecipe {
        let preset = self.scheme.presets.get(kind.preset_name());
        let style = glass_card_style(self.elevation(kind));
        let opacity = preset.map(|p| p.opacity).unwrap_or(style.opacity);
        let border_alpha = preset.map(|p| p.border_alpha).unwrap_or(0.25);

        let fill = match kind {
            CardKind::Header if self.gradients => GlassFill::Gradient(hero_gradient()),
            CardKind::Sidebar if self.gradients => GlassFill::Gradient(sidebar_card_gradient()),
            _ => GlassFill::Flat(self.palette.fill.with_alpha(opacity)),
        };
        let stroke = match kind {
            CardKind::Project => self.palette.accent.with_alpha(border_alpha),
            _ => self.palette.stroke.with_alpha(border_alpha),
        };
        let prominent = matches!(kind, CardKind::Header | CardKind::Sidebar);

        CardRecipe {
            style,
            radius: self.card_radius,
            fill,
            stroke,
            shadow_color: self.palette.shadow,
            light: if prominent || kind == CardKind::Experience {
                self.scheme.light
            } else {
                None
            },
            noise: self.scheme.noise.filter(|_| self.noise && kind != CardKind::Track),
            border_gradient: self.scheme.border_gradient.filter(|_| prominent),
            inner_highlight: prominent,
        }
    }

    pub fn header(&mut self, page: &mut PageLayout, rect: Rect) -> usize {
        self.paint(page, rect, CardKind::Header)
    }

    pub fn sidebar_card(&mut self, page: &mut PageLayout, rect: Rect) -> usize {
        self.paint(page, rect, CardKind::Sidebar)
    }

    pub fn experience_card(&mut self, page: &mut PageLayout, rect: Rect) -> usize {
        self.paint(page, rect, CardKind::Experience)
    }

    pub fn project_card(&mut self, page: &mut PageLayout, rect: Rect) -> usize {
        self.paint(page, rect, CardKind::Project)
    }

    /// Pill-shaped glass trough for a progress bar.
    pub fn progress_track(&mut self, page: &mut PageLayout, rect: Rect) -> usize {
        let mut recipe = self.recipe(CardKind::Track);
        recipe.radius = rect.height / 2.0;
        self.paint_recipe(page, rect, CardKind::Track, recipe)
    }

    fn paint(&mut self, page: &mut PageLayout, rect: Rect, kind: CardKind) -> usize {
        let recipe = self.recipe(kind);
        self.paint_recipe(page, rect, kind, recipe)
    }

    fn paint_recipe(&mut self, page: &mut PageLayout, rect: Rect, kind: CardKind, recipe: CardRecipe) -> usize {
        if !self.glass_enabled {
            return self.flat(page, rect, &recipe);
        }
        match self.composite(page, rect, &recipe) {
            Ok(ops) => ops,
            Err(e) => {
                log::warn!("glass {kind:?} card fell back to flat fill: {e}");
                self.fallbacks += 1;
                self.flat(page, rect, &recipe)
            }
        }
    }

    fn composite(&self, page: &mut PageLayout, rect: Rect, recipe: &CardRecipe) -> Result<usize, GlassError> {
        let bleed = recipe.style.bleed();
        let outer = rect.outset(bleed);
        let (w, h) = surface_size(outer.width, outer.height, self.dpi);
        let mut ctx = self.pool.acquire(w, h)?;
        let geom = CardGeometry::for_surface(&ctx, rect, bleed, recipe.radius);
        let result = self
            .effects
            .compose_card(&mut ctx, &geom, recipe)
            .and_then(|ops| self.effects.canvas_to_pdf(&ctx, page, outer).map(|_| ops + 1));
        self.pool.release(ctx);
        result
    }

    /// Flat rounded rectangle pre-blended over the page colour.
    fn flat(&self, page: &mut PageLayout, rect: Rect, recipe: &CardRecipe) -> usize {
        let top: Rgba = match &recipe.fill {
            GlassFill::Flat(c) => *c,
            GlassFill::Gradient(g) => g
                .stops
                .first()
                .map(|s| s.color)
                .unwrap_or(self.palette.fill.with_alpha(recipe.style.opacity)),
        };
        page.push(Element::Rect {
            rect,
            radius: recipe.radius,
            fill: Some(blend_over(top, self.palette.page)),
            stroke: Some(StrokeStyle {
                color: blend_over(recipe.stroke, self.palette.page),
                width_pt: 0.5,
            }),
        });
        1
    }
}
