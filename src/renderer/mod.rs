//! Single-generation renderer.
//!
//! [`Renderer::render`] walks one generation through
//! `Idle → Initializing → Background → Sections → Finalizing → Complete`,
//! reporting progress in fixed bands (0–10, 10–20, 20–80, 80–100). Sections
//! are drawn in template order into a [`DocumentLayout`], which the writer
//! then turns into PDF bytes.
//!
//! Every block is measured before anything is drawn for it. If the estimate
//! does not fit above the bottom margin the page is broken first, so no
//! block ever straddles two pages. Each placement is recorded in a
//! [`RenderTrace`].

mod blocks;
mod skills;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::background::BackgroundRenderer;
use crate::color::{blend_over, enhance_contrast, hex_to_rgb, parse_color, Rgb};
use crate::config::GenerationOptions;
use crate::data::ProcessedPdfData;
use crate::document::{DocumentLayout, Element, RasterImage, StrokeStyle, TextBlock};
use crate::error::{GlassError, RenderError};
use crate::fonts::{typography_scale, FontFamily, FontManager, FontPurpose, TypographyScale};
use crate::glass::GlassEffects;
use crate::layout::{LayoutManager, Rect};
use crate::pagination::{minimal_block_height, PageCursor, SECTION_HEADER_MM};
use crate::performance::SurfacePool;
use crate::sections::{CardKind, SectionPainter};
use crate::template::{SectionConfig, SectionVariant, Template};
use crate::writer::{write_pdf, Capability, CapabilityTable};

const EPSILON: f32 = 0.01;
/// Offset of the rule under a section title.
const TITLE_RULE_MM: f32 = 7.5;

/// Where a generation currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Idle,
    Initializing,
    Background,
    Sections,
    Finalizing,
    Complete,
}

impl RenderStage {
    /// Progress band in percent.
    pub fn band(self) -> (f32, f32) {
        match self {
            RenderStage::Idle => (0.0, 0.0),
            RenderStage::Initializing => (0.0, 10.0),
            RenderStage::Background => (10.0, 20.0),
            RenderStage::Sections => (20.0, 80.0),
            RenderStage::Finalizing => (80.0, 100.0),
            RenderStage::Complete => (100.0, 100.0),
        }
    }

    /// Overall percentage after `fraction` of this stage.
    pub fn progress(self, fraction: f32) -> f32 {
        let (lo, hi) = self.band();
        lo + (hi - lo) * fraction.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Header,
    PersonalInfo,
    SectionTitle,
    Experience,
    Project,
    SkillChips,
    SkillBar,
    SkillRow,
    SkillCategory,
}

/// One block as it was placed: estimated height at its starting y.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub kind: BlockKind,
    pub page: usize,
    pub column: Option<usize>,
    pub y: f32,
    pub height: f32,
}

impl Placement {
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Instrumentation collected while rendering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderTrace {
    pub placements: Vec<Placement>,
    pub page_breaks: usize,
    /// Wrapped line count per skill category, in draw order.
    pub category_lines: Vec<(String, usize)>,
    /// Bottom margin limit placements are checked against.
    pub bottom_limit: f32,
    /// Blocks taller than a whole page, drawn anyway at the top.
    pub oversized: usize,
}

impl RenderTrace {
    pub fn of_kind(&self, kind: BlockKind) -> impl Iterator<Item = &Placement> {
        self.placements.iter().filter(move |p| p.kind == kind)
    }

    /// Placements whose estimate crosses the bottom limit.
    pub fn overflows(&self) -> Vec<&Placement> {
        self.placements
            .iter()
            .filter(|p| p.bottom() > self.bottom_limit + EPSILON)
            .collect()
    }
}

/// Result of one render.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub section_timings: BTreeMap<String, Duration>,
    pub optimizations: Vec<String>,
    pub operation_count: usize,
    pub glass_fallbacks: usize,
    pub trace: RenderTrace,
}

/// Long-lived renderer; shared caches live here, per-render state does not.
#[derive(Clone)]
pub struct Renderer {
    effects: Arc<GlassEffects>,
    backgrounds: Arc<BackgroundRenderer>,
    pool: Arc<SurfacePool>,
    capabilities: CapabilityTable,
}

impl Renderer {
    pub fn new(effects: Arc<GlassEffects>, backgrounds: Arc<BackgroundRenderer>, pool: Arc<SurfacePool>) -> Self {
        Self {
            effects,
            backgrounds,
            pool,
            capabilities: CapabilityTable::resolve(),
        }
    }

    pub fn effects(&self) -> &Arc<GlassEffects> {
        &self.effects
    }

    pub fn pool(&self) -> &Arc<SurfacePool> {
        &self.pool
    }

    /// Render `data` with `template`. `progress` receives the stage and the
    /// overall percentage at each milestone.
    pub async fn render<P>(
        &self,
        data: &ProcessedPdfData,
        template: &Template,
        options: &GenerationOptions,
        mut progress: P,
    ) -> Result<RenderOutput, RenderError>
    where
        P: FnMut(RenderStage, f32) + Send,
    {
        let started = Instant::now();

        progress(RenderStage::Initializing, RenderStage::Initializing.progress(0.0));
        debug!("render '{}': initializing", template.id);
        let mut session = Session::open(self, data, template, options)?;
        progress(RenderStage::Initializing, RenderStage::Initializing.progress(1.0));

        progress(RenderStage::Background, RenderStage::Background.progress(0.0));
        debug!("render '{}': background", template.id);
        session.prepare_background();
        progress(RenderStage::Background, RenderStage::Background.progress(1.0));

        debug!("render '{}': sections", template.id);
        let total = template.sections.len() + 1;
        for (i, section) in template.sections.iter().enumerate() {
            session.draw_section(section).await;
            progress(
                RenderStage::Sections,
                RenderStage::Sections.progress((i + 1) as f32 / total as f32),
            );
            tokio::task::yield_now().await;
        }
        session.draw_fallbacks().await;
        progress(RenderStage::Sections, RenderStage::Sections.progress(1.0));

        progress(RenderStage::Finalizing, RenderStage::Finalizing.progress(0.0));
        debug!("render '{}': finalizing", template.id);
        let output = session.finish(&self.capabilities, started)?;
        progress(RenderStage::Complete, RenderStage::Complete.progress(1.0));
        Ok(output)
    }
}

fn glass_to_render(e: GlassError) -> RenderError {
    match e {
        GlassError::Color(c) => RenderError::Color(c),
        other => RenderError::Background(other),
    }
}

/// Text colours for one render.
#[derive(Debug, Clone, Copy)]
struct Ink {
    page: Rgb,
    /// Body text on elevated glass.
    on_card: Rgb,
    muted: Rgb,
    primary: Rgb,
    accent: Rgb,
    /// Progress bar track.
    track: Rgb,
}

impl Ink {
    fn from_template(template: &Template, elevation: u8) -> Result<Self, RenderError> {
        let colors = &template.colors;
        let page = hex_to_rgb(&colors.background)?;
        let glass = parse_color(&colors.glass.fill)?.rgb();
        Ok(Self {
            page,
            on_card: hex_to_rgb(&enhance_contrast(&colors.text, elevation)?)?,
            muted: hex_to_rgb(&colors.text_secondary)?,
            primary: hex_to_rgb(&colors.primary)?,
            accent: hex_to_rgb(&colors.accent)?,
            track: blend_over(glass.with_alpha((colors.glass.opacity * 2.0).min(1.0)), page),
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Drawn {
    experience: bool,
    skills: bool,
    projects: bool,
}

/// Text style shorthand.
#[derive(Debug, Clone, Copy)]
struct TextStyle {
    family: FontFamily,
    size: f32,
    bold: bool,
    color: Rgb,
    line: f32,
}

/// Per-render state.
struct Session<'a> {
    renderer: &'a Renderer,
    data: &'a ProcessedPdfData,
    template: &'a Template,
    options: &'a GenerationOptions,
    layout: LayoutManager,
    doc: DocumentLayout,
    cursor: PageCursor,
    /// Nothing but chrome has been drawn on the current page.
    fresh_page: bool,
    painter: SectionPainter<'a>,
    fonts: FontManager,
    body: FontFamily,
    heading: FontFamily,
    mono: FontFamily,
    scale: TypographyScale,
    ink: Ink,
    page_mm: (f32, f32),
    background: Option<Arc<RasterImage>>,
    /// Horizontal extent of the section being drawn.
    area: Rect,
    running_header: Option<String>,
    drawn: Drawn,
    timings: BTreeMap<String, Duration>,
    trace: RenderTrace,
    operations: usize,
}

impl<'a> Session<'a> {
    fn open(
        renderer: &'a Renderer,
        data: &'a ProcessedPdfData,
        template: &'a Template,
        options: &'a GenerationOptions,
    ) -> Result<Self, RenderError> {
        let layout = LayoutManager::new(&template.layout)?;
        let page = layout.page_rect();
        let content = layout.content_rect();

        let painter = SectionPainter::new(&renderer.effects, &renderer.pool, template, &options.render)
            .map_err(glass_to_render)?;
        let ink = Ink::from_template(template, painter.elevation(CardKind::Experience))?;

        let fonts = FontManager::for_typography(&template.layout.typography);
        let density = options.density.unwrap_or(template.layout.typography.density);
        let scale = typography_scale(layout.page_width_pt(), density);

        let mut session = Self {
            renderer,
            data,
            template,
            options,
            cursor: PageCursor::new(content.y, layout.bottom_limit()),
            doc: DocumentLayout::new(&data.personal_info.full_name, page.width, page.height),
            fresh_page: true,
            painter,
            body: fonts.resolve(FontPurpose::Body),
            heading: fonts.resolve(FontPurpose::Heading),
            mono: fonts.resolve(FontPurpose::Monospace),
            fonts,
            scale,
            ink,
            page_mm: (page.width, page.height),
            background: None,
            area: content,
            running_header: None,
            drawn: Drawn::default(),
            timings: BTreeMap::new(),
            trace: RenderTrace {
                bottom_limit: layout.bottom_limit(),
                ..RenderTrace::default()
            },
            operations: 0,
            layout,
        };
        session.add_page();
        Ok(session)
    }

    /// Rasterise the backdrop once and lay it on the first page. A failed
    /// composite leaves the flat fill in place.
    fn prepare_background(&mut self) {
        let renderer = self.renderer;
        let result = renderer.backgrounds.page_image(
            &renderer.pool,
            &self.template.colors,
            &self.template.background_options(),
            self.page_mm,
            self.options.render.background_dpi,
        );
        match result {
            Ok(image) => {
                renderer
                    .backgrounds
                    .paint_page(self.doc.current_page_mut(), image.clone(), self.page_mm);
                self.operations += 1;
                self.background = Some(image);
            }
            Err(e) => warn!("background composite failed, keeping flat fill: {e}"),
        }
    }

    /// Append a page with the flat fill and, once prepared, the backdrop.
    fn add_page(&mut self) {
        let renderer = self.renderer;
        let (w, h) = self.page_mm;
        self.doc.add_page();
        let page = self.doc.current_page_mut();
        page.push(Element::Rect {
            rect: Rect::new(0.0, 0.0, w, h),
            radius: 0.0,
            fill: Some(self.ink.page),
            stroke: None,
        });
        self.operations += 1;
        if let Some(image) = &self.background {
            renderer.backgrounds.paint_page(page, image.clone(), self.page_mm);
            self.operations += 1;
        }
    }

    /// Break to a new page and repeat the running section header.
    fn new_page(&mut self) {
        self.new_page_for(0.0);
    }

    /// Break to a new page for a block of `next` mm. The running header is
    /// left off when the block would no longer fit beneath it.
    fn new_page_for(&mut self, next: f32) {
        self.add_page();
        self.cursor.new_page();
        self.trace.page_breaks += 1;
        self.fresh_page = true;
        debug!("page break -> page {}", self.cursor.page + 1);
        if let Some(title) = self.running_header.clone() {
            if self.cursor.fits(SECTION_HEADER_MM + next) {
                self.section_title_row(&title);
            } else {
                debug!("running header '{title}' dropped for a {next:.1}mm block");
            }
        }
    }

    /// Record a block that crosses the bottom margin even on a fresh page.
    fn note_oversized(&mut self, height: f32) {
        warn!(
            "block of {height:.1}mm exceeds the page body ({:.1}mm), drawing anyway",
            self.cursor.limit() - self.cursor.y
        );
        self.trace.oversized += 1;
    }

    /// Make room for a block of `height`. Returns true if a page was broken.
    fn ensure_space(&mut self, height: f32) -> bool {
        if self.cursor.fits(height) {
            return false;
        }
        if self.fresh_page {
            self.note_oversized(height);
            return false;
        }
        self.new_page_for(height);
        if !self.cursor.fits(height) {
            self.note_oversized(height);
        }
        true
    }

    fn place(&mut self, kind: BlockKind, column: Option<usize>, y: f32, height: f32) {
        self.trace.placements.push(Placement {
            kind,
            page: self.cursor.page,
            column,
            y,
            height,
        });
        self.fresh_page = false;
    }

    fn push(&mut self, element: Element) {
        self.doc.current_page_mut().push(element);
        self.operations += 1;
    }

    fn text(&mut self, x: f32, y: f32, lines: Vec<String>, style: TextStyle) {
        if lines.iter().all(|l| l.trim().is_empty()) {
            return;
        }
        self.push(Element::Text(TextBlock {
            x,
            y,
            lines,
            family: style.family,
            size_pt: style.size,
            bold: style.bold,
            italic: false,
            color: style.color,
            line_height: style.line,
        }));
    }

    fn body_style(&self, size: f32, color: Rgb, line: f32) -> TextStyle {
        TextStyle {
            family: self.body,
            size,
            bold: false,
            color,
            line,
        }
    }

    fn heading_style(&self, size: f32, color: Rgb, line: f32) -> TextStyle {
        TextStyle {
            family: self.heading,
            size,
            bold: true,
            color,
            line,
        }
    }

    /// Start a titled section, keeping the title with at least one block.
    fn section_title(&mut self, title: &str) {
        self.running_header = None;
        self.ensure_space(SECTION_HEADER_MM + minimal_block_height());
        self.section_title_row(title);
        self.running_header = Some(title.to_string());
    }

    fn section_title_row(&mut self, title: &str) {
        let area = self.area;
        let y = self.cursor.y;
        let size = self.scale.sizes.section_header;
        let style = self.heading_style(size, self.ink.primary, SECTION_HEADER_MM);
        self.text(area.x, y, vec![title.to_string()], style);
        self.push(Element::Line {
            from: (area.x, y + TITLE_RULE_MM),
            to: (area.right(), y + TITLE_RULE_MM),
            stroke: StrokeStyle {
                color: blend_over(self.ink.primary.with_alpha(0.5), self.ink.page),
                width_pt: 0.6,
            },
        });
        // chrome, not content: the page stays fresh
        self.trace.placements.push(Placement {
            kind: BlockKind::SectionTitle,
            page: self.cursor.page,
            column: None,
            y,
            height: SECTION_HEADER_MM,
        });
        self.cursor.advance(SECTION_HEADER_MM);
    }

    fn section_gap(&mut self) {
        self.cursor.advance(self.template.layout.spacing.section);
    }

    async fn draw_section(&mut self, section: &SectionConfig) {
        let started = Instant::now();
        self.running_header = None;
        let has_content = match section.id.as_str() {
            "experience" => !self.data.experiences.is_empty(),
            "projects" => !self.data.projects.is_empty(),
            "skills" => !self.data.skills.is_empty(),
            _ => true,
        };
        if has_content {
            while self.cursor.page < section.page as usize {
                self.new_page();
            }
        }
        self.area = self.layout.snap_section(&section.position);

        match section.id.as_str() {
            "header" | "hero" => self.draw_header(),
            "personal-info" => self.draw_personal_info(),
            "experience" => {
                self.draw_experience(section.variant).await;
                self.drawn.experience = true;
            }
            "skills" => {
                self.draw_skills();
                self.drawn.skills = true;
            }
            "projects" => {
                self.draw_projects().await;
                self.drawn.projects = true;
            }
            other => {
                warn!("skipping unknown section '{other}' in template '{}'", self.template.id);
                return;
            }
        }
        *self.timings.entry(section.id.clone()).or_default() += started.elapsed();
    }

    /// Draw content sections the template forgot to list.
    async fn draw_fallbacks(&mut self) {
        let content = self.layout.content_rect();
        let pending = [
            ("experience", !self.drawn.experience && !self.data.experiences.is_empty()),
            ("skills", !self.drawn.skills && !self.data.skills.is_empty()),
            ("projects", !self.drawn.projects && !self.data.projects.is_empty()),
        ];
        for (id, missing) in pending {
            if !missing {
                continue;
            }
            warn!("template '{}' has no '{id}' section, drawing it after the declared ones", self.template.id);
            let started = Instant::now();
            self.running_header = None;
            self.area = content;
            match id {
                "experience" => self.draw_experience(SectionVariant::Default).await,
                "skills" => self.draw_skills(),
                _ => self.draw_projects().await,
            }
            *self.timings.entry(id.to_string()).or_default() += started.elapsed();
        }
    }

    fn finish(self, table: &CapabilityTable, started: Instant) -> Result<RenderOutput, RenderError> {
        let mut optimizations = Vec::new();
        if self.data.experiences.is_empty() {
            optimizations.push("no-experience".to_string());
        }
        if self.data.projects.is_empty() {
            optimizations.push("no-projects".to_string());
        }
        if self.doc.page_count() == 1 {
            optimizations.push("single-page".to_string());
        }
        let placed_images = self
            .doc
            .pages
            .iter()
            .flat_map(|p| &p.elements)
            .filter(|e| matches!(e, Element::Image { .. }))
            .count();
        let capabilities = table.apply(&[
            Capability::Compression,
            Capability::ImageDeduplication,
            Capability::ColorProfile,
        ]);
        if capabilities.contains(&Capability::ImageDeduplication)
            && self.doc.unique_image_count() < placed_images
        {
            optimizations.push("image-dedup".to_string());
        }

        let bytes = write_pdf(&self.doc, &capabilities)?;

        let elapsed = started.elapsed();
        let budget = self.options.max_render_time();
        if elapsed > budget {
            warn!(
                "render of '{}' took {}ms, over the {}ms target",
                self.template.id,
                elapsed.as_millis(),
                budget.as_millis()
            );
        }

        Ok(RenderOutput {
            page_count: self.doc.page_count(),
            bytes,
            section_timings: self.timings,
            optimizations,
            operation_count: self.operations,
            glass_fallbacks: self.painter.fallbacks(),
            trace: self.trace,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderOptions;
    use crate::data::{ExperienceItem, PersonalInfo};
    use crate::templates;

    fn renderer() -> Renderer {
        Renderer::new(
            Arc::new(GlassEffects::new()),
            Arc::new(BackgroundRenderer::new()),
            Arc::new(SurfacePool::default()),
        )
    }

    fn fast_options() -> GenerationOptions {
        GenerationOptions {
            render: RenderOptions::fast(),
            ..GenerationOptions::default()
        }
    }

    fn person() -> ProcessedPdfData {
        ProcessedPdfData {
            personal_info: PersonalInfo {
                full_name: "Grace Hopper".into(),
                title: "Rear Admiral".into(),
                email: Some("grace@example.com".into()),
                ..PersonalInfo::default()
            },
            ..ProcessedPdfData::default()
        }
    }

    fn job(i: usize) -> ExperienceItem {
        ExperienceItem {
            id: format!("exp-{i}"),
            title: format!("Engineer {i}"),
            company: "Navy".into(),
            start_date: "1950".into(),
            end_date: Some("1960".into()),
            description: "Built compilers and evangelised machine independent programming languages \
                          across the fleet and the wider industry."
                .into(),
            achievements: vec!["COBOL".into(), "FLOW-MATIC".into(), "A-0".into(), "extra".into()],
            technologies: vec!["UNIVAC".into()],
            ..ExperienceItem::default()
        }
    }

    #[test]
    fn stage_bands_are_contiguous() {
        assert_eq!(RenderStage::Initializing.progress(1.0), RenderStage::Background.progress(0.0));
        assert_eq!(RenderStage::Background.progress(1.0), RenderStage::Sections.progress(0.0));
        assert_eq!(RenderStage::Sections.progress(1.0), RenderStage::Finalizing.progress(0.0));
        assert_eq!(RenderStage::Sections.progress(0.5), 50.0);
        assert_eq!(RenderStage::Complete.progress(0.0), 100.0);
    }

    #[tokio::test]
    async fn progress_is_monotonic() {
        let mut seen = Vec::new();
        let out = renderer()
            .render(&person(), &templates::recruiter_glass(), &fast_options(), |_, p| seen.push(p))
            .await
            .unwrap();
        assert!(!out.bytes.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last().copied(), Some(100.0));
    }

    #[tokio::test]
    async fn unknown_sections_are_skipped() {
        let mut t = templates::recruiter_glass();
        t.sections[1].id = "testimonials".into();
        let out = renderer()
            .render(&person(), &t, &fast_options(), |_, _| {})
            .await
            .unwrap();
        assert!(!out.section_timings.contains_key("testimonials"));
        assert!(out.section_timings.contains_key("header"));
    }

    #[tokio::test]
    async fn missing_sections_fall_back() {
        let mut t = templates::recruiter_glass();
        t.sections.retain(|s| s.id == "header");
        let mut data = person();
        data.experiences = vec![job(0), job(1)];
        let out = renderer().render(&data, &t, &fast_options(), |_, _| {}).await.unwrap();
        assert_eq!(out.trace.of_kind(BlockKind::Experience).count(), 2);
        assert!(out.section_timings.contains_key("experience"));
    }

    #[tokio::test]
    async fn stacked_experience_never_overflows() {
        let mut data = person();
        data.experiences = (0..18).map(job).collect();
        let r = renderer();
        let out = r
            .render(&data, &templates::recruiter_glass(), &fast_options(), |_, _| {})
            .await
            .unwrap();
        assert!(out.page_count > 1);
        assert_eq!(out.trace.page_breaks, out.page_count - 1);
        assert!(out.trace.overflows().is_empty(), "{:?}", out.trace.overflows());
        assert_eq!(out.trace.of_kind(BlockKind::Experience).count(), 18);
        // running header repeated on every continuation page
        let titles = out.trace.of_kind(BlockKind::SectionTitle).count();
        assert!(titles >= out.page_count);
        assert_eq!(r.pool().in_use_count(), 0);
    }

    #[tokio::test]
    async fn later_page_sections_start_a_page() {
        let t = templates::executive_glass();
        let mut data = person();
        data.skills.compact.badges = vec!["Leadership".into()];
        let out = renderer().render(&data, &t, &fast_options(), |_, _| {}).await.unwrap();
        assert!(out.page_count >= 2);
        let chips: Vec<_> = out.trace.of_kind(BlockKind::SkillChips).collect();
        assert!(chips.iter().all(|p| p.page >= 1));
    }

    #[tokio::test]
    async fn invalid_background_colour_aborts() {
        let mut t = templates::recruiter_glass();
        t.colors.background = "#zzz".into();
        let err = renderer()
            .render(&person(), &t, &fast_options(), |_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Color(_)));
    }

    #[tokio::test]
    async fn backdrop_is_shared_across_pages() {
        let mut data = person();
        data.experiences = (0..18).map(job).collect();
        let out = renderer()
            .render(&data, &templates::recruiter_glass(), &fast_options(), |_, _| {})
            .await
            .unwrap();
        assert!(out.optimizations.contains(&"image-dedup".to_string()));
        assert!(out.optimizations.contains(&"no-projects".to_string()));
        assert!(!out.optimizations.contains(&"single-page".to_string()));
    }
}
