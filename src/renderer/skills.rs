//! Skills section in its three display modes.

use log::{debug, warn};

use super::{BlockKind, Session};
use crate::color::blend_over;
use crate::data::{CompactSkills, SkillCategory, SkillEntry, SkillsDisplayMode};
use crate::document::{Element, StrokeStyle};
use crate::fonts::TypographyScale;
use crate::glass::BadgeElement;
use crate::layout::Rect;
use crate::pagination::{Estimator, CATEGORY_HEADING_MM, CATEGORY_LINE_MM};

const CHIP_HEIGHT_MM: f32 = 6.0;
const CHIP_PAD_MM: f32 = 2.5;
const CHIP_GAP_MM: f32 = 2.0;
const BAR_ROW_MM: f32 = 9.0;
const BAR_HEIGHT_MM: f32 = 2.2;
const DETAIL_ROW_MM: f32 = 7.0;
/// Categories are wrapped this much narrower than the section.
const CATEGORY_INSET_MM: f32 = 10.0;

/// Greedy row packing of chip widths into `max_width`.
fn pack_rows(widths: &[f32], max_width: f32, gap: f32) -> Vec<Vec<usize>> {
    let mut rows: Vec<Vec<usize>> = Vec::new();
    let mut used = 0.0;
    for (i, &w) in widths.iter().enumerate() {
        match rows.last_mut() {
            Some(row) if used + gap + w <= max_width => {
                row.push(i);
                used += gap + w;
            }
            _ => {
                rows.push(vec![i]);
                used = w;
            }
        }
    }
    rows
}

impl Session<'_> {
    pub(super) fn draw_skills(&mut self) {
        let data = self.data;
        let skills = &data.skills;
        let mode = skills.recommended_mode;
        let empty = match mode {
            SkillsDisplayMode::Compact => skills.compact.badges.is_empty() && skills.compact.top_skills.is_empty(),
            SkillsDisplayMode::Detailed => skills.detailed.is_empty(),
            SkillsDisplayMode::Categorized => skills.categorized.iter().all(|c| c.skills.is_empty()),
        };
        if empty {
            debug!("no skills for {mode:?} mode, section skipped");
            return;
        }

        self.section_title("Skills");
        match mode {
            SkillsDisplayMode::Compact => self.compact_skills(&skills.compact),
            SkillsDisplayMode::Detailed => self.detailed_skills(&skills.detailed),
            SkillsDisplayMode::Categorized => self.categorized_skills(&skills.categorized),
        }
        self.section_gap();
    }

    fn compact_skills(&mut self, compact: &CompactSkills) {
        let area = self.area;
        let size = self.scale.sizes.small;
        let widths: Vec<f32> = compact
            .badges
            .iter()
            .map(|b| {
                (self.fonts.measure_text_width(b, size, self.body, false) + 2.0 * CHIP_PAD_MM).min(area.width)
            })
            .collect();

        for row in pack_rows(&widths, area.width, CHIP_GAP_MM) {
            self.ensure_space(CHIP_HEIGHT_MM);
            let y = self.cursor.y;
            let mut x = area.x;
            for i in row {
                self.draw_chip(Rect::new(x, y, widths[i], CHIP_HEIGHT_MM), &compact.badges[i]);
                x += widths[i] + CHIP_GAP_MM;
            }
            self.place(BlockKind::SkillChips, None, y, CHIP_HEIGHT_MM);
            self.cursor.advance(CHIP_HEIGHT_MM + CHIP_GAP_MM);
        }

        if !self.template.features.progress_bars || compact.top_skills.is_empty() {
            return;
        }
        if !compact.badges.is_empty() {
            self.cursor.advance(CHIP_GAP_MM);
        }
        let columns = self.layout.split_columns(area);
        for pair in compact.top_skills.chunks(2) {
            self.ensure_space(BAR_ROW_MM);
            let y = self.cursor.y;
            for (col, skill) in pair.iter().enumerate() {
                let cell = columns[col];
                let label = self.heading_style(size, self.ink.on_card, 4.0);
                self.text(cell.x, y, vec![skill.name.clone()], label);
                self.draw_bar(Rect::new(cell.x, y + 5.0, cell.width, BAR_HEIGHT_MM), skill.proficiency, true);
                self.place(BlockKind::SkillBar, Some(col), y, BAR_ROW_MM);
            }
            self.cursor.advance(BAR_ROW_MM);
        }
    }

    /// Snapshot chip when the template asks for them, vector chip otherwise
    /// or when the snapshot fails.
    fn draw_chip(&mut self, rect: Rect, label: &str) {
        let radius = self.template.layout.radius.chip;
        let background = self.ink.primary.with_alpha(0.18);
        let border = self.ink.primary.with_alpha(0.4);

        let mut drawn = false;
        if self.template.rendering.badge_snapshots && self.painter.glass_enabled() {
            let badge = BadgeElement {
                label: label.to_string(),
                width_mm: rect.width,
                height_mm: rect.height,
                radius_mm: radius,
                background,
                border,
                highlight: true,
            };
            match self
                .renderer
                .effects
                .render_badge_snapshot(&badge, self.options.render.surface_dpi)
            {
                Ok(image) => {
                    self.push(Element::Image { rect, image });
                    drawn = true;
                }
                Err(e) => warn!("badge snapshot for '{label}' failed, drawing vector chip: {e}"),
            }
        }
        if !drawn {
            self.push(Element::Rect {
                rect,
                radius,
                fill: Some(blend_over(background, self.ink.page)),
                stroke: Some(StrokeStyle {
                    color: blend_over(border, self.ink.page),
                    width_pt: 0.4,
                }),
            });
        }

        let size = self.scale.sizes.small;
        let line = TypographyScale::line_mm(size, self.scale.line_height.small);
        let style = self.body_style(size, self.ink.on_card, line);
        self.text(
            rect.x + CHIP_PAD_MM,
            rect.y + (rect.height - line) / 2.0,
            vec![label.to_string()],
            style,
        );
    }

    /// Progress bar; `glass` puts the track on a glass pane when enabled.
    fn draw_bar(&mut self, track: Rect, proficiency: u8, glass: bool) {
        let radius = track.height / 2.0;
        if glass && self.painter.glass_enabled() {
            self.operations += self.painter.progress_track(self.doc.current_page_mut(), track);
        } else {
            self.push(Element::Rect {
                rect: track,
                radius,
                fill: Some(self.ink.track),
                stroke: None,
            });
        }
        let filled = track.width * f32::from(proficiency.min(100)) / 100.0;
        if filled > 0.0 {
            self.push(Element::Rect {
                rect: Rect::new(track.x, track.y, filled, track.height),
                radius: radius.min(filled / 2.0),
                fill: Some(self.ink.primary),
                stroke: None,
            });
        }
    }

    fn detailed_skills(&mut self, entries: &[SkillEntry]) {
        let area = self.area;
        let size = self.scale.sizes.caption;
        let name_w = area.width * 0.4;
        let bar_x = area.x + area.width * 0.42;
        let bar_w = area.width * 0.36;
        let chip_x = area.x + area.width * 0.82;
        let chip_w = area.width * 0.18;

        for entry in entries {
            self.ensure_space(DETAIL_ROW_MM);
            let y = self.cursor.y;
            let name = self
                .fonts
                .truncate_to_width(&entry.name, size, self.body, false, name_w);
            let style = self.body_style(size, self.ink.on_card, DETAIL_ROW_MM);
            self.text(area.x, y + 0.5, vec![name], style);
            self.draw_bar(
                Rect::new(bar_x, y + (DETAIL_ROW_MM - BAR_HEIGHT_MM) / 2.0, bar_w, BAR_HEIGHT_MM),
                entry.proficiency,
                false,
            );
            if let Some(level) = entry.level.as_deref().filter(|l| !l.trim().is_empty()) {
                let chip = Rect::new(chip_x, y + 0.5, chip_w, CHIP_HEIGHT_MM - 1.0);
                let label = self
                    .fonts
                    .truncate_to_width(level, self.scale.sizes.small, self.body, false, chip_w - 2.0 * CHIP_PAD_MM);
                self.draw_chip(chip, &label);
            }
            self.place(BlockKind::SkillRow, None, y, DETAIL_ROW_MM);
            self.cursor.advance(DETAIL_ROW_MM);
        }
    }

    fn categorized_skills(&mut self, categories: &[SkillCategory]) {
        let area = self.area;
        let width = area.width - CATEGORY_INSET_MM;
        let fonts = self.fonts.clone();
        let estimator = Estimator::new(&fonts, self.body, self.heading, self.scale.sizes);
        let body = self.scale.sizes.body;

        for category in categories.iter().filter(|c| !c.skills.is_empty()) {
            let prepared = estimator.category(category, width);
            self.ensure_space(prepared.height);
            let y = self.cursor.y;

            let heading = self.heading_style(body, self.ink.primary, CATEGORY_HEADING_MM);
            self.text(area.x, y, vec![prepared.heading.clone()], heading);
            let style = self.body_style(body, self.ink.on_card, CATEGORY_LINE_MM);
            self.text(
                area.x + CATEGORY_INSET_MM / 2.0,
                y + CATEGORY_HEADING_MM,
                prepared.lines.clone(),
                style,
            );

            self.place(BlockKind::SkillCategory, None, y, prepared.height);
            self.trace
                .category_lines
                .push((prepared.heading.clone(), prepared.lines.len()));
            self.cursor
                .advance(prepared.height + self.template.layout.spacing.element);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::background::BackgroundRenderer;
    use crate::config::{GenerationOptions, RenderOptions};
    use crate::data::{PersonalInfo, ProcessedPdfData, ProcessedSkills};
    use crate::glass::GlassEffects;
    use crate::performance::SurfacePool;
    use crate::renderer::Renderer;
    use crate::templates;

    fn renderer() -> Renderer {
        Renderer::new(
            Arc::new(GlassEffects::new()),
            Arc::new(BackgroundRenderer::new()),
            Arc::new(SurfacePool::default()),
        )
    }

    fn options() -> GenerationOptions {
        GenerationOptions {
            render: RenderOptions {
                surface_dpi: 48.0,
                background_dpi: 24.0,
                ..RenderOptions::fast()
            },
            ..GenerationOptions::default()
        }
    }

    fn with_skills(skills: ProcessedSkills) -> ProcessedPdfData {
        ProcessedPdfData {
            personal_info: PersonalInfo {
                full_name: "Barbara Liskov".into(),
                ..PersonalInfo::default()
            },
            skills,
            ..ProcessedPdfData::default()
        }
    }

    fn entry(name: &str, proficiency: u8) -> SkillEntry {
        SkillEntry {
            name: name.into(),
            proficiency,
            level: Some("Expert".into()),
            category: None,
        }
    }

    #[test]
    fn rows_pack_greedily() {
        let rows = pack_rows(&[20.0, 20.0, 20.0, 50.0, 10.0], 64.0, 2.0);
        assert_eq!(rows, vec![vec![0, 1, 2], vec![3, 4]]);
        assert_eq!(pack_rows(&[], 10.0, 1.0), Vec::<Vec<usize>>::new());
    }

    #[tokio::test]
    async fn compact_mode_draws_chips_and_bars() {
        let skills = ProcessedSkills {
            compact: CompactSkills {
                badges: (0..30).map(|i| format!("Skill {i}")).collect(),
                top_skills: vec![entry("CLU", 95), entry("Argus", 80), entry("Thor", 60)],
            },
            ..ProcessedSkills::default()
        };
        let fx = Arc::new(GlassEffects::new());
        let r = Renderer::new(fx.clone(), Arc::new(BackgroundRenderer::new()), Arc::new(SurfacePool::default()));
        let out = r
            .render(&with_skills(skills), &templates::technical_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        assert!(out.trace.of_kind(BlockKind::SkillChips).count() > 1);
        let bars: Vec<_> = out.trace.of_kind(BlockKind::SkillBar).collect();
        assert_eq!(bars.len(), 3);
        assert_eq!(bars[2].column, Some(0));
        assert!(fx.cached_snapshots() > 0);
        assert_eq!(out.glass_fallbacks, 0);
    }

    #[tokio::test]
    async fn detailed_mode_draws_one_row_per_skill() {
        let skills = ProcessedSkills {
            detailed: (0..70).map(|i| entry(&format!("Skill {i}"), (i % 100) as u8)).collect(),
            recommended_mode: SkillsDisplayMode::Detailed,
            ..ProcessedSkills::default()
        };
        let out = renderer()
            .render(&with_skills(skills), &templates::recruiter_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        assert_eq!(out.trace.of_kind(BlockKind::SkillRow).count(), 70);
        assert!(out.page_count >= 2);
        assert!(out.trace.overflows().is_empty());
    }

    #[tokio::test]
    async fn empty_mode_skips_section() {
        let skills = ProcessedSkills {
            detailed: vec![entry("Ignored", 50)],
            recommended_mode: SkillsDisplayMode::Categorized,
            ..ProcessedSkills::default()
        };
        let out = renderer()
            .render(&with_skills(skills), &templates::recruiter_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        assert_eq!(out.trace.of_kind(BlockKind::SectionTitle).count(), 0);
    }
}
