//! Header, contact card, experience and project drawers.

use std::sync::Arc;

use log::warn;

use super::{BlockKind, Session, TextStyle};
use crate::data::{ExperienceItem, ProjectItem};
use crate::document::{Element, RasterImage};
use crate::fonts::{FontManager, TypographyScale};
use crate::layout::{elevated_padding, Rect};
use crate::pagination::{
    ColumnFlow, Estimator, PreparedBlock, ACHIEVEMENT_LINE_MM, BLOCK_SPACING_MM,
    CARD_PADDING_MM, DESCRIPTION_LINE_MM, META_LINE_MM, TECH_LINE_MM, TITLE_LINE_MM,
};
use crate::performance::process_in_chunks;
use crate::sections::CardKind;
use crate::template::SectionVariant;
use crate::writer::parse_data_uri;

const MAX_SUMMARY_LINES: usize = 3;

impl Session<'_> {
    fn card_padding(&self, kind: CardKind) -> f32 {
        elevated_padding(self.template.layout.spacing.element, self.painter.elevation(kind))
    }

    fn estimator<'f>(&self, fonts: &'f FontManager) -> Estimator<'f> {
        Estimator::new(fonts, self.body, self.heading, self.scale.sizes)
    }

    /// Decoded profile photo, if the template shows one and it parses.
    fn profile_photo(&self) -> Option<Arc<RasterImage>> {
        if !self.template.features.profile_photo || !self.options.include_photo {
            return None;
        }
        let uri = self.data.personal_info.photo.as_deref()?;
        let bytes = match parse_data_uri(uri) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("ignoring profile photo: {e}");
                return None;
            }
        };
        match image::load_from_memory(&bytes) {
            Ok(decoded) => Some(RasterImage::new(bytes, decoded.width(), decoded.height())),
            Err(e) => {
                warn!("ignoring undecodable profile photo: {e}");
                None
            }
        }
    }

    pub(super) fn draw_header(&mut self) {
        let data = self.data;
        let info = &data.personal_info;
        let area = self.area;
        let sizes = self.scale.sizes;
        let lh = self.scale.line_height;
        let pad = self.card_padding(CardKind::Header);

        let name_h = TypographyScale::line_mm(sizes.name, lh.heading);
        let title_h = TypographyScale::line_mm(sizes.title, lh.heading);
        let contact_h = TypographyScale::line_mm(sizes.small, lh.small);
        let body_h = TypographyScale::line_mm(sizes.body, lh.body);

        let photo = self.profile_photo();
        let photo_side = if photo.is_some() { name_h + title_h + contact_h } else { 0.0 };
        let text_w = (area.width - 2.0 * pad - if photo.is_some() { photo_side + pad } else { 0.0 }).max(1.0);

        let name = self
            .fonts
            .truncate_to_width(&info.full_name, sizes.name, self.heading, true, text_w);
        let title = (!info.title.trim().is_empty())
            .then(|| self.fonts.truncate_to_width(&info.title, sizes.title, self.heading, false, text_w));
        let contacts: Vec<&str> = info.contact_lines().into_iter().map(|(_, v)| v).collect();
        let contact = (!contacts.is_empty()).then(|| {
            self.fonts
                .truncate_to_width(&contacts.join("  |  "), sizes.small, self.body, false, text_w)
        });
        let mut summary = match info.summary.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => self.fonts.wrap_text(s, sizes.body, self.body, false, text_w),
            None => Vec::new(),
        };
        summary.truncate(MAX_SUMMARY_LINES);

        let mut height = 2.0 * pad + name_h;
        if title.is_some() {
            height += title_h;
        }
        if contact.is_some() {
            height += contact_h;
        }
        if !summary.is_empty() {
            height += self.template.layout.spacing.line + summary.len() as f32 * body_h;
        }
        height = height.max(2.0 * pad + photo_side);

        self.ensure_space(height);
        let card = Rect::new(area.x, self.cursor.y, area.width, height);
        self.operations += self.painter.header(self.doc.current_page_mut(), card);

        let x = card.x + pad;
        let mut y = card.y + pad;
        let style = self.heading_style(sizes.name, self.ink.on_card, name_h);
        self.text(x, y, vec![name], style);
        y += name_h;
        if let Some(title) = title {
            let style = TextStyle {
                bold: false,
                ..self.heading_style(sizes.title, self.ink.primary, title_h)
            };
            self.text(x, y, vec![title], style);
            y += title_h;
        }
        if let Some(contact) = contact {
            let style = self.body_style(sizes.small, self.ink.muted, contact_h);
            self.text(x, y, vec![contact], style);
            y += contact_h;
        }
        if !summary.is_empty() {
            y += self.template.layout.spacing.line;
            let style = self.body_style(sizes.body, self.ink.on_card, body_h);
            self.text(x, y, summary, style);
        }
        if let Some(image) = photo {
            self.push(Element::Image {
                rect: Rect::new(card.right() - pad - photo_side, card.y + pad, photo_side, photo_side),
                image,
            });
        }

        self.place(BlockKind::Header, None, card.y, height);
        self.cursor.advance(height);
        self.section_gap();
    }

    pub(super) fn draw_personal_info(&mut self) {
        let data = self.data;
        let contacts = data.personal_info.contact_lines();
        if contacts.is_empty() {
            return;
        }
        let area = self.area;
        let sizes = self.scale.sizes;
        let line = TypographyScale::line_mm(sizes.small, self.scale.line_height.small) + 0.6;
        let pad = self.card_padding(CardKind::Sidebar);
        let text_w = (area.width - 2.0 * pad).max(1.0);
        let lines: Vec<String> = contacts
            .iter()
            .map(|(label, value)| {
                self.fonts
                    .truncate_to_width(&format!("{label}: {value}"), sizes.small, self.body, false, text_w)
            })
            .collect();
        let height = 2.0 * pad + lines.len() as f32 * line;

        self.ensure_space(height);
        let card = Rect::new(area.x, self.cursor.y, area.width, height);
        self.operations += self.painter.sidebar_card(self.doc.current_page_mut(), card);
        let style = self.body_style(sizes.small, self.ink.on_card, line);
        self.text(card.x + pad, card.y + pad, lines, style);

        self.place(BlockKind::PersonalInfo, None, card.y, height);
        self.cursor.advance(height);
        self.section_gap();
    }

    /// Lay out the pre-measured lines of a card.
    fn draw_block_text(&mut self, card: Rect, block: &PreparedBlock, pad_x: f32) {
        let x = card.x + pad_x;
        let mut y = card.y + CARD_PADDING_MM;

        let title = self.heading_style(self.scale.sizes.body, self.ink.on_card, TITLE_LINE_MM);
        self.text(x, y, vec![block.title.clone()], title);
        y += TITLE_LINE_MM;

        if let Some(meta) = &block.meta {
            let style = self.body_style(self.scale.sizes.small, self.ink.muted, META_LINE_MM);
            self.text(x, y, vec![meta.clone()], style);
            y += META_LINE_MM;
        }
        if !block.description.is_empty() {
            let style = self.body_style(self.scale.sizes.caption, self.ink.on_card, DESCRIPTION_LINE_MM);
            self.text(x, y, block.description.clone(), style);
            y += block.description.len() as f32 * DESCRIPTION_LINE_MM;
        }
        if !block.bullets.is_empty() {
            let style = self.body_style(self.scale.sizes.caption, self.ink.on_card, ACHIEVEMENT_LINE_MM);
            self.text(x, y, block.bullets.clone(), style);
            y += block.bullets.len() as f32 * ACHIEVEMENT_LINE_MM;
        }
        if let Some(tech) = &block.tech {
            let style = TextStyle {
                family: self.mono,
                ..self.body_style(self.scale.sizes.small, self.ink.accent, TECH_LINE_MM)
            };
            self.text(x, y, vec![tech.clone()], style);
        }
    }

    pub(super) async fn draw_experience(&mut self, variant: SectionVariant) {
        let data = self.data;
        let items: &[ExperienceItem] = &data.experiences;
        if items.is_empty() {
            return;
        }
        let two_column = variant == SectionVariant::TwoColumn
            || (self.template.layout.columns >= 2 && variant != SectionVariant::Stacked);

        self.section_title("Experience");
        let area = self.area;
        let pad = self.card_padding(CardKind::Experience);
        let columns = self.layout.split_columns(area);
        let card_w = if two_column { columns[0].width } else { area.width };
        let text_w = (card_w - 2.0 * pad).max(1.0);

        let fonts = self.fonts.clone();
        let estimator = self.estimator(&fonts);
        let blocks = process_in_chunks(
            items,
            self.options.render.chunk_size,
            |chunk| chunk.iter().map(|item| estimator.experience(item, text_w)).collect(),
            |_| {},
        )
        .await;
        let heights: Vec<f32> = items
            .iter()
            .zip(&blocks)
            .map(|(item, block)| block.reserved(item.estimated_height))
            .collect();

        if two_column {
            self.flow_columns(columns, &blocks, &heights, pad);
        } else {
            for (block, &height) in blocks.iter().zip(&heights) {
                self.ensure_space(height);
                let card = Rect::new(area.x, self.cursor.y, area.width, height);
                self.operations += self.painter.experience_card(self.doc.current_page_mut(), card);
                self.draw_block_text(card, block, pad);
                self.place(BlockKind::Experience, None, card.y, height);
                self.cursor.advance(height + BLOCK_SPACING_MM);
            }
        }
        self.section_gap();
    }

    /// Assign each card to the shorter column. When the chosen column is
    /// full both columns break together.
    fn flow_columns(&mut self, columns: [Rect; 2], blocks: &[PreparedBlock], heights: &[f32], pad: f32) {
        let mut flow = ColumnFlow::new(self.cursor.y, self.cursor.limit());
        for (block, &height) in blocks.iter().zip(heights) {
            let mut col = flow.pick();
            if !flow.fits(col, height) {
                if !self.fresh_page {
                    self.new_page_for(height);
                    flow.reset(self.cursor.y);
                    col = flow.pick();
                }
                if !flow.fits(col, height) {
                    self.note_oversized(height);
                }
            }
            let y = flow.place(col, height, BLOCK_SPACING_MM);
            let card = Rect::new(columns[col].x, y, columns[col].width, height);
            self.operations += self.painter.experience_card(self.doc.current_page_mut(), card);
            self.draw_block_text(card, block, pad);
            self.place(BlockKind::Experience, Some(col), y, height);
        }
        self.cursor.y = flow.bottom();
    }

    pub(super) async fn draw_projects(&mut self) {
        let data = self.data;
        let items: &[ProjectItem] = &data.projects;
        if items.is_empty() {
            return;
        }
        self.section_title("Projects");
        let area = self.area;
        let pad = self.card_padding(CardKind::Project);
        let text_w = (area.width - 2.0 * pad).max(1.0);

        let fonts = self.fonts.clone();
        let estimator = self.estimator(&fonts);
        let blocks = process_in_chunks(
            items,
            self.options.render.chunk_size,
            |chunk| chunk.iter().map(|item| estimator.project(item, text_w)).collect(),
            |_| {},
        )
        .await;

        for (item, block) in items.iter().zip(&blocks) {
            let height = block.reserved(item.estimated_height);
            self.ensure_space(height);
            let card = Rect::new(area.x, self.cursor.y, area.width, height);
            self.operations += self.painter.project_card(self.doc.current_page_mut(), card);
            self.draw_block_text(card, block, pad);
            self.place(BlockKind::Project, None, card.y, height);
            self.cursor.advance(height + BLOCK_SPACING_MM);
        }
        self.section_gap();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::background::BackgroundRenderer;
    use crate::config::{GenerationOptions, RenderOptions};
    use crate::data::{ExperienceItem, PersonalInfo, ProcessedPdfData, ProjectItem};
    use crate::glass::GlassEffects;
    use crate::performance::SurfacePool;
    use crate::renderer::{BlockKind, Renderer};
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
                surface_dpi: 36.0,
                background_dpi: 24.0,
                ..RenderOptions::fast()
            },
            ..GenerationOptions::default()
        }
    }

    fn data(experiences: usize) -> ProcessedPdfData {
        ProcessedPdfData {
            personal_info: PersonalInfo {
                full_name: "Linus Torvalds".into(),
                title: "Kernel Maintainer".into(),
                summary: Some("Writes kernels. ".repeat(20)),
                ..PersonalInfo::default()
            },
            experiences: (0..experiences)
                .map(|i| ExperienceItem {
                    id: i.to_string(),
                    title: "Maintainer".into(),
                    company: "Linux Foundation".into(),
                    start_date: "1991".into(),
                    current: true,
                    description: "Merges patches. ".repeat(30),
                    achievements: vec!["git".into(), "linux".into()],
                    ..ExperienceItem::default()
                })
                .collect(),
            ..ProcessedPdfData::default()
        }
    }

    #[tokio::test]
    async fn two_column_cards_alternate_and_balance() {
        let out = renderer()
            .render(&data(12), &templates::technical_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        let cards: Vec<_> = out.trace.of_kind(BlockKind::Experience).collect();
        assert_eq!(cards.len(), 12);
        assert!(cards.iter().all(|c| c.column.is_some()));
        let last_page = cards.iter().map(|c| c.page).max().unwrap();
        let count = |col| cards.iter().filter(|c| c.page == last_page && c.column == Some(col)).count();
        assert!(count(0).abs_diff(count(1)) <= 1);
        assert!(out.trace.overflows().is_empty());
    }

    fn tall(experiences: usize, estimated_height: f32) -> ProcessedPdfData {
        let mut d = data(experiences);
        for item in &mut d.experiences {
            item.estimated_height = estimated_height;
        }
        d
    }

    #[tokio::test]
    async fn near_page_height_cards_drop_running_header() {
        let out = renderer()
            .render(&tall(2, 260.0), &templates::recruiter_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        assert!(out.trace.overflows().is_empty(), "{:?}", out.trace.overflows());
        assert_eq!(out.trace.oversized, 0);
        let cards: Vec<_> = out.trace.of_kind(BlockKind::Experience).collect();
        assert_eq!(cards.iter().map(|c| c.page).collect::<Vec<_>>(), vec![1, 2]);
        assert!(out
            .trace
            .of_kind(BlockKind::SectionTitle)
            .all(|t| t.page == 0));
    }

    #[tokio::test]
    async fn near_page_height_cards_fit_in_columns() {
        let out = renderer()
            .render(&tall(3, 260.0), &templates::technical_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        assert!(out.trace.overflows().is_empty(), "{:?}", out.trace.overflows());
        assert_eq!(out.trace.oversized, 0);
        let cards: Vec<_> = out.trace.of_kind(BlockKind::Experience).map(|c| (c.page, c.column)).collect();
        assert_eq!(cards, vec![(1, Some(0)), (1, Some(1)), (2, Some(0))]);
    }

    #[tokio::test]
    async fn taller_than_page_cards_are_counted() {
        let out = renderer()
            .render(&tall(1, 300.0), &templates::recruiter_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        assert_eq!(out.trace.oversized, 1);
        assert_eq!(out.trace.overflows().len(), out.trace.oversized);
    }

    #[tokio::test]
    async fn header_summary_is_capped() {
        let out = renderer()
            .render(&data(0), &templates::recruiter_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        let header = out.trace.of_kind(BlockKind::Header).next().unwrap();
        assert!(header.height < 60.0);
        assert_eq!(out.page_count, 1);
    }

    #[tokio::test]
    async fn upstream_estimate_reserves_extra_space() {
        let mut d = data(0);
        d.projects = vec![ProjectItem {
            id: "p".into(),
            name: "Subsurface".into(),
            estimated_height: 80.0,
            ..ProjectItem::default()
        }];
        let out = renderer()
            .render(&d, &templates::recruiter_glass(), &options(), |_, _| {})
            .await
            .unwrap();
        let project = out.trace.of_kind(BlockKind::Project).next().unwrap();
        assert_eq!(project.height, 80.0);
    }

    #[tokio::test]
    async fn bad_photo_is_ignored() {
        let mut d = data(0);
        d.personal_info.photo = Some("data:image/png;base64,!!!".into());
        let opts = GenerationOptions {
            include_photo: true,
            ..options()
        };
        let out = renderer()
            .render(&d, &templates::technical_glass(), &opts, |_, _| {})
            .await
            .unwrap();
        assert!(!out.bytes.is_empty());
    }
}
