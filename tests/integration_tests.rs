//! Integration tests for the glassforge pipeline.
//!
//! These tests validate:
//! - End-to-end generation through the public API
//! - Page breaks never split a block and two-column flow stays balanced
//! - Categorized skills wrap exactly as the font metrics predict
//! - Template fallback rules and per-item batch isolation
//! - Surfaces are always returned to the pool

use std::sync::Arc;

use futures::future::join_all;

use glassforge::background::BackgroundRenderer;
use glassforge::config::{BatchOptions, GenerationOptions, GeneratorConfig, RenderOptions, RequestOptions};
use glassforge::data::{
    DataShaper, ExperienceItem, PassthroughShaper, PersonalInfo, ProcessedPdfData, ProcessedSkills,
    SkillCategory, SkillsDisplayMode,
};
use glassforge::error::GenerationError;
use glassforge::fonts::{typography_scale, FontManager, FontPurpose};
use glassforge::glass::GlassEffects;
use glassforge::layout::LayoutManager;
use glassforge::performance::SurfacePool;
use glassforge::pipeline::PdfGenerator;
use glassforge::renderer::{BlockKind, Renderer};
use glassforge::template::{validate_template, SectionConfig, SectionPosition, SectionVariant, Template};
use glassforge::templates::{self, TemplateRegistry};

// =====================================================================
// Helpers
// =====================================================================

fn low_dpi() -> RenderOptions {
    RenderOptions {
        surface_dpi: 36.0,
        background_dpi: 24.0,
        micro_noise: false,
        ..RenderOptions::default()
    }
}

fn options() -> GenerationOptions {
    GenerationOptions {
        render: low_dpi(),
        ..GenerationOptions::default()
    }
}

fn generator(registry: TemplateRegistry) -> PdfGenerator<PassthroughShaper, TemplateRegistry> {
    let mut config = GeneratorConfig::default();
    config.defaults.render = low_dpi();
    PdfGenerator::new(PassthroughShaper, registry, config)
}

fn renderer(pool: Arc<SurfacePool>) -> Renderer {
    Renderer::new(Arc::new(GlassEffects::new()), Arc::new(BackgroundRenderer::new()), pool)
}

fn assert_valid_pdf(bytes: &[u8]) {
    assert!(bytes.len() > 100, "PDF too small: {} bytes", bytes.len());
    assert_eq!(&bytes[0..5], b"%PDF-", "Missing PDF header");
}

fn minimal_record() -> ProcessedPdfData {
    ProcessedPdfData {
        personal_info: PersonalInfo {
            full_name: "Katherine Johnson".into(),
            title: "Research Mathematician".into(),
            ..PersonalInfo::default()
        },
        ..ProcessedPdfData::default()
    }
}

fn long_experience(i: usize) -> ExperienceItem {
    ExperienceItem {
        id: format!("exp-{i}"),
        title: format!("Senior Orbital Analyst {i}"),
        company: "NASA Langley".into(),
        location: Some("Hampton, VA".into()),
        start_date: "1953".into(),
        end_date: Some("1986".into()),
        description: "Calculated trajectories, launch windows and emergency return paths for \
                      Project Mercury and Apollo, verified electronic computer output by hand, \
                      and co-authored reports on the geometry of orbital spaceflight. "
            .repeat(3),
        achievements: vec![
            "Verified Friendship 7 trajectory".into(),
            "Apollo 11 rendezvous calculations".into(),
            "Space Shuttle program support".into(),
        ],
        technologies: vec!["FORTRAN".into(), "IBM 7090".into()],
        ..ExperienceItem::default()
    }
}

/// A4 portrait, two columns, a single required hero section.
fn hero_only_template() -> Template {
    let mut t = templates::technical_glass();
    t.id = "hero-only".into();
    t.layout.columns = 2;
    t.sections = vec![SectionConfig {
        id: "hero".into(),
        position: SectionPosition {
            x: 0.0,
            y: 0.0,
            width: 100.0,
            height: 20.0,
        },
        variant: SectionVariant::Hero,
        required: true,
        page: 0,
    }];
    t
}

// =====================================================================
// Scenario 1: minimal payload on a hero-only template
// =====================================================================

#[tokio::test]
async fn minimal_payload_renders_single_page() {
    let mut registry = TemplateRegistry::new(Vec::new());
    registry.insert(hero_only_template());
    assert!(validate_template(&hero_only_template()).is_valid);

    let g = generator(registry);
    let result = g
        .generate_pdf(
            &minimal_record(),
            &RequestOptions {
                template_id: Some("hero-only".into()),
                ..RequestOptions::default()
            },
        )
        .await
        .expect("generation should succeed");

    assert_valid_pdf(&result.bytes);
    assert_eq!(result.metadata.template_used, "hero-only");
    assert_eq!(result.metadata.file_size, result.bytes.len());
    assert_eq!(result.metadata.page_count, 1);
    assert!(result.metadata.optimizations.contains(&"no-experience".to_string()));
    assert!(result.metadata.optimizations.contains(&"single-page".to_string()));
    assert!(result.metadata.section_timings.contains_key("hero"));
}

#[tokio::test]
async fn minimal_payload_places_no_page_break() {
    let pool = Arc::new(SurfacePool::default());
    let out = renderer(pool.clone())
        .render(&minimal_record(), &hero_only_template(), &options(), |_, _| {})
        .await
        .unwrap();
    assert_eq!(out.trace.page_breaks, 0);
    assert_eq!(out.trace.of_kind(BlockKind::Header).count(), 1);
    assert_eq!(pool.in_use_count(), 0);
}

// =====================================================================
// Scenario 2: 25 long experience entries in two columns
// =====================================================================

#[tokio::test]
async fn long_history_breaks_pages_and_balances_columns() {
    let template = templates::technical_glass();
    assert_eq!(template.layout.margins.bottom, 15.0);
    let mut data = minimal_record();
    data.experiences = (0..25).map(long_experience).collect();

    let pool = Arc::new(SurfacePool::default());
    let out = renderer(pool.clone())
        .render(&data, &template, &options(), |_, _| {})
        .await
        .unwrap();

    assert_valid_pdf(&out.bytes);
    assert!(out.trace.page_breaks >= 1, "expected at least one page break");
    assert_eq!(out.page_count, out.trace.page_breaks + 1);

    let cards: Vec<_> = out.trace.of_kind(BlockKind::Experience).collect();
    assert_eq!(cards.len(), 25);

    // page-break invariant: no estimate crosses the bottom margin
    let layout = LayoutManager::new(&template.layout).unwrap();
    assert_eq!(out.trace.bottom_limit, layout.bottom_limit());
    assert!(out.trace.overflows().is_empty(), "overflowing blocks: {:?}", out.trace.overflows());

    let last_page = cards.iter().map(|c| c.page).max().unwrap();
    let in_column = |col: usize| {
        cards
            .iter()
            .filter(|c| c.page == last_page && c.column == Some(col))
            .count()
    };
    assert!(
        in_column(0).abs_diff(in_column(1)) <= 1,
        "unbalanced columns: {} vs {}",
        in_column(0),
        in_column(1)
    );
    assert_eq!(pool.in_use_count(), 0);
}

// =====================================================================
// Scenario 3: categorized skills
// =====================================================================

#[tokio::test]
async fn categorized_skills_match_wrapped_line_counts() {
    let template = templates::recruiter_glass();
    let categories: Vec<SkillCategory> = (0..5)
        .map(|c| SkillCategory {
            name: format!("Category {c}"),
            skills: (0..6)
                .map(|s| format!("Distributed Systems Engineering Practice {c}-{s}"))
                .collect(),
        })
        .collect();
    let mut record = minimal_record();
    record.skills = ProcessedSkills {
        categorized: categories.clone(),
        ..ProcessedSkills::default()
    };

    let opts = GenerationOptions {
        skills_display_mode: Some(SkillsDisplayMode::Categorized),
        ..options()
    };
    let data = PassthroughShaper.shape(&record, &template, &opts).await.unwrap();
    assert_eq!(data.skills.recommended_mode, SkillsDisplayMode::Categorized);

    let out = renderer(Arc::new(SurfacePool::default()))
        .render(&data, &template, &opts, |_, _| {})
        .await
        .unwrap();

    let layout = LayoutManager::new(&template.layout).unwrap();
    let section = template.section("skills").unwrap();
    let width = layout.snap_section(&section.position).width - 10.0;
    let fonts = FontManager::for_typography(&template.layout.typography);
    let body = fonts.resolve(FontPurpose::Body);
    let size = typography_scale(layout.page_width_pt(), template.layout.typography.density)
        .sizes
        .body;

    assert_eq!(out.trace.category_lines.len(), 5);
    for (category, (name, rendered)) in categories.iter().zip(&out.trace.category_lines) {
        let expected = fonts.wrap_text(&category.skills.join(", "), size, body, false, width).len();
        assert_eq!(name, &category.name);
        assert_eq!(*rendered, expected, "line count for {name}");
        assert!(*rendered > 1, "{name} should wrap");
    }
    assert!(out.trace.overflows().is_empty());
}

// =====================================================================
// Scenario 4: unknown template ids
// =====================================================================

#[tokio::test]
async fn unknown_template_without_fallback_fails() {
    let g = generator(TemplateRegistry::builtin());
    let err = g
        .generate_pdf(
            &minimal_record(),
            &RequestOptions {
                template_id: Some("does-not-exist".into()),
                enable_fallback: Some(false),
                ..RequestOptions::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::TemplateNotFound(ref id) if id == "does-not-exist"));
    assert!(err.to_string().starts_with("Template not found"));
    assert!(!g.is_generating());
}

#[tokio::test]
async fn unknown_template_with_fallback_uses_recommendation() {
    let g = generator(TemplateRegistry::builtin());
    let result = g
        .generate_pdf(
            &minimal_record(),
            &RequestOptions {
                template_id: Some("does-not-exist".into()),
                enable_fallback: Some(true),
                ..RequestOptions::default()
            },
        )
        .await
        .unwrap();
    assert_valid_pdf(&result.bytes);
    assert_eq!(result.metadata.template_used, "glass-recruiter");
}

// =====================================================================
// Batch
// =====================================================================

fn registry_with_broken() -> TemplateRegistry {
    let mut registry = TemplateRegistry::builtin();
    let mut broken = templates::recruiter_glass();
    broken.id = "glass-broken".into();
    broken.colors.background = "#zzz".into();
    assert!(validate_template(&broken).is_valid);
    registry.insert(broken);
    registry
}

fn batch_ids() -> Vec<String> {
    ["glass-technical", "glass-broken", "glass-executive"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[tokio::test]
async fn batch_isolates_failures() {
    let g = generator(registry_with_broken());
    let result = g
        .generate_batch(&minimal_record(), &batch_ids(), &RequestOptions::default(), &BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(result.success_count(), 2);
    assert_eq!(result.errors.len(), 1);
    let err = &result.errors["glass-broken"];
    assert!(err.to_string().starts_with("PDF generation failed:"), "{err}");
    for id in ["glass-technical", "glass-executive"] {
        assert_valid_pdf(&result.results[id].bytes);
        assert_eq!(result.results[id].metadata.template_used, id);
    }
    let stats = g.stats();
    assert_eq!((stats.total, stats.successful), (3, 2));
}

#[tokio::test]
async fn parallel_batch_isolates_failures() {
    let g = generator(registry_with_broken());
    let batch = BatchOptions {
        parallel: true,
        max_concurrency: 2,
        fail_fast: false,
    };
    let result = g
        .generate_batch(&minimal_record(), &batch_ids(), &RequestOptions::default(), &batch)
        .await
        .unwrap();
    assert_eq!(result.success_count(), 2);
    assert!(result.errors.contains_key("glass-broken"));
    assert_eq!(g.monitor().pool().in_use_count(), 0);
}

#[tokio::test]
async fn fail_fast_batch_returns_first_error() {
    let g = generator(registry_with_broken());
    let batch = BatchOptions {
        fail_fast: true,
        ..BatchOptions::default()
    };
    let err = g
        .generate_batch(&minimal_record(), &batch_ids(), &RequestOptions::default(), &batch)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Render(_)));
}

// =====================================================================
// Resource handling
// =====================================================================

#[tokio::test]
async fn concurrent_generations_release_every_surface() {
    let g = generator(TemplateRegistry::builtin());
    let mut record = minimal_record();
    record.experiences = (0..6).map(long_experience).collect();

    let requests: Vec<RequestOptions> = ["glass-technical", "glass-recruiter", "glass-executive"]
        .iter()
        .map(|id| RequestOptions {
            template_id: Some(id.to_string()),
            ..RequestOptions::default()
        })
        .collect();
    let results = join_all(requests.iter().map(|r| g.generate_pdf(&record, r))).await;

    for r in results {
        assert_valid_pdf(&r.unwrap().bytes);
    }
    let stats = g.monitor().pool().stats();
    assert_eq!(stats.in_use, 0);
    assert!(stats.entries > 0, "surfaces should be pooled for reuse");
    assert!(!g.is_generating());
}

#[tokio::test]
async fn identical_requests_produce_identical_layouts() {
    let template = templates::technical_glass();
    let mut data = minimal_record();
    data.experiences = (0..9).map(long_experience).collect();

    let r = renderer(Arc::new(SurfacePool::default()));
    let a = r.render(&data, &template, &options(), |_, _| {}).await.unwrap();
    let b = r.render(&data, &template, &options(), |_, _| {}).await.unwrap();
    assert_eq!(a.trace, b.trace);
    assert_eq!(a.page_count, b.page_count);
}
