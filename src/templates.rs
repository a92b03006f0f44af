//! Built-in glass templates and an in-memory template registry.

use std::collections::BTreeMap;

use crate::data::TemplateSource;
use crate::template::{
    BorderGradient, ColorScheme, Density, GlassPreset, GlassScheme, LayoutConfig, LightConfig,
    Margins, NoiseConfig, NoiseKind, RenderingOptions, SectionConfig, SectionPosition,
    SectionVariant, ShadowScheme, TargetAudience, Template, TemplateFeatures, TypographyBase,
};

fn section(id: &str, position: SectionPosition, variant: SectionVariant, required: bool) -> SectionConfig {
    SectionConfig {
        id: id.to_string(),
        position,
        variant,
        required,
        page: 0,
    }
}

fn pos(x: f32, y: f32, width: f32, height: f32) -> SectionPosition {
    SectionPosition { x, y, width, height }
}

fn presets(entries: &[(&str, f32, u8)]) -> BTreeMap<String, GlassPreset> {
    entries
        .iter()
        .map(|(name, opacity, elevation)| {
            (
                name.to_string(),
                GlassPreset {
                    opacity: *opacity,
                    elevation: *elevation,
                    border_alpha: 0.25,
                },
            )
        })
        .collect()
}

/// Dark, textured two-column layout for engineering roles.
pub fn technical_glass() -> Template {
    Template {
        id: "glass-technical".to_string(),
        name: "Technical Glass".to_string(),
        target_audience: TargetAudience::Technical,
        min_pages: 1,
        max_pages: 3,
        colors: ColorScheme {
            primary: "#3b82f6".to_string(),
            secondary: "#8b5cf6".to_string(),
            accent: "#22d3ee".to_string(),
            background: "#0f172a".to_string(),
            surface: "#1e293b".to_string(),
            text: "#f1f5f9".to_string(),
            text_secondary: "#94a3b8".to_string(),
            glass: GlassScheme {
                fill: "#ffffff".to_string(),
                stroke: "#ffffff".to_string(),
                opacity: 0.12,
                shadow: ShadowScheme {
                    color: "#000000".to_string(),
                    blur: 4.0,
                    offset_x: 0.0,
                    offset_y: 1.5,
                    opacity: 0.2,
                },
                presets: presets(&[("hero", 0.18, 3), ("card", 0.12, 2), ("sidebar", 0.10, 1)]),
                light: Some(LightConfig {
                    direction: [1.0, 1.0],
                    strength: 0.35,
                    specular: true,
                }),
                noise: Some(NoiseConfig {
                    amount: 0.04,
                    scale: 1.0,
                    kind: NoiseKind::Mono,
                }),
                border_gradient: Some(BorderGradient {
                    top_alpha: 0.45,
                    bottom_alpha: 0.08,
                }),
            },
        },
        layout: LayoutConfig {
            columns: 2,
            typography: TypographyBase {
                font_family: "Helvetica".to_string(),
                heading_family: None,
                monospace_family: Some("Courier".to_string()),
                density: Density::Compact,
            },
            ..LayoutConfig::default()
        },
        sections: vec![
            section("header", pos(0.0, 0.0, 100.0, 15.0), SectionVariant::Hero, true),
            section("experience", pos(0.0, 15.0, 100.0, 50.0), SectionVariant::TwoColumn, true),
            section("skills", pos(0.0, 65.0, 100.0, 15.0), SectionVariant::Compact, false),
            section("projects", pos(0.0, 80.0, 100.0, 20.0), SectionVariant::Card, false),
        ],
        features: TemplateFeatures {
            profile_photo: true,
            ..TemplateFeatures::default()
        },
        rendering: RenderingOptions {
            badge_snapshots: true,
            background: None,
        },
    }
}

/// Light single-column layout that keeps the backdrop quiet.
pub fn recruiter_glass() -> Template {
    Template {
        id: "glass-recruiter".to_string(),
        name: "Recruiter Glass".to_string(),
        target_audience: TargetAudience::Recruiter,
        min_pages: 1,
        max_pages: 2,
        colors: ColorScheme {
            primary: "#2563eb".to_string(),
            secondary: "#7c3aed".to_string(),
            accent: "#db2777".to_string(),
            background: "#f8fafc".to_string(),
            surface: "#e2e8f0".to_string(),
            text: "#0f172a".to_string(),
            text_secondary: "#475569".to_string(),
            glass: GlassScheme {
                fill: "#ffffff".to_string(),
                stroke: "#94a3b8".to_string(),
                opacity: 0.15,
                shadow: ShadowScheme {
                    color: "#0f172a".to_string(),
                    blur: 3.0,
                    offset_x: 0.0,
                    offset_y: 1.0,
                    opacity: 0.12,
                },
                presets: presets(&[("hero", 0.2, 3), ("card", 0.15, 1)]),
                light: Some(LightConfig {
                    direction: [0.0, 1.0],
                    strength: 0.2,
                    specular: false,
                }),
                noise: None,
                border_gradient: None,
            },
        },
        layout: LayoutConfig::default(),
        sections: vec![
            section("header", pos(0.0, 0.0, 100.0, 15.0), SectionVariant::Hero, true),
            section("personal-info", pos(0.0, 15.0, 35.0, 10.0), SectionVariant::Compact, false),
            section("experience", pos(0.0, 25.0, 100.0, 45.0), SectionVariant::Stacked, true),
            section("skills", pos(0.0, 70.0, 100.0, 15.0), SectionVariant::Default, false),
            section("projects", pos(0.0, 85.0, 100.0, 15.0), SectionVariant::Card, false),
        ],
        features: TemplateFeatures::default(),
        rendering: RenderingOptions::default(),
    }
}

/// Serif, restrained layout with skills on a second page when needed.
pub fn executive_glass() -> Template {
    Template {
        id: "glass-executive".to_string(),
        name: "Executive Glass".to_string(),
        target_audience: TargetAudience::Executive,
        min_pages: 1,
        max_pages: 2,
        colors: ColorScheme {
            primary: "#1e3a8a".to_string(),
            secondary: "#334155".to_string(),
            accent: "#b45309".to_string(),
            background: "#fafaf9".to_string(),
            surface: "#e7e5e4".to_string(),
            text: "#1c1917".to_string(),
            text_secondary: "#57534e".to_string(),
            glass: GlassScheme {
                fill: "#ffffff".to_string(),
                stroke: "#a8a29e".to_string(),
                opacity: 0.1,
                shadow: ShadowScheme {
                    color: "#1c1917".to_string(),
                    blur: 2.0,
                    offset_x: 0.0,
                    offset_y: 0.8,
                    opacity: 0.1,
                },
                presets: presets(&[("hero", 0.15, 2), ("card", 0.08, 0)]),
                light: None,
                noise: None,
                border_gradient: Some(BorderGradient {
                    top_alpha: 0.3,
                    bottom_alpha: 0.05,
                }),
            },
        },
        layout: LayoutConfig {
            margins: Margins {
                top: 18.0,
                right: 18.0,
                bottom: 18.0,
                left: 18.0,
            },
            typography: TypographyBase {
                font_family: "Times".to_string(),
                heading_family: Some("Helvetica".to_string()),
                monospace_family: None,
                density: Density::Spacious,
            },
            ..LayoutConfig::default()
        },
        sections: vec![
            section("hero", pos(0.0, 0.0, 100.0, 18.0), SectionVariant::Hero, true),
            section("experience", pos(0.0, 18.0, 100.0, 82.0), SectionVariant::Stacked, true),
            SectionConfig {
                page: 1,
                ..section("skills", pos(0.0, 0.0, 62.5, 40.0), SectionVariant::Default, false)
            },
        ],
        features: TemplateFeatures {
            gradients: false,
            ..TemplateFeatures::default()
        },
        rendering: RenderingOptions::default(),
    }
}

pub fn builtin_templates() -> Vec<Template> {
    vec![technical_glass(), recruiter_glass(), executive_glass()]
}

/// In-memory [`TemplateSource`], insertion ordered.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
}

impl TemplateRegistry {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    pub fn builtin() -> Self {
        Self::new(builtin_templates())
    }

    /// Add or replace a template by id.
    pub fn insert(&mut self, template: Template) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(slot) => *slot = template,
            None => self.templates.push(template),
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.templates.iter().map(|t| t.id.as_str()).collect()
    }
}

impl TemplateSource for TemplateRegistry {
    fn resolve(&self, id: &str) -> Option<Template> {
        self.templates.iter().find(|t| t.id == id).cloned()
    }

    fn available(&self) -> Vec<Template> {
        self.templates.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_ids_are_unique() {
        let reg = TemplateRegistry::builtin();
        let mut ids = reg.ids();
        ids.dedup();
        assert_eq!(ids, vec!["glass-technical", "glass-recruiter", "glass-executive"]);
    }

    #[test]
    fn recommend_by_audience() {
        let reg = TemplateRegistry::builtin();
        assert_eq!(reg.recommend(TargetAudience::Executive).unwrap().id, "glass-executive");
        assert!(reg.recommend(TargetAudience::Creative).is_none());
        assert!(reg.resolve("nope").is_none());
    }

    #[test]
    fn insert_replaces_by_id() {
        let mut reg = TemplateRegistry::builtin();
        let mut t = recruiter_glass();
        t.name = "Renamed".into();
        reg.insert(t);
        assert_eq!(reg.available().len(), 3);
        assert_eq!(reg.resolve("glass-recruiter").unwrap().name, "Renamed");
    }
}
