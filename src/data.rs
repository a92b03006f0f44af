//! Display-ready resume payload and the collaborator interfaces that feed
//! the renderer.
//!
//! The renderer never re-derives content decisions: ranking, truncation and
//! the skills split all happen upstream in a [`DataShaper`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationOptions;
use crate::error::ShapeError;
use crate::template::{TargetAudience, Template};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub full_name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub github: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    /// Profile photo as a base64 `data:` URI.
    #[serde(default)]
    pub photo: Option<String>,
}

impl PersonalInfo {
    /// Contact fields in display order, skipping empty ones.
    pub fn contact_lines(&self) -> Vec<(&'static str, &str)> {
        [
            ("Email", &self.email),
            ("Phone", &self.phone),
            ("Location", &self.location),
            ("Web", &self.website),
            ("LinkedIn", &self.linkedin),
            ("GitHub", &self.github),
        ]
        .into_iter()
        .filter_map(|(label, v)| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| (label, s))
        })
        .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperienceItem {
    pub id: String,
    pub title: String,
    pub company: String,
    #[serde(default)]
    pub location: Option<String>,
    pub start_date: String,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub current: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub priority: f32,
    /// Upstream height estimate in millimetres.
    #[serde(default)]
    pub estimated_height: f32,
}

impl ExperienceItem {
    /// `Company | Location | 2020 - Present`
    pub fn meta_line(&self) -> String {
        let end = if self.current {
            "Present".to_string()
        } else {
            self.end_date.clone().unwrap_or_else(|| "Present".to_string())
        };
        let mut parts = vec![self.company.clone()];
        if let Some(loc) = self.location.as_deref().filter(|l| !l.is_empty()) {
            parts.push(loc.to_string());
        }
        parts.push(format!("{} - {}", self.start_date, end));
        parts.join(" | ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectItem {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub priority: f32,
    #[serde(default)]
    pub estimated_height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillsDisplayMode {
    #[default]
    Compact,
    Detailed,
    Categorized,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillEntry {
    pub name: String,
    /// 0–100.
    #[serde(default)]
    pub proficiency: u8,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SkillCategory {
    pub name: String,
    pub skills: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompactSkills {
    #[serde(default)]
    pub badges: Vec<String>,
    #[serde(default)]
    pub top_skills: Vec<SkillEntry>,
}

/// Skills pre-split into the three display variants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSkills {
    #[serde(default)]
    pub compact: CompactSkills,
    #[serde(default)]
    pub detailed: Vec<SkillEntry>,
    #[serde(default)]
    pub categorized: Vec<SkillCategory>,
    #[serde(default)]
    pub recommended_mode: SkillsDisplayMode,
}

impl ProcessedSkills {
    pub fn is_empty(&self) -> bool {
        self.compact.badges.is_empty()
            && self.compact.top_skills.is_empty()
            && self.detailed.is_empty()
            && self.categorized.iter().all(|c| c.skills.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    #[serde(default)]
    pub source_experience_count: usize,
    #[serde(default)]
    pub source_project_count: usize,
    #[serde(default)]
    pub truncated: bool,
}

/// The payload the renderer lays out, verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessedPdfData {
    pub personal_info: PersonalInfo,
    #[serde(default)]
    pub experiences: Vec<ExperienceItem>,
    #[serde(default)]
    pub projects: Vec<ProjectItem>,
    #[serde(default)]
    pub skills: ProcessedSkills,
    #[serde(default)]
    pub metadata: ContentMetadata,
}

impl ProcessedPdfData {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Turns a raw CV record into a [`ProcessedPdfData`]. Implementations live
/// outside this crate; [`PassthroughShaper`] covers already-shaped input.
#[async_trait]
pub trait DataShaper: Send + Sync {
    type Record: Send + Sync;

    async fn shape(
        &self,
        record: &Self::Record,
        template: &Template,
        options: &GenerationOptions,
    ) -> Result<ProcessedPdfData, ShapeError>;
}

/// Read-only template lookup.
pub trait TemplateSource: Send + Sync {
    fn resolve(&self, id: &str) -> Option<Template>;

    fn available(&self) -> Vec<Template>;

    /// Best template for an audience; the first exact match by default.
    fn recommend(&self, audience: TargetAudience) -> Option<Template> {
        self.available()
            .into_iter()
            .find(|t| t.target_audience == audience)
    }
}

/// Shaper for records that are already display-ready.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughShaper;

#[async_trait]
impl DataShaper for PassthroughShaper {
    type Record = ProcessedPdfData;

    async fn shape(
        &self,
        record: &ProcessedPdfData,
        template: &Template,
        options: &GenerationOptions,
    ) -> Result<ProcessedPdfData, ShapeError> {
        if record.personal_info.full_name.trim().is_empty() {
            return Err(ShapeError::PersonalInfoRequired);
        }
        if template.sections.is_empty() {
            return Err(ShapeError::InvalidTemplate);
        }
        let mut data = record.clone();
        if let Some(mode) = options.skills_display_mode {
            data.skills.recommended_mode = mode;
        }
        if !options.include_photo {
            data.personal_info.photo = None;
        }
        Ok(data)
    }
}
