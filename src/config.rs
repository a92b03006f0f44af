//! Configuration structs. Every struct has a `Default` carrying the fixed
//! defaults; per-request overrides are merged on top with
//! [`GenerationOptions::merge`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::data::SkillsDisplayMode;
use crate::template::{Density, TargetAudience};

/// What the caller cares about most for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationPriority {
    Speed,
    #[default]
    Balanced,
    Quality,
}

/// Knobs for the raster side of a render.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Resolution of glass card surfaces.
    pub surface_dpi: f32,
    /// Resolution of the full-page backdrop.
    pub background_dpi: f32,
    /// When false every card takes the flat vector path.
    pub glass_effects: bool,
    pub micro_noise: bool,
    /// Items per chunk when pre-measuring long lists.
    pub chunk_size: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            surface_dpi: 144.0,
            background_dpi: 96.0,
            glass_effects: true,
            micro_noise: true,
            chunk_size: 8,
        }
    }
}

impl RenderOptions {
    /// Cheaper rasterisation for speed-priority requests.
    pub fn fast() -> Self {
        Self {
            surface_dpi: 96.0,
            background_dpi: 72.0,
            micro_noise: false,
            ..Self::default()
        }
    }
}

/// Fully resolved options for one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    pub template_id: Option<String>,
    pub target_audience: TargetAudience,
    /// Use the recommended/first template when `template_id` is unknown.
    pub enable_fallback: bool,
    pub priority: GenerationPriority,
    pub skills_display_mode: Option<SkillsDisplayMode>,
    pub include_photo: bool,
    pub density: Option<Density>,
    /// Advisory render budget; overruns are logged, never aborted.
    pub max_render_time_ms: u64,
    pub render: RenderOptions,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            template_id: None,
            target_audience: TargetAudience::Recruiter,
            enable_fallback: true,
            priority: GenerationPriority::Balanced,
            skills_display_mode: None,
            include_photo: true,
            density: None,
            max_render_time_ms: 5_000,
            render: RenderOptions::default(),
        }
    }
}

/// Per-request overrides; `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestOptions {
    pub template_id: Option<String>,
    pub target_audience: Option<TargetAudience>,
    pub enable_fallback: Option<bool>,
    pub priority: Option<GenerationPriority>,
    pub skills_display_mode: Option<SkillsDisplayMode>,
    pub include_photo: Option<bool>,
    pub density: Option<Density>,
    pub max_render_time_ms: Option<u64>,
    pub render: Option<RenderOptions>,
}

impl GenerationOptions {
    pub fn merge(&self, overrides: &RequestOptions) -> Self {
        let priority = overrides.priority.unwrap_or(self.priority);
        let render = overrides.render.unwrap_or(match priority {
            GenerationPriority::Speed => RenderOptions::fast(),
            _ => self.render,
        });
        Self {
            template_id: overrides.template_id.clone().or_else(|| self.template_id.clone()),
            target_audience: overrides.target_audience.unwrap_or(self.target_audience),
            enable_fallback: overrides.enable_fallback.unwrap_or(self.enable_fallback),
            priority,
            skills_display_mode: overrides.skills_display_mode.or(self.skills_display_mode),
            include_photo: overrides.include_photo.unwrap_or(self.include_photo),
            density: overrides.density.or(self.density),
            max_render_time_ms: overrides.max_render_time_ms.unwrap_or(self.max_render_time_ms),
            render,
        }
    }

    pub fn max_render_time(&self) -> Duration {
        Duration::from_millis(self.max_render_time_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Surfaces kept per `"{w}x{h}"` key.
    pub max_per_key: usize,
    /// Idle entries older than this are evicted by the sweep.
    pub max_idle_ms: u64,
    pub sweep_interval_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_per_key: 4,
            max_idle_ms: 30_000,
            sweep_interval_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub max_concurrent_operations: usize,
    /// Worker tick.
    pub drain_interval_ms: u64,
    pub memory_sample_interval_ms: u64,
    /// Resident memory above which the worker drains one item per tick.
    pub memory_threshold_bytes: usize,
    pub metrics_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_operations: 3,
            drain_interval_ms: 25,
            memory_sample_interval_ms: 2_000,
            memory_threshold_bytes: 1 << 30,
            metrics_capacity: 100,
        }
    }
}

/// Top-level configuration of a generator instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub defaults: GenerationOptions,
    pub pool: PoolConfig,
    pub queue: QueueConfig,
    pub batch: BatchOptions,
    pub quality: QualityConfig,
}

impl GeneratorConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("reading '{}': {e}", path.display()))?;
        Self::from_json(&text).map_err(|e| format!("parsing '{}': {e}", path.display()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchOptions {
    pub parallel: bool,
    pub max_concurrency: usize,
    /// Abort on the first failing template instead of collecting errors.
    pub fail_fast: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            max_concurrency: 3,
            fail_fast: false,
        }
    }
}

/// Thresholds for the post-render quality pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub large_output_bytes: usize,
    pub min_output_bytes: usize,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            large_output_bytes: 5 * 1024 * 1024,
            min_output_bytes: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_overrides() {
        let defaults = GenerationOptions::default();
        let merged = defaults.merge(&RequestOptions {
            template_id: Some("glass-technical".into()),
            enable_fallback: Some(false),
            ..RequestOptions::default()
        });
        assert_eq!(merged.template_id.as_deref(), Some("glass-technical"));
        assert!(!merged.enable_fallback);
        assert_eq!(merged.target_audience, TargetAudience::Recruiter);
        assert_eq!(merged.render, RenderOptions::default());
    }

    #[test]
    fn speed_priority_lowers_raster_cost() {
        let merged = GenerationOptions::default().merge(&RequestOptions {
            priority: Some(GenerationPriority::Speed),
            ..RequestOptions::default()
        });
        assert!(merged.render.surface_dpi < RenderOptions::default().surface_dpi);
        assert!(!merged.render.micro_noise);
    }

    #[test]
    fn partial_json_config_fills_defaults() {
        let cfg = GeneratorConfig::from_json(r#"{ "queue": { "max_concurrent_operations": 1 } }"#).unwrap();
        assert_eq!(cfg.queue.max_concurrent_operations, 1);
        assert_eq!(cfg.queue.metrics_capacity, 100);
        assert_eq!(cfg.pool, PoolConfig::default());
    }
}
