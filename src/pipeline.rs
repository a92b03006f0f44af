//! Pipeline – ties together template resolution, data shaping, rendering
//! and the quality pass into a single call.
//!
//! [`PdfGenerator`] owns the long-lived pieces (glass caches, backdrop
//! cache, surface pool, work queue) and exposes three entry points:
//! [`PdfGenerator::generate_pdf`] for one document,
//! [`PdfGenerator::generate_batch`] for the same record across several
//! templates, and [`PdfGenerator::queue_generation`] for priority-queued
//! requests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::{oneshot, watch};

use crate::background::BackgroundRenderer;
use crate::config::{BatchOptions, GenerationOptions, GenerationPriority, GeneratorConfig, RequestOptions};
use crate::data::{DataShaper, ProcessedPdfData, TemplateSource};
use crate::error::GenerationError;
use crate::glass::GlassEffects;
use crate::performance::{lock, sample_memory, GaugeGuard, MetricsRing, PerformanceMonitor, PerformanceSnapshot, RenderingMetrics};
use crate::renderer::{RenderOutput, Renderer};
use crate::template::{validate_template, TargetAudience, Template};

/// Envelope returned alongside the PDF bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationMetadata {
    pub template_used: String,
    pub processing_time_ms: u64,
    /// 0–100.
    pub quality_score: f32,
    pub file_size: usize,
    pub page_count: usize,
    pub generated_at: DateTime<Utc>,
    /// Milliseconds per drawn section id.
    pub section_timings: BTreeMap<String, u64>,
    pub warnings: Vec<String>,
    pub optimizations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub bytes: Vec<u8>,
    pub metadata: GenerationMetadata,
}

/// Per-template outcome of [`PdfGenerator::generate_batch`].
#[derive(Debug, Default)]
pub struct BatchResult {
    pub results: BTreeMap<String, GenerationResult>,
    pub errors: BTreeMap<String, GenerationError>,
}

impl BatchResult {
    pub fn success_count(&self) -> usize {
        self.results.len()
    }
}

/// Rolling totals over every generation this instance has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct GenerationStats {
    pub total: u64,
    pub successful: u64,
    pub average_time_ms: f64,
    /// Mean over successful generations.
    pub average_quality: f64,
}

impl GenerationStats {
    fn record(&mut self, elapsed: Duration, quality: Option<f32>) {
        self.total += 1;
        let n = self.total as f64;
        self.average_time_ms += (elapsed.as_secs_f64() * 1000.0 - self.average_time_ms) / n;
        if let Some(q) = quality {
            self.successful += 1;
            let s = self.successful as f64;
            self.average_quality += (q as f64 - self.average_quality) / s;
        }
    }
}

/// Upper bound for either raster resolution.
pub const MAX_DPI: f32 = 600.0;

/// Reject merged options that cannot produce a document.
pub fn validate_request(options: &GenerationOptions) -> Result<(), GenerationError> {
    let mut errors = Vec::new();
    let render = &options.render;
    for (name, dpi) in [("surface_dpi", render.surface_dpi), ("background_dpi", render.background_dpi)] {
        if !dpi.is_finite() || dpi <= 0.0 || dpi > MAX_DPI {
            errors.push(format!("{name} must be within (0, {MAX_DPI}], got {dpi}"));
        }
    }
    if render.chunk_size == 0 {
        errors.push("chunk_size must be at least 1".to_string());
    }
    if options.max_render_time_ms == 0 {
        errors.push("max_render_time_ms must be positive".to_string());
    }
    if options.template_id.as_deref().is_some_and(|id| id.trim().is_empty()) {
        errors.push("template_id is blank".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(GenerationError::InvalidRequest(errors.join("; ")))
    }
}

/// Priority score for a queued request: base 5, +3 for speed priority,
/// +2 for an explicit template, +1 for the recruiter audience.
pub fn queue_priority(options: &GenerationOptions) -> u32 {
    let mut score = 5;
    if options.priority == GenerationPriority::Speed {
        score += 3;
    }
    if options.template_id.is_some() {
        score += 2;
    }
    if options.target_audience == TargetAudience::Recruiter {
        score += 1;
    }
    score
}

/// Keeps the is-generating gauge raised for the lifetime of one call.
struct ActiveGeneration<'a>(&'a AtomicUsize);

impl<'a> ActiveGeneration<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveGeneration<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Orchestrates generations over a data shaper and a template source.
pub struct PdfGenerator<S, T> {
    shaper: S,
    templates: T,
    config: GeneratorConfig,
    renderer: Renderer,
    monitor: PerformanceMonitor,
    progress: watch::Sender<f32>,
    generating: AtomicUsize,
    queued: Arc<AtomicUsize>,
    stats: Mutex<GenerationStats>,
    history: MetricsRing<RenderingMetrics>,
}

impl<S, T> PdfGenerator<S, T>
where
    S: DataShaper,
    T: TemplateSource,
{
    pub fn new(shaper: S, templates: T, config: GeneratorConfig) -> Self {
        let monitor = PerformanceMonitor::new(config.pool, config.queue);
        let renderer = Renderer::new(
            Arc::new(GlassEffects::new()),
            Arc::new(BackgroundRenderer::new()),
            monitor.pool().clone(),
        );
        let (progress, _) = watch::channel(0.0);
        let history = MetricsRing::new(config.queue.metrics_capacity);
        Self {
            shaper,
            templates,
            config,
            renderer,
            monitor,
            progress,
            generating: AtomicUsize::new(0),
            queued: Arc::new(AtomicUsize::new(0)),
            stats: Mutex::new(GenerationStats::default()),
            history,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn templates(&self) -> &T {
        &self.templates
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Watch the 0–100 progress gauge.
    pub fn subscribe_progress(&self) -> watch::Receiver<f32> {
        self.progress.subscribe()
    }

    pub fn progress(&self) -> f32 {
        *self.progress.borrow()
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::SeqCst) > 0
    }

    pub fn queue_size(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> GenerationStats {
        *lock(&self.stats)
    }

    /// Metrics of the most recent successful generations, oldest first.
    pub fn recent_metrics(&self) -> Vec<RenderingMetrics> {
        self.history.recent()
    }

    pub fn performance(&self) -> PerformanceSnapshot {
        self.monitor.snapshot()
    }

    fn set_progress(&self, value: f32) {
        self.progress.send_replace(value.clamp(0.0, 100.0));
    }

    /// Explicit id, else the audience recommendation, else the first
    /// available template.
    pub fn resolve_template(&self, options: &GenerationOptions) -> Result<Template, GenerationError> {
        if let Some(id) = &options.template_id {
            if let Some(template) = self.templates.resolve(id) {
                return Ok(template);
            }
            if !options.enable_fallback {
                return Err(GenerationError::TemplateNotFound(id.clone()));
            }
            warn!("template '{id}' not found, falling back to a recommended template");
        }
        self.templates
            .recommend(options.target_audience)
            .or_else(|| self.templates.available().into_iter().next())
            .ok_or(GenerationError::NoTemplates)
    }

    /// Generate one document.
    pub async fn generate_pdf(
        &self,
        record: &S::Record,
        overrides: &RequestOptions,
    ) -> Result<GenerationResult, GenerationError> {
        let _active = ActiveGeneration::enter(&self.generating);
        let started = Instant::now();
        self.set_progress(0.0);

        let outcome = self.run(record, overrides, started).await;

        let elapsed = started.elapsed();
        match &outcome {
            Ok(result) => {
                lock(&self.stats).record(elapsed, Some(result.metadata.quality_score));
                info!(
                    "generated {} ({} pages, {} bytes) in {}ms",
                    result.metadata.template_used,
                    result.metadata.page_count,
                    result.metadata.file_size,
                    elapsed.as_millis()
                );
            }
            Err(e) => {
                lock(&self.stats).record(elapsed, None);
                warn!("generation failed after {}ms: {e}", elapsed.as_millis());
                self.set_progress(0.0);
            }
        }
        outcome
    }

    async fn run(
        &self,
        record: &S::Record,
        overrides: &RequestOptions,
        started: Instant,
    ) -> Result<GenerationResult, GenerationError> {
        let options = self.config.defaults.merge(overrides);
        validate_request(&options)?;

        let template = self.resolve_template(&options)?;
        let validation = validate_template(&template);
        if !validation.is_valid {
            return Err(GenerationError::InvalidTemplate {
                id: template.id.clone(),
                errors: validation.errors,
            });
        }
        self.set_progress(5.0);
        debug!("using template '{}'", template.id);

        let data = self.shaper.shape(record, &template, &options).await?;
        self.set_progress(10.0);

        let output = self
            .renderer
            .render(&data, &template, &options, |_, pct| self.set_progress(10.0 + pct * 0.8))
            .await?;
        self.set_progress(90.0);

        let (quality_score, warnings) = self.quality_pass(&output, &data, &template);
        for w in &warnings {
            warn!("{}: {w}", template.id);
        }

        let elapsed = started.elapsed();
        self.history.push(RenderingMetrics {
            generation_time: elapsed,
            section_timings: output.section_timings.clone(),
            memory_bytes: sample_memory(),
            operation_count: output.operation_count,
            output_bytes: output.bytes.len(),
            quality_score,
        });

        let metadata = GenerationMetadata {
            template_used: template.id.clone(),
            processing_time_ms: elapsed.as_millis() as u64,
            quality_score,
            file_size: output.bytes.len(),
            page_count: output.page_count,
            generated_at: Utc::now(),
            section_timings: output
                .section_timings
                .iter()
                .map(|(id, d)| (id.clone(), d.as_millis() as u64))
                .collect(),
            warnings,
            optimizations: output.optimizations,
        };
        self.set_progress(100.0);
        Ok(GenerationResult {
            bytes: output.bytes,
            metadata,
        })
    }

    /// File-size and content checks. Never fails a generation.
    fn quality_pass(&self, output: &RenderOutput, data: &ProcessedPdfData, template: &Template) -> (f32, Vec<String>) {
        let limits = self.config.quality;
        let mut score: f32 = 100.0;
        let mut warnings = Vec::new();
        let size = output.bytes.len();

        if size > limits.large_output_bytes {
            warnings.push(format!("Large output: {} KB", size / 1024));
            score -= 10.0;
        }
        if size < limits.min_output_bytes {
            warnings.push(format!("Output unusually small: {size} bytes"));
            score -= 20.0;
        }
        if data.experiences.is_empty() {
            warnings.push("No experience entries".to_string());
            score -= 10.0;
        }
        if data.skills.is_empty() {
            warnings.push("No skills listed".to_string());
            score -= 5.0;
        }
        let pages = output.page_count as u32;
        if pages > template.max_pages {
            warnings.push(format!("{pages} pages exceeds the template maximum of {}", template.max_pages));
            score -= 10.0;
        } else if pages < template.min_pages {
            warnings.push(format!("{pages} pages is below the template minimum of {}", template.min_pages));
            score -= 5.0;
        }
        if output.glass_fallbacks > 0 {
            warnings.push(format!("{} glass panes drawn flat", output.glass_fallbacks));
            score -= (2.0 * output.glass_fallbacks as f32).min(10.0);
        }
        if output.trace.oversized > 0 {
            warnings.push(format!("{} blocks taller than a page", output.trace.oversized));
            score -= 5.0;
        }
        (score.clamp(0.0, 100.0), warnings)
    }

    async fn generate_for(
        &self,
        record: &S::Record,
        template_id: &str,
        overrides: &RequestOptions,
    ) -> Result<GenerationResult, GenerationError> {
        let overrides = RequestOptions {
            template_id: Some(template_id.to_string()),
            enable_fallback: Some(false),
            ..overrides.clone()
        };
        self.generate_pdf(record, &overrides).await
    }

    /// Render `record` once per template id. Failures are collected per id;
    /// with `fail_fast` the first one is returned instead.
    pub async fn generate_batch(
        &self,
        record: &S::Record,
        template_ids: &[String],
        overrides: &RequestOptions,
        batch: &BatchOptions,
    ) -> Result<BatchResult, GenerationError> {
        let mut out = BatchResult::default();
        let chunk = if batch.parallel { batch.max_concurrency.max(1) } else { 1 };

        for ids in template_ids.chunks(chunk) {
            let results = join_all(ids.iter().map(|id| self.generate_for(record, id, overrides))).await;
            for (id, result) in ids.iter().zip(results) {
                match result {
                    Ok(r) => {
                        out.results.insert(id.clone(), r);
                    }
                    Err(e) if batch.fail_fast => return Err(e),
                    Err(e) => {
                        warn!("batch item '{id}' failed: {e}");
                        out.errors.insert(id.clone(), e);
                    }
                }
            }
        }
        debug!(
            "batch finished: {} ok, {} failed",
            out.results.len(),
            out.errors.len()
        );
        Ok(out)
    }
}

impl<S, T> PdfGenerator<S, T>
where
    S: DataShaper + 'static,
    S::Record: 'static,
    T: TemplateSource + 'static,
{
    /// Queue a generation on the priority work queue and wait for it. The
    /// queue's background worker is started on first use.
    pub async fn queue_generation(
        self: &Arc<Self>,
        record: S::Record,
        overrides: RequestOptions,
    ) -> Result<GenerationResult, GenerationError> {
        self.monitor.start();

        let options = self.config.defaults.merge(&overrides);
        let priority = queue_priority(&options);
        let (tx, rx) = oneshot::channel();

        let pending = GaugeGuard::raise(&self.queued);
        let this = Arc::clone(self);
        self.monitor.queue().enqueue(
            "generate_pdf",
            priority,
            Box::pin(async move {
                drop(pending);
                let result = this.generate_pdf(&record, &overrides).await;
                let summary = result.as_ref().map(|_| ()).map_err(|e| e.to_string());
                // caller may have gone away
                let _ = tx.send(result);
                summary
            }),
        );

        rx.await.map_err(|_| GenerationError::QueueClosed)?
    }
}
