//! glassforge – command-line resume → PDF renderer.
//!
//! Usage:
//!   glassforge render <data.json> [-o output.pdf] [--template ID] [--audience A]
//!   glassforge templates
//!   glassforge validate <template.json>
//!
//! `data.json` is a display-ready payload (personal info, experiences,
//! projects, skills). Set `RUST_LOG=debug` to follow the render stages.

use std::{fs, path::PathBuf, process};

use clap::{Parser, Subcommand};

use glassforge::config::{GeneratorConfig, RequestOptions};
use glassforge::data::{PassthroughShaper, ProcessedPdfData, SkillsDisplayMode, TemplateSource};
use glassforge::pipeline::PdfGenerator;
use glassforge::template::{validate_template, TargetAudience, Template};
use glassforge::templates::TemplateRegistry;

#[derive(Parser)]
#[command(name = "glassforge", version, about = "Glass-morphism resume to PDF renderer")]
struct Cli {
    /// JSON generator configuration (DPI, pool and queue limits, defaults).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a resume payload to PDF.
    Render {
        /// Display-ready resume JSON.
        input: PathBuf,
        /// Output path (default: input stem with .pdf).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Template id; see `glassforge templates`.
        #[arg(short, long)]
        template: Option<String>,
        /// Extra template JSON file made available by id.
        #[arg(long)]
        template_file: Option<PathBuf>,
        #[arg(short, long, value_parser = parse_audience)]
        audience: Option<TargetAudience>,
        #[arg(long, value_parser = parse_mode)]
        skills: Option<SkillsDisplayMode>,
        /// Fail instead of falling back when the template id is unknown.
        #[arg(long)]
        strict: bool,
    },
    /// List built-in templates.
    Templates,
    /// Validate a template JSON file.
    Validate { template: PathBuf },
}

fn parse_audience(s: &str) -> Result<TargetAudience, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown audience '{s}' (technical, recruiter, executive, creative)"))
}

fn parse_mode(s: &str) -> Result<SkillsDisplayMode, String> {
    serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
        .map_err(|_| format!("unknown skills mode '{s}' (compact, detailed, categorized)"))
}

fn load_template(path: &PathBuf) -> Result<Template, String> {
    let json = fs::read_to_string(path).map_err(|e| format!("reading '{}': {e}", path.display()))?;
    Template::from_json(&json).map_err(|e| format!("parsing '{}': {e}", path.display()))
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let config = match &cli.config {
        Some(path) => GeneratorConfig::from_file(path)?,
        None => GeneratorConfig::default(),
    };

    match cli.command {
        Command::Templates => {
            for t in TemplateRegistry::builtin().available() {
                println!(
                    "{:<18} {:<18} {:?}, {} column(s), {}-{} pages",
                    t.id, t.name, t.target_audience, t.layout.columns, t.min_pages, t.max_pages
                );
            }
            Ok(())
        }
        Command::Validate { template } => {
            let t = load_template(&template)?;
            let report = validate_template(&t);
            if report.is_valid {
                println!("'{}' is valid", t.id);
                Ok(())
            } else {
                for e in &report.errors {
                    eprintln!("  - {e}");
                }
                Err(format!("'{}' has {} problem(s)", t.id, report.errors.len()))
            }
        }
        Command::Render {
            input,
            output,
            template,
            template_file,
            audience,
            skills,
            strict,
        } => {
            let json = fs::read_to_string(&input).map_err(|e| format!("reading '{}': {e}", input.display()))?;
            let data = ProcessedPdfData::from_json(&json).map_err(|e| format!("parsing '{}': {e}", input.display()))?;

            let mut registry = TemplateRegistry::builtin();
            let mut template_id = template;
            if let Some(path) = template_file {
                let extra = load_template(&path)?;
                template_id.get_or_insert_with(|| extra.id.clone());
                registry.insert(extra);
            }

            let generator = PdfGenerator::new(PassthroughShaper, registry, config);
            let request = RequestOptions {
                template_id,
                target_audience: audience,
                skills_display_mode: skills,
                enable_fallback: strict.then_some(false),
                ..RequestOptions::default()
            };
            let result = generator
                .generate_pdf(&data, &request)
                .await
                .map_err(|e| e.to_string())?;

            let output = output.unwrap_or_else(|| input.with_extension("pdf"));
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).map_err(|e| format!("creating output directory: {e}"))?;
                }
            }
            fs::write(&output, &result.bytes).map_err(|e| format!("writing '{}': {e}", output.display()))?;

            let meta = &result.metadata;
            for w in &meta.warnings {
                eprintln!("warning: {w}");
            }
            let pages = meta.page_count;
            eprintln!(
                "Wrote '{}' with {} ({} bytes, {} page{}, quality {:.0})",
                output.display(),
                meta.template_used,
                meta.file_size,
                pages,
                if pages == 1 { "" } else { "s" },
                meta.quality_score
            );
            Ok(())
        }
    }
}
