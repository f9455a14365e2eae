//! CLI binary for enrich-html.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `EnrichConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use enrich_html::pipeline::{fetch, input, scan};
use enrich_html::{
    enrich_labeled, enrich_to_file, write_output, DescriptionTemplate, EnrichConfig,
    EnrichProgressCallback, EnrichmentOutput, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the image batch plus a log line
/// per image. Images complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Scanning document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Clear the bar if no batch completion did it already.
    fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }

    fn elapsed_secs(&self, name: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(name))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl EnrichProgressCallback for CliProgressCallback {
    fn on_enrichment_start(&self, total_images: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} images  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        self.bar.set_length(total_images as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Describing");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Describing {total_images} images…"))
        ));
    }

    fn on_image_start(&self, name: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(name.to_string(), Instant::now());
        }
        self.bar.set_message(name.to_string());
    }

    fn on_image_complete(&self, name: &str, description_len: usize) {
        let secs = self.elapsed_secs(name);
        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            green("✓"),
            name,
            dim(&format!("{description_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, name: &str, error: &str) {
        let secs = self.elapsed_secs(name);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<32}  {}  {}",
            red("✗"),
            name,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_enrichment_complete(&self, total_images: usize, resolved: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!("{} {} images described", green("✔"), bold(&resolved.to_string()));
        } else {
            eprintln!(
                "{} {}/{} images described  ({} unresolved)",
                if resolved == 0 { red("✘") } else { cyan("⚠") },
                bold(&resolved.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Enrich a saved page, images already downloaded into ./images
  enrich-html page.html --images-dir images

  # Download the page and its images first, write the result to a file
  enrich-html https://example.com/article.html --images-dir images --download-media -o enriched.txt

  # Only list the media found (no API key needed)
  enrich-html --scan-only page.html

  # Custom label template
  enrich-html page.html --images-dir images --template "[{name}] {description}"

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Replace images in HTML documents with VLM-generated descriptions.
#[derive(Parser, Debug)]
#[command(
    name = "enrich-html",
    version,
    about = "Replace images in HTML documents with VLM-generated descriptions",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local HTML file path or HTTP/HTTPS URL.
    input: String,

    /// Directory holding the image files referenced by the document.
    #[arg(long, env = "ENRICH_IMAGES_DIR", default_value = "images")]
    images_dir: PathBuf,

    /// Write the enriched text to this file instead of stdout.
    #[arg(short, long, env = "ENRICH_OUTPUT")]
    output: Option<PathBuf>,

    /// Write the placeholder tables (images + audio) as JSON to this file.
    #[arg(long, env = "ENRICH_TABLES")]
    tables: Option<PathBuf>,

    /// Download image sources into --images-dir before describing them.
    #[arg(long)]
    download_media: bool,

    /// Base URL for relative media sources (defaults to the input URL).
    #[arg(long, env = "ENRICH_BASE_URL")]
    base_url: Option<String>,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent VLM calls.
    #[arg(short, long, env = "ENRICH_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Path to a text file with a custom vision instruction.
    #[arg(long, env = "ENRICH_VISION_PROMPT")]
    vision_prompt: Option<PathBuf>,

    /// Description template using {name}, {caption} and {description}.
    #[arg(long, env = "ENRICH_TEMPLATE")]
    template: Option<String>,

    /// Text used for {caption} when a figure has none.
    #[arg(long, env = "ENRICH_MISSING_CAPTION")]
    missing_caption: Option<String>,

    /// Max LLM output tokens per image.
    #[arg(long, env = "ENRICH_MAX_TOKENS", default_value_t = 2000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ENRICH_TEMPERATURE", default_value_t = 1.0)]
    temperature: f32,

    /// Per-image VLM call timeout in seconds.
    #[arg(long, env = "ENRICH_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "ENRICH_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON (EnrichmentOutput) instead of text.
    #[arg(long, env = "ENRICH_JSON")]
    json: bool,

    /// Scan only: print the media found, no descriptions.
    #[arg(long)]
    scan_only: bool,

    /// Disable progress bar.
    #[arg(long, env = "ENRICH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ENRICH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ENRICH_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.scan_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress = show_progress.then(CliProgressCallback::new);
    let progress_cb = progress
        .as_ref()
        .map(|p| Arc::clone(p) as ProgressCallback);
    let config = build_config(&cli, progress_cb).await.inspect_err(|_| {
        if let Some(ref p) = progress {
            p.finish();
        }
    })?;

    // ── Scan-only mode ───────────────────────────────────────────────────
    if cli.scan_only {
        let scanned = enrich_html::scan_only(&cli.input, &config)
            .await
            .context("Failed to scan document")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&scanned).context("Failed to serialise scan")?
            );
        } else {
            println!("Document:  {}", cli.input);
            println!("Images:    {}", scanned.images.len());
            for p in enrich_html::media::in_document_order(&scanned.images) {
                let caption = p.caption.as_deref().unwrap_or("-");
                println!("  #{:<3} {:<32} {}", p.position, p.name, dim(caption));
            }
            println!("Audio:     {}", scanned.audio.len());
            for p in enrich_html::media::in_document_order(&scanned.audio) {
                println!("  #{:<3} {}", p.position, p.name);
            }
        }
        return Ok(());
    }

    let outcome = run_enrichment(&cli, &config).await;
    if let Some(ref p) = progress {
        p.finish();
    }
    let output = outcome?;

    if let Some(ref path) = cli.tables {
        let tables = serde_json::json!({ "images": output.images, "audio": output.audio });
        let json = serde_json::to_string_pretty(&tables).context("Failed to serialise tables")?;
        write_output(path, &json).context("Failed to write tables")?;
    }

    print_result(&cli, &output)
}

/// Load, optionally download media, enrich, and write `--output` if given.
async fn run_enrichment(cli: &Cli, config: &EnrichConfig) -> Result<EnrichmentOutput> {
    if !cli.download_media {
        return match cli.output {
            Some(ref path) => enrich_to_file(&cli.input, &cli.images_dir, path, config)
                .await
                .context("Enrichment failed"),
            None => enrich_html::enrich_input(&cli.input, &cli.images_dir, config)
                .await
                .context("Enrichment failed"),
        };
    }

    let doc = input::resolve_input(&cli.input, config.download_timeout_secs)
        .await
        .context("Failed to load document")?;
    let scanned = scan::scan_labeled(&doc.label, &doc.markup).context("Failed to scan document")?;

    if !scanned.images.is_empty() {
        let base = match cli.base_url.as_deref() {
            Some(b) => Some(reqwest::Url::parse(b).context("Invalid --base-url")?),
            None if input::is_url(&cli.input) => reqwest::Url::parse(&cli.input).ok(),
            None => None,
        };
        let fetched = fetch::download_media(
            &scanned.images,
            &cli.images_dir,
            base.as_ref(),
            config.download_timeout_secs,
        )
        .await
        .context("Failed to download media")?;
        if !cli.quiet {
            eprintln!(
                "{} downloaded {}, {} already present, {} failed",
                cyan("↓"),
                fetched.downloaded,
                fetched.skipped,
                fetched.failures.len()
            );
        }
    }

    let output = enrich_labeled(&doc.label, &doc.markup, &cli.images_dir, config)
        .await
        .context("Enrichment failed")?;
    if let Some(ref path) = cli.output {
        write_output(path, &output.text).context("Failed to write output")?;
    }
    Ok(output)
}

fn print_result(cli: &Cli, output: &EnrichmentOutput) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.text.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        let stats = &output.stats;
        eprintln!(
            "{}  {}/{} images  {} audio  {}ms{}",
            if stats.failed_images == 0 { green("✔") } else { cyan("⚠") },
            stats.resolved_images,
            stats.total_images,
            stats.audio_items,
            stats.total_duration_ms,
            cli.output
                .as_ref()
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
        for failure in &output.failures {
            eprintln!("   {} {}", red("✗"), dim(&failure.to_string()));
        }
    }
    Ok(())
}

/// Map CLI args to `EnrichConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<EnrichConfig> {
    let mut builder = EnrichConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.vision_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read vision prompt from {:?}", path))?;
        builder = builder.vision_prompt(prompt);
    }

    let mut template = match cli.template {
        Some(ref t) => DescriptionTemplate::new(t.clone()),
        None => DescriptionTemplate::default(),
    };
    if let Some(ref missing) = cli.missing_caption {
        template = template.with_missing_caption(missing.clone());
    }
    builder = builder.description_template(template);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
