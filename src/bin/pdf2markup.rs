//! CLI binary for pdf2markup.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2markup::config::{DEFAULT_REMOTE_API_KEY, DEFAULT_REMOTE_BASE_URL, DEFAULT_REMOTE_MODEL};
use pdf2markup::{
    convert, convert_to_file, load_segments, ConversionConfig, ConversionProgressCallback,
    LocalOcrConfig, OutputFormat, ProgressCallback, RemoteOcrConfig, TableModelVariant,
};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar over the table pipeline. Tables may finish out of order
/// when the remote backend runs them concurrently.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Rendering pages…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, table_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&table_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_tables_start(&self, total_tables: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} tables  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_tables as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Tables");
        self.bar.reset_eta();
        if total_tables > 0 {
            self.bar.println(format!(
                "{} {}",
                cyan("◆"),
                bold(&format!("Recognising {total_tables} tables…"))
            ));
        }
    }

    fn on_table_start(&self, table_num: usize, _total: usize, page_number: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(table_num, Instant::now());
        }
        self.bar.set_message(format!("page {page_number}"));
    }

    fn on_table_complete(&self, table_num: usize, total: usize, html_len: usize) {
        let secs = self.elapsed_secs(table_num);
        self.bar.println(format!(
            "  {} Table {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            table_num,
            total,
            dim(&format!("{html_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_table_error(&self, table_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(table_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Table {:>3}/{:<3}  {}  {}",
            red("✗"),
            table_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_tables_complete(&self, total_tables: usize, recognised: usize) {
        self.bar.finish_and_clear();
        if total_tables == 0 {
            return;
        }
        let failed = self.errors.load(Ordering::SeqCst);
        eprintln!(
            "{} {}/{} tables recognised{}",
            if failed == 0 { green("✔") } else { cyan("⚠") },
            bold(&recognised.to_string()),
            total_tables,
            if failed > 0 {
                format!("  ({} failed)", red(&failed.to_string()))
            } else {
                String::new()
            },
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown on stdout, tables from the PDF text layer
  pdf2markup report.pdf --segments report.json

  # Local ONNX models for scanned tables
  pdf2markup scan.pdf --segments scan.json \
      --det-model models/det.onnx --rec-model models/rec.onnx \
      --char-dict models/ppocr_keys.txt \
      --table-model models/slanet_plus.onnx --table-dict models/table_dict.txt

  # HTML with a table of contents
  pdf2markup report.pdf --segments report.json --format html --toc

  # Remote vision model for tables and formulas
  pdf2markup report.pdf --segments report.json --remote-ocr \
      --remote-ocr-base-url http://localhost:8000/v1

  # Remote OCR through an edgequake-llm provider
  pdf2markup report.pdf --segments report.json --remote-ocr \
      --remote-ocr-provider openai --remote-ocr-model gpt-4.1-mini

  # Zip archive with pictures, segmentation and a French translation
  pdf2markup report.pdf --segments report.json --output-file report.md \
      --out-dir out/ --languages French

  # JSON output (content, segments, per-table results, stats)
  pdf2markup report.pdf --segments report.json --json > output.json

SEGMENTS FILE:
  A JSON array of layout records:
    {"left": 72, "top": 90, "width": 451, "height": 30, "page_number": 1,
     "page_width": 595, "page_height": 842, "text": "…", "type": "Title"}

ENVIRONMENT VARIABLES:
  REMOTE_OCR_ENABLED          Use the remote OCR backend (1/true/yes/on)
  REMOTE_OCR_BASE_URL         OpenAI-compatible base URL
  REMOTE_OCR_API_KEY          Bearer token for the endpoint
  REMOTE_OCR_MODEL            Vision model name
  REMOTE_OCR_TEMPERATURE      Sampling temperature
  REMOTE_OCR_TIMEOUT_SEC      Per-call timeout in seconds
  REMOTE_OCR_MAX_CONCURRENCY  Concurrent remote calls (min 1)
  REMOTE_OCR_PROVIDER         edgequake-llm provider instead of the base URL
  LOCAL_OCR_DET_MODEL         Text detection model (ONNX)
  LOCAL_OCR_REC_MODEL         Text recognition model (ONNX)
  LOCAL_OCR_CHAR_DICT         Character dictionary of the recognition model
  LOCAL_OCR_TABLE_MODEL       Table structure model (ONNX)
  LOCAL_OCR_TABLE_DICT        Table structure dictionary
  LOCAL_OCR_TABLE_MODEL_TYPE  slanet-plus or slanext-wired
  EDGEQUAKE_LLM_PROVIDER      Translation provider (openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL             Translation model
"#;

/// Convert segmented PDF documents to Markdown or HTML.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2markup",
    version,
    about = "Convert segmented PDF documents to Markdown or HTML",
    long_about = "Convert a PDF plus its layout segmentation into Markdown or HTML. Tables are \
recognised by local ONNX models (the PDF text layer when none are given) or a remote vision \
model; formulas inside tables are masked with markers and spliced back in as LaTeX.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// JSON file with the document's layout segments.
    #[arg(short, long, env = "PDF2MARKUP_SEGMENTS")]
    segments: PathBuf,

    /// Output markup.
    #[arg(long, env = "PDF2MARKUP_FORMAT", value_enum, default_value = "markdown")]
    format: FormatArg,

    /// Rendering DPI (72–400).
    #[arg(long, env = "PDF2MARKUP_DPI", default_value_t = 120,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Prepend a table of contents built from titles and section headers.
    #[arg(long)]
    toc: bool,

    /// Name of the document inside the zip archive (e.g. report.md).
    /// Enables picture extraction and archive output.
    #[arg(long, env = "PDF2MARKUP_OUTPUT_FILE")]
    output_file: Option<String>,

    /// Directory for the archive or document written with --output-file.
    #[arg(long, env = "PDF2MARKUP_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Comma-separated target languages for translations.
    #[arg(long, env = "PDF2MARKUP_LANGUAGES", value_delimiter = ',')]
    languages: Vec<String>,

    /// Local text detection model (ONNX).
    #[arg(long, env = "LOCAL_OCR_DET_MODEL")]
    det_model: Option<PathBuf>,

    /// Local text recognition model (ONNX).
    #[arg(long, env = "LOCAL_OCR_REC_MODEL")]
    rec_model: Option<PathBuf>,

    /// Character dictionary of the recognition model.
    #[arg(long, env = "LOCAL_OCR_CHAR_DICT")]
    char_dict: Option<PathBuf>,

    /// Local table structure model (ONNX).
    #[arg(long, env = "LOCAL_OCR_TABLE_MODEL")]
    table_model: Option<PathBuf>,

    /// Structure token dictionary of the table model.
    #[arg(long, env = "LOCAL_OCR_TABLE_DICT")]
    table_dict: Option<PathBuf>,

    /// Type of the local table structure model.
    #[arg(long, env = "LOCAL_OCR_TABLE_MODEL_TYPE", value_enum, default_value = "slanet-plus")]
    table_model_type: TableModelArg,

    /// Skip formula recognition.
    #[arg(long)]
    no_formulas: bool,

    /// Maximum OCR attempts per table while markers are missing.
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Use the remote OCR backend.
    #[arg(long, env = "REMOTE_OCR_ENABLED")]
    remote_ocr: bool,

    #[arg(long, env = "REMOTE_OCR_BASE_URL", default_value = DEFAULT_REMOTE_BASE_URL)]
    remote_ocr_base_url: String,

    #[arg(long, env = "REMOTE_OCR_API_KEY", default_value = DEFAULT_REMOTE_API_KEY,
          hide_env_values = true)]
    remote_ocr_api_key: String,

    #[arg(long, env = "REMOTE_OCR_MODEL", default_value = DEFAULT_REMOTE_MODEL)]
    remote_ocr_model: String,

    #[arg(long, env = "REMOTE_OCR_TEMPERATURE", default_value_t = 0.5)]
    remote_ocr_temperature: f32,

    /// Per-call timeout in seconds.
    #[arg(long, env = "REMOTE_OCR_TIMEOUT_SEC", default_value_t = 120)]
    remote_ocr_timeout: u64,

    /// Concurrent remote OCR calls.
    #[arg(long, env = "REMOTE_OCR_MAX_CONCURRENCY", default_value_t = 4)]
    remote_ocr_max_concurrency: usize,

    /// Send remote OCR through this edgequake-llm provider (openai, ollama, …)
    /// with --remote-ocr-model, instead of --remote-ocr-base-url.
    #[arg(long, env = "REMOTE_OCR_PROVIDER")]
    remote_ocr_provider: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "PDF2MARKUP_PASSWORD")]
    password: Option<String>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2MARKUP_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Output structured JSON (ConversionOutput) instead of markup.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDF2MARKUP_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Markdown,
    Html,
}

impl From<FormatArg> for OutputFormat {
    fn from(v: FormatArg) -> Self {
        match v {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Html => OutputFormat::Html,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum TableModelArg {
    SlanetPlus,
    SlanextWired,
}

impl From<TableModelArg> for TableModelVariant {
    fn from(v: TableModelArg) -> Self {
        match v {
            TableModelArg::SlanetPlus => TableModelVariant::SlanetPlus,
            TableModelArg::SlanextWired => TableModelVariant::SlanextWired,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose asks for more.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    let segments = load_segments(&cli.segments)
        .with_context(|| format!("Failed to load segments from {:?}", cli.segments))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    if config.output_file.is_some() && !cli.json {
        let (path, stats) = convert_to_file(&cli.input, segments, &cli.out_dir, &config)
            .await
            .context("Conversion failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} pages  {}/{} tables  {} pictures  {}ms  →  {}",
                if stats.tables_failed == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                stats.total_pages,
                stats.tables_recognised,
                stats.tables_total,
                stats.pictures_extracted,
                stats.total_time_ms,
                bold(&path.display().to_string()),
            );
        }
        return Ok(());
    }

    let output = convert(&cli.input, segments, &config)
        .await
        .context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.content.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.content.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "{}",
            dim(&format!(
                "{} pages, {}/{} tables, {}/{} formulas, {} OCR calls, {}ms",
                output.stats.total_pages,
                output.stats.tables_recognised,
                output.stats.tables_total,
                output.stats.formulas_recognised,
                output.stats.formulas_total,
                output.stats.ocr_calls,
                output.stats.total_time_ms,
            ))
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let remote = RemoteOcrConfig {
        enabled: cli.remote_ocr,
        base_url: cli.remote_ocr_base_url.clone(),
        api_key: cli.remote_ocr_api_key.clone(),
        model: cli.remote_ocr_model.clone(),
        temperature: cli.remote_ocr_temperature,
        timeout_secs: cli.remote_ocr_timeout,
        max_concurrency: cli.remote_ocr_max_concurrency.max(1),
        provider: cli.remote_ocr_provider.clone().filter(|p| !p.trim().is_empty()),
        ..RemoteOcrConfig::default()
    };
    let local = LocalOcrConfig {
        det_model: cli.det_model.clone(),
        rec_model: cli.rec_model.clone(),
        char_dict: cli.char_dict.clone(),
        table_model: cli.table_model.clone(),
        table_dict: cli.table_dict.clone(),
        table_model_type: cli.table_model_type.into(),
    };

    let mut builder = ConversionConfig::builder()
        .dpi(cli.dpi)
        .output_format(cli.format.into())
        .extract_toc(cli.toc)
        .target_languages(cli.languages.iter().map(|l| l.trim()))
        .remote_ocr(remote)
        .local_ocr(local)
        .recognize_formulas(!cli.no_formulas)
        .max_marker_attempts(cli.max_attempts)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref name) = cli.output_file {
        builder = builder.output_file(name.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}
