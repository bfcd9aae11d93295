//! CLI binary for edgequake-invoice.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractorConfig`, runs one submission and prints the response.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_invoice::extract::quota_retry_message;
use edgequake_invoice::output::ANSWER_HEADING;
use edgequake_invoice::{
    ExtractorConfig, GenerationObserver, InvoiceExtractor, MessageLevel, Observer, StatusMessage,
    SubmitRequest, SubmitResponse, UploadedFile,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: [&str; 11] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Spinner shown while the model is working; quota retries are printed
/// above it as they happen.
struct CliObserver {
    bar: ProgressBar,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style =
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&TICKS);
        bar.set_style(style);
        bar.set_prefix("Analyzing the document...");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl GenerationObserver for CliObserver {
    fn on_attempt_start(&self, attempt: u32, max_retries: u32) {
        self.bar.set_message(format!("attempt {attempt}/{max_retries}"));
    }

    fn on_quota_retry(&self, wait: Duration, attempt: u32, max_retries: u32) {
        self.bar.println(format!(
            "{} {}",
            yellow("⚠"),
            yellow(&quota_retry_message(wait, attempt, max_retries))
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Ask about a scanned invoice
  invoice-ask invoice.jpg "What is the total amount due?"

  # Multi-page PDF: every page is sent to the model
  invoice-ask invoice.pdf "List every line item with its price"

  # Save the preview image and print JSON
  invoice-ask --preview preview.jpg --json invoice.pdf "Who is the supplier?"

  # Use a different model
  invoice-ask --provider openai --model gpt-4.1 invoice.png "What is the VAT number?"

RETRY BEHAVIOUR:
  Every attempt waits --pacing-delay seconds first. When the provider reports
  quota exhaustion (HTTP 429 / RESOURCE_EXHAUSTED) the call is retried after
  --quota-backoff × 2^attempt seconds (10s, 20s, 40s …), up to --max-retries
  attempts in total. Any other error is reported immediately.

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  GOOGLE_API_KEY          Alias for GEMINI_API_KEY
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to an existing libpdfium (skips auto-download)

  Variables may also be placed in a .env file in the working directory.
"#;

/// Ask questions about invoice images and PDFs using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "invoice-ask",
    version,
    about = "Ask questions about invoice images and PDFs using Vision LLMs",
    long_about = "Send an invoice (JPEG, PNG or PDF) and a free-text question to a multimodal \
language model and print its answer. Invoices may be written in any language.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Invoice file: .jpg, .jpeg, .png or .pdf.
    input: PathBuf,

    /// Question to ask about the invoice.
    #[arg(default_value = "")]
    query: String,

    /// LLM model ID (default: gemini-2.5-pro).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set; \
          Gemini is preferred when GEMINI_API_KEY or GOOGLE_API_KEY is present."
    )]
    provider: Option<String>,

    /// Total generation attempts (quota errors only are retried).
    #[arg(long, env = "INVOICE_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_retries: u32,

    /// Seconds to wait before every attempt.
    #[arg(long, env = "INVOICE_PACING_DELAY", default_value_t = 2)]
    pacing_delay: u64,

    /// Base of the exponential quota backoff, in seconds.
    #[arg(long, env = "INVOICE_QUOTA_BACKOFF", default_value_t = 10)]
    quota_backoff: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "INVOICE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "INVOICE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "INVOICE_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "INVOICE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Write the preview image (upload, or first PDF page) to this file.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Output the structured response as JSON.
    #[arg(long, env = "INVOICE_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, env = "INVOICE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors and the answer.
    #[arg(short, long, env = "INVOICE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine; the environment may be set directly.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    // ── Read upload ──────────────────────────────────────────────────────
    let upload = UploadedFile::from_path(&cli.input)
        .await
        .with_context(|| format!("Failed to load {}", cli.input.display()))?;

    if upload.is_pdf() {
        ensure_pdfium(cli.quiet)?;
    }

    // ── Build config ─────────────────────────────────────────────────────
    let observer = show_progress.then(CliObserver::new);
    let config = build_config(&cli, observer.clone().map(|o| o as Observer)).await?;
    let extractor = InvoiceExtractor::new(config).context("Failed to initialise extractor")?;

    // ── Submit ───────────────────────────────────────────────────────────
    let response = extractor
        .submit(SubmitRequest::new(upload, cli.query.clone()))
        .await;

    if let Some(ref obs) = observer {
        obs.finish();
    }

    if let (Some(path), Some(preview)) = (&cli.preview, &response.preview) {
        tokio::fs::write(path, &preview.data)
            .await
            .with_context(|| format!("Failed to write preview to {}", path.display()))?;
        if !cli.quiet && !cli.json {
            eprintln!(
                "{} {}  →  {}",
                cyan("◆"),
                preview.caption,
                bold(&path.display().to_string())
            );
        }
    }

    print_response(&cli, &response, show_progress)?;

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

/// Make sure libpdfium is available, downloading it once with a progress bar.
fn ensure_pdfium(quiet: bool) -> Result<()> {
    #[cfg(feature = "bundled")]
    {
        let _ = quiet;
        tokio::task::block_in_place(pdfium_auto::ensure_pdfium_bundled)
            .context("Failed to extract bundled PDFium engine")?;
        return Ok(());
    }

    #[cfg(not(feature = "bundled"))]
    {
        if pdfium_auto::is_pdfium_cached() {
            return Ok(());
        }
        if quiet {
            tokio::task::block_in_place(|| pdfium_auto::ensure_pdfium_library(None))
                .context("Failed to download PDFium engine")?;
            return Ok(());
        }

        let dl_bar = ProgressBar::new(0);
        dl_bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&TICKS),
        );
        dl_bar.set_prefix("PDF engine");
        dl_bar.enable_steady_tick(Duration::from_millis(80));

        let bar = dl_bar.clone();
        tokio::task::block_in_place(|| {
            pdfium_auto::ensure_pdfium_library(Some(&|downloaded, total| {
                if let Some(t) = total {
                    if bar.length().unwrap_or(0) != t {
                        bar.set_length(t);
                    }
                }
                bar.set_position(downloaded);
            }))
        })
        .context("Failed to download PDFium engine")?;

        dl_bar.finish_with_message("ready ✓");
        Ok(())
    }
}

/// Map CLI args to `ExtractorConfig`.
async fn build_config(cli: &Cli, observer: Option<Observer>) -> Result<ExtractorConfig> {
    let mut builder = ExtractorConfig::builder()
        .max_retries(cli.max_retries)
        .pacing_delay(Duration::from_secs(cli.pacing_delay))
        .quota_backoff_base(Duration::from_secs(cli.quota_backoff))
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(obs) = observer {
        builder = builder.observer(obs);
    }

    builder.build().context("Invalid configuration")
}

fn print_response(cli: &Cli, response: &SubmitResponse, show_progress: bool) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(response).context("Failed to serialise response")?;
        println!("{json}");
        return Ok(());
    }

    for message in &response.messages {
        // Live retries were already printed above the spinner.
        if show_progress && message.level == MessageLevel::Warning {
            continue;
        }
        print_message(message, cli.quiet);
    }

    if let Some(ref answer) = response.output {
        if !cli.quiet {
            eprintln!("{} {}", green("✔"), bold(ANSWER_HEADING));
        }
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(answer.as_bytes())
            .context("Failed to write to stdout")?;
        if !answer.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }
    Ok(())
}

fn print_message(message: &StatusMessage, quiet: bool) {
    match message.level {
        MessageLevel::Error => eprintln!("{} {}", red("✘"), red(&message.text)),
        MessageLevel::Warning if !quiet => eprintln!("{} {}", yellow("⚠"), yellow(&message.text)),
        MessageLevel::Info if !quiet => eprintln!("{} {}", cyan("ℹ"), message.text),
        _ => {}
    }
}
