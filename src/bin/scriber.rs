//! CLI binary for scriber.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ScribeConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scriber::scribe::DEFAULT_ACTIVITY_LOG;
use scriber::{scribe_note, ProgressCallback, ScribeConfig, ScribeProgressCallback, Vault};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
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

/// Terminal progress callback: a live bar plus one log line per image.
/// Images finish out of order, so start times are keyed by index.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many images there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading note…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} images  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    /// Clear the bar if the run ended without `on_run_complete`.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ScribeProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_images: usize) {
        self.activate_bar(total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {total_images} image(s)…"))
        ));
    }

    fn on_image_start(&self, index: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(index, Instant::now());
        }
        self.bar.set_message(format!("image {index}"));
    }

    fn on_image_complete(&self, index: usize, total: usize, markdown_len: usize) {
        let secs = self.elapsed_secs(index);
        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            index,
            total,
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_image_error(&self, index: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(index);

        // Keep one line per image.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Image {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, total_images: usize, success_count: usize) {
        let failed = total_images.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} image(s) transcribed",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} image(s) transcribed  ({} skipped)",
                if failed == total_images {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&success_count.to_string()),
                total_images,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Transcribe the images in a note (vault = current directory)
  scriber "Inbox/Meeting notes.md"

  # Vault elsewhere, images kept in "Files"
  scriber --vault ~/Notes --attachments-folder Files "Daily/2024-05-01.md"

  # Preview the patched note without writing it
  scriber --dry-run "Inbox/scan.md"

  # Custom prompt and vocabulary stored in the vault, with an activity log
  scriber --prompt-note "Scriber/Prompt.md" --reference-note "Scriber/Names.md" \
          --log-note "Scriber Log.md" "Inbox/scan.md"

  # Direct OpenAI-compatible endpoint (e.g. a local server)
  scriber --api-key sk-... --api-base-url http://localhost:8080/v1 note.md

  # Any edgequake-llm provider
  scriber --provider anthropic --model claude-sonnet-4-20250514 note.md

HOW NOTES ARE CHANGED:
  Every ![[image.png]], ![[image.jpg]] or ![[image.jpeg]] embed in the note is
  transcribed. The results are merged into one block (front-matter with all
  tags, then the transcriptions in order) and inserted directly above the
  first embed. The embeds themselves are left in place.

ENVIRONMENT VARIABLES:
  SCRIBER_VAULT           Vault root directory
  SCRIBER_API_KEY         API key for the direct OpenAI-compatible backend
  OPENAI_API_KEY          OpenAI API key (edgequake-llm)
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter (overrides -v / -q)
"#;

/// Transcribe handwritten-note images embedded in Markdown notes.
#[derive(Parser, Debug)]
#[command(
    name = "scriber",
    version,
    about = "Transcribe handwritten-note images embedded in Markdown notes using Vision LLMs",
    long_about = "Finds image embeds in a Markdown note, transcribes each with a Vision \
Language Model, and merges the results (front-matter, tags, text) back into the note above the \
first image. Supports OpenAI, Anthropic, Google Gemini, Ollama and any OpenAI-compatible endpoint.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Note path, relative to the vault root.
    note: String,

    /// Vault root directory.
    #[arg(long, env = "SCRIBER_VAULT", default_value = ".")]
    vault: PathBuf,

    /// Folder searched for images that don't resolve from the vault root.
    #[arg(long, env = "SCRIBER_ATTACHMENTS_FOLDER", default_value = "Attachments")]
    attachments_folder: String,

    /// API key for a direct OpenAI-compatible chat/completions endpoint.
    #[arg(long, env = "SCRIBER_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL for --api-key requests.
    #[arg(long, env = "SCRIBER_API_BASE_URL")]
    api_base_url: Option<String>,

    /// LLM model ID (e.g. gpt-4o, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL", long_help = "Vision LLM model to use. Default: gpt-4o.")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama."
    )]
    provider: Option<String>,

    /// Number of images transcribed at once.
    #[arg(short, long, env = "SCRIBER_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SCRIBER_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per image.
    #[arg(long, env = "SCRIBER_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Per-image LLM call timeout in seconds.
    #[arg(long, env = "SCRIBER_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "SCRIBER_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Vault note whose content is used as the system prompt.
    #[arg(long, env = "SCRIBER_PROMPT_NOTE")]
    prompt_note: Option<String>,

    /// Vault note with names and terms appended to the prompt.
    #[arg(long, env = "SCRIBER_REFERENCE_NOTE")]
    reference_note: Option<String>,

    /// Append a timestamped line to this vault note after each write.
    #[arg(long, env = "SCRIBER_LOG_NOTE", num_args = 0..=1,
          default_missing_value = DEFAULT_ACTIVITY_LOG)]
    log_note: Option<String>,

    /// Print the patched note to stdout instead of writing it.
    #[arg(long)]
    dry_run: bool,

    /// Output structured JSON (ScribeOutput) on stdout.
    #[arg(long, env = "SCRIBER_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SCRIBER_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCRIBER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCRIBER_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress = show_progress.then(CliProgressCallback::new_dynamic);
    let config = build_config(
        &cli,
        progress
            .clone()
            .map(|cb| cb as Arc<dyn ScribeProgressCallback>),
    )
    .await?;

    let vault = Vault::new(&cli.vault).with_attachments_folder(cli.attachments_folder.clone());

    // ── Run ──────────────────────────────────────────────────────────────
    let result = scribe_note(&cli.note, &vault, &config).await;
    if let Some(ref cb) = progress {
        cb.abandon();
    }
    let output = result.with_context(|| format!("Failed to scribe '{}'", cli.note))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.dry_run {
        if let Some(ref document) = output.document {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(document.as_bytes())
                .context("Failed to write to stdout")?;
            if !document.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }
    }

    if cli.quiet || cli.json {
        return Ok(());
    }

    if output.found_no_images() {
        eprintln!("No images found to process.");
        return Ok(());
    }

    let stats = &output.stats;
    if output.written {
        eprintln!(
            "{}  Scriber processed {} image(s).  {}ms  →  {}",
            if stats.failed_images == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            stats.transcribed_images,
            stats.total_duration_ms,
            bold(&cli.note),
        );
    } else if !show_progress {
        eprintln!(
            "Transcribed {}/{} image(s) in {}ms (dry run, note unchanged)",
            stats.transcribed_images, stats.total_images, stats.total_duration_ms
        );
    }
    if !show_progress && stats.failed_images > 0 {
        eprintln!("  {} image(s) skipped", stats.failed_images);
    }
    eprintln!(
        "   {} tokens in  /  {} tokens out",
        dim(&stats.total_input_tokens.to_string()),
        dim(&stats.total_output_tokens.to_string()),
    );

    Ok(())
}

/// Map CLI args to `ScribeConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ScribeConfig> {
    let mut builder = ScribeConfig::builder()
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .dry_run(cli.dry_run);

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
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(ref url) = cli.api_base_url {
        builder = builder.api_base_url(url.clone());
    }
    if let Some(ref id) = cli.prompt_note {
        builder = builder.prompt_note(id.clone());
    }
    if let Some(ref id) = cli.reference_note {
        builder = builder.reference_note(id.clone());
    }
    if let Some(ref id) = cli.log_note {
        builder = builder.activity_log(id.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
