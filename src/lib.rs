//! # scriber
//!
//! Transcribe handwritten-note images embedded in Markdown notes using
//! Vision Language Models (VLMs), and merge the results back into the note.
//!
//! ## Why this crate?
//!
//! Photos of notebook pages pasted into a note are unsearchable. A VLM reads
//! handwriting well, but each image comes back as its own small document with
//! its own front-matter and tags. This crate sends every embedded image to
//! the model, then folds the replies into one fragment: a single front-matter
//! block with the union of all tags, followed by the transcriptions in page
//! order, inserted just above the first image.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Note
//!  │
//!  ├─ 1. Links      find ![[name.png]] embeds in document order
//!  ├─ 2. Input      resolve each embed (vault root, then attachments folder)
//!  ├─ 3. Encode     sniff PNG/JPEG, base64 data
//!  ├─ 4. VLM        concurrent calls to gpt-4o / claude / gemini / …
//!  ├─ 5. Normalize  split each reply into front-matter, tags, body
//!  ├─ 6. Merge      first front-matter wins, tags unioned, bodies joined
//!  └─ 7. Patch      insert above the first embed, write the note once
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scriber::{scribe_note, ScribeConfig, Vault};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let vault = Vault::new("/home/me/Notes");
//!     let config = ScribeConfig::default();
//!     let output = scribe_note("Inbox/meeting.md", &vault, &config).await?;
//!     eprintln!("tokens: {} in / {} out",
//!         output.stats.total_input_tokens,
//!         output.stats.total_output_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scriber` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! scriber = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod scribe;
pub mod vault;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{LlmBackend, ModelBackend, OpenAiHttpBackend, Transcription, TranscriptionRequest};
pub use config::{ScribeConfig, ScribeConfigBuilder};
pub use error::{BackendError, ImageError, ScriberError};
pub use output::{ImageResult, ScribeOutput, ScribeStats};
pub use pipeline::input::{ImageBlob, ImageSource};
pub use pipeline::links::ImageReference;
pub use pipeline::merge::MergedResult;
pub use pipeline::normalize::NormalizedFragment;
pub use progress::{NoopProgressCallback, ProgressCallback, ScribeProgressCallback};
pub use prompts::ResolvedPrompt;
pub use scribe::{log_activity, resolve_backend, scribe_note, scribe_text, scribe_with};
pub use vault::{DocumentStore, Vault};
