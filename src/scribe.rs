//! Run entry points: transcribe every image embedded in a note.
//!
//! A run reads the note once, transcribes its embeds concurrently, folds the
//! replies into one fragment and writes the note back once. Individual image
//! failures are recorded in [`ImageResult`] and skipped; only a run where
//! nothing at all could be transcribed is an error, and then the note is left
//! untouched.

use crate::backend::{LlmBackend, ModelBackend, OpenAiHttpBackend};
use crate::config::ScribeConfig;
use crate::error::ScriberError;
use crate::output::{ImageResult, ScribeOutput, ScribeStats};
use crate::pipeline::input::ImageSource;
use crate::pipeline::links::{extract_image_links, ImageReference};
use crate::pipeline::merge::merge_fragments;
use crate::pipeline::normalize::{normalize_response, NormalizedFragment};
use crate::pipeline::patch::patch_document;
use crate::pipeline::{encode, llm};
use crate::prompts::{ResolvedPrompt, DEFAULT_SYSTEM_PROMPT};
use crate::vault::{DocumentStore, Vault};
use edgequake_llm::ProviderFactory;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Note id the CLI logs to when `--log-note` is given without a value.
pub const DEFAULT_ACTIVITY_LOG: &str = "Scriber Log.md";

/// Header written when the activity log note is first created.
pub const ACTIVITY_LOG_HEADER: &str = "# Scriber Activity Log\n";

/// Transcribe the images embedded in a vault note and patch the note.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ScribeOutput)` when the note had no images (nothing written) or when
/// at least one image was transcribed (check `output.stats.failed_images`).
///
/// # Errors
/// Returns `Err(ScriberError)` only for fatal errors:
/// - Note not found / unreadable / not writable
/// - No model backend could be configured
/// - Every image failed, in which case the note is unchanged
///
/// # Example
/// ```rust,no_run
/// use scriber::{scribe_note, ScribeConfig, Vault};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let vault = Vault::new("/home/me/Notes");
/// let config = ScribeConfig::default();
/// let output = scribe_note("Daily/2024-05-01.md", &vault, &config).await?;
/// eprintln!("{} image(s) transcribed", output.stats.transcribed_images);
/// # Ok(())
/// # }
/// ```
pub async fn scribe_note(
    note_id: &str,
    vault: &Vault,
    config: &ScribeConfig,
) -> Result<ScribeOutput, ScriberError> {
    scribe_with(note_id, vault, vault, config).await
}

/// [`scribe_note`] over arbitrary note storage and image source.
pub async fn scribe_with(
    note_id: &str,
    store: &dyn DocumentStore,
    images: &dyn ImageSource,
    config: &ScribeConfig,
) -> Result<ScribeOutput, ScriberError> {
    let start = Instant::now();
    info!("Scribing note: {}", note_id);

    // ── Step 1: Read note and find embeds ────────────────────────────────
    let document = store.read(note_id).await?;
    if extract_image_links(&document).is_empty() {
        info!("No images found to process.");
        return Ok(ScribeOutput::no_images(note_id));
    }

    // ── Step 2: Prompts ──────────────────────────────────────────────────
    let prompt = resolve_prompt(store, config).await;

    // ── Step 3: Transcribe, merge, patch ─────────────────────────────────
    let mut output = scribe_text(note_id, &document, images, &prompt, config).await?;

    // ── Step 4: Single write ─────────────────────────────────────────────
    if config.dry_run {
        info!("Dry run: {} left unchanged", note_id);
    } else if let Some(ref patched) = output.document {
        store.write(note_id, patched).await?;
        output.written = true;
        info!(
            "Scriber processed {} image(s).",
            output.stats.transcribed_images
        );

        if let Some(ref log_id) = config.activity_log {
            let message = format!(
                "Processed {} of {} image(s) in {}",
                output.stats.transcribed_images, output.stats.total_images, note_id
            );
            if let Err(e) = log_activity(store, log_id, &message).await {
                warn!("Could not update activity log '{}': {}", log_id, e);
            }
        }
    }

    output.stats.total_duration_ms = start.elapsed().as_millis() as u64;
    Ok(output)
}

/// Run the pipeline over an in-memory document without touching storage.
///
/// The patched text is returned in `output.document`; `output.written` is
/// always false. `label` only names the document in logs and the output.
pub async fn scribe_text(
    label: &str,
    document: &str,
    images: &dyn ImageSource,
    prompt: &ResolvedPrompt,
    config: &ScribeConfig,
) -> Result<ScribeOutput, ScriberError> {
    let start = Instant::now();

    let links = extract_image_links(document);
    if links.is_empty() {
        return Ok(ScribeOutput::no_images(label));
    }
    debug!("{}: {} image embed(s)", label, links.len());

    let backend = resolve_backend(config).await?;
    info!("Using backend '{}'", backend.name());

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(links.len());
    }

    let llm_start = Instant::now();
    let mut results =
        process_concurrent(backend.as_ref(), images, &links, prompt, config).await;
    let llm_duration_ms = llm_start.elapsed().as_millis() as u64;

    // Completion order is arbitrary; merge in document order.
    results.sort_by_key(|r| r.index);

    let fragments: Vec<NormalizedFragment> = results
        .iter()
        .filter(|r| r.is_success())
        .map(|r| normalize_response(&r.markdown, &r.extension))
        .collect();

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(links.len(), fragments.len());
    }

    if fragments.is_empty() {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        warn!("No Markdown extracted from images.");
        return Err(ScriberError::NothingExtracted {
            total: results.len(),
            first_error,
        });
    }

    let merged = merge_fragments(&fragments).render();
    let patched = patch_document(document, &links[0].literal, &merged);

    let stats = ScribeStats {
        total_images: links.len(),
        transcribed_images: fragments.len(),
        failed_images: results.len() - fragments.len(),
        total_input_tokens: results.iter().map(|r| r.input_tokens as u64).sum(),
        total_output_tokens: results.iter().map(|r| r.output_tokens as u64).sum(),
        total_duration_ms: start.elapsed().as_millis() as u64,
        llm_duration_ms,
    };

    info!(
        "Transcribed {}/{} images in {}ms",
        stats.transcribed_images, stats.total_images, stats.llm_duration_ms
    );

    Ok(ScribeOutput {
        note: label.to_string(),
        links,
        images: results,
        merged: Some(merged),
        document: Some(patched),
        written: false,
        stats,
    })
}

/// Append a timestamped line to the activity log note, creating it if needed.
pub async fn log_activity(
    store: &dyn DocumentStore,
    log_id: &str,
    message: &str,
) -> Result<(), ScriberError> {
    let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
    let entry = format!("\n[{now}] {message}");

    match store.read(log_id).await {
        Ok(current) => store.write(log_id, &(current + &entry)).await,
        Err(ScriberError::NoteNotFound { .. }) => {
            store
                .create(log_id, &format!("{ACTIVITY_LOG_HEADER}{entry}"))
                .await
        }
        Err(e) => Err(e),
    }
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Work out the system prompt and reference text for this run.
///
/// A configured prompt note that can't be read falls back to
/// `config.system_prompt`, then to the built-in default.
pub async fn resolve_prompt(store: &dyn DocumentStore, config: &ScribeConfig) -> ResolvedPrompt {
    let fallback = || {
        config
            .system_prompt
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    };

    let system = match config.prompt_note {
        Some(ref id) => match store.read(id).await {
            Ok(text) => {
                debug!("Using prompt note '{}'", id);
                text
            }
            Err(e) => {
                warn!("Prompt note not found ({}). Using configured prompt.", e);
                fallback()
            }
        },
        None => fallback(),
    };

    let reference = match config.reference_note {
        Some(ref id) => match store.read(id).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("Reference note skipped: {}", e);
                None
            }
        },
        None => None,
    };

    ResolvedPrompt { system, reference }
}

/// Instantiate a named `edgequake-llm` provider with the given model.
fn create_llm_backend(
    provider_name: &str,
    model: &str,
    config: &ScribeConfig,
) -> Result<Arc<dyn ModelBackend>, ScriberError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        ScriberError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(Arc::new(LlmBackend::new(
        format!("{provider_name}/{model}"),
        provider,
        config,
    )))
}

/// Resolve the model backend, from most-specific to least-specific.
///
/// 1. **Pre-built backend** (`config.backend`), used as-is.
/// 2. **Explicit API key** (`config.api_key`): direct OpenAI-compatible HTTP
///    against `config.api_base_url`.
/// 3. **Named provider + model** (`config.provider_name`) via
///    [`ProviderFactory::create_llm_provider`], which reads that provider's
///    key from the environment.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **`OPENAI_API_KEY`** present: OpenAI through `edgequake-llm`.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub async fn resolve_backend(
    config: &ScribeConfig,
) -> Result<Arc<dyn ModelBackend>, ScriberError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    if let Some(ref key) = config.api_key {
        return Ok(Arc::new(OpenAiHttpBackend::new(key.clone(), config)?));
    }

    if let Some(ref name) = config.provider_name {
        return create_llm_backend(name, config.model_or_default(), config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_llm_backend(&prov, &model, config);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_llm_backend("openai", config.model_or_default(), config);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| ScriberError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Pass --api-key, set OPENAI_API_KEY or ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(Arc::new(LlmBackend::new("auto", llm_provider, config)))
}

/// Fetch, encode and transcribe every embed, `config.concurrency` at a time.
///
/// Results come back in completion order; the caller sorts them.
async fn process_concurrent(
    backend: &dyn ModelBackend,
    images: &dyn ImageSource,
    links: &[ImageReference],
    prompt: &ResolvedPrompt,
    config: &ScribeConfig,
) -> Vec<ImageResult> {
    let total = links.len();
    stream::iter(links.iter().enumerate().map(|(i, link)| {
        process_one(backend, images, i + 1, total, link, prompt, config)
    }))
    .buffer_unordered(config.concurrency)
    .collect()
    .await
}

/// One embed from path token to model reply. Never fails; see [`ImageResult`].
async fn process_one(
    backend: &dyn ModelBackend,
    images: &dyn ImageSource,
    index: usize,
    total: usize,
    link: &ImageReference,
    prompt: &ResolvedPrompt,
    config: &ScribeConfig,
) -> ImageResult {
    if let Some(ref cb) = config.progress_callback {
        cb.on_image_start(index, total);
    }

    let encoded = match images.fetch(&link.path).await {
        Ok(blob) => encode::encode_image(&blob),
        Err(e) => Err(e),
    };

    let result = match encoded {
        Ok(image) => llm::process_image(backend, index, link, image, prompt, config).await,
        Err(e) => {
            let e = e.with_index(index);
            warn!("{}; skipping {}", e, link.literal);
            ImageResult::failed(index, link, e)
        }
    };

    if let Some(ref cb) = config.progress_callback {
        match &result.error {
            None => cb.on_image_complete(index, total, result.markdown.len()),
            Some(e) => cb.on_image_error(index, total, &e.to_string()),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Transcription, TranscriptionRequest};
    use crate::error::{BackendError, ImageError};
    use crate::pipeline::input::ImageBlob;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    /// Images keyed by path; anything else is not found.
    struct MemoryImages(HashMap<&'static str, &'static [u8]>);

    #[async_trait]
    impl ImageSource for MemoryImages {
        async fn fetch(&self, path: &str) -> Result<ImageBlob, ImageError> {
            let bytes = self.0.get(path).ok_or_else(|| ImageError::NotFound {
                index: 0,
                path: path.to_string(),
            })?;
            Ok(ImageBlob {
                location: path.to_string(),
                bytes: bytes.to_vec(),
                extension: "png".into(),
            })
        }
    }

    /// Notes in a map, so writes can be inspected.
    #[derive(Default)]
    struct MemoryStore(Mutex<HashMap<String, String>>);

    #[async_trait]
    impl DocumentStore for MemoryStore {
        async fn read(&self, id: &str) -> Result<String, ScriberError> {
            self.0
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| ScriberError::NoteNotFound { id: id.into() })
        }

        async fn write(&self, id: &str, text: &str) -> Result<(), ScriberError> {
            self.0.lock().unwrap().insert(id.into(), text.into());
            Ok(())
        }

        async fn create(&self, id: &str, text: &str) -> Result<(), ScriberError> {
            self.write(id, text).await
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl ModelBackend for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn transcribe(&self, _: &TranscriptionRequest) -> Result<Transcription, BackendError> {
            Ok(Transcription {
                content: self.0.to_string(),
                input_tokens: 100,
                output_tokens: 20,
            })
        }
    }

    fn config(reply: &'static str) -> ScribeConfig {
        ScribeConfig::builder()
            .backend(Arc::new(Fixed(reply)))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn scenario_one_of_two_resolves() {
        let images = MemoryImages(HashMap::from([("scan.png", PNG_MAGIC)]));
        let cfg = config("---\ntitle: x\n---\n**Tags:** a, b\nHello");
        let out = scribe_text(
            "n",
            "before ![[scan.png]] after ![[missing.png]]",
            &images,
            &ResolvedPrompt::default(),
            &cfg,
        )
        .await
        .unwrap();

        let merged = "---\ntitle: x\ntags: [\"a\", \"b\"]\n---\n\nHello";
        assert_eq!(out.merged.as_deref(), Some(merged));
        assert_eq!(
            out.document.as_deref().unwrap(),
            format!("before {merged}\n\n![[scan.png]] after ![[missing.png]]")
        );
        assert_eq!(out.stats.transcribed_images, 1);
        assert_eq!(out.stats.failed_images, 1);
        assert!(matches!(
            out.images[1].error,
            Some(ImageError::NotFound { index: 2, .. })
        ));
        assert!(!out.written);
    }

    #[tokio::test]
    async fn all_failed_is_nothing_extracted() {
        let images = MemoryImages(HashMap::new());
        let err = scribe_text(
            "n",
            "![[a.png]] ![[b.png]]",
            &images,
            &ResolvedPrompt::default(),
            &config("x"),
        )
        .await
        .unwrap_err();
        match err {
            ScriberError::NothingExtracted { total, first_error } => {
                assert_eq!(total, 2);
                assert!(first_error.starts_with("Image 1:"), "got: {first_error}");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_images_needs_no_backend() {
        let store = MemoryStore::default();
        store.write("n.md", "plain text").await.unwrap();
        // No backend configured at all; must not be resolved.
        let out = scribe_with("n.md", &store, &MemoryImages(HashMap::new()), &ScribeConfig::default())
            .await
            .unwrap();
        assert!(out.found_no_images());
        assert!(!out.written);
    }

    #[tokio::test]
    async fn prompt_note_overrides_and_falls_back() {
        let store = MemoryStore::default();
        store.write("prompt.md", "Read this.").await.unwrap();
        store.write("ref.md", "Ada").await.unwrap();

        let cfg = ScribeConfig::builder()
            .prompt_note("prompt.md")
            .reference_note("ref.md")
            .build()
            .unwrap();
        let p = resolve_prompt(&store, &cfg).await;
        assert_eq!(p.system, "Read this.");
        assert_eq!(p.reference.as_deref(), Some("Ada"));

        let cfg = ScribeConfig::builder()
            .prompt_note("missing.md")
            .system_prompt("Custom.")
            .build()
            .unwrap();
        let p = resolve_prompt(&store, &cfg).await;
        assert_eq!(p.system, "Custom.");
        assert_eq!(p.reference, None);

        let p = resolve_prompt(&store, &ScribeConfig::default()).await;
        assert_eq!(p.system, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn activity_log_created_then_appended() {
        let store = MemoryStore::default();
        log_activity(&store, "log.md", "first").await.unwrap();
        log_activity(&store, "log.md", "second").await.unwrap();

        let log = store.read("log.md").await.unwrap();
        assert!(log.starts_with("# Scriber Activity Log\n\n["), "got: {log}");
        let lines: Vec<&str> = log.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].ends_with("] first"));
        assert!(lines[3].ends_with("] second"));
        // [YYYY-MM-DD HH:MM:SS]
        assert_eq!(lines[3].find(']'), Some(20));
    }

    #[tokio::test]
    async fn explicit_backend_wins() {
        let cfg = ScribeConfig::builder()
            .backend(Arc::new(Fixed("x")))
            .api_key("sk-ignored")
            .build()
            .unwrap();
        assert_eq!(resolve_backend(&cfg).await.unwrap().name(), "fixed");
    }

    #[tokio::test]
    async fn api_key_selects_http_backend() {
        let cfg = ScribeConfig::builder().api_key("sk-test").build().unwrap();
        assert_eq!(resolve_backend(&cfg).await.unwrap().name(), "openai-http");
    }
}
