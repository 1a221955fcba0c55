//! Model interaction: send one encoded image and collect the reply.
//!
//! Prompt text lives in [`crate::prompts`] and transport in
//! [`crate::backend`]. Failed calls are not retried; the image is reported
//! as skipped and the rest of the note carries on.

use crate::backend::{ModelBackend, TranscriptionRequest};
use crate::config::ScribeConfig;
use crate::error::ImageError;
use crate::output::ImageResult;
use crate::pipeline::encode::EncodedImage;
use crate::pipeline::links::ImageReference;
use crate::prompts::ResolvedPrompt;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Transcribe a single image.
///
/// Always returns an `ImageResult`; the error is stored in `result.error`
/// instead of propagated so one bad image doesn't abort the note.
pub async fn process_image(
    backend: &dyn ModelBackend,
    index: usize,
    link: &ImageReference,
    image: EncodedImage,
    prompt: &ResolvedPrompt,
    config: &ScribeConfig,
) -> ImageResult {
    let start = Instant::now();
    let extension = image.extension.clone();
    let request = TranscriptionRequest {
        image,
        system_prompt: prompt.system.clone(),
        reference: prompt.reference.clone(),
    };

    let call = timeout(
        Duration::from_secs(config.api_timeout_secs),
        backend.transcribe(&request),
    )
    .await;
    let duration_ms = start.elapsed().as_millis() as u64;

    let error = match call {
        Ok(Ok(reply)) if reply.content.trim().is_empty() => {
            warn!("Image {}: empty reply; skipping {}", index, link.literal);
            return ImageResult {
                extension,
                input_tokens: reply.input_tokens,
                output_tokens: reply.output_tokens,
                duration_ms,
                ..ImageResult::failed(index, link, ImageError::EmptyReply { index })
            };
        }
        Ok(Ok(reply)) => {
            debug!(
                "Image {} ({}): {} input tokens, {} output tokens, {}ms",
                index, link.path, reply.input_tokens, reply.output_tokens, duration_ms
            );
            return ImageResult {
                index,
                reference: link.literal.clone(),
                extension,
                markdown: reply.content,
                input_tokens: reply.input_tokens,
                output_tokens: reply.output_tokens,
                duration_ms,
                error: None,
            };
        }
        Ok(Err(e)) => ImageError::BackendFailed {
            index,
            detail: e.to_string(),
        },
        Err(_) => ImageError::Timeout {
            index,
            secs: config.api_timeout_secs,
        },
    };

    warn!("{}; skipping {}", error, link.literal);

    ImageResult {
        extension,
        duration_ms,
        ..ImageResult::failed(index, link, error)
    }
}
