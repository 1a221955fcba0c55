//! Progress-callback trait for per-image events.
//!
//! Inject an [`Arc<dyn ScribeProgressCallback>`] via
//! [`crate::config::ScribeConfigBuilder::progress_callback`] to receive
//! events as the pipeline transcribes each image. The CLI uses it to drive an
//! `indicatif` progress bar; a host application could forward the same events
//! to its own notification area.
//!
//! # Example
//!
//! ```rust
//! use scriber::{ScribeConfig, ScribeProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl ScribeProgressCallback for CountingCallback {
//!     fn on_image_complete(&self, index: usize, total: usize, markdown_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Image {}/{} done ({} bytes)", index, total, markdown_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = ScribeConfig::builder()
//!     .progress_callback(counter as Arc<dyn ScribeProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each image.
///
/// Implementations must be `Send + Sync`: images are transcribed
/// concurrently, so `on_image_start`, `on_image_complete` and
/// `on_image_error` may fire in any order and from different tasks. All
/// methods default to no-ops.
pub trait ScribeProgressCallback: Send + Sync {
    /// Called once, after link extraction, before any image is fetched.
    fn on_run_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called just before an image is resolved and sent to the model.
    ///
    /// `index` is 1-indexed in document order.
    fn on_image_start(&self, index: usize, total_images: usize) {
        let _ = (index, total_images);
    }

    /// Called when the model returned a reply for an image.
    fn on_image_complete(&self, index: usize, total_images: usize, markdown_len: usize) {
        let _ = (index, total_images, markdown_len);
    }

    /// Called when an image was skipped.
    fn on_image_error(&self, index: usize, total_images: usize, error: &str) {
        let _ = (index, total_images, error);
    }

    /// Called once after every image has been attempted.
    fn on_run_complete(&self, total_images: usize, success_count: usize) {
        let _ = (total_images, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ScribeProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScribeConfig`].
pub type ProgressCallback = Arc<dyn ScribeProgressCallback>;
