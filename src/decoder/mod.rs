//! Decoder - lazily loaded 2-D code decoding
//!
//! ## Responsibilities
//!
//! - Decode one RGBA frame into at most one candidate string
//! - Load the decoder on first use and share it for the process lifetime
//! - Report load failure as `DecoderUnavailable` without caching it
//!
//! ## Design
//!
//! - `Decoder` is the seam; `QrDecoder` is the built-in implementation
//! - `LazyDecoder` guards the load with a `OnceCell` so concurrent first
//!   users share one load

mod qr;

pub use qr::QrDecoder;

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::models::ErrorKind;

/// Decoded payload text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub data: String,
}

/// Luminance inversion strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum InversionAttempts {
    /// Dark code on light background only
    #[default]
    DontInvert,
    /// Light code on dark background only
    OnlyInvert,
    AttemptBoth,
    InvertFirst,
}

impl InversionAttempts {
    /// Passes to run, `true` meaning inverted
    pub fn passes(self) -> &'static [bool] {
        match self {
            InversionAttempts::DontInvert => &[false],
            InversionAttempts::OnlyInvert => &[true],
            InversionAttempts::AttemptBoth => &[false, true],
            InversionAttempts::InvertFirst => &[true, false],
        }
    }
}

/// Per-call decode options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DecodeOptions {
    pub inversion_attempts: InversionAttempts,
}

/// Decoder could not be loaded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecoderError {
    #[error("Decoder unavailable: {0}")]
    Unavailable(String),
}

impl DecoderError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::DecoderUnavailable
    }
}

/// Frame decoder
pub trait Decoder: Send + Sync {
    /// Decode an RGBA frame; `None` when no code is present
    fn decode(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        options: &DecodeOptions,
    ) -> Option<Candidate>;
}

type Loader = Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn Decoder>, DecoderError>> + Send + Sync>;

static SHARED: OnceLock<Arc<LazyDecoder>> = OnceLock::new();

/// Lazily loaded, cached decoder
pub struct LazyDecoder {
    loader: Loader,
    cell: OnceCell<Arc<dyn Decoder>>,
    load_attempts: AtomicU32,
}

impl LazyDecoder {
    /// Decoder produced by `loader` on first use
    ///
    /// A failed load is retried by the next caller.
    pub fn new<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn Decoder>, DecoderError>> + Send + 'static,
    {
        Self {
            loader: Box::new(move || loader().boxed()),
            cell: OnceCell::new(),
            load_attempts: AtomicU32::new(0),
        }
    }

    /// Already-loaded decoder
    pub fn ready(decoder: Arc<dyn Decoder>) -> Self {
        Self {
            loader: Box::new(|| {
                futures::future::ready(Err(DecoderError::Unavailable(
                    "preloaded decoder has no loader".to_string(),
                )))
                .boxed()
            }),
            cell: OnceCell::new_with(Some(decoder)),
            load_attempts: AtomicU32::new(0),
        }
    }

    /// QR decoder, loaded on first use
    pub fn qr() -> Self {
        Self::new(|| async {
            tracing::info!("QR decoder loaded");
            Ok(Arc::new(QrDecoder::new()) as Arc<dyn Decoder>)
        })
    }

    /// Process-wide QR decoder
    pub fn shared() -> Arc<LazyDecoder> {
        SHARED.get_or_init(|| Arc::new(Self::qr())).clone()
    }

    /// Get the decoder, loading it if needed
    pub async fn get(&self) -> Result<Arc<dyn Decoder>, DecoderError> {
        self.cell
            .get_or_try_init(|| {
                let attempt = self.load_attempts.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!(attempt, "Loading decoder");
                (self.loader)()
            })
            .await
            .cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    /// Number of load attempts so far
    pub fn load_attempts(&self) -> u32 {
        self.load_attempts.load(Ordering::SeqCst)
    }
}
