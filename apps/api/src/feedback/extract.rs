//! Text Extractor — turns PDF bytes into `ExtractedText`.
//!
//! Parsers report their outcome through an `ExtractionSink` instead of a
//! return value (`data_ready` / `data_error`). `extract_text` creates the sink
//! before asking the parser to load, then awaits the first signal, so the
//! rest of the pipeline reads as straight-line async code.
//!
//! The sink settles at most once. Any signal after the first is dropped,
//! whichever sink clone it arrives on.
//!
//! The extraction timeout does not cancel the parser. A `PdfExtractParser`
//! job that outlives it keeps running on the blocking pool, and its late
//! `data_ready` is dropped because the receiver is gone.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::errors::AppError;

/// Appended after every page's text.
pub const PAGE_SEPARATOR: &str = "\n";

/// Concatenated page text, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText(String);

impl ExtractedText {
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut text = String::new();
        for page in pages {
            text.push_str(page.as_ref());
            text.push_str(PAGE_SEPARATOR);
        }
        Self(text)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when nothing but whitespace was extracted.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug)]
pub enum ParserEvent {
    DataReady(Vec<String>),
    DataError(String),
}

/// Receiving end handed to a parser. Cheap to clone; all clones share one slot.
#[derive(Clone)]
pub struct ExtractionSink {
    slot: Arc<Mutex<Option<oneshot::Sender<ParserEvent>>>>,
}

impl ExtractionSink {
    fn channel() -> (Self, oneshot::Receiver<ParserEvent>) {
        let (tx, rx) = oneshot::channel();
        let sink = Self {
            slot: Arc::new(Mutex::new(Some(tx))),
        };
        (sink, rx)
    }

    pub fn data_ready(&self, pages: Vec<String>) -> bool {
        self.emit(ParserEvent::DataReady(pages))
    }

    pub fn data_error(&self, message: impl Into<String>) -> bool {
        self.emit(ParserEvent::DataError(message.into()))
    }

    /// Delivers `event` if nothing has settled yet. Returns whether it was delivered.
    pub fn emit(&self, event: ParserEvent) -> bool {
        let sender = match self.slot.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => tx.send(event).is_ok(),
            None => {
                let kind = match event {
                    ParserEvent::DataReady(_) => "data_ready",
                    ParserEvent::DataError(_) => "data_error",
                };
                warn!(kind, "Ignoring PDF parser signal after settlement");
                false
            }
        }
    }
}

/// An event-driven PDF parser. `load` must not block; results go to `sink`.
pub trait PdfParser: Send + Sync {
    fn load(&self, bytes: Bytes, sink: ExtractionSink);
}

/// Default parser backed by `pdf-extract`, run on the blocking pool.
pub struct PdfExtractParser;

impl PdfParser for PdfExtractParser {
    fn load(&self, bytes: Bytes, sink: ExtractionSink) {
        tokio::task::spawn_blocking(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
            }));
            match outcome {
                Ok(Ok(pages)) => sink.data_ready(pages),
                Ok(Err(e)) => sink.data_error(e.to_string()),
                Err(payload) => sink.data_error(panic_message(payload.as_ref())),
            };
        });
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("PDF parser panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("PDF parser panicked: {s}")
    } else {
        "PDF parser panicked".to_string()
    }
}

/// Loads `bytes` through `parser` and waits for its single outcome.
pub async fn extract_text(
    parser: &dyn PdfParser,
    bytes: Bytes,
    timeout: Duration,
) -> Result<ExtractedText, AppError> {
    let (sink, settled) = ExtractionSink::channel();
    parser.load(bytes, sink);

    match tokio::time::timeout(timeout, settled).await {
        Err(_) => Err(AppError::Timeout {
            stage: "PDF extraction",
            after: timeout,
        }),
        // every sink clone was dropped without a signal
        Ok(Err(_)) => Err(AppError::Parse(
            "PDF parser stopped without reporting a result".to_string(),
        )),
        Ok(Ok(ParserEvent::DataError(message))) => Err(AppError::Parse(message)),
        Ok(Ok(ParserEvent::DataReady(pages))) => {
            debug!("Extracted {} page(s) of text", pages.len());
            Ok(ExtractedText::from_pages(pages))
        }
    }
}
