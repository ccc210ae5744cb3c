use thiserror::Error;

/// Failures the pipeline can report. Extractor misses are never errors
/// (extractors return `None`); only real I/O against the OCR capability
/// or the registry ends up here.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The external OCR capability could not produce text. Recoverable
    /// by re-queuing the item.
    #[error("OCR failed: {0}")]
    Ocr(String),

    /// The registry rejected a create/update/append. Recoverable by
    /// retrying that single item.
    #[error("registry write failed: {0}")]
    Registry(String),

    /// An operation referenced a queue item id that does not exist.
    #[error("unknown queue item: {0}")]
    UnknownItem(String),
}
