//! Error taxonomy for the notes core.

use thiserror::Error;

/// Failures raised by the notes storage layer.
///
/// Recoverable by design: callers surface these as a server error (or
/// an error frame on the live-update stream) and keep serving.
#[derive(Debug, Error)]
pub enum NotesError {
    /// The storage location exists but could not be read or written.
    #[error("notes storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
}
