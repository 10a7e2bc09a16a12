//! Error types for the overlay renderer

use thiserror::Error;

/// Overlay rendering error types
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Font configuration I/O failed
    #[error("Font configuration failed: {0}")]
    FontConfig(#[from] std::io::Error),

    /// Track content could not be fetched from its source
    #[error("Track content fetch failed: {0}")]
    ContentFetch(String),

    /// Track source URL scheme is not supported by this build
    #[error("Unsupported track source: {0}")]
    UnsupportedSource(String),
}
