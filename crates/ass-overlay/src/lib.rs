//! ASS/SSA subtitle overlay rendering synchronized to video playback
//!
//! `ass-overlay` drives a libass-style layout engine from a dedicated worker
//! thread, composites the engine's per-frame glyph layers into a single
//! positioned RGBA image, and publishes results through a latest-value frame
//! stream that UI layers subscribe to.
//!
//! The layout engine itself is a collaborator behind the
//! [`library::LibraryWrapper`] seam; enable the `libass` feature to link the
//! system libass, or supply another implementation.

#![deny(unsafe_code)] // Overridden in the FFI module
#![warn(missing_docs)]

pub mod fontconfig;
pub mod layer;
pub mod library;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod renderer;
pub mod stream;
pub mod utils;

pub use fontconfig::{FontConfig, FontProvider};
pub use layer::{bounding_rect, ProcessedImage, RawLayer};
pub use logging::{LogLevel, LogMessage, LogOutput, Logger};
pub use pipeline::{BlendPipeline, ImagePipeline};
pub use renderer::{AssSubtitlesRenderer, FrameResult};
pub use stream::{FrameSubscription, FrameValue};
pub use utils::errors::OverlayError;
pub use utils::geometry::{Point, Rect, Size};

#[cfg(feature = "accelerate")]
pub use pipeline::AcceleratePipeline;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
