//! Layout engine interface
//!
//! The subtitle layout/rasterization engine (libass) is an external
//! collaborator. [`LibraryWrapper`] is the seam the renderer session talks
//! through; the real FFI implementation lives in [`libass`] behind the
//! `libass` feature, and tests substitute recording mocks.
//!
//! Handles are opaque and singly owned by the session worker. The engine's
//! linked layer chain never crosses this boundary: `render_frame`
//! materializes it into a flat [`LayerList`] before returning.

#[cfg(feature = "libass")]
pub mod libass;

use std::path::Path;
use std::sync::Arc;

use crate::fontconfig::FontProvider;
use crate::layer::LayerList;

/// Opaque handle to an engine library instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LibraryHandle(pub(crate) usize);

/// Opaque handle to an engine renderer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererHandle(pub(crate) usize);

/// Opaque handle to a loaded subtitle track.
///
/// At most one is live per renderer session; loading a new track frees the
/// previous one first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackHandle(pub(crate) usize);

impl LibraryHandle {
    /// Wrap a raw engine pointer value. Intended for wrapper implementations.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

impl RendererHandle {
    /// Wrap a raw engine pointer value. Intended for wrapper implementations.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

impl TrackHandle {
    /// Wrap a raw engine pointer value. Intended for wrapper implementations.
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

/// One frame rendered by the engine: the materialized layer list and the
/// engine's own change-detection verdict since its previous render call.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// Flattened glyph layers, compositing order preserved
    pub layers: LayerList,
    /// False when the frame is visually identical to the last one rendered
    pub changed: bool,
}

/// Sink for the engine's message callback: raw engine level plus text.
pub type EngineLogSink = Arc<dyn Fn(i32, &str) + Send + Sync>;

/// Interface to the layout engine.
///
/// All methods are invoked from the session's worker thread only, which
/// serializes access to the engine's non-thread-safe API. Process-wide
/// handle lifecycle calls (library/renderer init and done) additionally take
/// a global lock inside the implementation.
pub trait LibraryWrapper: Send {
    /// Initialize an engine library instance.
    fn library_init(&mut self) -> Option<LibraryHandle>;

    /// Destroy an engine library instance.
    fn library_done(&mut self, library: LibraryHandle);

    /// Install a message callback routing engine logs to `sink`.
    fn set_log_callback(&mut self, library: LibraryHandle, sink: EngineLogSink);

    /// Initialize a renderer for `library`.
    fn renderer_init(&mut self, library: LibraryHandle) -> Option<RendererHandle>;

    /// Destroy a renderer instance.
    fn renderer_done(&mut self, renderer: RendererHandle);

    /// Set the renderer's pixel frame size.
    fn set_frame_size(&mut self, renderer: RendererHandle, width: i32, height: i32);

    /// Enable or disable extraction of fonts embedded in tracks.
    fn set_extract_fonts(&mut self, library: LibraryHandle, extract: bool);

    /// Configure font provider, fontconfig file and fallback font/family.
    fn set_fonts(
        &mut self,
        renderer: RendererHandle,
        provider: FontProvider,
        config_path: Option<&Path>,
        default_font: Option<&str>,
        default_family: Option<&str>,
    );

    /// Parse ASS/SSA text into a track. `None` on parse failure.
    fn read_track(&mut self, library: LibraryHandle, content: &str) -> Option<TrackHandle>;

    /// Release a track.
    fn free_track(&mut self, track: TrackHandle);

    /// Render the track at `offset_ms`. `None` when nothing is visible.
    fn render_frame(
        &mut self,
        renderer: RendererHandle,
        track: &mut TrackHandle,
        offset_ms: i64,
    ) -> Option<RenderResult>;
}
