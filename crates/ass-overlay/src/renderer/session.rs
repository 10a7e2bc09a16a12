//! Worker-side renderer state machine
//!
//! Everything that touches engine handles lives here and runs on the
//! session's dedicated worker thread, in command order. The public handle
//! [`crate::renderer::AssSubtitlesRenderer`] only ever submits commands.

use std::sync::Arc;

use crate::fontconfig::FontConfig;
use crate::layer::bounding_rect;
use crate::library::{LibraryHandle, LibraryWrapper, RendererHandle, TrackHandle};
use crate::logging::{LogLevel, Logger};
use crate::pipeline::ImagePipeline;
use crate::renderer::{Command, FrameResult};
use crate::stream::FrameSubject;
use crate::utils::geometry::Size;

/// Worker loop continuation.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Shutdown,
}

pub(crate) struct Session {
    wrapper: Box<dyn LibraryWrapper>,
    pipeline: Box<dyn ImagePipeline>,
    font_config: FontConfig,
    logger: Logger,
    subject: Arc<FrameSubject>,

    library: Option<LibraryHandle>,
    renderer: Option<RendererHandle>,
    track: Option<TrackHandle>,

    canvas_size: Size,
    canvas_scale: f64,
    offset: f64,
}

impl Session {
    pub(crate) fn new(
        wrapper: Box<dyn LibraryWrapper>,
        pipeline: Box<dyn ImagePipeline>,
        font_config: FontConfig,
        logger: Logger,
        subject: Arc<FrameSubject>,
    ) -> Self {
        Self {
            wrapper,
            pipeline,
            font_config,
            logger,
            subject,
            library: None,
            renderer: None,
            track: None,
            canvas_size: Size::ZERO,
            canvas_scale: 1.0,
            offset: 0.0,
        }
    }

    /// Bring the engine up. Failures leave the session inert: every later
    /// command degrades to a logged no-op instead of panicking.
    pub(crate) fn configure(&mut self) {
        self.library = self.wrapper.library_init();
        let Some(library) = self.library else {
            self.logger
                .log("Library could not be initialized", LogLevel::Fatal);
            return;
        };

        let engine_logger = self.logger.clone();
        self.wrapper.set_log_callback(
            library,
            Arc::new(move |level, message| engine_logger.log_engine(level, message)),
        );

        self.renderer = self.wrapper.renderer_init(library);
        let Some(renderer) = self.renderer else {
            self.logger
                .log("Renderer could not be initialized", LogLevel::Fatal);
            return;
        };

        // Font setup failure degrades to the engine's internal fallback fonts.
        if let Err(err) = self
            .font_config
            .configure(&mut *self.wrapper, library, renderer)
        {
            self.logger
                .log(&format!("Failed settings fonts - {err}"), LogLevel::Fatal);
        }

        let (width, height) = self.pixel_frame_size();
        self.wrapper.set_frame_size(renderer, width, height);
    }

    pub(crate) fn handle(&mut self, command: Command) -> Flow {
        match command {
            Command::LoadTrack { content, reload } => self.load_track(&content, reload),
            Command::FreeTrack => self.free_track(false),
            Command::SetCanvas { size, scale } => self.set_canvas(size, scale),
            Command::SetTimeOffset(offset) => {
                self.offset = offset;
                self.render_and_publish(offset, false);
            }
            Command::ReloadFrame => {
                self.render_and_publish(self.offset, false);
            }
            Command::LoadFrame { offset, respond } => {
                let result = self.render_and_publish(offset, false);
                respond(result, self.subject.latest());
            }
            Command::Shutdown => return Flow::Shutdown,
        }
        Flow::Continue
    }

    /// Release resources in reverse acquisition order: track, renderer,
    /// library. The engine's renderer references the library instance.
    pub(crate) fn teardown(&mut self) {
        if let Some(track) = self.track.take() {
            self.wrapper.free_track(track);
        }
        if let Some(renderer) = self.renderer.take() {
            self.wrapper.renderer_done(renderer);
        }
        if let Some(library) = self.library.take() {
            self.wrapper.library_done(library);
        }
        self.subject.close();
    }

    fn load_track(&mut self, content: &str, reload: bool) {
        let Some(library) = self.library else {
            self.logger.log(
                "Track cannot be loaded since library has not been initialized",
                LogLevel::Verbose,
            );
            return;
        };

        let offset = self.offset;
        self.free_track(reload);
        self.track = self.wrapper.read_track(library, content);
        if self.track.is_none() {
            // The engine already reported details through its log callback.
            self.logger.log("Track could not be parsed", LogLevel::Verbose);
            return;
        }
        if reload {
            // Keep the subtitle visible across track swaps: re-render at the
            // offset the previous track was showing.
            self.offset = offset;
            self.render_and_publish(offset, true);
        }
    }

    fn free_track(&mut self, keep_offset: bool) {
        let Some(track) = self.track.take() else {
            return;
        };
        self.wrapper.free_track(track);
        if !keep_offset {
            self.offset = 0.0;
            // Reload paths keep the published frame alive so a track swap
            // never flashes an empty frame mid-swap.
            self.subject.publish(None);
        }
    }

    fn set_canvas(&mut self, size: Size, scale: f64) {
        if size == self.canvas_size && scale == self.canvas_scale {
            return;
        }
        let old_pixel = self.pixel_frame_size();
        self.canvas_size = size;
        self.canvas_scale = scale;

        let Some(renderer) = self.renderer else {
            self.logger.log(
                "Can't set canvas size since renderer has not been initialized",
                LogLevel::Verbose,
            );
            return;
        };
        let new_pixel = self.pixel_frame_size();
        if new_pixel != old_pixel {
            self.wrapper.set_frame_size(renderer, new_pixel.0, new_pixel.1);
        }
        // Geometry changed: republish even when the engine reports the frame
        // unchanged, so the visible subtitle matches the new canvas at once.
        self.render_and_publish(self.offset, true);
    }

    fn render_and_publish(&mut self, offset: f64, force: bool) -> FrameResult {
        let result = self.frame_at(offset, force);
        match &result {
            FrameResult::Unchanged => {}
            FrameResult::None => self.subject.publish(None),
            FrameResult::Loaded(image) => self.subject.publish(Some(image.clone())),
        }
        result
    }

    fn frame_at(&mut self, offset: f64, force: bool) -> FrameResult {
        let Some(renderer) = self.renderer else {
            self.logger.log(
                "Can't render frame since renderer has not been initialized",
                LogLevel::Verbose,
            );
            return FrameResult::None;
        };
        let Some(track) = self.track.as_mut() else {
            self.logger.log(
                "Can't render frame since track has not been loaded",
                LogLevel::Verbose,
            );
            return FrameResult::None;
        };
        if (self.canvas_size * self.canvas_scale).is_empty() {
            self.logger.log(
                "Can't render frame since canvas size has not been set",
                LogLevel::Verbose,
            );
            return FrameResult::None;
        }

        let offset_ms = (offset * 1000.0) as i64;
        let Some(result) = self.wrapper.render_frame(renderer, track, offset_ms) else {
            return FrameResult::None;
        };
        if !result.changed && !force {
            return FrameResult::Unchanged;
        }

        let bounds = bounding_rect(&result.layers);
        let Some(image) = self.pipeline.process(&result.layers, bounds) else {
            return FrameResult::None;
        };

        // Device pixels to logical units for display positioning.
        let rect = (image.rect / self.canvas_scale).integral();
        FrameResult::Loaded(image.with_rect(rect))
    }

    fn pixel_frame_size(&self) -> (i32, i32) {
        (
            (self.canvas_size.width * self.canvas_scale).floor() as i32,
            (self.canvas_size.height * self.canvas_scale).floor() as i32,
        )
    }
}
