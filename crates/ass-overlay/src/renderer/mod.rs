//! Renderer session: public handle and worker thread
//!
//! [`AssSubtitlesRenderer`] owns a dedicated serial worker that holds the
//! engine handles, the loaded track, the canvas geometry and the current time
//! offset. Every operation is submitted as a command and executed FIFO on the
//! worker; nothing blocks the calling thread. Results reach consumers only
//! through the latest-value frame stream.

mod session;

use std::sync::{mpsc, Arc};
use std::thread;

use crate::fontconfig::FontConfig;
use crate::layer::ProcessedImage;
use crate::library::LibraryWrapper;
use crate::loader::ContentsLoader;
use crate::logging::{LogLevel, Logger};
use crate::pipeline::ImagePipeline;
use crate::stream::{FrameSubject, FrameSubscription, FrameValue};
use crate::utils::geometry::Size;

use session::{Flow, Session};

/// Outcome of one frame request.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameResult {
    /// A new processed image was rendered and published.
    Loaded(ProcessedImage),
    /// The engine reported no visual change; nothing was republished.
    Unchanged,
    /// Nothing is visible at this offset; an empty frame was published.
    None,
}

type LoadFrameResponder = Box<dyn FnOnce(FrameResult, FrameValue) + Send>;

pub(crate) enum Command {
    LoadTrack { content: String, reload: bool },
    FreeTrack,
    SetCanvas { size: Size, scale: f64 },
    SetTimeOffset(f64),
    ReloadFrame,
    LoadFrame { offset: f64, respond: LoadFrameResponder },
    Shutdown,
}

/// Subtitle overlay renderer session.
///
/// Construction spawns the worker and initializes the engine on it; dropping
/// the session frees the track, renderer and library in that order and closes
/// the frame stream. An engine that fails to initialize leaves the session
/// alive but inert: calls become verbose-logged no-ops.
pub struct AssSubtitlesRenderer {
    commands: mpsc::Sender<Command>,
    subject: Arc<FrameSubject>,
    logger: Logger,
    worker: Option<thread::JoinHandle<()>>,
}

impl AssSubtitlesRenderer {
    /// Create a session over the system libass with the default pipeline.
    #[cfg(feature = "libass")]
    pub fn new(font_config: FontConfig) -> Self {
        Self::with_parts(
            Box::new(crate::library::libass::LibassWrapper::new()),
            crate::pipeline::default_pipeline(),
            font_config,
            Logger::default(),
        )
    }

    /// Create a session from explicit parts. The seam tests and embedders
    /// use to substitute engine wrappers, pipelines and log sinks.
    pub fn with_parts(
        wrapper: Box<dyn LibraryWrapper>,
        pipeline: Box<dyn ImagePipeline>,
        font_config: FontConfig,
        logger: Logger,
    ) -> Self {
        let (commands, receiver) = mpsc::channel();
        let subject = Arc::new(FrameSubject::new());

        let worker_subject = Arc::clone(&subject);
        let worker_logger = logger.clone();
        let worker = thread::Builder::new()
            .name("ass-overlay-worker".into())
            .spawn(move || {
                let mut session = Session::new(
                    wrapper,
                    pipeline,
                    font_config,
                    worker_logger,
                    worker_subject,
                );
                session.configure();
                while let Ok(command) = receiver.recv() {
                    if session.handle(command) == Flow::Shutdown {
                        break;
                    }
                }
                session.teardown();
            })
            .expect("failed to spawn renderer worker thread");

        Self {
            commands,
            subject,
            logger,
            worker: Some(worker),
        }
    }

    /// Parse `content` into a new track, freeing any previous one.
    ///
    /// Resets the time offset; the next `set_time_offset` renders the first
    /// frame of the new track.
    pub fn load_track(&self, content: impl Into<String>) {
        self.submit(Command::LoadTrack {
            content: content.into(),
            reload: false,
        });
    }

    /// Swap tracks and immediately re-render at the last-known offset, so a
    /// visible subtitle survives e.g. a language change without a blank
    /// frame.
    pub fn reload_track(&self, content: impl Into<String>) {
        self.submit(Command::LoadTrack {
            content: content.into(),
            reload: true,
        });
    }

    /// Like [`AssSubtitlesRenderer::load_track`], fetching the content from a
    /// path or URL on a background thread. A failed fetch logs the error and
    /// leaves the current track untouched.
    pub fn load_track_url(&self, url: impl Into<String>) {
        self.spawn_fetch(url.into(), false);
    }

    /// Like [`AssSubtitlesRenderer::reload_track`] for a path or URL source.
    pub fn reload_track_url(&self, url: impl Into<String>) {
        self.spawn_fetch(url.into(), true);
    }

    /// Release the current track, reset the offset to zero and clear the
    /// published frame. No-op when no track is loaded.
    pub fn free_track(&self) {
        self.submit(Command::FreeTrack);
    }

    /// Update canvas geometry: `size` in logical units, `scale` in device
    /// pixels per logical unit. Identical values are a no-op; a change
    /// re-renders the current frame against the new geometry immediately.
    pub fn set_canvas(&self, size: Size, scale: f64) {
        self.submit(Command::SetCanvas { size, scale });
    }

    /// Record `offset` (seconds) as current and render the frame there.
    ///
    /// The playback hot path: cheap to call, never blocks, processed FIFO.
    /// Superseded offsets are not coalesced; rate-limit on the calling side
    /// if submission outpaces rendering.
    pub fn set_time_offset(&self, offset: f64) {
        self.submit(Command::SetTimeOffset(offset));
    }

    /// Re-render at the current offset, e.g. to refresh after an external
    /// change without moving in time.
    pub fn reload_frame(&self) {
        self.submit(Command::ReloadFrame);
    }

    /// Render at `offset` and deliver the published value to `callback`,
    /// invoked exactly once on the worker after processing finishes.
    pub fn load_frame(&self, offset: f64, callback: impl FnOnce(FrameValue) + Send + 'static) {
        let respond: LoadFrameResponder = Box::new(move |result, published| {
            callback(match result {
                FrameResult::Loaded(image) => Some(image),
                FrameResult::Unchanged => published,
                FrameResult::None => None,
            });
        });
        if let Err(mpsc::SendError(command)) = self.commands.send(Command::LoadFrame {
            offset,
            respond,
        }) {
            self.log_session_closed();
            // Exactly-once delivery also after shutdown.
            if let Command::LoadFrame { respond, .. } = command {
                respond(FrameResult::None, None);
            }
        }
    }

    /// Render at `offset` and block until the worker finishes, returning the
    /// same result shape asynchronous callers observe.
    pub fn load_frame_sync(&self, offset: f64) -> FrameResult {
        let (tx, rx) = mpsc::channel();
        let respond: LoadFrameResponder = Box::new(move |result, _published| {
            let _ = tx.send(result);
        });
        if self
            .commands
            .send(Command::LoadFrame { offset, respond })
            .is_err()
        {
            self.log_session_closed();
            return FrameResult::None;
        }
        rx.recv().unwrap_or(FrameResult::None)
    }

    /// Subscribe to the current-frame stream.
    ///
    /// Latest-value semantics: an unconsumed frame is overwritten by a newer
    /// one, consecutive empty frames are coalesced, and the current value is
    /// delivered first. Values arrive on whichever thread the subscriber
    /// receives on.
    pub fn frames(&self) -> FrameSubscription {
        self.subject.subscribe()
    }

    /// The most recently published frame, if any.
    pub fn current_frame(&self) -> FrameValue {
        self.subject.latest()
    }

    fn spawn_fetch(&self, url: String, reload: bool) {
        let sender = self.commands.clone();
        let logger = self.logger.clone();
        thread::spawn(move || match ContentsLoader::new().load(&url) {
            Ok(content) => {
                let _ = sender.send(Command::LoadTrack { content, reload });
            }
            Err(err) => {
                // Track state stays as it was; the caller retries by loading
                // again.
                logger.log(
                    &format!("Failed loading track contents - {err}"),
                    LogLevel::Fatal,
                );
            }
        });
    }

    fn submit(&self, command: Command) {
        if self.commands.send(command).is_err() {
            self.log_session_closed();
        }
    }

    fn log_session_closed(&self) {
        self.logger
            .log("Renderer session has shut down", LogLevel::Verbose);
    }
}

impl Drop for AssSubtitlesRenderer {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
