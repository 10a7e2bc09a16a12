//! End-to-end renderer session tests against a scripted engine wrapper.
//!
//! The mock engine records every call and renders a fixed 4x4 glyph at
//! (10, 10) whenever the requested offset falls inside a scripted dialogue
//! window. `load_frame_sync` doubles as the FIFO barrier; dropping the
//! session joins the worker, so post-drop inspection sees the full call log.

use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Arc, Mutex};
use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use ass_overlay::library::{
    EngineLogSink, LibraryHandle, LibraryWrapper, RenderResult, RendererHandle, TrackHandle,
};
use ass_overlay::{
    AssSubtitlesRenderer, BlendPipeline, FontConfig, FontProvider, FrameResult, LogOutput, Logger,
    RawLayer, Rect, Size,
};

#[derive(Default)]
struct EngineState {
    calls: Vec<String>,
    frame_sizes: Vec<(i32, i32)>,
    render_offsets: Vec<i64>,
    /// Half-open visibility window in track milliseconds.
    dialogue_window_ms: Option<(i64, i64)>,
    fail_library: bool,
    fail_renderer: bool,
    fail_parse: bool,
    // True while consecutive renders stay inside the window, i.e. the next
    // render of the same glyph reports changed = false.
    rendered_in_window: bool,
    next_handle: usize,
}

impl EngineState {
    fn handle(&mut self) -> usize {
        self.next_handle += 1;
        self.next_handle
    }
}

struct MockWrapper {
    state: Arc<Mutex<EngineState>>,
    // Signals entry into the second read_track and blocks it until released,
    // so a test can observe the stream while a track swap is in flight.
    hold_second_read: Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
}

fn glyph_layer() -> RawLayer {
    RawLayer {
        width: 4,
        height: 4,
        stride: 4,
        dst_x: 10,
        dst_y: 10,
        color: 0xFF_FF_FF_00,
        bitmap: vec![255; 16],
    }
}

impl LibraryWrapper for MockWrapper {
    fn library_init(&mut self) -> Option<LibraryHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("library_init".into());
        if state.fail_library {
            return None;
        }
        let raw = state.handle();
        Some(LibraryHandle::from_raw(raw))
    }

    fn library_done(&mut self, _: LibraryHandle) {
        self.state.lock().unwrap().calls.push("library_done".into());
    }

    fn set_log_callback(&mut self, _: LibraryHandle, _: EngineLogSink) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push("set_log_callback".into());
    }

    fn renderer_init(&mut self, _: LibraryHandle) -> Option<RendererHandle> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("renderer_init".into());
        if state.fail_renderer {
            return None;
        }
        let raw = state.handle();
        Some(RendererHandle::from_raw(raw))
    }

    fn renderer_done(&mut self, _: RendererHandle) {
        self.state.lock().unwrap().calls.push("renderer_done".into());
    }

    fn set_frame_size(&mut self, _: RendererHandle, width: i32, height: i32) {
        let mut state = self.state.lock().unwrap();
        state.calls.push("set_frame_size".into());
        state.frame_sizes.push((width, height));
        state.rendered_in_window = false;
    }

    fn set_extract_fonts(&mut self, _: LibraryHandle, _: bool) {
        self.state
            .lock()
            .unwrap()
            .calls
            .push("set_extract_fonts".into());
    }

    fn set_fonts(
        &mut self,
        _: RendererHandle,
        _: FontProvider,
        _: Option<&Path>,
        _: Option<&str>,
        _: Option<&str>,
    ) {
        self.state.lock().unwrap().calls.push("set_fonts".into());
    }

    fn read_track(&mut self, _: LibraryHandle, _: &str) -> Option<TrackHandle> {
        let (raw, reads) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push("read_track".into());
            state.rendered_in_window = false;
            if state.fail_parse {
                return None;
            }
            let raw = state.handle();
            let reads = state.calls.iter().filter(|c| *c == "read_track").count();
            (raw, reads)
        };
        if reads == 2 {
            if let Some((entered, release)) = &self.hold_second_read {
                let _ = entered.send(());
                let _ = release.recv();
            }
        }
        Some(TrackHandle::from_raw(raw))
    }

    fn free_track(&mut self, _: TrackHandle) {
        let mut state = self.state.lock().unwrap();
        state.calls.push("free_track".into());
        state.rendered_in_window = false;
    }

    fn render_frame(
        &mut self,
        _: RendererHandle,
        _: &mut TrackHandle,
        offset_ms: i64,
    ) -> Option<RenderResult> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("render_frame".into());
        state.render_offsets.push(offset_ms);

        let (start, end) = state.dialogue_window_ms?;
        if offset_ms < start || offset_ms >= end {
            state.rendered_in_window = false;
            return None;
        }
        let changed = !state.rendered_in_window;
        state.rendered_in_window = true;
        Some(RenderResult {
            layers: std::iter::once(glyph_layer()).collect(),
            changed,
        })
    }
}

struct Fixture {
    renderer: AssSubtitlesRenderer,
    engine: Arc<Mutex<EngineState>>,
    logs: Arc<Mutex<Vec<String>>>,
    _fonts_dir: tempfile::TempDir,
}

fn build_fixture(
    engine: Arc<Mutex<EngineState>>,
    hold_second_read: Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>,
) -> Fixture {
    let logs = Arc::new(Mutex::new(Vec::new()));
    let log_sink = Arc::clone(&logs);

    let fonts_dir = tempfile::tempdir().expect("tempdir");
    let font_config =
        FontConfig::new(fonts_dir.path().join("fonts")).fonts_cache_path(fonts_dir.path());
    let renderer = AssSubtitlesRenderer::with_parts(
        Box::new(MockWrapper {
            state: Arc::clone(&engine),
            hold_second_read,
        }),
        Box::new(BlendPipeline::new()),
        font_config,
        Logger::new(LogOutput::Custom(Arc::new(move |msg| {
            log_sink.lock().unwrap().push(msg.message);
        }))),
    );
    Fixture {
        renderer,
        engine,
        logs,
        _fonts_dir: fonts_dir,
    }
}

fn fixture_with(script: impl FnOnce(&mut EngineState)) -> Fixture {
    let engine = Arc::new(Mutex::new(EngineState::default()));
    script(&mut *engine.lock().unwrap());
    build_fixture(engine, None)
}

fn fixture_with_dialogue(start_ms: i64, end_ms: i64) -> Fixture {
    fixture_with(|state| state.dialogue_window_ms = Some((start_ms, end_ms)))
}

/// Fixture whose second `read_track` call blocks until released, plus the
/// entered-signal receiver and the release sender.
fn fixture_holding_second_read(
    start_ms: i64,
    end_ms: i64,
) -> (Fixture, mpsc::Receiver<()>, mpsc::Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let engine = Arc::new(Mutex::new(EngineState::default()));
    engine.lock().unwrap().dialogue_window_ms = Some((start_ms, end_ms));
    let fixture = build_fixture(engine, Some((entered_tx, release_rx)));
    (fixture, entered_rx, release_tx)
}

fn calls_of(engine: &Arc<Mutex<EngineState>>) -> Vec<String> {
    engine.lock().unwrap().calls.clone()
}

#[test]
fn test_configure_brings_engine_up_in_order() {
    let fixture = fixture_with(|_| {});
    let engine = Arc::clone(&fixture.engine);
    drop(fixture);

    let calls = calls_of(&engine);
    assert_eq!(
        &calls[..6],
        [
            "library_init",
            "set_log_callback",
            "renderer_init",
            "set_extract_fonts",
            "set_fonts",
            "set_frame_size",
        ]
    );
}

#[test]
fn test_teardown_releases_track_renderer_library_in_order() {
    let fixture = fixture_with(|_| {});
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.load_track("[Script Info]");
    drop(fixture);

    let calls = calls_of(&engine);
    assert_eq!(
        &calls[calls.len() - 3..],
        ["free_track", "renderer_done", "library_done"]
    );
}

#[test]
fn test_identical_canvas_sets_frame_size_once() {
    let fixture = fixture_with(|_| {});
    let engine = Arc::clone(&fixture.engine);

    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    drop(fixture);

    // One entry from engine bring-up with the zero canvas, one from the
    // first set_canvas; the repeat is dropped before reaching the engine.
    let sizes = engine.lock().unwrap().frame_sizes.clone();
    assert_eq!(sizes, vec![(0, 0), (1280, 720)]);
}

#[test]
fn test_visible_offset_loads_scaled_frame() {
    let fixture = fixture_with_dialogue(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");

    let result = fixture.renderer.load_frame_sync(2.5);

    let FrameResult::Loaded(image) = result else {
        panic!("expected a loaded frame, got {result:?}");
    };
    assert_eq!(image.width, 4);
    assert_eq!(image.height, 4);
    // Device rect (10, 10, 4, 4) rescaled to logical units at scale 2.
    assert_eq!(image.rect, Rect::new(5.0, 5.0, 2.0, 2.0));
    for pixel in image.data.chunks_exact(4) {
        assert_eq!(pixel, [255, 255, 255, 255]);
    }
    assert_eq!(fixture.renderer.current_frame(), Some(image));
}

#[test]
fn test_offset_outside_dialogue_clears_frame() {
    let fixture = fixture_with_dialogue(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");

    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));
    assert_eq!(fixture.renderer.load_frame_sync(10.0), FrameResult::None);
    assert_eq!(fixture.renderer.current_frame(), None);
}

#[test]
fn test_unchanged_frame_is_not_republished() {
    let fixture = fixture_with_dialogue(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    let frames = fixture.renderer.frames();
    let _ = frames.try_recv(); // current value

    assert_eq!(fixture.renderer.load_frame_sync(2.6), FrameResult::Unchanged);
    assert_eq!(frames.try_recv(), None);
}

#[test]
fn test_load_frame_callback_sees_published_value_when_unchanged() {
    let fixture = fixture_with_dialogue(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    let (tx, rx) = mpsc::channel();
    fixture.renderer.load_frame(2.6, move |value| {
        let _ = tx.send(value);
    });

    let value = rx
        .recv_timeout(Duration::from_secs(5))
        .expect("callback invoked");
    assert_eq!(value, fixture.renderer.current_frame());
    assert!(value.is_some());
}

#[test]
fn test_canvas_change_republishes_even_without_content_change() {
    let fixture = fixture_with_dialogue(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    let frames = fixture.renderer.frames();
    let _ = frames.try_recv();

    fixture.renderer.set_canvas(Size::new(320.0, 180.0), 2.0);

    let value = frames
        .recv_timeout(Duration::from_secs(5))
        .expect("republished frame");
    assert!(value.is_some());
}

#[test]
fn test_reload_track_rerenders_at_current_offset() {
    let fixture = fixture_with_dialogue(0, 5000);
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    fixture.renderer.reload_track("[Script Info]\n; v2");

    // The swap itself re-rendered and republished at 2.5s, so a follow-up
    // render at the same offset reports no change.
    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::Unchanged);
    assert!(fixture.renderer.current_frame().is_some());
    assert_eq!(
        engine.lock().unwrap().render_offsets,
        vec![2500, 2500, 2500]
    );
}

#[test]
fn test_loading_new_track_resets_offset() {
    let fixture = fixture_with_dialogue(0, 5000);
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    fixture.renderer.load_track("[Script Info]\n; other");
    fixture.renderer.reload_frame();
    drop(fixture);

    assert_eq!(engine.lock().unwrap().render_offsets, vec![2500, 0]);
}

#[test]
fn test_free_track_clears_published_frame() {
    let fixture = fixture_with_dialogue(0, 5000);
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    fixture.renderer.free_track();

    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::None);
    assert_eq!(fixture.renderer.current_frame(), None);
    assert!(calls_of(&engine).contains(&"free_track".to_string()));
}

#[test]
fn test_render_without_track_is_a_quiet_miss() {
    let fixture = fixture_with_dialogue(0, 5000);
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);

    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::None);
    assert!(engine.lock().unwrap().render_offsets.is_empty());
}

#[test]
fn test_render_without_canvas_is_a_quiet_miss() {
    let fixture = fixture_with_dialogue(0, 5000);
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.load_track("[Script Info]");

    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::None);
    assert!(engine.lock().unwrap().render_offsets.is_empty());
}

#[test]
fn test_failed_library_init_leaves_session_inert() {
    let fixture = fixture_with(|state| {
        state.fail_library = true;
        state.dialogue_window_ms = Some((0, 5000));
    });
    let engine = Arc::clone(&fixture.engine);

    fixture.renderer.load_track("[Script Info]");
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::None);
    assert_eq!(fixture.renderer.current_frame(), None);
    drop(fixture);

    assert_eq!(calls_of(&engine), vec!["library_init"]);
}

#[test]
fn test_failed_renderer_init_leaves_session_inert() {
    let fixture = fixture_with(|state| {
        state.fail_renderer = true;
        state.dialogue_window_ms = Some((0, 5000));
    });

    fixture.renderer.load_track("[Script Info]");
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);

    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::None);
    assert_eq!(fixture.renderer.current_frame(), None);
}

#[test]
fn test_unparseable_track_renders_nothing() {
    let fixture = fixture_with(|state| {
        state.fail_parse = true;
        state.dialogue_window_ms = Some((0, 5000));
    });
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("garbage");

    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::None);
    assert!(engine.lock().unwrap().render_offsets.is_empty());
}

#[test]
fn test_offset_seconds_become_engine_milliseconds() {
    let fixture = fixture_with_dialogue(0, 5000);
    let engine = Arc::clone(&fixture.engine);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");

    fixture.renderer.load_frame_sync(1.234);

    assert_eq!(engine.lock().unwrap().render_offsets, vec![1234]);
}

#[test]
fn test_set_time_offset_drives_published_frames() {
    let fixture = fixture_with_dialogue(1000, 2000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");

    let frames = fixture.renderer.frames();
    let _ = frames.try_recv();

    fixture.renderer.set_time_offset(1.5);
    let value = frames
        .recv_timeout(Duration::from_secs(5))
        .expect("frame published");
    assert!(value.is_some());

    fixture.renderer.set_time_offset(3.0);
    let value = frames
        .recv_timeout(Duration::from_secs(5))
        .expect("empty frame published");
    assert!(value.is_none());
}

#[test]
fn test_reload_track_never_flashes_an_empty_frame() {
    let (fixture, entered, release) = fixture_holding_second_read(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    let frames = fixture.renderer.frames();
    let _ = frames.try_recv();

    fixture.renderer.reload_track("[Script Info]\n; v2");
    entered
        .recv_timeout(Duration::from_secs(5))
        .expect("swap in flight");

    // The old track is freed and the replacement not parsed yet; the stream
    // must still hold the visible subtitle.
    assert_eq!(frames.try_recv(), None);
    assert!(fixture.renderer.current_frame().is_some());

    release.send(()).expect("release swap");
    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::Unchanged);
    assert!(fixture.renderer.current_frame().is_some());
}

#[test]
fn test_load_track_url_reaches_the_worker() {
    let fixture = fixture_with_dialogue(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "[Script Info]\nTitle: overlay\n").expect("write");
    fixture
        .renderer
        .load_track_url(format!("file://{}", file.path().display()));

    // The fetch lands on a background thread; poll until the track arrives.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match fixture.renderer.load_frame_sync(2.5) {
            FrameResult::Loaded(_) | FrameResult::Unchanged => break,
            FrameResult::None => {
                assert!(Instant::now() < deadline, "track never reached the worker");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }
    assert!(fixture.renderer.current_frame().is_some());
}

#[test]
fn test_failed_fetch_keeps_current_track() {
    let fixture = fixture_with_dialogue(0, 5000);
    fixture.renderer.set_canvas(Size::new(640.0, 360.0), 2.0);
    fixture.renderer.load_track("[Script Info]");
    assert!(matches!(
        fixture.renderer.load_frame_sync(2.5),
        FrameResult::Loaded(_)
    ));

    fixture.renderer.reload_track_url("/nonexistent/subtitles.ass");

    let deadline = Instant::now() + Duration::from_secs(5);
    while !fixture
        .logs
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains("Failed loading track contents"))
    {
        assert!(Instant::now() < deadline, "fetch failure never reported");
        std::thread::sleep(Duration::from_millis(10));
    }

    // The loaded track survives the failed fetch untouched.
    assert_eq!(fixture.renderer.load_frame_sync(2.5), FrameResult::Unchanged);
    assert!(fixture.renderer.current_frame().is_some());
}
