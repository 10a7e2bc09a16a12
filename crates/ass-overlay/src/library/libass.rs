//! Direct FFI bindings to a system libass
//!
//! Requires libass to be installed:
//! - macOS: brew install libass
//! - Ubuntu/Debian: apt-get install libass-dev
//! - Fedora: dnf install libass-devel

#![allow(unsafe_code)] // Required for FFI

use std::ffi::{c_void, CStr, CString};
use std::os::raw::{c_char, c_int, c_long};
use std::path::Path;
use std::ptr;
use std::sync::Mutex;

use smallvec::SmallVec;

use crate::fontconfig::FontProvider;
use crate::layer::{LayerList, RawLayer};
use crate::library::{
    EngineLogSink, LibraryHandle, LibraryWrapper, RenderResult, RendererHandle, TrackHandle,
};

#[repr(C)]
struct ASS_Library {
    _private: [u8; 0],
}

#[repr(C)]
struct ASS_Renderer {
    _private: [u8; 0],
}

#[repr(C)]
struct ASS_Track {
    _private: [u8; 0],
}

#[repr(C)]
struct ASS_Image {
    w: c_int,
    h: c_int,
    stride: c_int,
    bitmap: *mut u8,
    color: u32,
    dst_x: c_int,
    dst_y: c_int,
    next: *mut ASS_Image,
    type_: c_int,
}

type MessageCallback =
    unsafe extern "C" fn(level: c_int, fmt: *const c_char, args: *mut c_void, data: *mut c_void);

#[link(name = "ass")]
extern "C" {
    fn ass_library_init() -> *mut ASS_Library;
    fn ass_library_done(library: *mut ASS_Library);
    fn ass_set_message_cb(
        library: *mut ASS_Library,
        msg_cb: Option<MessageCallback>,
        data: *mut c_void,
    );
    fn ass_set_extract_fonts(library: *mut ASS_Library, extract: c_int);

    fn ass_renderer_init(library: *mut ASS_Library) -> *mut ASS_Renderer;
    fn ass_renderer_done(renderer: *mut ASS_Renderer);
    fn ass_set_frame_size(renderer: *mut ASS_Renderer, w: c_int, h: c_int);
    fn ass_set_fonts(
        renderer: *mut ASS_Renderer,
        default_font: *const c_char,
        default_family: *const c_char,
        dfp: c_int,
        config: *const c_char,
        update: c_int,
    );

    fn ass_read_memory(
        library: *mut ASS_Library,
        buf: *mut c_char,
        bufsize: usize,
        codepage: *const c_char,
    ) -> *mut ASS_Track;
    fn ass_free_track(track: *mut ASS_Track);

    fn ass_render_frame(
        renderer: *mut ASS_Renderer,
        track: *mut ASS_Track,
        now: c_long,
        detect_change: *mut c_int,
    ) -> *mut ASS_Image;
}

/// libass does not document concurrent handle lifecycle as safe; serialize
/// process-wide init/done calls. Per-frame rendering is already serialized by
/// the session worker and stays outside this lock.
static LIFECYCLE_LOCK: Mutex<()> = Mutex::new(());

unsafe extern "C" fn message_trampoline(
    level: c_int,
    fmt: *const c_char,
    _args: *mut c_void,
    data: *mut c_void,
) {
    if fmt.is_null() || data.is_null() {
        return;
    }
    // The va_list stays unformatted; stable Rust has no portable va_list and
    // the format string alone is enough for diagnostics.
    let sink = &*(data as *const EngineLogSink);
    if let Ok(message) = CStr::from_ptr(fmt).to_str() {
        sink(level, message);
    }
}

/// [`LibraryWrapper`] implementation over a system libass.
#[derive(Default)]
pub struct LibassWrapper {
    // Keeps the message callback sink alive while installed.
    sink: Option<Box<EngineLogSink>>,
}

impl LibassWrapper {
    /// Create a wrapper. No engine state is touched until `library_init`.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LibraryWrapper for LibassWrapper {
    fn library_init(&mut self) -> Option<LibraryHandle> {
        let _guard = LIFECYCLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let ptr = unsafe { ass_library_init() };
        if ptr.is_null() {
            None
        } else {
            Some(LibraryHandle::from_raw(ptr as usize))
        }
    }

    fn library_done(&mut self, library: LibraryHandle) {
        let _guard = LIFECYCLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            // Detach the callback before the sink is dropped with `self`.
            ass_set_message_cb(library.0 as *mut ASS_Library, None, ptr::null_mut());
            ass_library_done(library.0 as *mut ASS_Library);
        }
        self.sink = None;
    }

    fn set_log_callback(&mut self, library: LibraryHandle, sink: EngineLogSink) {
        let boxed = Box::new(sink);
        let data = &*boxed as *const EngineLogSink as *mut c_void;
        self.sink = Some(boxed);
        unsafe {
            ass_set_message_cb(library.0 as *mut ASS_Library, Some(message_trampoline), data);
        }
    }

    fn renderer_init(&mut self, library: LibraryHandle) -> Option<RendererHandle> {
        let _guard = LIFECYCLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let ptr = unsafe { ass_renderer_init(library.0 as *mut ASS_Library) };
        if ptr.is_null() {
            None
        } else {
            Some(RendererHandle::from_raw(ptr as usize))
        }
    }

    fn renderer_done(&mut self, renderer: RendererHandle) {
        let _guard = LIFECYCLE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        unsafe {
            ass_renderer_done(renderer.0 as *mut ASS_Renderer);
        }
    }

    fn set_frame_size(&mut self, renderer: RendererHandle, width: i32, height: i32) {
        unsafe {
            ass_set_frame_size(renderer.0 as *mut ASS_Renderer, width, height);
        }
    }

    fn set_extract_fonts(&mut self, library: LibraryHandle, extract: bool) {
        unsafe {
            ass_set_extract_fonts(library.0 as *mut ASS_Library, i32::from(extract));
        }
    }

    fn set_fonts(
        &mut self,
        renderer: RendererHandle,
        provider: FontProvider,
        config_path: Option<&Path>,
        default_font: Option<&str>,
        default_family: Option<&str>,
    ) {
        let font = default_font.and_then(|s| CString::new(s).ok());
        let family = default_family.and_then(|s| CString::new(s).ok());
        let config = config_path
            .and_then(|p| p.to_str())
            .and_then(|s| CString::new(s).ok());

        unsafe {
            ass_set_fonts(
                renderer.0 as *mut ASS_Renderer,
                font.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                family.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                provider.engine_value(),
                config.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                1,
            );
        }
    }

    fn read_track(&mut self, library: LibraryHandle, content: &str) -> Option<TrackHandle> {
        let mut buf = content.as_bytes().to_vec();
        let ptr = unsafe {
            ass_read_memory(
                library.0 as *mut ASS_Library,
                buf.as_mut_ptr() as *mut c_char,
                buf.len(),
                ptr::null(),
            )
        };
        if ptr.is_null() {
            None
        } else {
            Some(TrackHandle::from_raw(ptr as usize))
        }
    }

    fn free_track(&mut self, track: TrackHandle) {
        unsafe {
            ass_free_track(track.0 as *mut ASS_Track);
        }
    }

    fn render_frame(
        &mut self,
        renderer: RendererHandle,
        track: &mut TrackHandle,
        offset_ms: i64,
    ) -> Option<RenderResult> {
        let mut changed: c_int = 0;
        let head = unsafe {
            ass_render_frame(
                renderer.0 as *mut ASS_Renderer,
                track.0 as *mut ASS_Track,
                offset_ms as c_long,
                &mut changed,
            )
        };
        if head.is_null() {
            return None;
        }

        Some(RenderResult {
            layers: unsafe { materialize_layers(head) },
            changed: changed != 0,
        })
    }
}

/// Copy the engine's linked layer chain into owned layers, in encounter
/// order. The chain is only valid until the next engine call, so this happens
/// immediately after `ass_render_frame`.
unsafe fn materialize_layers(head: *const ASS_Image) -> LayerList {
    let mut layers = SmallVec::new();
    let mut current = head;

    while !current.is_null() {
        let image = &*current;
        let width = image.w.max(0) as u32;
        let height = image.h.max(0) as u32;
        let stride = (image.stride.max(0) as u32).max(width);

        if width == 0 || height == 0 || image.bitmap.is_null() {
            current = image.next;
            continue;
        }
        // Rows are `stride` apart; the last row has only `width` live bytes.
        let len = (height as usize - 1) * stride as usize + width as usize;
        let bitmap = std::slice::from_raw_parts(image.bitmap, len).to_vec();

        layers.push(RawLayer {
            width,
            height,
            stride,
            dst_x: image.dst_x,
            dst_y: image.dst_y,
            color: image.color,
            bitmap,
        });
        current = image.next;
    }

    layers
}
