//! Viewport snapshots and their lock-free publication slot.
//!
//! The server thread mutates the screen buffer; a renderer on the UI
//! thread needs to draw it without sharing mutable state. After each
//! request that moved the buffer's revision, the server builds an
//! immutable snapshot of the visible viewport and swaps it into a single
//! atomic slot. Readers take a reference-counted handle to whatever is
//! latest and keep it stable for as long as they hold it.
//!
//! The snapshot carries only viewport data plus the little global state a
//! renderer needs (palette, cursor, default attributes). Snapshotting the
//! whole backing buffer would be unbounded and unnecessary.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use condrv::records::{Coord, SmallRect};

use crate::screen::ScreenBuffer;

/// Immutable view of the visible viewport at one revision.
#[derive(Clone, Debug)]
pub struct ScreenBufferSnapshot {
    pub revision: u64,
    /// Viewport rectangle in inclusive buffer coordinates.
    pub window_rect: SmallRect,
    pub buffer_size: Coord,
    pub cursor_position: Coord,
    pub cursor_visible: bool,
    /// Cursor height as a percent of the cell (1..100).
    pub cursor_size: u32,
    pub default_attributes: u16,
    pub color_table: [u32; 16],
    /// Derived from `window_rect`; `x`/`y` are the viewport width/height.
    pub viewport_size: Coord,
    /// Row-major viewport contents, `text.len() == attributes.len()
    /// == viewport width * height`.
    pub text: Vec<u16>,
    pub attributes: Vec<u16>,
}

/// Single-slot publication of the latest snapshot.
///
/// One writer swaps in a fresh immutable snapshot per revision and never
/// touches it again; any number of readers load the latest concurrently.
pub struct PublishedScreenBuffer {
    latest: ArcSwapOption<ScreenBufferSnapshot>,
}

impl PublishedScreenBuffer {
    pub fn new() -> Self {
        PublishedScreenBuffer {
            latest: ArcSwapOption::const_empty(),
        }
    }

    /// Swap in a new snapshot (release ordering).
    pub fn publish(&self, snapshot: Arc<ScreenBufferSnapshot>) {
        self.latest.store(Some(snapshot));
    }

    /// The most recently published snapshot (acquire ordering). The
    /// returned handle stays valid however long the caller keeps it.
    pub fn latest(&self) -> Option<Arc<ScreenBufferSnapshot>> {
        self.latest.load_full()
    }
}

impl Default for PublishedScreenBuffer {
    fn default() -> Self {
        PublishedScreenBuffer::new()
    }
}

/// Build an immutable snapshot of the buffer's current viewport.
pub fn make_viewport_snapshot(buffer: &ScreenBuffer) -> Arc<ScreenBufferSnapshot> {
    let window = buffer.window_rect();
    let width = window.width() as usize;
    let height = window.height() as usize;

    let mut text = vec![0u16; width * height];
    let mut attributes = vec![0u16; width * height];
    for row in 0..height {
        let origin = Coord::new(window.left, window.top + row as i16);
        let dest = &mut text[row * width..(row + 1) * width];
        buffer.read_output_characters(origin, dest);
        let dest = &mut attributes[row * width..(row + 1) * width];
        buffer.read_output_attributes(origin, dest);
    }

    Arc::new(ScreenBufferSnapshot {
        revision: buffer.revision(),
        window_rect: window,
        buffer_size: buffer.screen_buffer_size(),
        cursor_position: buffer.cursor_position(),
        cursor_visible: buffer.cursor_visible(),
        cursor_size: buffer.cursor_size(),
        default_attributes: buffer.default_attributes(),
        color_table: *buffer.color_table(),
        viewport_size: Coord::new(window.width(), window.height()),
        text,
        attributes,
    })
}
