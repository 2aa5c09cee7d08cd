//! Immutable view-models handed from the server thread to the UI thread.

mod snapshot;

pub use snapshot::{PublishedScreenBuffer, ScreenBufferSnapshot, make_viewport_snapshot};
