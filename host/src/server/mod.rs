//! The server side of one console session: per-connection state and the
//! blocking dispatch loop.

mod dispatch;
mod session;

pub use dispatch::ServerDispatch;
pub use session::{ObjectKind, Session};
