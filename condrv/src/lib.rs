//! Wire-level protocol surface for the Windows console driver (ConDrv).
//!
//! ConDrv brokers console I/O between client processes and a user-mode
//! console server. The server pulls request packets from the driver over a
//! device-control channel, answers them, and pushes completions back. This
//! crate defines that surface: the request verbs and IOCTL identities, the
//! stable `#[repr(C)]` packet layouts the driver writes into, the classic
//! input-record shapes delivered to clients, and the typed error used by
//! everything that talks to the device.
//!
//! Nothing in here touches the operating system. The structures are kept
//! POD and layout-stable so the same definitions serve the real device
//! channel and in-process test doubles.

pub mod constants;
pub mod errors;
pub mod handle;
pub mod packet;
pub mod records;
pub mod status;

pub use errors::DeviceCommError;
pub use handle::HandleValue;
