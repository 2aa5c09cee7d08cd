//! The device channel to the console driver and the per-request message
//! object layered on top of it.

mod api_message;
mod device;

pub use api_message::ApiMessage;
pub use device::DeviceComm;

#[cfg(windows)]
pub use device::ConDrvDeviceComm;
