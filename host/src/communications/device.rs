//! Device comm port: the narrow transport between the server and ConDrv.
//!
//! Six verbs cover the whole conversation: register the input-available
//! event, opt into UIAccess routing, pull the next request packet, deliver
//! a completion, and move payload bytes in either direction. All calls are
//! synchronous; read-io blocks until the driver has a request to hand out.
//!
//! The server logic is written against the `DeviceComm` trait so the
//! message layer and the dispatch loop can be exercised with an in-process
//! double. The real port lives behind `cfg(windows)` and owns a duplicated
//! device handle for its whole lifetime.

use condrv::errors::DeviceCommError;
use condrv::handle::HandleValue;
use condrv::packet::{IoComplete, IoOperation, IoPacket};

/// Transport verbs the server issues against the console driver.
pub trait DeviceComm {
    /// Register the input-available event handle with the driver.
    fn set_server_information(
        &self,
        input_available_event: HandleValue,
    ) -> Result<(), DeviceCommError>;

    /// Opt the server into UIAccess routing.
    fn allow_ui_access(&self) -> Result<(), DeviceCommError>;

    /// Block until the driver returns the next request packet. When
    /// `reply` is supplied it completes the previous request in the same
    /// round-trip.
    fn read_io(
        &self,
        reply: Option<&IoComplete>,
        packet: &mut IoPacket,
    ) -> Result<(), DeviceCommError>;

    /// Deliver an out-of-band completion.
    fn complete_io(&self, completion: &IoComplete) -> Result<(), DeviceCommError>;

    /// Copy `operation.buffer.size` bytes of the current request's input
    /// payload, starting at `operation.buffer.offset`, into the caller's
    /// buffer.
    fn read_input(&self, operation: &mut IoOperation) -> Result<(), DeviceCommError>;

    /// Push reply payload bytes for the current request.
    fn write_output(&self, operation: &IoOperation) -> Result<(), DeviceCommError>;
}

#[cfg(windows)]
pub use windows_impl::ConDrvDeviceComm;

#[cfg(windows)]
mod windows_impl {
    use super::DeviceComm;
    use condrv::constants::{
        IOCTL_CONDRV_ALLOW_VIA_UIACCESS, IOCTL_CONDRV_COMPLETE_IO, IOCTL_CONDRV_READ_INPUT,
        IOCTL_CONDRV_READ_IO, IOCTL_CONDRV_SET_SERVER_INFORMATION, IOCTL_CONDRV_WRITE_OUTPUT,
    };
    use condrv::errors::DeviceCommError;
    use condrv::handle::HandleValue;
    use condrv::packet::{IoComplete, IoDescriptor, IoOperation, IoPacket, IoServerInformation};
    use log::{debug, error};
    use std::ffi::c_void;
    use std::mem::size_of;
    use std::ptr;
    use windows_sys::Win32::Foundation::{
        CloseHandle, DuplicateHandle, GetLastError, DUPLICATE_SAME_ACCESS, HANDLE,
    };
    use windows_sys::Win32::System::Threading::GetCurrentProcess;
    use windows_sys::Win32::System::IO::DeviceIoControl;

    /// Owned device handle. Closes on drop.
    struct OwnedServerHandle(HANDLE);

    impl Drop for OwnedServerHandle {
        fn drop(&mut self) {
            unsafe {
                CloseHandle(self.0);
            }
        }
    }

    /// The real port to the console driver.
    ///
    /// Construction duplicates the supplied handle so the port owns its
    /// lifetime independently of whoever inherited the original.
    pub struct ConDrvDeviceComm {
        server: OwnedServerHandle,
    }

    impl ConDrvDeviceComm {
        /// Duplicate `server_handle` into this process and wrap it.
        ///
        /// # Errors
        /// `InvalidHandle` for null or sentinel values, `Transport` when
        /// the duplication itself fails.
        pub fn from_server_handle(
            server_handle: HandleValue,
        ) -> Result<ConDrvDeviceComm, DeviceCommError> {
            if !server_handle.is_valid() {
                return Err(DeviceCommError::invalid_handle("from_server_handle"));
            }

            let mut duplicated: HANDLE = ptr::null_mut();
            let ok = unsafe {
                DuplicateHandle(
                    GetCurrentProcess(),
                    server_handle.as_raw() as HANDLE,
                    GetCurrentProcess(),
                    &mut duplicated,
                    0,
                    0,
                    DUPLICATE_SAME_ACCESS,
                )
            };
            if ok == 0 {
                let code = unsafe { GetLastError() };
                error!("DuplicateHandle failed for server handle: os error {code}");
                return Err(DeviceCommError::transport(
                    "DuplicateHandle failed for server handle",
                    code,
                ));
            }

            debug!("ConDrv server handle duplicated: {duplicated:p}");
            Ok(ConDrvDeviceComm {
                server: OwnedServerHandle(duplicated),
            })
        }

        /// The owned handle value, e.g. for handing the session to the
        /// legacy inbox host.
        pub fn server_handle(&self) -> HandleValue {
            HandleValue::from_raw(self.server.0 as usize)
        }

        fn call_ioctl(
            &self,
            context: &'static str,
            ioctl: u32,
            in_buffer: *const c_void,
            in_size: u32,
            out_buffer: *mut c_void,
            out_size: u32,
        ) -> Result<(), DeviceCommError> {
            let mut written: u32 = 0;
            let ok = unsafe {
                DeviceIoControl(
                    self.server.0,
                    ioctl,
                    in_buffer,
                    in_size,
                    out_buffer,
                    out_size,
                    &mut written,
                    ptr::null_mut(),
                )
            };
            if ok == 0 {
                let code = unsafe { GetLastError() };
                error!("{context}: DeviceIoControl({ioctl:#x}) failed: os error {code}");
                return Err(DeviceCommError::transport(context, code));
            }
            Ok(())
        }

        /// Byte-level read-io. The output buffer must hold at least an
        /// `IoDescriptor`; the driver writes the packet directly into it.
        fn read_io_raw(
            &self,
            reply: Option<&IoComplete>,
            out_packet: *mut c_void,
            out_packet_size: u32,
        ) -> Result<(), DeviceCommError> {
            if out_packet.is_null() || (out_packet_size as usize) < size_of::<IoDescriptor>() {
                return Err(DeviceCommError::invalid_parameter(
                    "read_io output buffer too small for a descriptor",
                ));
            }

            let (completion, completion_size) = match reply {
                Some(reply) => (
                    reply as *const IoComplete as *const c_void,
                    size_of::<IoComplete>() as u32,
                ),
                None => (ptr::null(), 0),
            };

            self.call_ioctl(
                "read_io",
                IOCTL_CONDRV_READ_IO,
                completion,
                completion_size,
                out_packet,
                out_packet_size,
            )
        }
    }

    impl DeviceComm for ConDrvDeviceComm {
        fn set_server_information(
            &self,
            input_available_event: HandleValue,
        ) -> Result<(), DeviceCommError> {
            let info = IoServerInformation {
                input_available_event,
            };
            self.call_ioctl(
                "set_server_information",
                IOCTL_CONDRV_SET_SERVER_INFORMATION,
                &info as *const IoServerInformation as *const c_void,
                size_of::<IoServerInformation>() as u32,
                ptr::null_mut(),
                0,
            )
        }

        fn allow_ui_access(&self) -> Result<(), DeviceCommError> {
            self.call_ioctl(
                "allow_ui_access",
                IOCTL_CONDRV_ALLOW_VIA_UIACCESS,
                ptr::null(),
                0,
                ptr::null_mut(),
                0,
            )
        }

        fn read_io(
            &self,
            reply: Option<&IoComplete>,
            packet: &mut IoPacket,
        ) -> Result<(), DeviceCommError> {
            self.read_io_raw(
                reply,
                packet as *mut IoPacket as *mut c_void,
                size_of::<IoPacket>() as u32,
            )
        }

        fn complete_io(&self, completion: &IoComplete) -> Result<(), DeviceCommError> {
            self.call_ioctl(
                "complete_io",
                IOCTL_CONDRV_COMPLETE_IO,
                completion as *const IoComplete as *const c_void,
                size_of::<IoComplete>() as u32,
                ptr::null_mut(),
                0,
            )
        }

        fn read_input(&self, operation: &mut IoOperation) -> Result<(), DeviceCommError> {
            self.call_ioctl(
                "read_input",
                IOCTL_CONDRV_READ_INPUT,
                operation as *const IoOperation as *const c_void,
                size_of::<IoOperation>() as u32,
                ptr::null_mut(),
                0,
            )
        }

        fn write_output(&self, operation: &IoOperation) -> Result<(), DeviceCommError> {
            self.call_ioctl(
                "write_output",
                IOCTL_CONDRV_WRITE_OUTPUT,
                operation as *const IoOperation as *const c_void,
                size_of::<IoOperation>() as u32,
                ptr::null_mut(),
                0,
            )
        }
    }

}
