//! Delegation to the inbox legacy console host.
//!
//! Policy can route a session to the V1 host instead of serving it here.
//! The shim loads the inbox module, hands it the server handle, and
//! leaves the module resident: the legacy host owns the session's IO
//! thread from then on, and this process no longer dispatches for it.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use condrv::handle::HandleValue;
use log::info;
use thiserror::Error;
use windows_sys::Win32::Foundation::{FreeLibrary, GetLastError, HANDLE};
use windows_sys::Win32::System::LibraryLoader::{
    GetProcAddress, LOAD_LIBRARY_SEARCH_SYSTEM32, LoadLibraryExW,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("legacy host activation failed (os error {code})")]
pub struct LegacyHostError {
    pub code: u32,
}

type ConsoleCreateIoThreadFn = unsafe extern "system" fn(HANDLE) -> i32;

/// Transfer the session behind `server_handle` to the legacy host.
///
/// On success the module stays loaded for the lifetime of the process;
/// the caller must not run its own dispatch loop for this session.
pub fn activate(server_handle: HandleValue) -> Result<(), LegacyHostError> {
    let wide: Vec<u16> = OsStr::new("ConhostV1.dll")
        .encode_wide()
        .chain(Some(0))
        .collect();
    let module = unsafe {
        LoadLibraryExW(wide.as_ptr(), std::ptr::null_mut(), LOAD_LIBRARY_SEARCH_SYSTEM32)
    };
    if module.is_null() {
        return Err(LegacyHostError {
            code: unsafe { GetLastError() },
        });
    }

    let proc = unsafe { GetProcAddress(module, c"ConsoleCreateIoThread".as_ptr() as *const u8) };
    let Some(proc) = proc else {
        let code = unsafe { GetLastError() };
        unsafe { FreeLibrary(module) };
        return Err(LegacyHostError { code });
    };

    // SAFETY: the export has the documented IO-thread entry signature.
    let create_io_thread: ConsoleCreateIoThreadFn = unsafe { std::mem::transmute(proc) };
    let status = unsafe { create_io_thread(server_handle.as_raw() as HANDLE) };
    if status < 0 {
        unsafe { FreeLibrary(module) };
        return Err(LegacyHostError {
            code: status as u32,
        });
    }

    info!("session handed to the legacy inbox host");
    Ok(())
}
