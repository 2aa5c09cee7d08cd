use thiserror::Error;

use crate::status::{
    self, ERROR_GEN_FAILURE, ERROR_INVALID_DATA, ERROR_INVALID_HANDLE, ERROR_INVALID_STATE,
    NtStatus,
};

/// Typed failure raised by the device channel and everything layered on it.
///
/// Every variant carries a context string naming the failed operation plus
/// a native Win32 code. No variant is used for control flow; callers map
/// them onto an in-flight request's completion status or treat them as
/// fatal to the session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceCommError {
    /// A device-control call failed. Carries the OS error reported by the
    /// call.
    #[error("{context}: device control failed (os error {code})")]
    Transport { context: &'static str, code: u32 },

    /// Operation attempted on a message with no comm attached. Always a
    /// programming error.
    #[error("{context}: message has no device comm attached")]
    InvalidState { context: &'static str },

    /// An offset or length violates the sizes declared by the request
    /// descriptor. Reported before any I/O is performed.
    #[error("{context} (os error {code})")]
    InvalidData { context: &'static str, code: u32 },

    /// The server handle supplied at construction was null or the
    /// invalid-handle sentinel.
    #[error("{context}: invalid server handle")]
    InvalidHandle { context: &'static str },
}

impl DeviceCommError {
    pub fn transport(context: &'static str, code: u32) -> Self {
        let code = if code == 0 { ERROR_GEN_FAILURE } else { code };
        DeviceCommError::Transport { context, code }
    }

    pub fn invalid_state(context: &'static str) -> Self {
        DeviceCommError::InvalidState { context }
    }

    pub fn invalid_data(context: &'static str) -> Self {
        DeviceCommError::InvalidData {
            context,
            code: ERROR_INVALID_DATA,
        }
    }

    /// Invalid-data shape used where the native convention reports
    /// `ERROR_INVALID_PARAMETER`, e.g. an undersized read-io buffer.
    pub fn invalid_parameter(context: &'static str) -> Self {
        DeviceCommError::InvalidData {
            context,
            code: status::ERROR_INVALID_PARAMETER,
        }
    }

    pub fn invalid_handle(context: &'static str) -> Self {
        DeviceCommError::InvalidHandle { context }
    }

    /// The native Win32 code carried by this error.
    pub fn code(&self) -> u32 {
        match self {
            DeviceCommError::Transport { code, .. } => *code,
            DeviceCommError::InvalidState { .. } => ERROR_INVALID_STATE,
            DeviceCommError::InvalidData { code, .. } => *code,
            DeviceCommError::InvalidHandle { .. } => ERROR_INVALID_HANDLE,
        }
    }

    /// Failure status staged on the in-flight request when the dispatcher
    /// recovers from this error locally.
    pub fn to_failure_status(&self) -> NtStatus {
        match self {
            DeviceCommError::Transport { .. } => status::STATUS_UNSUCCESSFUL,
            DeviceCommError::InvalidState { .. } => status::STATUS_UNSUCCESSFUL,
            DeviceCommError::InvalidData { .. } => status::STATUS_INVALID_PARAMETER,
            DeviceCommError::InvalidHandle { .. } => status::STATUS_INVALID_HANDLE,
        }
    }

    /// Fatal errors terminate the session instead of failing one request.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceCommError::InvalidState { .. } | DeviceCommError::InvalidHandle { .. }
        )
    }
}
