//! Native status and error codes used on the wire.
//!
//! Reply statuses follow the driver's convention: an NTSTATUS where any
//! non-negative value is success. Win32 error codes accompany the typed
//! errors raised by the comm layer.

pub type NtStatus = i32;

pub const STATUS_SUCCESS: NtStatus = 0;
pub const STATUS_UNSUCCESSFUL: NtStatus = 0xC000_0001_u32 as i32;
pub const STATUS_INVALID_HANDLE: NtStatus = 0xC000_0008_u32 as i32;
pub const STATUS_INVALID_PARAMETER: NtStatus = 0xC000_000D_u32 as i32;
pub const STATUS_BUFFER_TOO_SMALL: NtStatus = 0xC000_0023_u32 as i32;
pub const STATUS_NOT_SUPPORTED: NtStatus = 0xC000_00BB_u32 as i32;

/// Non-negative NTSTATUS values are success (informational and warning
/// classes included).
pub const fn nt_success(status: NtStatus) -> bool {
    status >= 0
}

pub const ERROR_INVALID_HANDLE: u32 = 6;
pub const ERROR_INVALID_DATA: u32 = 13;
pub const ERROR_GEN_FAILURE: u32 = 31;
pub const ERROR_INVALID_PARAMETER: u32 = 87;
pub const ERROR_INVALID_STATE: u32 = 5023;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_convention_is_non_negative() {
        assert!(nt_success(STATUS_SUCCESS));
        assert!(nt_success(0x4000_0000));
        assert!(!nt_success(STATUS_UNSUCCESSFUL));
        assert!(!nt_success(STATUS_INVALID_PARAMETER));
    }
}
