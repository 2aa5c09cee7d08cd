//! A non-owning view of an OS handle value.
//!
//! Handles cross the protocol either as fields of wire structures (the
//! input-available event registered with the driver) or as constructor
//! input for the device comm port. Carrying them as a dedicated value type
//! keeps ownership decisions explicit without tying the protocol crate to
//! any OS headers. The type never closes anything; owning wrappers live
//! with the code that opened the handle.

/// Raw handle value, layout-compatible with a pointer-sized OS handle.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandleValue(usize);

impl HandleValue {
    pub const NULL: HandleValue = HandleValue(0);

    /// The pseudo-value `INVALID_HANDLE_VALUE` (-1) used as a sentinel by
    /// several Win32 APIs.
    pub const INVALID: HandleValue = HandleValue(usize::MAX);

    pub const fn from_raw(value: usize) -> Self {
        HandleValue(value)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// True when the value is neither null nor the invalid-handle sentinel.
    pub const fn is_valid(self) -> bool {
        self.0 != 0 && self.0 != usize::MAX
    }
}
