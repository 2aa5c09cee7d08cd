//! Protocol constants: request verbs, object types, api numbering, console
//! mode bits, and the device-control surface.

/// `IoDescriptor::function` values. The driver sends one of these verbs to
/// the server with every request it returns from the read-io call.
pub const IO_CONNECT: u32 = 0x01;
pub const IO_DISCONNECT: u32 = 0x02;
pub const IO_CREATE_OBJECT: u32 = 0x03;
pub const IO_CLOSE_OBJECT: u32 = 0x04;
pub const IO_RAW_WRITE: u32 = 0x05;
pub const IO_RAW_READ: u32 = 0x06;
pub const IO_USER_DEFINED: u32 = 0x07;
pub const IO_RAW_FLUSH: u32 = 0x08;

/// `CreateObjectInformation::object_type` values.
pub const OBJECT_TYPE_CURRENT_INPUT: u32 = 0x01;
pub const OBJECT_TYPE_CURRENT_OUTPUT: u32 = 0x02;
pub const OBJECT_TYPE_NEW_OUTPUT: u32 = 0x03;
pub const OBJECT_TYPE_GENERIC: u32 = 0x04;

/// User-defined api numbers pack the message family into the high word and
/// the method index into the low word.
pub const fn api_number(family: u16, index: u16) -> u32 {
    ((family as u32) << 16) | index as u32
}

/// Family of a user-defined api number.
pub const fn api_family(number: u32) -> u16 {
    (number >> 16) as u16
}

/// Method index of a user-defined api number.
pub const fn api_index(number: u32) -> u16 {
    number as u16
}

pub const API_FAMILY_L1: u16 = 1;
pub const API_FAMILY_L2: u16 = 2;
pub const API_FAMILY_L3: u16 = 3;

// Family 1: basic I/O and mode management.
pub const API_L1_GET_CONSOLE_MODE: u16 = 0x01;
pub const API_L1_SET_CONSOLE_MODE: u16 = 0x02;
pub const API_L1_GET_SCREEN_BUFFER_INFO: u16 = 0x03;
pub const API_L1_WRITE_CONSOLE: u16 = 0x04;
pub const API_L1_READ_CONSOLE: u16 = 0x05;
pub const API_L1_READ_CONSOLE_INPUT: u16 = 0x06;

// Family 2: title management.
pub const API_L2_GET_CONSOLE_TITLE: u16 = 0x01;
pub const API_L2_SET_CONSOLE_TITLE: u16 = 0x02;

// Family 3: window queries.
pub const API_L3_GET_DISPLAY_MODE: u16 = 0x01;

// Console input mode bits, as exposed through get/set console mode.
pub const ENABLE_PROCESSED_INPUT: u32 = 0x0001;
pub const ENABLE_LINE_INPUT: u32 = 0x0002;
pub const ENABLE_ECHO_INPUT: u32 = 0x0004;
pub const ENABLE_VIRTUAL_TERMINAL_INPUT: u32 = 0x0200;

// Console output mode bits.
pub const ENABLE_PROCESSED_OUTPUT: u32 = 0x0001;
pub const ENABLE_WRAP_AT_EOL_OUTPUT: u32 = 0x0002;
pub const ENABLE_VIRTUAL_TERMINAL_PROCESSING: u32 = 0x0004;

const FILE_DEVICE_CONSOLE: u32 = 0x50;
const METHOD_OUT_DIRECT: u32 = 2;
const METHOD_NEITHER: u32 = 3;
const FILE_ANY_ACCESS: u32 = 0;

/// CTL_CODE(DeviceType, Function, Method, Access)
/// = (DeviceType << 16) | (Access << 14) | (Function << 2) | Method
macro_rules! ctl_code {
    ($dev:expr, $func:expr, $method:expr, $access:expr) => {
        ($dev << 16) | ($access << 14) | ($func << 2) | $method
    };
}

/// Pull the next request packet from the driver. The input buffer may carry
/// the completion for the previous request; the output buffer receives an
/// `IoDescriptor` followed by the packet payload. Direct-out transfer, so
/// the driver writes the packet straight into the caller's buffer.
pub const IOCTL_CONDRV_READ_IO: u32 =
    ctl_code!(FILE_DEVICE_CONSOLE, 1, METHOD_OUT_DIRECT, FILE_ANY_ACCESS);

/// Deliver an out-of-band completion (`IoComplete` in the input buffer).
pub const IOCTL_CONDRV_COMPLETE_IO: u32 =
    ctl_code!(FILE_DEVICE_CONSOLE, 2, METHOD_NEITHER, FILE_ANY_ACCESS);

/// Copy part of the current request's input payload into a caller buffer
/// described by an `IoOperation`.
pub const IOCTL_CONDRV_READ_INPUT: u32 =
    ctl_code!(FILE_DEVICE_CONSOLE, 3, METHOD_NEITHER, FILE_ANY_ACCESS);

/// Push reply payload for the current request from a caller buffer
/// described by an `IoOperation`.
pub const IOCTL_CONDRV_WRITE_OUTPUT: u32 =
    ctl_code!(FILE_DEVICE_CONSOLE, 4, METHOD_NEITHER, FILE_ANY_ACCESS);

/// Register server state with the driver; currently only the
/// input-available event handle (`IoServerInformation`).
pub const IOCTL_CONDRV_SET_SERVER_INFORMATION: u32 =
    ctl_code!(FILE_DEVICE_CONSOLE, 7, METHOD_NEITHER, FILE_ANY_ACCESS);

/// Opt the server into UIAccess routing. No payload in either direction.
pub const IOCTL_CONDRV_ALLOW_VIA_UIACCESS: u32 =
    ctl_code!(FILE_DEVICE_CONSOLE, 12, METHOD_NEITHER, FILE_ANY_ACCESS);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ioctl_codes_are_nonzero_and_distinct() {
        let codes = [
            IOCTL_CONDRV_READ_IO,
            IOCTL_CONDRV_COMPLETE_IO,
            IOCTL_CONDRV_READ_INPUT,
            IOCTL_CONDRV_WRITE_OUTPUT,
            IOCTL_CONDRV_SET_SERVER_INFORMATION,
            IOCTL_CONDRV_ALLOW_VIA_UIACCESS,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert_ne!(*a, 0);
            for b in &codes[i + 1..] {
                assert_ne!(*a, *b);
            }
        }
    }

    #[test]
    fn read_io_uses_direct_out_transfer() {
        assert_eq!(IOCTL_CONDRV_READ_IO & 0x3, METHOD_OUT_DIRECT);
        assert_eq!(IOCTL_CONDRV_COMPLETE_IO & 0x3, METHOD_NEITHER);
        assert_eq!(IOCTL_CONDRV_ALLOW_VIA_UIACCESS & 0x3, METHOD_NEITHER);
    }

    #[test]
    fn api_number_round_trips_family_and_index() {
        let number = api_number(API_FAMILY_L2, API_L2_SET_CONSOLE_TITLE);
        assert_eq!(api_family(number), API_FAMILY_L2);
        assert_eq!(api_index(number), API_L2_SET_CONSOLE_TITLE);
    }
}
