//! On-the-wire packet layouts exchanged with the console driver.
//!
//! The read-io call returns an `IoDescriptor` header followed by a small
//! fixed-size payload that identifies the I/O category (connect, create
//! object, user-defined api call, raw read/write). Variable-sized input
//! and output payloads move separately through the read-input and
//! write-output calls.
//!
//! Everything here is plain data the driver writes directly into, so the
//! types stay `Copy`, zeroable, and `#[repr(C)]`.

use crate::constants;
use crate::handle::HandleValue;
use crate::status::NtStatus;

/// 64-bit request identifier, unique per outstanding request until its
/// completion is delivered. Layout matches a LUID.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestId {
    pub low: u32,
    pub high: i32,
}

impl RequestId {
    pub const fn new(low: u32, high: i32) -> Self {
        RequestId { low, high }
    }
}

/// Fixed header of every request packet.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct IoDescriptor {
    pub identifier: RequestId,
    pub process: usize,
    pub object: usize,
    /// Request verb, one of the `IO_*` constants.
    pub function: u32,
    /// Byte size of the request's input payload.
    pub input_size: u32,
    /// Byte size of the client's output buffer.
    pub output_size: u32,
    pub reserved: u32,
}

/// Payload of a create-object request.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateObjectInformation {
    pub object_type: u32,
    pub share_mode: u32,
    pub desired_access: u32,
}

/// Message body of a create-screen-buffer request, carried alongside the
/// create-object information when a client asks for a new output object.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateScreenBufferMsg {
    pub flags: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct CreateObjectPacket {
    pub create_object: CreateObjectInformation,
    pub create_screen_buffer: CreateScreenBufferMsg,
}

/// Reply payload of a connect request: the server-side identities the
/// driver hands back to the client for subsequent calls.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionInformation {
    pub process: usize,
    pub input: usize,
    pub output: usize,
}

/// Header of every user-defined api message. The api number selects the
/// message family and method; the descriptor size is the length of the
/// fixed body that precedes any bulk payload in the input buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct MsgHeader {
    pub api_number: u32,
    pub api_descriptor_size: u32,
}

// Family 1 message bodies.

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleModeMsg {
    pub mode: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScreenBufferInfoMsg {
    pub size: crate::records::Coord,
    pub cursor_position: crate::records::Coord,
    pub attributes: u16,
    pub window: crate::records::SmallRect,
    pub maximum_window_size: crate::records::Coord,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteConsoleMsg {
    pub num_bytes: u32,
    /// Nonzero when the payload is UTF-16, zero for code-page bytes.
    pub unicode: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadConsoleMsg {
    pub num_bytes: u32,
    pub unicode: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReadConsoleInputMsg {
    pub num_records: u32,
    pub flags: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union L1MsgBody {
    pub console_mode: ConsoleModeMsg,
    pub screen_buffer_info: ScreenBufferInfoMsg,
    pub write_console: WriteConsoleMsg,
    pub read_console: ReadConsoleMsg,
    pub read_console_input: ReadConsoleInputMsg,
    pub raw: [u8; 24],
}

// Family 2 message bodies.

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct TitleMsg {
    /// Byte length of the title payload.
    pub length: u32,
    pub unicode: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union L2MsgBody {
    pub title: TitleMsg,
    pub raw: [u8; 24],
}

// Family 3 message bodies.

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct DisplayModeMsg {
    pub mode_flags: u32,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub union L3MsgBody {
    pub display_mode: DisplayModeMsg,
    pub raw: [u8; 24],
}

/// Body union of a user-defined message. Sized to hold the largest family
/// body with headroom for messages this server does not interpret.
#[repr(C)]
#[derive(Clone, Copy)]
pub union UserDefinedBody {
    pub l1: L1MsgBody,
    pub l2: L2MsgBody,
    pub l3: L3MsgBody,
    pub raw: [u8; 64],
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct UserDefinedPacket {
    pub header: MsgHeader,
    pub body: UserDefinedBody,
}

// Body accessors return copies; every body type is plain data for which
// any bit pattern is valid, so the union reads are safe regardless of
// which message the client actually sent.
impl UserDefinedPacket {
    pub fn console_mode(&self) -> ConsoleModeMsg {
        // SAFETY: plain-data union read, see above.
        unsafe { self.body.l1.console_mode }
    }

    pub fn write_console(&self) -> WriteConsoleMsg {
        // SAFETY: plain-data union read, see above.
        unsafe { self.body.l1.write_console }
    }

    pub fn read_console(&self) -> ReadConsoleMsg {
        // SAFETY: plain-data union read, see above.
        unsafe { self.body.l1.read_console }
    }

    pub fn read_console_input(&self) -> ReadConsoleInputMsg {
        // SAFETY: plain-data union read, see above.
        unsafe { self.body.l1.read_console_input }
    }

    pub fn title(&self) -> TitleMsg {
        // SAFETY: plain-data union read, see above.
        unsafe { self.body.l2.title }
    }

    pub fn display_mode(&self) -> DisplayModeMsg {
        // SAFETY: plain-data union read, see above.
        unsafe { self.body.l3.display_mode }
    }
}

/// Fixed-size payload union of a request packet, selected by the
/// descriptor's verb.
#[repr(C)]
#[derive(Clone, Copy)]
pub union IoPacketPayload {
    pub create_object: CreateObjectPacket,
    pub user_defined: UserDefinedPacket,
}

/// One request packet as returned by the read-io call.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct IoPacket {
    pub descriptor: IoDescriptor,
    pub payload: IoPacketPayload,
}

impl IoPacket {
    /// A packet with every byte cleared, ready to receive a driver write.
    pub fn zeroed() -> IoPacket {
        // SAFETY: the packet is plain data; all-zero is a valid value for
        // every field and union interpretation.
        unsafe { core::mem::zeroed() }
    }

    /// The create-object payload, when the verb selects it.
    pub fn create_object(&self) -> Option<&CreateObjectPacket> {
        if self.descriptor.function == constants::IO_CREATE_OBJECT {
            // SAFETY: the payload union holds plain data valid for every
            // bit pattern; the verb selects the interpretation.
            Some(unsafe { &self.payload.create_object })
        } else {
            None
        }
    }

    /// The user-defined payload, when the verb selects it.
    pub fn user_defined(&self) -> Option<&UserDefinedPacket> {
        if self.descriptor.function == constants::IO_USER_DEFINED {
            // SAFETY: as above; plain data, verb-selected interpretation.
            Some(unsafe { &self.payload.user_defined })
        } else {
            None
        }
    }
}

/// Buffer descriptor for payload transfers and inline completion writes.
#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct IoBufferDescriptor {
    pub data: *mut u8,
    pub size: u32,
    pub offset: u32,
}

impl Default for IoBufferDescriptor {
    fn default() -> Self {
        IoBufferDescriptor {
            data: core::ptr::null_mut(),
            size: 0,
            offset: 0,
        }
    }
}

/// Status portion of a completion, byte-count semantics on success.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct IoStatus {
    pub status: NtStatus,
    pub information: usize,
}

/// Completion record delivered back to the driver, either piggybacked on
/// the next read-io call or through the complete-io call. The optional
/// `write` descriptor points at extra reply payload the driver copies to
/// the client; that storage must stay alive until the completion is
/// delivered.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct IoComplete {
    pub identifier: RequestId,
    pub io_status: IoStatus,
    pub write: IoBufferDescriptor,
}

impl IoComplete {
    pub fn new(identifier: RequestId) -> Self {
        IoComplete {
            identifier,
            ..Default::default()
        }
    }
}

/// Payload transfer request for read-input and write-output.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct IoOperation {
    pub identifier: RequestId,
    pub buffer: IoBufferDescriptor,
}

/// Input payload of the set-server-information call.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct IoServerInformation {
    pub input_available_event: HandleValue,
}
