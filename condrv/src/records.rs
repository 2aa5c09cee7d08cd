//! Classic console input records and coordinate types.
//!
//! These mirror the shapes a console client sees through the standard input
//! APIs. Layouts are `#[repr(C)]` and byte-for-byte compatible with the
//! Win32 records so the server can copy them straight into a client's
//! reply buffer.

/// A cell coordinate within a screen buffer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Coord {
    pub x: i16,
    pub y: i16,
}

impl Coord {
    pub const fn new(x: i16, y: i16) -> Self {
        Coord { x, y }
    }
}

/// An inclusive rectangle in buffer coordinates.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SmallRect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

impl SmallRect {
    pub const fn width(&self) -> i16 {
        self.right - self.left + 1
    }

    pub const fn height(&self) -> i16 {
        self.bottom - self.top + 1
    }
}

/// A structured key event, the payload of most input records.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KeyEventRecord {
    /// Nonzero for key-down, zero for key-up (a Win32 BOOL).
    pub key_down: i32,
    pub repeat_count: u16,
    pub virtual_key_code: u16,
    pub virtual_scan_code: u16,
    /// UTF-16 unit carried by the key, 0 when the key has no character.
    pub unicode_char: u16,
    pub control_key_state: u32,
}

impl KeyEventRecord {
    pub fn is_key_down(&self) -> bool {
        self.key_down != 0
    }
}

/// `InputRecord::event_type` values.
pub const KEY_EVENT: u16 = 0x0001;
pub const FOCUS_EVENT: u16 = 0x0010;

/// Event payload union. Only key events are interpreted by this server;
/// the raw view keeps the layout stable for the other record types.
#[repr(C)]
#[derive(Clone, Copy)]
pub union InputEventData {
    pub key_event: KeyEventRecord,
    pub raw: [u8; 16],
}

/// One record in the console input stream.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct InputRecord {
    pub event_type: u16,
    pub event: InputEventData,
}

impl InputRecord {
    /// Wrap a key event in a record.
    pub fn key(event: KeyEventRecord) -> Self {
        // SAFETY: InputRecord is plain data for which the zero pattern is
        // valid; padding and unused union bytes stay zeroed.
        let mut record: InputRecord = unsafe { core::mem::zeroed() };
        record.event_type = KEY_EVENT;
        record.event.key_event = event;
        record
    }

    /// The key event payload, when this record carries one.
    pub fn key_event(&self) -> Option<&KeyEventRecord> {
        if self.event_type == KEY_EVENT {
            // SAFETY: the event type tags the union; key events are plain
            // data valid for every bit pattern.
            Some(unsafe { &self.event.key_event })
        } else {
            None
        }
    }
}

impl core::fmt::Debug for InputRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.key_event() {
            Some(key) => f
                .debug_struct("InputRecord")
                .field("event_type", &self.event_type)
                .field("key_event", key)
                .finish(),
            None => f
                .debug_struct("InputRecord")
                .field("event_type", &self.event_type)
                .finish_non_exhaustive(),
        }
    }
}

// Virtual key codes produced by the input decoder.
pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_PRIOR: u16 = 0x21;
pub const VK_NEXT: u16 = 0x22;
pub const VK_END: u16 = 0x23;
pub const VK_HOME: u16 = 0x24;
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;
pub const VK_INSERT: u16 = 0x2D;
pub const VK_DELETE: u16 = 0x2E;
pub const VK_F1: u16 = 0x70;
pub const VK_F2: u16 = 0x71;
pub const VK_F3: u16 = 0x72;
pub const VK_F4: u16 = 0x73;

// `KeyEventRecord::control_key_state` bits.
pub const RIGHT_ALT_PRESSED: u32 = 0x0001;
pub const LEFT_ALT_PRESSED: u32 = 0x0002;
pub const RIGHT_CTRL_PRESSED: u32 = 0x0004;
pub const LEFT_CTRL_PRESSED: u32 = 0x0008;
pub const SHIFT_PRESSED: u32 = 0x0010;
