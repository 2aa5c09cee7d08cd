//! Key-event post-processing applied before records reach the client.

use condrv::records::{
    KeyEventRecord, LEFT_CTRL_PRESSED, RIGHT_CTRL_PRESSED, VK_BACK, VK_ESCAPE, VK_RETURN, VK_TAB,
};

/// True when the event is a Ctrl+C keypress.
///
/// Terminals disagree about whether a Ctrl+C arrives with full virtual-key
/// metadata or only as an ETX character, so both shapes are recognized:
/// virtual key `C` with a control modifier, or any key-down whose Unicode
/// payload is 0x03.
pub fn key_event_matches_ctrl_c(event: &KeyEventRecord) -> bool {
    let ctrl_pressed =
        event.control_key_state & (LEFT_CTRL_PRESSED | RIGHT_CTRL_PRESSED) != 0;

    if event.virtual_key_code == u16::from(b'C') && ctrl_pressed {
        return true;
    }

    event.is_key_down() && event.unicode_char == 0x03
}

/// Fill in the classic control character for key events that arrive
/// without a Unicode payload.
///
/// Win32-input-mode senders may leave the character empty for keys whose
/// meaning is implied by the virtual key. Clients reading through the
/// classic APIs expect the character to be present, so the server
/// synthesizes it when queueing the record.
pub fn synthesize_control_char(event: &mut KeyEventRecord) {
    if event.unicode_char != 0 {
        return;
    }

    let ctrl_pressed =
        event.control_key_state & (LEFT_CTRL_PRESSED | RIGHT_CTRL_PRESSED) != 0;

    event.unicode_char = match event.virtual_key_code {
        VK_RETURN => u16::from(b'\r'),
        VK_BACK => 0x08,
        VK_TAB => u16::from(b'\t'),
        VK_ESCAPE => 0x1b,
        vk @ 0x41..=0x5A if ctrl_pressed => vk & 0x1F,
        _ => return,
    };
}
