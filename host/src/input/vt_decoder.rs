//! VT input sequence decoder.
//!
//! Hosting terminals can send key events encoded as win32-input-mode
//! sequences (CSI ... `_`), classic VT escapes for special keys, and
//! startup control responses (DA1, focus events). This module classifies
//! a byte prefix as one of those, as an incomplete sequence, or as not a
//! VT sequence at all.
//!
//! The decoder is a total function over the prefix. It never allocates
//! and keeps no state; the unconsumed tail between chunks is the
//! caller's to carry.

use condrv::records::{
    KeyEventRecord, VK_DELETE, VK_DOWN, VK_END, VK_F1, VK_F2, VK_F3, VK_F4, VK_HOME, VK_INSERT,
    VK_LEFT, VK_NEXT, VK_PRIOR, VK_RIGHT, VK_UP,
};

const ESC: u8 = 0x1b;
/// Single-byte C1 control sequence introducer.
const CSI_C1: u8 = 0x9b;

const MAX_PARAMS: usize = 6;

/// Up to two UTF-16 units produced by the code-page fallback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextChunk {
    pub units: [u16; 2],
    pub unit_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
    KeyEvent(KeyEventRecord),
    /// A recognized control sequence with no input meaning (focus events,
    /// DA1 replies). Consumed and dropped.
    IgnoredSequence,
    /// Produced by the code-page fallback wrapper, never by the decoder.
    TextUnits(TextChunk),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DecodedToken {
    pub kind: TokenKind,
    pub bytes_consumed: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeResult {
    Produced(DecodedToken),
    /// The prefix could become a recognized sequence with more bytes.
    NeedMoreData,
    /// The prefix is not a supported VT sequence; fall through to
    /// code-page decoding.
    NoMatch,
}

#[derive(Clone, Copy, Default)]
struct ParsedParam {
    present: bool,
    value: u32,
}

/// Accumulate one decimal digit, clamping at `u32::MAX` instead of
/// wrapping.
const fn saturating_mul_add_10(value: u32, digit: u32) -> u32 {
    if value > (u32::MAX - digit) / 10 {
        u32::MAX
    } else {
        value * 10 + digit
    }
}

const fn saturate_u16(value: u32) -> u16 {
    if value > 0xFFFF { 0xFFFF } else { value as u16 }
}

fn make_simple_key_event(virtual_key: u16) -> KeyEventRecord {
    KeyEventRecord {
        key_down: 1,
        repeat_count: 1,
        virtual_key_code: virtual_key,
        virtual_scan_code: 0,
        unicode_char: 0,
        control_key_state: 0,
    }
}

fn produced(kind: TokenKind, bytes_consumed: usize) -> DecodeResult {
    DecodeResult::Produced(DecodedToken {
        kind,
        bytes_consumed,
    })
}

/// SS3 sequences: ESC `O` P/Q/R/S map to F1..F4.
fn decode_ss3(bytes: &[u8]) -> DecodeResult {
    if bytes.len() < 3 {
        return DecodeResult::NeedMoreData;
    }

    let vk = match bytes[2] {
        b'P' => VK_F1,
        b'Q' => VK_F2,
        b'R' => VK_F3,
        b'S' => VK_F4,
        _ => return DecodeResult::NoMatch,
    };

    produced(TokenKind::KeyEvent(make_simple_key_event(vk)), 3)
}

/// CSI sequences, introduced by ESC `[` or the C1 byte.
fn decode_csi(bytes: &[u8], prefix_len: usize) -> DecodeResult {
    if bytes.len() <= prefix_len {
        return DecodeResult::NeedMoreData;
    }

    let first = bytes[prefix_len];

    // Focus events (CSI I / CSI O) are not console input.
    if first == b'I' || first == b'O' {
        return produced(TokenKind::IgnoredSequence, prefix_len + 1);
    }

    // Basic cursor keys and home/end.
    if let Some(vk) = match first {
        b'A' => Some(VK_UP),
        b'B' => Some(VK_DOWN),
        b'C' => Some(VK_RIGHT),
        b'D' => Some(VK_LEFT),
        b'H' => Some(VK_HOME),
        b'F' => Some(VK_END),
        _ => None,
    } {
        return produced(TokenKind::KeyEvent(make_simple_key_event(vk)), prefix_len + 1);
    }

    // DA1 response: CSI ? ... c, consumed and dropped.
    if first == b'?' {
        let mut pos = prefix_len + 1;
        while pos < bytes.len() {
            let ch = bytes[pos];
            if ch == b'c' {
                return produced(TokenKind::IgnoredSequence, pos + 1);
            }
            if ch != b';' && !ch.is_ascii_digit() {
                return DecodeResult::NoMatch;
            }
            pos += 1;
        }
        return DecodeResult::NeedMoreData;
    }

    // Parameterized forms share one parser and are told apart by their
    // terminators:
    // - CSI 2~ / 3~ / 5~ / 6~ (insert/delete/page keys)
    // - CSI Vk;Sc;Uc;Kd;Cs;Rc _ (win32-input-mode key record)
    let mut params = [ParsedParam::default(); MAX_PARAMS];
    let mut param_index = 0usize;
    let mut current = 0u32;
    let mut current_present = false;

    let mut pos = prefix_len;
    while pos < bytes.len() {
        let ch = bytes[pos];
        if ch.is_ascii_digit() {
            current_present = true;
            current = saturating_mul_add_10(current, u32::from(ch - b'0'));
            pos += 1;
            continue;
        }
        if ch == b';' {
            if param_index < MAX_PARAMS {
                params[param_index] = ParsedParam {
                    present: current_present,
                    value: current,
                };
            }
            param_index += 1;
            current = 0;
            current_present = false;
            pos += 1;
            continue;
        }
        break;
    }

    if pos >= bytes.len() {
        // Introducer plus digits and separators but no terminator yet.
        return DecodeResult::NeedMoreData;
    }

    let terminator = bytes[pos];
    if param_index < MAX_PARAMS {
        params[param_index] = ParsedParam {
            present: current_present,
            value: current,
        };
    }

    if terminator == b'~' {
        // Exactly one numeric parameter selects the key.
        if param_index != 0 || !params[0].present {
            return DecodeResult::NoMatch;
        }
        let vk = match params[0].value {
            2 => VK_INSERT,
            3 => VK_DELETE,
            5 => VK_PRIOR,
            6 => VK_NEXT,
            _ => return DecodeResult::NoMatch,
        };
        return produced(TokenKind::KeyEvent(make_simple_key_event(vk)), pos + 1);
    }

    if terminator == b'_' {
        // Win32-input-mode key serialization:
        // CSI Vk ; Sc ; Uc ; Kd ; Cs ; Rc _
        // Vk/Sc/Uc/Kd/Cs default to 0. The repeat count defaults to 1 and
        // is clamped so an explicit 0 never reaches the client.
        let vk = if params[0].present { params[0].value } else { 0 };
        let sc = if params[1].present { params[1].value } else { 0 };
        let uc = if params[2].present { params[2].value } else { 0 };
        let kd = if params[3].present { params[3].value } else { 0 };
        let cs = if params[4].present { params[4].value } else { 0 };
        let rc = if params[5].present {
            params[5].value.max(1)
        } else {
            1
        };

        let key = KeyEventRecord {
            key_down: i32::from(kd != 0),
            repeat_count: saturate_u16(rc),
            virtual_key_code: saturate_u16(vk),
            virtual_scan_code: saturate_u16(sc),
            unicode_char: saturate_u16(uc),
            control_key_state: cs,
        };
        return produced(TokenKind::KeyEvent(key), pos + 1);
    }

    DecodeResult::NoMatch
}

/// Classify a byte prefix as a VT input sequence.
///
/// Returns `Produced` with the token and its consumed length,
/// `NeedMoreData` when the prefix could still become a recognized
/// sequence, or `NoMatch` when it should fall through to code-page
/// decoding.
pub fn try_decode_vt(bytes: &[u8]) -> DecodeResult {
    if bytes.is_empty() {
        return DecodeResult::NoMatch;
    }

    // A single ESC is ambiguous: a standalone Escape keypress or the
    // start of a longer sequence. Defer until the next byte arrives.
    if bytes.len() == 1 && bytes[0] == ESC {
        return DecodeResult::NeedMoreData;
    }

    if bytes[0] == ESC {
        return match bytes[1] {
            b'O' => decode_ss3(bytes),
            b'[' => decode_csi(bytes, 2),
            _ => DecodeResult::NoMatch,
        };
    }

    if bytes[0] == CSI_C1 {
        return decode_csi(bytes, 1);
    }

    DecodeResult::NoMatch
}
