//! Terminal input decoding.
//!
//! In ConPTY-style hosting the terminal delivers key input as bytes:
//! win32-input-mode records, classic VT sequences for special keys, and
//! plain text for everything else. `vt_decoder` reconstructs structured
//! key events from that stream; `key_events` post-processes them the way
//! clients expect (control-character synthesis, Ctrl+C recognition).

pub mod key_events;
pub mod vt_decoder;

pub use vt_decoder::{DecodeResult, DecodedToken, TextChunk, TokenKind, try_decode_vt};

/// VT-first decoding with a code-page fallback.
///
/// Wraps `try_decode_vt`: when the prefix is not a recognized VT sequence
/// the leading byte is consumed as one text unit instead. This is the only
/// producer of `TokenKind::TextUnits`; the decoder itself never emits it.
pub fn decode_next_token(bytes: &[u8]) -> DecodeResult {
    match try_decode_vt(bytes) {
        DecodeResult::NoMatch if !bytes.is_empty() => {
            let chunk = TextChunk {
                units: [bytes[0] as u16, 0],
                unit_count: 1,
            };
            DecodeResult::Produced(DecodedToken {
                kind: TokenKind::TextUnits(chunk),
                bytes_consumed: 1,
            })
        }
        other => other,
    }
}
