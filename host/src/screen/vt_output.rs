//! VT output interpretation for raw-write and write-console payloads.
//!
//! A small state machine walks the text units of each write: printable
//! units land in the cell grid, C0 controls are executed when processed
//! output is enabled, and escape sequences edit the cursor, attributes,
//! and window title when virtual terminal processing is enabled.
//!
//! Sequence accumulation is bounded. A CSI whose parameter area outgrows
//! its limit, or an escape with too many intermediates, is abandoned:
//! the parser drops the sequence, swallows its body, and re-examines the
//! terminating unit in ground state so it falls back to text. An OSC
//! title payload is truncated at the title capacity while the rest of the
//! sequence is still consumed.
//!
//! Parser state survives across calls, so a sequence may arrive split
//! over any number of writes.

use condrv::constants::{
    ENABLE_PROCESSED_OUTPUT, ENABLE_VIRTUAL_TERMINAL_PROCESSING, ENABLE_WRAP_AT_EOL_OUTPUT,
};
use condrv::records::Coord;
use log::trace;

use crate::screen::ScreenBuffer;
use crate::screen::attributes::{
    BACKGROUND_INTENSITY, BACKGROUND_MASK, COMMON_LVB_REVERSE_VIDEO, COMMON_LVB_UNDERSCORE,
    FOREGROUND_INTENSITY, FOREGROUND_MASK,
};

const ESC: u16 = 0x1b;
const BEL: u16 = 0x07;
const CSI_C1: u16 = 0x9b;
const OSC_C1: u16 = 0x9d;
const ST_C1: u16 = 0x9c;

const MAX_CSI_PARAM_BYTES: usize = 128;
const MAX_ESC_INTERMEDIATES: usize = 2;
const MAX_CSI_PARAMS: usize = 16;
const TAB_WIDTH: i16 = 8;

/// Window title with a fixed capacity in text units. Oversized payloads
/// are truncated, never grown past the capacity.
#[derive(Debug, Default)]
pub struct WindowTitle {
    text: String,
}

impl WindowTitle {
    pub const MAX_TITLE_UNITS: usize = 4096;

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn unit_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn set(&mut self, title: &str) {
        self.text.clear();
        for ch in title.chars().take(Self::MAX_TITLE_UNITS) {
            self.text.push(ch);
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    Ground,
    Escape,
    EscapeIntermediate,
    CsiParam,
    OscParam,
    OscString,
    OscEsc,
    /// Overlong escape; swallow intermediates until a terminating unit.
    DiscardEscape,
    /// Overlong CSI; swallow parameter bytes until a terminating unit.
    DiscardCsi,
}

pub struct VtInterpreter {
    state: ParseState,
    params: [u32; MAX_CSI_PARAMS],
    param_index: usize,
    param_bytes: usize,
    private_marker: bool,
    intermediates: usize,
    osc_selector: u32,
    osc_text: String,
    /// Set after printing in the last column; the wrap happens just
    /// before the next printable unit, so a trailing CR/LF does not
    /// produce a spurious blank line.
    wrap_pending: bool,
}

impl Default for VtInterpreter {
    fn default() -> Self {
        VtInterpreter::new()
    }
}

impl VtInterpreter {
    pub fn new() -> Self {
        VtInterpreter {
            state: ParseState::Ground,
            params: [0; MAX_CSI_PARAMS],
            param_index: 0,
            param_bytes: 0,
            private_marker: false,
            intermediates: 0,
            osc_selector: 0,
            osc_text: String::new(),
            wrap_pending: false,
        }
    }

    /// Apply one write to the buffer. `mode` carries the output-mode bits
    /// of the target object.
    pub fn apply(
        &mut self,
        buffer: &mut ScreenBuffer,
        title: &mut WindowTitle,
        units: &[u16],
        mode: u32,
    ) {
        let mut position = 0usize;
        while position < units.len() {
            // Abandoned sequences hand their terminator back to ground,
            // so a step may decline to consume the current unit.
            if self.step(buffer, title, units[position], mode) {
                position += 1;
            }
        }
    }

    /// Process one unit. Returns false when the unit must be re-examined
    /// in the new state.
    fn step(&mut self, buffer: &mut ScreenBuffer, title: &mut WindowTitle, unit: u16, mode: u32) -> bool {
        let vt_enabled = mode & ENABLE_VIRTUAL_TERMINAL_PROCESSING != 0;

        match self.state {
            ParseState::Ground => {
                if vt_enabled {
                    match unit {
                        ESC => {
                            self.enter_escape();
                            return true;
                        }
                        CSI_C1 => {
                            self.enter_csi();
                            return true;
                        }
                        OSC_C1 => {
                            self.enter_osc();
                            return true;
                        }
                        _ => {}
                    }
                }
                self.execute_ground(buffer, unit, mode);
                true
            }

            ParseState::Escape => {
                match unit {
                    u if u == u16::from(b'[') => self.enter_csi(),
                    u if u == u16::from(b']') => self.enter_osc(),
                    ESC => self.enter_escape(),
                    0x20..=0x2f => {
                        self.intermediates = 1;
                        self.state = ParseState::EscapeIntermediate;
                    }
                    0x30..=0x7e => {
                        // Simple escape dispatch; nothing this server
                        // interprets.
                        self.state = ParseState::Ground;
                    }
                    _ => {
                        // Control units keep their meaning mid-sequence.
                        self.execute_ground(buffer, unit, mode);
                    }
                }
                true
            }

            ParseState::EscapeIntermediate => {
                match unit {
                    0x20..=0x2f => {
                        self.intermediates += 1;
                        if self.intermediates > MAX_ESC_INTERMEDIATES {
                            trace!("abandoning overlong escape dispatch");
                            self.state = ParseState::DiscardEscape;
                        }
                    }
                    0x30..=0x7e => {
                        self.state = ParseState::Ground;
                    }
                    ESC => self.enter_escape(),
                    _ => {
                        self.execute_ground(buffer, unit, mode);
                    }
                }
                true
            }

            ParseState::DiscardEscape => {
                if matches!(unit, 0x20..=0x2f) {
                    true
                } else {
                    self.state = ParseState::Ground;
                    false
                }
            }

            ParseState::CsiParam => {
                match unit {
                    u if (u16::from(b'0')..=u16::from(b'9')).contains(&u) => {
                        self.note_param_byte();
                        if self.state == ParseState::CsiParam {
                            let digit = u32::from(u - u16::from(b'0'));
                            let slot = self.param_index.min(MAX_CSI_PARAMS - 1);
                            self.params[slot] =
                                self.params[slot].saturating_mul(10).saturating_add(digit);
                        }
                    }
                    u if u == u16::from(b';') => {
                        self.note_param_byte();
                        if self.state == ParseState::CsiParam {
                            self.param_index += 1;
                        }
                    }
                    u if u == u16::from(b'?') => {
                        self.note_param_byte();
                        if self.state == ParseState::CsiParam {
                            self.private_marker = true;
                        }
                    }
                    0x20..=0x3f => {
                        self.note_param_byte();
                    }
                    0x40..=0x7e => {
                        self.dispatch_csi(buffer, unit as u8);
                        self.state = ParseState::Ground;
                    }
                    ESC => self.enter_escape(),
                    _ => {
                        self.execute_ground(buffer, unit, mode);
                    }
                }
                true
            }

            ParseState::DiscardCsi => {
                if matches!(unit, 0x20..=0x3f) {
                    true
                } else {
                    self.state = ParseState::Ground;
                    false
                }
            }

            ParseState::OscParam => {
                match unit {
                    u if (u16::from(b'0')..=u16::from(b'9')).contains(&u) => {
                        let digit = u32::from(u - u16::from(b'0'));
                        self.osc_selector =
                            self.osc_selector.saturating_mul(10).saturating_add(digit);
                    }
                    u if u == u16::from(b';') => {
                        self.state = ParseState::OscString;
                    }
                    BEL => {
                        self.dispatch_osc(title);
                        self.state = ParseState::Ground;
                    }
                    ESC => {
                        self.state = ParseState::OscEsc;
                    }
                    _ => {
                        // Malformed OSC introducer; drop the sequence and
                        // let ground reconsider the unit.
                        self.state = ParseState::Ground;
                        return false;
                    }
                }
                true
            }

            ParseState::OscString => {
                match unit {
                    BEL | ST_C1 => {
                        self.dispatch_osc(title);
                        self.state = ParseState::Ground;
                    }
                    ESC => {
                        self.state = ParseState::OscEsc;
                    }
                    _ => {
                        if self.osc_text.chars().count() < WindowTitle::MAX_TITLE_UNITS {
                            if let Some(ch) = char::from_u32(u32::from(unit)) {
                                self.osc_text.push(ch);
                            }
                        }
                    }
                }
                true
            }

            ParseState::OscEsc => {
                if unit == u16::from(b'\\') {
                    self.dispatch_osc(title);
                    self.state = ParseState::Ground;
                    true
                } else {
                    // The ESC started a new sequence instead of a string
                    // terminator; the title payload is lost.
                    self.enter_escape();
                    false
                }
            }
        }
    }

    fn enter_escape(&mut self) {
        self.state = ParseState::Escape;
        self.intermediates = 0;
    }

    fn enter_csi(&mut self) {
        self.state = ParseState::CsiParam;
        self.params = [0; MAX_CSI_PARAMS];
        self.param_index = 0;
        self.param_bytes = 0;
        self.private_marker = false;
    }

    fn enter_osc(&mut self) {
        self.state = ParseState::OscParam;
        self.osc_selector = 0;
        self.osc_text.clear();
    }

    fn note_param_byte(&mut self) {
        self.param_bytes += 1;
        if self.param_bytes > MAX_CSI_PARAM_BYTES {
            trace!("abandoning overlong control sequence");
            self.state = ParseState::DiscardCsi;
        }
    }

    fn param(&self, index: usize) -> u32 {
        if index < MAX_CSI_PARAMS {
            self.params[index]
        } else {
            0
        }
    }

    fn param_or(&self, index: usize, fallback: u32) -> u32 {
        let value = self.param(index);
        if value == 0 { fallback } else { value }
    }

    fn execute_ground(&mut self, buffer: &mut ScreenBuffer, unit: u16, mode: u32) {
        let processed = mode & ENABLE_PROCESSED_OUTPUT != 0;

        if processed {
            match unit {
                0x0d => {
                    self.wrap_pending = false;
                    let cursor = buffer.cursor_position();
                    buffer.set_cursor_position(Coord::new(0, cursor.y));
                    return;
                }
                0x0a => {
                    self.wrap_pending = false;
                    self.line_feed(buffer);
                    return;
                }
                0x08 => {
                    self.wrap_pending = false;
                    let cursor = buffer.cursor_position();
                    buffer.set_cursor_position(Coord::new(cursor.x - 1, cursor.y));
                    return;
                }
                0x09 => {
                    self.wrap_pending = false;
                    let cursor = buffer.cursor_position();
                    let next_stop = (cursor.x / TAB_WIDTH + 1) * TAB_WIDTH;
                    buffer.set_cursor_position(Coord::new(next_stop, cursor.y));
                    return;
                }
                BEL => {
                    return;
                }
                0x00..=0x1f => {
                    return;
                }
                _ => {}
            }
        }

        self.print_unit(buffer, unit, mode);
    }

    fn print_unit(&mut self, buffer: &mut ScreenBuffer, unit: u16, mode: u32) {
        let wrap_enabled = mode & ENABLE_WRAP_AT_EOL_OUTPUT != 0;

        if self.wrap_pending {
            self.wrap_pending = false;
            if wrap_enabled {
                let cursor = buffer.cursor_position();
                buffer.set_cursor_position(Coord::new(0, cursor.y));
                self.line_feed(buffer);
            }
        }

        buffer.put_unit(unit);

        let size = buffer.screen_buffer_size();
        let cursor = buffer.cursor_position();
        if cursor.x + 1 < size.x {
            buffer.set_cursor_position(Coord::new(cursor.x + 1, cursor.y));
        } else {
            // Stay on the last column; with wrap enabled the line feed is
            // deferred to the next printable unit.
            self.wrap_pending = true;
        }
    }

    fn line_feed(&mut self, buffer: &mut ScreenBuffer) {
        let size = buffer.screen_buffer_size();
        let cursor = buffer.cursor_position();
        if cursor.y + 1 < size.y {
            buffer.set_cursor_position(Coord::new(cursor.x, cursor.y + 1));
        } else {
            buffer.scroll_up();
        }
    }

    fn dispatch_csi(&mut self, buffer: &mut ScreenBuffer, terminator: u8) {
        self.wrap_pending = false;

        if self.private_marker {
            // DECSET/DECRST; only the cursor visibility toggle matters to
            // this server.
            if (terminator == b'h' || terminator == b'l') && self.param(0) == 25 {
                buffer.set_cursor_visible(terminator == b'h');
            }
            return;
        }

        let cursor = buffer.cursor_position();
        let distance = self.param_or(0, 1).min(i16::MAX as u32) as i16;
        match terminator {
            b'A' => {
                buffer.set_cursor_position(Coord::new(cursor.x, cursor.y.saturating_sub(distance)));
            }
            b'B' => {
                buffer.set_cursor_position(Coord::new(cursor.x, cursor.y.saturating_add(distance)));
            }
            b'C' => {
                buffer.set_cursor_position(Coord::new(cursor.x.saturating_add(distance), cursor.y));
            }
            b'D' => {
                buffer.set_cursor_position(Coord::new(cursor.x.saturating_sub(distance), cursor.y));
            }
            b'H' | b'f' => {
                let row = self.param_or(0, 1).min(i16::MAX as u32) as i16 - 1;
                let column = self.param_or(1, 1).min(i16::MAX as u32) as i16 - 1;
                buffer.set_cursor_position(Coord::new(column, row));
            }
            b'J' => {
                let cursor_offset = buffer.cell_offset(cursor);
                match self.param(0) {
                    0 => buffer.erase_cells(cursor_offset, buffer.cell_count()),
                    1 => buffer.erase_cells(0, cursor_offset + 1),
                    2 => buffer.erase_cells(0, buffer.cell_count()),
                    _ => {}
                }
            }
            b'K' => {
                let size = buffer.screen_buffer_size();
                let line_start = buffer.cell_offset(Coord::new(0, cursor.y));
                let line_end = line_start + size.x as usize;
                let cursor_offset = buffer.cell_offset(cursor);
                match self.param(0) {
                    0 => buffer.erase_cells(cursor_offset, line_end),
                    1 => buffer.erase_cells(line_start, cursor_offset + 1),
                    2 => buffer.erase_cells(line_start, line_end),
                    _ => {}
                }
            }
            b'm' => self.dispatch_sgr(buffer),
            _ => {
                trace!("unhandled control sequence terminator {terminator:#x}");
            }
        }
    }

    fn dispatch_sgr(&mut self, buffer: &mut ScreenBuffer) {
        // ANSI color order differs from the console palette order.
        const ANSI_TO_INDEX: [u16; 8] = [0, 4, 2, 6, 1, 5, 3, 7];

        let mut attributes = buffer.current_attributes();
        let default = buffer.default_attributes();
        let count = (self.param_index + 1).min(MAX_CSI_PARAMS);

        for slot in 0..count {
            match self.params[slot] {
                0 => attributes = default,
                1 => attributes |= FOREGROUND_INTENSITY,
                22 => attributes &= !FOREGROUND_INTENSITY,
                4 => attributes |= COMMON_LVB_UNDERSCORE,
                24 => attributes &= !COMMON_LVB_UNDERSCORE,
                7 => attributes |= COMMON_LVB_REVERSE_VIDEO,
                27 => attributes &= !COMMON_LVB_REVERSE_VIDEO,
                value @ 30..=37 => {
                    let index = ANSI_TO_INDEX[(value - 30) as usize];
                    attributes = (attributes & !(FOREGROUND_MASK & !FOREGROUND_INTENSITY))
                        | index;
                }
                39 => {
                    attributes =
                        (attributes & !FOREGROUND_MASK) | (default & FOREGROUND_MASK);
                }
                value @ 40..=47 => {
                    let index = ANSI_TO_INDEX[(value - 40) as usize] << 4;
                    attributes = (attributes & !(BACKGROUND_MASK & !BACKGROUND_INTENSITY))
                        | index;
                }
                49 => {
                    attributes =
                        (attributes & !BACKGROUND_MASK) | (default & BACKGROUND_MASK);
                }
                value @ 90..=97 => {
                    let index = ANSI_TO_INDEX[(value - 90) as usize] | FOREGROUND_INTENSITY;
                    attributes = (attributes & !FOREGROUND_MASK) | index;
                }
                value @ 100..=107 => {
                    let index =
                        (ANSI_TO_INDEX[(value - 100) as usize] << 4) | BACKGROUND_INTENSITY;
                    attributes = (attributes & !BACKGROUND_MASK) | index;
                }
                _ => {}
            }
        }

        buffer.set_attributes(attributes);
    }

    fn dispatch_osc(&mut self, title: &mut WindowTitle) {
        // OSC 0 and 2 both set the window title; other selectors are
        // consumed without effect.
        if self.osc_selector == 0 || self.osc_selector == 2 {
            title.set(&self.osc_text);
        }
        self.osc_text.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::ScreenBufferSettings;

    const FULL_MODE: u32 =
        ENABLE_VIRTUAL_TERMINAL_PROCESSING | ENABLE_PROCESSED_OUTPUT | ENABLE_WRAP_AT_EOL_OUTPUT;

    fn make_buffer(columns: i16, rows: i16) -> ScreenBuffer {
        let settings = ScreenBufferSettings {
            buffer_size: Coord::new(columns, rows),
            window_size: Coord::new(columns, rows),
            ..Default::default()
        };
        ScreenBuffer::create(settings).unwrap()
    }

    fn apply_str(
        interpreter: &mut VtInterpreter,
        buffer: &mut ScreenBuffer,
        title: &mut WindowTitle,
        text: &str,
    ) {
        let units: Vec<u16> = text.encode_utf16().collect();
        interpreter.apply(buffer, title, &units, FULL_MODE);
    }

    fn cell(buffer: &ScreenBuffer, x: i16, y: i16) -> u16 {
        let mut dest = [0u16; 1];
        buffer.read_output_characters(Coord::new(x, y), &mut dest);
        dest[0]
    }

    #[test]
    fn plain_text_advances_the_cursor() {
        let mut buffer = make_buffer(8, 4);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "hi");
        assert_eq!(cell(&buffer, 0, 0), u16::from(b'h'));
        assert_eq!(cell(&buffer, 1, 0), u16::from(b'i'));
        assert_eq!(buffer.cursor_position(), Coord::new(2, 0));
    }

    #[test]
    fn carriage_return_and_line_feed_move_the_cursor() {
        let mut buffer = make_buffer(8, 4);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "ab\r\ncd");
        assert_eq!(cell(&buffer, 0, 1), u16::from(b'c'));
        assert_eq!(buffer.cursor_position(), Coord::new(2, 1));
    }

    #[test]
    fn wrapping_at_the_last_column_feeds_a_line() {
        let mut buffer = make_buffer(3, 3);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "abcd");
        assert_eq!(cell(&buffer, 2, 0), u16::from(b'c'));
        assert_eq!(cell(&buffer, 0, 1), u16::from(b'd'));
        assert_eq!(buffer.cursor_position(), Coord::new(1, 1));
    }

    #[test]
    fn writing_past_the_bottom_scrolls() {
        let mut buffer = make_buffer(2, 2);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "ab\r\ncd\r\nef");
        assert_eq!(cell(&buffer, 0, 0), u16::from(b'c'));
        assert_eq!(cell(&buffer, 0, 1), u16::from(b'e'));
    }

    #[test]
    fn cursor_position_sequence_is_one_based() {
        let mut buffer = make_buffer(8, 4);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[2;3Hx");
        assert_eq!(cell(&buffer, 2, 1), u16::from(b'x'));
    }

    #[test]
    fn cursor_movement_clamps_at_the_edges() {
        let mut buffer = make_buffer(4, 4);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[10A\x1b[10D");
        assert_eq!(buffer.cursor_position(), Coord::new(0, 0));
        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[99B\x1b[99C");
        assert_eq!(buffer.cursor_position(), Coord::new(3, 3));
    }

    #[test]
    fn sgr_maps_ansi_colors_to_palette_indices() {
        let mut buffer = make_buffer(4, 2);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        // ANSI red text on blue background.
        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[31;44mx");
        let mut attributes = [0u16; 1];
        buffer.read_output_attributes(Coord::new(0, 0), &mut attributes);
        assert_eq!(attributes[0] & FOREGROUND_MASK, 0x4);
        assert_eq!(attributes[0] & BACKGROUND_MASK, 0x10);

        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[0m");
        assert_eq!(buffer.current_attributes(), buffer.default_attributes());
    }

    #[test]
    fn erase_display_clears_from_the_cursor() {
        let mut buffer = make_buffer(4, 2);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "abcd");
        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[1;2H\x1b[0J");
        assert_eq!(cell(&buffer, 0, 0), u16::from(b'a'));
        assert_eq!(cell(&buffer, 1, 0), u16::from(b' '));
        assert_eq!(cell(&buffer, 3, 0), u16::from(b' '));
    }

    #[test]
    fn osc_sets_the_title_with_bel_and_st() {
        let mut buffer = make_buffer(4, 2);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b]2;hello\x07");
        assert_eq!(title.as_str(), "hello");

        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b]0;world\x1b\\");
        assert_eq!(title.as_str(), "world");
    }

    #[test]
    fn osc_title_payload_truncates_at_capacity() {
        let mut buffer = make_buffer(8, 4);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        let mut text = String::from("\x1b]2;");
        text.extend(std::iter::repeat_n('X', 6000));
        text.push('\x07');
        apply_str(&mut interpreter, &mut buffer, &mut title, &text);

        assert_eq!(title.unit_len(), WindowTitle::MAX_TITLE_UNITS);
        // Nothing printable leaked to the grid.
        let mut dest = vec![0u16; 32];
        buffer.read_output_characters(Coord::new(0, 0), &mut dest);
        assert!(dest.iter().all(|&unit| unit == u16::from(b' ')));
    }

    #[test]
    fn overlong_csi_is_abandoned_and_the_terminator_prints() {
        let mut buffer = make_buffer(64, 16);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        let mut text = String::from("\x1b[");
        text.extend(std::iter::repeat_n('1', 129));
        text.push('A');
        apply_str(&mut interpreter, &mut buffer, &mut title, &text);

        assert_eq!(cell(&buffer, 0, 0), u16::from(b'A'));
        assert_eq!(buffer.cursor_position(), Coord::new(1, 0));
    }

    #[test]
    fn overlong_escape_dispatch_is_abandoned() {
        let mut buffer = make_buffer(64, 16);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        let mut text = String::from("\x1b");
        text.extend(std::iter::repeat_n('#', 16));
        text.push('A');
        apply_str(&mut interpreter, &mut buffer, &mut title, &text);

        assert_eq!(cell(&buffer, 0, 0), u16::from(b'A'));
    }

    #[test]
    fn sequences_survive_arbitrary_chunk_splits() {
        let mut buffer = make_buffer(8, 4);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        for chunk in ["\x1b", "[", "2;", "2", "H", "x"] {
            apply_str(&mut interpreter, &mut buffer, &mut title, chunk);
        }
        assert_eq!(cell(&buffer, 1, 1), u16::from(b'x'));
    }

    #[test]
    fn cursor_visibility_toggles_through_private_sequences() {
        let mut buffer = make_buffer(4, 2);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[?25l");
        assert!(!buffer.cursor_visible());
        apply_str(&mut interpreter, &mut buffer, &mut title, "\x1b[?25h");
        assert!(buffer.cursor_visible());
    }

    #[test]
    fn vt_disabled_prints_escapes_as_text() {
        let mut buffer = make_buffer(8, 2);
        let mut title = WindowTitle::default();
        let mut interpreter = VtInterpreter::new();

        let units: Vec<u16> = "\x1b[2J".encode_utf16().collect();
        interpreter.apply(
            &mut buffer,
            &mut title,
            &units,
            ENABLE_PROCESSED_OUTPUT | ENABLE_WRAP_AT_EOL_OUTPUT,
        );
        // ESC is a control and is dropped by processed output; the rest
        // prints.
        assert_eq!(cell(&buffer, 0, 0), u16::from(b'['));
        assert_eq!(cell(&buffer, 1, 0), u16::from(b'2'));
        assert_eq!(cell(&buffer, 2, 0), u16::from(b'J'));
    }
}
