//! Per-connection console state.
//!
//! Everything here is owned by the server thread: the decoded input
//! queue, the undecoded VT tail, the console modes, the object table, and
//! the window title. Nothing escapes except through snapshots and
//! completed requests.

use std::collections::HashMap;
use std::collections::VecDeque;

use condrv::constants::{
    ENABLE_ECHO_INPUT, ENABLE_LINE_INPUT, ENABLE_PROCESSED_INPUT, ENABLE_PROCESSED_OUTPUT,
    ENABLE_VIRTUAL_TERMINAL_PROCESSING, ENABLE_WRAP_AT_EOL_OUTPUT, OBJECT_TYPE_CURRENT_INPUT,
    OBJECT_TYPE_CURRENT_OUTPUT, OBJECT_TYPE_NEW_OUTPUT,
};
use condrv::records::{InputRecord, KeyEventRecord};
use log::{debug, info};

use crate::input::key_events::{key_event_matches_ctrl_c, synthesize_control_char};
use crate::input::{DecodeResult, TokenKind, decode_next_token};
use crate::screen::WindowTitle;

const DEFAULT_INPUT_MODE: u32 =
    ENABLE_PROCESSED_INPUT | ENABLE_LINE_INPUT | ENABLE_ECHO_INPUT;
const DEFAULT_OUTPUT_MODE: u32 = ENABLE_PROCESSED_OUTPUT
    | ENABLE_WRAP_AT_EOL_OUTPUT
    | ENABLE_VIRTUAL_TERMINAL_PROCESSING;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    CurrentInput,
    CurrentOutput,
    NewOutput,
    Generic,
}

impl ObjectKind {
    pub fn from_object_type(object_type: u32) -> ObjectKind {
        match object_type {
            OBJECT_TYPE_CURRENT_INPUT => ObjectKind::CurrentInput,
            OBJECT_TYPE_CURRENT_OUTPUT => ObjectKind::CurrentOutput,
            OBJECT_TYPE_NEW_OUTPUT => ObjectKind::NewOutput,
            _ => ObjectKind::Generic,
        }
    }
}

pub struct Session {
    connected: bool,
    input_mode: u32,
    output_mode: u32,
    input_queue: VecDeque<InputRecord>,
    /// Bytes that did not yet form a complete VT sequence. The decoder is
    /// stateless; this tail is the only state between input chunks.
    vt_tail: Vec<u8>,
    title: WindowTitle,
    objects: HashMap<usize, ObjectKind>,
    next_object_id: usize,
    interrupted: bool,
}

impl Session {
    pub fn new() -> Session {
        Session {
            connected: false,
            input_mode: DEFAULT_INPUT_MODE,
            output_mode: DEFAULT_OUTPUT_MODE,
            input_queue: VecDeque::new(),
            vt_tail: Vec::new(),
            title: WindowTitle::default(),
            objects: HashMap::new(),
            // Object ids double as driver-visible handle values; keep 0
            // free so a zeroed descriptor never aliases a real object.
            next_object_id: 1,
            interrupted: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn input_mode(&self) -> u32 {
        self.input_mode
    }

    pub fn output_mode(&self) -> u32 {
        self.output_mode
    }

    /// Console mode as seen through a handle to `kind`.
    pub fn mode_for(&self, kind: ObjectKind) -> u32 {
        match kind {
            ObjectKind::CurrentInput => self.input_mode,
            _ => self.output_mode,
        }
    }

    pub fn set_mode_for(&mut self, kind: ObjectKind, mode: u32) {
        match kind {
            ObjectKind::CurrentInput => self.input_mode = mode,
            _ => self.output_mode = mode,
        }
    }

    pub fn title(&self) -> &WindowTitle {
        &self.title
    }

    pub fn title_mut(&mut self) -> &mut WindowTitle {
        &mut self.title
    }

    pub fn allocate_object(&mut self, kind: ObjectKind) -> usize {
        let id = self.next_object_id;
        self.next_object_id += 1;
        self.objects.insert(id, kind);
        debug!("allocated console object {id} ({kind:?})");
        id
    }

    pub fn object_kind(&self, id: usize) -> Option<ObjectKind> {
        self.objects.get(&id).copied()
    }

    pub fn close_object(&mut self, id: usize) -> bool {
        self.objects.remove(&id).is_some()
    }

    /// Decode freshly arrived terminal bytes into input records.
    ///
    /// Complete sequences become key events (with control characters
    /// synthesized), unrecognized bytes fall through to text records, and
    /// an incomplete trailing sequence stays in the tail for the next
    /// call.
    pub fn feed_input_bytes(&mut self, bytes: &[u8]) {
        self.vt_tail.extend_from_slice(bytes);

        let mut consumed = 0usize;
        loop {
            match decode_next_token(&self.vt_tail[consumed..]) {
                DecodeResult::Produced(token) => {
                    match token.kind {
                        TokenKind::KeyEvent(mut key) => {
                            synthesize_control_char(&mut key);
                            if key_event_matches_ctrl_c(&key) {
                                info!("Ctrl+C received from the terminal");
                                self.interrupted = true;
                            }
                            self.input_queue.push_back(InputRecord::key(key));
                        }
                        TokenKind::TextUnits(chunk) => {
                            for unit in &chunk.units[..chunk.unit_count] {
                                self.input_queue.push_back(InputRecord::key(text_key(*unit)));
                            }
                        }
                        TokenKind::IgnoredSequence => {}
                    }
                    consumed += token.bytes_consumed;
                }
                DecodeResult::NeedMoreData | DecodeResult::NoMatch => break,
            }
        }

        self.vt_tail.drain(..consumed);
    }

    /// Length of the undecoded tail, for diagnostics and tests.
    pub fn pending_tail_len(&self) -> usize {
        self.vt_tail.len()
    }

    pub fn queued_record_count(&self) -> usize {
        self.input_queue.len()
    }

    /// Pop up to `max` records for a read-console-input reply.
    pub fn pop_input_records(&mut self, max: usize) -> Vec<InputRecord> {
        let count = max.min(self.input_queue.len());
        self.input_queue.drain(..count).collect()
    }

    /// Fill `dest` with raw text for a classic read: key-down records
    /// with a character payload become bytes, everything else is dropped.
    pub fn read_input_text(&mut self, dest: &mut [u8]) -> usize {
        let mut written = 0usize;
        while written < dest.len() {
            let Some(record) = self.input_queue.pop_front() else {
                break;
            };
            if let Some(key) = record.key_event() {
                if key.is_key_down() && key.unicode_char != 0 {
                    dest[written] = (key.unicode_char & 0xFF) as u8;
                    written += 1;
                }
            }
        }
        written
    }

    /// True once a Ctrl+C was recognized; reading resets the latch.
    pub fn take_interrupt(&mut self) -> bool {
        std::mem::take(&mut self.interrupted)
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

fn text_key(unit: u16) -> KeyEventRecord {
    KeyEventRecord {
        key_down: 1,
        repeat_count: 1,
        virtual_key_code: 0,
        virtual_scan_code: 0,
        unicode_char: unit,
        control_key_state: 0,
    }
}
