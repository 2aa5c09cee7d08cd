//! End-to-end dispatch tests over a scripted device channel.
//!
//! The scripted comm hands the loop a fixed sequence of request packets,
//! answers payload transfers from a table, and records every completion
//! and output write. Running the loop against it exercises the whole
//! request path: verb routing, lazy input fetch, staged output flush,
//! chained completions, and snapshot publication.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::mem::size_of;
use std::sync::Arc;

use condrv::constants::{
    API_FAMILY_L1, API_FAMILY_L2, API_L1_GET_CONSOLE_MODE, API_L1_READ_CONSOLE_INPUT,
    API_L1_SET_CONSOLE_MODE, API_L2_GET_CONSOLE_TITLE, API_L2_SET_CONSOLE_TITLE,
    ENABLE_VIRTUAL_TERMINAL_INPUT, IO_CONNECT, IO_DISCONNECT, IO_RAW_FLUSH, IO_RAW_READ,
    IO_RAW_WRITE, IO_USER_DEFINED, api_number,
};
use condrv::errors::DeviceCommError;
use condrv::handle::HandleValue;
use condrv::packet::{
    ConnectionInformation, ConsoleModeMsg, IoComplete, IoOperation, IoPacket, IoPacketPayload,
    L1MsgBody, L2MsgBody, MsgHeader, RequestId, TitleMsg, UserDefinedBody, UserDefinedPacket,
};
use condrv::records::{Coord, InputRecord, KEY_EVENT};
use condrv::status::{NtStatus, nt_success};
use condrv_host::communications::DeviceComm;
use condrv_host::server::ServerDispatch;
use condrv_host::view::PublishedScreenBuffer;

#[derive(Debug)]
struct CapturedCompletion {
    identifier: RequestId,
    status: NtStatus,
    information: usize,
    inline: Vec<u8>,
}

#[derive(Debug)]
struct CapturedWrite {
    identifier: RequestId,
    offset: u32,
    bytes: Vec<u8>,
}

/// Scripted device channel: a queue of packets to hand out, a table of
/// input payloads, and capture logs for completions and writes.
#[derive(Default)]
struct ScriptedComm {
    packets: RefCell<VecDeque<IoPacket>>,
    input_payloads: RefCell<HashMap<u32, Vec<u8>>>,
    failing_inputs: RefCell<Vec<u32>>,
    completions: RefCell<Vec<CapturedCompletion>>,
    writes: RefCell<Vec<CapturedWrite>>,
}

impl ScriptedComm {
    fn push_packet(&self, packet: IoPacket) {
        self.packets.borrow_mut().push_back(packet);
    }

    fn set_input_payload(&self, id: u32, payload: Vec<u8>) {
        self.input_payloads.borrow_mut().insert(id, payload);
    }

    fn fail_input_for(&self, id: u32) {
        self.failing_inputs.borrow_mut().push(id);
    }

    fn capture(&self, completion: &IoComplete) {
        // The inline payload must be valid at delivery time; copy it now
        // to model the driver reading it during the call.
        let inline = if completion.write.data.is_null() {
            Vec::new()
        } else {
            // SAFETY: the message owns the storage until the completion
            // is delivered; this runs inside that window.
            unsafe {
                std::slice::from_raw_parts(completion.write.data, completion.write.size as usize)
                    .to_vec()
            }
        };
        self.completions.borrow_mut().push(CapturedCompletion {
            identifier: completion.identifier,
            status: completion.io_status.status,
            information: completion.io_status.information,
            inline,
        });
    }
}

impl DeviceComm for ScriptedComm {
    fn set_server_information(&self, _event: HandleValue) -> Result<(), DeviceCommError> {
        Ok(())
    }

    fn allow_ui_access(&self) -> Result<(), DeviceCommError> {
        Ok(())
    }

    fn read_io(
        &self,
        reply: Option<&IoComplete>,
        packet: &mut IoPacket,
    ) -> Result<(), DeviceCommError> {
        if let Some(reply) = reply {
            self.capture(reply);
        }
        match self.packets.borrow_mut().pop_front() {
            Some(next) => {
                *packet = next;
                Ok(())
            }
            None => Err(DeviceCommError::transport("read_io", 31)),
        }
    }

    fn complete_io(&self, completion: &IoComplete) -> Result<(), DeviceCommError> {
        self.capture(completion);
        Ok(())
    }

    fn read_input(&self, operation: &mut IoOperation) -> Result<(), DeviceCommError> {
        let id = operation.identifier.low;
        if self.failing_inputs.borrow().contains(&id) {
            return Err(DeviceCommError::transport("read_input", 31));
        }

        let payloads = self.input_payloads.borrow();
        let payload = payloads.get(&id).cloned().unwrap_or_default();
        let offset = operation.buffer.offset as usize;
        let size = operation.buffer.size as usize;
        assert!(
            offset + size <= payload.len(),
            "request {id} read {size} bytes at {offset} beyond its {} byte payload",
            payload.len()
        );

        // SAFETY: the message hands us a buffer of exactly `size` bytes.
        let dest = unsafe { std::slice::from_raw_parts_mut(operation.buffer.data, size) };
        dest.copy_from_slice(&payload[offset..offset + size]);
        Ok(())
    }

    fn write_output(&self, operation: &IoOperation) -> Result<(), DeviceCommError> {
        // SAFETY: the message keeps the staged buffer alive for the call.
        let bytes = unsafe {
            std::slice::from_raw_parts(operation.buffer.data, operation.buffer.size as usize)
                .to_vec()
        };
        self.writes.borrow_mut().push(CapturedWrite {
            identifier: operation.identifier,
            offset: operation.buffer.offset,
            bytes,
        });
        Ok(())
    }
}

fn basic_packet(id: u32, function: u32, input_size: u32, output_size: u32) -> IoPacket {
    let mut packet = IoPacket::zeroed();
    packet.descriptor.identifier = RequestId::new(id, 0);
    packet.descriptor.function = function;
    packet.descriptor.input_size = input_size;
    packet.descriptor.output_size = output_size;
    packet
}

#[allow(clippy::too_many_arguments)]
fn user_defined_packet(
    id: u32,
    object: usize,
    family: u16,
    index: u16,
    body_size: u32,
    body: UserDefinedBody,
    payload_bytes: u32,
    output_payload_bytes: u32,
) -> IoPacket {
    let fixed = size_of::<MsgHeader>() as u32 + body_size;
    let mut packet = basic_packet(id, IO_USER_DEFINED, fixed + payload_bytes, {
        if output_payload_bytes == 0 {
            0
        } else {
            fixed + output_payload_bytes
        }
    });
    packet.descriptor.object = object;
    packet.payload = IoPacketPayload {
        user_defined: UserDefinedPacket {
            header: MsgHeader {
                api_number: api_number(family, index),
                api_descriptor_size: body_size,
            },
            body,
        },
    };
    packet
}

fn empty_body() -> UserDefinedBody {
    UserDefinedBody { raw: [0; 64] }
}

fn fixed_size(body_size: u32) -> usize {
    size_of::<MsgHeader>() + body_size as usize
}

#[test]
fn full_session_round_trip() {
    let comm = ScriptedComm::default();
    let mode_body = size_of::<ConsoleModeMsg>() as u32;
    let title_body = size_of::<TitleMsg>() as u32;

    // 1: connect
    comm.push_packet(basic_packet(1, IO_CONNECT, 0, 0));

    // 2: raw write drawing onto the screen
    let text = b"hi\r\nworld";
    comm.push_packet(basic_packet(2, IO_RAW_WRITE, text.len() as u32, 0));
    comm.set_input_payload(2, text.to_vec());

    // 3: raw read returning decoded terminal input
    comm.push_packet(basic_packet(3, IO_RAW_READ, 0, 8));

    // 4: get console mode for the input object (allocated first, id 1)
    comm.push_packet(user_defined_packet(
        4,
        1,
        API_FAMILY_L1,
        API_L1_GET_CONSOLE_MODE,
        mode_body,
        empty_body(),
        0,
        0,
    ));

    // 5: set console mode on the same object
    comm.push_packet(user_defined_packet(
        5,
        1,
        API_FAMILY_L1,
        API_L1_SET_CONSOLE_MODE,
        mode_body,
        UserDefinedBody {
            l1: L1MsgBody {
                console_mode: ConsoleModeMsg {
                    mode: ENABLE_VIRTUAL_TERMINAL_INPUT,
                },
            },
        },
        0,
        0,
    ));

    // 6: set the title; payload rides after the fixed message portion
    let title_bytes = b"session title";
    comm.push_packet(user_defined_packet(
        6,
        2,
        API_FAMILY_L2,
        API_L2_SET_CONSOLE_TITLE,
        title_body,
        UserDefinedBody {
            l2: L2MsgBody {
                title: TitleMsg {
                    length: title_bytes.len() as u32,
                    unicode: 0,
                },
            },
        },
        title_bytes.len() as u32,
        0,
    ));
    let mut payload = vec![0u8; fixed_size(title_body)];
    payload.extend_from_slice(title_bytes);
    comm.set_input_payload(6, payload);

    // 7: read the title back through the output buffer
    comm.push_packet(user_defined_packet(
        7,
        2,
        API_FAMILY_L2,
        API_L2_GET_CONSOLE_TITLE,
        title_body,
        empty_body(),
        0,
        64,
    ));

    // 8: flush, then 9: disconnect
    comm.push_packet(basic_packet(8, IO_RAW_FLUSH, 0, 0));
    comm.push_packet(basic_packet(9, IO_DISCONNECT, 0, 0));

    let published = Arc::new(PublishedScreenBuffer::new());
    let mut dispatch =
        ServerDispatch::new(&comm, Default::default(), Arc::clone(&published)).unwrap();

    // Terminal input for the raw read: a win32-input-mode 'a' keypress.
    dispatch
        .input_sender()
        .send(b"\x1b[65;0;97;1;0;1_".to_vec())
        .unwrap();

    dispatch.run().unwrap();

    // Every request completed, in driver order.
    let completions = comm.completions.borrow();
    let ids: Vec<u32> = completions.iter().map(|c| c.identifier.low).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    assert!(completions.iter().all(|c| nt_success(c.status)));

    // Connect replied with the connection information inline.
    let connect = &completions[0];
    assert_eq!(connect.information, size_of::<ConnectionInformation>());
    assert_eq!(connect.inline.len(), size_of::<ConnectionInformation>());
    let mut info = ConnectionInformation::default();
    // SAFETY: the capture came from the same plain-data type.
    unsafe {
        std::ptr::copy_nonoverlapping(
            connect.inline.as_ptr(),
            &mut info as *mut ConnectionInformation as *mut u8,
            connect.inline.len(),
        );
    }
    assert_eq!(info.input, 1);
    assert_eq!(info.output, 2);

    // The raw write consumed its whole payload and mutated the screen.
    assert_eq!(completions[1].information, text.len());
    let snapshot = published.latest().expect("a snapshot was published");
    assert!(snapshot.revision > 0);
    let width = snapshot.viewport_size.x as usize;
    assert_eq!(snapshot.text[0], u16::from(b'h'));
    assert_eq!(snapshot.text[1], u16::from(b'i'));
    assert_eq!(snapshot.text[width], u16::from(b'w'));

    // The raw read surfaced the decoded 'a'.
    assert_eq!(completions[2].information, 1);
    let writes = comm.writes.borrow();
    let raw_read = writes
        .iter()
        .find(|w| w.identifier.low == 3)
        .expect("raw read pushed its payload");
    assert_eq!(raw_read.bytes, b"a");

    // Get-mode replied with the default input mode inline.
    let get_mode = &completions[3];
    assert_eq!(get_mode.information, size_of::<ConsoleModeMsg>());
    let mode = u32::from_le_bytes(get_mode.inline[..4].try_into().unwrap());
    assert_ne!(mode & 0x1, 0, "processed input should be on by default");

    // Set-mode stuck.
    assert_eq!(dispatch.session().input_mode(), ENABLE_VIRTUAL_TERMINAL_INPUT);

    // The title round-tripped as UTF-16 at the message's write offset.
    assert_eq!(dispatch.session().title().as_str(), "session title");
    let get_title = writes
        .iter()
        .find(|w| w.identifier.low == 7)
        .expect("get-title pushed its payload");
    assert_eq!(get_title.offset as usize, fixed_size(title_body));
    let expected: Vec<u8> = "session title"
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    assert_eq!(get_title.bytes, expected);
    assert_eq!(completions[6].information, expected.len());
}

#[test]
fn transport_failure_fails_one_request_and_the_loop_continues() {
    let comm = ScriptedComm::default();

    comm.push_packet(basic_packet(1, IO_CONNECT, 0, 0));
    comm.push_packet(basic_packet(2, IO_RAW_WRITE, 4, 0));
    comm.fail_input_for(2);
    comm.push_packet(basic_packet(3, IO_RAW_FLUSH, 0, 0));
    comm.push_packet(basic_packet(4, IO_DISCONNECT, 0, 0));

    let published = Arc::new(PublishedScreenBuffer::new());
    let mut dispatch =
        ServerDispatch::new(&comm, Default::default(), Arc::clone(&published)).unwrap();
    dispatch.run().unwrap();

    let completions = comm.completions.borrow();
    let ids: Vec<u32> = completions.iter().map(|c| c.identifier.low).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    assert!(nt_success(completions[0].status));
    assert!(!nt_success(completions[1].status), "the failed request reports failure");
    assert!(nt_success(completions[2].status), "later requests still succeed");
    assert!(nt_success(completions[3].status));
}

#[test]
fn device_loss_ends_the_loop_with_a_transport_error() {
    let comm = ScriptedComm::default();
    comm.push_packet(basic_packet(1, IO_CONNECT, 0, 0));
    // No disconnect; the script simply runs dry like a closed handle.

    let published = Arc::new(PublishedScreenBuffer::new());
    let mut dispatch =
        ServerDispatch::new(&comm, Default::default(), Arc::clone(&published)).unwrap();

    let error = dispatch.run().unwrap_err();
    assert!(matches!(error, DeviceCommError::Transport { .. }));
    assert!(!error.is_fatal());

    // The connect itself still completed on the way out.
    assert_eq!(comm.completions.borrow().len(), 1);
}

#[test]
fn read_console_input_returns_whole_records() {
    let comm = ScriptedComm::default();
    let record_size = size_of::<InputRecord>();

    comm.push_packet(basic_packet(1, IO_CONNECT, 0, 0));
    comm.push_packet(user_defined_packet(
        2,
        1,
        API_FAMILY_L1,
        API_L1_READ_CONSOLE_INPUT,
        8,
        empty_body(),
        0,
        (record_size * 4) as u32,
    ));
    comm.push_packet(basic_packet(3, IO_DISCONNECT, 0, 0));

    let published = Arc::new(PublishedScreenBuffer::new());
    let mut dispatch =
        ServerDispatch::new(&comm, Default::default(), Arc::clone(&published)).unwrap();

    // One keypress and one arrow key.
    dispatch
        .input_sender()
        .send(b"\x1b[65;0;97;1;0;1_\x1b[A".to_vec())
        .unwrap();

    dispatch.run().unwrap();

    let completions = comm.completions.borrow();
    assert_eq!(completions[1].information, 2 * record_size);

    let writes = comm.writes.borrow();
    let payload = &writes
        .iter()
        .find(|w| w.identifier.low == 2)
        .expect("records were pushed")
        .bytes;
    assert_eq!(payload.len(), 2 * record_size);

    // First record: KEY_EVENT with key-down 'a'.
    let event_type = u16::from_le_bytes(payload[..2].try_into().unwrap());
    assert_eq!(event_type, KEY_EVENT);
    let key_down = i32::from_le_bytes(payload[4..8].try_into().unwrap());
    assert_eq!(key_down, 1);
    let virtual_key = u16::from_le_bytes(payload[10..12].try_into().unwrap());
    assert_eq!(virtual_key, 65);
    let unicode = u16::from_le_bytes(payload[14..16].try_into().unwrap());
    assert_eq!(unicode, u16::from(b'a'));
}

#[test]
fn snapshot_revisions_strictly_increase_across_writes() {
    let comm = ScriptedComm::default();

    comm.push_packet(basic_packet(1, IO_CONNECT, 0, 0));
    for id in 2..6u32 {
        comm.push_packet(basic_packet(id, IO_RAW_WRITE, 1, 0));
        comm.set_input_payload(id, vec![b'a' + id as u8]);
    }
    comm.push_packet(basic_packet(6, IO_DISCONNECT, 0, 0));

    let published = Arc::new(PublishedScreenBuffer::new());

    // Observe revisions from the consumer side while the loop runs.
    let comm_ref = &comm;
    let observed = std::thread::scope(|scope| {
        let reader_slot = Arc::clone(&published);
        let writer_published = Arc::clone(&published);
        let reader = scope.spawn(move || {
            let mut seen = Vec::new();
            loop {
                if let Some(snapshot) = reader_slot.latest() {
                    if seen.last() != Some(&snapshot.revision) {
                        seen.push(snapshot.revision);
                    }
                    if snapshot.text[3] == u16::from(b'a' + 5) {
                        return seen;
                    }
                }
                std::thread::yield_now();
            }
        });

        let mut dispatch =
            ServerDispatch::new(comm_ref, Default::default(), writer_published).unwrap();
        dispatch.run().unwrap();
        reader.join().unwrap()
    });

    assert!(!observed.is_empty());
    for pair in observed.windows(2) {
        assert!(pair[1] > pair[0], "revisions must strictly increase");
    }
}

#[test]
fn viewport_extent_matches_snapshot_payload() {
    let comm = ScriptedComm::default();
    comm.push_packet(basic_packet(1, IO_RAW_WRITE, 1, 0));
    comm.set_input_payload(1, b"x".to_vec());
    comm.push_packet(basic_packet(2, IO_DISCONNECT, 0, 0));

    let published = Arc::new(PublishedScreenBuffer::new());
    let mut dispatch =
        ServerDispatch::new(&comm, Default::default(), Arc::clone(&published)).unwrap();
    dispatch.run().unwrap();

    let snapshot = published.latest().unwrap();
    let cells = snapshot.viewport_size.x as usize * snapshot.viewport_size.y as usize;
    assert_eq!(snapshot.text.len(), cells);
    assert_eq!(snapshot.attributes.len(), cells);
    assert_eq!(snapshot.viewport_size, Coord::new(80, 25));
}
