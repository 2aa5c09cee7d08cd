//! The blocking dispatch loop at the heart of the server.
//!
//! One iteration per request: pull the next packet (piggybacking the
//! previous completion on the same round-trip), wrap it in an api
//! message, route by verb, flush staged output, and publish a snapshot
//! when the screen moved. Requests are handled strictly in driver order;
//! the completion for request *k* rides the read for request *k+1*, so it
//! is always delivered before request *k+2* is accepted.
//!
//! Transport and validation failures are local to the request that hit
//! them: the reply status turns into a native failure code and the loop
//! keeps serving. Only programming errors (a message without a comm, a
//! bad server handle) or a failing read-io call end the session.

use std::mem::size_of;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};

use condrv::constants::{
    API_FAMILY_L1, API_FAMILY_L2, API_FAMILY_L3, API_L1_GET_CONSOLE_MODE,
    API_L1_GET_SCREEN_BUFFER_INFO, API_L1_READ_CONSOLE, API_L1_READ_CONSOLE_INPUT,
    API_L1_SET_CONSOLE_MODE, API_L1_WRITE_CONSOLE, API_L2_GET_CONSOLE_TITLE,
    API_L2_SET_CONSOLE_TITLE, API_L3_GET_DISPLAY_MODE, IO_CLOSE_OBJECT, IO_CONNECT,
    IO_CREATE_OBJECT, IO_DISCONNECT, IO_RAW_FLUSH, IO_RAW_READ, IO_RAW_WRITE, IO_USER_DEFINED,
    api_family, api_index,
};
use condrv::errors::DeviceCommError;
use condrv::packet::{
    ConnectionInformation, ConsoleModeMsg, DisplayModeMsg, IoPacket, MsgHeader,
    ScreenBufferInfoMsg, UserDefinedPacket,
};
use condrv::records::InputRecord;
use condrv::status::{STATUS_NOT_SUPPORTED, STATUS_SUCCESS};
use log::{debug, info, warn};

use crate::communications::{ApiMessage, DeviceComm};
use crate::screen::{ScreenBuffer, ScreenBufferError, ScreenBufferSettings, VtInterpreter};
use crate::server::session::{ObjectKind, Session};
use crate::view::{PublishedScreenBuffer, make_viewport_snapshot};

pub struct ServerDispatch<'c, C: DeviceComm> {
    comm: &'c C,
    session: Session,
    screen: ScreenBuffer,
    interpreter: VtInterpreter,
    published: Arc<PublishedScreenBuffer>,
    input_tx: Sender<Vec<u8>>,
    input_rx: Receiver<Vec<u8>>,
    last_published_revision: u64,
}

impl<'c, C: DeviceComm> ServerDispatch<'c, C> {
    pub fn new(
        comm: &'c C,
        settings: ScreenBufferSettings,
        published: Arc<PublishedScreenBuffer>,
    ) -> Result<Self, ScreenBufferError> {
        let screen = ScreenBuffer::create(settings)?;
        let (input_tx, input_rx) = channel();
        Ok(ServerDispatch {
            comm,
            session: Session::new(),
            screen,
            interpreter: VtInterpreter::new(),
            published,
            input_tx,
            input_rx,
            last_published_revision: 0,
        })
    }

    /// Sender for terminal input bytes. The bytes are decoded on the
    /// server thread so all parser state stays thread-local.
    pub fn input_sender(&self) -> Sender<Vec<u8>> {
        self.input_tx.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Serve requests until the client disconnects or the device channel
    /// dies. A clean disconnect returns `Ok`.
    pub fn run(&mut self) -> Result<(), DeviceCommError> {
        info!("dispatch loop entered");
        let mut previous: Option<ApiMessage<'c, C>> = None;

        loop {
            self.drain_pending_input();

            let mut packet = IoPacket::zeroed();
            let read = self
                .comm
                .read_io(previous.as_ref().map(|message| message.completion()), &mut packet);
            // Whatever happened, the previous completion is out of our
            // hands now; its buffers can go.
            previous = None;
            read?;

            let mut message = ApiMessage::new(self.comm, packet);
            let verb = message.descriptor().function;
            debug!(
                "request {:?} verb {verb:#x} input {} output {}",
                message.descriptor().identifier,
                message.descriptor().input_size,
                message.descriptor().output_size,
            );

            if let Err(error) = self.dispatch_message(&mut message) {
                if error.is_fatal() {
                    return Err(error);
                }
                warn!("request failed: {error}");
                message.set_reply_status(error.to_failure_status());
                message.set_reply_information(0);
            }

            if let Err(error) = message.release_message_buffers() {
                if error.is_fatal() {
                    return Err(error);
                }
                warn!("reply flush failed: {error}");
                message.set_reply_status(error.to_failure_status());
                message.set_reply_information(0);
            }

            self.publish_if_dirty();

            if verb == IO_DISCONNECT {
                message.complete_io()?;
                info!("client disconnected, leaving the dispatch loop");
                return Ok(());
            }

            previous = Some(message);
        }
    }

    fn drain_pending_input(&mut self) {
        while let Ok(bytes) = self.input_rx.try_recv() {
            self.session.feed_input_bytes(&bytes);
        }
        if self.session.take_interrupt() {
            info!("interrupt pending for the client");
        }
    }

    fn publish_if_dirty(&mut self) {
        if self.screen.revision() > self.last_published_revision {
            let snapshot = make_viewport_snapshot(&self.screen);
            self.last_published_revision = snapshot.revision;
            self.published.publish(snapshot);
        }
    }

    fn dispatch_message(
        &mut self,
        message: &mut ApiMessage<'c, C>,
    ) -> Result<(), DeviceCommError> {
        message.set_reply_status(STATUS_SUCCESS);
        message.set_reply_information(0);

        match message.descriptor().function {
            IO_CONNECT => self.handle_connect(message),
            IO_DISCONNECT => {
                self.session.set_connected(false);
                Ok(())
            }
            IO_CREATE_OBJECT => self.handle_create_object(message),
            IO_CLOSE_OBJECT => {
                let object = message.descriptor().object;
                if !self.session.close_object(object) {
                    debug!("close for unknown object {object:#x}");
                }
                Ok(())
            }
            IO_RAW_WRITE => self.handle_raw_write(message),
            IO_RAW_READ => self.handle_raw_read(message),
            IO_RAW_FLUSH => Ok(()),
            IO_USER_DEFINED => self.handle_user_defined(message),
            other => {
                warn!("unknown request verb {other:#x}");
                message.set_reply_status(STATUS_NOT_SUPPORTED);
                Ok(())
            }
        }
    }

    fn handle_connect(&mut self, message: &mut ApiMessage<'c, C>) -> Result<(), DeviceCommError> {
        // The connect payload (startup info from the client runtime) is
        // opaque here; fetch it so the driver sees the read.
        let payload_len = message.get_input_buffer()?.len();
        debug!("client connect with {payload_len} payload bytes");

        let input = self.session.allocate_object(ObjectKind::CurrentInput);
        let output = self.session.allocate_object(ObjectKind::CurrentOutput);
        self.session.set_connected(true);

        let info = ConnectionInformation {
            process: message.descriptor().process,
            input,
            output,
        };
        message.set_completion_write_data(&info);
        message.set_reply_information(size_of::<ConnectionInformation>());
        Ok(())
    }

    fn handle_create_object(
        &mut self,
        message: &mut ApiMessage<'c, C>,
    ) -> Result<(), DeviceCommError> {
        let Some(create) = message.packet().create_object().copied() else {
            return Err(DeviceCommError::invalid_data(
                "create-object request without its payload",
            ));
        };

        let kind = ObjectKind::from_object_type(create.create_object.object_type);
        let id = self.session.allocate_object(kind);
        // The object id becomes the driver-visible identity for this
        // handle; later requests carry it in the descriptor.
        message.set_reply_information(id);
        Ok(())
    }

    fn handle_raw_write(&mut self, message: &mut ApiMessage<'c, C>) -> Result<(), DeviceCommError> {
        let bytes = message.get_input_buffer()?.to_vec();
        let text = String::from_utf8_lossy(&bytes);
        let units: Vec<u16> = text.encode_utf16().collect();

        let mode = self.session.output_mode();
        self.interpreter
            .apply(&mut self.screen, self.session.title_mut(), &units, mode);

        message.set_reply_information(bytes.len());
        Ok(())
    }

    fn handle_raw_read(&mut self, message: &mut ApiMessage<'c, C>) -> Result<(), DeviceCommError> {
        let written = {
            let output = message.get_output_buffer()?;
            self.session.read_input_text(output)
        };
        message.set_reply_information(written);
        Ok(())
    }

    fn handle_user_defined(
        &mut self,
        message: &mut ApiMessage<'c, C>,
    ) -> Result<(), DeviceCommError> {
        let Some(packet) = message.packet().user_defined().copied() else {
            return Err(DeviceCommError::invalid_data(
                "user-defined request without its payload",
            ));
        };

        // Input and output sizes count the fixed message portion that
        // already arrived inside the packet; bulk payload follows it.
        let fixed = size_of::<MsgHeader>() as u32 + packet.header.api_descriptor_size;
        message.set_read_offset(fixed);
        message.set_write_offset(fixed);

        match api_family(packet.header.api_number) {
            API_FAMILY_L1 => self.handle_l1(message, &packet),
            API_FAMILY_L2 => self.handle_l2(message, &packet),
            API_FAMILY_L3 => self.handle_l3(message, &packet),
            family => {
                debug!("unsupported api family {family}");
                message.set_reply_status(STATUS_NOT_SUPPORTED);
                Ok(())
            }
        }
    }

    fn handle_l1(
        &mut self,
        message: &mut ApiMessage<'c, C>,
        packet: &UserDefinedPacket,
    ) -> Result<(), DeviceCommError> {
        match api_index(packet.header.api_number) {
            API_L1_GET_CONSOLE_MODE => {
                let kind = self
                    .session
                    .object_kind(message.descriptor().object)
                    .unwrap_or(ObjectKind::CurrentInput);
                let reply = ConsoleModeMsg {
                    mode: self.session.mode_for(kind),
                };
                message.set_completion_write_data(&reply);
                message.set_reply_information(size_of::<ConsoleModeMsg>());
            }
            API_L1_SET_CONSOLE_MODE => {
                let kind = self
                    .session
                    .object_kind(message.descriptor().object)
                    .unwrap_or(ObjectKind::CurrentInput);
                self.session.set_mode_for(kind, packet.console_mode().mode);
            }
            API_L1_GET_SCREEN_BUFFER_INFO => {
                let reply = ScreenBufferInfoMsg {
                    size: self.screen.screen_buffer_size(),
                    cursor_position: self.screen.cursor_position(),
                    attributes: self.screen.current_attributes(),
                    window: self.screen.window_rect(),
                    maximum_window_size: self.screen.screen_buffer_size(),
                };
                message.set_completion_write_data(&reply);
                message.set_reply_information(size_of::<ScreenBufferInfoMsg>());
            }
            API_L1_WRITE_CONSOLE => {
                let unicode = packet.write_console().unicode != 0;
                let bytes = message.get_input_buffer()?.to_vec();
                let units = payload_to_units(&bytes, unicode);

                let mode = self.session.output_mode();
                self.interpreter
                    .apply(&mut self.screen, self.session.title_mut(), &units, mode);
                message.set_reply_information(bytes.len());
            }
            API_L1_READ_CONSOLE => {
                let written = {
                    let output = message.get_output_buffer()?;
                    self.session.read_input_text(output)
                };
                message.set_reply_information(written);
            }
            API_L1_READ_CONSOLE_INPUT => {
                let record_size = size_of::<InputRecord>();
                let written = {
                    let output = message.get_output_buffer()?;
                    let capacity = output.len() / record_size;
                    let records = self.session.pop_input_records(capacity);
                    for (index, record) in records.iter().enumerate() {
                        // SAFETY: InputRecord is plain data; the output
                        // slice has room for `capacity` full records.
                        unsafe {
                            std::ptr::copy_nonoverlapping(
                                record as *const InputRecord as *const u8,
                                output[index * record_size..].as_mut_ptr(),
                                record_size,
                            );
                        }
                    }
                    records.len() * record_size
                };
                message.set_reply_information(written);
            }
            index => {
                debug!("unsupported basic api {index:#x}");
                message.set_reply_status(STATUS_NOT_SUPPORTED);
            }
        }
        Ok(())
    }

    fn handle_l2(
        &mut self,
        message: &mut ApiMessage<'c, C>,
        packet: &UserDefinedPacket,
    ) -> Result<(), DeviceCommError> {
        match api_index(packet.header.api_number) {
            API_L2_GET_CONSOLE_TITLE => {
                let units: Vec<u16> = self.session.title().as_str().encode_utf16().collect();
                let written = {
                    let output = message.get_output_buffer()?;
                    let count = (output.len() / 2).min(units.len());
                    for (index, unit) in units[..count].iter().enumerate() {
                        output[index * 2..index * 2 + 2].copy_from_slice(&unit.to_le_bytes());
                    }
                    count * 2
                };
                message.set_reply_information(written);
            }
            API_L2_SET_CONSOLE_TITLE => {
                let unicode = packet.title().unicode != 0;
                let bytes = message.get_input_buffer()?.to_vec();
                let units = payload_to_units(&bytes, unicode);
                let title = String::from_utf16_lossy(&units);
                self.session.title_mut().set(&title);
            }
            index => {
                debug!("unsupported title api {index:#x}");
                message.set_reply_status(STATUS_NOT_SUPPORTED);
            }
        }
        Ok(())
    }

    fn handle_l3(
        &mut self,
        message: &mut ApiMessage<'c, C>,
        packet: &UserDefinedPacket,
    ) -> Result<(), DeviceCommError> {
        match api_index(packet.header.api_number) {
            API_L3_GET_DISPLAY_MODE => {
                let reply = DisplayModeMsg { mode_flags: 0 };
                message.set_completion_write_data(&reply);
                message.set_reply_information(size_of::<DisplayModeMsg>());
            }
            index => {
                debug!("unsupported window api {index:#x}");
                message.set_reply_status(STATUS_NOT_SUPPORTED);
            }
        }
        Ok(())
    }
}

/// Interpret a bulk payload as text units: UTF-16 little-endian pairs for
/// unicode messages, lossy UTF-8 otherwise.
fn payload_to_units(bytes: &[u8], unicode: bool) -> Vec<u16> {
    if unicode {
        bytes
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    } else {
        String::from_utf8_lossy(bytes).encode_utf16().collect()
    }
}
