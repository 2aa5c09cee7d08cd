//! Per-request message wrapper around the ConDrv protocol.
//!
//! Every packet returned by read-io is wrapped in an `ApiMessage` for the
//! duration of its dispatch. The message owns the request's buffers:
//! input payload is pulled lazily (and at most once) through read-input,
//! output is staged in memory and flushed through write-output exactly
//! once when the reply status is success, and small inline reply values
//! ride the completion record itself.
//!
//! The completion's inline-write descriptor points into storage owned by
//! this message, so the message must outlive delivery of its completion.
//! The dispatch loop keeps the previous message alive until the chained
//! read-io call returns.

use condrv::errors::DeviceCommError;
use condrv::packet::{IoComplete, IoDescriptor, IoOperation, IoPacket};
use condrv::status::{nt_success, NtStatus};

use crate::communications::DeviceComm;

pub struct ApiMessage<'c, C: DeviceComm> {
    comm: Option<&'c C>,
    packet: IoPacket,
    complete: IoComplete,
    read_offset: u32,
    write_offset: u32,
    input_storage: Option<Vec<u8>>,
    output_storage: Option<Vec<u8>>,
    completion_write_storage: Vec<u8>,
}

impl<'c, C: DeviceComm> ApiMessage<'c, C> {
    /// Wrap a freshly read packet. The completion identifier is staged
    /// immediately so even an untouched message can be completed.
    pub fn new(comm: &'c C, packet: IoPacket) -> Self {
        ApiMessage {
            comm: Some(comm),
            complete: IoComplete::new(packet.descriptor.identifier),
            packet,
            read_offset: 0,
            write_offset: 0,
            input_storage: None,
            output_storage: None,
            completion_write_storage: Vec::new(),
        }
    }

    /// A message with no comm attached. Every I/O entry point fails with
    /// an invalid-state error; useful as a placeholder slot.
    pub fn detached(packet: IoPacket) -> Self {
        ApiMessage {
            comm: None,
            complete: IoComplete::new(packet.descriptor.identifier),
            packet,
            read_offset: 0,
            write_offset: 0,
            input_storage: None,
            output_storage: None,
            completion_write_storage: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &IoDescriptor {
        &self.packet.descriptor
    }

    pub fn packet(&self) -> &IoPacket {
        &self.packet
    }

    /// The staged completion record.
    pub fn completion(&self) -> &IoComplete {
        &self.complete
    }

    pub fn set_reply_status(&mut self, status: NtStatus) {
        self.complete.io_status.status = status;
    }

    pub fn set_reply_information(&mut self, information: usize) {
        self.complete.io_status.information = information;
    }

    pub fn reply_status(&self) -> NtStatus {
        self.complete.io_status.status
    }

    /// Copy `value` into message-owned storage and point the completion's
    /// inline-write descriptor at it. The driver copies that payload to
    /// the client when the completion is delivered.
    ///
    /// `T` must be plain data without padding; all reply structures on
    /// this protocol are.
    pub fn set_completion_write_data<T: Copy>(&mut self, value: &T) {
        let size = size_of::<T>();
        // SAFETY: T is Copy plain data; reading its object representation
        // as bytes is valid for the packed reply structures used here.
        let bytes = unsafe { std::slice::from_raw_parts(value as *const T as *const u8, size) };
        self.completion_write_storage.clear();
        self.completion_write_storage.extend_from_slice(bytes);

        // The Vec's heap allocation keeps this address stable even if the
        // message itself moves before the completion is delivered.
        self.complete.write.data = self.completion_write_storage.as_mut_ptr();
        self.complete.write.size = size as u32;
        self.complete.write.offset = 0;
    }

    /// Skip the first `offset` bytes of the declared input payload. Must
    /// be set before the first `get_input_buffer` call.
    pub fn set_read_offset(&mut self, offset: u32) {
        self.read_offset = offset;
    }

    /// Reserve the first `offset` bytes of the client's output buffer.
    /// Must be set before the first `get_output_buffer` call.
    pub fn set_write_offset(&mut self, offset: u32) {
        self.write_offset = offset;
    }

    /// The request's input payload, fetched from the driver on first use
    /// and cached for the rest of the message's life.
    pub fn get_input_buffer(&mut self) -> Result<&[u8], DeviceCommError> {
        let comm = self
            .comm
            .ok_or_else(|| DeviceCommError::invalid_state("get_input_buffer"))?;

        if self.input_storage.is_none() {
            let input_size = self.packet.descriptor.input_size;
            if self.read_offset > input_size {
                return Err(DeviceCommError::invalid_data(
                    "input read offset exceeds input size",
                ));
            }

            let remaining = input_size - self.read_offset;
            let mut storage = vec![0u8; remaining as usize];
            if remaining != 0 {
                let mut operation = IoOperation {
                    identifier: self.packet.descriptor.identifier,
                    ..Default::default()
                };
                operation.buffer.data = storage.as_mut_ptr();
                operation.buffer.size = remaining;
                operation.buffer.offset = self.read_offset;
                comm.read_input(&mut operation)?;
            }
            self.input_storage = Some(storage);
        }

        Ok(self.input_storage.as_deref().unwrap_or(&[]))
    }

    /// A zero-initialized staging buffer sized to the client's output
    /// buffer minus the write offset. No I/O happens here; the dispatcher
    /// fills the buffer in place and `release_message_buffers` flushes it.
    pub fn get_output_buffer(&mut self) -> Result<&mut [u8], DeviceCommError> {
        if self.comm.is_none() {
            return Err(DeviceCommError::invalid_state("get_output_buffer"));
        }

        if self.output_storage.is_none() {
            let output_size = self.packet.descriptor.output_size;
            if self.write_offset > output_size {
                return Err(DeviceCommError::invalid_data(
                    "output write offset exceeds output size",
                ));
            }
            let remaining = output_size - self.write_offset;
            self.output_storage = Some(vec![0u8; remaining as usize]);
        }

        Ok(self.output_storage.as_deref_mut().unwrap_or(&mut []))
    }

    /// Flush the staged output buffer and drop both payload buffers.
    ///
    /// On a success status the staged bytes up to the reply information
    /// count are pushed through write-output at the write offset; the
    /// count is validated against the buffer first. On a failure status
    /// nothing is pushed.
    pub fn release_message_buffers(&mut self) -> Result<(), DeviceCommError> {
        let comm = self
            .comm
            .ok_or_else(|| DeviceCommError::invalid_state("release_message_buffers"))?;

        self.input_storage = None;

        let Some(output) = self.output_storage.as_mut() else {
            return Ok(());
        };

        if nt_success(self.complete.io_status.status) {
            let information = self.complete.io_status.information;
            if information > output.len() {
                return Err(DeviceCommError::invalid_data(
                    "completion information exceeds output buffer size",
                ));
            }

            let mut operation = IoOperation {
                identifier: self.packet.descriptor.identifier,
                ..Default::default()
            };
            operation.buffer.data = output.as_mut_ptr();
            operation.buffer.size = information as u32;
            operation.buffer.offset = self.write_offset;
            comm.write_output(&operation)?;
        }

        self.output_storage = None;
        Ok(())
    }

    /// Deliver the staged completion out of band.
    pub fn complete_io(&self) -> Result<(), DeviceCommError> {
        let comm = self
            .comm
            .ok_or_else(|| DeviceCommError::invalid_state("complete_io"))?;
        comm.complete_io(&self.complete)
    }
}
