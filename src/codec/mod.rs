// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
//
// The sans-io HTTP/2 codec: wires together the frame reader/writer, HPACK
// state, connection bookkeeping, and the listener callback surface into a
// single `Codec` driven by `feed`/`send_*` calls.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

use algorithm::buf::{BinaryMut, Bt};

use crate::config::Config;
use crate::connection::{Connection, Role};
use crate::decompress::Decompressor;
use crate::error::Reason;
use crate::frame::{Frame, GoAway, Headers, Ping, Reset, Settings, StreamIdentifier, WindowUpdate};
use crate::header::HeaderList;
use crate::hpack::{Decoder, Encoder};
use crate::listener::Listener;
use crate::WebResult;

pub struct Codec {
    connection: Connection,
    reader: Reader,
    writer: Writer,
    decoder: Decoder,
    encoder: Encoder,
    pending_window_updates: Vec<(StreamIdentifier, u32)>,
}

impl Codec {
    pub fn new(role: Role, config: Config) -> Self {
        let expects_preface = role == Role::Server;
        let decoder = Decoder::new(config.header_table_size(), config.max_header_list_size());
        let mut encoder = Encoder::new(config.header_table_size());
        encoder.set_huffman_enabled(config.huffman_enabled());
        let writer = Writer::new(config.max_frame_size() as usize);
        Codec {
            connection: Connection::new(role, config),
            reader: Reader::new(expects_preface),
            writer,
            decoder,
            encoder,
            pending_window_updates: Vec::new(),
        }
    }

    /// Encodes every auto-generated WINDOW_UPDATE queued up by `feed` into
    /// `dst`: once the local controller's ratio threshold is crossed, the
    /// increment must go back out on the wire.
    pub fn drain_pending_writes(&mut self, dst: &mut BinaryMut) -> WebResult<usize> {
        let mut size = 0;
        for (stream_id, increment) in self.pending_window_updates.drain(..) {
            let update = WindowUpdate::new(stream_id, increment);
            size += self
                .writer
                .write_frame(Frame::<algorithm::buf::Binary>::WindowUpdate(update), &mut self.encoder, dst)?;
        }
        Ok(size)
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Feeds freshly-read bytes into the codec and drains every frame that
    /// becomes fully available, dispatching each to `listener`.
    pub fn feed<L: Listener>(&mut self, bytes: &[u8], listener: &mut L) -> WebResult<()> {
        self.reader.feed(bytes);
        loop {
            let frame = match self.reader.poll_frame(&mut self.connection, &mut self.decoder) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(()),
                Err(e) => return Err(e),
            };
            self.dispatch(frame, listener)?;
        }
    }

    fn dispatch<L: Listener>(&mut self, frame: Frame<algorithm::buf::Binary>, listener: &mut L) -> WebResult<()> {
        match frame {
            Frame::Headers(headers) => self.on_headers(headers, listener)?,
            Frame::Data(data) => self.on_data(data, listener)?,
            Frame::PushPromise(push) => self.on_push_promise(push, listener)?,
            Frame::Priority(priority) => {
                let (stream_id, dependency_id, weight) = priority.into();
                self.connection
                    .priority_tree()
                    .reprioritize(stream_id, dependency_id, weight, false);
            }
            Frame::Reset(reset) => {
                self.connection.record_remote_reset(0)?;
                self.connection.closes_stream(reset.stream_id());
                listener.on_rst_stream_read(reset.stream_id(), reset.reason());
            }
            Frame::Settings(settings) => self.on_settings(settings, listener)?,
            Frame::Ping(ping) => self.on_ping(ping, listener)?,
            Frame::GoAway(goaway) => {
                listener.on_go_away_read(goaway.last_stream_id(), goaway.reason(), goaway.debug_data().chunk());
                self.connection.note_goaway_received(goaway);
            }
            Frame::WindowUpdate(update) => self.on_window_update(update, listener)?,
        }
        Ok(())
    }

    fn on_headers<L: Listener>(&mut self, headers: Headers, listener: &mut L) -> WebResult<()> {
        let stream_id = headers.stream_id();
        let end_stream = headers.is_end_stream();

        if let Some(dep) = headers.stream_dependency() {
            self.connection.priority_tree().reprioritize(
                stream_id,
                dep.dependency_id(),
                dep.weight(),
                dep.is_exclusive(),
            );
        }

        {
            let stream = self.connection.get_or_create_stream(stream_id, true)?;
            stream.recv_headers(end_stream)?;
        }

        let mut header_list = headers.into_header_list();
        if let Some(decompressor) = Decompressor::install_from_headers(stream_id, &mut header_list) {
            self.connection.install_decompressor(stream_id, decompressor);
        }

        listener.on_headers_read(stream_id, header_list, end_stream);
        Ok(())
    }

    fn on_push_promise<L: Listener>(&mut self, push: crate::frame::PushPromise, listener: &mut L) -> WebResult<()> {
        let stream_id = push.stream_id();
        let promised_id = push.promised_id();
        {
            let stream = self.connection.get_or_create_stream(promised_id, true)?;
            stream.recv_push_promise()?;
        }
        listener.on_push_promise_read(stream_id, promised_id, push.into_header_list());
        Ok(())
    }

    fn on_data<L: Listener>(&mut self, data: crate::frame::Data<algorithm::buf::Binary>, listener: &mut L) -> WebResult<()> {
        let stream_id = data.stream_id();
        let end_stream = data.is_end_stream();
        let flow_len = data.flow_controlled_len();
        let payload = data.real_payload().to_vec();
        // Padding and the Pad Length field are charged against the window
        // (RFC 7540 section 6.9.1) but never reach the listener, so that
        // overhead can be credited straight back.
        let overhead = flow_len.saturating_sub(payload.len()) as u32;

        self.connection.local_window().receive_data(StreamIdentifier::zero(), flow_len)?;
        {
            let stream = self.connection.get_or_create_stream(stream_id, true)?;
            stream.local_window().receive_data(stream_id, flow_len)?;
            if end_stream {
                stream.recv_end_stream()?;
            }
        }

        let decoded = if let Some(decompressor) = self.connection.decompressor_for(stream_id) {
            decompressor.push(&payload)?
        } else {
            payload
        };

        let consumed_decoded = listener.on_data_read(stream_id, &decoded, end_stream);
        let consumed_wire = if consumed_decoded == 0 {
            0
        } else if let Some(decompressor) = self.connection.decompressor_for(stream_id) {
            decompressor.consume_decompressed(consumed_decoded as u64)? as u32
        } else {
            consumed_decoded as u32
        };

        let to_return = overhead + consumed_wire;
        if to_return > 0 {
            if let Some(increment) = self.connection.local_window().consume_bytes(to_return) {
                self.pending_window_updates.push((StreamIdentifier::zero(), increment));
            }
            if let Some(stream) = self.connection.stream_mut(stream_id) {
                if let Some(increment) = stream.local_window().consume_bytes(to_return) {
                    self.pending_window_updates.push((stream_id, increment));
                }
            }
        }
        Ok(())
    }

    fn on_settings<L: Listener>(&mut self, settings: Settings, listener: &mut L) -> WebResult<()> {
        if settings.is_ack() {
            self.connection.mark_local_settings_acked();
            listener.on_settings_ack_read();
            return Ok(());
        }
        self.connection.apply_remote_settings(&settings)?;
        if let Some(table_size) = settings.header_table_size() {
            // SETTINGS_HEADER_TABLE_SIZE from the peer bounds how large a
            // dynamic table update *our* encoder may announce when encoding
            // headers destined for them; it says nothing about our own
            // decoder, whose capacity we control locally.
            self.encoder.set_max_header_table_size(table_size as usize);
        }
        listener.on_settings_read(&settings);
        Ok(())
    }

    fn on_ping<L: Listener>(&mut self, ping: Ping, listener: &mut L) -> WebResult<()> {
        if ping.is_ack() {
            self.connection.observe_pong(ping.payload());
            listener.on_ping_ack_read(ping.payload());
        } else {
            listener.on_ping_read(ping.payload());
        }
        Ok(())
    }

    fn on_window_update<L: Listener>(&mut self, update: WindowUpdate, listener: &mut L) -> WebResult<()> {
        let stream_id = update.stream_id();
        if stream_id.is_zero() {
            self.connection.remote_window().apply_window_update(stream_id, update.size_increment())?;
        } else {
            let stream = self.connection.get_or_create_stream(stream_id, true)?;
            stream.remote_window().apply_window_update(stream_id, update.size_increment())?;
        }
        listener.on_window_update_read(stream_id, update.size_increment());
        Ok(())
    }

    /// Encodes the client connection preface plus the initial SETTINGS
    /// frame (RFC 7540 section 3.5) into `dst`.
    pub fn send_preface(&mut self, dst: &mut BinaryMut) -> WebResult<usize> {
        let mut size = 0;
        if self.connection.role() == Role::Client {
            size += dst.put_slice(crate::connection::HTTP2_MAGIC);
        }
        let settings = self.connection.local_preface_settings();
        size += self.writer.write_frame(Frame::<algorithm::buf::Binary>::Settings(settings), &mut self.encoder, dst)?;
        Ok(size)
    }

    pub fn send_settings_ack(&mut self, dst: &mut BinaryMut) -> WebResult<usize> {
        self.writer
            .write_frame(Frame::<algorithm::buf::Binary>::Settings(Settings::ack()), &mut self.encoder, dst)
    }

    pub fn send_headers(&mut self, stream_id: StreamIdentifier, header_list: HeaderList, end_stream: bool, dst: &mut BinaryMut) -> WebResult<usize> {
        {
            let stream = self.connection.get_or_create_stream(stream_id, false)?;
            stream.send_headers(end_stream)?;
        }
        let mut flags = crate::frame::Flag::zero();
        flags.set_end_headers();
        if end_stream {
            flags.set_end_stream();
        }
        let headers = Headers::new(stream_id, flags, header_list);
        self.writer.write_headers(headers, &mut self.encoder, dst)
    }

    pub fn send_data(&mut self, stream_id: StreamIdentifier, body: &[u8], end_stream: bool, dst: &mut BinaryMut) -> WebResult<usize> {
        self.connection.remote_window().consume(body.len());
        {
            let stream = self.connection.get_or_create_stream(stream_id, false)?;
            stream.remote_window().consume(body.len());
            if end_stream {
                stream.send_end_stream()?;
            }
        }
        self.writer.write_data(stream_id, body, end_stream, dst)
    }

    pub fn send_ping(&mut self, payload: [u8; 8], dst: &mut BinaryMut) -> WebResult<usize> {
        let ping = self.connection.ping(payload);
        self.writer.write_frame(Frame::<algorithm::buf::Binary>::Ping(ping), &mut self.encoder, dst)
    }

    pub fn send_window_update(&mut self, stream_id: StreamIdentifier, increment: u32, dst: &mut BinaryMut) -> WebResult<usize> {
        let update = WindowUpdate::new(stream_id, increment);
        self.writer.write_frame(Frame::<algorithm::buf::Binary>::WindowUpdate(update), &mut self.encoder, dst)
    }

    pub fn send_reset(&mut self, stream_id: StreamIdentifier, reason: Reason, dst: &mut BinaryMut) -> WebResult<usize> {
        self.connection.closes_stream(stream_id);
        let reset = Reset::new(stream_id, reason);
        self.writer.write_frame(Frame::<algorithm::buf::Binary>::Reset(reset), &mut self.encoder, dst)
    }

    pub fn send_go_away(&mut self, reason: Reason, dst: &mut BinaryMut) -> WebResult<usize> {
        let last_stream_id = self
            .connection
            .open_stream_ids()
            .into_iter()
            .max()
            .unwrap_or_else(StreamIdentifier::zero);
        let goaway = GoAway::new(last_stream_id, reason);
        self.connection.note_goaway_sent(goaway.clone());
        self.writer.write_frame(Frame::<algorithm::buf::Binary>::GoAway(goaway), &mut self.encoder, dst)
    }
}
