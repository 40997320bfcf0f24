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
// Frame Reader: turns a byte stream into a sequence of
// `Frame` values, owning the connection preface check and the
// HEADERS+CONTINUATION reassembly state machine. No other frame type is
// permitted while a header block is in flight (RFC 7540 section 6.10).

use algorithm::buf::{Binary, Bt};

use crate::connection::{Connection, PendingHeaderBlock, HTTP2_MAGIC};
use crate::error::{Http2Error, Reason};
use crate::frame::{Flag, Frame, FrameHeader, Headers, Kind, PushPromise, StreamDependency};
use crate::hpack::Decoder;
use crate::WebResult;

/// Accumulates bytes off the wire and yields fully-parsed frames, one at a
/// time, as enough bytes become available.
pub struct Reader {
    buffer: Vec<u8>,
    expects_preface: bool,
    preface_consumed: bool,
}

impl Reader {
    pub fn new(expects_preface: bool) -> Self {
        Reader {
            buffer: Vec::new(),
            expects_preface,
            preface_consumed: !expects_preface,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Pulls the next complete frame out of the buffered bytes, decoding
    /// any header block (HPACK) it completes along the way. Returns `Ok(None)`
    /// when more bytes are needed.
    pub fn poll_frame(
        &mut self,
        connection: &mut Connection,
        decoder: &mut Decoder,
    ) -> WebResult<Option<Frame<Binary>>> {
        loop {
            if !self.preface_consumed {
                if self.buffer.len() < HTTP2_MAGIC.len() {
                    return Ok(None);
                }
                if &self.buffer[..HTTP2_MAGIC.len()] != HTTP2_MAGIC {
                    return Err(Http2Error::connection(Reason::ProtocolError).into());
                }
                self.buffer.drain(..HTTP2_MAGIC.len());
                self.preface_consumed = true;
            }

            if self.buffer.len() < 9 {
                return Ok(None);
            }
            let mut peek: &[u8] = &self.buffer[..9];
            let header = FrameHeader::parse(&mut peek)?;

            let max_frame_size = connection.config().max_frame_size() as u32;
            if header.length > max_frame_size {
                return Err(Http2Error::connection(Reason::FrameSizeError).into());
            }

            let total = 9 + header.length as usize;
            if self.buffer.len() < total {
                return Ok(None);
            }
            let frame_bytes: Vec<u8> = self.buffer.drain(..total).collect();
            let body = &frame_bytes[9..];

            if connection.pending_headers().is_some() {
                if header.kind() != &Kind::Continuation || header.stream_id() != connection.pending_headers().unwrap().stream_id {
                    return Err(Http2Error::connection(Reason::ProtocolError).into());
                }
                connection.extend_pending_headers(header.stream_id(), body)?;
                if header.flag().is_end_headers() {
                    let pending = connection.take_pending_headers().unwrap();
                    return Ok(Some(finish_pending(pending, decoder)?));
                }
                continue;
            }

            match header.kind() {
                Kind::Continuation => {
                    return Err(Http2Error::connection(Reason::ProtocolError).into());
                }
                Kind::Headers if !header.flag().is_end_headers() => {
                    let pending = start_pending_headers(&header, body)?;
                    connection.begin_pending_headers(pending)?;
                    continue;
                }
                Kind::PushPromise if !header.flag().is_end_headers() => {
                    let pending = start_pending_push_promise(&header, body)?;
                    connection.begin_pending_headers(pending)?;
                    continue;
                }
                _ => {
                    let max_header_list_size = connection.config().max_header_list_size();
                    let frame = Frame::parse(header, Binary::copy_from_slice(body), decoder, max_header_list_size)?;
                    return Ok(Some(frame));
                }
            }
        }
    }
}

fn start_pending_headers(header: &FrameHeader, body: &[u8]) -> WebResult<PendingHeaderBlock> {
    let mut cursor: &[u8] = body;
    let pad_len = Frame::trim_padding(header, &mut cursor)?;
    let usable = cursor
        .len()
        .checked_sub(pad_len as usize)
        .ok_or_else(|| Http2Error::connection(Reason::ProtocolError))?;

    let stream_dep = if header.flag().is_priority() {
        if usable < 5 {
            return Err(Http2Error::connection(Reason::FrameSizeError).into());
        }
        Some(StreamDependency::load(&mut cursor)?)
    } else {
        None
    };
    let consumed_by_dep = if stream_dep.is_some() { 5 } else { 0 };
    let block_len = usable - consumed_by_dep;
    let block = take_bytes(&mut cursor, block_len)?;

    Ok(PendingHeaderBlock {
        stream_id: header.stream_id(),
        promised_id: None,
        stream_dep,
        end_stream: header.flag().is_end_stream(),
        block,
    })
}

fn start_pending_push_promise(header: &FrameHeader, body: &[u8]) -> WebResult<PendingHeaderBlock> {
    let mut cursor: &[u8] = body;
    let pad_len = Frame::trim_padding(header, &mut cursor)?;
    let usable = cursor
        .len()
        .checked_sub(pad_len as usize)
        .ok_or_else(|| Http2Error::connection(Reason::ProtocolError))?;
    if usable < 4 {
        return Err(Http2Error::connection(Reason::FrameSizeError).into());
    }
    let promised_id = crate::frame::StreamIdentifier::parse(&mut cursor);
    let block = take_bytes(&mut cursor, usable - 4)?;

    Ok(PendingHeaderBlock {
        stream_id: header.stream_id(),
        promised_id: Some(promised_id),
        stream_dep: None,
        end_stream: header.flag().is_end_stream(),
        block,
    })
}

fn take_bytes(cursor: &mut &[u8], len: usize) -> WebResult<Vec<u8>> {
    if cursor.remaining() < len {
        return Err(Http2Error::connection(Reason::FrameSizeError).into());
    }
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(cursor.get_u8());
    }
    Ok(out)
}

fn finish_pending(pending: PendingHeaderBlock, decoder: &mut Decoder) -> WebResult<Frame<Binary>> {
    let header_list = decoder.decode(&pending.block)?;
    let mut flags = Flag::zero();
    flags.set_end_headers();
    if pending.end_stream {
        flags.set_end_stream();
    }

    if let Some(promised_id) = pending.promised_id {
        Ok(Frame::PushPromise(PushPromise::new(
            pending.stream_id,
            promised_id,
            flags,
            header_list,
        )))
    } else if let Some(dep) = pending.stream_dep {
        flags.set(Flag::PRIORITY, true);
        Ok(Frame::Headers(Headers::with_priority(
            pending.stream_id,
            flags,
            header_list,
            dep,
        )))
    } else {
        Ok(Frame::Headers(Headers::new(pending.stream_id, flags, header_list)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::connection::Role;
    use algorithm::buf::BinaryMut;

    fn decoder() -> Decoder {
        Decoder::new(4096, usize::MAX)
    }

    fn encode_headers_frame(stream_id: u32, block: &[u8], end_headers: bool) -> Vec<u8> {
        let mut flags = Flag::zero();
        if end_headers {
            flags.set_end_headers();
        }
        let mut head = FrameHeader::new(Kind::Headers, flags, crate::frame::StreamIdentifier::from(stream_id));
        head.length = block.len() as u32;
        let mut out = BinaryMut::new();
        head.encode(&mut out).unwrap();
        out.put_slice(block);
        out.chunk().to_vec()
    }

    fn encode_continuation_frame(stream_id: u32, block: &[u8]) -> Vec<u8> {
        let mut flags = Flag::zero();
        flags.set_end_headers();
        let mut head = FrameHeader::new(Kind::Continuation, flags, crate::frame::StreamIdentifier::from(stream_id));
        head.length = block.len() as u32;
        let mut out = BinaryMut::new();
        head.encode(&mut out).unwrap();
        out.put_slice(block);
        out.chunk().to_vec()
    }

    #[test]
    fn rejects_a_bad_preface() {
        let mut conn = Connection::new(Role::Server, Config::new());
        let mut reader = Reader::new(true);
        let mut dec = decoder();
        reader.feed(b"GET / HTTP/1.1\r\n\r\n");
        let err = reader.poll_frame(&mut conn, &mut dec).unwrap_err();
        assert_eq!(err.as_http2_error().reason(), Reason::ProtocolError);
    }

    #[test]
    fn assembles_a_single_frame_headers_block() {
        let mut conn = Connection::new(Role::Server, Config::new());
        let mut reader = Reader::new(false);
        let mut enc = crate::hpack::Encoder::new(4096);
        let mut dec = decoder();

        let name = crate::header::HeaderName::from_static(":path");
        let value = crate::header::HeaderValue::from_static("/");
        let mut block = Vec::new();
        enc.encode(
            std::iter::once(crate::hpack::EncodableHeader::new(&name, &value)),
            &mut block,
        );

        let bytes = encode_headers_frame(1, &block, true);
        reader.feed(&bytes);
        let frame = reader.poll_frame(&mut conn, &mut dec).unwrap().unwrap();
        match frame {
            Frame::Headers(h) => {
                assert!(h.is_end_headers());
                assert_eq!(h.header_list().len(), 1);
            }
            _ => panic!("expected a Headers frame"),
        }
    }

    #[test]
    fn reassembles_a_headers_block_split_across_a_continuation() {
        let mut conn = Connection::new(Role::Server, Config::new());
        let mut reader = Reader::new(false);
        let mut enc = crate::hpack::Encoder::new(4096);
        let mut dec = decoder();

        let name = crate::header::HeaderName::from_static(":path");
        let value = crate::header::HeaderValue::from_static("/");
        let mut block = Vec::new();
        enc.encode(
            std::iter::once(crate::hpack::EncodableHeader::new(&name, &value)),
            &mut block,
        );
        let split = block.len() / 2 + 1;
        let (first, second) = block.split_at(split.min(block.len()));

        let mut bytes = encode_headers_frame(1, first, false);
        bytes.extend(encode_continuation_frame(1, second));
        reader.feed(&bytes);

        let frame = reader.poll_frame(&mut conn, &mut dec).unwrap().unwrap();
        match frame {
            Frame::Headers(h) => {
                assert!(h.is_end_headers());
                assert_eq!(h.header_list().len(), 1);
            }
            _ => panic!("expected a reassembled Headers frame"),
        }
    }

    #[test]
    fn a_frame_of_a_different_kind_mid_header_block_is_a_protocol_error() {
        let mut conn = Connection::new(Role::Server, Config::new());
        let mut reader = Reader::new(false);
        let mut dec = decoder();

        let bytes = encode_headers_frame(1, &[0x82], false);
        reader.feed(&bytes);
        reader.poll_frame(&mut conn, &mut dec).unwrap();

        let mut ping_buf = BinaryMut::new();
        crate::frame::Ping::ping([0; 8]).encode(&mut ping_buf).unwrap();
        reader.feed(ping_buf.chunk());
        let err = reader.poll_frame(&mut conn, &mut dec).unwrap_err();
        assert_eq!(err.as_http2_error().reason(), Reason::ProtocolError);
    }

    #[test]
    fn waits_for_more_bytes_when_the_frame_is_incomplete() {
        let mut conn = Connection::new(Role::Server, Config::new());
        let mut reader = Reader::new(false);
        let mut dec = decoder();
        reader.feed(&[0, 0, 5, 0, 0, 0, 0, 0, 1]);
        assert!(reader.poll_frame(&mut conn, &mut dec).unwrap().is_none());
    }
}
