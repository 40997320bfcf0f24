// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh
// -----
// Created Date: 2023/09/01 04:34:25

use algorithm::buf::{Bt, BtMut};

use crate::error::{Http2Error, Reason};
use crate::hpack::{Decoder, EncodableHeader, Encoder};
use crate::header::HeaderList;
use crate::WebResult;

use super::{frame::Frame, Flag, FrameHeader, Kind, StreamDependency, StreamIdentifier};

/// A HEADERS frame: the decoded header block plus the framing metadata
/// (stream dependency, padding) carried alongside it. The header block
/// itself is always fully reassembled by the caller (the frame reader owns
/// HEADERS/CONTINUATION accumulation) before this type is built.
#[derive(Debug, Eq, PartialEq)]
pub struct Headers {
    stream_id: StreamIdentifier,
    stream_dep: Option<StreamDependency>,
    header_list: HeaderList,
    flags: Flag,
}

/// A PUSH_PROMISE frame: the decoded header block for the promised request,
/// plus the id HTTP/2 reserves for the pushed stream.
#[derive(Debug, Eq, PartialEq)]
pub struct PushPromise {
    stream_id: StreamIdentifier,
    promised_id: StreamIdentifier,
    header_list: HeaderList,
    flags: Flag,
}

impl Headers {
    pub fn new(stream_id: StreamIdentifier, flags: Flag, header_list: HeaderList) -> Self {
        Headers {
            stream_id,
            stream_dep: None,
            header_list,
            flags,
        }
    }

    pub fn with_priority(
        stream_id: StreamIdentifier,
        flags: Flag,
        header_list: HeaderList,
        stream_dep: StreamDependency,
    ) -> Self {
        Headers {
            stream_id,
            stream_dep: Some(stream_dep),
            header_list,
            flags,
        }
    }

    pub fn empty() -> Self {
        Headers {
            stream_id: StreamIdentifier::zero(),
            stream_dep: None,
            header_list: HeaderList::new(),
            flags: Flag::zero(),
        }
    }

    /// Parses a HEADERS frame whose payload has already had PADDED
    /// stripped by the reader; `buf` holds the optional PRIORITY block
    /// followed by the full, reassembled header block fragment (HEADERS +
    /// any CONTINUATION).
    pub fn parse<T: Bt>(
        header: FrameHeader,
        mut buf: T,
        pad_len: u8,
        decoder: &mut Decoder,
        max_header_list_size: usize,
    ) -> WebResult<Self> {
        let _ = max_header_list_size;
        let flags = header.flag();
        let mut usable = buf
            .remaining()
            .checked_sub(pad_len as usize)
            .ok_or_else(|| Http2Error::connection(Reason::ProtocolError))?;

        let stream_dep = if flags.is_priority() {
            if usable < 5 {
                return Err(Http2Error::connection(Reason::FrameSizeError).into());
            }
            let dep = StreamDependency::load(&mut buf)?;
            usable -= 5;
            Some(dep)
        } else {
            None
        };

        let mut block = Vec::with_capacity(usable);
        for _ in 0..usable {
            if !buf.has_remaining() {
                return Err(Http2Error::connection(Reason::FrameSizeError).into());
            }
            block.push(buf.get_u8());
        }

        let header_list = decoder.decode(&block)?;

        Ok(Headers {
            stream_id: header.stream_id(),
            stream_dep,
            header_list,
            flags,
        })
    }

    pub fn stream_id(&self) -> StreamIdentifier {
        self.stream_id
    }

    pub fn stream_dependency(&self) -> Option<&StreamDependency> {
        self.stream_dep.as_ref()
    }

    pub fn flags(&self) -> Flag {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut Flag {
        &mut self.flags
    }

    pub fn is_end_headers(&self) -> bool {
        self.flags.is_end_headers()
    }

    pub fn set_end_headers(&mut self) {
        self.flags.set_end_headers();
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags.is_end_stream()
    }

    pub fn set_end_stream(&mut self) {
        self.flags.set_end_stream()
    }

    pub fn header_list(&self) -> &HeaderList {
        &self.header_list
    }

    pub fn into_header_list(self) -> HeaderList {
        self.header_list
    }

    /// Encodes the header block with `encoder`, then splits it across a
    /// HEADERS frame plus as many CONTINUATION frames as `max_frame_size`
    /// requires, setting END_HEADERS only on the last one.
    pub fn encode<B: Bt + BtMut>(
        self,
        encoder: &mut Encoder,
        max_frame_size: usize,
        dst: &mut B,
    ) -> WebResult<usize> {
        let mut block = Vec::new();
        encoder.encode(
            self.header_list
                .iter()
                .map(|(n, v)| EncodableHeader::new(n, v)),
            &mut block,
        );
        encode_fragmented(
            Kind::Headers,
            self.stream_id,
            self.flags,
            &block,
            max_frame_size,
            dst,
        )
    }
}

impl<T> From<Headers> for Frame<T> {
    fn from(src: Headers) -> Self {
        Frame::Headers(src)
    }
}

// ===== impl PushPromise =====

impl PushPromise {
    pub fn new(
        stream_id: StreamIdentifier,
        promised_id: StreamIdentifier,
        flags: Flag,
        header_list: HeaderList,
    ) -> Self {
        PushPromise {
            stream_id,
            promised_id,
            header_list,
            flags,
        }
    }

    pub fn parse<T: Bt>(
        head: FrameHeader,
        mut buf: T,
        pad_len: u8,
        decoder: &mut Decoder,
        max_header_list_size: usize,
    ) -> WebResult<Self> {
        let _ = max_header_list_size;
        let usable = buf
            .remaining()
            .checked_sub(pad_len as usize)
            .ok_or_else(|| Http2Error::connection(Reason::ProtocolError))?;
        if usable < 4 {
            return Err(Http2Error::connection(Reason::FrameSizeError).into());
        }
        let promised_id = StreamIdentifier::parse(&mut buf);
        let block_len = usable - 4;

        let mut block = Vec::with_capacity(block_len);
        for _ in 0..block_len {
            if !buf.has_remaining() {
                return Err(Http2Error::connection(Reason::FrameSizeError).into());
            }
            block.push(buf.get_u8());
        }
        let header_list = decoder.decode(&block)?;

        Ok(PushPromise {
            stream_id: head.stream_id(),
            promised_id,
            header_list,
            flags: head.flag(),
        })
    }

    pub fn stream_id(&self) -> StreamIdentifier {
        self.stream_id
    }

    pub fn promised_id(&self) -> StreamIdentifier {
        self.promised_id
    }

    pub fn flags(&self) -> Flag {
        self.flags
    }

    pub fn flags_mut(&mut self) -> &mut Flag {
        &mut self.flags
    }

    pub fn is_end_headers(&self) -> bool {
        self.flags.is_end_headers()
    }

    pub fn set_end_headers(&mut self) {
        self.flags.set_end_headers();
    }

    pub fn header_list(&self) -> &HeaderList {
        &self.header_list
    }

    pub fn into_header_list(self) -> HeaderList {
        self.header_list
    }

    pub fn encode<B: Bt + BtMut>(
        self,
        encoder: &mut Encoder,
        max_frame_size: usize,
        dst: &mut B,
    ) -> WebResult<usize> {
        let mut block = self.promised_id.0.to_be_bytes().to_vec();
        encoder.encode(
            self.header_list
                .iter()
                .map(|(n, v)| EncodableHeader::new(n, v)),
            &mut block,
        );
        encode_fragmented(
            Kind::PushPromise,
            self.stream_id,
            self.flags,
            &block,
            max_frame_size,
            dst,
        )
    }
}

impl<T> From<PushPromise> for Frame<T> {
    fn from(src: PushPromise) -> Self {
        Frame::PushPromise(src)
    }
}

/// Splits an already-HPACK-encoded header block into a leading frame of
/// `kind` plus trailing CONTINUATION frames, each capped at
/// `max_frame_size` octets of payload, with END_HEADERS set only on the
/// final frame.
fn encode_fragmented<B: Bt + BtMut>(
    kind: Kind,
    stream_id: StreamIdentifier,
    mut flags: Flag,
    block: &[u8],
    max_frame_size: usize,
    dst: &mut B,
) -> WebResult<usize> {
    let max_frame_size = max_frame_size.max(1);
    let mut chunks: Vec<&[u8]> = block.chunks(max_frame_size).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }

    let mut size = 0;
    let last = chunks.len() - 1;
    for (idx, chunk) in chunks.iter().enumerate() {
        let (frame_kind, frame_flags) = if idx == 0 {
            let mut first_flags = flags;
            if last == 0 {
                first_flags.set_end_headers();
            } else {
                first_flags.unset_end_headers();
            }
            (kind, first_flags)
        } else if idx == last {
            flags.set_end_headers();
            (Kind::Continuation, flags)
        } else {
            (Kind::Continuation, Flag::zero())
        };

        let mut head = FrameHeader::new(frame_kind, frame_flags, stream_id);
        head.length = chunk.len() as u32;
        size += head.encode(dst)?;
        size += dst.put_slice(chunk);
    }
    log::trace!(
        "HTTP2: encoding {:?}({}); frames={} len={}",
        kind,
        stream_id,
        chunks.len(),
        block.len()
    );
    Ok(size)
}
