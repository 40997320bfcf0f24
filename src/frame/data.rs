// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh

use algorithm::buf::{Binary, Bt, BtMut};

use crate::WebResult;

use super::{Flag, FrameHeader, Kind, StreamIdentifier};

/// RFC 7540 section 6.9: padding octets (and the Pad Length field itself)
/// count toward flow control even though they never reach the listener.
/// Tracking `pad_len` separately from the payload buffer lets the stream's
/// flow controller consume the full wire length while `real_payload` hands
/// the application only the real bytes.

#[derive(Eq, PartialEq, Debug)]
pub struct Data<T = Binary> {
    stream_id: StreamIdentifier,
    data: T,
    flags: Flag,
    pad_len: Option<u8>,
}

impl<T> Data<T> {
    pub fn new(header: FrameHeader, payload: T) -> Self {
        assert!(!header.stream_id().is_zero());

        Data {
            stream_id: header.stream_id(),
            data: payload,
            flags: header.flag(),
            pad_len: None,
        }
    }

    pub fn stream_id(&self) -> StreamIdentifier {
        self.stream_id
    }

    pub fn is_end_stream(&self) -> bool {
        self.flags.is_end_stream()
    }

    pub fn set_end_stream(&mut self, val: bool) {
        if val {
            self.flags.set_end_stream();
        } else {
            self.flags.unset_end_stream();
        }
    }

    pub fn flags(&self) -> Flag {
        self.flags
    }

    pub fn is_padded(&self) -> bool {
        self.flags.is_padded()
    }

    pub fn set_padded(&mut self) {
        self.flags.set_padded();
    }

    pub fn payload(&self) -> &T {
        &self.data
    }

    pub fn payload_mut(&mut self) -> &mut T {
        &mut self.data
    }

    pub fn into_payload(self) -> T {
        self.data
    }

    pub fn pad_len(&self) -> u8 {
        self.pad_len.unwrap_or(0)
    }

    pub fn set_pad_len(&mut self, pad_len: u8) {
        self.pad_len = if pad_len == 0 { None } else { Some(pad_len) };
    }

    /// Total octets this frame consumed from the flow-control window:
    /// the real payload, any trailing padding, and the Pad Length field
    /// itself when present (RFC 7540 section 6.9.1), not just the bytes
    /// delivered to the listener.
    pub fn flow_controlled_len(&self) -> usize
    where
        T: Bt,
    {
        let pad_len_field = if self.flags.is_padded() { 1 } else { 0 };
        self.data.remaining() + pad_len_field
    }

    /// The payload bytes actually meant for the listener, with trailing
    /// padding stripped.
    pub fn real_payload(&self) -> &[u8]
    where
        T: Bt,
    {
        let chunk = self.data.chunk();
        let pad = self.pad_len() as usize;
        let len = chunk.len().saturating_sub(pad);
        &chunk[..len]
    }

    pub(crate) fn map<F, U>(self, f: F) -> Data<U>
    where
        F: FnOnce(T) -> U,
    {
        Data {
            stream_id: self.stream_id,
            data: f(self.data),
            flags: self.flags,
            pad_len: self.pad_len,
        }
    }
}

impl<T: Bt> Data<T> {
    pub(crate) fn head(&self) -> FrameHeader {
        let mut head = FrameHeader::new(Kind::Data, self.flags, self.stream_id);
        head.length = self.data.remaining() as u32;
        head
    }

    pub fn encode<B: Bt + BtMut>(&mut self, dst: &mut B) -> WebResult<usize> {
        let head = self.head();
        log::trace!("HTTP2: encoding DATA; len={}", head.length);
        let mut size = 0;
        size += head.encode(dst)?;
        size += dst.put_slice(self.data.chunk());
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algorithm::buf::BinaryMut;

    #[test]
    fn encodes_the_frame_header_with_the_payload_length() {
        let header = FrameHeader::new(Kind::Data, Flag::zero(), StreamIdentifier::from(3));
        let mut data = Data::new(header, BinaryMut::from(b"hello".to_vec()));
        let mut out = BinaryMut::new();
        let size = data.encode(&mut out).unwrap();
        assert_eq!(size, 9 + 5);
    }

    #[test]
    fn real_payload_strips_trailing_padding() {
        let header = FrameHeader::new(Kind::Data, Flag::zero(), StreamIdentifier::from(3));
        let mut data = Data::new(header, BinaryMut::from(b"hello\0\0\0".to_vec()));
        data.set_padded();
        data.set_pad_len(3);
        assert_eq!(data.real_payload(), b"hello");
        assert_eq!(data.flow_controlled_len(), 8 + 1);
    }

    #[test]
    fn end_stream_flag_round_trips() {
        let header = FrameHeader::new(Kind::Data, Flag::zero(), StreamIdentifier::from(3));
        let mut data = Data::new(header, BinaryMut::new());
        assert!(!data.is_end_stream());
        data.set_end_stream(true);
        assert!(data.is_end_stream());
        data.set_end_stream(false);
        assert!(!data.is_end_stream());
    }
}
