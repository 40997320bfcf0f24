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
// Frame Writer: encodes outbound frames, splitting HEADERS
// and DATA across as many frames as `max_frame_size` requires. The actual
// per-kind byte layout lives on each frame type; this module is the single
// place that knows how to turn a logical "send these headers"/"send this
// body" request into the right frame sequence.

use algorithm::buf::{Bt, BtMut};

use crate::frame::{Data, Flag, Frame, FrameHeader, Headers, Kind, StreamIdentifier};
use crate::hpack::Encoder;
use crate::WebResult;

pub struct Writer {
    max_frame_size: usize,
}

impl Writer {
    pub fn new(max_frame_size: usize) -> Self {
        Writer { max_frame_size }
    }

    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }

    /// Encodes a HEADERS frame (plus CONTINUATION frames as needed) into
    /// `dst`, returning the number of bytes written.
    pub fn write_headers<B: Bt + BtMut>(&self, headers: Headers, encoder: &mut Encoder, dst: &mut B) -> WebResult<usize> {
        headers.encode(encoder, self.max_frame_size, dst)
    }

    /// Splits `body` into as many DATA frames as `max_frame_size` requires,
    /// setting END_STREAM only on the last one when `end_stream` is set.
    pub fn write_data<B: Bt + BtMut>(&self, stream_id: StreamIdentifier, body: &[u8], end_stream: bool, dst: &mut B) -> WebResult<usize> {
        let max_frame_size = self.max_frame_size.max(1);
        let mut chunks: Vec<&[u8]> = body.chunks(max_frame_size).collect();
        if chunks.is_empty() {
            chunks.push(&[]);
        }
        let last = chunks.len() - 1;

        let mut size = 0;
        for (idx, chunk) in chunks.iter().enumerate() {
            let mut flags = Flag::zero();
            if end_stream && idx == last {
                flags.set_end_stream();
            }
            let mut head = FrameHeader::new(Kind::Data, flags, stream_id);
            head.length = chunk.len() as u32;
            let mut data = Data::new(head, algorithm::buf::BinaryMut::from(chunk.to_vec()));
            size += data.encode(dst)?;
        }
        Ok(size)
    }

    /// Encodes any other already-built frame (SETTINGS, PING, GOAWAY,
    /// WINDOW_UPDATE, RST_STREAM, PRIORITY) via its own `encode`.
    pub fn write_frame<B: Bt + BtMut, T: Bt>(&self, frame: Frame<T>, encoder: &mut Encoder, dst: &mut B) -> WebResult<usize> {
        frame.encode(dst, encoder, self.max_frame_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algorithm::buf::BinaryMut;

    #[test]
    fn splits_data_across_multiple_frames_when_it_exceeds_max_frame_size() {
        let writer = Writer::new(4);
        let mut out = BinaryMut::new();
        let size = writer
            .write_data(StreamIdentifier::from(1), b"hello world", true, &mut out)
            .unwrap();
        // 11 bytes payload across 3 frames of <=4 bytes, each with a 9-byte header.
        assert_eq!(size, 11 + 9 * 3);
    }

    #[test]
    fn a_single_small_write_sets_end_stream_on_the_one_frame() {
        let writer = Writer::new(16_384);
        let mut out = BinaryMut::new();
        writer
            .write_data(StreamIdentifier::from(1), b"hi", true, &mut out)
            .unwrap();
        let mut cursor = out.chunk();
        let header = FrameHeader::parse(&mut cursor).unwrap();
        assert!(header.flag().is_end_stream());
        assert_eq!(header.length, 2);
    }
}
