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
// Content-encoding decompression layered over DATA. A decompressor is
// installed lazily on the first DATA frame of a stream
// whose headers advertised a supported `content-encoding`, and keeps flow
// control accounted in wire (compressed) bytes rather than decoded bytes.

use std::io::Write;

use flate2::write::{DeflateDecoder, GzDecoder};

use crate::error::{Http2Error, Reason};
use crate::frame::StreamIdentifier;
use crate::header::HeaderList;
use crate::WebResult;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    Deflate,
}

impl ContentEncoding {
    pub fn from_header_value(value: &str) -> Option<Self> {
        match value.trim() {
            "gzip" | "x-gzip" => Some(ContentEncoding::Gzip),
            "deflate" | "x-deflate" => Some(ContentEncoding::Deflate),
            _ => None,
        }
    }
}

enum Inner {
    Gzip(GzDecoder<Vec<u8>>),
    Deflate(DeflateDecoder<Vec<u8>>),
}

/// Per-stream decompression state plus the running totals needed to
/// reconcile flow control between wire bytes and decoded bytes.
pub struct Decompressor {
    stream_id: StreamIdentifier,
    inner: Inner,
    compressed: u64,
    decompressed: u64,
}

impl Decompressor {
    pub fn new(stream_id: StreamIdentifier, encoding: ContentEncoding) -> Self {
        let inner = match encoding {
            ContentEncoding::Gzip => Inner::Gzip(GzDecoder::new(Vec::new())),
            ContentEncoding::Deflate => Inner::Deflate(DeflateDecoder::new(Vec::new())),
        };
        Decompressor {
            stream_id,
            inner,
            compressed: 0,
            decompressed: 0,
        }
    }

    /// Installs a decompressor for `stream_id` if its headers advertise a
    /// supported `content-encoding`; also strips the now-stale
    /// `content-length` header, since it no longer matches the delivered
    /// stream.
    pub fn install_from_headers(stream_id: StreamIdentifier, headers: &mut HeaderList) -> Option<Self> {
        let encoding = headers
            .get_first("content-encoding")
            .and_then(|v| ContentEncoding::from_header_value(&v.as_str()))?;
        headers.remove_first("content-length");
        Some(Decompressor::new(stream_id, encoding))
    }

    /// Feeds `chunk` (wire bytes straight off a DATA frame) through the
    /// decompressor, returning the newly available decoded bytes.
    pub fn push(&mut self, chunk: &[u8]) -> WebResult<Vec<u8>> {
        self.compressed += chunk.len() as u64;
        let result = match &mut self.inner {
            Inner::Gzip(decoder) => decoder.write_all(chunk).map(|_| decoder.get_ref().clone()),
            Inner::Deflate(decoder) => decoder.write_all(chunk).map(|_| decoder.get_ref().clone()),
        };
        let produced = result.map_err(|_| Http2Error::stream(self.stream_id, Reason::InternalError))?;
        let new_bytes = produced[self.decompressed as usize..].to_vec();
        self.decompressed += new_bytes.len() as u64;
        Ok(new_bytes)
    }

    pub fn compressed(&self) -> u64 {
        self.compressed
    }

    pub fn decompressed(&self) -> u64 {
        self.decompressed
    }

    /// Computes how many wire-level bytes to return to the flow controller
    /// when the application consumes `k` decompressed bytes:
    /// `ceil(compressed * k / decompressed)`, then decrements both running
    /// totals by their share.
    pub fn consume_decompressed(&mut self, k: u64) -> WebResult<u64> {
        if self.decompressed == 0 {
            return Err(Http2Error::stream(self.stream_id, Reason::InternalError).into());
        }
        let consumed_compressed = (self.compressed * k + self.decompressed - 1) / self.decompressed;
        if consumed_compressed > self.compressed {
            return Err(Http2Error::stream(self.stream_id, Reason::InternalError).into());
        }
        self.compressed -= consumed_compressed;
        self.decompressed -= k;
        Ok(consumed_compressed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{HeaderName, HeaderValue};
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn gzip_bytes(raw: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn installs_from_a_recognized_content_encoding_and_strips_content_length() {
        let mut headers = HeaderList::new();
        headers.push(HeaderName::from_static("content-encoding"), HeaderValue::from_static("gzip"));
        headers.push(HeaderName::from_static("content-length"), HeaderValue::from_static("123"));

        let decompressor = Decompressor::install_from_headers(StreamIdentifier::from(1), &mut headers);
        assert!(decompressor.is_some());
        assert!(headers.get_first("content-length").is_none());
    }

    #[test]
    fn no_encoding_header_means_no_decompressor() {
        let mut headers = HeaderList::new();
        headers.push(HeaderName::from_static(":status"), HeaderValue::from_static("200"));
        assert!(Decompressor::install_from_headers(StreamIdentifier::from(1), &mut headers).is_none());
    }

    #[test]
    fn round_trips_gzip_payload_and_tracks_ratio_accounting() {
        let raw = b"hello http/2 decompressor layer, repeated repeated repeated".to_vec();
        let compressed = gzip_bytes(&raw);

        let mut decompressor = Decompressor::new(StreamIdentifier::from(1), ContentEncoding::Gzip);
        let decoded = decompressor.push(&compressed).unwrap();
        assert_eq!(decoded, raw);
        assert_eq!(decompressor.decompressed(), raw.len() as u64);

        let consumed_wire = decompressor.consume_decompressed(raw.len() as u64).unwrap();
        assert_eq!(consumed_wire, compressed.len() as u64);
        assert_eq!(decompressor.decompressed(), 0);
        assert_eq!(decompressor.compressed(), 0);
    }

    #[test]
    fn consuming_with_nothing_decompressed_yet_is_an_error() {
        let mut decompressor = Decompressor::new(StreamIdentifier::from(1), ContentEncoding::Gzip);
        let err = decompressor.consume_decompressed(1).unwrap_err();
        assert_eq!(err.as_http2_error().reason(), Reason::InternalError);
    }
}
