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
// A single-pass HPACK decoder, RFC 7541 section 3 and 6.
//
// The decoder only follows HPACK rules, without performing any additional
// (semantic) checks on the header name/value pairs, beyond the
// pseudo-header scoping rules HTTP/2 itself layers on top (RFC 9113
// section 8.3) -- it considers the headers as opaque octets otherwise.

use std::borrow::Cow;

use super::huffman::{self, HuffmanDecoderError};
use super::integer;
use super::dynamic_table::DynamicTable;
use crate::error::Reason;
use crate::header::{HeaderList, HeaderName, HeaderValue, PseudoClass};

#[derive(PartialEq, Copy, Clone, Debug)]
pub enum IntegerDecodingError {
    TooManyOctets,
    ValueTooLarge,
    NotEnoughOctets,
    InvalidPrefix,
}

#[derive(PartialEq, Copy, Clone, Debug)]
pub enum StringDecodingError {
    NotEnoughOctets,
    HuffmanDecoderError(HuffmanDecoderError),
}

/// Errors a single `decode` call can produce. `is_connection_error`
/// classifies the two error families from RFC 7541 section 6: malformed
/// wire data tears down the whole connection (the dynamic table state
/// between the two peers can no longer be trusted to agree),
/// header-list-level validation failures are scoped to the stream.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum DecoderError {
    HeaderIndexOutOfBounds,
    IntegerDecodingError(IntegerDecodingError),
    StringDecodingError(StringDecodingError),
    InvalidMaxDynamicSize,
    /// The decoder's max dynamic table size was reduced since the last
    /// block, so the peer was required to open this block with a
    /// Dynamic Table Size Update and did not.
    MaxDynamicTableSizeChangeRequired,
    /// A pseudo-header field appeared after a regular header field.
    PseudoHeaderAfterRegular,
    /// Both request- and response-scoped pseudo-headers appeared in the
    /// same header block.
    MixedPseudoHeaderScope,
    /// A pseudo-header name outside the known request/response set.
    UnknownPseudoHeader,
    /// Cumulative `len(name)+len(value)+32` exceeded the configured
    /// `maxHeaderListSize`. Latched until `finish()` so that dynamic
    /// table mutations already performed are not rolled back.
    HeaderListTooLarge,
}

impl DecoderError {
    pub fn is_connection_error(&self) -> bool {
        !matches!(
            self,
            DecoderError::PseudoHeaderAfterRegular
                | DecoderError::MixedPseudoHeaderScope
                | DecoderError::UnknownPseudoHeader
                | DecoderError::HeaderListTooLarge
        )
    }

    pub fn reason(&self) -> Reason {
        if self.is_connection_error() {
            Reason::CompressionError
        } else {
            Reason::ProtocolError
        }
    }
}

impl From<IntegerDecodingError> for DecoderError {
    fn from(e: IntegerDecodingError) -> Self {
        DecoderError::IntegerDecodingError(e)
    }
}

impl From<StringDecodingError> for DecoderError {
    fn from(e: StringDecodingError) -> Self {
        DecoderError::StringDecodingError(e)
    }
}

/// Decodes a length-prefixed, possibly Huffman-coded octet string starting
/// at `buf[0]`. Returns the decoded bytes (borrowed when the string is
/// stored raw, owned when Huffman-decoded) and the number of input bytes
/// consumed.
fn decode_string(buf: &[u8]) -> Result<(Cow<'_, [u8]>, usize), DecoderError> {
    if buf.is_empty() {
        return Err(StringDecodingError::NotEnoughOctets.into());
    }
    let huffman_encoded = buf[0] & 0x80 == 0x80;
    let (len, consumed_len_bytes) = integer::decode(buf, 7)?;

    let rest = &buf[consumed_len_bytes..];
    if rest.len() < len {
        return Err(StringDecodingError::NotEnoughOctets.into());
    }
    let raw = &rest[..len];
    let total_consumed = consumed_len_bytes + len;

    if huffman_encoded {
        let decoded = huffman::decode(raw).map_err(StringDecodingError::HuffmanDecoderError)?;
        Ok((Cow::Owned(decoded), total_consumed))
    } else {
        Ok((Cow::Borrowed(raw), total_consumed))
    }
}

/// Stateful across header blocks: owns the dynamic table and tracks the
/// decoder-side `SETTINGS_HEADER_TABLE_SIZE` bookkeeping needed to enforce
/// the Dynamic Table Size Update protocol (RFC 7541 section 4.2).
pub struct Decoder {
    table: DynamicTable,
    max_header_list_size: usize,
    /// Set by `set_max_dynamic_table_size`; `decode` must see a Dynamic
    /// Table Size Update at the start of the next block before any other
    /// representation.
    size_update_required: bool,
    /// The local `SETTINGS_HEADER_TABLE_SIZE` ceiling: a peer's Dynamic
    /// Table Size Update may shrink the table below this at will, but may
    /// never grow it past it (RFC 7541 section 4.2).
    settings_max_size: usize,
}

impl Decoder {
    pub fn new(initial_dynamic_table_size: usize, max_header_list_size: usize) -> Self {
        Decoder {
            table: DynamicTable::new(initial_dynamic_table_size),
            max_header_list_size,
            size_update_required: false,
            settings_max_size: initial_dynamic_table_size,
        }
    }

    pub fn dynamic_table_size(&self) -> usize {
        self.table.size()
    }

    /// Called when the local `SETTINGS_HEADER_TABLE_SIZE` is lowered; the
    /// peer's encoder must acknowledge the reduction with a size update at
    /// the start of its next header block.
    pub fn set_max_dynamic_table_size(&mut self, new_max: usize) {
        self.settings_max_size = new_max;
        self.table.set_max_size(new_max);
        self.size_update_required = true;
    }

    pub fn set_max_header_list_size(&mut self, max: usize) {
        self.max_header_list_size = max;
    }

    /// Decodes one complete header block (already reassembled from
    /// HEADERS + CONTINUATION frames by the caller) into an ordered
    /// `HeaderList`.
    pub fn decode(&mut self, buf: &[u8]) -> Result<HeaderList, DecoderError> {
        let mut headers = HeaderList::new();
        let mut pos = 0;
        let mut seen_regular_header = false;
        let mut scope: Option<PseudoClass> = None;
        let mut cumulative_size: usize = 0;
        let mut list_too_large = false;

        while pos < buf.len() {
            let b = buf[pos];

            if b & 0xE0 == 0x20 {
                // Dynamic Table Size Update.
                let (new_size, consumed) = integer::decode(&buf[pos..], 5)?;
                if new_size > self.settings_max_size {
                    return Err(DecoderError::InvalidMaxDynamicSize);
                }
                self.table.set_max_size(new_size);
                self.size_update_required = false;
                pos += consumed;
                continue;
            }

            if self.size_update_required {
                return Err(DecoderError::MaxDynamicTableSizeChangeRequired);
            }

            if b & 0x80 == 0x80 {
                // Indexed Header Field.
                let (index, consumed) = integer::decode(&buf[pos..], 7)?;
                if index == 0 {
                    return Err(DecoderError::HeaderIndexOutOfBounds);
                }
                let (name, value) = self
                    .table
                    .get_indexed(index)
                    .ok_or(DecoderError::HeaderIndexOutOfBounds)?;
                let (name, value) = (name.clone(), value.clone());
                pos += consumed;
                self.push_validated(
                    &mut headers,
                    name,
                    value,
                    &mut seen_regular_header,
                    &mut scope,
                    &mut cumulative_size,
                    &mut list_too_large,
                )?;
                continue;
            }

            let (prefix_size, with_indexing) = if b & 0xC0 == 0x40 {
                (6, true)
            } else {
                // Literal Never-Indexed (0x10) and Literal Without
                // Indexing (0x00) decode identically; only re-encoding
                // needs to distinguish them, which this decoder has no
                // reason to preserve.
                (4, false)
            };

            let (name_index, consumed) = integer::decode(&buf[pos..], prefix_size)?;
            pos += consumed;

            let name = if name_index == 0 {
                let (raw, consumed) = decode_string(&buf[pos..])?;
                pos += consumed;
                HeaderName::from_bytes(&raw)
            } else {
                let (existing, _) = self
                    .table
                    .get_indexed(name_index)
                    .ok_or(DecoderError::HeaderIndexOutOfBounds)?;
                existing.clone()
            };

            let (raw_value, consumed) = decode_string(&buf[pos..])?;
            let value = HeaderValue::from_bytes(&raw_value);
            pos += consumed;

            if with_indexing {
                self.table.insert(name.clone(), value.clone());
            }

            self.push_validated(
                &mut headers,
                name,
                value,
                &mut seen_regular_header,
                &mut scope,
                &mut cumulative_size,
                &mut list_too_large,
            )?;
        }

        if list_too_large {
            return Err(DecoderError::HeaderListTooLarge);
        }

        Ok(headers)
    }

    #[allow(clippy::too_many_arguments)]
    fn push_validated(
        &self,
        headers: &mut HeaderList,
        name: HeaderName,
        value: HeaderValue,
        seen_regular_header: &mut bool,
        scope: &mut Option<PseudoClass>,
        cumulative_size: &mut usize,
        list_too_large: &mut bool,
    ) -> Result<(), DecoderError> {
        let class = name.pseudo_class();
        match class {
            PseudoClass::Regular => {
                *seen_regular_header = true;
            }
            PseudoClass::Request | PseudoClass::Response => {
                if *seen_regular_header {
                    return Err(DecoderError::PseudoHeaderAfterRegular);
                }
                match scope {
                    None => *scope = Some(class),
                    Some(existing) if *existing != class => {
                        return Err(DecoderError::MixedPseudoHeaderScope);
                    }
                    _ => {}
                }
            }
        }
        if name.is_pseudo() && class == PseudoClass::Regular {
            return Err(DecoderError::UnknownPseudoHeader);
        }

        *cumulative_size += name.bytes_len() + value.bytes_len() + 32;
        if *cumulative_size > self.max_header_list_size {
            *list_too_large = true;
        }

        headers.push(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_rfc7541_c2_1_literal_with_indexing() {
        // C.2.1: "custom-key: custom-header" literal with incremental
        // indexing, both name and value literal, not Huffman-coded.
        let wire = [
            0x40, 0x0a, b'c', b'u', b's', b't', b'o', b'm', b'-', b'k', b'e', b'y', 0x0d, b'c',
            b'u', b's', b't', b'o', b'm', b'-', b'h', b'e', b'a', b'd', b'e', b'r',
        ];
        let mut decoder = Decoder::new(4096, usize::MAX);
        let headers = decoder.decode(&wire).unwrap();
        assert_eq!(headers.len(), 1);
        let (name, value) = headers.iter().next().unwrap();
        assert_eq!(name.as_bytes(), b"custom-key");
        assert_eq!(value.as_bytes(), b"custom-header");
        assert_eq!(decoder.dynamic_table_size(), 55);
    }

    #[test]
    fn decodes_rfc7541_c3_request_examples_without_huffman() {
        // C.3.1 first request.
        let wire = [
            0x82, 0x86, 0x84, 0x41, 0x0f, b'w', b'w', b'w', b'.', b'e', b'x', b'a', b'm', b'p',
            b'l', b'e', b'.', b'c', b'o', b'm',
        ];
        let mut decoder = Decoder::new(4096, usize::MAX);
        let headers = decoder.decode(&wire).unwrap();
        let decoded: Vec<_> = headers
            .iter()
            .map(|(n, v)| (n.as_bytes().to_vec(), v.as_bytes().to_vec()))
            .collect();
        assert_eq!(
            decoded,
            vec![
                (b":method".to_vec(), b"GET".to_vec()),
                (b":scheme".to_vec(), b"http".to_vec()),
                (b":path".to_vec(), b"/".to_vec()),
                (b":authority".to_vec(), b"www.example.com".to_vec()),
            ]
        );
        assert_eq!(decoder.dynamic_table_size(), 57);
    }

    #[test]
    fn rejects_index_zero() {
        let mut decoder = Decoder::new(4096, usize::MAX);
        let err = decoder.decode(&[0x80]).unwrap_err();
        assert_eq!(err, DecoderError::HeaderIndexOutOfBounds);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut decoder = Decoder::new(4096, usize::MAX);
        // 7-bit prefix max index with no dynamic table entries yet.
        let err = decoder.decode(&[0xFF, 0x00]).unwrap_err();
        assert_eq!(err, DecoderError::HeaderIndexOutOfBounds);
    }

    #[test]
    fn rejects_pseudo_header_after_regular() {
        let mut decoder = Decoder::new(4096, usize::MAX);
        // ":method: GET" (indexed, 0x82) then a literal regular header,
        // then a second indexed pseudo-header (0x84, ":path").
        let mut wire = vec![0x82];
        wire.extend_from_slice(&[0x40, 0x01, b'x', 0x01, b'y']);
        wire.push(0x84);
        let err = decoder.decode(&wire).unwrap_err();
        assert_eq!(err, DecoderError::PseudoHeaderAfterRegular);
        assert!(!err.is_connection_error());
    }

    #[test]
    fn enforces_max_header_list_size_latched_to_finish() {
        let mut decoder = Decoder::new(4096, 10);
        let wire = [
            0x40, 0x0a, b'c', b'u', b's', b't', b'o', b'm', b'-', b'k', b'e', b'y', 0x0d, b'c',
            b'u', b's', b't', b'o', b'm', b'-', b'h', b'e', b'a', b'd', b'e', b'r',
        ];
        let err = decoder.decode(&wire).unwrap_err();
        assert_eq!(err, DecoderError::HeaderListTooLarge);
        // The dynamic table insertion still happened even though the
        // block as a whole is rejected.
        assert_eq!(decoder.dynamic_table_size(), 55);
    }

    #[test]
    fn rejects_a_size_update_above_the_local_settings_ceiling() {
        let mut decoder = Decoder::new(100, usize::MAX);
        let err = decoder.decode(&[0x3F, 0x85, 0x01]).unwrap_err();
        assert_eq!(err, DecoderError::InvalidMaxDynamicSize);
        assert!(err.is_connection_error());
    }

    #[test]
    fn requires_size_update_after_reduction() {
        let mut decoder = Decoder::new(4096, usize::MAX);
        decoder.set_max_dynamic_table_size(100);
        let err = decoder.decode(&[0x82]).unwrap_err();
        assert_eq!(err, DecoderError::MaxDynamicTableSizeChangeRequired);
    }
}
