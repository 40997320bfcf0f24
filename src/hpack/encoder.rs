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
// HPACK encoder, RFC 7541 section 4 and 6.

use super::dynamic_table::DynamicTable;
use super::{huffman, integer, static_table};
use crate::header::{HeaderName, HeaderValue};

/// One header field as presented to the encoder. Distinct from the
/// decoder's `HeaderList` entries because the encoder needs to know
/// whether a field was marked sensitive (RFC 7541 section 7.1.3) -- that
/// property doesn't survive on the wire and has no place in a decoded
/// header list.
pub struct EncodableHeader<'a> {
    pub name: &'a HeaderName,
    pub value: &'a HeaderValue,
    pub sensitive: bool,
}

impl<'a> EncodableHeader<'a> {
    pub fn new(name: &'a HeaderName, value: &'a HeaderValue) -> Self {
        EncodableHeader { name, value, sensitive: false }
    }

    pub fn sensitive(name: &'a HeaderName, value: &'a HeaderValue) -> Self {
        EncodableHeader { name, value, sensitive: true }
    }
}

pub struct Encoder {
    table: DynamicTable,
    // Tracks every `set_max_header_table_size` call since the last
    // `encode`, so a reduce-then-raise within one block still tells the
    // peer about the intermediate minimum.
    size_update_min: Option<usize>,
    size_update_final: Option<usize>,
    huffman_enabled: bool,
}

impl Encoder {
    pub fn new(dynamic_table_size: usize) -> Self {
        Encoder {
            table: DynamicTable::new(dynamic_table_size),
            size_update_min: None,
            size_update_final: None,
            huffman_enabled: true,
        }
    }

    pub fn dynamic_table_size(&self) -> usize {
        self.table.size()
    }

    /// Controls whether literal strings may be Huffman-coded. Disabling
    /// this still picks the shorter of raw/Huffman per RFC 7541 section
    /// 5.2, it just never considers Huffman as an option.
    pub fn set_huffman_enabled(&mut self, enabled: bool) {
        self.huffman_enabled = enabled;
    }

    /// Records a local change to the max dynamic table size. The change
    /// isn't applied to the table until the next `encode` call emits the
    /// corresponding Dynamic Table Size Update, so the peer and this
    /// encoder observe the new capacity at the same point in the stream.
    pub fn set_max_header_table_size(&mut self, new_max: usize) {
        self.size_update_min = Some(match self.size_update_min {
            Some(current_min) => current_min.min(new_max),
            None => new_max,
        });
        self.size_update_final = Some(new_max);
    }

    pub fn encode<'a, I>(&mut self, headers: I, out: &mut Vec<u8>)
    where
        I: IntoIterator<Item = EncodableHeader<'a>>,
    {
        self.flush_size_update(out);
        for header in headers {
            self.encode_header(header, out);
        }
    }

    fn flush_size_update(&mut self, out: &mut Vec<u8>) {
        let (Some(min), Some(finale)) = (self.size_update_min, self.size_update_final) else {
            return;
        };
        if min != finale {
            integer::encode(min, 5, 0x20, out);
            self.table.set_max_size(min);
        }
        integer::encode(finale, 5, 0x20, out);
        self.table.set_max_size(finale);
        self.size_update_min = None;
        self.size_update_final = None;
    }

    fn encode_header(&mut self, header: EncodableHeader<'_>, out: &mut Vec<u8>) {
        let EncodableHeader { name, value, sensitive } = header;

        if sensitive {
            self.encode_literal(name, value, 4, 0x10, out);
            return;
        }

        if let Some(index) = static_table::find(name, value).or_else(|| self.table.find(name, value)) {
            integer::encode(index, 7, 0x80, out);
            return;
        }

        self.encode_literal(name, value, 6, 0x40, out);
        self.table.insert(name.clone(), value.clone());
    }

    fn encode_literal(&self, name: &HeaderName, value: &HeaderValue, prefix_size: u8, marker: u8, out: &mut Vec<u8>) {
        match static_table::find_name_only(name).or_else(|| self.table.find_name_only(name)) {
            Some(index) => integer::encode(index, prefix_size, marker, out),
            None => {
                integer::encode(0, prefix_size, marker, out);
                encode_string(name.as_bytes(), out, self.huffman_enabled);
            }
        }
        encode_string(value.as_bytes(), out, self.huffman_enabled);
    }
}

/// Encodes a literal octet string, Huffman-coding it iff `huffman_enabled`
/// and that's strictly shorter than the raw representation.
fn encode_string(bytes: &[u8], out: &mut Vec<u8>, huffman_enabled: bool) {
    let huffman_len = huffman::encoded_len(bytes);
    if huffman_enabled && huffman_len < bytes.len() {
        integer::encode(huffman_len, 7, 0x80, out);
        huffman::encode(bytes, out);
    } else {
        integer::encode(bytes.len(), 7, 0x00, out);
        out.extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hpack::decoder::Decoder;

    fn pair(name: &'static str, value: &'static str) -> (HeaderName, HeaderValue) {
        (HeaderName::from_static(name), HeaderValue::from_static(value))
    }

    #[test]
    fn round_trips_through_the_real_decoder() {
        let mut encoder = Encoder::new(4096);
        let mut decoder = Decoder::new(4096, usize::MAX);

        let fields = vec![
            pair(":method", "GET"),
            pair(":scheme", "https"),
            pair(":path", "/"),
            pair(":authority", "example.com"),
            pair("custom-key", "custom-value"),
        ];

        let mut out = Vec::new();
        encoder.encode(
            fields.iter().map(|(n, v)| EncodableHeader::new(n, v)),
            &mut out,
        );

        let decoded = decoder.decode(&out).unwrap();
        let decoded: Vec<_> = decoded
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect();
        assert_eq!(decoded, fields);
    }

    #[test]
    fn reuses_static_table_full_match() {
        let mut encoder = Encoder::new(4096);
        let (name, value) = pair(":method", "GET");
        let mut out = Vec::new();
        encoder.encode(std::iter::once(EncodableHeader::new(&name, &value)), &mut out);
        // Indexed Header Field, static index 2.
        assert_eq!(out, vec![0x80 | 2]);
    }

    #[test]
    fn second_occurrence_of_a_new_pair_is_indexed() {
        let mut encoder = Encoder::new(4096);
        let (name, value) = pair("custom-key", "custom-value");
        let mut first = Vec::new();
        encoder.encode(std::iter::once(EncodableHeader::new(&name, &value)), &mut first);
        assert_eq!(first[0] & 0xC0, 0x40);

        let mut second = Vec::new();
        encoder.encode(std::iter::once(EncodableHeader::new(&name, &value)), &mut second);
        assert_eq!(second[0] & 0x80, 0x80);
    }

    #[test]
    fn sensitive_header_is_never_indexed_and_not_inserted() {
        let mut encoder = Encoder::new(4096);
        let (name, value) = pair("authorization", "secret-token");
        let mut out = Vec::new();
        encoder.encode(
            std::iter::once(EncodableHeader::sensitive(&name, &value)),
            &mut out,
        );
        assert_eq!(out[0] & 0xF0, 0x10);
        assert_eq!(encoder.dynamic_table_size(), 0);
    }

    #[test]
    fn reduce_then_raise_emits_both_updates() {
        let mut encoder = Encoder::new(4096);
        encoder.set_max_header_table_size(100);
        encoder.set_max_header_table_size(2000);

        let (name, value) = pair("custom-key", "custom-value");
        let mut out = Vec::new();
        encoder.encode(std::iter::once(EncodableHeader::new(&name, &value)), &mut out);

        // First byte: size update to the minimum (100), prefix 5 bits,
        // spills into a continuation byte since 100 > 31.
        assert_eq!(out[0] & 0xE0, 0x20);
        let (first_value, consumed) = integer::decode(&out, 5).unwrap();
        assert_eq!(first_value, 100);
        let (second_value, consumed2) = integer::decode(&out[consumed..], 5).unwrap();
        assert_eq!(out[consumed] & 0xE0, 0x20);
        assert_eq!(second_value, 2000);
        assert_eq!(encoder.dynamic_table_size(), "custom-key".len() + "custom-value".len() + 32);
        let _ = consumed2;
    }

    #[test]
    fn huffman_enabled_false_disables_huffman_coding() {
        let mut encoder = Encoder::new(4096);
        encoder.set_huffman_enabled(false);
        let (name, value) = pair(":authority", "www.example.com");
        let mut out = Vec::new();
        encoder.encode(std::iter::once(EncodableHeader::new(&name, &value)), &mut out);

        // Literal with incremental indexing, indexed name (static index 1),
        // value length prefix byte has the Huffman bit (0x80) clear and the
        // raw length (16), not the shorter Huffman length.
        assert_eq!(out[0], 0x40 | 1);
        assert_eq!(out[1] & 0x80, 0);
        assert_eq!(out[1] & 0x7F, value.as_bytes().len() as u8);

        let decoded = Decoder::new(4096, usize::MAX).decode(&out).unwrap();
        let (decoded_name, decoded_value) = decoded.iter().next().unwrap();
        assert_eq!(decoded_name, &name);
        assert_eq!(decoded_value, &value);
    }
}
