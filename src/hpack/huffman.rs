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
// The canonical Huffman code from RFC 7541 Appendix B: 256 byte symbols
// plus EOS.

use std::collections::HashMap;

use lazy_static::lazy_static;

/// Errors that can be encountered while decoding a Huffman-coded string.
#[derive(PartialEq, Copy, Clone, Debug)]
pub enum HuffmanDecoderError {
    /// Padding strictly larger than 7 bits.
    PaddingTooLarge,
    /// Padding whose bits don't match the most significant bits of EOS.
    InvalidPadding,
    /// The EOS code appeared before the end of the string.
    EOSInString,
}

/// Index into `HUFFMAN_CODE_ARRAY` of the end-of-string symbol. Not a valid
/// byte value, so it's kept out of the `u8`-indexed parts of the table.
const EOS_SYMBOL: u16 = 256;

// See RFC 7541 Appendix B for the actual characters corresponding to each
// entry. Index 0..=255 are byte symbols, index 256 is EOS.
static HUFFMAN_CODE_ARRAY: &[(u32, u8)] = &[
    (0x1ff8, 13), (0x7fffd8, 23), (0xfffffe2, 28), (0xfffffe3, 28),
    (0xfffffe4, 28), (0xfffffe5, 28), (0xfffffe6, 28), (0xfffffe7, 28),
    (0xfffffe8, 28), (0xffffea, 24), (0x3ffffffc, 30), (0xfffffe9, 28),
    (0xfffffea, 28), (0x3ffffffd, 30), (0xfffffeb, 28), (0xfffffec, 28),
    (0xfffffed, 28), (0xfffffee, 28), (0xfffffef, 28), (0xffffff0, 28),
    (0xffffff1, 28), (0xffffff2, 28), (0x3ffffffe, 30), (0xffffff3, 28),
    (0xffffff4, 28), (0xffffff5, 28), (0xffffff6, 28), (0xffffff7, 28),
    (0xffffff8, 28), (0xffffff9, 28), (0xffffffa, 28), (0xffffffb, 28),
    (0x14, 6), (0x3f8, 10), (0x3f9, 10), (0xffa, 12),
    (0x1ff9, 13), (0x15, 6), (0xf8, 8), (0x7fa, 11),
    (0x3fa, 10), (0x3fb, 10), (0xf9, 8), (0x7fb, 11),
    (0xfa, 8), (0x16, 6), (0x17, 6), (0x18, 6),
    (0x0, 5), (0x1, 5), (0x2, 5), (0x19, 6),
    (0x1a, 6), (0x1b, 6), (0x1c, 6), (0x1d, 6),
    (0x1e, 6), (0x1f, 6), (0x5c, 7), (0xfb, 8),
    (0x7ffc, 15), (0x20, 6), (0xffb, 12), (0x3fc, 10),
    (0x1ffa, 13), (0x21, 6), (0x5d, 7), (0x5e, 7),
    (0x5f, 7), (0x60, 7), (0x61, 7), (0x62, 7),
    (0x63, 7), (0x64, 7), (0x65, 7), (0x66, 7),
    (0x67, 7), (0x68, 7), (0x69, 7), (0x6a, 7),
    (0x6b, 7), (0x6c, 7), (0x6d, 7), (0x6e, 7),
    (0x6f, 7), (0x70, 7), (0x71, 7), (0x72, 7),
    (0xfc, 8), (0x73, 7), (0xfd, 8), (0x1ffb, 13),
    (0x7fff0, 19), (0x1ffc, 13), (0x3ffc, 14), (0x22, 6),
    (0x7ffd, 15), (0x3, 5), (0x23, 6), (0x4, 5),
    (0x24, 6), (0x5, 5), (0x25, 6), (0x26, 6),
    (0x27, 6), (0x6, 5), (0x74, 7), (0x75, 7),
    (0x28, 6), (0x29, 6), (0x2a, 6), (0x7, 5),
    (0x2b, 6), (0x76, 7), (0x2c, 6), (0x8, 5),
    (0x9, 5), (0x2d, 6), (0x77, 7), (0x78, 7),
    (0x79, 7), (0x7a, 7), (0x7b, 7), (0x7ffe, 15),
    (0x7fc, 11), (0x3ffd, 14), (0x1ffd, 13), (0xffffffc, 28),
    (0xfffe6, 20), (0x3fffd2, 22), (0xfffe7, 20), (0xfffe8, 20),
    (0x3fffd3, 22), (0x3fffd4, 22), (0x3fffd5, 22), (0x7fffd9, 23),
    (0x3fffd6, 22), (0x7fffda, 23), (0x7fffdb, 23), (0x7fffdc, 23),
    (0x7fffdd, 23), (0x7fffde, 23), (0xffffeb, 24), (0x7fffdf, 23),
    (0xffffec, 24), (0xffffed, 24), (0x3fffd7, 22), (0x7fffe0, 23),
    (0xffffee, 24), (0x7fffe1, 23), (0x7fffe2, 23), (0x7fffe3, 23),
    (0x7fffe4, 23), (0x1fffdc, 21), (0x3fffd8, 22), (0x7fffe5, 23),
    (0x3fffd9, 22), (0x7fffe6, 23), (0x7fffe7, 23), (0xffffef, 24),
    (0x3fffda, 22), (0x1fffdd, 21), (0xfffe9, 20), (0x3fffdb, 22),
    (0x3fffdc, 22), (0x7fffe8, 23), (0x7fffe9, 23), (0x1fffde, 21),
    (0x7fffea, 23), (0x3fffdd, 22), (0x3fffde, 22), (0xfffff0, 24),
    (0x1fffdf, 21), (0x3fffdf, 22), (0x7fffeb, 23), (0x7fffec, 23),
    (0x1fffe0, 21), (0x1fffe1, 21), (0x3fffe0, 22), (0x1fffe2, 21),
    (0x7fffed, 23), (0x3fffe1, 22), (0x7fffee, 23), (0x7fffef, 23),
    (0xfffea, 20), (0x3fffe2, 22), (0x3fffe3, 22), (0x3fffe4, 22),
    (0x7ffff0, 23), (0x3fffe5, 22), (0x3fffe6, 22), (0x7ffff1, 23),
    (0x3ffffe0, 26), (0x3ffffe1, 26), (0xfffeb, 20), (0x7fff1, 19),
    (0x3fffe7, 22), (0x7ffff2, 23), (0x3fffe8, 22), (0x1ffffec, 25),
    (0x3ffffe2, 26), (0x3ffffe3, 26), (0x3ffffe4, 26), (0x7ffffde, 27),
    (0x7ffffdf, 27), (0x3ffffe5, 26), (0xfffff1, 24), (0x1ffffed, 25),
    (0x7fff2, 19), (0x1fffe3, 21), (0x3ffffe6, 26), (0x7ffffe0, 27),
    (0x7ffffe1, 27), (0x3ffffe7, 26), (0x7ffffe2, 27), (0xfffff2, 24),
    (0x1fffe4, 21), (0x1fffe5, 21), (0x3ffffe8, 26), (0x3ffffe9, 26),
    (0xffffffd, 28), (0x7ffffe3, 27), (0x7ffffe4, 27), (0x7ffffe5, 27),
    (0xfffec, 20), (0xfffff3, 24), (0xfffed, 20), (0x1fffe6, 21),
    (0x3fffe9, 22), (0x1fffe7, 21), (0x1fffe8, 21), (0x7ffff3, 23),
    (0x3fffea, 22), (0x3fffeb, 22), (0x1ffffee, 25), (0x1ffffef, 25),
    (0xfffff4, 24), (0xfffff5, 24), (0x3ffffea, 26), (0x7ffff4, 23),
    (0x3ffffeb, 26), (0x7ffffe6, 27), (0x3ffffec, 26), (0x3ffffed, 26),
    (0x7ffffe7, 27), (0x7ffffe8, 27), (0x7ffffe9, 27), (0x7ffffea, 27),
    (0x7ffffeb, 27), (0xffffffe, 28), (0x7ffffec, 27), (0x7ffffed, 27),
    (0x7ffffee, 27), (0x7ffffef, 27), (0x7fffff0, 27), (0x3ffffee, 26),
    (0x3fffffff, 30),
];

lazy_static! {
    // Keyed on the `u16` symbol rather than `u8`: symbol 256 is EOS and
    // does not fit in a `u8`, so a `u8`-valued map would alias it onto
    // symbol 0's entry.
    static ref HUFFMAN_DECODE_MAP: HashMap<(u32, u8), u16> = {
        let mut m = HashMap::with_capacity(HUFFMAN_CODE_ARRAY.len());
        for (symbol, &(code, code_len)) in HUFFMAN_CODE_ARRAY.iter().enumerate() {
            m.insert((code, code_len), symbol as u16);
        }
        m
    };
}

/// Huffman-encodes `input` per RFC 7541 Appendix B, padding the final byte
/// with the high-order bits of the EOS code (all ones).
pub fn encode(input: &[u8], out: &mut Vec<u8>) {
    let mut bit_buf: u64 = 0;
    let mut bit_count: u32 = 0;

    for &byte in input {
        let (code, len) = HUFFMAN_CODE_ARRAY[byte as usize];
        bit_buf = (bit_buf << len) | code as u64;
        bit_count += len as u32;
        while bit_count >= 8 {
            bit_count -= 8;
            out.push((bit_buf >> bit_count) as u8);
        }
    }

    if bit_count > 0 {
        let pad = 8 - bit_count;
        let byte = ((bit_buf << pad) | ((1u64 << pad) - 1)) as u8;
        out.push(byte);
    }
}

/// Returns the length in bytes that `encode` would produce for `input`,
/// without actually encoding it. Used by the encoder to decide whether
/// Huffman coding is shorter than the raw representation.
pub fn encoded_len(input: &[u8]) -> usize {
    let bits: usize = input
        .iter()
        .map(|&b| HUFFMAN_CODE_ARRAY[b as usize].1 as usize)
        .sum();
    (bits + 7) / 8
}

/// Decodes a Huffman-coded octet string.
pub fn decode(buf: &[u8]) -> Result<Vec<u8>, HuffmanDecoderError> {
    let mut current: u32 = 0;
    let mut current_len: u8 = 0;
    let mut all_true = true;
    let mut result = Vec::new();

    for b in BitIterator::new(buf.iter()) {
        current_len += 1;
        current <<= 1;
        if b {
            current |= 1;
        } else {
            all_true = false;
        }

        if let Some(&symbol) = HUFFMAN_DECODE_MAP.get(&(current, current_len)) {
            if symbol == EOS_SYMBOL {
                return Err(HuffmanDecoderError::EOSInString);
            }
            result.push(symbol as u8);
            current = 0;
            current_len = 0;
            all_true = true;
        }
    }

    if current_len > 7 {
        return Err(HuffmanDecoderError::PaddingTooLarge);
    }
    if current_len > 0 && !all_true {
        return Err(HuffmanDecoderError::InvalidPadding);
    }

    Ok(result)
}

/// Iterates over the individual bits of a byte sequence, most significant
/// bit first.
struct BitIterator<'a, I: Iterator> {
    buffer_iterator: I,
    current_byte: Option<&'a u8>,
    pos: u8,
}

impl<'a, I> BitIterator<'a, I>
where
    I: Iterator<Item = &'a u8>,
{
    fn new(iterator: I) -> BitIterator<'a, I> {
        BitIterator {
            buffer_iterator: iterator,
            current_byte: None,
            pos: 7,
        }
    }
}

impl<'a, I> Iterator for BitIterator<'a, I>
where
    I: Iterator<Item = &'a u8>,
{
    type Item = bool;

    fn next(&mut self) -> Option<bool> {
        if self.current_byte.is_none() {
            self.current_byte = self.buffer_iterator.next();
            self.pos = 7;
        }

        let b = *self.current_byte?;
        let is_set = (b & (1 << self.pos)) != 0;
        if self.pos == 0 {
            self.current_byte = None;
        } else {
            self.pos -= 1;
        }

        Some(is_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_ascii() {
        let input = b"www.example.com";
        let mut encoded = Vec::new();
        encode(input, &mut encoded);
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, input);
    }

    #[test]
    fn matches_rfc7541_c4_1_worked_example() {
        // RFC 7541 C.4.1: "www.example.com" Huffman-encodes to this exact
        // 12-byte sequence.
        let input = b"www.example.com";
        let expected = [
            0xf1, 0xe3, 0xc2, 0xe5, 0xf2, 0x3a, 0x6b, 0xa0, 0xab, 0x90, 0xf4, 0xff,
        ];
        let mut encoded = Vec::new();
        encode(input, &mut encoded);
        assert_eq!(encoded, expected);
        assert_eq!(decode(&expected).unwrap(), input);
    }

    #[test]
    fn rejects_eos_in_the_middle() {
        // All-ones padding longer than a real code never legitimately
        // decodes to EOS mid-string; construct bytes whose prefix is the
        // EOS code itself (30 ones) followed by more data.
        let mut buf = Vec::new();
        for _ in 0..4 {
            buf.push(0xff);
        }
        let err = decode(&buf).unwrap_err();
        assert!(matches!(
            err,
            HuffmanDecoderError::EOSInString | HuffmanDecoderError::PaddingTooLarge
        ));
    }

    #[test]
    fn rejects_padding_longer_than_seven_bits() {
        // A single 5-bit code ('0') followed by a full extra byte of ones
        // makes the trailing padding 8 bits wide once the last full codepoint
        // is consumed — larger than the allowed 7.
        let mut encoded = Vec::new();
        encode(b"0", &mut encoded);
        encoded.push(0xff);
        let err = decode(&encoded).unwrap_err();
        assert!(matches!(
            err,
            HuffmanDecoderError::PaddingTooLarge | HuffmanDecoderError::InvalidPadding
        ));
    }

    #[test]
    fn encoded_len_matches_actual_output() {
        let input = b"www.example.com";
        let mut out = Vec::new();
        encode(input, &mut out);
        assert_eq!(encoded_len(input), out.len());
    }
}
