// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh

pub mod decoder;
pub mod dynamic_table;
pub mod encoder;
pub mod huffman;
pub mod integer;
pub mod static_table;

pub use decoder::{Decoder, DecoderError, IntegerDecodingError, StringDecodingError};
pub use dynamic_table::DynamicTable;
pub use encoder::{EncodableHeader, Encoder};
pub use huffman::HuffmanDecoderError;
