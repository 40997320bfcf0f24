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
// The 61-entry static table, RFC 7541 Appendix A.

use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::header::{HeaderName, HeaderValue};

pub static STATIC_TABLE_RAW: &[(&str, &str)] = &[
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

lazy_static! {
    pub static ref STATIC_TABLE: Vec<(HeaderName, HeaderValue)> = STATIC_TABLE_RAW
        .iter()
        .map(|&(name, value)| (HeaderName::from_static(name), HeaderValue::from_static(value)))
        .collect();

    /// name -> (value -> 1-based static index), for the encoder's reverse
    /// lookup. A name with no entry carrying a matching value still allows
    /// matching on the name alone (see `find_name_only`).
    static ref STATIC_HASH: HashMap<HeaderName, HashMap<HeaderValue, usize>> = {
        let mut h: HashMap<HeaderName, HashMap<HeaderValue, usize>> = HashMap::new();
        for (idx, &(name, value)) in STATIC_TABLE_RAW.iter().enumerate() {
            h.entry(HeaderName::from_static(name))
                .or_default()
                .entry(HeaderValue::from_static(value))
                .or_insert(idx + 1);
        }
        h
    };

    /// name -> first 1-based static index carrying that name, for literal
    /// representations that reuse the name but not the value.
    static ref STATIC_NAME_ONLY: HashMap<HeaderName, usize> = {
        let mut h: HashMap<HeaderName, usize> = HashMap::new();
        for (idx, &(name, _)) in STATIC_TABLE_RAW.iter().enumerate() {
            h.entry(HeaderName::from_static(name)).or_insert(idx + 1);
        }
        h
    };
}

pub fn len() -> usize {
    STATIC_TABLE_RAW.len()
}

/// Looks up a 1-based static table index. Returns `None` if out of range.
pub fn get(index: usize) -> Option<(&'static HeaderName, &'static HeaderValue)> {
    if index == 0 {
        return None;
    }
    STATIC_TABLE.get(index - 1).map(|(n, v)| (n, v))
}

/// Full name+value match, used by the encoder to prefer an Indexed
/// Header Field representation.
pub fn find(name: &HeaderName, value: &HeaderValue) -> Option<usize> {
    STATIC_HASH.get(name).and_then(|by_value| by_value.get(value)).copied()
}

/// Name-only match, used by the encoder when the value doesn't appear in
/// the static table but the name does (Literal Header Field With
/// Incremental Indexing / Without Indexing, indexed name).
pub fn find_name_only(name: &HeaderName) -> Option<usize> {
    STATIC_NAME_ONLY.get(name).copied()
}
