// Copyright 2022 - 2023 Wenmeng See the COPYRIGHT
// file at the top-level directory of this distribution.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
//
// Author: tickbh

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{Http2Error, Reason, WebError};
use crate::frame::StreamIdentifier;

/// A header field name: an opaque octet sequence that must be ASCII
/// lowercase to be a valid HTTP/2 mapping. Pseudo-headers begin with `:`.
///
/// Stored as owned bytes rather than `String` because HPACK treats names as
/// opaque octets, without performing any additional semantic checks.
#[derive(Clone, Eq)]
pub struct HeaderName(Vec<u8>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoClass {
    /// Not a pseudo-header at all.
    Regular,
    Request,
    Response,
}

const REQUEST_PSEUDO: &[&str] = &[":method", ":scheme", ":authority", ":path"];
const RESPONSE_PSEUDO: &[&str] = &[":status"];

impl HeaderName {
    /// Builds a header name from raw wire bytes, lowercasing if necessary.
    /// HPACK itself is byte-transparent; the lowercasing here reflects the
    /// HTTP/2 mapping requirement, not an HPACK rule.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        if bytes.iter().any(u8::is_ascii_uppercase) {
            HeaderName(bytes.to_ascii_lowercase())
        } else {
            HeaderName(bytes.to_vec())
        }
    }

    pub fn from_static(s: &'static str) -> Self {
        HeaderName(s.as_bytes().to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn bytes_len(&self) -> usize {
        self.0.len()
    }

    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    pub fn is_pseudo(&self) -> bool {
        self.0.first() == Some(&b':')
    }

    pub fn pseudo_class(&self) -> PseudoClass {
        if !self.is_pseudo() {
            return PseudoClass::Regular;
        }
        let s = self.as_str();
        if REQUEST_PSEUDO.contains(&s.as_ref()) {
            PseudoClass::Request
        } else if RESPONSE_PSEUDO.contains(&s.as_ref()) {
            PseudoClass::Response
        } else {
            // Caller decides scope (connection vs this stream); the Reader
            // is in a better position to know the offending stream id.
            PseudoClass::Regular
        }
    }

    /// Validates HTTP/2's pseudo-header rule: unknown pseudo-headers are
    /// rejected as stream errors.
    pub fn validate_known_pseudo(&self, stream_id: StreamIdentifier) -> Result<(), WebError> {
        if self.is_pseudo() {
            let s = self.as_str();
            if !REQUEST_PSEUDO.contains(&s.as_ref()) && !RESPONSE_PSEUDO.contains(&s.as_ref()) {
                return Err(Http2Error::stream(stream_id, Reason::ProtocolError).into());
            }
        }
        Ok(())
    }

    pub const METHOD: &'static str = ":method";
    pub const SCHEME: &'static str = ":scheme";
    pub const AUTHORITY: &'static str = ":authority";
    pub const PATH: &'static str = ":path";
    pub const STATUS: &'static str = ":status";
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Hash for HeaderName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state)
    }
}

impl fmt::Debug for HeaderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl From<&'static str> for HeaderName {
    fn from(value: &'static str) -> Self {
        HeaderName::from_bytes(value.as_bytes())
    }
}

impl From<String> for HeaderName {
    fn from(value: String) -> Self {
        HeaderName::from_bytes(value.as_bytes())
    }
}

impl From<Vec<u8>> for HeaderName {
    fn from(value: Vec<u8>) -> Self {
        HeaderName::from_bytes(&value)
    }
}
