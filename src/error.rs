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

use crate::hpack::DecoderError;
use crate::frame::StreamIdentifier;

/// The 14 wire error codes defined by RFC 7540 section 7.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Reason {
    NoError,
    ProtocolError,
    InternalError,
    FlowControlError,
    SettingsTimeout,
    StreamClosed,
    FrameSizeError,
    RefusedStream,
    Cancel,
    CompressionError,
    ConnectError,
    EnhanceYourCalm,
    InadequateSecurity,
    Http11Required,
    Unknown(u32),
}

impl Reason {
    pub fn description_str(&self) -> &'static str {
        use Reason::*;
        match *self {
            NoError => "no error",
            ProtocolError => "protocol error",
            InternalError => "internal error",
            FlowControlError => "flow control error",
            SettingsTimeout => "settings timeout",
            StreamClosed => "stream closed",
            FrameSizeError => "frame size error",
            RefusedStream => "refused stream",
            Cancel => "cancelled",
            CompressionError => "compression error",
            ConnectError => "connect error",
            EnhanceYourCalm => "enhance your calm",
            InadequateSecurity => "inadequate security",
            Http11Required => "http/1.1 required",
            Unknown(_) => "unknown error",
        }
    }
}

impl From<u32> for Reason {
    fn from(value: u32) -> Self {
        use Reason::*;
        match value {
            0x0 => NoError,
            0x1 => ProtocolError,
            0x2 => InternalError,
            0x3 => FlowControlError,
            0x4 => SettingsTimeout,
            0x5 => StreamClosed,
            0x6 => FrameSizeError,
            0x7 => RefusedStream,
            0x8 => Cancel,
            0x9 => CompressionError,
            0xa => ConnectError,
            0xb => EnhanceYourCalm,
            0xc => InadequateSecurity,
            0xd => Http11Required,
            other => Unknown(other),
        }
    }
}

impl From<Reason> for u32 {
    fn from(reason: Reason) -> u32 {
        use Reason::*;
        match reason {
            NoError => 0x0,
            ProtocolError => 0x1,
            InternalError => 0x2,
            FlowControlError => 0x3,
            SettingsTimeout => 0x4,
            StreamClosed => 0x5,
            FrameSizeError => 0x6,
            RefusedStream => 0x7,
            Cancel => 0x8,
            CompressionError => 0x9,
            ConnectError => 0xa,
            EnhanceYourCalm => 0xb,
            InadequateSecurity => 0xc,
            Http11Required => 0xd,
            Unknown(v) => v,
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description_str())
    }
}

/// The two error scopes: a `Connection` fault tears the whole connection
/// down with GOAWAY; a `Stream` fault is isolated with RST_STREAM and the
/// connection continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Http2Error {
    Connection(Reason),
    Stream(StreamIdentifier, Reason),
}

impl Http2Error {
    pub fn connection(reason: Reason) -> Self {
        Http2Error::Connection(reason)
    }

    pub fn stream(id: StreamIdentifier, reason: Reason) -> Self {
        Http2Error::Stream(id, reason)
    }

    pub fn reason(&self) -> Reason {
        match *self {
            Http2Error::Connection(r) => r,
            Http2Error::Stream(_, r) => r,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, Http2Error::Connection(_))
    }

    pub fn description_str(&self) -> &'static str {
        self.reason().description_str()
    }
}

impl fmt::Display for Http2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Http2Error::Connection(r) => write!(f, "connection error: {}", r),
            Http2Error::Stream(id, r) => write!(f, "stream error on {:?}: {}", id, r),
        }
    }
}

/// Crate-wide error type: a flat enum with one variant per sub-error
/// family, plus a couple of escape hatches.
#[derive(Debug)]
pub enum WebError {
    Http2(Http2Error),
    Decoder(DecoderError),
    Extension(&'static str),
    Io(std::io::Error),
}

impl WebError {
    pub fn description_str(&self) -> &'static str {
        match self {
            WebError::Http2(e) => e.description_str(),
            WebError::Decoder(_) => "hpack decoder error",
            WebError::Extension(_) => "protocol error",
            WebError::Io(_) => "io error",
        }
    }

    /// Reduces any crate error down to the wire-facing scope/reason pair
    /// callers need to decide between emitting GOAWAY and RST_STREAM.
    pub fn as_http2_error(&self) -> Http2Error {
        match self {
            WebError::Http2(e) => *e,
            WebError::Decoder(e) => Http2Error::Connection(e.reason()),
            WebError::Extension(_) => Http2Error::Connection(Reason::InternalError),
            WebError::Io(_) => Http2Error::Connection(Reason::InternalError),
        }
    }
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description_str())
    }
}

impl From<Http2Error> for WebError {
    fn from(e: Http2Error) -> Self {
        WebError::Http2(e)
    }
}

impl From<DecoderError> for WebError {
    fn from(e: DecoderError) -> Self {
        WebError::Decoder(e)
    }
}

impl From<std::io::Error> for WebError {
    fn from(e: std::io::Error) -> Self {
        WebError::Io(e)
    }
}

pub type WebResult<T> = std::result::Result<T, WebError>;
