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
// PING frame, RFC 7540 section 6.7. Always connection-level and always
// an 8-byte opaque payload; the ACK flag distinguishes request from reply.

use algorithm::buf::{Bt, BtMut};

use super::{Flag, FrameHeader, Kind, StreamIdentifier};
use crate::error::{Http2Error, Reason};
use crate::WebResult;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ping {
    flag: Flag,
    payload: [u8; 8],
}

impl Ping {
    pub fn new(payload: [u8; 8]) -> Ping {
        Ping { flag: Flag::zero(), payload }
    }

    pub fn ping(payload: [u8; 8]) -> Ping {
        Ping { flag: Flag::zero(), payload }
    }

    pub fn pong(payload: [u8; 8]) -> Ping {
        Ping { flag: Flag::ack(), payload }
    }

    pub fn payload(&self) -> &[u8; 8] {
        &self.payload
    }

    pub fn is_ack(&self) -> bool {
        self.flag.is_ack()
    }

    pub fn flags(&self) -> Flag {
        self.flag
    }

    /// Builds the ACK reply a connection sends back for a received PING.
    pub fn to_pong(&self) -> Ping {
        Ping::pong(self.payload)
    }

    pub fn parse<T: Bt>(header: FrameHeader, buf: &mut T) -> WebResult<Ping> {
        if !header.stream_id().is_zero() {
            return Err(Http2Error::connection(Reason::ProtocolError).into());
        }
        if header.length != 8 {
            return Err(Http2Error::connection(Reason::FrameSizeError).into());
        }
        if buf.remaining() < 8 {
            return Err(Http2Error::connection(Reason::FrameSizeError).into());
        }
        let mut payload = [0u8; 8];
        for slot in payload.iter_mut() {
            *slot = buf.get_u8();
        }
        Ok(Ping { flag: header.flag(), payload })
    }

    pub fn head(&self) -> FrameHeader {
        let mut head = FrameHeader::new(Kind::Ping, self.flag, StreamIdentifier::zero());
        head.length = 8;
        head
    }

    pub fn encode<B: Bt + BtMut>(&self, buf: &mut B) -> WebResult<usize> {
        let head = self.head();
        let mut size = head.encode(buf)?;
        for byte in self.payload.iter() {
            buf.put_u8(*byte);
        }
        size += 8;
        log::trace!("HTTP2: encoding PING; ack={} len={}", self.flag.is_ack(), head.length);
        Ok(size)
    }
}
