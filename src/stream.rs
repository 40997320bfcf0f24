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
// Per-stream state and the HTTP/2 stream lifecycle state machine.

use std::collections::HashMap;

use crate::error::{Http2Error, Reason};
use crate::flow_control::{LocalFlowControl, RemoteFlowControl};
use crate::frame::StreamIdentifier;
use crate::WebResult;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    ReservedLocal,
    ReservedRemote,
    Open,
    HalfClosedLocal,
    HalfClosedRemote,
    Closed,
}

pub struct Stream {
    id: StreamIdentifier,
    state: StreamState,
    remote_window: RemoteFlowControl,
    local_window: LocalFlowControl,
    properties: HashMap<String, String>,
}

impl Stream {
    pub fn new(id: StreamIdentifier, initial_remote_window: u32, initial_local_window: u32, local_ratio: f32) -> Self {
        Stream {
            id,
            state: StreamState::Idle,
            remote_window: RemoteFlowControl::new(initial_remote_window),
            local_window: LocalFlowControl::new(initial_local_window, local_ratio),
            properties: HashMap::new(),
        }
    }

    pub fn id(&self) -> StreamIdentifier {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == StreamState::Closed
    }

    pub fn remote_window(&mut self) -> &mut RemoteFlowControl {
        &mut self.remote_window
    }

    pub fn local_window(&mut self) -> &mut LocalFlowControl {
        &mut self.local_window
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|s| s.as_str())
    }

    fn guard_not_closed(&self) -> WebResult<()> {
        if self.state == StreamState::Closed {
            return Err(Http2Error::stream(self.id, Reason::StreamClosed).into());
        }
        Ok(())
    }

    /// Transitions on sending a HEADERS (or, for server push, PUSH_PROMISE).
    pub fn send_headers(&mut self, end_stream: bool) -> WebResult<()> {
        self.guard_not_closed()?;
        self.state = match self.state {
            StreamState::Idle => {
                if end_stream {
                    StreamState::HalfClosedLocal
                } else {
                    StreamState::Open
                }
            }
            StreamState::ReservedLocal => StreamState::HalfClosedRemote,
            StreamState::Open if end_stream => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote if end_stream => StreamState::Closed,
            other => other,
        };
        log::trace!("HTTP2: stream {} send_headers -> {:?}", self.id, self.state);
        Ok(())
    }

    /// Transitions on receiving a HEADERS.
    pub fn recv_headers(&mut self, end_stream: bool) -> WebResult<()> {
        self.guard_not_closed()?;
        self.state = match self.state {
            StreamState::Idle => {
                if end_stream {
                    StreamState::HalfClosedRemote
                } else {
                    StreamState::Open
                }
            }
            StreamState::ReservedRemote => StreamState::HalfClosedLocal,
            StreamState::Open if end_stream => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal if end_stream => StreamState::Closed,
            other => other,
        };
        log::trace!("HTTP2: stream {} recv_headers -> {:?}", self.id, self.state);
        Ok(())
    }

    pub fn send_push_promise(&mut self) -> WebResult<()> {
        self.guard_not_closed()?;
        self.state = StreamState::ReservedLocal;
        Ok(())
    }

    pub fn recv_push_promise(&mut self) -> WebResult<()> {
        self.guard_not_closed()?;
        self.state = StreamState::ReservedRemote;
        Ok(())
    }

    /// Transitions on a DATA or trailing HEADERS frame carrying END_STREAM,
    /// sent locally.
    pub fn send_end_stream(&mut self) -> WebResult<()> {
        self.guard_not_closed()?;
        self.state = match self.state {
            StreamState::Open => StreamState::HalfClosedLocal,
            StreamState::HalfClosedRemote => StreamState::Closed,
            other => other,
        };
        Ok(())
    }

    pub fn recv_end_stream(&mut self) -> WebResult<()> {
        self.guard_not_closed()?;
        self.state = match self.state {
            StreamState::Open => StreamState::HalfClosedRemote,
            StreamState::HalfClosedLocal => StreamState::Closed,
            other => other,
        };
        Ok(())
    }

    pub fn reset(&mut self) {
        log::debug!("HTTP2: stream {} reset from {:?}", self.id, self.state);
        self.state = StreamState::Closed;
    }

    pub fn can_send_data(&self) -> bool {
        matches!(self.state, StreamState::Open | StreamState::HalfClosedRemote)
    }

    pub fn can_recv_data(&self) -> bool {
        matches!(self.state, StreamState::Open | StreamState::HalfClosedLocal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_stream() -> Stream {
        Stream::new(StreamIdentifier::from(1), 65_535, 65_535, 0.5)
    }

    #[test]
    fn idle_to_open_to_half_closed_local_on_send() {
        let mut stream = new_stream();
        stream.send_headers(false).unwrap();
        assert_eq!(stream.state(), StreamState::Open);
        stream.send_end_stream().unwrap();
        assert_eq!(stream.state(), StreamState::HalfClosedLocal);
    }

    #[test]
    fn half_closed_remote_plus_send_end_stream_closes() {
        let mut stream = new_stream();
        stream.send_headers(false).unwrap();
        stream.recv_end_stream().unwrap();
        assert_eq!(stream.state(), StreamState::HalfClosedRemote);
        stream.send_end_stream().unwrap();
        assert_eq!(stream.state(), StreamState::Closed);
    }

    #[test]
    fn operating_on_a_closed_stream_is_a_stream_error() {
        let mut stream = new_stream();
        stream.reset();
        let err = stream.send_headers(false).unwrap_err();
        assert_eq!(err.as_http2_error().reason(), Reason::StreamClosed);
        assert!(!err.as_http2_error().is_connection_error());
    }

    #[test]
    fn single_frame_request_response_closes_immediately() {
        let mut stream = new_stream();
        stream.recv_headers(true).unwrap();
        assert_eq!(stream.state(), StreamState::HalfClosedRemote);
        stream.send_headers(true).unwrap();
        assert_eq!(stream.state(), StreamState::Closed);
    }
}
