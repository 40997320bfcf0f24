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
// Capability-based listener surface: a set of methods with a default
// no-op body, so callers override only the frames they care about.

use crate::error::Reason;
use crate::frame::{Kind, StreamIdentifier};
use crate::header::HeaderList;

pub trait Listener {
    fn on_headers_read(
        &mut self,
        _stream_id: StreamIdentifier,
        _headers: HeaderList,
        _end_of_stream: bool,
    ) {
    }

    /// Returns how many of the delivered bytes the application consumed
    /// right away; the remainder stays charged against the local flow
    /// control window until `Connection::consume_bytes` is called for it.
    fn on_data_read(&mut self, _stream_id: StreamIdentifier, data: &[u8], _end_of_stream: bool) -> usize {
        data.len()
    }

    fn on_rst_stream_read(&mut self, _stream_id: StreamIdentifier, _error_code: Reason) {}

    fn on_settings_read(&mut self, _settings: &crate::frame::Settings) {}

    fn on_settings_ack_read(&mut self) {}

    fn on_ping_read(&mut self, _payload: &[u8; 8]) {}

    fn on_ping_ack_read(&mut self, _payload: &[u8; 8]) {}

    fn on_push_promise_read(
        &mut self,
        _stream_id: StreamIdentifier,
        _promised_stream_id: StreamIdentifier,
        _headers: HeaderList,
    ) {
    }

    fn on_go_away_read(&mut self, _last_stream_id: StreamIdentifier, _error_code: Reason, _debug_data: &[u8]) {}

    fn on_window_update_read(&mut self, _stream_id: StreamIdentifier, _delta: u32) {}

    fn on_unknown_frame(&mut self, _kind: Kind, _stream_id: StreamIdentifier) {}
}

/// A listener that ignores every callback; useful as a base to wrap with a
/// decorator that overrides only a handful of methods.
#[derive(Default)]
pub struct NoopListener;

impl Listener for NoopListener {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_listener_consumes_the_full_data_frame_by_default() {
        let mut listener = NoopListener;
        assert_eq!(listener.on_data_read(StreamIdentifier::from(1), b"hello", false), 5);
    }
}
