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
// Two-level flow control accounting. `RemoteFlowControl` tracks bytes
// we're allowed to send; `LocalFlowControl` tracks bytes the peer is
// allowed to send us and when we owe a WINDOW_UPDATE back.

use crate::error::{Http2Error, Reason};
use crate::frame::StreamIdentifier;
use crate::WebResult;

pub const MAX_WINDOW_SIZE: i32 = i32::MAX;
const MIN_WINDOW_SIZE: i32 = i32::MIN;

/// Outbound window: bytes we may still write before blocking on the peer's
/// WINDOW_UPDATE. Signed because a SETTINGS INITIAL_WINDOW_SIZE decrease can
/// drive an already-open stream's window negative without that being an
/// error — going negative is expected, not a fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RemoteFlowControl {
    window: i32,
}

impl RemoteFlowControl {
    pub fn new(initial: u32) -> Self {
        RemoteFlowControl {
            window: initial as i32,
        }
    }

    pub fn window(&self) -> i32 {
        self.window
    }

    pub fn is_exhausted(&self) -> bool {
        self.window <= 0
    }

    /// Applies a SETTINGS INITIAL_WINDOW_SIZE change to an already-open
    /// stream's window (RFC 7540 section 6.9.2): the delta, not the new
    /// absolute value, is what gets applied.
    pub fn apply_settings_delta(&mut self, delta: i64) {
        self.window = (self.window as i64 + delta).clamp(MIN_WINDOW_SIZE as i64, MAX_WINDOW_SIZE as i64) as i32;
    }

    fn reason_for(stream_id: StreamIdentifier) -> impl FnOnce(Reason) -> Http2Error {
        move |reason| {
            if stream_id.is_zero() {
                Http2Error::connection(reason)
            } else {
                Http2Error::stream(stream_id, reason)
            }
        }
    }

    /// Applies an inbound WINDOW_UPDATE increment (RFC 7540 section 6.9.1).
    pub fn apply_window_update(&mut self, stream_id: StreamIdentifier, increment: u32) -> WebResult<()> {
        let new_window = self.window as i64 + increment as i64;
        if new_window > MAX_WINDOW_SIZE as i64 {
            return Err(Self::reason_for(stream_id)(Reason::FlowControlError).into());
        }
        self.window = new_window as i32;
        Ok(())
    }

    /// Consumes `n` octets from the window when writing a DATA frame.
    pub fn consume(&mut self, n: usize) {
        self.window -= n as i32;
    }
}

/// Inbound window: tracks how much of the peer's granted budget we've used
/// and not yet replenished, so we know when to emit WINDOW_UPDATE.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocalFlowControl {
    window: i32,
    configured: u32,
    pending_return: u32,
    ratio: f32,
}

impl LocalFlowControl {
    pub fn new(configured: u32, ratio: f32) -> Self {
        LocalFlowControl {
            window: configured as i32,
            configured,
            pending_return: 0,
            ratio,
        }
    }

    pub fn window(&self) -> i32 {
        self.window
    }

    /// Charges `n` octets (payload + padding) against the window as an
    /// inbound DATA/HEADERS frame arrives.
    pub fn receive_data(&mut self, stream_id: StreamIdentifier, n: usize) -> WebResult<()> {
        let new_window = self.window as i64 - n as i64;
        if new_window < 0 {
            let reason = Reason::FlowControlError;
            return Err(if stream_id.is_zero() {
                Http2Error::connection(reason).into()
            } else {
                Http2Error::stream(stream_id, reason).into()
            });
        }
        self.window = new_window as i32;
        Ok(())
    }

    /// Called when the application (or connection bookkeeping) has finished
    /// with `n` previously-received bytes; returns the WINDOW_UPDATE
    /// increment to send once the bytes owed back cross the configured
    /// ratio threshold.
    pub fn consume_bytes(&mut self, n: u32) -> Option<u32> {
        self.pending_return += n;
        let threshold = (self.configured as f32 * self.ratio) as u32;
        if self.pending_return > 0 && self.pending_return >= threshold {
            let increment = self.pending_return;
            self.window = self.window.saturating_add(increment as i32).min(MAX_WINDOW_SIZE);
            self.pending_return = 0;
            Some(increment)
        } else {
            None
        }
    }

    pub fn set_configured(&mut self, configured: u32) {
        self.configured = configured;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_update_increments_and_detects_overflow() {
        let mut remote = RemoteFlowControl::new(10);
        remote.apply_window_update(StreamIdentifier::zero(), 5).unwrap();
        assert_eq!(remote.window(), 15);

        let mut remote = RemoteFlowControl::new(MAX_WINDOW_SIZE as u32);
        let err = remote
            .apply_window_update(StreamIdentifier::from(3), 1)
            .unwrap_err();
        assert_eq!(err.as_http2_error().reason(), Reason::FlowControlError);
    }

    #[test]
    fn settings_delta_can_drive_window_negative_without_erroring() {
        let mut remote = RemoteFlowControl::new(10);
        remote.apply_settings_delta(-20);
        assert_eq!(remote.window(), -10);
    }

    #[test]
    fn consuming_past_the_window_is_flow_control_error_on_the_stream() {
        let mut local = LocalFlowControl::new(5, 0.5);
        local.receive_data(StreamIdentifier::from(1), 5).unwrap();
        let err = local
            .receive_data(StreamIdentifier::from(1), 1)
            .unwrap_err();
        assert_eq!(err.as_http2_error().reason(), Reason::FlowControlError);
    }

    #[test]
    fn consume_bytes_emits_window_update_past_the_ratio_threshold() {
        let mut local = LocalFlowControl::new(10, 0.5);
        local.receive_data(StreamIdentifier::from(1), 10).unwrap();
        assert_eq!(local.window(), 0);
        let increment = local.consume_bytes(10);
        assert_eq!(increment, Some(10));
        assert_eq!(local.window(), 10);
    }
}
