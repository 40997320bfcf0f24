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
// The connection-wide state a codec instance carries across frames: the
// stream table, both peers' SETTINGS, connection-level flow control, the
// priority tree, and the small pile of abuse counters that guard against
// rapid RST_STREAM, CONTINUATION floods, and idle streams.

use std::collections::{HashMap, VecDeque};

use crate::config::Config;
use crate::decompress::Decompressor;
use crate::error::{Http2Error, Reason};
use crate::flow_control::{LocalFlowControl, RemoteFlowControl};
use crate::frame::{GoAway, Ping, Settings, StreamIdentifier};
use crate::priority_tree::PriorityTree;
use crate::stream::{Stream, StreamState};
use crate::WebResult;

/// RFC 7540 section 3.5: the client connection preface.
pub const HTTP2_MAGIC: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// How many closed streams we keep around (keyed by id) so a late frame for
/// a stream we already tore down gets a clean StreamClosed error instead of
/// silently reopening a fresh `Idle` one. Bounded so a long-lived connection
/// with many short streams doesn't grow this table without limit.
const CLOSED_STREAM_LRU_CAPACITY: usize = 256;

/// Cumulative header-block bytes a single HEADERS/CONTINUATION sequence may
/// carry before we tear down the connection, grounded on the same constant
/// ariel42-h2-sans-io's codec uses to stop a CONTINUATION flood before it
/// grows the reassembly buffer without bound.
pub const MAX_HEADER_BLOCK_SIZE: usize = 256 * 1024;

/// Whether this endpoint negotiates stream ids as the client (odd ids) or
/// the server (even ids).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Endpoint-local limiter for RFC 7540's "rapid reset" abuse pattern: a peer
/// opening and immediately RST_STREAM-ing streams in bulk must eventually
/// trip EnhanceYourCalm rather than being allowed to do it forever.
pub const DEFAULT_RESET_STREAM_MAX: usize = 10;
pub const DEFAULT_RESET_STREAM_SECS: u64 = 30;
pub const DEFAULT_REMOTE_RESET_STREAM_MAX: usize = 20;

struct ResetBudget {
    max_per_window: usize,
    window_secs: u64,
    window_start_secs: u64,
    count: usize,
    total: usize,
    hard_cap: usize,
}

impl ResetBudget {
    fn new() -> Self {
        ResetBudget {
            max_per_window: DEFAULT_RESET_STREAM_MAX,
            window_secs: DEFAULT_RESET_STREAM_SECS,
            window_start_secs: 0,
            count: 0,
            total: 0,
            hard_cap: DEFAULT_REMOTE_RESET_STREAM_MAX,
        }
    }

    /// Records a peer-initiated stream reset observed at `now_secs`. Returns
    /// `Err` once the peer has exceeded either the per-window rate or the
    /// lifetime hard cap, at which point the connection should GOAWAY with
    /// `EnhanceYourCalm`.
    fn record(&mut self, now_secs: u64) -> WebResult<()> {
        if now_secs.saturating_sub(self.window_start_secs) >= self.window_secs {
            self.window_start_secs = now_secs;
            self.count = 0;
        }
        self.count += 1;
        self.total += 1;
        if self.count > self.max_per_window || self.total > self.hard_cap {
            return Err(Http2Error::connection(Reason::EnhanceYourCalm).into());
        }
        Ok(())
    }
}

/// Accumulates a HEADERS (or PUSH_PROMISE) block across CONTINUATION frames
/// until END_HEADERS lands. Owned by the frame reader, which is the only
/// thing that ever sees raw CONTINUATION frames — modeled as an explicit
/// state field rather than implicit buffering.
pub struct PendingHeaderBlock {
    pub stream_id: StreamIdentifier,
    pub promised_id: Option<StreamIdentifier>,
    pub stream_dep: Option<crate::frame::StreamDependency>,
    pub end_stream: bool,
    pub block: Vec<u8>,
}

pub struct Connection {
    role: Role,
    config: Config,
    streams: HashMap<StreamIdentifier, Stream>,
    closed_lru: VecDeque<StreamIdentifier>,
    next_local_id: StreamIdentifier,
    last_remote_id: StreamIdentifier,
    local_settings: Settings,
    remote_settings: Settings,
    local_settings_acked: bool,
    remote_window: RemoteFlowControl,
    local_window: LocalFlowControl,
    priority_tree: PriorityTree,
    decompressors: HashMap<StreamIdentifier, Decompressor>,
    goaway_sent: Option<GoAway>,
    goaway_received: Option<GoAway>,
    reset_budget: ResetBudget,
    pending_headers: Option<PendingHeaderBlock>,
    outstanding_ping: Option<[u8; 8]>,
}

impl Connection {
    pub fn new(role: Role, config: Config) -> Self {
        let next_local_id = match role {
            Role::Client => StreamIdentifier::client_first(),
            Role::Server => StreamIdentifier::server_first(),
        };
        Connection {
            role,
            remote_window: RemoteFlowControl::new(config.initial_window_size()),
            local_window: LocalFlowControl::new(config.initial_window_size(), config.window_update_ratio()),
            config,
            streams: HashMap::new(),
            closed_lru: VecDeque::new(),
            next_local_id,
            last_remote_id: StreamIdentifier::zero(),
            local_settings: Settings::default(),
            remote_settings: Settings::default(),
            local_settings_acked: false,
            priority_tree: PriorityTree::new(),
            decompressors: HashMap::new(),
            goaway_sent: None,
            goaway_received: None,
            reset_budget: ResetBudget::new(),
            pending_headers: None,
            outstanding_ping: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The local SETTINGS this connection advertises; sent once at startup
    /// as the first frame on the wire (RFC 7540 section 3.5).
    pub fn local_preface_settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.set_header_table_size(Some(self.config.header_table_size() as u32));
        settings.set_enable_push(self.config.enable_push());
        settings.set_max_frame_size(Some(self.config.max_frame_size()));
        settings.set_initial_window_size(Some(self.config.initial_window_size()));
        if let Some(max) = self.config.max_concurrent_streams() {
            settings.set_max_concurrent_streams(Some(max));
        }
        settings
    }

    /// Applies a SETTINGS frame received from the peer (RFC 7540 section
    /// 6.5.3): updates the remembered remote settings and reconciles every
    /// open stream's remote flow-control window against an
    /// INITIAL_WINDOW_SIZE change.
    pub fn apply_remote_settings(&mut self, settings: &Settings) -> WebResult<()> {
        if let (Some(old), Some(new)) = (self.remote_settings.initial_window_size(), settings.initial_window_size()) {
            let delta = new as i64 - old as i64;
            if delta != 0 {
                for stream in self.streams.values_mut() {
                    stream.remote_window().apply_settings_delta(delta);
                }
            }
        } else if let Some(new) = settings.initial_window_size() {
            let delta = new as i64 - self.config.initial_window_size() as i64;
            if delta != 0 {
                for stream in self.streams.values_mut() {
                    stream.remote_window().apply_settings_delta(delta);
                }
            }
        }

        if let Some(table_size) = settings.header_table_size() {
            self.remote_settings.set_header_table_size(Some(table_size));
        }
        if let Some(push) = settings.is_push_enabled() {
            self.remote_settings.set_enable_push(push);
        }
        if let Some(max) = settings.max_concurrent_streams() {
            self.remote_settings.set_max_concurrent_streams(Some(max));
        }
        if let Some(size) = settings.initial_window_size() {
            self.remote_settings.set_initial_window_size(Some(size));
        }
        if let Some(size) = settings.max_frame_size() {
            self.remote_settings.set_max_frame_size(Some(size));
        }
        if let Some(size) = settings.max_header_list_size() {
            self.remote_settings.set_max_header_list_size(Some(size));
        }
        Ok(())
    }

    pub fn local_settings_acked(&self) -> bool {
        self.local_settings_acked
    }

    pub fn mark_local_settings_acked(&mut self) {
        self.local_settings_acked = true;
    }

    pub fn remote_window(&mut self) -> &mut RemoteFlowControl {
        &mut self.remote_window
    }

    pub fn local_window(&mut self) -> &mut LocalFlowControl {
        &mut self.local_window
    }

    pub fn priority_tree(&mut self) -> &mut PriorityTree {
        &mut self.priority_tree
    }

    /// Looks up a stream, creating it (idle) on first reference from either
    /// side, rejecting ids that go backwards (RFC 7540 section 5.1.1) and
    /// ids for streams this connection already tore down.
    pub fn get_or_create_stream(&mut self, id: StreamIdentifier, remote_initiated: bool) -> WebResult<&mut Stream> {
        if self.closed_lru.contains(&id) {
            return Err(Http2Error::stream(id, Reason::StreamClosed).into());
        }
        if !self.streams.contains_key(&id) {
            if remote_initiated {
                if id <= self.last_remote_id && !self.last_remote_id.is_zero() {
                    return Err(Http2Error::connection(Reason::ProtocolError).into());
                }
                self.last_remote_id = id;
                if let Some(max) = self.config.max_concurrent_streams() {
                    let open_remote = self
                        .streams
                        .values()
                        .filter(|s| !s.is_closed())
                        .count();
                    if open_remote as u32 >= max {
                        return Err(Http2Error::stream(id, Reason::RefusedStream).into());
                    }
                }
            }
            let stream = Stream::new(
                id,
                self.config.initial_window_size(),
                self.config.initial_window_size(),
                self.config.window_update_ratio(),
            );
            self.streams.insert(id, stream);
        }
        Ok(self.streams.get_mut(&id).unwrap())
    }

    pub fn stream(&self, id: StreamIdentifier) -> Option<&Stream> {
        self.streams.get(&id)
    }

    pub fn stream_mut(&mut self, id: StreamIdentifier) -> Option<&mut Stream> {
        self.streams.get_mut(&id)
    }

    /// Allocates the next stream id this endpoint may use to initiate a
    /// stream (RFC 7540 section 5.1.1: odd for clients, even for servers).
    pub fn next_stream_id(&mut self) -> StreamIdentifier {
        let id = self.next_local_id;
        self.next_local_id.next_id();
        id
    }

    pub fn decompressor_for(&mut self, stream_id: StreamIdentifier) -> Option<&mut Decompressor> {
        self.decompressors.get_mut(&stream_id)
    }

    pub fn install_decompressor(&mut self, stream_id: StreamIdentifier, decompressor: Decompressor) {
        self.decompressors.insert(stream_id, decompressor);
    }

    pub fn pending_headers(&self) -> Option<&PendingHeaderBlock> {
        self.pending_headers.as_ref()
    }

    pub fn pending_headers_mut(&mut self) -> Option<&mut PendingHeaderBlock> {
        self.pending_headers.as_mut()
    }

    /// Starts accumulating a fragmented header block. Fails if one is
    /// already in flight, since RFC 7540 section 6.10 forbids interleaving
    /// header blocks from different streams.
    pub fn begin_pending_headers(&mut self, pending: PendingHeaderBlock) -> WebResult<()> {
        if self.pending_headers.is_some() {
            return Err(Http2Error::connection(Reason::ProtocolError).into());
        }
        self.pending_headers = Some(pending);
        Ok(())
    }

    /// Appends a CONTINUATION fragment to the in-flight header block,
    /// enforcing the flood guard.
    pub fn extend_pending_headers(&mut self, stream_id: StreamIdentifier, fragment: &[u8]) -> WebResult<()> {
        let pending = self
            .pending_headers
            .as_mut()
            .ok_or_else(|| Http2Error::connection(Reason::ProtocolError))?;
        if pending.stream_id != stream_id {
            return Err(Http2Error::connection(Reason::ProtocolError).into());
        }
        if pending.block.len() + fragment.len() > MAX_HEADER_BLOCK_SIZE {
            return Err(Http2Error::connection(Reason::EnhanceYourCalm).into());
        }
        pending.block.extend_from_slice(fragment);
        Ok(())
    }

    pub fn take_pending_headers(&mut self) -> Option<PendingHeaderBlock> {
        self.pending_headers.take()
    }

    pub fn closes_stream(&mut self, id: StreamIdentifier) {
        if let Some(stream) = self.streams.get_mut(&id) {
            stream.reset();
        }
        self.priority_tree.remove(id);
        self.decompressors.remove(&id);
        if !self.closed_lru.contains(&id) {
            self.closed_lru.push_back(id);
            if self.closed_lru.len() > CLOSED_STREAM_LRU_CAPACITY {
                self.closed_lru.pop_front();
            }
        }
    }

    /// Records a peer-sent RST_STREAM for rapid-reset abuse tracking.
    /// `now_secs` is caller-supplied since a sans-io core has no clock of
    /// its own.
    pub fn record_remote_reset(&mut self, now_secs: u64) -> WebResult<()> {
        self.reset_budget.record(now_secs)
    }

    /// Starts a round-trip PING measurement; returns the 8-byte payload to
    /// send. The connection remembers it so a later `observe_pong` can
    /// confirm the echo matches before reporting the round trip complete.
    pub fn ping(&mut self, payload: [u8; 8]) -> Ping {
        self.outstanding_ping = Some(payload);
        Ping::ping(payload)
    }

    /// Checks a received PING ACK against the outstanding measurement,
    /// clearing it either way; returns whether the payload matched.
    pub fn observe_pong(&mut self, payload: &[u8; 8]) -> bool {
        match self.outstanding_ping.take() {
            Some(expected) => &expected == payload,
            None => false,
        }
    }

    pub fn goaway_sent(&self) -> Option<&GoAway> {
        self.goaway_sent.as_ref()
    }

    pub fn note_goaway_sent(&mut self, goaway: GoAway) {
        self.goaway_sent = Some(goaway);
    }

    pub fn goaway_received(&self) -> Option<&GoAway> {
        self.goaway_received.as_ref()
    }

    pub fn note_goaway_received(&mut self, goaway: GoAway) {
        self.goaway_received = Some(goaway);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.goaway_sent.is_some() || self.goaway_received.is_some()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn open_stream_ids(&self) -> Vec<StreamIdentifier> {
        self.streams
            .iter()
            .filter(|(_, s)| s.state() != StreamState::Idle)
            .map(|(id, _)| *id)
            .collect()
    }
}
