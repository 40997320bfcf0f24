// Black-box wire-level scenarios driven entirely through the public `Codec`
// API: two codecs (client/server) feeding each other's output, the way a
// real transport would, rather than exercising connection/stream internals
// directly.

use algorithm::buf::{BinaryMut, Bt};
use h2parse::frame::StreamIdentifier;
use h2parse::header::{HeaderList, HeaderName, HeaderValue};
use h2parse::{Codec, Config, Listener, Role};

#[derive(Default)]
struct Capture {
    headers_seen: Vec<StreamIdentifier>,
    data_seen: Vec<(StreamIdentifier, Vec<u8>)>,
    end_streams: Vec<StreamIdentifier>,
    pings_acked: Vec<[u8; 8]>,
    goaways: Vec<h2parse::Reason>,
}

impl Listener for Capture {
    fn on_headers_read(&mut self, stream_id: StreamIdentifier, _headers: HeaderList, end_of_stream: bool) {
        self.headers_seen.push(stream_id);
        if end_of_stream {
            self.end_streams.push(stream_id);
        }
    }

    fn on_data_read(&mut self, stream_id: StreamIdentifier, data: &[u8], end_of_stream: bool) -> usize {
        self.data_seen.push((stream_id, data.to_vec()));
        if end_of_stream {
            self.end_streams.push(stream_id);
        }
        data.len()
    }

    fn on_ping_ack_read(&mut self, payload: &[u8; 8]) {
        self.pings_acked.push(*payload);
    }

    fn on_go_away_read(&mut self, _last_stream_id: StreamIdentifier, error_code: h2parse::Reason, _debug_data: &[u8]) {
        self.goaways.push(error_code);
    }
}

fn request_headers() -> HeaderList {
    let mut headers = HeaderList::new();
    headers.push(HeaderName::from_static(":method"), HeaderValue::from_static("GET"));
    headers.push(HeaderName::from_static(":scheme"), HeaderValue::from_static("https"));
    headers.push(HeaderName::from_static(":path"), HeaderValue::from_static("/"));
    headers.push(HeaderName::from_static(":authority"), HeaderValue::from_static("example.com"));
    headers
}

#[test]
fn a_full_request_response_exchange_reaches_both_listeners() {
    let mut client = Codec::new(Role::Client, Config::new());
    let mut server = Codec::new(Role::Server, Config::new());

    let mut client_out = BinaryMut::new();
    client.send_preface(&mut client_out).unwrap();
    let stream_id = StreamIdentifier::from(1);
    client.send_headers(stream_id, request_headers(), true, &mut client_out).unwrap();

    let mut server_capture = Capture::default();
    server.feed(client_out.chunk(), &mut server_capture).unwrap();
    assert_eq!(server_capture.headers_seen, vec![stream_id]);
    assert_eq!(server_capture.end_streams, vec![stream_id]);

    let mut server_out = BinaryMut::new();
    server.send_preface(&mut server_out).unwrap();
    let mut response = HeaderList::new();
    response.push(HeaderName::from_static(":status"), HeaderValue::from_static("200"));
    server.send_headers(stream_id, response, false, &mut server_out).unwrap();
    server.send_data(stream_id, b"hello world", true, &mut server_out).unwrap();

    let mut client_capture = Capture::default();
    client.feed(server_out.chunk(), &mut client_capture).unwrap();
    assert_eq!(client_capture.headers_seen, vec![stream_id]);
    assert_eq!(client_capture.data_seen, vec![(stream_id, b"hello world".to_vec())]);
    assert_eq!(client_capture.end_streams, vec![stream_id]);
}

#[test]
fn a_large_body_is_fragmented_across_multiple_data_frames_and_reassembles() {
    let config = Config::new().with_max_frame_size(16_384);
    let mut client = Codec::new(Role::Client, config.clone());
    let mut server = Codec::new(Role::Server, config);

    let mut wire = BinaryMut::new();
    client.send_preface(&mut wire).unwrap();
    let stream_id = StreamIdentifier::from(1);
    client.send_headers(stream_id, request_headers(), false, &mut wire).unwrap();
    let body = vec![0x42u8; 50_000];
    client.send_data(stream_id, &body, true, &mut wire).unwrap();

    let mut capture = Capture::default();
    server.feed(wire.chunk(), &mut capture).unwrap();
    assert!(capture.data_seen.len() > 1, "a 50000-byte body at a 16384-byte max frame size must split");
    let reassembled: Vec<u8> = capture.data_seen.iter().flat_map(|(_, d)| d.clone()).collect();
    assert_eq!(reassembled, body);
    assert_eq!(capture.end_streams, vec![stream_id]);
}

#[test]
fn a_fresh_ping_and_its_ack_are_distinguishable_on_the_wire() {
    let mut client = Codec::new(Role::Client, Config::new());
    let mut server = Codec::new(Role::Server, Config::new());

    let payload = [9, 8, 7, 6, 5, 4, 3, 2];
    let mut wire = BinaryMut::new();
    client.send_ping(payload, &mut wire).unwrap();

    // A fresh (non-ack) PING does not land in on_ping_ack_read.
    let mut server_capture = Capture::default();
    server.feed(wire.chunk(), &mut server_capture).unwrap();
    assert!(server_capture.pings_acked.is_empty());
    assert!(!server.connection_mut().observe_pong(&payload));

    // The matching ack the transport loop would send back in reply does.
    let ack = h2parse::frame::Ping::ping(payload).to_pong();
    let mut ack_wire = BinaryMut::new();
    ack.encode(&mut ack_wire).unwrap();

    let mut client_capture = Capture::default();
    client.connection_mut().ping(payload);
    client.feed(ack_wire.chunk(), &mut client_capture).unwrap();
    assert_eq!(client_capture.pings_acked, vec![payload]);
}

#[test]
fn window_update_replenishes_a_stalled_connection_level_window() {
    let small_window = Config::new().with_initial_window_size(16);
    let mut client = Codec::new(Role::Client, small_window.clone());
    let mut server = Codec::new(Role::Server, small_window);

    let mut wire = BinaryMut::new();
    client.send_preface(&mut wire).unwrap();
    let stream_id = StreamIdentifier::from(1);
    client.send_headers(stream_id, request_headers(), false, &mut wire).unwrap();
    client.send_data(stream_id, &[0u8; 16], false, &mut wire).unwrap();

    assert!(client.connection_mut().remote_window().is_exhausted());

    let mut capture = Capture::default();
    server.feed(wire.chunk(), &mut capture).unwrap();

    let mut update_wire = BinaryMut::new();
    server
        .send_window_update(StreamIdentifier::zero(), 16, &mut update_wire)
        .unwrap();
    client.feed(update_wire.chunk(), &mut Capture::default()).unwrap();

    assert!(!client.connection_mut().remote_window().is_exhausted());
}

#[test]
fn go_away_is_observed_by_the_peer_with_its_reason() {
    let mut server = Codec::new(Role::Server, Config::new());
    let mut client = Codec::new(Role::Client, Config::new());

    let mut wire = BinaryMut::new();
    server.send_go_away(h2parse::Reason::EnhanceYourCalm, &mut wire).unwrap();

    let mut capture = Capture::default();
    client.feed(wire.chunk(), &mut capture).unwrap();
    assert_eq!(capture.goaways, vec![h2parse::Reason::EnhanceYourCalm]);
    assert!(client.connection().goaway_received().is_some());
}
