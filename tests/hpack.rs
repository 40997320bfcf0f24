// Black-box HPACK scenarios exercised against the public `Decoder`/`Encoder`
// API only, mirroring the RFC 7541 appendix C worked examples end to end
// rather than poking at decoder internals.

use h2parse::hpack::{Decoder, EncodableHeader, Encoder};
use h2parse::{HeaderName, HeaderValue};

fn pair(name: &'static str, value: &'static str) -> (HeaderName, HeaderValue) {
    (HeaderName::from_static(name), HeaderValue::from_static(value))
}

#[test]
fn rfc7541_c3_three_requests_share_dynamic_table_growth() {
    // C.3: three requests that grow the dynamic table across blocks and
    // confirm later blocks reuse entries the earlier ones inserted.
    let mut encoder = Encoder::new(4096);
    let mut decoder = Decoder::new(4096, usize::MAX);

    let first = vec![
        pair(":method", "GET"),
        pair(":scheme", "http"),
        pair(":path", "/"),
        pair(":authority", "www.example.com"),
    ];
    let mut wire = Vec::new();
    encoder.encode(first.iter().map(|(n, v)| EncodableHeader::new(n, v)), &mut wire);
    let decoded = decoder.decode(&wire).unwrap();
    assert_eq!(decoded.len(), 4);
    assert_eq!(decoder.dynamic_table_size(), 57);

    let second = vec![
        pair(":method", "GET"),
        pair(":scheme", "http"),
        pair(":path", "/"),
        pair(":authority", "www.example.com"),
        pair("cache-control", "no-cache"),
    ];
    let mut wire = Vec::new();
    encoder.encode(second.iter().map(|(n, v)| EncodableHeader::new(n, v)), &mut wire);
    let decoded = decoder.decode(&wire).unwrap();
    let decoded: Vec<_> = decoded.iter().map(|(n, v)| (n.clone(), v.clone())).collect();
    assert_eq!(decoded, second);
    // The :authority entry from the first block is reused by reference, so
    // only cache-control grows the table further.
    assert_eq!(decoder.dynamic_table_size(), 57 + 53);
}

#[test]
fn a_dynamic_table_size_reduction_mid_stream_evicts_old_entries() {
    let mut encoder = Encoder::new(4096);
    let mut decoder = Decoder::new(4096, usize::MAX);

    let (name, value) = pair("custom-key", "custom-value");
    let mut wire = Vec::new();
    encoder.encode(std::iter::once(EncodableHeader::new(&name, &value)), &mut wire);
    decoder.decode(&wire).unwrap();
    assert!(decoder.dynamic_table_size() > 0);

    // Local settings shrink the table; the encoder must announce the
    // reduction before its next block, and the decoder must see it.
    encoder.set_max_header_table_size(0);
    decoder.set_max_dynamic_table_size(0);

    let (name2, value2) = pair("another-key", "another-value");
    let mut wire = Vec::new();
    encoder.encode(std::iter::once(EncodableHeader::new(&name2, &value2)), &mut wire);
    let decoded = decoder.decode(&wire).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoder.dynamic_table_size(), 0);
}

#[test]
fn sensitive_headers_never_reappear_as_an_indexed_reference() {
    let mut encoder = Encoder::new(4096);
    let mut decoder = Decoder::new(4096, usize::MAX);

    let (name, value) = pair("authorization", "bearer secret-token");
    let mut first = Vec::new();
    encoder.encode(std::iter::once(EncodableHeader::sensitive(&name, &value)), &mut first);
    let mut second = Vec::new();
    encoder.encode(std::iter::once(EncodableHeader::sensitive(&name, &value)), &mut second);

    // Never-indexed literals encode identically every time: no dynamic
    // table state is built up to shrink the second occurrence.
    assert_eq!(first, second);

    let decoded = decoder.decode(&first).unwrap();
    assert_eq!(decoded.iter().next().unwrap().1.as_bytes(), value.as_bytes());
    assert_eq!(decoder.dynamic_table_size(), 0);
}

#[test]
fn a_header_block_exceeding_max_header_list_size_is_rejected() {
    let mut encoder = Encoder::new(4096);
    let mut decoder = Decoder::new(4096, 40);

    let (name, value) = pair("x-long-header-name", "a-fairly-long-header-value");
    let mut wire = Vec::new();
    encoder.encode(std::iter::once(EncodableHeader::new(&name, &value)), &mut wire);

    let err = decoder.decode(&wire).unwrap_err();
    assert!(!err.is_connection_error());
}
