use super::*;

// =============================================================================
// type codes
// =============================================================================

#[test]
fn phase_tags_match_wire_values() {
    assert_eq!(Phase::Auth.as_u8(), 0);
    assert_eq!(Phase::Query.as_u8(), 1);
}

#[test]
fn auth_type_codes_round_trip() {
    for kind in [AuthType::Request, AuthType::Challenge, AuthType::Success, AuthType::Fail] {
        assert_eq!(AuthType::from_u8(kind.as_u8()), Some(kind));
    }
    assert_eq!(AuthType::from_u8(9), None);
}

#[test]
fn query_type_codes_round_trip() {
    for kind in [QueryType::Image, QueryType::Weather, QueryType::Exit, QueryType::Success, QueryType::Fail] {
        assert_eq!(QueryType::from_u8(kind.as_u8()), Some(kind));
    }
    assert_eq!(QueryType::from_u8(200), None);
}

#[test]
fn type_accessors_respect_phase() {
    let frame = Frame::auth(AuthType::Challenge, "x");
    assert_eq!(frame.auth_type(), Some(AuthType::Challenge));
    assert_eq!(frame.query_type(), None);

    let frame = Frame::query(QueryType::Weather, "x");
    assert_eq!(frame.query_type(), Some(QueryType::Weather));
    assert_eq!(frame.auth_type(), None);
}

// =============================================================================
// buffer codec
// =============================================================================

#[test]
fn encode_writes_header_in_order() {
    let frame = Frame::auth(AuthType::Success, "abc");
    let bytes = encode_frame(&frame).expect("encode");
    assert_eq!(bytes, vec![0, 2, 0, 0, 0, 3, b'a', b'b', b'c']);
}

#[test]
fn encode_uses_big_endian_length() {
    let frame = Frame::query(QueryType::Success, vec![7u8; 0x0102]);
    let bytes = encode_frame(&frame).expect("encode");
    assert_eq!(&bytes[..HEADER_LEN], &[1, 3, 0, 0, 0x01, 0x02]);
    assert_eq!(bytes.len(), HEADER_LEN + 0x0102);
}

#[test]
fn decode_reproduces_empty_single_and_large_payloads() {
    let large: Vec<u8> = (0..70_000u32).map(|i| (i % 251) as u8).collect();
    for payload in [Vec::new(), vec![0x5a], large] {
        let frame = Frame::query(QueryType::Image, payload.clone());
        let decoded = decode_frame(&encode_frame(&frame).expect("encode")).expect("decode");
        assert_eq!(decoded.phase, Phase::Query);
        assert_eq!(decoded.query_type(), Some(QueryType::Image));
        assert_eq!(decoded.payload, payload);
    }
}

#[test]
fn decode_keeps_unknown_type_code() {
    let decoded = decode_frame(&[1, 42, 0, 0, 0, 0]).expect("decode");
    assert_eq!(decoded.code, 42);
    assert_eq!(decoded.query_type(), None);
}

#[test]
fn decode_rejects_short_payload() {
    let err = decode_frame(&[0, 0, 0, 0, 0, 5, b'a', b'b']).expect_err("should be truncated");
    assert!(matches!(err, CodecError::Truncated { expected: 5, actual: 2 }));
}

#[test]
fn decode_rejects_short_header() {
    let err = decode_frame(&[0, 0, 0]).expect_err("should be truncated");
    assert!(matches!(err, CodecError::Truncated { expected: HEADER_LEN, actual: 3 }));
}

#[test]
fn decode_rejects_trailing_bytes() {
    let err = decode_frame(&[0, 0, 0, 0, 0, 1, b'a', b'b']).expect_err("should have trailing bytes");
    assert!(matches!(err, CodecError::TrailingBytes(1)));
}

#[test]
fn decode_rejects_invalid_phase() {
    let err = decode_frame(&[7, 0, 0, 0, 0, 0]).expect_err("phase should be invalid");
    assert!(matches!(err, CodecError::InvalidPhase(7)));
}

#[test]
fn decode_rejects_negative_length() {
    let err = decode_frame(&[0, 0, 0xff, 0xff, 0xff, 0xff]).expect_err("length should be invalid");
    assert!(matches!(err, CodecError::NegativeLength(-1)));
}

#[test]
fn decode_rejects_oversize_length() {
    let len = i32::try_from(MAX_PAYLOAD_LEN + 1).expect("fits").to_be_bytes();
    let err = decode_frame(&[0, 0, len[0], len[1], len[2], len[3]]).expect_err("too large");
    assert!(matches!(err, CodecError::PayloadTooLarge(_)));
}

// =============================================================================
// stream codec
// =============================================================================

#[tokio::test]
async fn stream_round_trip_over_duplex() {
    let (mut a, mut b) = tokio::io::duplex(1024);
    let sent = Frame::auth(AuthType::Request, "Abdul");
    let writer = tokio::spawn(async move {
        write_frame(&mut a, &sent).await.expect("write");
        a
    });
    let received = read_frame(&mut b).await.expect("read");
    let _a = writer.await.expect("join");
    assert_eq!(received, Frame::auth(AuthType::Request, "Abdul"));
}

#[tokio::test]
async fn stream_waits_for_payload_split_across_writes() {
    let (mut a, mut b) = tokio::io::duplex(64);
    let bytes = encode_frame(&Frame::query(QueryType::Weather, vec![1u8; 200])).expect("encode");
    let writer = tokio::spawn(async move {
        for chunk in bytes.chunks(17) {
            a.write_all(chunk).await.expect("write chunk");
        }
        a
    });
    let frame = read_frame(&mut b).await.expect("read");
    let _a = writer.await.expect("join");
    assert_eq!(frame.payload.len(), 200);
}

#[tokio::test]
async fn stream_eof_at_boundary_is_closed() {
    let mut empty: &[u8] = &[];
    let err = read_frame(&mut empty).await.expect_err("should be closed");
    assert!(matches!(err, CodecError::Closed));
}

#[tokio::test]
async fn stream_eof_mid_payload_is_truncated() {
    let mut partial: &[u8] = &[1, 1, 0, 0, 0, 10, b'x', b'y'];
    let err = read_frame(&mut partial).await.expect_err("should be truncated");
    assert!(matches!(err, CodecError::Truncated { expected: 10, actual: 2 }));
}

#[tokio::test]
async fn stream_eof_mid_header_is_truncated() {
    let mut partial: &[u8] = &[0, 1];
    let err = read_frame(&mut partial).await.expect_err("should be truncated");
    assert!(matches!(err, CodecError::Truncated { expected: HEADER_LEN, actual: 2 }));
}

// =============================================================================
// query payload
// =============================================================================

#[test]
fn query_payload_joins_token_and_argument() {
    assert_eq!(query_payload("tok", "2021-01-02"), b"tok\n2021-01-02".to_vec());
    assert_eq!(query_payload("tok", ""), b"tok".to_vec());
}

#[test]
fn split_query_payload_handles_token_only() {
    assert_eq!(split_query_payload(b"abc123"), ("abc123".to_owned(), String::new()));
}

#[test]
fn split_query_payload_separates_argument() {
    let (token, argument) = split_query_payload(b"abc123\nweather\r");
    assert_eq!(token, "abc123");
    assert_eq!(argument, "weather");
}
