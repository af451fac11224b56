use bytes::BytesMut;

use turn_client::relay::{ChannelBinding, Credentials, RelayState};
use turn_client::{Dialect, Endpoint, FakeTransport};

use stun::attribute::*;
use stun::{Kind, MessageReader, MessageWriter, Method};

fn endpoint(s: &str) -> Endpoint {
    Endpoint::new(s.parse().unwrap())
}

fn draft9_state() -> (RelayState<FakeTransport>, Endpoint) {
    let server = endpoint("10.0.0.1:3478");
    let creds = Credentials {
        username: b"alice".to_vec(),
        password: Some(b"s3cret".to_vec()),
    };
    (
        RelayState::new(FakeTransport::new(), server, creds, Dialect::Draft9),
        server,
    )
}

fn decode_request<'a>(
    buf: &'a [u8],
    attrs: &'a mut Vec<(AttrKind, &'a [u8])>,
) -> MessageReader<'a, 'a> {
    MessageReader::decode(buf, attrs).expect("valid stun message")
}

fn channelbind_response(token: [u8; 12]) -> BytesMut {
    let mut buf = BytesMut::new();
    MessageWriter::new(Method::ChannelBind(Kind::Response), &token, &mut buf)
        .flush(None)
        .unwrap();
    buf
}

/// Scenario 1: an unrelated datagram with no server/bindings configured
/// is passed through untouched.
#[test]
fn passthrough_recv() {
    let (mut state, _server) = draft9_state();
    let from = endpoint("192.168.0.1:4000");

    state.base_mut().push_inbound(from, b"\x80lalala");

    let mut out_from = endpoint("0.0.0.0:0");
    let mut buf = [0u8; 1024];
    let n = state.recv(&mut out_from, &mut buf);

    assert_eq!(n, 7);
    assert_eq!(&buf[..7], b"\x80lalala");
}

/// Scenario 2: DRAFT9 bind, confirm, and bound send.
#[test]
fn draft9_bind_and_send() {
    let (mut state, server) = draft9_state();
    let peer = endpoint("192.168.0.50:7000");

    assert!(state.set_peer(peer));

    let (to, request) = state
        .base_mut()
        .pop_outbound()
        .expect("channelbind request sent");
    assert!(to.equal(&server));

    let mut attrs = Vec::new();
    let reader = decode_request(&request, &mut attrs);
    assert_eq!(reader.method, Method::ChannelBind(Kind::Request));
    assert_eq!(reader.get::<ChannelNumber>(), Some(0x4000));

    let resp = channelbind_response([9u8; 12]);
    state.base_mut().push_inbound(server, &resp);

    let mut out_from = endpoint("0.0.0.0:0");
    let mut scratch = [0u8; 1024];
    assert_eq!(state.recv(&mut out_from, &mut scratch), 0);

    assert_eq!(state.bindings().len(), 1);
    assert_eq!(state.bindings()[0].peer, peer);
    assert_eq!(state.bindings()[0].channel, 0x4000);
    assert!(state.pending().is_none());

    assert!(state.send(&peer, b"hi"));
    let (to, sent) = state
        .base_mut()
        .pop_outbound()
        .expect("channeldata frame sent");
    assert!(to.equal(&server));
    assert_eq!(sent, vec![0x40, 0x00, 0x00, 0x02, b'h', b'i']);
}

/// Scenario 3: an inbound ChannelData frame for a bound channel is
/// unwrapped and attributed to the bound peer.
#[test]
fn draft9_recv_frame() {
    let (mut state, server) = draft9_state();
    let peer = endpoint("192.168.0.50:7000");

    state.set_peer(peer);
    state.base_mut().pop_outbound();

    let resp = channelbind_response([1u8; 12]);
    state.base_mut().push_inbound(server, &resp);
    let mut out_from = endpoint("0.0.0.0:0");
    let mut scratch = [0u8; 1024];
    state.recv(&mut out_from, &mut scratch);

    state
        .base_mut()
        .push_inbound(server, &[0x40, 0x00, 0x00, 0x03, b'a', b'b', b'c']);

    let n = state.recv(&mut out_from, &mut scratch);
    assert_eq!(n, 3);
    assert_eq!(&scratch[..3], b"abc");
    assert!(out_from.equal(&peer));
}

/// Scenario 4: MSN's one-peer-at-a-time "lock" semantics evict the prior
/// binding whenever a new one is confirmed.
#[test]
fn msn_lock_evicts_prior_binding() {
    let server = endpoint("10.0.0.2:3478");
    let creds = Credentials {
        username: b"bob".to_vec(),
        password: Some(b"hunter2".to_vec()),
    };
    let mut state = RelayState::new(FakeTransport::new(), server, creds, Dialect::Msn);

    let p1 = endpoint("192.168.0.10:1");
    state.set_peer(p1);
    state.base_mut().pop_outbound();

    let mut resp = BytesMut::new();
    MessageWriter::new(
        Method::SetActiveDestination(Kind::Response),
        &[2u8; 12],
        &mut resp,
    )
    .flush(None)
    .unwrap();
    state.base_mut().push_inbound(server, &resp);
    let mut out_from = endpoint("0.0.0.0:0");
    let mut scratch = [0u8; 1024];
    state.recv(&mut out_from, &mut scratch);

    assert_eq!(
        state.bindings(),
        &[ChannelBinding {
            peer: p1,
            channel: 0
        }]
    );

    let p2 = endpoint("192.168.0.11:2");
    state.set_peer(p2);
    state.base_mut().pop_outbound();

    let mut resp2 = BytesMut::new();
    MessageWriter::new(
        Method::SetActiveDestination(Kind::Response),
        &[4u8; 12],
        &mut resp2,
    )
    .flush(None)
    .unwrap();
    state.base_mut().push_inbound(server, &resp2);
    state.recv(&mut out_from, &mut scratch);

    assert_eq!(
        state.bindings(),
        &[ChannelBinding {
            peer: p2,
            channel: 0
        }]
    );
}

/// Scenario 5: a CHANNELBIND error carrying REALM/NONCE triggers an
/// authenticated retry with both attributes echoed back.
#[test]
fn draft9_auth_retry_echoes_realm_and_nonce() {
    let (mut state, server) = draft9_state();
    let peer = endpoint("192.168.0.50:7000");

    state.set_peer(peer);
    state.base_mut().pop_outbound();

    let mut err_buf = BytesMut::new();
    {
        let mut msg =
            MessageWriter::new(Method::ChannelBind(Kind::Error), &[3u8; 12], &mut err_buf);
        msg.append::<Realm>("r");
        msg.append::<Nonce>("n");
        msg.flush(None).unwrap();
    }
    state.base_mut().push_inbound(server, &err_buf);

    let mut out_from = endpoint("0.0.0.0:0");
    let mut scratch = [0u8; 1024];
    assert_eq!(state.recv(&mut out_from, &mut scratch), 0);

    assert!(state.pending().is_some());
    assert_eq!(state.pending().unwrap().peer, peer);

    let (to, retry) = state
        .base_mut()
        .pop_outbound()
        .expect("auth retry sent");
    assert!(to.equal(&server));

    let mut attrs = Vec::new();
    let reader = decode_request(&retry, &mut attrs);
    assert_eq!(reader.method, Method::ChannelBind(Kind::Request));
    assert_eq!(reader.get::<Realm>(), Some("r"));
    assert_eq!(reader.get::<Nonce>(), Some("n"));
}

/// Scenario 6: GOOGLE's `send` carries OPTIONS=1 while a matching
/// destination is pending.
#[test]
fn google_send_carries_options_flag() {
    let server = endpoint("10.0.0.3:3478");
    let creds = Credentials {
        username: b"carol".to_vec(),
        password: None,
    };
    let mut state = RelayState::new(FakeTransport::new(), server, creds, Dialect::Google);

    let peer = endpoint("192.168.0.20:9");
    assert!(state.set_peer(peer));
    assert_eq!(
        state.base_mut().outbound_len(),
        0,
        "GOOGLE set_peer does no network I/O"
    );

    assert!(state.send(&peer, b"x"));
    let (to, sent) = state.base_mut().pop_outbound().expect("send request sent");
    assert!(to.equal(&server));

    let mut attrs = Vec::new();
    let reader = decode_request(&sent, &mut attrs);
    assert_eq!(reader.method, Method::Send(Kind::Request));
    assert_eq!(reader.get::<Options>(), Some(1));
}

/// Boundary: channel allocation starts at 0x4000 and fills gaps rather
/// than always incrementing from the highest allocated channel.
#[test]
fn draft9_channel_allocation_fills_gaps() {
    let (mut state, server) = draft9_state();

    for i in 0..3u8 {
        let peer = endpoint(&format!("192.168.1.{}:100", i + 1));
        state.set_peer(peer);
        state.base_mut().pop_outbound();

        let resp = channelbind_response([5u8 + i; 12]);
        state.base_mut().push_inbound(server, &resp);

        let mut out_from = endpoint("0.0.0.0:0");
        let mut scratch = [0u8; 64];
        state.recv(&mut out_from, &mut scratch);
    }

    let channels: Vec<u16> = state.bindings().iter().map(|b| b.channel).collect();
    assert_eq!(channels, vec![0x4000, 0x4001, 0x4002]);
}

/// Boundary: an oversize DRAFT9 payload to a bound peer is sent
/// passthrough rather than framed as ChannelData.
#[test]
fn draft9_oversize_payload_is_passthrough() {
    let (mut state, server) = draft9_state();
    let peer = endpoint("192.168.0.50:7000");

    state.set_peer(peer);
    state.base_mut().pop_outbound();
    let resp = channelbind_response([6u8; 12]);
    state.base_mut().push_inbound(server, &resp);
    let mut out_from = endpoint("0.0.0.0:0");
    let mut scratch = [0u8; 64];
    state.recv(&mut out_from, &mut scratch);

    let big = vec![0u8; 1300];
    assert!(state.send(&peer, &big));

    let (to, sent) = state.base_mut().pop_outbound().expect("passthrough sent");
    assert!(to.equal(&peer));
    assert_eq!(sent.len(), 1300);
}
