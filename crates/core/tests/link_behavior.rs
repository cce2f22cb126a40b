//! Link-layer handshake behavior against a scripted peer: retries on NAK,
//! silence, and checksum failures on received data.

mod support;

use std::sync::Arc;

use df1_checksums::ChecksumKind;
use df1_core::{Client, ClientConfig, ProcessorFamily};

use support::{ScriptedTransport, ack, nak, status_reply};

fn client_over(transport: Arc<ScriptedTransport>) -> Client {
    let config = ClientConfig::builder().port("scripted").max_ticks(2).build();
    Client::with_transport(config, transport)
}

#[test]
fn two_naks_then_an_ack_make_three_identical_writes() {
    let transport = ScriptedTransport::new(|index, bytes, _| {
        // Non-frame writes (our outbound DLE ACK) get no reply.
        let Some(body) = support::unframe(bytes, ChecksumKind::Crc16) else {
            return Vec::new();
        };
        match index {
            0 | 1 => vec![nak()],
            _ => vec![ack(), status_reply(&body, 0x49, ChecksumKind::Crc16)],
        }
    });
    let client = client_over(Arc::clone(&transport));

    let family = client.processor_type().expect("third attempt succeeds");
    assert_eq!(family, ProcessorFamily::Slc503);

    let frames: Vec<Vec<u8>> = transport
        .writes()
        .into_iter()
        .filter(|bytes| support::unframe(bytes, ChecksumKind::Crc16).is_some())
        .collect();
    assert_eq!(frames.len(), 3, "exactly three transmissions");
    assert_eq!(frames[0], frames[1]);
    assert_eq!(frames[1], frames[2]);
}

#[test]
fn constant_naks_surface_not_acknowledged() {
    let transport = ScriptedTransport::new(|_, _, _| vec![nak()]);
    let client = client_over(Arc::clone(&transport));

    let error = client.processor_type().expect_err("peer keeps NAKing");
    assert_eq!(error.code(), -2);
    assert_eq!(transport.writes().len(), 3);
}

#[test]
fn silence_surfaces_no_response_after_three_attempts() {
    let transport = ScriptedTransport::new(|_, _, _| Vec::new());
    let client = client_over(Arc::clone(&transport));

    let error = client.processor_type().expect_err("peer is silent");
    assert_eq!(error.code(), -3);
    assert_eq!(transport.writes().len(), 3);
}

#[test]
fn corrupted_reply_is_naked_and_surfaces_checksum_error() {
    let transport = ScriptedTransport::new(|index, bytes, _| {
        if index > 0 {
            return Vec::new();
        }
        let body = support::unframe(bytes, ChecksumKind::Crc16).expect("frame");
        let mut reply = status_reply(&body, 0x49, ChecksumKind::Crc16);
        let last = reply.len() - 1;
        reply[last] ^= 0xFF; // corrupt the checksum tail
        vec![ack(), reply]
    });
    let client = client_over(Arc::clone(&transport));

    let error = client.processor_type().expect_err("reply fails checksum");
    assert_eq!(error.code(), -21);

    // The link NAKed the corrupted frame on the wire.
    assert!(
        transport.writes().iter().any(|bytes| bytes == &nak()),
        "expected an outbound DLE NAK"
    );
}

#[test]
fn remote_status_byte_becomes_a_remote_error() {
    let transport = ScriptedTransport::new(|_, bytes, _| {
        let Some(body) = support::unframe(bytes, ChecksumKind::Crc16) else {
            return Vec::new();
        };
        vec![
            ack(),
            support::reply_frame(&body, 0x70, &[], ChecksumKind::Crc16),
        ]
    });
    let client = client_over(Arc::clone(&transport));

    let error = client.processor_type().expect_err("processor in program mode");
    assert_eq!(error.code(), 0x70);
    assert_eq!(error.to_string(), "Processor is in Program mode");
}

#[test]
fn extended_status_is_read_from_the_frame_tail() {
    let transport = ScriptedTransport::new(|_, bytes, _| {
        let Some(body) = support::unframe(bytes, ChecksumKind::Crc16) else {
            return Vec::new();
        };
        // STS 0xF0 defers to the EXT byte at the end of the frame.
        vec![
            ack(),
            support::reply_frame(&body, 0xF0, &[0x00, 0x07], ChecksumKind::Crc16),
        ]
    });
    let client = client_over(Arc::clone(&transport));

    let error = client.processor_type().expect_err("extended status");
    assert_eq!(error.code(), 0x107);
    assert_eq!(error.to_string(), "File is wrong size");
}

#[test]
fn enq_from_peer_repeats_the_last_response() {
    let transport = ScriptedTransport::new(|index, bytes, _| {
        if index == 0 {
            let body = support::unframe(bytes, ChecksumKind::Crc16).expect("frame");
            vec![ack(), status_reply(&body, 0x49, ChecksumKind::Crc16)]
        } else {
            Vec::new()
        }
    });
    let client = client_over(Arc::clone(&transport));
    client.processor_type().expect("probe succeeds");

    let before = transport.writes().len();
    transport.inject(&[0x10, 0x05]); // peer ENQ
    let writes = transport.writes();
    assert_eq!(writes.len(), before + 1);
    assert_eq!(writes[writes.len() - 1], ack(), "last response was an ACK");
}
