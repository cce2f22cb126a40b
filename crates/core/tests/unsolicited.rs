//! Controller-initiated commands: the link must acknowledge, echo the TNS
//! with the reply bit set, and raise the unsolicited-message event once.

mod support;

use std::sync::Arc;

use df1_checksums::ChecksumKind;
use df1_core::{Client, ClientConfig, ClientEvent, EventChannel};
use df1_protocol::frame;

use support::{ScriptedTransport, ack, status_reply};

#[test]
fn unsolicited_write_is_acked_echoed_and_reported_once() {
    let transport = ScriptedTransport::new(|index, bytes, _| {
        if index == 0 {
            let body = support::unframe(bytes, ChecksumKind::Crc16).expect("frame");
            vec![ack(), status_reply(&body, 0x49, ChecksumKind::Crc16)]
        } else {
            Vec::new()
        }
    });
    let (observer, events) = EventChannel::unbounded();
    let config = ClientConfig::builder().port("scripted").max_ticks(2).build();
    let client = Client::with_observer(config, Arc::clone(&transport) as _, observer);

    // Open the link with an ordinary exchange first.
    client.processor_type().expect("probe succeeds");
    let writes_before = transport.writes().len();

    // The controller fires a logical write (command 0x0F, function 0xAA).
    let unsolicited = [0x00, 0x01, 0x0F, 0x00, 0x42, 0x13, 0xAA, 0x02, 0x03, 0x89, 0x00];
    transport.inject(&frame::encode(&unsolicited, ChecksumKind::Crc16));

    let writes = transport.writes();
    let new_writes = &writes[writes_before..];

    // One framed response echoing the TNS with the reply bit set.
    let responses: Vec<Vec<u8>> = new_writes
        .iter()
        .filter_map(|bytes| support::unframe(bytes, ChecksumKind::Crc16))
        .collect();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0], vec![0x01, 0x00, 0x4F, 0x00, 0x42, 0x13]);

    // Plus a link-level ACK for the received frame.
    assert!(
        new_writes.iter().any(|bytes| bytes == &ack()),
        "expected an outbound DLE ACK"
    );

    // Exactly one unsolicited event, carrying the received body.
    let unsolicited_events: Vec<ClientEvent> = events
        .try_iter()
        .filter(|event| matches!(event, ClientEvent::UnsolicitedMessage { .. }))
        .collect();
    match unsolicited_events.as_slice() {
        [ClientEvent::UnsolicitedMessage { frame }] => {
            assert_eq!(frame.as_slice(), unsolicited);
        }
        other => panic!("expected exactly one unsolicited event, got {other:?}"),
    }
}
