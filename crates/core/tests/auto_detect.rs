//! Auto-detect sweeps baud × parity × checksum with short ENQ probes.

mod support;

use std::sync::Arc;

use df1_core::{ChecksumKind, Client, ClientConfig, ClientEvent, EventChannel, Parity};

use support::{ScriptedTransport, ack, is_enq};

#[test]
fn detect_stops_on_the_first_answering_combination() {
    // The peer only answers at 19200/None; CRC is tried before BCC, so the
    // sweep must land on 19200/None/CRC.
    let transport = ScriptedTransport::new(|_, bytes, settings| {
        if is_enq(bytes) && settings.baud == 19200 && settings.parity == Parity::None {
            vec![ack()]
        } else {
            Vec::new()
        }
    });
    let (observer, events) = EventChannel::unbounded();
    let config = ClientConfig::builder().port("scripted").build();
    let client = Client::with_observer(config, Arc::clone(&transport) as _, observer);

    let detected = client.detect_comm_settings().expect("peer answers");
    assert_eq!(detected.baud, 19200);
    assert_eq!(detected.parity, Parity::None);
    assert_eq!(detected.checksum, ChecksumKind::Crc16);

    // The successful settings stay in force.
    let config = client.config();
    assert_eq!(config.baud(), 19200);
    assert_eq!(config.parity(), Parity::None);
    assert_eq!(config.checksum(), ChecksumKind::Crc16);
    assert_eq!(transport.settings().baud, 19200);

    // 38400 has 4 combinations; the fifth try answers.
    let tries = events
        .try_iter()
        .filter(|event| matches!(event, ClientEvent::AutoDetectTry { .. }))
        .count();
    assert_eq!(tries, 5);
}

#[test]
fn silent_bus_exhausts_the_sweep_with_no_response() {
    let transport = ScriptedTransport::new(|_, _, _| Vec::new());
    let config = ClientConfig::builder().port("scripted").build();
    let client = Client::with_transport(config, Arc::clone(&transport) as _);

    let error = client.detect_comm_settings().expect_err("nobody answers");
    assert_eq!(error.code(), -3);

    // Every combination fired a probe: 3 bauds x 2 parities x 2 checksums.
    let probes = transport
        .writes()
        .iter()
        .filter(|bytes| is_enq(bytes))
        .count();
    assert_eq!(probes, 12);
}

#[test]
fn unopenable_port_aborts_the_sweep_immediately() {
    let transport = ScriptedTransport::failing_open();
    let config = ClientConfig::builder().port("scripted").build();
    let client = Client::with_transport(config, Arc::clone(&transport) as _);

    let error = client.detect_comm_settings().expect_err("port is gone");
    assert_eq!(error.code(), -6);
}
