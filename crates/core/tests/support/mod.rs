//! Scripted transport and frame helpers shared by the integration tests.

// Each test binary compiles its own copy; not every binary uses every helper.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use df1_checksums::ChecksumKind;
use df1_protocol::frame::{self, DecodeEvent, FrameDecoder, NodeFilter};
use df1_transport::{Parity, RxCallback, SerialSettings, Transport, TransportError};

/// Decides how the scripted peer answers each write: called with the write
/// index, the raw bytes, and the settings in force; returns the byte bursts
/// to deliver back through the receive callback.
pub type Script = Box<dyn FnMut(usize, &[u8], &SerialSettings) -> Vec<Vec<u8>> + Send>;

struct State {
    sink: Option<RxCallback>,
    open: bool,
    fail_open: bool,
    settings: SerialSettings,
    writes: Vec<Vec<u8>>,
    script: Script,
}

/// A [`Transport`] whose peer is a test script.
pub struct ScriptedTransport {
    state: Mutex<State>,
}

impl ScriptedTransport {
    pub fn new(
        script: impl FnMut(usize, &[u8], &SerialSettings) -> Vec<Vec<u8>> + Send + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                sink: None,
                open: false,
                fail_open: false,
                settings: SerialSettings::new("scripted", 19200, Parity::None),
                writes: Vec::new(),
                script: Box::new(script),
            }),
        })
    }

    /// A transport whose open always fails.
    pub fn failing_open() -> Arc<Self> {
        let transport = Self::new(|_, _, _| Vec::new());
        transport.state.lock().unwrap().fail_open = true;
        transport
    }

    /// Everything written so far.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().writes.clone()
    }

    /// Settings currently in force.
    pub fn settings(&self) -> SerialSettings {
        self.state.lock().unwrap().settings.clone()
    }

    /// Whether the transport has an active receive callback.
    pub fn has_sink(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }

    /// Delivers peer-initiated bytes through the receive callback.
    pub fn inject(&self, bytes: &[u8]) {
        let sink = self.state.lock().unwrap().sink.clone();
        if let Some(sink) = sink {
            sink(bytes);
        }
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, sink: RxCallback) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(TransportError::Open {
                port: state.settings.port.clone(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "scripted"),
            });
        }
        state.sink = Some(sink);
        state.open = true;
        Ok(())
    }

    fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.sink = None;
        state.open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let (sink, replies) = {
            let mut state = self.state.lock().unwrap();
            if !state.open {
                return Err(TransportError::NotOpen);
            }
            state.writes.push(bytes.to_vec());
            let index = state.writes.len() - 1;
            let settings = state.settings.clone();
            let replies = (state.script)(index, bytes, &settings);
            (state.sink.clone(), replies)
        };
        // Deliver outside the lock: the callback may call send() again.
        if let Some(sink) = sink {
            for reply in replies {
                sink(&reply);
            }
        }
        Ok(())
    }

    fn configure(&self, settings: &SerialSettings) {
        let mut state = self.state.lock().unwrap();
        if state.settings != *settings {
            state.settings = settings.clone();
            state.sink = None;
            state.open = false;
        }
    }
}

/// `DLE ACK`.
pub fn ack() -> Vec<u8> {
    vec![0x10, 0x06]
}

/// `DLE NAK`.
pub fn nak() -> Vec<u8> {
    vec![0x10, 0x15]
}

/// Whether a written burst is a bare `DLE ENQ` probe.
pub fn is_enq(bytes: &[u8]) -> bool {
    bytes == [0x10, 0x05]
}

/// Decodes one framed write back into its body, or `None` for control
/// octets and other non-frame writes.
pub fn unframe(wire: &[u8], kind: ChecksumKind) -> Option<Vec<u8>> {
    let mut decoder = FrameDecoder::new(kind, NodeFilter::AcceptAll);
    let mut events = Vec::new();
    decoder.feed(wire, &mut events);
    events.into_iter().find_map(|event| match event {
        DecodeEvent::Frame(frame) => Some(frame.into_body()),
        DecodeEvent::Control(_) => None,
    })
}

/// Frames a reply to a DF1 request: nodes swapped, command ORed with 0x40,
/// the request's TNS echoed, `data` appended.
pub fn reply_frame(request: &[u8], status: u8, data: &[u8], kind: ChecksumKind) -> Vec<u8> {
    let mut body = vec![
        request[1],
        request[0],
        request[2] | 0x40,
        status,
        request[4],
        request[5],
    ];
    body.extend_from_slice(data);
    frame::encode(&body, kind)
}

/// A diagnostic-status reply carrying the given family code at byte 9.
pub fn status_reply(request: &[u8], family_code: u8, kind: ChecksumKind) -> Vec<u8> {
    reply_frame(request, 0, &[0x00, 0x00, 0x00, family_code, 0x00, 0x00], kind)
}

/// Spins until `condition` holds or the timeout elapses.
pub fn wait_for(condition: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
