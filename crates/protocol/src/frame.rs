//! DF1 frame encoding and the byte-fed decode state machine.
//!
//! On the wire a frame is `DLE STX <payload> DLE ETX <checksum>`, where every
//! literal DLE (0x10) inside the payload is doubled and the checksum octets
//! are appended raw, never escaped. Single control events travel as a DLE
//! followed by ACK, NAK, or ENQ and may legally arrive between frames or in
//! the middle of one.

use df1_checksums::ChecksumKind;

/// Data Link Escape, the lead-in for every control sequence.
pub const DLE: u8 = 0x10;
/// Start of text.
pub const STX: u8 = 0x02;
/// End of text.
pub const ETX: u8 = 0x03;
/// Positive acknowledgement.
pub const ACK: u8 = 0x06;
/// Negative acknowledgement.
pub const NAK: u8 = 0x15;
/// Enquiry, used to re-solicit the last response.
pub const ENQ: u8 = 0x05;

/// Bare link-control events, always DLE-prefixed on the wire.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Control {
    /// `DLE ACK`
    Ack,
    /// `DLE NAK`
    Nak,
    /// `DLE ENQ`
    Enq,
}

impl Control {
    /// The two-octet wire form of this control event.
    #[must_use]
    pub const fn wire_bytes(self) -> [u8; 2] {
        match self {
            Control::Ack => [DLE, ACK],
            Control::Nak => [DLE, NAK],
            Control::Enq => [DLE, ENQ],
        }
    }
}

/// Encodes `payload` into a complete wire frame: header, DLE-doubled body,
/// trailer, and the checksum of the unescaped payload.
#[must_use]
pub fn encode(payload: &[u8], kind: ChecksumKind) -> Vec<u8> {
    let doubled = payload.iter().filter(|byte| **byte == DLE).count();
    let mut wire = Vec::with_capacity(payload.len() + doubled + 4 + kind.width());
    wire.extend_from_slice(&[DLE, STX]);
    for &byte in payload {
        wire.push(byte);
        if byte == DLE {
            wire.push(DLE);
        }
    }
    wire.extend_from_slice(&[DLE, ETX]);
    wire.extend_from_slice(kind.compute(payload).as_slice());
    wire
}

/// Which inbound frames the decoder keeps.
///
/// DF1 is point-to-point, so every frame is for us. On a DH485 multi-drop
/// link the first payload octet carries the destination station ORed with
/// 0x80, and frames for other stations are dropped before they reach the
/// link layer.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NodeFilter {
    /// Accept every frame (DF1).
    AcceptAll,
    /// Accept only frames whose first payload byte equals `node | 0x80`.
    Station(u8),
}

impl NodeFilter {
    fn accepts(self, first_byte: u8) -> bool {
        match self {
            NodeFilter::AcceptAll => true,
            NodeFilter::Station(node) => first_byte == node | 0x80,
        }
    }
}

/// A reassembled frame: the unescaped payload and the raw checksum octets
/// that followed the trailer. Verification is left to the link layer so it
/// can NAK on mismatch instead of silently dropping.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReceivedFrame {
    body: Vec<u8>,
    checksum: Vec<u8>,
}

impl ReceivedFrame {
    /// Unescaped payload between DLE/STX and DLE/ETX.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Checksum octets exactly as received.
    #[must_use]
    pub fn checksum(&self) -> &[u8] {
        &self.checksum
    }

    /// Consumes the frame, returning the payload.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Recomputes the checksum over the payload and compares it with the
    /// received octets.
    #[must_use]
    pub fn verify(&self, kind: ChecksumKind) -> bool {
        kind.verify(&self.body, &self.checksum)
    }
}

/// Events surfaced by [`FrameDecoder::feed`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeEvent {
    /// A bare DLE-prefixed control octet.
    Control(Control),
    /// A complete candidate frame (not yet checksum-verified).
    Frame(ReceivedFrame),
}

/// Byte-fed decoder for the DF1 wire format.
///
/// The machine is driven one octet at a time and tolerates arbitrary burst
/// boundaries. A DLE/STX seen inside an in-progress frame restarts it; a
/// control octet seen anywhere is delivered without disturbing frame state.
/// After DLE/ETX the next one or two octets (per the checksum width) are
/// consumed raw.
#[derive(Debug)]
pub struct FrameDecoder {
    checksum: ChecksumKind,
    filter: NodeFilter,
    in_frame: bool,
    ended: bool,
    pending_dle: bool,
    node_checked: bool,
    body: Vec<u8>,
    tail: Vec<u8>,
}

impl FrameDecoder {
    /// Creates an idle decoder for the given checksum width and station
    /// filter.
    #[must_use]
    pub fn new(checksum: ChecksumKind, filter: NodeFilter) -> Self {
        Self {
            checksum,
            filter,
            in_frame: false,
            ended: false,
            pending_dle: false,
            node_checked: false,
            body: Vec::new(),
            tail: Vec::new(),
        }
    }

    /// Switches the checksum width used for the frame tail. Any frame in
    /// progress is abandoned; callers change settings only between
    /// transactions.
    pub fn set_checksum(&mut self, checksum: ChecksumKind) {
        self.checksum = checksum;
        self.reset();
    }

    /// Switches the station filter, abandoning any frame in progress.
    pub fn set_filter(&mut self, filter: NodeFilter) {
        self.filter = filter;
        self.reset();
    }

    fn reset(&mut self) {
        self.in_frame = false;
        self.ended = false;
        self.pending_dle = false;
        self.node_checked = false;
        self.body.clear();
        self.tail.clear();
    }

    fn start_frame(&mut self) {
        self.in_frame = true;
        self.ended = false;
        self.node_checked = false;
        self.body.clear();
        self.tail.clear();
    }

    /// Feeds a burst of received octets, appending any completed events.
    pub fn feed(&mut self, bytes: &[u8], events: &mut Vec<DecodeEvent>) {
        for &byte in bytes {
            if let Some(event) = self.push(byte) {
                events.push(event);
            }
        }
    }

    fn push(&mut self, byte: u8) -> Option<DecodeEvent> {
        if self.ended {
            return self.push_tail(byte);
        }
        if self.pending_dle {
            self.pending_dle = false;
            return self.push_escaped(byte);
        }
        if byte == DLE {
            self.pending_dle = true;
            return None;
        }
        if self.in_frame {
            self.push_payload(byte);
        }
        None
    }

    /// Handles the octet following a DLE.
    fn push_escaped(&mut self, byte: u8) -> Option<DecodeEvent> {
        match byte {
            STX => {
                // A nested DLE/STX restarts the frame in progress.
                self.start_frame();
                None
            }
            ETX if self.in_frame => {
                self.ended = true;
                None
            }
            DLE if self.in_frame => {
                self.push_payload(DLE);
                None
            }
            ACK => Some(DecodeEvent::Control(Control::Ack)),
            NAK => Some(DecodeEvent::Control(Control::Nak)),
            ENQ => Some(DecodeEvent::Control(Control::Enq)),
            other => {
                // Undefined DLE pair; keep the octet so a checksum mismatch
                // surfaces as a NAK instead of a silent drop.
                if self.in_frame {
                    self.push_payload(other);
                }
                None
            }
        }
    }

    fn push_payload(&mut self, byte: u8) {
        self.body.push(byte);
        if !self.node_checked {
            if self.filter.accepts(byte) {
                self.node_checked = true;
            } else {
                self.reset();
            }
        }
    }

    /// Collects the raw checksum octets after DLE/ETX.
    fn push_tail(&mut self, byte: u8) -> Option<DecodeEvent> {
        self.tail.push(byte);
        if self.tail.len() < self.checksum.width() {
            return None;
        }
        let frame = ReceivedFrame {
            body: std::mem::take(&mut self.body),
            checksum: std::mem::take(&mut self.tail),
        };
        self.reset();
        Some(DecodeEvent::Frame(frame))
    }
}
