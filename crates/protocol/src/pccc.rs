//! PCCC application-packet composition and transaction numbering.
//!
//! Every application command shares the layout
//! `[dst][src][cmd][sts=0][tns_lo][tns_hi][fnc][data…]`. The DH485 variant
//! wraps the same body in a station header plus a fixed five-byte prefix and
//! carries a link-control octet that drives the token discipline.

use rand::Rng;

/// Which link discipline frames travel under.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ProtocolKind {
    /// Point-to-point half duplex.
    #[default]
    Df1,
    /// Token-passing multi-drop.
    Dh485,
}

impl ProtocolKind {
    /// Canonical name used in diagnostics and configuration surfaces.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ProtocolKind::Df1 => "DF1",
            ProtocolKind::Dh485 => "DH485",
        }
    }
}

/// Reply command bit: a reply echoes the request command ORed with 0x40.
pub const REPLY_FLAG: u8 = 0x40;

/// DH485 link-control octet values.
pub mod control_byte {
    /// The token is being passed to us.
    pub const TOKEN_PASS: u8 = 0x00;
    /// The peer acknowledged our queued command.
    pub const LINK_ACK: u8 = 0x18;
    /// Low nibble marking a data-bearing frame.
    pub const DATA_NIBBLE: u8 = 0x08;
}

/// Byte offset of the STS octet in a reply body.
#[must_use]
pub const fn status_offset(kind: ProtocolKind) -> usize {
    match kind {
        ProtocolKind::Df1 => 3,
        ProtocolKind::Dh485 => 7,
    }
}

/// Byte offset of the TNS low octet in a reply body.
#[must_use]
pub const fn tns_offset(kind: ProtocolKind) -> usize {
    match kind {
        ProtocolKind::Df1 => 4,
        ProtocolKind::Dh485 => 8,
    }
}

/// Byte offset of the command octet in a reply body.
#[must_use]
pub const fn command_offset(kind: ProtocolKind) -> usize {
    match kind {
        ProtocolKind::Df1 => 2,
        ProtocolKind::Dh485 => 6,
    }
}

/// Byte offset of the first data octet in a reply body.
#[must_use]
pub const fn reply_data_offset(kind: ProtocolKind) -> usize {
    match kind {
        ProtocolKind::Df1 => 6,
        ProtocolKind::Dh485 => 10,
    }
}

/// Reports whether a command octet marks a reply rather than a
/// peer-initiated command.
#[must_use]
pub const fn is_reply(cmd: u8) -> bool {
    cmd > 0x1F
}

/// Transaction-slot index for a received body: the TNS low byte for
/// reply-bearing frames, slot 0 for short commands that carry none.
#[must_use]
pub fn tns_slot(body: &[u8], kind: ProtocolKind) -> u8 {
    body.get(tns_offset(kind)).copied().unwrap_or(0)
}

/// Extracts the PCCC status from a reply body. A status of 0xF0 means the
/// real code rides in the extended-status octet at the end of the frame and
/// is reported as `0x100 + EXT`.
#[must_use]
pub fn reply_status(body: &[u8], kind: ProtocolKind) -> Option<u16> {
    let sts = *body.get(status_offset(kind))?;
    if sts == 0xF0 {
        let ext = *body.last()?;
        Some(0x100 + u16::from(ext))
    } else {
        Some(u16::from(sts))
    }
}

/// Builds the reply sent back for an unsolicited DF1 command: source and
/// destination swapped, command ORed with [`REPLY_FLAG`], zero status, and
/// the peer's TNS echoed.
#[must_use]
pub fn unsolicited_reply(body: &[u8]) -> Option<Vec<u8>> {
    if body.len() < 6 {
        return None;
    }
    Some(vec![
        body[1],
        body[0],
        body[2] | REPLY_FLAG,
        0x00,
        body[4],
        body[5],
    ])
}

/// The 16-bit transaction number sequence.
///
/// Seeded randomly in 1..=128 so a restarted host does not collide with
/// replies still in flight from its previous life; increments before every
/// send and wraps from 65535 straight to 1, never emitting 0.
#[derive(Debug)]
pub struct TnsCounter(u16);

impl TnsCounter {
    /// Creates a counter with a fresh random seed.
    #[must_use]
    pub fn new() -> Self {
        Self(rand::thread_rng().gen_range(1..=128))
    }

    /// Creates a counter at a fixed value, for deterministic tests.
    #[must_use]
    pub const fn starting_at(value: u16) -> Self {
        Self(value)
    }

    /// Advances the sequence and returns the TNS for the next command.
    pub fn next_tns(&mut self) -> u16 {
        self.0 = match self.0 {
            u16::MAX => 1,
            value => value + 1,
        };
        self.0
    }
}

impl Default for TnsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Composes a DF1 application body. The caller supplies command, function,
/// and data; status is always zero on requests.
#[must_use]
pub fn compose_df1(dst: u8, src: u8, cmd: u8, tns: u16, func: u8, data: &[u8]) -> Vec<u8> {
    let [tns_lo, tns_hi] = tns.to_le_bytes();
    let mut body = Vec::with_capacity(7 + data.len());
    body.extend_from_slice(&[dst, src, cmd, 0x00, tns_lo, tns_hi, func]);
    body.extend_from_slice(data);
    body
}

/// Composes a DH485 data frame: station header, the fixed prefix, the
/// application length, and the same PCCC body DF1 uses.
#[must_use]
pub fn compose_dh485(dst: u8, src: u8, cmd: u8, tns: u16, func: u8, data: &[u8]) -> Vec<u8> {
    let [tns_lo, tns_hi] = tns.to_le_bytes();
    let app_len = (5 + data.len()) as u8;
    let mut body = Vec::with_capacity(13 + data.len());
    body.extend_from_slice(&[
        dst | 0x80,
        control_byte::DATA_NIBBLE,
        src | 0x80,
        0x88,
        src | 0x80,
        0x01,
        0x01,
        app_len,
        cmd,
        0x00,
        tns_lo,
        tns_hi,
        func,
    ]);
    body.extend_from_slice(data);
    body
}

/// A bare DH485 token-pass frame.
#[must_use]
pub fn dh485_token_pass(dst: u8, src: u8) -> Vec<u8> {
    vec![dst | 0x80, control_byte::TOKEN_PASS, src | 0x80]
}

/// A bare DH485 link acknowledgement.
#[must_use]
pub fn dh485_link_ack(dst: u8, src: u8) -> Vec<u8> {
    vec![dst | 0x80, control_byte::LINK_ACK, src | 0x80]
}
