//! Wire-level building blocks for the DF1 point-to-point protocol and its
//! DH485 token-passing variant.
//!
//! The crate is free of I/O. [`frame`] owns the DLE/STX framing codec: an
//! encoder that doubles in-band DLE octets and appends the link checksum,
//! and a byte-fed decoder state machine that reassembles frames, surfaces
//! bare ACK/NAK/ENQ control octets, and filters frames by station address.
//! [`pccc`] composes application-layer command packets and allocates
//! transaction numbers; [`status`] translates numeric status codes into the
//! diagnostics shown to operators.
//!
//! The link driver in `df1-core` stitches these pieces to a transport.

pub mod frame;
pub mod pccc;
pub mod status;

pub use frame::{Control, DecodeEvent, FrameDecoder, NodeFilter, ReceivedFrame};
pub use pccc::{ProtocolKind, TnsCounter};
