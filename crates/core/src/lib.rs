//! Client for the Allen-Bradley DF1 serial protocol and its DH485
//! token-passing variant, speaking PCCC to SLC 500 and MicroLogix
//! controllers.
//!
//! # Overview
//!
//! The crate couples two layers. The link layer ([`link`]) frames and
//! unframes raw bytes, drives the ACK/NAK/ENQ handshake with retries, and
//! matches inbound frames to waiters through a 256-slot transaction table
//! keyed by the low byte of the transaction number. The application layer
//! ([`client`], [`typed`], [`directory`]) composes PCCC commands, parses
//! textual addresses like `N7:0` or `T4:5.ACC`, and turns typed reads and
//! writes against the controller's file-based data model into sequences of
//! bounded raw transfers.
//!
//! Callers construct a [`Client`] from a [`ClientConfig`] and issue
//! synchronous operations; a background reader owned by the transport feeds
//! the link layer, and progress or unsolicited-message notifications reach
//! the caller through a [`ClientObserver`] or an [`EventChannel`].
//!
//! # Invariants
//!
//! - At most one request is in flight per transaction slot until the slot
//!   responds or the wait times out.
//! - The transaction number sequence never emits zero; the low byte indexes
//!   the slot table.
//! - Configuration changes (port, baud, parity, protocol, checksum) happen
//!   between transactions and close the port as needed; the next send
//!   reopens it lazily.

pub mod address;
pub mod client;
pub mod detect;
pub mod directory;
pub mod error;
pub mod events;
pub mod link;
pub mod processor;
pub mod typed;

pub use address::{Address, FileType};
pub use df1_checksums::ChecksumKind;
pub use df1_protocol::pccc::ProtocolKind;
pub use df1_transport::Parity;
pub use client::{Client, ClientConfig, ClientConfigBuilder};
pub use detect::{CommSettings, ControllerMode};
pub use directory::{DataTableFile, ProgramFile, ProgramImage};
pub use error::{Df1Error, Result};
pub use events::{ClientEvent, ClientObserver, EventChannel, NullObserver};
pub use processor::ProcessorFamily;
pub use typed::TagValues;
