//! The DF1 link layer: handshake, retries, and reply matching.
//!
//! One [`Link`] owns a transport and a shared state record guarded by a
//! single mutex: the framing decoder, the transaction table, the ACK/NAK
//! flags, and the DH485 outbound queue. The transport's reader thread feeds
//! the ingest routine with every received burst; callers block on a condvar
//! until their transaction slot completes or the tick budget runs out.
//!
//! The message rate of a 19200-baud half-duplex line is low enough that one
//! coarse lock per link is the whole concurrency story.

mod slots;

use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use df1_checksums::ChecksumKind;
use df1_protocol::frame::{self, Control, DecodeEvent, FrameDecoder, NodeFilter, ReceivedFrame};
use df1_protocol::pccc::{self, ProtocolKind, TnsCounter, control_byte};
use df1_transport::Transport;

use crate::error::{Df1Error, Result};
use crate::events::ClientObserver;
use slots::TransactionTable;

/// One tick of the historical wait loop.
pub const TICK: Duration = Duration::from_millis(20);

/// Default tick budget for a reply (2 s).
pub const MAX_TICKS_DEFAULT: u32 = 100;

/// Link-level retransmissions after the first attempt.
const MAX_SEND_RETRIES: u32 = 2;

/// Ceiling for the adaptive wait extension applied after checksum failures.
const SLEEP_COMPENSATION_MAX: Duration = Duration::from_millis(400);

/// Step the extension grows by per failure.
const SLEEP_COMPENSATION_STEP: Duration = Duration::from_millis(50);

/// Link parameters callers may change between transactions.
#[derive(Clone, Debug)]
pub struct LinkConfig {
    /// Framing discipline.
    pub protocol: ProtocolKind,
    /// Checksum algorithm for both directions.
    pub checksum: ChecksumKind,
    /// Our station number.
    pub my_node: u8,
    /// The controller's station number.
    pub target_node: u8,
    /// Reply wait budget in 20 ms ticks.
    pub max_ticks: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            protocol: ProtocolKind::Df1,
            checksum: ChecksumKind::Crc16,
            my_node: 0,
            target_node: 1,
            max_ticks: MAX_TICKS_DEFAULT,
        }
    }
}

impl LinkConfig {
    fn node_filter(&self) -> NodeFilter {
        match self.protocol {
            ProtocolKind::Df1 => NodeFilter::AcceptAll,
            ProtocolKind::Dh485 => NodeFilter::Station(self.my_node),
        }
    }
}

enum AckOutcome {
    Acked,
    Nacked,
    TimedOut,
}

/// Observer notifications collected under the lock, dispatched outside it.
enum Notice {
    Data(u8),
    Unsolicited(Vec<u8>),
}

struct Inner {
    config: LinkConfig,
    decoder: FrameDecoder,
    slots: TransactionTable,
    tns: TnsCounter,
    acknowledged: bool,
    not_acknowledged: bool,
    last_response_was_nak: bool,
    sleep_compensation: Duration,
    current_slot: u8,
    /// DH485 single-slot outbound queue; cleared only by the peer's link
    /// ACK, which forces retransmission on loss.
    queued: Option<Vec<u8>>,
}

impl Inner {
    fn reply_timeout(&self, ticks: u32) -> Duration {
        TICK * ticks + self.sleep_compensation
    }
}

struct Shared {
    inner: Mutex<Inner>,
    cond: Condvar,
    observer: Arc<dyn ClientObserver>,
}

impl Shared {
    /// Receive path: decode a burst, update shared state, and return the
    /// wire responses (ACKs, NAKs, token frames) to transmit.
    fn ingest(&self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut events = Vec::new();
        let mut out = Vec::new();
        let mut notices = Vec::new();
        {
            let mut inner = self.inner.lock().expect("link state lock");
            inner.decoder.feed(bytes, &mut events);
            for event in events {
                match event {
                    DecodeEvent::Control(Control::Ack) => {
                        inner.acknowledged = true;
                    }
                    DecodeEvent::Control(Control::Nak) => {
                        inner.not_acknowledged = true;
                    }
                    DecodeEvent::Control(Control::Enq) => {
                        // Repeat whichever response the peer last saw.
                        let control = if inner.last_response_was_nak {
                            Control::Nak
                        } else {
                            Control::Ack
                        };
                        out.push(control.wire_bytes().to_vec());
                    }
                    DecodeEvent::Frame(received) => {
                        Self::handle_frame(&mut inner, received, &mut out, &mut notices);
                    }
                }
            }
        }
        self.cond.notify_all();
        for notice in notices {
            match notice {
                Notice::Data(slot) => self.observer.data_received(slot),
                Notice::Unsolicited(body) => self.observer.unsolicited_message(&body),
            }
        }
        out
    }

    fn handle_frame(
        inner: &mut Inner,
        received: ReceivedFrame,
        out: &mut Vec<Vec<u8>>,
        notices: &mut Vec<Notice>,
    ) {
        let checksum = inner.config.checksum;
        let protocol = inner.config.protocol;

        if !received.verify(checksum) {
            // Our side failed the checksum: NAK it, unblock the waiter with
            // the local failure, and widen the wait budget for flaky
            // adapters that corrupt under load.
            out.push(Control::Nak.wire_bytes().to_vec());
            inner.last_response_was_nak = true;
            let body = received.body();
            let slot = if body.len() > pccc::tns_offset(protocol) {
                body[pccc::tns_offset(protocol)]
            } else {
                inner.current_slot
            };
            inner.slots.mark_nak(slot);
            inner.sleep_compensation = (inner.sleep_compensation + SLEEP_COMPENSATION_STEP)
                .min(SLEEP_COMPENSATION_MAX);
            return;
        }

        match protocol {
            ProtocolKind::Df1 => {
                let body = received.into_body();
                let slot = pccc::tns_slot(&body, ProtocolKind::Df1);
                let cmd = body
                    .get(pccc::command_offset(ProtocolKind::Df1))
                    .copied()
                    .unwrap_or(0);
                if pccc::is_reply(cmd) {
                    inner.slots.store(slot, body);
                    notices.push(Notice::Data(slot));
                } else {
                    // A controller-initiated command (e.g. MSG logical
                    // write): echo its TNS back with the reply bit set. The
                    // TNS is the controller's, not ours, so the frame stays
                    // out of the slot table; the body reaches the caller
                    // through the notification.
                    if let Some(reply) = pccc::unsolicited_reply(&body) {
                        out.push(frame::encode(&reply, checksum));
                    }
                    notices.push(Notice::Unsolicited(body));
                }
                out.push(Control::Ack.wire_bytes().to_vec());
                inner.last_response_was_nak = false;
            }
            ProtocolKind::Dh485 => {
                Self::handle_dh485_frame(inner, &received.into_body(), out, notices);
            }
        }
    }

    fn handle_dh485_frame(
        inner: &mut Inner,
        body: &[u8],
        out: &mut Vec<Vec<u8>>,
        notices: &mut Vec<Notice>,
    ) {
        let Some(&control) = body.get(1) else {
            return;
        };
        let checksum = inner.config.checksum;
        let target = inner.config.target_node;
        let my_node = inner.config.my_node;
        match control {
            control_byte::TOKEN_PASS => {
                // Our turn on the bus: transmit the queued command, or hand
                // the token straight back.
                let wire = match &inner.queued {
                    Some(command) => frame::encode(command, checksum),
                    None => frame::encode(&pccc::dh485_token_pass(target, my_node), checksum),
                };
                out.push(wire);
            }
            control_byte::LINK_ACK => {
                inner.queued = None;
                inner.acknowledged = true;
            }
            data if data & 0x0F == control_byte::DATA_NIBBLE => {
                let slot = pccc::tns_slot(body, ProtocolKind::Dh485);
                inner.slots.store(slot, body.to_vec());
                out.push(frame::encode(
                    &pccc::dh485_link_ack(target, my_node),
                    checksum,
                ));
                notices.push(Notice::Data(slot));
            }
            _ => {}
        }
    }
}

/// A configured link over one transport.
pub struct Link {
    transport: Arc<dyn Transport>,
    shared: Arc<Shared>,
}

impl Link {
    /// Creates a closed link. The port opens lazily on the first send.
    pub fn new(
        transport: Arc<dyn Transport>,
        config: LinkConfig,
        observer: Arc<dyn ClientObserver>,
    ) -> Self {
        let decoder = FrameDecoder::new(config.checksum, config.node_filter());
        let inner = Inner {
            config,
            decoder,
            slots: TransactionTable::new(),
            tns: TnsCounter::new(),
            acknowledged: false,
            not_acknowledged: false,
            last_response_was_nak: false,
            sleep_compensation: Duration::ZERO,
            current_slot: 0,
            queued: None,
        };
        Self {
            transport,
            shared: Arc::new(Shared {
                inner: Mutex::new(inner),
                cond: Condvar::new(),
                observer,
            }),
        }
    }

    /// Current link configuration.
    #[must_use]
    pub fn config(&self) -> LinkConfig {
        self.shared.inner.lock().expect("link state lock").config.clone()
    }

    /// Mutates the configuration between transactions; the framing decoder
    /// is re-armed to match.
    pub fn reconfigure(&self, apply: impl FnOnce(&mut LinkConfig)) {
        let mut inner = self.shared.inner.lock().expect("link state lock");
        apply(&mut inner.config);
        let checksum = inner.config.checksum;
        let filter = inner.config.node_filter();
        inner.decoder.set_checksum(checksum);
        inner.decoder.set_filter(filter);
    }

    /// Opens the transport if it is closed, wiring received bytes into the
    /// receive path.
    pub fn ensure_open(&self) -> Result<()> {
        if self.transport.is_open() {
            return Ok(());
        }
        let shared = Arc::clone(&self.shared);
        let transport = Arc::clone(&self.transport);
        self.transport.open(Arc::new(move |bytes| {
            for reply in shared.ingest(bytes) {
                if let Err(error) = transport.send(&reply) {
                    tracing::warn!(%error, "failed to transmit link response");
                }
            }
        }))?;
        Ok(())
    }

    /// Closes the transport. Pending waiters time out normally.
    pub fn close(&self) {
        self.transport.close();
    }

    /// Runs one application command: allocate a TNS, transmit under the
    /// link discipline, and (unless `wait` is false) block until the reply
    /// lands in the transaction slot, returning the verified body.
    pub fn transact(&self, cmd: u8, func: u8, data: &[u8], wait: bool) -> Result<Vec<u8>> {
        self.ensure_open()?;
        let (slot, payload, protocol, ticks, checksum) = {
            let mut inner = self.shared.inner.lock().expect("link state lock");
            let tns = inner.tns.next_tns();
            let slot = (tns & 0xFF) as u8;
            inner.slots.reset(slot);
            inner.current_slot = slot;
            let config = &inner.config;
            let payload = match config.protocol {
                ProtocolKind::Df1 => pccc::compose_df1(
                    config.target_node,
                    config.my_node,
                    cmd,
                    tns,
                    func,
                    data,
                ),
                ProtocolKind::Dh485 => pccc::compose_dh485(
                    config.target_node,
                    config.my_node,
                    cmd,
                    tns,
                    func,
                    data,
                ),
            };
            let protocol = config.protocol;
            let ticks = config.max_ticks;
            let checksum = config.checksum;
            if protocol == ProtocolKind::Dh485 {
                inner.queued = Some(payload.clone());
            }
            (slot, payload, protocol, ticks, checksum)
        };

        if protocol == ProtocolKind::Df1 {
            if wait {
                self.send_frame(&payload)?;
            } else {
                // Fire and forget: async mode skips even the ACK wait.
                self.transport.send(&frame::encode(&payload, checksum))?;
                return Ok(Vec::new());
            }
        }
        if !wait {
            return Ok(Vec::new());
        }
        self.wait_for_reply(slot, ticks, protocol)
    }

    /// Transmits one framed payload under the DF1 ACK discipline:
    /// up to three attempts, each waiting a tick budget for ACK or NAK.
    pub fn send_frame(&self, payload: &[u8]) -> Result<()> {
        let (wire, timeout) = {
            let inner = self.shared.inner.lock().expect("link state lock");
            (
                frame::encode(payload, inner.config.checksum),
                inner.reply_timeout(inner.config.max_ticks),
            )
        };
        let mut saw_nak = false;
        for _attempt in 0..=MAX_SEND_RETRIES {
            {
                let mut inner = self.shared.inner.lock().expect("link state lock");
                inner.acknowledged = false;
                inner.not_acknowledged = false;
            }
            self.transport.send(&wire)?;
            match self.wait_ack(timeout) {
                AckOutcome::Acked => return Ok(()),
                AckOutcome::Nacked => saw_nak = true,
                AckOutcome::TimedOut => {}
            }
        }
        Err(if saw_nak {
            Df1Error::NotAcknowledged
        } else {
            Df1Error::NoResponse
        })
    }

    /// Sends a bare DLE/ENQ and waits up to `ticks` for any reply. Used by
    /// auto-detect, where any answer proves the framing settings agree.
    pub fn probe_enq(&self, ticks: u32) -> Result<()> {
        self.ensure_open()?;
        {
            let mut inner = self.shared.inner.lock().expect("link state lock");
            inner.acknowledged = false;
            inner.not_acknowledged = false;
        }
        self.transport.send(&Control::Enq.wire_bytes())?;
        match self.wait_ack(TICK * ticks) {
            AckOutcome::Acked | AckOutcome::Nacked => Ok(()),
            AckOutcome::TimedOut => Err(Df1Error::NoResponse),
        }
    }

    fn wait_ack(&self, timeout: Duration) -> AckOutcome {
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock().expect("link state lock");
        loop {
            if inner.acknowledged {
                return AckOutcome::Acked;
            }
            if inner.not_acknowledged {
                return AckOutcome::Nacked;
            }
            let now = Instant::now();
            if now >= deadline {
                return AckOutcome::TimedOut;
            }
            let (guard, _timeout) = self
                .shared
                .cond
                .wait_timeout(inner, deadline - now)
                .expect("link state lock");
            inner = guard;
        }
    }

    fn wait_for_reply(&self, slot: u8, ticks: u32, protocol: ProtocolKind) -> Result<Vec<u8>> {
        let mut inner = self.shared.inner.lock().expect("link state lock");
        let deadline = Instant::now() + inner.reply_timeout(ticks);
        while !inner.slots.responded(slot) {
            let now = Instant::now();
            if now >= deadline {
                return Err(Df1Error::Timeout);
            }
            let (guard, _timeout) = self
                .shared
                .cond
                .wait_timeout(inner, deadline - now)
                .expect("link state lock");
            inner = guard;
        }
        if inner.slots.nak(slot) {
            return Err(Df1Error::ChecksumNak);
        }
        let body = inner.slots.take_frame(slot).ok_or(Df1Error::NoData)?;
        match pccc::reply_status(&body, protocol) {
            Some(0) => Ok(body),
            Some(status) => Err(Df1Error::Remote(status)),
            None => Err(Df1Error::NoData),
        }
    }
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link")
            .field("open", &self.transport.is_open())
            .finish_non_exhaustive()
    }
}
