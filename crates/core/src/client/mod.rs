//! The synchronous client facade.
//!
//! A [`Client`] owns one link over one transport and exposes the
//! application-layer operations: typed data access (`typed`), directory and
//! program transfer (`directory`), auto-detect and mode control (`detect`).
//! Those modules extend this type; everything here is the common plumbing —
//! construction, configuration changes, the command exchange, and the
//! processor probe that per-family parameters hang off.

mod config;

use std::sync::{Arc, Mutex};

use df1_protocol::pccc;
use df1_transport::{SerialTransport, Transport};

use crate::error::{Df1Error, Result};
use crate::events::{ClientObserver, NullObserver};
use crate::link::Link;
use crate::processor::ProcessorFamily;

pub use config::{ClientConfig, ClientConfigBuilder};

/// Protected-typed command class; carries every data-access function.
pub(crate) const CMD_PROTECTED: u8 = 0x0F;
/// Diagnostic command class.
pub(crate) const CMD_DIAGNOSTIC: u8 = 0x06;
/// Diagnostic status function; byte 9 of the reply is the family code.
pub(crate) const FNC_DIAG_STATUS: u8 = 0x03;

/// A synchronous DF1/DH485 client for one controller.
pub struct Client {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) link: Link,
    pub(crate) observer: Arc<dyn ClientObserver>,
    pub(crate) config: Mutex<ClientConfig>,
    pub(crate) processor: Mutex<Option<ProcessorFamily>>,
}

impl Client {
    /// Creates a client over a real serial port. The port is opened lazily
    /// by the first operation.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        let transport: Arc<dyn Transport> =
            Arc::new(SerialTransport::new(config.serial_settings()));
        Self::with_observer(config, transport, Arc::new(NullObserver))
    }

    /// Creates a client over an arbitrary transport with the null observer.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_observer(config, transport, Arc::new(NullObserver))
    }

    /// Creates a client over an arbitrary transport and observer.
    #[must_use]
    pub fn with_observer(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        observer: Arc<dyn ClientObserver>,
    ) -> Self {
        let link = Link::new(
            Arc::clone(&transport),
            config.link_config(),
            Arc::clone(&observer),
        );
        Self {
            transport,
            link,
            observer,
            config: Mutex::new(config),
            processor: Mutex::new(None),
        }
    }

    /// A copy of the current configuration.
    #[must_use]
    pub fn config(&self) -> ClientConfig {
        self.config.lock().expect("config lock").clone()
    }

    /// Applies a configuration change between transactions. Line-setting
    /// changes close the port; the cached processor probe is dropped since
    /// the target may have changed.
    pub fn update_config(&self, apply: impl FnOnce(&mut ClientConfig)) {
        let updated = {
            let mut config = self.config.lock().expect("config lock");
            apply(&mut config);
            config.clone()
        };
        self.transport.configure(&updated.serial_settings());
        let link_config = updated.link_config();
        self.link.reconfigure(move |current| *current = link_config);
        *self.processor.lock().expect("processor lock") = None;
    }

    /// Closes the port. The next operation reopens it.
    pub fn close(&self) {
        self.link.close();
    }

    /// Probes the controller for its family and caches the answer. The
    /// typed engine, directory driver, and mode control all require this
    /// before they can pick per-family parameters.
    pub fn processor_type(&self) -> Result<ProcessorFamily> {
        if let Some(family) = *self.processor.lock().expect("processor lock") {
            return Ok(family);
        }
        let body = self.exchange(CMD_DIAGNOSTIC, FNC_DIAG_STATUS, &[])?;
        // Byte 9 of a DF1 status reply: the fourth byte of the reply data.
        let code = self
            .reply_payload(&body)
            .get(3)
            .copied()
            .ok_or(Df1Error::NoData)?;
        let family =
            ProcessorFamily::from_code(code).ok_or(Df1Error::Unsupported("unknown processor"))?;
        *self.processor.lock().expect("processor lock") = Some(family);
        Ok(family)
    }

    /// Sends one command and waits for its verified reply body.
    pub(crate) fn exchange(&self, cmd: u8, func: u8, data: &[u8]) -> Result<Vec<u8>> {
        self.link.transact(cmd, func, data, true)
    }

    /// Sends a write command, honoring async mode: when enabled the call
    /// returns as soon as the frame is queued, without waiting for a reply.
    pub(crate) fn exchange_write(&self, cmd: u8, func: u8, data: &[u8]) -> Result<Vec<u8>> {
        let wait = !self.config.lock().expect("config lock").async_mode();
        self.link.transact(cmd, func, data, wait)
    }

    /// The data bytes of a reply body, after the protocol header.
    pub(crate) fn reply_payload<'a>(&self, body: &'a [u8]) -> &'a [u8] {
        let offset = pccc::reply_data_offset(self.config.lock().expect("config lock").protocol());
        body.get(offset..).unwrap_or(&[])
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config())
            .finish_non_exhaustive()
    }
}
