//! Client configuration.
//!
//! All options are caller-mutable between transactions, never during one.
//! Changing port, baud, or parity closes an open port; the next operation
//! reopens it with the new settings.

use df1_checksums::ChecksumKind;
use df1_protocol::pccc::ProtocolKind;
use df1_transport::{Parity, SerialSettings};

use crate::link::{LinkConfig, MAX_TICKS_DEFAULT};

/// Everything needed to talk to one controller.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    port: String,
    baud: u32,
    parity: Parity,
    checksum: ChecksumKind,
    protocol: ProtocolKind,
    my_node: u8,
    target_node: u8,
    async_mode: bool,
    max_ticks: u32,
}

impl ClientConfig {
    /// Starts a builder with the defaults: 19200 8N1, CRC, DF1, node 0
    /// talking to node 1, synchronous writes, a 2 s reply budget.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Port name.
    #[must_use]
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Baud rate.
    #[must_use]
    pub const fn baud(&self) -> u32 {
        self.baud
    }

    /// Parity setting.
    #[must_use]
    pub const fn parity(&self) -> Parity {
        self.parity
    }

    /// Checksum algorithm.
    #[must_use]
    pub const fn checksum(&self) -> ChecksumKind {
        self.checksum
    }

    /// Framing discipline.
    #[must_use]
    pub const fn protocol(&self) -> ProtocolKind {
        self.protocol
    }

    /// Our station number.
    #[must_use]
    pub const fn my_node(&self) -> u8 {
        self.my_node
    }

    /// The controller's station number.
    #[must_use]
    pub const fn target_node(&self) -> u8 {
        self.target_node
    }

    /// Whether writes return without waiting for the reply.
    #[must_use]
    pub const fn async_mode(&self) -> bool {
        self.async_mode
    }

    /// Reply wait budget in 20 ms ticks.
    #[must_use]
    pub const fn max_ticks(&self) -> u32 {
        self.max_ticks
    }

    /// Changes the port name.
    pub fn set_port(&mut self, port: impl Into<String>) {
        self.port = port.into();
    }

    /// Changes the baud rate.
    pub fn set_baud(&mut self, baud: u32) {
        self.baud = baud;
    }

    /// Changes the parity.
    pub fn set_parity(&mut self, parity: Parity) {
        self.parity = parity;
    }

    /// Changes the checksum algorithm.
    pub fn set_checksum(&mut self, checksum: ChecksumKind) {
        self.checksum = checksum;
    }

    /// Changes the framing discipline.
    pub fn set_protocol(&mut self, protocol: ProtocolKind) {
        self.protocol = protocol;
    }

    /// Changes our station number.
    pub fn set_my_node(&mut self, node: u8) {
        self.my_node = node;
    }

    /// Changes the controller's station number.
    pub fn set_target_node(&mut self, node: u8) {
        self.target_node = node;
    }

    /// Toggles async writes.
    pub fn set_async_mode(&mut self, enabled: bool) {
        self.async_mode = enabled;
    }

    /// Changes the reply wait budget, in 20 ms ticks.
    pub fn set_max_ticks(&mut self, ticks: u32) {
        self.max_ticks = ticks;
    }

    pub(crate) fn set_comm(&mut self, baud: u32, parity: Parity, checksum: ChecksumKind) {
        self.set_baud(baud);
        self.set_parity(parity);
        self.set_checksum(checksum);
    }

    pub(crate) fn serial_settings(&self) -> SerialSettings {
        SerialSettings::new(self.port.clone(), self.baud, self.parity)
    }

    pub(crate) fn link_config(&self) -> LinkConfig {
        LinkConfig {
            protocol: self.protocol,
            checksum: self.checksum,
            my_node: self.my_node,
            target_node: self.target_node,
            max_ticks: self.max_ticks,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self {
            config: ClientConfig {
                port: String::new(),
                baud: 19200,
                parity: Parity::None,
                checksum: ChecksumKind::Crc16,
                protocol: ProtocolKind::Df1,
                my_node: 0,
                target_node: 1,
                async_mode: false,
                max_ticks: MAX_TICKS_DEFAULT,
            },
        }
    }
}

impl ClientConfigBuilder {
    /// Sets the port name.
    #[must_use]
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.port = port.into();
        self
    }

    /// Sets the baud rate.
    #[must_use]
    pub const fn baud(mut self, baud: u32) -> Self {
        self.config.baud = baud;
        self
    }

    /// Sets the parity.
    #[must_use]
    pub const fn parity(mut self, parity: Parity) -> Self {
        self.config.parity = parity;
        self
    }

    /// Sets the checksum algorithm.
    #[must_use]
    pub const fn checksum(mut self, checksum: ChecksumKind) -> Self {
        self.config.checksum = checksum;
        self
    }

    /// Sets the framing discipline.
    #[must_use]
    pub const fn protocol(mut self, protocol: ProtocolKind) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Sets our station number (0–254).
    #[must_use]
    pub const fn my_node(mut self, node: u8) -> Self {
        self.config.my_node = node;
        self
    }

    /// Sets the controller's station number (0–254).
    #[must_use]
    pub const fn target_node(mut self, node: u8) -> Self {
        self.config.target_node = node;
        self
    }

    /// When set, write operations return without waiting for the reply.
    #[must_use]
    pub const fn async_mode(mut self, enabled: bool) -> Self {
        self.config.async_mode = enabled;
        self
    }

    /// Overrides the reply wait budget, in 20 ms ticks.
    #[must_use]
    pub const fn max_ticks(mut self, ticks: u32) -> Self {
        self.config.max_ticks = ticks;
        self
    }

    /// Finishes the builder.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_protocol_conventions() {
        let config = ClientConfig::builder().build();
        assert_eq!(config.baud(), 19200);
        assert_eq!(config.parity(), Parity::None);
        assert_eq!(config.checksum(), ChecksumKind::Crc16);
        assert_eq!(config.protocol(), ProtocolKind::Df1);
        assert_eq!(config.my_node(), 0);
        assert_eq!(config.target_node(), 1);
        assert!(!config.async_mode());
        assert_eq!(config.max_ticks(), 100);
    }

    #[test]
    fn builder_sets_every_field() {
        let config = ClientConfig::builder()
            .port("/dev/ttyUSB0")
            .baud(38400)
            .parity(Parity::Even)
            .checksum(ChecksumKind::Bcc)
            .protocol(ProtocolKind::Dh485)
            .my_node(3)
            .target_node(9)
            .async_mode(true)
            .max_ticks(5)
            .build();
        assert_eq!(config.port(), "/dev/ttyUSB0");
        assert_eq!(config.baud(), 38400);
        assert_eq!(config.parity(), Parity::Even);
        assert_eq!(config.checksum(), ChecksumKind::Bcc);
        assert_eq!(config.protocol(), ProtocolKind::Dh485);
        assert_eq!((config.my_node(), config.target_node()), (3, 9));
        assert!(config.async_mode());
        assert_eq!(config.max_ticks(), 5);
    }
}
