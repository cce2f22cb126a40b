//! Communication auto-detect and controller mode control.
//!
//! Auto-detect sweeps baud × parity × checksum, reopening the port for each
//! combination and firing a bare ENQ with a deliberately tiny tick budget.
//! Any reply — ACK or NAK — proves both sides agree on framing and
//! checksum, and the successful settings are left in place.

use df1_checksums::ChecksumKind;
use df1_transport::Parity;

use crate::client::{CMD_PROTECTED, Client};
use crate::error::{Df1Error, Result};

/// One candidate (and the final detected) line configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommSettings {
    /// Baud rate.
    pub baud: u32,
    /// Parity bit.
    pub parity: Parity,
    /// Checksum algorithm.
    pub checksum: ChecksumKind,
}

/// Controller operating mode.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ControllerMode {
    /// Program mode; required for download.
    Program,
    /// Run mode.
    Run,
}

/// Probe wait budget: detection trades patience for sweep speed.
const PROBE_TICKS: u32 = 3;

const BAUDS: [u32; 3] = [38400, 19200, 9600];
const PARITIES: [Parity; 2] = [Parity::None, Parity::Even];
const CHECKSUMS: [ChecksumKind; 2] = [ChecksumKind::Crc16, ChecksumKind::Bcc];

impl Client {
    /// Sweeps line settings until the controller answers an ENQ probe.
    ///
    /// On success the configuration keeps the detected settings. A port
    /// that cannot be opened aborts the sweep immediately; a silent sweep
    /// ends with [`Df1Error::NoResponse`].
    pub fn detect_comm_settings(&self) -> Result<CommSettings> {
        for baud in BAUDS {
            for parity in PARITIES {
                for checksum in CHECKSUMS {
                    let candidate = CommSettings {
                        baud,
                        parity,
                        checksum,
                    };
                    self.update_config(|config| config.set_comm(baud, parity, checksum));
                    self.observer.auto_detect_try(&candidate);
                    match self.link.probe_enq(PROBE_TICKS) {
                        Ok(()) => return Ok(candidate),
                        Err(error) => {
                            let fatal = matches!(
                                &error,
                                Df1Error::Transport(transport) if transport.is_open_failure()
                            );
                            if fatal {
                                return Err(error);
                            }
                        }
                    }
                }
            }
        }
        Err(Df1Error::NoResponse)
    }

    /// Puts the controller into the requested mode. The function and the
    /// mode operand depend on the processor family.
    pub fn set_mode(&self, mode: ControllerMode) -> Result<()> {
        let family = self.processor_type()?;
        self.exchange(
            CMD_PROTECTED,
            family.mode_function(),
            &[family.mode_byte(mode)],
        )?;
        Ok(())
    }
}
