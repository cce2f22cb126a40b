//! The serial port seen as a plain byte pipe.
//!
//! The link layer never touches a port directly; it talks to a [`Transport`]:
//! open with a receive callback, write byte slices, close. The supplied
//! [`SerialTransport`] drives a real port through the `serialport` crate with
//! a background reader thread that hands every burst of received octets to
//! the callback. Tests substitute scripted transports behind the same trait.

use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort, StopBits};
use thiserror::Error;

/// Callback invoked with every burst of received bytes. Runs on the
/// transport's reader thread.
pub type RxCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Errors surfaced by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The port could not be opened at the requested settings.
    #[error("could not open {port}: {source}")]
    Open {
        /// Port name as configured.
        port: String,
        /// Underlying driver error.
        #[source]
        source: serialport::Error,
    },
    /// A write was attempted while the transport was closed.
    #[error("transport is not open")]
    NotOpen,
    /// A write to the open port failed.
    #[error("write failed: {0}")]
    Write(#[from] io::Error),
}

impl TransportError {
    /// Reports whether this is the fatal open failure, which aborts
    /// operations like auto-detect immediately.
    #[must_use]
    pub const fn is_open_failure(&self) -> bool {
        matches!(self, TransportError::Open { .. })
    }
}

/// Parity setting for the serial line.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Parity {
    /// No parity bit.
    #[default]
    None,
    /// Even parity.
    Even,
    /// Odd parity.
    Odd,
}

impl Parity {
    /// Canonical name used in diagnostics and CLI output.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Parity::None => "None",
            Parity::Even => "Even",
            Parity::Odd => "Odd",
        }
    }

    fn to_driver(self) -> serialport::Parity {
        match self {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Line settings for a serial transport. Data bits, stop bits, and flow
/// control are fixed by the protocol (8, 1, none).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SerialSettings {
    /// Port name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    /// Baud rate.
    pub baud: u32,
    /// Parity bit.
    pub parity: Parity,
}

impl SerialSettings {
    /// Convenience constructor.
    #[must_use]
    pub fn new(port: impl Into<String>, baud: u32, parity: Parity) -> Self {
        Self {
            port: port.into(),
            baud,
            parity,
        }
    }
}

/// A byte pipe with asynchronous receive.
///
/// All methods take `&self`; implementations use interior mutability so the
/// link layer, its reader thread, and configuration changes can share one
/// handle.
pub trait Transport: Send + Sync {
    /// Opens the transport and starts delivering received bytes to `sink`.
    /// Opening an already-open transport is a no-op.
    fn open(&self, sink: RxCallback) -> Result<(), TransportError>;

    /// Closes the transport, discarding buffered data. Pending waiters in
    /// higher layers time out normally.
    fn close(&self);

    /// Reports whether the transport is currently open.
    fn is_open(&self) -> bool;

    /// Writes a byte slice to the peer.
    fn send(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Applies new line settings, closing the transport first if they
    /// differ from the current ones.
    fn configure(&self, settings: &SerialSettings);
}

/// Read timeout for the background reader; short so close() is responsive.
const READ_TIMEOUT: Duration = Duration::from_millis(20);

struct OpenPort {
    writer: Box<dyn SerialPort>,
    stop: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

/// [`Transport`] implementation over a physical serial port.
pub struct SerialTransport {
    settings: Mutex<SerialSettings>,
    state: Mutex<Option<OpenPort>>,
}

impl SerialTransport {
    /// Creates a closed transport with the given settings.
    #[must_use]
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings: Mutex::new(settings),
            state: Mutex::new(None),
        }
    }

    /// Current line settings.
    #[must_use]
    pub fn settings(&self) -> SerialSettings {
        self.settings.lock().expect("settings lock").clone()
    }

    fn spawn_reader(port: Box<dyn SerialPort>, stop: Arc<AtomicBool>, sink: RxCallback) -> JoinHandle<()> {
        thread::spawn(move || {
            let mut port = port;
            let mut buffer = [0u8; 256];
            while !stop.load(Ordering::Relaxed) {
                match port.read(&mut buffer) {
                    Ok(0) => {}
                    Ok(count) => sink(&buffer[..count]),
                    Err(error) if error.kind() == io::ErrorKind::TimedOut => {}
                    Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                    Err(error) => {
                        tracing::warn!(%error, "serial reader stopping");
                        break;
                    }
                }
            }
        })
    }
}

impl Transport for SerialTransport {
    fn open(&self, sink: RxCallback) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("transport lock");
        if state.is_some() {
            return Ok(());
        }
        let settings = self.settings();
        let writer = serialport::new(settings.port.clone(), settings.baud)
            .parity(settings.parity.to_driver())
            .data_bits(DataBits::Eight)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| TransportError::Open {
                port: settings.port.clone(),
                source,
            })?;
        let _ = writer.clear(ClearBuffer::All);
        let reader_port = writer.try_clone().map_err(|source| TransportError::Open {
            port: settings.port,
            source,
        })?;
        let stop = Arc::new(AtomicBool::new(false));
        let reader = Self::spawn_reader(reader_port, Arc::clone(&stop), sink);
        *state = Some(OpenPort {
            writer,
            stop,
            reader: Some(reader),
        });
        Ok(())
    }

    fn close(&self) {
        // Take the port out before joining: the reader may be blocked inside
        // the sink, which can call send() and must observe NotOpen instead of
        // deadlocking against this lock.
        let port = self.state.lock().expect("transport lock").take();
        if let Some(mut port) = port {
            port.stop.store(true, Ordering::Relaxed);
            let _ = port.writer.clear(ClearBuffer::All);
            if let Some(reader) = port.reader.take() {
                let _ = reader.join();
            }
        }
    }

    fn is_open(&self) -> bool {
        self.state.lock().expect("transport lock").is_some()
    }

    fn send(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().expect("transport lock");
        let port = state.as_mut().ok_or(TransportError::NotOpen)?;
        port.writer.write_all(bytes)?;
        port.writer.flush()?;
        Ok(())
    }

    fn configure(&self, settings: &SerialSettings) {
        let mut current = self.settings.lock().expect("settings lock");
        if *current != *settings {
            *current = settings.clone();
            drop(current);
            self.close();
        }
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("settings", &self.settings())
            .field("open", &self.is_open())
            .finish()
    }
}
