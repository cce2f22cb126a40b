//! Error taxonomy for client operations.
//!
//! The protocol's historical interface reported signed integer codes; the
//! numeric values survive through [`Df1Error::code`] so logs and operator
//! tooling stay comparable, while `Display` renders the decoded diagnostic
//! text.

use df1_protocol::status::status_message;
use df1_transport::TransportError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Df1Error>;

fn remote_text(code: &u16) -> String {
    status_message(i32::from(*code))
}

/// Everything a client operation can fail with.
#[derive(Debug, Error)]
pub enum Df1Error {
    /// The peer NAKed every transmission attempt.
    #[error("command not acknowledged (NAK)")]
    NotAcknowledged,
    /// The link is up but the peer stayed silent.
    #[error("no response from target node")]
    NoResponse,
    /// The textual address did not parse.
    #[error("invalid address `{0}`")]
    InvalidAddress(String),
    /// The transport failed; opening errors are fatal to the operation.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A write was requested with nothing to write.
    #[error("no data supplied")]
    EmptyData,
    /// A reply arrived without the expected data bytes.
    #[error("no data returned from target node")]
    NoData,
    /// The transaction slot never completed within the tick budget.
    #[error("no response, timed out waiting for reply")]
    Timeout,
    /// Our receive path NAKed the reply because its checksum failed.
    #[error("received frame failed checksum, NAK returned")]
    ChecksumNak,
    /// Non-zero PCCC status; extended statuses are reported as `0x100 + EXT`.
    #[error("{}", remote_text(.0))]
    Remote(u16),
    /// A value failed range validation before encoding.
    #[error("value out of range: {0}")]
    InvalidValue(String),
    /// The operation needs a capability this processor family lacks.
    #[error("operation not supported on {0}")]
    Unsupported(&'static str),
}

impl Df1Error {
    /// The signed code this condition maps to in the historical interface.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Df1Error::NotAcknowledged => -2,
            Df1Error::NoResponse => -3,
            Df1Error::InvalidAddress(_) => -5,
            Df1Error::Transport(error) if error.is_open_failure() => -6,
            Df1Error::Transport(_) => -3,
            Df1Error::EmptyData => -7,
            Df1Error::NoData => -8,
            Df1Error::Timeout => -20,
            Df1Error::ChecksumNak => -21,
            Df1Error::Remote(status) => i32::from(*status),
            Df1Error::InvalidValue(_) | Df1Error::Unsupported(_) => -1,
        }
    }
}
