//! Error classification shared by every layer of the bridge.
//!
//! Each module keeps its own error enum; [`BridgeError`] gathers them for the
//! bridge loop, and [`ErrorKind`] sorts any of them into one of the four
//! recovery classes.
use crate::{CyclicError, FrameError, ParseError};

/// How an error is recovered from. None of them stop the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorKind {
    /// Malformed or overflowing input stream. The parser buffer is discarded.
    ProtocolDesync,
    /// Id or length out of range. The command is dropped.
    InvalidFrame,
    /// No free slot in the cyclic table. Existing entries are untouched.
    CapacityExceeded,
    /// The transmit mailbox never freed up. That single send is dropped.
    TransmitTimeout,
}

/// The transmit mailbox did not become free within the allowed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("Transmit mailbox still busy after {waited_ms} ms")]
pub struct TransmitTimeout {
    pub waited_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BridgeError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Cyclic(#[from] CyclicError),
    #[error(transparent)]
    Transmit(#[from] TransmitTimeout),
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(e) => e.kind(),
            Self::Frame(_) => ErrorKind::InvalidFrame,
            Self::Cyclic(e) => e.kind(),
            Self::Transmit(_) => ErrorKind::TransmitTimeout,
        }
    }
}
