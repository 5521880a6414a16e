use embedded_can::Id;
use heapless::Vec;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{CanFrame, ErrorKind, FrameError, IdExt, MAX_COMMAND_SIZE, MAX_DATA_LENGTH};

const PERIOD_SIZE: usize = 2;

/// A request to put a frame on the bus, once (`period_ms == 0`) or every
/// `period_ms` milliseconds.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub frame: CanFrame,
    pub period_ms: u16,
}

/// The first byte of every command, selecting the identifier width
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[num_enum(error_type(name = ParseError, constructor = ParseError::InvalidModel))]
#[repr(u8)]
pub enum IdModel {
    Standard = 0,
    Extended = 1,
}

impl IdModel {
    /// Bytes taken by the id field
    pub const fn id_len(&self) -> usize {
        match self {
            Self::Standard => 2,
            Self::Extended => 4,
        }
    }

    /// Model byte + id + data length byte
    pub const fn header_len(&self) -> usize {
        1 + self.id_len() + 1
    }

    /// Full size of a command carrying `data_len` payload bytes
    pub const fn total_len(&self, data_len: usize) -> usize {
        self.header_len() + data_len + PERIOD_SIZE
    }
}

impl Command {
    pub fn new(frame: CanFrame, period_ms: u16) -> Self {
        Self { frame, period_ms }
    }

    pub fn model(&self) -> IdModel {
        match self.frame.id() {
            Id::Standard(_) => IdModel::Standard,
            Id::Extended(_) => IdModel::Extended,
        }
    }

    pub fn id(&self) -> u32 {
        self.frame.id().raw()
    }

    pub fn data(&self) -> &[u8] {
        self.frame.data()
    }

    pub fn is_one_shot(&self) -> bool {
        self.period_ms == 0
    }

    pub fn as_bytes(&self) -> Vec<u8, MAX_COMMAND_SIZE> {
        let mut result = Vec::new();
        let model = self.model();

        // Every field is bounded, the largest command is exactly MAX_COMMAND_SIZE
        result.push(model.into()).unwrap();

        let id = self.id().to_be_bytes();
        result.extend_from_slice(&id[4 - model.id_len()..]).unwrap();

        result.push(self.frame.dlc() as u8).unwrap();
        result.extend_from_slice(self.data()).unwrap();
        result
            .extend_from_slice(&self.period_ms.to_be_bytes())
            .unwrap();

        result
    }
}

/// Various errors which can arise while parsing a bridge command
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /* Stream framing */
    #[error("Tried to parse an empty buffer")]
    Empty,
    #[error("Received a command with an unrecognized model ({0:?})")]
    InvalidModel(u8),
    #[error("Received a command ({0:?}) with a data length ({1:?}) over 8")]
    InvalidDataLength(IdModel, u8),
    #[error("Received a command ({0:?}) but less bytes than is required to parse it ({1:?})")]
    NotEnoughBytes(IdModel, usize),
    #[error("Received a command ({0:?}) but more bytes than were expected ({1:?})")]
    TooManyBytes(IdModel, usize),
    #[error("Command did not fit in the {0:?} byte accumulation buffer")]
    Overflow(usize),

    /* Frame content */
    #[error("Failed to build frame from command")]
    InvalidFrame(#[from] FrameError),
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFrame(_) => ErrorKind::InvalidFrame,
            _ => ErrorKind::ProtocolDesync,
        }
    }
}

/// Reads the model byte and, once enough of the header is present, the data
/// length. Returns `Ok(None)` while the header is still incomplete.
pub(crate) fn peek_header(buffer: &[u8]) -> Result<Option<(IdModel, usize)>, ParseError> {
    let Some(&model_byte) = buffer.first() else {
        return Ok(None);
    };

    let model = IdModel::try_from(model_byte)?;

    let Some(&data_len) = buffer.get(model.header_len() - 1) else {
        return Ok(None);
    };

    if data_len as usize > MAX_DATA_LENGTH {
        return Err(ParseError::InvalidDataLength(model, data_len));
    }

    Ok(Some((model, data_len as usize)))
}

impl Command {
    /// Decodes exactly one command. The buffer must not contain any bytes
    /// past the period field.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.is_empty() {
            return Err(ParseError::Empty);
        }

        let Some((model, data_len)) = peek_header(buffer)? else {
            let model = IdModel::try_from(buffer[0])?;
            return Err(ParseError::NotEnoughBytes(model, buffer.len()));
        };

        /* Validate data length */

        let total_len = model.total_len(data_len);

        if buffer.len() < total_len {
            return Err(ParseError::NotEnoughBytes(model, buffer.len()));
        }

        if buffer.len() > total_len {
            return Err(ParseError::TooManyBytes(model, buffer.len()));
        }

        /* Parse fields */

        let id = buffer[1..1 + model.id_len()]
            .iter()
            .fold(0u32, |id, byte| (id << 8) | *byte as u32);

        let header_len = model.header_len();
        let data = &buffer[header_len..header_len + data_len];
        let period_ms = u16::from_be_bytes([buffer[total_len - 2], buffer[total_len - 1]]);

        let frame = CanFrame::from_raw(model == IdModel::Extended, id, data)?;

        Ok(Self::new(frame, period_ms))
    }
}
