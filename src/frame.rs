use embedded_can::{ExtendedId, Id, StandardId};

use crate::MAX_DATA_LENGTH;

/// A classic CAN 2.0 data frame.
///
/// The identifier range is enforced by [`Id`], and the payload can never be
/// longer than 8 bytes, so every value of this type can be put on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CanFrame {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    id: Id,
    dlc: usize,
    data: [u8; MAX_DATA_LENGTH],
}

impl CanFrame {
    /// Creates a new data frame. `data` must have a length in the range
    /// 0..=8 or else `None` will be returned instead.
    pub fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        if data.len() > MAX_DATA_LENGTH {
            return None;
        }

        let mut copy = [0u8; MAX_DATA_LENGTH];
        copy[..data.len()].copy_from_slice(data);

        Some(Self {
            id: id.into(),
            dlc: data.len(),
            data: copy,
        })
    }

    /// Builds a frame from a raw numeric id, checking it against the range
    /// allowed for the requested id kind.
    pub fn from_raw(extended: bool, id: u32, data: &[u8]) -> Result<Self, FrameError> {
        if data.len() > MAX_DATA_LENGTH {
            return Err(FrameError::DataTooLong(data.len()));
        }

        let id = if extended {
            Id::Extended(ExtendedId::new(id).ok_or(FrameError::ExtendedIdOutOfRange(id))?)
        } else {
            let standard = u16::try_from(id)
                .ok()
                .and_then(StandardId::new)
                .ok_or(FrameError::StandardIdOutOfRange(id))?;
            Id::Standard(standard)
        };

        Self::new(id, data).ok_or(FrameError::DataTooLong(data.len()))
    }

    /// Gets the message ID of the frame
    pub fn id(&self) -> Id {
        self.id
    }

    /// The numeric value of the identifier, without its kind
    pub fn raw_id(&self) -> u32 {
        self.id.raw()
    }

    pub fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    /// Gets the DLC (Data Length Code) of the frame
    pub fn dlc(&self) -> usize {
        self.dlc
    }

    /// Gets the data associated with the frame (length will match DLC)
    pub fn data(&self) -> &[u8] {
        &self.data[..self.dlc]
    }
}

impl embedded_can::Frame for CanFrame {
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        CanFrame::new(id, data)
    }

    /// Remote frames are not bridged.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        CanFrame::is_extended(self)
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        self.dlc
    }

    fn data(&self) -> &[u8] {
        CanFrame::data(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    #[error("Received a CAN Standard ID ({0:#X}) that was out of the valid range (0..=0x7FF)")]
    StandardIdOutOfRange(u32),
    #[error("Received a CAN Extended ID ({0:#X}) that was out of the valid range (0..=0x1FFFFFFF)")]
    ExtendedIdOutOfRange(u32),
    #[error("Received a data length ({0:?}) that was out of the valid range (0..=8)")]
    DataTooLong(usize),
}

/// Extension over [`Id`] for code that only cares about the number.
pub trait IdExt {
    fn raw(self) -> u32;
}

impl IdExt for Id {
    fn raw(self) -> u32 {
        match self {
            Id::Standard(id) => id.as_raw() as u32,
            Id::Extended(id) => id.as_raw(),
        }
    }
}
