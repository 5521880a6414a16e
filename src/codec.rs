use embedded_can::{ExtendedId, Id, StandardId};

use crate::{CanFrame, FrameError, MAX_DATA_LENGTH};

const STANDARD_SHIFT: u32 = 21;
const STANDARD_MASK: u32 = 0x7FF;

const EXTENDED_SHIFT: u32 = 3;
const EXTENDED_MASK: u32 = 0x1FFF_FFFF;

/// Identifier extension (IDE) bit
const IDE_BIT: u32 = 1 << 2;

const DLC_MASK: u32 = 0xF;

/// The register image of one transmit mailbox or receive FIFO slot.
///
/// `id` holds the identifier word, `control` the data length code in its low
/// nibble, and `data_low`/`data_high` the payload packed little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MailboxRegisters {
    pub id: u32,
    pub control: u32,
    pub data_low: u32,
    pub data_high: u32,
}

impl MailboxRegisters {
    pub fn encode(frame: &CanFrame) -> Self {
        let id = match frame.id() {
            Id::Standard(id) => (id.as_raw() as u32) << STANDARD_SHIFT,
            Id::Extended(id) => (id.as_raw() << EXTENDED_SHIFT) | IDE_BIT,
        };

        let mut data = [0u8; 8];
        data[..frame.dlc()].copy_from_slice(frame.data());

        Self {
            id,
            control: frame.dlc() as u32 & DLC_MASK,
            data_low: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            data_high: u32::from_le_bytes([data[4], data[5], data[6], data[7]]),
        }
    }

    pub fn decode(&self) -> Result<CanFrame, FrameError> {
        let id = if self.is_extended() {
            Id::Extended(
                ExtendedId::new((self.id >> EXTENDED_SHIFT) & EXTENDED_MASK)
                    .ok_or(FrameError::ExtendedIdOutOfRange(self.id >> EXTENDED_SHIFT))?,
            )
        } else {
            let raw = (self.id >> STANDARD_SHIFT) & STANDARD_MASK;
            Id::Standard(
                StandardId::new(raw as u16).ok_or(FrameError::StandardIdOutOfRange(raw))?,
            )
        };

        // DLC 9..=15 still means 8 data bytes on classic CAN
        let dlc = ((self.control & DLC_MASK) as usize).min(MAX_DATA_LENGTH);

        let mut data = [0u8; MAX_DATA_LENGTH];
        data[..4].copy_from_slice(&self.data_low.to_le_bytes());
        data[4..].copy_from_slice(&self.data_high.to_le_bytes());

        CanFrame::new(id, &data[..dlc]).ok_or(FrameError::DataTooLong(dlc))
    }

    pub fn is_extended(&self) -> bool {
        self.id & IDE_BIT != 0
    }
}
