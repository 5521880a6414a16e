//! Frames retransmitted on a fixed period.
//!
//! The table is a fixed array of slots scanned linearly. Slots are allocated
//! first-fit, so the slot an entry lands in only depends on the order of
//! registrations and cancellations.
//!
//! Entries are keyed by the numeric identifier alone: a standard and an
//! extended frame with the same number share one slot, and registering either
//! replaces the other.
use crate::{
    CanFrame, CanTransmitter, Command, ErrorKind, TransmitTimeout, DEFAULT_CYCLIC_CAPACITY,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CyclicEntry {
    frame: CanFrame,
    period_ms: u16,
    elapsed_ms: u32,
}

impl CyclicEntry {
    pub fn frame(&self) -> &CanFrame {
        &self.frame
    }

    pub fn period_ms(&self) -> u16 {
        self.period_ms
    }

    /// Time accumulated since the last transmission
    pub fn elapsed_ms(&self) -> u32 {
        self.elapsed_ms
    }

    /// Adds `increment_ms` and reports whether the entry is due, restarting
    /// the count if so. Several elapsed periods still yield a single send.
    fn advance(&mut self, increment_ms: u32) -> bool {
        self.elapsed_ms = self.elapsed_ms.saturating_add(increment_ms);

        if self.elapsed_ms >= self.period_ms as u32 {
            self.elapsed_ms = 0;
            true
        } else {
            false
        }
    }
}

/// What [`CyclicTable::add_or_update`] did with a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Registration {
    /// Sent once; `cancelled` is set when it replaced a stored schedule
    OneShot { cancelled: bool },
    Inserted { slot: usize },
    Updated { slot: usize },
}

/// Outcome of one [`CyclicTable::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TickReport {
    pub sent: usize,
    pub timed_out: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CyclicError {
    #[error("All {capacity} cyclic slots are in use")]
    CapacityExceeded { capacity: usize },
    #[error("Registered, but the immediate send failed")]
    Transmit(#[from] TransmitTimeout),
}

impl CyclicError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::Transmit(_) => ErrorKind::TransmitTimeout,
        }
    }
}

#[derive(Debug)]
pub struct CyclicTable<const N: usize = DEFAULT_CYCLIC_CAPACITY> {
    slots: [Option<CyclicEntry>; N],
}

impl<const N: usize> Default for CyclicTable<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CyclicTable<N> {
    pub const fn new() -> Self {
        Self { slots: [None; N] }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn slot_of(&self, id: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(entry) if entry.frame.raw_id() == id))
    }

    pub fn get(&self, id: u32) -> Option<&CyclicEntry> {
        self.slot_of(id).and_then(|slot| self.slots[slot].as_ref())
    }

    /// Occupied entries with their slot index, in slot order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &CyclicEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, entry)| entry.as_ref().map(|entry| (slot, entry)))
    }

    /// Registers, reschedules or cancels the frame carried by `command`, and
    /// sends it once right away.
    ///
    /// A zero period removes any stored schedule for the id. A full table
    /// rejects new ids without sending anything. When only the immediate send
    /// fails, the table change is kept and [`CyclicError::Transmit`] returned.
    pub fn add_or_update<T: CanTransmitter>(
        &mut self,
        command: &Command,
        transmitter: &mut T,
    ) -> Result<Registration, CyclicError> {
        let id = command.id();
        let existing = self.slot_of(id);

        let registration = if command.is_one_shot() {
            if let Some(slot) = existing {
                self.slots[slot] = None;
                debug!("cancelled cyclic frame {=u32:#x} in slot {=usize}", id, slot);
            }

            Registration::OneShot {
                cancelled: existing.is_some(),
            }
        } else {
            let entry = CyclicEntry {
                frame: command.frame,
                period_ms: command.period_ms,
                elapsed_ms: 0,
            };

            match existing {
                Some(slot) => {
                    self.slots[slot] = Some(entry);
                    Registration::Updated { slot }
                }
                None => {
                    let Some(slot) = self.slots.iter().position(Option::is_none) else {
                        return Err(CyclicError::CapacityExceeded { capacity: N });
                    };

                    self.slots[slot] = Some(entry);
                    Registration::Inserted { slot }
                }
            }
        };

        transmitter.transmit(&command.frame)?;

        Ok(registration)
    }

    /// Advances every entry by `elapsed_ms` and sends the ones that are due.
    ///
    /// A failed send only affects its own entry, which waits for its next
    /// period like any other.
    pub fn tick<T: CanTransmitter>(
        &mut self,
        elapsed_ms: u32,
        transmitter: &mut T,
    ) -> TickReport {
        let mut report = TickReport::default();

        for entry in self.slots.iter_mut().flatten() {
            if !entry.advance(elapsed_ms) {
                continue;
            }

            match transmitter.transmit(&entry.frame) {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    warn!("cyclic frame {=u32:#x} dropped: {}", entry.frame.raw_id(), e);
                    report.timed_out += 1;
                }
            }
        }

        report
    }
}
