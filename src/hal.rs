//! Capabilities the bridge consumes from the hardware layer.
//!
//! The bridge itself only talks to [`CanTransmitter`], [`FrameSource`],
//! [`ByteSource`], [`SerialSink`] and [`MillisClock`]. The register-level
//! traits [`TxMailbox`] and [`RxFifo`] let a board crate implement the first
//! two on top of a bxCAN-style peripheral through [`MailboxTransmitter`] and
//! [`drain_rx_fifo`].
use crate::{
    CanFrame, FrameError, FrameProducer, MailboxRegisters, TransmitTimeout,
    DEFAULT_TRANSMIT_TIMEOUT_MS,
};

/// Puts one frame on the bus, waiting a bounded time for the hardware.
pub trait CanTransmitter {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), TransmitTimeout>;
}

impl<T: CanTransmitter + ?Sized> CanTransmitter for &mut T {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), TransmitTimeout> {
        (**self).transmit(frame)
    }
}

/// Non-blocking source of frames received from the bus
pub trait FrameSource {
    fn poll_receive(&mut self) -> Option<CanFrame>;
}

/// Non-blocking source of bytes received on the serial line
pub trait ByteSource {
    fn poll_byte(&mut self) -> Option<u8>;
}

/// Outgoing serial line
pub trait SerialSink {
    fn send_bytes(&mut self, bytes: &[u8]);
}

/// Free-running millisecond counter. Wraps around at `u32::MAX`.
pub trait MillisClock {
    fn now_ms(&self) -> u32;
}

impl<C: MillisClock + ?Sized> MillisClock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

/// One hardware transmit mailbox.
pub trait TxMailbox {
    /// Whether the mailbox can accept a new frame
    fn is_empty(&self) -> bool;

    /// Loads the registers and requests transmission.
    fn request(&mut self, registers: MailboxRegisters);
}

/// One hardware receive FIFO.
pub trait RxFifo {
    /// Whether a frame is waiting at the FIFO output
    fn pending(&self) -> bool;

    fn read(&self) -> MailboxRegisters;

    /// Releases the output slot so the next frame can be read.
    fn release(&mut self);
}

/// [`CanTransmitter`] for a single hardware mailbox, busy-waiting on it for
/// at most `timeout_ms`.
pub struct MailboxTransmitter<M, C> {
    mailbox: M,
    clock: C,
    timeout_ms: u32,
}

impl<M: TxMailbox, C: MillisClock> MailboxTransmitter<M, C> {
    pub fn new(mailbox: M, clock: C) -> Self {
        Self::with_timeout(mailbox, clock, DEFAULT_TRANSMIT_TIMEOUT_MS)
    }

    pub fn with_timeout(mailbox: M, clock: C, timeout_ms: u32) -> Self {
        Self {
            mailbox,
            clock,
            timeout_ms,
        }
    }

    pub fn mailbox(&self) -> &M {
        &self.mailbox
    }

    pub fn release(self) -> (M, C) {
        (self.mailbox, self.clock)
    }
}

impl<M: TxMailbox, C: MillisClock> CanTransmitter for MailboxTransmitter<M, C> {
    fn transmit(&mut self, frame: &CanFrame) -> Result<(), TransmitTimeout> {
        let start = self.clock.now_ms();

        while !self.mailbox.is_empty() {
            let waited_ms = self.clock.now_ms().wrapping_sub(start);

            if waited_ms >= self.timeout_ms {
                return Err(TransmitTimeout { waited_ms });
            }
        }

        self.mailbox.request(MailboxRegisters::encode(frame));

        Ok(())
    }
}

/// Moves every pending frame out of the FIFO into the frame mailbox. Meant to
/// be the whole body of the receive interrupt.
///
/// Returns how many frames were posted. Frames that do not decode or that find
/// the mailbox occupied are released, dropped and counted in the mailbox drop
/// counter.
pub fn drain_rx_fifo<F: RxFifo>(fifo: &mut F, producer: &mut FrameProducer<'_>) -> usize {
    let mut posted = 0;

    while fifo.pending() {
        let decoded: Result<CanFrame, FrameError> = fifo.read().decode();
        fifo.release();

        match decoded {
            Ok(frame) => {
                if producer.post(frame).is_ok() {
                    posted += 1;
                }
            }
            Err(e) => {
                warn!("dropping undecodable frame: {}", e);
                producer.discard();
            }
        }
    }

    posted
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use embedded_can::StandardId;
    use heapless::{Deque, Vec};

    use crate::{
        drain_rx_fifo, CanFrame, CanTransmitter, FrameMailbox, FrameSource, MailboxRegisters,
        MailboxTransmitter, MillisClock, RxFifo, TransmitTimeout, TxMailbox,
    };

    /// Advances by `step` every time it is read
    struct SteppingClock {
        now: Cell<u32>,
        step: u32,
    }

    impl MillisClock for SteppingClock {
        fn now_ms(&self) -> u32 {
            let now = self.now.get();
            self.now.set(now.wrapping_add(self.step));
            now
        }
    }

    #[derive(Default)]
    struct FakeMailbox {
        busy_polls: Cell<u32>,
        requested: Vec<MailboxRegisters, 4>,
    }

    impl TxMailbox for FakeMailbox {
        fn is_empty(&self) -> bool {
            let busy = self.busy_polls.get();
            self.busy_polls.set(busy.saturating_sub(1));
            busy == 0
        }

        fn request(&mut self, registers: MailboxRegisters) {
            self.requested.push(registers).unwrap();
        }
    }

    #[derive(Default)]
    struct FakeFifo {
        slots: Deque<MailboxRegisters, 4>,
    }

    impl RxFifo for FakeFifo {
        fn pending(&self) -> bool {
            !self.slots.is_empty()
        }

        fn read(&self) -> MailboxRegisters {
            *self.slots.front().unwrap()
        }

        fn release(&mut self) {
            self.slots.pop_front();
        }
    }

    fn clock(start: u32, step: u32) -> SteppingClock {
        SteppingClock {
            now: Cell::new(start),
            step,
        }
    }

    #[test]
    fn transmit_writes_encoded_registers() {
        let frame = CanFrame::new(StandardId::MAX, &[1, 2]).unwrap();
        let mailbox = FakeMailbox {
            busy_polls: Cell::new(3),
            ..Default::default()
        };
        let mut transmitter = MailboxTransmitter::with_timeout(mailbox, clock(0, 1), 10);

        assert_eq!(transmitter.transmit(&frame), Ok(()));
        assert_eq!(
            &transmitter.mailbox().requested[..],
            &[MailboxRegisters::encode(&frame)]
        );
    }

    #[test]
    fn transmit_times_out_on_stuck_mailbox() {
        let frame = CanFrame::new(StandardId::ZERO, &[]).unwrap();
        let mailbox = FakeMailbox {
            busy_polls: Cell::new(u32::MAX),
            ..Default::default()
        };
        // Starts right below the wrap point
        let mut transmitter =
            MailboxTransmitter::with_timeout(mailbox, clock(u32::MAX - 2, 2), 10);

        assert_eq!(
            transmitter.transmit(&frame),
            Err(TransmitTimeout { waited_ms: 10 })
        );
        assert!(transmitter.mailbox().requested.is_empty());
    }

    #[test]
    fn drain_fifo_into_mailbox() {
        let first = CanFrame::from_raw(true, 0x18FF_0001, &[0xAA]).unwrap();
        let second = CanFrame::from_raw(false, 0x42, &[]).unwrap();
        let third = CanFrame::from_raw(false, 0x43, &[1]).unwrap();

        let mut fifo = FakeFifo::default();
        fifo.slots.push_back(MailboxRegisters::encode(&first)).unwrap();
        fifo.slots.push_back(MailboxRegisters::encode(&second)).unwrap();
        fifo.slots.push_back(MailboxRegisters::encode(&third)).unwrap();

        let mut mailbox = FrameMailbox::new();
        let (mut producer, mut consumer) = mailbox.split();

        // The later two find the mailbox occupied
        assert_eq!(drain_rx_fifo(&mut fifo, &mut producer), 1);
        assert!(!fifo.pending());
        assert_eq!(consumer.dropped(), 2);

        assert_eq!(consumer.poll_receive(), Some(first));
        assert_eq!(consumer.poll_receive(), None);
    }

    #[test]
    fn drain_fifo_keeps_frame_with_long_dlc() {
        let mut fifo = FakeFifo::default();
        fifo.slots
            .push_back(MailboxRegisters {
                id: 0x123 << 21,
                control: 12,
                data_low: 0x0403_0201,
                data_high: 0x0807_0605,
            })
            .unwrap();

        let mut mailbox = FrameMailbox::new();
        let (mut producer, mut consumer) = mailbox.split();

        assert_eq!(drain_rx_fifo(&mut fifo, &mut producer), 1);
        assert_eq!(consumer.dropped(), 0);
        assert_eq!(
            consumer.poll_receive(),
            Some(CanFrame::from_raw(false, 0x123, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap())
        );
    }
}
