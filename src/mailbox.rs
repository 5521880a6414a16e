//! Single-producer/single-consumer handoff between interrupt handlers and the
//! bridge loop.
//!
//! Producers never block and never allocate; when the buffer is full the new
//! item is dropped and counted. Each buffer is split once into its two halves,
//! which can then live in different execution contexts.
use core::sync::atomic::{AtomicU32, Ordering};

use heapless::spsc::{Consumer, Producer, Queue};

use crate::{ByteSource, CanFrame, FrameSource, DEFAULT_BYTE_QUEUE_CAPACITY};

// heapless queues hold one element less than their storage
const FRAME_SLOTS: usize = 2;

/// Holds at most one received frame until the bridge loop picks it up.
///
/// A frame arriving while another one is still pending is dropped.
pub struct FrameMailbox {
    queue: Queue<CanFrame, FRAME_SLOTS>,
    dropped: AtomicU32,
}

impl FrameMailbox {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: AtomicU32::new(0),
        }
    }

    pub fn split(&mut self) -> (FrameProducer<'_>, FrameConsumer<'_>) {
        let (producer, consumer) = self.queue.split();
        let dropped = &self.dropped;

        (
            FrameProducer {
                inner: producer,
                dropped,
            },
            FrameConsumer {
                inner: consumer,
                dropped,
            },
        )
    }
}

impl Default for FrameMailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt side of a [`FrameMailbox`]
pub struct FrameProducer<'a> {
    inner: Producer<'a, CanFrame, FRAME_SLOTS>,
    dropped: &'a AtomicU32,
}

impl FrameProducer<'_> {
    /// Hands a frame to the loop. Gives the frame back if one is already
    /// pending.
    pub fn post(&mut self, frame: CanFrame) -> Result<(), CanFrame> {
        self.inner.enqueue(frame).inspect_err(|_| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        })
    }

    pub fn is_occupied(&self) -> bool {
        !self.inner.ready()
    }

    /// Counts a frame that was received but never reached the mailbox.
    pub fn discard(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

/// Loop side of a [`FrameMailbox`]
pub struct FrameConsumer<'a> {
    inner: Consumer<'a, CanFrame, FRAME_SLOTS>,
    dropped: &'a AtomicU32,
}

impl FrameConsumer<'_> {
    /// Frames dropped because the mailbox was occupied or they could not be
    /// decoded
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl FrameSource for FrameConsumer<'_> {
    fn poll_receive(&mut self) -> Option<CanFrame> {
        self.inner.dequeue()
    }
}

/// Bounded byte queue between the serial receive interrupt and the loop.
///
/// Holds `N - 1` bytes.
pub struct ByteQueue<const N: usize = DEFAULT_BYTE_QUEUE_CAPACITY> {
    queue: Queue<u8, N>,
    dropped: AtomicU32,
}

impl<const N: usize> ByteQueue<N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
            dropped: AtomicU32::new(0),
        }
    }

    pub fn split(&mut self) -> (SerialProducer<'_, N>, SerialConsumer<'_, N>) {
        let (producer, consumer) = self.queue.split();
        let dropped = &self.dropped;

        (
            SerialProducer {
                inner: producer,
                dropped,
            },
            SerialConsumer {
                inner: consumer,
                dropped,
            },
        )
    }
}

impl<const N: usize> Default for ByteQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt side of a [`ByteQueue`]
pub struct SerialProducer<'a, const N: usize> {
    inner: Producer<'a, u8, N>,
    dropped: &'a AtomicU32,
}

impl<const N: usize> SerialProducer<'_, N> {
    pub fn on_byte_received(&mut self, byte: u8) -> Result<(), u8> {
        self.inner.enqueue(byte).inspect_err(|_| {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        })
    }
}

/// Loop side of a [`ByteQueue`]
pub struct SerialConsumer<'a, const N: usize> {
    inner: Consumer<'a, u8, N>,
    dropped: &'a AtomicU32,
}

impl<const N: usize> SerialConsumer<'_, N> {
    /// Bytes dropped because the queue was full
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const N: usize> ByteSource for SerialConsumer<'_, N> {
    fn poll_byte(&mut self) -> Option<u8> {
        self.inner.dequeue()
    }
}

#[cfg(test)]
mod tests {
    use embedded_can::{ExtendedId, StandardId};

    use crate::{ByteQueue, ByteSource, CanFrame, FrameMailbox, FrameSource};

    #[test]
    fn frame_mailbox_holds_one_frame() {
        let first = CanFrame::new(StandardId::ZERO, &[1]).unwrap();
        let second = CanFrame::new(ExtendedId::MAX, &[2]).unwrap();

        let mut mailbox = FrameMailbox::new();
        let (mut producer, mut consumer) = mailbox.split();

        assert!(!producer.is_occupied());
        assert_eq!(producer.post(first), Ok(()));
        assert!(producer.is_occupied());

        // Drop-newest while occupied
        assert_eq!(producer.post(second), Err(second));
        assert_eq!(consumer.dropped(), 1);

        assert_eq!(consumer.poll_receive(), Some(first));
        assert_eq!(consumer.poll_receive(), None);

        assert_eq!(producer.post(second), Ok(()));
        assert_eq!(consumer.poll_receive(), Some(second));
        assert_eq!(consumer.dropped(), 1);

        producer.discard();
        assert_eq!(consumer.dropped(), 2);
        assert!(!producer.is_occupied());
    }

    #[test]
    fn byte_queue_drops_on_overflow() {
        let mut queue = ByteQueue::<4>::new();
        let (mut producer, mut consumer) = queue.split();

        for byte in 0..3 {
            assert_eq!(producer.on_byte_received(byte), Ok(()));
        }
        assert_eq!(producer.on_byte_received(3), Err(3));
        assert_eq!(consumer.dropped(), 1);

        assert_eq!(consumer.poll_byte(), Some(0));
        assert_eq!(consumer.poll_byte(), Some(1));
        assert_eq!(consumer.poll_byte(), Some(2));
        assert_eq!(consumer.poll_byte(), None);
    }
}
