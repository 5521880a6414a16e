//! Core of a serial-to-CAN bridge.
//!
//! Binary commands arrive on a serial line and are turned into CAN frames,
//! sent once or repeated on a fixed period. Frames received from the bus go
//! back out on the serial line as one text line each.
//!
//! ```text
//! model  id (BE)       len  data       period_ms (BE)
//! 00     01 23         03   01 02 03   01 F4            standard 0x123, every 500 ms
//! 01     12 34 56 78   00              00 00            extended 0x12345678, once
//! ```
//!
//! The hardware side plugs in through [`CanTransmitter`], [`FrameSource`],
//! [`ByteSource`], [`SerialSink`] and [`MillisClock`].
#![no_std]

// Must come first so the macros are visible in every other module
#[macro_use]
mod log;

mod bridge;
mod codec;
mod command;
mod cyclic;
mod error;
mod frame;
mod hal;
mod mailbox;
mod parser;
mod report;

/// Classic CAN payload limit
pub const MAX_DATA_LENGTH: usize = 8;

/// Extended header + full payload + period
pub const MAX_COMMAND_SIZE: usize = 6 + MAX_DATA_LENGTH + 2;

/// How often the cyclic table is checked for due frames
pub const DEFAULT_TICK_INTERVAL_MS: u32 = 10;

/// Longest wait for a free transmit mailbox
pub const DEFAULT_TRANSMIT_TIMEOUT_MS: u32 = 10;

/// Number of cyclic frames that can be scheduled at once
pub const DEFAULT_CYCLIC_CAPACITY: usize = 10;

/// Serial receive buffer size of the command parser
pub const DEFAULT_PARSER_CAPACITY: usize = 300;

/// Storage of the serial byte queue, which holds one byte less
pub const DEFAULT_BYTE_QUEUE_CAPACITY: usize = 64;

pub use bridge::*;
pub use codec::*;
pub use command::*;
pub use cyclic::*;
pub use error::*;
pub use frame::*;
pub use hal::*;
pub use mailbox::*;
pub use parser::*;
pub use report::*;

pub use embedded_can::{ExtendedId, Id, StandardId};
