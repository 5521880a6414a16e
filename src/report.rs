use core::fmt::{self, Write};

use heapless::String;

use crate::{CanFrame, SerialSink};

/// Longest possible report: extended id, 8 data bytes and the terminator
pub const MAX_REPORT_LENGTH: usize = 64;

/// Writes the status line for a received frame, e.g.
/// `ID: 0x123, [Std], Data: 01 02 03\r\n`.
pub fn write_report<W: Write>(out: &mut W, frame: &CanFrame) -> fmt::Result {
    let kind = if frame.is_extended() { "Ext" } else { "Std" };

    write!(out, "ID: 0x{:03X}, [{}], Data: ", frame.raw_id(), kind)?;

    for (i, byte) in frame.data().iter().enumerate() {
        if i > 0 {
            out.write_char(' ')?;
        }
        write!(out, "{:02X}", byte)?;
    }

    out.write_str("\r\n")
}

pub fn format_report(frame: &CanFrame) -> String<MAX_REPORT_LENGTH> {
    let mut line = String::new();

    // Cannot fail, MAX_REPORT_LENGTH covers the longest frame
    let _ = write_report(&mut line, frame);

    line
}

/// [`Write`] adapter that streams text straight into a [`SerialSink`]
pub struct SinkWriter<'a, S: SerialSink>(pub &'a mut S);

impl<S: SerialSink> Write for SinkWriter<'_, S> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.send_bytes(s.as_bytes());
        Ok(())
    }
}
