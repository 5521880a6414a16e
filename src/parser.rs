use heapless::Vec;

use crate::{command::peek_header, Command, ParseError, DEFAULT_PARSER_CAPACITY};

/// Accumulates serial bytes until a full [`Command`] is present.
///
/// The parser never holds a partial command across an error: any framing
/// problem discards the buffer and parsing restarts with the next byte.
#[derive(Debug, Default)]
pub struct CommandParser<const N: usize = DEFAULT_PARSER_CAPACITY> {
    buffer: Vec<u8, N>,
}

impl<const N: usize> CommandParser<N> {
    pub const fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Number of bytes currently buffered
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Appends one byte, returning the command it completes, if any.
    pub fn push(&mut self, byte: u8) -> Result<Option<Command>, ParseError> {
        if self.buffer.push(byte).is_err() {
            warn!("parser overflow after {=usize} bytes", self.buffer.len());
            self.reset();
            return Err(ParseError::Overflow(N));
        }

        let result = self.try_complete();

        match &result {
            Ok(None) => {}
            Ok(Some(_)) | Err(_) => self.reset(),
        }

        result
    }

    /// Feeds a whole slice, stopping at the first complete command or error.
    /// Returns how many bytes were consumed along with the outcome.
    pub fn push_slice(&mut self, bytes: &[u8]) -> (usize, Result<Option<Command>, ParseError>) {
        for (i, byte) in bytes.iter().enumerate() {
            match self.push(*byte) {
                Ok(None) => {}
                outcome => return (i + 1, outcome),
            }
        }

        (bytes.len(), Ok(None))
    }

    fn try_complete(&self) -> Result<Option<Command>, ParseError> {
        let Some((model, data_len)) = peek_header(&self.buffer)? else {
            return Ok(None);
        };

        if self.buffer.len() < model.total_len(data_len) {
            return Ok(None);
        }

        Command::from_bytes(&self.buffer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use embedded_can::ExtendedId;

    use crate::{CanFrame, Command, CommandParser, FrameError, IdModel, ParseError};

    fn feed<const N: usize>(
        parser: &mut CommandParser<N>,
        bytes: &[u8],
    ) -> heapless::Vec<Result<Command, ParseError>, 8> {
        let mut outcomes = heapless::Vec::new();

        for byte in bytes {
            match parser.push(*byte) {
                Ok(None) => {}
                Ok(Some(command)) => outcomes.push(Ok(command)).unwrap(),
                Err(e) => outcomes.push(Err(e)).unwrap(),
            }
        }

        outcomes
    }

    #[test]
    fn parse_standard_byte_by_byte() {
        let mut parser = CommandParser::<300>::new();
        let bytes = [0, 0x01, 0x23, 3, 0x01, 0x02, 0x03, 0x01, 0xF4];

        for byte in &bytes[..bytes.len() - 1] {
            assert_eq!(parser.push(*byte), Ok(None));
        }

        let command = parser.push(bytes[bytes.len() - 1]).unwrap().unwrap();

        assert_eq!(command.model(), IdModel::Standard);
        assert_eq!(command.id(), 0x123);
        assert_eq!(command.data(), &[0x01, 0x02, 0x03]);
        assert_eq!(command.frame.dlc(), 3);
        assert_eq!(command.period_ms, 500);
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn parse_extended_byte_by_byte() {
        let mut parser = CommandParser::<300>::new();
        let bytes = [1, 0x1A, 0xBC, 0xDE, 0xF0, 2, 0x55, 0xAA, 0x00, 0x64];

        let outcomes = feed(&mut parser, &bytes);

        assert_eq!(
            &outcomes[..],
            &[Ok(Command::new(
                CanFrame::from_raw(true, 0x1ABC_DEF0, &[0x55, 0xAA]).unwrap(),
                100
            ))]
        );
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn header_only_emits_nothing() {
        let mut parser = CommandParser::<300>::new();

        assert!(feed(&mut parser, &[0, 0x01, 0x23, 3]).is_empty());
        assert_eq!(parser.pending(), 4);

        let mut parser = CommandParser::<300>::new();
        assert!(feed(&mut parser, &[1, 0, 0, 0x01, 0x23, 0]).is_empty());
        assert_eq!(parser.pending(), 6);
    }

    #[test]
    fn back_to_back_commands() {
        let mut parser = CommandParser::<300>::new();
        let bytes = [
            0, 0x00, 0x10, 0, 0x00, 0x00, //
            1, 0x00, 0x00, 0x00, 0x20, 1, 0xEE, 0x03, 0xE8,
        ];

        let outcomes = feed(&mut parser, &bytes);

        assert_eq!(
            &outcomes[..],
            &[
                Ok(Command::new(CanFrame::from_raw(false, 0x10, &[]).unwrap(), 0)),
                Ok(Command::new(
                    CanFrame::from_raw(true, 0x20, &[0xEE]).unwrap(),
                    1000
                )),
            ]
        );
    }

    #[test]
    fn resync_after_invalid_model() {
        let mut parser = CommandParser::<300>::new();

        let outcomes = feed(&mut parser, &[0xFF, 0, 0x00, 0x01, 0, 0x00, 0x00]);

        assert_eq!(
            &outcomes[..],
            &[
                Err(ParseError::InvalidModel(0xFF)),
                Ok(Command::new(CanFrame::from_raw(false, 1, &[]).unwrap(), 0)),
            ]
        );
    }

    #[test]
    fn reject_long_data_length() {
        let mut parser = CommandParser::<300>::new();

        assert_eq!(
            &feed(&mut parser, &[1, 0, 0, 0, 1, 9])[..],
            &[Err(ParseError::InvalidDataLength(IdModel::Extended, 9))]
        );
        assert_eq!(parser.pending(), 0);
    }

    #[test]
    fn reject_out_of_range_id_after_full_command() {
        let mut parser = CommandParser::<300>::new();

        let outcomes = feed(
            &mut parser,
            &[0, 0xFF, 0xFF, 1, 0x42, 0x00, 0x0A, 0, 0x00, 0x02, 0, 0x00, 0x00],
        );

        assert_eq!(
            &outcomes[..],
            &[
                Err(ParseError::InvalidFrame(FrameError::StandardIdOutOfRange(
                    0xFFFF
                ))),
                Ok(Command::new(CanFrame::from_raw(false, 2, &[]).unwrap(), 0)),
            ]
        );
    }

    #[test]
    fn overflow_resets_buffer() {
        // Smaller than a full extended command
        let mut parser = CommandParser::<8>::new();
        let extended = Command::new(CanFrame::new(ExtendedId::MAX, &[0; 8]).unwrap(), 10);
        let bytes = extended.as_bytes();

        let (consumed, outcome) = parser.push_slice(&bytes);

        assert_eq!(consumed, 9);
        assert_eq!(outcome, Err(ParseError::Overflow(8)));
        assert_eq!(parser.pending(), 0);

        // Next attempt starts from a clean buffer
        let standard = Command::new(CanFrame::from_raw(false, 0x7FF, &[1]).unwrap(), 0);
        let (consumed, outcome) = parser.push_slice(&standard.as_bytes());

        assert_eq!(consumed, 7);
        assert_eq!(outcome, Ok(Some(standard)));
    }
}
