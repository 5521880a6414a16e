use crate::{
    report::SinkWriter, write_report, BridgeError, ByteSource, CanFrame, CanTransmitter,
    Command, CommandParser, CyclicTable, ErrorKind, FrameSource, MillisClock, Registration,
    SerialSink, TickReport, DEFAULT_CYCLIC_CAPACITY, DEFAULT_PARSER_CAPACITY,
    DEFAULT_TICK_INTERVAL_MS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeConfig {
    /// How often the cyclic table is checked for due frames. This is also the
    /// resolution of every cyclic period.
    pub tick_interval_ms: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
        }
    }
}

/// Running totals of what the bridge has handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeStats {
    pub commands: u32,
    pub frames_reported: u32,
    pub desyncs: u32,
    pub invalid_frames: u32,
    pub capacity_rejections: u32,
    pub transmit_timeouts: u32,
}

impl BridgeStats {
    fn record(&mut self, kind: ErrorKind) {
        let counter = match kind {
            ErrorKind::ProtocolDesync => &mut self.desyncs,
            ErrorKind::InvalidFrame => &mut self.invalid_frames,
            ErrorKind::CapacityExceeded => &mut self.capacity_rejections,
            ErrorKind::TransmitTimeout => &mut self.transmit_timeouts,
        };

        *counter = counter.saturating_add(1);
    }
}

pub type DefaultBridge<T, S> = Bridge<T, S, DEFAULT_CYCLIC_CAPACITY, DEFAULT_PARSER_CAPACITY>;

/// Glue between the serial line and the CAN bus.
///
/// Owns the command parser and the cyclic table; nothing else touches them.
/// Every error is logged, counted in [`BridgeStats`] and then left behind, so
/// the loop keeps running whatever arrives.
pub struct Bridge<
    T,
    S,
    const CYCLIC: usize = DEFAULT_CYCLIC_CAPACITY,
    const BUF: usize = DEFAULT_PARSER_CAPACITY,
> {
    config: BridgeConfig,
    table: CyclicTable<CYCLIC>,
    parser: CommandParser<BUF>,
    transmitter: T,
    sink: S,
    last_tick_ms: u32,
    stats: BridgeStats,
}

impl<T, S, const CYCLIC: usize, const BUF: usize> Bridge<T, S, CYCLIC, BUF>
where
    T: CanTransmitter,
    S: SerialSink,
{
    /// `now_ms` starts the first tick interval.
    pub fn new(transmitter: T, sink: S, config: BridgeConfig, now_ms: u32) -> Self {
        Self {
            config,
            table: CyclicTable::new(),
            parser: CommandParser::new(),
            transmitter,
            sink,
            last_tick_ms: now_ms,
            stats: BridgeStats::default(),
        }
    }

    /// One pass of the main loop: parse every pending serial byte, report
    /// every pending received frame, then run the cyclic table if a tick is
    /// due.
    pub fn poll<I, R>(&mut self, now_ms: u32, bytes: &mut I, frames: &mut R)
    where
        I: ByteSource,
        R: FrameSource,
    {
        while let Some(byte) = bytes.poll_byte() {
            // Already logged and counted
            let _ = self.handle_byte(byte);
        }

        while let Some(frame) = frames.poll_receive() {
            self.report_frame(&frame);
        }

        self.tick(now_ms);
    }

    /// Runs [`poll`](Self::poll) forever.
    pub fn run<C, I, R>(&mut self, clock: &C, bytes: &mut I, frames: &mut R) -> !
    where
        C: MillisClock,
        I: ByteSource,
        R: FrameSource,
    {
        loop {
            self.poll(clock.now_ms(), bytes, frames);
        }
    }

    /// Feeds one serial byte to the parser and applies the command it
    /// completes, if any.
    pub fn handle_byte(&mut self, byte: u8) -> Result<Option<Registration>, BridgeError> {
        match self.parser.push(byte) {
            Ok(Some(command)) => self.handle_command(&command).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    pub fn handle_command(&mut self, command: &Command) -> Result<Registration, BridgeError> {
        self.stats.commands = self.stats.commands.saturating_add(1);

        trace!(
            "command id={=u32:#x} period={=u16} ms",
            command.id(),
            command.period_ms
        );

        self.table
            .add_or_update(command, &mut self.transmitter)
            .map_err(|e| self.fail(e.into()))
    }

    /// Writes the status line for a frame received from the bus.
    pub fn report_frame(&mut self, frame: &CanFrame) {
        // The sink is infallible
        let _ = write_report(&mut SinkWriter(&mut self.sink), frame);

        self.stats.frames_reported = self.stats.frames_reported.saturating_add(1);
    }

    /// Advances the cyclic table by however many whole tick intervals have
    /// passed since the last tick. A late call still runs the table only once.
    pub fn tick(&mut self, now_ms: u32) -> TickReport {
        let interval = self.config.tick_interval_ms.max(1);
        let elapsed = now_ms.wrapping_sub(self.last_tick_ms);

        if elapsed < interval {
            return TickReport::default();
        }

        let step = elapsed - elapsed % interval;
        self.last_tick_ms = self.last_tick_ms.wrapping_add(step);

        let report = self.table.tick(step, &mut self.transmitter);

        for _ in 0..report.timed_out {
            self.stats.record(ErrorKind::TransmitTimeout);
        }

        report
    }

    fn fail(&mut self, error: BridgeError) -> BridgeError {
        warn!("bridge error: {}", error);
        self.stats.record(error.kind());
        error
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn stats(&self) -> &BridgeStats {
        &self.stats
    }

    pub fn table(&self) -> &CyclicTable<CYCLIC> {
        &self.table
    }

    pub fn parser(&self) -> &CommandParser<BUF> {
        &self.parser
    }

    pub fn transmitter(&self) -> &T {
        &self.transmitter
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
