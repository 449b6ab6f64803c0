use crate::lcd::hd44780::driver::{HD44780Config, HD44780Interface, ShiftDirection};
use crate::lcd::hd44780::instr::{self, BUSY_FLAG};
use crate::lcd::hd44780::queue::{CommandQueue, QueueEntry, DEFAULT_QUEUE_CAPACITY};
use crate::lcd::hd44780::{LcdError, LcdResult};
use log::{debug, trace, warn};
use std::time::Duration;

/// The power-on sequence forcing the controller into 4-bit mode from any state: three times
/// `0011` (8-bit function set) with decreasing waits, then `0010`.
const WAKE_UP_SEQUENCE: [(u8, Duration); 4] = [
    (0b0011, Duration::from_millis(5)),
    (0b0011, Duration::from_millis(1)),
    (0b0011, Duration::from_millis(1)),
    (0b0010, Duration::from_millis(1)),
];

/// What a single [QueuedHD44780Driver::update] call did.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UpdateOutcome {
    /// Nothing was queued. The bus was not touched.
    Idle,
    /// The controller was busy. The queue was left as it was.
    Busy,
    /// The given entry was transmitted.
    Sent(QueueEntry),
}

/// HD44780 driver that queues display operations and transmits them without blocking.
///
/// Every display operation is encoded and appended to a [CommandQueue] of `N` entries, and
/// returns immediately. [QueuedHD44780Driver::update] sends at most one entry per call, and only
/// when the busy flag is clear, so it can be called from a cooperative main loop next to other
/// work.
///
/// A value of this type only exists after the blocking power-on sequence of
/// [QueuedHD44780Driver::init] has run.
#[derive(Debug)]
pub struct QueuedHD44780Driver<I: HD44780Interface, const N: usize = DEFAULT_QUEUE_CAPACITY> {
    interface: I,
    queue: CommandQueue<N>,
    config: HD44780Config,
}

impl<I: HD44780Interface> QueuedHD44780Driver<I> {
    /// Initializes the display with a queue of [DEFAULT_QUEUE_CAPACITY] entries.
    ///
    /// See [QueuedHD44780Driver::init_with_queue].
    pub fn init(interface: I, config: HD44780Config) -> LcdResult<Self> {
        Self::init_with_queue(interface, config, CommandQueue::new())
    }
}

impl<I: HD44780Interface, const N: usize> QueuedHD44780Driver<I, N> {
    /// Initializes the display, blocking for roughly 60 ms.
    ///
    /// Waits for the supply to settle, forces 4-bit mode with fixed delays (the busy flag can't
    /// be read yet), then sends function set, display control and clear directly, polling the
    /// busy flag after each. `queue` is emptied and used as the command queue.
    ///
    /// # Errors
    /// - [LcdError::HardwareTimeout] if the controller stays busy for more than
    ///   [HD44780Config::busy_poll_limit] status reads, e.g. when no display is connected.
    /// - [LcdError::Gpio] if a bus access fails.
    pub fn init_with_queue(
        mut interface: I,
        config: HD44780Config,
        mut queue: CommandQueue<N>,
    ) -> LcdResult<Self> {
        debug!("Waiting {:?} for the supply to settle", config.power_on_delay);
        interface.delay(config.power_on_delay);

        for (nibble, delay) in WAKE_UP_SEQUENCE {
            interface.write_init_nibble(nibble)?;
            interface.delay(delay);
        }
        debug!("Controller switched to 4-bit mode");

        queue.clear();
        let mut driver = QueuedHD44780Driver {
            interface,
            queue,
            config,
        };

        let setup = [
            instr::function_set(config.two_lines, config.font_5x10),
            instr::display_control(true, config.cursor_on, config.blink_on),
            instr::clear(),
        ];
        for entry in setup {
            driver.transmit(entry)?;
            driver.wait_ready()?;
        }

        debug!("Display initialized with {:?}", config);
        Ok(driver)
    }

    /// Runs one step of the transmission scheduler. Call it on every main loop iteration.
    ///
    /// With an empty queue this does nothing at all. Otherwise the busy flag is read, and if it
    /// is clear the head entry is dequeued and written to the bus.
    ///
    /// # Errors
    /// - [LcdError::Gpio] if a bus access fails. An entry dequeued before the failure is lost.
    pub fn update(&mut self) -> LcdResult<UpdateOutcome> {
        if self.queue.is_empty() {
            return Ok(UpdateOutcome::Idle);
        }

        if self.is_busy()? {
            trace!("Controller busy, {} entries waiting", self.queue.len());
            return Ok(UpdateOutcome::Busy);
        }

        match self.queue.dequeue() {
            Some(entry) => {
                self.transmit(entry)?;
                Ok(UpdateOutcome::Sent(entry))
            }
            None => Ok(UpdateOutcome::Idle),
        }
    }

    /// Transmits every queued entry, blocking on the busy flag in between.
    ///
    /// Returns the number of entries sent.
    pub fn flush(&mut self) -> LcdResult<usize> {
        let mut sent = 0;
        while !self.queue.is_empty() {
            self.wait_ready()?;
            if let Some(entry) = self.queue.dequeue() {
                self.transmit(entry)?;
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Reads the busy flag and the address counter.
    pub fn read_status(&mut self) -> LcdResult<(bool, u8)> {
        let status = self.interface.read_status()?;
        Ok((status & BUSY_FLAG != 0, status & !BUSY_FLAG))
    }

    fn is_busy(&mut self) -> LcdResult<bool> {
        Ok(self.read_status()?.0)
    }

    fn wait_ready(&mut self) -> LcdResult<()> {
        // At least one status read, even with a limit of 0.
        let limit = self.config.busy_poll_limit.max(1);
        for _ in 0..limit {
            if !self.is_busy()? {
                return Ok(());
            }
            self.interface.delay(self.config.busy_poll_interval);
        }
        warn!("Controller did not clear the busy flag after {} reads", limit);
        Err(LcdError::HardwareTimeout { polls: limit })
    }

    fn transmit(&mut self, entry: QueueEntry) -> LcdResult<()> {
        debug!("Sending {}", entry);
        let (byte, rs) = match entry {
            QueueEntry::Command(byte) => (byte, false),
            QueueEntry::Data(byte) => (byte, true),
        };
        self.interface.write_byte(byte, rs)?;
        Ok(())
    }

    /// Queues a raw entry.
    pub fn enqueue(&mut self, entry: QueueEntry) -> LcdResult<()> {
        self.queue.enqueue(entry)
    }

    /// Clears the display and moves the cursor home.
    pub fn clear(&mut self) -> LcdResult<()> {
        self.queue.enqueue(instr::clear())
    }

    /// Moves the cursor home and undoes display shifts.
    pub fn home(&mut self) -> LcdResult<()> {
        self.queue.enqueue(instr::home())
    }

    /// Moves the cursor to `column` of `row`.
    ///
    /// # Errors
    /// - [LcdError::InvalidRow] if `row` is not 0 or 1. Nothing is queued.
    /// - [LcdError::QueueFull]
    pub fn set_position(&mut self, column: u8, row: u8) -> LcdResult<()> {
        let entry = instr::set_position(column, row)?;
        self.queue.enqueue(entry)
    }

    pub fn put_char(&mut self, c: u8) -> LcdResult<()> {
        self.queue.enqueue(instr::put_char(c))
    }

    /// Prints the bytes of `s` up to the first NUL, if any.
    ///
    /// Bytes go to the display unchanged, so anything outside ASCII picks whatever glyph the
    /// character ROM has at that code. Either the whole string is queued or, on
    /// [LcdError::QueueFull], none of it.
    pub fn put_string(&mut self, s: impl AsRef<[u8]>) -> LcdResult<()> {
        self.queue.enqueue_all(instr::put_string(s.as_ref()))
    }

    /// Shifts the display contents `count` times.
    pub fn shift_display(&mut self, count: u8, direction: ShiftDirection) -> LcdResult<()> {
        self.queue.enqueue_all(instr::shift_display(count, direction))
    }

    /// Moves the cursor `count` times without shifting the display.
    pub fn move_cursor(&mut self, count: u8, direction: ShiftDirection) -> LcdResult<()> {
        self.queue.enqueue_all(instr::move_cursor(count, direction))
    }

    /// Sets cursor visibility and blinking. The display stays on.
    pub fn set_cursor_style(&mut self, cursor_on: bool, blink_on: bool) -> LcdResult<()> {
        self.queue.enqueue(instr::cursor_style(cursor_on, blink_on))
    }

    pub fn set_display_control(
        &mut self,
        display_on: bool,
        cursor_on: bool,
        blink_on: bool,
    ) -> LcdResult<()> {
        self.queue
            .enqueue(instr::display_control(display_on, cursor_on, blink_on))
    }

    pub fn set_entry_mode(&mut self, increment: bool, shift: bool) -> LcdResult<()> {
        self.queue.enqueue(instr::entry_mode(increment, shift))
    }

    /// Defines the glyph of custom character `slot` (0-7), printable as bytes `0`-`7`.
    ///
    /// Leaves the address counter in CGRAM; call [Self::set_position] before printing.
    pub fn define_character(&mut self, slot: u8, rows: [u8; 8]) -> LcdResult<()> {
        let entries = instr::define_character(slot, rows)?;
        self.queue.enqueue_all(entries)
    }

    /// Gets the number of entries waiting to be sent.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue(&self) -> &CommandQueue<N> {
        &self.queue
    }

    pub fn config(&self) -> &HD44780Config {
        &self.config
    }

    pub fn interface(&self) -> &I {
        &self.interface
    }

    pub fn interface_mut(&mut self) -> &mut I {
        &mut self.interface
    }

    /// Gives back the interface. Queued entries are dropped.
    pub fn into_interface(self) -> I {
        self.interface
    }
}

/// Formatted text is queued as data bytes. Non-ASCII characters are printed as `?`.
///
/// A whole `write!` is formatted first and queued in one go, so a full queue leaves no partial
/// line behind.
impl<I: HD44780Interface, const N: usize> std::fmt::Write for QueuedHD44780Driver<I, N> {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        let bytes: Vec<u8> = s
            .chars()
            .map(|c| {
                if c.is_ascii() {
                    c as u8
                } else {
                    warn!("Non-ASCII character: {}", c);
                    b'?'
                }
            })
            .collect();
        self.queue
            .enqueue_all(bytes.into_iter().map(instr::put_char))
            .map_err(|_| std::fmt::Error)
    }

    fn write_fmt(&mut self, args: std::fmt::Arguments<'_>) -> std::fmt::Result {
        let text = std::fmt::format(args);
        self.write_str(&text)
    }
}
