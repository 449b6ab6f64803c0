use crate::lcd::hd44780::driver::HD44780Interface;
use crate::lcd::hd44780::instr::{
    BLINK_ON, CURSOR_ON, DISPLAY_ON, ENTRY_INCREMENT, ENTRY_SHIFT, FUNCTION_2_LINES, FUNCTION_8_BIT,
    ROW_ADDRESSES, SHIFT_DISPLAY, SHIFT_RIGHT,
};
use crate::lcd::hd44780::queue::QueueEntry;
use crate::{GpioError, GpioResult};
use log::trace;
use std::time::Duration;

const DDRAM_SIZE: usize = 128;
const CGRAM_SIZE: usize = 64;

/// In-memory model of an HD44780 on a 4-bit bus.
///
/// It starts in 8-bit mode like the real controller after power-on, where every E pulse latches
/// one instruction built from D7-D4, and switches to 4-bit mode on a function set with DL
/// cleared. Decoded instructions are executed against DDRAM, CGRAM, the address counter and the
/// display flags, so tests and the host application can look at what the display would show.
///
/// The busy flag is clear unless scripted with [SimulatedHD44780::busy_for] or
/// [SimulatedHD44780::set_stuck_busy]. Delays are not slept, only summed.
#[derive(Debug, Clone)]
pub struct SimulatedHD44780 {
    rs: bool,
    read: bool,
    output: bool,
    lines: u8,
    four_bit: bool,
    high_nibble: Option<u8>,
    status_latch: Option<u8>,

    busy_reads: u32,
    stuck_busy: bool,

    ddram: [u8; DDRAM_SIZE],
    cgram: [u8; CGRAM_SIZE],
    address: u8,
    in_cgram: bool,
    increment: bool,
    entry_shift: bool,
    shift: i8,
    display_on: bool,
    cursor_on: bool,
    blink_on: bool,
    two_lines: bool,

    nibbles: Vec<(bool, u8)>,
    transmissions: Vec<QueueEntry>,
    status_reads: usize,
    elapsed: Duration,
}

impl SimulatedHD44780 {
    pub fn new() -> Self {
        SimulatedHD44780 {
            rs: false,
            read: false,
            output: true,
            lines: 0,
            four_bit: false,
            high_nibble: None,
            status_latch: None,
            busy_reads: 0,
            stuck_busy: false,
            ddram: [b' '; DDRAM_SIZE],
            cgram: [0; CGRAM_SIZE],
            address: 0,
            in_cgram: false,
            increment: true,
            entry_shift: false,
            shift: 0,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            two_lines: false,
            nibbles: Vec::new(),
            transmissions: Vec::new(),
            status_reads: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Reports busy for the next `reads` complete status reads.
    pub fn busy_for(&mut self, reads: u32) {
        self.busy_reads = reads;
    }

    /// Reports busy forever, like a disconnected display with pulled-up data lines.
    pub fn set_stuck_busy(&mut self, stuck: bool) {
        self.stuck_busy = stuck;
    }

    /// Gets every nibble latched by a write, as `(RS, nibble)`.
    pub fn nibbles(&self) -> &[(bool, u8)] {
        &self.nibbles
    }

    pub fn take_nibbles(&mut self) -> Vec<(bool, u8)> {
        std::mem::take(&mut self.nibbles)
    }

    /// Gets every complete byte the controller received, in order.
    pub fn transmissions(&self) -> &[QueueEntry] {
        &self.transmissions
    }

    pub fn take_transmissions(&mut self) -> Vec<QueueEntry> {
        std::mem::take(&mut self.transmissions)
    }

    pub fn status_reads(&self) -> usize {
        self.status_reads
    }

    /// Gets the sum of all requested delays.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn is_four_bit(&self) -> bool {
        self.four_bit
    }

    pub fn two_lines(&self) -> bool {
        self.two_lines
    }

    pub fn display_on(&self) -> bool {
        self.display_on
    }

    pub fn cursor_on(&self) -> bool {
        self.cursor_on
    }

    pub fn blink_on(&self) -> bool {
        self.blink_on
    }

    /// Gets the display shift in characters, positive to the right.
    pub fn display_shift(&self) -> i8 {
        self.shift
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn ddram(&self) -> &[u8; DDRAM_SIZE] {
        &self.ddram
    }

    /// Gets the 5x8 glyph stored in custom character `slot`.
    pub fn glyph(&self, slot: u8) -> [u8; 8] {
        let start = (slot as usize & 0x07) * 8;
        let mut rows = [0; 8];
        rows.copy_from_slice(&self.cgram[start..start + 8]);
        rows
    }

    /// Gets the first `columns` characters of `row` as text, ignoring the display shift.
    ///
    /// Custom characters and codes outside printable ASCII show as `?`.
    pub fn row_text(&self, row: u8, columns: u8) -> String {
        let base = ROW_ADDRESSES[row as usize & 1] as usize;
        (0..columns as usize)
            .map(|column| self.ddram[(base + column) % DDRAM_SIZE])
            .map(|byte| {
                if byte == b' ' || byte.is_ascii_graphic() {
                    byte as char
                } else {
                    '?'
                }
            })
            .collect()
    }

    fn latch(&mut self) {
        let nibble = self.lines;
        self.nibbles.push((self.rs, nibble));

        if !self.four_bit {
            // Only D7-D4 are wired, D3-D0 read as zero.
            self.receive(nibble << 4);
            return;
        }

        match self.high_nibble.take() {
            None => self.high_nibble = Some(nibble),
            Some(high) => self.receive((high << 4) | nibble),
        }
    }

    fn receive(&mut self, byte: u8) {
        let entry = if self.rs {
            QueueEntry::Data(byte)
        } else {
            QueueEntry::Command(byte)
        };
        trace!("Simulated controller received {}", entry);
        self.transmissions.push(entry);

        match entry {
            QueueEntry::Data(byte) => self.write_ram(byte),
            QueueEntry::Command(byte) => self.execute(byte),
        }
    }

    fn write_ram(&mut self, byte: u8) {
        if self.in_cgram {
            self.cgram[self.address as usize % CGRAM_SIZE] = byte & 0x1F;
        } else {
            self.ddram[self.address as usize % DDRAM_SIZE] = byte;
            if self.entry_shift {
                self.shift_by(if self.increment { -1 } else { 1 });
            }
        }
        self.step_address(self.increment);
    }

    /// Each line holds 40 characters, so the shift wraps there.
    fn shift_by(&mut self, delta: i8) {
        self.shift = (self.shift + delta) % 40;
    }

    fn step_address(&mut self, forward: bool) {
        let mask = if self.in_cgram { 0x3F } else { 0x7F };
        let next = if forward {
            self.address.wrapping_add(1)
        } else {
            self.address.wrapping_sub(1)
        };
        self.address = next & mask;
    }

    fn execute(&mut self, command: u8) {
        match command.leading_zeros() {
            0 => {
                self.address = command & 0x7F;
                self.in_cgram = false;
            }
            1 => {
                self.address = command & 0x3F;
                self.in_cgram = true;
            }
            2 => {
                self.four_bit = command & FUNCTION_8_BIT == 0;
                self.two_lines = command & FUNCTION_2_LINES != 0;
            }
            3 => {
                let right = command & SHIFT_RIGHT != 0;
                if command & SHIFT_DISPLAY != 0 {
                    self.shift_by(if right { 1 } else { -1 });
                } else {
                    self.step_address(right);
                }
            }
            4 => {
                self.display_on = command & DISPLAY_ON != 0;
                self.cursor_on = command & CURSOR_ON != 0;
                self.blink_on = command & BLINK_ON != 0;
            }
            5 => {
                self.increment = command & ENTRY_INCREMENT != 0;
                self.entry_shift = command & ENTRY_SHIFT != 0;
            }
            6 => {
                self.address = 0;
                self.in_cgram = false;
                self.shift = 0;
            }
            7 => {
                self.ddram = [b' '; DDRAM_SIZE];
                self.address = 0;
                self.in_cgram = false;
                self.shift = 0;
                self.increment = true;
            }
            _ => {}
        }
    }

    fn status(&self) -> u8 {
        let busy = self.stuck_busy || self.busy_reads > 0;
        (if busy { 0x80 } else { 0 }) | (self.address & 0x7F)
    }
}

impl Default for SimulatedHD44780 {
    fn default() -> Self {
        Self::new()
    }
}

impl HD44780Interface for SimulatedHD44780 {
    fn write_nibble(&mut self, nibble: u8) -> GpioResult<()> {
        if !self.output {
            return Err(GpioError::WrongDirection);
        }
        self.lines = nibble & 0x0F;
        Ok(())
    }

    fn read_nibble(&mut self) -> GpioResult<u8> {
        if self.output {
            return Err(GpioError::WrongDirection);
        }
        if !self.read {
            return Err(GpioError::Other("RW is low during a read".into()));
        }
        if self.rs {
            return Err(GpioError::NotSupported);
        }

        match self.status_latch.take() {
            None => {
                let status = self.status();
                self.status_latch = Some(status);
                Ok(status >> 4)
            }
            Some(status) => {
                self.status_reads += 1;
                self.busy_reads = self.busy_reads.saturating_sub(1);
                Ok(status & 0x0F)
            }
        }
    }

    fn set_data_lines_output(&mut self) -> GpioResult<()> {
        self.output = true;
        Ok(())
    }

    fn set_data_lines_input(&mut self) -> GpioResult<()> {
        self.output = false;
        Ok(())
    }

    fn set_register_select(&mut self, high: bool) -> GpioResult<()> {
        self.rs = high;
        Ok(())
    }

    fn set_read_write(&mut self, read: bool) -> GpioResult<()> {
        if read && !self.read {
            self.status_latch = None;
        }
        self.read = read;
        Ok(())
    }

    fn pulse_enable(&mut self) -> GpioResult<()> {
        if self.read {
            // A strobe without sampling still advances the read.
            if self.status_latch.take().is_none() {
                self.status_latch = Some(self.status());
            }
            return Ok(());
        }
        if !self.output {
            return Err(GpioError::WrongDirection);
        }
        self.latch();
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        self.elapsed += duration;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use QueueEntry::*;

    fn four_bit() -> SimulatedHD44780 {
        let mut sim = SimulatedHD44780::new();
        sim.write_init_nibble(0b0010).unwrap();
        sim.take_transmissions();
        sim.take_nibbles();
        sim
    }

    #[test]
    fn starts_in_eight_bit_mode() {
        let mut sim = SimulatedHD44780::new();
        sim.write_init_nibble(0b0011).unwrap();
        assert_eq!(sim.transmissions(), &[Command(0x30)]);
        assert!(!sim.is_four_bit());

        sim.write_init_nibble(0b0010).unwrap();
        assert!(sim.is_four_bit());
    }

    #[test]
    fn bytes_are_assembled_high_nibble_first() {
        let mut sim = four_bit();
        sim.write_byte(0x41, true).unwrap();
        assert_eq!(sim.nibbles(), &[(true, 0x4), (true, 0x1)]);
        assert_eq!(sim.transmissions(), &[Data(0x41)]);
        assert_eq!(sim.row_text(0, 2), "A ");
    }

    #[test]
    fn status_read_reports_busy_then_ready() {
        let mut sim = four_bit();
        sim.write_byte(0xC2, false).unwrap();
        sim.busy_for(1);

        assert_eq!(sim.read_status(), Ok(0x80 | 0x42));
        assert_eq!(sim.read_status(), Ok(0x42));
        assert_eq!(sim.status_reads(), 2);
        assert!(sim.nibbles().len() == 2);
    }

    #[test]
    fn writes_need_output_lines() {
        let mut sim = four_bit();
        sim.set_data_lines_input().unwrap();
        assert_eq!(sim.write_nibble(0x1), Err(GpioError::WrongDirection));
        assert_eq!(sim.read_nibble(), Err(GpioError::Other("RW is low during a read".into())));
    }

    #[test]
    fn clear_and_home() {
        let mut sim = four_bit();
        sim.write_byte(b'Z', true).unwrap();
        sim.write_byte(0x1C, false).unwrap();
        assert_eq!(sim.display_shift(), 1);
        sim.write_byte(0x02, false).unwrap();
        assert_eq!(sim.display_shift(), 0);
        assert_eq!(sim.row_text(0, 1), "Z");
        sim.write_byte(0x01, false).unwrap();
        assert_eq!(sim.row_text(0, 1), " ");
        assert_eq!(sim.address(), 0);
    }

    #[test]
    fn delays_are_summed() {
        let mut sim = SimulatedHD44780::new();
        sim.delay(Duration::from_millis(5));
        sim.delay(Duration::from_micros(10));
        assert_eq!(sim.elapsed(), Duration::from_micros(5010));
    }
}
