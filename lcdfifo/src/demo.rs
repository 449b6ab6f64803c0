use std::time::{Duration, Instant};
use log::debug;
use lcdfifo_gpio::lcd::hd44780::driver::{HD44780Interface, QueuedHD44780Driver, ShiftDirection};
use lcdfifo_gpio::lcd::hd44780::LcdResult;

/// Rotating eight-step demo, one step per interval.
#[derive(Debug)]
pub struct Demo {
    step: u8,
    interval: Duration,
    last_step: Option<Instant>,
}

impl Demo {
    pub fn new(interval: Duration) -> Self {
        Demo {
            step: 0,
            interval,
            last_step: None,
        }
    }

    /// Queues the next step if `interval` has passed since the previous one.
    pub fn poll<I: HD44780Interface, const N: usize>(
        &mut self,
        lcd: &mut QueuedHD44780Driver<I, N>,
        now: Instant,
    ) -> LcdResult<()> {
        if let Some(last) = self.last_step {
            if now.duration_since(last) < self.interval {
                return Ok(());
            }
        }
        self.last_step = Some(now);

        let step = self.step;
        self.step = self.step.wrapping_add(1);
        debug!("Demo step {}", step % 8);
        Self::run_step(step, lcd)
    }

    fn run_step<I: HD44780Interface, const N: usize>(
        step: u8,
        lcd: &mut QueuedHD44780Driver<I, N>,
    ) -> LcdResult<()> {
        match step % 8 {
            0 => {
                lcd.clear()?;
                lcd.put_string("Start...")
            }
            1 => lcd.set_position(3, 1),
            2 => lcd.put_char(b'1'),
            3 => lcd.shift_display(4, ShiftDirection::Left),
            4 => lcd.set_position(6, 0),
            5 => lcd.put_char(b'a'),
            6 => lcd.clear(),
            _ => lcd.put_string("Finished test!!!"),
        }
    }
}
