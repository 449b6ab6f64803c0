use crate::lcd::hd44780::driver::HD44780Interface;
use crate::{GpioBus, GpioError, GpioOutput, GpioResult};
use log::trace;
use std::thread::sleep;
use std::time::Duration;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum DataDirection {
    Input,
    Output,
}

/// [HD44780Interface] on plain GPIO pins: E, RW and RS outputs plus the D4-D7 bus.
///
/// RW must be wired, the driver reads the busy flag. The data bus should have pull-ups enabled
/// (see [crate::GpioBus::set_bias]) so a missing display reads as busy.
#[derive(Debug)]
pub struct GpioHD44780Interface<'a> {
    pin_e: &'a dyn GpioOutput,
    pin_rw: &'a dyn GpioOutput,
    pin_rs: &'a dyn GpioOutput,
    data_bus: &'a mut dyn GpioBus<4>,
    direction: DataDirection,
    enable_pulse: Duration,
}

impl<'a> GpioHD44780Interface<'a> {
    /// Creates the interface. The data bus starts as output.
    pub fn new(
        pin_e: &'a dyn GpioOutput,
        pin_rw: &'a dyn GpioOutput,
        pin_rs: &'a dyn GpioOutput,
        data_bus: &'a mut dyn GpioBus<4>,
    ) -> Self {
        GpioHD44780Interface {
            pin_e,
            pin_rw,
            pin_rs,
            data_bus,
            direction: DataDirection::Output,
            enable_pulse: Duration::from_micros(1),
        }
    }

    /// Sets how long E is held high, and low after a pulse. Defaults to 1 µs, well above the
    /// 450 ns the datasheet asks for.
    pub fn with_enable_pulse(mut self, enable_pulse: Duration) -> Self {
        self.enable_pulse = enable_pulse;
        self
    }
}

impl HD44780Interface for GpioHD44780Interface<'_> {
    fn write_nibble(&mut self, nibble: u8) -> GpioResult<()> {
        if self.direction != DataDirection::Output {
            return Err(GpioError::WrongDirection);
        }
        trace!("Writing nibble: {:04b}", nibble & 0x0F);
        let bus = self.data_bus.as_output()?;
        bus.write_nibble(nibble & 0x0F)
    }

    fn read_nibble(&mut self) -> GpioResult<u8> {
        if self.direction != DataDirection::Input {
            return Err(GpioError::WrongDirection);
        }
        let input = self.data_bus.as_input()?;

        self.pin_e.write(true)?;
        sleep(self.enable_pulse);

        let nibble = input.read_nibble()?;

        self.pin_e.write(false)?;
        sleep(self.enable_pulse);

        trace!("Read nibble: {:04b}", nibble);
        Ok(nibble)
    }

    fn set_data_lines_output(&mut self) -> GpioResult<()> {
        if self.direction != DataDirection::Output {
            self.data_bus.as_output()?;
            self.direction = DataDirection::Output;
        }
        Ok(())
    }

    fn set_data_lines_input(&mut self) -> GpioResult<()> {
        if self.direction != DataDirection::Input {
            self.data_bus.as_input()?;
            self.direction = DataDirection::Input;
        }
        Ok(())
    }

    fn set_register_select(&mut self, high: bool) -> GpioResult<()> {
        self.pin_rs.write(high)
    }

    fn set_read_write(&mut self, read: bool) -> GpioResult<()> {
        self.pin_rw.write(read)
    }

    fn pulse_enable(&mut self) -> GpioResult<()> {
        self.pin_e.write(true)?;
        sleep(self.enable_pulse);
        self.pin_e.write(false)?;
        sleep(self.enable_pulse);
        Ok(())
    }

    fn delay(&mut self, duration: Duration) {
        sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GpioBusInput, GpioBusOutput};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, Eq, PartialEq)]
    enum Event {
        Pin(&'static str, bool),
        BusOut([bool; 4]),
        BusIn,
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    #[derive(Debug)]
    struct MockPin {
        name: &'static str,
        log: Log,
    }

    impl GpioOutput for MockPin {
        fn write(&self, value: bool) -> GpioResult<()> {
            self.log.borrow_mut().push(Event::Pin(self.name, value));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct MockBus {
        log: Log,
        reads: Rc<RefCell<Vec<[bool; 4]>>>,
    }

    #[derive(Debug)]
    struct MockBusOutput(Log);

    impl GpioBusOutput<4> for MockBusOutput {
        fn write(&self, values: &[bool; 4]) -> GpioResult<()> {
            self.0.borrow_mut().push(Event::BusOut(*values));
            Ok(())
        }
    }

    #[derive(Debug)]
    struct MockBusInput {
        log: Log,
        reads: Rc<RefCell<Vec<[bool; 4]>>>,
    }

    impl GpioBusInput<4> for MockBusInput {
        fn read(&self) -> GpioResult<[bool; 4]> {
            self.log.borrow_mut().push(Event::BusIn);
            Ok(self.reads.borrow_mut().remove(0))
        }
    }

    impl GpioBus<4> for MockBus {
        fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<4> + '_>> {
            Ok(Box::new(MockBusInput {
                log: self.log.clone(),
                reads: self.reads.clone(),
            }))
        }

        fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<4> + '_>> {
            Ok(Box::new(MockBusOutput(self.log.clone())))
        }
    }

    struct Rig {
        log: Log,
        e: MockPin,
        rw: MockPin,
        rs: MockPin,
        bus: MockBus,
    }

    fn rig(reads: Vec<[bool; 4]>) -> Rig {
        let log: Log = Rc::default();
        Rig {
            e: MockPin { name: "E", log: log.clone() },
            rw: MockPin { name: "RW", log: log.clone() },
            rs: MockPin { name: "RS", log: log.clone() },
            bus: MockBus {
                log: log.clone(),
                reads: Rc::new(RefCell::new(reads)),
            },
            log,
        }
    }

    #[test]
    fn byte_goes_out_as_two_strobed_nibbles() {
        let mut rig = rig(Vec::new());
        let mut lcd = GpioHD44780Interface::new(&rig.e, &rig.rw, &rig.rs, &mut rig.bus)
            .with_enable_pulse(Duration::ZERO);
        lcd.write_byte(0x41, true).unwrap();
        drop(lcd);

        use Event::*;
        assert_eq!(
            *rig.log.borrow(),
            vec![
                Pin("RS", true),
                Pin("RW", false),
                BusOut([false, false, true, false]),
                Pin("E", true),
                Pin("E", false),
                BusOut([true, false, false, false]),
                Pin("E", true),
                Pin("E", false),
            ]
        );
    }

    #[test]
    fn status_is_sampled_while_enable_is_high() {
        // 0b1000 then 0b0011: busy, address 3.
        let mut rig = rig(vec![[false, false, false, true], [true, true, false, false]]);
        let mut lcd = GpioHD44780Interface::new(&rig.e, &rig.rw, &rig.rs, &mut rig.bus)
            .with_enable_pulse(Duration::ZERO);
        assert_eq!(lcd.read_status(), Ok(0x83));
        drop(lcd);

        use Event::*;
        let log = rig.log.borrow();
        let strobes: Vec<_> = log
            .iter()
            .filter(|event| matches!(event, Pin("E", _) | BusIn))
            .cloned()
            .collect();
        assert_eq!(
            strobes,
            vec![Pin("E", true), BusIn, Pin("E", false), Pin("E", true), BusIn, Pin("E", false)]
        );
        assert_eq!(log.last(), Some(&Pin("RW", false)));
    }

    #[test]
    fn direction_is_checked() {
        let mut rig = rig(Vec::new());
        let mut lcd = GpioHD44780Interface::new(&rig.e, &rig.rw, &rig.rs, &mut rig.bus);
        assert_eq!(lcd.read_nibble(), Err(GpioError::WrongDirection));
        lcd.set_data_lines_input().unwrap();
        assert_eq!(lcd.write_nibble(0x3), Err(GpioError::WrongDirection));
    }
}
