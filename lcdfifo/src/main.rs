mod config;
mod console;
mod demo;

use std::env::var;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;
use dotenv::dotenv;
use log::{debug, info, trace, warn};
use lcdfifo_gpio::{GpioBias, GpioDriver};
use lcdfifo_gpio::gpiod::GpiodDriver;
use lcdfifo_gpio::lcd::hd44780::driver::{
    GpioHD44780Interface, HD44780Interface, QueuedHD44780Driver, SimulatedHD44780, UpdateOutcome,
};
use crate::config::Config;
use crate::console::{Command, ParseError};
use crate::demo::Demo;

fn parse_pin_bus(pin_str: &str) -> eyre::Result<[usize; 4]> {
    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse())
        .collect::<Result<Vec<_>, _>>()?
        .try_into()
        .map_err(|_| eyre::eyre!("Invalid number of data pins"))
}

/// Forwards console lines to the main loop, which must never block on stdin.
fn spawn_console() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines().map_while(Result::ok) {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// The cooperative main loop. `on_idle` runs each time the queue has just been drained.
fn run<I: HD44780Interface>(
    lcd: &mut QueuedHD44780Driver<I>,
    config: &Config,
    commands: Receiver<String>,
    mut on_idle: impl FnMut(&I),
) -> eyre::Result<()> {
    let mut demo = config.demo.then(|| Demo::new(config.demo_interval()));
    let mut console_open = true;
    let mut dirty = false;

    info!("Starting main loop...");
    loop {
        while console_open {
            let line = match commands.try_recv() {
                Ok(line) => line,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!("Console closed");
                    console_open = false;
                    break;
                }
            };

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(ParseError::Empty) => continue,
                Err(ParseError::Lcd(err)) if err.is_fatal() => return Err(err.into()),
                Err(err) => {
                    warn!("{}", err);
                    continue;
                }
            };

            if command == Command::Quit {
                let sent = lcd.flush()?;
                info!("Flushed {} entries, exiting.", sent);
                return Ok(());
            }
            if let Err(err) = command.apply(lcd) {
                warn!("{:?} rejected: {}", command, err);
            }
        }

        if let Some(demo) = demo.as_mut() {
            if let Err(err) = demo.poll(lcd, Instant::now()) {
                warn!("Demo step rejected: {}", err);
            }
        }

        match lcd.update()? {
            UpdateOutcome::Sent(entry) => {
                trace!("Sent {}", entry);
                dirty = true;
            }
            UpdateOutcome::Idle if dirty => {
                on_idle(lcd.interface());
                dirty = false;
            }
            UpdateOutcome::Idle | UpdateOutcome::Busy => {}
        }

        thread::sleep(config.loop_interval());
    }
}

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("lcdfifo starting...");

    debug!("Trying to load config...");
    let config = if let Some(config) = Config::try_load()? {
        info!("Config loaded.");
        config
    } else {
        info!("Config not found. Using default");
        let config = Config::default();
        config.save()?;
        info!("Default config saved.");
        config
    };
    debug!("{:?}", config);

    let commands = spawn_console();

    if var("LCDFIFO_SIMULATE").is_ok_and(|v| v == "1") {
        info!("Driving a simulated display.");
        let mut lcd = QueuedHD44780Driver::init(SimulatedHD44780::new(), config.hd44780())?;
        let columns = config.columns;
        let rows = if config.two_lines { 2 } else { 1 };
        return run(&mut lcd, &config, commands, |sim| {
            for row in 0..rows {
                info!("|{}|", sim.row_text(row, columns));
            }
        });
    }

    // Get pin numbers from env
    let chip_path = var("LCDFIFO_GPIO_CHIP").unwrap_or_else(|_| "/dev/gpiochip0".to_string());
    let lcd_e_pin_no: usize = var("LCDFIFO_LCD_PIN_E")?.parse()?;
    let lcd_rw_pin_no: usize = var("LCDFIFO_LCD_PIN_RW")?.parse()?;
    let lcd_rs_pin_no: usize = var("LCDFIFO_LCD_PIN_RS")?.parse()?;
    let lcd_data_pin_nos: [usize; 4] = parse_pin_bus(&var("LCDFIFO_LCD_PINS_DATA")?)?;

    info!("LCD @ {}, E: {}, RW: {}, RS: {}, Data: {:?}",
        chip_path, lcd_e_pin_no, lcd_rw_pin_no, lcd_rs_pin_no, lcd_data_pin_nos);

    debug!("Initializing GPIO driver...");
    let gpio = GpiodDriver::open(&chip_path)?;
    debug!("{:?} initialized.", gpio);

    debug!("Initializing LCD driver...");
    let mut lcd_e_pin = gpio.get_pin(lcd_e_pin_no)?;
    let lcd_e_out = lcd_e_pin.as_output()?;
    let mut lcd_rw_pin = gpio.get_pin(lcd_rw_pin_no)?;
    let lcd_rw_out = lcd_rw_pin.as_output()?;
    let mut lcd_rs_pin = gpio.get_pin(lcd_rs_pin_no)?;
    let lcd_rs_out = lcd_rs_pin.as_output()?;
    let mut lcd_data_bus = gpio.get_pin_bus(lcd_data_pin_nos)?;
    lcd_data_bus.set_bias(GpioBias::PullUp)?;

    let interface = GpioHD44780Interface::new(
        &*lcd_e_out,
        &*lcd_rw_out,
        &*lcd_rs_out,
        &mut *lcd_data_bus,
    );
    let mut lcd = QueuedHD44780Driver::init(interface, config.hd44780())?;
    debug!("{:?} initialized.", lcd);

    run(&mut lcd, &config, commands, |_| {})
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_bus_accepts_any_separator() {
        assert_eq!(parse_pin_bus("26, 16;20 21").unwrap(), [26, 16, 20, 21]);
        assert!(parse_pin_bus("1,2,3").is_err());
        assert!(parse_pin_bus("1,2,x,4").is_err());
    }
}
