use std::env::var_os;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;
use dotenv::var;
use eyre::WrapErr;
use lcdfifo_gpio::lcd::hd44780::driver::HD44780Config;
use serde::{Serialize, Deserialize};

/// Settings read from `CONFIG_FILE` (`config.json` by default). Pin numbers come from the
/// environment instead, see `main`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub two_lines: bool,
    pub font_5x10: bool,
    pub cursor: bool,
    pub blink: bool,
    /// Visible characters per row, used when printing the simulated display.
    pub columns: u8,
    pub busy_poll_limit: u32,
    pub busy_poll_interval_us: u64,
    /// Run the rotating demo sequence.
    pub demo: bool,
    pub demo_interval_ms: u64,
    /// Pause between two main loop iterations.
    pub loop_interval_ms: u64,
}

impl Config {
    fn path() -> std::ffi::OsString {
        var_os("CONFIG_FILE").unwrap_or_else(|| OsStr::new("config.json").to_owned())
    }

    /// Loads the config file. `Ok(None)` means there is no file yet.
    pub fn try_load() -> eyre::Result<Option<Self>> {
        Self::try_load_from(Path::new(&Self::path()))
    }

    fn try_load_from(config_path: &Path) -> eyre::Result<Option<Self>> {
        if !config_path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(config_path)?;
        let reader = std::io::BufReader::new(file);
        let config = serde_json::from_reader(reader)
            .wrap_err_with(|| format!("Invalid config in {}", config_path.display()))?;
        Ok(Some(config))
    }

    pub fn save(&self) -> std::io::Result<()> {
        let config_str = var("CONFIG_FILE").unwrap_or_else(|_| "config.json".to_string());
        let config_path = Path::new(&config_str);
        let file = std::fs::File::create(config_path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Gets the driver settings.
    pub fn hd44780(&self) -> HD44780Config {
        HD44780Config::default()
            .with_two_lines(self.two_lines)
            .with_font_5x10(self.font_5x10)
            .with_cursor(self.cursor, self.blink)
            .with_busy_poll(
                self.busy_poll_limit,
                Duration::from_micros(self.busy_poll_interval_us),
            )
    }

    pub fn demo_interval(&self) -> Duration {
        Duration::from_millis(self.demo_interval_ms)
    }

    pub fn loop_interval(&self) -> Duration {
        Duration::from_millis(self.loop_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            two_lines: true,
            font_5x10: false,
            cursor: true,
            blink: true,
            columns: 16,
            busy_poll_limit: 10_000,
            busy_poll_interval_us: 10,
            demo: true,
            demo_interval_ms: 1000,
            loop_interval_ms: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config: Config = serde_json::from_str(r#"{ "demo": false, "columns": 20 }"#).unwrap();
        assert!(!config.demo);
        assert_eq!(config.columns, 20);
        assert_eq!(config.busy_poll_limit, Config::default().busy_poll_limit);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("lcdfifo-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "demo": false, "columns": 20, }"#).unwrap();

        assert!(Config::try_load_from(&path).is_err());
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(contents.contains("\"columns\": 20"));
    }

    #[test]
    fn missing_file_loads_nothing() {
        let path = std::env::temp_dir().join("lcdfifo-config-missing.json");
        assert!(Config::try_load_from(&path).unwrap().is_none());
    }

    #[test]
    fn driver_settings_follow_config() {
        let config = Config {
            two_lines: false,
            cursor: false,
            busy_poll_limit: 42,
            busy_poll_interval_us: 3,
            ..Config::default()
        };
        let lcd = config.hd44780();
        assert!(!lcd.two_lines);
        assert!(!lcd.cursor_on);
        assert!(lcd.blink_on);
        assert_eq!(lcd.busy_poll_limit, 42);
        assert_eq!(lcd.busy_poll_interval, Duration::from_micros(3));
    }
}
