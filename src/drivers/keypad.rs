//! 4x3 matrix keypad.
//!
//! Columns are outputs idling high, rows are inputs with pull-ups. A scan
//! pulls one column low at a time and looks for a row that follows it down.

use crate::error::Error;
use crate::hal::gpio::{Direction, Gpio, Level, PinId};

pub const ROWS: usize = 4;
pub const COLS: usize = 3;

pub const LAYOUT: [[char; COLS]; ROWS] = [
    ['1', '2', '3'],
    ['4', '5', '6'],
    ['7', '8', '9'],
    ['*', '0', '#'],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeypadConfig {
    pub rows: [PinId; ROWS],
    pub cols: [PinId; COLS],
}

/// Source of key presses for the application
pub trait KeySource {
    /// One scan; `Ok(None)` when nothing is pressed.
    fn read_key(&mut self) -> Result<Option<char>, Error>;
}

pub struct Keypad<'a, G> {
    config: &'a KeypadConfig,
    gpio: G,
}

impl<'a, G: Gpio> Keypad<'a, G> {
    pub fn new(config: &'a KeypadConfig, gpio: G) -> Self {
        Self { config, gpio }
    }

    pub fn init(&mut self) -> Result<(), Error> {
        let cfg = self.config;
        for &row in &cfg.rows {
            self.gpio.configure(row, Direction::Input)?;
            // pull-up
            self.gpio.write(row, Level::High)?;
        }
        for &col in &cfg.cols {
            self.gpio.configure(col, Direction::Output)?;
            self.gpio.write(col, Level::High)?;
        }
        Ok(())
    }

    /// Scan the matrix once. A pressed key is reported only after it has been
    /// released; the first pressed key in column-major order wins.
    pub fn read(&mut self) -> Result<Option<char>, Error> {
        let cfg = self.config;
        for &col in &cfg.cols {
            self.gpio.write(col, Level::High)?;
        }

        for (c, &col) in cfg.cols.iter().enumerate() {
            self.gpio.write(col, Level::Low)?;
            let hit = self.scan_rows()?;
            self.gpio.write(col, Level::High)?;
            if let Some(r) = hit {
                return Ok(Some(LAYOUT[r][c]));
            }
        }
        Ok(None)
    }

    fn scan_rows(&mut self) -> Result<Option<usize>, Error> {
        let cfg = self.config;
        for (r, &row) in cfg.rows.iter().enumerate() {
            if self.gpio.read(row)?.is_low() {
                while self.gpio.read(row)?.is_low() {
                    core::hint::spin_loop();
                }
                return Ok(Some(r));
            }
        }
        Ok(None)
    }
}

impl<G: Gpio> KeySource for Keypad<'_, G> {
    fn read_key(&mut self) -> Result<Option<char>, Error> {
        self.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::board;
    use crate::testing::SimGpio;

    #[test]
    fn init_sets_rows_pulled_up_and_columns_idle_high() {
        let config = board::keypad_config();
        let gpio = SimGpio::new();
        Keypad::new(&config, gpio.clone()).init().unwrap();

        for row in config.rows {
            assert_eq!(gpio.direction(row), Some(Direction::Input));
            assert_eq!(gpio.level(row), Level::High);
        }
        for col in config.cols {
            assert_eq!(gpio.direction(col), Some(Direction::Output));
            assert_eq!(gpio.level(col), Level::High);
        }
    }

    #[test]
    fn idle_matrix_reads_no_key() {
        let config = board::keypad_config();
        let gpio = SimGpio::new();
        let mut keypad = Keypad::new(&config, gpio.clone());
        keypad.init().unwrap();

        assert_eq!(keypad.read(), Ok(None));
        for col in config.cols {
            assert_eq!(gpio.level(col), Level::High);
        }
    }
}
