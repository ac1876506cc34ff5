//! HD44780-style character LCD over 4 or 8 parallel data lines.
//!
//! Every logical operation becomes a sequence of GPIO writes: RS/RW set up
//! with E low, data presented, then E pulsed high and low. In 4-bit mode the
//! high nibble goes first. Both edges of E are followed by a settle delay.
//! Commands settle once more at the end and `clear` once more after that.

use embedded_hal::blocking::delay::DelayUs;

use crate::config::LCD_SETTLE_US;
use crate::error::{Error, Fault};
use crate::hal::gpio::{Direction, Gpio, Level, PinId};

pub const CGRAM_BASE: u8 = 0x40;
pub const DDRAM_LINE_1: u8 = 0x80;
pub const DDRAM_LINE_2: u8 = 0xC0;
pub const DDRAM_LINE_LEN: u8 = 40;

pub const CMD_CLEAR: u8 = 0x01;
pub const CMD_HOME: u8 = 0x02;
pub const CMD_ENTRY_INCREMENT: u8 = 0x06;
pub const CMD_DISPLAY_ON_CURSOR_OFF: u8 = 0x0C;
pub const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
pub const CMD_FUNCTION_8BIT_2LINE: u8 = 0x38;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdMode {
    FourBit,
    EightBit,
}

impl LcdMode {
    /// Bus width in bits
    pub fn from_raw(bits: u8) -> Result<Self, Error> {
        match bits {
            4 => Ok(LcdMode::FourBit),
            8 => Ok(LcdMode::EightBit),
            _ => Err(Error::InvalidConfiguration(Fault::Mode)),
        }
    }

    pub fn data_lines(self) -> usize {
        match self {
            LcdMode::FourBit => 4,
            LcdMode::EightBit => 8,
        }
    }
}

/// Pin map of the display. In 4-bit mode `data[0..4]` are D4..D7 and the
/// rest is ignored; in 8-bit mode `data[i]` is Di.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LcdConfig {
    pub mode: LcdMode,
    pub data: [PinId; 8],
    pub rs: PinId,
    pub rw: PinId,
    pub en: PinId,
}

/// Custom glyphs kept in CGRAM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialChar {
    Bell,
}

impl SpecialChar {
    pub fn slot(self) -> u8 {
        match self {
            SpecialChar::Bell => 3,
        }
    }

    pub fn bitmap(self) -> &'static [u8; 8] {
        match self {
            SpecialChar::Bell => &[0x04, 0x0E, 0x0E, 0x0E, 0x1F, 0x00, 0x04, 0x00],
        }
    }
}

/// DDRAM address for a 1-based row and 0-based column
pub fn ddram_address(row: u8, col: u8) -> Result<u8, Error> {
    if col >= DDRAM_LINE_LEN {
        return Err(Error::InvalidConfiguration(Fault::Column));
    }
    match row {
        1 => Ok(DDRAM_LINE_1 + col),
        2 => Ok(DDRAM_LINE_2 + col),
        _ => Err(Error::InvalidConfiguration(Fault::Row)),
    }
}

/// What the application needs from a character display
pub trait Display {
    fn clear(&mut self) -> Result<(), Error>;
    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), Error>;
    fn write_string(&mut self, text: &str) -> Result<(), Error>;
    fn write_special_char(&mut self, glyph: SpecialChar) -> Result<(), Error>;
}

pub struct Lcd<'a, G, D> {
    config: &'a LcdConfig,
    gpio: G,
    delay: D,
    initialized: bool,
}

impl<'a, G, D> Lcd<'a, G, D>
where
    G: Gpio,
    D: DelayUs<u16>,
{
    pub fn new(config: &'a LcdConfig, gpio: G, delay: D) -> Self {
        Self {
            config,
            gpio,
            delay,
            initialized: false,
        }
    }

    /// Configure the bus pins and run the bring-up sequence.
    pub fn init(&mut self) -> Result<(), Error> {
        let cfg = self.config;
        self.gpio.configure(cfg.rs, Direction::Output)?;
        self.gpio.configure(cfg.rw, Direction::Output)?;
        self.gpio.configure(cfg.en, Direction::Output)?;
        for pin in &cfg.data[..cfg.mode.data_lines()] {
            self.gpio.configure(*pin, Direction::Output)?;
        }

        let sequence: &[u8] = match cfg.mode {
            // HOME first switches a controller that powered up in 8-bit mode
            LcdMode::FourBit => &[
                CMD_HOME,
                CMD_FUNCTION_4BIT_2LINE,
                CMD_DISPLAY_ON_CURSOR_OFF,
                CMD_ENTRY_INCREMENT,
                CMD_CLEAR,
            ],
            LcdMode::EightBit => &[
                CMD_FUNCTION_8BIT_2LINE,
                CMD_DISPLAY_ON_CURSOR_OFF,
                CMD_ENTRY_INCREMENT,
                CMD_CLEAR,
            ],
        };
        for &cmd in sequence {
            self.send_command(cmd)?;
        }
        self.initialized = true;
        Ok(())
    }

    pub fn command(&mut self, cmd: u8) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.send_command(cmd)
    }

    pub fn data(&mut self, byte: u8) -> Result<(), Error> {
        self.ensure_initialized()?;
        self.send(byte, Level::High)
    }

    pub fn clear(&mut self) -> Result<(), Error> {
        self.command(CMD_CLEAR)?;
        // Clearing takes longer than an ordinary instruction
        self.settle();
        Ok(())
    }

    pub fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), Error> {
        let address = ddram_address(row, col)?;
        self.command(address)
    }

    /// Write characters up to the end of `text` or its first NUL.
    pub fn write_string(&mut self, text: &str) -> Result<(), Error> {
        self.ensure_initialized()?;
        for byte in text.bytes().take_while(|&b| b != 0) {
            self.send(byte, Level::High)?;
        }
        Ok(())
    }

    /// Program an 8-row glyph into CGRAM slot `slot` (0..=7).
    pub fn define_glyph(&mut self, slot: u8, bitmap: &[u8; 8]) -> Result<(), Error> {
        if slot > 7 {
            return Err(Error::InvalidConfiguration(Fault::Slot));
        }
        self.command(CGRAM_BASE + slot * 8)?;
        for &row in bitmap {
            self.data(row)?;
        }
        Ok(())
    }

    /// Program `glyph` and show it in the first cell of line 2.
    pub fn write_special_char(&mut self, glyph: SpecialChar) -> Result<(), Error> {
        self.define_glyph(glyph.slot(), glyph.bitmap())?;
        self.command(DDRAM_LINE_2)?;
        self.data(glyph.slot())
    }

    fn ensure_initialized(&self) -> Result<(), Error> {
        if self.initialized {
            Ok(())
        } else {
            Err(Error::NotInitialized)
        }
    }

    fn send_command(&mut self, cmd: u8) -> Result<(), Error> {
        self.send(cmd, Level::Low)?;
        self.settle();
        Ok(())
    }

    fn send(&mut self, byte: u8, rs: Level) -> Result<(), Error> {
        let cfg = self.config;
        self.gpio.write(cfg.en, Level::Low)?;
        self.gpio.write(cfg.rs, rs)?;
        self.gpio.write(cfg.rw, Level::Low)?;
        match cfg.mode {
            LcdMode::FourBit => {
                self.present(byte >> 4, 4)?;
                self.pulse_enable()?;
                self.present(byte & 0x0F, 4)?;
                self.pulse_enable()?;
            }
            LcdMode::EightBit => {
                self.present(byte, 8)?;
                self.pulse_enable()?;
            }
        }
        Ok(())
    }

    fn present(&mut self, bits: u8, lines: usize) -> Result<(), Error> {
        let cfg = self.config;
        for (i, pin) in cfg.data[..lines].iter().enumerate() {
            self.gpio.write(*pin, Level::from(bits & (1 << i) != 0))?;
        }
        Ok(())
    }

    fn pulse_enable(&mut self) -> Result<(), Error> {
        let en = self.config.en;
        self.gpio.write(en, Level::High)?;
        self.settle();
        self.gpio.write(en, Level::Low)?;
        self.settle();
        Ok(())
    }

    #[inline]
    fn settle(&mut self) {
        self.delay.delay_us(LCD_SETTLE_US);
    }
}

impl<G, D> Display for Lcd<'_, G, D>
where
    G: Gpio,
    D: DelayUs<u16>,
{
    fn clear(&mut self) -> Result<(), Error> {
        Lcd::clear(self)
    }

    fn set_cursor(&mut self, row: u8, col: u8) -> Result<(), Error> {
        Lcd::set_cursor(self, row, col)
    }

    fn write_string(&mut self, text: &str) -> Result<(), Error> {
        Lcd::write_string(self, text)
    }

    fn write_special_char(&mut self, glyph: SpecialChar) -> Result<(), Error> {
        Lcd::write_special_char(self, glyph)
    }
}

impl<G, D> ufmt::uWrite for Lcd<'_, G, D>
where
    G: Gpio,
    D: DelayUs<u16>,
{
    type Error = Error;

    fn write_str(&mut self, s: &str) -> Result<(), Error> {
        self.write_string(s)
    }
}
