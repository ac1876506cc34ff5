//! Simulated peripherals for running the drivers on the host.
//!
//! Every simulator is a cheap `Clone` handle onto shared state, so a test
//! keeps one copy for inspection while the driver under test owns another.

use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};

use crate::drivers::keypad::{KeypadConfig, COLS, LAYOUT, ROWS};
use crate::drivers::lcd::{LcdConfig, LcdMode, CGRAM_BASE, CMD_CLEAR, DDRAM_LINE_2};
use crate::error::Error;
use crate::hal::adc::{AdcConfig, AdcHw, Adjust};
use crate::hal::gpio::{Direction, Gpio, Level, PinId};
use crate::hal::timer::{Prescaler, TickCounter, TimerHw};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeldKey {
    row: usize,
    col: usize,
    reads_left: usize,
}

#[derive(Default)]
struct GpioState {
    directions: HashMap<PinId, Direction>,
    latched: HashMap<PinId, Level>,
    writes: Vec<(PinId, Level)>,
    keypad: Option<KeypadConfig>,
    held: Vec<HeldKey>,
}

impl GpioState {
    fn level(&self, pin: PinId) -> Level {
        self.latched.get(&pin).copied().unwrap_or(Level::Low)
    }

    // A held key pulls its row down while its column is driven low
    fn matrix_level(&mut self, pin: PinId) -> Option<Level> {
        let keypad = self.keypad?;
        let row = keypad.rows.iter().position(|&r| r == pin)?;
        let idx = self.held.iter().position(|key| {
            key.row == row && self.level(keypad.cols[key.col]).is_low()
        })?;
        let key = &mut self.held[idx];
        key.reads_left = key.reads_left.saturating_sub(1);
        if key.reads_left == 0 {
            self.held.remove(idx);
        }
        Some(Level::Low)
    }
}

/// Port pins with an optional 4x3 key matrix wired across some of them
#[derive(Clone, Default)]
pub struct SimGpio {
    state: Rc<RefCell<GpioState>>,
}

impl SimGpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_keypad(&self, config: KeypadConfig) {
        self.state.borrow_mut().keypad = Some(config);
    }

    /// Close the contact at (`row`, `col`). The key is released after its
    /// row has been read low `release_after` times.
    pub fn hold_key(&self, row: usize, col: usize, release_after: usize) {
        assert!(row < ROWS && col < COLS, "no such key");
        self.state.borrow_mut().held.push(HeldKey {
            row,
            col,
            reads_left: release_after.max(1),
        });
    }

    /// Press and release the key labelled `symbol`.
    pub fn press(&self, symbol: char) {
        for (row, line) in LAYOUT.iter().enumerate() {
            if let Some(col) = line.iter().position(|&s| s == symbol) {
                self.hold_key(row, col, 2);
                return;
            }
        }
        panic!("no key labelled {symbol:?}");
    }

    pub fn keys_held(&self) -> usize {
        self.state.borrow().held.len()
    }

    /// Drive an input pin from outside.
    pub fn direction(&self, pin: PinId) -> Option<Direction> {
        self.state.borrow().directions.get(&pin).copied()
    }

    pub fn level(&self, pin: PinId) -> Level {
        self.state.borrow().level(pin)
    }

    pub fn writes(&self) -> Vec<(PinId, Level)> {
        self.state.borrow().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.borrow_mut().writes.clear();
    }
}

impl Gpio for SimGpio {
    fn configure(&mut self, pin: PinId, direction: Direction) -> Result<(), Error> {
        pin.mask()?;
        let mut state = self.state.borrow_mut();
        state.directions.insert(pin, direction);
        if direction == Direction::Input {
            state.latched.insert(pin, Level::Low);
        }
        Ok(())
    }

    fn write(&mut self, pin: PinId, level: Level) -> Result<(), Error> {
        pin.mask()?;
        let mut state = self.state.borrow_mut();
        state.latched.insert(pin, level);
        state.writes.push((pin, level));
        Ok(())
    }

    fn read(&mut self, pin: PinId) -> Result<Level, Error> {
        pin.mask()?;
        let mut state = self.state.borrow_mut();
        if let Some(level) = state.matrix_level(pin) {
            return Ok(level);
        }
        Ok(state.level(pin))
    }
}

#[derive(Default)]
struct TimerState {
    counter: u16,
    reload: u16,
    running: bool,
    prescaler: Option<Prescaler>,
    overflow_interrupt: bool,
    overflows: u32,
}

/// Timer1 that overflows once per spin of the wait loop
#[derive(Clone, Default)]
pub struct SimTimer {
    state: Rc<RefCell<TimerState>>,
}

impl SimTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overflows(&self) -> u32 {
        self.state.borrow().overflows
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    pub fn overflow_interrupt_enabled(&self) -> bool {
        self.state.borrow().overflow_interrupt
    }

    pub fn last_prescaler(&self) -> Option<Prescaler> {
        self.state.borrow().prescaler
    }
}

impl TimerHw for SimTimer {
    fn configure(&mut self, initial_count: u16) {
        let mut state = self.state.borrow_mut();
        state.counter = initial_count;
        state.reload = initial_count;
        state.running = false;
    }

    fn start(&mut self, prescaler: Prescaler) {
        let mut state = self.state.borrow_mut();
        state.prescaler = Some(prescaler);
        state.running = prescaler != Prescaler::Stop;
    }

    fn stop(&mut self) {
        self.state.borrow_mut().running = false;
    }

    fn set_counter(&mut self, value: u16) {
        self.state.borrow_mut().counter = value;
    }

    fn counter(&self) -> u16 {
        self.state.borrow().counter
    }

    fn enable_overflow_interrupt(&mut self) {
        self.state.borrow_mut().overflow_interrupt = true;
    }

    fn disable_overflow_interrupt(&mut self) {
        self.state.borrow_mut().overflow_interrupt = false;
    }

    fn relax(&mut self, ticks: &TickCounter) {
        let reload = {
            let mut state = self.state.borrow_mut();
            assert!(
                state.running && state.overflow_interrupt,
                "waiting on a timer that can never overflow"
            );
            state.overflows += 1;
            // Counter ran up to the top and wrapped
            state.counter = 0;
            state.reload
        };
        ticks.on_overflow(self, reload);
    }
}

/// Register access recorded by [`SimAdc`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdcOp {
    Configure(AdcConfig),
    Select(u8),
    Start,
    Running(bool),
    ClearComplete,
    Interrupt(bool),
    /// The completion vector was entered, clearing ADIF
    Vectored,
}

#[derive(Default)]
struct AdcState {
    adjust: Option<Adjust>,
    code: u16,
    busy_polls: usize,
    latency: usize,
    pending: usize,
    complete: bool,
    interrupt: bool,
    vectored: bool,
    flag_taken: bool,
    ops: Vec<AdcOp>,
}

/// Converter returning a fixed raw code, packed per the configured alignment
#[derive(Clone, Default)]
pub struct SimAdc {
    state: Rc<RefCell<AdcState>>,
}

impl SimAdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_code(&self, code: u16) {
        self.state.borrow_mut().code = code & 0x3FF;
    }

    /// Pretend a conversion is already in progress for `polls` reads of ADSC.
    pub fn hold_busy(&self, polls: usize) {
        self.state.borrow_mut().busy_polls = polls;
    }

    /// Completion flag stays clear for `polls` reads after each start.
    pub fn set_latency(&self, polls: usize) {
        self.state.borrow_mut().latency = polls;
    }

    /// Behave like the part with global interrupts on: a conversion that
    /// finishes with the completion interrupt enabled enters the vector, and
    /// hardware clears ADIF on the way in.
    pub fn vector_on_completion(&self) {
        self.state.borrow_mut().vectored = true;
    }

    pub fn interrupt_enabled(&self) -> bool {
        self.state.borrow().interrupt
    }

    pub fn ops(&self) -> Vec<AdcOp> {
        self.state.borrow().ops.clone()
    }

    pub fn conversions(&self) -> usize {
        self.state
            .borrow()
            .ops
            .iter()
            .filter(|op| **op == AdcOp::Start)
            .count()
    }
}

impl AdcHw for SimAdc {
    fn configure(&mut self, config: &AdcConfig) {
        let mut state = self.state.borrow_mut();
        state.adjust = Some(config.adjust);
        state.interrupt = config.interrupt;
        state.ops.push(AdcOp::Configure(*config));
    }

    fn select_channel(&mut self, mux: u8) {
        self.state.borrow_mut().ops.push(AdcOp::Select(mux));
    }

    fn start_conversion(&mut self) {
        let mut state = self.state.borrow_mut();
        state.complete = false;
        state.flag_taken = false;
        state.pending = state.latency;
        state.ops.push(AdcOp::Start);
    }

    fn conversion_running(&self) -> bool {
        let mut state = self.state.borrow_mut();
        let running = state.busy_polls > 0;
        if running {
            state.busy_polls -= 1;
        }
        state.ops.push(AdcOp::Running(running));
        running
    }

    fn conversion_complete(&self) -> bool {
        let mut state = self.state.borrow_mut();
        assert!(
            !state.flag_taken,
            "ADIF polled after the completion vector cleared it"
        );
        if !state.complete {
            if state.pending > 0 {
                state.pending -= 1;
            } else if state.vectored && state.interrupt {
                state.flag_taken = true;
                state.ops.push(AdcOp::Vectored);
            } else {
                state.complete = true;
            }
        }
        state.complete
    }

    fn clear_complete(&mut self) {
        let mut state = self.state.borrow_mut();
        state.complete = false;
        state.ops.push(AdcOp::ClearComplete);
    }

    fn data(&mut self) -> (u8, u8) {
        let state = self.state.borrow();
        match state.adjust.unwrap_or(Adjust::Right) {
            Adjust::Right => (state.code as u8, (state.code >> 8) as u8),
            Adjust::Left => (((state.code & 0x03) << 6) as u8, (state.code >> 2) as u8),
        }
    }

    fn set_interrupt(&mut self, enabled: bool) {
        let mut state = self.state.borrow_mut();
        state.interrupt = enabled;
        state.ops.push(AdcOp::Interrupt(enabled));
    }
}

/// Delay that returns at once and remembers what was asked of it
#[derive(Clone, Default)]
pub struct SimDelay {
    calls: Rc<RefCell<Vec<u32>>>,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requested delays in microseconds
    pub fn calls(&self) -> Vec<u32> {
        self.calls.borrow().clone()
    }
}

impl DelayUs<u16> for SimDelay {
    fn delay_us(&mut self, us: u16) {
        self.calls.borrow_mut().push(us as u32);
    }
}

impl DelayMs<u16> for SimDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.calls.borrow_mut().push(ms as u32 * 1000);
    }
}

/// One transfer seen on the LCD bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdTransfer {
    Command(u8),
    Data(u8),
}

/// Rebuilds transfers from recorded pin writes by sampling RS and the data
/// lines on every falling edge of E.
pub struct LcdDecoder {
    config: LcdConfig,
}

impl LcdDecoder {
    pub fn new(config: LcdConfig) -> Self {
        Self { config }
    }

    pub fn decode(&self, writes: &[(PinId, Level)]) -> Vec<LcdTransfer> {
        let cfg = &self.config;
        let lines = cfg.mode.data_lines();
        let mut levels: HashMap<PinId, Level> = HashMap::new();
        let mut high_nibble: Option<(bool, u8)> = None;
        let mut out = Vec::new();

        for &(pin, level) in writes {
            let was_high = pin == cfg.en && levels.get(&pin) == Some(&Level::High);
            levels.insert(pin, level);
            if !(was_high && level == Level::Low) {
                continue;
            }

            let rs = levels.get(&cfg.rs) == Some(&Level::High);
            let mut bits = 0u8;
            for (i, line) in cfg.data[..lines].iter().enumerate() {
                if levels.get(line) == Some(&Level::High) {
                    bits |= 1 << i;
                }
            }
            let byte = match cfg.mode {
                LcdMode::EightBit => Some(bits),
                LcdMode::FourBit => match high_nibble.take() {
                    None => {
                        high_nibble = Some((rs, bits));
                        None
                    }
                    Some((first_rs, high)) => {
                        assert_eq!(first_rs, rs, "RS changed between nibbles");
                        Some((high << 4) | bits)
                    }
                },
            };
            if let Some(byte) = byte {
                out.push(if rs {
                    LcdTransfer::Data(byte)
                } else {
                    LcdTransfer::Command(byte)
                });
            }
        }
        out
    }
}

/// Display RAM model driven by decoded transfers
#[derive(Clone)]
pub struct LcdScreen {
    ddram: [[u8; 40]; 2],
    cgram: [u8; 64],
    address: u8,
    in_cgram: bool,
}

impl Default for LcdScreen {
    fn default() -> Self {
        Self {
            ddram: [[b' '; 40]; 2],
            cgram: [0; 64],
            address: 0,
            in_cgram: false,
        }
    }
}

impl LcdScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, transfers: &[LcdTransfer]) {
        for transfer in transfers {
            match *transfer {
                LcdTransfer::Command(CMD_CLEAR) => {
                    self.ddram = [[b' '; 40]; 2];
                    self.address = 0;
                    self.in_cgram = false;
                }
                LcdTransfer::Command(cmd) if cmd & 0x80 != 0 => {
                    let line = if cmd >= DDRAM_LINE_2 { 1 } else { 0 };
                    let col = cmd - if line == 1 { DDRAM_LINE_2 } else { 0x80 };
                    self.address = line * 40 + col;
                    self.in_cgram = false;
                }
                LcdTransfer::Command(cmd) if cmd & CGRAM_BASE != 0 => {
                    self.address = cmd & 0x3F;
                    self.in_cgram = true;
                }
                LcdTransfer::Command(_) => {}
                LcdTransfer::Data(byte) if self.in_cgram => {
                    self.cgram[self.address as usize % 64] = byte;
                    self.address = (self.address + 1) % 64;
                }
                LcdTransfer::Data(byte) => {
                    let line = (self.address / 40) as usize % 2;
                    let col = (self.address % 40) as usize;
                    self.ddram[line][col] = byte;
                    self.address = (self.address + 1) % 80;
                }
            }
        }
    }

    /// Visible 16 cells of `row` (1 or 2), custom glyph codes left as-is.
    pub fn row(&self, row: u8) -> String {
        let line = &self.ddram[(row as usize - 1) % 2][..16];
        line.iter().map(|&b| b as char).collect()
    }

    pub fn cell(&self, row: u8, col: u8) -> u8 {
        self.ddram[(row as usize - 1) % 2][col as usize]
    }

    pub fn glyph(&self, slot: u8) -> [u8; 8] {
        let mut out = [0; 8];
        let base = slot as usize * 8;
        out.copy_from_slice(&self.cgram[base..base + 8]);
        out
    }
}

/// Log sink collecting everything into a `String`
#[derive(Default)]
pub struct StringSink {
    buf: String,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> &str {
        &self.buf
    }
}

impl ufmt::uWrite for StringSink {
    type Error = Infallible;

    fn write_str(&mut self, s: &str) -> Result<(), Infallible> {
        self.buf.push_str(s);
        Ok(())
    }
}
