//! Welcome -> SetTemp -> Working state machine.
//!
//! The controller owns every peripheral behind the driver traits and is the
//! only place that changes [`State`] or the setpoint. Driver failures are
//! logged and the current step is abandoned; the next `step()` retries.

use heapless::String;
use ufmt::{uDisplay, uWrite, uwrite, Formatter};

use crate::config::{
    BAR_ORIGIN, DWELL_LONG_TICKS, DWELL_SHORT_TICKS, TEMP_DEFAULT, TEMP_MAX, TEMP_MIN,
};
use crate::drivers::{Alarm, Display, KeySource, SpecialChar, TemperatureSensor};
use crate::error::Error;
use crate::hal::timer::TickWait;
use crate::logger::{Level, Logger};

const BAR_MARK: &str = "|";
const BLANK: &str = " ";

/// Keypad symbols with a meaning to the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Increment,
    Decrement,
    Set,
    Adjust,
    Reset,
}

impl Command {
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '1' => Some(Command::Increment),
            '2' => Some(Command::Decrement),
            '3' => Some(Command::Set),
            '4' => Some(Command::Adjust),
            '5' => Some(Command::Reset),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Welcome,
    SetTemp,
    Working,
}

impl uDisplay for State {
    fn fmt<W>(&self, f: &mut Formatter<'_, W>) -> Result<(), W::Error>
    where
        W: uWrite + ?Sized,
    {
        f.write_str(match self {
            State::Welcome => "welcome",
            State::SetTemp => "set-temp",
            State::Working => "working",
        })
    }
}

pub struct Controller<D, K, A, S, T, W> {
    display: D,
    keys: K,
    alarm: A,
    sensor: S,
    delay: T,
    log: Logger<W>,
    state: State,
    needs_entry: bool,
    program_temp: u8,
    current_temp: f32,
}

impl<D, K, A, S, T, W> Controller<D, K, A, S, T, W>
where
    D: Display,
    K: KeySource,
    A: Alarm,
    S: TemperatureSensor,
    T: TickWait,
    W: uWrite,
{
    pub fn new(display: D, keys: K, alarm: A, sensor: S, delay: T, log: Logger<W>) -> Self {
        Self {
            display,
            keys,
            alarm,
            sensor,
            delay,
            log,
            state: State::Welcome,
            needs_entry: true,
            program_temp: TEMP_DEFAULT,
            current_temp: TEMP_DEFAULT as f32,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn program_temperature(&self) -> u8 {
        self.program_temp
    }

    pub fn current_temperature(&self) -> f32 {
        self.current_temp
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn alarm(&self) -> &A {
        &self.alarm
    }

    pub fn logger(&self) -> &Logger<W> {
        &self.log
    }

    pub fn run(&mut self) -> ! {
        loop {
            self.step();
        }
    }

    /// One poll of the current state, preceded by its entry rendering when
    /// the state has just been entered.
    pub fn step(&mut self) {
        let result = match self.state {
            State::Welcome => self.welcome(),
            State::SetTemp => self.set_temp(),
            State::Working => self.working(),
        };
        if let Err(err) = result {
            self.log.log_value(Level::Error, "driver", &err);
        }
    }

    fn transition(&mut self, next: State) {
        self.state = next;
        self.needs_entry = true;
        self.log.log_value(Level::Info, "state", &next);
    }

    fn welcome(&mut self) -> Result<(), Error> {
        self.show_at(1, 0, "Welcome")?;
        self.delay.wait(DWELL_LONG_TICKS);

        self.show_at(1, 0, "default Temp is")?;
        self.write_at(2, 0, "20")?;
        self.delay.wait(DWELL_LONG_TICKS);

        self.program_temp = TEMP_DEFAULT;
        self.transition(State::SetTemp);
        Ok(())
    }

    fn set_temp(&mut self) -> Result<(), Error> {
        if self.needs_entry {
            self.show_at(1, 0, "Set Initial Temp")?;
            self.delay.wait(DWELL_SHORT_TICKS);

            self.show_at(1, 0, "Min=18")?;
            self.write_at(1, 10, "Max=35")?;
            for degree in BAR_ORIGIN..=self.program_temp {
                self.write_at(2, degree - BAR_ORIGIN, BAR_MARK)?;
            }
            self.needs_entry = false;
        }

        let text = render_number(self.program_temp, 0);
        self.write_at(1, 7, &text)?;

        let Some(command) = self.keys.read_key()?.and_then(Command::from_symbol) else {
            return Ok(());
        };
        match command {
            Command::Increment if self.program_temp < TEMP_MAX => {
                self.program_temp += 1;
                self.write_at(2, self.program_temp - BAR_ORIGIN, BAR_MARK)?;
                self.log.log_value(Level::Debug, "setpoint", &self.program_temp);
            }
            Command::Decrement if self.program_temp > TEMP_MIN => {
                self.program_temp -= 1;
                // Blank the mark of the degree just left
                self.write_at(2, self.program_temp + 1 - BAR_ORIGIN, BLANK)?;
                self.log.log_value(Level::Debug, "setpoint", &self.program_temp);
            }
            Command::Set => {
                self.log.log_value(Level::Info, "setpoint", &self.program_temp);
                self.transition(State::Working);
            }
            _ => {}
        }
        Ok(())
    }

    fn working(&mut self) -> Result<(), Error> {
        if self.needs_entry {
            self.show_at(1, 0, "Current Temp = ")?;
            self.needs_entry = false;
        }

        self.current_temp = self.sensor.read_celsius()?;
        // Saturating cast: readings below zero show as 0
        let text = render_number(self.current_temp as u8, 3);
        self.write_at(2, 1, &text)?;

        let was_active = self.alarm.is_active();
        if self.current_temp > self.program_temp as f32 {
            self.display.write_special_char(SpecialChar::Bell)?;
            self.alarm.start()?;
            if !was_active {
                self.log.log_value(Level::Warn, "alarm on", &(self.current_temp as u8));
            }
        } else {
            self.write_at(2, 0, BLANK)?;
            self.alarm.stop()?;
            if was_active {
                self.log.log_value(Level::Info, "alarm off", &(self.current_temp as u8));
            }
        }

        let Some(symbol) = self.keys.read_key()? else {
            return Ok(());
        };
        match Command::from_symbol(symbol) {
            Some(Command::Reset) => {
                self.alarm.stop()?;
                self.show_at(1, 0, "Temp value is")?;
                self.write_at(2, 0, "resettled to 20")?;
                self.delay.wait(DWELL_LONG_TICKS);
                self.program_temp = TEMP_DEFAULT;
                self.transition(State::SetTemp);
            }
            Some(Command::Adjust) => {
                self.alarm.stop()?;
                self.transition(State::SetTemp);
            }
            _ => {
                self.show_at(1, 0, "the operation is")?;
                self.write_at(2, 0, "not allowed")?;
                self.delay.wait(DWELL_LONG_TICKS);
                self.show_at(1, 0, "Current Temp = ")?;
            }
        }
        Ok(())
    }

    /// Clear the screen, then write `text` at (`row`, `col`).
    fn show_at(&mut self, row: u8, col: u8, text: &str) -> Result<(), Error> {
        self.display.clear()?;
        self.write_at(row, col, text)
    }

    fn write_at(&mut self, row: u8, col: u8, text: &str) -> Result<(), Error> {
        self.display.set_cursor(row, col)?;
        self.display.write_string(text)
    }
}

/// Decimal text of `value`, right-padded with blanks to `width` cells.
fn render_number(value: u8, width: usize) -> String<4> {
    let mut text = String::new();
    // Three digits always fit
    uwrite!(text, "{}", value).ok();
    while text.len() < width {
        if text.push(' ').is_err() {
            break;
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_five_command_keys_are_recognised() {
        assert_eq!(Command::from_symbol('1'), Some(Command::Increment));
        assert_eq!(Command::from_symbol('2'), Some(Command::Decrement));
        assert_eq!(Command::from_symbol('3'), Some(Command::Set));
        assert_eq!(Command::from_symbol('4'), Some(Command::Adjust));
        assert_eq!(Command::from_symbol('5'), Some(Command::Reset));
        for other in ['0', '6', '9', '*', '#'] {
            assert_eq!(Command::from_symbol(other), None);
        }
    }

    use core::cell::Cell;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use crate::testing::StringSink;

    /// Accepts `budget` more calls once one is set, then fails
    #[derive(Default)]
    struct Screen {
        budget: Cell<Option<u32>>,
    }

    impl Screen {
        fn check(&self) -> Result<(), Error> {
            match self.budget.get() {
                Some(0) => Err(Error::NotInitialized),
                Some(n) => {
                    self.budget.set(Some(n - 1));
                    Ok(())
                }
                None => Ok(()),
            }
        }
    }

    impl Display for Screen {
        fn clear(&mut self) -> Result<(), Error> {
            self.check()
        }

        fn set_cursor(&mut self, _row: u8, _col: u8) -> Result<(), Error> {
            self.check()
        }

        fn write_string(&mut self, _text: &str) -> Result<(), Error> {
            self.check()
        }

        fn write_special_char(&mut self, _glyph: SpecialChar) -> Result<(), Error> {
            self.check()
        }
    }

    #[derive(Clone, Default)]
    struct Keys(Rc<RefCell<VecDeque<char>>>);

    impl KeySource for Keys {
        fn read_key(&mut self) -> Result<Option<char>, Error> {
            Ok(self.0.borrow_mut().pop_front())
        }
    }

    #[derive(Default)]
    struct Bell(bool);

    impl Alarm for Bell {
        fn start(&mut self) -> Result<(), Error> {
            self.0 = true;
            Ok(())
        }

        fn stop(&mut self) -> Result<(), Error> {
            self.0 = false;
            Ok(())
        }

        fn is_active(&self) -> bool {
            self.0
        }
    }

    struct Room(f32);

    impl TemperatureSensor for Room {
        fn read_celsius(&mut self) -> Result<f32, Error> {
            Ok(self.0)
        }
    }

    struct NoWait;

    impl TickWait for NoWait {
        fn wait(&mut self, _ticks: u16) {}
    }

    #[test]
    fn failed_reset_screen_leaves_the_working_setpoint_alone() {
        let keys = Keys::default();
        let mut ctl = Controller::new(
            Screen::default(),
            keys.clone(),
            Bell::default(),
            Room(30.0),
            NoWait,
            Logger::new(StringSink::new(), Level::Info),
        );
        ctl.step();
        ctl.step();
        keys.0.borrow_mut().extend(['1', '1', '3']);
        for _ in 0..3 {
            ctl.step();
        }
        ctl.step();
        assert_eq!(ctl.state(), State::Working);
        assert_eq!(ctl.program_temperature(), 22);
        assert!(ctl.alarm().is_active());

        // the reading and the bell still draw, the reset message does not
        ctl.display().budget.set(Some(3));
        keys.0.borrow_mut().push_back('5');
        ctl.step();

        assert_eq!(ctl.state(), State::Working);
        assert_eq!(ctl.program_temperature(), 22);
        assert!(!ctl.alarm().is_active());
        assert!(ctl.logger().sink().contents().contains("[ERR] driver: not initialized"));
    }

    #[test]
    fn numbers_are_padded_to_the_requested_width() {
        assert_eq!(render_number(20, 0).as_str(), "20");
        assert_eq!(render_number(7, 3).as_str(), "7  ");
        assert_eq!(render_number(125, 3).as_str(), "125");
        assert_eq!(render_number(0, 0).as_str(), "0");
    }
}
