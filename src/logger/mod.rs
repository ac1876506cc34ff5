//! Levelled text logging over any `ufmt` writer (normally the serial console)

use ufmt::{uDisplay, uWrite, uwrite};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Error => "[ERR] ",
            Level::Warn => "[WRN] ",
            Level::Info => "[INF] ",
            Level::Debug => "[DBG] ",
        }
    }
}

pub struct Logger<W> {
    out: W,
    max_level: Level,
}

impl<W: uWrite> Logger<W> {
    pub fn new(out: W, max_level: Level) -> Self {
        Self { out, max_level }
    }

    #[inline]
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.max_level
    }

    pub fn log(&mut self, level: Level, msg: &str) {
        if !self.enabled(level) {
            return;
        }
        // A failing sink has nowhere to report to
        uwrite!(self.out, "{}{}\r\n", level.tag(), msg).ok();
    }

    pub fn log_value<V: uDisplay + ?Sized>(&mut self, level: Level, msg: &str, value: &V) {
        if !self.enabled(level) {
            return;
        }
        uwrite!(self.out, "{}{}: {}\r\n", level.tag(), msg, value).ok();
    }

    pub fn info(&mut self, msg: &str) {
        self.log(Level::Info, msg);
    }

    pub fn sink(&self) -> &W {
        &self.out
    }
}
