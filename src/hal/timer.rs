//! Timer1 tick service and the blocking wait built on it.
//!
//! The overflow interrupt only increments the [`TickCounter`] and reloads the
//! counter register. Mainline code resets the counter, starts the timer and
//! spins until enough ticks have been counted.

use portable_atomic::{AtomicU16, Ordering};

#[cfg(target_arch = "avr")]
use avr_device::atmega32a::TC1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Prescaler {
    Stop = 0,
    Direct = 1,
    Div8 = 2,
    Div64 = 3,
    Div256 = 4,
    Div1024 = 5,
}

/// Overflow count shared between the timer interrupt (writer) and the
/// mainline wait loop (reader).
pub struct TickCounter {
    ticks: AtomicU16,
}

impl TickCounter {
    pub const fn new() -> Self {
        Self {
            ticks: AtomicU16::new(0),
        }
    }

    #[inline]
    pub fn reset(&self) {
        self.ticks.store(0, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> u16 {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Overflow handler body. The counter register is not auto-reloading in
    /// normal mode, so it has to be rewritten on every overflow.
    #[inline]
    pub fn on_overflow<T: TimerHw + ?Sized>(&self, timer: &mut T, reload: u16) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        timer.set_counter(reload);
    }
}

impl Default for TickCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// 16-bit hardware counter running in normal (free-running) mode
pub trait TimerHw {
    /// Put the counter in normal mode, stopped, loaded with `initial_count`.
    fn configure(&mut self, initial_count: u16);
    fn start(&mut self, prescaler: Prescaler);
    fn stop(&mut self);
    fn set_counter(&mut self, value: u16);
    fn counter(&self) -> u16;
    fn enable_overflow_interrupt(&mut self);
    fn disable_overflow_interrupt(&mut self);

    /// Body of the wait spin loop.
    #[inline]
    fn relax(&mut self, _ticks: &TickCounter) {
        core::hint::spin_loop();
    }
}

/// Longest wait: the 16-bit tick count has to exceed the request.
pub const MAX_WAIT_TICKS: u16 = u16::MAX - 1;

/// Blocking waits measured in timer overflows
pub trait TickWait {
    fn wait(&mut self, ticks: u16);
}

pub struct DelayService<'a, T> {
    timer: T,
    ticks: &'a TickCounter,
    prescaler: Prescaler,
    reload: u16,
}

impl<'a, T: TimerHw> DelayService<'a, T> {
    pub fn new(timer: T, ticks: &'a TickCounter) -> Self {
        Self {
            timer,
            ticks,
            prescaler: Prescaler::Stop,
            reload: 0,
        }
    }

    /// Arm the timer with its overflow interrupt enabled. Counting does not
    /// begin until [`start`](Self::start) or [`wait`](Self::wait).
    pub fn configure(&mut self, prescaler: Prescaler, initial_count: u16) {
        self.prescaler = prescaler;
        self.reload = initial_count;
        self.timer.configure(initial_count);
        self.timer.enable_overflow_interrupt();
    }

    pub fn start(&mut self) {
        self.timer.start(self.prescaler);
    }

    pub fn stop(&mut self) {
        self.timer.stop();
    }

    /// Block until more than `n_ticks` overflows have been counted. Not
    /// cancellable. Requests above [`MAX_WAIT_TICKS`] wait that long.
    pub fn wait(&mut self, n_ticks: u16) {
        let n_ticks = n_ticks.min(MAX_WAIT_TICKS);
        self.ticks.reset();
        self.timer.set_counter(self.reload);
        self.start();
        while self.ticks.count() <= n_ticks {
            self.timer.relax(self.ticks);
        }
        self.stop();
    }
}

impl<T: TimerHw> TickWait for DelayService<'_, T> {
    fn wait(&mut self, ticks: u16) {
        DelayService::wait(self, ticks)
    }
}

/// Timer1 of the ATmega32
#[cfg(target_arch = "avr")]
#[derive(Clone, Copy, Default)]
pub struct Timer1 {
    _private: (),
}

#[cfg(target_arch = "avr")]
impl Timer1 {
    const TOIE1: u8 = 1 << 2;
    const CS_MASK: u8 = 0x07;

    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "avr")]
impl TimerHw for Timer1 {
    fn configure(&mut self, initial_count: u16) {
        unsafe {
            let p = TC1::ptr();
            (*p).tccr1a.write(|w| w.bits(0));
            (*p).tccr1b.write(|w| w.bits(0));
        }
        self.set_counter(initial_count);
    }

    fn start(&mut self, prescaler: Prescaler) {
        unsafe {
            (*TC1::ptr()).tccr1b.modify(|r, w| {
                w.bits((r.bits() & !Self::CS_MASK) | (prescaler as u8 & Self::CS_MASK))
            });
        }
    }

    fn stop(&mut self) {
        unsafe {
            (*TC1::ptr()).tccr1b.modify(|r, w| w.bits(r.bits() & !Self::CS_MASK));
        }
    }

    fn set_counter(&mut self, value: u16) {
        // 16-bit access goes through the shared TEMP register
        avr_device::interrupt::free(|_| unsafe {
            (*TC1::ptr()).tcnt1.write(|w| w.bits(value));
        });
    }

    fn counter(&self) -> u16 {
        avr_device::interrupt::free(|_| unsafe { (*TC1::ptr()).tcnt1.read().bits() })
    }

    fn enable_overflow_interrupt(&mut self) {
        unsafe {
            (*TC1::ptr()).timsk.modify(|r, w| w.bits(r.bits() | Self::TOIE1));
        }
    }

    fn disable_overflow_interrupt(&mut self) {
        unsafe {
            (*TC1::ptr()).timsk.modify(|r, w| w.bits(r.bits() & !Self::TOIE1));
        }
    }
}

/// Cycle-counted busy-wait for the sub-tick delays of the LCD bus
#[cfg(target_arch = "avr")]
#[derive(Clone, Copy, Default)]
pub struct CycleDelay {
    _private: (),
}

#[cfg(target_arch = "avr")]
impl CycleDelay {
    const CYCLES_PER_US: u32 = crate::config::CPU_FREQ_HZ / 1_000_000;

    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "avr")]
impl embedded_hal::blocking::delay::DelayUs<u16> for CycleDelay {
    fn delay_us(&mut self, us: u16) {
        avr_device::asm::delay_cycles(us as u32 * Self::CYCLES_PER_US);
    }
}

#[cfg(target_arch = "avr")]
impl embedded_hal::blocking::delay::DelayMs<u16> for CycleDelay {
    fn delay_ms(&mut self, ms: u16) {
        use embedded_hal::blocking::delay::DelayUs;
        for _ in 0..ms {
            self.delay_us(1000);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::SimTimer;

    #[test]
    fn wait_counts_past_the_requested_ticks() {
        let ticks = TickCounter::new();
        let timer = SimTimer::new();
        let mut delay = DelayService::new(timer.clone(), &ticks);
        delay.configure(Prescaler::Div1024, 61448);

        delay.wait(2);

        assert_eq!(ticks.count(), 3);
        assert_eq!(timer.overflows(), 3);
        assert!(!timer.is_running());
        assert!(timer.overflow_interrupt_enabled());
    }

    #[test]
    fn every_overflow_reloads_the_counter() {
        let ticks = TickCounter::new();
        let timer = SimTimer::new();
        let mut delay = DelayService::new(timer.clone(), &ticks);
        delay.configure(Prescaler::Div1024, 61448);

        delay.wait(0);

        assert_eq!(timer.counter(), 61448);
        assert_eq!(timer.last_prescaler(), Some(Prescaler::Div1024));
    }

    #[test]
    fn longest_request_still_returns() {
        let ticks = TickCounter::new();
        let timer = SimTimer::new();
        let mut delay = DelayService::new(timer.clone(), &ticks);
        delay.configure(Prescaler::Div1024, 61448);

        delay.wait(u16::MAX);

        assert_eq!(ticks.count(), u16::MAX);
        assert!(!timer.is_running());
    }

    #[test]
    fn counter_restarts_from_zero_for_each_wait() {
        let ticks = TickCounter::new();
        let timer = SimTimer::new();
        let mut delay = DelayService::new(timer.clone(), &ticks);
        delay.configure(Prescaler::Div1024, 61448);

        delay.wait(4);
        delay.wait(1);

        assert_eq!(ticks.count(), 2);
        assert_eq!(timer.overflows(), 7);
    }
}
