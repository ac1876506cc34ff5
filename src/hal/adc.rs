//! ADC sampling engine: blocking conversions and interrupt-completed ones.
//!
//! Only one interrupt-driven conversion may be outstanding. The request and
//! its result pass through an [`AdcCompletion`] slot shared with the ADC
//! interrupt handler, guarded by a flag that rejects a second request with
//! [`Error::Busy`].

use core::cell::Cell;

use critical_section::Mutex;
use portable_atomic::{AtomicBool, Ordering};

#[cfg(target_arch = "avr")]
use avr_device::atmega32a::ADC;

use crate::error::{Error, Fault};
use crate::hal::gpio::{Direction, Gpio, PinId, Port};

/// The only port wired to the analog multiplexer
pub const ADC_PORT: Port = Port::A;

/// Width of the converter
pub const MAX_RESOLUTION_BITS: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Reference {
    Aref = 0,     // External AREF, internal reference off
    Avcc = 1,     // AVCC with external cap at AREF
    Internal = 3, // Internal 2.56V
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdcPrescaler {
    Div2 = 0,
    Div4 = 2,
    Div8 = 3,
    Div16 = 4,
    Div32 = 5,
    Div64 = 6,
    Div128 = 7,
}

/// Alignment of the 10-bit result inside ADCH:ADCL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjust {
    Right,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcConfig {
    pub reference: Reference,
    pub prescaler: AdcPrescaler,
    pub adjust: Adjust,
    pub interrupt: bool,
    pub vref_volts: f32,
    pub resolution_bits: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcChannel {
    pub port: Port,
    pub pin: u8,
}

impl AdcChannel {
    pub const fn new(port: Port, pin: u8) -> Self {
        Self { port, pin }
    }

    /// Multiplexer input for this channel
    pub fn mux(&self) -> Result<u8, Error> {
        if self.port != ADC_PORT {
            return Err(Error::InvalidConfiguration(Fault::Port));
        }
        if self.pin > 7 {
            return Err(Error::InvalidConfiguration(Fault::Pin));
        }
        Ok(self.pin)
    }

    fn pin_id(&self) -> PinId {
        PinId::new(self.port, self.pin)
    }
}

/// Register-level contract of the converter
pub trait AdcHw {
    fn configure(&mut self, config: &AdcConfig);
    fn select_channel(&mut self, mux: u8);
    fn start_conversion(&mut self);
    /// ADSC still set
    fn conversion_running(&self) -> bool;
    /// ADIF set
    fn conversion_complete(&self) -> bool;
    fn clear_complete(&mut self);
    /// (ADCL, ADCH), low byte read first
    fn data(&mut self) -> (u8, u8);
    fn set_interrupt(&mut self, enabled: bool);
}

/// Physical value of one LSB. `resolution_bits` must lie in
/// `1..=MAX_RESOLUTION_BITS`.
pub fn quantisation_step(vref_volts: f32, resolution_bits: u8) -> f32 {
    let full_scale = (1u32 << resolution_bits) - 1;
    vref_volts / full_scale as f32
}

/// Rebuild the 10-bit code from the two data registers
pub fn raw_code(low: u8, high: u8, adjust: Adjust) -> u16 {
    match adjust {
        Adjust::Right => (low as u16) | ((high as u16) << 8),
        Adjust::Left => ((low >> 6) as u16) | ((high as u16) << 2),
    }
}

#[derive(Clone, Copy)]
struct Request {
    stage: Option<fn()>,
    on_complete: fn(f32),
    adjust: Adjust,
    step: f32,
    // Completion interrupt enable as configured at init
    interrupt: bool,
}

/// Hand-off cell between `read_async` (mainline) and the ADC interrupt
pub struct AdcCompletion {
    outstanding: AtomicBool,
    request: Mutex<Cell<Option<Request>>>,
    result: Mutex<Cell<Option<f32>>>,
}

impl AdcCompletion {
    pub const fn new() -> Self {
        Self {
            outstanding: AtomicBool::new(false),
            request: Mutex::new(Cell::new(None)),
            result: Mutex::new(Cell::new(None)),
        }
    }

    pub fn is_outstanding(&self) -> bool {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn arm(&self, request: Request) -> Result<(), Error> {
        self.outstanding
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::Busy)?;
        critical_section::with(|cs| {
            self.result.borrow(cs).set(None);
            self.request.borrow(cs).set(Some(request));
        });
        Ok(())
    }

    /// ADC conversion-complete interrupt body. The registered callbacks are
    /// cleared before they run, so a later unrelated conversion never sees
    /// them. The completion interrupt is left as the configuration had it.
    pub fn on_interrupt<H: AdcHw + ?Sized>(&self, hw: &mut H) {
        hw.set_interrupt(false);
        let request = critical_section::with(|cs| self.request.borrow(cs).take());
        if let Some(request) = request {
            hw.set_interrupt(request.interrupt);
            if let Some(stage) = request.stage {
                stage();
            }
            let (low, high) = hw.data();
            let value = raw_code(low, high, request.adjust) as f32 * request.step;
            (request.on_complete)(value);
            critical_section::with(|cs| self.result.borrow(cs).set(Some(value)));
        }
        self.outstanding.store(false, Ordering::SeqCst);
    }

    fn result(&self) -> Option<f32> {
        critical_section::with(|cs| self.result.borrow(cs).get())
    }
}

impl Default for AdcCompletion {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle on an interrupt-driven conversion
pub struct Pending<'a> {
    completion: &'a AdcCompletion,
}

impl Pending<'_> {
    pub fn poll(&self) -> nb::Result<f32, Error> {
        if self.completion.is_outstanding() {
            return Err(nb::Error::WouldBlock);
        }
        // The interrupt ran without a request: nothing will ever arrive
        self.completion
            .result()
            .ok_or(nb::Error::Other(Error::NotInitialized))
    }

    pub fn wait(&self) -> Result<f32, Error> {
        nb::block!(self.poll())
    }
}

pub struct Adc<'a, H, G> {
    hw: H,
    gpio: G,
    completion: &'a AdcCompletion,
    config: Option<AdcConfig>,
    step: f32,
}

impl<'a, H: AdcHw, G: Gpio> Adc<'a, H, G> {
    pub fn new(hw: H, gpio: G, completion: &'a AdcCompletion) -> Self {
        Self {
            hw,
            gpio,
            completion,
            config: None,
            step: 0.0,
        }
    }

    /// Program reference, prescaler, alignment and interrupt enable once.
    pub fn init(&mut self, config: Option<&AdcConfig>) -> Result<(), Error> {
        let config = config.ok_or(Error::NullArgument)?;
        if !(1..=MAX_RESOLUTION_BITS).contains(&config.resolution_bits) {
            return Err(Error::InvalidConfiguration(Fault::Resolution));
        }
        self.hw.configure(config);
        self.step = quantisation_step(config.vref_volts, config.resolution_bits);
        self.config = Some(*config);
        Ok(())
    }

    pub fn channel_init(&mut self, channel: &AdcChannel) -> Result<(), Error> {
        channel.mux()?;
        self.gpio.configure(channel.pin_id(), Direction::Input)
    }

    /// Convert one channel and return the physical value, busy-waiting on
    /// the completion flag.
    ///
    /// With the completion interrupt configured on, it is masked for the
    /// duration of the conversion: entering the vector clears ADIF, which
    /// would leave this loop waiting forever.
    pub fn read_blocking(&mut self, channel: &AdcChannel) -> Result<f32, Error> {
        let config = self.config.ok_or(Error::NotInitialized)?;
        let mux = channel.mux()?;

        // A running conversion would be corrupted by a mux change, and an
        // outstanding interrupt-driven one still owns the result registers
        while self.completion.is_outstanding() || self.hw.conversion_running() {
            core::hint::spin_loop();
        }
        if config.interrupt {
            self.hw.set_interrupt(false);
        }
        self.hw.select_channel(mux);
        self.hw.start_conversion();
        while !self.hw.conversion_complete() {
            core::hint::spin_loop();
        }
        self.hw.clear_complete();

        let (low, high) = self.hw.data();
        if config.interrupt {
            self.hw.set_interrupt(true);
        }
        Ok(raw_code(low, high, config.adjust) as f32 * self.step)
    }

    /// Start a conversion completed by the ADC interrupt and return at once.
    ///
    /// `stage` runs first inside the interrupt, then `on_complete` receives
    /// the physical value.
    pub fn read_async(
        &mut self,
        channel: &AdcChannel,
        stage: Option<fn()>,
        on_complete: fn(f32),
    ) -> Result<Pending<'a>, Error> {
        let config = self.config.ok_or(Error::NotInitialized)?;
        let mux = channel.mux()?;

        self.completion.arm(Request {
            stage,
            on_complete,
            adjust: config.adjust,
            step: self.step,
            interrupt: config.interrupt,
        })?;

        while self.hw.conversion_running() {
            core::hint::spin_loop();
        }
        self.hw.select_channel(mux);
        self.hw.set_interrupt(true);
        self.hw.start_conversion();

        Ok(Pending {
            completion: self.completion,
        })
    }
}

/// ADC registers of the ATmega32
#[cfg(target_arch = "avr")]
#[derive(Clone, Copy, Default)]
pub struct Atmega32Adc {
    _private: (),
}

#[cfg(target_arch = "avr")]
impl Atmega32Adc {
    const ADEN: u8 = 1 << 7;
    const ADSC: u8 = 1 << 6;
    const ADIF: u8 = 1 << 4;
    const ADIE: u8 = 1 << 3;
    const ADLAR: u8 = 1 << 5;
    const REFS_SHIFT: u8 = 6;
    const MUX_MASK: u8 = 0x1F;

    pub fn new() -> Self {
        Self { _private: () }
    }
}

#[cfg(target_arch = "avr")]
impl AdcHw for Atmega32Adc {
    fn configure(&mut self, config: &AdcConfig) {
        let interrupt = if config.interrupt { Self::ADIE } else { 0 };
        let adlar = match config.adjust {
            Adjust::Left => Self::ADLAR,
            Adjust::Right => 0,
        };
        unsafe {
            let p = ADC::ptr();
            (*p).adcsra.write(|w| w.bits(Self::ADEN | config.prescaler as u8 | interrupt));
            (*p).admux.write(|w| w.bits(((config.reference as u8) << Self::REFS_SHIFT) | adlar));
        }
    }

    fn select_channel(&mut self, mux: u8) {
        unsafe {
            (*ADC::ptr()).admux.modify(|r, w| {
                w.bits((r.bits() & !Self::MUX_MASK) | (mux & Self::MUX_MASK))
            });
        }
    }

    fn start_conversion(&mut self) {
        unsafe {
            (*ADC::ptr()).adcsra.modify(|r, w| w.bits(r.bits() | Self::ADSC));
        }
    }

    fn conversion_running(&self) -> bool {
        unsafe { (*ADC::ptr()).adcsra.read().bits() & Self::ADSC != 0 }
    }

    fn conversion_complete(&self) -> bool {
        unsafe { (*ADC::ptr()).adcsra.read().bits() & Self::ADIF != 0 }
    }

    fn clear_complete(&mut self) {
        // ADIF is cleared by writing one
        unsafe {
            (*ADC::ptr()).adcsra.modify(|r, w| w.bits(r.bits() | Self::ADIF));
        }
    }

    fn data(&mut self) -> (u8, u8) {
        // ADCL is read first, which latches ADCH
        let code = unsafe { (*ADC::ptr()).adc.read().bits() };
        (code as u8, (code >> 8) as u8)
    }

    fn set_interrupt(&mut self, enabled: bool) {
        unsafe {
            (*ADC::ptr()).adcsra.modify(|r, w| {
                if enabled {
                    w.bits(r.bits() | Self::ADIE)
                } else {
                    w.bits(r.bits() & !Self::ADIE)
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_resolutions_the_converter_cannot_produce() {
        use crate::config::board;
        use crate::testing::{SimAdc, SimGpio};

        let completion = AdcCompletion::new();
        let mut adc = Adc::new(SimAdc::new(), SimGpio::new(), &completion);
        for bits in [0u8, 11, 16, 32, 255] {
            let config = AdcConfig {
                resolution_bits: bits,
                ..board::adc_config()
            };
            assert_eq!(
                adc.init(Some(&config)),
                Err(Error::InvalidConfiguration(Fault::Resolution)),
                "{bits} bits"
            );
        }
        assert_eq!(adc.read_blocking(&board::LM35), Err(Error::NotInitialized));

        let config = AdcConfig {
            resolution_bits: 8,
            ..board::adc_config()
        };
        adc.init(Some(&config)).unwrap();
        assert!((adc.step - 5.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn quantisation_step_divides_by_full_scale_code() {
        let step = quantisation_step(5.0, 10);
        assert!((step - 5.0 / 1023.0).abs() < 1e-9);
    }

    #[test]
    fn right_adjusted_code_uses_high_byte_as_top_bits() {
        assert_eq!(raw_code(0xFF, 0x03, Adjust::Right), 0x3FF);
        assert_eq!(raw_code(0x34, 0x01, Adjust::Right), 0x134);
    }

    #[test]
    fn left_adjusted_code_takes_two_bits_from_low_byte() {
        // 0x134 left-adjusted: ADCH = 0x4D, ADCL = 0x00
        assert_eq!(raw_code(0x00, 0x4D, Adjust::Left), 0x134);
        assert_eq!(raw_code(0xC0, 0xFF, Adjust::Left), 0x3FF);
    }

    #[test]
    fn only_port_a_is_multiplexed() {
        assert_eq!(AdcChannel::new(Port::A, 7).mux(), Ok(7));
        assert_eq!(
            AdcChannel::new(Port::B, 7).mux(),
            Err(Error::InvalidConfiguration(Fault::Port))
        );
        assert_eq!(
            AdcChannel::new(Port::A, 9).mux(),
            Err(Error::InvalidConfiguration(Fault::Pin))
        );
    }
}
